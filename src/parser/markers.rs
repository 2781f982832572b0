//! 方言的行级标记定义
//!
//! 每种标记对应一个预编译正则。匹配顺序就是特异性顺序：
//! 章节 → 题目 → 选项 → 要求框条目 → 答案表条目 → 普通指令，
//! 越靠前的模式约束越强，保证一行文本不会被歧义地吃掉。

use crate::models::QuestionKind;
use regex::Regex;

/// 预编译的标记正则集合
pub struct Markers {
    /// 章节标题：`# 选择题`
    pub section: Regex,
    /// 题目起始：`1. [choice] 题干` 或 `1. [choice] [5分] 题干`
    pub question: Regex,
    /// 选项行：`A) 内容` 或 `- A. 内容`
    pub choice: Regex,
    /// 选项的正确标记后缀：`(correct)` / `（正确）`
    pub correct_suffix: Regex,
    /// 通用指令：`> 键: 值`
    pub directive: Regex,
    /// 要求框条目：`> - 内容`
    pub req_item: Regex,
    /// 答案表条目的键：`答案[3]` / `answer[3]`
    pub answer_key: Regex,
}

impl Markers {
    pub fn new() -> Self {
        // 模式都是编译期常量，构造失败只可能是代码写错
        Self {
            section: Regex::new(r"^#\s+(.+?)\s*$").expect("章节标记正则非法"),
            question: Regex::new(r"^(\d+)\s*[.、．]\s*\[\s*([^\]\s]+)\s*\]\s*(?:\[(\d+)\s*分\]\s*)?(.*)$")
                .expect("题目标记正则非法"),
            choice: Regex::new(r"^(?:-\s*)?([A-Ha-h])\s*[)\.．、]\s*(.+)$").expect("选项标记正则非法"),
            correct_suffix: Regex::new(r"(?i)\s*[(（]\s*(?:correct|正确)\s*[)）]\s*$")
                .expect("正确标记正则非法"),
            directive: Regex::new(r"^>\s*(.+?)\s*[:：]\s*(.*)$").expect("指令标记正则非法"),
            req_item: Regex::new(r"^>\s*-\s*(.+)$").expect("要求框条目正则非法"),
            answer_key: Regex::new(r"(?i)^(?:答案|answer)\[(\d+)\]$").expect("答案表键正则非法"),
        }
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new()
    }
}

/// 题型标签 → 题型，中英文都可用；未知标签返回 None
pub fn kind_from_tag(tag: &str) -> Option<QuestionKind> {
    let normalized = tag.trim().to_lowercase();
    match normalized.as_str() {
        "choice" | "选择" | "选择题" => Some(QuestionKind::Choice { multiple: false }),
        "multi" | "多选" | "多选题" => Some(QuestionKind::Choice { multiple: true }),
        "fill" | "填空" | "填空题" => Some(QuestionKind::FillBlank),
        "short" | "简答" | "简答题" => Some(QuestionKind::ShortAnswer),
        "essay" | "综合" | "综合题" | "论述" => Some(QuestionKind::Essay),
        "music" | "乐谱" | "乐谱题" => Some(QuestionKind::Music),
        "other" | "其他" => Some(QuestionKind::Freeform),
        _ => None,
    }
}

/// 指令键匹配：中文键精确匹配，英文键忽略大小写
pub fn is_key(key: &str, zh: &str, en: &str) -> bool {
    key == zh || key.eq_ignore_ascii_case(en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_marker_with_score() {
        let markers = Markers::new();
        let cap = markers.question.captures("3. [choice] [5分] 下列哪个是属七和弦？").unwrap();
        assert_eq!(&cap[1], "3");
        assert_eq!(&cap[2], "choice");
        assert_eq!(&cap[3], "5");
        assert_eq!(&cap[4], "下列哪个是属七和弦？");
    }

    #[test]
    fn test_question_marker_without_score() {
        let markers = Markers::new();
        let cap = markers.question.captures("1. [choice] What is 2+2?").unwrap();
        assert_eq!(&cap[2], "choice");
        assert!(cap.get(3).is_none());
        assert_eq!(&cap[4], "What is 2+2?");
    }

    #[test]
    fn test_choice_marker_both_styles() {
        let markers = Markers::new();
        let cap = markers.choice.captures("A) 3").unwrap();
        assert_eq!(&cap[1], "A");
        assert_eq!(&cap[2], "3");

        let cap = markers.choice.captures("- B. 大三和弦").unwrap();
        assert_eq!(&cap[1], "B");
        assert_eq!(&cap[2], "大三和弦");
    }

    #[test]
    fn test_correct_suffix() {
        let markers = Markers::new();
        assert!(markers.correct_suffix.is_match("4 (correct)"));
        assert!(markers.correct_suffix.is_match("大调（正确）"));
        assert!(!markers.correct_suffix.is_match("4 correct"));
    }

    #[test]
    fn test_answer_key_marker() {
        let markers = Markers::new();
        let cap = markers.answer_key.captures("答案[99]").unwrap();
        assert_eq!(&cap[1], "99");
        assert!(markers.answer_key.is_match("answer[3]"));
        assert!(!markers.answer_key.is_match("答案"));
    }

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(kind_from_tag("choice"), Some(QuestionKind::Choice { multiple: false }));
        assert_eq!(kind_from_tag("多选"), Some(QuestionKind::Choice { multiple: true }));
        assert_eq!(kind_from_tag("乐谱"), Some(QuestionKind::Music));
        assert_eq!(kind_from_tag("whatever"), None);
    }
}
