//! 方言解析器：单向扫描 + 显式状态机
//!
//! 状态转移由行前缀标记驱动：
//!
//! ```text
//! AwaitingSection → InSection → InQuestion → InChoiceList → InAnswer
//! ```
//!
//! 未知行策略按状态确定：在 `AwaitingSection` 丢弃并记警告，
//! 其余状态并入当前节点的正文，保证松散的上游文本不会整段丢失。
//! 内容问题一律降级为警告，唯一的硬错误是整个文档为空。

use crate::error::{ConvertError, ConvertWarning, Result};
use crate::models::{
    AnswerKeyEntry, ChoiceOption, Document, DocumentMeta, MusicRef, Question, QuestionKind,
    RequirementBox, Section,
};
use crate::parser::markers::{is_key, kind_from_tag, Markers};
use tracing::debug;

/// 状态机状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingSection,
    InSection,
    InQuestion,
    InChoiceList,
    InAnswer,
}

/// 方言解析器
pub struct DialectParser {
    markers: Markers,
}

impl Default for DialectParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectParser {
    pub fn new() -> Self {
        Self {
            markers: Markers::new(),
        }
    }

    /// 解析一份 Markdown 方言文本
    ///
    /// # 返回
    /// 文档树和按出现顺序排列的警告；只有完全没有章节和题目时返回
    /// `ConvertError::EmptyDocument`
    pub fn parse(&self, input: &str) -> Result<(Document, Vec<ConvertWarning>)> {
        let mut doc = Document::default();
        let mut warnings = Vec::new();

        let lines: Vec<&str> = input.lines().collect();
        let mut start = 0;
        if let Some((meta, consumed)) = parse_frontmatter(&lines) {
            doc.meta = meta;
            start = consumed;
        }

        let mut state = State::AwaitingSection;
        let mut current_section: Option<Section> = None;
        let mut current_question: Option<Question> = None;
        let mut in_req_box = false;

        for (idx, raw) in lines.iter().enumerate().skip(start) {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            // 章节标题
            if let Some(cap) = self.markers.section.captures(line) {
                flush_section(&mut doc, &mut current_section, &mut current_question);
                current_section = Some(Section::new(&cap[1]));
                state = State::InSection;
                in_req_box = false;
                continue;
            }

            // 题目起始
            if let Some(cap) = self.markers.question.captures(line) {
                flush_question(&mut current_section, &mut current_question);
                if current_section.is_none() {
                    warnings.push(ConvertWarning::at_line(
                        line_no,
                        *raw,
                        "题目出现在任何章节之前，已自动创建未命名章节",
                    ));
                    current_section = Some(Section::new("未命名"));
                }
                let kind = match kind_from_tag(&cap[2]) {
                    Some(kind) => kind,
                    None => {
                        warnings.push(ConvertWarning::at_line(
                            line_no,
                            *raw,
                            format!("未知的题型标签 [{}]，按自由题型处理", &cap[2]),
                        ));
                        QuestionKind::Freeform
                    }
                };
                let mut question = Question::new(kind, cap[4].trim());
                question.source_number = cap[1].parse().ok();
                question.score = cap.get(3).and_then(|m| m.as_str().parse().ok());
                current_question = Some(question);
                state = State::InQuestion;
                in_req_box = false;
                continue;
            }

            // 选项行：只在题目上下文里是标记，其余状态按未知行处理
            if matches!(state, State::InQuestion | State::InChoiceList) {
                if let Some(cap) = self.markers.choice.captures(line) {
                    let mut text = cap[2].trim().to_string();
                    let cut = self.markers.correct_suffix.find(&text).map(|m| m.start());
                    let is_correct = cut.is_some();
                    if let Some(cut) = cut {
                        text.truncate(cut);
                        truncate_trailing_ws(&mut text);
                    }
                    if let Some(question) = current_question.as_mut() {
                        // 标签由校验器按顺序重新分配，这里先占位
                        question.options.push(ChoiceOption {
                            label: ' ',
                            text,
                            is_correct,
                        });
                        state = State::InChoiceList;
                        continue;
                    }
                }
            }

            // `>` 指令族
            if line.starts_with('>') {
                // 要求框条目要先于通用指令判断：
                // 含冒号的条目（如 `> - 时长: 5 分钟`）否则会被误认成指令
                if in_req_box {
                    if let Some(cap) = self.markers.req_item.captures(line) {
                        if let Some(req_box) = current_question
                            .as_mut()
                            .and_then(|q| q.requirement_box.as_mut())
                        {
                            req_box.items.push(cap[1].trim().to_string());
                            continue;
                        }
                    }
                }

                if let Some(cap) = self.markers.directive.captures(line) {
                    let key = cap[1].trim();
                    let value = cap[2].trim();

                    // 答案表条目 `答案[n]` 比普通答案指令更特殊，先匹配
                    if let Some(key_cap) = self.markers.answer_key.captures(key) {
                        doc.answer_key.push(AnswerKeyEntry {
                            question_id: key_cap[1].parse().ok(),
                            reference: key_cap[1].to_string(),
                            payload: value.to_string(),
                            line: line_no,
                        });
                        continue;
                    }

                    if is_key(key, "答案", "answer") {
                        match current_question.as_mut() {
                            Some(question) => {
                                question.answer = Some(value.to_string());
                                state = State::InAnswer;
                                in_req_box = false;
                            }
                            None => warnings.push(ConvertWarning::at_line(
                                line_no,
                                *raw,
                                "答案指令没有对应的题目，已忽略",
                            )),
                        }
                        continue;
                    }

                    if is_key(key, "行数", "lines") {
                        match (current_question.as_mut(), value.parse::<u32>()) {
                            (Some(question), Ok(n)) => question.answer_lines = Some(n),
                            _ => warnings.push(ConvertWarning::at_line(
                                line_no,
                                *raw,
                                "行数指令无效，已忽略",
                            )),
                        }
                        continue;
                    }

                    if is_key(key, "谱面", "staff") {
                        match current_question.as_mut() {
                            Some(question) => {
                                let melody = question.music.take().and_then(|m| m.melody);
                                question.music = Some(MusicRef {
                                    requested: value.to_string(),
                                    resolved: None,
                                    melody,
                                });
                            }
                            None => warnings.push(ConvertWarning::at_line(
                                line_no,
                                *raw,
                                "谱面指令没有对应的题目，已忽略",
                            )),
                        }
                        continue;
                    }

                    if is_key(key, "旋律", "melody") {
                        match current_question.as_mut().and_then(|q| q.music.as_mut()) {
                            Some(music) => music.melody = Some(value.to_string()),
                            None => warnings.push(ConvertWarning::at_line(
                                line_no,
                                *raw,
                                "旋律指令之前没有谱面指令，已忽略",
                            )),
                        }
                        continue;
                    }

                    if is_key(key, "要求框", "requirements") {
                        match current_question.as_mut() {
                            Some(question) => {
                                question.requirement_box = Some(RequirementBox {
                                    title: value.to_string(),
                                    items: Vec::new(),
                                });
                                in_req_box = true;
                            }
                            None => warnings.push(ConvertWarning::at_line(
                                line_no,
                                *raw,
                                "要求框指令没有对应的题目，已忽略",
                            )),
                        }
                        continue;
                    }

                    warnings.push(ConvertWarning::at_line(
                        line_no,
                        *raw,
                        format!("无法识别的指令: {}", key),
                    ));
                    continue;
                }

                // 空引用行
                if line == ">" {
                    continue;
                }
            }

            // 未知行策略
            match state {
                State::AwaitingSection => warnings.push(ConvertWarning::at_line(
                    line_no,
                    *raw,
                    "无法识别的前导内容，已忽略",
                )),
                State::InSection => {
                    if let Some(section) = current_section.as_mut() {
                        push_line(&mut section.preamble, line);
                    }
                }
                State::InQuestion => {
                    if let Some(question) = current_question.as_mut() {
                        push_line(&mut question.body, line);
                    }
                }
                State::InChoiceList => {
                    if let Some(option) = current_question
                        .as_mut()
                        .and_then(|q| q.options.last_mut())
                    {
                        push_line(&mut option.text, line);
                    }
                }
                State::InAnswer => {
                    if let Some(answer) = current_question
                        .as_mut()
                        .and_then(|q| q.answer.as_mut())
                    {
                        push_line(answer, line);
                    }
                }
            }
        }

        flush_section(&mut doc, &mut current_section, &mut current_question);

        if doc.sections.is_empty() {
            return Err(ConvertError::EmptyDocument);
        }

        debug!(
            "解析完成: {} 个章节 / {} 道题 / {} 条警告",
            doc.sections.len(),
            doc.question_count(),
            warnings.len()
        );
        Ok((doc, warnings))
    }
}

/// 解析 YAML 头部（`--- ... ---`），返回元数据和消费的行数
fn parse_frontmatter(lines: &[&str]) -> Option<(DocumentMeta, usize)> {
    if lines.first().map(|l| l.trim()) != Some("---") {
        return None;
    }
    let close = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| l.trim() == "---")
        .map(|(i, _)| i)?;

    let mut meta = DocumentMeta::default();
    for line in &lines[1..close] {
        let line = line.trim();
        let Some(pos) = line.find([':', '：']) else {
            continue;
        };
        let (key, rest) = line.split_at(pos);
        let key = key.trim();
        let value = strip_quotes(rest.trim_start_matches([':', '：']).trim());
        match key {
            "title" => meta.title = value.to_string(),
            "school" => meta.school = value.to_string(),
            "theme" => meta.theme = value.to_string(),
            "locale" => meta.locale = value.to_string(),
            _ => {}
        }
    }
    Some((meta, close + 1))
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn truncate_trailing_ws(text: &mut String) {
    let trimmed = text.trim_end().len();
    text.truncate(trimmed);
}

fn push_line(target: &mut String, line: &str) {
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(line);
}

fn flush_question(section: &mut Option<Section>, question: &mut Option<Question>) {
    if let Some(q) = question.take() {
        if let Some(s) = section.as_mut() {
            s.questions.push(q);
        }
    }
}

fn flush_section(doc: &mut Document, section: &mut Option<Section>, question: &mut Option<Question>) {
    flush_question(section, question);
    if let Some(s) = section.take() {
        doc.sections.push(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> (Document, Vec<ConvertWarning>) {
        DialectParser::new().parse(input).expect("解析失败")
    }

    #[test]
    fn test_single_choice_question() {
        let (doc, warnings) = parse("# Section 1\n1. [choice] What is 2+2?\nA) 3\nB) 4 (correct)\n");
        assert!(warnings.is_empty());
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, "Section 1");

        let q = &doc.sections[0].questions[0];
        assert_eq!(q.kind, QuestionKind::Choice { multiple: false });
        assert_eq!(q.body, "What is 2+2?");
        assert_eq!(q.options.len(), 2);
        assert_eq!(q.options[0].text, "3");
        assert!(!q.options[0].is_correct);
        assert_eq!(q.options[1].text, "4");
        assert!(q.options[1].is_correct);
    }

    #[test]
    fn test_frontmatter_metadata() {
        let input = "---\ntitle: \"期末测试\"\nschool: 实验中学\ntheme: 4e9b86\n---\n\n# 选择题\n1. [choice] 题干\nA) 一\nB) 二 (correct)\n";
        let (doc, _) = parse(input);
        assert_eq!(doc.meta.title, "期末测试");
        assert_eq!(doc.meta.school, "实验中学");
        assert_eq!(doc.meta.theme, "4e9b86");
    }

    #[test]
    fn test_directives_on_short_answer() {
        let input = "# 简答题\n1. [short] [5分] 什么是大调音阶？\n> 行数: 3\n> 答案: 全全半全全全半\n";
        let (doc, warnings) = parse(input);
        assert!(warnings.is_empty());
        let q = &doc.sections[0].questions[0];
        assert_eq!(q.kind, QuestionKind::ShortAnswer);
        assert_eq!(q.score, Some(5));
        assert_eq!(q.answer_lines, Some(3));
        assert_eq!(q.answer.as_deref(), Some("全全半全全全半"));
    }

    #[test]
    fn test_music_directives() {
        let input = "# 乐谱题\n1. [music] 写出 C 大调音阶\n> 谱面: 五线谱\n> 旋律: c4 d4 e4 f4 g4 a4 b4 c5\n";
        let (doc, _) = parse(input);
        let music = doc.sections[0].questions[0].music.as_ref().unwrap();
        assert_eq!(music.requested, "五线谱");
        assert!(music.resolved.is_none());
        assert_eq!(music.melody.as_deref(), Some("c4 d4 e4 f4 g4 a4 b4 c5"));
    }

    #[test]
    fn test_requirement_box_items_with_colon() {
        // 含冒号的条目必须按要求框条目解析，不能被当成指令
        let input = "# 综合题\n1. [essay] 创作旋律\n> 要求框: 创作要求\n> - 调性: C 大调\n> - 至少 8 小节\n> 行数: 10\n";
        let (doc, warnings) = parse(input);
        assert!(warnings.is_empty());
        let q = &doc.sections[0].questions[0];
        let req_box = q.requirement_box.as_ref().unwrap();
        assert_eq!(req_box.title, "创作要求");
        assert_eq!(req_box.items, vec!["调性: C 大调", "至少 8 小节"]);
        assert_eq!(q.answer_lines, Some(10));
    }

    #[test]
    fn test_answer_key_entries() {
        let input = "# 选择题\n1. [choice] 题干\nA) 一\nB) 二 (correct)\n\n# 答案表\n> 答案[1]: B\n> answer[99]: 不存在\n";
        let (doc, _) = parse(input);
        assert_eq!(doc.answer_key.len(), 2);
        assert_eq!(doc.answer_key[0].question_id, Some(1));
        assert_eq!(doc.answer_key[1].question_id, Some(99));
        assert_eq!(doc.answer_key[1].reference, "99");
    }

    #[test]
    fn test_answer_key_overflowing_id_kept_as_reference() {
        // 溢出 usize 的题号解析不出来，但原文保留给校验器引用
        let input = "# 选择\n1. [choice] 题干\nA) 一\nB) 二 (correct)\n\n> 答案[99999999999999999999999]: x\n";
        let (doc, _) = parse(input);
        assert_eq!(doc.answer_key.len(), 1);
        assert_eq!(doc.answer_key[0].question_id, None);
        assert_eq!(doc.answer_key[0].reference, "99999999999999999999999");
    }

    #[test]
    fn test_multiline_body_and_answer() {
        let input = "# 简答题\n1. [short] 第一行题干\n第二行题干\n> 答案: 答案第一行\n答案第二行\n";
        let (doc, _) = parse(input);
        let q = &doc.sections[0].questions[0];
        assert_eq!(q.body, "第一行题干\n第二行题干");
        assert_eq!(q.answer.as_deref(), Some("答案第一行\n答案第二行"));
    }

    #[test]
    fn test_preamble_noise_warned_and_dropped() {
        let input = "这是前导噪声\n# 选择题\n1. [choice] 题干\nA) 一\nB) 二 (correct)\n";
        let (doc, warnings) = parse(input);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, Some(1));
        assert!(warnings[0].raw.as_deref().unwrap().contains("噪声"));
    }

    #[test]
    fn test_question_before_section_gets_implicit_section() {
        let input = "1. [short] 凭空出现的题目\n";
        let (doc, warnings) = parse(input);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, "未命名");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_empty_document_is_hard_error() {
        let result = DialectParser::new().parse("随便一些文字\n没有任何结构\n");
        assert!(matches!(result, Err(ConvertError::EmptyDocument)));

        let result = DialectParser::new().parse("");
        assert!(matches!(result, Err(ConvertError::EmptyDocument)));
    }

    #[test]
    fn test_noise_degrades_gracefully() {
        // 一半的行是噪声时仍然得到非空文档，只是警告变多
        let input = "\
# 选择题
%%% 噪声 1 %%%
1. [choice] 正常题干
### 不是标记的东西
A) 一
&*#@!()
B) 二 (correct)
> 胡乱指令: 一些值
2. [short] 第二题
随手写的一行
";
        let (doc, warnings) = parse(input);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].questions.len(), 2);
        assert!(!warnings.is_empty());
        // 噪声并入了当前节点，没有整段丢失
        assert!(doc.sections[0].questions[0].body.contains("正常题干"));
        assert!(doc.sections[0].questions[1].body.contains("随手写的一行"));
    }

    #[test]
    fn test_unknown_kind_tag_downgrades() {
        let input = "# 杂项\n1. [banana] 奇怪的题\n";
        let (doc, warnings) = parse(input);
        assert_eq!(doc.sections[0].questions[0].kind, QuestionKind::Freeform);
        assert!(warnings.iter().any(|w| w.message.contains("banana")));
    }
}
