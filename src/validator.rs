//! 文档校验与规范化
//!
//! 校验器做三件事：
//! 1. 分配规范题号和选项标签（源文本的编号常见重复或跳号，一律不信任）
//! 2. 结构校验：空题干、选项集合、谱面资源、答案表引用
//! 3. 补全：用答案表条目填充缺失的题目答案，按答案字母标记正确选项
//!
//! 校验失败即整个任务失败（fail closed），不产出部分结果。

use crate::error::{ConvertWarning, ValidationError};
use crate::models::{Document, QuestionKind, StaffAsset};
use tracing::debug;

/// 校验并规范化文档
///
/// # 参数
/// - `doc`: 解析器输出的原始文档
/// - `warnings`: 解析阶段的警告，校验警告追加在其后
///
/// # 返回
/// 校验通过的文档，或全部校验错误
pub fn validate(
    mut doc: Document,
    warnings: &mut Vec<ConvertWarning>,
) -> Result<Document, Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 空章节直接丢弃
    doc.sections.retain(|section| {
        if section.questions.is_empty() {
            warnings.push(ConvertWarning::general(format!(
                "章节「{}」没有题目，已丢弃",
                section.title
            )));
            false
        } else {
            true
        }
    });

    // 规范题号全卷连续递增，与章节无关
    let mut next_id = 1;
    for section in &mut doc.sections {
        let mut scored = 0usize;
        let mut unscored = 0usize;
        for question in &mut section.questions {
            question.id = next_id;
            next_id += 1;

            match question.score {
                Some(_) => scored += 1,
                None => unscored += 1,
            }

            if question.body.trim().is_empty() {
                errors.push(ValidationError::EmptyBody { id: question.id });
            }

            // 选项标签按顺序重新分配
            for (i, option) in question.options.iter_mut().enumerate() {
                option.label = (b'A' + i as u8) as char;
            }

            if let Some(music) = &mut question.music {
                match StaffAsset::lookup(&music.requested) {
                    Some(asset) => music.resolved = Some(asset),
                    None => errors.push(ValidationError::UnknownAsset {
                        id: question.id,
                        name: music.requested.clone(),
                    }),
                }
            }

            if !matches!(question.kind, QuestionKind::Choice { .. }) && !question.options.is_empty()
            {
                warnings.push(ConvertWarning::general(format!(
                    "第 {} 题不是选择题但带有选项，选项会按原样渲染",
                    question.id
                )));
            }
        }

        if scored > 0 && unscored > 0 {
            warnings.push(ConvertWarning::general(format!(
                "章节「{}」中有 {} 道题缺少分值",
                section.title, unscored
            )));
        }
    }

    let max_id = next_id - 1;

    // 丢弃空章节后可能一道题都不剩，不允许编译出没有题目的试卷
    if doc.sections.is_empty() {
        errors.push(ValidationError::NoQuestions);
    }

    // 答案表引用必须指向存在的题号；无法解析的题号（溢出）同样算悬空
    for entry in &doc.answer_key {
        let valid = entry
            .question_id
            .is_some_and(|id| id >= 1 && id <= max_id);
        if !valid {
            errors.push(ValidationError::DanglingAnswerRef {
                reference: entry.reference.clone(),
                line: entry.line,
            });
        }
    }

    // 引用合法时，用答案表填充还没有答案的题目
    if errors.iter().all(|e| !matches!(e, ValidationError::DanglingAnswerRef { .. })) {
        let entries = doc.answer_key.clone();
        for entry in entries {
            let Some(id) = entry.question_id else {
                continue;
            };
            if let Some(question) = doc.question_mut(id) {
                if question.answer.is_none() {
                    question.answer = Some(entry.payload);
                }
            }
        }
    }

    // 选择题：答案字母可以代替选项上的正确标记
    for section in &mut doc.sections {
        for question in &mut section.questions {
            let QuestionKind::Choice { multiple } = question.kind else {
                continue;
            };

            if question.options.iter().all(|o| !o.is_correct) {
                if let Some(answer) = question.answer.clone() {
                    mark_correct_by_letters(question, &answer);
                }
            }

            if question.options.len() < 2 {
                errors.push(ValidationError::TooFewOptions {
                    id: question.id,
                    count: question.options.len(),
                });
                continue;
            }

            let marked = question.options.iter().filter(|o| o.is_correct).count();
            let ok = if multiple { marked >= 1 } else { marked == 1 };
            if !ok {
                errors.push(ValidationError::BadCorrectCount {
                    id: question.id,
                    marked,
                });
            }
        }
    }

    if errors.is_empty() {
        debug!("校验通过: {} 道题", max_id);
        Ok(doc)
    } else {
        Err(errors)
    }
}

/// 按答案中出现的字母（如 "B" 或 "AC"）标记正确选项
fn mark_correct_by_letters(question: &mut crate::models::Question, answer: &str) {
    let letters: Vec<char> = answer
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    // 答案里混着别的文字时不猜，交给后面的数量检查报错
    if letters.is_empty() || letters.len() > question.options.len() {
        return;
    }
    for option in &mut question.options {
        if letters.contains(&option.label) {
            option.is_correct = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DialectParser;

    fn parse_and_validate(input: &str) -> (Result<Document, Vec<ValidationError>>, Vec<ConvertWarning>) {
        let (doc, mut warnings) = DialectParser::new().parse(input).expect("解析失败");
        let result = validate(doc, &mut warnings);
        (result, warnings)
    }

    #[test]
    fn test_canonical_ids_ignore_source_numbers() {
        // 源文本编号重复且乱序，规范题号仍然是 1、2、3
        let input = "\
# 第一节
7. [short] 甲
> 答案: x
7. [short] 乙
> 答案: y

# 第二节
2. [short] 丙
> 答案: z
";
        let (result, _) = parse_and_validate(input);
        let doc = result.unwrap();
        let ids: Vec<usize> = doc
            .sections
            .iter()
            .flat_map(|s| s.questions.iter().map(|q| q.id))
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_choice_labels_reassigned() {
        let input = "# 选择\n1. [choice] 题干\nC) 甲\nA) 乙 (correct)\nB) 丙\n";
        let (result, _) = parse_and_validate(input);
        let doc = result.unwrap();
        let labels: Vec<char> = doc.sections[0].questions[0]
            .options
            .iter()
            .map(|o| o.label)
            .collect();
        // 源文本的 C/A/B 不可信，按出现顺序重排
        assert_eq!(labels, vec!['A', 'B', 'C']);
        assert!(doc.sections[0].questions[0].options[1].is_correct);
    }

    #[test]
    fn test_empty_body_is_error() {
        let input = "# 选择\n1. [short]\n> 答案: x\n";
        let (result, _) = parse_and_validate(input);
        let errors = result.unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyBody { id: 1 }));
    }

    #[test]
    fn test_too_few_options() {
        let input = "# 选择\n1. [choice] 题干\nA) 唯一选项 (correct)\n";
        let (result, _) = parse_and_validate(input);
        let errors = result.unwrap_err();
        assert!(errors.contains(&ValidationError::TooFewOptions { id: 1, count: 1 }));
    }

    #[test]
    fn test_single_choice_needs_exactly_one_correct() {
        let input = "# 选择\n1. [choice] 题干\nA) 甲 (correct)\nB) 乙 (correct)\n";
        let (result, _) = parse_and_validate(input);
        let errors = result.unwrap_err();
        assert!(errors.contains(&ValidationError::BadCorrectCount { id: 1, marked: 2 }));
    }

    #[test]
    fn test_multi_choice_allows_several_correct() {
        let input = "# 多选\n1. [multi] 题干\nA) 甲 (correct)\nB) 乙 (correct)\nC) 丙\n";
        let (result, _) = parse_and_validate(input);
        assert!(result.is_ok());
    }

    #[test]
    fn test_answer_letter_marks_correct_option() {
        // 原始方言风格：选项不带标记，答案指令给出字母
        let input = "# 选择\n1. [choice] 题干\nA) 甲\nB) 乙\n> 答案: B\n";
        let (result, _) = parse_and_validate(input);
        let doc = result.unwrap();
        let options = &doc.sections[0].questions[0].options;
        assert!(!options[0].is_correct);
        assert!(options[1].is_correct);
    }

    #[test]
    fn test_unknown_asset_is_error() {
        let input = "# 乐谱\n1. [music] 题干\n> 谱面: 吉他谱\n";
        let (result, _) = parse_and_validate(input);
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::UnknownAsset { id: 1, name } if name == "吉他谱"
        )));
    }

    #[test]
    fn test_known_asset_resolved() {
        let input = "# 乐谱\n1. [music] 题干\n> 谱面: 钢琴谱\n";
        let (result, _) = parse_and_validate(input);
        let doc = result.unwrap();
        let music = doc.sections[0].questions[0].music.as_ref().unwrap();
        assert_eq!(music.resolved, Some(StaffAsset::GrandStaff));
    }

    #[test]
    fn test_dangling_answer_key_reference() {
        let input = "\
# 简答
1. [short] 甲
> 答案: x

# 答案表
> 答案[99]: 指向不存在的题
";
        let (result, _) = parse_and_validate(input);
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::DanglingAnswerRef { reference, .. } if reference == "99"
        )));
    }

    #[test]
    fn test_overflowing_answer_ref_cites_original_text() {
        // 溢出的题号不能塌缩成 0，错误信息按作者写的原文引用
        let input = "\
# 简答
1. [short] 甲
> 答案: x

# 答案表
> 答案[99999999999999999999999]: y
";
        let (result, _) = parse_and_validate(input);
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::DanglingAnswerRef { reference, .. }
                if reference == "99999999999999999999999"
        )));
    }

    #[test]
    fn test_all_sections_empty_is_error() {
        // 全部章节都没有题目：不允许编译出没有题目的试卷
        let input = "# 空一\n\n# 空二\n";
        let (result, warnings) = parse_and_validate(input);
        let errors = result.unwrap_err();
        assert!(errors.contains(&ValidationError::NoQuestions));
        // 每个被丢弃的章节仍然有自己的警告
        assert!(warnings.iter().any(|w| w.message.contains("空一")));
        assert!(warnings.iter().any(|w| w.message.contains("空二")));
    }

    #[test]
    fn test_answer_key_fills_missing_answer() {
        let input = "\
# 简答
1. [short] 甲

# 答案表
> 答案[1]: 来自答案表
";
        let (result, _) = parse_and_validate(input);
        let doc = result.unwrap();
        assert_eq!(
            doc.sections[0].questions[0].answer.as_deref(),
            Some("来自答案表")
        );
    }

    #[test]
    fn test_empty_section_dropped_with_warning() {
        let input = "# 空章节\n\n# 简答\n1. [short] 甲\n> 答案: x\n";
        let (result, warnings) = parse_and_validate(input);
        let doc = result.unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert!(warnings.iter().any(|w| w.message.contains("空章节")));
    }

    #[test]
    fn test_mixed_score_warning() {
        let input = "# 简答\n1. [short] [5分] 甲\n2. [short] 乙\n";
        let (result, warnings) = parse_and_validate(input);
        assert!(result.is_ok());
        assert!(warnings.iter().any(|w| w.message.contains("缺少分值")));
    }
}
