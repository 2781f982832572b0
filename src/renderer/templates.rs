//! 按题型的 LaTeX 模板
//!
//! 输出是配合静态模板（main.tex + styles.sty）使用的 subfiles 子文件。
//! 两个变体共用一次校验结果，题号、版面布局逐题一致，
//! 差异只在答案的显示：正确选项标记、填空覆盖、参考答案块。

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::models::{Document, Question, QuestionKind, Variant};
use crate::renderer::escape::escape_latex;
use regex::Regex;
use std::sync::OnceLock;

/// 渲染参数，全部显式传入，渲染器不读取任何全局状态
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// 填空默认宽度（mm）
    pub blank_default_width: u32,
    /// 每个预期答案字符对应的宽度（mm）
    pub blank_per_char: u32,
    /// 填空最大宽度（mm）
    pub blank_max_width: u32,
    /// 简答/综合题默认答题行数
    pub default_answer_lines: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            blank_default_width: 20,
            blank_per_char: 6,
            blank_max_width: 80,
            default_answer_lines: 4,
        }
    }
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            blank_default_width: config.blank_default_width,
            blank_per_char: config.blank_per_char,
            blank_max_width: config.blank_max_width,
            default_answer_lines: config.default_answer_lines,
        }
    }
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_{3,}").expect("填空占位正则非法"))
}

/// 渲染一份校验后的文档
///
/// # 参数
/// - `doc`: 校验器输出的文档（题号已分配）
/// - `variant`: 试题卷 / 答案卷
///
/// # 返回
/// 完整的 LaTeX 子文件文本；文档未经校验（题号缺失、谱面未解析）
/// 时返回 `ConvertError::Render`，这属于内部一致性缺陷
pub fn render(doc: &Document, variant: Variant, opts: &RenderOptions) -> Result<String> {
    let mut lines: Vec<String> = Vec::new();

    lines.push("% 由 exam_factory 自动生成".to_string());
    lines.push(r"\documentclass[../main.tex]{subfiles}".to_string());
    lines.push(r"\begin{document}".to_string());
    lines.push(String::new());
    lines.push(format!(
        r"\localshowanswer{{{}}}",
        matches!(variant, Variant::Answer)
    ));
    lines.push(r"\localshowquestion{true}".to_string());
    lines.push(String::new());

    if !doc.meta.school.is_empty() {
        lines.push(format!(r"\setschool{{{}}}", escape_latex(&doc.meta.school)));
    }
    if !doc.meta.theme.is_empty() {
        // 主题色是十六进制色值，不是自由文本
        lines.push(format!(r"\setthemecolor{{{}}}", doc.meta.theme));
    }
    if !doc.meta.school.is_empty() || !doc.meta.theme.is_empty() {
        lines.push(String::new());
    }
    if !doc.meta.title.is_empty() {
        lines.push(format!(r"\testheader{{{}}}", escape_latex(&doc.meta.title)));
        lines.push(String::new());
    }

    for section in &doc.sections {
        lines.push(format!(r"\section{{{}}}", escape_latex(&section.title)));
        lines.push(String::new());

        if !section.preamble.is_empty() {
            for preamble_line in section.preamble.split('\n') {
                lines.push(escape_latex(preamble_line));
            }
            lines.push(String::new());
        }

        lines.push(r"\begin{questions}".to_string());
        for question in &section.questions {
            render_question(&mut lines, question, variant, opts)?;
        }
        lines.push(r"\end{questions}".to_string());
        lines.push(String::new());
    }

    lines.push(r"\end{document}".to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

fn render_question(
    lines: &mut Vec<String>,
    question: &Question,
    variant: Variant,
    opts: &RenderOptions,
) -> Result<()> {
    if question.id == 0 {
        return Err(ConvertError::Render(
            "存在未编号的题目，文档未经过校验".to_string(),
        ));
    }

    let mut head = format!(r"  \item \qid{{{}}}", question.id);
    if let Some(score) = question.score {
        head.push_str(&format!(r" \points{{{}}}", score));
    }
    lines.push(head);

    if let Some(req_box) = &question.requirement_box {
        lines.push(format!(
            r"  \begin{{essaybox}}{{{}}}",
            escape_latex(&req_box.title)
        ));
        for item in &req_box.items {
            lines.push(format!(r"    \item {}", escape_latex(item)));
        }
        lines.push(r"  \end{essaybox}".to_string());
    }

    // 题干
    if question.kind == QuestionKind::FillBlank {
        lines.push(format!(
            r"  \question{{{}}}",
            render_fill_body(question, variant, opts)
        ));
    } else {
        let escaped = escape_latex(&question.body);
        let mut body_lines = escaped.split('\n');
        if let Some(first) = body_lines.next() {
            lines.push(format!(r"  \question{{{}}}", first));
        }
        for extra in body_lines {
            if !extra.trim().is_empty() {
                lines.push(format!("  {}", extra));
            }
        }
    }

    // 选项：答案卷上正确选项换用带标记的命令，试题卷两者不可区分
    for option in &question.options {
        let command = if option.is_correct && variant == Variant::Answer {
            "optioncorrect"
        } else {
            "option"
        };
        lines.push(format!(
            r"  \{}{{{}}}{{{}}}",
            command,
            option.label,
            escape_latex(&option.text)
        ));
    }

    // 答题区：简答/综合题总有答题区，其余题型按需
    let answer_lines = match question.kind {
        QuestionKind::ShortAnswer | QuestionKind::Essay => {
            Some(question.answer_lines.unwrap_or(opts.default_answer_lines))
        }
        _ => question.answer_lines,
    };
    if let Some(n) = answer_lines {
        lines.push(format!(r"  \answerlines{{{}}}", n));
    }

    // 谱面
    if let Some(music) = &question.music {
        let Some(asset) = music.resolved else {
            return Err(ConvertError::Render(
                "谱面资源未解析，文档未经过校验".to_string(),
            ));
        };
        lines.push(format!("  {}", asset.latex_command()));
        if variant == Variant::Answer {
            if let Some(melody) = &music.melody {
                // 旋律是结构化音符记号，不走自由文本转义
                lines.push(format!(r"  \melody{{{}}}", melody));
            }
        }
    }

    // 参考答案块：选择题由选项标记表达，填空题已覆盖进空里
    let inline_answer = matches!(
        question.kind,
        QuestionKind::Choice { .. } | QuestionKind::FillBlank
    );
    if variant == Variant::Answer && !inline_answer {
        if let Some(answer) = &question.answer {
            lines.push(format!(r"  \answer{{{}}}", escape_latex(answer)));
        }
    }

    lines.push(String::new());
    Ok(())
}

/// 填空题题干：把连续下划线段换成定宽填空
///
/// 宽度由预期答案长度估算，两个变体用同一宽度，保证版面一致；
/// 答案卷在空里覆盖答案文本。
fn render_fill_body(question: &Question, variant: Variant, opts: &RenderOptions) -> String {
    let body = question.body.replace('\n', " ");
    let answers: Vec<&str> = question
        .answer
        .as_deref()
        .map(|a| a.split([';', '；']).map(str::trim).collect())
        .unwrap_or_default();

    let re = blank_run_re();
    let mut out = String::new();
    let mut last = 0;
    let mut blank_idx = 0;
    for m in re.find_iter(&body) {
        out.push_str(&escape_latex(&body[last..m.start()]));
        out.push_str(&render_blank(answers.get(blank_idx).copied(), variant, opts));
        blank_idx += 1;
        last = m.end();
    }
    out.push_str(&escape_latex(&body[last..]));

    // 题干里忘了写占位下划线时，在句尾补一个空
    if blank_idx == 0 {
        out.push_str(&render_blank(answers.first().copied(), variant, opts));
    }
    out
}

fn render_blank(expected: Option<&str>, variant: Variant, opts: &RenderOptions) -> String {
    let width = blank_width(expected, opts);
    match (variant, expected) {
        (Variant::Answer, Some(answer)) if !answer.is_empty() => {
            format!(r"\fillblankanswer{{{}}}{{{}}}", width, escape_latex(answer))
        }
        _ => format!(r"\fillblank{{{}}}", width),
    }
}

/// 填空宽度启发式：与预期答案长度成正比，夹在默认值和上限之间
fn blank_width(expected: Option<&str>, opts: &RenderOptions) -> u32 {
    match expected {
        Some(answer) if !answer.is_empty() => {
            let chars = answer.chars().count() as u32;
            (chars * opts.blank_per_char).clamp(opts.blank_default_width, opts.blank_max_width)
        }
        _ => opts.blank_default_width,
    }
}
