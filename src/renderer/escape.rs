//! LaTeX 转义
//!
//! 渲染器里最安全攸关的一段代码：所有自由文本在插入模板之前都必须
//! 经过 `escape_latex`，漏转义的保留字符是下游编译失败的最大来源。
//! 转义只实现一次，行内 Markdown（加粗/斜体/行内代码）在转义前先
//! 摘出，转换成对应的 LaTeX 命令后再放回，保证命令本身不被二次转义。

use regex::Regex;
use std::sync::OnceLock;

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").expect("加粗正则非法"))
}

fn italic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^*]+)\*").expect("斜体正则非法"))
}

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("行内代码正则非法"))
}

/// 转义 LaTeX 保留字符并转换行内 Markdown
pub fn escape_latex(text: &str) -> String {
    let mut work = text.to_string();
    let mut spans: Vec<(&'static str, String)> = Vec::new();

    // 加粗必须先于斜体提取，否则 `**` 会被斜体模式拆开
    for (re, cmd) in [
        (bold_re(), "textbf"),
        (italic_re(), "textit"),
        (code_re(), "texttt"),
    ] {
        extract_spans(&mut work, re, cmd, &mut spans);
    }

    let mut out = escape_plain(&work);

    // 逆序回填：嵌套时外层片段（靠后提取）的内容里还带着内层占位符，
    // 必须先放回外层，内层占位符才会出现在输出里被后续轮次替换
    for (idx, (cmd, inner)) in spans.iter().enumerate().rev() {
        let placeholder = placeholder(idx);
        let replacement = format!("\\{}{{{}}}", cmd, escape_plain(inner));
        out = out.replace(&placeholder, &replacement);
    }

    out
}

/// 纯字符转义，不处理 Markdown
fn escape_plain(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' => out.push_str(r"\&"),
            '%' => out.push_str(r"\%"),
            '$' => out.push_str(r"\$"),
            '#' => out.push_str(r"\#"),
            '_' => out.push_str(r"\_"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(ch),
        }
    }
    out
}

fn placeholder(idx: usize) -> String {
    // \u{1} 不会出现在正常文本里，也不在转义表中
    format!("\u{1}{}\u{1}", idx)
}

fn extract_spans(
    work: &mut String,
    re: &Regex,
    cmd: &'static str,
    spans: &mut Vec<(&'static str, String)>,
) {
    loop {
        let Some(cap) = re.captures(work) else {
            break;
        };
        let range = cap.get(0).map(|m| m.range()).unwrap_or_default();
        let inner = cap[1].to_string();
        let ph = placeholder(spans.len());
        spans.push((cmd, inner));
        work.replace_range(range, &ph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_reserved_characters() {
        let input = r"\ & % $ # _ { } ~ ^";
        let out = escape_latex(input);
        assert_eq!(
            out,
            r"\textbackslash{} \& \% \$ \# \_ \{ \} \textasciitilde{} \textasciicircum{}"
        );
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(escape_latex("普通中文和 English 123"), "普通中文和 English 123");
    }

    #[test]
    fn test_bold_italic_code() {
        assert_eq!(escape_latex("**重点**"), r"\textbf{重点}");
        assert_eq!(escape_latex("*斜体*"), r"\textit{斜体}");
        assert_eq!(escape_latex("`代码`"), r"\texttt{代码}");
    }

    #[test]
    fn test_bold_not_eaten_by_italic() {
        assert_eq!(escape_latex("**a** 和 *b*"), r"\textbf{a} 和 \textit{b}");
    }

    #[test]
    fn test_reserved_chars_inside_markdown_span() {
        // 命令本身不被转义，内部文本照常转义
        assert_eq!(escape_latex("**50%**"), r"\textbf{50\%}");
        assert_eq!(escape_latex("`a_b`"), r"\texttt{a\_b}");
    }

    #[test]
    fn test_nested_spans_fully_restored() {
        // 行内代码里嵌斜体：内层占位符由外层片段带回，必须也被替换掉
        let out = escape_latex("`a *b* c`");
        assert_eq!(out, r"\texttt{a \textit{b} c}");
        assert!(!out.contains('\u{1}'));

        let out = escape_latex("*a **b** c*");
        assert_eq!(out, r"\textit{a \textbf{b} c}");
        assert!(!out.contains('\u{1}'));
    }

    #[test]
    fn test_mixed_text() {
        let out = escape_latex("答对得 5 分 & **奖励** 10%");
        assert_eq!(out, r"答对得 5 分 \& \textbf{奖励} 10\%");
    }

    #[test]
    fn test_every_reserved_char_with_noise() {
        // 保留字符夹杂在文本中也全部转义，输出不含裸保留字符
        let out = escape_latex("a&b%c$d#e_f{g}h~i^j\\k");
        for needle in ["\\&", "\\%", "\\$", "\\#", "\\_", "\\{", "\\}"] {
            assert!(out.contains(needle), "缺少 {}: {}", needle, out);
        }
        assert!(out.contains(r"\textasciitilde{}"));
        assert!(out.contains(r"\textasciicircum{}"));
        assert!(out.contains(r"\textbackslash{}"));
    }
}
