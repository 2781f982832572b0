//! 转换流水线的错误类型定义
//!
//! 错误分为两级：
//! - `ConvertWarning`：非致命，随成功结果一起返回（解析跳过的行、缺分值等）
//! - `ConvertError`：致命，立即终止整个任务，不产出任何文件

use crate::models::Variant;
use serde::Serialize;
use thiserror::Error;

/// 非致命警告
///
/// 解析器和校验器都会产生警告，警告不会中断任务，
/// 最终随成功结果一起交给调用方展示。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertWarning {
    /// 源文本行号（1 起），校验器产生的警告没有行号
    pub line: Option<usize>,
    /// 出问题的原始行内容
    pub raw: Option<String>,
    /// 警告说明
    pub message: String,
}

impl ConvertWarning {
    /// 解析阶段的警告（带行号和原文）
    pub fn at_line(line: usize, raw: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            raw: Some(raw.into()),
            message: message.into(),
        }
    }

    /// 校验阶段的警告（无行号）
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            line: None,
            raw: None,
            message: message.into(),
        }
    }
}

/// 校验错误（致命，任何一条都会终止任务）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("第 {id} 题题干为空")]
    EmptyBody { id: usize },

    #[error("第 {id} 题选项不足：只有 {count} 个，至少需要 2 个")]
    TooFewOptions { id: usize, count: usize },

    #[error("第 {id} 题标记的正确选项数量不合法：{marked} 个")]
    BadCorrectCount { id: usize, marked: usize },

    #[error("第 {id} 题引用了未注册的谱面资源：{name}")]
    UnknownAsset { id: usize, name: String },

    #[error("第 {line} 行的答案条目引用了不存在的题号：{reference}")]
    DanglingAnswerRef { reference: String, line: usize },

    #[error("文档中没有任何题目")]
    NoQuestions,
}

/// 工具链日志中提取的单条诊断信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// 错误描述（取自日志中 `!` 开头的行）
    pub message: String,
    /// 工具链报告的源行号（`l.<n>` 格式）
    pub line: Option<usize>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (l.{})", self.message, line),
            None => write!(f, "{}", self.message),
        }
    }
}

fn join_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("；")
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("；")
}

/// 转换任务的致命错误
#[derive(Debug, Error)]
pub enum ConvertError {
    /// 输入中没有任何章节和题目
    #[error("文档为空：没有识别到任何章节或题目")]
    EmptyDocument,

    /// 校验失败，携带全部校验错误
    #[error("校验失败：{}", join_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    /// 渲染内部错误（校验正确时不应出现，视为模板或校验器的缺陷）
    #[error("渲染内部错误：{0}")]
    Render(String),

    /// 编译失败，携带从工具链日志提取的诊断信息
    #[error("{variant} 卷编译失败：{}", join_diagnostics(.diagnostics))]
    Compilation {
        variant: Variant,
        diagnostics: Vec<Diagnostic>,
    },

    /// 编译超时（与普通编译失败区分，便于调用方决定重试策略）
    #[error("{variant} 卷第 {pass} 遍编译超时（{seconds} 秒）")]
    CompilationTimeout {
        variant: Variant,
        pass: u8,
        seconds: u64,
    },

    /// 同一任务已有转换在进行中
    #[error("任务 {task_id} 正在处理中")]
    TaskBusy { task_id: u64 },

    /// 文件系统错误（工作目录、模板复制、产物写出）
    #[error("IO 错误：{0}")]
    Io(#[from] std::io::Error),
}

/// 转换流水线的结果类型
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_cites_reference() {
        let err = ConvertError::Validation(vec![ValidationError::DanglingAnswerRef {
            reference: "99".to_string(),
            line: 12,
        }]);
        let text = err.to_string();
        assert!(text.contains("99"));
        assert!(text.contains("第 12 行"));
    }

    #[test]
    fn test_compilation_error_display_includes_line() {
        let err = ConvertError::Compilation {
            variant: Variant::Exam,
            diagnostics: vec![Diagnostic {
                message: "! Undefined control sequence.".to_string(),
                line: Some(42),
            }],
        };
        let text = err.to_string();
        assert!(text.contains("l.42"));
        assert!(text.contains("Undefined control sequence"));
    }
}
