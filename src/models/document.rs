//! 试卷文档模型
//!
//! 一份 `Document` 只属于一个转换任务：解析器构造，校验器补全编号，
//! 渲染器按变体读取两次，之后随任务结束丢弃。

use crate::models::asset::StaffAsset;
use serde::Serialize;
use std::fmt;

/// 输出变体：试题卷 / 答案卷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Exam,
    Answer,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Exam => "exam",
            Variant::Answer => "answer",
        }
    }

    /// 两个变体的固定顺序：先试题卷后答案卷
    pub fn all() -> [Variant; 2] {
        [Variant::Exam, Variant::Answer]
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Exam => write!(f, "试题"),
            Variant::Answer => write!(f, "答案"),
        }
    }
}

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// 选择题；`multiple` 表示允许多个正确选项
    Choice { multiple: bool },
    /// 填空题
    FillBlank,
    /// 简答题
    ShortAnswer,
    /// 综合/论述题
    Essay,
    /// 乐谱题
    Music,
    /// 自由题型
    Freeform,
}

/// 选择题选项
///
/// `label` 由校验器按顺序重新分配（A、B、C……），源文本里的字母不可信
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub label: char,
    pub text: String,
    pub is_correct: bool,
}

/// 题目中的谱面引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicRef {
    /// 源文本中请求的资源名（未必合法）
    pub requested: String,
    /// 校验器解析出的资源，未解析前为 None
    pub resolved: Option<StaffAsset>,
    /// 答案旋律的音符标记（结构化记号，原样传给模板）
    pub melody: Option<String>,
}

/// 综合题的要求框
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementBox {
    pub title: String,
    pub items: Vec<String>,
}

/// 题目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// 规范题号：校验器按全卷顺序从 1 分配，与源文本编号无关。
    /// 校验前为 0。
    pub id: usize,
    /// 源文本中的编号，仅用于警告信息
    pub source_number: Option<usize>,
    pub kind: QuestionKind,
    /// 题干（校验要求非空）
    pub body: String,
    /// 分值
    pub score: Option<u32>,
    /// 选择题选项
    pub options: Vec<ChoiceOption>,
    /// 答案内容（自由题型可以没有）
    pub answer: Option<String>,
    /// 答题区行数
    pub answer_lines: Option<u32>,
    /// 谱面引用
    pub music: Option<MusicRef>,
    /// 要求框
    pub requirement_box: Option<RequirementBox>,
}

impl Question {
    /// 创建尚未编号的题目
    pub fn new(kind: QuestionKind, body: impl Into<String>) -> Self {
        Self {
            id: 0,
            source_number: None,
            kind,
            body: body.into(),
            score: None,
            options: Vec::new(),
            answer: None,
            answer_lines: None,
            music: None,
            requirement_box: None,
        }
    }
}

/// 大题章节
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    pub title: String,
    /// 章节标题和第一题之间的说明文字
    pub preamble: String,
    pub questions: Vec<Question>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            preamble: String::new(),
            questions: Vec::new(),
        }
    }
}

/// 文档元数据，来自 YAML 头部或任务输入，内容不做解释、原样透传
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentMeta {
    pub title: String,
    pub school: String,
    /// 主题色（十六进制，不带 #）
    pub theme: String,
    /// 内容语言标签
    pub locale: String,
}

/// 答案表条目：`> 答案[n]: ...` 形式，引用规范题号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKeyEntry {
    /// 解析出的规范题号；数字溢出等无法解析时为 None
    pub question_id: Option<usize>,
    /// 题号在源文本中的原文，错误提示按作者写的内容引用
    pub reference: String,
    pub payload: String,
    /// 源文本行号，用于错误提示
    pub line: usize,
}

/// 整份试卷文档
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub meta: DocumentMeta,
    pub sections: Vec<Section>,
    pub answer_key: Vec<AnswerKeyEntry>,
}

impl Document {
    /// 全卷题目总数
    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    /// 按规范题号查找题目
    pub fn question_mut(&mut self, id: usize) -> Option<&mut Question> {
        self.sections
            .iter_mut()
            .flat_map(|s| s.questions.iter_mut())
            .find(|q| q.id == id)
    }
}
