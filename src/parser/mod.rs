//! 方言解析层
//!
//! 把 AI 产出的受限 Markdown 方言解析为 `Document` 树。
//! 解析是宽容的：无法识别的内容降级为警告，只有完全空的文档才算失败。

pub mod dialect_parser;
pub mod markers;

pub use dialect_parser::DialectParser;
