//! 模板渲染层
//!
//! 把校验后的文档渲染成 LaTeX 子文件文本。渲染是输入的纯函数：
//! 同一文档、同一变体渲染两次，结果逐字节相同。

pub mod escape;
pub mod templates;

pub use escape::escape_latex;
pub use templates::{render, RenderOptions};
