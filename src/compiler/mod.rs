//! 编译层
//!
//! 把渲染好的 LaTeX 文本变成 PDF：隔离的任务工作目录 + 两遍
//! 外部排版引擎调用 + 日志诊断提取。外部引擎被收窄成
//! [`Toolchain`] 一个接口，测试用假工具链即可覆盖全部驱动逻辑。

pub mod driver;
pub mod toolchain;
pub mod workdir;

pub use driver::{compile_variant, CompileSettings};
pub use toolchain::{PassError, PassOutcome, Toolchain, XeLatex};
pub use workdir::WorkDir;
