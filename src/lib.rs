//! # Exam Factory
//!
//! 把 AI 产出的受限 Markdown 方言转换成排版好的试卷 PDF：
//! 同一份输入固定产出试题卷和答案卷两个变体。
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 模型层（Models）
//! - `models/` - 文档树（`Document` / `Section` / `Question`）和静态谱面资源注册表
//!
//! ### ② 转换层（Parser / Validator / Renderer）
//! - `parser/` - 方言解析：行前缀标记驱动的状态机，宽容降级
//! - `validator` - 规范编号、结构校验、答案表应用，失败即整个任务失败
//! - `renderer/` - 校验后的文档 → LaTeX 子文件，纯函数，无 IO
//!
//! ### ③ 编译层（Compiler）
//! - `compiler/` - 隔离工作目录 + 两遍外部排版引擎调用 + 日志诊断提取
//! - `Toolchain` - 排版引擎的窄接口，测试用假实现替换
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/task_runner` - 单任务流水线：解析 → 校验 → 渲染 ×2 → 编译 ×2
//! - `orchestrator/convert_service` - 并发上限与同任务互斥
//! - `orchestrator/app` - 批量入口，扫描输入目录
//!
//! ## 进度事件
//!
//! 每个任务产生一条全序事件流（`progress` 模块），外部推流层
//! 可以依赖事件不乱序、不重复。

pub mod compiler;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod renderer;
pub mod utils;
pub mod validator;

// 重新导出常用类型
pub use compiler::{compile_variant, CompileSettings, Toolchain, XeLatex};
pub use config::Config;
pub use error::{ConvertError, ConvertWarning, Result, ValidationError};
pub use models::{Document, Question, QuestionKind, Variant};
pub use orchestrator::{run_task, App, ConvertService, TaskInput, TaskOutput};
pub use parser::DialectParser;
pub use progress::{ProgressEvent, ProgressSender, Stage};
pub use renderer::{render, RenderOptions};
pub use validator::validate;
