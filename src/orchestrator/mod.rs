//! 编排层
//!
//! 自底向上分三级：`task_runner` 串联单任务流水线，
//! `convert_service` 管并发与同任务互斥，`app` 做批量入口。

pub mod app;
pub mod convert_service;
pub mod task_runner;

pub use app::App;
pub use convert_service::ConvertService;
pub use task_runner::{run_task, TaskInput, TaskOutput};
