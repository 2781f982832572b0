//! 应用入口 - 批量编排层
//!
//! ## 职责
//!
//! 1. **批量加载**：扫描输入目录下所有待转换的 Markdown 文件
//! 2. **任务提交**：逐个提交给 [`ConvertService`]，并发由服务控制
//! 3. **事件消费**：把每个任务的进度事件以 JSON 行的形式写进日志
//! 4. **全局统计**：汇总成功 / 失败数量
//!
//! 本模块只做编排，不碰单个任务的细节。

use crate::compiler::XeLatex;
use crate::config::Config;
use crate::orchestrator::convert_service::ConvertService;
use crate::orchestrator::task_runner::TaskInput;
use crate::progress::{ProgressEvent, Stage};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    service: ConvertService<XeLatex>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let toolchain = XeLatex::new(
            config.latex_binary.clone(),
            Duration::from_secs(config.pass_timeout_secs),
        );
        let service = ConvertService::new(toolchain, config.clone());
        Self { config, service }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        log_startup(&self.config);

        let files = self.scan_input_folder()?;
        if files.is_empty() {
            warn!("⚠️ 输入目录 {} 下没有 Markdown 文件，程序结束", self.config.input_folder);
            return Ok(());
        }
        info!("✓ 找到 {} 个待转换的文件", files.len());

        std::fs::create_dir_all(&self.config.output_folder)
            .with_context(|| format!("无法创建输出目录: {}", self.config.output_folder))?;

        let mut drains = Vec::new();
        for (idx, path) in files.iter().enumerate() {
            let task_id = (idx + 1) as u64;
            let markdown = std::fs::read_to_string(path)
                .with_context(|| format!("无法读取输入文件: {}", path.display()))?;
            info!("[任务 {}] 📄 {}", task_id, path.display());

            let rx = self
                .service
                .submit(TaskInput {
                    task_id,
                    markdown,
                    ..Default::default()
                })
                .with_context(|| format!("提交任务 {} 失败", task_id))?;
            drains.push(tokio::spawn(drain_events(task_id, rx)));
        }

        let results = futures::future::join_all(drains).await;
        let mut success = 0usize;
        let mut failed = 0usize;
        for result in results {
            match result {
                Ok(true) => success += 1,
                Ok(false) => failed += 1,
                Err(e) => {
                    warn!("事件消费任务异常: {}", e);
                    failed += 1;
                }
            }
        }

        print_final_stats(success, failed, files.len(), &self.config);
        Ok(())
    }

    /// 扫描输入目录，按文件名排序保证任务编号稳定
    fn scan_input_folder(&self) -> Result<Vec<PathBuf>> {
        info!("\n📁 正在扫描 {} ...", self.config.input_folder);
        let mut files = Vec::new();
        let entries = std::fs::read_dir(&self.config.input_folder)
            .with_context(|| format!("无法读取输入目录: {}", self.config.input_folder))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// 消费一个任务的事件流，返回任务是否成功
async fn drain_events(task_id: u64, mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> bool {
    let mut succeeded = false;
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(json) => info!("[任务 {}] ▶ {}", task_id, json),
            Err(e) => warn!("[任务 {}] 事件序列化失败: {}", task_id, e),
        }
        if matches!(event.stage, Stage::Done) {
            succeeded = true;
        }
    }
    succeeded
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 试卷 PDF 转换模式");
    info!("📊 最大并发数: {}", config.max_concurrent_tasks);
    info!("📂 输入: {} → 输出: {}", config.input_folder, config.output_folder);
    info!("{}", "=".repeat(60));
}

fn print_final_stats(success: usize, failed: usize, total: usize, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部转换完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("📁 产物目录: {}", config.output_folder);
    info!("{}", "=".repeat(60));
}
