//! 排版工具链的窄接口
//!
//! 驱动只依赖"在工作目录里跑一遍、拿到成败和日志"这一个契约：
//! 命令、工作目录、超时。真实实现调用 xelatex 子进程，
//! 测试用确定性的假实现替换。

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// 单遍编译的结果
#[derive(Debug, Clone)]
pub struct PassOutcome {
    /// 进程是否以 0 退出
    pub success: bool,
    /// 标准输出 + 标准错误合并的日志文本
    pub log: String,
}

/// 工具链层错误；变体和遍数等上下文由驱动补充
#[derive(Debug, Error)]
pub enum PassError {
    #[error("编译进程超时（{seconds} 秒）")]
    Timeout { seconds: u64 },

    #[error("无法运行编译进程: {0}")]
    Io(#[from] std::io::Error),
}

/// 排版工具链接口
pub trait Toolchain: Send + Sync {
    /// 在 `work_dir` 中对 `main_tex` 执行一遍编译
    fn run_pass(
        &self,
        work_dir: &Path,
        main_tex: &str,
    ) -> impl Future<Output = Result<PassOutcome, PassError>> + Send;
}

/// 真实的 XeLaTeX 工具链
#[derive(Debug, Clone)]
pub struct XeLatex {
    binary: String,
    pass_timeout: Duration,
}

impl XeLatex {
    pub fn new(binary: impl Into<String>, pass_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            pass_timeout,
        }
    }
}

impl Toolchain for XeLatex {
    async fn run_pass(&self, work_dir: &Path, main_tex: &str) -> Result<PassOutcome, PassError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-interaction=nonstopmode")
            .arg(main_tex)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 超时丢弃 future 时连带终止外部进程
            .kill_on_drop(true);

        let seconds = self.pass_timeout.as_secs();
        match tokio::time::timeout(self.pass_timeout, cmd.output()).await {
            Ok(output) => {
                let output = output?;
                debug!("编译进程退出: {}", output.status);
                let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
                log.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(PassOutcome {
                    success: output.status.success(),
                    log,
                })
            }
            Err(_) => Err(PassError::Timeout { seconds }),
        }
    }
}
