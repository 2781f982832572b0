//! 两遍编译驱动
//!
//! 页码、页眉里的章节号等交叉引用要靠第一遍产出的辅助数据，
//! 第二遍才解析得到，所以每个变体固定跑两遍。状态推进：
//!
//! ```text
//! Prepared → Pass1Running → Pass1Done → Pass2Running → Pass2Done/Failed
//! ```
//!
//! 第一遍失败直接终止，不跑第二遍。日志匹配到瞬态特征（锁竞争等）
//! 时，整个两遍序列重试一次；内容/语法错误绝不重试。

use crate::compiler::toolchain::{PassError, Toolchain};
use crate::compiler::workdir::WorkDir;
use crate::error::{ConvertError, Diagnostic, Result};
use crate::models::Variant;
use crate::progress::ProgressSender;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// 已知的瞬态失败特征，命中任意一条允许重试
const TRANSIENT_SIGNATURES: &[&str] = &[
    "Resource temporarily unavailable",
    "could not create lock file",
    "Another instance is running",
    "Interrupted system call",
];

/// 编译驱动需要的路径配置
#[derive(Debug, Clone)]
pub struct CompileSettings {
    /// 静态模板与谱面资源目录
    pub template_dir: PathBuf,
    /// 工作目录的父目录
    pub scratch_dir: PathBuf,
}

/// 两遍序列的失败分类
enum TwoPassFailure {
    /// 不可重试：内容错误、超时、IO
    Fatal(ConvertError),
    /// 可重试一次的瞬态失败
    Transient { pass: u8, diagnostics: Vec<Diagnostic> },
}

/// 编译一个变体，产物写到 `output_path`
///
/// 工作目录在所有退出路径上都会被清理；瞬态失败重试一次，
/// 重试时进度事件不会重复发出。
pub async fn compile_variant<T: Toolchain>(
    toolchain: &T,
    settings: &CompileSettings,
    task_id: u64,
    variant: Variant,
    tex: &str,
    output_path: &Path,
    progress: &mut ProgressSender,
) -> Result<()> {
    let mut retried = false;
    loop {
        match run_two_passes(toolchain, settings, task_id, variant, tex, progress).await {
            Ok(workdir) => {
                let artifact = workdir.artifact_path();
                if !artifact.exists() {
                    return Err(ConvertError::Compilation {
                        variant,
                        diagnostics: vec![Diagnostic {
                            message: "编译进程正常退出但没有产出 PDF".to_string(),
                            line: None,
                        }],
                    });
                }
                if let Some(parent) = output_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&artifact, output_path)?;
                info!("[任务 {}] ✓ {} 卷编译完成", task_id, variant);
                return Ok(());
            }
            Err(TwoPassFailure::Fatal(err)) => return Err(err),
            Err(TwoPassFailure::Transient { pass, diagnostics }) => {
                if retried {
                    return Err(ConvertError::Compilation { variant, diagnostics });
                }
                retried = true;
                warn!(
                    "[任务 {}] {} 卷第 {} 遍命中瞬态失败，重试整个两遍序列",
                    task_id, variant, pass
                );
            }
        }
    }
}

async fn run_two_passes<T: Toolchain>(
    toolchain: &T,
    settings: &CompileSettings,
    task_id: u64,
    variant: Variant,
    tex: &str,
    progress: &mut ProgressSender,
) -> std::result::Result<WorkDir, TwoPassFailure> {
    let workdir = WorkDir::create(&settings.scratch_dir, task_id, variant)
        .map_err(TwoPassFailure::Fatal)?;
    workdir
        .install_templates(&settings.template_dir, variant)
        .map_err(TwoPassFailure::Fatal)?;
    workdir.write_subfile(tex).map_err(TwoPassFailure::Fatal)?;

    for pass in 1..=2u8 {
        progress.compiling(variant, pass);
        let outcome = toolchain
            .run_pass(workdir.path(), "main.tex")
            .await
            .map_err(|e| {
                TwoPassFailure::Fatal(match e {
                    PassError::Timeout { seconds } => ConvertError::CompilationTimeout {
                        variant,
                        pass,
                        seconds,
                    },
                    PassError::Io(err) => ConvertError::Io(err),
                })
            })?;

        if !outcome.success {
            let diagnostics = parse_log(&outcome.log);
            if is_transient(&outcome.log) {
                return Err(TwoPassFailure::Transient { pass, diagnostics });
            }
            return Err(TwoPassFailure::Fatal(ConvertError::Compilation {
                variant,
                diagnostics,
            }));
        }
    }
    Ok(workdir)
}

fn line_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^l\.(\d+)").expect("行号正则非法"))
}

/// 从工具链日志提取诊断信息
///
/// TeX 系工具链的错误行以 `!` 开头，随后几行里的 `l.<n>` 给出源行号
pub fn parse_log(log: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let lines: Vec<&str> = log.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        let Some(message) = line.strip_prefix('!') else {
            continue;
        };
        let mut line_no = None;
        for follow in lines.iter().skip(idx + 1).take(5) {
            if let Some(cap) = line_ref_re().captures(follow) {
                line_no = cap[1].parse().ok();
                break;
            }
        }
        diagnostics.push(Diagnostic {
            message: message.trim().to_string(),
            line: line_no,
        });
    }

    // 没有标准格式的错误行时，保留日志尾部作为兜底诊断
    if diagnostics.is_empty() && !log.trim().is_empty() {
        let tail: Vec<&str> = lines.iter().rev().take(5).rev().copied().collect();
        diagnostics.push(Diagnostic {
            message: tail.join(" | "),
            line: None,
        });
    }
    diagnostics
}

fn is_transient(log: &str) -> bool {
    TRANSIENT_SIGNATURES.iter().any(|sig| log.contains(sig))
}
