//! 程序配置
//!
//! 所有可调参数集中在这里，核心模块只接收已解析好的值，
//! 不在内部读取环境变量。

use anyhow::{Context, Result};
use serde::Deserialize;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时处理的任务数量上限
    pub max_concurrent_tasks: usize,
    /// 待转换 Markdown 文件存放目录
    pub input_folder: String,
    /// PDF 产物输出目录
    pub output_folder: String,
    /// LaTeX 模板与静态谱面资源目录
    pub template_dir: String,
    /// 任务工作目录的父目录（每个任务在其下创建独立临时目录）
    pub scratch_dir: String,
    /// 排版引擎可执行文件名
    pub latex_binary: String,
    /// 单遍编译的超时时间（秒）
    pub pass_timeout_secs: u64,
    /// 填空下划线默认宽度（单位 mm）
    pub blank_default_width: u32,
    /// 填空下划线宽度：每个预期答案字符对应的宽度（单位 mm）
    pub blank_per_char: u32,
    /// 填空下划线最大宽度（单位 mm）
    pub blank_max_width: u32,
    /// 简答/综合题默认答题行数
    pub default_answer_lines: u32,
    /// 默认主题色（十六进制，不带 #）
    pub default_theme: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 2,
            input_folder: "input_md".to_string(),
            output_folder: "output_pdf".to_string(),
            template_dir: "latex_templates".to_string(),
            scratch_dir: "work".to_string(),
            latex_binary: "xelatex".to_string(),
            pass_timeout_secs: 120,
            blank_default_width: 20,
            blank_per_char: 6,
            blank_max_width: 80,
            default_answer_lines: 4,
            default_theme: "4e9b86".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_tasks: std::env::var("MAX_CONCURRENT_TASKS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_tasks),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(default.input_folder),
            output_folder: std::env::var("OUTPUT_FOLDER").unwrap_or(default.output_folder),
            template_dir: std::env::var("TEMPLATE_DIR").unwrap_or(default.template_dir),
            scratch_dir: std::env::var("SCRATCH_DIR").unwrap_or(default.scratch_dir),
            latex_binary: std::env::var("LATEX_BINARY").unwrap_or(default.latex_binary),
            pass_timeout_secs: std::env::var("PASS_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.pass_timeout_secs),
            blank_default_width: default.blank_default_width,
            blank_per_char: default.blank_per_char,
            blank_max_width: default.blank_max_width,
            default_answer_lines: default.default_answer_lines,
            default_theme: std::env::var("DEFAULT_THEME").unwrap_or(default.default_theme),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 从 TOML 配置文件加载
    pub fn from_toml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("无法解析配置文件: {}", path))?;
        Ok(config)
    }
}
