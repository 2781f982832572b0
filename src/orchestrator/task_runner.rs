//! 单任务流水线 - 任务处理层
//!
//! ## 职责
//!
//! 串联一个转换任务的完整流水线：
//!
//! 1. **解析**：方言 Markdown → `Document`
//! 2. **校验**：规范编号、结构检查、答案表应用
//! 3. **渲染**：同一份校验结果渲染试题 / 答案两个变体
//! 4. **编译**：每个变体两遍排版，产物落到输出目录
//!
//! 任一阶段失败立即终止（fail closed），不产出任何 PDF；
//! 两个变体按固定顺序串行，保证进度事件全序。

use crate::compiler::{compile_variant, CompileSettings, Toolchain};
use crate::config::Config;
use crate::error::{ConvertError, ConvertWarning, Result};
use crate::models::Variant;
use crate::parser::DialectParser;
use crate::progress::ProgressSender;
use crate::renderer::{render, RenderOptions};
use crate::validator::validate;
use std::path::PathBuf;
use tracing::{info, warn};

/// 一个转换任务的输入
///
/// 元数据字段非空时覆盖文档 YAML 头部里的同名项
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    pub task_id: u64,
    /// 方言 Markdown 原文
    pub markdown: String,
    pub title: String,
    pub school: String,
    /// 主题色（十六进制，不带 #）
    pub theme: String,
    pub locale: String,
}

/// 任务成功的产出
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub exam_pdf: PathBuf,
    pub answer_pdf: PathBuf,
    /// 解析与校验阶段累积的非致命警告
    pub warnings: Vec<ConvertWarning>,
}

/// 执行一个完整的转换任务
///
/// # 参数
/// - `toolchain`: 排版工具链
/// - `input`: 任务输入（Markdown 原文 + 元数据覆盖项）
/// - `progress`: 任务专属的进度发送端
///
/// # 返回
/// 两个 PDF 的路径和累积警告；失败时调用方负责发出 error 事件
pub async fn run_task<T: Toolchain>(
    toolchain: &T,
    config: &Config,
    input: TaskInput,
    progress: &mut ProgressSender,
) -> Result<TaskOutput> {
    let task_id = input.task_id;
    info!("[任务 {}] 📄 开始转换（{} 字节）", task_id, input.markdown.len());

    // 1. 解析
    progress.parsing();
    let parser = DialectParser::new();
    let (mut doc, mut warnings) = parser.parse(&input.markdown)?;
    apply_meta_overrides(&mut doc.meta, &input, config);

    // 2. 校验
    let doc = validate(doc, &mut warnings).map_err(ConvertError::Validation)?;
    for warning in &warnings {
        match &warning.raw {
            Some(raw) => warn!(
                "[任务 {}] ⚠️ {}（原文: {}）",
                task_id,
                warning.message,
                crate::utils::logging::truncate_text(raw, 40)
            ),
            None => warn!("[任务 {}] ⚠️ {}", task_id, warning.message),
        }
    }
    info!(
        "[任务 {}] ✓ 解析校验通过：{} 个章节，{} 道题",
        task_id,
        doc.sections.len(),
        doc.question_count()
    );

    // 3. 渲染两个变体
    let opts = RenderOptions::from_config(config);
    let mut rendered = Vec::with_capacity(2);
    for variant in Variant::all() {
        progress.rendering(variant);
        rendered.push((variant, render(&doc, variant, &opts)?));
    }

    // 4. 逐变体两遍编译
    let settings = CompileSettings {
        template_dir: PathBuf::from(&config.template_dir),
        scratch_dir: PathBuf::from(&config.scratch_dir),
    };
    for (variant, tex) in &rendered {
        compile_variant(
            toolchain,
            &settings,
            task_id,
            *variant,
            tex,
            &pdf_path(config, task_id, *variant),
            progress,
        )
        .await?;
    }

    progress.done();
    info!("[任务 {}] ✅ 转换完成", task_id);

    Ok(TaskOutput {
        exam_pdf: pdf_path(config, task_id, Variant::Exam),
        answer_pdf: pdf_path(config, task_id, Variant::Answer),
        warnings,
    })
}

/// 任务输入的非空元数据覆盖文档头部；主题色缺失时落到配置默认值
fn apply_meta_overrides(meta: &mut crate::models::DocumentMeta, input: &TaskInput, config: &Config) {
    if !input.title.is_empty() {
        meta.title = input.title.clone();
    }
    if !input.school.is_empty() {
        meta.school = input.school.clone();
    }
    if !input.theme.is_empty() {
        meta.theme = input.theme.clone();
    }
    if !input.locale.is_empty() {
        meta.locale = input.locale.clone();
    }
    if meta.theme.is_empty() {
        meta.theme = config.default_theme.clone();
    }
}

/// 产物路径：`{output_folder}/{task_id}_{variant}.pdf`
pub fn pdf_path(config: &Config, task_id: u64, variant: Variant) -> PathBuf {
    PathBuf::from(&config.output_folder).join(format!("{}_{}.pdf", task_id, variant.as_str()))
}
