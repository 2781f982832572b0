//! 任务级工作目录
//!
//! 每个（任务，变体）组合一个独立目录，互不共享。目录基于
//! `TempDir`，无论成功、失败还是 panic 展开，离开作用域即删除。

use crate::error::Result;
use crate::models::Variant;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// 在 `parent` 下创建带任务前缀的独立工作目录
    pub fn create(parent: &Path, task_id: u64, variant: Variant) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("task{}-{}-", task_id, variant.as_str()))
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// 把静态模板和谱面资源平铺复制进工作目录
    ///
    /// `main-template.tex` 改名为 `main.tex`；答案卷翻转模板里的
    /// 全局 showanswer 开关
    pub fn install_templates(&self, template_dir: &Path, variant: Variant) -> Result<()> {
        for entry in std::fs::read_dir(template_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            std::fs::copy(&path, self.path().join(&name))?;
        }

        let template = self.path().join("main-template.tex");
        let main = self.path().join("main.tex");
        if template.exists() {
            std::fs::rename(&template, &main)?;
        }
        if variant == Variant::Answer && main.exists() {
            let content = std::fs::read_to_string(&main)?;
            let flipped = content.replace(
                r"\setboolean{showanswer}{false}",
                r"\setboolean{showanswer}{true}",
            );
            std::fs::write(&main, flipped)?;
        }
        Ok(())
    }

    /// 写入渲染好的子文件（模板通过 `\subfile{content/exam}` 引用）
    pub fn write_subfile(&self, tex: &str) -> Result<()> {
        let content_dir = self.path().join("content");
        std::fs::create_dir_all(&content_dir)?;
        std::fs::write(content_dir.join("exam.tex"), tex)?;
        Ok(())
    }

    /// 编译产物的预期路径
    pub fn artifact_path(&self) -> PathBuf {
        self.path().join("main.pdf")
    }
}
