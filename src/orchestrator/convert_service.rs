//! 转换服务 - 并发控制层
//!
//! ## 职责
//!
//! 1. **提交入口**：接收任务输入，返回该任务的进度事件流
//! 2. **同任务互斥**：同一 `task_id` 已在处理中时立即拒绝
//! 3. **并发上限**：用 Semaphore 限制同时执行的任务数；
//!    超限的任务排队等许可，不拒绝
//! 4. **失败收口**：任何内部错误都转成该任务事件流上的 error 事件
//!
//! 拒绝只看"同一任务是否在跑"，排队只看全局并发量，两者互不混淆。

use crate::compiler::Toolchain;
use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::orchestrator::task_runner::{self, TaskInput};
use crate::progress::{self, ProgressEvent};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info};

/// 转换服务
///
/// clone 共享同一份并发状态，可以随意分发给多个提交方
pub struct ConvertService<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ConvertService<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T> {
    toolchain: T,
    config: Config,
    semaphore: Semaphore,
    active: Mutex<HashSet<u64>>,
}

/// 任务结束（成功、失败或 panic 展开）时把 task_id 移出活跃集合
struct ActiveGuard<T> {
    inner: Arc<Inner<T>>,
    task_id: u64,
}

impl<T> Drop for ActiveGuard<T> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.inner.active.lock() {
            active.remove(&self.task_id);
        }
    }
}

impl<T: Toolchain + 'static> ConvertService<T> {
    pub fn new(toolchain: T, config: Config) -> Self {
        let permits = config.max_concurrent_tasks.max(1);
        Self {
            inner: Arc::new(Inner {
                toolchain,
                config,
                semaphore: Semaphore::new(permits),
                active: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// 提交一个转换任务
    ///
    /// # 返回
    /// 该任务的进度事件接收端；同一任务已在处理中时返回
    /// [`ConvertError::TaskBusy`]，不产生任何事件
    pub fn submit(&self, input: TaskInput) -> Result<mpsc::UnboundedReceiver<ProgressEvent>> {
        let task_id = input.task_id;
        {
            let mut active = self
                .inner
                .active
                .lock()
                .map_err(|_| ConvertError::TaskBusy { task_id })?;
            if !active.insert(task_id) {
                info!("[任务 {}] ⛔ 已在处理中，拒绝重复提交", task_id);
                return Err(ConvertError::TaskBusy { task_id });
            }
        }

        let (mut progress, rx) = progress::channel(task_id);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _guard = ActiveGuard {
                inner: inner.clone(),
                task_id,
            };
            // 许可在活跃集合登记之后获取：排队中的任务同样算"在处理中"
            let _permit = match inner.semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    progress.error("服务已关闭");
                    return;
                }
            };
            match task_runner::run_task(&inner.toolchain, &inner.config, input, &mut progress).await
            {
                Ok(output) => {
                    info!(
                        "[任务 {}] 📦 产物: {} / {}",
                        task_id,
                        output.exam_pdf.display(),
                        output.answer_pdf.display()
                    );
                }
                Err(e) => {
                    error!("[任务 {}] ❌ 转换失败: {}", task_id, e);
                    progress.error(e.to_string());
                }
            }
        });
        Ok(rx)
    }

    /// 当前在处理（含排队）的任务数
    pub fn active_count(&self) -> usize {
        self.inner.active.lock().map(|a| a.len()).unwrap_or(0)
    }
}
