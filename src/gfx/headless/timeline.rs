//! 模拟 GPU 的栅栏时间线
//!
//! 完成值只增不减；等待方在条件变量上睡眠，直到目标值完成、超时或队列关闭。

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::error::{Result, SyncError};

#[derive(Debug, Default)]
struct TimelineState {
    completed: u64,
    closed: bool,
}

#[derive(Debug, Default)]
struct TimelineInner {
    state: Mutex<TimelineState>,
    cond: Condvar,
}

/// 可在线程间共享的栅栏时间线
#[derive(Debug, Clone, Default)]
pub struct GpuTimeline {
    inner: Arc<TimelineInner>,
}

impl GpuTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> u64 {
        self.inner.state.lock().completed
    }

    /// 推进完成值并唤醒所有等待者，较小的值被忽略
    pub fn complete(&self, value: u64) {
        let mut state = self.inner.state.lock();
        if value > state.completed {
            state.completed = value;
            self.inner.cond.notify_all();
        }
    }

    /// 关闭时间线，之后不会再有新的完成值
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        self.inner.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// 阻塞直到完成值达到 `target`
    ///
    /// 超时返回 `Ok(false)`；时间线已关闭且目标无法达到时返回错误。
    pub fn wait_for(&self, target: u64, timeout: Option<Duration>) -> Result<bool> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.inner.state.lock();

        while state.completed < target {
            if state.closed {
                return Err(SyncError::QueueClosed {
                    target,
                    completed: state.completed,
                }
                .into());
            }

            match deadline {
                Some(deadline) => {
                    if self.inner.cond.wait_until(&mut state, deadline).timed_out() {
                        return Ok(state.completed >= target);
                    }
                }
                None => self.inner.cond.wait(&mut state),
            }
        }

        Ok(true)
    }
}
