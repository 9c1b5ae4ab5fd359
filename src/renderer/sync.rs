//! CPU/GPU 同步模块
//!
//! 一个全局单调递增的栅栏计数器，配合每个帧资源上记录的"最后提交栅栏值"，
//! 决定 CPU 是否可以覆写某个帧资源。
//!
//! # 帧资源状态机
//!
//! ```text
//! FREE ──begin_recording──▶ RECORDING ──submit_and_stamp──▶ SUBMITTED
//!   ▲                                                            │
//!   └────────────────────── await_if_busy ◀──────────────────────┘
//! ```
//!
//! - `await_if_busy` 是整个帧循环中唯一的阻塞点：一次性等待确切的目标值，不轮询
//! - 提交顺序即 Signal 顺序，所以同一个槽位后写入的栅栏值不会比先前的小
//! - 所有槽位共用一个计数器，不存在每槽位独立的栅栏

use std::time::Duration;

use tracing::{debug, trace};

use crate::core::error::{Result, SyncError};
use crate::gfx::device::SubmissionQueue;

/// Fence 值
///
/// 用于CPU-GPU同步的单调递增值。`0` 表示"从未提交"。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FenceValue(u64);

impl FenceValue {
    /// 从未提交过的槽位持有的值
    pub const NEVER_SUBMITTED: FenceValue = FenceValue(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// 下一个Fence值
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn is_never_submitted(&self) -> bool {
        self.0 == 0
    }
}

/// 帧资源槽位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// GPU 不再读取，CPU 可以覆写
    Free,
    /// CPU 正在写入常量和录制命令
    Recording,
    /// 已提交，GPU 可能仍在读取
    Submitted,
}

/// 单个帧资源槽位的同步记录
#[derive(Debug, Clone)]
pub struct SlotTracker {
    index: usize,
    last_fence: FenceValue,
    state: SlotState,
}

impl SlotTracker {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            last_fence: FenceValue::NEVER_SUBMITTED,
            state: SlotState::Free,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// 该槽位最近一次提交对应的栅栏值
    pub fn last_fence(&self) -> FenceValue {
        self.last_fence
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    /// 进入录制状态，此后可以写入常量缓冲区
    pub fn begin_recording(&mut self) {
        debug_assert_eq!(
            self.state,
            SlotState::Free,
            "frame resource {} reused before its fence was awaited",
            self.index
        );
        self.state = SlotState::Recording;
    }

    /// 写入前的检查：只有录制中的槽位可以写
    #[inline]
    pub fn debug_assert_writable(&self) {
        debug_assert_eq!(
            self.state,
            SlotState::Recording,
            "write to frame resource {} outside of recording (fence {})",
            self.index,
            self.last_fence.value()
        );
    }

    fn stamp(&mut self, value: FenceValue) {
        debug_assert!(value > self.last_fence);
        self.last_fence = value;
        self.state = SlotState::Submitted;
    }

    fn release(&mut self) {
        self.state = SlotState::Free;
    }
}

/// 栅栏门
///
/// 持有唯一的 CPU 侧栅栏计数器，显式传递给需要它的地方。
#[derive(Debug)]
pub struct FenceGate {
    current: FenceValue,
    timeout: Option<Duration>,
}

impl FenceGate {
    /// 创建栅栏门
    ///
    /// `timeout` 为 `None` 时无限等待；超时视为设备丢失。
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            current: FenceValue::NEVER_SUBMITTED,
            timeout,
        }
    }

    /// 最近一次排队的栅栏值
    pub fn current_value(&self) -> FenceValue {
        self.current
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 如果 GPU 还没有完成该槽位上次提交的工作，阻塞等待
    ///
    /// 返回后槽位处于 `Free` 状态，可以安全覆写。
    pub fn await_if_busy<Q>(&self, queue: &Q, slot: &mut SlotTracker) -> Result<()>
    where
        Q: SubmissionQueue + ?Sized,
    {
        let target = slot.last_fence();

        if !target.is_never_submitted() {
            let completed = queue.completed_value();
            if completed < target {
                debug!(
                    frame_index = slot.index(),
                    fence_value = target.value(),
                    completed = completed.value(),
                    "Waiting for GPU to release frame resource"
                );
                self.wait(queue, target)?;
            } else {
                trace!(
                    frame_index = slot.index(),
                    fence_value = target.value(),
                    completed = completed.value(),
                    "Frame resource already released"
                );
            }

            debug_assert!(queue.completed_value() >= target);
        }

        slot.release();
        Ok(())
    }

    /// 提交已录制的命令列表，计数器加一并 Signal，把新值记录到槽位上
    ///
    /// 任何一步失败都直接返回错误，槽位的栅栏值保持不变。
    pub fn submit_and_stamp<Q>(&mut self, queue: &mut Q, slot: &mut SlotTracker) -> Result<FenceValue>
    where
        Q: SubmissionQueue + ?Sized,
    {
        slot.debug_assert_writable();

        queue.execute_command_list()?;

        let next = self.current.next();
        queue.signal(next)?;
        self.current = next;
        slot.stamp(next);

        trace!(
            frame_index = slot.index(),
            fence_value = next.value(),
            "Frame submitted"
        );

        Ok(next)
    }

    /// Signal 一个新值并等待 GPU 完成之前排队的全部工作
    ///
    /// 用于初始化上传和关闭前，帧循环中不调用。
    pub fn flush<Q>(&mut self, queue: &mut Q) -> Result<FenceValue>
    where
        Q: SubmissionQueue + ?Sized,
    {
        let next = self.current.next();
        queue.signal(next)?;
        self.current = next;

        if queue.completed_value() < next {
            debug!(fence_value = next.value(), "Flushing command queue");
            self.wait(queue, next)?;
        }

        Ok(next)
    }

    fn wait<Q>(&self, queue: &Q, target: FenceValue) -> Result<()>
    where
        Q: SubmissionQueue + ?Sized,
    {
        if queue.wait_for_value(target, self.timeout)? {
            return Ok(());
        }

        let timeout_ms = self.timeout.map(|t| t.as_millis() as u64).unwrap_or(0);
        Err(SyncError::FenceTimeout {
            target: target.value(),
            completed: queue.completed_value().value(),
            timeout_ms,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{GraphicsError, ShapeRenderError};
    use std::cell::Cell;

    /// 只在测试中使用的队列：完成值由测试直接设置
    #[derive(Default)]
    struct ScriptedQueue {
        completed: Cell<u64>,
        signaled: Vec<u64>,
        executed: usize,
        fail_execute: bool,
        /// wait_for_value 被调用时把完成值推进到这里；None 表示超时
        complete_on_wait: Option<u64>,
        waits: Cell<usize>,
    }

    impl SubmissionQueue for ScriptedQueue {
        fn execute_command_list(&mut self) -> Result<()> {
            if self.fail_execute {
                return Err(GraphicsError::Submission("device removed".into()).into());
            }
            self.executed += 1;
            Ok(())
        }

        fn signal(&mut self, value: FenceValue) -> Result<()> {
            self.signaled.push(value.value());
            Ok(())
        }

        fn completed_value(&self) -> FenceValue {
            FenceValue::new(self.completed.get())
        }

        fn wait_for_value(&self, target: FenceValue, _timeout: Option<Duration>) -> Result<bool> {
            self.waits.set(self.waits.get() + 1);
            match self.complete_on_wait {
                Some(v) => {
                    self.completed.set(v);
                    Ok(v >= target.value())
                }
                None => Ok(false),
            }
        }
    }

    fn recording_slot(index: usize) -> SlotTracker {
        let mut slot = SlotTracker::new(index);
        slot.begin_recording();
        slot
    }

    #[test]
    fn test_fence_value_ordering() {
        let f1 = FenceValue::new(1);
        let f2 = f1.next();
        assert!(f1 < f2);
        assert_eq!(f2.value(), 2);
        assert!(FenceValue::default().is_never_submitted());
    }

    #[test]
    fn test_submit_increments_by_one() {
        let mut gate = FenceGate::new(None);
        let mut queue = ScriptedQueue::default();

        let mut values = Vec::new();
        for i in 0..5 {
            let mut slot = recording_slot(i % 3);
            values.push(gate.submit_and_stamp(&mut queue, &mut slot).unwrap().value());
            assert_eq!(slot.state(), SlotState::Submitted);
            assert_eq!(slot.last_fence().value(), values[i]);
        }

        assert_eq!(values, vec![1, 2, 3, 4, 5]);
        assert_eq!(queue.signaled, values);
        assert_eq!(queue.executed, 5);
        assert_eq!(gate.current_value().value(), 5);
    }

    #[test]
    fn test_failed_submit_leaves_fence_unset() {
        let mut gate = FenceGate::new(None);
        let mut queue = ScriptedQueue {
            fail_execute: true,
            ..Default::default()
        };
        let mut slot = recording_slot(0);

        let err = gate.submit_and_stamp(&mut queue, &mut slot).unwrap_err();
        assert!(matches!(err, ShapeRenderError::Graphics(GraphicsError::Submission(_))));
        assert!(slot.last_fence().is_never_submitted());
        assert_eq!(gate.current_value().value(), 0);
        assert!(queue.signaled.is_empty());
    }

    #[test]
    fn test_never_submitted_slot_does_not_wait() {
        let gate = FenceGate::new(None);
        let queue = ScriptedQueue::default();
        let mut slot = SlotTracker::new(0);

        gate.await_if_busy(&queue, &mut slot).unwrap();
        assert_eq!(queue.waits.get(), 0);
        assert_eq!(slot.state(), SlotState::Free);
    }

    #[test]
    fn test_completed_slot_does_not_wait() {
        let mut gate = FenceGate::new(None);
        let mut queue = ScriptedQueue::default();
        let mut slot = recording_slot(0);
        gate.submit_and_stamp(&mut queue, &mut slot).unwrap();

        queue.completed.set(1);
        gate.await_if_busy(&queue, &mut slot).unwrap();
        assert_eq!(queue.waits.get(), 0);
        assert_eq!(slot.state(), SlotState::Free);
    }

    #[test]
    fn test_busy_slot_waits_for_exact_value() {
        let mut gate = FenceGate::new(None);
        let mut queue = ScriptedQueue {
            complete_on_wait: Some(2),
            ..Default::default()
        };

        let mut a = recording_slot(0);
        let mut b = recording_slot(1);
        gate.submit_and_stamp(&mut queue, &mut a).unwrap();
        gate.submit_and_stamp(&mut queue, &mut b).unwrap();

        gate.await_if_busy(&queue, &mut b).unwrap();
        assert_eq!(queue.waits.get(), 1);
        assert!(queue.completed_value() >= b.last_fence());
        assert_eq!(b.state(), SlotState::Free);
    }

    #[test]
    fn test_wait_timeout_is_device_lost() {
        let mut gate = FenceGate::new(Some(Duration::from_millis(10)));
        let mut queue = ScriptedQueue::default();
        let mut slot = recording_slot(2);
        gate.submit_and_stamp(&mut queue, &mut slot).unwrap();

        let err = gate.await_if_busy(&queue, &mut slot).unwrap_err();
        assert!(err.is_device_lost());
        match err {
            ShapeRenderError::Sync(SyncError::FenceTimeout { target, completed, timeout_ms }) => {
                assert_eq!(target, 1);
                assert_eq!(completed, 0);
                assert_eq!(timeout_ms, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(slot.state(), SlotState::Submitted);
    }

    #[test]
    fn test_flush_signals_new_value() {
        let mut gate = FenceGate::new(None);
        let mut queue = ScriptedQueue {
            complete_on_wait: Some(1),
            ..Default::default()
        };

        let value = gate.flush(&mut queue).unwrap();
        assert_eq!(value.value(), 1);
        assert_eq!(queue.signaled, vec![1]);
        assert_eq!(queue.waits.get(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "reused before its fence was awaited")]
    fn test_recording_submitted_slot_panics() {
        let mut gate = FenceGate::new(None);
        let mut queue = ScriptedQueue::default();
        let mut slot = recording_slot(0);
        gate.submit_and_stamp(&mut queue, &mut slot).unwrap();

        slot.begin_recording();
    }
}
