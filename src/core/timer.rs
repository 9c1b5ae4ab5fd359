//! 游戏计时器
//!
//! 提供帧间隔（delta time）和总运行时间（不含暂停时间），
//! 写入每帧的 Pass 常量中。

use std::time::{Duration, Instant};

/// 帧计时器
///
/// `reset` 在进入主循环前调用，`tick` 每帧调用一次。
/// `stop` / `start` 用于暂停和恢复（例如窗口最小化时），暂停期间不计入总时间。
#[derive(Debug, Clone)]
pub struct GameTimer {
    base_time: Instant,
    paused_time: Duration,
    stop_time: Option<Instant>,
    prev_time: Instant,
    curr_time: Instant,
    delta_time: Duration,
}

impl GameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            base_time: now,
            paused_time: Duration::ZERO,
            stop_time: None,
            prev_time: now,
            curr_time: now,
            delta_time: Duration::ZERO,
        }
    }

    /// 总运行时间（秒），不包括暂停时间
    pub fn total_time(&self) -> f32 {
        let end = self.stop_time.unwrap_or(self.curr_time);
        end.saturating_duration_since(self.base_time)
            .saturating_sub(self.paused_time)
            .as_secs_f32()
    }

    /// 上一帧到当前帧的间隔（秒）
    pub fn delta_time(&self) -> f32 {
        self.delta_time.as_secs_f32()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_time.is_some()
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub(crate) fn reset_at(&mut self, now: Instant) {
        self.base_time = now;
        self.prev_time = now;
        self.curr_time = now;
        self.paused_time = Duration::ZERO;
        self.stop_time = None;
        self.delta_time = Duration::ZERO;
    }

    pub(crate) fn start_at(&mut self, now: Instant) {
        if let Some(stop_time) = self.stop_time.take() {
            self.paused_time += now.saturating_duration_since(stop_time);
            self.prev_time = now;
        }
    }

    pub(crate) fn stop_at(&mut self, now: Instant) {
        if self.stop_time.is_none() {
            self.stop_time = Some(now);
        }
    }

    pub(crate) fn tick_at(&mut self, now: Instant) {
        if self.stop_time.is_some() {
            self.delta_time = Duration::ZERO;
            return;
        }

        self.curr_time = now;
        self.delta_time = now.saturating_duration_since(self.prev_time);
        self.prev_time = now;
    }
}

impl Default for GameTimer {
    fn default() -> Self {
        Self::new()
    }
}
