//! 应用接口
//!
//! 宿主（winit 事件循环或无窗口循环）只通过 [`RenderApp`] 驱动应用：
//!
//! ```text
//! initialize()
//! loop {
//!     timer.tick()
//!     update(timer)   // 推进帧资源环、等待、写常量
//!     draw(timer)     // 录制、提交、Signal、呈现
//! }
//! on_resize(w, h)     // 随时，只影响投影和交换链
//! ```

use std::time::Instant;

use tracing::info;

use crate::core::error::Result;
use crate::core::timer::GameTimer;

/// 渲染应用
pub trait RenderApp {
    /// 创建 GPU 资源，返回前等待初始化上传完成
    fn initialize(&mut self) -> Result<()>;

    /// 每帧的更新阶段
    fn update(&mut self, timer: &GameTimer) -> Result<()>;

    /// 每帧的绘制阶段
    fn draw(&mut self, timer: &GameTimer) -> Result<()>;

    /// 窗口尺寸变化
    fn on_resize(&mut self, width: u32, height: u32) -> Result<()>;
}

/// 固定帧数循环的统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub frames: u64,
    pub elapsed_secs: f64,
}

impl RunStats {
    pub fn fps(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.frames as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }

    /// 平均每帧毫秒数
    pub fn mspf(&self) -> f64 {
        if self.frames > 0 {
            1000.0 * self.elapsed_secs / self.frames as f64
        } else {
            0.0
        }
    }
}

/// 无窗口宿主：连续运行 `frame_count` 帧
///
/// 任何一帧失败都立即返回错误，不重试。
pub fn run_frames<A>(app: &mut A, timer: &mut GameTimer, frame_count: u64) -> Result<RunStats>
where
    A: RenderApp + ?Sized,
{
    let start = Instant::now();
    timer.reset();

    for _ in 0..frame_count {
        timer.tick();
        app.update(timer)?;
        app.draw(timer)?;
    }

    let stats = RunStats {
        frames: frame_count,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };

    info!(
        frames = stats.frames,
        fps = %format!("{:.1}", stats.fps()),
        mspf = %format!("{:.3}", stats.mspf()),
        "Frame loop finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingApp {
        calls: Vec<&'static str>,
        fail_on_draw: Option<usize>,
    }

    impl RenderApp for CountingApp {
        fn initialize(&mut self) -> Result<()> {
            self.calls.push("init");
            Ok(())
        }

        fn update(&mut self, _timer: &GameTimer) -> Result<()> {
            self.calls.push("update");
            Ok(())
        }

        fn draw(&mut self, _timer: &GameTimer) -> Result<()> {
            let draws = self.calls.iter().filter(|c| **c == "draw").count();
            if self.fail_on_draw == Some(draws) {
                return Err(crate::core::ShapeRenderError::Runtime("boom".into()));
            }
            self.calls.push("draw");
            Ok(())
        }

        fn on_resize(&mut self, _width: u32, _height: u32) -> Result<()> {
            self.calls.push("resize");
            Ok(())
        }
    }

    #[test]
    fn test_update_before_draw() {
        let mut app = CountingApp::default();
        let mut timer = GameTimer::new();
        let stats = run_frames(&mut app, &mut timer, 2).unwrap();

        assert_eq!(stats.frames, 2);
        assert_eq!(app.calls, vec!["update", "draw", "update", "draw"]);
    }

    #[test]
    fn test_failure_stops_loop() {
        let mut app = CountingApp {
            fail_on_draw: Some(1),
            ..Default::default()
        };
        let mut timer = GameTimer::new();

        assert!(run_frames(&mut app, &mut timer, 5).is_err());
        assert_eq!(app.calls, vec!["update", "draw", "update"]);
    }

    #[test]
    fn test_run_stats() {
        let stats = RunStats { frames: 100, elapsed_secs: 2.0 };
        assert_eq!(stats.fps(), 50.0);
        assert_eq!(stats.mspf(), 20.0);
    }
}
