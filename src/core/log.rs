//! 日志系统模块
//!
//! 基于 `tracing`。帧循环中的栅栏/环形缓冲流量使用 `trace` 级别，
//! 阻塞等待使用 `debug` 级别，启动和关闭使用 `info` 级别。
//!
//! 无窗口模式下模拟 GPU 在独立线程 `headless-gpu` 上完成栅栏，
//! 所以输出中总是带上线程名。
//!
//! ```no_run
//! use shape_render::core::config::LogLevel;
//! use shape_render::core::log;
//!
//! log::init_logger(LogLevel::Info, false, None).expect("logger");
//! tracing::info!(frame_index = 0, fence_value = 1, "Frame submitted");
//! ```

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::config::LogLevel;
use super::error::{Result, ShapeRenderError};

const DEFAULT_LOG_FILE: &str = "shape_render.log";

/// 初始化全局日志订阅者
///
/// `RUST_LOG` 存在时优先于 `level`。重复初始化返回 [`ShapeRenderError::Log`]。
pub fn init_logger(level: LogLevel, file_output: bool, log_file_path: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_ansi(true);

    let file_layer = file_output.then(|| {
        let (directory, filename) = split_log_path(log_file_path.unwrap_or(DEFAULT_LOG_FILE));
        fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(RollingFileAppender::new(Rotation::DAILY, directory, filename))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ShapeRenderError::Log(e.to_string()))
}

/// 拆分为（目录，文件名）
fn split_log_path(log_path: &str) -> (&Path, &str) {
    let path = Path::new(log_path);
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let filename = path.file_name().and_then(|s| s.to_str()).unwrap_or(DEFAULT_LOG_FILE);
    (directory, filename)
}

impl LogLevel {
    /// `EnvFilter` 使用的过滤字符串
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_strings() {
        assert_eq!(LogLevel::Trace.as_filter(), "trace");
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
    }

    #[test]
    fn test_split_log_path() {
        assert_eq!(split_log_path("logs/frames.log"), (Path::new("logs"), "frames.log"));
        assert_eq!(split_log_path("frames.log"), (Path::new("."), "frames.log"));
    }
}
