//! 配置管理模块
//!
//! 提供渲染器配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "ShapeRender"
//!
//! [graphics]
//! backend = "headless"  # 或 "dx12"
//! vsync = true
//!
//! [frames]
//! frame_resources = 3       # 环形缓冲深度 N
//! fence_timeout_ms = 5000   # 可选，省略表示无限等待
//!
//! [headless]
//! frame_count = 300
//! gpu_latency_ms = 4
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::error::{ConfigError, Result};

/// 渲染器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 帧资源环配置
    #[serde(default)]
    pub frames: FrameConfig,

    /// 轨道相机配置
    #[serde(default)]
    pub camera: CameraConfig,

    /// 无窗口模拟设备配置
    #[serde(default)]
    pub headless: HeadlessConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,

    /// 是否可调整大小
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 图形后端选择
    #[serde(default = "default_backend")]
    pub backend: GraphicsBackend,

    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 清屏颜色
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
}

/// 图形后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsBackend {
    /// DirectX 12 后端（仅 Windows）
    Dx12,
    /// 无窗口模拟 GPU
    Headless,
}

/// 帧资源环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    /// 帧资源数量 N
    #[serde(default = "default_frame_resources")]
    pub frame_resources: usize,

    /// 栅栏等待超时（毫秒），`None` 表示无限等待
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fence_timeout_ms: Option<u64>,
}

/// 轨道相机配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// 方位角（弧度）
    #[serde(default = "default_theta")]
    pub theta: f32,

    /// 极角（弧度）
    #[serde(default = "default_phi")]
    pub phi: f32,

    /// 轨道半径
    #[serde(default = "default_radius")]
    pub radius: f32,

    /// 垂直视场角（度）
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,

    /// 近裁剪面
    #[serde(default = "default_near_z")]
    pub near_z: f32,

    /// 远裁剪面
    #[serde(default = "default_far_z")]
    pub far_z: f32,
}

/// 无窗口模拟设备配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlessConfig {
    /// 运行的帧数
    #[serde(default = "default_frame_count")]
    pub frame_count: u64,

    /// 模拟 GPU 执行一帧所需时间（毫秒）
    #[serde(default = "default_gpu_latency")]
    pub gpu_latency_ms: u64,

    /// 模拟渲染目标宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 模拟渲染目标高度
    #[serde(default = "default_height")]
    pub height: u32,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_title() -> String { "ShapeRender".to_string() }
fn default_resizable() -> bool { true }
fn default_backend() -> GraphicsBackend {
    if cfg!(target_os = "windows") {
        GraphicsBackend::Dx12
    } else {
        GraphicsBackend::Headless
    }
}
fn default_vsync() -> bool { true }
fn default_clear_color() -> [f32; 4] { [0.690, 0.769, 0.871, 1.0] }
fn default_frame_resources() -> usize { 3 }
fn default_theta() -> f32 { 1.5 * std::f32::consts::PI }
fn default_phi() -> f32 { 0.2 * std::f32::consts::PI }
fn default_radius() -> f32 { 15.0 }
fn default_fov() -> f32 { 45.0 }
fn default_near_z() -> f32 { 1.0 }
fn default_far_z() -> f32 { 1000.0 }
fn default_frame_count() -> u64 { 300 }
fn default_gpu_latency() -> u64 { 4 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "shape_render.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            vsync: default_vsync(),
            clear_color: default_clear_color(),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_resources: default_frame_resources(),
            fence_timeout_ms: None,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            theta: default_theta(),
            phi: default_phi(),
            radius: default_radius(),
            fov_degrees: default_fov(),
            near_z: default_near_z(),
            far_z: default_far_z(),
        }
    }
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            frame_count: default_frame_count(),
            gpu_latency_ms: default_gpu_latency(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl FrameConfig {
    /// 栅栏等待超时
    pub fn fence_timeout(&self) -> Option<Duration> {
        self.fence_timeout_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// 从配置文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--dx12` / `--headless`: 选择后端
    /// - `--width <value>` / `--height <value>`: 窗口尺寸
    /// - `--frame-resources <value>`: 帧资源数量
    /// - `--frames <value>`: 无窗口模式运行的帧数
    /// - `--fence-timeout-ms <value>`: 栅栏等待超时
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--dx12") {
            self.graphics.backend = GraphicsBackend::Dx12;
        }

        if args.iter().any(|a| a == "--headless") {
            self.graphics.backend = GraphicsBackend::Headless;
        }

        if let Some(width) = arg_value(&args, "--width") {
            self.window.width = width;
            self.headless.width = width;
        }

        if let Some(height) = arg_value(&args, "--height") {
            self.window.height = height;
            self.headless.height = height;
        }

        if let Some(count) = arg_value(&args, "--frame-resources") {
            self.frames.frame_resources = count;
        }

        if let Some(frames) = arg_value(&args, "--frames") {
            self.headless.frame_count = frames;
        }

        if let Some(timeout) = arg_value(&args, "--fence-timeout-ms") {
            self.frames.fence_timeout_ms = Some(timeout);
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(invalid("window.width/height", "Window dimensions must be greater than 0"));
        }

        if self.headless.width == 0 || self.headless.height == 0 {
            return Err(invalid("headless.width/height", "Render target dimensions must be greater than 0"));
        }

        if !(1..=16).contains(&self.frames.frame_resources) {
            return Err(invalid("frames.frame_resources", "Frame resource count must be between 1 and 16"));
        }

        if self.frames.fence_timeout_ms == Some(0) {
            return Err(invalid("frames.fence_timeout_ms", "Timeout must be greater than 0 when set"));
        }

        if !(self.camera.near_z > 0.0 && self.camera.far_z > self.camera.near_z) {
            return Err(invalid("camera.near_z/far_z", "Require 0 < near_z < far_z"));
        }

        if !(self.camera.fov_degrees > 0.0 && self.camera.fov_degrees < 180.0) {
            return Err(invalid("camera.fov_degrees", "Field of view must be in (0, 180)"));
        }

        Ok(())
    }
}

fn arg_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1)?.parse().ok()
}

fn invalid(field: &str, reason: &str) -> super::error::ShapeRenderError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl GraphicsBackend {
    /// 获取后端名称
    pub fn name(&self) -> &'static str {
        match self {
            GraphicsBackend::Dx12 => "DirectX 12",
            GraphicsBackend::Headless => "Headless",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.frames.frame_resources, 3);
        assert!(config.frames.fence_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.frames.frame_resources = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.window.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.frames.fence_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [graphics]
            backend = "headless"

            [frames]
            frame_resources = 2
            fence_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.graphics.backend, GraphicsBackend::Headless);
        assert_eq!(config.frames.frame_resources, 2);
        assert_eq!(config.frames.fence_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.window.width, 800);
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(["shape_render", "--headless", "--frame-resources", "4", "--frames", "12"]);
        assert_eq!(config.graphics.backend, GraphicsBackend::Headless);
        assert_eq!(config.frames.frame_resources, 4);
        assert_eq!(config.headless.frame_count, 12);

        // 无法解析的值保持原样
        config.apply_args(["--width", "abc"]);
        assert_eq!(config.window.width, 800);
    }
}
