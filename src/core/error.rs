//! 错误处理模块
//!
//! 定义了渲染器中使用的统一错误类型。
//!
//! # 错误分类
//!
//! - **设备/API 错误**（`Graphics`）：资源创建、命令提交失败，致命，直接向上传播
//! - **同步错误**（`Sync`）：栅栏等待超时等，按设备丢失处理
//! - **容量误用**（`Capacity`）：描述符堆建立后再添加渲染项等，在配置阶段拒绝

use std::fmt;

/// 渲染器统一的 Result 类型
pub type Result<T> = std::result::Result<T, ShapeRenderError>;

/// ShapeRender 的错误类型
#[derive(Debug)]
pub enum ShapeRenderError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// CPU/GPU 同步错误
    Sync(SyncError),

    /// 容量误用
    Capacity(CapacityError),

    /// IO 错误
    Io(std::io::Error),

    /// 日志系统错误
    Log(String),

    /// 初始化错误
    Initialization(String),

    /// 运行时错误
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备创建失败
    DeviceCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 着色器编译失败
    ShaderCompilation(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 命令录制失败
    CommandExecution(String),

    /// 命令提交或 Signal 失败
    Submission(String),

    /// 设备丢失（包括栅栏等待超时）
    DeviceLost(String),
}

/// 同步相关的错误
#[derive(Debug)]
pub enum SyncError {
    /// 等待栅栏值超时
    FenceTimeout { target: u64, completed: u64, timeout_ms: u64 },

    /// 队列已关闭，等待永远不会完成
    QueueClosed { target: u64, completed: u64 },
}

/// 容量误用
#[derive(Debug)]
pub enum CapacityError {
    /// 描述符堆建立后仍尝试添加渲染项
    HeapSealed { object_count: u32 },

    /// 对象常量索引越界
    ObjectIndexOutOfRange { index: u32, object_count: u32 },

    /// 帧资源索引越界
    FrameIndexOutOfRange { index: usize, frame_count: u32 },

    /// 帧资源数量无效
    InvalidFrameCount(usize),

    /// 子网格不存在
    UnknownSubmesh(String),
}

impl fmt::Display for ShapeRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeRenderError::Config(e) => write!(f, "Configuration error: {}", e),
            ShapeRenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            ShapeRenderError::Sync(e) => write!(f, "Synchronization error: {}", e),
            ShapeRenderError::Capacity(e) => write!(f, "Capacity error: {}", e),
            ShapeRenderError::Io(e) => write!(f, "IO error: {}", e),
            ShapeRenderError::Log(msg) => write!(f, "Log error: {}", msg),
            ShapeRenderError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            ShapeRenderError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::Submission(msg) => write!(f, "Queue submission failed: {}", msg),
            GraphicsError::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::FenceTimeout { target, completed, timeout_ms } => write!(
                f,
                "Timed out after {} ms waiting for fence {} (completed: {})",
                timeout_ms, target, completed
            ),
            SyncError::QueueClosed { target, completed } => write!(
                f,
                "Queue closed while waiting for fence {} (completed: {})",
                target, completed
            ),
        }
    }
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::HeapSealed { object_count } => write!(
                f,
                "Cannot add render items after the CBV heap was built for {} objects",
                object_count
            ),
            CapacityError::ObjectIndexOutOfRange { index, object_count } => write!(
                f,
                "Object constant index {} out of range (object count: {})",
                index, object_count
            ),
            CapacityError::FrameIndexOutOfRange { index, frame_count } => write!(
                f,
                "Frame resource index {} out of range (frame count: {})",
                index, frame_count
            ),
            CapacityError::InvalidFrameCount(count) => {
                write!(f, "Frame resource count must be at least 1, got {}", count)
            }
            CapacityError::UnknownSubmesh(name) => write!(f, "Unknown submesh: {}", name),
        }
    }
}

impl std::error::Error for ShapeRenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShapeRenderError::Io(e) => Some(e),
            ShapeRenderError::Config(e) => Some(e),
            ShapeRenderError::Graphics(e) => Some(e),
            ShapeRenderError::Sync(e) => Some(e),
            ShapeRenderError::Capacity(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for SyncError {}
impl std::error::Error for CapacityError {}

impl ShapeRenderError {
    /// 是否为设备丢失类错误（包括栅栏等待超时）
    pub fn is_device_lost(&self) -> bool {
        matches!(
            self,
            ShapeRenderError::Graphics(GraphicsError::DeviceLost(_))
                | ShapeRenderError::Sync(SyncError::FenceTimeout { .. })
        )
    }
}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for ShapeRenderError {
    fn from(err: std::io::Error) -> Self {
        ShapeRenderError::Io(err)
    }
}

impl From<ConfigError> for ShapeRenderError {
    fn from(err: ConfigError) -> Self {
        ShapeRenderError::Config(err)
    }
}

impl From<GraphicsError> for ShapeRenderError {
    fn from(err: GraphicsError) -> Self {
        ShapeRenderError::Graphics(err)
    }
}

impl From<SyncError> for ShapeRenderError {
    fn from(err: SyncError) -> Self {
        ShapeRenderError::Sync(err)
    }
}

impl From<CapacityError> for ShapeRenderError {
    fn from(err: CapacityError) -> Self {
        ShapeRenderError::Capacity(err)
    }
}
