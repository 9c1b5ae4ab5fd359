//! 核心功能模块
//!
//! 提供渲染器的基础功能：日志系统、配置管理、错误处理和帧计时。
//! 这些模块独立于具体的图形 API。
//!
//! - `log`：日志系统，提供结构化的日志记录功能
//! - `config`：配置管理，支持从配置文件加载设置
//! - `error`：错误处理，定义统一的错误类型
//! - `timer`：帧计时器
//! - `input`：鼠标输入，驱动环绕相机

pub mod log;
pub mod config;
pub mod error;
pub mod timer;
pub mod input;

// 重新导出常用类型，方便使用
pub use error::{Result, ShapeRenderError};
pub use config::Config;
pub use timer::GameTimer;
pub use input::InputSystem;
