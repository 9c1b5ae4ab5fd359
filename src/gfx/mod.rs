//! 图形设备模块
//!
//! - `device`：帧循环使用的设备 trait
//! - `headless`：无窗口模拟设备，任意平台可用
//! - `dx12`：DirectX 12 设备，仅 Windows

pub mod device;
pub mod headless;
#[cfg(target_os = "windows")]
pub mod dx12;

pub use device::{GpuDevice, MappedBuffer, SubmissionQueue};
pub use headless::HeadlessDevice;
#[cfg(target_os = "windows")]
pub use dx12::Dx12Device;
