//! DirectX 12 设备实现
//!
//! - context：设备、命令队列、交换链、RTV/DSV、栅栏
//! - descriptor：描述符堆
//! - pipeline：根签名、着色器、线框 PSO
//! - buffer：上传缓冲区和默认堆缓冲
//! - device：[`Dx12Device`]，帧循环使用的 `GpuDevice` 实现

pub mod buffer;
pub mod context;
pub mod descriptor;
pub mod device;
pub mod pipeline;

pub use context::Dx12Context;
pub use device::Dx12Device;
