//! 无窗口模拟设备
//!
//! 不依赖任何图形 API，帧循环可以在任意平台上运行和测试。

mod device;
mod timeline;

pub use device::{
    ConstantBufferViewDesc, HeadlessCommandAllocator, HeadlessDevice, HeadlessStats,
    HeadlessUploadBuffer,
};
pub use timeline::GpuTimeline;
