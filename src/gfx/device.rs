//! 图形设备的统一抽象接口
//!
//! 帧资源环和栅栏门只通过这里的 trait 与设备交互，
//! 具体实现有 DirectX 12（仅 Windows）和无窗口的模拟设备两种。
//!
//! - [`SubmissionQueue`]：命令提交、Signal 和栅栏查询/等待
//! - [`MappedBuffer`]：持久映射的上传缓冲区
//! - [`GpuDevice`]：创建命令分配器、上传缓冲区、CBV，录制并呈现一帧

use std::time::Duration;

use crate::core::error::Result;
use crate::geometry::MeshGeometry;
use crate::renderer::command::FrameCommands;
use crate::renderer::descriptor::{CbvHeapLayout, GpuDescriptorHandle};
use crate::renderer::sync::FenceValue;

/// 命令队列 + 栅栏
pub trait SubmissionQueue {
    /// 提交当前已关闭的命令列表
    fn execute_command_list(&mut self) -> Result<()>;

    /// 在队列中排入一个 Signal，GPU 执行到这里时把栅栏设为 `value`
    fn signal(&mut self, value: FenceValue) -> Result<()>;

    /// GPU 已完成的最大栅栏值
    fn completed_value(&self) -> FenceValue;

    /// 阻塞直到栅栏达到 `target`
    ///
    /// 返回 `Ok(false)` 表示在 `timeout` 内没有达到。
    fn wait_for_value(&self, target: FenceValue, timeout: Option<Duration>) -> Result<bool>;
}

/// 持久映射的上传缓冲区
///
/// 每个元素占用 `element_byte_size` 字节（常量缓冲区已对齐到 256）。
pub trait MappedBuffer {
    fn element_byte_size(&self) -> u64;

    fn element_count(&self) -> usize;

    /// 缓冲区起始的 GPU 虚拟地址
    fn gpu_virtual_address(&self) -> u64;

    /// 把 `bytes` 写到第 `index` 个元素的起始处
    fn copy_element(&mut self, index: usize, bytes: &[u8]) -> Result<()>;
}

/// 图形设备
pub trait GpuDevice: SubmissionQueue {
    type CommandAllocator;
    type UploadBuffer: MappedBuffer;

    /// 后端名称，用于日志
    fn backend_name(&self) -> &str;

    /// 当前渲染目标尺寸
    fn size(&self) -> (u32, u32);

    fn create_command_allocator(&mut self) -> Result<Self::CommandAllocator>;

    fn create_upload_buffer(
        &mut self,
        element_byte_size: u64,
        element_count: usize,
    ) -> Result<Self::UploadBuffer>;

    /// 录制并提交共享顶点/索引缓冲的上传命令
    ///
    /// 调用方随后负责 flush，确保上传完成后才释放中转缓冲。
    fn upload_geometry(&mut self, geometry: &MeshGeometry) -> Result<()>;

    /// 按布局创建着色器可见的 CBV 堆
    fn create_cbv_heap(&mut self, layout: &CbvHeapLayout) -> Result<()>;

    /// 在 CBV 堆的 `heap_index` 处创建常量缓冲视图
    fn create_constant_buffer_view(
        &mut self,
        heap_index: u32,
        gpu_address: u64,
        size_in_bytes: u32,
    ) -> Result<()>;

    /// CBV 堆起始的 GPU 句柄
    fn cbv_heap_start(&self) -> Result<GpuDescriptorHandle>;

    /// CBV/SRV/UAV 描述符的步长
    fn cbv_descriptor_size(&self) -> u32;

    /// 重置命令分配器和命令列表，开始录制
    ///
    /// 只能在分配器上次关联的栅栏完成之后调用。
    fn reset_commands(&mut self, allocator: &mut Self::CommandAllocator) -> Result<()>;

    /// 录制一帧：视口、清屏、根签名、Pass 表、逐对象绘制
    fn record_frame(&mut self, frame: &FrameCommands) -> Result<()>;

    fn close_commands(&mut self) -> Result<()>;

    /// 呈现并切换后台缓冲
    fn present(&mut self) -> Result<()>;

    /// 调整交换链尺寸，调用前需要 flush
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;
}
