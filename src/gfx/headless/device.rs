//! 无窗口的模拟 GPU 设备
//!
//! 提交的命令列表和 Signal 按顺序交给一个工作线程，
//! 工作线程在模拟延迟之后推进栅栏时间线。手动模式下不启动工作线程，
//! 由调用方决定何时完成哪个栅栏值，用来精确构造"GPU 落后 CPU"的场景。
//!
//! 设备会像 D3D12 调试层一样检查几类误用：
//! - 命令分配器在其关联的栅栏完成之前被重置
//! - 在未建立的 CBV 堆位置上创建视图或绑定
//! - 命令列表状态错误（未关闭就提交等）

use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytemuck::Pod;
use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, info, trace, warn};

use super::timeline::GpuTimeline;
use crate::core::error::{GraphicsError, Result};
use crate::geometry::MeshGeometry;
use crate::gfx::device::{GpuDevice, MappedBuffer, SubmissionQueue};
use crate::renderer::command::FrameCommands;
use crate::renderer::descriptor::{CbvHeapLayout, GpuDescriptorHandle};
use crate::renderer::sync::FenceValue;

const CBV_HEAP_BASE: u64 = 0x0010_0000;
const CBV_DESCRIPTOR_SIZE: u32 = 32;
const UPLOAD_HEAP_BASE: u64 = 0x1000_0000;
const SWAP_CHAIN_BUFFER_COUNT: u32 = 2;

/// 工作线程处理的 GPU 工作
#[derive(Debug)]
enum GpuWork {
    Execute { draws: usize },
    Signal(u64),
}

/// 命令列表状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListState {
    Idle,
    Recording { allocator: usize },
    Closed { allocator: usize },
}

/// 模拟命令分配器
#[derive(Debug)]
pub struct HeadlessCommandAllocator {
    id: usize,
}

impl HeadlessCommandAllocator {
    pub fn id(&self) -> usize {
        self.id
    }
}

/// 模拟上传缓冲区，内容保存在 CPU 内存中，可以读回检查
#[derive(Debug)]
pub struct HeadlessUploadBuffer {
    data: Vec<u8>,
    element_byte_size: u64,
    element_count: usize,
    gpu_address: u64,
}

impl HeadlessUploadBuffer {
    /// 读回第 `index` 个元素的原始字节
    pub fn element_bytes(&self, index: usize) -> Option<&[u8]> {
        if index >= self.element_count {
            return None;
        }
        let start = index * self.element_byte_size as usize;
        Some(&self.data[start..start + self.element_byte_size as usize])
    }

    /// 把第 `index` 个元素读回为 `T`
    pub fn read<T: Pod>(&self, index: usize) -> Option<T> {
        let bytes = self.element_bytes(index)?;
        let size = std::mem::size_of::<T>();
        if size > bytes.len() {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(&bytes[..size]))
    }
}

impl MappedBuffer for HeadlessUploadBuffer {
    fn element_byte_size(&self) -> u64 {
        self.element_byte_size
    }

    fn element_count(&self) -> usize {
        self.element_count
    }

    fn gpu_virtual_address(&self) -> u64 {
        self.gpu_address
    }

    fn copy_element(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        if index >= self.element_count || bytes.len() as u64 > self.element_byte_size {
            return Err(GraphicsError::ResourceCreation(format!(
                "Upload buffer write out of bounds: element {} ({} bytes), buffer holds {} x {} bytes",
                index,
                bytes.len(),
                self.element_count,
                self.element_byte_size
            ))
            .into());
        }

        let start = index * self.element_byte_size as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// CBV 描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBufferViewDesc {
    pub buffer_location: u64,
    pub size_in_bytes: u32,
}

/// 模拟设备的统计信息
#[derive(Debug, Clone, Default)]
pub struct HeadlessStats {
    pub lists_executed: u64,
    pub frames_recorded: u64,
    pub draws_recorded: u64,
    pub presents: u64,
    pub resizes: u64,
    pub uploaded_vertex_bytes: u64,
    pub uploaded_index_bytes: u64,
}

/// 无窗口的模拟 GPU 设备
pub struct HeadlessDevice {
    width: u32,
    height: u32,
    back_buffer_index: u32,

    timeline: GpuTimeline,
    sender: Option<Sender<GpuWork>>,
    worker: Option<JoinHandle<()>>,
    /// 手动模式下已排队但尚未完成的 Signal
    pending_signals: Vec<u64>,

    list_state: ListState,
    next_allocator_id: usize,
    /// 每个分配器最近一次关联的栅栏值
    allocator_fences: HashMap<usize, u64>,
    /// 已提交但还没有被 Signal 覆盖的分配器
    unsignaled_allocators: Vec<usize>,

    next_gpu_address: u64,
    cbv_layout: Option<CbvHeapLayout>,
    cbv_table: HashMap<u32, ConstantBufferViewDesc>,

    last_frame: Option<FrameCommands>,
    stats: HeadlessStats,
}

impl HeadlessDevice {
    /// 创建带工作线程的设备，每个命令列表在 `latency` 之后完成
    pub fn new(width: u32, height: u32, latency: Duration) -> Result<Self> {
        let timeline = GpuTimeline::new();
        let (sender, receiver) = unbounded::<GpuWork>();

        let gpu_timeline = timeline.clone();
        let worker = thread::Builder::new()
            .name("headless-gpu".to_string())
            .spawn(move || {
                for work in receiver.iter() {
                    match work {
                        GpuWork::Execute { draws } => {
                            if !latency.is_zero() {
                                thread::sleep(latency);
                            }
                            trace!(draws, "GPU executed command list");
                        }
                        GpuWork::Signal(value) => gpu_timeline.complete(value),
                    }
                }
                gpu_timeline.close();
            })?;

        info!(width, height, latency_ms = latency.as_millis() as u64, "Headless GPU device created");

        let mut device = Self::with_timeline(width, height, timeline);
        device.sender = Some(sender);
        device.worker = Some(worker);
        Ok(device)
    }

    /// 创建手动模式的设备：Signal 只排队，由调用方完成
    pub fn manual(width: u32, height: u32) -> Self {
        Self::with_timeline(width, height, GpuTimeline::new())
    }

    fn with_timeline(width: u32, height: u32, timeline: GpuTimeline) -> Self {
        Self {
            width,
            height,
            back_buffer_index: 0,
            timeline,
            sender: None,
            worker: None,
            pending_signals: Vec::new(),
            list_state: ListState::Idle,
            next_allocator_id: 0,
            allocator_fences: HashMap::new(),
            unsignaled_allocators: Vec::new(),
            next_gpu_address: UPLOAD_HEAP_BASE,
            cbv_layout: None,
            cbv_table: HashMap::new(),
            last_frame: None,
            stats: HeadlessStats::default(),
        }
    }

    pub fn is_manual(&self) -> bool {
        self.sender.is_none()
    }

    /// 共享的栅栏时间线，可交给其他线程推进（手动模式）
    pub fn timeline(&self) -> GpuTimeline {
        self.timeline.clone()
    }

    /// 手动模式下已排队但尚未完成的栅栏值
    pub fn pending_signals(&self) -> &[u64] {
        &self.pending_signals
    }

    /// 手动模式：完成最早排队的一个 Signal
    pub fn complete_next(&mut self) -> Option<u64> {
        if self.pending_signals.is_empty() {
            return None;
        }
        let value = self.pending_signals.remove(0);
        self.timeline.complete(value);
        Some(value)
    }

    /// 手动模式：完成所有已排队的 Signal
    pub fn complete_all(&mut self) {
        if let Some(&last) = self.pending_signals.last() {
            self.timeline.complete(last);
        }
        self.pending_signals.clear();
    }

    pub fn stats(&self) -> &HeadlessStats {
        &self.stats
    }

    pub fn last_frame(&self) -> Option<&FrameCommands> {
        self.last_frame.as_ref()
    }

    pub fn back_buffer_index(&self) -> u32 {
        self.back_buffer_index
    }

    pub fn constant_buffer_view(&self, heap_index: u32) -> Option<ConstantBufferViewDesc> {
        self.cbv_table.get(&heap_index).copied()
    }

    pub fn constant_buffer_view_count(&self) -> usize {
        self.cbv_table.len()
    }

    fn submit_work(&mut self, work: GpuWork) -> Result<()> {
        match (&self.sender, work) {
            (Some(sender), work) => sender.send(work).map_err(|_| {
                GraphicsError::DeviceLost("Headless GPU worker has stopped".to_string()).into()
            }),
            (None, GpuWork::Signal(value)) => {
                self.pending_signals.push(value);
                Ok(())
            }
            (None, GpuWork::Execute { .. }) => Ok(()),
        }
    }

    fn descriptor_index(&self, handle: GpuDescriptorHandle) -> Result<u32> {
        let start = self.cbv_heap_start()?;
        let byte_offset = handle.ptr.checked_sub(start.ptr).ok_or_else(|| {
            GraphicsError::CommandExecution(format!(
                "Descriptor handle {:#x} is outside the CBV heap",
                handle.ptr
            ))
        })?;

        if byte_offset % CBV_DESCRIPTOR_SIZE as u64 != 0
            || byte_offset / CBV_DESCRIPTOR_SIZE as u64 != handle.index as u64
        {
            return Err(GraphicsError::CommandExecution(format!(
                "Descriptor handle {:#x} does not match heap index {}",
                handle.ptr, handle.index
            ))
            .into());
        }

        if !self.cbv_table.contains_key(&handle.index) {
            return Err(GraphicsError::CommandExecution(format!(
                "No constant buffer view at heap index {}",
                handle.index
            ))
            .into());
        }

        Ok(handle.index)
    }
}

impl SubmissionQueue for HeadlessDevice {
    fn execute_command_list(&mut self) -> Result<()> {
        let allocator = match self.list_state {
            ListState::Closed { allocator } => allocator,
            state => {
                return Err(GraphicsError::Submission(format!(
                    "Command list must be closed before execution (state: {:?})",
                    state
                ))
                .into())
            }
        };

        let draws = self.last_frame.as_ref().map_or(0, FrameCommands::draw_count);
        self.submit_work(GpuWork::Execute { draws })?;
        self.unsignaled_allocators.push(allocator);
        self.list_state = ListState::Idle;
        self.stats.lists_executed += 1;
        Ok(())
    }

    fn signal(&mut self, value: FenceValue) -> Result<()> {
        for allocator in self.unsignaled_allocators.drain(..) {
            self.allocator_fences.insert(allocator, value.value());
        }
        self.submit_work(GpuWork::Signal(value.value()))
    }

    fn completed_value(&self) -> FenceValue {
        FenceValue::new(self.timeline.completed())
    }

    fn wait_for_value(&self, target: FenceValue, timeout: Option<Duration>) -> Result<bool> {
        self.timeline.wait_for(target.value(), timeout)
    }
}

impl GpuDevice for HeadlessDevice {
    type CommandAllocator = HeadlessCommandAllocator;
    type UploadBuffer = HeadlessUploadBuffer;

    fn backend_name(&self) -> &str {
        "Headless"
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn create_command_allocator(&mut self) -> Result<Self::CommandAllocator> {
        let id = self.next_allocator_id;
        self.next_allocator_id += 1;
        Ok(HeadlessCommandAllocator { id })
    }

    fn create_upload_buffer(
        &mut self,
        element_byte_size: u64,
        element_count: usize,
    ) -> Result<Self::UploadBuffer> {
        let byte_size = element_byte_size * element_count as u64;
        let gpu_address = self.next_gpu_address;
        // 每个缓冲区按 64KB 放置
        self.next_gpu_address += (byte_size.max(1) + 0xFFFF) & !0xFFFF;

        Ok(HeadlessUploadBuffer {
            data: vec![0; byte_size as usize],
            element_byte_size,
            element_count,
            gpu_address,
        })
    }

    fn upload_geometry(&mut self, geometry: &MeshGeometry) -> Result<()> {
        self.stats.uploaded_vertex_bytes += geometry.vertex_buffer_byte_size() as u64;
        self.stats.uploaded_index_bytes += geometry.index_buffer_byte_size() as u64;
        self.submit_work(GpuWork::Execute { draws: 0 })?;

        debug!(
            name = %geometry.name,
            vertex_bytes = geometry.vertex_buffer_byte_size(),
            index_bytes = geometry.index_buffer_byte_size(),
            "Geometry uploaded"
        );
        Ok(())
    }

    fn create_cbv_heap(&mut self, layout: &CbvHeapLayout) -> Result<()> {
        self.cbv_layout = Some(*layout);
        self.cbv_table.clear();
        Ok(())
    }

    fn create_constant_buffer_view(
        &mut self,
        heap_index: u32,
        gpu_address: u64,
        size_in_bytes: u32,
    ) -> Result<()> {
        let layout = self.cbv_layout.ok_or_else(|| {
            GraphicsError::ResourceCreation("CBV heap has not been created".to_string())
        })?;

        if heap_index >= layout.num_descriptors() {
            return Err(GraphicsError::ResourceCreation(format!(
                "CBV heap index {} out of range ({} descriptors)",
                heap_index,
                layout.num_descriptors()
            ))
            .into());
        }

        if size_in_bytes % 256 != 0 {
            return Err(GraphicsError::ResourceCreation(format!(
                "Constant buffer view size {} is not a multiple of 256",
                size_in_bytes
            ))
            .into());
        }

        self.cbv_table.insert(
            heap_index,
            ConstantBufferViewDesc {
                buffer_location: gpu_address,
                size_in_bytes,
            },
        );
        Ok(())
    }

    fn cbv_heap_start(&self) -> Result<GpuDescriptorHandle> {
        if self.cbv_layout.is_none() {
            return Err(GraphicsError::ResourceCreation("CBV heap has not been created".to_string()).into());
        }
        Ok(GpuDescriptorHandle::new(CBV_HEAP_BASE, 0))
    }

    fn cbv_descriptor_size(&self) -> u32 {
        CBV_DESCRIPTOR_SIZE
    }

    fn reset_commands(&mut self, allocator: &mut Self::CommandAllocator) -> Result<()> {
        if self.list_state != ListState::Idle {
            return Err(GraphicsError::CommandExecution(format!(
                "Command list reset while in state {:?}",
                self.list_state
            ))
            .into());
        }

        if let Some(&fence) = self.allocator_fences.get(&allocator.id) {
            let completed = self.timeline.completed();
            if completed < fence {
                return Err(GraphicsError::CommandExecution(format!(
                    "Command allocator {} reset while GPU work is in flight (fence {}, completed {})",
                    allocator.id, fence, completed
                ))
                .into());
            }
        }

        self.list_state = ListState::Recording { allocator: allocator.id };
        Ok(())
    }

    fn record_frame(&mut self, frame: &FrameCommands) -> Result<()> {
        if !matches!(self.list_state, ListState::Recording { .. }) {
            return Err(GraphicsError::CommandExecution(
                "Command list is not recording".to_string(),
            )
            .into());
        }

        self.descriptor_index(frame.pass_cbv)?;
        for draw in &frame.draws {
            self.descriptor_index(draw.object_cbv)?;
        }

        self.stats.frames_recorded += 1;
        self.stats.draws_recorded += frame.draws.len() as u64;
        self.last_frame = Some(frame.clone());
        Ok(())
    }

    fn close_commands(&mut self) -> Result<()> {
        match self.list_state {
            ListState::Recording { allocator } => {
                self.list_state = ListState::Closed { allocator };
                Ok(())
            }
            state => Err(GraphicsError::CommandExecution(format!(
                "Cannot close command list in state {:?}",
                state
            ))
            .into()),
        }
    }

    fn present(&mut self) -> Result<()> {
        self.back_buffer_index = (self.back_buffer_index + 1) % SWAP_CHAIN_BUFFER_COUNT;
        self.stats.presents += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.list_state != ListState::Idle {
            warn!(state = ?self.list_state, "Resize while a command list is open");
        }
        self.width = width;
        self.height = height;
        self.back_buffer_index = 0;
        self.stats.resizes += 1;
        Ok(())
    }
}

impl Drop for HeadlessDevice {
    fn drop(&mut self) {
        // 断开通道后工作线程处理完剩余工作并关闭时间线
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Headless GPU worker panicked");
            }
        }
        self.timeline.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_empty_frame(device: &mut HeadlessDevice, allocator: &mut HeadlessCommandAllocator) -> Result<()> {
        device.reset_commands(allocator)?;
        device.close_commands()?;
        device.execute_command_list()
    }

    #[test]
    fn test_manual_signals_queue_until_completed() {
        let mut device = HeadlessDevice::manual(800, 600);
        let mut alloc = device.create_command_allocator().unwrap();

        record_empty_frame(&mut device, &mut alloc).unwrap();
        device.signal(FenceValue::new(1)).unwrap();
        assert_eq!(device.pending_signals(), &[1]);
        assert_eq!(device.completed_value().value(), 0);

        assert_eq!(device.complete_next(), Some(1));
        assert_eq!(device.completed_value().value(), 1);
        assert!(device.pending_signals().is_empty());
    }

    #[test]
    fn test_allocator_reset_while_in_flight_rejected() {
        let mut device = HeadlessDevice::manual(800, 600);
        let mut alloc = device.create_command_allocator().unwrap();

        record_empty_frame(&mut device, &mut alloc).unwrap();
        device.signal(FenceValue::new(1)).unwrap();

        let err = device.reset_commands(&mut alloc).unwrap_err();
        assert!(err.to_string().contains("in flight"));

        device.complete_all();
        assert!(device.reset_commands(&mut alloc).is_ok());
    }

    #[test]
    fn test_execute_requires_closed_list() {
        let mut device = HeadlessDevice::manual(800, 600);
        assert!(device.execute_command_list().is_err());

        let mut alloc = device.create_command_allocator().unwrap();
        device.reset_commands(&mut alloc).unwrap();
        assert!(device.execute_command_list().is_err());
    }

    #[test]
    fn test_worker_completes_signals() {
        let mut device = HeadlessDevice::new(640, 480, Duration::from_millis(1)).unwrap();
        let mut alloc = device.create_command_allocator().unwrap();

        record_empty_frame(&mut device, &mut alloc).unwrap();
        device.signal(FenceValue::new(1)).unwrap();

        assert!(device
            .wait_for_value(FenceValue::new(1), Some(Duration::from_secs(5)))
            .unwrap());
        assert_eq!(device.completed_value().value(), 1);
        assert_eq!(device.stats().lists_executed, 1);
    }

    #[test]
    fn test_upload_buffer_bounds() {
        let mut device = HeadlessDevice::manual(800, 600);
        let mut buffer = device.create_upload_buffer(256, 2).unwrap();

        buffer.copy_element(1, &[7u8; 64]).unwrap();
        assert_eq!(buffer.element_bytes(1).unwrap()[..64], [7u8; 64]);
        assert!(buffer.copy_element(2, &[0u8; 4]).is_err());
        assert!(buffer.copy_element(0, &[0u8; 300]).is_err());

        let other = device.create_upload_buffer(256, 2).unwrap();
        assert_ne!(buffer.gpu_virtual_address(), other.gpu_virtual_address());
    }

    #[test]
    fn test_cbv_requires_heap() {
        let mut device = HeadlessDevice::manual(800, 600);
        assert!(device.create_constant_buffer_view(0, 0, 256).is_err());

        let layout = CbvHeapLayout::new(2, 3).unwrap();
        device.create_cbv_heap(&layout).unwrap();
        device.create_constant_buffer_view(8, 0x1000, 256).unwrap();
        assert!(device.create_constant_buffer_view(9, 0x1000, 256).is_err());
        assert!(device.create_constant_buffer_view(0, 0x1000, 100).is_err());
        assert_eq!(device.constant_buffer_view(8).unwrap().buffer_location, 0x1000);
    }
}
