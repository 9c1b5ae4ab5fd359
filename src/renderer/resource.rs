//! 帧资源模块
//!
//! - [`UploadBuffer`]：在设备的映射缓冲区之上按类型写入元素，常量缓冲区自动 256 字节对齐
//! - [`FrameResource`]：一帧独占的命令分配器、对象常量、Pass 常量和栅栏记录
//! - [`FrameRing`]：N 个帧资源组成的环，启动时创建，之后只循环使用
//!
//! 使用 N 个帧资源循环：
//! - 帧 k: CPU 正在写入
//! - 帧 k-1 .. k-N+1: GPU 可能仍在读取
//! - 环绕回来时由 [`FenceGate::await_if_busy`](super::sync::FenceGate::await_if_busy) 确认已释放

use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Pod;
use tracing::{debug, info};

use crate::core::error::{CapacityError, Result};
use crate::gfx::device::{GpuDevice, MappedBuffer};
use crate::renderer::constants::{ObjectConstants, PassConstants};
use crate::renderer::descriptor::CbvHeapLayout;
use crate::renderer::sync::SlotTracker;

/// 常量缓冲区元素大小，对齐到 256 字节边界
#[inline]
pub fn constant_buffer_byte_size(byte_size: u64) -> u64 {
    (byte_size + 255) & !255
}

/// 上传缓冲区（CPU -> GPU）
///
/// # 类型参数
///
/// * `T` - 缓冲区中存储的数据类型
/// * `B` - 设备提供的映射缓冲区
pub struct UploadBuffer<T, B> {
    buffer: B,
    _phantom: PhantomData<T>,
}

impl<T: Pod, B: MappedBuffer> UploadBuffer<T, B> {
    /// 创建新的上传缓冲区
    ///
    /// `is_constant_buffer` 为真时每个元素占用 256 字节的整数倍。
    pub fn new<D>(device: &mut D, element_count: usize, is_constant_buffer: bool) -> Result<Self>
    where
        D: GpuDevice<UploadBuffer = B>,
    {
        let byte_size = size_of::<T>() as u64;
        let element_byte_size = if is_constant_buffer {
            constant_buffer_byte_size(byte_size)
        } else {
            byte_size
        };

        let buffer = device.create_upload_buffer(element_byte_size, element_count)?;

        Ok(Self {
            buffer,
            _phantom: PhantomData,
        })
    }

    pub fn element_count(&self) -> usize {
        self.buffer.element_count()
    }

    /// 每个元素的大小（对齐后）
    pub fn element_byte_size(&self) -> u64 {
        self.buffer.element_byte_size()
    }

    /// 计算元素在缓冲区中的偏移量
    pub fn element_offset(&self, index: usize) -> u64 {
        self.element_byte_size() * index as u64
    }

    /// 第 `index` 个元素的 GPU 虚拟地址
    pub fn gpu_address(&self, index: usize) -> u64 {
        self.buffer.gpu_virtual_address() + self.element_offset(index)
    }

    pub fn copy_data(&mut self, index: usize, data: &T) -> Result<()> {
        self.buffer.copy_element(index, bytemuck::bytes_of(data))
    }

    pub fn resource(&self) -> &B {
        &self.buffer
    }
}

/// 帧资源
///
/// 命令分配器只能在 GPU 完成该帧之后重置，常量缓冲区同理；
/// 这里的所有写入都要求槽位处于录制状态。
pub struct FrameResource<D: GpuDevice> {
    pub cmd_list_alloc: D::CommandAllocator,
    pass_cb: UploadBuffer<PassConstants, D::UploadBuffer>,
    object_cb: UploadBuffer<ObjectConstants, D::UploadBuffer>,
    tracker: SlotTracker,
}

impl<D: GpuDevice> FrameResource<D> {
    pub fn new(device: &mut D, index: usize, pass_count: usize, object_count: usize) -> Result<Self> {
        Ok(Self {
            cmd_list_alloc: device.create_command_allocator()?,
            pass_cb: UploadBuffer::new(device, pass_count, true)?,
            object_cb: UploadBuffer::new(device, object_count, true)?,
            tracker: SlotTracker::new(index),
        })
    }

    pub fn index(&self) -> usize {
        self.tracker.index()
    }

    pub fn tracker(&self) -> &SlotTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut SlotTracker {
        &mut self.tracker
    }

    pub fn object_cb(&self) -> &UploadBuffer<ObjectConstants, D::UploadBuffer> {
        &self.object_cb
    }

    pub fn pass_cb(&self) -> &UploadBuffer<PassConstants, D::UploadBuffer> {
        &self.pass_cb
    }

    /// 写入第 `index` 个对象常量
    pub fn write_object(&mut self, index: u32, constants: &ObjectConstants) -> Result<()> {
        self.tracker.debug_assert_writable();
        let count = self.object_cb.element_count() as u32;
        if index >= count {
            return Err(CapacityError::ObjectIndexOutOfRange {
                index,
                object_count: count,
            }
            .into());
        }
        self.object_cb.copy_data(index as usize, constants)
    }

    pub fn write_pass(&mut self, constants: &PassConstants) -> Result<()> {
        self.tracker.debug_assert_writable();
        self.pass_cb.copy_data(0, constants)
    }
}

/// 帧资源环
pub struct FrameRing<D: GpuDevice> {
    resources: Vec<FrameResource<D>>,
    cursor: usize,
}

impl<D: GpuDevice> FrameRing<D> {
    /// 创建 `frame_count` 个帧资源
    ///
    /// 游标初始指向最后一个槽位，第一次 `advance` 后落在槽位 0。
    pub fn new(device: &mut D, frame_count: usize, pass_count: usize, object_count: usize) -> Result<Self> {
        if frame_count == 0 {
            return Err(CapacityError::InvalidFrameCount(frame_count).into());
        }

        let resources = (0..frame_count)
            .map(|i| FrameResource::new(device, i, pass_count, object_count))
            .collect::<Result<Vec<_>>>()?;

        info!(
            frame_count,
            object_count,
            backend = device.backend_name(),
            "Frame resources created"
        );

        Ok(Self {
            resources,
            cursor: frame_count - 1,
        })
    }

    /// 移动到下一个帧资源，返回新的索引
    pub fn advance(&mut self) -> usize {
        self.cursor = (self.cursor + 1) % self.resources.len();
        self.cursor
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> &FrameResource<D> {
        &self.resources[self.cursor]
    }

    pub fn current_mut(&mut self) -> &mut FrameResource<D> {
        &mut self.resources[self.cursor]
    }

    pub fn get(&self, index: usize) -> Option<&FrameResource<D>> {
        self.resources.get(index)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameResource<D>> {
        self.resources.iter()
    }

    /// 按布局为每个帧资源的每个常量缓冲元素创建 CBV
    pub fn create_constant_buffer_views(&self, device: &mut D, layout: &CbvHeapLayout) -> Result<()> {
        for (frame_index, frame) in self.resources.iter().enumerate() {
            let object_cb = frame.object_cb();
            let object_size = object_cb.element_byte_size() as u32;
            for object_index in 0..layout.object_count() {
                let heap_index = layout.object_cbv_index(frame_index, object_index)?;
                let address = object_cb.gpu_address(object_index as usize);
                device.create_constant_buffer_view(heap_index, address, object_size)?;
            }

            let pass_cb = frame.pass_cb();
            let heap_index = layout.pass_cbv_index(frame_index)?;
            device.create_constant_buffer_view(
                heap_index,
                pass_cb.gpu_address(0),
                pass_cb.element_byte_size() as u32,
            )?;
        }

        debug!(
            num_descriptors = layout.num_descriptors(),
            pass_cbv_offset = layout.pass_cbv_offset(),
            "Constant buffer views created"
        );
        Ok(())
    }
}
