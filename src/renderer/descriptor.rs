//! 描述符管理模块
//!
//! 常量缓冲视图（CBV）堆的布局是一个纯函数：
//!
//! ```text
//! | frame 0: obj 0..n | frame 1: obj 0..n | ... | frame N-1: obj 0..n | pass 0 | ... | pass N-1 |
//!                                                                     ^ pass_cbv_offset = n * N
//! ```
//!
//! - 对象 CBV：`frame_index * object_count + object_index`
//! - Pass CBV：`pass_cbv_offset + frame_index`
//! - 总数：`(object_count + 1) * N`
//!
//! 建堆时和绑定时使用同一套公式，不做查找，也不修改任何状态。

use crate::core::error::{CapacityError, Result};

/// 描述符类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// 渲染目标视图
    Rtv,
    /// 深度模板视图
    Dsv,
    /// CBV/SRV/UAV 组合堆
    CbvSrvUav,
}

impl DescriptorType {
    /// 是否需要着色器可见
    pub fn is_shader_visible(&self) -> bool {
        matches!(self, DescriptorType::CbvSrvUav)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DescriptorType::Rtv => "RTV",
            DescriptorType::Dsv => "DSV",
            DescriptorType::CbvSrvUav => "CBV_SRV_UAV",
        }
    }
}

/// 描述符堆描述信息
#[derive(Debug, Clone)]
pub struct DescriptorHeapDescriptor {
    pub descriptor_type: DescriptorType,
    pub num_descriptors: u32,
    pub shader_visible: bool,
    pub name: Option<String>,
}

impl DescriptorHeapDescriptor {
    pub fn new(descriptor_type: DescriptorType, num_descriptors: u32) -> Self {
        Self {
            descriptor_type,
            num_descriptors,
            shader_visible: descriptor_type.is_shader_visible(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn rtv(num_descriptors: u32) -> Self {
        Self::new(DescriptorType::Rtv, num_descriptors).with_name("RTV Heap")
    }

    pub fn dsv(num_descriptors: u32) -> Self {
        Self::new(DescriptorType::Dsv, num_descriptors).with_name("DSV Heap")
    }

    /// 按布局创建着色器可见的 CBV 堆描述
    pub fn cbv(layout: &CbvHeapLayout) -> Self {
        Self::new(DescriptorType::CbvSrvUav, layout.num_descriptors()).with_name("CBV Heap")
    }
}

/// 描述符句柄（CPU 可见）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuDescriptorHandle {
    /// 句柄指针值
    pub ptr: usize,
    /// 描述符索引
    pub index: u32,
}

impl CpuDescriptorHandle {
    pub fn new(ptr: usize, index: u32) -> Self {
        Self { ptr, index }
    }

    /// 偏移句柄
    pub fn offset(&self, count: u32, increment_size: u32) -> Self {
        Self {
            ptr: self.ptr + count as usize * increment_size as usize,
            index: self.index + count,
        }
    }
}

/// 描述符句柄（GPU 可见）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuDescriptorHandle {
    /// 句柄指针值
    pub ptr: u64,
    /// 描述符索引
    pub index: u32,
}

impl GpuDescriptorHandle {
    pub fn new(ptr: u64, index: u32) -> Self {
        Self { ptr, index }
    }

    /// 偏移句柄
    pub fn offset(&self, count: u32, increment_size: u32) -> Self {
        Self {
            ptr: self.ptr + count as u64 * increment_size as u64,
            index: self.index + count,
        }
    }
}

/// CBV 堆布局
///
/// 对象数量和帧资源数量在建堆前确定，之后不可更改。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CbvHeapLayout {
    object_count: u32,
    frame_count: u32,
}

impl CbvHeapLayout {
    pub fn new(object_count: u32, frame_count: usize) -> Result<Self> {
        if frame_count == 0 {
            return Err(CapacityError::InvalidFrameCount(frame_count).into());
        }

        Ok(Self {
            object_count,
            frame_count: frame_count as u32,
        })
    }

    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// 堆中描述符总数
    pub fn num_descriptors(&self) -> u32 {
        (self.object_count + 1) * self.frame_count
    }

    /// 第一个 Pass CBV 的位置
    pub fn pass_cbv_offset(&self) -> u32 {
        self.object_count * self.frame_count
    }

    /// 对象 CBV 在堆中的索引
    pub fn object_cbv_index(&self, frame_index: usize, object_index: u32) -> Result<u32> {
        self.check_frame(frame_index)?;
        if object_index >= self.object_count {
            return Err(CapacityError::ObjectIndexOutOfRange {
                index: object_index,
                object_count: self.object_count,
            }
            .into());
        }

        Ok(frame_index as u32 * self.object_count + object_index)
    }

    /// Pass CBV 在堆中的索引
    pub fn pass_cbv_index(&self, frame_index: usize) -> Result<u32> {
        self.check_frame(frame_index)?;
        Ok(self.pass_cbv_offset() + frame_index as u32)
    }

    /// 对象 CBV 的 GPU 句柄
    pub fn bind_object(
        &self,
        heap_start: GpuDescriptorHandle,
        increment_size: u32,
        frame_index: usize,
        object_index: u32,
    ) -> Result<GpuDescriptorHandle> {
        let index = self.object_cbv_index(frame_index, object_index)?;
        Ok(heap_start.offset(index, increment_size))
    }

    /// Pass CBV 的 GPU 句柄
    pub fn bind_pass(
        &self,
        heap_start: GpuDescriptorHandle,
        increment_size: u32,
        frame_index: usize,
    ) -> Result<GpuDescriptorHandle> {
        let index = self.pass_cbv_index(frame_index)?;
        Ok(heap_start.offset(index, increment_size))
    }

    fn check_frame(&self, frame_index: usize) -> Result<()> {
        if frame_index >= self.frame_count as usize {
            return Err(CapacityError::FrameIndexOutOfRange {
                index: frame_index,
                frame_count: self.frame_count,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_six_objects_three_frames() {
        let layout = CbvHeapLayout::new(6, 3).unwrap();
        assert_eq!(layout.num_descriptors(), 21);
        assert_eq!(layout.pass_cbv_offset(), 18);
        assert_eq!(layout.pass_cbv_index(1).unwrap(), 19);
        assert_eq!(layout.object_cbv_index(2, 5).unwrap(), 17);
    }

    #[test]
    fn test_indices_are_injective() {
        let layout = CbvHeapLayout::new(22, 3).unwrap();
        let mut seen = HashSet::new();

        for frame in 0..3 {
            for obj in 0..22 {
                let index = layout.object_cbv_index(frame, obj).unwrap();
                assert!(index < layout.num_descriptors());
                assert!(seen.insert(index), "object slot {index} aliased");
            }
            let pass = layout.pass_cbv_index(frame).unwrap();
            assert!(pass < layout.num_descriptors());
            assert!(seen.insert(pass), "pass slot {pass} aliased");
        }

        assert_eq!(seen.len(), layout.num_descriptors() as usize);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let layout = CbvHeapLayout::new(6, 3).unwrap();
        assert!(layout.object_cbv_index(0, 6).is_err());
        assert!(layout.pass_cbv_index(3).is_err());
        assert!(CbvHeapLayout::new(6, 0).is_err());
    }

    #[test]
    fn test_bind_offsets_handle() {
        let layout = CbvHeapLayout::new(6, 3).unwrap();
        let start = GpuDescriptorHandle::new(0x1000, 0);

        let obj = layout.bind_object(start, 32, 1, 2).unwrap();
        assert_eq!(obj.index, 8);
        assert_eq!(obj.ptr, 0x1000 + 8 * 32);

        let pass = layout.bind_pass(start, 32, 2).unwrap();
        assert_eq!(pass.index, 20);
        assert_eq!(pass.ptr, 0x1000 + 20 * 32);
    }

    #[test]
    fn test_cpu_handle_offset() {
        let handle = CpuDescriptorHandle::new(100, 0).offset(3, 8);
        assert_eq!(handle.ptr, 124);
        assert_eq!(handle.index, 3);
    }

    #[test]
    fn test_heap_descriptor() {
        let layout = CbvHeapLayout::new(22, 3).unwrap();
        let desc = DescriptorHeapDescriptor::cbv(&layout);
        assert_eq!(desc.num_descriptors, 69);
        assert!(desc.shader_visible);
        assert!(!DescriptorHeapDescriptor::rtv(2).shader_visible);
    }
}
