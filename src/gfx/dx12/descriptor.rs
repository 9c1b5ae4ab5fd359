//! DirectX 12 描述符堆
//!
//! 把 `renderer::descriptor` 中与 API 无关的描述和句柄映射到 `ID3D12DescriptorHeap`。

use windows::Win32::Graphics::Direct3D12::*;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::descriptor::{
    CpuDescriptorHandle, DescriptorHeapDescriptor, DescriptorType, GpuDescriptorHandle,
};

/// DX12 描述符堆
pub struct Dx12DescriptorHeap {
    heap: ID3D12DescriptorHeap,
    descriptor_type: DescriptorType,
    increment_size: u32,
    cpu_start: usize,
    /// 仅着色器可见的堆有 GPU 句柄
    gpu_start: Option<u64>,
    num_descriptors: u32,
}

impl Dx12DescriptorHeap {
    pub fn new(device: &ID3D12Device, desc: &DescriptorHeapDescriptor) -> Result<Self> {
        let heap_type = heap_type(desc.descriptor_type);
        let flags = if desc.shader_visible {
            D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
        } else {
            D3D12_DESCRIPTOR_HEAP_FLAG_NONE
        };

        let heap_desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: heap_type,
            NumDescriptors: desc.num_descriptors,
            Flags: flags,
            NodeMask: 0,
        };

        unsafe {
            let heap: ID3D12DescriptorHeap = device.CreateDescriptorHeap(&heap_desc).map_err(|e| {
                GraphicsError::ResourceCreation(format!(
                    "Failed to create {} descriptor heap ({} descriptors): {:?}",
                    desc.descriptor_type.name(),
                    desc.num_descriptors,
                    e
                ))
            })?;

            if let Some(name) = &desc.name {
                let wide_name: Vec<u16> = name.encode_utf16().chain(Some(0)).collect();
                let _ = heap.SetName(windows::core::PCWSTR(wide_name.as_ptr()));
            }

            let increment_size = device.GetDescriptorHandleIncrementSize(heap_type);
            let cpu_start = heap.GetCPUDescriptorHandleForHeapStart().ptr;
            let gpu_start = desc
                .shader_visible
                .then(|| heap.GetGPUDescriptorHandleForHeapStart().ptr);

            Ok(Self {
                heap,
                descriptor_type: desc.descriptor_type,
                increment_size,
                cpu_start,
                gpu_start,
                num_descriptors: desc.num_descriptors,
            })
        }
    }

    pub fn heap(&self) -> &ID3D12DescriptorHeap {
        &self.heap
    }

    pub fn descriptor_type(&self) -> DescriptorType {
        self.descriptor_type
    }

    pub fn increment_size(&self) -> u32 {
        self.increment_size
    }

    pub fn num_descriptors(&self) -> u32 {
        self.num_descriptors
    }

    /// 第 `index` 个描述符的 CPU 句柄
    pub fn cpu_handle(&self, index: u32) -> Result<CpuDescriptorHandle> {
        self.check_index(index)?;
        Ok(CpuDescriptorHandle::new(self.cpu_start, 0).offset(index, self.increment_size))
    }

    /// 第 `index` 个描述符的 GPU 句柄
    pub fn gpu_handle(&self, index: u32) -> Result<GpuDescriptorHandle> {
        self.check_index(index)?;
        let start = self.gpu_start.ok_or_else(|| {
            GraphicsError::ResourceCreation(format!(
                "{} heap is not shader visible",
                self.descriptor_type.name()
            ))
        })?;
        Ok(GpuDescriptorHandle::new(start, 0).offset(index, self.increment_size))
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if index >= self.num_descriptors {
            return Err(GraphicsError::ResourceCreation(format!(
                "{} heap index {} out of range ({} descriptors)",
                self.descriptor_type.name(),
                index,
                self.num_descriptors
            ))
            .into());
        }
        Ok(())
    }
}

fn heap_type(descriptor_type: DescriptorType) -> D3D12_DESCRIPTOR_HEAP_TYPE {
    match descriptor_type {
        DescriptorType::Rtv => D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
        DescriptorType::Dsv => D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
        DescriptorType::CbvSrvUav => D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
    }
}

/// 转换为 DX12 CPU 描述符句柄
pub fn to_dx12_cpu_handle(handle: CpuDescriptorHandle) -> D3D12_CPU_DESCRIPTOR_HANDLE {
    D3D12_CPU_DESCRIPTOR_HANDLE { ptr: handle.ptr }
}

/// 转换为 DX12 GPU 描述符句柄
pub fn to_dx12_gpu_handle(handle: GpuDescriptorHandle) -> D3D12_GPU_DESCRIPTOR_HANDLE {
    D3D12_GPU_DESCRIPTOR_HANDLE { ptr: handle.ptr }
}
