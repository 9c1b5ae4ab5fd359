//! DX12 缓冲区资源
//!
//! - [`Dx12UploadBuffer`]：上传堆上的持久映射缓冲区，帧资源的常量缓冲区用它实现
//! - [`create_default_buffer`]：通过中转缓冲把静态数据拷贝到默认堆

use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};

use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::device::MappedBuffer;

/// 持久映射的上传缓冲区
///
/// 创建时 Map，销毁时才 Unmap；GPU 仍在读取时 CPU 不能写入，
/// 这一点由帧资源的栅栏记录保证。
pub struct Dx12UploadBuffer {
    resource: ID3D12Resource,
    mapped: NonNull<u8>,
    element_byte_size: u64,
    element_count: usize,
}

impl Dx12UploadBuffer {
    pub fn new(device: &ID3D12Device, element_byte_size: u64, element_count: usize) -> Result<Self> {
        let byte_size = element_byte_size * element_count as u64;
        let resource = create_buffer(
            device,
            D3D12_HEAP_TYPE_UPLOAD,
            byte_size.max(1),
            D3D12_RESOURCE_STATE_GENERIC_READ,
        )?;

        let mut data = ptr::null_mut();
        unsafe {
            resource
                .Map(0, None, Some(&mut data))
                .map_err(|e| GraphicsError::ResourceCreation(format!("Failed to map upload buffer: {:?}", e)))?;
        }
        let mapped = NonNull::new(data as *mut u8).ok_or_else(|| {
            GraphicsError::ResourceCreation("Upload buffer mapped to a null pointer".to_string())
        })?;

        Ok(Self {
            resource,
            mapped,
            element_byte_size,
            element_count,
        })
    }

    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }
}

impl MappedBuffer for Dx12UploadBuffer {
    fn element_byte_size(&self) -> u64 {
        self.element_byte_size
    }

    fn element_count(&self) -> usize {
        self.element_count
    }

    fn gpu_virtual_address(&self) -> u64 {
        unsafe { self.resource.GetGPUVirtualAddress() }
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

        unsafe {
            let dst = self.mapped.as_ptr().add(index * self.element_byte_size as usize);
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        Ok(())
    }
}

impl Drop for Dx12UploadBuffer {
    fn drop(&mut self) {
        unsafe {
            self.resource.Unmap(0, None);
        }
    }
}

/// 默认堆缓冲区和它的中转缓冲
///
/// 中转缓冲必须保留到拷贝命令执行完毕。
pub struct DefaultBuffer {
    pub buffer: ID3D12Resource,
    pub upload: ID3D12Resource,
}

/// 录制把 `data` 拷贝到默认堆缓冲的命令
pub fn create_default_buffer(
    device: &ID3D12Device,
    command_list: &ID3D12GraphicsCommandList,
    data: &[u8],
) -> Result<DefaultBuffer> {
    let byte_size = data.len() as u64;
    let buffer = create_buffer(device, D3D12_HEAP_TYPE_DEFAULT, byte_size, D3D12_RESOURCE_STATE_COMMON)?;
    let upload = create_buffer(
        device,
        D3D12_HEAP_TYPE_UPLOAD,
        byte_size,
        D3D12_RESOURCE_STATE_GENERIC_READ,
    )?;

    unsafe {
        let mut mapped = ptr::null_mut();
        upload
            .Map(0, None, Some(&mut mapped))
            .map_err(|e| GraphicsError::ResourceCreation(format!("Failed to map staging buffer: {:?}", e)))?;
        ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
        upload.Unmap(0, None);
    }

    transition(command_list, &buffer, D3D12_RESOURCE_STATE_COMMON, D3D12_RESOURCE_STATE_COPY_DEST);
    unsafe {
        command_list.CopyBufferRegion(&buffer, 0, &upload, 0, byte_size);
    }
    transition(command_list, &buffer, D3D12_RESOURCE_STATE_COPY_DEST, D3D12_RESOURCE_STATE_GENERIC_READ);

    Ok(DefaultBuffer { buffer, upload })
}

/// 录制一个资源状态转换屏障
pub fn transition(
    command_list: &ID3D12GraphicsCommandList,
    resource: &ID3D12Resource,
    before: D3D12_RESOURCE_STATES,
    after: D3D12_RESOURCE_STATES,
) {
    let barrier = D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: ManuallyDrop::new(Some(resource.clone())),
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: before,
                StateAfter: after,
            }),
        },
    };

    unsafe {
        command_list.ResourceBarrier(std::slice::from_ref(&barrier));
        // 屏障里克隆的资源引用不会自动释放，否则交换链无法 ResizeBuffers
        let transition = ManuallyDrop::into_inner(barrier.Anonymous.Transition);
        drop(ManuallyDrop::into_inner(transition.pResource));
    }
}

fn create_buffer(
    device: &ID3D12Device,
    heap_type: D3D12_HEAP_TYPE,
    byte_size: u64,
    initial_state: D3D12_RESOURCE_STATES,
) -> Result<ID3D12Resource> {
    let heap_props = D3D12_HEAP_PROPERTIES {
        Type: heap_type,
        ..Default::default()
    };
    let resource_desc = D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Width: byte_size,
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: DXGI_FORMAT_UNKNOWN,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        ..Default::default()
    };

    let mut resource: Option<ID3D12Resource> = None;
    unsafe {
        device
            .CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &resource_desc,
                initial_state,
                None,
                &mut resource,
            )
            .map_err(|e| {
                GraphicsError::ResourceCreation(format!("Failed to create {} byte buffer: {:?}", byte_size, e))
            })?;
    }

    resource.ok_or_else(|| GraphicsError::ResourceCreation("Buffer was not created".to_string()).into())
}
