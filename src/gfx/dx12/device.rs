//! DirectX 12 设备
//!
//! 在 [`Dx12Context`] 之上实现 [`GpuDevice`]：帧循环提供的命令分配器、
//! 常量缓冲区和 CBV 堆布局在这里变成真正的 D3D12 对象和命令。
//!
//! 只有一个图形命令列表，每帧由当前帧资源的分配器重置后复用。

use std::time::Duration;

use tracing::{debug, info, trace};
use windows::core::Interface;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D::D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT_R16_UINT;
use winit::window::Window;

use super::buffer::{create_default_buffer, transition, Dx12UploadBuffer};
use super::context::Dx12Context;
use super::descriptor::{to_dx12_cpu_handle, to_dx12_gpu_handle, Dx12DescriptorHeap};
use super::pipeline::{
    create_pipeline_state, create_root_signature, OBJECT_CBV_ROOT_PARAMETER, PASS_CBV_ROOT_PARAMETER,
};
use crate::core::config::Config;
use crate::core::error::{GraphicsError, Result};
use crate::geometry::MeshGeometry;
use crate::gfx::device::{GpuDevice, SubmissionQueue};
use crate::renderer::command::FrameCommands;
use crate::renderer::descriptor::{CbvHeapLayout, DescriptorHeapDescriptor, GpuDescriptorHandle};
use crate::renderer::sync::FenceValue;

/// 共享顶点/索引缓冲
struct GeometryBuffers {
    vertex_buffer: ID3D12Resource,
    index_buffer: ID3D12Resource,
    vertex_buffer_view: D3D12_VERTEX_BUFFER_VIEW,
    index_buffer_view: D3D12_INDEX_BUFFER_VIEW,
}

/// 上传完成前必须保留的中转缓冲
struct Staging {
    buffers: Vec<ID3D12Resource>,
    /// 覆盖这次上传的栅栏值，Signal 之前为 None
    fence: Option<u64>,
}

/// DirectX 12 设备
pub struct Dx12Device {
    context: Dx12Context,
    root_signature: ID3D12RootSignature,
    pso: ID3D12PipelineState,
    command_list: ID3D12GraphicsCommandList,
    /// 只用于初始化上传
    upload_allocator: ID3D12CommandAllocator,
    recording: bool,

    cbv_heap: Option<Dx12DescriptorHeap>,
    cbv_descriptor_size: u32,
    geometry: Option<GeometryBuffers>,
    staging: Option<Staging>,

    viewport: D3D12_VIEWPORT,
    scissor_rect: RECT,
}

impl Dx12Device {
    pub fn new(window: &Window, config: &Config) -> Result<Self> {
        let context = Dx12Context::new(window, config)?;
        let device = &context.device;

        let root_signature = create_root_signature(device)?;
        let pso = create_pipeline_state(device, &root_signature)?;

        unsafe {
            let upload_allocator: ID3D12CommandAllocator = device
                .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)
                .map_err(|e| GraphicsError::ResourceCreation(format!("CreateCommandAllocator: {:?}", e)))?;

            let command_list: ID3D12GraphicsCommandList = device
                .CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &upload_allocator, Some(&pso))
                .map_err(|e| GraphicsError::ResourceCreation(format!("CreateCommandList: {:?}", e)))?;
            // 创建时处于录制状态，先关闭
            command_list
                .Close()
                .map_err(|e| GraphicsError::CommandExecution(format!("Close: {:?}", e)))?;

            let cbv_descriptor_size =
                device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV);

            let (width, height) = context.size();
            info!(width, height, "DX12 device ready");

            Ok(Self {
                context,
                root_signature,
                pso,
                command_list,
                upload_allocator,
                recording: false,
                cbv_heap: None,
                cbv_descriptor_size,
                geometry: None,
                staging: None,
                viewport: viewport(width, height),
                scissor_rect: scissor_rect(width, height),
            })
        }
    }

    fn cbv_heap(&self) -> Result<&Dx12DescriptorHeap> {
        self.cbv_heap
            .as_ref()
            .ok_or_else(|| GraphicsError::ResourceCreation("CBV heap has not been created".to_string()).into())
    }

    /// 上传完成后释放中转缓冲
    fn release_staging(&mut self) {
        if let Some(Staging { fence: Some(fence), .. }) = &self.staging {
            if self.context.completed_value() >= *fence {
                self.staging = None;
                debug!(fence_value = fence, "Geometry staging buffers released");
            }
        }
    }
}

impl SubmissionQueue for Dx12Device {
    fn execute_command_list(&mut self) -> Result<()> {
        if self.recording {
            return Err(GraphicsError::Submission("Command list is still open".to_string()).into());
        }

        let list: ID3D12CommandList = self
            .command_list
            .cast()
            .map_err(|e| GraphicsError::Submission(format!("ID3D12CommandList: {:?}", e)))?;
        unsafe {
            self.context.command_queue.ExecuteCommandLists(&[Some(list)]);
        }
        Ok(())
    }

    fn signal(&mut self, value: FenceValue) -> Result<()> {
        self.context.signal(value.value())?;
        if let Some(staging) = &mut self.staging {
            staging.fence.get_or_insert(value.value());
        }
        Ok(())
    }

    fn completed_value(&self) -> FenceValue {
        FenceValue::new(self.context.completed_value())
    }

    fn wait_for_value(&self, target: FenceValue, timeout: Option<Duration>) -> Result<bool> {
        self.context.wait_for_fence(target.value(), timeout)
    }
}

impl GpuDevice for Dx12Device {
    type CommandAllocator = ID3D12CommandAllocator;
    type UploadBuffer = Dx12UploadBuffer;

    fn backend_name(&self) -> &str {
        "DirectX 12"
    }

    fn size(&self) -> (u32, u32) {
        self.context.size()
    }

    fn create_command_allocator(&mut self) -> Result<Self::CommandAllocator> {
        unsafe {
            self.context
                .device
                .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)
                .map_err(|e| GraphicsError::ResourceCreation(format!("CreateCommandAllocator: {:?}", e)).into())
        }
    }

    fn create_upload_buffer(
        &mut self,
        element_byte_size: u64,
        element_count: usize,
    ) -> Result<Self::UploadBuffer> {
        Dx12UploadBuffer::new(&self.context.device, element_byte_size, element_count)
    }

    fn upload_geometry(&mut self, geometry: &MeshGeometry) -> Result<()> {
        unsafe {
            self.upload_allocator
                .Reset()
                .map_err(|e| GraphicsError::CommandExecution(format!("Reset upload allocator: {:?}", e)))?;
            self.command_list
                .Reset(&self.upload_allocator, Some(&self.pso))
                .map_err(|e| GraphicsError::CommandExecution(format!("Reset command list: {:?}", e)))?;
        }

        let device = &self.context.device;
        let vb = create_default_buffer(device, &self.command_list, geometry.vertex_bytes())?;
        let ib = create_default_buffer(device, &self.command_list, geometry.index_bytes())?;

        unsafe {
            self.command_list
                .Close()
                .map_err(|e| GraphicsError::CommandExecution(format!("Close: {:?}", e)))?;
        }
        self.execute_command_list()?;

        let vertex_buffer_view = D3D12_VERTEX_BUFFER_VIEW {
            BufferLocation: unsafe { vb.buffer.GetGPUVirtualAddress() },
            SizeInBytes: geometry.vertex_buffer_byte_size(),
            StrideInBytes: geometry.vertex_byte_stride(),
        };
        let index_buffer_view = D3D12_INDEX_BUFFER_VIEW {
            BufferLocation: unsafe { ib.buffer.GetGPUVirtualAddress() },
            SizeInBytes: geometry.index_buffer_byte_size(),
            Format: DXGI_FORMAT_R16_UINT,
        };

        self.geometry = Some(GeometryBuffers {
            vertex_buffer: vb.buffer,
            index_buffer: ib.buffer,
            vertex_buffer_view,
            index_buffer_view,
        });
        self.staging = Some(Staging {
            buffers: vec![vb.upload, ib.upload],
            fence: None,
        });

        debug!(
            name = %geometry.name,
            vertex_bytes = geometry.vertex_buffer_byte_size(),
            index_bytes = geometry.index_buffer_byte_size(),
            "Geometry upload submitted"
        );
        Ok(())
    }

    fn create_cbv_heap(&mut self, layout: &CbvHeapLayout) -> Result<()> {
        let heap = Dx12DescriptorHeap::new(&self.context.device, &DescriptorHeapDescriptor::cbv(layout))?;
        debug!(num_descriptors = heap.num_descriptors(), "CBV heap created");
        self.cbv_heap = Some(heap);
        Ok(())
    }

    fn create_constant_buffer_view(
        &mut self,
        heap_index: u32,
        gpu_address: u64,
        size_in_bytes: u32,
    ) -> Result<()> {
        let handle = to_dx12_cpu_handle(self.cbv_heap()?.cpu_handle(heap_index)?);
        let desc = D3D12_CONSTANT_BUFFER_VIEW_DESC {
            BufferLocation: gpu_address,
            SizeInBytes: size_in_bytes,
        };
        unsafe {
            self.context.device.CreateConstantBufferView(Some(&desc), handle);
        }
        Ok(())
    }

    fn cbv_heap_start(&self) -> Result<GpuDescriptorHandle> {
        self.cbv_heap()?.gpu_handle(0)
    }

    fn cbv_descriptor_size(&self) -> u32 {
        self.cbv_descriptor_size
    }

    fn reset_commands(&mut self, allocator: &mut Self::CommandAllocator) -> Result<()> {
        if self.recording {
            return Err(GraphicsError::CommandExecution("Command list is already recording".to_string()).into());
        }
        self.release_staging();

        unsafe {
            allocator
                .Reset()
                .map_err(|e| GraphicsError::CommandExecution(format!("Reset command allocator: {:?}", e)))?;
            self.command_list
                .Reset(&*allocator, Some(&self.pso))
                .map_err(|e| GraphicsError::CommandExecution(format!("Reset command list: {:?}", e)))?;
        }
        self.recording = true;
        Ok(())
    }

    fn record_frame(&mut self, frame: &FrameCommands) -> Result<()> {
        if !self.recording {
            return Err(GraphicsError::CommandExecution("Command list is not recording".to_string()).into());
        }
        let geometry = self.geometry.as_ref().ok_or_else(|| {
            GraphicsError::CommandExecution("Geometry has not been uploaded".to_string())
        })?;
        let heap = self.cbv_heap()?;

        let back_buffer = self.context.current_back_buffer()?;
        let rtv = self.context.current_back_buffer_view()?;
        let dsv = self.context.depth_stencil_view()?;
        let list = &self.command_list;

        transition(list, back_buffer, D3D12_RESOURCE_STATE_PRESENT, D3D12_RESOURCE_STATE_RENDER_TARGET);

        unsafe {
            list.RSSetViewports(&[self.viewport]);
            list.RSSetScissorRects(&[self.scissor_rect]);

            list.ClearRenderTargetView(rtv, &frame.clear_color, None);
            list.ClearDepthStencilView(
                dsv,
                D3D12_CLEAR_FLAG_DEPTH | D3D12_CLEAR_FLAG_STENCIL,
                1.0,
                0,
                None,
            );
            list.OMSetRenderTargets(1, Some(&rtv), true, Some(&dsv));

            list.SetDescriptorHeaps(&[Some(heap.heap().clone())]);
            list.SetGraphicsRootSignature(&self.root_signature);
            list.SetGraphicsRootDescriptorTable(PASS_CBV_ROOT_PARAMETER, to_dx12_gpu_handle(frame.pass_cbv));

            list.IASetVertexBuffers(0, Some(&[geometry.vertex_buffer_view]));
            list.IASetIndexBuffer(Some(&geometry.index_buffer_view));
            list.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);

            for draw in &frame.draws {
                list.SetGraphicsRootDescriptorTable(OBJECT_CBV_ROOT_PARAMETER, to_dx12_gpu_handle(draw.object_cbv));
                list.DrawIndexedInstanced(
                    draw.submesh.index_count,
                    1,
                    draw.submesh.start_index_location,
                    draw.submesh.base_vertex_location,
                    0,
                );
            }
        }

        transition(list, back_buffer, D3D12_RESOURCE_STATE_RENDER_TARGET, D3D12_RESOURCE_STATE_PRESENT);

        trace!(
            frame_index = frame.frame_index,
            draws = frame.draw_count(),
            back_buffer = self.context.back_buffer_index(),
            "Frame recorded"
        );
        Ok(())
    }

    fn close_commands(&mut self) -> Result<()> {
        unsafe {
            self.command_list
                .Close()
                .map_err(|e| GraphicsError::CommandExecution(format!("Close: {:?}", e)))?;
        }
        self.recording = false;
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.context.present()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.context.resize(width, height)?;
        let (width, height) = self.context.size();
        self.viewport = viewport(width, height);
        self.scissor_rect = scissor_rect(width, height);
        Ok(())
    }
}

fn viewport(width: u32, height: u32) -> D3D12_VIEWPORT {
    D3D12_VIEWPORT {
        TopLeftX: 0.0,
        TopLeftY: 0.0,
        Width: width as f32,
        Height: height as f32,
        MinDepth: 0.0,
        MaxDepth: 1.0,
    }
}

fn scissor_rect(width: u32, height: u32) -> RECT {
    RECT {
        left: 0,
        top: 0,
        right: width as i32,
        bottom: height as i32,
    }
}
