//! DirectX 12 基础设施
//!
//! 设备、命令队列、交换链、RTV/DSV 堆、深度缓冲和唯一的栅栏对象。
//!
//! # 初始化流程
//!
//! 1. 启用调试层（Debug 模式）
//! 2. 创建 DXGI 工厂和 D3D12 设备
//! 3. 创建命令队列和交换链
//! 4. 创建 RTV/DSV 堆、渲染目标视图和深度缓冲
//! 5. 创建栅栏和等待事件

use std::time::Duration;

use tracing::{debug, info, warn};
use windows::{
    core::Interface,
    Win32::Foundation::{CloseHandle, HANDLE, HWND, WAIT_OBJECT_0, WAIT_TIMEOUT},
    Win32::Graphics::Direct3D::*,
    Win32::Graphics::Direct3D12::*,
    Win32::Graphics::Dxgi::Common::*,
    Win32::Graphics::Dxgi::*,
    Win32::System::Threading::{CreateEventA, WaitForSingleObject, INFINITE},
};
use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::window::Window;

use super::descriptor::{to_dx12_cpu_handle, Dx12DescriptorHeap};
use crate::core::config::Config;
use crate::core::error::{GraphicsError, Result};
use crate::renderer::descriptor::DescriptorHeapDescriptor;

/// 交换链缓冲数量
pub const SWAP_CHAIN_BUFFER_COUNT: u32 = 2;
pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;
pub const DEPTH_STENCIL_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D24_UNORM_S8_UINT;

/// DirectX 12 上下文
pub struct Dx12Context {
    pub device: ID3D12Device,
    pub command_queue: ID3D12CommandQueue,
    pub swap_chain: IDXGISwapChain3,
    pub rtv_heap: Dx12DescriptorHeap,
    pub dsv_heap: Dx12DescriptorHeap,
    back_buffers: Vec<ID3D12Resource>,
    depth_stencil_buffer: Option<ID3D12Resource>,
    back_buffer_index: u32,
    fence: ID3D12Fence,
    fence_event: HANDLE,
    width: u32,
    height: u32,
    vsync: bool,
}

impl Dx12Context {
    pub fn new(window: &Window, config: &Config) -> Result<Self> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        let hwnd = window_hwnd(window)?;

        unsafe {
            #[cfg(debug_assertions)]
            {
                let mut debug_interface: Option<ID3D12Debug> = None;
                match D3D12GetDebugInterface(&mut debug_interface) {
                    Ok(()) => {
                        if let Some(debug_interface) = debug_interface {
                            debug_interface.EnableDebugLayer();
                            debug!("DX12 Debug Layer enabled");
                        }
                    }
                    Err(e) => warn!(error = ?e, "Failed to enable DX12 Debug Layer"),
                }
            }

            let factory_flags = if cfg!(debug_assertions) {
                DXGI_CREATE_FACTORY_DEBUG
            } else {
                DXGI_CREATE_FACTORY_FLAGS(0)
            };
            let factory: IDXGIFactory4 = CreateDXGIFactory2(factory_flags)
                .map_err(|e| GraphicsError::DeviceCreation(format!("CreateDXGIFactory2: {:?}", e)))?;

            let mut device: Option<ID3D12Device> = None;
            D3D12CreateDevice(None, D3D_FEATURE_LEVEL_11_0, &mut device)
                .map_err(|e| GraphicsError::DeviceCreation(format!("D3D12CreateDevice: {:?}", e)))?;
            let device = device.ok_or_else(|| {
                GraphicsError::DeviceCreation("D3D12CreateDevice returned no device".to_string())
            })?;

            let queue_desc = D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                ..Default::default()
            };
            let command_queue: ID3D12CommandQueue = device
                .CreateCommandQueue(&queue_desc)
                .map_err(|e| GraphicsError::DeviceCreation(format!("CreateCommandQueue: {:?}", e)))?;

            let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
                Width: width,
                Height: height,
                Format: BACK_BUFFER_FORMAT,
                SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
                BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                BufferCount: SWAP_CHAIN_BUFFER_COUNT,
                SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
                ..Default::default()
            };
            let swap_chain: IDXGISwapChain1 = factory
                .CreateSwapChainForHwnd(&command_queue, hwnd, &swap_chain_desc, None, None)
                .map_err(|e| GraphicsError::SwapchainError(format!("CreateSwapChainForHwnd: {:?}", e)))?;
            let swap_chain: IDXGISwapChain3 = swap_chain
                .cast()
                .map_err(|e| GraphicsError::SwapchainError(format!("IDXGISwapChain3: {:?}", e)))?;

            let rtv_heap = Dx12DescriptorHeap::new(
                &device,
                &DescriptorHeapDescriptor::rtv(SWAP_CHAIN_BUFFER_COUNT),
            )?;
            let dsv_heap = Dx12DescriptorHeap::new(&device, &DescriptorHeapDescriptor::dsv(1))?;

            let fence: ID3D12Fence = device
                .CreateFence(0, D3D12_FENCE_FLAG_NONE)
                .map_err(|e| GraphicsError::DeviceCreation(format!("CreateFence: {:?}", e)))?;
            let fence_event = CreateEventA(None, false, false, None)
                .map_err(|e| GraphicsError::DeviceCreation(format!("CreateEventA: {:?}", e)))?;

            let mut context = Self {
                device,
                command_queue,
                swap_chain,
                rtv_heap,
                dsv_heap,
                back_buffers: Vec::new(),
                depth_stencil_buffer: None,
                back_buffer_index: 0,
                fence,
                fence_event,
                width,
                height,
                vsync: config.graphics.vsync,
            };
            context.create_size_dependent_resources()?;

            info!(width, height, buffers = SWAP_CHAIN_BUFFER_COUNT, "DX12 context initialized");
            Ok(context)
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn back_buffer_index(&self) -> u32 {
        self.back_buffer_index
    }

    pub fn current_back_buffer(&self) -> Result<&ID3D12Resource> {
        self.back_buffers
            .get(self.back_buffer_index as usize)
            .ok_or_else(|| GraphicsError::SwapchainError("Back buffers not created".to_string()).into())
    }

    pub fn current_back_buffer_view(&self) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        Ok(to_dx12_cpu_handle(self.rtv_heap.cpu_handle(self.back_buffer_index)?))
    }

    pub fn depth_stencil_view(&self) -> Result<D3D12_CPU_DESCRIPTOR_HANDLE> {
        Ok(to_dx12_cpu_handle(self.dsv_heap.cpu_handle(0)?))
    }

    pub fn signal(&self, value: u64) -> Result<()> {
        unsafe {
            self.command_queue
                .Signal(&self.fence, value)
                .map_err(|e| GraphicsError::Submission(format!("Signal({}): {:?}", value, e)).into())
        }
    }

    pub fn completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    /// 一次性等待栅栏达到 `target`
    ///
    /// 返回 `Ok(false)` 表示超时。
    pub fn wait_for_fence(&self, target: u64, timeout: Option<Duration>) -> Result<bool> {
        if self.completed_value() >= target {
            return Ok(true);
        }

        let millis = timeout.map_or(INFINITE, |t| t.as_millis().min(u32::MAX as u128 - 1) as u32);

        unsafe {
            self.fence
                .SetEventOnCompletion(target, self.fence_event)
                .map_err(|e| GraphicsError::DeviceLost(format!("SetEventOnCompletion: {:?}", e)))?;

            match WaitForSingleObject(self.fence_event, millis) {
                WAIT_OBJECT_0 => Ok(true),
                WAIT_TIMEOUT => Ok(false),
                other => Err(GraphicsError::DeviceLost(format!(
                    "WaitForSingleObject returned {:?} while waiting for fence {}",
                    other, target
                ))
                .into()),
            }
        }
    }

    /// 呈现当前后台缓冲并切换到下一个
    pub fn present(&mut self) -> Result<()> {
        let sync_interval = if self.vsync { 1 } else { 0 };
        unsafe {
            self.swap_chain
                .Present(sync_interval, DXGI_PRESENT(0))
                .ok()
                .map_err(|e| {
                    if e.code() == DXGI_ERROR_DEVICE_REMOVED || e.code() == DXGI_ERROR_DEVICE_RESET {
                        GraphicsError::DeviceLost(format!("Present: {:?}", e))
                    } else {
                        GraphicsError::SwapchainError(format!("Present: {:?}", e))
                    }
                })?;
            self.back_buffer_index = self.swap_chain.GetCurrentBackBufferIndex();
        }
        Ok(())
    }

    /// 调整交换链和深度缓冲尺寸
    ///
    /// 调用前 GPU 必须空闲。
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width.max(1);
        self.height = height.max(1);

        // ResizeBuffers 要求先释放所有后台缓冲引用
        self.back_buffers.clear();
        self.depth_stencil_buffer = None;

        unsafe {
            self.swap_chain
                .ResizeBuffers(
                    SWAP_CHAIN_BUFFER_COUNT,
                    self.width,
                    self.height,
                    BACK_BUFFER_FORMAT,
                    DXGI_SWAP_CHAIN_FLAG(0),
                )
                .map_err(|e| GraphicsError::SwapchainError(format!("ResizeBuffers: {:?}", e)))?;
        }

        self.create_size_dependent_resources()?;
        debug!(width = self.width, height = self.height, "Swap chain resized");
        Ok(())
    }

    fn create_size_dependent_resources(&mut self) -> Result<()> {
        unsafe {
            for i in 0..SWAP_CHAIN_BUFFER_COUNT {
                let surface: ID3D12Resource = self
                    .swap_chain
                    .GetBuffer(i)
                    .map_err(|e| GraphicsError::SwapchainError(format!("GetBuffer({}): {:?}", i, e)))?;
                let handle = to_dx12_cpu_handle(self.rtv_heap.cpu_handle(i)?);
                self.device.CreateRenderTargetView(&surface, None, handle);
                self.back_buffers.push(surface);
            }

            let depth_heap_props = D3D12_HEAP_PROPERTIES {
                Type: D3D12_HEAP_TYPE_DEFAULT,
                ..Default::default()
            };
            let depth_desc = D3D12_RESOURCE_DESC {
                Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
                Width: self.width as u64,
                Height: self.height,
                DepthOrArraySize: 1,
                MipLevels: 1,
                Format: DEPTH_STENCIL_FORMAT,
                SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
                Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
                Flags: D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
                ..Default::default()
            };
            let clear_value = D3D12_CLEAR_VALUE {
                Format: DEPTH_STENCIL_FORMAT,
                Anonymous: D3D12_CLEAR_VALUE_0 {
                    DepthStencil: D3D12_DEPTH_STENCIL_VALUE { Depth: 1.0, Stencil: 0 },
                },
            };

            let mut depth_buffer: Option<ID3D12Resource> = None;
            self.device
                .CreateCommittedResource(
                    &depth_heap_props,
                    D3D12_HEAP_FLAG_NONE,
                    &depth_desc,
                    D3D12_RESOURCE_STATE_DEPTH_WRITE,
                    Some(&clear_value),
                    &mut depth_buffer,
                )
                .map_err(|e| GraphicsError::ResourceCreation(format!("Depth stencil buffer: {:?}", e)))?;
            let depth_buffer = depth_buffer.ok_or_else(|| {
                GraphicsError::ResourceCreation("Depth stencil buffer was not created".to_string())
            })?;

            self.device
                .CreateDepthStencilView(&depth_buffer, None, self.depth_stencil_view()?);
            self.depth_stencil_buffer = Some(depth_buffer);

            self.back_buffer_index = self.swap_chain.GetCurrentBackBufferIndex();
        }
        Ok(())
    }
}

impl Drop for Dx12Context {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = CloseHandle(self.fence_event) {
                warn!(error = ?e, "Failed to close fence event");
            }
        }
    }
}

/// 从 winit 窗口取得 HWND
fn window_hwnd(window: &Window) -> Result<HWND> {
    let handle = window
        .window_handle()
        .map_err(|e| GraphicsError::DeviceCreation(format!("Window handle unavailable: {}", e)))?;

    match handle.as_raw() {
        RawWindowHandle::Win32(win32) => Ok(HWND(win32.hwnd.get() as *mut std::ffi::c_void)),
        _ => Err(GraphicsError::DeviceCreation("Expected a Win32 window handle".to_string()).into()),
    }
}
