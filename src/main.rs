//! ShapeRender - 帧资源环 + 栅栏流水线的形状渲染器
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件（默认 config.toml）
//! cargo run
//!
//! # 无窗口模拟 GPU，跑 120 帧，4 个帧资源
//! cargo run -- --headless --frames 120 --frame-resources 4
//!
//! # DirectX 12 窗口（仅 Windows）
//! cargo run -- --dx12
//! ```

use std::time::Duration;

use anyhow::Context;
use tracing::info;

use shape_render::core::config::{Config, GraphicsBackend};
use shape_render::core::{log, GameTimer};
use shape_render::gfx::HeadlessDevice;
use shape_render::renderer::{run_frames, RenderApp, ShapeApp};

/// 应用程序入口点
///
/// 1. 加载配置文件并应用命令行参数覆盖
/// 2. 初始化日志系统
/// 3. 按后端创建设备和 `ShapeApp`，进入帧循环
/// 4. 退出前 flush，确保 GPU 不再引用任何帧资源
fn main() -> anyhow::Result<()> {
    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(std::env::args());
    config.validate().context("Invalid configuration")?;

    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file)?;

    info!(version = env!("CARGO_PKG_VERSION"), "ShapeRender starting...");
    info!(
        backend = ?config.graphics.backend,
        frame_resources = config.frames.frame_resources,
        fence_timeout_ms = ?config.frames.fence_timeout_ms,
        "Frame configuration"
    );

    match config.graphics.backend {
        GraphicsBackend::Headless => run_headless(&config),
        GraphicsBackend::Dx12 => run_windowed(&config),
    }
}

/// 在模拟 GPU 上跑固定帧数
fn run_headless(config: &Config) -> anyhow::Result<()> {
    let latency = Duration::from_millis(config.headless.gpu_latency_ms);
    let device = HeadlessDevice::new(config.headless.width, config.headless.height, latency)?;

    let mut app = ShapeApp::new(device, config)?;
    app.initialize()?;

    let mut timer = GameTimer::new();
    let result = run_frames(&mut app, &mut timer, config.headless.frame_count);
    app.shutdown()?;
    let stats = result?;

    let device_stats = app.device().stats();
    info!(
        frames = stats.frames,
        lists_executed = device_stats.lists_executed,
        draws_recorded = device_stats.draws_recorded,
        presents = device_stats.presents,
        fence = app.fence_gate().current_value().value(),
        "Headless run complete"
    );
    Ok(())
}

#[cfg(target_os = "windows")]
fn run_windowed(config: &Config) -> anyhow::Result<()> {
    use shape_render::core::InputSystem;
    use shape_render::gfx::Dx12Device;
    use tracing::{debug, error};
    use winit::dpi::PhysicalSize;
    use winit::event::{Event, WindowEvent};
    use winit::event_loop::EventLoop;
    use winit::window::WindowBuilder;

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title(config.window.title.as_str())
        .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
        .with_resizable(config.window.resizable)
        .build(&event_loop)?;

    let device = Dx12Device::new(&window, config)?;
    let mut app = ShapeApp::new(device, config)?;
    app.initialize()?;

    let mut input = InputSystem::new();
    let mut timer = GameTimer::new();
    timer.reset();

    info!("Entering main loop...");

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down...");
                if let Err(e) = app.shutdown() {
                    error!("Shutdown failed: {}", e);
                }
                elwt.exit();
            }
            WindowEvent::Resized(size) => {
                debug!(width = size.width, height = size.height, "Window resized");
                if size.width > 0 && size.height > 0 {
                    if let Err(e) = app.on_resize(size.width, size.height) {
                        error!("Resize failed: {}", e);
                        elwt.exit();
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                input.on_mouse_button(app.camera_mut(), button, state);
            }
            WindowEvent::CursorMoved { position, .. } => {
                input.on_cursor_moved(app.camera_mut(), (position.x, position.y));
            }
            WindowEvent::RedrawRequested => {
                timer.tick();
                let frame = app.update(&timer).and_then(|_| app.draw(&timer));
                if let Err(e) = frame {
                    // 栅栏超时按设备丢失处理，直接退出
                    error!("Frame failed: {}", e);
                    elwt.exit();
                }
            }
            _ => (),
        },
        Event::AboutToWait => window.request_redraw(),
        _ => (),
    })?;

    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn run_windowed(_config: &Config) -> anyhow::Result<()> {
    anyhow::bail!("The DirectX 12 backend is only available on Windows; run with --headless")
}
