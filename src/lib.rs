//! ShapeRender - 帧资源环 + CPU/GPU 栅栏同步
//!
//! 一个绘制 22 个形状的 DirectX 12 示例，核心是让 CPU 领先 GPU 若干帧：
//! 每一帧的命令分配器和常量缓冲区都属于环中的一个帧资源，
//! 只有当 GPU 完成该帧资源上次提交的工作后才会被覆写。
//!
//! # 模块结构
//!
//! - `core`: 日志、配置、错误处理、计时器、输入
//! - `math`: nalgebra 类型别名和左手系矩阵
//! - `geometry`: 程序化几何体与共享顶点/索引缓冲
//! - `component`: 环绕相机、渲染项
//! - `scene`: 渲染项注册表和形状场景
//! - `gfx`: 设备抽象（DirectX 12 / 无窗口模拟设备）
//! - `renderer`: 栅栏门、帧资源环、CBV 堆布局、帧循环
//!
//! # 使用示例
//!
//! ```no_run
//! use std::time::Duration;
//! use shape_render::core::{Config, GameTimer};
//! use shape_render::gfx::headless::HeadlessDevice;
//! use shape_render::renderer::{run_frames, RenderApp, ShapeApp};
//!
//! # fn main() -> shape_render::core::Result<()> {
//! let config = Config::default();
//! let device = HeadlessDevice::new(800, 600, Duration::from_millis(2))?;
//! let mut app = ShapeApp::new(device, &config)?;
//! app.initialize()?;
//!
//! let mut timer = GameTimer::new();
//! run_frames(&mut app, &mut timer, 100)?;
//! app.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod math;
pub mod geometry;
pub mod component;
pub mod scene;
pub mod gfx;
pub mod renderer;
