//! 渲染器模块
//!
//! 与具体图形 API 无关的帧循环核心，只通过 `gfx::device` 中的 trait 访问设备。
//!
//! # 架构设计
//!
//! - `sync`：栅栏门，唯一的 CPU 侧栅栏计数器和每槽位的状态机
//! - `resource`：帧资源环（命令分配器 + 对象/Pass 常量缓冲区）
//! - `descriptor`：CBV 堆布局，建堆和绑定共用同一套索引公式
//! - `constants`：常量缓冲区的内存布局
//! - `command`：一帧的绘制命令描述
//! - `app`：宿主驱动的应用接口
//! - `shape_app`：形状应用

pub mod sync;
pub mod resource;
pub mod descriptor;
pub mod constants;
pub mod command;
pub mod app;
pub mod shape_app;

pub use app::{run_frames, RenderApp, RunStats};
pub use command::{DrawItem, FrameCommands};
pub use constants::{ObjectConstants, PassConstants};
pub use descriptor::{CbvHeapLayout, GpuDescriptorHandle};
pub use resource::{FrameResource, FrameRing, UploadBuffer};
pub use shape_app::ShapeApp;
pub use sync::{FenceGate, FenceValue, SlotState, SlotTracker};
