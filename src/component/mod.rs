//! 组件模块
//!
//! - `camera`：环绕相机
//! - `render_item`：渲染项（世界矩阵 + 子网格 + 脏计数）

mod camera;
mod render_item;

pub use camera::OrbitCamera;
pub use render_item::RenderItem;
