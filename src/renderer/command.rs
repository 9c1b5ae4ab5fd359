//! 一帧的绘制命令描述
//!
//! 帧循环只负责算出"画什么、用哪个描述符"，
//! 具体的命令录制（视口、清屏、根签名、资源屏障）由设备实现。

use crate::geometry::SubmeshGeometry;
use crate::renderer::descriptor::GpuDescriptorHandle;

/// 一次索引绘制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawItem {
    /// 根参数 0 (b0) 绑定的对象 CBV
    pub object_cbv: GpuDescriptorHandle,
    pub submesh: SubmeshGeometry,
}

/// 一帧要录制的全部命令
#[derive(Debug, Clone)]
pub struct FrameCommands {
    /// 当前帧资源索引
    pub frame_index: usize,
    pub clear_color: [f32; 4],
    /// 根参数 1 (b1) 绑定的 Pass CBV
    pub pass_cbv: GpuDescriptorHandle,
    pub draws: Vec<DrawItem>,
}

impl FrameCommands {
    pub fn new(frame_index: usize, clear_color: [f32; 4], pass_cbv: GpuDescriptorHandle) -> Self {
        Self {
            frame_index,
            clear_color,
            pass_cbv,
            draws: Vec::new(),
        }
    }

    pub fn push_draw(&mut self, object_cbv: GpuDescriptorHandle, submesh: SubmeshGeometry) {
        self.draws.push(DrawItem { object_cbv, submesh });
    }

    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    pub fn total_index_count(&self) -> u64 {
        self.draws.iter().map(|d| d.submesh.index_count as u64).sum()
    }
}
