//! 渲染项
//!
//! 绘制一个形状所需的最少数据：世界矩阵、对象常量索引、子网格绘制参数，
//! 以及"还有几个帧资源持有旧的世界矩阵"的计数。

use crate::geometry::SubmeshGeometry;
use crate::math::Matrix4;

/// 渲染项
#[derive(Debug, Clone)]
pub struct RenderItem {
    name: String,
    world: Matrix4,
    /// 在每个帧资源对象常量缓冲中的位置
    obj_cb_index: u32,
    submesh: SubmeshGeometry,
    /// 还需要刷新的帧资源数量
    num_frames_dirty: u32,
    frame_count: u32,
}

impl RenderItem {
    /// 新建的渲染项在所有帧资源中都是脏的
    pub fn new(
        name: impl Into<String>,
        world: Matrix4,
        obj_cb_index: u32,
        submesh: SubmeshGeometry,
        frame_count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            world,
            obj_cb_index,
            submesh,
            num_frames_dirty: frame_count,
            frame_count,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world(&self) -> &Matrix4 {
        &self.world
    }

    pub fn obj_cb_index(&self) -> u32 {
        self.obj_cb_index
    }

    pub fn submesh(&self) -> &SubmeshGeometry {
        &self.submesh
    }

    pub fn num_frames_dirty(&self) -> u32 {
        self.num_frames_dirty
    }

    pub fn is_dirty(&self) -> bool {
        self.num_frames_dirty > 0
    }

    /// 修改世界矩阵，计数重置为帧资源数量（不是累加）
    pub fn set_world(&mut self, world: Matrix4) {
        self.world = world;
        self.num_frames_dirty = self.frame_count;
    }

    /// 当前世界矩阵已写入一个帧资源
    pub fn mark_refreshed(&mut self) {
        debug_assert!(self.num_frames_dirty > 0, "render item '{}' is not dirty", self.name);
        self.num_frames_dirty = self.num_frames_dirty.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> RenderItem {
        RenderItem::new("box", Matrix4::identity(), 0, SubmeshGeometry::default(), 3)
    }

    #[test]
    fn test_new_item_dirty_for_every_frame() {
        let item = item();
        assert_eq!(item.num_frames_dirty(), 3);
        assert!(item.is_dirty());
    }

    #[test]
    fn test_set_world_resets_not_adds() {
        let mut item = item();
        item.mark_refreshed();
        item.mark_refreshed();
        assert_eq!(item.num_frames_dirty(), 1);

        item.set_world(Matrix4::new_scaling(2.0));
        assert_eq!(item.num_frames_dirty(), 3);

        item.set_world(Matrix4::new_scaling(3.0));
        assert_eq!(item.num_frames_dirty(), 3);
    }
}
