//! 场景模块
//!
//! 渲染项的注册表。对象数量在建立 CBV 堆时封存，
//! 之后只能修改已有渲染项的世界矩阵，不能再添加。

pub mod shapes;

use tracing::trace;

use crate::component::RenderItem;
use crate::core::error::{CapacityError, Result};
use crate::geometry::SubmeshGeometry;
use crate::gfx::device::GpuDevice;
use crate::math::Matrix4;
use crate::renderer::constants::ObjectConstants;
use crate::renderer::descriptor::CbvHeapLayout;
use crate::renderer::resource::FrameResource;

/// 渲染项注册表
#[derive(Debug)]
pub struct Scene {
    items: Vec<RenderItem>,
    frame_count: u32,
    layout: Option<CbvHeapLayout>,
}

impl Scene {
    pub fn new(frame_count: usize) -> Result<Self> {
        if frame_count == 0 {
            return Err(CapacityError::InvalidFrameCount(frame_count).into());
        }

        Ok(Self {
            items: Vec::new(),
            frame_count: frame_count as u32,
            layout: None,
        })
    }

    /// 添加渲染项，返回分配的对象常量索引
    pub fn add_item(
        &mut self,
        name: impl Into<String>,
        world: Matrix4,
        submesh: SubmeshGeometry,
    ) -> Result<u32> {
        if let Some(layout) = &self.layout {
            return Err(CapacityError::HeapSealed {
                object_count: layout.object_count(),
            }
            .into());
        }

        let index = self.items.len() as u32;
        self.items
            .push(RenderItem::new(name, world, index, submesh, self.frame_count));
        Ok(index)
    }

    /// 封存对象数量，返回 CBV 堆布局
    ///
    /// 重复调用返回同一个布局。
    pub fn seal(&mut self) -> Result<CbvHeapLayout> {
        if let Some(layout) = self.layout {
            return Ok(layout);
        }

        let layout = CbvHeapLayout::new(self.object_count(), self.frame_count as usize)?;
        self.layout = Some(layout);
        Ok(layout)
    }

    pub fn is_sealed(&self) -> bool {
        self.layout.is_some()
    }

    pub fn layout(&self) -> Option<CbvHeapLayout> {
        self.layout
    }

    pub fn object_count(&self) -> u32 {
        self.items.len() as u32
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    pub fn item(&self, index: u32) -> Result<&RenderItem> {
        self.items.get(index as usize).ok_or_else(|| {
            CapacityError::ObjectIndexOutOfRange {
                index,
                object_count: self.object_count(),
            }
            .into()
        })
    }

    /// 修改渲染项的世界矩阵，随后的 N 次更新会把它传播到所有帧资源
    pub fn set_world(&mut self, index: u32, world: Matrix4) -> Result<()> {
        let object_count = self.object_count();
        let item = self.items.get_mut(index as usize).ok_or(
            CapacityError::ObjectIndexOutOfRange {
                index,
                object_count,
            },
        )?;
        item.set_world(world);
        Ok(())
    }

    /// 把所有脏渲染项写入当前帧资源，每写一次脏计数减一
    ///
    /// 返回本次写入的渲染项数量。
    pub fn update_object_constants<D: GpuDevice>(
        &mut self,
        frame: &mut FrameResource<D>,
    ) -> Result<usize> {
        let mut written = 0;
        for item in self.items.iter_mut().filter(|item| item.is_dirty()) {
            frame.write_object(item.obj_cb_index(), &ObjectConstants::from_world(item.world()))?;
            item.mark_refreshed();
            written += 1;
        }

        if written > 0 {
            trace!(frame_index = frame.index(), written, "Object constants refreshed");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ShapeRenderError;

    #[test]
    fn test_sequential_indices() {
        let mut scene = Scene::new(3).unwrap();
        for expected in 0..4 {
            let index = scene
                .add_item("item", Matrix4::identity(), SubmeshGeometry::default())
                .unwrap();
            assert_eq!(index, expected);
        }
        assert_eq!(scene.object_count(), 4);
    }

    #[test]
    fn test_add_after_seal_rejected() {
        let mut scene = Scene::new(3).unwrap();
        scene
            .add_item("box", Matrix4::identity(), SubmeshGeometry::default())
            .unwrap();
        let layout = scene.seal().unwrap();
        assert_eq!(layout.num_descriptors(), 6);

        let err = scene
            .add_item("late", Matrix4::identity(), SubmeshGeometry::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ShapeRenderError::Capacity(CapacityError::HeapSealed { object_count: 1 })
        ));
        assert_eq!(scene.object_count(), 1);
        assert_eq!(scene.seal().unwrap(), layout);
    }

    #[test]
    fn test_set_world_out_of_range() {
        let mut scene = Scene::new(3).unwrap();
        assert!(scene.set_world(0, Matrix4::identity()).is_err());
        assert!(scene.item(0).is_err());
    }
}
