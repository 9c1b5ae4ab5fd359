//! 形状场景
//!
//! 一组共享几何体 `shapeGeo`（box / grid / sphere / cylinder）和 22 个渲染项：
//! 中央一个盒子、地面网格，两侧各五根圆柱，每根圆柱顶上一个球。

use tracing::info;

use super::Scene;
use crate::core::error::Result;
use crate::geometry::generator;
use crate::geometry::vertex::colors;
use crate::geometry::{MeshGeometry, MeshGeometryBuilder};
use crate::math::{Matrix4, Vector3};

pub const SHAPE_GEOMETRY: &str = "shapeGeo";
pub const BOX: &str = "box";
pub const GRID: &str = "grid";
pub const SPHERE: &str = "sphere";
pub const CYLINDER: &str = "cylinder";

/// 场景中的渲染项数量
pub const SHAPE_OBJECT_COUNT: u32 = 2 + 5 * 4;

/// 生成形状并拼接为一个共享的顶点/索引缓冲
pub fn build_shape_geometry() -> Result<MeshGeometry> {
    let box_mesh = generator::create_box(1.5, 0.5, 1.5, 3);
    let grid = generator::create_grid(20.0, 30.0, 60, 40);
    let sphere = generator::create_sphere(0.5, 20, 20);
    let cylinder = generator::create_cylinder(0.5, 0.3, 3.0, 20, 20);

    let geometry = MeshGeometryBuilder::new(SHAPE_GEOMETRY)
        .add_submesh(BOX, &box_mesh, colors::DARK_GREEN)?
        .add_submesh(GRID, &grid, colors::FOREST_GREEN)?
        .add_submesh(SPHERE, &sphere, colors::CRIMSON)?
        .add_submesh(CYLINDER, &cylinder, colors::STEEL_BLUE)?
        .build();

    info!(
        vertices = geometry.vertices().len(),
        indices = geometry.indices().len(),
        "Shape geometry built"
    );
    Ok(geometry)
}

/// 按固定布局添加渲染项
pub fn build_render_items(scene: &mut Scene, geometry: &MeshGeometry) -> Result<()> {
    scene.add_item(
        BOX,
        Matrix4::new_translation(&Vector3::new(0.0, 0.5, 0.0)) * Matrix4::new_scaling(2.0),
        geometry.submesh(BOX)?,
    )?;
    scene.add_item(GRID, Matrix4::identity(), geometry.submesh(GRID)?)?;

    let cylinder = geometry.submesh(CYLINDER)?;
    let sphere = geometry.submesh(SPHERE)?;
    for i in 0..5 {
        let z = -10.0 + i as f32 * 5.0;
        let translation = |x: f32, y: f32| Matrix4::new_translation(&Vector3::new(x, y, z));

        scene.add_item(format!("leftCylinder{i}"), translation(-5.0, 1.5), cylinder)?;
        scene.add_item(format!("rightCylinder{i}"), translation(5.0, 1.5), cylinder)?;
        scene.add_item(format!("leftSphere{i}"), translation(-5.0, 3.5), sphere)?;
        scene.add_item(format!("rightSphere{i}"), translation(5.0, 3.5), sphere)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_scene_layout() {
        let geometry = build_shape_geometry().unwrap();
        let mut scene = Scene::new(3).unwrap();
        build_render_items(&mut scene, &geometry).unwrap();

        assert_eq!(scene.object_count(), SHAPE_OBJECT_COUNT);

        let box_item = scene.item(0).unwrap();
        assert_eq!(box_item.name(), BOX);
        // 缩放 2 后平移 y+0.5
        assert_eq!(box_item.world()[(0, 0)], 2.0);
        assert_eq!(box_item.world()[(1, 3)], 0.5);

        let last = scene.item(SHAPE_OBJECT_COUNT - 1).unwrap();
        assert_eq!(last.name(), "rightSphere4");
        assert_eq!(last.world()[(0, 3)], 5.0);
        assert_eq!(last.world()[(1, 3)], 3.5);
        assert_eq!(last.world()[(2, 3)], 10.0);
    }

    #[test]
    fn test_submeshes_share_buffers() {
        let geometry = build_shape_geometry().unwrap();
        let grid = geometry.submesh(GRID).unwrap();
        let box_mesh = geometry.submesh(BOX).unwrap();

        assert_eq!(box_mesh.start_index_location, 0);
        assert_eq!(box_mesh.base_vertex_location, 0);
        assert_eq!(grid.start_index_location, box_mesh.index_count);
        assert_eq!(grid.index_count, 59 * 39 * 6);

        let total: u32 = [BOX, GRID, SPHERE, CYLINDER]
            .iter()
            .map(|name| geometry.submesh(name).unwrap().index_count)
            .sum();
        assert_eq!(total as usize, geometry.indices().len());
    }
}
