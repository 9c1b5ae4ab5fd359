/// 程序化几何体生成器
///
/// 生成盒子、网格平面、球体和圆柱体的顶点位置与索引。
/// 只生成位置，颜色在拼接进共享顶点缓冲时按形状统一指定。
///
/// 所有形状以局部原点为中心，三角形按顺时针方向为正面（Direct3D 默认）。

use std::f32::consts::PI;

use super::mesh::MeshData;

/// 盒子的最大细分次数
pub const MAX_BOX_SUBDIVISIONS: u32 = 6;

/// 创建盒子
///
/// 每个面独立 4 个顶点（共 24 个），随后执行 `num_subdivisions` 次三角形细分。
pub fn create_box(width: f32, height: f32, depth: f32, num_subdivisions: u32) -> MeshData {
    let w = 0.5 * width;
    let h = 0.5 * height;
    let d = 0.5 * depth;

    let faces: [[[f32; 3]; 4]; 6] = [
        // 前 (-z)
        [[-w, -h, -d], [-w, h, -d], [w, h, -d], [w, -h, -d]],
        // 后 (+z)
        [[-w, -h, d], [w, -h, d], [w, h, d], [-w, h, d]],
        // 顶
        [[-w, h, -d], [-w, h, d], [w, h, d], [w, h, -d]],
        // 底
        [[-w, -h, -d], [w, -h, -d], [w, -h, d], [-w, -h, d]],
        // 左
        [[-w, -h, d], [-w, h, d], [-w, h, -d], [-w, -h, -d]],
        // 右
        [[w, -h, -d], [w, h, -d], [w, h, d], [w, -h, d]],
    ];

    let mut mesh = MeshData::with_capacity(24, 36);
    for face in faces.iter() {
        let base = mesh.positions.len() as u32;
        mesh.positions.extend_from_slice(face);
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    for _ in 0..num_subdivisions.min(MAX_BOX_SUBDIVISIONS) {
        subdivide(&mut mesh);
    }

    mesh
}

/// 创建 XZ 平面上的网格，`m` 行 `n` 列顶点
pub fn create_grid(width: f32, depth: f32, m: u32, n: u32) -> MeshData {
    let m = m.max(2);
    let n = n.max(2);

    let half_width = 0.5 * width;
    let half_depth = 0.5 * depth;
    let dx = width / (n - 1) as f32;
    let dz = depth / (m - 1) as f32;

    let mut mesh = MeshData::with_capacity(
        (m * n) as usize,
        ((m - 1) * (n - 1) * 6) as usize,
    );

    for i in 0..m {
        let z = half_depth - i as f32 * dz;
        for j in 0..n {
            let x = -half_width + j as f32 * dx;
            mesh.positions.push([x, 0.0, z]);
        }
    }

    for i in 0..m - 1 {
        for j in 0..n - 1 {
            mesh.indices.extend_from_slice(&[
                i * n + j,
                i * n + j + 1,
                (i + 1) * n + j,
                (i + 1) * n + j,
                i * n + j + 1,
                (i + 1) * n + j + 1,
            ]);
        }
    }

    mesh
}

/// 创建球体（经纬线划分）
///
/// 南北极各一个顶点，中间 `stack_count - 1` 个纬度环，每环 `slice_count + 1` 个顶点
/// （首尾重合以便纹理坐标闭合）。
pub fn create_sphere(radius: f32, slice_count: u32, stack_count: u32) -> MeshData {
    let slice_count = slice_count.max(3);
    let stack_count = stack_count.max(2);

    let mut mesh = MeshData::new();
    mesh.positions.push([0.0, radius, 0.0]);

    let phi_step = PI / stack_count as f32;
    let theta_step = 2.0 * PI / slice_count as f32;

    for i in 1..stack_count {
        let phi = i as f32 * phi_step;
        for j in 0..=slice_count {
            let theta = j as f32 * theta_step;
            mesh.positions.push([
                radius * phi.sin() * theta.cos(),
                radius * phi.cos(),
                radius * phi.sin() * theta.sin(),
            ]);
        }
    }

    mesh.positions.push([0.0, -radius, 0.0]);

    // 北极扇形
    for i in 1..=slice_count {
        mesh.indices.extend_from_slice(&[0, i + 1, i]);
    }

    let base = 1;
    let ring_vertex_count = slice_count + 1;
    for i in 0..stack_count - 2 {
        for j in 0..slice_count {
            mesh.indices.extend_from_slice(&[
                base + i * ring_vertex_count + j,
                base + i * ring_vertex_count + j + 1,
                base + (i + 1) * ring_vertex_count + j,
                base + (i + 1) * ring_vertex_count + j,
                base + i * ring_vertex_count + j + 1,
                base + (i + 1) * ring_vertex_count + j + 1,
            ]);
        }
    }

    // 南极扇形
    let south_pole = mesh.positions.len() as u32 - 1;
    let base = south_pole - ring_vertex_count;
    for i in 0..slice_count {
        mesh.indices
            .extend_from_slice(&[south_pole, base + i, base + i + 1]);
    }

    mesh
}

/// 创建圆柱体（可为圆台），包含顶盖和底盖
pub fn create_cylinder(
    bottom_radius: f32,
    top_radius: f32,
    height: f32,
    slice_count: u32,
    stack_count: u32,
) -> MeshData {
    let slice_count = slice_count.max(3);
    let stack_count = stack_count.max(1);

    let mut mesh = MeshData::new();

    let stack_height = height / stack_count as f32;
    let radius_step = (top_radius - bottom_radius) / stack_count as f32;
    let ring_count = stack_count + 1;
    let d_theta = 2.0 * PI / slice_count as f32;

    for i in 0..ring_count {
        let y = -0.5 * height + i as f32 * stack_height;
        let r = bottom_radius + i as f32 * radius_step;
        for j in 0..=slice_count {
            let theta = j as f32 * d_theta;
            mesh.positions.push([r * theta.cos(), y, r * theta.sin()]);
        }
    }

    let ring_vertex_count = slice_count + 1;
    for i in 0..stack_count {
        for j in 0..slice_count {
            mesh.indices.extend_from_slice(&[
                i * ring_vertex_count + j,
                (i + 1) * ring_vertex_count + j,
                (i + 1) * ring_vertex_count + j + 1,
                i * ring_vertex_count + j,
                (i + 1) * ring_vertex_count + j + 1,
                i * ring_vertex_count + j + 1,
            ]);
        }
    }

    build_cylinder_cap(&mut mesh, top_radius, 0.5 * height, slice_count, true);
    build_cylinder_cap(&mut mesh, bottom_radius, -0.5 * height, slice_count, false);

    mesh
}

fn build_cylinder_cap(mesh: &mut MeshData, radius: f32, y: f32, slice_count: u32, top: bool) {
    let base = mesh.positions.len() as u32;
    let d_theta = 2.0 * PI / slice_count as f32;

    for i in 0..=slice_count {
        let theta = i as f32 * d_theta;
        mesh.positions.push([radius * theta.cos(), y, radius * theta.sin()]);
    }
    mesh.positions.push([0.0, y, 0.0]);

    let center = mesh.positions.len() as u32 - 1;
    for i in 0..slice_count {
        if top {
            mesh.indices.extend_from_slice(&[center, base + i + 1, base + i]);
        } else {
            mesh.indices.extend_from_slice(&[center, base + i, base + i + 1]);
        }
    }
}

/// 每个三角形拆分为 4 个
///
/// ```text
///        v1
///        *
///       / \
///   m0 *---* m1
///     / \ / \
///    *---*---*
///   v0   m2   v2
/// ```
fn subdivide(mesh: &mut MeshData) {
    let input = std::mem::take(mesh);
    let triangle_count = input.indices.len() / 3;
    mesh.positions.reserve(triangle_count * 6);
    mesh.indices.reserve(triangle_count * 12);

    let midpoint = |a: [f32; 3], b: [f32; 3]| {
        [0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1]), 0.5 * (a[2] + b[2])]
    };

    for tri in input.indices.chunks_exact(3) {
        let v0 = input.positions[tri[0] as usize];
        let v1 = input.positions[tri[1] as usize];
        let v2 = input.positions[tri[2] as usize];

        let m0 = midpoint(v0, v1);
        let m1 = midpoint(v1, v2);
        let m2 = midpoint(v0, v2);

        let base = mesh.positions.len() as u32;
        mesh.positions.extend_from_slice(&[v0, v1, v2, m0, m1, m2]);
        mesh.indices.extend_from_slice(&[
            base, base + 3, base + 5,
            base + 3, base + 4, base + 5,
            base + 5, base + 4, base + 2,
            base + 3, base + 1, base + 4,
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indices_in_range(mesh: &MeshData) {
        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
        assert_eq!(mesh.indices.len() % 3, 0);
    }

    #[test]
    fn test_box_counts() {
        let mesh = create_box(1.5, 0.5, 1.5, 0);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
        assert_indices_in_range(&mesh);

        // 每次细分三角形数量 x4
        let mesh = create_box(1.5, 0.5, 1.5, 3);
        assert_eq!(mesh.triangle_count(), 12 * 64);
        assert_indices_in_range(&mesh);
    }

    #[test]
    fn test_box_extent() {
        let mesh = create_box(2.0, 4.0, 6.0, 1);
        let max_y = mesh.positions.iter().map(|p| p[1]).fold(f32::MIN, f32::max);
        let min_z = mesh.positions.iter().map(|p| p[2]).fold(f32::MAX, f32::min);
        assert_eq!(max_y, 2.0);
        assert_eq!(min_z, -3.0);
    }

    #[test]
    fn test_grid_counts() {
        let mesh = create_grid(20.0, 30.0, 60, 40);
        assert_eq!(mesh.vertex_count(), 60 * 40);
        assert_eq!(mesh.index_count(), 59 * 39 * 6);
        assert_indices_in_range(&mesh);
        assert!(mesh.positions.iter().all(|p| p[1] == 0.0));
    }

    #[test]
    fn test_sphere_counts() {
        let mesh = create_sphere(0.5, 20, 20);
        assert_eq!(mesh.vertex_count(), 2 + 19 * 21);
        assert_eq!(mesh.triangle_count(), 20 * 2 + 18 * 20 * 2);
        assert_indices_in_range(&mesh);

        for p in &mesh.positions {
            let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((len - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cylinder_counts() {
        let mesh = create_cylinder(0.5, 0.3, 3.0, 20, 20);
        assert_eq!(mesh.vertex_count(), 21 * 21 + 2 * 22);
        assert_eq!(mesh.triangle_count(), 20 * 20 * 2 + 2 * 20);
        assert_indices_in_range(&mesh);
    }
}
