/// 网格数据结构模块
///
/// - [`MeshData`]：生成器输出的 CPU 侧位置和索引
/// - [`SubmeshGeometry`]：共享顶点/索引缓冲中一个子网格的绘制参数
/// - [`MeshGeometry`]：多个子网格拼接成的一对顶点/索引缓冲，上传后只读
///
/// 多个形状共用一个顶点缓冲和一个索引缓冲，每个子网格用
/// `start_index_location` / `base_vertex_location` 定位自己的那一段，
/// 索引保持各自的局部编号。

use std::collections::HashMap;

use bytemuck::cast_slice;

use super::vertex::Vertex;
use crate::core::error::{CapacityError, GraphicsError, Result};

/// 生成器输出的原始网格数据（仅位置）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(index_capacity),
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// 子网格绘制参数，对应一次 `DrawIndexedInstanced`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmeshGeometry {
    pub index_count: u32,
    pub start_index_location: u32,
    pub base_vertex_location: i32,
}

/// 共享顶点/索引缓冲及其子网格表
///
/// 构建后不可变；GPU 侧缓冲由设备层在初始化时上传。
#[derive(Debug, Clone)]
pub struct MeshGeometry {
    pub name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    submeshes: HashMap<String, SubmeshGeometry>,
}

impl MeshGeometry {
    pub fn submesh(&self, name: &str) -> Result<SubmeshGeometry> {
        self.submeshes
            .get(name)
            .copied()
            .ok_or_else(|| CapacityError::UnknownSubmesh(name.to_string()).into())
    }

    pub fn submesh_names(&self) -> impl Iterator<Item = &str> {
        self.submeshes.keys().map(String::as_str)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        cast_slice(&self.indices)
    }

    pub fn vertex_byte_stride(&self) -> u32 {
        Vertex::STRIDE
    }

    pub fn vertex_buffer_byte_size(&self) -> u32 {
        self.vertex_bytes().len() as u32
    }

    pub fn index_buffer_byte_size(&self) -> u32 {
        self.index_bytes().len() as u32
    }
}

/// 按顺序把多个 [`MeshData`] 拼接成一个 [`MeshGeometry`]
#[derive(Debug)]
pub struct MeshGeometryBuilder {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    submeshes: HashMap<String, SubmeshGeometry>,
}

impl MeshGeometryBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
            indices: Vec::new(),
            submeshes: HashMap::new(),
        }
    }

    /// 追加一个子网格，所有顶点使用同一颜色
    ///
    /// 索引使用 16 位格式，单个子网格的局部索引必须小于 65536。
    pub fn add_submesh(
        mut self,
        name: impl Into<String>,
        mesh: &MeshData,
        color: [f32; 4],
    ) -> Result<Self> {
        let name = name.into();
        if mesh.vertex_count() > u16::MAX as usize + 1 {
            return Err(GraphicsError::ResourceCreation(format!(
                "Submesh '{}' has {} vertices, exceeds 16-bit index range",
                name,
                mesh.vertex_count()
            ))
            .into());
        }

        let submesh = SubmeshGeometry {
            index_count: mesh.index_count() as u32,
            start_index_location: self.indices.len() as u32,
            base_vertex_location: self.vertices.len() as i32,
        };

        self.vertices
            .extend(mesh.positions.iter().map(|&p| Vertex::new(p, color)));
        self.indices.extend(mesh.indices.iter().map(|&i| i as u16));
        self.submeshes.insert(name, submesh);

        Ok(self)
    }

    pub fn build(self) -> MeshGeometry {
        MeshGeometry {
            name: self.name,
            vertices: self.vertices,
            indices: self.indices,
            submeshes: self.submeshes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::vertex::colors;

    fn triangle() -> MeshData {
        MeshData {
            positions: vec![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
            indices: vec![0, 1, 2],
        }
    }

    fn quad() -> MeshData {
        MeshData {
            positions: vec![[0.0; 3], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    #[test]
    fn test_submesh_offsets_concatenate() {
        let geo = MeshGeometryBuilder::new("shapeGeo")
            .add_submesh("tri", &triangle(), colors::CRIMSON)
            .unwrap()
            .add_submesh("quad", &quad(), colors::STEEL_BLUE)
            .unwrap()
            .build();

        let tri = geo.submesh("tri").unwrap();
        assert_eq!(tri, SubmeshGeometry {
            index_count: 3,
            start_index_location: 0,
            base_vertex_location: 0,
        });

        let quad = geo.submesh("quad").unwrap();
        assert_eq!(quad, SubmeshGeometry {
            index_count: 6,
            start_index_location: 3,
            base_vertex_location: 3,
        });

        assert_eq!(geo.vertices().len(), 7);
        // 索引保持局部编号
        assert_eq!(&geo.indices()[3..], &[0, 1, 2, 0, 2, 3]);
        assert_eq!(geo.vertices()[3].color, colors::STEEL_BLUE);
        assert_eq!(geo.vertex_buffer_byte_size(), 7 * 28);
        assert_eq!(geo.index_buffer_byte_size(), 9 * 2);
    }

    #[test]
    fn test_unknown_submesh() {
        let geo = MeshGeometryBuilder::new("empty").build();
        let err = geo.submesh("sphere").unwrap_err();
        assert!(err.to_string().contains("sphere"));
    }
}
