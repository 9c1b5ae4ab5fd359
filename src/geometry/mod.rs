/// 几何体模块
///
/// 程序化生成形状，并把它们拼接成一对共享的顶点/索引缓冲。
///
/// ```text
/// generator (box / grid / sphere / cylinder)
///     ↓
/// MeshData (CPU 侧位置 + 索引)
///     ↓
/// MeshGeometryBuilder (着色、拼接、记录子网格偏移)
///     ↓
/// MeshGeometry (设备层上传为默认堆缓冲)
/// ```

pub mod vertex;
pub mod mesh;
pub mod generator;

pub use vertex::Vertex;
pub use mesh::{MeshData, MeshGeometry, MeshGeometryBuilder, SubmeshGeometry};
