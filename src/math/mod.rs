//! 数学库模块
//!
//! 基于 `nalgebra`，提供简洁的类型别名和 DirectXMath 风格的矩阵辅助函数。
//!
//! # 约定
//!
//! - CPU 侧矩阵使用 nalgebra 的列向量约定（`p' = M * p`）
//! - 视图/投影矩阵为左手坐标系，深度范围 [0, 1]（与 Direct3D 一致）
//! - 写入常量缓冲区前使用 [`to_shader_layout`] 转换为 HLSL 默认的 column_major 布局

pub use nalgebra::{Matrix4 as Mat4, Vector3 as Vec3, Vector4 as Vec4};

pub type Vector3 = Vec3<f32>;
pub type Vector4 = Vec4<f32>;
pub type Matrix4 = Mat4<f32>;

/// 数学常量
pub mod constants {
    pub const PI: f32 = std::f32::consts::PI;

    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// 浮点数比较的 epsilon
    pub const EPSILON: f32 = 1e-5;
}

/// 数学工具函数
pub mod utils {
    /// 限制值在范围内
    pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }

    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * super::constants::DEG_TO_RAD
    }

    /// 检查两个浮点数是否近似相等
    pub fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
        (a - b).abs() < epsilon
    }
}

/// 左手坐标系视图矩阵（等价于 `XMMatrixLookAtLH`）
pub fn look_at_lh(eye: &Vector3, target: &Vector3, up: &Vector3) -> Matrix4 {
    let z = (target - eye).normalize();
    let x = up.cross(&z).normalize();
    let y = z.cross(&x);

    Matrix4::new(
        x.x, x.y, x.z, -x.dot(eye),
        y.x, y.y, y.z, -y.dot(eye),
        z.x, z.y, z.z, -z.dot(eye),
        0.0, 0.0, 0.0, 1.0,
    )
}

/// 左手坐标系透视投影（等价于 `XMMatrixPerspectiveFovLH`），深度映射到 [0, 1]
pub fn perspective_fov_lh(fov_y: f32, aspect: f32, near_z: f32, far_z: f32) -> Matrix4 {
    let y_scale = 1.0 / (0.5 * fov_y).tan();
    let x_scale = y_scale / aspect;
    let range = far_z / (far_z - near_z);

    Matrix4::new(
        x_scale, 0.0, 0.0, 0.0,
        0.0, y_scale, 0.0, 0.0,
        0.0, 0.0, range, -near_z * range,
        0.0, 0.0, 1.0, 0.0,
    )
}

/// 求逆，不可逆时返回单位矩阵
pub fn inverse_or_identity(m: &Matrix4) -> Matrix4 {
    m.try_inverse().unwrap_or_else(Matrix4::identity)
}

/// 转换为常量缓冲区中的矩阵布局
///
/// 相当于 DirectXMath 中 `XMMatrixTranspose` 后 `XMStoreFloat4x4`：
/// 内存中按行写出 `m` 的每一行，HLSL 以 column_major 读取后配合 `mul(v, M)` 使用。
pub fn to_shader_layout(m: &Matrix4) -> [[f32; 4]; 4] {
    m.transpose().into()
}

/// 缩放后平移的世界矩阵
pub fn scale_translate(scale: Vector3, translation: Vector3) -> Matrix4 {
    Matrix4::new_translation(&translation) * Matrix4::new_nonuniform_scaling(&scale)
}
