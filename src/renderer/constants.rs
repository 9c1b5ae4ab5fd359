//! 常量缓冲区数据布局
//!
//! 与 `color.hlsl` 中的 `cbPerObject` (b0) 和 `cbPass` (b1) 一一对应。
//! 矩阵以 [`to_shader_layout`](crate::math::to_shader_layout) 转换后写入。

use bytemuck::{Pod, Zeroable};

use crate::math::{self, Matrix4, Vector3};

/// 每个渲染项的常量
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: [[f32; 4]; 4],
}

impl ObjectConstants {
    pub fn from_world(world: &Matrix4) -> Self {
        Self {
            world: math::to_shader_layout(world),
        }
    }
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self::from_world(&Matrix4::identity())
    }
}

/// 每个渲染 Pass 的常量
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub eye_pos_w: [f32; 3],
    pub cb_per_object_pad1: f32,
    pub render_target_size: [f32; 2],
    pub inv_render_target_size: [f32; 2],
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
}

/// 构建 Pass 常量所需的输入
#[derive(Debug, Clone, Copy)]
pub struct PassInputs {
    pub view: Matrix4,
    pub proj: Matrix4,
    pub eye_pos: Vector3,
    pub width: u32,
    pub height: u32,
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
}

impl PassConstants {
    pub fn new(inputs: &PassInputs) -> Self {
        // 列向量约定下先 view 后 proj：clip = P * V * p
        let view_proj = inputs.proj * inputs.view;
        let width = inputs.width.max(1) as f32;
        let height = inputs.height.max(1) as f32;

        Self {
            view: math::to_shader_layout(&inputs.view),
            inv_view: math::to_shader_layout(&math::inverse_or_identity(&inputs.view)),
            proj: math::to_shader_layout(&inputs.proj),
            inv_proj: math::to_shader_layout(&math::inverse_or_identity(&inputs.proj)),
            view_proj: math::to_shader_layout(&view_proj),
            inv_view_proj: math::to_shader_layout(&math::inverse_or_identity(&view_proj)),
            eye_pos_w: inputs.eye_pos.into(),
            cb_per_object_pad1: 0.0,
            render_target_size: [width, height],
            inv_render_target_size: [1.0 / width, 1.0 / height],
            near_z: inputs.near_z,
            far_z: inputs.far_z,
            total_time: inputs.total_time,
            delta_time: inputs.delta_time,
        }
    }
}

impl Default for PassConstants {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 64);
        // 6 个矩阵 + 3 个 float4
        assert_eq!(std::mem::size_of::<PassConstants>(), 6 * 64 + 3 * 16);
    }

    #[test]
    fn test_object_constants_transposed() {
        let world = Matrix4::new_translation(&Vector3::new(-5.0, 1.5, -10.0));
        let c = ObjectConstants::from_world(&world);
        assert_eq!(c.world[0][3], -5.0);
        assert_eq!(c.world[1][3], 1.5);
        assert_eq!(c.world[2][3], -10.0);
        assert_eq!(c.world[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_pass_constants_fields() {
        let inputs = PassInputs {
            view: Matrix4::identity(),
            proj: Matrix4::new_scaling(2.0),
            eye_pos: Vector3::new(1.0, 2.0, 3.0),
            width: 800,
            height: 600,
            near_z: 1.0,
            far_z: 1000.0,
            total_time: 3.0,
            delta_time: 0.016,
        };
        let pass = PassConstants::new(&inputs);

        assert_eq!(pass.eye_pos_w, [1.0, 2.0, 3.0]);
        assert_eq!(pass.render_target_size, [800.0, 600.0]);
        assert_eq!(pass.inv_render_target_size, [1.0 / 800.0, 1.0 / 600.0]);
        assert_eq!(pass.view_proj[0][0], 2.0);
        assert_eq!(pass.inv_view_proj[0][0], 0.5);
        assert_eq!(pass.far_z, 1000.0);
    }
}
