/// 顶点定义模块
///
/// 形状场景只需要位置和颜色两个属性，与 `color.hlsl` 的输入布局一一对应。

use bytemuck::{Pod, Zeroable};

/// 位置 + 颜色顶点
///
/// # 内存布局
///
/// - position: 12 bytes (3 * f32)
/// - color: 16 bytes (4 * f32)
/// - **总计**: 28 bytes
///
/// 输入布局：`POSITION` (R32G32B32_FLOAT, offset 0)，`COLOR` (R32G32B32A32_FLOAT, offset 12)。
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    #[inline]
    pub fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self { position, color }
    }

    /// 顶点步长（字节）
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    /// `COLOR` 属性的字节偏移
    pub const COLOR_OFFSET: u32 = 12;
}

/// 形状使用的颜色（与 DirectX::Colors 中同名颜色取值一致）
pub mod colors {
    pub const DARK_GREEN: [f32; 4] = [0.0, 0.392_156_9, 0.0, 1.0];
    pub const FOREST_GREEN: [f32; 4] = [0.133_333_3, 0.545_098_1, 0.133_333_3, 1.0];
    pub const CRIMSON: [f32; 4] = [0.862_745_2, 0.078_431_4, 0.235_294_1, 1.0];
    pub const STEEL_BLUE: [f32; 4] = [0.274_509_8, 0.509_803_9, 0.705_882_4, 1.0];
    pub const LIGHT_STEEL_BLUE: [f32; 4] = [0.690_196_1, 0.768_627_5, 0.870_588_3, 1.0];
}
