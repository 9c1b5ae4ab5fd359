/// Build script for ShapeRender
///
/// # Shader Compilation Strategy:
/// - DX12: Uses HLSL shaders compiled at runtime via D3DCompile
/// - Headless: no shaders
fn main() {
    // Trigger rebuild if shader files change
    println!("cargo:rerun-if-changed=src/gfx/dx12/shaders/color.hlsl");
}
