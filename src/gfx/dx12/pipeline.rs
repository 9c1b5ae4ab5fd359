//! 根签名、着色器和管线状态
//!
//! 根签名只有两个描述符表，各含一个 CBV：
//!
//! | 根参数 | 寄存器 | 内容 |
//! |--------|--------|------|
//! | 0      | b0     | 对象常量 |
//! | 1      | b1     | Pass 常量 |

use std::mem::ManuallyDrop;

use tracing::debug;
use windows::core::{s, PCSTR};
use windows::Win32::Graphics::Direct3D::Fxc::*;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use super::context::{BACK_BUFFER_FORMAT, DEPTH_STENCIL_FORMAT};
use crate::core::error::{GraphicsError, Result};
use crate::geometry::Vertex;

const COLOR_HLSL: &str = include_str!("shaders/color.hlsl");

/// 根参数索引
pub const OBJECT_CBV_ROOT_PARAMETER: u32 = 0;
pub const PASS_CBV_ROOT_PARAMETER: u32 = 1;

/// 创建两个描述符表（b0 / b1）组成的根签名
pub fn create_root_signature(device: &ID3D12Device) -> Result<ID3D12RootSignature> {
    let object_range = cbv_range(0);
    let pass_range = cbv_range(1);

    let root_parameters = [descriptor_table(&object_range), descriptor_table(&pass_range)];

    let root_desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: root_parameters.len() as u32,
        pParameters: root_parameters.as_ptr(),
        NumStaticSamplers: 0,
        pStaticSamplers: std::ptr::null(),
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
    };

    unsafe {
        let mut signature = None;
        let mut error_blob = None;
        if let Err(e) = D3D12SerializeRootSignature(
            &root_desc,
            D3D_ROOT_SIGNATURE_VERSION_1,
            &mut signature,
            Some(&mut error_blob),
        ) {
            let message = error_blob.as_ref().map(blob_to_string).unwrap_or_default();
            return Err(GraphicsError::ResourceCreation(format!(
                "Failed to serialize root signature: {:?} {}",
                e, message
            ))
            .into());
        }
        let signature = signature.ok_or_else(|| {
            GraphicsError::ResourceCreation("Root signature blob is empty".to_string())
        })?;

        let root_signature: ID3D12RootSignature = device
            .CreateRootSignature(
                0,
                std::slice::from_raw_parts(
                    signature.GetBufferPointer() as *const u8,
                    signature.GetBufferSize(),
                ),
            )
            .map_err(|e| {
                GraphicsError::ResourceCreation(format!("Failed to create root signature: {:?}", e))
            })?;

        debug!("Root signature created (b0 object table, b1 pass table)");
        Ok(root_signature)
    }
}

/// 编译 `color.hlsl` 并创建线框管线状态
pub fn create_pipeline_state(
    device: &ID3D12Device,
    root_signature: &ID3D12RootSignature,
) -> Result<ID3D12PipelineState> {
    let vs_blob = compile_shader(COLOR_HLSL, s!("VS"), s!("vs_5_0"))?;
    let ps_blob = compile_shader(COLOR_HLSL, s!("PS"), s!("ps_5_0"))?;

    let input_element_descs = [
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: s!("POSITION"),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32B32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: 0,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: s!("COLOR"),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32B32A32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: Vertex::COLOR_OFFSET,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
    ];

    unsafe {
        let mut pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
            pRootSignature: ManuallyDrop::new(Some(root_signature.clone())),
            VS: D3D12_SHADER_BYTECODE {
                pShaderBytecode: vs_blob.GetBufferPointer(),
                BytecodeLength: vs_blob.GetBufferSize(),
            },
            PS: D3D12_SHADER_BYTECODE {
                pShaderBytecode: ps_blob.GetBufferPointer(),
                BytecodeLength: ps_blob.GetBufferSize(),
            },
            RasterizerState: D3D12_RASTERIZER_DESC {
                FillMode: D3D12_FILL_MODE_WIREFRAME,
                CullMode: D3D12_CULL_MODE_BACK,
                DepthClipEnable: true.into(),
                ..Default::default()
            },
            DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
                DepthEnable: true.into(),
                DepthWriteMask: D3D12_DEPTH_WRITE_MASK_ALL,
                DepthFunc: D3D12_COMPARISON_FUNC_LESS,
                StencilEnable: false.into(),
                StencilReadMask: 0xFF,
                StencilWriteMask: 0xFF,
                ..Default::default()
            },
            SampleMask: u32::MAX,
            InputLayout: D3D12_INPUT_LAYOUT_DESC {
                pInputElementDescs: input_element_descs.as_ptr(),
                NumElements: input_element_descs.len() as u32,
            },
            PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
            NumRenderTargets: 1,
            DSVFormat: DEPTH_STENCIL_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            ..Default::default()
        };
        pso_desc.BlendState.RenderTarget[0] = D3D12_RENDER_TARGET_BLEND_DESC {
            RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
            ..Default::default()
        };
        pso_desc.RTVFormats[0] = BACK_BUFFER_FORMAT;

        let pso = device.CreateGraphicsPipelineState(&pso_desc);
        // 描述结构里的根签名引用需要手动释放
        ManuallyDrop::drop(&mut pso_desc.pRootSignature);

        let pso: ID3D12PipelineState = pso.map_err(|e| {
            GraphicsError::ResourceCreation(format!("Failed to create pipeline state: {:?}", e))
        })?;

        debug!("Wireframe pipeline state created");
        Ok(pso)
    }
}

fn cbv_range(register: u32) -> D3D12_DESCRIPTOR_RANGE {
    D3D12_DESCRIPTOR_RANGE {
        RangeType: D3D12_DESCRIPTOR_RANGE_TYPE_CBV,
        NumDescriptors: 1,
        BaseShaderRegister: register,
        RegisterSpace: 0,
        OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
    }
}

fn descriptor_table(range: &D3D12_DESCRIPTOR_RANGE) -> D3D12_ROOT_PARAMETER {
    D3D12_ROOT_PARAMETER {
        ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
        Anonymous: D3D12_ROOT_PARAMETER_0 {
            DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                NumDescriptorRanges: 1,
                pDescriptorRanges: range,
            },
        },
        ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
    }
}

fn compile_shader(source: &str, entry: PCSTR, target: PCSTR) -> Result<ID3DBlob> {
    let flags = if cfg!(debug_assertions) {
        D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
    } else {
        0
    };

    unsafe {
        let mut blob = None;
        let mut error_blob = None;
        let result = D3DCompile(
            source.as_ptr() as _,
            source.len(),
            s!("color.hlsl"),
            None,
            None,
            entry,
            target,
            flags,
            0,
            &mut blob,
            Some(&mut error_blob),
        );

        if let Err(e) = result {
            let message = error_blob.as_ref().map(blob_to_string).unwrap_or_default();
            return Err(GraphicsError::ShaderCompilation(format!(
                "{}: {:?} {}",
                entry.display(),
                e,
                message
            ))
            .into());
        }

        blob.ok_or_else(|| {
            GraphicsError::ShaderCompilation(format!("{}: empty bytecode", entry.display())).into()
        })
    }
}

fn blob_to_string(blob: &ID3DBlob) -> String {
    unsafe {
        let bytes = std::slice::from_raw_parts(
            blob.GetBufferPointer() as *const u8,
            blob.GetBufferSize(),
        );
        String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()
    }
}
