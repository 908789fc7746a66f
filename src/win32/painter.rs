//! egui painter for D3D11
//!
//! Uploads egui textures, streams the tessellated meshes into dynamic vertex
//! and index buffers and draws them onto the render target bound by the
//! presentation chain. Colors stay in egui's premultiplied gamma space; the
//! back buffer is UNORM, so no conversion happens on the GPU.

use std::collections::HashMap;
use std::ffi::c_void;

use anyhow::{anyhow, Context as _, Result};
use egui::epaint::{Primitive, Vertex};
use egui::{Rect, TextureId};
use tracing::{debug, warn};
use windows::core::{s, PCSTR};
use windows::Win32::Foundation::{BOOL, RECT};
use windows::Win32::Graphics::Direct3D::Fxc::D3DCompile;
use windows::Win32::Graphics::Direct3D::{ID3DBlob, D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST};
use windows::Win32::Graphics::Direct3D11::{
    ID3D11BlendState, ID3D11Buffer, ID3D11Device, ID3D11DeviceContext, ID3D11InputLayout,
    ID3D11PixelShader, ID3D11RasterizerState, ID3D11SamplerState, ID3D11ShaderResourceView,
    ID3D11Texture2D, ID3D11VertexShader, D3D11_BIND_CONSTANT_BUFFER, D3D11_BIND_INDEX_BUFFER,
    D3D11_BIND_SHADER_RESOURCE, D3D11_BIND_VERTEX_BUFFER, D3D11_BLEND_DESC,
    D3D11_BLEND_INV_SRC_ALPHA, D3D11_BLEND_ONE, D3D11_BLEND_OP_ADD, D3D11_BOX,
    D3D11_BUFFER_DESC, D3D11_COLOR_WRITE_ENABLE_ALL, D3D11_COMPARISON_ALWAYS,
    D3D11_CPU_ACCESS_WRITE, D3D11_CULL_NONE, D3D11_FILL_SOLID,
    D3D11_FILTER_MIN_MAG_MIP_LINEAR, D3D11_INPUT_ELEMENT_DESC, D3D11_INPUT_PER_VERTEX_DATA,
    D3D11_MAPPED_SUBRESOURCE, D3D11_MAP_WRITE_DISCARD, D3D11_RASTERIZER_DESC,
    D3D11_RENDER_TARGET_BLEND_DESC, D3D11_SAMPLER_DESC, D3D11_SUBRESOURCE_DATA,
    D3D11_TEXTURE2D_DESC, D3D11_TEXTURE_ADDRESS_CLAMP, D3D11_USAGE_DEFAULT,
    D3D11_USAGE_DYNAMIC,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT_R32G32_FLOAT, DXGI_FORMAT_R32_UINT, DXGI_FORMAT_R8G8B8A8_UNORM,
    DXGI_SAMPLE_DESC,
};

use crate::error::{OverlayError, OverlayResult};
use crate::render_loop::GuiPainter;
use crate::ui::{image_rgba, GuiFrame};

const SHADER_SOURCE: &str = r#"
cbuffer Screen : register(b0)
{
    float2 screen_size;
    float2 padding;
};

struct VsInput
{
    float2 pos : POSITION;
    float2 uv : TEXCOORD0;
    float4 color : COLOR0;
};

struct PsInput
{
    float4 pos : SV_POSITION;
    float2 uv : TEXCOORD0;
    float4 color : COLOR0;
};

Texture2D texture0 : register(t0);
SamplerState sampler0 : register(s0);

PsInput vs_main(VsInput input)
{
    PsInput output;
    output.pos = float4(
        2.0 * input.pos.x / screen_size.x - 1.0,
        1.0 - 2.0 * input.pos.y / screen_size.y,
        0.0,
        1.0);
    output.uv = input.uv;
    output.color = input.color;
    return output;
}

float4 ps_main(PsInput input) : SV_Target
{
    return input.color * texture0.Sample(sampler0, input.uv);
}
"#;

const VERTEX_STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

/// Slack added whenever a dynamic buffer has to grow.
const BUFFER_SLACK: usize = 4096;

struct PainterTexture {
    texture: ID3D11Texture2D,
    view: ID3D11ShaderResourceView,
}

struct DynamicBuffer {
    buffer: ID3D11Buffer,
    capacity: usize,
}

pub struct D3d11Painter {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    constant_buffer: ID3D11Buffer,
    sampler: ID3D11SamplerState,
    blend_state: ID3D11BlendState,
    rasterizer_state: ID3D11RasterizerState,
    vertex_buffer: Option<DynamicBuffer>,
    index_buffer: Option<DynamicBuffer>,
    textures: HashMap<TextureId, PainterTexture>,
}

fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}

fn compile_shader(entry: PCSTR, target: PCSTR) -> Result<ID3DBlob> {
    let mut code: Option<ID3DBlob> = None;
    let mut errors: Option<ID3DBlob> = None;

    let result = unsafe {
        D3DCompile(
            SHADER_SOURCE.as_ptr() as *const c_void,
            SHADER_SOURCE.len(),
            s!("overlay_gui.hlsl"),
            None,
            None,
            entry,
            target,
            0,
            0,
            &mut code,
            Some(&mut errors),
        )
    };

    if let Err(e) = result {
        let detail = errors
            .as_ref()
            .map(|blob| String::from_utf8_lossy(blob_bytes(blob)).into_owned())
            .unwrap_or_default();
        return Err(anyhow!("D3DCompile failed: {} {}", e, detail.trim()));
    }
    code.ok_or_else(|| anyhow!("D3DCompile produced no bytecode"))
}

fn create_buffer(device: &ID3D11Device, byte_width: usize, bind_flags: u32) -> Result<ID3D11Buffer> {
    let desc = D3D11_BUFFER_DESC {
        ByteWidth: u32::try_from(byte_width).context("buffer too large")?,
        Usage: D3D11_USAGE_DYNAMIC,
        BindFlags: bind_flags,
        CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
        MiscFlags: 0,
        StructureByteStride: 0,
    };
    let mut buffer = None;
    unsafe { device.CreateBuffer(&desc, None, Some(&mut buffer)) }?;
    buffer.ok_or_else(|| anyhow!("CreateBuffer returned no buffer"))
}

impl D3d11Painter {
    pub fn new(device: &ID3D11Device, context: &ID3D11DeviceContext) -> OverlayResult<Self> {
        Self::create(device, context).map_err(OverlayError::surface_init)
    }

    fn create(device: &ID3D11Device, context: &ID3D11DeviceContext) -> Result<Self> {
        let vs_blob = compile_shader(s!("vs_main"), s!("vs_4_0"))?;
        let ps_blob = compile_shader(s!("ps_main"), s!("ps_4_0"))?;

        let mut vertex_shader = None;
        let mut pixel_shader = None;
        let mut input_layout = None;
        let layout = [
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("POSITION"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("TEXCOORD"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 8,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("COLOR"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                InputSlot: 0,
                AlignedByteOffset: 16,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];

        let blend_target = D3D11_RENDER_TARGET_BLEND_DESC {
            BlendEnable: BOOL::from(true),
            SrcBlend: D3D11_BLEND_ONE,
            DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
            BlendOp: D3D11_BLEND_OP_ADD,
            SrcBlendAlpha: D3D11_BLEND_ONE,
            DestBlendAlpha: D3D11_BLEND_INV_SRC_ALPHA,
            BlendOpAlpha: D3D11_BLEND_OP_ADD,
            RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
        };
        let blend_desc = D3D11_BLEND_DESC {
            AlphaToCoverageEnable: BOOL::from(false),
            IndependentBlendEnable: BOOL::from(false),
            RenderTarget: [blend_target; 8],
        };
        let rasterizer_desc = D3D11_RASTERIZER_DESC {
            FillMode: D3D11_FILL_SOLID,
            CullMode: D3D11_CULL_NONE,
            ScissorEnable: BOOL::from(true),
            DepthClipEnable: BOOL::from(true),
            ..Default::default()
        };
        let sampler_desc = D3D11_SAMPLER_DESC {
            Filter: D3D11_FILTER_MIN_MAG_MIP_LINEAR,
            AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
            ComparisonFunc: D3D11_COMPARISON_ALWAYS,
            ..Default::default()
        };

        let mut blend_state = None;
        let mut rasterizer_state = None;
        let mut sampler = None;

        unsafe {
            device.CreateVertexShader(blob_bytes(&vs_blob), None, Some(&mut vertex_shader))?;
            device.CreatePixelShader(blob_bytes(&ps_blob), None, Some(&mut pixel_shader))?;
            device.CreateInputLayout(&layout, blob_bytes(&vs_blob), Some(&mut input_layout))?;
            device.CreateBlendState(&blend_desc, Some(&mut blend_state))?;
            device.CreateRasterizerState(&rasterizer_desc, Some(&mut rasterizer_state))?;
            device.CreateSamplerState(&sampler_desc, Some(&mut sampler))?;
        }

        let constant_buffer = create_buffer(device, 16, D3D11_BIND_CONSTANT_BUFFER.0 as u32)?;
        debug!("GUI painter pipeline created");

        Ok(Self {
            device: device.clone(),
            context: context.clone(),
            vertex_shader: vertex_shader.context("no vertex shader")?,
            pixel_shader: pixel_shader.context("no pixel shader")?,
            input_layout: input_layout.context("no input layout")?,
            constant_buffer,
            sampler: sampler.context("no sampler state")?,
            blend_state: blend_state.context("no blend state")?,
            rasterizer_state: rasterizer_state.context("no rasterizer state")?,
            vertex_buffer: None,
            index_buffer: None,
            textures: HashMap::new(),
        })
    }

    fn upload_textures(&mut self, frame: &GuiFrame) -> Result<()> {
        for (id, delta) in &frame.textures_delta.set {
            let [width, height] = delta.image.size();
            let rgba = image_rgba(&delta.image);
            let pitch = (width * 4) as u32;

            match (delta.pos, self.textures.get(id)) {
                (Some([x, y]), Some(existing)) => {
                    let region = D3D11_BOX {
                        left: x as u32,
                        top: y as u32,
                        front: 0,
                        right: (x + width) as u32,
                        bottom: (y + height) as u32,
                        back: 1,
                    };
                    unsafe {
                        self.context.UpdateSubresource(
                            &existing.texture,
                            0,
                            Some(&region),
                            rgba.as_ptr() as *const c_void,
                            pitch,
                            0,
                        );
                    }
                }
                (Some(_), None) => warn!("Partial update for unknown texture {:?}", id),
                (None, _) => {
                    let texture = self.create_texture(width, height, &rgba, pitch)?;
                    debug!("Uploaded texture {:?} {}x{}", id, width, height);
                    self.textures.insert(*id, texture);
                }
            }
        }
        Ok(())
    }

    fn create_texture(&self, width: usize, height: usize, rgba: &[u8], pitch: u32) -> Result<PainterTexture> {
        let desc = D3D11_TEXTURE2D_DESC {
            Width: width as u32,
            Height: height as u32,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            CPUAccessFlags: 0,
            MiscFlags: 0,
        };
        let initial = D3D11_SUBRESOURCE_DATA {
            pSysMem: rgba.as_ptr() as *const c_void,
            SysMemPitch: pitch,
            SysMemSlicePitch: 0,
        };

        let mut texture = None;
        let mut view = None;
        unsafe {
            self.device
                .CreateTexture2D(&desc, Some(&initial), Some(&mut texture))?;
            let texture = texture.as_ref().context("no texture")?;
            self.device
                .CreateShaderResourceView(texture, None, Some(&mut view))?;
        }

        Ok(PainterTexture {
            texture: texture.context("no texture")?,
            view: view.context("no shader resource view")?,
        })
    }

    /// Make sure `buffer` holds at least `needed` elements of `element_size`.
    fn ensure_capacity(
        device: &ID3D11Device,
        buffer: &mut Option<DynamicBuffer>,
        needed: usize,
        element_size: usize,
        bind_flags: u32,
    ) -> Result<ID3D11Buffer> {
        match buffer {
            Some(existing) if existing.capacity >= needed => Ok(existing.buffer.clone()),
            _ => {
                let capacity = needed + BUFFER_SLACK;
                let created = create_buffer(device, capacity * element_size, bind_flags)?;
                *buffer = Some(DynamicBuffer {
                    buffer: created.clone(),
                    capacity,
                });
                Ok(created)
            }
        }
    }

    fn try_paint(&mut self, frame: &GuiFrame) -> Result<()> {
        self.upload_textures(frame)?;

        let meshes: Vec<(Rect, &egui::epaint::Mesh)> = frame
            .primitives
            .iter()
            .filter_map(|p| match &p.primitive {
                Primitive::Mesh(mesh) if !mesh.indices.is_empty() => Some((p.clip_rect, mesh)),
                _ => None,
            })
            .collect();

        if !meshes.is_empty() {
            self.draw_meshes(frame, &meshes)?;
        }

        for id in &frame.textures_delta.free {
            self.textures.remove(id);
        }
        Ok(())
    }

    fn draw_meshes(&mut self, frame: &GuiFrame, meshes: &[(Rect, &egui::epaint::Mesh)]) -> Result<()> {
        let vertex_total: usize = meshes.iter().map(|(_, m)| m.vertices.len()).sum();
        let index_total: usize = meshes.iter().map(|(_, m)| m.indices.len()).sum();

        let vertex_buffer = Self::ensure_capacity(
            &self.device,
            &mut self.vertex_buffer,
            vertex_total,
            std::mem::size_of::<Vertex>(),
            D3D11_BIND_VERTEX_BUFFER.0 as u32,
        )?;
        let index_buffer = Self::ensure_capacity(
            &self.device,
            &mut self.index_buffer,
            index_total,
            std::mem::size_of::<u32>(),
            D3D11_BIND_INDEX_BUFFER.0 as u32,
        )?;

        let ppp = frame.pixels_per_point;
        let screen_points = [
            frame.screen.width_f32() / ppp,
            frame.screen.height_f32() / ppp,
            0.0,
            0.0,
        ];

        unsafe {
            let mut vertices = D3D11_MAPPED_SUBRESOURCE::default();
            let mut indices = D3D11_MAPPED_SUBRESOURCE::default();
            let mut constants = D3D11_MAPPED_SUBRESOURCE::default();

            self.context
                .Map(&vertex_buffer, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut vertices))?;
            self.context
                .Map(&index_buffer, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut indices))?;

            let mut vertex_dst = vertices.pData as *mut Vertex;
            let mut index_dst = indices.pData as *mut u32;
            for (_, mesh) in meshes {
                std::ptr::copy_nonoverlapping(mesh.vertices.as_ptr(), vertex_dst, mesh.vertices.len());
                std::ptr::copy_nonoverlapping(mesh.indices.as_ptr(), index_dst, mesh.indices.len());
                vertex_dst = vertex_dst.add(mesh.vertices.len());
                index_dst = index_dst.add(mesh.indices.len());
            }

            self.context.Unmap(&vertex_buffer, 0);
            self.context.Unmap(&index_buffer, 0);

            self.context
                .Map(&self.constant_buffer, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut constants))?;
            std::ptr::copy_nonoverlapping(screen_points.as_ptr(), constants.pData as *mut f32, 4);
            self.context.Unmap(&self.constant_buffer, 0);

            self.bind_pipeline(&vertex_buffer, &index_buffer);

            let mut vertex_offset = 0usize;
            let mut index_offset = 0usize;
            for (clip, mesh) in meshes {
                if let Some(scissor) = scissor_rect(*clip, ppp, frame.screen.width, frame.screen.height) {
                    match self.textures.get(&mesh.texture_id) {
                        Some(texture) => {
                            self.context
                                .PSSetShaderResources(0, Some(&[Some(texture.view.clone())]));
                            self.context.RSSetScissorRects(Some(&[scissor]));
                            self.context.DrawIndexed(
                                mesh.indices.len() as u32,
                                index_offset as u32,
                                vertex_offset as i32,
                            );
                        }
                        None => warn!("Mesh references unknown texture {:?}", mesh.texture_id),
                    }
                }
                vertex_offset += mesh.vertices.len();
                index_offset += mesh.indices.len();
            }
        }

        Ok(())
    }

    unsafe fn bind_pipeline(&self, vertex_buffer: &ID3D11Buffer, index_buffer: &ID3D11Buffer) {
        let stride = VERTEX_STRIDE;
        let offset = 0u32;
        let vertex_buffers = [Some(vertex_buffer.clone())];

        self.context.IASetInputLayout(&self.input_layout);
        self.context.IASetVertexBuffers(
            0,
            1,
            Some(vertex_buffers.as_ptr()),
            Some(&stride),
            Some(&offset),
        );
        self.context
            .IASetIndexBuffer(index_buffer, DXGI_FORMAT_R32_UINT, 0);
        self.context
            .IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
        self.context.VSSetShader(&self.vertex_shader, None);
        self.context
            .VSSetConstantBuffers(0, Some(&[Some(self.constant_buffer.clone())]));
        self.context.PSSetShader(&self.pixel_shader, None);
        self.context
            .PSSetSamplers(0, Some(&[Some(self.sampler.clone())]));
        self.context
            .OMSetBlendState(&self.blend_state, Some(&[0.0; 4]), 0xffff_ffff);
        self.context.RSSetState(&self.rasterizer_state);
    }
}

/// Clip rect in points to a pixel scissor rect clamped to the screen.
fn scissor_rect(clip: Rect, pixels_per_point: f32, width: u32, height: u32) -> Option<RECT> {
    let left = (clip.min.x * pixels_per_point).round().clamp(0.0, width as f32) as i32;
    let top = (clip.min.y * pixels_per_point).round().clamp(0.0, height as f32) as i32;
    let right = (clip.max.x * pixels_per_point).round().clamp(0.0, width as f32) as i32;
    let bottom = (clip.max.y * pixels_per_point).round().clamp(0.0, height as f32) as i32;

    (right > left && bottom > top).then_some(RECT {
        left,
        top,
        right,
        bottom,
    })
}

impl GuiPainter for D3d11Painter {
    fn paint(&mut self, frame: &GuiFrame) {
        if let Err(e) = self.try_paint(frame) {
            warn!("GUI paint failed: {:#}", e);
        }
    }
}

impl Drop for D3d11Painter {
    fn drop(&mut self) {
        self.textures.clear();
        debug!("GUI painter released");
    }
}
