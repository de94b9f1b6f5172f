//! Register writes: validation, storage and forwarding to the units caching each register.
use crate::stats::Counter;
use crate::system::System;
use crate::system::cp::transaction::{Kind, Transaction};
use crate::system::cp::updates::Update;
use crate::system::cp::{
    Outcome, Status, send_assembly, send_clipper, send_raster, send_shaders, send_streamer,
};
use crate::system::regs::*;
use crate::system::units::{
    AssemblyCommand, ClipperCommand, McCommand, Message, RasterCommand, RegWrite, ShaderCommand,
    StreamerCommand, Targets,
};

type Check = fn(&RegData) -> bool;
type Store = fn(&mut Registers, usize, &RegData);

/// How a writable register is handled.
#[derive(Clone, Copy)]
pub struct Handler {
    /// Number of sub-registers.
    pub subs: usize,
    /// Units caching a copy of the register.
    pub targets: Targets,
    /// Validates a value before it is stored.
    pub check: Check,
    pub store: Store,
}

impl Handler {
    fn new(subs: usize, targets: Targets, store: Store) -> Self {
        Self {
            subs,
            targets,
            check: |_| true,
            store,
        }
    }

    fn check(self, check: Check) -> Self {
        Self { check, ..self }
    }
}

const VIEWPORT: Targets = Targets::RASTERIZER.union(Targets::STAMP).union(Targets::DAC);
const MULTISAMPLING: Targets = VIEWPORT.union(Targets::FRAGMENT_SHADERS);
const STREAM: Targets = Targets::STREAMER.union(Targets::TEXTURE);

fn valid_pc(data: &RegData) -> bool {
    data.uint() < INSTRUCTION_MEMORY_SIZE
}

fn valid_byte(data: &RegData) -> bool {
    data.uint() <= u8::MAX as u32
}

fn valid_level(data: &RegData) -> bool {
    (data.uint() as usize) < MAX_TEXTURE_SIZE
}

/// Handler of a register, `None` for read-only registers.
pub fn handler(reg: Reg) -> Option<Handler> {
    use Targets as T;

    let h = Handler::new;
    let handler = match reg {
        Reg::Status | Reg::Memory => return None,

        Reg::VertexProgram => h(1, T::empty(), |r, _, d| r.vertex.address = d.uint()),
        Reg::VertexProgramPc => {
            h(1, T::VERTEX_SHADERS, |r, _, d| r.vertex.start_pc = d.uint()).check(valid_pc)
        }
        Reg::VertexProgramSize => h(1, T::empty(), |r, _, d| r.vertex.size = d.uint()),
        Reg::VertexThreadResources => {
            h(1, T::VERTEX_SHADERS, |r, _, d| r.vertex.resources = d.uint())
        }
        Reg::VertexConstant => h(MAX_VERTEX_CONSTANTS, T::VERTEX_SHADERS, |r, s, d| {
            r.vertex.constants[s] = d.quad()
        }),
        Reg::VertexOutputAttribute => h(
            MAX_VERTEX_ATTRIBUTES,
            T::STREAMER | T::ASSEMBLY | T::VERTEX_SHADERS,
            |r, s, d| r.output_attributes[s] = d.boolean(),
        ),
        Reg::VertexAttributeMap => h(MAX_VERTEX_ATTRIBUTES, STREAM, |r, s, d| {
            r.streams.attribute_map[s] = d.uint()
        })
        .check(|d| (d.uint() as usize) < MAX_STREAM_BUFFERS || d.uint() == INACTIVE_ATTRIBUTE),
        Reg::VertexAttributeDefaultValue => h(MAX_VERTEX_ATTRIBUTES, STREAM, |r, s, d| {
            r.streams.attribute_default[s] = d.quad()
        }),
        Reg::StreamAddress => h(MAX_STREAM_BUFFERS, STREAM, |r, s, d| {
            r.streams.address[s] = d.uint()
        }),
        Reg::StreamStride => h(MAX_STREAM_BUFFERS, STREAM, |r, s, d| {
            r.streams.stride[s] = d.uint()
        }),
        Reg::StreamData => h(MAX_STREAM_BUFFERS, STREAM, |r, s, d| {
            r.streams.data[s] = d.stream_data()
        }),
        Reg::StreamElements => h(MAX_STREAM_BUFFERS, STREAM, |r, s, d| {
            r.streams.elements[s] = d.uint()
        })
        .check(|d| d.uint() <= 4),
        Reg::StreamFrequency => h(MAX_STREAM_BUFFERS, T::STREAMER, |r, s, d| {
            r.streams.frequency[s] = d.uint()
        }),
        Reg::StreamStart => h(1, T::STREAMER, |r, _, d| r.streams.start = d.uint()),
        Reg::StreamCount => h(1, T::STREAMER | T::ASSEMBLY, |r, _, d| {
            r.streams.count = d.uint()
        }),
        Reg::StreamInstances => h(1, T::STREAMER | T::ASSEMBLY, |r, _, d| {
            r.streams.instances = d.uint()
        }),
        Reg::IndexMode => h(1, T::STREAMER, |r, _, d| r.streams.indexed = d.boolean()),
        Reg::IndexStream => h(1, T::STREAMER, |r, _, d| r.streams.index_stream = d.uint())
            .check(|d| (d.uint() as usize) < MAX_STREAM_BUFFERS),
        Reg::D3d9ColorStream => h(MAX_STREAM_BUFFERS, STREAM, |r, s, d| {
            r.streams.d3d9_color[s] = d.boolean()
        }),
        Reg::AttributeLoadBypass => h(1, STREAM, |r, _, d| {
            r.streams.attribute_load_bypass = d.boolean()
        }),
        Reg::Primitive => h(1, T::ASSEMBLY, |r, _, d| r.primitive = d.primitive()),
        Reg::FrustumClipping => h(1, T::CLIPPER | T::RASTERIZER, |r, _, d| {
            r.clip.frustum = d.boolean()
        }),
        Reg::UserClip => h(MAX_USER_CLIP_PLANES, T::CLIPPER | T::RASTERIZER, |r, s, d| {
            r.clip.user_planes[s] = d.quad()
        }),
        Reg::UserClipPlane => h(1, T::CLIPPER | T::RASTERIZER, |r, _, d| {
            r.clip.user_planes_enabled = d.boolean()
        }),

        Reg::FrontBufferAddr => h(1, T::COLOR | T::DAC, |r, _, d| r.buffers.front = d.uint()),
        Reg::BackBufferAddr => h(1, T::COLOR | T::DAC, |r, _, d| r.buffers.back = d.uint()),
        Reg::ZStencilBufferAddr => h(1, T::ZSTENCIL | T::DAC, |r, _, d| {
            r.buffers.zstencil = d.uint()
        }),
        Reg::TextureMemAddr => h(1, T::empty(), |r, _, d| r.buffers.texture = d.uint()),
        Reg::ProgramMemAddr => h(1, T::empty(), |r, _, d| r.buffers.program = d.uint()),
        Reg::FaceMode => h(1, T::RASTERIZER, |r, _, d| r.clip.face_mode = d.face_mode()),
        Reg::Culling => h(1, T::RASTERIZER, |r, _, d| r.clip.cull_mode = d.culling()),
        Reg::HierarchicalZ => h(1, T::RASTERIZER, |r, _, d| {
            r.raster.hierarchical_z = d.boolean()
        }),
        Reg::EarlyZ => h(1, T::RASTERIZER, |r, _, d| r.raster.early_z = d.boolean()),
        Reg::DisplayXRes => h(1, VIEWPORT, |r, _, d| r.display.width = d.uint())
            .check(|d| (1..=MAX_DISPLAY_RES).contains(&d.uint())),
        Reg::DisplayYRes => h(1, VIEWPORT, |r, _, d| r.display.height = d.uint())
            .check(|d| (1..=MAX_DISPLAY_RES).contains(&d.uint())),
        Reg::D3d9PixelCoordinates => h(1, T::RASTERIZER | T::DAC, |r, _, d| {
            r.display.d3d9_pixel_coordinates = d.boolean()
        }),
        Reg::ViewportIniX => h(1, VIEWPORT, |r, _, d| r.raster.viewport.x = d.int())
            .check(|d| (MIN_VIEWPORT..=MAX_VIEWPORT).contains(&d.int())),
        Reg::ViewportIniY => h(1, VIEWPORT, |r, _, d| r.raster.viewport.y = d.int())
            .check(|d| (MIN_VIEWPORT..=MAX_VIEWPORT).contains(&d.int())),
        Reg::ViewportWidth => h(1, VIEWPORT, |r, _, d| r.raster.viewport.width = d.uint())
            .check(|d| d.uint() <= MAX_VIEWPORT as u32),
        Reg::ViewportHeight => h(1, VIEWPORT, |r, _, d| r.raster.viewport.height = d.uint())
            .check(|d| d.uint() <= MAX_VIEWPORT as u32),
        Reg::ScissorTest => h(1, T::RASTERIZER, |r, _, d| {
            r.raster.scissor_test = d.boolean()
        }),
        Reg::ScissorIniX => h(1, T::RASTERIZER, |r, _, d| r.raster.scissor.x = d.int()),
        Reg::ScissorIniY => h(1, T::RASTERIZER, |r, _, d| r.raster.scissor.y = d.int()),
        Reg::ScissorWidth => h(1, T::RASTERIZER, |r, _, d| {
            r.raster.scissor.width = d.uint()
        }),
        Reg::ScissorHeight => h(1, T::RASTERIZER, |r, _, d| {
            r.raster.scissor.height = d.uint()
        }),
        Reg::DepthRangeNear => h(1, T::RASTERIZER, |r, _, d| r.raster.near = d.float())
            .check(|d| (0.0..=1.0).contains(&d.float())),
        Reg::DepthRangeFar => h(1, T::RASTERIZER, |r, _, d| r.raster.far = d.float())
            .check(|d| (0.0..=1.0).contains(&d.float())),
        Reg::DepthSlopeFactor => h(1, T::RASTERIZER, |r, _, d| {
            r.raster.slope_factor = d.float()
        }),
        Reg::DepthUnitOffset => h(1, T::RASTERIZER, |r, _, d| {
            r.raster.unit_offset = d.float()
        }),
        Reg::ZBufferBitPrecision => h(1, T::RASTERIZER | T::ZSTENCIL | T::DAC, |r, _, d| {
            r.raster.depth_bits = d.uint()
        })
        .check(|d| matches!(d.uint(), 16 | 24 | 32)),
        Reg::D3d9DepthRange => h(1, T::CLIPPER | T::RASTERIZER, |r, _, d| {
            r.raster.d3d9_depth_range = d.boolean()
        }),
        Reg::D3d9RasterizationRules => h(1, T::RASTERIZER, |r, _, d| {
            r.raster.d3d9_rasterization_rules = d.boolean()
        }),
        Reg::TwoSidedLighting => h(1, T::RASTERIZER, |r, _, d| {
            r.raster.two_sided_lighting = d.boolean()
        }),
        Reg::Multisampling => h(1, MULTISAMPLING, |r, _, d| {
            r.raster.multisampling = d.boolean()
        }),
        Reg::MsaaSamples => h(1, MULTISAMPLING, |r, _, d| r.raster.msaa_samples = d.uint())
            .check(|d| (1..=MAX_MSAA_SAMPLES).contains(&d.uint())),
        Reg::Interpolation => h(MAX_FRAGMENT_ATTRIBUTES, T::RASTERIZER, |r, s, d| {
            r.raster.interpolation[s] = d.boolean()
        }),
        Reg::FragmentInputAttributes => h(
            MAX_FRAGMENT_ATTRIBUTES,
            T::RASTERIZER | T::FRAGMENT_SHADERS,
            |r, s, d| r.raster.fragment_inputs[s] = d.boolean(),
        ),
        Reg::FragmentProgram => h(1, T::empty(), |r, _, d| r.fragment.address = d.uint()),
        Reg::FragmentProgramPc => {
            h(1, T::FRAGMENT_SHADERS, |r, _, d| r.fragment.start_pc = d.uint()).check(valid_pc)
        }
        Reg::FragmentProgramSize => h(1, T::empty(), |r, _, d| r.fragment.size = d.uint()),
        Reg::FragmentThreadResources => h(1, T::FRAGMENT_SHADERS, |r, _, d| {
            r.fragment.resources = d.uint()
        }),
        Reg::FragmentConstant => h(MAX_FRAGMENT_CONSTANTS, T::FRAGMENT_SHADERS, |r, s, d| {
            r.fragment.constants[s] = d.quad()
        }),
        Reg::ModifyFragmentDepth => h(1, T::RASTERIZER | T::ZSTENCIL, |r, _, d| {
            r.zstencil.modify_depth = d.boolean()
        }),
        Reg::ShaderProgramAddress => h(1, T::empty(), |r, _, d| r.shader.address = d.uint()),
        Reg::ShaderProgramSize => h(1, T::empty(), |r, _, d| r.shader.size = d.uint()),
        Reg::ShaderProgramLoadPc => {
            h(1, T::empty(), |r, _, d| r.shader.load_pc = d.uint()).check(valid_pc)
        }
        Reg::ShaderProgramPc => h(SHADER_TARGETS, T::SHADERS, |r, s, d| {
            r.shader.start_pc[s] = d.uint()
        })
        .check(valid_pc),
        Reg::ShaderThreadResources => h(SHADER_TARGETS, T::SHADERS, |r, s, d| {
            r.shader.resources[s] = d.uint()
        }),

        Reg::TextureEnable => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].enabled = d.boolean()
        }),
        Reg::TextureMode => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].mode = d.texture_mode()
        }),
        Reg::TextureAddress => h(MAX_TEXTURES * TEXTURE_ADDRESSES, T::TEXTURE, |r, s, d| {
            let (unit, image) = (s / TEXTURE_ADDRESSES, s % TEXTURE_ADDRESSES);
            r.textures[unit].address[image / CUBEMAP_IMAGES][image % CUBEMAP_IMAGES] = d.uint();
        }),
        Reg::TextureWidth => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].width = d.uint()
        }),
        Reg::TextureHeight => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].height = d.uint()
        }),
        Reg::TextureDepth => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].depth = d.uint()
        }),
        Reg::TextureWidth2 => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].width_log2 = d.uint()
        })
        .check(valid_level),
        Reg::TextureHeight2 => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].height_log2 = d.uint()
        })
        .check(valid_level),
        Reg::TextureDepth2 => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].depth_log2 = d.uint()
        })
        .check(valid_level),
        Reg::TextureBorder => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].border = d.uint()
        }),
        Reg::TextureFormat => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].format = d.texture_format()
        }),
        Reg::TextureReverse => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].reverse = d.boolean()
        }),
        Reg::TextureD3d9ColorConv => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].d3d9_color_conv = d.boolean()
        }),
        Reg::TextureD3d9VInvert => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].d3d9_v_invert = d.boolean()
        }),
        Reg::TextureCompression => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].compression = d.texture_compression()
        }),
        Reg::TextureBlocking => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].blocking = d.texture_blocking()
        }),
        Reg::TextureBorderColor => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].border_color = d.quad()
        }),
        Reg::TextureWrapS => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].wrap_s = d.clamp()
        }),
        Reg::TextureWrapT => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].wrap_t = d.clamp()
        }),
        Reg::TextureWrapR => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].wrap_r = d.clamp()
        }),
        Reg::TextureNonNormalized => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].non_normalized = d.boolean()
        }),
        Reg::TextureMinFilter => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].min_filter = d.filter()
        }),
        Reg::TextureMagFilter => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].mag_filter = d.filter()
        }),
        Reg::TextureEnableComparison => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].comparison = d.boolean()
        }),
        Reg::TextureComparisonFunction => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].comparison_function = d.compare()
        }),
        Reg::TextureSrgb => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].srgb = d.boolean()
        }),
        Reg::TextureMinLod => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].min_lod = d.float()
        }),
        Reg::TextureMaxLod => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].max_lod = d.float()
        }),
        Reg::TextureLodBias => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].lod_bias = d.float()
        }),
        Reg::TextureMinLevel => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].min_level = d.uint()
        })
        .check(valid_level),
        Reg::TextureMaxLevel => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].max_level = d.uint()
        })
        .check(valid_level),
        Reg::TextureUnitLodBias => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].unit_lod_bias = d.float()
        }),
        Reg::TextureMaxAnisotropy => h(MAX_TEXTURES, T::TEXTURE, |r, s, d| {
            r.textures[s].max_anisotropy = d.uint()
        })
        .check(|d| (1..=MAX_ANISOTROPY).contains(&d.uint())),

        Reg::ZBufferClear => h(1, T::RASTERIZER | T::ZSTENCIL | T::DAC, |r, _, d| {
            r.zstencil.depth_clear = d.uint()
        }),
        Reg::StencilBufferClear => h(1, T::ZSTENCIL | T::DAC, |r, _, d| {
            r.zstencil.stencil_clear = d.uint()
        }),
        Reg::ZStencilStateBufferAddr => h(1, T::ZSTENCIL, |r, _, d| {
            r.zstencil.state_buffer = d.uint()
        }),
        Reg::StencilTest => h(1, T::RASTERIZER | T::ZSTENCIL, |r, _, d| {
            r.zstencil.stencil_test = d.boolean()
        }),
        Reg::StencilFunction => h(1, T::ZSTENCIL, |r, _, d| {
            r.zstencil.stencil_function = d.compare()
        }),
        Reg::StencilReference => h(1, T::ZSTENCIL, |r, _, d| {
            r.zstencil.stencil_reference = d.uint() as u8
        })
        .check(valid_byte),
        Reg::StencilCompareMask => h(1, T::ZSTENCIL, |r, _, d| {
            r.zstencil.stencil_compare_mask = d.uint() as u8
        })
        .check(valid_byte),
        Reg::StencilUpdateMask => h(1, T::ZSTENCIL, |r, _, d| {
            r.zstencil.stencil_update_mask = d.uint() as u8
        })
        .check(valid_byte),
        Reg::StencilFailUpdate => h(1, T::ZSTENCIL, |r, _, d| {
            r.zstencil.stencil_fail = d.stencil_update()
        }),
        Reg::DepthFailUpdate => h(1, T::ZSTENCIL, |r, _, d| {
            r.zstencil.depth_fail = d.stencil_update()
        }),
        Reg::DepthPassUpdate => h(1, T::ZSTENCIL, |r, _, d| {
            r.zstencil.depth_pass = d.stencil_update()
        }),
        Reg::DepthTest => h(1, T::RASTERIZER | T::ZSTENCIL, |r, _, d| {
            r.zstencil.depth_test = d.boolean()
        }),
        Reg::DepthFunction => h(1, T::RASTERIZER | T::ZSTENCIL, |r, _, d| {
            r.zstencil.depth_function = d.compare()
        }),
        Reg::DepthMask => h(1, T::ZSTENCIL, |r, _, d| {
            r.zstencil.depth_mask = d.boolean()
        }),
        Reg::ZStencilCompression => h(1, T::ZSTENCIL | T::DAC, |r, _, d| {
            r.zstencil.compression = d.boolean()
        }),

        Reg::ColorBufferFormat => h(1, T::COLOR | T::DAC, |r, _, d| {
            r.color.format = d.texture_format()
        }),
        Reg::ColorCompression => h(1, T::COLOR | T::DAC, |r, _, d| {
            r.color.compression = d.boolean()
        }),
        Reg::ColorSrgbWrite => h(1, T::COLOR, |r, _, d| r.color.srgb_write = d.boolean()),
        Reg::RenderTargetEnable => h(
            MAX_RENDER_TARGETS,
            T::RASTERIZER | T::COLOR | T::DAC,
            |r, s, d| r.targets[s].enabled = d.boolean(),
        ),
        Reg::RenderTargetFormat => h(MAX_RENDER_TARGETS, T::COLOR | T::DAC, |r, s, d| {
            r.targets[s].format = d.texture_format()
        }),
        Reg::RenderTargetAddress => h(MAX_RENDER_TARGETS, T::COLOR | T::DAC, |r, s, d| {
            r.targets[s].address = d.uint()
        }),
        Reg::ColorBufferClear => h(1, T::COLOR | T::DAC, |r, _, d| r.color.clear = d.quad()),
        Reg::ColorStateBufferAddr => h(1, T::COLOR, |r, _, d| {
            r.color.state_buffer = d.uint()
        }),
        Reg::ColorBlend => h(MAX_RENDER_TARGETS, T::COLOR, |r, s, d| {
            r.targets[s].blend = d.boolean()
        }),
        Reg::BlendEquation => h(MAX_RENDER_TARGETS, T::COLOR, |r, s, d| {
            r.targets[s].equation = d.blend_equation()
        }),
        Reg::BlendSrcRgb => h(MAX_RENDER_TARGETS, T::COLOR, |r, s, d| {
            r.targets[s].src_rgb = d.blend_function()
        }),
        Reg::BlendDstRgb => h(MAX_RENDER_TARGETS, T::COLOR, |r, s, d| {
            r.targets[s].dst_rgb = d.blend_function()
        }),
        Reg::BlendSrcAlpha => h(MAX_RENDER_TARGETS, T::COLOR, |r, s, d| {
            r.targets[s].src_alpha = d.blend_function()
        }),
        Reg::BlendDstAlpha => h(MAX_RENDER_TARGETS, T::COLOR, |r, s, d| {
            r.targets[s].dst_alpha = d.blend_function()
        }),
        Reg::BlendColor => h(MAX_RENDER_TARGETS, T::COLOR, |r, s, d| {
            r.targets[s].blend_color = d.quad()
        }),
        Reg::ColorMaskR => h(MAX_RENDER_TARGETS, T::RASTERIZER | T::COLOR, |r, s, d| {
            r.targets[s].mask[0] = d.boolean()
        }),
        Reg::ColorMaskG => h(MAX_RENDER_TARGETS, T::RASTERIZER | T::COLOR, |r, s, d| {
            r.targets[s].mask[1] = d.boolean()
        }),
        Reg::ColorMaskB => h(MAX_RENDER_TARGETS, T::RASTERIZER | T::COLOR, |r, s, d| {
            r.targets[s].mask[2] = d.boolean()
        }),
        Reg::ColorMaskA => h(MAX_RENDER_TARGETS, T::RASTERIZER | T::COLOR, |r, s, d| {
            r.targets[s].mask[3] = d.boolean()
        }),
        Reg::LogicalOperation => h(1, T::COLOR, |r, _, d| {
            r.color.logical_operation = d.boolean()
        }),
        Reg::LogicOpFunction => h(1, T::COLOR, |r, _, d| r.color.logic_op = d.logic_op()),
        Reg::McSecondInterleavingStart => h(1, T::MEMORY, |r, _, d| {
            r.mc_second_interleaving_start = d.uint()
        }),

        Reg::BlitIniX => h(1, T::DAC, |r, _, d| r.blit.ini_x = d.uint()),
        Reg::BlitIniY => h(1, T::DAC, |r, _, d| r.blit.ini_y = d.uint()),
        Reg::BlitXOffset => h(1, T::DAC, |r, _, d| r.blit.x_offset = d.uint()),
        Reg::BlitYOffset => h(1, T::DAC, |r, _, d| r.blit.y_offset = d.uint()),
        Reg::BlitWidth => h(1, T::DAC, |r, _, d| r.blit.width = d.uint()),
        Reg::BlitHeight => h(1, T::DAC, |r, _, d| r.blit.height = d.uint()),
        Reg::BlitDstAddress => h(1, T::DAC, |r, _, d| r.blit.dst_address = d.uint()),
        Reg::BlitDstTextureWidth2 => h(1, T::DAC, |r, _, d| {
            r.blit.dst_width_log2 = d.uint()
        }),
        Reg::BlitDstTextureFormat => h(1, T::DAC, |r, _, d| {
            r.blit.dst_format = d.texture_format()
        }),
        Reg::BlitDstTextureBlocking => h(1, T::DAC, |r, _, d| {
            r.blit.dst_blocking = d.texture_blocking()
        }),
    };

    Some(handler)
}

/// The shader command mirroring a register write, and the shaders it goes to.
fn shader_command(reg: Reg, sub: u32, data: &RegData, targets: Targets) -> (Targets, ShaderCommand) {
    let command = match reg {
        Reg::VertexProgramPc => ShaderCommand::SetInitPc {
            target: ShaderTarget::Vertex,
            pc: data.uint(),
        },
        Reg::VertexThreadResources => ShaderCommand::SetThreadResources {
            target: ShaderTarget::Vertex,
            resources: data.uint(),
        },
        Reg::FragmentProgramPc => ShaderCommand::SetInitPc {
            target: ShaderTarget::Fragment,
            pc: data.uint(),
        },
        Reg::FragmentThreadResources => ShaderCommand::SetThreadResources {
            target: ShaderTarget::Fragment,
            resources: data.uint(),
        },
        Reg::VertexConstant | Reg::FragmentConstant => ShaderCommand::ParamWrite {
            index: sub,
            value: data.quad(),
        },
        Reg::VertexOutputAttribute => ShaderCommand::SetOutputAttribute {
            attribute: sub,
            active: data.boolean(),
        },
        Reg::FragmentInputAttributes => ShaderCommand::SetInputAttribute {
            attribute: sub,
            active: data.boolean(),
        },
        Reg::Multisampling => ShaderCommand::SetMultisampling(data.boolean()),
        Reg::MsaaSamples => ShaderCommand::SetMsaaSamples(data.uint()),
        Reg::ShaderProgramPc | Reg::ShaderThreadResources => {
            let target = ShaderTarget::new(sub);
            let shaders = match target {
                ShaderTarget::Vertex => Targets::VERTEX_SHADERS,
                _ => Targets::FRAGMENT_SHADERS,
            };

            let command = if reg == Reg::ShaderProgramPc {
                ShaderCommand::SetInitPc {
                    target,
                    pc: data.uint(),
                }
            } else {
                ShaderCommand::SetThreadResources {
                    target,
                    resources: data.uint(),
                }
            };

            return (shaders, command);
        }
        _ => panic!("{reg:?} has no shader command"),
    };

    (targets, command)
}

/// Validates, stores and forwards a register write.
pub fn write_register(sys: &mut System, reg: Reg, sub: u32, data: RegData) {
    let Some(handler) = handler(reg) else {
        panic!("GPU register {reg:?} is read only");
    };

    assert!(
        (sub as usize) < handler.subs,
        "GPU register {reg:?} has no sub-register {sub}"
    );
    assert!(
        (handler.check)(&data),
        "invalid value {data:?} for GPU register {reg:?}[{sub}]"
    );

    tracing::trace!(cycle = sys.cycle, ?reg, sub, ?data, "register write");

    (handler.store)(&mut sys.regs, sub as usize, &data);
    sys.stats.inc(Counter::RegWrites);

    let targets = handler.targets;
    let write = RegWrite { reg, sub, data };

    if targets.contains(Targets::STREAMER) {
        send_streamer(sys, StreamerCommand::RegWrite(write));
    }

    if targets.contains(Targets::ASSEMBLY) {
        send_assembly(sys, AssemblyCommand::RegWrite(write));
    }

    if targets.contains(Targets::CLIPPER) {
        send_clipper(sys, ClipperCommand::RegWrite(write));
    }

    let raster = targets.intersection(Targets::RASTERIZER | Targets::STAMP | Targets::DAC);
    if !raster.is_empty() {
        send_raster(sys, raster, RasterCommand::RegWrite(write));
    }

    let shaders = targets.intersection(Targets::SHADERS);
    if !shaders.is_empty() {
        let (shaders, command) = shader_command(reg, sub, &data, shaders);
        send_shaders(sys, shaders, command);
    }

    if targets.contains(Targets::TEXTURE) {
        send_shaders(sys, Targets::TEXTURE, ShaderCommand::TextureRegWrite(write));
    }

    if targets.contains(Targets::MEMORY) {
        let cookies = sys.cp.lineage();
        sys.links.memory.command.write(
            sys.cycle,
            Message {
                cookies,
                command: McCommand::RegWrite(write),
            },
        );
    }
}

/// Applies a buffered update on behalf of the transaction that queued it.
pub fn apply_update(sys: &mut System, update: Update) {
    let cookies = std::mem::replace(&mut sys.cp.cookies, update.cookies);
    write_register(sys, update.reg, update.sub, update.data);
    sys.cp.cookies = cookies;
}

/// Processes a register write transaction, deferring it to a batch boundary if a batch is in
/// flight.
pub fn process(sys: &mut System, transaction: Transaction) -> Outcome {
    let Kind::RegWrite { reg, sub, data } = transaction.kind else {
        unreachable!("not a register write transaction");
    };

    let group = reg.group();

    // the fragment buffer belongs to the batch being rasterized, not to the overlapped one
    if group == Group::Fragment && sys.cp.geometry_started {
        return Outcome::Deferred(transaction);
    }

    let immediate = match sys.regs.status {
        Status::Ready => true,
        Status::EndGeometry => {
            group == Group::Geometry
                && !sys.cp.geometry_started
                && sys.cp.updates.geometry.is_empty()
        }
        _ => false,
    };

    if immediate {
        write_register(sys, reg, sub, data);
        return Outcome::Done;
    }

    let update = Update {
        reg,
        sub,
        data,
        cookies: transaction.cookies.clone(),
    };

    match sys.cp.updates.get_mut(group).push(update) {
        Ok(()) => {
            tracing::trace!(cycle = sys.cycle, ?reg, sub, ?group, "register write buffered");
            Outcome::Done
        }
        Err(_) => Outcome::Deferred(transaction),
    }
}
