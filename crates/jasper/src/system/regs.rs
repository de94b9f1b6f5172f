//! GPU register file.
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use strum::FromRepr;

use crate::system::cp::Status;

pub const MAX_DISPLAY_RES: u32 = 4096;
pub const MIN_VIEWPORT: i32 = 0;
pub const MAX_VIEWPORT: i32 = 4096;
pub const MAX_VERTEX_CONSTANTS: usize = 512;
pub const MAX_FRAGMENT_CONSTANTS: usize = 1024;
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;
pub const MAX_STREAM_BUFFERS: usize = 32;
pub const MAX_USER_CLIP_PLANES: usize = 6;
pub const MAX_FRAGMENT_ATTRIBUTES: usize = 16;
pub const MAX_TEXTURES: usize = 16;
pub const MAX_TEXTURE_SIZE: usize = 13;
pub const CUBEMAP_IMAGES: usize = 6;
pub const MAX_ANISOTROPY: u32 = 16;
pub const MAX_MSAA_SAMPLES: u32 = 16;
pub const MAX_RENDER_TARGETS: usize = 8;
pub const SHADER_TARGETS: usize = 4;
/// Size of the unified shader instruction memory, in instructions.
pub const INSTRUCTION_MEMORY_SIZE: u32 = 2048;
/// Attribute map value of an attribute that is not read from any stream.
pub const INACTIVE_ATTRIBUTE: u32 = 255;
/// Number of texture address sub-registers of a single texture unit.
pub const TEXTURE_ADDRESSES: usize = MAX_TEXTURE_SIZE * CUBEMAP_IMAGES;

const_assert!(MAX_STREAM_BUFFERS <= 32);
const_assert!(MAX_TEXTURES * TEXTURE_ADDRESSES <= u32::MAX as usize);

/// A GPU register.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum Reg {
    Status                      = 0x00,
    Memory                      = 0x01,
    VertexProgram               = 0x02,
    VertexProgramPc             = 0x03,
    VertexProgramSize           = 0x04,
    VertexThreadResources       = 0x05,
    VertexConstant              = 0x06,
    VertexOutputAttribute       = 0x07,
    VertexAttributeMap          = 0x08,
    VertexAttributeDefaultValue = 0x09,
    StreamAddress               = 0x0A,
    StreamStride                = 0x0B,
    StreamData                  = 0x0C,
    StreamElements              = 0x0D,
    StreamFrequency             = 0x0E,
    StreamStart                 = 0x0F,
    StreamCount                 = 0x10,
    StreamInstances             = 0x11,
    IndexMode                   = 0x12,
    IndexStream                 = 0x13,
    D3d9ColorStream             = 0x14,
    AttributeLoadBypass         = 0x15,
    Primitive                   = 0x16,
    FrustumClipping             = 0x17,
    UserClip                    = 0x18,
    UserClipPlane               = 0x19,

    // 0x1A closes the geometry group
    FrontBufferAddr             = 0x1B,
    BackBufferAddr              = 0x1C,
    ZStencilBufferAddr          = 0x1D,
    TextureMemAddr              = 0x1E,
    ProgramMemAddr              = 0x1F,
    FaceMode                    = 0x20,
    Culling                     = 0x21,
    HierarchicalZ               = 0x22,
    EarlyZ                      = 0x23,
    DisplayXRes                 = 0x24,
    DisplayYRes                 = 0x25,
    D3d9PixelCoordinates        = 0x26,
    ViewportIniX                = 0x27,
    ViewportIniY                = 0x28,
    ViewportWidth               = 0x29,
    ViewportHeight              = 0x2A,
    ScissorTest                 = 0x2B,
    ScissorIniX                 = 0x2C,
    ScissorIniY                 = 0x2D,
    ScissorWidth                = 0x2E,
    ScissorHeight               = 0x2F,
    DepthRangeNear              = 0x30,
    DepthRangeFar               = 0x31,
    DepthSlopeFactor            = 0x32,
    DepthUnitOffset             = 0x33,
    ZBufferBitPrecision         = 0x34,
    D3d9DepthRange              = 0x35,
    D3d9RasterizationRules      = 0x36,
    TwoSidedLighting            = 0x37,
    Multisampling               = 0x38,
    MsaaSamples                 = 0x39,
    Interpolation               = 0x3A,
    FragmentInputAttributes     = 0x3B,
    FragmentProgram             = 0x3C,
    FragmentProgramPc           = 0x3D,
    FragmentProgramSize         = 0x3E,
    FragmentThreadResources     = 0x3F,
    FragmentConstant            = 0x40,
    ModifyFragmentDepth         = 0x41,
    ShaderProgramAddress        = 0x42,
    ShaderProgramSize           = 0x43,
    ShaderProgramLoadPc         = 0x44,
    ShaderProgramPc             = 0x45,
    ShaderThreadResources       = 0x46,
    TextureEnable               = 0x47,
    TextureMode                 = 0x48,
    TextureAddress              = 0x49,
    TextureWidth                = 0x4A,
    TextureHeight               = 0x4B,
    TextureDepth                = 0x4C,
    TextureWidth2               = 0x4D,
    TextureHeight2              = 0x4E,
    TextureDepth2               = 0x4F,
    TextureBorder               = 0x50,
    TextureFormat               = 0x51,
    TextureReverse              = 0x52,
    TextureD3d9ColorConv        = 0x53,
    TextureD3d9VInvert          = 0x54,
    TextureCompression          = 0x55,
    TextureBlocking             = 0x56,
    TextureBorderColor          = 0x57,
    TextureWrapS                = 0x58,
    TextureWrapT                = 0x59,
    TextureWrapR                = 0x5A,
    TextureNonNormalized        = 0x5B,
    TextureMinFilter            = 0x5C,
    TextureMagFilter            = 0x5D,
    TextureEnableComparison     = 0x5E,
    TextureComparisonFunction   = 0x5F,
    TextureSrgb                 = 0x60,
    TextureMinLod               = 0x61,
    TextureMaxLod               = 0x62,
    TextureLodBias              = 0x63,
    TextureMinLevel             = 0x64,
    TextureMaxLevel             = 0x65,
    TextureUnitLodBias          = 0x66,
    TextureMaxAnisotropy        = 0x67,
    ZBufferClear                = 0x68,
    StencilBufferClear          = 0x69,
    ZStencilStateBufferAddr     = 0x6A,
    StencilTest                 = 0x6B,
    StencilFunction             = 0x6C,
    StencilReference            = 0x6D,
    StencilCompareMask          = 0x6E,
    StencilUpdateMask           = 0x6F,
    StencilFailUpdate           = 0x70,
    DepthFailUpdate             = 0x71,
    DepthPassUpdate             = 0x72,
    DepthTest                   = 0x73,
    DepthFunction               = 0x74,
    DepthMask                   = 0x75,
    ZStencilCompression         = 0x76,
    ColorBufferFormat           = 0x77,
    ColorCompression            = 0x78,
    ColorSrgbWrite              = 0x79,
    RenderTargetEnable          = 0x7A,
    RenderTargetFormat          = 0x7B,
    RenderTargetAddress         = 0x7C,
    ColorBufferClear            = 0x7D,
    ColorStateBufferAddr        = 0x7E,
    ColorBlend                  = 0x7F,
    BlendEquation               = 0x80,
    BlendSrcRgb                 = 0x81,
    BlendDstRgb                 = 0x82,
    BlendSrcAlpha               = 0x83,
    BlendDstAlpha               = 0x84,
    BlendColor                  = 0x85,
    ColorMaskR                  = 0x86,
    ColorMaskG                  = 0x87,
    ColorMaskB                  = 0x88,
    ColorMaskA                  = 0x89,
    LogicalOperation            = 0x8A,
    LogicOpFunction             = 0x8B,
    McSecondInterleavingStart   = 0x8C,
    BlitIniX                    = 0x8D,
    BlitIniY                    = 0x8E,
    BlitXOffset                 = 0x8F,
    BlitYOffset                 = 0x90,
    BlitWidth                   = 0x91,
    BlitHeight                  = 0x92,
    BlitDstAddress              = 0x93,
    BlitDstTextureWidth2        = 0x94,
    BlitDstTextureFormat        = 0x95,
    BlitDstTextureBlocking      = 0x96,
}

/// Register groups. Each group belongs to a phase of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Geometry,
    Fragment,
}

impl Reg {
    pub fn new(id: u8) -> Self {
        Self::from_repr(id).unwrap_or_else(|| panic!("unknown GPU register {id:02X}"))
    }

    /// Whether this register is consumed by the geometry phase of a batch.
    #[inline]
    pub fn is_geometry(self) -> bool {
        self as u8 <= Self::UserClipPlane as u8
    }

    #[inline]
    pub fn group(self) -> Group {
        if self.is_geometry() {
            Group::Geometry
        } else {
            Group::Fragment
        }
    }
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum FaceMode {
    Cw  = 0,
    #[default]
    Ccw = 1,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum CullingMode {
    None         = 0,
    Front        = 1,
    #[default]
    Back         = 2,
    FrontAndBack = 3,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum PrimitiveMode {
    #[default]
    Triangle      = 0,
    TriangleStrip = 1,
    TriangleFan   = 2,
    Quad          = 3,
    QuadStrip     = 4,
    Line          = 5,
    LineStrip     = 6,
    LineFan       = 7,
    Point         = 8,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamData {
    Unorm8  = 0x0,
    Snorm8  = 0x1,
    Unorm16 = 0x2,
    Snorm16 = 0x3,
    Unorm32 = 0x4,
    Snorm32 = 0x5,
    Float16 = 0x6,
    #[default]
    Float32 = 0x7,
    Uint8   = 0x8,
    Sint8   = 0x9,
    Uint16  = 0xA,
    Sint16  = 0xB,
    Uint32  = 0xC,
    Sint32  = 0xD,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompareMode {
    Never    = 0,
    Always   = 1,
    #[default]
    Less     = 2,
    LEqual   = 3,
    Equal    = 4,
    GEqual   = 5,
    Greater  = 6,
    NotEqual = 7,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum StencilUpdate {
    #[default]
    Keep     = 0,
    Zero     = 1,
    Replace  = 2,
    Incr     = 3,
    Decr     = 4,
    Invert   = 5,
    IncrWrap = 6,
    DecrWrap = 7,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlendEquation {
    #[default]
    Add             = 0,
    Subtract        = 1,
    ReverseSubtract = 2,
    Min             = 3,
    Max             = 4,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlendFunction {
    #[default]
    Zero                  = 0x0,
    One                   = 0x1,
    SrcColor              = 0x2,
    OneMinusSrcColor      = 0x3,
    DstColor              = 0x4,
    OneMinusDstColor      = 0x5,
    SrcAlpha              = 0x6,
    OneMinusSrcAlpha      = 0x7,
    DstAlpha              = 0x8,
    OneMinusDstAlpha      = 0x9,
    ConstantColor         = 0xA,
    OneMinusConstantColor = 0xB,
    ConstantAlpha         = 0xC,
    OneMinusConstantAlpha = 0xD,
    SrcAlphaSaturate      = 0xE,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogicOp {
    Clear        = 0x0,
    And          = 0x1,
    AndReverse   = 0x2,
    #[default]
    Copy         = 0x3,
    AndInverted  = 0x4,
    Noop         = 0x5,
    Xor          = 0x6,
    Or           = 0x7,
    Nor          = 0x8,
    Equiv        = 0x9,
    Invert       = 0xA,
    OrReverse    = 0xB,
    CopyInverted = 0xC,
    OrInverted   = 0xD,
    Nand         = 0xE,
    Set          = 0xF,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextureMode {
    Texture1D = 0,
    #[default]
    Texture2D = 1,
    Texture3D = 2,
    CubeMap   = 3,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextureFormat {
    Alpha8                 = 0x00,
    Alpha16                = 0x01,
    DepthComponent16       = 0x02,
    DepthComponent32       = 0x03,
    Luminance8             = 0x04,
    Luminance8Signed       = 0x05,
    Luminance16            = 0x06,
    Luminance4Alpha4       = 0x07,
    Luminance6Alpha2       = 0x08,
    Luminance8Alpha8       = 0x09,
    Luminance8Alpha8Signed = 0x0A,
    Luminance12Alpha4      = 0x0B,
    Luminance16Alpha16     = 0x0C,
    Intensity8             = 0x0D,
    Intensity16            = 0x0E,
    Rgb332                 = 0x0F,
    Rgb121212              = 0x10,
    Rgba2222               = 0x11,
    Rgba4444               = 0x12,
    Rgba5551               = 0x13,
    #[default]
    Rgba8888               = 0x14,
    Rgba1010102            = 0x15,
    R16                    = 0x16,
    Rg16                   = 0x17,
    Rgba16                 = 0x18,
    R16F                   = 0x19,
    Rg16F                  = 0x1A,
    Rgba16F                = 0x1B,
    R32F                   = 0x1C,
    Rg32F                  = 0x1D,
    Rgba32F                = 0x1E,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextureCompression {
    #[default]
    None          = 0,
    Dxt1Rgb       = 1,
    Dxt1Rgba      = 2,
    Dxt3Rgba      = 3,
    Dxt5Rgba      = 4,
    Latc1         = 5,
    Latc1Signed   = 6,
    Latc2         = 7,
    Latc2Signed   = 8,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextureBlocking {
    /// Optimized for bilinear accesses through the texture cache.
    #[default]
    Texture     = 0,
    /// Compatible with the color and depth buffer layout.
    Framebuffer = 1,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClampMode {
    Clamp          = 0,
    ClampToEdge    = 1,
    #[default]
    Repeat         = 2,
    ClampToBorder  = 3,
    MirroredRepeat = 4,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum FilterMode {
    Nearest              = 0,
    #[default]
    Linear               = 1,
    NearestMipmapNearest = 2,
    NearestMipmapLinear  = 3,
    LinearMipmapNearest  = 4,
    LinearMipmapLinear   = 5,
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShaderTarget {
    #[default]
    Vertex        = 0,
    Fragment      = 1,
    Triangle      = 2,
    MicroTriangle = 3,
}

impl ShaderTarget {
    pub fn new(index: u32) -> Self {
        u8::try_from(index)
            .ok()
            .and_then(Self::from_repr)
            .unwrap_or_else(|| panic!("unknown shader target {index}"))
    }
}

/// Value carried by a register write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RegData {
    Uint(u32),
    Int(i32),
    Float(f32),
    Quad([f32; 4]),
    Bool(bool),
    FaceMode(FaceMode),
    Culling(CullingMode),
    Primitive(PrimitiveMode),
    StreamData(StreamData),
    Compare(CompareMode),
    StencilUpdate(StencilUpdate),
    BlendEquation(BlendEquation),
    BlendFunction(BlendFunction),
    LogicOp(LogicOp),
    TextureMode(TextureMode),
    TextureFormat(TextureFormat),
    TextureCompression(TextureCompression),
    TextureBlocking(TextureBlocking),
    Clamp(ClampMode),
    Filter(FilterMode),
}

impl Default for RegData {
    fn default() -> Self {
        Self::Quad([0.0; 4])
    }
}

macro_rules! accessors {
    ($($name:ident: $variant:ident => $ty:ty),* $(,)?) => {
        impl RegData {
            $(
                #[inline]
                pub fn $name(&self) -> $ty {
                    match *self {
                        Self::$variant(value) => value,
                        other => panic!(
                            concat!("expected ", stringify!($variant), " register data, got {:?}"),
                            other
                        ),
                    }
                }
            )*
        }
    };
}

accessors! {
    uint: Uint => u32,
    int: Int => i32,
    float: Float => f32,
    quad: Quad => [f32; 4],
    boolean: Bool => bool,
    face_mode: FaceMode => FaceMode,
    culling: Culling => CullingMode,
    primitive: Primitive => PrimitiveMode,
    stream_data: StreamData => StreamData,
    compare: Compare => CompareMode,
    stencil_update: StencilUpdate => StencilUpdate,
    blend_equation: BlendEquation => BlendEquation,
    blend_function: BlendFunction => BlendFunction,
    logic_op: LogicOp => LogicOp,
    texture_mode: TextureMode => TextureMode,
    texture_format: TextureFormat => TextureFormat,
    texture_compression: TextureCompression => TextureCompression,
    texture_blocking: TextureBlocking => TextureBlocking,
    clamp: Clamp => ClampMode,
    filter: Filter => FilterMode,
}

/// A rectangle in window coordinates, lower left corner first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub width: u32,
    pub height: u32,
    /// Top left corner is (0, 0).
    pub d3d9_pixel_coordinates: bool,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
            d3d9_pixel_coordinates: false,
        }
    }
}

/// Base addresses of the buffers in GPU memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Buffers {
    pub front: u32,
    pub back: u32,
    pub zstencil: u32,
    pub texture: u32,
    pub program: u32,
}

/// State of a shader program slot (vertex or fragment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub address: u32,
    pub start_pc: u32,
    pub size: u32,
    pub resources: u32,
    pub constants: Vec<[f32; 4]>,
}

impl Program {
    fn new(constants: usize) -> Self {
        Self {
            address: 0,
            start_pc: 0,
            size: 0,
            resources: 1,
            constants: vec![[0.0; 4]; constants],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Streams {
    pub attribute_map: [u32; MAX_VERTEX_ATTRIBUTES],
    pub attribute_default: [[f32; 4]; MAX_VERTEX_ATTRIBUTES],
    pub address: [u32; MAX_STREAM_BUFFERS],
    pub stride: [u32; MAX_STREAM_BUFFERS],
    pub data: [StreamData; MAX_STREAM_BUFFERS],
    pub elements: [u32; MAX_STREAM_BUFFERS],
    /// 0 samples per index, N samples every N instances.
    pub frequency: [u32; MAX_STREAM_BUFFERS],
    pub d3d9_color: [bool; MAX_STREAM_BUFFERS],
    pub start: u32,
    pub count: u32,
    pub instances: u32,
    pub indexed: bool,
    pub index_stream: u32,
    pub attribute_load_bypass: bool,
}

impl Default for Streams {
    fn default() -> Self {
        Self {
            attribute_map: [INACTIVE_ATTRIBUTE; MAX_VERTEX_ATTRIBUTES],
            attribute_default: [[0.0, 0.0, 0.0, 1.0]; MAX_VERTEX_ATTRIBUTES],
            address: [0; MAX_STREAM_BUFFERS],
            stride: [0; MAX_STREAM_BUFFERS],
            data: [StreamData::default(); MAX_STREAM_BUFFERS],
            elements: [0; MAX_STREAM_BUFFERS],
            frequency: [0; MAX_STREAM_BUFFERS],
            d3d9_color: [false; MAX_STREAM_BUFFERS],
            start: 0,
            count: 0,
            instances: 1,
            indexed: false,
            index_stream: 0,
            attribute_load_bypass: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clipping {
    pub frustum: bool,
    pub user_planes_enabled: bool,
    pub user_planes: [[f32; 4]; MAX_USER_CLIP_PLANES],
    pub face_mode: FaceMode,
    pub cull_mode: CullingMode,
}

impl Default for Clipping {
    fn default() -> Self {
        Self {
            frustum: true,
            user_planes_enabled: false,
            user_planes: [[0.0; 4]; MAX_USER_CLIP_PLANES],
            face_mode: FaceMode::default(),
            cull_mode: CullingMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    pub viewport: Rect,
    pub scissor_test: bool,
    pub scissor: Rect,
    pub near: f32,
    pub far: f32,
    pub slope_factor: f32,
    pub unit_offset: f32,
    pub d3d9_depth_range: bool,
    pub depth_bits: u32,
    pub d3d9_rasterization_rules: bool,
    pub two_sided_lighting: bool,
    pub multisampling: bool,
    pub msaa_samples: u32,
    pub hierarchical_z: bool,
    pub early_z: bool,
    pub interpolation: [bool; MAX_FRAGMENT_ATTRIBUTES],
    pub fragment_inputs: [bool; MAX_FRAGMENT_ATTRIBUTES],
}

impl Default for Raster {
    fn default() -> Self {
        let window = Rect {
            x: 0,
            y: 0,
            width: 400,
            height: 400,
        };

        Self {
            viewport: window,
            scissor_test: false,
            scissor: window,
            near: 0.0,
            far: 1.0,
            slope_factor: 0.0,
            unit_offset: 0.0,
            d3d9_depth_range: false,
            depth_bits: 24,
            d3d9_rasterization_rules: false,
            two_sided_lighting: false,
            multisampling: false,
            msaa_samples: 2,
            hierarchical_z: true,
            early_z: true,
            interpolation: [true; MAX_FRAGMENT_ATTRIBUTES],
            fragment_inputs: [false; MAX_FRAGMENT_ATTRIBUTES],
        }
    }
}

/// Unified shader program load state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderPrograms {
    pub address: u32,
    pub size: u32,
    pub load_pc: u32,
    pub start_pc: [u32; SHADER_TARGETS],
    pub resources: [u32; SHADER_TARGETS],
}

impl Default for ShaderPrograms {
    fn default() -> Self {
        Self {
            address: 0,
            size: 0,
            load_pc: 0,
            start_pc: [0; SHADER_TARGETS],
            resources: [1; SHADER_TARGETS],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub enabled: bool,
    pub mode: TextureMode,
    /// Indexed by mipmap level and cubemap face.
    pub address: [[u32; CUBEMAP_IMAGES]; MAX_TEXTURE_SIZE],
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub width_log2: u32,
    pub height_log2: u32,
    pub depth_log2: u32,
    pub border: u32,
    pub border_color: [f32; 4],
    pub format: TextureFormat,
    pub compression: TextureCompression,
    pub blocking: TextureBlocking,
    pub reverse: bool,
    pub d3d9_color_conv: bool,
    pub d3d9_v_invert: bool,
    pub wrap_s: ClampMode,
    pub wrap_t: ClampMode,
    pub wrap_r: ClampMode,
    pub non_normalized: bool,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub comparison: bool,
    pub comparison_function: CompareMode,
    pub srgb: bool,
    pub min_lod: f32,
    pub max_lod: f32,
    pub lod_bias: f32,
    pub min_level: u32,
    pub max_level: u32,
    /// Bias of the unit itself, not of the bound texture.
    pub unit_lod_bias: f32,
    pub max_anisotropy: u32,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: TextureMode::default(),
            address: [[0; CUBEMAP_IMAGES]; MAX_TEXTURE_SIZE],
            width: 0,
            height: 0,
            depth: 0,
            width_log2: 0,
            height_log2: 0,
            depth_log2: 0,
            border: 0,
            border_color: [0.0; 4],
            format: TextureFormat::default(),
            compression: TextureCompression::default(),
            blocking: TextureBlocking::default(),
            reverse: false,
            d3d9_color_conv: false,
            d3d9_v_invert: false,
            wrap_s: ClampMode::default(),
            wrap_t: ClampMode::default(),
            wrap_r: ClampMode::default(),
            non_normalized: false,
            min_filter: FilterMode::default(),
            mag_filter: FilterMode::default(),
            comparison: false,
            comparison_function: CompareMode::LEqual,
            srgb: false,
            min_lod: 0.0,
            max_lod: 12.0,
            lod_bias: 0.0,
            min_level: 0,
            max_level: 12,
            unit_lod_bias: 0.0,
            max_anisotropy: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZStencil {
    pub depth_clear: u32,
    pub stencil_clear: u32,
    pub state_buffer: u32,
    pub stencil_test: bool,
    pub stencil_function: CompareMode,
    pub stencil_reference: u8,
    pub stencil_compare_mask: u8,
    pub stencil_update_mask: u8,
    pub stencil_fail: StencilUpdate,
    pub depth_fail: StencilUpdate,
    pub depth_pass: StencilUpdate,
    pub depth_test: bool,
    pub depth_function: CompareMode,
    pub depth_mask: bool,
    pub compression: bool,
    pub modify_depth: bool,
}

impl Default for ZStencil {
    fn default() -> Self {
        Self {
            depth_clear: 0x00FF_FFFF,
            stencil_clear: 0,
            state_buffer: 0,
            stencil_test: false,
            stencil_function: CompareMode::Always,
            stencil_reference: 0,
            stencil_compare_mask: 0xFF,
            stencil_update_mask: 0xFF,
            stencil_fail: StencilUpdate::Keep,
            depth_fail: StencilUpdate::Keep,
            depth_pass: StencilUpdate::Keep,
            depth_test: false,
            depth_function: CompareMode::Less,
            depth_mask: true,
            compression: true,
            modify_depth: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorBuffer {
    pub format: TextureFormat,
    pub compression: bool,
    pub srgb_write: bool,
    pub clear: [f32; 4],
    pub state_buffer: u32,
    pub logical_operation: bool,
    pub logic_op: LogicOp,
}

impl Default for ColorBuffer {
    fn default() -> Self {
        Self {
            format: TextureFormat::Rgba8888,
            compression: true,
            srgb_write: false,
            clear: [0.0, 0.0, 0.0, 1.0],
            state_buffer: 0,
            logical_operation: false,
            logic_op: LogicOp::Copy,
        }
    }
}

/// A render target binding and its blend state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderTarget {
    pub enabled: bool,
    pub format: TextureFormat,
    pub address: u32,
    pub blend: bool,
    pub equation: BlendEquation,
    pub src_rgb: BlendFunction,
    pub dst_rgb: BlendFunction,
    pub src_alpha: BlendFunction,
    pub dst_alpha: BlendFunction,
    pub blend_color: [f32; 4],
    /// Red, green, blue and alpha write masks.
    pub mask: [bool; 4],
}

impl Default for RenderTarget {
    fn default() -> Self {
        Self {
            enabled: false,
            format: TextureFormat::Rgba8888,
            address: 0,
            blend: false,
            equation: BlendEquation::Add,
            src_rgb: BlendFunction::One,
            dst_rgb: BlendFunction::Zero,
            src_alpha: BlendFunction::One,
            dst_alpha: BlendFunction::Zero,
            blend_color: [0.0; 4],
            mask: [true; 4],
        }
    }
}

/// Framebuffer to texture bit blit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Blit {
    pub ini_x: u32,
    pub ini_y: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
    pub dst_address: u32,
    /// Ceiling log2 of the destination texture width.
    pub dst_width_log2: u32,
    pub dst_format: TextureFormat,
    pub dst_blocking: TextureBlocking,
}

/// The GPU register state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registers {
    pub status: Status,
    pub display: Display,
    pub buffers: Buffers,
    pub vertex: Program,
    pub output_attributes: [bool; MAX_VERTEX_ATTRIBUTES],
    pub streams: Streams,
    pub primitive: PrimitiveMode,
    pub clip: Clipping,
    pub raster: Raster,
    pub fragment: Program,
    pub shader: ShaderPrograms,
    pub textures: [Texture; MAX_TEXTURES],
    pub zstencil: ZStencil,
    pub color: ColorBuffer,
    pub targets: [RenderTarget; MAX_RENDER_TARGETS],
    /// Start address of the second memory interleaving, 0 for a single one.
    pub mc_second_interleaving_start: u32,
    pub blit: Blit,
}

impl Default for Registers {
    fn default() -> Self {
        let mut targets = [RenderTarget::default(); MAX_RENDER_TARGETS];
        targets[0].enabled = true;

        Self {
            status: Status::Reset,
            display: Display::default(),
            buffers: Buffers::default(),
            vertex: Program::new(MAX_VERTEX_CONSTANTS),
            output_attributes: [false; MAX_VERTEX_ATTRIBUTES],
            streams: Streams::default(),
            primitive: PrimitiveMode::default(),
            clip: Clipping::default(),
            raster: Raster::default(),
            fragment: Program::new(MAX_FRAGMENT_CONSTANTS),
            shader: ShaderPrograms::default(),
            textures: [Texture::default(); MAX_TEXTURES],
            zstencil: ZStencil::default(),
            color: ColorBuffer::default(),
            targets,
            mc_second_interleaving_start: 0,
            blit: Blit::default(),
        }
    }
}

impl Registers {
    /// Restores the power-on values, keeping the current status.
    pub fn reset(&mut self) {
        let status = self.status;
        *self = Self::default();
        self.status = status;
    }
}
