// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamp each dimension into `[min, max]`. The lower bound wins when the
    /// bounds are inverted.
    pub fn clamp(self, min: Extent2D, max: Extent2D) -> Extent2D {
        Extent2D {
            width: clamp_dim(self.width, min.width, max.width),
            height: clamp_dim(self.height, min.height, max.height),
        }
    }
}

fn clamp_dim(value: u32, min: u32, max: u32) -> u32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

impl fmt::Display for Extent2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// What the surface reports about the images it can present.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper bound.
    pub max_image_count: u32,
    /// `u32::MAX x u32::MAX` when the swapchain decides the size.
    pub current_extent: Extent2D,
    pub min_image_extent: Extent2D,
    pub max_image_extent: Extent2D,
}

impl SurfaceCapabilities {
    pub const UNDEFINED_EXTENT: u32 = u32::MAX;

    pub fn has_fixed_extent(&self) -> bool {
        self.current_extent.width != Self::UNDEFINED_EXTENT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Bgra8Unorm,
    Bgra8Srgb,
    Rgba8Unorm,
    Rgba8Srgb,
    A2b10g10r10Unorm,
    A2r10g10b10Unorm,
    Rgba16Float,
    /// Backend format with no name here; carries the raw value.
    Other(i32),
}

impl fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorFormat::Bgra8Unorm => f.write_str("B8G8R8A8_UNORM"),
            ColorFormat::Bgra8Srgb => f.write_str("B8G8R8A8_SRGB"),
            ColorFormat::Rgba8Unorm => f.write_str("R8G8B8A8_UNORM"),
            ColorFormat::Rgba8Srgb => f.write_str("R8G8B8A8_SRGB"),
            ColorFormat::A2b10g10r10Unorm => f.write_str("A2B10G10R10_UNORM"),
            ColorFormat::A2r10g10b10Unorm => f.write_str("A2R10G10B10_UNORM"),
            ColorFormat::Rgba16Float => f.write_str("R16G16B16A16_SFLOAT"),
            ColorFormat::Other(raw) => write!(f, "OTHER({raw})"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    DisplayP3Nonlinear,
    ExtendedSrgbLinear,
    Hdr10St2084,
    Other(i32),
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorSpace::SrgbNonlinear => f.write_str("SRGB_NONLINEAR"),
            ColorSpace::DisplayP3Nonlinear => f.write_str("DISPLAY_P3_NONLINEAR"),
            ColorSpace::ExtendedSrgbLinear => f.write_str("EXTENDED_SRGB_LINEAR"),
            ColorSpace::Hdr10St2084 => f.write_str("HDR10_ST2084"),
            ColorSpace::Other(raw) => write!(f, "OTHER({raw})"),
        }
    }
}

/// A (format, color space) pair, fixed for the lifetime of a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: ColorFormat,
    pub color_space: ColorSpace,
}

impl SurfaceFormat {
    pub const fn new(format: ColorFormat, color_space: ColorSpace) -> Self {
        Self {
            format,
            color_space,
        }
    }
}

impl fmt::Display for SurfaceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.format, self.color_space)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    #[default]
    Fifo,
    FifoRelaxed,
}

impl PresentMode {
    /// Whether presentation waits for vertical blank.
    pub fn is_blocking(self) -> bool {
        matches!(self, PresentMode::Fifo | PresentMode::FifoRelaxed)
    }
}

impl fmt::Display for PresentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PresentMode::Immediate => "IMMEDIATE",
            PresentMode::Mailbox => "MAILBOX",
            PresentMode::Fifo => "FIFO",
            PresentMode::FifoRelaxed => "FIFO_RELAXED",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    ColorAttachmentOptimal,
    PresentSrc,
}

// Bit values match Vulkan so backends can convert with `from_raw`.
bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 0x0000_0001;
        const COLOR_ATTACHMENT_OUTPUT = 0x0000_0400;
        const TRANSFER = 0x0000_1000;
        const BOTTOM_OF_PIPE = 0x0000_2000;
        const ALL_COMMANDS = 0x0001_0000;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const COLOR_ATTACHMENT_READ = 0x0000_0080;
        const COLOR_ATTACHMENT_WRITE = 0x0000_0100;
        const TRANSFER_WRITE = 0x0000_1000;
        const MEMORY_READ = 0x0000_8000;
        const MEMORY_WRITE = 0x0001_0000;
    }
}
