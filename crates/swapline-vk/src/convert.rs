// SPDX-License-Identifier: CEPL-1.0
//! Mapping between `swapline-chain` types and `ash::vk`.

use ash::vk;
use swapline_chain::{
    AccessFlags, ColorFormat, ColorSpace, DeviceError, Extent2D, ImageLayout, PipelineStages,
    PresentMode, SurfaceCapabilities, SurfaceFormat,
};

pub(crate) fn device_error(r: vk::Result) -> DeviceError {
    match r {
        vk::Result::ERROR_OUT_OF_DATE_KHR => DeviceError::OutOfDate,
        vk::Result::ERROR_SURFACE_LOST_KHR => DeviceError::SurfaceLost,
        vk::Result::ERROR_DEVICE_LOST => DeviceError::DeviceLost,
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            DeviceError::OutOfMemory
        }
        other => DeviceError::Backend(other.to_string()),
    }
}

pub(crate) fn format_from_vk(f: vk::Format) -> ColorFormat {
    match f {
        vk::Format::B8G8R8A8_UNORM => ColorFormat::Bgra8Unorm,
        vk::Format::B8G8R8A8_SRGB => ColorFormat::Bgra8Srgb,
        vk::Format::R8G8B8A8_UNORM => ColorFormat::Rgba8Unorm,
        vk::Format::R8G8B8A8_SRGB => ColorFormat::Rgba8Srgb,
        vk::Format::A2B10G10R10_UNORM_PACK32 => ColorFormat::A2b10g10r10Unorm,
        vk::Format::A2R10G10B10_UNORM_PACK32 => ColorFormat::A2r10g10b10Unorm,
        vk::Format::R16G16B16A16_SFLOAT => ColorFormat::Rgba16Float,
        other => ColorFormat::Other(other.as_raw()),
    }
}

pub(crate) fn format_to_vk(f: ColorFormat) -> vk::Format {
    match f {
        ColorFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        ColorFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        ColorFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        ColorFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        ColorFormat::A2b10g10r10Unorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        ColorFormat::A2r10g10b10Unorm => vk::Format::A2R10G10B10_UNORM_PACK32,
        ColorFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        ColorFormat::Other(raw) => vk::Format::from_raw(raw),
    }
}

pub(crate) fn color_space_from_vk(cs: vk::ColorSpaceKHR) -> ColorSpace {
    match cs {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => ColorSpace::SrgbNonlinear,
        vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT => ColorSpace::DisplayP3Nonlinear,
        vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT => ColorSpace::ExtendedSrgbLinear,
        vk::ColorSpaceKHR::HDR10_ST2084_EXT => ColorSpace::Hdr10St2084,
        other => ColorSpace::Other(other.as_raw()),
    }
}

pub(crate) fn color_space_to_vk(cs: ColorSpace) -> vk::ColorSpaceKHR {
    match cs {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::DisplayP3Nonlinear => vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        ColorSpace::ExtendedSrgbLinear => vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        ColorSpace::Hdr10St2084 => vk::ColorSpaceKHR::HDR10_ST2084_EXT,
        ColorSpace::Other(raw) => vk::ColorSpaceKHR::from_raw(raw),
    }
}

pub(crate) fn surface_format_from_vk(f: vk::SurfaceFormatKHR) -> SurfaceFormat {
    SurfaceFormat::new(format_from_vk(f.format), color_space_from_vk(f.color_space))
}

pub(crate) fn present_mode_from_vk(m: vk::PresentModeKHR) -> PresentMode {
    match m {
        vk::PresentModeKHR::IMMEDIATE => PresentMode::Immediate,
        vk::PresentModeKHR::MAILBOX => PresentMode::Mailbox,
        vk::PresentModeKHR::FIFO_RELAXED => PresentMode::FifoRelaxed,
        _ => PresentMode::Fifo,
    }
}

pub(crate) fn present_mode_to_vk(m: PresentMode) -> vk::PresentModeKHR {
    match m {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

pub(crate) fn layout_to_vk(l: ImageLayout) -> vk::ImageLayout {
    match l {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::ColorAttachmentOptimal => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

// Bit values are shared with Vulkan.
pub(crate) fn stages_to_vk(s: PipelineStages) -> vk::PipelineStageFlags {
    vk::PipelineStageFlags::from_raw(s.bits())
}

pub(crate) fn access_to_vk(a: AccessFlags) -> vk::AccessFlags {
    vk::AccessFlags::from_raw(a.bits())
}

pub(crate) fn extent_from_vk(e: vk::Extent2D) -> Extent2D {
    Extent2D::new(e.width, e.height)
}

pub(crate) fn extent_to_vk(e: Extent2D) -> vk::Extent2D {
    vk::Extent2D {
        width: e.width,
        height: e.height,
    }
}

pub(crate) fn capabilities_from_vk(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCapabilities {
    SurfaceCapabilities {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent: extent_from_vk(caps.current_extent),
        min_image_extent: extent_from_vk(caps.min_image_extent),
        max_image_extent: extent_from_vk(caps.max_image_extent),
    }
}
