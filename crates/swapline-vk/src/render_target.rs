// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use ash::vk;
use swapline_chain::{
    ColorFormat, Extent2D, ImageLayout, RenderTarget, RenderTargetError, RenderTargetFactory,
    SurfaceFormat,
};

use crate::convert::format_to_vk;
use crate::device::VkDevice;

/// Swapchain image plus a 2D color view of it.
pub struct VkRenderTarget {
    device: Arc<VkDevice>,
    image: vk::Image,
    view: vk::ImageView,
    layout: ImageLayout,
    drawing: bool,
}

impl VkRenderTarget {
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Mark the start of recording against this target.
    pub fn begin_draw(&mut self) {
        self.drawing = true;
    }

    /// All draw work for this frame has been submitted.
    pub fn end_draw(&mut self) {
        self.drawing = false;
    }
}

impl RenderTarget for VkRenderTarget {
    fn backend_layout(&self) -> ImageLayout {
        self.layout
    }

    fn set_backend_layout(&mut self, layout: ImageLayout) {
        self.layout = layout;
    }

    fn prepare_for_present(&mut self) -> Result<(), RenderTargetError> {
        if self.drawing {
            return Err(RenderTargetError::NotReady);
        }
        Ok(())
    }
}

impl Drop for VkRenderTarget {
    fn drop(&mut self) {
        // SAFETY: the chain drops its targets only after the device went idle.
        unsafe { self.device.raw().destroy_image_view(self.view, None) };
    }
}

/// Creates a [`VkRenderTarget`] for every swapchain image.
pub struct VkRenderTargetFactory {
    device: Arc<VkDevice>,
}

impl VkRenderTargetFactory {
    pub fn new(device: &Arc<VkDevice>) -> Self {
        Self {
            device: Arc::clone(device),
        }
    }
}

fn is_supported(format: ColorFormat) -> bool {
    matches!(
        format,
        ColorFormat::Bgra8Unorm
            | ColorFormat::Bgra8Srgb
            | ColorFormat::Rgba8Unorm
            | ColorFormat::Rgba8Srgb
            | ColorFormat::A2b10g10r10Unorm
            | ColorFormat::A2r10g10b10Unorm
            | ColorFormat::Rgba16Float
    )
}

impl RenderTargetFactory<vk::Image> for VkRenderTargetFactory {
    type Target = VkRenderTarget;

    fn wrap_image(
        &self,
        image: vk::Image,
        format: SurfaceFormat,
        _size: Extent2D,
    ) -> Result<VkRenderTarget, RenderTargetError> {
        if !is_supported(format.format) {
            return Err(RenderTargetError::UnsupportedFormat(format.format));
        }

        let vk_format = format_to_vk(format.format);
        let iv_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format: vk_format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        // SAFETY: `image` belongs to a live swapchain of this device.
        let view = unsafe { self.device.raw().create_image_view(&iv_info, None) }
            .map_err(|e| RenderTargetError::Backend(e.to_string()))?;

        Ok(VkRenderTarget {
            device: Arc::clone(&self.device),
            image,
            view,
            layout: ImageLayout::Undefined,
            drawing: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_color_formats_are_wrapped() {
        assert!(is_supported(ColorFormat::Bgra8Srgb));
        assert!(is_supported(ColorFormat::Rgba16Float));
        assert!(!is_supported(ColorFormat::Other(
            vk::Format::R5G6B5_UNORM_PACK16.as_raw()
        )));
    }
}
