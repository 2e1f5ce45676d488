// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::types::{ColorFormat, Extent2D, ImageLayout, SurfaceFormat};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderTargetError {
    #[error("pixel format {0} is not supported as a render target")]
    UnsupportedFormat(ColorFormat),

    #[error("render target still has drawing in progress")]
    NotReady,

    #[error("backend error: {0}")]
    Backend(String),
}

/// Drawable view of one swapchain image, owned by the renderer side.
pub trait RenderTarget {
    /// Layout the renderer believes the image is in.
    fn backend_layout(&self) -> ImageLayout;

    /// Called by the chain after it moved the image into `layout`.
    fn set_backend_layout(&mut self, layout: ImageLayout);

    /// Confirm the renderer is done issuing work against this image.
    fn prepare_for_present(&mut self) -> Result<(), RenderTargetError>;
}

/// Wraps native swapchain images into render targets.
pub trait RenderTargetFactory<I> {
    type Target: RenderTarget;

    fn wrap_image(
        &self,
        image: I,
        format: SurfaceFormat,
        size: Extent2D,
    ) -> Result<Self::Target, RenderTargetError>;
}
