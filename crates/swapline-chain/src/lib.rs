// SPDX-License-Identifier: CEPL-1.0
//! Swapchain frame lifecycle: negotiate an image chain with a surface, hand
//! out render targets, and return drawn images to the display.
//!
//! Per frame the caller runs:
//!
//! 1. [`Swapchain::acquire_surface`] - waits on the next backbuffer slot,
//!    acquires an image and moves it to a color-attachment layout.
//! 2. its own draw work against the returned [`RenderTarget`].
//! 3. [`Swapchain::submit`] - moves the image to a present layout and
//!    presents it.
//!
//! The GPU is reached only through the [`Device`] trait, so the whole
//! protocol runs against any backend (or a fake one).

#![deny(unsafe_op_in_unsafe_fn)]

mod backbuffer;
mod command;
mod device;
mod error;
mod frame;
mod image;
mod render_target;
mod swapchain;
mod sync;
mod types;

pub use backbuffer::{Backbuffer, SignaledFences};
pub use command::CommandBuffer;
pub use device::{
    AcquiredImage, Device, ImageBarrier, PresentSurface, QueueSubmit, SwapchainCreateInfo,
};
pub use error::{DeviceError, FrameError, NegotiateError};
pub use frame::{AcquireResult, AcquireStatus};
pub use image::{ImageState, PresentableImage, TransitionError};
pub use render_target::{RenderTarget, RenderTargetError, RenderTargetFactory};
pub use swapchain::{ChainConfig, Swapchain};
pub use sync::{Fence, Semaphore};
pub use types::{
    AccessFlags, ColorFormat, ColorSpace, Extent2D, ImageLayout, PipelineStages, PresentMode,
    SurfaceCapabilities, SurfaceFormat,
};
