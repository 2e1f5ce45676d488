// SPDX-License-Identifier: CEPL-1.0
//! ash/Vulkan implementation of the `swapline-chain` device traits.
//!
//! Creation order is fixed: [`VkInstance`], then a [`VkSurface`] from that
//! instance, then a [`VkDevice`] whose queue family can present to that
//! surface. Each object holds an `Arc` to what it was created from, so the
//! instance outlives everything built on it.

#![deny(unsafe_op_in_unsafe_fn)]

mod clear;
mod convert;
mod device;
mod instance;
mod policy;
mod render_target;
mod surface;

pub use clear::ClearRenderer;
pub use device::VkDevice;
pub use instance::VkInstance;
pub use policy::{PresentPolicy, VkVsyncMode};
pub use render_target::{VkRenderTarget, VkRenderTargetFactory};
pub use surface::VkSurface;

/// Chain type the demo drives.
pub type VkSwapchain = swapline_chain::Swapchain<VkDevice, VkRenderTargetFactory>;
