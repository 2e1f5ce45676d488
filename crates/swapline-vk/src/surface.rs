// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use swapline_chain::PresentSurface;
use tracing::debug;

use crate::instance::VkInstance;

/// A `VkSurfaceKHR` for one window. Destroyed on drop; every swapchain
/// built on it must be gone first.
pub struct VkSurface {
    instance: Arc<VkInstance>,
    handle: vk::SurfaceKHR,
}

impl VkSurface {
    pub fn new(
        instance: &Arc<VkInstance>,
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
    ) -> Result<Self> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        // SAFETY: the handles come from a live window, and the instance was
        // created with the extensions `ash_window` asked for.
        let handle = unsafe {
            ash_window::create_surface(instance.entry(), instance.raw(), dh, wh, None)
        }
        .context("ash_window::create_surface")?;

        debug!("surface created: {:?}", handle);
        Ok(Self {
            instance: Arc::clone(instance),
            handle,
        })
    }

    pub(crate) fn instance(&self) -> &Arc<VkInstance> {
        &self.instance
    }
}

impl PresentSurface for VkSurface {
    type Handle = vk::SurfaceKHR;

    fn is_valid(&self) -> bool {
        self.handle != vk::SurfaceKHR::null()
    }

    fn raw_handle(&self) -> vk::SurfaceKHR {
        self.handle
    }
}

impl Drop for VkSurface {
    fn drop(&mut self) {
        // SAFETY: the owner drops its chains before the surface.
        unsafe {
            self.instance
                .surface_loader()
                .destroy_surface(self.handle, None)
        };
    }
}
