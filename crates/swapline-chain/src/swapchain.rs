// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::backbuffer::Backbuffer;
use crate::device::{Device, PresentSurface, SwapchainCreateInfo};
use crate::error::NegotiateError;
use crate::image::PresentableImage;
use crate::render_target::RenderTargetFactory;
use crate::types::{Extent2D, PresentMode, SurfaceCapabilities, SurfaceFormat};

/// Caller-side knobs for negotiation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainConfig {
    /// Extent to request when the surface leaves the size to the swapchain.
    pub size_hint: Option<Extent2D>,
}

/// A negotiated chain of presentable images plus one backbuffer slot per
/// image.
///
/// Construction never fails outright: check [`is_valid`](Self::is_valid)
/// and read [`error`](Self::error) for the reason. Every successful
/// [`acquire_surface`](Self::acquire_surface) must be followed by a
/// [`submit`](Self::submit) before the slot comes around again.
pub struct Swapchain<D: Device, F: RenderTargetFactory<D::Image>> {
    pub(crate) device: Arc<D>,
    pub(crate) handle: Option<D::Swapchain>,
    pub(crate) capabilities: SurfaceCapabilities,
    pub(crate) extent: Extent2D,
    pub(crate) surface_format: Option<SurfaceFormat>,
    pub(crate) present_mode: PresentMode,
    pub(crate) backbuffers: Vec<Backbuffer<D>>,
    pub(crate) images: Vec<PresentableImage<D::Image>>,
    pub(crate) targets: Vec<F::Target>,
    pub(crate) current_backbuffer: usize,
    pub(crate) current_image: Option<usize>,
    pub(crate) error: Option<NegotiateError>,
    pub(crate) valid: bool,
}

impl<D: Device, F: RenderTargetFactory<D::Image>> Swapchain<D, F> {
    /// Negotiate a chain for `surface`.
    ///
    /// When `previous` still holds a platform handle (it may have been
    /// invalidated by a failed frame) that handle is passed on as the chain
    /// being replaced. `previous` itself is left untouched;
    /// call [`retire`](Self::retire) on it once this returns.
    pub fn negotiate(
        device: &Arc<D>,
        surface: &D::Surface,
        factory: &F,
        config: &ChainConfig,
        previous: Option<&Self>,
    ) -> Self {
        let mut chain = Self {
            device: Arc::clone(device),
            handle: None,
            capabilities: SurfaceCapabilities::default(),
            extent: Extent2D::default(),
            surface_format: None,
            present_mode: PresentMode::Fifo,
            backbuffers: Vec::new(),
            images: Vec::new(),
            targets: Vec::new(),
            current_backbuffer: 0,
            current_image: None,
            error: None,
            valid: false,
        };

        match chain.build(surface, factory, config, previous) {
            Ok(()) => {
                chain.valid = true;
                info!(
                    "swapchain ready: {} images, {}, {}, {}",
                    chain.images.len(),
                    chain.extent,
                    chain
                        .surface_format
                        .map_or_else(|| "?".to_string(), |f| f.to_string()),
                    chain.present_mode
                );
            }
            Err(err) => {
                warn!("swapchain negotiation failed: {err}");
                chain.release();
                chain.error = Some(err);
            }
        }
        chain
    }

    fn build(
        &mut self,
        surface: &D::Surface,
        factory: &F,
        config: &ChainConfig,
        previous: Option<&Self>,
    ) -> Result<(), NegotiateError> {
        if !self.device.is_valid() {
            return Err(NegotiateError::DeviceNotReady);
        }
        if !surface.is_valid() {
            return Err(NegotiateError::SurfaceNotReady);
        }
        if let Some(prev) = previous {
            if !Arc::ptr_eq(&prev.device, &self.device) {
                return Err(NegotiateError::MismatchedPredecessor);
            }
        }

        self.capabilities = self
            .device
            .surface_capabilities(surface)
            .map_err(NegotiateError::Capabilities)?;

        let format = self
            .device
            .choose_surface_format(surface)
            .ok_or(NegotiateError::NoSurfaceFormat)?;
        self.surface_format = Some(format);

        self.present_mode = self.device.choose_present_mode(surface).unwrap_or_else(|| {
            debug!("device offered no present mode preference, using FIFO");
            PresentMode::Fifo
        });

        let queue_family = self.device.queue_family_index();
        let supported = self
            .device
            .surface_supports_present(surface, queue_family)
            .map_err(NegotiateError::PresentSupportQuery)?;
        if !supported {
            return Err(NegotiateError::PresentUnsupported { queue_family });
        }

        // An invalidated chain still owns its handle and must be handed off;
        // a released one has none.
        let old_swapchain = previous.and_then(|p| p.handle);
        self.extent = compute_extent(&self.capabilities, config.size_hint);

        let handle = self
            .device
            .create_swapchain(&SwapchainCreateInfo {
                surface,
                min_image_count: self.capabilities.min_image_count,
                format,
                extent: self.extent,
                present_mode: self.present_mode,
                old_swapchain,
            })
            .map_err(NegotiateError::Create)?;
        self.handle = Some(handle);

        let images = self
            .device
            .swapchain_images(handle)
            .map_err(NegotiateError::Images)?;
        if images.is_empty() {
            return Err(NegotiateError::NoImages);
        }

        for (index, image) in images.into_iter().enumerate() {
            let backbuffer = Backbuffer::new(&self.device)
                .map_err(|source| NegotiateError::Backbuffer { index, source })?;
            self.backbuffers.push(backbuffer);

            self.images.push(PresentableImage::new(image));

            let target = factory
                .wrap_image(image, format, self.extent)
                .map_err(|source| NegotiateError::RenderTarget { index, source })?;
            self.targets.push(target);
        }

        debug_assert_eq!(self.backbuffers.len(), self.images.len());
        debug_assert_eq!(self.images.len(), self.targets.len());
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Why negotiation failed, if it did.
    pub fn error(&self) -> Option<&NegotiateError> {
        self.error.as_ref()
    }

    /// Extent of every image in the chain.
    pub fn size(&self) -> Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn format(&self) -> Option<SurfaceFormat> {
        self.surface_format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    pub fn capabilities(&self) -> &SurfaceCapabilities {
        &self.capabilities
    }

    pub fn raw_handle(&self) -> Option<D::Swapchain> {
        self.handle
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Ring slot used by the frame in flight (or the last one).
    pub fn current_backbuffer_index(&self) -> usize {
        self.current_backbuffer
    }

    /// Image acquired and not yet submitted.
    pub fn current_image_index(&self) -> Option<u32> {
        self.current_image.map(|i| i as u32)
    }

    /// Render target of the image acquired and not yet submitted.
    pub fn current_target_mut(&mut self) -> Option<&mut F::Target> {
        let index = self.current_image?;
        self.targets.get_mut(index)
    }

    /// Tear the chain down after it has been replaced. Blocks until the
    /// device is idle.
    pub fn retire(mut self) {
        info!(
            "retiring swapchain {:?} ({} images)",
            self.handle,
            self.images.len()
        );
        self.release();
    }

    /// Drop every resource the chain holds. Safe to call more than once.
    fn release(&mut self) {
        self.valid = false;
        self.current_image = None;

        if self.handle.is_none()
            && self.backbuffers.is_empty()
            && self.images.is_empty()
            && self.targets.is_empty()
        {
            return;
        }

        if let Err(err) = self.device.wait_idle() {
            error!("device idle wait failed during swapchain teardown: {err}");
            std::process::abort();
        }

        self.targets.clear();
        self.images.clear();
        self.backbuffers.clear();

        if let Some(handle) = self.handle.take() {
            debug!("destroying swapchain {:?}", handle);
            // SAFETY: the device is idle, and every image view and
            // backbuffer referencing this chain was dropped above.
            unsafe { self.device.destroy_swapchain(handle) };
        }
    }
}

impl<D: Device, F: RenderTargetFactory<D::Image>> Drop for Swapchain<D, F> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Extent for a new chain: the surface's current extent, or the hint when the
/// surface leaves it undefined, clamped into the supported range.
pub(crate) fn compute_extent(caps: &SurfaceCapabilities, hint: Option<Extent2D>) -> Extent2D {
    let requested = if caps.has_fixed_extent() {
        caps.current_extent
    } else {
        hint.unwrap_or(caps.current_extent)
    };
    requested.clamp(caps.min_image_extent, caps.max_image_extent)
}
