// SPDX-License-Identifier: CEPL-1.0
//! Per-frame protocol: acquire an image, hand it out for drawing, present it.

use tracing::{debug, trace, warn};

use crate::device::{Device, QueueSubmit};
use crate::error::{DeviceError, FrameError};
use crate::image::ImageState;
use crate::render_target::{RenderTarget, RenderTargetFactory};
use crate::swapchain::Swapchain;
use crate::types::PipelineStages;

/// Outcome of [`Swapchain::acquire_surface`]. The render target stays
/// borrowed from the chain until the next acquire or teardown.
#[derive(Debug)]
pub enum AcquireResult<'a, T> {
    Success(&'a mut T),
    SurfaceLost,
    SurfaceOutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireStatus {
    Success,
    SurfaceLost,
    SurfaceOutOfDate,
}

impl<T> AcquireResult<'_, T> {
    pub fn status(&self) -> AcquireStatus {
        match self {
            AcquireResult::Success(_) => AcquireStatus::Success,
            AcquireResult::SurfaceLost => AcquireStatus::SurfaceLost,
            AcquireResult::SurfaceOutOfDate => AcquireStatus::SurfaceOutOfDate,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AcquireResult::Success(_))
    }
}

impl<D: Device, F: RenderTargetFactory<D::Image>> Swapchain<D, F> {
    /// Acquire the next image and move it into a drawable layout.
    ///
    /// Blocks until the next backbuffer slot's previous frame completed. A
    /// failure once the slot's fences were reset (including a suboptimal
    /// acquire) invalidates the chain; renegotiate before the next frame.
    pub fn acquire_surface(&mut self) -> AcquireResult<'_, F::Target> {
        match self.try_acquire() {
            Ok(index) => AcquireResult::Success(&mut self.targets[index]),
            Err(err) => {
                match err {
                    FrameError::SurfaceOutOfDate => debug!("acquire: {err}"),
                    _ => warn!("acquire failed: {err}"),
                }
                match err.acquire_status() {
                    AcquireStatus::SurfaceOutOfDate => AcquireResult::SurfaceOutOfDate,
                    _ => AcquireResult::SurfaceLost,
                }
            }
        }
    }

    fn try_acquire(&mut self) -> Result<usize, FrameError> {
        if !self.valid {
            return Err(FrameError::InvalidChain);
        }
        let handle = self.handle.ok_or(FrameError::InvalidChain)?;

        let slot = self.next_backbuffer()?;
        let reset = self.backbuffers[slot]
            .wait_fences()
            .map_err(FrameError::FenceWait)?
            .reset_fences()
            .map_err(FrameError::FenceReset);
        let result = reset.and_then(|()| self.acquire_into_slot(handle, slot));

        // Past the reset, a failure leaves this slot's fences unsignaled with
        // nothing queued to signal them. The next lap would wait forever.
        if let Err(err) = &result {
            debug!("slot {slot} left unsignaled ({err}), swapchain invalidated");
            self.valid = false;
        }
        result
    }

    fn acquire_into_slot(
        &mut self,
        handle: D::Swapchain,
        slot: usize,
    ) -> Result<usize, FrameError> {
        let backbuffer = &mut self.backbuffers[slot];

        let acquired = self
            .device
            .acquire_next_image(handle, backbuffer.usage_semaphore().raw_handle())
            .map_err(|err| match err {
                DeviceError::OutOfDate => FrameError::SurfaceOutOfDate,
                DeviceError::SurfaceLost => FrameError::SurfaceLost,
                other => FrameError::AcquireFailed(other),
            })?;
        if acquired.suboptimal {
            return Err(FrameError::SuboptimalAcquire {
                index: acquired.index,
            });
        }

        let index = acquired.index as usize;
        if index >= self.images.len() {
            return Err(FrameError::ImageIndexOutOfRange {
                index: acquired.index,
                count: self.images.len(),
            });
        }

        let next = ImageState::ColorAttachment;
        let barrier = self.images[index].barrier_to(next)?;

        let cmd = backbuffer.usage_command_buffer_mut();
        cmd.begin().map_err(FrameError::BarrierFailed)?;
        cmd.image_barrier(&barrier);
        cmd.end().map_err(FrameError::BarrierFailed)?;

        let wait_semaphores = [backbuffer.usage_semaphore().raw_handle()];
        let command_buffers = [backbuffer.usage_command_buffer().raw_handle()];
        self.device
            .queue_submit(&QueueSubmit {
                wait_stages: &[PipelineStages::COLOR_ATTACHMENT_OUTPUT],
                wait_semaphores: &wait_semaphores,
                signal_semaphores: &[],
                command_buffers: &command_buffers,
                fence: Some(backbuffer.usage_fence().raw_handle()),
            })
            .map_err(FrameError::SubmitFailed)?;

        self.images[index].commit(next);
        self.targets[index].set_backend_layout(next.layout());
        self.current_image = Some(index);

        trace!("acquired image {index} on slot {slot}");
        Ok(index)
    }

    fn next_backbuffer(&mut self) -> Result<usize, FrameError> {
        if self.backbuffers.is_empty() {
            return Err(FrameError::NoBackbuffer);
        }
        self.current_backbuffer = (self.current_backbuffer + 1) % self.backbuffers.len();
        Ok(self.current_backbuffer)
    }

    /// Transition the acquired image for presentation, submit and present it.
    ///
    /// Only a render target that is not ready yet may be retried. A failed
    /// render submission invalidates the chain; a failed or suboptimal
    /// present leaves it valid but out of step with the surface. Renegotiate
    /// in every other case.
    pub fn submit(&mut self) -> Result<(), FrameError> {
        self.try_submit().inspect_err(|err| warn!("submit failed: {err}"))
    }

    fn try_submit(&mut self) -> Result<(), FrameError> {
        if !self.valid {
            return Err(FrameError::InvalidChain);
        }
        let handle = self.handle.ok_or(FrameError::InvalidChain)?;
        let index = self.current_image.ok_or(FrameError::NotAcquired)?;
        let slot = self.current_backbuffer;
        if slot >= self.backbuffers.len() {
            return Err(FrameError::NoBackbuffer);
        }

        // Retryable: nothing was recorded yet.
        self.targets[index]
            .prepare_for_present()
            .map_err(FrameError::RenderTarget)?;

        // The render fence was reset at acquire; without this submission it
        // is never signaled again.
        if let Err(err) = self.submit_render(index, slot) {
            debug!("slot {slot} left unsignaled ({err}), swapchain invalidated");
            self.valid = false;
            return Err(err);
        }

        let wait_semaphores = [self.backbuffers[slot].render_semaphore().raw_handle()];
        let suboptimal = self
            .device
            .queue_present(handle, index as u32, &wait_semaphores)
            .map_err(FrameError::PresentFailed)?;
        if suboptimal {
            return Err(FrameError::SuboptimalPresent {
                index: index as u32,
            });
        }

        trace!("presented image {index} from slot {slot}");
        Ok(())
    }

    fn submit_render(&mut self, index: usize, slot: usize) -> Result<(), FrameError> {
        let backbuffer = &mut self.backbuffers[slot];

        let next = ImageState::PresentSrc;
        let barrier = self.images[index].barrier_to(next)?;

        let cmd = backbuffer.render_command_buffer_mut();
        cmd.begin().map_err(FrameError::BarrierFailed)?;
        cmd.image_barrier(&barrier);
        cmd.end().map_err(FrameError::BarrierFailed)?;

        let signal_semaphores = [backbuffer.render_semaphore().raw_handle()];
        let command_buffers = [backbuffer.render_command_buffer().raw_handle()];
        self.device
            .queue_submit(&QueueSubmit {
                wait_stages: &[],
                wait_semaphores: &[],
                signal_semaphores: &signal_semaphores,
                command_buffers: &command_buffers,
                fence: Some(backbuffer.render_fence().raw_handle()),
            })
            .map_err(FrameError::SubmitFailed)?;

        self.images[index].commit(next);
        self.targets[index].set_backend_layout(next.layout());
        self.current_image = None;
        Ok(())
    }
}
