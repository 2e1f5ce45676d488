// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use tracing::trace;

use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::DeviceError;
use crate::sync::{Fence, Semaphore};

/// One ring slot of reusable frame resources.
///
/// The "usage" half covers acquire and the transition into a drawable
/// layout, the "render" half covers the transition to present and the
/// present itself. Both fences start signaled so a fresh slot never blocks.
#[derive(Debug)]
pub struct Backbuffer<D: Device> {
    device: Arc<D>,
    usage_command_buffer: CommandBuffer<D>,
    render_command_buffer: CommandBuffer<D>,
    usage_semaphore: Semaphore<D>,
    render_semaphore: Semaphore<D>,
    usage_fence: Fence<D>,
    render_fence: Fence<D>,
}

impl<D: Device> Backbuffer<D> {
    pub fn new(device: &Arc<D>) -> Result<Self, DeviceError> {
        Ok(Self {
            device: Arc::clone(device),
            usage_command_buffer: CommandBuffer::new(device)?,
            render_command_buffer: CommandBuffer::new(device)?,
            usage_semaphore: Semaphore::new(device)?,
            render_semaphore: Semaphore::new(device)?,
            usage_fence: Fence::new(device, true)?,
            render_fence: Fence::new(device, true)?,
        })
    }

    /// Block until both fences are signaled. No timeout.
    ///
    /// The fences can only be reset through the returned token.
    #[must_use = "the fences stay signaled until the token resets them"]
    pub fn wait_fences(&mut self) -> Result<SignaledFences<'_, D>, DeviceError> {
        let fences = [self.usage_fence.raw_handle(), self.render_fence.raw_handle()];
        trace!("waiting on backbuffer fences {:?}", fences);
        self.device.wait_for_fences(&fences)?;
        Ok(SignaledFences { backbuffer: self })
    }

    pub fn usage_semaphore(&self) -> &Semaphore<D> {
        &self.usage_semaphore
    }

    pub fn render_semaphore(&self) -> &Semaphore<D> {
        &self.render_semaphore
    }

    pub fn usage_fence(&self) -> &Fence<D> {
        &self.usage_fence
    }

    pub fn render_fence(&self) -> &Fence<D> {
        &self.render_fence
    }

    pub fn usage_command_buffer(&self) -> &CommandBuffer<D> {
        &self.usage_command_buffer
    }

    pub fn usage_command_buffer_mut(&mut self) -> &mut CommandBuffer<D> {
        &mut self.usage_command_buffer
    }

    pub fn render_command_buffer(&self) -> &CommandBuffer<D> {
        &self.render_command_buffer
    }

    pub fn render_command_buffer_mut(&mut self) -> &mut CommandBuffer<D> {
        &mut self.render_command_buffer
    }
}

/// Proof that both fences of a backbuffer were observed signaled.
#[must_use = "call reset_fences before reusing the slot"]
pub struct SignaledFences<'a, D: Device> {
    backbuffer: &'a mut Backbuffer<D>,
}

impl<D: Device> SignaledFences<'_, D> {
    /// Return both fences to unsignaled so the next submissions can use them.
    pub fn reset_fences(self) -> Result<(), DeviceError> {
        let bb = self.backbuffer;
        bb.device
            .reset_fences(&[bb.usage_fence.raw_handle(), bb.render_fence.raw_handle()])
    }
}
