// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use std::sync::Arc;

use crate::device::{Device, ImageBarrier};
use crate::error::DeviceError;

/// A primary command buffer allocated from the device's resettable pool.
/// Freed on drop.
pub struct CommandBuffer<D: Device> {
    device: Arc<D>,
    handle: D::CommandBuffer,
    recording: bool,
}

impl<D: Device> CommandBuffer<D> {
    pub fn new(device: &Arc<D>) -> Result<Self, DeviceError> {
        let handle = device.allocate_command_buffer()?;
        Ok(Self {
            device: Arc::clone(device),
            handle,
            recording: false,
        })
    }

    /// Begin recording, discarding whatever was recorded before.
    pub fn begin(&mut self) -> Result<(), DeviceError> {
        self.device.begin_command_buffer(self.handle)?;
        self.recording = true;
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), DeviceError> {
        self.recording = false;
        self.device.end_command_buffer(self.handle)
    }

    pub fn image_barrier(&mut self, barrier: &ImageBarrier<D::Image>) {
        debug_assert!(self.recording, "barrier recorded outside begin/end");
        self.device.cmd_image_barrier(self.handle, barrier);
    }

    pub fn raw_handle(&self) -> D::CommandBuffer {
        self.handle
    }
}

impl<D: Device> fmt::Debug for CommandBuffer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("handle", &self.handle)
            .field("recording", &self.recording)
            .finish_non_exhaustive()
    }
}

impl<D: Device> Drop for CommandBuffer<D> {
    fn drop(&mut self) {
        // SAFETY: owners drop command buffers only after their fence was
        // waited on or the device went idle.
        unsafe { self.device.free_command_buffer(self.handle) };
    }
}
