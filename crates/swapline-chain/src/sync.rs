// SPDX-License-Identifier: CEPL-1.0
//! Owned wrappers around device fences and semaphores.

use std::fmt;
use std::sync::Arc;

use crate::device::Device;
use crate::error::DeviceError;

/// Host-waitable completion signal. Destroyed on drop.
pub struct Fence<D: Device> {
    device: Arc<D>,
    handle: D::Fence,
}

impl<D: Device> Fence<D> {
    pub fn new(device: &Arc<D>, signaled: bool) -> Result<Self, DeviceError> {
        let handle = device.create_fence(signaled)?;
        Ok(Self {
            device: Arc::clone(device),
            handle,
        })
    }

    pub fn raw_handle(&self) -> D::Fence {
        self.handle
    }
}

impl<D: Device> fmt::Debug for Fence<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fence")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl<D: Device> Drop for Fence<D> {
    fn drop(&mut self) {
        // SAFETY: the owning chain waited for device idle before dropping
        // its backbuffers, so the fence is not pending.
        unsafe { self.device.destroy_fence(self.handle) };
    }
}

/// Queue-side ordering signal. Destroyed on drop.
pub struct Semaphore<D: Device> {
    device: Arc<D>,
    handle: D::Semaphore,
}

impl<D: Device> Semaphore<D> {
    pub fn new(device: &Arc<D>) -> Result<Self, DeviceError> {
        let handle = device.create_semaphore()?;
        Ok(Self {
            device: Arc::clone(device),
            handle,
        })
    }

    pub fn raw_handle(&self) -> D::Semaphore {
        self.handle
    }
}

impl<D: Device> fmt::Debug for Semaphore<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl<D: Device> Drop for Semaphore<D> {
    fn drop(&mut self) {
        // SAFETY: see `Fence::drop`; no submission still references it.
        unsafe { self.device.destroy_semaphore(self.handle) };
    }
}
