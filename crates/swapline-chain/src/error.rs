// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::frame::AcquireStatus;
use crate::image::TransitionError;
use crate::render_target::RenderTargetError;

/// Failure reported by a [`Device`](crate::Device) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("surface is out of date")]
    OutOfDate,

    #[error("surface was lost")]
    SurfaceLost,

    #[error("device was lost")]
    DeviceLost,

    #[error("out of host or device memory")]
    OutOfMemory,

    #[error("backend error: {0}")]
    Backend(String),
}

/// Why a chain came out of [`Swapchain::negotiate`](crate::Swapchain::negotiate)
/// invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiateError {
    #[error("device is not ready")]
    DeviceNotReady,

    #[error("surface is not ready")]
    SurfaceNotReady,

    #[error("previous swapchain was created from a different device")]
    MismatchedPredecessor,

    #[error("could not query surface capabilities: {0}")]
    Capabilities(DeviceError),

    #[error("device offered no supported surface format")]
    NoSurfaceFormat,

    #[error("could not query presentation support: {0}")]
    PresentSupportQuery(DeviceError),

    #[error("queue family {queue_family} cannot present to this surface")]
    PresentUnsupported { queue_family: u32 },

    #[error("could not create the swapchain: {0}")]
    Create(DeviceError),

    #[error("could not fetch swapchain images: {0}")]
    Images(DeviceError),

    #[error("swapchain reported no images")]
    NoImages,

    #[error("could not create backbuffer {index}: {source}")]
    Backbuffer { index: usize, source: DeviceError },

    #[error("could not wrap swapchain image {index}: {source}")]
    RenderTarget {
        index: usize,
        source: RenderTargetError,
    },
}

/// Failure of one step of the acquire/submit protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("swapchain is invalid")]
    InvalidChain,

    #[error("no image was acquired for this frame")]
    NotAcquired,

    #[error("backbuffer ring is empty")]
    NoBackbuffer,

    #[error("waiting on backbuffer fences failed: {0}")]
    FenceWait(DeviceError),

    #[error("resetting backbuffer fences failed: {0}")]
    FenceReset(DeviceError),

    #[error("surface is out of date")]
    SurfaceOutOfDate,

    #[error("surface was lost")]
    SurfaceLost,

    #[error("acquiring the next image failed: {0}")]
    AcquireFailed(DeviceError),

    #[error("acquired image {index} from a suboptimal swapchain")]
    SuboptimalAcquire { index: u32 },

    #[error("image index {index} is out of range ({count} images)")]
    ImageIndexOutOfRange { index: u32, count: usize },

    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    #[error("recording the layout barrier failed: {0}")]
    BarrierFailed(DeviceError),

    #[error("queue submission failed: {0}")]
    SubmitFailed(DeviceError),

    #[error("present failed: {0}")]
    PresentFailed(DeviceError),

    #[error("presented image {index} to a suboptimal swapchain")]
    SuboptimalPresent { index: u32 },

    #[error("render target is not ready: {0}")]
    RenderTarget(RenderTargetError),
}

impl FrameError {
    /// Collapse into what the acquire caller sees. Only an out-of-date
    /// surface is recoverable in place; everything else reads as lost.
    pub fn acquire_status(&self) -> AcquireStatus {
        match self {
            FrameError::SurfaceOutOfDate => AcquireStatus::SurfaceOutOfDate,
            _ => AcquireStatus::SurfaceLost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_out_of_date_is_distinguished() {
        assert_eq!(
            FrameError::SurfaceOutOfDate.acquire_status(),
            AcquireStatus::SurfaceOutOfDate
        );
        for err in [
            FrameError::InvalidChain,
            FrameError::SurfaceLost,
            FrameError::AcquireFailed(DeviceError::DeviceLost),
            FrameError::FenceWait(DeviceError::Backend("timeout".into())),
            FrameError::ImageIndexOutOfRange { index: 7, count: 3 },
            FrameError::SuboptimalAcquire { index: 0 },
        ] {
            assert_eq!(err.acquire_status(), AcquireStatus::SurfaceLost, "{err}");
        }
    }
}
