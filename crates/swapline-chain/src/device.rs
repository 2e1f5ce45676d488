// SPDX-License-Identifier: CEPL-1.0
use std::fmt;

use crate::error::DeviceError;
use crate::types::{
    AccessFlags, Extent2D, ImageLayout, PipelineStages, PresentMode, SurfaceCapabilities,
    SurfaceFormat,
};

/// A presentable surface created by the platform layer.
pub trait PresentSurface {
    type Handle: Copy + fmt::Debug;

    fn is_valid(&self) -> bool;
    fn raw_handle(&self) -> Self::Handle;
}

/// Image index handed back by the presentation engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    /// The image is usable but the chain no longer matches the surface
    /// exactly.
    pub suboptimal: bool,
}

/// Parameters for [`Device::create_swapchain`].
pub struct SwapchainCreateInfo<'a, D: Device + ?Sized> {
    pub surface: &'a D::Surface,
    pub min_image_count: u32,
    pub format: SurfaceFormat,
    pub extent: Extent2D,
    pub present_mode: PresentMode,
    /// Chain being replaced, if any. It stays alive until its owner retires
    /// it.
    pub old_swapchain: Option<D::Swapchain>,
}

/// One queue submission.
pub struct QueueSubmit<'a, D: Device + ?Sized> {
    /// One stage mask per entry of `wait_semaphores`.
    pub wait_stages: &'a [PipelineStages],
    pub wait_semaphores: &'a [D::Semaphore],
    pub signal_semaphores: &'a [D::Semaphore],
    pub command_buffers: &'a [D::CommandBuffer],
    pub fence: Option<D::Fence>,
}

/// A layout transition of a whole single-mip color image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageBarrier<I> {
    pub image: I,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

/// The logical device and its single graphics/present queue.
///
/// Every call blocks the calling thread until the driver returns; only
/// [`wait_for_fences`](Self::wait_for_fences) and
/// [`wait_idle`](Self::wait_idle) wait on the GPU itself, and neither has a
/// timeout.
pub trait Device {
    type Surface: PresentSurface;
    type Swapchain: Copy + Eq + fmt::Debug;
    type Image: Copy + Eq + fmt::Debug;
    type Semaphore: Copy + Eq + fmt::Debug;
    type Fence: Copy + Eq + fmt::Debug;
    type CommandBuffer: Copy + Eq + fmt::Debug;

    fn is_valid(&self) -> bool;

    /// Queue family all submissions and presents go to.
    fn queue_family_index(&self) -> u32;

    fn surface_capabilities(
        &self,
        surface: &Self::Surface,
    ) -> Result<SurfaceCapabilities, DeviceError>;

    /// Device policy: first supported entry of its preference list, `None`
    /// when the surface reports nothing usable.
    fn choose_surface_format(&self, surface: &Self::Surface) -> Option<SurfaceFormat>;

    /// Device policy; `None` leaves the choice to the caller.
    fn choose_present_mode(&self, surface: &Self::Surface) -> Option<PresentMode>;

    fn surface_supports_present(
        &self,
        surface: &Self::Surface,
        queue_family_index: u32,
    ) -> Result<bool, DeviceError>;

    fn create_swapchain(
        &self,
        info: &SwapchainCreateInfo<'_, Self>,
    ) -> Result<Self::Swapchain, DeviceError>;

    fn swapchain_images(&self, swapchain: Self::Swapchain) -> Result<Vec<Self::Image>, DeviceError>;

    /// # Safety
    /// No pending GPU work may reference `swapchain` or its images.
    unsafe fn destroy_swapchain(&self, swapchain: Self::Swapchain);

    /// Acquire the next image with no timeout, signaling `signal` once the
    /// presentation engine is done reading it.
    fn acquire_next_image(
        &self,
        swapchain: Self::Swapchain,
        signal: Self::Semaphore,
    ) -> Result<AcquiredImage, DeviceError>;

    /// Queue `image_index` for presentation. `Ok(true)` means suboptimal.
    fn queue_present(
        &self,
        swapchain: Self::Swapchain,
        image_index: u32,
        wait_semaphores: &[Self::Semaphore],
    ) -> Result<bool, DeviceError>;

    fn create_semaphore(&self) -> Result<Self::Semaphore, DeviceError>;

    /// # Safety
    /// No pending submission may wait on or signal `semaphore`.
    unsafe fn destroy_semaphore(&self, semaphore: Self::Semaphore);

    fn create_fence(&self, signaled: bool) -> Result<Self::Fence, DeviceError>;

    /// # Safety
    /// `fence` must not be pending on any queue.
    unsafe fn destroy_fence(&self, fence: Self::Fence);

    /// Block until every fence in `fences` is signaled.
    fn wait_for_fences(&self, fences: &[Self::Fence]) -> Result<(), DeviceError>;

    fn reset_fences(&self, fences: &[Self::Fence]) -> Result<(), DeviceError>;

    fn allocate_command_buffer(&self) -> Result<Self::CommandBuffer, DeviceError>;

    /// # Safety
    /// `command_buffer` must not be pending execution.
    unsafe fn free_command_buffer(&self, command_buffer: Self::CommandBuffer);

    /// Start recording; any previous contents are discarded.
    fn begin_command_buffer(&self, command_buffer: Self::CommandBuffer) -> Result<(), DeviceError>;

    fn end_command_buffer(&self, command_buffer: Self::CommandBuffer) -> Result<(), DeviceError>;

    fn cmd_image_barrier(
        &self,
        command_buffer: Self::CommandBuffer,
        barrier: &ImageBarrier<Self::Image>,
    );

    fn queue_submit(&self, submit: &QueueSubmit<'_, Self>) -> Result<(), DeviceError>;

    fn wait_idle(&self) -> Result<(), DeviceError>;
}
