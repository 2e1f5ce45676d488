// SPDX-License-Identifier: CEPL-1.0
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail, Context, Result};
use ash::khr::{surface, swapchain};
use ash::vk;
use swapline_chain::{
    AcquiredImage, Device, DeviceError, ImageBarrier, PresentMode, PresentSurface, QueueSubmit,
    SurfaceCapabilities, SurfaceFormat, SwapchainCreateInfo,
};
use tracing::{debug, info, warn};

use crate::convert::{
    access_to_vk, capabilities_from_vk, color_space_to_vk, device_error, extent_to_vk,
    format_to_vk, layout_to_vk, present_mode_from_vk, present_mode_to_vk, stages_to_vk,
    surface_format_from_vk,
};
use crate::instance::VkInstance;
use crate::policy::{choose_composite_alpha, choose_present_mode, pick_surface_format, PresentPolicy};
use crate::surface::VkSurface;

const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// Logical device with one graphics queue that can also present.
///
/// The queue and the command pool need external synchronisation, so both
/// sit behind a mutex.
pub struct VkDevice {
    instance: Arc<VkInstance>,
    phys: vk::PhysicalDevice,
    device: ash::Device,
    swapchain_loader: swapchain::Device,
    queue_family: u32,
    queue: Mutex<vk::Queue>,
    cmd_pool: Mutex<vk::CommandPool>,
    policy: PresentPolicy,
    lost: AtomicBool,
}

impl VkDevice {
    pub fn new(
        instance: &Arc<VkInstance>,
        surface: &VkSurface,
        policy: PresentPolicy,
    ) -> Result<Arc<Self>> {
        if !Arc::ptr_eq(surface.instance(), instance) {
            bail!("surface was created from a different instance");
        }

        // SAFETY: instance and surface are live; the surface came from this
        // instance.
        let (phys, queue_family) = unsafe {
            pick_device_and_queue(
                instance.raw(),
                instance.surface_loader(),
                surface.raw_handle(),
            )
        }?;

        // SAFETY: `phys` was enumerated from this instance.
        let props = unsafe { instance.raw().get_physical_device_properties(phys) };
        let name = props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Using GPU: {name} (queue family {queue_family})");

        // SAFETY: as above.
        let device = unsafe { create_logical_device(instance.raw(), phys, queue_family) }?;

        // SAFETY: the device was created with one queue in this family.
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        // SAFETY: `device` is live and owns nothing yet.
        let cmd_pool = match unsafe { create_command_pool(&device, queue_family) } {
            Ok(pool) => pool,
            Err(e) => {
                // SAFETY: nothing was created from the device.
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        let swapchain_loader = swapchain::Device::new(instance.raw(), &device);

        Ok(Arc::new(Self {
            instance: Arc::clone(instance),
            phys,
            device,
            swapchain_loader,
            queue_family,
            queue: Mutex::new(queue),
            cmd_pool: Mutex::new(cmd_pool),
            policy,
            lost: AtomicBool::new(false),
        }))
    }

    pub(crate) fn raw(&self) -> &ash::Device {
        &self.device
    }

    /// Held while recording into any command buffer from the shared pool.
    pub(crate) fn pool_lock(&self) -> MutexGuard<'_, vk::CommandPool> {
        lock(&self.cmd_pool)
    }

    fn surface_loader(&self) -> &surface::Instance {
        self.instance.surface_loader()
    }

    fn error(&self, r: vk::Result) -> DeviceError {
        let err = device_error(r);
        if err == DeviceError::DeviceLost {
            self.lost.store(true, Ordering::Release);
        }
        err
    }
}

impl Drop for VkDevice {
    fn drop(&mut self) {
        // SAFETY: every object created from this device holds an `Arc` to
        // it, so only the pool is left. Idle first so the pool is unused.
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device
                .destroy_command_pool(*lock(&self.cmd_pool), None);
            self.device.destroy_device(None);
        }
    }
}

impl Device for VkDevice {
    type Surface = VkSurface;
    type Swapchain = vk::SwapchainKHR;
    type Image = vk::Image;
    type Semaphore = vk::Semaphore;
    type Fence = vk::Fence;
    type CommandBuffer = vk::CommandBuffer;

    fn is_valid(&self) -> bool {
        !self.lost.load(Ordering::Acquire)
    }

    fn queue_family_index(&self) -> u32 {
        self.queue_family
    }

    fn surface_capabilities(
        &self,
        surface: &VkSurface,
    ) -> Result<SurfaceCapabilities, DeviceError> {
        // SAFETY: physical device and surface belong to the same instance.
        let caps = unsafe {
            self.surface_loader()
                .get_physical_device_surface_capabilities(self.phys, surface.raw_handle())
        }
        .map_err(|e| self.error(e))?;
        Ok(capabilities_from_vk(&caps))
    }

    fn choose_surface_format(&self, surface: &VkSurface) -> Option<SurfaceFormat> {
        // SAFETY: see `surface_capabilities`.
        let formats = match unsafe {
            self.surface_loader()
                .get_physical_device_surface_formats(self.phys, surface.raw_handle())
        } {
            Ok(f) => f,
            Err(e) => {
                warn!("surface format query failed: {e}");
                return None;
            }
        };

        let (picked, why) = pick_surface_format(&formats)?;
        let format = surface_format_from_vk(picked);
        info!("surface format = {format} ({why})");
        Some(format)
    }

    fn choose_present_mode(&self, surface: &VkSurface) -> Option<PresentMode> {
        // SAFETY: see `surface_capabilities`.
        let modes = match unsafe {
            self.surface_loader()
                .get_physical_device_surface_present_modes(self.phys, surface.raw_handle())
        } {
            Ok(m) => m,
            Err(e) => {
                warn!("present mode query failed: {e}");
                return None;
            }
        };

        let policy = self.policy;
        let mode = choose_present_mode(&modes, policy).map(present_mode_from_vk);
        debug!("present mode {:?} for {:?}", mode, policy);
        mode
    }

    fn surface_supports_present(
        &self,
        surface: &VkSurface,
        queue_family_index: u32,
    ) -> Result<bool, DeviceError> {
        // SAFETY: see `surface_capabilities`.
        unsafe {
            self.surface_loader().get_physical_device_surface_support(
                self.phys,
                queue_family_index,
                surface.raw_handle(),
            )
        }
        .map_err(|e| self.error(e))
    }

    fn create_swapchain(
        &self,
        info: &SwapchainCreateInfo<'_, Self>,
    ) -> Result<vk::SwapchainKHR, DeviceError> {
        let surface = info.surface.raw_handle();

        // Transform and composite alpha are not part of the negotiated
        // state; read them fresh.
        // SAFETY: see `surface_capabilities`.
        let caps = unsafe {
            self.surface_loader()
                .get_physical_device_surface_capabilities(self.phys, surface)
        }
        .map_err(|e| self.error(e))?;

        let mut usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
        if caps
            .supported_usage_flags
            .contains(vk::ImageUsageFlags::TRANSFER_DST)
        {
            usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }

        let ci = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface,
            min_image_count: info.min_image_count,
            image_format: format_to_vk(info.format.format),
            image_color_space: color_space_to_vk(info.format.color_space),
            image_extent: extent_to_vk(info.extent),
            image_array_layers: 1,
            image_usage: usage,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: caps.current_transform,
            composite_alpha: choose_composite_alpha(caps.supported_composite_alpha),
            present_mode: present_mode_to_vk(info.present_mode),
            clipped: vk::TRUE,
            old_swapchain: info.old_swapchain.unwrap_or_default(),
            ..Default::default()
        };

        // SAFETY: `ci` only points at locals; the old swapchain, if any, is
        // still alive.
        unsafe { self.swapchain_loader.create_swapchain(&ci, None) }.map_err(|e| self.error(e))
    }

    fn swapchain_images(&self, sc: vk::SwapchainKHR) -> Result<Vec<vk::Image>, DeviceError> {
        // SAFETY: `sc` was created by this device.
        unsafe { self.swapchain_loader.get_swapchain_images(sc) }.map_err(|e| self.error(e))
    }

    unsafe fn destroy_swapchain(&self, sc: vk::SwapchainKHR) {
        // SAFETY: forwarded to the caller.
        unsafe { self.swapchain_loader.destroy_swapchain(sc, None) };
    }

    fn acquire_next_image(
        &self,
        sc: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> Result<AcquiredImage, DeviceError> {
        // SAFETY: both handles belong to this device; no fence is passed.
        let (index, suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(sc, u64::MAX, signal, vk::Fence::null())
        }
        .map_err(|e| self.error(e))?;
        Ok(AcquiredImage { index, suboptimal })
    }

    fn queue_present(
        &self,
        sc: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<bool, DeviceError> {
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: wait_semaphores.len() as u32,
            p_wait_semaphores: wait_semaphores.as_ptr(),
            swapchain_count: 1,
            p_swapchains: &sc,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let queue = lock(&self.queue);
        // SAFETY: the queue is locked; `present` points at live locals.
        unsafe { self.swapchain_loader.queue_present(*queue, &present) }
            .map_err(|e| self.error(e))
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore, DeviceError> {
        let ci = vk::SemaphoreCreateInfo::default();
        // SAFETY: plain create info.
        unsafe { self.device.create_semaphore(&ci, None) }.map_err(|e| self.error(e))
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        // SAFETY: forwarded to the caller.
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence, DeviceError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags,
            ..Default::default()
        };
        // SAFETY: plain create info.
        unsafe { self.device.create_fence(&ci, None) }.map_err(|e| self.error(e))
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        // SAFETY: forwarded to the caller.
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn wait_for_fences(&self, fences: &[vk::Fence]) -> Result<(), DeviceError> {
        // SAFETY: fences belong to this device.
        unsafe { self.device.wait_for_fences(fences, true, u64::MAX) }.map_err(|e| self.error(e))
    }

    fn reset_fences(&self, fences: &[vk::Fence]) -> Result<(), DeviceError> {
        // SAFETY: callers only reset fences they waited on.
        unsafe { self.device.reset_fences(fences) }.map_err(|e| self.error(e))
    }

    fn allocate_command_buffer(&self) -> Result<vk::CommandBuffer, DeviceError> {
        let pool = self.pool_lock();
        let ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: *pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        // SAFETY: the pool is locked.
        let bufs =
            unsafe { self.device.allocate_command_buffers(&ai) }.map_err(|e| self.error(e))?;
        bufs.into_iter()
            .next()
            .ok_or_else(|| DeviceError::Backend("driver returned no command buffer".into()))
    }

    unsafe fn free_command_buffer(&self, cmd: vk::CommandBuffer) {
        let pool = self.pool_lock();
        // SAFETY: the pool is locked; pending-ness is on the caller.
        unsafe { self.device.free_command_buffers(*pool, &[cmd]) };
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<(), DeviceError> {
        let _pool = self.pool_lock();
        let bi = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        // SAFETY: the pool was created with RESET_COMMAND_BUFFER, so begin
        // resets implicitly; the buffer's fence was waited on by the caller.
        unsafe { self.device.begin_command_buffer(cmd, &bi) }.map_err(|e| self.error(e))
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<(), DeviceError> {
        let _pool = self.pool_lock();
        // SAFETY: `cmd` is recording.
        unsafe { self.device.end_command_buffer(cmd) }.map_err(|e| self.error(e))
    }

    fn cmd_image_barrier(&self, cmd: vk::CommandBuffer, barrier: &ImageBarrier<vk::Image>) {
        let image_barrier = vk::ImageMemoryBarrier {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
            src_access_mask: access_to_vk(barrier.src_access),
            dst_access_mask: access_to_vk(barrier.dst_access),
            old_layout: layout_to_vk(barrier.old_layout),
            new_layout: layout_to_vk(barrier.new_layout),
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image: barrier.image,
            subresource_range: COLOR_RANGE,
            ..Default::default()
        };
        let _pool = self.pool_lock();
        // SAFETY: `cmd` is recording and the pool is locked.
        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                stages_to_vk(barrier.src_stages),
                stages_to_vk(barrier.dst_stages),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[image_barrier],
            )
        };
    }

    fn queue_submit(&self, submit: &QueueSubmit<'_, Self>) -> Result<(), DeviceError> {
        let wait_stages: Vec<vk::PipelineStageFlags> =
            submit.wait_stages.iter().map(|&s| stages_to_vk(s)).collect();

        let si = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: submit.wait_semaphores.len() as u32,
            p_wait_semaphores: submit.wait_semaphores.as_ptr(),
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: submit.command_buffers.len() as u32,
            p_command_buffers: submit.command_buffers.as_ptr(),
            signal_semaphore_count: submit.signal_semaphores.len() as u32,
            p_signal_semaphores: submit.signal_semaphores.as_ptr(),
            ..Default::default()
        };

        let queue = lock(&self.queue);
        // SAFETY: the queue is locked; every array outlives the call.
        unsafe {
            self.device
                .queue_submit(*queue, &[si], submit.fence.unwrap_or_default())
        }
        .map_err(|e| self.error(e))
    }

    fn wait_idle(&self) -> Result<(), DeviceError> {
        let _queue = lock(&self.queue);
        // SAFETY: the only queue is locked.
        unsafe { self.device.device_wait_idle() }.map_err(|e| self.error(e))
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

unsafe fn pick_device_and_queue(
    instance: &ash::Instance,
    surf_i: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32)> {
    // SAFETY: forwarded to the caller.
    for phys in unsafe { instance.enumerate_physical_devices() }? {
        let qprops = unsafe { instance.get_physical_device_queue_family_properties(phys) };

        for (i, q) in qprops.iter().enumerate() {
            if q.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && unsafe { surf_i.get_physical_device_surface_support(phys, i as u32, surface) }
                    .unwrap_or(false)
            {
                return Ok((phys, i as u32));
            }
        }
    }
    Err(anyhow!("no suitable physical device/queue family"))
}

unsafe fn create_logical_device(
    instance: &ash::Instance,
    phys: vk::PhysicalDevice,
    queue_family: u32,
) -> Result<ash::Device> {
    let priorities = [1.0_f32];
    let qinfo = vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: queue_family,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    };

    let device_exts = [swapchain::NAME.as_ptr()];
    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: 1,
        p_queue_create_infos: &qinfo,
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        ..Default::default()
    };

    // SAFETY: every pointer in `dinfo` refers to a local above.
    unsafe { instance.create_device(phys, &dinfo, None) }.context("create_device")
}

unsafe fn create_command_pool(device: &ash::Device, queue_family: u32) -> Result<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: queue_family,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        ..Default::default()
    };
    // SAFETY: forwarded to the caller.
    unsafe { device.create_command_pool(&pool_info, None) }.context("create_command_pool")
}
