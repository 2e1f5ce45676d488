// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use ash::vk;
use swapline_chain::{
    CommandBuffer, Device, DeviceError, Fence, ImageLayout, QueueSubmit, RenderTarget,
};
use tracing::{trace, warn};

use crate::device::VkDevice;
use crate::render_target::VkRenderTarget;

struct ClearSlot {
    cmd: CommandBuffer<VkDevice>,
    fence: Fence<VkDevice>,
    submitted: bool,
}

/// Minimal renderer: fills the acquired target with one color.
///
/// Work goes to the same queue as the chain's barriers, so queue order is
/// the only synchronisation it needs against them.
pub struct ClearRenderer {
    device: Arc<VkDevice>,
    slots: Vec<ClearSlot>,
    next: usize,
    clear: vk::ClearColorValue,
}

impl ClearRenderer {
    pub fn new(device: &Arc<VkDevice>, slots: usize, rgba: [f32; 4]) -> Result<Self, DeviceError> {
        let slots = (0..slots.max(1))
            .map(|_| {
                Ok(ClearSlot {
                    cmd: CommandBuffer::new(device)?,
                    fence: Fence::new(device, true)?,
                    submitted: false,
                })
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;

        Ok(Self {
            device: Arc::clone(device),
            slots,
            next: 0,
            clear: vk::ClearColorValue { float32: rgba },
        })
    }

    /// Record and submit a clear of `target`. The target must be in the
    /// color-attachment layout the chain leaves it in after acquire, and is
    /// left in that layout.
    pub fn draw(&mut self, target: &mut VkRenderTarget) -> Result<(), DeviceError> {
        if target.backend_layout() != ImageLayout::ColorAttachmentOptimal {
            return Err(DeviceError::Backend(format!(
                "render target is in {:?}, expected ColorAttachmentOptimal",
                target.backend_layout()
            )));
        }

        let index = self.next;
        self.next = (self.next + 1) % self.slots.len();
        let slot = &mut self.slots[index];

        let fence = [slot.fence.raw_handle()];
        if slot.submitted {
            self.device.wait_for_fences(&fence)?;
        }
        self.device.reset_fences(&fence)?;
        slot.submitted = false;

        target.begin_draw();
        slot.cmd.begin()?;
        {
            let _pool = self.device.pool_lock();
            // SAFETY: the command buffer is recording, the pool is locked and
            // the image is a live swapchain image in COLOR_ATTACHMENT_OPTIMAL.
            unsafe {
                record_clear(
                    self.device.raw(),
                    slot.cmd.raw_handle(),
                    target.image(),
                    &self.clear,
                )
            };
        }
        slot.cmd.end()?;

        let cmds = [slot.cmd.raw_handle()];
        self.device.queue_submit(&QueueSubmit {
            wait_stages: &[],
            wait_semaphores: &[],
            signal_semaphores: &[],
            command_buffers: &cmds,
            fence: Some(fence[0]),
        })?;
        slot.submitted = true;
        target.end_draw();

        trace!("clear submitted on slot {index}");
        Ok(())
    }
}

impl Drop for ClearRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("wait_idle before dropping clear renderer failed: {e}");
        }
    }
}

unsafe fn record_clear(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    color: &vk::ClearColorValue,
) {
    let subrange = vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    };

    let to_transfer = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        dst_access_mask: vk::AccessFlags::TRANSFER_WRITE,
        old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: subrange,
        ..Default::default()
    };

    let to_color = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask: vk::AccessFlags::TRANSFER_WRITE,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::COLOR_ATTACHMENT_READ,
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: subrange,
        ..Default::default()
    };

    // SAFETY: forwarded to the caller.
    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_transfer],
        );
        device.cmd_clear_color_image(
            cmd,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            color,
            &[subrange],
        );
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_color],
        );
    }
}
