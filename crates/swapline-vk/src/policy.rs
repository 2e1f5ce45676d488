// SPDX-License-Identifier: CEPL-1.0
//! Selection tables for surface format, present mode and composite alpha.

use ash::vk;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VkVsyncMode {
    #[default]
    Fifo, // Target monitor refresh rate
    Mailbox, // Smart Vsync, fps uncapped
}

/// How [`VkDevice`](crate::VkDevice) picks a present mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentPolicy {
    pub vsync: bool,
    pub vsync_mode: VkVsyncMode,
}

impl Default for PresentPolicy {
    fn default() -> Self {
        Self {
            vsync: true,
            vsync_mode: VkVsyncMode::Fifo,
        }
    }
}

/// First supported entry of the policy's preference list. `None` when the
/// surface reported no modes at all.
pub(crate) fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    policy: PresentPolicy,
) -> Option<vk::PresentModeKHR> {
    if modes.is_empty() {
        return None;
    }

    let prefs: &[vk::PresentModeKHR] = if !policy.vsync {
        &[
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
        ]
    } else {
        match policy.vsync_mode {
            VkVsyncMode::Mailbox => &[vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO],
            VkVsyncMode::Fifo => &[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    };

    Some(
        prefs
            .iter()
            .copied()
            .find(|m| modes.contains(m))
            .unwrap_or(vk::PresentModeKHR::FIFO),
    )
}

/// SDR preference order; falls back to whatever the driver lists first.
pub(crate) fn pick_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Option<(vk::SurfaceFormatKHR, &'static str)> {
    if let Some(f) = formats
        .iter()
        .copied()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB)
    {
        return Some((f, "sdr_bgra8_srgb"));
    }
    if let Some(f) = formats
        .iter()
        .copied()
        .find(|f| f.format == vk::Format::R8G8B8A8_SRGB)
    {
        return Some((f, "sdr_rgba8_srgb"));
    }
    if let Some(f) = formats.iter().copied().find(|f| {
        f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    }) {
        return Some((f, "sdr_bgra8_unorm_srgbcs"));
    }

    formats.first().map(|&f| (f, "driver_default"))
}

pub(crate) fn choose_composite_alpha(
    supported: vk::CompositeAlphaFlagsKHR,
) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|&a| supported.contains(a))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: &[vk::PresentModeKHR] = &[
        vk::PresentModeKHR::FIFO,
        vk::PresentModeKHR::MAILBOX,
        vk::PresentModeKHR::IMMEDIATE,
    ];

    fn policy(vsync: bool, vsync_mode: VkVsyncMode) -> PresentPolicy {
        PresentPolicy { vsync, vsync_mode }
    }

    #[test]
    fn vsync_off_prefers_immediate() {
        assert_eq!(
            choose_present_mode(ALL_MODES, policy(false, VkVsyncMode::Fifo)),
            Some(vk::PresentModeKHR::IMMEDIATE)
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO], policy(false, VkVsyncMode::Fifo)),
            Some(vk::PresentModeKHR::FIFO)
        );
    }

    #[test]
    fn vsync_modes_follow_preference() {
        assert_eq!(
            choose_present_mode(ALL_MODES, policy(true, VkVsyncMode::Mailbox)),
            Some(vk::PresentModeKHR::MAILBOX)
        );
        assert_eq!(
            choose_present_mode(ALL_MODES, policy(true, VkVsyncMode::Fifo)),
            Some(vk::PresentModeKHR::FIFO)
        );
        assert_eq!(
            choose_present_mode(
                &[vk::PresentModeKHR::IMMEDIATE],
                policy(true, VkVsyncMode::Mailbox)
            ),
            Some(vk::PresentModeKHR::FIFO)
        );
    }

    #[test]
    fn no_modes_leaves_choice_open() {
        assert_eq!(choose_present_mode(&[], PresentPolicy::default()), None);
    }

    #[test]
    fn srgb_formats_win() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let (picked, why) = pick_surface_format(&[unorm, srgb]).unwrap();
        assert_eq!(picked.format, srgb.format);
        assert_eq!(why, "sdr_rgba8_srgb");

        let (picked, why) = pick_surface_format(&[unorm]).unwrap();
        assert_eq!(picked.format, unorm.format);
        assert_eq!(why, "sdr_bgra8_unorm_srgbcs");
        assert!(pick_surface_format(&[]).is_none());
    }

    #[test]
    fn composite_alpha_prefers_opaque() {
        let supported =
            vk::CompositeAlphaFlagsKHR::INHERIT | vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED;
        assert_eq!(
            choose_composite_alpha(supported),
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
        );
        assert_eq!(
            choose_composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE),
            vk::CompositeAlphaFlagsKHR::OPAQUE
        );
    }
}
