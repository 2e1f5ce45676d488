// SPDX-License-Identifier: CEPL-1.0
//! Windowing for the demo: re-exports `winit` and builds the main window.
#![deny(unsafe_op_in_unsafe_fn)]

pub use winit;

use anyhow::{Context, Result};
use tracing::info;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

pub fn window_attributes(title: &str, size_hint: Option<[u32; 2]>) -> WindowAttributes {
    let attrs = Window::default_attributes().with_title(title);
    match size_hint {
        Some([w, h]) if w > 0 && h > 0 => attrs.with_inner_size(PhysicalSize::new(w, h)),
        _ => attrs,
    }
}

pub fn create_window(
    event_loop: &ActiveEventLoop,
    title: &str,
    size_hint: Option<[u32; 2]>,
) -> Result<Window> {
    let window = event_loop
        .create_window(window_attributes(title, size_hint))
        .context("create_window")?;
    let size = window.inner_size();
    info!("window created: {}x{}", size.width, size.height);
    Ok(window)
}

/// A minimised window reports a zero-sized client area; nothing can be
/// presented to it.
pub fn is_zero_sized(size: PhysicalSize<u32>) -> bool {
    size.width == 0 || size.height == 0
}
