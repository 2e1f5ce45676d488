// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use swapline_chain::{AcquireResult, ChainConfig, Extent2D};
use swapline_core::config::{load_config, DEFAULT_CONFIG_PATH};
use swapline_core::{init_tracing, AppConfig, RenderConfig, VsyncMode};
use swapline_platform::{create_window, is_zero_sized};
use swapline_vk::{
    ClearRenderer, PresentPolicy, VkDevice, VkInstance, VkRenderTargetFactory, VkSurface,
    VkSwapchain, VkVsyncMode,
};
use tracing::{debug, error, info, warn};

use swapline_platform::winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override [render].vsync_mode
    #[arg(long, value_enum)]
    vsync_mode: Option<VsyncArg>,

    /// Exit after this many presented frames
    #[arg(long)]
    frames: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VsyncArg {
    Fifo,
    Mailbox,
}

impl From<VsyncArg> for VsyncMode {
    fn from(arg: VsyncArg) -> Self {
        match arg {
            VsyncArg::Fifo => VsyncMode::Fifo,
            VsyncArg::Mailbox => VsyncMode::Mailbox,
        }
    }
}

fn present_policy(render: &RenderConfig) -> PresentPolicy {
    PresentPolicy {
        vsync: render.vsync,
        vsync_mode: match render.vsync_mode {
            VsyncMode::Fifo => VkVsyncMode::Fifo,
            VsyncMode::Mailbox => VkVsyncMode::Mailbox,
        },
    }
}

fn chain_config(size: PhysicalSize<u32>) -> ChainConfig {
    ChainConfig {
        size_hint: Some(Extent2D::new(size.width, size.height)),
    }
}

enum FrameOutcome {
    Presented,
    Renegotiate,
    Lost,
}

// Field order is drop order: renderer and chain go before the device and
// surface they were created from.
struct Gpu {
    renderer: ClearRenderer,
    chain: VkSwapchain,
    factory: VkRenderTargetFactory,
    device: Arc<VkDevice>,
    surface: VkSurface,
    _instance: Arc<VkInstance>,
}

impl Gpu {
    fn new(window: &Window, render: &RenderConfig) -> Result<Self> {
        let instance = VkInstance::new(window).context("vk instance")?;
        let surface = VkSurface::new(&instance, window, window).context("vk surface")?;
        let device =
            VkDevice::new(&instance, &surface, present_policy(render)).context("vk device")?;
        let factory = VkRenderTargetFactory::new(&device);

        let chain = VkSwapchain::negotiate(
            &device,
            &surface,
            &factory,
            &chain_config(window.inner_size()),
            None,
        );
        if let Some(e) = chain.error() {
            return Err(anyhow!("swapchain negotiation failed: {e}"));
        }

        let renderer = ClearRenderer::new(&device, chain.image_count(), render.clear_color)
            .context("clear renderer")?;

        Ok(Self {
            renderer,
            chain,
            factory,
            device,
            surface,
            _instance: instance,
        })
    }

    /// Replace the chain, handing the current one over as predecessor.
    fn renegotiate(&mut self, size: PhysicalSize<u32>) -> bool {
        let next = VkSwapchain::negotiate(
            &self.device,
            &self.surface,
            &self.factory,
            &chain_config(size),
            Some(&self.chain),
        );
        let previous = std::mem::replace(&mut self.chain, next);
        previous.retire();

        match self.chain.error() {
            None => true,
            Some(e) => {
                warn!("renegotiation failed: {e}");
                false
            }
        }
    }

    fn render(&mut self) -> FrameOutcome {
        let target = match self.chain.acquire_surface() {
            AcquireResult::Success(target) => target,
            AcquireResult::SurfaceOutOfDate => return FrameOutcome::Renegotiate,
            AcquireResult::SurfaceLost => return FrameOutcome::Lost,
        };

        if let Err(e) = self.renderer.draw(target) {
            warn!("clear failed: {e}");
        }

        match self.chain.submit() {
            Ok(()) => FrameOutcome::Presented,
            Err(_) => FrameOutcome::Renegotiate,
        }
    }
}

struct App {
    cfg: AppConfig,
    frame_limit: Option<u64>,
    // Dropped before the window.
    gpu: Option<Gpu>,
    window: Option<Window>,
    size: PhysicalSize<u32>,

    exiting: bool,
    paused: bool,
    needs_renegotiate: bool,
    frames: u32,
    presented: u64,
    last_fps_instant: Instant,
}

impl App {
    fn new(cfg: AppConfig, frame_limit: Option<u64>) -> Self {
        Self {
            cfg,
            frame_limit,
            gpu: None,
            window: None,
            size: PhysicalSize::new(0, 0),
            exiting: false,
            paused: false,
            needs_renegotiate: false,
            frames: 0,
            presented: 0,
            last_fps_instant: Instant::now(),
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.gpu = None;
        self.window = None;
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        if self.needs_renegotiate {
            self.needs_renegotiate = false;
            if !gpu.renegotiate(self.size) {
                // Retried on the next resize.
                self.paused = true;
                return;
            }
        }

        match gpu.render() {
            FrameOutcome::Presented => {
                self.frames = self.frames.saturating_add(1);
                self.presented += 1;
                if self.frame_limit.is_some_and(|n| self.presented >= n) {
                    info!("presented {} frames, exiting", self.presented);
                    self.shutdown(event_loop);
                }
            }
            FrameOutcome::Renegotiate => {
                debug!("frame dropped, renegotiating");
                self.needs_renegotiate = true;
            }
            FrameOutcome::Lost => {
                if !gpu.renegotiate(self.size) {
                    error!("surface lost");
                    self.shutdown(event_loop);
                }
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window = match create_window(event_loop, "swapline", self.cfg.render.size_hint) {
                Ok(w) => w,
                Err(e) => {
                    error!("{e:#}");
                    self.shutdown(event_loop);
                    return;
                }
            };
            self.size = window.inner_size();

            match Gpu::new(&window, &self.cfg.render) {
                Ok(gpu) => self.gpu = Some(gpu),
                Err(e) => {
                    error!("vk init failed: {e:#}");
                    self.shutdown(event_loop);
                    return;
                }
            }

            info!(
                "vsync cfg = {} ({:?})",
                self.cfg.render.vsync, self.cfg.render.vsync_mode
            );
            self.window = Some(window);
        }

        event_loop.set_control_flow(if self.cfg.render.vsync {
            ControlFlow::Wait
        } else {
            ControlFlow::Poll
        });

        self.paused = is_zero_sized(self.size);
        info!("resumed -> paused={}", self.paused);

        if !self.paused {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                self.size = new_size;
                self.paused = is_zero_sized(new_size);
                info!(
                    "Resized -> {}x{} (paused={})",
                    new_size.width, new_size.height, self.paused
                );

                if !self.paused {
                    self.needs_renegotiate = true;
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting || self.paused {
                    return;
                }
                self.redraw(event_loop);
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }

        if self.paused {
            event_loop.set_control_flow(ControlFlow::Wait);
            self.frames = 0;
            return;
        }

        // Vsync blocks inside present, so both modes redraw continuously.
        event_loop.set_control_flow(if self.cfg.render.vsync {
            ControlFlow::Wait
        } else {
            ControlFlow::Poll
        });
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = load_config(&args.config);
    if let Some(mode) = args.vsync_mode {
        cfg.render.vsync_mode = mode.into();
    }

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg, args.frames);
    event_loop.run_app(&mut app)?;
    Ok(())
}
