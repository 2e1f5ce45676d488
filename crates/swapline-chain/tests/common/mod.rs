// SPDX-License-Identifier: CEPL-1.0
//! In-memory device that records every call and enforces fence rules.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use swapline_chain::{
    AcquiredImage, ChainConfig, ColorFormat, ColorSpace, Device, DeviceError, Extent2D,
    ImageBarrier, ImageLayout, PipelineStages, PresentMode, PresentSurface, QueueSubmit,
    RenderTarget, RenderTargetError, RenderTargetFactory, SurfaceCapabilities, SurfaceFormat,
    Swapchain, SwapchainCreateInfo,
};

pub type Handle = u64;
pub type Chain = Swapchain<FakeDevice, FakeTargetFactory>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    SurfaceCapabilities,
    SupportsPresent { queue_family: u32 },
    CreateSwapchain {
        handle: Handle,
        old: Option<Handle>,
        min_image_count: u32,
        extent: Extent2D,
        present_mode: PresentMode,
    },
    SwapchainImages(Handle),
    DestroySwapchain(Handle),
    Acquire { swapchain: Handle, semaphore: Handle },
    Present {
        swapchain: Handle,
        index: u32,
        wait: Vec<Handle>,
    },
    WaitFences(Vec<Handle>),
    WaitFencesDone(Vec<Handle>),
    ResetFences(Vec<Handle>),
    Begin(Handle),
    End(Handle),
    Barrier {
        cmd: Handle,
        barrier: ImageBarrier<Handle>,
    },
    Submit {
        wait_stages: Vec<PipelineStages>,
        wait: Vec<Handle>,
        signal: Vec<Handle>,
        cmds: Vec<Handle>,
        fence: Option<Handle>,
    },
    WaitIdle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FenceState {
    Unsignaled,
    Pending,
    Signaled,
}

#[derive(Default)]
struct State {
    next_handle: Handle,
    calls: Vec<Call>,
    fences: HashMap<Handle, FenceState>,
    semaphores: HashSet<Handle>,
    command_buffers: HashMap<Handle, bool>,
    swapchains: HashMap<Handle, Vec<Handle>>,
    acquire_cursor: HashMap<Handle, u32>,
    acquire_script: VecDeque<Result<AcquiredImage, DeviceError>>,
    present_failure: Option<DeviceError>,
    present_suboptimal: bool,
    submit_failure: Option<(usize, DeviceError)>,
    create_failure: Option<DeviceError>,
    image_count: Option<u32>,
    hold_fences: bool,
}

impl State {
    fn alloc(&mut self) -> Handle {
        self.next_handle += 1;
        self.next_handle
    }
}

pub struct FakeDevice {
    valid: bool,
    queue_family: u32,
    state: Mutex<State>,
    changed: Condvar,
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            valid: true,
            queue_family: 0,
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
        })
    }

    pub fn invalid() -> Arc<Self> {
        Arc::new(Self {
            valid: false,
            queue_family: 0,
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, state: &mut State, call: Call) {
        state.calls.push(call);
        self.changed.notify_all();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.lock().calls.iter().position(pred)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(*c)).count()
    }

    /// Block until a matching call was recorded; panics after a few seconds.
    pub fn wait_for_call(&self, pred: impl Fn(&Call) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut state = self.lock();
        while !state.calls.iter().any(&pred) {
            let left = deadline
                .checked_duration_since(Instant::now())
                .expect("timed out waiting for device call");
            state = self.changed.wait_timeout(state, left).unwrap().0;
        }
    }

    /// Keep submitted fences pending until [`signal_all_fences`].
    pub fn set_hold_fences(&self, hold: bool) {
        self.lock().hold_fences = hold;
    }

    pub fn signal_all_fences(&self) {
        let mut state = self.lock();
        for fence in state.fences.values_mut() {
            if *fence == FenceState::Pending {
                *fence = FenceState::Signaled;
            }
        }
        self.changed.notify_all();
    }

    pub fn script_acquire(&self, result: Result<AcquiredImage, DeviceError>) {
        self.lock().acquire_script.push_back(result);
    }

    pub fn fail_next_present(&self, err: DeviceError) {
        self.lock().present_failure = Some(err);
    }

    /// The next present succeeds but reports a suboptimal swapchain.
    pub fn suboptimal_next_present(&self) {
        self.lock().present_suboptimal = true;
    }

    /// Let `skip` submissions through, then fail one with `err`.
    pub fn fail_submit(&self, skip: usize, err: DeviceError) {
        self.lock().submit_failure = Some((skip, err));
    }

    pub fn fail_next_create(&self, err: DeviceError) {
        self.lock().create_failure = Some(err);
    }

    /// Report this many images regardless of the requested minimum.
    pub fn set_image_count(&self, count: u32) {
        self.lock().image_count = Some(count);
    }

    /// Live fences, semaphores, command buffers and swapchains.
    pub fn live_objects(&self) -> usize {
        let state = self.lock();
        state.fences.len()
            + state.semaphores.len()
            + state.command_buffers.len()
            + state.swapchains.len()
    }

    pub fn live_swapchains(&self) -> Vec<Handle> {
        let mut v: Vec<_> = self.lock().swapchains.keys().copied().collect();
        v.sort_unstable();
        v
    }

    pub fn submits(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Submit { .. }))
            .cloned()
            .collect()
    }

    pub fn barriers(&self) -> Vec<ImageBarrier<Handle>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Barrier { barrier, .. } => Some(*barrier),
                _ => None,
            })
            .collect()
    }
}

impl Device for FakeDevice {
    type Surface = FakeSurface;
    type Swapchain = Handle;
    type Image = Handle;
    type Semaphore = Handle;
    type Fence = Handle;
    type CommandBuffer = Handle;

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn queue_family_index(&self) -> u32 {
        self.queue_family
    }

    fn surface_capabilities(
        &self,
        surface: &FakeSurface,
    ) -> Result<SurfaceCapabilities, DeviceError> {
        let mut state = self.lock();
        self.record(&mut state, Call::SurfaceCapabilities);
        match &surface.capabilities_error {
            Some(err) => Err(err.clone()),
            None => Ok(surface.capabilities),
        }
    }

    fn choose_surface_format(&self, surface: &FakeSurface) -> Option<SurfaceFormat> {
        surface.formats.first().copied()
    }

    fn choose_present_mode(&self, surface: &FakeSurface) -> Option<PresentMode> {
        surface.present_modes.first().copied()
    }

    fn surface_supports_present(
        &self,
        surface: &FakeSurface,
        queue_family: u32,
    ) -> Result<bool, DeviceError> {
        let mut state = self.lock();
        self.record(&mut state, Call::SupportsPresent { queue_family });
        Ok(surface.presentable)
    }

    fn create_swapchain(
        &self,
        info: &SwapchainCreateInfo<'_, Self>,
    ) -> Result<Handle, DeviceError> {
        let mut state = self.lock();
        if let Some(err) = state.create_failure.take() {
            return Err(err);
        }
        if info.extent.is_empty() {
            return Err(DeviceError::Backend("zero image extent".into()));
        }
        if let Some(old) = info.old_swapchain {
            assert!(state.swapchains.contains_key(&old), "old swapchain {old} is dead");
        }
        let handle = state.alloc();
        let count = state.image_count.unwrap_or(info.min_image_count);
        let images = (0..count).map(|_| state.alloc()).collect();
        state.swapchains.insert(handle, images);
        self.record(
            &mut state,
            Call::CreateSwapchain {
                handle,
                old: info.old_swapchain,
                min_image_count: info.min_image_count,
                extent: info.extent,
                present_mode: info.present_mode,
            },
        );
        Ok(handle)
    }

    fn swapchain_images(&self, swapchain: Handle) -> Result<Vec<Handle>, DeviceError> {
        let mut state = self.lock();
        self.record(&mut state, Call::SwapchainImages(swapchain));
        state
            .swapchains
            .get(&swapchain)
            .cloned()
            .ok_or(DeviceError::SurfaceLost)
    }

    unsafe fn destroy_swapchain(&self, swapchain: Handle) {
        let mut state = self.lock();
        assert!(
            state.swapchains.remove(&swapchain).is_some(),
            "double destroy of swapchain {swapchain}"
        );
        self.record(&mut state, Call::DestroySwapchain(swapchain));
    }

    fn acquire_next_image(
        &self,
        swapchain: Handle,
        semaphore: Handle,
    ) -> Result<AcquiredImage, DeviceError> {
        let mut state = self.lock();
        self.record(&mut state, Call::Acquire { swapchain, semaphore });
        if let Some(scripted) = state.acquire_script.pop_front() {
            return scripted;
        }
        let count = state
            .swapchains
            .get(&swapchain)
            .map(|images| images.len() as u32)
            .ok_or(DeviceError::SurfaceLost)?;
        let cursor = state.acquire_cursor.entry(swapchain).or_insert(0);
        let index = *cursor % count;
        *cursor += 1;
        Ok(AcquiredImage {
            index,
            suboptimal: false,
        })
    }

    fn queue_present(
        &self,
        swapchain: Handle,
        index: u32,
        wait: &[Handle],
    ) -> Result<bool, DeviceError> {
        let mut state = self.lock();
        self.record(
            &mut state,
            Call::Present {
                swapchain,
                index,
                wait: wait.to_vec(),
            },
        );
        match state.present_failure.take() {
            Some(err) => Err(err),
            None => Ok(std::mem::take(&mut state.present_suboptimal)),
        }
    }

    fn create_semaphore(&self) -> Result<Handle, DeviceError> {
        let mut state = self.lock();
        let handle = state.alloc();
        state.semaphores.insert(handle);
        Ok(handle)
    }

    unsafe fn destroy_semaphore(&self, semaphore: Handle) {
        assert!(self.lock().semaphores.remove(&semaphore));
    }

    fn create_fence(&self, signaled: bool) -> Result<Handle, DeviceError> {
        let mut state = self.lock();
        let handle = state.alloc();
        let fence = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        state.fences.insert(handle, fence);
        Ok(handle)
    }

    unsafe fn destroy_fence(&self, fence: Handle) {
        let state = self.lock().fences.remove(&fence);
        assert_ne!(state, Some(FenceState::Pending), "destroyed in-flight fence {fence}");
        assert!(state.is_some(), "double destroy of fence {fence}");
    }

    fn wait_for_fences(&self, fences: &[Handle]) -> Result<(), DeviceError> {
        let mut state = self.lock();
        self.record(&mut state, Call::WaitFences(fences.to_vec()));
        loop {
            let mut pending = false;
            for fence in fences {
                match state.fences.get(fence) {
                    Some(FenceState::Signaled) => {}
                    Some(FenceState::Pending) => pending = true,
                    Some(FenceState::Unsignaled) => {
                        panic!("waiting on fence {fence} that nothing will signal")
                    }
                    None => return Err(DeviceError::Backend(format!("unknown fence {fence}"))),
                }
            }
            if !pending {
                break;
            }
            state = self.changed.wait(state).unwrap();
        }
        self.record(&mut state, Call::WaitFencesDone(fences.to_vec()));
        Ok(())
    }

    fn reset_fences(&self, fences: &[Handle]) -> Result<(), DeviceError> {
        let mut state = self.lock();
        for fence in fences {
            let slot = state.fences.get_mut(fence).expect("unknown fence");
            assert_ne!(*slot, FenceState::Pending, "reset of in-flight fence {fence}");
            *slot = FenceState::Unsignaled;
        }
        self.record(&mut state, Call::ResetFences(fences.to_vec()));
        Ok(())
    }

    fn allocate_command_buffer(&self) -> Result<Handle, DeviceError> {
        let mut state = self.lock();
        let handle = state.alloc();
        state.command_buffers.insert(handle, false);
        Ok(handle)
    }

    unsafe fn free_command_buffer(&self, cmd: Handle) {
        assert!(self.lock().command_buffers.remove(&cmd).is_some());
    }

    fn begin_command_buffer(&self, cmd: Handle) -> Result<(), DeviceError> {
        let mut state = self.lock();
        state.command_buffers.insert(cmd, true);
        self.record(&mut state, Call::Begin(cmd));
        Ok(())
    }

    fn end_command_buffer(&self, cmd: Handle) -> Result<(), DeviceError> {
        let mut state = self.lock();
        state.command_buffers.insert(cmd, false);
        self.record(&mut state, Call::End(cmd));
        Ok(())
    }

    fn cmd_image_barrier(&self, cmd: Handle, barrier: &ImageBarrier<Handle>) {
        let mut state = self.lock();
        assert_eq!(state.command_buffers.get(&cmd), Some(&true), "cmd {cmd} not recording");
        self.record(
            &mut state,
            Call::Barrier {
                cmd,
                barrier: *barrier,
            },
        );
    }

    fn queue_submit(&self, submit: &QueueSubmit<'_, Self>) -> Result<(), DeviceError> {
        let mut state = self.lock();
        match state.submit_failure.take() {
            Some((0, err)) => return Err(err),
            Some((n, err)) => state.submit_failure = Some((n - 1, err)),
            None => {}
        }
        assert_eq!(submit.wait_stages.len(), submit.wait_semaphores.len());
        for cmd in submit.command_buffers {
            assert_eq!(state.command_buffers.get(cmd), Some(&false), "cmd {cmd} still recording");
        }
        if let Some(fence) = submit.fence {
            let hold = state.hold_fences;
            let slot = state.fences.get_mut(&fence).expect("unknown fence");
            assert_eq!(*slot, FenceState::Unsignaled, "submitted fence {fence} not reset");
            *slot = if hold {
                FenceState::Pending
            } else {
                FenceState::Signaled
            };
        }
        self.record(
            &mut state,
            Call::Submit {
                wait_stages: submit.wait_stages.to_vec(),
                wait: submit.wait_semaphores.to_vec(),
                signal: submit.signal_semaphores.to_vec(),
                cmds: submit.command_buffers.to_vec(),
                fence: submit.fence,
            },
        );
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), DeviceError> {
        let mut state = self.lock();
        for fence in state.fences.values_mut() {
            if *fence == FenceState::Pending {
                *fence = FenceState::Signaled;
            }
        }
        self.record(&mut state, Call::WaitIdle);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct FakeSurface {
    pub valid: bool,
    pub handle: Handle,
    pub capabilities: SurfaceCapabilities,
    pub capabilities_error: Option<DeviceError>,
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
    pub presentable: bool,
}

impl FakeSurface {
    /// Three images, 1280x720, two formats, FIFO only.
    pub fn standard() -> Self {
        Self {
            valid: true,
            handle: 0xface,
            capabilities: SurfaceCapabilities {
                min_image_count: 3,
                max_image_count: 8,
                current_extent: Extent2D::new(1280, 720),
                min_image_extent: Extent2D::new(1, 1),
                max_image_extent: Extent2D::new(4096, 4096),
            },
            capabilities_error: None,
            formats: vec![
                SurfaceFormat::new(ColorFormat::Bgra8Srgb, ColorSpace::SrgbNonlinear),
                SurfaceFormat::new(ColorFormat::Rgba8Unorm, ColorSpace::SrgbNonlinear),
            ],
            present_modes: vec![PresentMode::Fifo],
            presentable: true,
        }
    }

    pub fn with_image_count(mut self, count: u32) -> Self {
        self.capabilities.min_image_count = count;
        self
    }
}

impl PresentSurface for FakeSurface {
    type Handle = Handle;

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn raw_handle(&self) -> Handle {
        self.handle
    }
}

#[derive(Debug)]
pub struct FakeTarget {
    pub image: Handle,
    pub format: SurfaceFormat,
    pub size: Extent2D,
    pub layout: ImageLayout,
    pub drawing: bool,
}

impl RenderTarget for FakeTarget {
    fn backend_layout(&self) -> ImageLayout {
        self.layout
    }

    fn set_backend_layout(&mut self, layout: ImageLayout) {
        self.layout = layout;
    }

    fn prepare_for_present(&mut self) -> Result<(), RenderTargetError> {
        if self.drawing {
            Err(RenderTargetError::NotReady)
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct FakeTargetFactory {
    pub reject: Option<ColorFormat>,
}

impl RenderTargetFactory<Handle> for FakeTargetFactory {
    type Target = FakeTarget;

    fn wrap_image(
        &self,
        image: Handle,
        format: SurfaceFormat,
        size: Extent2D,
    ) -> Result<FakeTarget, RenderTargetError> {
        if self.reject == Some(format.format) {
            return Err(RenderTargetError::UnsupportedFormat(format.format));
        }
        Ok(FakeTarget {
            image,
            format,
            size,
            layout: ImageLayout::Undefined,
            drawing: false,
        })
    }
}

pub fn negotiate(device: &Arc<FakeDevice>, surface: &FakeSurface) -> Chain {
    Chain::negotiate(
        device,
        surface,
        &FakeTargetFactory::default(),
        &ChainConfig::default(),
        None,
    )
}
