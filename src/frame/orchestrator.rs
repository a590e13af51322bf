//! The [`FrameOrchestrator`] owns every pass of a frame and submits them in a fixed order, chaining
//! their semaphores.
//!
//! A frame is driven in three phases:
//! 1. [`FrameOrchestrator::update_cpu`] refreshes the camera, picks the shadow casting lights and lets
//!    each pass update its CPU-side state. Nothing touches the GPU.
//! 2. [`FrameOrchestrator::update_gpu`] lets the passes that will render this frame write their
//!    device-visible resources.
//! 3. [`FrameOrchestrator::render`] submits the stages in order: depth pre-pass (if enabled),
//!    background, environment maps, active shadow maps of every light type, opaque, then
//!    transparent. Each stage waits on the semaphore of the previous one. A stage without work is
//!    skipped and the semaphore passes through unchanged.
//!
//! # Example
//! ```
//! # use selene::*;
//! # use selene::frame::*;
//! # use selene::scene::*;
//! # use glam::Vec3;
//! # struct Empty;
//! # impl PassContent for Empty {
//! #     fn has_nodes(&self) -> bool { false }
//! #     fn record(&mut self, _cmd: &CommandRecorder) -> anyhow::Result<()> { Ok(()) }
//! # }
//! # fn main() -> anyhow::Result<()> {
//! let settings = RendererSettings::default();
//! let device = Device::new(HeadlessDevice::new());
//! let queues = DevicePool::new(device.clone(), &settings)?;
//! let mut frame = FrameOrchestrator::builder(&settings)
//!     .background(GeometryPass::new(PassKind::Background, "background", Empty))
//!     .opaque(GeometryPass::new(PassKind::Opaque, "opaque", Empty))
//!     .transparent(GeometryPass::new(PassKind::Transparent, "transparent", Empty))
//!     .build()?;
//! frame.initialise(&queues, &Intermediates {
//!     extent: vk::Extent2D { width: 800, height: 600 },
//!     color_format: vk::Format::R8G8B8A8_SRGB,
//!     depth_format: vk::Format::D32_SFLOAT,
//! })?;
//!
//! let mut camera = Camera::perspective(Vec3::ZERO, Vec3::NEG_Z, 1.0, 4.0 / 3.0, 0.1, 100.0);
//! let mut lights = LightCache::new();
//! frame.update_cpu(&mut CpuUpdater {
//!     camera: &mut camera,
//!     lights: &mut lights,
//!     frame_index: 0,
//!     elapsed: std::time::Duration::ZERO,
//! })?;
//! frame.update_gpu(&mut GpuUpdater { device: &device, frame_index: 0 })?;
//!
//! let mut info = RenderInfo::default();
//! let waits = SemaphoreToken::none();
//! // Nothing to draw, so the input token comes back unchanged.
//! assert_eq!(frame.render(&queues, &waits, &mut info)?, waits);
//! frame.cleanup()?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use ash::vk;

use crate::frame::pass::{CpuUpdater, GpuUpdater, Intermediates, PassKind, RenderPass};
use crate::frame::shadow::ShadowMap;
use crate::frame::shadow_preparer::{ActiveShadowMapSet, ShadowPreparer};
use crate::scene::LightType;
use crate::{Device, DevicePool, Error, RendererSettings, SemaphoreToken};

/// A stage that was submitted during [`FrameOrchestrator::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStage {
    pub kind: PassKind,
    pub name: String,
    /// Token the stage produced, which the next stage waited on.
    pub signal: SemaphoreToken,
}

/// What happened during the last [`FrameOrchestrator::render`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// Submitted stages, in submission order.
    pub executed: Vec<ExecutedStage>,
    /// Stages that had no work this frame.
    pub skipped: Vec<(PassKind, String)>,
}

impl RenderInfo {
    /// Number of semaphores signaled this frame, which equals the number of submissions.
    pub fn signal_count(&self) -> usize {
        self.executed.len()
    }

    /// Kinds of the submitted stages, in order.
    pub fn executed_kinds(&self) -> Vec<PassKind> {
        self.executed.iter().map(|stage| stage.kind).collect()
    }

    fn clear(&mut self) {
        self.executed.clear();
        self.skipped.clear();
    }
}

fn run_stage<P: RenderPass + ?Sized>(
    pass: &mut P,
    queues: &DevicePool,
    current: SemaphoreToken,
    info: &mut RenderInfo,
) -> Result<SemaphoreToken> {
    if !pass.has_nodes() {
        debug!("Skipping {:?} pass `{}`", pass.kind(), pass.name());
        info.skipped.push((pass.kind(), pass.name().to_owned()));
        return Ok(current);
    }
    let next = pass.render(queues, &current)?;
    debug!(
        "Submitted {:?} pass `{}`, waiting on {} semaphores",
        pass.kind(),
        pass.name(),
        current.handles().len()
    );
    info.executed.push(ExecutedStage {
        kind: pass.kind(),
        name: pass.name().to_owned(),
        signal: next.clone(),
    });
    Ok(next)
}

fn check_format(device: &Device, format: vk::Format, usage: vk::FormatFeatureFlags) -> Result<()> {
    if device.format_features(format).contains(usage) {
        Ok(())
    } else {
        Err(Error::UnsupportedFormat {
            format,
            usage,
        }
        .into())
    }
}

/// Collects the passes of a [`FrameOrchestrator`]. Background, opaque and transparent passes are
/// required, everything else is optional.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FrameOrchestratorBuilder {
    frames_in_flight: usize,
    depth_prepass_enabled: bool,
    #[derivative(Debug = "ignore")]
    depth_prepass: Option<Box<dyn RenderPass>>,
    #[derivative(Debug = "ignore")]
    background: Option<Box<dyn RenderPass>>,
    #[derivative(Debug = "ignore")]
    environment_maps: Vec<Box<dyn RenderPass>>,
    #[derivative(Debug = "ignore")]
    shadow_maps: [Vec<Box<dyn ShadowMap>>; 3],
    #[derivative(Debug = "ignore")]
    opaque: Option<Box<dyn RenderPass>>,
    #[derivative(Debug = "ignore")]
    transparent: Option<Box<dyn RenderPass>>,
}

impl FrameOrchestratorBuilder {
    /// Only used when [`RendererSettings::depth_prepass`] is set.
    pub fn depth_prepass(mut self, pass: impl RenderPass + 'static) -> Self {
        self.depth_prepass = Some(Box::new(pass));
        self
    }

    pub fn background(mut self, pass: impl RenderPass + 'static) -> Self {
        self.background = Some(Box::new(pass));
        self
    }

    /// Add an environment map. Environment maps render in the order they were added.
    pub fn environment_map(mut self, pass: impl RenderPass + 'static) -> Self {
        self.environment_maps.push(Box::new(pass));
        self
    }

    /// Add a shadow map for lights of [`ShadowMap::light_type`]. Maps of the same type are filled in
    /// the order they were added.
    pub fn shadow_map(mut self, map: impl ShadowMap + 'static) -> Self {
        let index = map.light_type().index();
        self.shadow_maps[index].push(Box::new(map));
        self
    }

    pub fn opaque(mut self, pass: impl RenderPass + 'static) -> Self {
        self.opaque = Some(Box::new(pass));
        self
    }

    pub fn transparent(mut self, pass: impl RenderPass + 'static) -> Self {
        self.transparent = Some(Box::new(pass));
        self
    }

    /// # Errors
    /// * [`Error::MissingPass`] if the background, opaque or transparent pass was not given.
    pub fn build(self) -> Result<FrameOrchestrator> {
        let depth_prepass = match (self.depth_prepass_enabled, self.depth_prepass) {
            (true, Some(pass)) => Some(pass),
            (true, None) => {
                warn!("Depth pre-pass enabled in settings, but no depth pre-pass was given");
                None
            }
            (false, _) => None,
        };
        Ok(FrameOrchestrator {
            frames_in_flight: self.frames_in_flight,
            depth_prepass,
            background: self.background.ok_or(Error::MissingPass("background"))?,
            environment_maps: self.environment_maps,
            shadow_maps: self.shadow_maps,
            opaque: self.opaque.ok_or(Error::MissingPass("opaque"))?,
            transparent: self.transparent.ok_or(Error::MissingPass("transparent"))?,
            preparer: ShadowPreparer::new(),
            active_shadows: ActiveShadowMapSet::default(),
            device: None,
        })
    }
}

/// Owns the passes of a frame and submits them in order. See the [module documentation](self).
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FrameOrchestrator {
    frames_in_flight: usize,
    #[derivative(Debug = "ignore")]
    depth_prepass: Option<Box<dyn RenderPass>>,
    #[derivative(Debug = "ignore")]
    background: Box<dyn RenderPass>,
    #[derivative(Debug = "ignore")]
    environment_maps: Vec<Box<dyn RenderPass>>,
    #[derivative(Debug = "ignore")]
    shadow_maps: [Vec<Box<dyn ShadowMap>>; 3],
    #[derivative(Debug = "ignore")]
    opaque: Box<dyn RenderPass>,
    #[derivative(Debug = "ignore")]
    transparent: Box<dyn RenderPass>,
    preparer: ShadowPreparer,
    active_shadows: ActiveShadowMapSet,
    /// Set between `initialise` and `cleanup`.
    #[derivative(Debug = "ignore")]
    device: Option<Device>,
}

impl FrameOrchestrator {
    pub fn builder(settings: &RendererSettings) -> FrameOrchestratorBuilder {
        FrameOrchestratorBuilder {
            frames_in_flight: settings.frames_in_flight.max(1),
            depth_prepass_enabled: settings.depth_prepass,
            depth_prepass: None,
            background: None,
            environment_maps: Vec::new(),
            shadow_maps: Default::default(),
            opaque: None,
            transparent: None,
        }
    }

    /// Whether [`initialise`](Self::initialise) succeeded and [`cleanup`](Self::cleanup) was not called since.
    pub fn is_initialised(&self) -> bool {
        self.device.is_some()
    }

    pub fn has_depth_prepass(&self) -> bool {
        self.depth_prepass.is_some()
    }

    /// Shadow maps selected by the last CPU update.
    pub fn active_shadow_maps(&self) -> &ActiveShadowMapSet {
        &self.active_shadows
    }

    fn passes_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn RenderPass>> {
        self.depth_prepass
            .iter_mut()
            .chain(std::iter::once(&mut self.background))
            .chain(self.environment_maps.iter_mut())
            .chain(std::iter::once(&mut self.opaque))
            .chain(std::iter::once(&mut self.transparent))
    }

    /// Create the GPU objects of every pass.
    /// # Errors
    /// * [`Error::UnsupportedFormat`] if the colour format cannot be rendered to, or the depth format
    ///   cannot be used as a depth attachment.
    /// * Any error from initialising a pass. These are fatal.
    pub fn initialise(&mut self, queues: &DevicePool, intermediates: &Intermediates) -> Result<()> {
        if self.is_initialised() {
            debug!("Frame orchestrator already initialised");
            return Ok(());
        }
        let device = queues.device();
        check_format(device, intermediates.color_format, vk::FormatFeatureFlags::COLOR_ATTACHMENT)?;
        check_format(device, intermediates.depth_format, vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)?;

        let frames_in_flight = self.frames_in_flight;
        for pass in self.passes_mut() {
            pass.initialise(queues, intermediates, frames_in_flight)?;
        }
        for map in self.shadow_maps.iter_mut().flatten() {
            map.initialise(queues, intermediates, frames_in_flight)?;
        }
        info!(
            "Initialised frame orchestrator: {}x{}, {} frames in flight, {} environment maps, {} shadow maps",
            intermediates.extent.width,
            intermediates.extent.height,
            frames_in_flight,
            self.environment_maps.len(),
            self.shadow_maps.iter().map(Vec::len).sum::<usize>()
        );
        self.device = Some(device.clone());
        Ok(())
    }

    /// Wait for the device to go idle, then destroy the GPU objects of every pass. The orchestrator
    /// can be initialised again afterwards.
    pub fn cleanup(&mut self) -> Result<()> {
        let Some(device) = self.device.take() else {
            return Ok(());
        };
        device.wait_idle()?;
        for pass in self.passes_mut() {
            pass.cleanup();
        }
        for map in self.shadow_maps.iter_mut().flatten() {
            map.cleanup();
        }
        self.active_shadows = ActiveShadowMapSet::default();
        Ok(())
    }

    /// Update camera matrices, select this frame's shadow casting lights and update the CPU-side
    /// state of every pass. Writes the shadow binding of every light in `updater.lights`.
    pub fn update_cpu(&mut self, updater: &mut CpuUpdater) -> Result<()> {
        updater.camera.update();
        self.active_shadows = self.preparer.prepare(updater.lights, updater.camera, &mut self.shadow_maps)?;
        trace!(
            "Frame {}: {} active shadow maps for {} lights",
            updater.frame_index,
            self.active_shadows.len(),
            self.active_shadows.light_count()
        );
        for pass in self.passes_mut() {
            pass.update_cpu(updater)?;
        }
        Ok(())
    }

    /// Push the GPU-side updates of the active shadow maps and of every other pass, empty or not.
    /// Does nothing before [`initialise`](Self::initialise).
    pub fn update_gpu(&mut self, updater: &mut GpuUpdater) -> Result<()> {
        if !self.is_initialised() {
            trace!("Skipping GPU update, frame orchestrator not initialised");
            return Ok(());
        }
        for (ty, active) in self.active_shadows.iter() {
            self.shadow_maps[ty.index()][active.map_index].update_gpu(updater)?;
        }
        for pass in self.passes_mut() {
            pass.update_gpu(updater)?;
        }
        Ok(())
    }

    /// Submit every stage of the frame, starting from `waits`, and return the token the presentation
    /// layer must wait on. `info` is overwritten with the executed and skipped stages.
    /// # Errors
    /// * [`Error::NotInitialised`] if called before [`initialise`](Self::initialise).
    pub fn render(&mut self, queues: &DevicePool, waits: &SemaphoreToken, info: &mut RenderInfo) -> Result<SemaphoreToken> {
        if !self.is_initialised() {
            return Err(Error::NotInitialised("frame orchestrator").into());
        }
        info.clear();
        let mut current = waits.clone();

        if let Some(pass) = self.depth_prepass.as_mut() {
            current = run_stage(pass.as_mut(), queues, current, info)?;
        }
        current = run_stage(self.background.as_mut(), queues, current, info)?;
        for pass in &mut self.environment_maps {
            current = run_stage(pass.as_mut(), queues, current, info)?;
        }
        for ty in LightType::ALL {
            for active in self.active_shadows.get(ty) {
                let map = &mut self.shadow_maps[ty.index()][active.map_index];
                current = run_stage(map.as_mut(), queues, current, info)?;
            }
        }
        current = run_stage(self.opaque.as_mut(), queues, current, info)?;
        current = run_stage(self.transparent.as_mut(), queues, current, info)?;
        Ok(current)
    }
}

impl Drop for FrameOrchestrator {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            error!("Failed to clean up frame orchestrator: {e}");
        }
    }
}
