#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use ash::vk;
use glam::Vec3;

use selene::frame::{CpuUpdater, GpuUpdater, Intermediates, PassContent, ShadowContent};
use selene::scene::{Camera, Light, LightId};
use selene::{CommandRecorder, Device, DevicePool, HeadlessDevice, QueueFamilyDescriptor, RendererSettings, SettingsBuilder};

#[derive(Clone, Debug)]
pub struct Context {
    pub headless: Arc<HeadlessDevice>,
    pub device: Device,
    pub queues: Arc<DevicePool>,
    pub settings: RendererSettings,
}

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// Creates a headless selene context ready for automated tests
pub fn make_context() -> Result<Context> {
    make_context_with(HeadlessDevice::new(), test_settings())
}

/// Create a headless context on a device with the given queue families
pub fn make_context_with_families(families: impl Into<Vec<QueueFamilyDescriptor>>) -> Result<Context> {
    make_context_with(HeadlessDevice::new().with_families(families), test_settings())
}

pub fn make_context_with(headless: HeadlessDevice, settings: RendererSettings) -> Result<Context> {
    init_logging();
    let headless = Arc::new(headless);
    let device = Device::from_arc(headless.clone());
    let queues = Arc::new(DevicePool::new(device.clone(), &settings)?);
    Ok(Context {
        headless,
        device,
        queues,
        settings,
    })
}

pub fn test_settings() -> RendererSettings {
    SettingsBuilder::new()
        .name("selene test framework")
        .version((0, 0, 1))
        .validation(false)
        .build()
}

pub fn family(family_index: u32, flags: vk::QueueFlags, queue_count: u32) -> QueueFamilyDescriptor {
    QueueFamilyDescriptor {
        family_index,
        flags,
        queue_count,
    }
}

pub fn intermediates() -> Intermediates {
    Intermediates {
        extent: vk::Extent2D {
            width: 1280,
            height: 720,
        },
        color_format: vk::Format::R8G8B8A8_SRGB,
        depth_format: vk::Format::D32_SFLOAT,
    }
}

/// Camera at the origin looking down -Z.
pub fn camera() -> Camera {
    Camera::perspective(Vec3::ZERO, Vec3::NEG_Z, std::f32::consts::FRAC_PI_2, 16.0 / 9.0, 0.1, 100.0)
}

/// Directional light whose scene node sits `distance` units in front of the camera.
pub fn directional(id: u32, distance: f32) -> Light {
    Light::directional(LightId(id), Vec3::new(0.0, 0.0, -distance), Vec3::NEG_Y)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Calls {
    pub initialise: usize,
    pub cleanup: usize,
    pub update_cpu: usize,
    pub update_gpu: usize,
    pub record: usize,
}

/// Pass content that counts how often it is called
#[derive(Debug, Clone)]
pub struct CountingContent {
    pub nodes: bool,
    pub calls: Arc<Mutex<Calls>>,
}

impl CountingContent {
    pub fn new(nodes: bool) -> Self {
        Self {
            nodes,
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    pub fn calls(&self) -> Calls {
        self.calls.lock().unwrap().clone()
    }
}

impl PassContent for CountingContent {
    fn has_nodes(&self) -> bool {
        self.nodes
    }

    fn initialise(&mut self, _device: &Device, _intermediates: &Intermediates) -> Result<()> {
        self.calls.lock().unwrap().initialise += 1;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.calls.lock().unwrap().cleanup += 1;
    }

    fn update_cpu(&mut self, _updater: &mut CpuUpdater) -> Result<()> {
        self.calls.lock().unwrap().update_cpu += 1;
        Ok(())
    }

    fn update_gpu(&mut self, _updater: &mut GpuUpdater) -> Result<()> {
        self.calls.lock().unwrap().update_gpu += 1;
        Ok(())
    }

    fn record(&mut self, _cmd: &CommandRecorder) -> Result<()> {
        self.calls.lock().unwrap().record += 1;
        Ok(())
    }
}

/// Shadow content that remembers which lights it was given
#[derive(Debug, Clone, Default)]
pub struct RecordingShadows {
    pub lights: Arc<Mutex<Vec<(LightId, u32)>>>,
    pub records: Arc<Mutex<Vec<Vec<u32>>>>,
    pub gpu_updates: Arc<Mutex<usize>>,
}

impl RecordingShadows {
    pub fn lights(&self) -> Vec<(LightId, u32)> {
        self.lights.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<Vec<u32>> {
        self.records.lock().unwrap().clone()
    }

    pub fn gpu_updates(&self) -> usize {
        *self.gpu_updates.lock().unwrap()
    }
}

impl ShadowContent for RecordingShadows {
    fn update_light(&mut self, _camera: &Camera, light: &Light, slot: u32) -> Result<()> {
        self.lights.lock().unwrap().push((light.id(), slot));
        Ok(())
    }

    fn update_gpu(&mut self, _updater: &mut GpuUpdater, _slots: &[u32]) -> Result<()> {
        *self.gpu_updates.lock().unwrap() += 1;
        Ok(())
    }

    fn record(&mut self, _cmd: &CommandRecorder, slots: &[u32]) -> Result<()> {
        self.records.lock().unwrap().push(slots.to_vec());
        Ok(())
    }
}
