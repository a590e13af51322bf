//! Exposes methods to make initialization of the library easier without losing flexibility.

use anyhow::Result;

use crate::{DebugMessenger, Device, DevicePool, Instance, PhysicalDevice, RendererSettings, VulkanDevice};

/// Struct that contains all common selene resources to be used at initialization.
///
/// Destructure it into separate bindings, so that the instance is dropped last.
pub type Selene = (Instance, PhysicalDevice, Device, DevicePool, Option<DebugMessenger>);

/// Initialize the Vulkan context: instance, physical device, logical device with all of its queues,
/// and the queue pools. A debug messenger is only created if validation is enabled.
pub fn initialize(settings: &RendererSettings) -> Result<Selene> {
    let instance = Instance::new(settings)?;
    let debug_messenger = if instance.validation_enabled() {
        Some(DebugMessenger::new(&instance)?)
    } else {
        None
    };

    let physical_device = PhysicalDevice::select(&instance, settings)?;
    let device = Device::new(VulkanDevice::new(&instance, &physical_device)?);
    let queues = DevicePool::new(device.clone(), settings)?;

    Ok((instance, physical_device, device, queues, debug_messenger))
}
