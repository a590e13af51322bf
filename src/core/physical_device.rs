use std::ffi::CStr;

use anyhow::Result;
use ash::vk;

use crate::core::queue::QueueFamilyDescriptor;
use crate::{Error, Instance, RendererSettings};

/// A physical device abstracts away an actual device, like a graphics card or integrated graphics card.
#[derive(Default, Debug)]
pub struct PhysicalDevice {
    /// Handle to the [`VkPhysicalDevice`](vk::PhysicalDevice).
    handle: vk::PhysicalDevice,
    /// [`VkPhysicalDeviceProperties`](vk::PhysicalDeviceProperties) structure with properties of this physical device.
    properties: vk::PhysicalDeviceProperties,
    /// Device name, decoded from `properties`.
    name: String,
    /// List of [`VkQueueFamilyProperties`](vk::QueueFamilyProperties) with properties of each queue family on the device.
    queue_families: Vec<vk::QueueFamilyProperties>,
}

impl PhysicalDevice {
    /// Selects the first physical device matching the settings.
    pub fn select(instance: &Instance, settings: &RendererSettings) -> Result<Self> {
        let devices = unsafe { instance.enumerate_physical_devices()? };
        if devices.is_empty() {
            return Err(anyhow::Error::from(Error::NoGPU));
        }

        devices
            .iter()
            .find_map(|device| -> Option<PhysicalDevice> {
                let properties = unsafe { instance.get_physical_device_properties(*device) };
                if settings.dedicated && properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU {
                    return None;
                }
                let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned();
                let physical_device = PhysicalDevice {
                    handle: *device,
                    properties,
                    name,
                    queue_families: unsafe { instance.get_physical_device_queue_family_properties(*device) },
                };
                info!(
                    "Picked physical device {:?}, driver version {:?}.",
                    physical_device.name, physical_device.properties.driver_version
                );
                Some(physical_device)
            })
            .ok_or(anyhow::Error::from(Error::NoGPU))
    }

    /// All queue families of this device that expose at least one queue.
    pub fn queue_families(&self) -> Vec<QueueFamilyDescriptor> {
        self.queue_families
            .iter()
            .enumerate()
            .filter(|(_, family)| family.queue_count > 0)
            .map(|(index, family)| QueueFamilyDescriptor {
                family_index: index as u32,
                flags: family.queue_flags,
                queue_count: family.queue_count,
            })
            .collect()
    }

    /// Get unsafe access to the physical device handle
    /// # Safety
    /// The handle is owned by the instance and may not be used after it was destroyed.
    pub unsafe fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    /// Device properties.
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
