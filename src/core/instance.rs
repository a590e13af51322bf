//! The Vulkan instance, created once per process before any device.

use std::ffi::CString;
use std::ops::Deref;

use anyhow::Result;
use ash::vk;

use crate::util::string::unwrap_to_raw_strings;
use crate::{Error, RendererSettings};

const ENGINE_NAME: &str = "selene";
const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Loaded Vulkan library and instance. Physical device selection and the [`DebugMessenger`](crate::DebugMessenger)
/// are created from this.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Instance {
    #[derivative(Debug = "ignore")]
    entry: ash::Entry,
    #[derivative(Debug = "ignore")]
    instance: ash::Instance,
    validation: bool,
}

impl Instance {
    /// Load the Vulkan library and create an instance targeting Vulkan 1.2.
    /// # Errors
    /// * [`Error::LoadFailed`](crate::Error::LoadFailed) if no Vulkan loader was found.
    /// * A Vulkan error if validation was requested but the layer is not installed.
    pub fn new(settings: &RendererSettings) -> Result<Self> {
        let entry = unsafe { ash::Entry::load().map_err(Error::from)? };
        let app_name = CString::new(settings.name.as_str())?;
        let engine_name = CString::new(ENGINE_NAME)?;
        let (major, minor, patch) = settings.version;
        let app_info = vk::ApplicationInfo::builder()
            .api_version(vk::API_VERSION_1_2)
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0));

        let (layers, extensions) = if settings.enable_validation {
            (vec![CString::new(VALIDATION_LAYER)?], vec![ash::extensions::ext::DebugUtils::name().to_owned()])
        } else {
            (Vec::new(), Vec::new())
        };
        let layer_names = unwrap_to_raw_strings(&layers);
        let extension_names = unwrap_to_raw_strings(&extensions);
        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            "Created Vulkan instance for `{}` (validation {})",
            settings.name,
            if settings.enable_validation { "on" } else { "off" }
        );
        #[cfg(feature = "log-objects")]
        trace!("Created new VkInstance {:p}", instance.handle());
        Ok(Self {
            entry,
            instance,
            validation: settings.enable_validation,
        })
    }

    /// Whether the validation layer and debug utils extension are enabled.
    pub fn validation_enabled(&self) -> bool {
        self.validation
    }

    /// Get unsafe access to the vulkan entry point.
    /// # Safety
    /// Any vulkan calls that modify the system's state may put the system in an undefined state.
    pub unsafe fn loader(&self) -> &ash::Entry {
        &self.entry
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkInstance {:p}", self.instance.handle());
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

impl Deref for Instance {
    type Target = ash::Instance;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}
