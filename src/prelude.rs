pub use ash::vk;

pub use crate::core::app_info::*;
pub use crate::core::debug::DebugMessenger;
pub use crate::core::device::{Device, DeviceBackend, Submission};
pub use crate::core::device_pool::{DevicePool, QueueAccess};
pub use crate::core::error::Error;
pub use crate::core::headless::{HeadlessDevice, SubmissionRecord};
pub use crate::core::init::*;
pub use crate::core::instance::Instance;
pub use crate::core::lease::QueueLease;
pub use crate::core::physical_device::PhysicalDevice;
pub use crate::core::queue::{QueueFamilyDescriptor, QueueFamilyPool, QueueRecord, QueueType};
pub use crate::core::vulkan::VulkanDevice;

pub use crate::sync::fence::*;
pub use crate::sync::semaphore::*;
pub use crate::sync::token::*;

pub use crate::command_buffer::{CommandPool, CommandRecorder};

pub use crate::frame::{FrameOrchestrator, RenderInfo};
