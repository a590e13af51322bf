//! The [`DeviceBackend`] implementation that drives a real `VkDevice` through `ash`.

use std::time::Duration;

use anyhow::Result;
use ash::vk;

use crate::core::device::{DeviceBackend, Submission};
use crate::core::queue::QueueFamilyDescriptor;
use crate::{Error, Instance, PhysicalDevice};

fn timeout_ns(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

/// Wrapper around a `VkDevice`. Every queue of every queue family is created, so that each family
/// can be fully owned by a [`QueueFamilyPool`](crate::QueueFamilyPool).
///
/// The [`Instance`] this device was created from must outlive it.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VulkanDevice {
    #[derivative(Debug = "ignore")]
    handle: ash::Device,
    #[derivative(Debug = "ignore")]
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    name: String,
    families: Vec<QueueFamilyDescriptor>,
}

impl VulkanDevice {
    /// Create a new Vulkan device on the selected physical device.
    pub fn new(instance: &Instance, physical_device: &PhysicalDevice) -> Result<Self> {
        let families = physical_device.queue_families();
        let max_count = families.iter().map(|family| family.queue_count).max().unwrap_or(0);
        let priorities = vec![1.0f32; max_count as usize];
        let queue_create_infos = families
            .iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family.family_index)
                    .queue_priorities(&priorities[..family.queue_count as usize])
                    .build()
            })
            .collect::<Vec<_>>();
        if queue_create_infos.is_empty() {
            return Err(Error::NoQueueFamilies.into());
        }

        let info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(queue_create_infos.as_slice())
            .build();
        // SAFETY: Vulkan API call. The physical device handle comes from this instance.
        let handle = unsafe { instance.create_device(physical_device.handle(), &info, None)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkDevice {:p}", handle.handle());

        info!("Created device {} with queue families:", physical_device.name());
        for family in &families {
            info!(
                "Family #{} supports {:?} ({} queues)",
                family.family_index, family.flags, family.queue_count
            );
        }

        Ok(Self {
            handle,
            instance: (**instance).clone(),
            physical_device: unsafe { physical_device.handle() },
            name: physical_device.name().to_owned(),
            families,
        })
    }
}

impl DeviceBackend for VulkanDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn queue_families(&self) -> &[QueueFamilyDescriptor] {
        self.families.as_slice()
    }

    fn get_device_queue(&self, family: u32, index: u32) -> Result<vk::Queue> {
        let known = self
            .families
            .iter()
            .any(|f| f.family_index == family && index < f.queue_count);
        if !known {
            return Err(Error::VkError(vk::Result::ERROR_INITIALIZATION_FAILED).into());
        }
        Ok(unsafe { self.handle.get_device_queue(family, index) })
    }

    fn format_features(&self, format: vk::Format) -> vk::FormatFeatureFlags {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
                .optimal_tiling_features
        }
    }

    fn create_command_pool(&self, family: u32, flags: vk::CommandPoolCreateFlags) -> Result<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(family)
            .build();
        Ok(unsafe { self.handle.create_command_pool(&info, None)? })
    }

    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.handle.destroy_command_pool(pool, None);
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> Result<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1)
            .build();
        unsafe { self.handle.allocate_command_buffers(&info)? }
            .into_iter()
            .next()
            .ok_or_else(|| Error::Uncategorized("Command buffer allocation failed.").into())
    }

    unsafe fn free_command_buffer(&self, pool: vk::CommandPool, cmd: vk::CommandBuffer) {
        self.handle.free_command_buffers(pool, std::slice::from_ref(&cmd));
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, flags: vk::CommandBufferUsageFlags) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::builder().flags(flags).build();
        Ok(unsafe { self.handle.begin_command_buffer(cmd, &info)? })
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        Ok(unsafe { self.handle.end_command_buffer(cmd)? })
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        Ok(unsafe { self.handle.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())? })
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::default();
        Ok(unsafe { self.handle.create_semaphore(&info, None)? })
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.handle.destroy_semaphore(semaphore, None);
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let info = vk::FenceCreateInfo::builder()
            .flags(if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            })
            .build();
        Ok(unsafe { self.handle.create_fence(&info, None)? })
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        self.handle.destroy_fence(fence, None);
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: Duration) -> Result<bool> {
        match unsafe { self.handle.wait_for_fences(std::slice::from_ref(&fence), true, timeout_ns(timeout)) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(Error::from(e).into()),
        }
    }

    fn fence_status(&self, fence: vk::Fence) -> Result<bool> {
        Ok(unsafe { self.handle.get_fence_status(fence)? })
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        Ok(unsafe { self.handle.reset_fences(std::slice::from_ref(&fence))? })
    }

    fn queue_submit(&self, queue: vk::Queue, submission: &Submission, fence: vk::Fence) -> Result<()> {
        let info = vk::SubmitInfo::builder()
            .wait_semaphores(submission.wait_semaphores)
            .wait_dst_stage_mask(submission.wait_stages)
            .command_buffers(submission.command_buffers)
            .signal_semaphores(submission.signal_semaphores)
            .build();
        Ok(unsafe { self.handle.queue_submit(queue, std::slice::from_ref(&info), fence)? })
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(unsafe { self.handle.device_wait_idle()? })
    }

    fn ash_device(&self) -> Option<&ash::Device> {
        Some(&self.handle)
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDevice {:p}", self.handle.handle());
        unsafe {
            self.handle.destroy_device(None);
        }
    }
}
