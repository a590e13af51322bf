use ash::vk;

use anyhow::Result;

use crate::Device;

/// Owned `VkCommandPool` for one queue family. Destroyed when dropped.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CommandPool {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::CommandPool,
    family_index: u32,
}

impl CommandPool {
    /// Create a new command pool for the given queue family.
    pub fn new(device: Device, family_index: u32, flags: vk::CommandPoolCreateFlags) -> Result<Self> {
        let handle = device.create_command_pool(family_index, flags)?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkCommandPool {handle:p} for family {family_index}");
        Ok(CommandPool {
            device,
            handle,
            family_index,
        })
    }

    /// Get unsafe access to the underlying `VkCommandPool` handle.
    /// # Safety
    /// The pool must be externally synchronized. Only the thread owning the queue record (or the pass) that owns
    /// this pool may allocate from it.
    pub unsafe fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    /// Queue family this pool allocates for.
    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    /// The device this pool was created on.
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkCommandPool {:p}", self.handle);
        unsafe {
            self.device.destroy_command_pool(self.handle);
        }
    }
}
