use anyhow::Result;
use ash::vk;

use crate::Device;

/// Wrapper around a [`VkSemaphore`](vk::Semaphore) object. Semaphores are used for GPU-GPU sync.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Semaphore {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::Semaphore,
}

impl Semaphore {
    /// Create a new `VkSemaphore` object.
    pub fn new(device: Device) -> Result<Self> {
        let handle = device.create_semaphore()?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkSemaphore {handle:p}");
        Ok(Semaphore {
            device,
            handle,
        })
    }

    /// Get unsafe access to the underlying `VkSemaphore` handle.
    /// # Safety
    /// The handle is only valid while `self` is alive.
    pub unsafe fn handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkSemaphore {:p}", self.handle);
        unsafe {
            self.device.destroy_semaphore(self.handle);
        }
    }
}
