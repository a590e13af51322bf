use ash::vk;

use anyhow::Result;

use crate::command_buffer::CommandPool;
use crate::Device;

/// A primary command buffer being recorded. Freed back to its pool on drop, so it may not outlive
/// the pool it was allocated from.
///
/// Actual commands are recorded by collaborators through the raw device in
/// [`DeviceBackend::ash_device`](crate::DeviceBackend::ash_device) and [`CommandRecorder::handle`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CommandRecorder<'p> {
    #[derivative(Debug = "ignore")]
    pool: Option<&'p CommandPool>,
    device: Device,
    handle: vk::CommandBuffer,
}

impl<'p> CommandRecorder<'p> {
    /// Allocate a new command buffer from `pool`. The buffer is freed when the recorder is dropped.
    pub fn allocate(pool: &'p CommandPool) -> Result<Self> {
        let device = pool.device().clone();
        let handle = device.allocate_command_buffer(unsafe { pool.handle() })?;
        Ok(Self {
            pool: Some(pool),
            device,
            handle,
        })
    }

    /// Wrap a command buffer whose lifetime is managed elsewhere. Dropping the recorder does not free it.
    pub fn borrowed(device: Device, handle: vk::CommandBuffer) -> Self {
        Self {
            pool: None,
            device,
            handle,
        }
    }

    /// Start recording.
    pub fn begin(&self, flags: vk::CommandBufferUsageFlags) -> Result<()> {
        self.device.begin_command_buffer(self.handle, flags)
    }

    /// Finish recording. The command buffer can be submitted afterwards.
    pub fn end(&self) -> Result<()> {
        self.device.end_command_buffer(self.handle)
    }

    /// Get unsafe access to the underlying `VkCommandBuffer`.
    /// # Safety
    /// Do not free or reset the command buffer through this handle.
    pub unsafe fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    /// The device this command buffer belongs to.
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Drop for CommandRecorder<'_> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool {
            unsafe {
                self.device.free_command_buffer(pool.handle(), self.handle);
            }
        }
    }
}
