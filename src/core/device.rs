//! The native seam of the crate. Everything that talks to the driver goes through [`DeviceBackend`].
//!
//! Two backends are provided:
//! - [`VulkanDevice`](crate::VulkanDevice) drives a real `VkDevice` through `ash`.
//! - [`HeadlessDevice`](crate::HeadlessDevice) fabricates handles and records every submission. It
//!   executes nothing, which makes it suitable for tests and as a null renderer.

use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ash::vk;

use crate::core::queue::QueueFamilyDescriptor;

/// One batch of work for [`DeviceBackend::queue_submit`]. `wait_semaphores` and `wait_stages` are
/// parallel arrays.
#[derive(Debug, Default, Clone, Copy)]
pub struct Submission<'a> {
    /// Semaphores the GPU waits on before executing `command_buffers`.
    pub wait_semaphores: &'a [vk::Semaphore],
    /// Stage at which each wait semaphore blocks execution.
    pub wait_stages: &'a [vk::PipelineStageFlags],
    /// Command buffers to execute, in order.
    pub command_buffers: &'a [vk::CommandBuffer],
    /// Semaphores signaled when every command buffer completed.
    pub signal_semaphores: &'a [vk::Semaphore],
}

/// Abstraction over the driver calls this crate needs. Handles are plain `ash::vk` handles, so
/// content recorded by collaborators can use them directly with the raw device returned by
/// [`DeviceBackend::ash_device`].
///
/// # Safety of handles
/// Functions that destroy objects are `unsafe`: the caller must guarantee the GPU is done with the
/// object and that no other thread uses it.
pub trait DeviceBackend: Debug + Send + Sync {
    /// Human readable name of the device.
    fn name(&self) -> &str;
    /// All queue families of the device, with the number of queues that were created for each.
    fn queue_families(&self) -> &[QueueFamilyDescriptor];
    /// Retrieve the native queue `index` of family `family`.
    fn get_device_queue(&self, family: u32, index: u32) -> Result<vk::Queue>;
    /// Format features of `format` for optimal tiling.
    fn format_features(&self, format: vk::Format) -> vk::FormatFeatureFlags;

    /// Create a command pool for the given queue family.
    fn create_command_pool(&self, family: u32, flags: vk::CommandPoolCreateFlags) -> Result<vk::CommandPool>;
    /// Destroy a command pool and every command buffer allocated from it.
    /// # Safety
    /// No command buffer from this pool may be pending execution.
    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool);
    /// Allocate one primary command buffer from `pool`.
    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> Result<vk::CommandBuffer>;
    /// Return a command buffer to its pool.
    /// # Safety
    /// The command buffer may not be pending execution, and `pool` must be externally synchronized.
    unsafe fn free_command_buffer(&self, pool: vk::CommandPool, cmd: vk::CommandBuffer);
    /// Begin recording.
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, flags: vk::CommandBufferUsageFlags) -> Result<()>;
    /// Finish recording.
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;
    /// Reset a command buffer to the initial state. Its pool must allow individual resets.
    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;

    /// Create a binary semaphore.
    fn create_semaphore(&self) -> Result<vk::Semaphore>;
    /// # Safety
    /// The semaphore may not be in use by a pending submission.
    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    /// Create a fence, possibly in the signaled state.
    fn create_fence(&self, signaled: bool) -> Result<vk::Fence>;
    /// # Safety
    /// The fence may not be in use by a pending submission.
    unsafe fn destroy_fence(&self, fence: vk::Fence);
    /// Block until the fence is signaled. Returns `false` if `timeout` elapsed first.
    fn wait_for_fence(&self, fence: vk::Fence, timeout: Duration) -> Result<bool>;
    /// Query the fence status without blocking.
    fn fence_status(&self, fence: vk::Fence) -> Result<bool>;
    /// Reset a fence to the unsignaled state.
    fn reset_fence(&self, fence: vk::Fence) -> Result<()>;

    /// Submit work to a queue. The queue must be externally synchronized, which is what
    /// [`QueueLease`](crate::QueueLease) guarantees.
    fn queue_submit(&self, queue: vk::Queue, submission: &Submission, fence: vk::Fence) -> Result<()>;
    /// Block until the whole device is idle. Only meant for teardown.
    fn wait_idle(&self) -> Result<()>;

    /// The raw `ash` device, if this backend is backed by a real driver.
    fn ash_device(&self) -> Option<&ash::Device> {
        None
    }
}

/// Cloneable handle to a device backend. Internal state is wrapped in an `Arc`, so this is cheap
/// to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct Device {
    inner: Arc<dyn DeviceBackend>,
}

impl Device {
    /// Wrap a backend into a device handle.
    pub fn new(backend: impl DeviceBackend + 'static) -> Self {
        Self {
            inner: Arc::new(backend),
        }
    }

    /// Wrap an already shared backend. Useful to keep a typed handle to the backend around, for
    /// example to inspect a [`HeadlessDevice`](crate::HeadlessDevice) in tests.
    pub fn from_arc(backend: Arc<dyn DeviceBackend>) -> Self {
        Self {
            inner: backend,
        }
    }
}

impl Deref for Device {
    type Target = dyn DeviceBackend;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

static_assertions::assert_impl_all!(Device: Send, Sync, Clone);
