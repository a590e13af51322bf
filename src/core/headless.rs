//! A [`DeviceBackend`] that executes nothing.
//!
//! [`HeadlessDevice`] hands out unique fake handles, signals fences as soon as work is submitted and
//! records every submission. It is used by the test suite, and can serve as a null renderer when no
//! GPU is available.
//!
//! The backend also watches for misuse of the queue ownership protocol: if two threads are ever
//! inside `queue_submit` on the same queue at the same time, this is counted as an exclusivity
//! violation (see [`HeadlessDevice::exclusivity_violations`]).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread::ThreadId;
use std::time::Duration;

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;

use crate::core::device::{DeviceBackend, Submission};
use crate::core::queue::QueueFamilyDescriptor;
use crate::Error;

/// One call to `queue_submit` as observed by the headless backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    /// Queue the work was submitted to.
    pub queue: vk::Queue,
    /// Semaphores the submission waited on.
    pub wait_semaphores: Vec<vk::Semaphore>,
    /// Wait stage for each wait semaphore.
    pub wait_stages: Vec<vk::PipelineStageFlags>,
    /// Submitted command buffers.
    pub command_buffers: Vec<vk::CommandBuffer>,
    /// Semaphores signaled by the submission.
    pub signal_semaphores: Vec<vk::Semaphore>,
    /// Fence signaled by the submission, or a null handle.
    pub fence: vk::Fence,
    /// Thread that submitted.
    pub thread: ThreadId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CommandBufferState {
    Initial,
    Recording,
    Executable,
}

#[derive(Debug, Default)]
struct HeadlessState {
    submissions: Vec<SubmissionRecord>,
    fences: HashMap<vk::Fence, bool>,
    command_pools: HashSet<vk::CommandPool>,
    command_buffers: HashMap<vk::CommandBuffer, CommandBufferState>,
    semaphores: HashSet<vk::Semaphore>,
    submitting: HashSet<vk::Queue>,
}

const SUPPORTED_FORMAT_FEATURES: vk::FormatFeatureFlags = vk::FormatFeatureFlags::from_raw(
    vk::FormatFeatureFlags::COLOR_ATTACHMENT.as_raw()
        | vk::FormatFeatureFlags::COLOR_ATTACHMENT_BLEND.as_raw()
        | vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT.as_raw()
        | vk::FormatFeatureFlags::SAMPLED_IMAGE.as_raw()
        | vk::FormatFeatureFlags::TRANSFER_SRC.as_raw()
        | vk::FormatFeatureFlags::TRANSFER_DST.as_raw(),
);

/// Recording software device. See the [module documentation](self).
#[derive(Derivative)]
#[derivative(Debug)]
pub struct HeadlessDevice {
    families: Vec<QueueFamilyDescriptor>,
    unsupported_formats: HashSet<vk::Format>,
    failing_families: HashSet<u32>,
    stalled: bool,
    submit_delay: Duration,
    failing_submits: AtomicUsize,
    next_handle: AtomicU64,
    violations: AtomicUsize,
    wait_idle_calls: AtomicUsize,
    #[derivative(Debug = "ignore")]
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// A device with one graphics family (two queues) and one dedicated transfer family (one queue).
    pub fn new() -> Self {
        Self {
            families: vec![
                QueueFamilyDescriptor {
                    family_index: 0,
                    flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                    queue_count: 2,
                },
                QueueFamilyDescriptor {
                    family_index: 1,
                    flags: vk::QueueFlags::TRANSFER,
                    queue_count: 1,
                },
            ],
            unsupported_formats: HashSet::new(),
            failing_families: HashSet::new(),
            stalled: false,
            submit_delay: Duration::ZERO,
            failing_submits: AtomicUsize::new(0),
            next_handle: AtomicU64::new(1),
            violations: AtomicUsize::new(0),
            wait_idle_calls: AtomicUsize::new(0),
            state: Mutex::new(HeadlessState::default()),
        }
    }

    /// Replace the queue family table.
    pub fn with_families(mut self, families: impl Into<Vec<QueueFamilyDescriptor>>) -> Self {
        self.families = families.into();
        self
    }

    /// Report no format features at all for `format`.
    pub fn with_unsupported_format(mut self, format: vk::Format) -> Self {
        self.unsupported_formats.insert(format);
        self
    }

    /// Make command pool creation fail for the given family.
    pub fn with_failing_family(mut self, family: u32) -> Self {
        self.failing_families.insert(family);
        self
    }

    /// Never signal fences on submission, as if the GPU hung.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    /// Sleep inside every `queue_submit`, to widen the window in which concurrent use of a queue would be observed.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    /// Make the next `count` calls to `queue_submit` fail with `ERROR_DEVICE_LOST` without running
    /// or recording anything.
    pub fn fail_next_submits(&self, count: usize) {
        self.failing_submits.store(count, Ordering::SeqCst);
    }

    fn next<H: Handle>(&self) -> H {
        H::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn lock(&self) -> Result<MutexGuard<HeadlessState>> {
        Ok(self.state.lock().map_err(|_| Error::PoisonError)?)
    }

    /// Every submission so far, in submission order.
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.lock().map(|state| state.submissions.clone()).unwrap_or_default()
    }

    /// Forget all recorded submissions.
    pub fn clear_submissions(&self) {
        if let Ok(mut state) = self.lock() {
            state.submissions.clear();
        }
    }

    /// Number of times two threads submitted to the same queue at once.
    pub fn exclusivity_violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }

    /// Number of calls to [`DeviceBackend::wait_idle`].
    pub fn wait_idle_calls(&self) -> usize {
        self.wait_idle_calls.load(Ordering::SeqCst)
    }

    /// Number of command pools that were created and not yet destroyed.
    pub fn live_command_pools(&self) -> usize {
        self.lock().map(|state| state.command_pools.len()).unwrap_or_default()
    }

    /// Number of semaphores that were created and not yet destroyed.
    pub fn live_semaphores(&self) -> usize {
        self.lock().map(|state| state.semaphores.len()).unwrap_or_default()
    }

    /// Number of fences that were created and not yet destroyed.
    pub fn live_fences(&self) -> usize {
        self.lock().map(|state| state.fences.len()).unwrap_or_default()
    }

    /// Number of command buffers that were allocated and not yet freed.
    pub fn live_command_buffers(&self) -> usize {
        self.lock().map(|state| state.command_buffers.len()).unwrap_or_default()
    }

    fn family(&self, family: u32) -> Result<&QueueFamilyDescriptor> {
        self.families
            .iter()
            .find(|f| f.family_index == family)
            .ok_or_else(|| Error::VkError(vk::Result::ERROR_INITIALIZATION_FAILED).into())
    }

    fn transition(&self, cmd: vk::CommandBuffer, from: &[CommandBufferState], to: CommandBufferState) -> Result<()> {
        let mut state = self.lock()?;
        match state.command_buffers.get_mut(&cmd) {
            Some(current) if from.contains(current) => {
                *current = to;
                Ok(())
            }
            _ => Err(Error::VkError(vk::Result::ERROR_VALIDATION_FAILED_EXT).into()),
        }
    }
}

impl DeviceBackend for HeadlessDevice {
    fn name(&self) -> &str {
        "headless"
    }

    fn queue_families(&self) -> &[QueueFamilyDescriptor] {
        self.families.as_slice()
    }

    fn get_device_queue(&self, family: u32, index: u32) -> Result<vk::Queue> {
        let descriptor = self.family(family)?;
        if index >= descriptor.queue_count {
            return Err(Error::VkError(vk::Result::ERROR_INITIALIZATION_FAILED).into());
        }
        Ok(vk::Queue::from_raw(((family as u64 + 1) << 32) | (index as u64 + 1)))
    }

    fn format_features(&self, format: vk::Format) -> vk::FormatFeatureFlags {
        if self.unsupported_formats.contains(&format) {
            vk::FormatFeatureFlags::empty()
        } else {
            SUPPORTED_FORMAT_FEATURES
        }
    }

    fn create_command_pool(&self, family: u32, _flags: vk::CommandPoolCreateFlags) -> Result<vk::CommandPool> {
        self.family(family)?;
        if self.failing_families.contains(&family) {
            return Err(Error::VkError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY).into());
        }
        let pool = self.next();
        self.lock()?.command_pools.insert(pool);
        Ok(pool)
    }

    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool) {
        if let Ok(mut state) = self.lock() {
            state.command_pools.remove(&pool);
        }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> Result<vk::CommandBuffer> {
        let mut state = self.lock()?;
        if !state.command_pools.contains(&pool) {
            return Err(Error::VkError(vk::Result::ERROR_VALIDATION_FAILED_EXT).into());
        }
        let cmd = self.next();
        state.command_buffers.insert(cmd, CommandBufferState::Initial);
        Ok(cmd)
    }

    unsafe fn free_command_buffer(&self, _pool: vk::CommandPool, cmd: vk::CommandBuffer) {
        if let Ok(mut state) = self.lock() {
            state.command_buffers.remove(&cmd);
        }
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, _flags: vk::CommandBufferUsageFlags) -> Result<()> {
        self.transition(
            cmd,
            &[CommandBufferState::Initial, CommandBufferState::Executable],
            CommandBufferState::Recording,
        )
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        self.transition(cmd, &[CommandBufferState::Recording], CommandBufferState::Executable)
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        self.transition(
            cmd,
            &[CommandBufferState::Initial, CommandBufferState::Recording, CommandBufferState::Executable],
            CommandBufferState::Initial,
        )
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let semaphore = self.next();
        self.lock()?.semaphores.insert(semaphore);
        Ok(semaphore)
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        if let Ok(mut state) = self.lock() {
            state.semaphores.remove(&semaphore);
        }
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let fence = self.next();
        self.lock()?.fences.insert(fence, signaled);
        Ok(fence)
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        if let Ok(mut state) = self.lock() {
            state.fences.remove(&fence);
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: Duration) -> Result<bool> {
        // Nothing executes asynchronously here, so an unsignaled fence would never become signaled.
        self.fence_status(fence)
    }

    fn fence_status(&self, fence: vk::Fence) -> Result<bool> {
        match self.lock()?.fences.get(&fence) {
            Some(signaled) => Ok(*signaled),
            None => Err(Error::VkError(vk::Result::ERROR_VALIDATION_FAILED_EXT).into()),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        match self.lock()?.fences.get_mut(&fence) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => Err(Error::VkError(vk::Result::ERROR_VALIDATION_FAILED_EXT).into()),
        }
    }

    fn queue_submit(&self, queue: vk::Queue, submission: &Submission, fence: vk::Fence) -> Result<()> {
        if self
            .failing_submits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1))
            .is_ok()
        {
            return Err(Error::VkError(vk::Result::ERROR_DEVICE_LOST).into());
        }
        {
            let mut state = self.lock()?;
            if !state.submitting.insert(queue) {
                self.violations.fetch_add(1, Ordering::SeqCst);
            }
            let executable = submission
                .command_buffers
                .iter()
                .all(|cmd| state.command_buffers.get(cmd) == Some(&CommandBufferState::Executable));
            if !executable || submission.wait_semaphores.len() != submission.wait_stages.len() {
                state.submitting.remove(&queue);
                return Err(Error::VkError(vk::Result::ERROR_VALIDATION_FAILED_EXT).into());
            }
        }

        if !self.submit_delay.is_zero() {
            std::thread::sleep(self.submit_delay);
        }

        let mut state = self.lock()?;
        state.submitting.remove(&queue);
        if fence != vk::Fence::null() && !self.stalled {
            if let Some(signaled) = state.fences.get_mut(&fence) {
                *signaled = true;
            }
        }
        state.submissions.push(SubmissionRecord {
            queue,
            wait_semaphores: submission.wait_semaphores.to_vec(),
            wait_stages: submission.wait_stages.to_vec(),
            command_buffers: submission.command_buffers.to_vec(),
            signal_semaphores: submission.signal_semaphores.to_vec(),
            fence,
            thread: std::thread::current().id(),
        });
        Ok(())
    }


    fn wait_idle(&self) -> Result<()> {
        self.wait_idle_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
