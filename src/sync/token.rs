use ash::vk;

/// The GPU-side completion signal of the most recently submitted stage of a frame.
///
/// A frame starts with the semaphores handed in by the presentation layer (for example "swapchain
/// image acquired"). Each stage that submits work waits on the current token and replaces it with
/// the semaphore it signals. A stage without work leaves the token untouched. The token is a plain
/// value; nothing keeps it beyond the frame it was produced in.
///
/// # Example
/// ```
/// # use selene::*;
/// # use ash::vk::{self, Handle};
/// let acquired = vk::Semaphore::from_raw(7);
/// let token = SemaphoreToken::from_waits(&[acquired]);
/// assert_eq!(token.handles(), &[acquired]);
/// assert!(SemaphoreToken::none().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SemaphoreToken {
    semaphores: Vec<vk::Semaphore>,
}

impl SemaphoreToken {
    /// A token with nothing to wait on.
    pub fn none() -> Self {
        Self::default()
    }

    /// A token that waits on every semaphore in `waits`. Null handles are dropped.
    pub fn from_waits(waits: &[vk::Semaphore]) -> Self {
        Self {
            semaphores: waits.iter().copied().filter(|s| *s != vk::Semaphore::null()).collect(),
        }
    }

    /// The token produced by a stage signaling `semaphore`.
    pub fn signaled(semaphore: vk::Semaphore) -> Self {
        Self {
            semaphores: vec![semaphore],
        }
    }

    /// Semaphores the next stage has to wait on.
    pub fn handles(&self) -> &[vk::Semaphore] {
        self.semaphores.as_slice()
    }

    /// True if there is nothing to wait on.
    pub fn is_empty(&self) -> bool {
        self.semaphores.is_empty()
    }

    /// Wait stage masks to pair with [`handles`](Self::handles), all equal to `stage`.
    pub fn wait_stages(&self, stage: vk::PipelineStageFlags) -> Vec<vk::PipelineStageFlags> {
        vec![stage; self.semaphores.len()]
    }
}
