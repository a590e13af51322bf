use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::Result;
use ash::vk;

use crate::{Device, Error};

/// Wrapper around a [`VkFence`](vk::Fence) object. Fences are used for CPU-GPU sync.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Fence {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::Fence,
}

impl Fence {
    /// Create a new fence, possibly in the signaled status.
    pub fn new(device: Device, signaled: bool) -> Result<Self> {
        let handle = device.create_fence(signaled)?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkFence {handle:p}");
        Ok(Fence {
            device,
            handle,
        })
    }

    /// Waits for the fence to be signaled with no timeout. Note that this is a blocking call. For the nonblocking version, use the `Future` implementation by calling
    /// `.await`.
    pub fn wait(&self) -> Result<()> {
        self.wait_timeout(Duration::MAX)
    }

    /// Waits for the fence to be signaled, giving up after `timeout`.
    /// # Errors
    /// * [`Error::FenceTimeout`] if the fence was not signaled in time.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<()> {
        if self.device.wait_for_fence(self.handle, timeout)? {
            Ok(())
        } else {
            Err(Error::FenceTimeout(timeout).into())
        }
    }

    /// Whether the fence is currently signaled.
    pub fn is_signaled(&self) -> Result<bool> {
        self.device.fence_status(self.handle)
    }

    /// Resets a fence to the unsignaled status.
    pub fn reset(&self) -> Result<()> {
        self.device.reset_fence(self.handle)
    }

    /// Get unsafe access to the underlying `VkFence` handle.
    /// # Safety
    /// The handle is only valid while `self` is alive.
    pub unsafe fn handle(&self) -> vk::Fence {
        self.handle
    }
}

// Note that the future implementation for Fence works by periodically polling the fence.
impl std::future::Future for Fence {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.is_signaled() {
            Ok(true) => Poll::Ready(Ok(())),
            Ok(false) => {
                let waker = ctx.waker().clone();
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_millis(5));
                    waker.wake();
                });
                Poll::Pending
            }
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkFence {:p}", self.handle);
        unsafe {
            self.device.destroy_fence(self.handle);
        }
    }
}
