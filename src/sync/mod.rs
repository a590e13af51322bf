//! The sync module provides the synchronization primitives used to order GPU work.
//!
//! - The [`fence`] module provides a wrapper around `VkFence` objects, used for CPU-GPU sync,
//! as well as an implementation for [`Future`](std::future::Future) for them.
//! - The [`semaphore`] module provides a simple wrapper around `VkSemaphore` objects, used for GPU-GPU sync.
//! - The [`token`] module provides [`SemaphoreToken`](token::SemaphoreToken), the value threaded through a
//! frame's submissions so that every stage waits on the one before it.

pub mod fence;
pub mod semaphore;
pub mod token;
