//! Command pools and command buffer recording.
//!
//! Every [`QueueRecord`](crate::QueueRecord) owns a [`CommandPool`]. Transient command buffers for
//! one-shot work are allocated from it through a [`CommandRecorder`], which is only valid while the
//! queue is leased. Passes own their own pools, see [`frame`](crate::frame).

pub mod command_pool;
pub mod recorder;

pub use command_pool::CommandPool;
pub use recorder::CommandRecorder;
