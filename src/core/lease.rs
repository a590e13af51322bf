//! Exposes [`QueueLease`], the RAII handle over a queue obtained from a [`QueueFamilyPool`].

use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::command_buffer::CommandRecorder;
use crate::core::queue::{QueueFamilyPool, QueueRecord};
use crate::{Fence, Submission};

/// Exclusive grant of one queue and its command pool to the calling thread. The queue is returned
/// to its pool exactly once, when the lease is dropped.
///
/// A lease cannot be cloned, and cannot be sent to another thread: ownership of a queue is tracked
/// per thread, so it must be released on the thread that acquired it. Nested leases on the same
/// thread refer to the same record.
///
/// # Example
/// ```
/// # use selene::*;
/// # fn main() -> anyhow::Result<()> {
/// let device = Device::new(HeadlessDevice::new());
/// let queues = DevicePool::new(device, &RendererSettings::default())?;
/// let lease = queues.graphics_queue_lease()?;
/// lease.one_shot(|cmd| {
///     // Record upload commands into `cmd` here.
///     Ok(())
/// })?;
/// // Dropping the lease hands the queue back.
/// drop(lease);
/// # Ok(())
/// # }
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct QueueLease {
    #[derivative(Debug = "ignore")]
    pool: Arc<QueueFamilyPool>,
    record: Arc<QueueRecord>,
    upload_timeout: Duration,
    #[derivative(Debug = "ignore")]
    _not_send: PhantomData<*const ()>,
}

impl QueueLease {
    pub(crate) fn new(pool: Arc<QueueFamilyPool>, record: Arc<QueueRecord>) -> Self {
        Self {
            pool,
            record,
            upload_timeout: Duration::MAX,
            _not_send: PhantomData,
        }
    }

    pub(crate) fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// The pool this lease was obtained from.
    pub fn pool(&self) -> &Arc<QueueFamilyPool> {
        &self.pool
    }

    /// Whether two leases refer to the same queue record.
    pub fn same_record(&self, other: &QueueLease) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }

    /// Submit a batch of work to the leased queue, optionally signaling `fence` when it completes.
    pub fn submit(&self, submission: &Submission, fence: Option<&Fence>) -> Result<()> {
        self.record.submit(submission, fence)
    }

    /// Record a transient command buffer, submit it and block until the GPU finished executing it.
    /// Meant for setup-time uploads, never for per-frame work.
    /// # Errors
    /// * [`Error::FenceTimeout`](crate::Error::FenceTimeout) if the work did not finish within the
    ///   upload timeout of the [`DevicePool`](crate::DevicePool) this lease came from.
    pub fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&CommandRecorder) -> Result<()>, {
        self.record.one_shot(self.upload_timeout, record)
    }
}

impl Deref for QueueLease {
    type Target = QueueRecord;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}

impl Drop for QueueLease {
    fn drop(&mut self) {
        if let Err(e) = self.pool.put_queue(&self.record) {
            error!("Failed to return queue #{} of family {}: {}", self.record.index(), self.record.family_index(), e);
        }
    }
}

static_assertions::assert_not_impl_any!(QueueLease: Clone, Copy, Send, Sync);
