//! Exposes the [`DevicePool`], which owns every [`QueueFamilyPool`] of a device and assigns the
//! graphics, compute and transfer roles to them.
//!
//! # Roles
//!
//! Every role uses the first family that supports it. With [`RendererSettings::dedicated_queues`]
//! set, compute and transfer instead prefer a family without graphics (for transfer also without
//! compute) and only fall back to the first supporting family. A family may serve more than one role.
//! - Graphics work is always leased per submission through [`DevicePool::graphics_queue_lease`].
//! - Compute and transfer work back long-lived background jobs. At creation time one standing queue
//!   is reserved from their preferred family, unless that would leave the graphics family without a
//!   leasable queue. Roles that prefer the same family share its standing queue. A role without a
//!   standing queue falls back to per-call leases.
//!
//! # Example
//! ```
//! # use selene::*;
//! # fn main() -> anyhow::Result<()> {
//! let queues = DevicePool::new(Device::new(HeadlessDevice::new()), &RendererSettings::default())?;
//! {
//!     let graphics = queues.graphics_queue_lease()?;
//!     assert!(graphics.pool().descriptor().supports(QueueType::Graphics));
//! }
//! queues.upload(|cmd| {
//!     // Record copy commands into `cmd`.
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use ash::vk;

use crate::command_buffer::CommandRecorder;
use crate::core::lease::QueueLease;
use crate::core::queue::{QueueFamilyPool, QueueRecord, QueueType};
use crate::{Device, Error, Fence, RendererSettings, Submission};

type StandingQueue = Arc<Mutex<Arc<QueueRecord>>>;

#[derive(Debug, Clone)]
enum RoleQueue {
    Standing(StandingQueue),
    Leased(usize),
}

/// Access to a compute or transfer queue: either the standing queue of that role, held under its
/// mutex, or a lease when no standing queue could be reserved.
#[derive(Debug)]
pub enum QueueAccess<'a> {
    /// The standing queue reserved for the role.
    Standing(MutexGuard<'a, Arc<QueueRecord>>, Duration),
    /// A per-call lease.
    Leased(QueueLease),
}

impl QueueAccess<'_> {
    /// Whether this is the standing queue of its role.
    pub fn is_standing(&self) -> bool {
        matches!(self, QueueAccess::Standing(..))
    }

    /// Submit a batch of work to the queue.
    pub fn submit(&self, submission: &Submission, fence: Option<&Fence>) -> Result<()> {
        match self {
            QueueAccess::Standing(record, _) => record.submit(submission, fence),
            QueueAccess::Leased(lease) => lease.submit(submission, fence),
        }
    }

    /// Record, submit and wait for a transient command buffer. See [`QueueLease::one_shot`].
    pub fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&CommandRecorder) -> Result<()>, {
        match self {
            QueueAccess::Standing(queue, timeout) => queue.one_shot(*timeout, record),
            QueueAccess::Leased(lease) => lease.one_shot(record),
        }
    }
}

impl Deref for QueueAccess<'_> {
    type Target = QueueRecord;

    fn deref(&self) -> &Self::Target {
        match self {
            QueueAccess::Standing(record, _) => record,
            QueueAccess::Leased(lease) => lease,
        }
    }
}

/// Owns all queue family pools of one logical device. See the [module documentation](self).
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DevicePool {
    #[derivative(Debug = "ignore")]
    device: Device,
    families: Vec<Arc<QueueFamilyPool>>,
    graphics: usize,
    compute: RoleQueue,
    transfer: RoleQueue,
    upload_timeout: Duration,
}

fn first_supporting(families: &[Arc<QueueFamilyPool>], ty: QueueType) -> Option<usize> {
    families.iter().position(|pool| pool.descriptor().supports(ty))
}

fn dedicated_family(families: &[Arc<QueueFamilyPool>], ty: QueueType) -> Option<usize> {
    let avoid = match ty {
        QueueType::Graphics => vk::QueueFlags::empty(),
        QueueType::Compute => vk::QueueFlags::GRAPHICS,
        QueueType::Transfer => vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
    };
    families
        .iter()
        .position(|pool| pool.descriptor().supports(ty) && !pool.descriptor().flags.intersects(avoid))
        .or_else(|| first_supporting(families, ty))
}

impl DevicePool {
    /// Create a pool for every queue family of the device and assign roles.
    /// # Errors
    /// * [`Error::NoQueueFamilies`] if the device exposes no queues at all.
    /// * [`Error::NoGraphicsQueue`] if no family supports graphics.
    /// * Any error from creating the queues and their command pools. None of these are recoverable.
    pub fn new(device: Device, settings: &RendererSettings) -> Result<Self> {
        let families = device
            .queue_families()
            .iter()
            .filter(|family| family.queue_count > 0)
            .map(|family| QueueFamilyPool::new(device.clone(), *family).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        if families.is_empty() {
            return Err(Error::NoQueueFamilies.into());
        }

        let graphics = first_supporting(&families, QueueType::Graphics).ok_or(Error::NoGraphicsQueue)?;

        let mut standing: Vec<(usize, StandingQueue)> = Vec::new();
        let mut assign = |ty: QueueType| -> Result<RoleQueue> {
            // Graphics families support transfer implicitly, so this only fails for compute.
            let preferred = if settings.dedicated_queues {
                dedicated_family(&families, ty)
            } else {
                first_supporting(&families, ty)
            };
            let Some(family) = preferred else {
                warn!("No queue family supports {:?}, falling back to graphics family", ty);
                return Ok(RoleQueue::Leased(graphics));
            };
            if let Some((_, queue)) = standing.iter().find(|(index, _)| *index == family) {
                return Ok(RoleQueue::Standing(queue.clone()));
            }
            let pool = &families[family];
            let keep = if family == graphics { 1 } else { 0 };
            if pool.available_count()? > keep {
                let queue = Arc::new(Mutex::new(pool.reserve_queue()?));
                standing.push((family, queue.clone()));
                Ok(RoleQueue::Standing(queue))
            } else {
                warn!(
                    "Cannot reserve a standing {:?} queue on family {}, using leases instead",
                    ty,
                    pool.descriptor().family_index
                );
                Ok(RoleQueue::Leased(family))
            }
        };
        let compute = assign(QueueType::Compute)?;
        let transfer = assign(QueueType::Transfer)?;

        let pool = Self {
            device,
            families,
            graphics,
            compute,
            transfer,
            upload_timeout: settings.upload_timeout,
        };
        info!(
            "Queue roles: graphics on family {}, compute on family {}, transfer on family {}",
            pool.families[pool.graphics].descriptor().family_index,
            pool.role_family(&pool.compute),
            pool.role_family(&pool.transfer)
        );
        Ok(pool)
    }

    fn role_family(&self, role: &RoleQueue) -> u32 {
        match role {
            RoleQueue::Standing(queue) => queue.lock().map(|record| record.family_index()).unwrap_or(u32::MAX),
            RoleQueue::Leased(index) => self.families[*index].descriptor().family_index,
        }
    }

    fn access<'a>(&'a self, role: &'a RoleQueue) -> Result<QueueAccess<'a>> {
        match role {
            RoleQueue::Standing(queue) => Ok(QueueAccess::Standing(
                queue.lock().map_err(|_| Error::PoisonError)?,
                self.upload_timeout,
            )),
            RoleQueue::Leased(index) => Ok(QueueAccess::Leased(self.lease_from(*index)?)),
        }
    }

    fn lease_from(&self, index: usize) -> Result<QueueLease> {
        Ok(self.families[index].lease()?.with_upload_timeout(self.upload_timeout))
    }

    /// Lease a queue of the graphics family for the calling thread. This is what every per-frame
    /// submission uses.
    /// # Panics
    /// Panics if every graphics queue is held by other threads, see [`QueueFamilyPool::get_queue`].
    pub fn graphics_queue_lease(&self) -> Result<QueueLease> {
        self.lease_from(self.graphics)
    }

    /// Access the compute queue. A standing queue is held under a mutex for as long as the returned
    /// access lives, so do not request the same role again on the same thread before dropping it.
    pub fn compute_queue(&self) -> Result<QueueAccess<'_>> {
        self.access(&self.compute)
    }

    /// Access the transfer queue. See [`compute_queue`](Self::compute_queue).
    pub fn transfer_queue(&self) -> Result<QueueAccess<'_>> {
        self.access(&self.transfer)
    }

    /// Record a transient command buffer on the transfer queue, submit it and block until it
    /// finished. Only meant for setup-time uploads.
    /// # Errors
    /// * [`Error::FenceTimeout`] if the upload did not finish within the configured upload timeout.
    pub fn upload<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&CommandRecorder) -> Result<()>, {
        self.transfer_queue()?.one_shot(record)
    }

    /// The pool serving graphics work.
    pub fn graphics_pool(&self) -> &Arc<QueueFamilyPool> {
        &self.families[self.graphics]
    }

    /// All family pools, in family order.
    pub fn families(&self) -> &[Arc<QueueFamilyPool>] {
        self.families.as_slice()
    }

    /// Block until the device is idle. Only meant for teardown.
    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    /// The device all pools were created on.
    pub fn device(&self) -> &Device {
        &self.device
    }
}
