//! Queue families and the pools that distribute their queues between threads.
//!
//! A [`QueueFamilyPool`] owns every queue of one hardware family. Each queue is stored as a
//! [`QueueRecord`] together with a command pool dedicated to it. At any time a record is either
//! available, or busy and owned by exactly one thread. A thread that already holds a record and asks
//! for one again receives the same record, so nested code paths that each want a queue do not
//! deadlock or exhaust the pool.
//!
//! Most code should not call [`QueueFamilyPool::get_queue`] and [`QueueFamilyPool::put_queue`]
//! directly, but use [`QueueFamilyPool::lease`] which returns an RAII [`QueueLease`].
//!
//! # Example
//! ```
//! # use std::sync::Arc;
//! # use selene::*;
//! # fn main() -> anyhow::Result<()> {
//! let device = Device::new(HeadlessDevice::new());
//! let family = device.queue_families()[0];
//! let pool = Arc::new(QueueFamilyPool::new(device.clone(), family)?);
//! {
//!     let outer = pool.lease()?;
//!     // Nested leases on the same thread share the record.
//!     let inner = pool.lease()?;
//!     assert!(outer.same_record(&inner));
//! }
//! assert_eq!(pool.available_count()?, pool.capacity());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::ThreadId;
use std::time::Duration;

use anyhow::Result;
use ash::vk;

use crate::command_buffer::{CommandPool, CommandRecorder};
use crate::core::lease::QueueLease;
use crate::{Device, Error, Fence, Submission};

/// Abstraction over vulkan queue capabilities. A family may support several of these at once.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, Hash)]
pub enum QueueType {
    #[default]
    Graphics,
    Compute,
    Transfer,
}

impl QueueType {
    /// The queue flag that advertises this capability.
    pub fn flag(self) -> vk::QueueFlags {
        match self {
            QueueType::Graphics => vk::QueueFlags::GRAPHICS,
            QueueType::Compute => vk::QueueFlags::COMPUTE,
            QueueType::Transfer => vk::QueueFlags::TRANSFER,
        }
    }
}

/// Identifies one hardware queue family. Created once from hardware enumeration and immutable afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QueueFamilyDescriptor {
    /// The queue family index.
    pub family_index: u32,
    /// All supported operations on this family.
    pub flags: vk::QueueFlags,
    /// Number of queues created for this family.
    pub queue_count: u32,
}

impl QueueFamilyDescriptor {
    /// Whether this family can execute work of the given type. Graphics and compute families
    /// implicitly support transfer operations.
    pub fn supports(&self, ty: QueueType) -> bool {
        match ty {
            QueueType::Transfer => self
                .flags
                .intersects(vk::QueueFlags::TRANSFER | vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            _ => self.flags.contains(ty.flag()),
        }
    }
}

/// One concrete queue together with the command pool it owns. Lives as long as the pool that created it.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct QueueRecord {
    handle: vk::Queue,
    family_index: u32,
    index: u32,
    command_pool: CommandPool,
}

impl QueueRecord {
    fn new(device: Device, family_index: u32, index: u32) -> Result<Self> {
        let handle = device.get_device_queue(family_index, index)?;
        let command_pool = CommandPool::new(
            device,
            family_index,
            vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        Ok(Self {
            handle,
            family_index,
            index,
            command_pool,
        })
    }

    /// Obtain the raw vulkan handle of the queue.
    /// # Safety
    /// Submitting to this handle is only valid while the calling thread owns the record through a lease.
    pub unsafe fn handle(&self) -> vk::Queue {
        self.handle
    }

    /// Queue family index of this queue.
    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    /// Index of this queue inside its family.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The command pool dedicated to this queue.
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    pub(crate) fn device(&self) -> &Device {
        self.command_pool.device()
    }

    /// Submit to this queue. Callers must own the record.
    pub(crate) fn submit(&self, submission: &Submission, fence: Option<&Fence>) -> Result<()> {
        let fence = match fence {
            None => vk::Fence::null(),
            Some(fence) => unsafe { fence.handle() },
        };
        self.device().queue_submit(self.handle, submission, fence)
    }

    /// Record a transient command buffer from this record's pool, submit it and block until it completed
    /// or `timeout` elapsed. Callers must own the record.
    pub(crate) fn one_shot<F>(&self, timeout: Duration, record: F) -> Result<()>
    where
        F: FnOnce(&CommandRecorder) -> Result<()>, {
        let device = self.device().clone();
        let recorder = CommandRecorder::allocate(&self.command_pool)?;
        recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        record(&recorder)?;
        recorder.end()?;

        let fence = Fence::new(device, false)?;
        let cmd = unsafe { recorder.handle() };
        self.submit(
            &Submission {
                command_buffers: std::slice::from_ref(&cmd),
                ..Default::default()
            },
            Some(&fence),
        )?;
        // The recorder frees its command buffer on drop, which is only valid once the GPU is done with it.
        // On timeout we leak it rather than free a pending command buffer.
        match fence.wait_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(e) => {
                std::mem::forget(recorder);
                Err(e)
            }
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct BusyEntry {
    record: usize,
    count: u32,
}

#[derive(Debug, Default)]
struct PoolState {
    available: Vec<usize>,
    busy: HashMap<ThreadId, BusyEntry>,
}

/// Owns all queues of one hardware queue family and hands them out to threads.
///
/// The available and busy partitions live under a single mutex that is only held while they are
/// mutated, never while GPU work is recorded or submitted.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct QueueFamilyPool {
    #[derivative(Debug = "ignore")]
    device: Device,
    descriptor: QueueFamilyDescriptor,
    records: Vec<Arc<QueueRecord>>,
    state: Mutex<PoolState>,
}

enum Acquired {
    Record(usize),
    Exhausted,
}

impl QueueFamilyPool {
    /// Obtain every queue of the family and create a command pool for each of them.
    /// # Errors
    /// Fails if any queue or command pool cannot be created. This is not recoverable.
    pub fn new(device: Device, descriptor: QueueFamilyDescriptor) -> Result<Self> {
        let records = (0..descriptor.queue_count)
            .map(|index| QueueRecord::new(device.clone(), descriptor.family_index, index).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        // Popped from the back, so the first queue is handed out first.
        let available = (0..records.len()).rev().collect();
        Ok(Self {
            device,
            descriptor,
            records,
            state: Mutex::new(PoolState {
                available,
                busy: HashMap::new(),
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<PoolState>> {
        Ok(self.state.lock().map_err(|_| Error::PoisonError)?)
    }

    /// Permanently remove one queue from the available set. Only meant for setup code that
    /// statically knows it is the sole owner, such as reserving a standing compute queue.
    /// # Panics
    /// Panics if no queue is available.
    pub fn reserve_queue(&self) -> Result<Arc<QueueRecord>> {
        let index = self.lock()?.available.pop();
        match index {
            Some(index) => {
                debug!("Reserved queue #{} of family {}", self.records[index].index, self.descriptor.family_index);
                Ok(self.records[index].clone())
            }
            None => panic!(
                "reserve_queue: queue family {} has no available queue to reserve",
                self.descriptor.family_index
            ),
        }
    }

    fn acquire(&self) -> Result<Acquired> {
        let thread = std::thread::current().id();
        let mut guard = self.lock()?;
        let state = &mut *guard;
        if let Some(entry) = state.busy.get_mut(&thread) {
            entry.count += 1;
            return Ok(Acquired::Record(entry.record));
        }
        match state.available.pop() {
            Some(record) => {
                state.busy.insert(
                    thread,
                    BusyEntry {
                        record,
                        count: 1,
                    },
                );
                Ok(Acquired::Record(record))
            }
            None => Ok(Acquired::Exhausted),
        }
    }

    /// Obtain a queue for the calling thread. If the thread already holds a queue of this family,
    /// the same record is returned and its count incremented.
    ///
    /// Every call must be paired with a [`put_queue`](Self::put_queue) on the same thread. Prefer
    /// [`lease`](Self::lease).
    /// # Panics
    /// Panics if every queue is held by other threads. The pool is sized to the number of
    /// concurrent submission sites, so exhaustion is a bug in the caller.
    pub fn get_queue(&self) -> Result<Arc<QueueRecord>> {
        match self.acquire()? {
            Acquired::Record(index) => {
                trace!("Thread {:?} holds queue #{} of family {}", std::thread::current().id(), index, self.descriptor.family_index);
                Ok(self.records[index].clone())
            }
            Acquired::Exhausted => panic!(
                "get_queue: all {} queues of family {} are leased by other threads",
                self.records.len(),
                self.descriptor.family_index
            ),
        }
    }

    /// Like [`get_queue`](Self::get_queue), but returns [`Error::QueueExhausted`] instead of panicking.
    pub fn try_get_queue(&self) -> Result<Arc<QueueRecord>> {
        match self.acquire()? {
            Acquired::Record(index) => Ok(self.records[index].clone()),
            Acquired::Exhausted => Err(Error::QueueExhausted {
                family: self.descriptor.family_index,
            }
            .into()),
        }
    }

    /// Release one hold of `record` by the calling thread. The record becomes available to other
    /// threads once every hold of this thread was released.
    /// # Panics
    /// Panics if the calling thread does not hold `record`.
    pub fn put_queue(&self, record: &QueueRecord) -> Result<()> {
        let thread = std::thread::current().id();
        let released = {
            let mut guard = self.lock()?;
            let state = &mut *guard;
            match state.busy.get_mut(&thread) {
                Some(entry) if std::ptr::eq(self.records[entry.record].as_ref(), record) => {
                    entry.count -= 1;
                    if entry.count == 0 {
                        let index = entry.record;
                        state.busy.remove(&thread);
                        state.available.push(index);
                        Some(true)
                    } else {
                        Some(false)
                    }
                }
                _ => None,
            }
        };
        match released {
            Some(true) => {
                trace!("Thread {:?} returned queue #{} of family {}", thread, record.index, self.descriptor.family_index);
                Ok(())
            }
            Some(false) => Ok(()),
            None => panic!(
                "put_queue: thread {:?} does not hold queue #{} of family {}",
                thread, record.index, self.descriptor.family_index
            ),
        }
    }

    /// Obtain an RAII lease on a queue of this family. See [`get_queue`](Self::get_queue).
    pub fn lease(self: &Arc<Self>) -> Result<QueueLease> {
        let record = self.get_queue()?;
        Ok(QueueLease::new(self.clone(), record))
    }

    /// Like [`lease`](Self::lease), but returns [`Error::QueueExhausted`] instead of panicking.
    pub fn try_lease(self: &Arc<Self>) -> Result<QueueLease> {
        let record = self.try_get_queue()?;
        Ok(QueueLease::new(self.clone(), record))
    }

    /// The family this pool serves.
    pub fn descriptor(&self) -> &QueueFamilyDescriptor {
        &self.descriptor
    }

    /// Total number of queues owned by this pool, including reserved and busy ones.
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Number of queues that can currently be handed to a new thread.
    pub fn available_count(&self) -> Result<usize> {
        Ok(self.lock()?.available.len())
    }

    /// Number of threads currently holding a queue of this pool.
    pub fn busy_count(&self) -> Result<usize> {
        Ok(self.lock()?.busy.len())
    }

    /// The device the queues were created on.
    pub fn device(&self) -> &Device {
        &self.device
    }
}

static_assertions::assert_impl_all!(QueueFamilyPool: Send, Sync);
static_assertions::assert_impl_all!(QueueRecord: Send, Sync);
