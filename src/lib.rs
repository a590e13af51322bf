//! Queue leasing and frame orchestration for a Vulkan renderer.
//!
//! Selene gives every thread of a renderer safe, exclusive access to the hardware queues of a
//! device, and submits the passes of a frame in a fixed dependency order, chaining them with
//! semaphores.
//!
//! To get started, the easiest way is to simply
//! ```
//! // Import everything under a namespace.
//! use selene::prelude as sl;
//!
//! // Or, if you dont care about using the types under a namespace
//! use selene::prelude::*;
//! ```
//!
//! # Example
//!
//! First, we will define a [`RendererSettings`](crate::RendererSettings) structure that outlines
//! requirements and information about our application.
//! ```
//! use selene::prelude::*;
//!
//! let settings = SettingsBuilder::new()
//!     .name("Selene demo app")
//!     .version((1, 0, 0))
//!     .validation(true)
//!     .frames_in_flight(2)
//!     .build();
//! ```
//! Now we are ready to initialize the Vulkan context.
//! ```no_run
//! # use selene::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! # let settings = SettingsBuilder::new().build();
//! let (instance, physical_device, device, queues, debug_messenger) = selene::initialize(&settings)?;
//! // Lease a graphics queue for the current thread. It is returned to the pool when dropped.
//! let graphics = queues.graphics_queue_lease()?;
//! # Ok(())
//! # }
//! ```
//! Without a GPU, the [`HeadlessDevice`](crate::HeadlessDevice) provides the same interface and
//! records every submission instead of executing it.
//! ```
//! # use selene::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let device = Device::new(HeadlessDevice::new());
//! let queues = DevicePool::new(device, &RendererSettings::default())?;
//! # Ok(())
//! # }
//! ```
//! For further example code, check out the following modules
//! - [`core`] for the device, the queue family pools and queue leases.
//! - [`frame`] for render passes, shadow map selection and the frame orchestrator.
//! - [`scene`] for the camera and the light cache.
//! - [`sync`] for fences, semaphores and the semaphore token threaded through a frame.
//! - [`command_buffer`] for command pools and command buffer recording.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod command_buffer;
pub mod core;
pub mod frame;
pub mod scene;
pub mod sync;
pub(crate) mod util;
