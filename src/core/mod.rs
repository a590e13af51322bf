//! The core module holds the Vulkan context and the queue ownership layer built on top of it.

pub mod app_info;
pub mod debug;
pub mod device;
pub mod device_pool;
pub mod error;
pub mod headless;
pub mod init;
pub mod instance;
pub mod lease;
pub mod physical_device;
pub mod queue;
pub mod vulkan;
