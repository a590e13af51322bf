//! Exposes the selene error type

use std::ffi::NulError;
use std::sync::PoisonError;
use std::time::Duration;

use ash;
use ash::vk;
use thiserror::Error;

/// Error type that selene can return.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load the Vulkan library.
    #[error("Failed to load Vulkan.")]
    LoadFailed(ash::LoadingError),
    /// Could not convert rust string to C-String because it has null bytes
    #[error("Invalid C string")]
    InvalidString(NulError),
    /// Generic Vulkan error type.
    #[error("Vulkan error: `{0}`")]
    VkError(vk::Result),
    /// No suitable GPU found.
    #[error("No physical device found matching requirements.")]
    NoGPU,
    /// The device does not expose a single queue family with at least one queue.
    #[error("Device exposes no usable queue families.")]
    NoQueueFamilies,
    /// No queue family advertises graphics support. The device cannot render.
    #[error("No queue family with graphics support found.")]
    NoGraphicsQueue,
    /// Returned from [`QueueFamilyPool::try_get_queue()`](crate::QueueFamilyPool::try_get_queue) when every queue of the family is held by another thread.
    #[error("All queues of family {family} are leased by other threads.")]
    QueueExhausted {
        /// Queue family index of the exhausted pool.
        family: u32,
    },
    /// Poisoned mutex
    #[error("Poisoned mutex")]
    PoisonError,
    /// A blocking fence wait ran out of time.
    #[error("Fence was not signaled within {0:?}.")]
    FenceTimeout(Duration),
    /// A required image format does not support the usage it is needed for.
    #[error("Format {format:?} does not support {usage:?}.")]
    UnsupportedFormat {
        /// The offending format.
        format: vk::Format,
        /// Features that were required but missing.
        usage: vk::FormatFeatureFlags,
    },
    /// Tried to use an object before its `initialise` call, or after `cleanup`.
    #[error("`{0}` used before initialisation.")]
    NotInitialised(&'static str),
    /// A required pass was not given to a builder.
    #[error("Missing required `{0}` pass.")]
    MissingPass(&'static str),
    /// Uncategorized error.
    #[error("Uncategorized error: `{0}`")]
    Uncategorized(&'static str),
}

impl From<ash::LoadingError> for Error {
    fn from(value: ash::LoadingError) -> Self {
        Error::LoadFailed(value)
    }
}

impl From<NulError> for Error {
    fn from(value: NulError) -> Self {
        Error::InvalidString(value)
    }
}

impl From<vk::Result> for Error {
    fn from(value: vk::Result) -> Self {
        Error::VkError(value)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::PoisonError
    }
}
