//! Small helpers shared by the Vulkan wrappers.

pub(crate) mod string;
