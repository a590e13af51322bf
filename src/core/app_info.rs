//! Exposes all structs needed to store initialization parameters.

use std::time::Duration;

/// Settings used to initialize the device, the queue pools and the frame orchestrator.
#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// Application name. Possibly displayed in debugging tools, task manager, etc.
    pub name: String,
    /// Application version.
    pub version: (u32, u32, u32),
    /// Enable Vulkan validation layers for additional debug output. For developing this should almost always be on.
    pub enable_validation: bool,
    /// Whether a dedicated GPU is required. Setting this to true will discard integrated GPUs.
    pub dedicated: bool,
    /// Number of frames a pass may have in flight on the GPU before recording a new frame blocks.
    pub frames_in_flight: usize,
    /// Maximum time a one-shot upload may block the calling thread.
    pub upload_timeout: Duration,
    /// Whether the depth pre-pass runs before the background pass.
    pub depth_prepass: bool,
    /// Prefer queue families without graphics support for the compute and transfer roles. When off,
    /// each role uses the first family that supports it.
    pub dedicated_queues: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            name: String::from(""),
            version: (0, 0, 0),
            enable_validation: false,
            dedicated: false,
            frames_in_flight: 2,
            upload_timeout: Duration::from_secs(5),
            depth_prepass: false,
            dedicated_queues: false,
        }
    }
}

/// The settings builder is a convenience struct to easily create [`RendererSettings`].
///
/// For information about each of the fields, see [`RendererSettings`]
/// # Example
/// ```
/// # use selene::*;
/// let settings = SettingsBuilder::new()
///     .name("My selene application")
///     .validation(true)
///     .frames_in_flight(3)
///     .depth_prepass(true)
///     .build();
/// assert_eq!(settings.frames_in_flight, 3);
/// ```
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    inner: RendererSettings,
}

impl SettingsBuilder {
    /// Create a new settings builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = name.into();
        self
    }

    /// Sets the application version.
    pub fn version(mut self, ver: impl Into<(u32, u32, u32)>) -> Self {
        self.inner.version = ver.into();
        self
    }

    /// Enable the Vulkan validation layers.
    pub fn validation(mut self, val: bool) -> Self {
        self.inner.enable_validation = val;
        self
    }

    /// Only accept discrete GPUs.
    pub fn dedicated(mut self, val: bool) -> Self {
        self.inner.dedicated = val;
        self
    }

    /// Number of frames each pass may have in flight. Clamped to at least one.
    pub fn frames_in_flight(mut self, count: usize) -> Self {
        self.inner.frames_in_flight = count.max(1);
        self
    }

    /// Timeout for blocking one-shot uploads.
    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.inner.upload_timeout = timeout;
        self
    }

    /// Enable the depth pre-pass.
    pub fn depth_prepass(mut self, enabled: bool) -> Self {
        self.inner.depth_prepass = enabled;
        self
    }

    /// Prefer dedicated compute and transfer queue families.
    pub fn dedicated_queues(mut self, enabled: bool) -> Self {
        self.inner.dedicated_queues = enabled;
        self
    }

    /// Build the resulting settings.
    pub fn build(self) -> RendererSettings {
        self.inner
    }
}
