//! The [`RenderPass`] interface shared by every stage of a frame, and [`GeometryPass`], the
//! implementation used for the depth pre-pass, background, environment map, opaque and transparent stages.
//!
//! What a pass draws is supplied by a [`PassContent`] given at construction. The pass itself only
//! owns the submission mechanics: a ring of command buffers, fences and signal semaphores, one
//! entry per frame in flight.

use std::time::Duration;

use anyhow::Result;
use ash::vk;

use crate::command_buffer::{CommandPool, CommandRecorder};
use crate::scene::{Camera, LightCache, LightType};
use crate::{Device, DevicePool, Error, Fence, Semaphore, SemaphoreToken, Submission};

/// Stage at which a pass waits on the semaphore of the previous stage. Waiting on all commands
/// keeps the whole pass behind the previous one.
pub const CHAIN_WAIT_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::ALL_COMMANDS;

/// Which stage of the frame a pass implements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PassKind {
    DepthPrepass,
    Background,
    EnvironmentMap,
    Shadow(LightType),
    Opaque,
    Transparent,
}

/// Render targets shared by the passes of a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Intermediates {
    pub extent: vk::Extent2D,
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
}

/// Scene state handed to passes during the CPU update. No GPU work may be recorded with it.
#[derive(Debug)]
pub struct CpuUpdater<'a> {
    pub camera: &'a mut Camera,
    pub lights: &'a mut LightCache,
    pub frame_index: u64,
    /// Time since the previous CPU update.
    pub elapsed: Duration,
}

/// Handed to passes during the GPU update, where uniform and resource writes become device visible.
#[derive(Debug)]
pub struct GpuUpdater<'a> {
    pub device: &'a Device,
    pub frame_index: u64,
}

/// A stage of the frame. Each stage consumes the semaphore token of the previous stage and returns
/// the token the next stage must wait on.
pub trait RenderPass: Send {
    fn kind(&self) -> PassKind;
    fn name(&self) -> &str;
    /// Create the GPU objects of this pass. Called once before the first frame.
    fn initialise(&mut self, queues: &DevicePool, intermediates: &Intermediates, frames_in_flight: usize) -> Result<()>;
    /// Destroy the GPU objects of this pass. The device must be idle.
    fn cleanup(&mut self);
    fn update_cpu(&mut self, updater: &mut CpuUpdater) -> Result<()>;
    fn update_gpu(&mut self, updater: &mut GpuUpdater) -> Result<()>;
    /// Whether this pass has anything to draw this frame. A pass without nodes is skipped, and its
    /// input token is passed through unchanged.
    fn has_nodes(&self) -> bool;
    /// Record and submit this frame's work, waiting on `wait`.
    fn render(&mut self, queues: &DevicePool, wait: &SemaphoreToken) -> Result<SemaphoreToken>;
}

/// What a [`GeometryPass`] draws: shaders, pipelines and the geometry queued for it.
pub trait PassContent: Send {
    fn has_nodes(&self) -> bool;

    fn initialise(&mut self, _device: &Device, _intermediates: &Intermediates) -> Result<()> {
        Ok(())
    }

    fn cleanup(&mut self) {}

    fn update_cpu(&mut self, _updater: &mut CpuUpdater) -> Result<()> {
        Ok(())
    }

    fn update_gpu(&mut self, _updater: &mut GpuUpdater) -> Result<()> {
        Ok(())
    }

    /// Record draw commands into `cmd`, which is already in the recording state.
    fn record(&mut self, cmd: &CommandRecorder) -> Result<()>;
}

impl<C: PassContent + ?Sized> PassContent for Box<C> {
    fn has_nodes(&self) -> bool {
        (**self).has_nodes()
    }

    fn initialise(&mut self, device: &Device, intermediates: &Intermediates) -> Result<()> {
        (**self).initialise(device, intermediates)
    }

    fn cleanup(&mut self) {
        (**self).cleanup()
    }

    fn update_cpu(&mut self, updater: &mut CpuUpdater) -> Result<()> {
        (**self).update_cpu(updater)
    }

    fn update_gpu(&mut self, updater: &mut GpuUpdater) -> Result<()> {
        (**self).update_gpu(updater)
    }

    fn record(&mut self, cmd: &CommandRecorder) -> Result<()> {
        (**self).record(cmd)
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
struct InFlight {
    cmd: vk::CommandBuffer,
    fence: Fence,
    semaphore: Semaphore,
    /// Set while a submission that signals `fence` is outstanding.
    pending: bool,
}

/// Command buffers, fences and signal semaphores of one pass, one set per frame in flight.
///
/// The command pool belongs to the pass, not to a queue record, because the pass may be submitted
/// through a different graphics queue every frame.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PassCommands {
    #[derivative(Debug = "ignore")]
    device: Device,
    frames: Vec<InFlight>,
    current: usize,
    pool: CommandPool,
}

impl PassCommands {
    /// Create `frames_in_flight` command buffers on the graphics family of `queues`.
    pub fn new(queues: &DevicePool, frames_in_flight: usize) -> Result<Self> {
        let device = queues.device().clone();
        let family = queues.graphics_pool().descriptor().family_index;
        let pool = CommandPool::new(device.clone(), family, vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)?;
        let frames = (0..frames_in_flight.max(1))
            .map(|_| -> Result<InFlight> {
                Ok(InFlight {
                    cmd: device.allocate_command_buffer(unsafe { pool.handle() })?,
                    fence: Fence::new(device.clone(), false)?,
                    semaphore: Semaphore::new(device.clone())?,
                    pending: false,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            device,
            frames,
            current: 0,
            pool,
        })
    }

    /// Record the next command buffer of the ring with `record`, submit it on a leased graphics
    /// queue waiting on `wait`, and return the token of its signal semaphore.
    ///
    /// Blocks only if the slot is still in use by the submission from `frames_in_flight` frames ago.
    pub fn execute<F>(&mut self, queues: &DevicePool, wait: &SemaphoreToken, record: F) -> Result<SemaphoreToken>
    where
        F: FnOnce(&CommandRecorder) -> Result<()>, {
        let len = self.frames.len();
        let frame = &mut self.frames[self.current];
        self.current = (self.current + 1) % len;

        if frame.pending {
            frame.fence.wait()?;
            frame.fence.reset()?;
            frame.pending = false;
        }
        self.device.reset_command_buffer(frame.cmd)?;
        let recorder = CommandRecorder::borrowed(self.device.clone(), frame.cmd);
        recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        record(&recorder)?;
        recorder.end()?;

        let wait_stages = wait.wait_stages(CHAIN_WAIT_STAGE);
        let signal = unsafe { frame.semaphore.handle() };
        let lease = queues.graphics_queue_lease()?;
        lease.submit(
            &Submission {
                wait_semaphores: wait.handles(),
                wait_stages: wait_stages.as_slice(),
                command_buffers: std::slice::from_ref(&frame.cmd),
                signal_semaphores: std::slice::from_ref(&signal),
            },
            Some(&frame.fence),
        )?;
        frame.pending = true;
        Ok(SemaphoreToken::signaled(signal))
    }
}

impl Drop for PassCommands {
    fn drop(&mut self) {
        for frame in &self.frames {
            unsafe {
                self.device.free_command_buffer(self.pool.handle(), frame.cmd);
            }
        }
    }
}

/// A pass whose draws are supplied by a [`PassContent`].
///
/// # Example
/// ```
/// # use selene::*;
/// # use selene::frame::*;
/// struct Sky;
///
/// impl PassContent for Sky {
///     fn has_nodes(&self) -> bool { true }
///     fn record(&mut self, _cmd: &CommandRecorder) -> anyhow::Result<()> { Ok(()) }
/// }
///
/// let background = GeometryPass::new(PassKind::Background, "skybox", Sky);
/// assert_eq!(background.name(), "skybox");
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GeometryPass<C> {
    kind: PassKind,
    name: String,
    #[derivative(Debug = "ignore")]
    content: C,
    commands: Option<PassCommands>,
}

impl<C: PassContent> GeometryPass<C> {
    pub fn new(kind: PassKind, name: impl Into<String>, content: C) -> Self {
        Self {
            kind,
            name: name.into(),
            content,
            commands: None,
        }
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut C {
        &mut self.content
    }
}

impl<C: PassContent> RenderPass for GeometryPass<C> {
    fn kind(&self) -> PassKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self, queues: &DevicePool, intermediates: &Intermediates, frames_in_flight: usize) -> Result<()> {
        self.content.initialise(queues.device(), intermediates)?;
        self.commands = Some(PassCommands::new(queues, frames_in_flight)?);
        Ok(())
    }

    fn cleanup(&mut self) {
        self.commands = None;
        self.content.cleanup();
    }

    fn update_cpu(&mut self, updater: &mut CpuUpdater) -> Result<()> {
        self.content.update_cpu(updater)
    }

    fn update_gpu(&mut self, updater: &mut GpuUpdater) -> Result<()> {
        self.content.update_gpu(updater)
    }

    fn has_nodes(&self) -> bool {
        self.content.has_nodes()
    }

    fn render(&mut self, queues: &DevicePool, wait: &SemaphoreToken) -> Result<SemaphoreToken> {
        if !self.has_nodes() {
            return Ok(wait.clone());
        }
        let commands = self.commands.as_mut().ok_or(Error::NotInitialised("render pass"))?;
        let content = &mut self.content;
        commands.execute(queues, wait, |cmd| content.record(cmd))
    }
}
