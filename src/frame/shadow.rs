//! Shadow map passes. A shadow map renders the shadows of up to [`ShadowMap::capacity`] lights of a
//! single [`LightType`], one light per slot. Which lights land in which slot is decided every frame
//! by the [`ShadowPreparer`](crate::frame::ShadowPreparer).

use anyhow::Result;

use crate::command_buffer::CommandRecorder;
use crate::frame::pass::{CpuUpdater, GpuUpdater, Intermediates, PassCommands, PassKind, RenderPass};
use crate::scene::{Camera, Light, LightType};
use crate::{Device, DevicePool, Error, SemaphoreToken};

/// A render pass producing shadow maps for lights of one type.
pub trait ShadowMap: RenderPass {
    fn light_type(&self) -> LightType;
    /// Number of lights this map can hold in a single frame.
    fn capacity(&self) -> u32;
    /// Forget every light bound during the previous frame.
    fn clear_lights(&mut self);
    /// Bind `light` to `slot` for this frame and update the slot's light-space matrices from `camera`.
    fn update_light(&mut self, camera: &Camera, light: &Light, slot: u32) -> Result<()>;
}

/// What a [`ShadowMapPass`] renders into its slots.
pub trait ShadowContent: Send {
    fn initialise(&mut self, _device: &Device, _intermediates: &Intermediates) -> Result<()> {
        Ok(())
    }

    fn cleanup(&mut self) {}

    fn update_light(&mut self, camera: &Camera, light: &Light, slot: u32) -> Result<()>;

    fn update_gpu(&mut self, _updater: &mut GpuUpdater, _slots: &[u32]) -> Result<()> {
        Ok(())
    }

    /// Record the shadow draws of every slot in `slots`.
    fn record(&mut self, cmd: &CommandRecorder, slots: &[u32]) -> Result<()>;
}

impl<C: ShadowContent + ?Sized> ShadowContent for Box<C> {
    fn initialise(&mut self, device: &Device, intermediates: &Intermediates) -> Result<()> {
        (**self).initialise(device, intermediates)
    }

    fn cleanup(&mut self) {
        (**self).cleanup()
    }

    fn update_light(&mut self, camera: &Camera, light: &Light, slot: u32) -> Result<()> {
        (**self).update_light(camera, light, slot)
    }

    fn update_gpu(&mut self, updater: &mut GpuUpdater, slots: &[u32]) -> Result<()> {
        (**self).update_gpu(updater, slots)
    }

    fn record(&mut self, cmd: &CommandRecorder, slots: &[u32]) -> Result<()> {
        (**self).record(cmd, slots)
    }
}

/// Shadow map with a fixed number of slots, rendered in one submission.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ShadowMapPass<C> {
    light_type: LightType,
    capacity: u32,
    name: String,
    #[derivative(Debug = "ignore")]
    content: C,
    slots: Vec<u32>,
    commands: Option<PassCommands>,
}

impl<C: ShadowContent> ShadowMapPass<C> {
    pub fn new(light_type: LightType, capacity: u32, name: impl Into<String>, content: C) -> Self {
        Self {
            light_type,
            capacity,
            name: name.into(),
            content,
            slots: Vec::with_capacity(capacity as usize),
            commands: None,
        }
    }

    /// Slots bound this frame, in binding order.
    pub fn active_slots(&self) -> &[u32] {
        self.slots.as_slice()
    }

    pub fn content(&self) -> &C {
        &self.content
    }
}

impl<C: ShadowContent> RenderPass for ShadowMapPass<C> {
    fn kind(&self) -> PassKind {
        PassKind::Shadow(self.light_type)
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
        self.slots.clear();
        self.content.cleanup();
    }

    fn update_cpu(&mut self, _updater: &mut CpuUpdater) -> Result<()> {
        // Per-light state is updated through `update_light`.
        Ok(())
    }

    fn update_gpu(&mut self, updater: &mut GpuUpdater) -> Result<()> {
        self.content.update_gpu(updater, &self.slots)
    }

    fn has_nodes(&self) -> bool {
        !self.slots.is_empty()
    }

    fn render(&mut self, queues: &DevicePool, wait: &SemaphoreToken) -> Result<SemaphoreToken> {
        if self.slots.is_empty() {
            return Ok(wait.clone());
        }
        let commands = self.commands.as_mut().ok_or(Error::NotInitialised("shadow map"))?;
        let content = &mut self.content;
        let slots = self.slots.as_slice();
        commands.execute(queues, wait, |cmd| content.record(cmd, slots))
    }
}

impl<C: ShadowContent> ShadowMap for ShadowMapPass<C> {
    fn light_type(&self) -> LightType {
        self.light_type
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn clear_lights(&mut self) {
        self.slots.clear();
    }

    fn update_light(&mut self, camera: &Camera, light: &Light, slot: u32) -> Result<()> {
        if slot >= self.capacity {
            return Err(Error::Uncategorized("Shadow map slot out of range.").into());
        }
        self.content.update_light(camera, light, slot)?;
        self.slots.push(slot);
        Ok(())
    }
}
