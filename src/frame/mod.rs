//! Frame orchestration: the render passes of a frame, shadow map selection and the orchestrator
//! that submits everything in dependency order.

pub mod orchestrator;
pub mod pass;
pub mod shadow;
pub mod shadow_preparer;

pub use orchestrator::{ExecutedStage, FrameOrchestrator, FrameOrchestratorBuilder, RenderInfo};
pub use pass::{CpuUpdater, GeometryPass, GpuUpdater, Intermediates, PassCommands, PassContent, PassKind, RenderPass, CHAIN_WAIT_STAGE};
pub use shadow::{ShadowContent, ShadowMap, ShadowMapPass};
pub use shadow_preparer::{ActiveShadowMap, ActiveShadowMapSet, ShadowPreparer};
