use std::time::Duration;

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;
use glam::Vec3;

use selene::frame::{
    CpuUpdater, FrameOrchestrator, FrameOrchestratorBuilder, GeometryPass, GpuUpdater, PassKind, RenderInfo,
    ShadowMapPass,
};
use selene::scene::{Camera, LightCache, LightId, LightType};
use selene::{Error, HeadlessDevice, SemaphoreToken, SettingsBuilder};

use framework::{Context, CountingContent, RecordingShadows};

mod framework;

struct Passes {
    background: CountingContent,
    opaque: CountingContent,
    transparent: CountingContent,
}

fn builder(context: &Context, opaque: bool, transparent: bool) -> (FrameOrchestratorBuilder, Passes) {
    let passes = Passes {
        background: CountingContent::new(true),
        opaque: CountingContent::new(opaque),
        transparent: CountingContent::new(transparent),
    };
    let builder = FrameOrchestrator::builder(&context.settings)
        .background(GeometryPass::new(PassKind::Background, "skybox", passes.background.clone()))
        .opaque(GeometryPass::new(PassKind::Opaque, "opaque", passes.opaque.clone()))
        .transparent(GeometryPass::new(PassKind::Transparent, "transparent", passes.transparent.clone()));
    (builder, passes)
}

fn empty_pipeline(context: &Context) -> FrameOrchestratorBuilder {
    FrameOrchestrator::builder(&context.settings)
        .background(GeometryPass::new(PassKind::Background, "skybox", CountingContent::new(false)))
        .opaque(GeometryPass::new(PassKind::Opaque, "opaque", CountingContent::new(false)))
        .transparent(GeometryPass::new(PassKind::Transparent, "transparent", CountingContent::new(false)))
}

fn run_frame(
    frame: &mut FrameOrchestrator,
    context: &Context,
    camera: &mut Camera,
    lights: &mut LightCache,
    frame_index: u64,
    waits: &SemaphoreToken,
    info: &mut RenderInfo,
) -> Result<SemaphoreToken> {
    frame.update_cpu(&mut CpuUpdater {
        camera,
        lights,
        frame_index,
        elapsed: Duration::from_millis(16),
    })?;
    frame.update_gpu(&mut GpuUpdater {
        device: &context.device,
        frame_index,
    })?;
    frame.render(&context.queues, waits, info)
}

fn acquired() -> SemaphoreToken {
    SemaphoreToken::from_waits(&[vk::Semaphore::from_raw(0xACE)])
}

#[test]
pub fn missing_passes_are_rejected() -> Result<()> {
    let context = framework::make_context()?;
    let error = FrameOrchestrator::builder(&context.settings)
        .background(GeometryPass::new(PassKind::Background, "skybox", CountingContent::new(true)))
        .transparent(GeometryPass::new(PassKind::Transparent, "transparent", CountingContent::new(true)))
        .build()
        .expect_err("Building without an opaque pass should fail");
    assert!(matches!(error.downcast_ref::<Error>(), Some(Error::MissingPass("opaque"))));
    Ok(())
}

#[test]
pub fn render_before_initialise_fails() -> Result<()> {
    let context = framework::make_context()?;
    let mut frame = empty_pipeline(&context).build()?;
    let mut info = RenderInfo::default();
    let error = frame
        .render(&context.queues, &acquired(), &mut info)
        .expect_err("Rendering before initialise should fail");
    assert!(matches!(error.downcast_ref::<Error>(), Some(Error::NotInitialised(_))));
    assert!(context.headless.submissions().is_empty());
    Ok(())
}

#[test]
pub fn empty_pipeline_passes_wait_through() -> Result<()> {
    let context = framework::make_context()?;
    let mut frame = empty_pipeline(&context).build()?;
    frame.initialise(&context.queues, &framework::intermediates())?;

    let mut camera = framework::camera();
    let mut lights = LightCache::new();
    let mut info = RenderInfo::default();
    let waits = acquired();
    let result = run_frame(&mut frame, &context, &mut camera, &mut lights, 0, &waits, &mut info)?;
    assert_eq!(result, waits);
    assert_eq!(info.signal_count(), 0);
    assert_eq!(info.skipped.len(), 3);
    assert!(context.headless.submissions().is_empty());
    Ok(())
}

#[test]
pub fn stages_chain_their_semaphores() -> Result<()> {
    let context = framework::make_context()?;
    let (builder, passes) = builder(&context, true, true);
    let mut frame = builder
        .environment_map(GeometryPass::new(PassKind::EnvironmentMap, "env", CountingContent::new(true)))
        .build()?;
    frame.initialise(&context.queues, &framework::intermediates())?;

    let mut camera = framework::camera();
    let mut lights = LightCache::new();
    let mut info = RenderInfo::default();
    let waits = acquired();
    let result = run_frame(&mut frame, &context, &mut camera, &mut lights, 0, &waits, &mut info)?;

    assert_eq!(
        info.executed_kinds(),
        vec![PassKind::Background, PassKind::EnvironmentMap, PassKind::Opaque, PassKind::Transparent]
    );
    let submissions = context.headless.submissions();
    assert_eq!(submissions.len(), 4);
    // The first stage waits on the caller's semaphores, every other stage on its predecessor.
    assert_eq!(submissions[0].wait_semaphores, waits.handles());
    for pair in submissions.windows(2) {
        assert_eq!(pair[1].wait_semaphores, pair[0].signal_semaphores);
        assert_eq!(pair[1].wait_stages, vec![vk::PipelineStageFlags::ALL_COMMANDS]);
    }
    assert_eq!(result.handles(), submissions[3].signal_semaphores.as_slice());
    // Every submission goes through a graphics queue lease.
    let graphics_family = context.queues.graphics_pool().descriptor().family_index;
    for submission in &submissions {
        assert_eq!(submission.queue.as_raw() >> 32, graphics_family as u64 + 1);
    }
    assert_eq!(context.queues.graphics_pool().busy_count()?, 0);

    assert_eq!(passes.background.calls().record, 1);
    assert_eq!(passes.opaque.calls().update_cpu, 1);
    assert_eq!(passes.transparent.calls().update_gpu, 1);
    Ok(())
}

#[test]
pub fn one_shadow_for_two_directional_lights() -> Result<()> {
    let context = framework::make_context()?;
    let (builder, passes) = builder(&context, true, false);
    let shadows = RecordingShadows::default();
    let mut frame = builder
        .shadow_map(ShadowMapPass::new(LightType::Directional, 1, "sun shadows", shadows.clone()))
        .build()?;
    frame.initialise(&context.queues, &framework::intermediates())?;

    let mut camera = framework::camera();
    let mut lights = LightCache::new();
    lights.add(framework::directional(0, 50.0));
    lights.add(framework::directional(1, 5.0));
    let mut info = RenderInfo::default();
    let waits = acquired();
    let result = run_frame(&mut frame, &context, &mut camera, &mut lights, 0, &waits, &mut info)?;

    // background, one shadow map, opaque. Transparent has nothing to draw.
    assert_eq!(
        info.executed_kinds(),
        vec![PassKind::Background, PassKind::Shadow(LightType::Directional), PassKind::Opaque]
    );
    assert_eq!(info.skipped, vec![(PassKind::Transparent, "transparent".to_owned())]);
    assert_eq!(info.signal_count(), 3);
    assert_eq!(result, info.executed[2].signal);
    assert_eq!(passes.transparent.calls().record, 0);

    // The closer light got the only slot.
    assert_eq!(shadows.lights(), vec![(LightId(1), 0)]);
    assert_eq!(shadows.records(), vec![vec![0]]);
    assert!(lights.get(LightId(0)).and_then(|light| light.shadow_binding()).is_none());
    let active = frame.active_shadow_maps();
    assert_eq!(active.get(LightType::Directional)[0].lights, vec![(LightId(1), 0)]);
    Ok(())
}

#[test]
pub fn shadow_maps_render_per_light_type() -> Result<()> {
    let context = framework::make_context()?;
    let (builder, _) = builder(&context, true, true);
    let mut frame = builder
        .shadow_map(ShadowMapPass::new(LightType::Spot, 2, "spot shadows", RecordingShadows::default()))
        .shadow_map(ShadowMapPass::new(LightType::Point, 2, "point shadows", RecordingShadows::default()))
        .shadow_map(ShadowMapPass::new(LightType::Directional, 2, "sun shadows", RecordingShadows::default()))
        .build()?;
    frame.initialise(&context.queues, &framework::intermediates())?;

    let mut camera = framework::camera();
    let mut lights = LightCache::new();
    lights.add(framework::directional(0, 10.0));
    lights.add(selene::scene::Light::spot(LightId(1), Vec3::new(0.0, 0.0, -5.0), Vec3::NEG_Z, 5.0));
    let mut info = RenderInfo::default();
    run_frame(&mut frame, &context, &mut camera, &mut lights, 0, &acquired(), &mut info)?;

    // No point light, so the point shadow map is not rendered.
    assert_eq!(
        info.executed_kinds(),
        vec![
            PassKind::Background,
            PassKind::Shadow(LightType::Directional),
            PassKind::Shadow(LightType::Spot),
            PassKind::Opaque,
            PassKind::Transparent,
        ]
    );
    Ok(())
}

#[test]
pub fn depth_prepass_runs_first_when_enabled() -> Result<()> {
    let settings = SettingsBuilder::new().depth_prepass(true).build();
    let context = framework::make_context_with(HeadlessDevice::new(), settings)?;
    let (builder, _) = builder(&context, true, true);
    let mut frame = builder
        .depth_prepass(GeometryPass::new(PassKind::DepthPrepass, "depth", CountingContent::new(true)))
        .build()?;
    assert!(frame.has_depth_prepass());
    frame.initialise(&context.queues, &framework::intermediates())?;

    let mut camera = framework::camera();
    let mut lights = LightCache::new();
    let mut info = RenderInfo::default();
    run_frame(&mut frame, &context, &mut camera, &mut lights, 0, &acquired(), &mut info)?;
    assert_eq!(info.executed[0].kind, PassKind::DepthPrepass);
    assert_eq!(info.signal_count(), 4);
    Ok(())
}

#[test]
pub fn depth_prepass_is_dropped_when_disabled() -> Result<()> {
    let context = framework::make_context()?;
    let (builder, _) = builder(&context, true, true);
    let depth = CountingContent::new(true);
    let mut frame = builder
        .depth_prepass(GeometryPass::new(PassKind::DepthPrepass, "depth", depth.clone()))
        .build()?;
    assert!(!frame.has_depth_prepass());
    frame.initialise(&context.queues, &framework::intermediates())?;

    let mut camera = framework::camera();
    let mut lights = LightCache::new();
    let mut info = RenderInfo::default();
    run_frame(&mut frame, &context, &mut camera, &mut lights, 0, &acquired(), &mut info)?;
    assert!(!info.executed_kinds().contains(&PassKind::DepthPrepass));
    assert_eq!(depth.calls(), framework::Calls::default());
    Ok(())
}

#[test]
pub fn unsupported_depth_format_is_fatal() -> Result<()> {
    let context = framework::make_context_with(
        HeadlessDevice::new().with_unsupported_format(vk::Format::D32_SFLOAT),
        framework::test_settings(),
    )?;
    let (builder, passes) = builder(&context, true, true);
    let mut frame = builder.build()?;
    let error = frame
        .initialise(&context.queues, &framework::intermediates())
        .expect_err("Initialising with an unusable depth format should fail");
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::UnsupportedFormat {
            format: vk::Format::D32_SFLOAT,
            ..
        })
    ));
    assert!(!frame.is_initialised());
    assert_eq!(passes.opaque.calls().initialise, 0);
    Ok(())
}

#[test]
pub fn gpu_update_waits_for_initialise() -> Result<()> {
    let context = framework::make_context()?;
    let (builder, passes) = builder(&context, true, true);
    let mut frame = builder.build()?;
    frame.update_gpu(&mut GpuUpdater {
        device: &context.device,
        frame_index: 0,
    })?;
    assert_eq!(passes.opaque.calls().update_gpu, 0);

    frame.initialise(&context.queues, &framework::intermediates())?;
    frame.update_gpu(&mut GpuUpdater {
        device: &context.device,
        frame_index: 0,
    })?;
    assert_eq!(passes.opaque.calls().update_gpu, 1);
    Ok(())
}

#[test]
pub fn gpu_update_reaches_empty_passes_and_active_shadow_maps() -> Result<()> {
    let context = framework::make_context()?;
    let (builder, passes) = builder(&context, false, false);
    let sun = RecordingShadows::default();
    let lamps = RecordingShadows::default();
    let mut frame = builder
        .shadow_map(ShadowMapPass::new(LightType::Directional, 1, "sun shadows", sun.clone()))
        .shadow_map(ShadowMapPass::new(LightType::Point, 1, "point shadows", lamps.clone()))
        .build()?;
    frame.initialise(&context.queues, &framework::intermediates())?;

    let mut camera = framework::camera();
    let mut lights = LightCache::new();
    lights.add(framework::directional(0, 10.0));
    frame.update_cpu(&mut CpuUpdater {
        camera: &mut camera,
        lights: &mut lights,
        frame_index: 0,
        elapsed: Duration::ZERO,
    })?;
    frame.update_gpu(&mut GpuUpdater {
        device: &context.device,
        frame_index: 0,
    })?;

    // Passes without nodes still get their GPU update, only shadow maps are filtered.
    assert_eq!(passes.opaque.calls().update_gpu, 1);
    assert_eq!(passes.transparent.calls().update_gpu, 1);
    assert_eq!(sun.gpu_updates(), 1);
    assert_eq!(lamps.gpu_updates(), 0);
    Ok(())
}

#[test]
pub fn failed_submit_does_not_block_next_frame() -> Result<()> {
    let settings = SettingsBuilder::new().frames_in_flight(1).build();
    let context = framework::make_context_with(HeadlessDevice::new(), settings)?;
    let mut frame = empty_pipeline(&context)
        .background(GeometryPass::new(PassKind::Background, "skybox", CountingContent::new(true)))
        .build()?;
    frame.initialise(&context.queues, &framework::intermediates())?;

    let mut camera = framework::camera();
    let mut lights = LightCache::new();
    let mut info = RenderInfo::default();
    context.headless.fail_next_submits(1);
    let error = run_frame(&mut frame, &context, &mut camera, &mut lights, 0, &acquired(), &mut info)
        .expect_err("Submission should fail");
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::VkError(vk::Result::ERROR_DEVICE_LOST))
    ));
    assert_eq!(context.queues.graphics_pool().busy_count()?, 0);

    // The only ring slot is reused without waiting on a fence nothing will signal.
    run_frame(&mut frame, &context, &mut camera, &mut lights, 1, &acquired(), &mut info)?;
    assert_eq!(context.headless.submissions().len(), 1);
    assert_eq!(info.executed_kinds(), vec![PassKind::Background]);
    Ok(())
}

#[test]
pub fn cpu_update_refreshes_camera() -> Result<()> {
    let context = framework::make_context()?;
    let (builder, _) = builder(&context, true, true);
    let mut frame = builder.build()?;
    let mut camera = framework::camera();
    let before = *camera.view();
    camera.look_at(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO);
    frame.update_cpu(&mut CpuUpdater {
        camera: &mut camera,
        lights: &mut LightCache::new(),
        frame_index: 0,
        elapsed: Duration::ZERO,
    })?;
    assert_ne!(*camera.view(), before);
    Ok(())
}

#[test]
pub fn frames_in_flight_cycle_command_buffers() -> Result<()> {
    let settings = SettingsBuilder::new().frames_in_flight(2).build();
    let context = framework::make_context_with(HeadlessDevice::new(), settings)?;
    let mut frame = FrameOrchestrator::builder(&context.settings)
        .background(GeometryPass::new(PassKind::Background, "skybox", CountingContent::new(true)))
        .opaque(GeometryPass::new(PassKind::Opaque, "opaque", CountingContent::new(false)))
        .transparent(GeometryPass::new(PassKind::Transparent, "transparent", CountingContent::new(false)))
        .build()?;
    frame.initialise(&context.queues, &framework::intermediates())?;

    let mut camera = framework::camera();
    let mut lights = LightCache::new();
    let mut info = RenderInfo::default();
    let mut signals = Vec::new();
    for index in 0..3 {
        signals.push(run_frame(&mut frame, &context, &mut camera, &mut lights, index, &acquired(), &mut info)?);
    }
    let submissions = context.headless.submissions();
    assert_eq!(submissions.len(), 3);
    assert_ne!(submissions[0].command_buffers, submissions[1].command_buffers);
    assert_eq!(submissions[0].command_buffers, submissions[2].command_buffers);
    assert_ne!(signals[0], signals[1]);
    assert_eq!(signals[0], signals[2]);
    Ok(())
}

#[test]
pub fn cleanup_idles_device_and_releases_passes() -> Result<()> {
    let context = framework::make_context()?;
    let baseline_pools = context.headless.live_command_pools();
    let (builder, passes) = builder(&context, true, true);
    let mut frame = builder.build()?;
    frame.initialise(&context.queues, &framework::intermediates())?;
    assert_eq!(context.headless.live_command_pools(), baseline_pools + 3);

    frame.cleanup()?;
    assert!(!frame.is_initialised());
    assert_eq!(context.headless.wait_idle_calls(), 1);
    assert_eq!(context.headless.live_command_pools(), baseline_pools);
    assert_eq!(context.headless.live_semaphores(), 0);
    assert_eq!(context.headless.live_fences(), 0);
    assert_eq!(context.headless.live_command_buffers(), 0);
    assert_eq!(passes.opaque.calls().cleanup, 1);

    // Cleaning up twice is harmless, and the orchestrator can be initialised again.
    frame.cleanup()?;
    assert_eq!(context.headless.wait_idle_calls(), 1);
    frame.initialise(&context.queues, &framework::intermediates())?;
    assert_eq!(passes.opaque.calls().initialise, 2);
    Ok(())
}
