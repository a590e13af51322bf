use std::time::Duration;

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;

use selene::{Error, Fence, Semaphore, SemaphoreToken, Submission};

mod framework;

#[test]
pub fn signaled_fence_completes_as_future() -> Result<()> {
    let context = framework::make_context()?;
    let fence = Fence::new(context.device.clone(), true)?;
    futures::executor::block_on(fence)?;
    Ok(())
}

#[test]
pub fn fence_future_completes_after_submit() -> Result<()> {
    let context = framework::make_context()?;
    let fence = Fence::new(context.device.clone(), false)?;
    assert!(!fence.is_signaled()?);
    let lease = context.queues.graphics_queue_lease()?;
    lease.submit(&Submission::default(), Some(&fence))?;
    drop(lease);
    futures::executor::block_on(fence)?;
    Ok(())
}

#[test]
pub fn unsignaled_fence_times_out() -> Result<()> {
    let context = framework::make_context()?;
    let fence = Fence::new(context.device.clone(), false)?;
    let error = fence
        .wait_timeout(Duration::from_millis(1))
        .expect_err("Waiting on an unsignaled fence should time out");
    assert!(matches!(error.downcast_ref::<Error>(), Some(Error::FenceTimeout(_))));
    Ok(())
}

#[test]
pub fn fence_reset_unsignals() -> Result<()> {
    let context = framework::make_context()?;
    let fence = Fence::new(context.device.clone(), true)?;
    fence.wait()?;
    fence.reset()?;
    assert!(!fence.is_signaled()?);
    Ok(())
}

#[test]
pub fn sync_objects_are_destroyed_on_drop() -> Result<()> {
    let context = framework::make_context()?;
    {
        let _semaphore = Semaphore::new(context.device.clone())?;
        let _fence = Fence::new(context.device.clone(), false)?;
        assert_eq!(context.headless.live_semaphores(), 1);
        assert_eq!(context.headless.live_fences(), 1);
    }
    assert_eq!(context.headless.live_semaphores(), 0);
    assert_eq!(context.headless.live_fences(), 0);
    Ok(())
}

#[test]
pub fn token_drops_null_waits() {
    let semaphore = vk::Semaphore::from_raw(42);
    let token = SemaphoreToken::from_waits(&[vk::Semaphore::null(), semaphore]);
    assert_eq!(token.handles(), &[semaphore]);
    assert_eq!(token.wait_stages(vk::PipelineStageFlags::ALL_COMMANDS), vec![vk::PipelineStageFlags::ALL_COMMANDS]);
    assert!(SemaphoreToken::from_waits(&[vk::Semaphore::null()]).is_empty());
    assert_eq!(SemaphoreToken::signaled(semaphore), token);
}
