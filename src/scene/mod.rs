//! The slice of the scene this crate consumes: the active camera and the light cache.
//!
//! The scene graph itself lives elsewhere. Lights are copied into a [`LightCache`] every frame, and
//! the frame orchestrator writes the shadow map binding of each light back into it.

pub mod camera;
pub mod light;

pub use camera::{BoundingSphere, Camera, Frustum};
pub use light::{Light, LightCache, LightId, LightType, ShadowBinding};
