use glam::Vec3;

use crate::scene::camera::BoundingSphere;

/// The three kinds of light, each with its own shadow map type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LightType {
    Directional,
    Point,
    Spot,
}

impl LightType {
    /// All light types, in the order their shadow maps are rendered.
    pub const ALL: [LightType; 3] = [LightType::Directional, LightType::Point, LightType::Spot];

    /// Dense index of this light type, usable to index per-type arrays.
    pub fn index(self) -> usize {
        match self {
            LightType::Directional => 0,
            LightType::Point => 1,
            LightType::Spot => 2,
        }
    }
}

/// Stable identifier of a light in the scene.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u32);

/// Where a light's shadow is rendered this frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShadowBinding {
    /// Index of the shadow map among the maps registered for the light's type.
    pub map_index: usize,
    /// Slot inside that shadow map.
    pub slot: u32,
}

/// A light as seen by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    id: LightId,
    light_type: LightType,
    position: Vec3,
    direction: Vec3,
    range: f32,
    shadow_producer: bool,
    shadow_binding: Option<ShadowBinding>,
}

impl Light {
    fn new(id: LightId, light_type: LightType, position: Vec3, direction: Vec3, range: f32) -> Self {
        Self {
            id,
            light_type,
            position,
            direction,
            range,
            shadow_producer: true,
            shadow_binding: None,
        }
    }

    /// A directional light. `position` is the position of its scene node, used to rank lights by distance.
    pub fn directional(id: LightId, position: Vec3, direction: Vec3) -> Self {
        Self::new(id, LightType::Directional, position, direction.normalize_or_zero(), f32::INFINITY)
    }

    /// A point light influencing everything within `range`.
    pub fn point(id: LightId, position: Vec3, range: f32) -> Self {
        Self::new(id, LightType::Point, position, Vec3::ZERO, range)
    }

    /// A spot light shining along `direction`, influencing everything within `range`.
    pub fn spot(id: LightId, position: Vec3, direction: Vec3, range: f32) -> Self {
        Self::new(id, LightType::Spot, position, direction.normalize_or_zero(), range)
    }

    /// Builder-style toggle of shadow production.
    pub fn with_shadows(mut self, enabled: bool) -> Self {
        self.shadow_producer = enabled;
        self
    }

    pub fn id(&self) -> LightId {
        self.id
    }

    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn is_shadow_producer(&self) -> bool {
        self.shadow_producer
    }

    pub fn set_shadow_producer(&mut self, enabled: bool) {
        self.shadow_producer = enabled;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Volume of influence. Directional lights have none, they affect the whole scene.
    pub fn bounding_volume(&self) -> Option<BoundingSphere> {
        match self.light_type {
            LightType::Directional => None,
            LightType::Point | LightType::Spot => Some(BoundingSphere {
                center: self.position,
                radius: self.range,
            }),
        }
    }

    pub fn squared_distance_to(&self, point: Vec3) -> f32 {
        self.position.distance_squared(point)
    }

    /// Shadow map this light was bound to for the current frame, if any.
    pub fn shadow_binding(&self) -> Option<ShadowBinding> {
        self.shadow_binding
    }

    pub fn set_shadow_binding(&mut self, binding: Option<ShadowBinding>) {
        self.shadow_binding = binding;
    }
}

/// Every light of the scene, grouped by type. Iteration order inside a type is insertion order.
#[derive(Debug, Clone, Default)]
pub struct LightCache {
    lights: [Vec<Light>; 3],
}

impl LightCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a light at the end of its type's list.
    pub fn add(&mut self, light: Light) {
        self.lights[light.light_type().index()].push(light);
    }

    /// Remove a light. Returns it if it was present.
    pub fn remove(&mut self, id: LightId) -> Option<Light> {
        self.lights.iter_mut().find_map(|lights| {
            let index = lights.iter().position(|light| light.id() == id)?;
            Some(lights.remove(index))
        })
    }

    pub fn lights(&self, light_type: LightType) -> &[Light] {
        self.lights[light_type.index()].as_slice()
    }

    pub fn lights_mut(&mut self, light_type: LightType) -> &mut [Light] {
        self.lights[light_type.index()].as_mut_slice()
    }

    pub fn get(&self, id: LightId) -> Option<&Light> {
        self.lights.iter().flatten().find(|light| light.id() == id)
    }

    pub fn get_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.iter_mut().flatten().find(|light| light.id() == id)
    }

    /// Total number of lights of all types.
    pub fn len(&self) -> usize {
        self.lights.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
