//! Per-frame assignment of shadow casting lights to shadow map slots.
//!
//! For every [`LightType`], the lights that produce shadows and can affect the visible scene are
//! ranked by their distance to the camera. The closest ones fill the shadow maps of that type in
//! registration order, each map taking as many lights as it has slots. Lights beyond the total
//! capacity get no shadows this frame.
//!
//! # Example
//! ```
//! # use selene::scene::*;
//! # use selene::frame::ShadowPreparer;
//! # use glam::Vec3;
//! let camera = Camera::perspective(Vec3::ZERO, Vec3::NEG_Z, 1.0, 1.0, 0.1, 100.0);
//! let lights = [
//!     Light::directional(LightId(0), Vec3::new(0.0, 0.0, -50.0), Vec3::NEG_Y),
//!     Light::directional(LightId(1), Vec3::new(0.0, 0.0, -5.0), Vec3::NEG_Y),
//! ];
//! assert_eq!(ShadowPreparer::select(&lights, &camera, 1), vec![1]);
//! ```

use anyhow::Result;
use multimap::MultiMap;

use crate::frame::shadow::ShadowMap;
use crate::scene::{Camera, Light, LightCache, LightId, LightType, ShadowBinding};

/// A shadow map that received at least one light this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveShadowMap {
    /// Index of the map among the maps registered for its light type.
    pub map_index: usize,
    /// Lights bound to the map, with their slot, in slot order.
    pub lights: Vec<(LightId, u32)>,
}

/// The shadow maps to render this frame, grouped by light type.
#[derive(Debug)]
pub struct ActiveShadowMapSet {
    maps: MultiMap<LightType, ActiveShadowMap>,
}

impl Default for ActiveShadowMapSet {
    fn default() -> Self {
        Self {
            maps: MultiMap::new(),
        }
    }
}

impl ActiveShadowMapSet {
    /// Active maps of one light type, in registration order.
    pub fn get(&self, light_type: LightType) -> &[ActiveShadowMap] {
        self.maps.get_vec(&light_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every active map, ordered by light type then registration order.
    pub fn iter(&self) -> impl Iterator<Item = (LightType, &ActiveShadowMap)> + '_ {
        LightType::ALL
            .into_iter()
            .flat_map(move |ty| self.get(ty).iter().map(move |map| (ty, map)))
    }

    /// Number of active maps over all light types.
    pub fn len(&self) -> usize {
        self.maps.iter_all().map(|(_, maps)| maps.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Number of lights with a shadow this frame.
    pub fn light_count(&self) -> usize {
        self.iter().map(|(_, map)| map.lights.len()).sum()
    }
}

/// Selects the shadow casting lights of each frame and binds them to shadow map slots.
#[derive(Debug, Default, Copy, Clone)]
pub struct ShadowPreparer;

impl ShadowPreparer {
    pub fn new() -> Self {
        Self
    }

    /// Whether `light` should be considered for a shadow this frame. Directional lights affect the
    /// whole scene, other lights only if their volume of influence touches the view frustum.
    pub fn is_eligible(light: &Light, camera: &Camera) -> bool {
        if !light.is_shadow_producer() {
            return false;
        }
        match light.bounding_volume() {
            None => true,
            Some(volume) => camera.frustum().intersects_sphere(&volume),
        }
    }

    /// Indices into `lights` of the eligible lights that get a shadow, closest to the camera first.
    /// At most `capacity` indices are returned. Equally distant lights keep their input order.
    pub fn select(lights: &[Light], camera: &Camera, capacity: usize) -> Vec<usize> {
        let eye = camera.position();
        let mut ranked = lights
            .iter()
            .enumerate()
            .filter(|(_, light)| Self::is_eligible(light, camera))
            .map(|(index, light)| (index, light.squared_distance_to(eye)))
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.into_iter().take(capacity).map(|(index, _)| index).collect()
    }

    /// Bind the selected lights of every type to the slots of `maps`, indexed by
    /// [`LightType::index`]. Bindings from the previous frame are cleared first, both on the lights
    /// and on the maps.
    pub fn prepare(
        &self,
        lights: &mut LightCache,
        camera: &Camera,
        maps: &mut [Vec<Box<dyn ShadowMap>>; 3],
    ) -> Result<ActiveShadowMapSet> {
        let mut active = MultiMap::new();
        for ty in LightType::ALL {
            let maps = &mut maps[ty.index()];
            for light in lights.lights_mut(ty) {
                light.set_shadow_binding(None);
            }
            for map in maps.iter_mut() {
                map.clear_lights();
            }

            let capacity = maps.iter().map(|map| map.capacity() as usize).sum();
            if capacity == 0 {
                continue;
            }
            let selected = Self::select(lights.lights(ty), camera, capacity);
            let mut selected = selected.into_iter();
            for (map_index, map) in maps.iter_mut().enumerate() {
                let mut bound = Vec::new();
                for slot in 0..map.capacity() {
                    let Some(index) = selected.next() else {
                        break;
                    };
                    let light = &mut lights.lights_mut(ty)[index];
                    light.set_shadow_binding(Some(ShadowBinding {
                        map_index,
                        slot,
                    }));
                    map.update_light(camera, light, slot)?;
                    bound.push((light.id(), slot));
                }
                if bound.is_empty() {
                    break;
                }
                trace!("{:?} shadow map #{} holds {} lights", ty, map_index, bound.len());
                active.insert(
                    ty,
                    ActiveShadowMap {
                        map_index,
                        lights: bound,
                    },
                );
            }
        }
        Ok(ActiveShadowMapSet {
            maps: active,
        })
    }
}
