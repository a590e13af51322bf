use glam::Vec3;

use selene::scene::{BoundingSphere, Camera, Light, LightCache, LightId, LightType};

mod framework;

#[test]
pub fn frustum_contains_points_in_view() {
    let camera = framework::camera();
    let frustum = camera.frustum();
    assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
    assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 10.0)));
    // Beyond the far plane
    assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -150.0)));
    // Far off to the side
    assert!(!frustum.contains_point(Vec3::new(100.0, 0.0, -10.0)));
}

#[test]
pub fn spheres_touching_frustum_intersect() {
    let camera = framework::camera();
    let frustum = camera.frustum();
    let behind_near = BoundingSphere {
        center: Vec3::new(0.0, 0.0, 1.0),
        radius: 2.0,
    };
    let far_behind = BoundingSphere {
        center: Vec3::new(0.0, 0.0, 10.0),
        radius: 2.0,
    };
    assert!(frustum.intersects_sphere(&behind_near));
    assert!(!frustum.intersects_sphere(&far_behind));
}

#[test]
pub fn frustum_follows_camera_update() {
    let mut camera = Camera::perspective(Vec3::ZERO, Vec3::NEG_Z, 1.0, 1.0, 0.1, 100.0);
    let point = Vec3::new(0.0, 0.0, 10.0);
    assert!(!camera.frustum().contains_point(point));
    camera.look_at(Vec3::ZERO, Vec3::Z);
    // Not applied until the next update
    assert!(!camera.frustum().contains_point(point));
    camera.update();
    assert!(camera.frustum().contains_point(point));
}

#[test]
pub fn light_cache_groups_by_type() {
    let mut cache = LightCache::new();
    cache.add(Light::point(LightId(0), Vec3::ZERO, 1.0));
    cache.add(Light::directional(LightId(1), Vec3::ZERO, Vec3::NEG_Y));
    cache.add(Light::point(LightId(2), Vec3::ONE, 1.0));
    assert_eq!(cache.len(), 3);
    let points = cache.lights(LightType::Point).iter().map(Light::id).collect::<Vec<_>>();
    assert_eq!(points, vec![LightId(0), LightId(2)]);

    let removed = cache.remove(LightId(0)).expect("light was added");
    assert_eq!(removed.light_type(), LightType::Point);
    assert!(cache.get(LightId(0)).is_none());
    assert_eq!(cache.lights(LightType::Point).len(), 1);
    assert!(cache.remove(LightId(0)).is_none());
}

#[test]
pub fn directional_lights_have_no_volume() {
    let sun = Light::directional(LightId(0), Vec3::ZERO, Vec3::new(0.0, -2.0, 0.0));
    assert!(sun.bounding_volume().is_none());
    assert_eq!(sun.direction(), Vec3::NEG_Y);
    let lamp = Light::spot(LightId(1), Vec3::X, Vec3::NEG_Z, 4.0);
    assert_eq!(
        lamp.bounding_volume(),
        Some(BoundingSphere {
            center: Vec3::X,
            radius: 4.0
        })
    );
}
