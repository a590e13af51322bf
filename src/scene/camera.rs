use glam::{Mat4, Vec3, Vec4};

/// Sphere enclosing the influence of a light or the extent of an object.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Six normalized planes, each facing into the view volume: left, right, bottom, top, near, far.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract the planes of a view-projection matrix with a `[0, 1]` depth range.
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(|plane| {
            let length = plane.truncate().length();
            if length > 0.0 {
                plane / length
            } else {
                plane
            }
        });
        Self {
            planes,
        }
    }

    /// Whether `sphere` touches the view volume.
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(sphere.center) + plane.w >= -sphere.radius)
    }

    /// Whether `point` lies inside the view volume.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.intersects_sphere(&BoundingSphere {
            center: point,
            radius: 0.0,
        })
    }

    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }
}

/// The active camera. Matrices and frustum are recomputed by [`Camera::update`], which the frame
/// orchestrator calls at the start of every CPU update.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    target: Vec3,
    up: Vec3,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
    view: Mat4,
    projection: Mat4,
    frustum: Frustum,
}

impl Camera {
    /// A right-handed perspective camera at `position` looking at `target`. `fov_y` is in radians.
    pub fn perspective(position: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position,
            target,
            up: Vec3::Y,
            fov_y,
            aspect,
            near,
            far,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            frustum: Frustum::from_view_projection(&Mat4::IDENTITY),
        };
        camera.update();
        camera
    }

    /// Recompute view, projection and frustum from the current parameters.
    pub fn update(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.target, self.up);
        self.projection = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        self.frustum = Frustum::from_view_projection(&self.view_projection());
    }

    /// Move the camera. Takes effect on the next [`update`](Self::update).
    pub fn look_at(&mut self, position: Vec3, target: Vec3) {
        self.position = position;
        self.target = target;
    }

    /// Change the aspect ratio, e.g. after a resize. Takes effect on the next [`update`](Self::update).
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }
}
