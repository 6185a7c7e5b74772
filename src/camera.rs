//! Orbit/follow camera, projection and the camera uniform.
//!
//! The camera orbits a target point. Its orientation is given by yaw and
//! pitch (degrees), its position is derived: `position = target - distance * front`.

use cgmath::{Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3};

use crate::config::{CameraConfig, CameraLimits, ProjectionConfig};

/// cgmath produces OpenGL clip space (z in -1..1) while wgpu expects 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub target: Vector3<f32>,
    pub distance: f32,
    pub yaw: Deg<f32>,
    pub pitch: Deg<f32>,
    pub world_up: Vector3<f32>,
    pub limits: CameraLimits,
    sensitivity: f32,
    zoom_step: f32,
    front: Vector3<f32>,
    right: Vector3<f32>,
    up: Vector3<f32>,
    position: Vector3<f32>,
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Self {
        let world_up: Vector3<f32> = config.world_up.into();
        let mut camera = Self {
            target: config.target.into(),
            distance: config.distance,
            yaw: Deg(config.yaw),
            pitch: Deg(config.pitch),
            world_up,
            limits: config.limits,
            sensitivity: config.mouse_sensitivity,
            zoom_step: config.zoom_step,
            front: -Vector3::unit_z(),
            right: Vector3::unit_x(),
            up: world_up,
            position: Vector3::new(0.0, 0.0, 0.0),
        };
        camera.update_vectors();
        camera
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    /// Turn the camera by a mouse delta in pixels.
    ///
    /// Yaw is wrapped into `[0, 360)`, pitch is clamped to the current limits.
    pub fn process_rotation(&mut self, dx: f32, dy: f32) {
        let dx = dx * self.sensitivity;
        let dy = dy * self.sensitivity;

        self.yaw = wrap_degrees(self.yaw + Deg(dx));
        self.pitch = Deg((self.pitch.0 + dy).clamp(self.limits.min_pitch, self.limits.max_pitch));

        self.update_vectors();
    }

    /// Step the orbit distance by one zoom step in the sign of `scroll_delta`.
    pub fn process_zoom(&mut self, scroll_delta: f32) {
        if scroll_delta == 0.0 || scroll_delta.is_nan() {
            return;
        }
        let step = self.zoom_step.copysign(scroll_delta);
        self.distance = self.clamp_distance(self.distance + step);
        self.update_vectors();
    }

    /// Move the orbit center. Yaw and pitch are left untouched.
    pub fn set_target(&mut self, target: Vector3<f32>) {
        self.target = target;
        self.update_vectors();
    }

    /// Replace the pitch/distance bounds and pull the current pose into them.
    pub fn set_limits(&mut self, limits: CameraLimits) {
        if self.limits == limits {
            return;
        }
        self.limits = limits;
        self.pitch = Deg(self.pitch.0.clamp(limits.min_pitch, limits.max_pitch));
        self.distance = self.clamp_distance(self.distance);
        self.update_vectors();
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(
            Point3::from_vec(self.position),
            Point3::from_vec(self.target),
            self.up,
        )
    }

    fn clamp_distance(&self, distance: f32) -> f32 {
        distance.clamp(self.limits.min_distance, self.limits.max_distance)
    }

    fn update_vectors(&mut self) {
        let yaw: Rad<f32> = self.yaw.into();
        let pitch: Rad<f32> = self.pitch.into();
        let (sin_pitch, cos_pitch) = pitch.0.sin_cos();
        let (sin_yaw, cos_yaw) = yaw.0.sin_cos();

        self.front = Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw).normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
        self.position = self.target - self.front * self.distance;
    }
}

fn wrap_degrees(angle: Deg<f32>) -> Deg<f32> {
    if (0.0..360.0).contains(&angle.0) {
        return angle;
    }
    let wrapped = angle.0.rem_euclid(360.0);
    // rem_euclid rounds tiny negative angles up to exactly 360
    if wrapped >= 360.0 { Deg(0.0) } else { Deg(wrapped) }
}

/// Perspective projection that follows the viewport size.
#[derive(Clone, Debug)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: aspect(width, height),
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn from_config(width: u32, height: u32, config: &ProjectionConfig) -> Self {
        Self::new(width, height, Deg(config.fovy), config.znear, config.zfar)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect(width, height);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

/// Camera data as the shader sees it.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view: Matrix4::identity().into(),
            proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position().extend(1.0).into();
        self.view = camera.view_matrix().into();
        self.proj = projection.calc_matrix().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}
