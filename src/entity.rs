//! The navigable entity (the airship) and the camera follow logic.
//!
//! Each tick the entity moves along the camera's horizontal basis, turns to
//! face its direction of travel and then hands the camera a new target.
//! Toggling spotlight mode starts a camera transition that eases the target
//! over to the new follow point instead of jumping there.

use std::f32::consts::{PI, TAU};

use cgmath::{InnerSpace, Matrix4, Rad, Vector3, Zero};

use crate::{
    camera::Camera,
    config::{CameraLimits, EntityConfig, TransitionMode},
    data_structures::batch::InstanceBatch,
    input::MovementFlags,
    render::{FrameUniforms, GraphicsDevice},
};

#[derive(Clone, Debug, PartialEq)]
pub struct EntityState {
    pub position: Vector3<f32>,
    /// Kept within `(-2π, 2π)`.
    pub yaw: Rad<f32>,
    pub roll: Rad<f32>,
    pub spotlight_engaged: bool,
    pub camera_transitioning: bool,
}

impl EntityState {
    pub fn new(spotlight_engaged: bool) -> Self {
        Self {
            position: Vector3::zero(),
            yaw: Rad(0.0),
            roll: Rad(0.0),
            spotlight_engaged,
            camera_transitioning: false,
        }
    }
}

#[derive(Debug)]
pub struct Entity {
    pub state: EntityState,
    config: EntityConfig,
    free_limits: CameraLimits,
    batch: Option<InstanceBatch>,
}

impl Entity {
    /// `free_limits` are the camera limits outside of spotlight mode.
    pub fn new(config: EntityConfig, free_limits: CameraLimits) -> Self {
        Self {
            state: EntityState::new(config.spotlight_engaged),
            config,
            free_limits,
            batch: None,
        }
    }

    /// Give the entity its mesh. Without one the entity still moves but draws nothing.
    pub fn attach(&mut self, batch: InstanceBatch) {
        self.batch = Some(batch);
    }

    pub fn batch(&self) -> Option<&InstanceBatch> {
        self.batch.as_ref()
    }

    pub fn batch_mut(&mut self) -> Option<&mut InstanceBatch> {
        self.batch.as_mut()
    }

    /// Flip between spotlight and plain follow mode and start a camera transition.
    pub fn toggle_spotlight(&mut self) {
        self.state.spotlight_engaged = !self.state.spotlight_engaged;
        self.state.camera_transitioning = true;
        log::debug!(
            "spotlight {}",
            if self.state.spotlight_engaged { "on" } else { "off" }
        );
    }

    pub fn update(&mut self, dt: f32, movement: MovementFlags, camera: &mut Camera) {
        self.advance(dt, movement, camera);
        self.follow(dt, camera);
    }

    fn advance(&mut self, dt: f32, movement: MovementFlags, camera: &Camera) {
        let forward = horizontal(camera.front());
        let right = horizontal(camera.right());
        let up = if camera.world_up.is_zero() {
            Vector3::unit_y()
        } else {
            camera.world_up.normalize()
        };
        let step = self.config.move_speed * dt;

        let mut displacement = Vector3::zero();
        if movement.forward {
            displacement += forward;
        }
        if movement.back {
            displacement -= forward;
        }
        if movement.right {
            displacement += right;
        }
        if movement.left {
            displacement -= right;
        }
        if movement.up {
            displacement += up;
        }
        if movement.down {
            displacement -= up;
        }
        self.state.position += displacement * step;

        if movement.any_horizontal() && !forward.is_zero() {
            let target_yaw = -forward.z.atan2(forward.x);
            let delta = wrap_pi(target_yaw - self.state.yaw.0);
            if delta.abs() >= self.config.yaw_deadzone {
                // Never past the target heading, however long the frame
                let fraction = (dt * self.config.rotation_speed).min(1.0);
                self.state.yaw.0 += delta * fraction;
            }
            self.state.yaw = Rad(self.state.yaw.0 % TAU);
        }
    }

    /// Point the camera at the follow target, easing towards it during a transition.
    fn follow(&mut self, dt: f32, camera: &mut Camera) {
        let limits = if self.state.spotlight_engaged {
            self.config.spotlight_limits
        } else {
            self.free_limits
        };
        camera.set_limits(limits);

        let desired = self.desired_target(camera);
        if !self.state.camera_transitioning {
            camera.set_target(desired);
            return;
        }

        let transition = self.config.transition;
        let mut next = match transition.mode {
            TransitionMode::Smooth { smoothing } if smoothing > 0.0 => {
                let blend = 1.0 - (-smoothing * dt).exp();
                camera.target + (desired - camera.target) * blend
            }
            _ => desired,
        };
        if (desired - next).magnitude() < transition.arrival_threshold {
            next = desired;
            self.state.camera_transitioning = false;
        }
        camera.set_target(next);
    }

    pub fn desired_target(&self, camera: &Camera) -> Vector3<f32> {
        let position = self.state.position;
        if !self.state.spotlight_engaged {
            return position;
        }
        let front = camera.front();
        position
            + front * self.config.spotlight_lead
            + Vector3::new(front.x, -self.config.spotlight_drop, 0.0)
                * self.config.spotlight_offset_scale
    }

    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.state.position)
            * Matrix4::from_angle_y(Rad(PI) + self.state.yaw)
            * Matrix4::from_angle_z(self.state.roll)
    }

    /// Draw the entity through its one-instance batch.
    pub fn render<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, uniforms: &FrameUniforms) {
        let model = self.model_matrix();
        if let Some(batch) = self.batch.as_mut() {
            batch.set_instances([model]);
            batch.draw(device, uniforms);
        }
    }
}

/// Projection onto the ground plane, normalized. Zero if `v` is vertical.
fn horizontal(v: Vector3<f32>) -> Vector3<f32> {
    let flat = Vector3::new(v.x, 0.0, v.z);
    if flat.magnitude2() < 1e-12 {
        Vector3::zero()
    } else {
        flat.normalize()
    }
}

/// Signed shortest angle, in `[-π, π]`.
fn wrap_pi(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped < -PI { wrapped + TAU } else { wrapped }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::config::{CameraConfig, TransitionConfig};

    const DT: f32 = 1.0 / 60.0;

    fn setup(config: EntityConfig) -> (Entity, Camera) {
        let camera_config = CameraConfig::default();
        let camera = Camera::new(&camera_config);
        (Entity::new(config, camera_config.limits), camera)
    }

    fn forward_only() -> MovementFlags {
        MovementFlags {
            forward: true,
            ..Default::default()
        }
    }

    #[test]
    fn wrap_pi_picks_the_short_way_round() {
        assert_abs_diff_eq!(wrap_pi(0.5), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(wrap_pi(1.5 * PI), -0.5 * PI, epsilon = 1e-5);
        assert_abs_diff_eq!(wrap_pi(-1.5 * PI), 0.5 * PI, epsilon = 1e-5);
        for i in -100..100 {
            let a = wrap_pi(i as f32 * 0.37);
            assert!((-PI..=PI).contains(&a));
        }
    }

    #[test]
    fn entity_at_rest_does_not_drift() {
        let (mut entity, mut camera) = setup(EntityConfig::default());
        entity.update(DT, MovementFlags::default(), &mut camera);
        let before = entity.state.clone();
        for _ in 0..10 {
            entity.update(DT, MovementFlags::default(), &mut camera);
        }
        assert_eq!(entity.state.position, before.position);
        assert_eq!(entity.state.yaw, before.yaw);
        assert_eq!(entity.state.roll, before.roll);
    }

    #[test]
    fn one_second_of_travel_covers_move_speed() {
        let (mut entity, mut camera) = setup(EntityConfig::default());
        let start = entity.state.position;
        let direction = horizontal(camera.front());
        for _ in 0..60 {
            entity.update(DT, forward_only(), &mut camera);
        }
        let travelled = entity.state.position - start;
        assert_abs_diff_eq!(travelled.magnitude(), 1.5, epsilon = 1e-3);
        assert_abs_diff_eq!(travelled.normalize().dot(direction), 1.0, epsilon = 1e-4);
        assert_eq!(travelled.y, 0.0);
    }

    #[test]
    fn vertical_keys_move_along_world_up_without_turning() {
        let (mut entity, mut camera) = setup(EntityConfig::default());
        let up = MovementFlags {
            up: true,
            ..Default::default()
        };
        for _ in 0..60 {
            entity.update(DT, up, &mut camera);
        }
        assert_abs_diff_eq!(entity.state.position.y, 1.5, epsilon = 1e-3);
        assert_abs_diff_eq!(entity.state.position.x, 0.0, epsilon = 1e-6);
        assert_eq!(entity.state.yaw, Rad(0.0));
    }

    #[test]
    fn yaw_turns_towards_the_direction_of_travel() {
        let (mut entity, mut camera) = setup(EntityConfig::default());
        // Camera looks down -z, so the target yaw is atan2 based: -atan2(-1, 0) = π/2
        let target = PI / 2.0;
        let mut previous_gap = (target - entity.state.yaw.0).abs();
        for _ in 0..120 {
            entity.update(DT, forward_only(), &mut camera);
            let gap = (target - entity.state.yaw.0).abs();
            assert!(gap <= previous_gap);
            previous_gap = gap;
        }
        assert!(previous_gap < PI / 2.0);
        assert!(entity.state.yaw.0.abs() < TAU);
    }

    #[test]
    fn a_stalled_frame_does_not_overshoot_the_heading() {
        let (mut entity, mut camera) = setup(EntityConfig::default());
        let target = PI / 2.0;
        let before = wrap_pi(target - entity.state.yaw.0).abs();
        entity.update(5.0, forward_only(), &mut camera);
        let after = wrap_pi(target - entity.state.yaw.0).abs();
        assert!(after <= before);
        assert_abs_diff_eq!(entity.state.yaw.0, target, epsilon = 1e-5);
    }

    #[test]
    fn yaw_wraps_past_a_full_turn_and_still_converges() {
        let (mut entity, mut camera) = setup(EntityConfig::default());
        // The short way to π/2 crosses 2π
        entity.state.yaw = Rad(TAU - 0.01);
        let target = PI / 2.0;
        let mut previous_gap = wrap_pi(target - entity.state.yaw.0).abs();
        let mut wrapped = false;
        for _ in 0..600 {
            entity.update(DT, forward_only(), &mut camera);
            let yaw = entity.state.yaw.0;
            assert!(yaw > -TAU && yaw <= TAU, "yaw {yaw} out of range");
            wrapped |= yaw < PI;
            let gap = wrap_pi(target - yaw).abs();
            assert!(gap <= previous_gap + 1e-5);
            previous_gap = gap;
        }
        assert!(wrapped);
        assert!(previous_gap < 2.0 * EntityConfig::default().yaw_deadzone);
    }

    #[test]
    fn small_yaw_differences_are_ignored() {
        let (mut entity, mut camera) = setup(EntityConfig::default());
        entity.state.yaw = Rad(PI / 2.0 - 0.005);
        entity.update(DT, forward_only(), &mut camera);
        assert_eq!(entity.state.yaw, Rad(PI / 2.0 - 0.005));
    }

    #[test]
    fn smooth_transition_arrives_in_bounded_frames() {
        let (mut entity, mut camera) = setup(EntityConfig::default());
        entity.update(DT, MovementFlags::default(), &mut camera);

        entity.toggle_spotlight();
        assert!(entity.state.camera_transitioning);
        assert!(!entity.state.spotlight_engaged);

        let mut frames = 0;
        let mut previous_gap = f32::MAX;
        while entity.state.camera_transitioning {
            entity.update(DT, MovementFlags::default(), &mut camera);
            let gap = (entity.desired_target(&camera) - camera.target).magnitude();
            assert!(gap <= previous_gap);
            previous_gap = gap;
            frames += 1;
            assert!(frames < 300, "transition never finished");
        }
        assert!(frames > 1, "transition should not be instantaneous");
        assert_eq!(camera.target, entity.desired_target(&camera));
    }

    #[test]
    fn snap_transition_finishes_on_the_first_frame() {
        let config = EntityConfig {
            transition: TransitionConfig {
                mode: TransitionMode::Snap,
                ..Default::default()
            },
            ..Default::default()
        };
        let (mut entity, mut camera) = setup(config);
        entity.update(DT, MovementFlags::default(), &mut camera);
        entity.toggle_spotlight();
        entity.update(DT, MovementFlags::default(), &mut camera);
        assert!(!entity.state.camera_transitioning);
        assert_eq!(camera.target, entity.state.position);
    }

    #[test]
    fn spotlight_mode_tightens_the_camera() {
        let (mut entity, mut camera) = setup(EntityConfig::default());
        entity.update(DT, MovementFlags::default(), &mut camera);
        assert_eq!(camera.limits, EntityConfig::default().spotlight_limits);
        assert_eq!(camera.distance, 5.5);

        entity.toggle_spotlight();
        entity.update(DT, MovementFlags::default(), &mut camera);
        assert_eq!(camera.limits, CameraConfig::default().limits);
    }

    #[test]
    fn model_matrix_faces_backwards_by_default() {
        let (entity, _) = setup(EntityConfig::default());
        let p = entity.model_matrix() * cgmath::Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_abs_diff_eq!(p.x, -1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.z, 0.0, epsilon = 1e-5);
    }
}
