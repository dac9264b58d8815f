//! Physics collaborator boundary.
//!
//! The core only creates bodies and revolute joints, issues joint commands
//! and reads joint angles and body positions. [`PhysicsWorld`] is that
//! surface; any rigid-body engine can sit behind it.
//!
//! [`KinematicWorld`] is a deterministic headless implementation: motors
//! drive joint angles directly and a torso is pushed forward by the hip
//! strokes of its legs, with feet gripping only while the knee is extended.

use crate::schema::{Parcour, Point};

/// Opaque reference to a body owned by a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub usize);

/// Opaque reference to a revolute joint owned by a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointHandle(pub usize);

/// Parameters of a new rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub position: Point,
    pub mass: f32,
    /// Extent along the body's main axis.
    pub length: f32,
    pub width: f32,
}

/// Observable state of a revolute joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointState {
    pub angle: f32,
    pub limits: (f32, f32),
    pub motor_enabled: bool,
    pub motor_speed: f32,
}

/// A 2D rigid-body world with revolute constraints.
///
/// Commands addressed to removed or unknown handles are ignored and
/// queries on them return `None`.
pub trait PhysicsWorld: Send {
    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle;

    /// Join `a` and `b` at the given body-local pivots.
    fn create_revolute_joint(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        pivot_a: Point,
        pivot_b: Point,
    ) -> JointHandle;

    fn set_limits(&mut self, joint: JointHandle, min: f32, max: f32);

    fn enable_motor(&mut self, joint: JointHandle);

    fn disable_motor(&mut self, joint: JointHandle);

    fn set_motor_speed(&mut self, joint: JointHandle, speed: f32);

    fn joint_state(&self, joint: JointHandle) -> Option<JointState>;

    fn body_position(&self, body: BodyHandle) -> Option<Point>;

    fn remove_joint(&mut self, joint: JointHandle);

    fn remove_body(&mut self, body: BodyHandle);

    /// Advance the world by `dt` seconds.
    fn step(&mut self, dt: f32);

    fn joint_angle(&self, joint: JointHandle) -> Option<f32> {
        self.joint_state(joint).map(|s| s.angle)
    }

    fn joint_limits(&self, joint: JointHandle) -> Option<(f32, f32)> {
        self.joint_state(joint).map(|s| s.limits)
    }
}

/// Foot grip while the knee is flexed.
const SLIP_GRIP: f32 = 0.25;

#[derive(Debug, Clone)]
struct BodySlot {
    position: Point,
    length: f32,
    /// Root of the body's joint tree.
    root: usize,
}

#[derive(Debug, Clone)]
struct JointSlot {
    a: usize,
    b: usize,
    state: JointState,
}

/// Deterministic headless world over a height field.
#[derive(Debug, Clone)]
pub struct KinematicWorld {
    parcour: Parcour,
    bodies: Vec<Option<BodySlot>>,
    joints: Vec<Option<JointSlot>>,
    time: f32,
}

impl KinematicWorld {
    pub fn new(parcour: Parcour) -> Self {
        Self {
            parcour,
            bodies: Vec::new(),
            joints: Vec::new(),
            time: 0.0,
        }
    }

    /// Simulated time.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    /// Number of live joints.
    pub fn joint_count(&self) -> usize {
        self.joints.iter().flatten().count()
    }

    fn joint_mut(&mut self, joint: JointHandle) -> Option<&mut JointSlot> {
        self.joints.get_mut(joint.0).and_then(Option::as_mut)
    }

    fn body(&self, index: usize) -> Option<&BodySlot> {
        self.bodies.get(index).and_then(Option::as_ref)
    }

    /// Forward push of one leg for a hip stroke of `delta` radians.
    fn stroke(&self, hip: &JointSlot, knee: Option<&JointSlot>, delta: f32) -> f32 {
        let thigh = self.body(hip.b).map_or(0.0, |b| b.length);
        let shank = knee
            .and_then(|k| self.body(k.b))
            .map_or(0.0, |b| b.length);
        let grip = match knee {
            Some(k) if k.state.angle < 0.0 => SLIP_GRIP,
            _ => 1.0,
        };
        -delta * grip * (thigh + shank)
    }
}

impl PhysicsWorld for KinematicWorld {
    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let index = self.bodies.len();
        self.bodies.push(Some(BodySlot {
            position: desc.position,
            length: desc.length,
            root: index,
        }));
        BodyHandle(index)
    }

    fn create_revolute_joint(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        _pivot_a: Point,
        _pivot_b: Point,
    ) -> JointHandle {
        let root = self.body(a.0).map_or(a.0, |body| body.root);
        if let Some(Some(child)) = self.bodies.get_mut(b.0) {
            child.root = root;
        }
        let index = self.joints.len();
        self.joints.push(Some(JointSlot {
            a: a.0,
            b: b.0,
            state: JointState {
                angle: 0.0,
                limits: (f32::NEG_INFINITY, f32::INFINITY),
                motor_enabled: false,
                motor_speed: 0.0,
            },
        }));
        JointHandle(index)
    }

    fn set_limits(&mut self, joint: JointHandle, min: f32, max: f32) {
        if let Some(slot) = self.joint_mut(joint) {
            slot.state.limits = (min, max);
        }
    }

    fn enable_motor(&mut self, joint: JointHandle) {
        if let Some(slot) = self.joint_mut(joint) {
            slot.state.motor_enabled = true;
        }
    }

    fn disable_motor(&mut self, joint: JointHandle) {
        if let Some(slot) = self.joint_mut(joint) {
            slot.state.motor_enabled = false;
        }
    }

    fn set_motor_speed(&mut self, joint: JointHandle, speed: f32) {
        if let Some(slot) = self.joint_mut(joint) {
            slot.state.motor_speed = speed;
        }
    }

    fn joint_state(&self, joint: JointHandle) -> Option<JointState> {
        self.joints
            .get(joint.0)
            .and_then(Option::as_ref)
            .map(|slot| slot.state)
    }

    fn body_position(&self, body: BodyHandle) -> Option<Point> {
        self.body(body.0).map(|slot| slot.position)
    }

    fn remove_joint(&mut self, joint: JointHandle) {
        if let Some(slot) = self.joints.get_mut(joint.0) {
            *slot = None;
        }
    }

    fn remove_body(&mut self, body: BodyHandle) {
        if let Some(slot) = self.bodies.get_mut(body.0) {
            *slot = None;
        }
        for slot in self.joints.iter_mut() {
            if slot.as_ref().is_some_and(|j| j.a == body.0 || j.b == body.0) {
                *slot = None;
            }
        }
    }

    fn step(&mut self, dt: f32) {
        // Motor-driven angle changes, clamped to the current limits.
        let mut deltas = vec![0.0f32; self.joints.len()];
        for (slot, delta) in self.joints.iter_mut().zip(deltas.iter_mut()) {
            let Some(joint) = slot.as_mut() else {
                continue;
            };
            let state = &mut joint.state;
            let (lo, hi) = state.limits;
            let previous = state.angle;
            let target = if state.motor_enabled {
                previous + state.motor_speed * dt
            } else {
                previous
            };
            state.angle = if lo <= hi { target.clamp(lo, hi) } else { lo };
            if state.motor_enabled {
                *delta = state.angle - previous;
            }
        }

        // First joint hanging below each body.
        let mut below: Vec<Option<usize>> = vec![None; self.bodies.len()];
        for (index, joint) in self.joints.iter().enumerate() {
            if let Some(joint) = joint
                && let Some(slot) = below.get_mut(joint.a)
                && slot.is_none()
            {
                *slot = Some(index);
            }
        }

        // Hip strokes push their torso forward.
        let mut pushes: Vec<(usize, f32, usize)> = Vec::new();
        for (joint, delta) in self.joints.iter().zip(&deltas) {
            let Some(joint) = joint else {
                continue;
            };
            let is_hip = self.body(joint.a).is_some_and(|b| b.root == joint.a);
            if !is_hip {
                continue;
            }
            let knee = below
                .get(joint.b)
                .copied()
                .flatten()
                .and_then(|k| self.joints[k].as_ref());
            let push = self.stroke(joint, knee, *delta);
            match pushes.iter_mut().find(|(root, _, _)| *root == joint.a) {
                Some(entry) => {
                    entry.1 += push;
                    entry.2 += 1;
                }
                None => pushes.push((joint.a, push, 1)),
            }
        }

        for (root, push, legs) in pushes {
            let Some(torso) = self.body(root) else {
                continue;
            };
            let x = torso.position.x;
            let uphill = self.parcour.slope_at(x).max(0.0);
            let dx = push / legs as f32 / (1.0 + uphill);
            let dy = self.parcour.height_at(x + dx) - self.parcour.height_at(x);
            for body in self.bodies.iter_mut().flatten() {
                if body.root == root {
                    body.position.x += dx;
                    body.position.y += dy;
                }
            }
        }

        self.time += dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(world: &mut KinematicWorld, x: f32, length: f32) -> BodyHandle {
        world.create_body(BodyDesc {
            position: Point::new(x, 1.0),
            mass: 1.0,
            length,
            width: 0.1,
        })
    }

    /// Torso with one leg: hip between torso and thigh, knee below.
    fn one_legged(world: &mut KinematicWorld) -> (BodyHandle, JointHandle, JointHandle) {
        let torso = body(world, 0.0, 1.0);
        let thigh = body(world, 0.0, 0.5);
        let shank = body(world, 0.0, 0.5);
        let hip = world.create_revolute_joint(torso, thigh, Point::default(), Point::default());
        let knee = world.create_revolute_joint(thigh, shank, Point::default(), Point::default());
        (torso, hip, knee)
    }

    #[test]
    fn test_motor_respects_limits() {
        let mut world = KinematicWorld::new(Parcour::flat());
        let (_, hip, _) = one_legged(&mut world);
        world.set_limits(hip, -0.5, 0.5);
        world.set_motor_speed(hip, 1.0);
        world.enable_motor(hip);
        for _ in 0..100 {
            world.step(0.1);
        }
        assert_eq!(world.joint_angle(hip), Some(0.5));
        assert!((world.time() - 10.0).abs() < 1e-3);

        world.set_limits(hip, 0.0, 0.0);
        world.step(0.1);
        assert_eq!(world.joint_angle(hip), Some(0.0));
    }

    #[test]
    fn test_disabled_motor_holds_angle() {
        let mut world = KinematicWorld::new(Parcour::flat());
        let (_, hip, _) = one_legged(&mut world);
        world.set_motor_speed(hip, 1.0);
        world.step(0.5);
        assert_eq!(world.joint_angle(hip), Some(0.0));
    }

    #[test]
    fn test_backward_stroke_pushes_torso_forward() {
        let mut world = KinematicWorld::new(Parcour::flat());
        let (torso, hip, _) = one_legged(&mut world);
        world.set_limits(hip, -1.0, 1.0);
        world.set_motor_speed(hip, -1.0);
        world.enable_motor(hip);
        world.step(0.5);
        let x = world.body_position(torso).unwrap().x;
        assert!((x - 0.5).abs() < 1e-5, "x = {x}");
    }

    #[test]
    fn test_flexed_knee_slips() {
        let mut world = KinematicWorld::new(Parcour::flat());
        let (torso, hip, knee) = one_legged(&mut world);
        world.set_limits(hip, -1.0, 1.0);
        world.set_limits(knee, -1.0, -1.0);
        world.set_motor_speed(hip, -1.0);
        world.enable_motor(hip);
        world.step(0.5);
        let x = world.body_position(torso).unwrap().x;
        assert!((x - 0.5 * SLIP_GRIP).abs() < 1e-5, "x = {x}");
    }

    #[test]
    fn test_removed_handles_are_ignored() {
        let mut world = KinematicWorld::new(Parcour::flat());
        let (torso, hip, knee) = one_legged(&mut world);
        world.remove_body(torso);
        assert!(world.body_position(torso).is_none());
        assert!(world.joint_state(hip).is_none());
        assert!(world.joint_state(knee).is_some());
        world.set_motor_speed(hip, 1.0);
        world.step(0.1);
        assert_eq!(world.body_count(), 2);
        assert_eq!(world.joint_count(), 1);
    }
}
