//! Phenotype: a genotype bound to live bodies and joints of a world.

use crate::schema::{Individual, JointKind, LensId, Orientation, Point, Side};

use super::genotype::geometry::x_bounds;
use super::physics::{BodyDesc, BodyHandle, JointHandle, PhysicsWorld};

/// Joints of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegJoints {
    pub hip: JointHandle,
    pub knee: JointHandle,
}

/// Side → pair index → joints lookup table addressed by [`LensId`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JointsMap {
    pub left: Vec<LegJoints>,
    pub right: Vec<LegJoints>,
}

impl JointsMap {
    pub fn get(&self, lens: LensId) -> Option<JointHandle> {
        let side = match lens.side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        };
        side.get(lens.index).map(|leg| match lens.kind {
            JointKind::Hip => leg.hip,
            JointKind::Knee => leg.knee,
        })
    }

    pub fn handles(&self) -> impl Iterator<Item = JointHandle> + '_ {
        self.left
            .iter()
            .chain(self.right.iter())
            .flat_map(|leg| [leg.hip, leg.knee])
    }
}

/// Live instantiation of one individual.
#[derive(Debug, Clone)]
pub struct Phenotype {
    /// Current phase of the movement state machine.
    pub state: usize,
    pub torso: BodyHandle,
    pub bodies: Vec<BodyHandle>,
    pub joints: JointsMap,
    /// Torso x at instantiation.
    pub start_x: f32,
}

/// Initial physics limits of a joint with the given orientation.
fn oriented_limits(orientation: Orientation, min: f32, max: f32) -> (f32, f32) {
    match orientation {
        Orientation::Forth => (-max, -min),
        Orientation::Back => (min, max),
    }
}

impl Phenotype {
    /// Create bodies and joints for `individual` with its torso at `origin`.
    pub fn instantiate(
        individual: &Individual,
        world: &mut dyn PhysicsWorld,
        origin: Point,
    ) -> Self {
        let polygon = &individual.body.body_points;
        let (lo, hi) = x_bounds(polygon);
        let length = if lo.is_finite() { hi - lo } else { 0.0 };
        let width = polygon
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(a, b), p| {
                (a.min(p.y), b.max(p.y))
            });
        let width = if width.0.is_finite() { width.1 - width.0 } else { 0.0 };

        let torso = world.create_body(BodyDesc {
            position: origin,
            mass: individual.body.mass,
            length,
            width,
        });
        let mut bodies = vec![torso];
        let mut joints = JointsMap::default();

        for side in Side::ALL {
            for pair in &individual.legs {
                let leg = &pair.leg;
                let (thigh_len, shank_len) = (leg.thigh_length(), leg.shank_length());
                let hip_at = pair.hip_joint.position;
                let thigh = world.create_body(BodyDesc {
                    position: Point::new(origin.x + hip_at.x, origin.y - thigh_len / 2.0),
                    mass: leg.mass / 2.0,
                    length: thigh_len,
                    width: leg.width,
                });
                let shank = world.create_body(BodyDesc {
                    position: Point::new(
                        origin.x + hip_at.x,
                        origin.y - thigh_len - shank_len / 2.0,
                    ),
                    mass: leg.mass / 2.0,
                    length: shank_len,
                    width: leg.width,
                });

                let hip = world.create_revolute_joint(
                    torso,
                    thigh,
                    hip_at,
                    Point::new(0.0, thigh_len / 2.0),
                );
                let knee = world.create_revolute_joint(
                    thigh,
                    shank,
                    Point::new(0.0, -thigh_len / 2.0),
                    Point::new(0.0, shank_len / 2.0),
                );

                let hj = &pair.hip_joint;
                let (min, max) = oriented_limits(hj.orientation, hj.angle_min, hj.angle_max);
                world.set_limits(hip, min, max);
                let kj = &pair.knee_joint;
                let (min, max) = oriented_limits(kj.orientation, kj.angle_min, kj.angle_max);
                world.set_limits(knee, min, max);

                bodies.extend([thigh, shank]);
                let legs = match side {
                    Side::Left => &mut joints.left,
                    Side::Right => &mut joints.right,
                };
                legs.push(LegJoints { hip, knee });
            }
        }

        Self {
            state: 0,
            torso,
            bodies,
            joints,
            start_x: origin.x,
        }
    }

    pub fn position(&self, world: &dyn PhysicsWorld) -> Option<Point> {
        world.body_position(self.torso)
    }

    /// Forward displacement of the torso since instantiation.
    pub fn fitness(&self, world: &dyn PhysicsWorld) -> f32 {
        self.position(world).map_or(0.0, |p| p.x - self.start_x)
    }

    /// Remove every joint and body from the world.
    pub fn destroy(self, world: &mut dyn PhysicsWorld) {
        for joint in self.joints.handles() {
            world.remove_joint(joint);
        }
        for body in self.bodies {
            world.remove_body(body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::genotype::{GenomeRng, IndividualOptions, Seedable};
    use crate::compute::physics::KinematicWorld;
    use crate::schema::{JOINT_ANGLE_MAX, JOINT_ANGLE_MIN, LEG_PAIRS, Parcour};

    fn individual() -> Individual {
        let mut rng = GenomeRng::new(4);
        Individual::seed(&IndividualOptions::default(), &mut rng)
    }

    #[test]
    fn test_instantiate_binds_every_lens() {
        let individual = individual();
        let mut world = KinematicWorld::new(Parcour::flat());
        let phenotype = Phenotype::instantiate(&individual, &mut world, Point::new(2.0, 1.0));

        assert_eq!(phenotype.state, 0);
        assert_eq!(phenotype.bodies.len(), 1 + 2 * 2 * LEG_PAIRS);
        assert_eq!(world.joint_count(), 2 * 2 * LEG_PAIRS);
        for lens in LensId::all() {
            let joint = phenotype.joints.get(lens).unwrap();
            assert!(world.joint_state(joint).is_some(), "{lens}");
        }
        assert_eq!(phenotype.fitness(&world), 0.0);
    }

    #[test]
    fn test_initial_limits_follow_orientation() {
        let mut individual = individual();
        individual.legs[0].hip_joint.orientation = Orientation::Forth;
        individual.legs[0].knee_joint.orientation = Orientation::Back;
        let mut world = KinematicWorld::new(Parcour::flat());
        let phenotype = Phenotype::instantiate(&individual, &mut world, Point::default());

        let hip = phenotype.joints.get("rfh".parse().unwrap()).unwrap();
        assert_eq!(
            world.joint_limits(hip),
            Some((-JOINT_ANGLE_MAX, -JOINT_ANGLE_MIN))
        );
        let knee = phenotype.joints.get("lfk".parse().unwrap()).unwrap();
        assert_eq!(world.joint_limits(knee), Some((JOINT_ANGLE_MIN, JOINT_ANGLE_MAX)));
    }

    #[test]
    fn test_destroy_removes_everything() {
        let individual = individual();
        let mut world = KinematicWorld::new(Parcour::flat());
        let phenotype = Phenotype::instantiate(&individual, &mut world, Point::default());
        phenotype.destroy(&mut world);
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.joint_count(), 0);
    }
}
