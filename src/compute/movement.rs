//! Movement descriptor resolution and random generation.
//!
//! [`resolve`] turns a descriptor into an [`Action`]: a closure that applies
//! the primitive to the addressed joint and reports whether it holds. Only
//! `utl` can report `false` on a bound joint; compounds run every child and
//! fold the results with AND (`all`) or OR (`one`).

use std::f32::consts::{PI, TAU};

use crate::schema::{
    AnglePredicate, JOINT_ANGLE_MAX, JOINT_ANGLE_MIN, JointKind, LEG_PAIRS, LensId, Movement,
    MovementId, Side,
};

use super::genotype::GenomeRng;
use super::phenotype::Phenotype;
use super::physics::{JointHandle, PhysicsWorld};

/// Tolerance band around a limit for `utl` predicates.
pub const ANGLE_TOLERANCE: f32 = PI / 10.0;

/// Range of random `sta` angles.
pub const LIMIT_RANGE: (f32, f32) = (-TAU, TAU);

/// Range of random `sts` speeds.
pub const SPEED_RANGE: (f32, f32) = (-2.0, 2.0);

/// Deepest nesting produced by [`random_movement`].
pub const MAX_RANDOM_DEPTH: usize = 2;

/// A resolved descriptor, applied once per tick.
pub type Action<'a> = Box<dyn Fn(&Phenotype, &mut dyn PhysicsWorld, f32) -> bool + 'a>;

/// Resolve a descriptor into an action.
pub fn resolve(movement: &Movement) -> Action<'_> {
    match movement {
        Movement::LockAngle { lens } => on_joint(*lens, |world, joint| {
            world.set_limits(joint, 0.0, 0.0);
            true
        }),
        Movement::SetAngleLimits { lens, min, max } => {
            let (min, max) = (*min, *max);
            on_joint(*lens, move |world, joint| {
                world.set_limits(joint, -max, -min);
                true
            })
        }
        Movement::SetMotorEnabled { lens, enabled } => {
            let enabled = *enabled;
            on_joint(*lens, move |world, joint| {
                if enabled {
                    world.enable_motor(joint);
                } else {
                    world.disable_motor(joint);
                }
                true
            })
        }
        Movement::SetSpeed { lens, speed } => {
            let speed = *speed;
            on_joint(*lens, move |world, joint| {
                world.set_motor_speed(joint, speed);
                true
            })
        }
        Movement::WaitUntil { lens, predicate } => {
            let predicate = *predicate;
            on_joint(*lens, move |world, joint| {
                world
                    .joint_state(joint)
                    .is_some_and(|state| holds(predicate, state.angle, state.limits))
            })
        }
        Movement::All(children) => {
            let actions: Vec<Action<'_>> = children.iter().map(resolve).collect();
            Box::new(
                move |phenotype: &Phenotype, world: &mut dyn PhysicsWorld, time: f32| {
                    actions
                        .iter()
                        .fold(true, |acc, action| action(phenotype, &mut *world, time) && acc)
                },
            )
        }
        Movement::One(children) => {
            let actions: Vec<Action<'_>> = children.iter().map(resolve).collect();
            Box::new(
                move |phenotype: &Phenotype, world: &mut dyn PhysicsWorld, time: f32| {
                    actions
                        .iter()
                        .fold(false, |acc, action| action(phenotype, &mut *world, time) || acc)
                },
            )
        }
    }
}

/// Action running `command` on the joint bound to `lens`.
///
/// Unbound lenses report `false` and issue nothing.
fn on_joint<'a, F>(lens: LensId, command: F) -> Action<'a>
where
    F: Fn(&mut dyn PhysicsWorld, JointHandle) -> bool + 'a,
{
    Box::new(
        move |phenotype: &Phenotype, world: &mut dyn PhysicsWorld, _time: f32| {
            match phenotype.joints.get(lens) {
                Some(joint) => command(world, joint),
                None => false,
            }
        },
    )
}

/// Evaluate a predicate against a joint in physics convention.
///
/// Authored angles are sign-inverted, so the authored maximum is the
/// physics lower limit.
pub fn holds(predicate: AnglePredicate, angle: f32, limits: (f32, f32)) -> bool {
    let target = match predicate {
        AnglePredicate::MaxAngle => limits.0,
        AnglePredicate::MinAngle => limits.1,
        AnglePredicate::Angle(authored) => -authored,
    };
    (angle - target).abs() <= ANGLE_TOLERANCE
}

/// Uniformly random joint address.
pub fn random_lens(rng: &mut GenomeRng) -> LensId {
    let side = if rng.coin() { Side::Left } else { Side::Right };
    let kind = if rng.coin() {
        JointKind::Hip
    } else {
        JointKind::Knee
    };
    LensId::new(side, rng.index(LEG_PAIRS), kind)
}

/// Random predicate for `utl`.
pub fn random_predicate(rng: &mut GenomeRng) -> AnglePredicate {
    match rng.index(3) {
        0 => AnglePredicate::MaxAngle,
        1 => AnglePredicate::MinAngle,
        _ => AnglePredicate::Angle(rng.uniform((JOINT_ANGLE_MIN, JOINT_ANGLE_MAX))),
    }
}

/// Random descriptor with a random lens and id-appropriate params.
///
/// Compounds wrap one fresh random child. At `MAX_RANDOM_DEPTH` only
/// primitives are drawn.
pub fn random_movement(rng: &mut GenomeRng, depth: usize) -> Movement {
    let ids: &[MovementId] = if depth >= MAX_RANDOM_DEPTH {
        &MovementId::PRIMITIVES
    } else {
        &MovementId::ALL
    };
    let id = ids[rng.index(ids.len())];
    random_with_id(id, rng, depth)
}

fn random_with_id(id: MovementId, rng: &mut GenomeRng, depth: usize) -> Movement {
    match id {
        MovementId::All => Movement::All(vec![random_movement(rng, depth + 1)]),
        MovementId::One => Movement::One(vec![random_movement(rng, depth + 1)]),
        MovementId::La0 => Movement::LockAngle {
            lens: random_lens(rng),
        },
        MovementId::Sta => {
            let lens = random_lens(rng);
            let a = rng.uniform(LIMIT_RANGE);
            let b = rng.uniform(LIMIT_RANGE);
            Movement::SetAngleLimits {
                lens,
                min: a.min(b),
                max: a.max(b),
            }
        }
        MovementId::Stm => Movement::SetMotorEnabled {
            lens: random_lens(rng),
            enabled: rng.coin(),
        },
        MovementId::Sts => Movement::SetSpeed {
            lens: random_lens(rng),
            speed: rng.uniform(SPEED_RANGE),
        },
        MovementId::Utl => Movement::WaitUntil {
            lens: random_lens(rng),
            predicate: random_predicate(rng),
        },
    }
}

/// Nesting depth of a descriptor; primitives are depth 0.
pub fn depth(movement: &Movement) -> usize {
    movement
        .children()
        .iter()
        .map(|c| 1 + depth(c))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::genotype::{IndividualOptions, Seedable};
    use crate::compute::phenotype::JointsMap;
    use crate::compute::physics::{BodyHandle, KinematicWorld};
    use crate::schema::{Individual, Parcour, Point};

    fn setup() -> (Phenotype, KinematicWorld) {
        let mut rng = GenomeRng::new(8);
        let individual = Individual::seed(&IndividualOptions::default(), &mut rng);
        let mut world = KinematicWorld::new(Parcour::flat());
        let phenotype = Phenotype::instantiate(&individual, &mut world, Point::default());
        (phenotype, world)
    }

    fn lens(s: &str) -> LensId {
        s.parse().unwrap()
    }

    #[test]
    fn test_lock_angle() {
        let (phenotype, mut world) = setup();
        let movement = Movement::LockAngle { lens: lens("rmk") };
        assert!(resolve(&movement)(&phenotype, &mut world, 0.0));
        let joint = phenotype.joints.get(lens("rmk")).unwrap();
        assert_eq!(world.joint_limits(joint), Some((0.0, 0.0)));
    }

    #[test]
    fn test_set_angle_limits_inverts_sign() {
        let (phenotype, mut world) = setup();
        let movement = Movement::SetAngleLimits {
            lens: lens("lbh"),
            min: -0.3,
            max: 0.7,
        };
        assert!(resolve(&movement)(&phenotype, &mut world, 0.0));
        let joint = phenotype.joints.get(lens("lbh")).unwrap();
        assert_eq!(world.joint_limits(joint), Some((-0.7, 0.3)));
    }

    #[test]
    fn test_motor_commands() {
        let (phenotype, mut world) = setup();
        let joint = phenotype.joints.get(lens("lfk")).unwrap();

        let enable = Movement::SetMotorEnabled {
            lens: lens("lfk"),
            enabled: true,
        };
        let speed = Movement::SetSpeed {
            lens: lens("lfk"),
            speed: 1.25,
        };
        assert!(resolve(&enable)(&phenotype, &mut world, 0.0));
        assert!(resolve(&speed)(&phenotype, &mut world, 0.0));
        let state = world.joint_state(joint).unwrap();
        assert!(state.motor_enabled);
        assert_eq!(state.motor_speed, 1.25);

        let disable = Movement::SetMotorEnabled {
            lens: lens("lfk"),
            enabled: false,
        };
        resolve(&disable)(&phenotype, &mut world, 0.0);
        assert!(!world.joint_state(joint).unwrap().motor_enabled);
    }

    #[test]
    fn test_predicates() {
        let limits = (-1.0, 0.5);
        assert!(holds(AnglePredicate::MaxAngle, -0.9, limits));
        assert!(!holds(AnglePredicate::MaxAngle, 0.5, limits));
        assert!(holds(AnglePredicate::MinAngle, 0.45, limits));
        assert!(holds(AnglePredicate::Angle(0.2), -0.2, limits));
        assert!(!holds(AnglePredicate::Angle(0.2), 0.2, limits));
    }

    #[test]
    fn test_compounds_run_every_child() {
        let (phenotype, mut world) = setup();
        let joint = phenotype.joints.get(lens("rfh")).unwrap();
        let limits = world.joint_limits(joint).unwrap();
        // Joint rests at 0, far from any limit of the seeded range.
        let waiting = Movement::WaitUntil {
            lens: lens("rfh"),
            predicate: AnglePredicate::Angle(1.5),
        };
        let speed = Movement::SetSpeed {
            lens: lens("rfh"),
            speed: 0.5,
        };
        assert!(!holds(AnglePredicate::Angle(1.5), 0.0, limits));

        let all = Movement::All(vec![waiting.clone(), speed.clone()]);
        assert!(!resolve(&all)(&phenotype, &mut world, 0.0));
        assert_eq!(world.joint_state(joint).unwrap().motor_speed, 0.5);

        let one = Movement::One(vec![waiting, speed]);
        assert!(resolve(&one)(&phenotype, &mut world, 0.0));

        assert!(resolve(&Movement::All(Vec::new()))(&phenotype, &mut world, 0.0));
        assert!(!resolve(&Movement::One(Vec::new()))(&phenotype, &mut world, 0.0));
    }

    #[test]
    fn test_unbound_lens_is_false() {
        let mut world = KinematicWorld::new(Parcour::flat());
        let phenotype = Phenotype {
            state: 0,
            torso: BodyHandle(0),
            bodies: Vec::new(),
            joints: JointsMap::default(),
            start_x: 0.0,
        };
        let movement = Movement::LockAngle { lens: lens("lfh") };
        assert!(!resolve(&movement)(&phenotype, &mut world, 0.0));
    }

    #[test]
    fn test_random_movements() {
        let mut rng = GenomeRng::new(21);
        for _ in 0..200 {
            let movement = random_movement(&mut rng, 0);
            assert!(depth(&movement) <= MAX_RANDOM_DEPTH);
            if let Movement::SetAngleLimits { min, max, .. } = movement {
                assert!(min <= max);
                assert!(min >= LIMIT_RANGE.0 && max <= LIMIT_RANGE.1);
            }
            if movement.id().is_compound() {
                assert_eq!(movement.children().len(), 1);
            }
            let json = serde_json::to_value(&movement).unwrap();
            let back: Movement = serde_json::from_value(json).unwrap();
            assert_eq!(back.id(), movement.id());
        }
    }
}
