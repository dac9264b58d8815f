//! Gait engines: default descriptors and the cyclic movement state machine.

use crate::schema::{
    AnglePredicate, Engine, EngineDescriptor, EngineKind, JOINT_ANGLE_MAX, JOINT_ANGLE_MIN,
    JointKind, LEG_PAIRS, LensId, Movement, Side,
};

use super::movement::resolve;
use super::phenotype::Phenotype;
use super::physics::PhysicsWorld;

/// Hip motor speed of the default ant gait.
pub const ANT_HIP_SPEED: f32 = 1.0;

/// Knee motor speed of the default ant gait.
pub const ANT_KNEE_SPEED: f32 = 4.0;

/// Default descriptor for an engine variant.
pub fn default_descriptor(kind: EngineKind) -> EngineDescriptor {
    match kind {
        EngineKind::Ant => ant_descriptor(),
    }
}

/// Whether a leg belongs to the tripod that starts in stance.
fn in_first_tripod(side: Side, index: usize) -> bool {
    (side == Side::Left) == (index % 2 == 0)
}

/// Tripod gait: `lf`, `rm`, `lb` push while `rf`, `lm`, `rb` swing, then
/// the tripods swap. Each phase waits for the left front hip to reach the
/// end of its stroke.
fn ant_descriptor() -> EngineDescriptor {
    let initial = LensId::all()
        .flat_map(|lens| {
            [
                Movement::SetAngleLimits {
                    lens,
                    min: JOINT_ANGLE_MIN,
                    max: JOINT_ANGLE_MAX,
                },
                Movement::SetMotorEnabled {
                    lens,
                    enabled: true,
                },
            ]
        })
        .collect();

    let pacer = LensId::new(Side::Left, 0, JointKind::Hip);
    let phase = |direction: f32, predicate: AnglePredicate| {
        let mut children: Vec<Movement> = Vec::with_capacity(2 * 2 * LEG_PAIRS + 1);
        for side in Side::ALL {
            for index in 0..LEG_PAIRS {
                let sign = if in_first_tripod(side, index) {
                    direction
                } else {
                    -direction
                };
                children.push(Movement::SetSpeed {
                    lens: LensId::new(side, index, JointKind::Hip),
                    speed: -sign * ANT_HIP_SPEED,
                });
                children.push(Movement::SetSpeed {
                    lens: LensId::new(side, index, JointKind::Knee),
                    speed: sign * ANT_KNEE_SPEED,
                });
            }
        }
        children.push(Movement::WaitUntil {
            lens: pacer,
            predicate,
        });
        Movement::All(children)
    };

    EngineDescriptor {
        initial,
        movements: vec![
            phase(1.0, AnglePredicate::MaxAngle),
            phase(-1.0, AnglePredicate::MinAngle),
        ],
    }
}

/// Drives a phenotype through the phases of its engine.
///
/// The phase index lives on the [`Phenotype`]; the machine itself only
/// holds the descriptors and never terminates on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclicStateMachine {
    initial: Vec<Movement>,
    phases: Vec<Movement>,
}

impl CyclicStateMachine {
    pub fn new(descriptor: &EngineDescriptor) -> Self {
        Self {
            initial: descriptor.initial.clone(),
            phases: descriptor.movements.clone(),
        }
    }

    pub fn from_engine(engine: &Engine) -> Self {
        Self::new(&engine.descriptor)
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// Phase following `current`, wrapping to 0.
    pub fn next_state(&self, current: usize) -> usize {
        match self.phases.len() {
            0 => 0,
            n => (current + 1) % n,
        }
    }

    /// One-time setup before the first tick.
    pub fn initial_step(&self, phenotype: &Phenotype, world: &mut dyn PhysicsWorld, time: f32) {
        for movement in &self.initial {
            resolve(movement)(phenotype, world, time);
        }
    }

    /// Apply the current phase and advance if it completed.
    ///
    /// Returns whether the phase advanced.
    pub fn step(&self, phenotype: &mut Phenotype, world: &mut dyn PhysicsWorld, time: f32) -> bool {
        if self.phases.is_empty() {
            return false;
        }
        if phenotype.state >= self.phases.len() {
            phenotype.state = 0;
        }
        let complete = resolve(&self.phases[phenotype.state])(phenotype, world, time);
        if complete {
            phenotype.state = self.next_state(phenotype.state);
        }
        complete
    }
}
