//! Seeding of partial genotypes.
//!
//! Every part owns an options struct whose `Some` fields override the
//! generated value. Parents carry their children's options, so overrides
//! propagate down the tree while anything left unset is generated by the
//! child's own policy.

use crate::compute::engine::default_descriptor;
use crate::schema::{
    Body, Engine, EngineDescriptor, EngineKind, Foot, HipJoint, Individual, JOINT_ANGLE_MAX,
    JOINT_ANGLE_MIN, KneeJoint, LEG_PAIRS, Leg, LegPair, Orientation, Point,
};

use super::GenomeRng;
use super::geometry::{hip_position, random_polygon};

/// Default target mass of an individual.
pub const DEFAULT_INDIVIDUAL_MASS: f32 = 20.0;

/// Default inclusive range of body polygon vertex counts.
pub const DEFAULT_BODY_POINTS_RANGE: (usize, usize) = (4, 8);

const BODY_MASS_FACTOR: (f32, f32) = (0.4, 0.6);
const LEG_MASS_FACTOR: (f32, f32) = (0.05, 0.15);
const LEG_HEIGHT: (f32, f32) = (0.8, 1.2);
const LEG_HEIGHT_FACTOR: (f32, f32) = (0.3, 0.7);
const LEG_WIDTH: (f32, f32) = (0.08, 0.15);

/// A named part of the genotype tree.
pub trait Identifiable {
    /// Key of this part in its parent record.
    const IDENTIFIER: &'static str;
    /// Keys of this part's own record.
    const FIELDS: &'static [&'static str];
}

/// A part that can generate itself from partial options.
pub trait Seedable: Sized {
    type Options: Default + Clone;

    fn seed(options: &Self::Options, rng: &mut GenomeRng) -> Self;
}

#[derive(Debug, Clone, Default)]
pub struct BodyOptions {
    pub mass_factor: Option<f32>,
    pub body_points_count: Option<usize>,
    pub body_points: Option<Vec<Point>>,
    pub hip_joint_positions: Option<Vec<Point>>,
}

impl Identifiable for Body {
    const IDENTIFIER: &'static str = "body";
    const FIELDS: &'static [&'static str] = &[
        "mass",
        "massFactor",
        "bodyPoints",
        "bodyPointsCount",
        "hipJointPositions",
    ];
}

impl Seedable for Body {
    type Options = BodyOptions;

    fn seed(options: &BodyOptions, rng: &mut GenomeRng) -> Self {
        let body_points = match &options.body_points {
            Some(points) => points.clone(),
            None => {
                let count = options
                    .body_points_count
                    .unwrap_or_else(|| rng.uniform_usize(DEFAULT_BODY_POINTS_RANGE));
                random_polygon(count, rng)
            }
        };
        let hip_joint_positions = match &options.hip_joint_positions {
            Some(positions) => positions.clone(),
            None => (0..LEG_PAIRS)
                .map(|slot| hip_position(&body_points, slot, LEG_PAIRS, rng))
                .collect(),
        };

        Body {
            mass: 0.0,
            mass_factor: options
                .mass_factor
                .unwrap_or_else(|| rng.uniform(BODY_MASS_FACTOR)),
            body_points_count: body_points.len(),
            body_points,
            hip_joint_positions,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub kind: Option<EngineKind>,
    pub descriptor: Option<EngineDescriptor>,
}

impl Identifiable for Engine {
    const IDENTIFIER: &'static str = "engine";
    const FIELDS: &'static [&'static str] = &["type", "descriptor"];
}

impl Seedable for Engine {
    type Options = EngineOptions;

    fn seed(options: &EngineOptions, _rng: &mut GenomeRng) -> Self {
        let kind = options.kind.unwrap_or_default();
        Engine {
            kind,
            descriptor: options
                .descriptor
                .clone()
                .unwrap_or_else(|| default_descriptor(kind)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LegOptions {
    pub mass_factor: Option<f32>,
    pub height: Option<f32>,
    pub height_factor: Option<f32>,
    pub width: Option<f32>,
}

impl Identifiable for Leg {
    const IDENTIFIER: &'static str = "leg";
    const FIELDS: &'static [&'static str] =
        &["mass", "massFactor", "height", "heightFactor", "width"];
}

impl Seedable for Leg {
    type Options = LegOptions;

    fn seed(options: &LegOptions, rng: &mut GenomeRng) -> Self {
        Leg {
            mass: 0.0,
            mass_factor: options
                .mass_factor
                .unwrap_or_else(|| rng.uniform(LEG_MASS_FACTOR)),
            height: options.height.unwrap_or_else(|| rng.uniform(LEG_HEIGHT)),
            height_factor: options
                .height_factor
                .unwrap_or_else(|| rng.uniform(LEG_HEIGHT_FACTOR)),
            width: options.width.unwrap_or_else(|| rng.uniform(LEG_WIDTH)),
        }
    }
}

fn random_orientation(rng: &mut GenomeRng) -> Orientation {
    if rng.coin() {
        Orientation::Back
    } else {
        Orientation::Forth
    }
}

#[derive(Debug, Clone, Default)]
pub struct HipJointOptions {
    pub orientation: Option<Orientation>,
    pub position: Option<Point>,
}

impl Identifiable for HipJoint {
    const IDENTIFIER: &'static str = "hipJoint";
    const FIELDS: &'static [&'static str] = &["orientation", "angleMin", "angleMax", "position"];
}

impl Seedable for HipJoint {
    type Options = HipJointOptions;

    fn seed(options: &HipJointOptions, rng: &mut GenomeRng) -> Self {
        HipJoint {
            orientation: options
                .orientation
                .unwrap_or_else(|| random_orientation(rng)),
            angle_min: JOINT_ANGLE_MIN,
            angle_max: JOINT_ANGLE_MAX,
            position: options.position.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KneeJointOptions {
    pub orientation: Option<Orientation>,
}

impl Identifiable for KneeJoint {
    const IDENTIFIER: &'static str = "kneeJoint";
    const FIELDS: &'static [&'static str] = &["orientation", "angleMin", "angleMax"];
}

impl Seedable for KneeJoint {
    type Options = KneeJointOptions;

    fn seed(options: &KneeJointOptions, rng: &mut GenomeRng) -> Self {
        KneeJoint {
            orientation: options
                .orientation
                .unwrap_or_else(|| random_orientation(rng)),
            angle_min: JOINT_ANGLE_MIN,
            angle_max: JOINT_ANGLE_MAX,
        }
    }
}

impl Identifiable for Foot {
    const IDENTIFIER: &'static str = "foot";
    const FIELDS: &'static [&'static str] = &[];
}

impl Seedable for Foot {
    type Options = ();

    fn seed(_options: &(), _rng: &mut GenomeRng) -> Self {
        Foot {}
    }
}

#[derive(Debug, Clone, Default)]
pub struct LegPairOptions {
    pub hip_joint: HipJointOptions,
    pub knee_joint: KneeJointOptions,
    pub leg: LegOptions,
}

impl Seedable for LegPair {
    type Options = LegPairOptions;

    fn seed(options: &LegPairOptions, rng: &mut GenomeRng) -> Self {
        LegPair {
            hip_joint: HipJoint::seed(&options.hip_joint, rng),
            knee_joint: KneeJoint::seed(&options.knee_joint, rng),
            leg: Leg::seed(&options.leg, rng),
            foot: Foot::seed(&(), rng),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndividualOptions {
    /// Target mass distributed over body and legs.
    pub mass: Option<f32>,
    pub body: BodyOptions,
    pub engine: EngineOptions,
    /// Per-pair options, front to back; missing entries use defaults.
    pub legs: Vec<LegPairOptions>,
}

impl Seedable for Individual {
    type Options = IndividualOptions;

    fn seed(options: &IndividualOptions, rng: &mut GenomeRng) -> Self {
        let body = Body::seed(&options.body, rng);
        let engine = Engine::seed(&options.engine, rng);

        let legs = (0..LEG_PAIRS)
            .map(|i| {
                let mut pair_options = options.legs.get(i).cloned().unwrap_or_default();
                if pair_options.hip_joint.position.is_none() {
                    pair_options.hip_joint.position = body.hip_joint_positions.get(i).copied();
                }
                LegPair::seed(&pair_options, rng)
            })
            .collect();

        let mut individual = Individual {
            body,
            engine,
            legs,
            fitness: None,
        };
        individual.distribute_mass(options.mass.unwrap_or(DEFAULT_INDIVIDUAL_MASS));
        individual
    }
}
