//! Genotype records: the heritable description of a legged individual.
//!
//! Every type here is a plain serde record. The persisted JSON uses
//! camelCase field names so a serialized [`Individual`] is the flat,
//! JSON-compatible build tree (`body`, `engine`, `legs`, optional `fitness`).

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use super::movement::{MovementId, Movement};

/// Number of legs on an individual (both sides).
pub const LEG_COUNT: usize = 6;

/// Number of distinct leg pairs modeled (left/right are symmetric).
pub const LEG_PAIRS: usize = LEG_COUNT / 2;

/// Lower joint limit in the authored convention.
pub const JOINT_ANGLE_MIN: f32 = -PI / 3.0;

/// Upper joint limit in the authored convention.
pub const JOINT_ANGLE_MAX: f32 = PI / 2.0;

/// A 2D point in body-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Torso shape and mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    /// Assigned mass (set by mass distribution).
    pub mass: f32,
    /// Share of the individual's mass, in (0, 1).
    pub mass_factor: f32,
    /// Clockwise simple polygon.
    pub body_points: Vec<Point>,
    /// Number of polygon vertices.
    pub body_points_count: usize,
    /// One hip position per leg pair, front to back.
    pub hip_joint_positions: Vec<Point>,
}

/// Engine variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Ant,
}

/// Movement descriptors driving an engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineDescriptor {
    /// One-time setup applied before the first tick.
    pub initial: Vec<Movement>,
    /// Cyclic phases, one descriptor per phase.
    pub movements: Vec<Movement>,
}

impl EngineDescriptor {
    /// Count descriptors of the given id at any depth.
    pub fn count(&self, id: MovementId) -> usize {
        self.initial
            .iter()
            .chain(self.movements.iter())
            .map(|m| m.count(id))
            .sum()
    }
}

/// Gait engine genotype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    #[serde(rename = "type")]
    pub kind: EngineKind,
    pub descriptor: EngineDescriptor,
}

/// Leg geometry and mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub mass: f32,
    pub mass_factor: f32,
    pub height: f32,
    /// Splits `height` into thigh and shank, in (0, 1).
    pub height_factor: f32,
    pub width: f32,
}

impl Leg {
    pub fn thigh_length(&self) -> f32 {
        self.height * self.height_factor
    }

    pub fn shank_length(&self) -> f32 {
        self.height * (1.0 - self.height_factor)
    }
}

/// Direction a joint bends towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Orientation {
    Back,
    Forth,
}

/// Torso-to-thigh joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HipJoint {
    pub orientation: Orientation,
    pub angle_min: f32,
    pub angle_max: f32,
    pub position: Point,
}

/// Thigh-to-shank joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KneeJoint {
    pub orientation: Orientation,
    pub angle_min: f32,
    pub angle_max: f32,
}

/// Marker part with no fields of its own.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Foot {}

/// One modeled leg pair, mirrored on both sides of the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegPair {
    pub hip_joint: HipJoint,
    pub knee_joint: KneeJoint,
    pub leg: Leg,
    pub foot: Foot,
}

/// Root genotype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub body: Body,
    pub engine: Engine,
    /// Front, middle and back pairs.
    pub legs: Vec<LegPair>,
    /// Forward displacement, recorded once per generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitness: Option<f32>,
}

impl Individual {
    /// Fitness for ranking; unevaluated individuals rank last.
    pub fn rank_fitness(&self) -> f32 {
        self.fitness.unwrap_or(f32::NEG_INFINITY)
    }

    /// Sum of the assigned part masses.
    pub fn total_mass(&self) -> f32 {
        self.body.mass + self.legs.iter().map(|p| p.leg.mass).sum::<f32>()
    }

    /// Copy hip positions from the body onto the hip joints.
    pub fn sync_hip_positions(&mut self) {
        for (pair, position) in self
            .legs
            .iter_mut()
            .zip(self.body.hip_joint_positions.iter())
        {
            pair.hip_joint.position = *position;
        }
    }
}

/// Errors raised while decoding or checking genotype records.
#[derive(Debug, thiserror::Error)]
pub enum GenotypeError {
    #[error("Invalid joint lens '{0}'")]
    InvalidLens(String),
    #[error("Unknown angle predicate '{0}'")]
    UnknownPredicate(String),
    #[error("Movement '{id}' is missing its lens")]
    MissingLens { id: MovementId },
    #[error("Invalid params for movement '{id}': {reason}")]
    InvalidParams { id: MovementId, reason: String },
    #[error("Genotype shape mismatch at '{path}': {reason}")]
    SchemaMismatch { path: String, reason: String },
    #[error("Genotype record error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg() -> Leg {
        Leg {
            mass: 1.0,
            mass_factor: 0.1,
            height: 2.0,
            height_factor: 0.25,
            width: 0.1,
        }
    }

    #[test]
    fn test_leg_segments() {
        let leg = leg();
        assert!((leg.thigh_length() - 0.5).abs() < 1e-6);
        assert!((leg.shank_length() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_record_field_names() {
        let json = serde_json::to_value(leg()).unwrap();
        assert!(json.get("heightFactor").is_some());
        assert!(json.get("massFactor").is_some());

        let orientation = serde_json::to_value(Orientation::Forth).unwrap();
        assert_eq!(orientation, serde_json::json!("FORTH"));

        let kind = serde_json::to_value(EngineKind::Ant).unwrap();
        assert_eq!(kind, serde_json::json!("ant"));
    }
}
