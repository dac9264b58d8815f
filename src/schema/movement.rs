//! Movement descriptors: declarative actuator commands addressed to joints.
//!
//! In memory a descriptor is the typed [`Movement`] union. On the wire it is
//! the flat record `{ "id": "sta", "lens": "lfh", "params": [0.1, 0.5] }`;
//! compounds (`all`, `one`) carry no lens and nest descriptors in `params`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::genotype::{GenotypeError, LEG_PAIRS};

/// Body side of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    fn code(self) -> char {
        match self {
            Side::Left => 'l',
            Side::Right => 'r',
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Joint type within a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointKind {
    Hip,
    Knee,
}

impl JointKind {
    pub const ALL: [JointKind; 2] = [JointKind::Hip, JointKind::Knee];

    fn code(self) -> char {
        match self {
            JointKind::Hip => 'h',
            JointKind::Knee => 'k',
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            JointKind::Hip => JointKind::Knee,
            JointKind::Knee => JointKind::Hip,
        }
    }
}

const INDEX_CODES: [char; LEG_PAIRS] = ['f', 'm', 'b'];

/// Symbolic joint address, e.g. `lfh` = left front hip.
///
/// `index` counts leg pairs from the front (0 = front, 1 = middle, 2 = back).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LensId {
    pub side: Side,
    pub index: usize,
    pub kind: JointKind,
}

impl LensId {
    pub const fn new(side: Side, index: usize, kind: JointKind) -> Self {
        Self { side, index, kind }
    }

    /// Every addressable joint.
    pub fn all() -> impl Iterator<Item = LensId> {
        Side::ALL.into_iter().flat_map(|side| {
            (0..LEG_PAIRS).flat_map(move |index| {
                JointKind::ALL
                    .into_iter()
                    .map(move |kind| LensId::new(side, index, kind))
            })
        })
    }
}

impl fmt::Display for LensId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = INDEX_CODES.get(self.index).copied().unwrap_or('?');
        write!(f, "{}{}{}", self.side.code(), index, self.kind.code())
    }
}

impl FromStr for LensId {
    type Err = GenotypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GenotypeError::InvalidLens(s.to_string());
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 3 {
            return Err(invalid());
        }
        let side = match chars[0] {
            'l' => Side::Left,
            'r' => Side::Right,
            _ => return Err(invalid()),
        };
        let index = INDEX_CODES
            .iter()
            .position(|&c| c == chars[1])
            .ok_or_else(invalid)?;
        let kind = match chars[2] {
            'h' => JointKind::Hip,
            'k' => JointKind::Knee,
            _ => return Err(invalid()),
        };
        Ok(Self { side, index, kind })
    }
}

impl TryFrom<String> for LensId {
    type Error = GenotypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LensId> for String {
    fn from(lens: LensId) -> Self {
        lens.to_string()
    }
}

/// Descriptor id as it appears in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementId {
    /// Lock joint angle to zero.
    La0,
    /// Set angle limits.
    Sta,
    /// Set motor enabled.
    Stm,
    /// Set motor speed.
    Sts,
    /// Wait until predicate holds.
    Utl,
    All,
    One,
}

impl MovementId {
    /// Every registered descriptor id.
    pub const ALL: [MovementId; 7] = [
        MovementId::La0,
        MovementId::Sta,
        MovementId::Stm,
        MovementId::Sts,
        MovementId::Utl,
        MovementId::All,
        MovementId::One,
    ];

    /// Ids that address a joint.
    pub const PRIMITIVES: [MovementId; 5] = [
        MovementId::La0,
        MovementId::Sta,
        MovementId::Stm,
        MovementId::Sts,
        MovementId::Utl,
    ];

    pub fn is_compound(self) -> bool {
        matches!(self, MovementId::All | MovementId::One)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementId::La0 => "la0",
            MovementId::Sta => "sta",
            MovementId::Stm => "stm",
            MovementId::Sts => "sts",
            MovementId::Utl => "utl",
            MovementId::All => "all",
            MovementId::One => "one",
        }
    }
}

impl fmt::Display for MovementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate tested against a joint's live angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnglePredicate {
    MaxAngle,
    MinAngle,
    Angle(f32),
}

impl AnglePredicate {
    fn to_params(self) -> Vec<Value> {
        match self {
            AnglePredicate::MaxAngle => vec![Value::from("isMaxAngle")],
            AnglePredicate::MinAngle => vec![Value::from("isMinAngle")],
            AnglePredicate::Angle(angle) => vec![Value::from("isAngle"), Value::from(angle)],
        }
    }
}

/// A movement descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MovementRecord", into = "MovementRecord")]
pub enum Movement {
    LockAngle { lens: LensId },
    SetAngleLimits { lens: LensId, min: f32, max: f32 },
    SetMotorEnabled { lens: LensId, enabled: bool },
    SetSpeed { lens: LensId, speed: f32 },
    WaitUntil { lens: LensId, predicate: AnglePredicate },
    All(Vec<Movement>),
    One(Vec<Movement>),
}

impl Movement {
    pub fn id(&self) -> MovementId {
        match self {
            Movement::LockAngle { .. } => MovementId::La0,
            Movement::SetAngleLimits { .. } => MovementId::Sta,
            Movement::SetMotorEnabled { .. } => MovementId::Stm,
            Movement::SetSpeed { .. } => MovementId::Sts,
            Movement::WaitUntil { .. } => MovementId::Utl,
            Movement::All(_) => MovementId::All,
            Movement::One(_) => MovementId::One,
        }
    }

    /// Target joint; compounds have none.
    pub fn lens(&self) -> Option<LensId> {
        match self {
            Movement::LockAngle { lens }
            | Movement::SetAngleLimits { lens, .. }
            | Movement::SetMotorEnabled { lens, .. }
            | Movement::SetSpeed { lens, .. }
            | Movement::WaitUntil { lens, .. } => Some(*lens),
            Movement::All(_) | Movement::One(_) => None,
        }
    }

    pub fn lens_mut(&mut self) -> Option<&mut LensId> {
        match self {
            Movement::LockAngle { lens }
            | Movement::SetAngleLimits { lens, .. }
            | Movement::SetMotorEnabled { lens, .. }
            | Movement::SetSpeed { lens, .. }
            | Movement::WaitUntil { lens, .. } => Some(lens),
            Movement::All(_) | Movement::One(_) => None,
        }
    }

    /// Nested descriptors of a compound.
    pub fn children(&self) -> &[Movement] {
        match self {
            Movement::All(children) | Movement::One(children) => children,
            _ => &[],
        }
    }

    /// Count descriptors with `id`, including this one, at any depth.
    pub fn count(&self, id: MovementId) -> usize {
        let own = usize::from(self.id() == id);
        own + self.children().iter().map(|c| c.count(id)).sum::<usize>()
    }
}

/// Flat wire form of a [`Movement`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: MovementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<LensId>,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl From<Movement> for MovementRecord {
    fn from(movement: Movement) -> Self {
        let id = movement.id();
        let lens = movement.lens();
        let params = match movement {
            Movement::LockAngle { .. } => Vec::new(),
            Movement::SetAngleLimits { min, max, .. } => vec![Value::from(min), Value::from(max)],
            Movement::SetMotorEnabled { enabled, .. } => vec![Value::from(enabled)],
            Movement::SetSpeed { speed, .. } => vec![Value::from(speed)],
            Movement::WaitUntil { predicate, .. } => predicate.to_params(),
            Movement::All(children) | Movement::One(children) => children
                .into_iter()
                .map(|child| {
                    // Records built from typed movements always serialize.
                    serde_json::to_value(MovementRecord::from(child)).unwrap_or(Value::Null)
                })
                .collect(),
        };
        Self { id, lens, params }
    }
}

impl TryFrom<MovementRecord> for Movement {
    type Error = GenotypeError;

    fn try_from(record: MovementRecord) -> Result<Self, Self::Error> {
        let id = record.id;
        let params = &record.params;

        if id.is_compound() {
            let children = params
                .iter()
                .map(|p| serde_json::from_value::<Movement>(p.clone()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| GenotypeError::InvalidParams {
                    id,
                    reason: e.to_string(),
                })?;
            return Ok(match id {
                MovementId::All => Movement::All(children),
                _ => Movement::One(children),
            });
        }

        let lens = record.lens.ok_or(GenotypeError::MissingLens { id })?;
        let movement = match id {
            MovementId::La0 => Movement::LockAngle { lens },
            MovementId::Sta => {
                expect_arity(id, params, 2)?;
                Movement::SetAngleLimits {
                    lens,
                    min: number(id, params, 0)?,
                    max: number(id, params, 1)?,
                }
            }
            MovementId::Stm => {
                expect_arity(id, params, 1)?;
                let enabled = params[0].as_bool().ok_or_else(|| GenotypeError::InvalidParams {
                    id,
                    reason: "expected a boolean".to_string(),
                })?;
                Movement::SetMotorEnabled { lens, enabled }
            }
            MovementId::Sts => {
                expect_arity(id, params, 1)?;
                Movement::SetSpeed {
                    lens,
                    speed: number(id, params, 0)?,
                }
            }
            MovementId::Utl => Movement::WaitUntil {
                lens,
                predicate: predicate(id, params)?,
            },
            MovementId::All | MovementId::One => unreachable!("compounds handled above"),
        };
        Ok(movement)
    }
}

fn expect_arity(id: MovementId, params: &[Value], arity: usize) -> Result<(), GenotypeError> {
    if params.len() != arity {
        return Err(GenotypeError::InvalidParams {
            id,
            reason: format!("expected {arity} params, got {}", params.len()),
        });
    }
    Ok(())
}

fn number(id: MovementId, params: &[Value], index: usize) -> Result<f32, GenotypeError> {
    params
        .get(index)
        .and_then(Value::as_f64)
        .map(|v| v as f32)
        .ok_or_else(|| GenotypeError::InvalidParams {
            id,
            reason: format!("param {index} must be a number"),
        })
}

fn predicate(id: MovementId, params: &[Value]) -> Result<AnglePredicate, GenotypeError> {
    let name = params
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| GenotypeError::InvalidParams {
            id,
            reason: "param 0 must be a predicate name".to_string(),
        })?;
    match name {
        "isMaxAngle" => Ok(AnglePredicate::MaxAngle),
        "isMinAngle" => Ok(AnglePredicate::MinAngle),
        "isAngle" => Ok(AnglePredicate::Angle(number(id, params, 1)?)),
        other => Err(GenotypeError::UnknownPredicate(other.to_string())),
    }
}
