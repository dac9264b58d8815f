//! Static parts schema of the genotype tree.
//!
//! The schema mirrors the nesting of [`Individual`]: leaf parts are
//! [`Identifiable`] records, containers nest further parts, and symmetric
//! structures repeat one part a fixed number of times. [`build`] checks a
//! plain record against the schema before decoding it.

use serde_json::{Map, Value};

use crate::schema::{
    Body, Engine, Foot, GenotypeError, HipJoint, Individual, KneeJoint, LEG_PAIRS, Leg,
};

use super::Identifiable;

/// A node of the parts schema.
#[derive(Debug, Clone, Copy)]
pub enum PartSchema {
    /// Record with a fixed key set.
    Leaf {
        identifier: &'static str,
        fields: &'static [&'static str],
    },
    /// Container of named parts, plus keys that may be absent.
    Nested {
        parts: &'static [(&'static str, PartSchema)],
        optional: &'static [&'static str],
    },
    /// `count` copies of one part, as an array.
    Repeated {
        count: usize,
        part: &'static PartSchema,
    },
}

impl PartSchema {
    pub const fn leaf<T: Identifiable>() -> Self {
        PartSchema::Leaf {
            identifier: T::IDENTIFIER,
            fields: T::FIELDS,
        }
    }
}

static LEG_PAIR_PARTS: PartSchema = PartSchema::Nested {
    parts: &[
        (HipJoint::IDENTIFIER, PartSchema::leaf::<HipJoint>()),
        (KneeJoint::IDENTIFIER, PartSchema::leaf::<KneeJoint>()),
        (Leg::IDENTIFIER, PartSchema::leaf::<Leg>()),
        (Foot::IDENTIFIER, PartSchema::leaf::<Foot>()),
    ],
    optional: &[],
};

/// Schema of a complete individual.
pub static INDIVIDUAL_PARTS: PartSchema = PartSchema::Nested {
    parts: &[
        (Body::IDENTIFIER, PartSchema::leaf::<Body>()),
        (Engine::IDENTIFIER, PartSchema::leaf::<Engine>()),
        (
            "legs",
            PartSchema::Repeated {
                count: LEG_PAIRS,
                part: &LEG_PAIR_PARTS,
            },
        ),
    ],
    optional: &["fitness"],
};

/// Check that `value` has exactly the shape described by `schema`.
pub fn conforms(schema: &PartSchema, value: &Value) -> Result<(), GenotypeError> {
    conforms_at(schema, value, "$")
}

fn conforms_at(schema: &PartSchema, value: &Value, path: &str) -> Result<(), GenotypeError> {
    let mismatch = |reason: String| GenotypeError::SchemaMismatch {
        path: path.to_string(),
        reason,
    };

    match schema {
        PartSchema::Leaf { identifier, fields } => {
            let object = as_object(value).ok_or_else(|| mismatch(format!("{identifier} must be an object")))?;
            check_keys(object, fields, &[]).map_err(mismatch)
        }
        PartSchema::Nested { parts, optional } => {
            let object = as_object(value).ok_or_else(|| mismatch("expected an object".to_string()))?;
            let keys: Vec<&str> = parts.iter().map(|(key, _)| *key).collect();
            check_keys(object, &keys, optional).map_err(mismatch)?;
            for (key, part) in parts.iter() {
                conforms_at(part, &object[*key], &format!("{path}.{key}"))?;
            }
            Ok(())
        }
        PartSchema::Repeated { count, part } => {
            let items = value
                .as_array()
                .ok_or_else(|| mismatch("expected an array".to_string()))?;
            if items.len() != *count {
                return Err(mismatch(format!(
                    "expected {count} entries, got {}",
                    items.len()
                )));
            }
            for (i, item) in items.iter().enumerate() {
                conforms_at(part, item, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
    }
}

fn as_object(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object()
}

fn check_keys(
    object: &Map<String, Value>,
    required: &[&str],
    optional: &[&str],
) -> Result<(), String> {
    if let Some(missing) = required.iter().find(|k| !object.contains_key(**k)) {
        return Err(format!("missing key '{missing}'"));
    }
    if let Some(extra) = object
        .keys()
        .find(|k| !required.contains(&k.as_str()) && !optional.contains(&k.as_str()))
    {
        return Err(format!("unexpected key '{extra}'"));
    }
    Ok(())
}

/// Plain record of an individual.
pub fn record(individual: &Individual) -> Result<Value, GenotypeError> {
    Ok(serde_json::to_value(individual)?)
}

/// Build an individual from a plain record, checking its shape first.
pub fn build(value: Value) -> Result<Individual, GenotypeError> {
    conforms(&INDIVIDUAL_PARTS, &value)?;
    let mut individual: Individual = serde_json::from_value(value)?;
    individual.sync_hip_positions();
    Ok(individual)
}
