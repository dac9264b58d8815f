//! Terrain description shared by every individual of a generation.

use serde::{Deserialize, Serialize};

/// Terrain variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParcourKind {
    #[default]
    Mountain,
}

/// Height field sampled at unit x spacing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parcour {
    #[serde(rename = "type")]
    pub kind: ParcourKind,
    pub value: Vec<f32>,
}

impl Parcour {
    /// Flat ground.
    pub fn flat() -> Self {
        Self::default()
    }

    /// Height at `x`, linearly interpolated; 0 outside the sampled range.
    pub fn height_at(&self, x: f32) -> f32 {
        if self.value.is_empty() || x < 0.0 {
            return 0.0;
        }
        let i = x.floor() as usize;
        if i + 1 >= self.value.len() {
            return self.value.last().copied().unwrap_or(0.0);
        }
        let t = x - i as f32;
        self.value[i] * (1.0 - t) + self.value[i + 1] * t
    }

    /// Slope (dy/dx) at `x`.
    pub fn slope_at(&self, x: f32) -> f32 {
        if self.value.len() < 2 || x < 0.0 {
            return 0.0;
        }
        let i = (x.floor() as usize).min(self.value.len() - 2);
        self.value[i + 1] - self.value[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation() {
        let parcour = Parcour {
            kind: ParcourKind::Mountain,
            value: vec![0.0, 1.0, 1.0],
        };
        assert!((parcour.height_at(0.5) - 0.5).abs() < 1e-6);
        assert!((parcour.slope_at(0.2) - 1.0).abs() < 1e-6);
        assert_eq!(parcour.slope_at(1.5), 0.0);
        assert_eq!(parcour.height_at(10.0), 1.0);
        assert_eq!(Parcour::flat().height_at(3.0), 0.0);
    }

    #[test]
    fn test_wire_format() {
        let parcour = Parcour {
            kind: ParcourKind::Mountain,
            value: vec![0.0, 0.5],
        };
        let json = serde_json::to_value(&parcour).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "mountain", "value": [0.0, 0.5] }));
    }
}
