//! Proportional mass distribution over mass-bearing parts.

use crate::schema::{Body, Individual, Leg};

/// A part carrying a share of the individual's mass.
pub trait MassBearing {
    fn mass_factor(&self) -> f32;
    fn set_mass(&mut self, mass: f32);
}

impl MassBearing for Body {
    fn mass_factor(&self) -> f32 {
        self.mass_factor
    }

    fn set_mass(&mut self, mass: f32) {
        self.mass = mass;
    }
}

impl MassBearing for Leg {
    fn mass_factor(&self) -> f32 {
        self.mass_factor
    }

    fn set_mass(&mut self, mass: f32) {
        self.mass = mass;
    }
}

/// Assign `total * factor / sum(factors)` to every part.
///
/// A zero (or negative) factor sum leaves every mass untouched.
pub fn distribute_mass(parts: &mut [&mut dyn MassBearing], total: f32) {
    let sum: f32 = parts.iter().map(|p| p.mass_factor()).sum();
    if sum <= 0.0 {
        return;
    }
    for part in parts.iter_mut() {
        let share = part.mass_factor() / sum;
        part.set_mass(total * share);
    }
}

impl Individual {
    /// Mass-bearing parts, depth first: body, then legs front to back.
    pub fn mass_parts_mut(&mut self) -> Vec<&mut dyn MassBearing> {
        let mut parts: Vec<&mut dyn MassBearing> = Vec::with_capacity(1 + self.legs.len());
        parts.push(&mut self.body);
        parts.extend(
            self.legs
                .iter_mut()
                .map(|pair| &mut pair.leg as &mut dyn MassBearing),
        );
        parts
    }

    /// Redistribute `total` over body and legs by mass factor.
    pub fn distribute_mass(&mut self, total: f32) {
        distribute_mass(&mut self.mass_parts_mut(), total);
    }
}
