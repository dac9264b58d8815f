//! Mutation rules.
//!
//! Each rule owns its own parameters and touches a disjoint part of the
//! genotype. Rules never modify their input; they return a mutated copy.

use rayon::prelude::*;

use crate::schema::{
    AnglePredicate, BodyRuleConfig, EngineRuleConfig, Individual, LEG_PAIRS, LegRuleConfig,
    Movement, MutationConfig, Population, StepParam,
};

use super::genotype::GenomeRng;
use super::genotype::geometry::{contains, hip_position, sector_point};
use super::movement::{random_movement, random_predicate};

/// Step of `sta` limit perturbation.
const LIMIT_STEP: f32 = 0.1;
/// Step of `sts` speed perturbation.
const SPEED_STEP: f32 = 0.01;
/// Step of `utl` target angle perturbation.
const ANGLE_STEP: f32 = 0.1;
/// Exclusive upper bound of a leg's thigh share.
const HEIGHT_FACTOR_LIMIT: f32 = 1.0;

/// A mutation operator over individuals.
pub trait MutationRule: Send + Sync {
    fn mutate(&self, individual: &Individual, rng: &mut GenomeRng) -> Individual;
}

/// Bounded random walk.
///
/// With `param.probability`, moves `value` by up to `param.step`. A result
/// that is not positive, or reaches `param.max`, is rejected and the
/// original value kept.
pub fn random_walk(value: f32, param: &StepParam, rng: &mut GenomeRng) -> f32 {
    if !rng.chance(param.probability) {
        return value;
    }
    let next = value + rng.uniform((-param.step, param.step));
    if next <= 0.0 {
        return value;
    }
    if let Some(max) = param.max
        && next >= max
    {
        return value;
    }
    next
}

/// Body polygon vertices and hip placement.
#[derive(Debug, Clone)]
pub struct BodyRule {
    config: BodyRuleConfig,
}

impl BodyRule {
    pub fn new(config: BodyRuleConfig) -> Self {
        Self { config }
    }
}

impl MutationRule for BodyRule {
    fn mutate(&self, individual: &Individual, rng: &mut GenomeRng) -> Individual {
        let mut mutated = individual.clone();
        let body = &mut mutated.body;

        let count = body.body_points.len();
        for (i, point) in body.body_points.iter_mut().enumerate() {
            if rng.chance(self.config.body_point) {
                *point = sector_point(i, count, rng);
            }
        }

        for slot in 0..LEG_PAIRS {
            let current = body.hip_joint_positions.get(slot).copied();
            let regenerate = rng.chance(self.config.hip_joint)
                || current.is_none_or(|p| !contains(&body.body_points, p));
            if regenerate {
                let position = hip_position(&body.body_points, slot, LEG_PAIRS, rng);
                match body.hip_joint_positions.get_mut(slot) {
                    Some(existing) => *existing = position,
                    None => body.hip_joint_positions.push(position),
                }
            }
        }

        mutated.sync_hip_positions();
        mutated
    }
}

/// Leg height, height split and width.
#[derive(Debug, Clone)]
pub struct LegRule {
    config: LegRuleConfig,
}

impl LegRule {
    /// The `height_factor` limit is the tighter of the configured `max` and 1.
    pub fn new(mut config: LegRuleConfig) -> Self {
        let max = config
            .height_factor
            .max
            .map_or(HEIGHT_FACTOR_LIMIT, |max| max.min(HEIGHT_FACTOR_LIMIT));
        config.height_factor.max = Some(max);
        Self { config }
    }
}

impl MutationRule for LegRule {
    fn mutate(&self, individual: &Individual, rng: &mut GenomeRng) -> Individual {
        let mut mutated = individual.clone();
        for pair in &mut mutated.legs {
            let leg = &mut pair.leg;
            leg.height = random_walk(leg.height, &self.config.height, rng);
            leg.height_factor = random_walk(leg.height_factor, &self.config.height_factor, rng);
            leg.width = random_walk(leg.width, &self.config.width, rng);
        }
        mutated
    }
}

/// Engine movement descriptors.
#[derive(Debug, Clone)]
pub struct EngineRule {
    config: EngineRuleConfig,
}

impl EngineRule {
    pub fn new(config: EngineRuleConfig) -> Self {
        Self { config }
    }

    /// Add, remove and perturb entries of a descriptor list.
    ///
    /// List-level probabilities are scaled by `1 / len`.
    pub fn mutate_list(&self, list: &[Movement], rng: &mut GenomeRng, depth: usize) -> Vec<Movement> {
        let scale = 1.0 / list.len().max(1) as f32;
        let mut out = Vec::with_capacity(list.len() + 1);
        if list.is_empty() && rng.chance(self.config.add) {
            out.push(random_movement(rng, depth));
        }
        for movement in list {
            if rng.chance(self.config.add * scale) {
                out.push(random_movement(rng, depth));
            }
            if rng.chance(self.config.remove * scale) {
                continue;
            }
            let movement = match movement {
                Movement::All(_) | Movement::One(_) => self.mutate_compound(movement, rng, depth),
                _ if rng.chance(self.config.mutate * scale) => self.perturb(movement, rng),
                _ => movement.clone(),
            };
            out.push(movement);
        }
        out
    }

    fn mutate_compound(&self, movement: &Movement, rng: &mut GenomeRng, depth: usize) -> Movement {
        let children = self.mutate_list(movement.children(), rng, depth + 1);
        let flip = rng.chance(self.config.combinator);
        match (movement, flip) {
            (Movement::All(_), false) | (Movement::One(_), true) => Movement::All(children),
            _ => Movement::One(children),
        }
    }

    /// Perturb the lens and params of a primitive.
    fn perturb(&self, movement: &Movement, rng: &mut GenomeRng) -> Movement {
        let mut movement = movement.clone();
        let config = &self.config;

        if let Some(lens) = movement.lens_mut() {
            if rng.chance(config.lens_index) {
                lens.index = rng.index(LEG_PAIRS);
            }
            if rng.chance(config.lens_side) {
                lens.side = lens.side.flipped();
            }
            if rng.chance(config.lens_type) {
                lens.kind = lens.kind.flipped();
            }
        }

        if !rng.chance(config.param) {
            return movement;
        }
        match &mut movement {
            Movement::SetAngleLimits { min, max, .. } => {
                let a = *min + rng.uniform((-LIMIT_STEP, LIMIT_STEP));
                let b = *max + rng.uniform((-LIMIT_STEP, LIMIT_STEP));
                *min = a.min(b);
                *max = a.max(b);
            }
            Movement::SetSpeed { speed, .. } => {
                *speed += rng.uniform((-SPEED_STEP, SPEED_STEP));
            }
            Movement::SetMotorEnabled { enabled, .. } => {
                *enabled = !*enabled;
            }
            Movement::WaitUntil { predicate, .. } => {
                *predicate = match *predicate {
                    AnglePredicate::Angle(angle) if rng.coin() => {
                        AnglePredicate::Angle(angle + rng.uniform((-ANGLE_STEP, ANGLE_STEP)))
                    }
                    _ => random_predicate(rng),
                };
            }
            Movement::LockAngle { .. } | Movement::All(_) | Movement::One(_) => {}
        }
        movement
    }
}

impl MutationRule for EngineRule {
    fn mutate(&self, individual: &Individual, rng: &mut GenomeRng) -> Individual {
        let mut mutated = individual.clone();
        let descriptor = &mut mutated.engine.descriptor;
        descriptor.initial = self.mutate_list(&individual.engine.descriptor.initial, rng, 0);

        let movements = self.mutate_list(&individual.engine.descriptor.movements, rng, 0);
        // A gait needs at least one phase.
        if !movements.is_empty() || individual.engine.descriptor.movements.is_empty() {
            descriptor.movements = movements;
        }
        mutated
    }
}

/// Applies body, leg and engine rules in sequence.
pub struct Mutator {
    rules: Vec<Box<dyn MutationRule>>,
}

impl Mutator {
    pub fn new(rules: Vec<Box<dyn MutationRule>>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &MutationConfig) -> Self {
        Self::new(vec![
            Box::new(BodyRule::new(config.body.clone())),
            Box::new(LegRule::new(config.leg.clone())),
            Box::new(EngineRule::new(config.engine.clone())),
        ])
    }

    /// Mutated copy of `individual` with its fitness cleared.
    pub fn mutate(&self, individual: &Individual, rng: &mut GenomeRng) -> Individual {
        let mut mutated = self
            .rules
            .iter()
            .fold(individual.clone(), |current, rule| rule.mutate(&current, rng));
        mutated.fitness = None;
        mutated
    }

    /// Mutate every individual in parallel.
    ///
    /// Each individual gets its own child seed drawn from `seed`, so the
    /// result does not depend on thread scheduling.
    pub fn mutate_population(&self, population: &Population, seed: u64) -> Population {
        let mut rng = GenomeRng::new(seed);
        let seeds: Vec<u64> = population.individuals.iter().map(|_| rng.next_seed()).collect();

        let individuals = population
            .individuals
            .par_iter()
            .zip(seeds.into_par_iter())
            .map(|(individual, seed)| self.mutate(individual, &mut GenomeRng::new(seed)))
            .collect();

        Population::new(individuals, population.generation_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::genotype::{IndividualOptions, Seedable};
    use crate::schema::{LensId, Point};
    use proptest::prelude::*;

    fn individual(seed: u64) -> Individual {
        let mut rng = GenomeRng::new(seed);
        Individual::seed(&IndividualOptions::default(), &mut rng)
    }

    fn engine_rule(add: f32, remove: f32, mutate: f32) -> EngineRule {
        EngineRule::new(EngineRuleConfig {
            add,
            remove,
            mutate,
            lens_index: 0.0,
            lens_side: 0.0,
            lens_type: 0.0,
            param: 0.0,
            combinator: 0.0,
        })
    }

    #[test]
    fn test_random_walk_rejects_out_of_range() {
        let mut rng = GenomeRng::new(0);
        let param = StepParam::new(1.0, 0.05, Some(1.0));
        for _ in 0..200 {
            let near_top = random_walk(0.99, &param, &mut rng);
            assert!(near_top < 1.0 && near_top > 0.0);
            let near_zero = random_walk(0.01, &param, &mut rng);
            assert!(near_zero > 0.0);
        }
        let never = StepParam::new(0.0, 0.05, None);
        assert_eq!(random_walk(0.5, &never, &mut rng), 0.5);
    }

    #[test]
    fn test_body_rule_keeps_sectors_and_hips() {
        let rule = BodyRule::new(BodyRuleConfig {
            body_point: 1.0,
            hip_joint: 0.0,
        });
        let mut rng = GenomeRng::new(3);
        for seed in 0..20 {
            let original = individual(seed);
            let mutated = rule.mutate(&original, &mut rng);
            assert_eq!(
                mutated.body.body_points.len(),
                original.body.body_points.len()
            );
            assert_ne!(mutated.body.body_points, original.body.body_points);
            for (pair, hip) in mutated.legs.iter().zip(&mutated.body.hip_joint_positions) {
                assert!(contains(&mutated.body.body_points, *hip));
                assert_eq!(pair.hip_joint.position, *hip);
            }
        }
    }

    #[test]
    fn test_body_rule_repairs_stray_hip() {
        let rule = BodyRule::new(BodyRuleConfig {
            body_point: 0.0,
            hip_joint: 0.0,
        });
        let mut original = individual(5);
        original.body.hip_joint_positions[1] = Point::new(5.0, 5.0);
        let mutated = rule.mutate(&original, &mut GenomeRng::new(1));

        assert_eq!(mutated.body.body_points, original.body.body_points);
        assert_eq!(
            mutated.body.hip_joint_positions[0],
            original.body.hip_joint_positions[0]
        );
        assert!(contains(
            &mutated.body.body_points,
            mutated.body.hip_joint_positions[1]
        ));
    }

    #[test]
    fn test_engine_rule_add_and_remove() {
        let single = vec![Movement::LockAngle {
            lens: "lfh".parse().unwrap(),
        }];
        let mut rng = GenomeRng::new(2);

        let grown = engine_rule(1.0, 0.0, 0.0).mutate_list(&single, &mut rng, 0);
        assert_eq!(grown.len(), 2);
        assert_eq!(grown[1], single[0]);

        let shrunk = engine_rule(0.0, 1.0, 0.0).mutate_list(&single, &mut rng, 0);
        assert!(shrunk.is_empty());
    }

    #[test]
    fn test_engine_rule_never_empties_phases() {
        let rule = engine_rule(0.0, 1.0, 0.0);
        let mut original = individual(7);
        original.engine.descriptor.movements.truncate(1);
        let mutated = rule.mutate(&original, &mut GenomeRng::new(0));
        assert_eq!(
            mutated.engine.descriptor.movements,
            original.engine.descriptor.movements
        );
    }

    #[test]
    fn test_engine_rule_perturbs_primitives() {
        let rule = EngineRule::new(EngineRuleConfig {
            add: 0.0,
            remove: 0.0,
            mutate: 1.0,
            lens_index: 0.0,
            lens_side: 1.0,
            lens_type: 1.0,
            param: 1.0,
            combinator: 1.0,
        });
        let mut rng = GenomeRng::new(4);

        let primitive = vec![Movement::SetMotorEnabled {
            lens: "lfh".parse().unwrap(),
            enabled: true,
        }];
        let mutated = rule.mutate_list(&primitive, &mut rng, 0);
        assert_eq!(
            mutated,
            vec![Movement::SetMotorEnabled {
                lens: "rfk".parse::<LensId>().unwrap(),
                enabled: false,
            }]
        );

        let compound = vec![Movement::All(vec![Movement::SetSpeed {
            lens: "rbk".parse().unwrap(),
            speed: 1.0,
        }])];
        let mutated = rule.mutate_list(&compound, &mut rng, 0);
        assert_eq!(mutated.len(), 1);
        let Movement::One(children) = &mutated[0] else {
            panic!("combinator should flip, got {:?}", mutated[0]);
        };
        let Movement::SetSpeed { lens, speed } = &children[0] else {
            panic!("unexpected child {:?}", children[0]);
        };
        assert_eq!(*lens, "lbh".parse::<LensId>().unwrap());
        assert!((*speed - 1.0).abs() <= SPEED_STEP);
    }

    #[test]
    fn test_mutator_is_pure_and_clears_fitness() {
        let mutator = Mutator::from_config(&MutationConfig::default());
        let mut original = individual(11);
        original.fitness = Some(3.0);
        let snapshot = original.clone();
        let mutated = mutator.mutate(&original, &mut GenomeRng::new(9));
        assert_eq!(original, snapshot);
        assert_eq!(mutated.fitness, None);
    }

    #[test]
    fn test_mutate_population_is_deterministic() {
        let mutator = Mutator::from_config(&MutationConfig::default());
        let population = Population::new((0..8).map(individual).collect(), 3);
        let a = mutator.mutate_population(&population, 42);
        let b = mutator.mutate_population(&population, 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_eq!(a.generation_count, 3);
    }

    #[test]
    fn test_leg_rule_caps_factor_without_configured_max() {
        let json = r#"{"mutation":{"leg":{"height_factor":{"probability":1.0,"step":0.3}}}}"#;
        let config: crate::schema::EvolutionConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.mutation.leg.height_factor.max, None);

        let rule = LegRule::new(config.mutation.leg.clone());
        let mut rng = GenomeRng::new(11);
        let mut current = individual(2);
        for _ in 0..200 {
            current = rule.mutate(&current, &mut rng);
            for pair in &current.legs {
                assert!(pair.leg.height_factor > 0.0 && pair.leg.height_factor < 1.0);
                assert!(pair.leg.shank_length() > 0.0);
            }
        }
    }

    #[test]
    fn test_leg_rule_keeps_tighter_configured_max() {
        let rule = LegRule::new(LegRuleConfig {
            height: StepParam::new(0.0, 0.0, None),
            height_factor: StepParam::new(1.0, 0.3, Some(0.6)),
            width: StepParam::new(0.0, 0.0, None),
        });
        let mut rng = GenomeRng::new(4);
        let mut current = individual(3);
        for pair in &mut current.legs {
            pair.leg.height_factor = 0.3;
        }
        for _ in 0..100 {
            current = rule.mutate(&current, &mut rng);
            assert!(current.legs.iter().all(|pair| pair.leg.height_factor < 0.6));
        }
    }

    proptest! {
        #[test]
        fn prop_leg_height_walk(seed in any::<u64>()) {
            let param = StepParam::new(1.0, 0.05, None);
            let mut rng = GenomeRng::new(seed);
            let height = random_walk(1.0, &param, &mut rng);
            prop_assert!((0.95..=1.05).contains(&height));
        }

        #[test]
        fn prop_leg_rule_keeps_factor_open(seed in any::<u64>()) {
            let rule = LegRule::new(LegRuleConfig {
                height: StepParam::new(1.0, 0.5, None),
                height_factor: StepParam::new(1.0, 0.5, Some(1.0)),
                width: StepParam::new(1.0, 0.5, None),
            });
            let mut rng = GenomeRng::new(seed);
            let mutated = rule.mutate(&individual(seed % 16), &mut rng);
            for pair in &mutated.legs {
                prop_assert!(pair.leg.height_factor > 0.0 && pair.leg.height_factor < 1.0);
                prop_assert!(pair.leg.height > 0.0);
                prop_assert!(pair.leg.width > 0.0);
            }
        }
    }
}
