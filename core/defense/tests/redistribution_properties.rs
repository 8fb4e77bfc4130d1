use guardsim_defense::{initial_ratios, max_ratio, RedistributionConfig, RedistributionEngine};
use guardsim_selection::{DistributionModel, ResilienceConfig, ResilienceWeightedModel, VanillaModel};
use guardsim_types::{
    AsToken, ClientContext, Guard, ResilienceMap, ResilienceTable, StepCostModel,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn mk_guards(bandwidths: &[f64]) -> Vec<Guard> {
    bandwidths
        .iter()
        .enumerate()
        .map(|(i, bw)| Guard::natural(format!("{:040X}", i), *bw).with_as(AsToken::new(i.to_string())))
        .collect()
}

fn engine(threshold: f64) -> RedistributionEngine {
    RedistributionEngine::new(RedistributionConfig::with_threshold(threshold).unwrap()).unwrap()
}

fn client() -> ClientContext {
    ClientContext::As(AsToken::new("client"))
}

#[test]
fn test_resilience_model_redistribution_conserves_mass() {
    let bandwidths = [500.0, 12_000.0, 90_000.0, 150_000.0, 3_000.0, 40_000.0];
    let guards = mk_guards(&bandwidths);
    let pool: Vec<&Guard> = guards.iter().collect();
    let values: HashMap<AsToken, f64> = (0..bandwidths.len())
        .map(|i| (AsToken::new(i.to_string()), 0.15 * i as f64))
        .collect();
    let mut table = ResilienceTable::new();
    table.insert(AsToken::new("client"), ResilienceMap::new(values).unwrap());
    let model = ResilienceWeightedModel::new(ResilienceConfig::default(), Arc::new(table)).unwrap();

    let result = engine(1.2)
        .redistribute(&model, &client(), &pool, &StepCostModel::default())
        .unwrap();

    assert!(result.distribution.is_normalized(1e-9));
    assert!(max_ratio(&result.distribution, &pool, &StepCostModel::default()).unwrap() <= 1.2 + 1e-9);
}

proptest! {
    #[test]
    fn test_redistribution_conserves_mass_and_respects_ceiling(
        bandwidths in prop::collection::vec(1.0f64..200_000.0, 1..40),
        threshold in 1.0f64..5.0,
    ) {
        let guards = mk_guards(&bandwidths);
        let pool: Vec<&Guard> = guards.iter().collect();
        let cost = StepCostModel::default();

        let result = engine(threshold)
            .redistribute(&VanillaModel, &client(), &pool, &cost)
            .unwrap();

        prop_assert!((result.distribution.total() - 1.0).abs() < 1e-6);
        prop_assert!(max_ratio(&result.distribution, &pool, &cost).unwrap() <= threshold + 1e-6);
    }

    #[test]
    fn test_uncapped_redistribution_reproduces_model(
        bandwidths in prop::collection::vec(1.0f64..200_000.0, 1..40),
    ) {
        let guards = mk_guards(&bandwidths);
        let pool: Vec<&Guard> = guards.iter().collect();
        let cost = StepCostModel::default();

        let ratios = initial_ratios(&VanillaModel, &client(), &pool, &cost).unwrap();
        let highest = ratios.values().cloned().fold(1.0, f64::max);
        let result = engine(highest * 2.0)
            .redistribute(&VanillaModel, &client(), &pool, &cost)
            .unwrap();
        let plain = VanillaModel.evaluate(&client(), &pool).unwrap();

        prop_assert_eq!(result.rounds, 1);
        prop_assert!(result.capped.is_empty());
        for g in &guards {
            prop_assert!((result.distribution.get(&g.id) - plain.get(&g.id)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_most_overweight_guard_is_monotone_in_threshold(
        bandwidths in prop::collection::vec(1.0f64..200_000.0, 2..30),
        low in 1.0f64..3.0,
        step in 0.0f64..3.0,
    ) {
        let guards = mk_guards(&bandwidths);
        let pool: Vec<&Guard> = guards.iter().collect();
        let cost = StepCostModel::default();

        let ratios = initial_ratios(&VanillaModel, &client(), &pool, &cost).unwrap();
        let (heaviest, _) = ratios
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();

        let before = engine(low).redistribute(&VanillaModel, &client(), &pool, &cost).unwrap();
        let after = engine(low + step).redistribute(&VanillaModel, &client(), &pool, &cost).unwrap();

        prop_assert!(
            after.distribution.get(heaviest) >= before.distribution.get(heaviest) - 1e-12
        );
    }
}
