// guardsim/core/selection/src/vanilla.rs

use crate::error::SelectionError;
use crate::model::{bandwidth_proportional, ensure_nonempty, DistributionModel};
use guardsim_types::{ClientContext, Guard, SelectionDistribution};

/// Location-oblivious bandwidth-weighted selection
#[derive(Debug, Clone, Copy, Default)]
pub struct VanillaModel;

impl DistributionModel for VanillaModel {
    fn name(&self) -> &'static str {
        "vanilla"
    }

    fn evaluate(
        &self,
        _client: &ClientContext,
        pool: &[&Guard],
    ) -> Result<SelectionDistribution, SelectionError> {
        ensure_nonempty(pool)?;
        Ok(bandwidth_proportional(pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardsim_types::{AsToken, GuardId, Location};

    #[test]
    fn test_synthetic_guard_gets_bandwidth_share() {
        let guards = vec![
            Guard::natural("A", 30.0),
            Guard::synthetic(0, 10.0, &Location::As(AsToken::new("1"))),
        ];
        let pool: Vec<&Guard> = guards.iter().collect();
        let client = ClientContext::As(AsToken::new("2"));

        let dist = VanillaModel.evaluate(&client, &pool).unwrap();
        assert!((dist.get(&GuardId::Synthetic(0)) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        let client = ClientContext::As(AsToken::new("2"));
        assert!(matches!(
            VanillaModel.evaluate(&client, &[]),
            Err(SelectionError::EmptyPool)
        ));
    }
}
