//! Usage decay

use fairshare_config::{DecayFactor, FairshareSettings};
use tracing::debug;

use crate::{FairshareTree, recompute};

/// Ages usage by a fixed factor so recent consumption dominates
#[derive(Debug, Clone, Copy)]
pub struct DecayEngine {
    factor: DecayFactor,
    min_usage: f64,
}

impl DecayEngine {
    pub fn new(factor: DecayFactor, min_usage: f64) -> Self {
        Self { factor, min_usage }
    }

    pub fn from_settings(settings: &FairshareSettings) -> Self {
        Self::new(settings.decay_factor, settings.min_usage)
    }

    pub fn factor(&self) -> DecayFactor {
        self.factor
    }

    pub fn min_usage(&self) -> f64 {
        self.min_usage
    }

    /// Decayed value of a single usage. Positive usage stops at the floor;
    /// usage already below the floor is left where it is.
    pub fn decay_value(&self, usage: f64) -> f64 {
        let decayed = usage * self.factor.get();
        decayed.max(self.min_usage.min(usage))
    }

    /// Decay every entity's own usage and recompute the tree.
    /// Returns the number of entities whose usage changed.
    pub fn decay(&self, tree: &mut FairshareTree) -> usize {
        let mut changed = 0;
        for entity in &mut tree.entities {
            let decayed = self.decay_value(entity.usage);
            if decayed != entity.usage {
                entity.usage = decayed;
                changed += 1;
            }
        }
        recompute(tree);

        debug!(
            factor = self.factor.get(),
            min_usage = self.min_usage,
            changed,
            "Usage decayed"
        );
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairshare_config::parse_groups;
    use proptest::prelude::*;

    fn engine(factor: f64, min_usage: f64) -> DecayEngine {
        DecayEngine::new(DecayFactor::new(factor).unwrap(), min_usage)
    }

    #[test]
    fn test_halves_usage() {
        let mut tree = FairshareTree::build(&parse_groups("leaf 1 root 1\n").unwrap(), 0).unwrap();
        let leaf = tree.find("leaf").unwrap();
        tree.get_mut(leaf).usage = 100.0;
        recompute(&mut tree);

        let changed = engine(0.5, 0.0).decay(&mut tree);
        assert_eq!(changed, 1);
        assert_eq!(tree.get(leaf).usage(), 50.0);
        assert_eq!(tree.get(tree.root()).tree_usage(), 50.0);
        assert_eq!(tree.get(leaf).usage_factor(), Some(50.0));
    }

    #[test]
    fn test_floor() {
        let engine = engine(0.5, 1.0);
        assert_eq!(engine.decay_value(10.0), 5.0);
        assert_eq!(engine.decay_value(1.5), 1.0);
        assert_eq!(engine.decay_value(0.5), 0.5);
        assert_eq!(engine.decay_value(0.0), 0.0);
    }

    #[test]
    fn test_from_settings() {
        let settings = FairshareSettings {
            decay_factor: DecayFactor::new(0.9).unwrap(),
            min_usage: 2.0,
            ..Default::default()
        };
        let engine = DecayEngine::from_settings(&settings);
        assert_eq!(engine.factor().get(), 0.9);
        assert_eq!(engine.min_usage(), 2.0);
    }

    proptest! {
        #[test]
        fn test_twice_equals_squared_factor(f in 0.01f64..0.99, usage in 0.0f64..1e12) {
            let once = engine(f, 0.0);
            let squared = engine(f * f, 0.0);

            let twice = once.decay_value(once.decay_value(usage));
            let direct = squared.decay_value(usage);
            prop_assert!((twice - direct).abs() <= 1e-9 * usage.max(1.0));
        }
    }
}
