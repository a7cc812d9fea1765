//! Geographic sampling of jurisdictions.
//!
//! The population generator asks a [`GeoSampler`] for one jurisdiction per
//! new space. [`WeightedGeoSampler`] draws in proportion to each
//! jurisdiction's configured weight, standing in for a population-share
//! data source.

use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;

use crate::jurisdiction::{Jurisdiction, JurisdictionIdx};
use crate::population::PopulationError;

/// Source of jurisdictions weighted by population share.
pub trait GeoSampler: Send {
    /// Pick one jurisdiction from `jurisdictions`.
    ///
    /// Returns `None` if nothing can be picked.
    fn sample(
        &mut self,
        jurisdictions: &[Jurisdiction],
        rng: &mut StdRng,
    ) -> Option<JurisdictionIdx>;
}

/// Samples jurisdictions in proportion to their weight.
#[derive(Debug, Clone)]
pub struct WeightedGeoSampler {
    index: WeightedIndex<f64>,
}

impl WeightedGeoSampler {
    /// Build a sampler over the weights of `jurisdictions`.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::InvalidWeights`] when the list is empty,
    /// a weight is negative or not finite, or all weights are zero.
    pub fn new(jurisdictions: &[Jurisdiction]) -> Result<Self, PopulationError> {
        let index = WeightedIndex::new(jurisdictions.iter().map(Jurisdiction::weight))
            .map_err(|e| PopulationError::InvalidWeights {
                reason: e.to_string(),
            })?;
        Ok(Self { index })
    }
}

impl GeoSampler for WeightedGeoSampler {
    fn sample(
        &mut self,
        jurisdictions: &[Jurisdiction],
        rng: &mut StdRng,
    ) -> Option<JurisdictionIdx> {
        let idx = self.index.sample(rng);
        (idx < jurisdictions.len()).then_some(JurisdictionIdx(idx))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn zero_weight_jurisdiction_is_never_drawn() {
        let jurisdictions = vec![
            Jurisdiction::new("A".into(), 0.0),
            Jurisdiction::new("B".into(), 1.0),
        ];
        let mut sampler = WeightedGeoSampler::new(&jurisdictions).ok();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let drawn = sampler
                .as_mut()
                .and_then(|s| s.sample(&jurisdictions, &mut rng));
            assert_eq!(drawn, Some(JurisdictionIdx(1)));
        }
    }

    #[test]
    fn draws_follow_weights() {
        let jurisdictions = vec![
            Jurisdiction::new("A".into(), 3.0),
            Jurisdiction::new("B".into(), 1.0),
        ];
        let mut sampler = WeightedGeoSampler::new(&jurisdictions).ok();
        let mut rng = StdRng::seed_from_u64(6);
        let a_draws = (0..4000)
            .filter_map(|_| {
                sampler
                    .as_mut()
                    .and_then(|s| s.sample(&jurisdictions, &mut rng))
            })
            .filter(|j| *j == JurisdictionIdx(0))
            .count();
        assert!((2800..3200).contains(&a_draws), "{a_draws}");
    }

    #[test]
    fn empty_or_zero_weights_are_rejected() {
        assert!(WeightedGeoSampler::new(&[]).is_err());
        let zeros = vec![Jurisdiction::new("A".into(), 0.0)];
        assert!(WeightedGeoSampler::new(&zeros).is_err());
    }
}
