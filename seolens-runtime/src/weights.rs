//! Shared, runtime-adjustable scoring weights

use parking_lot::RwLock;
use tracing::info;

use seolens_core::{ScoringWeights, WeightsError, WeightsUpdate};

/// Current scoring weights, readable from concurrent page tasks
#[derive(Debug)]
pub struct WeightStore {
    inner: RwLock<ScoringWeights>,
}

impl Default for WeightStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(ScoringWeights::default()),
        }
    }
}

impl WeightStore {
    pub fn new(weights: ScoringWeights) -> Result<Self, WeightsError> {
        Ok(Self {
            inner: RwLock::new(weights.normalized()?),
        })
    }

    /// Snapshot of the current weights
    pub fn get(&self) -> ScoringWeights {
        *self.inner.read()
    }

    /// Apply a partial update; on error the stored weights are unchanged
    pub fn update(&self, update: &WeightsUpdate) -> Result<ScoringWeights, WeightsError> {
        let mut weights = self.inner.write();
        let updated = weights.apply(update)?;
        *weights = updated;
        info!("Scoring weights updated: {:?}", updated);
        Ok(updated)
    }
}
