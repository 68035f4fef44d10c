//! Scoring weight vector
//!
//! Five non-negative weights that always sum to 1.0. Updates are validated
//! (each value in [0,1]) before the vector is renormalized.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Weight vector errors
#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("Weight '{name}' must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("At least one weight must be positive")]
    AllZero,
}

/// Weights of the five scoring factors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub frequency: f64,
    pub tfidf: f64,
    pub cooccurrence: f64,
    pub title_position: f64,
    pub brand_similarity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            frequency: 0.30,
            tfidf: 0.25,
            cooccurrence: 0.20,
            title_position: 0.15,
            brand_similarity: 0.10,
        }
    }
}

/// Partial weight update; absent fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsUpdate {
    pub frequency: Option<f64>,
    pub tfidf: Option<f64>,
    pub cooccurrence: Option<f64>,
    pub title_position: Option<f64>,
    pub brand_similarity: Option<f64>,
}

impl ScoringWeights {
    pub const NAMES: [&'static str; 5] = [
        "frequency",
        "tfidf",
        "cooccurrence",
        "title_position",
        "brand_similarity",
    ];

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.frequency,
            self.tfidf,
            self.cooccurrence,
            self.title_position,
            self.brand_similarity,
        ]
    }

    fn from_array(values: [f64; 5]) -> Self {
        Self {
            frequency: values[0],
            tfidf: values[1],
            cooccurrence: values[2],
            title_position: values[3],
            brand_similarity: values[4],
        }
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Validate every component against [0,1]
    pub fn validate(&self) -> Result<(), WeightsError> {
        for (name, value) in Self::NAMES.into_iter().zip(self.as_array()) {
            if !(0.0..=1.0).contains(&value) {
                return Err(WeightsError::OutOfRange { name, value });
            }
        }
        Ok(())
    }

    /// Validate and rescale so the weights sum to 1.0
    pub fn normalized(&self) -> Result<Self, WeightsError> {
        self.validate()?;
        let total = self.sum();
        if total <= 0.0 {
            return Err(WeightsError::AllZero);
        }
        Ok(Self::from_array(self.as_array().map(|w| w / total)))
    }

    /// Merge a partial update and renormalize
    pub fn apply(&self, update: &WeightsUpdate) -> Result<Self, WeightsError> {
        let merged = Self {
            frequency: update.frequency.unwrap_or(self.frequency),
            tfidf: update.tfidf.unwrap_or(self.tfidf),
            cooccurrence: update.cooccurrence.unwrap_or(self.cooccurrence),
            title_position: update.title_position.unwrap_or(self.title_position),
            brand_similarity: update.brand_similarity.unwrap_or(self.brand_similarity),
        };
        merged.normalized()
    }
}
