//! Annotation vectors
//!
//! An annotation vector assigns every subsequence a weight in `[0, 1]`.
//! Weights below 1 push the adjusted profile of that position upward, which
//! steers motif search away from (and discord search toward) the region.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::stats::{is_flat, moving_mean_std};

/// Supported annotation vector kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Uniform weight of 1 (no adjustment)
    #[default]
    Default,
    /// Favors subsequences with high complexity estimate
    Complexity,
    /// Favors subsequences whose deviation is below the average deviation
    MeanStd,
    /// Penalizes subsequences that touch the series' global min/max
    Clipping,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 4] = [
        AnnotationKind::Default,
        AnnotationKind::Complexity,
        AnnotationKind::MeanStd,
        AnnotationKind::Clipping,
    ];

    /// Name accepted by [`FromStr`] and used in logs
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationKind::Default => "default",
            AnnotationKind::Complexity => "complexity",
            AnnotationKind::MeanStd => "meanstd",
            AnnotationKind::Clipping => "clipping",
        }
    }

    /// Compute the vector for `series` with subsequence length `window`.
    ///
    /// The result has one entry per subsequence.
    pub fn compute(&self, series: &[f64], window: usize) -> Vec<f64> {
        let count = series.len() + 1 - window;
        match self {
            AnnotationKind::Default => vec![1.0; count],
            AnnotationKind::Complexity => complexity(series, window),
            AnnotationKind::MeanStd => mean_std(series, window),
            AnnotationKind::Clipping => clipping(series, window),
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnnotationKind {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(AnnotationKind::Default),
            "complexity" => Ok(AnnotationKind::Complexity),
            "meanstd" | "mean_std" | "mean-std" => Ok(AnnotationKind::MeanStd),
            "clipping" => Ok(AnnotationKind::Clipping),
            _ => Err(ProfileError::UnknownAnnotation(s.to_string())),
        }
    }
}

fn complexity(series: &[f64], window: usize) -> Vec<f64> {
    let raw = series
        .windows(window)
        .map(|w| {
            w.windows(2)
                .map(|pair| (pair[1] - pair[0]) * (pair[1] - pair[0]))
                .sum::<f64>()
                .sqrt()
        })
        .collect();
    min_max_normalize(raw)
}

fn mean_std(series: &[f64], window: usize) -> Vec<f64> {
    let (_, stds) = moving_mean_std(series, window);
    let average = stds.iter().sum::<f64>() / stds.len() as f64;
    stds.iter()
        .map(|&s| if s < average { 1.0 } else { 0.0 })
        .collect()
}

fn clipping(series: &[f64], window: usize) -> Vec<f64> {
    let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = series.iter().copied().fold(f64::INFINITY, f64::min);
    let clipped = series
        .windows(window)
        .map(|w| w.iter().filter(|&&v| v == max || v == min).count() as f64)
        .collect();
    min_max_normalize(clipped)
        .into_iter()
        .map(|v| 1.0 - v)
        .collect()
}

/// Rescale to `[0, 1]`. A vector with no spread carries no preference, so it
/// maps to all ones.
fn min_max_normalize(values: Vec<f64>) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let spread = max - min;
    if values.is_empty() || is_flat(max, spread) {
        return vec![1.0; values.len()];
    }
    values.into_iter().map(|v| (v - min) / spread).collect()
}
