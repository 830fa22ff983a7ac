//! The matrix profile artifact

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationKind;
use crate::error::{ProfileError, Result};

/// Self-join matrix profile of a series.
///
/// Holds everything derived queries need: the original series, the window
/// length, the nearest-neighbor distance and index of every subsequence,
/// and the annotation vector currently applied to the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixProfile {
    series: Vec<f64>,
    window: usize,
    profile: Vec<f64>,
    index: Vec<usize>,
    annotation: AnnotationKind,
}

impl MatrixProfile {
    /// Assemble a profile from precomputed parts.
    pub fn from_parts(
        series: Vec<f64>,
        window: usize,
        profile: Vec<f64>,
        index: Vec<usize>,
        annotation: AnnotationKind,
    ) -> Result<Self> {
        let mp = Self {
            series,
            window,
            profile,
            index,
            annotation,
        };
        mp.validate()?;
        Ok(mp)
    }

    /// Check the structural invariants that deserialization cannot enforce.
    pub fn validate(&self) -> Result<()> {
        if self.window < 2 {
            return Err(ProfileError::WindowTooShort {
                window: self.window,
                min: 2,
            });
        }
        if self.window > self.series.len() {
            return Err(ProfileError::WindowTooLong {
                window: self.window,
                len: self.series.len(),
            });
        }
        let expected = self.series.len() - self.window + 1;
        if self.profile.len() != expected {
            return Err(ProfileError::LengthMismatch {
                actual: self.profile.len(),
                expected,
            });
        }
        if self.index.len() != expected {
            return Err(ProfileError::LengthMismatch {
                actual: self.index.len(),
                expected,
            });
        }
        if let Some(pos) = self.index.iter().position(|&j| j >= expected) {
            return Err(ProfileError::LengthMismatch {
                actual: self.index[pos],
                expected,
            });
        }
        Ok(())
    }

    pub fn series(&self) -> &[f64] {
        &self.series
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Nearest-neighbor distance per subsequence
    pub fn profile(&self) -> &[f64] {
        &self.profile
    }

    /// Nearest-neighbor position per subsequence
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn annotation(&self) -> AnnotationKind {
        self.annotation
    }

    /// Number of subsequences (`series.len() - window + 1`)
    pub fn len(&self) -> usize {
        self.profile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profile.is_empty()
    }

    /// Copy of this profile with a different active annotation vector.
    ///
    /// Series, window and base profile are shared values; only the
    /// annotation choice changes.
    pub fn with_annotation(&self, annotation: AnnotationKind) -> Self {
        Self {
            annotation,
            ..self.clone()
        }
    }

    /// The active annotation vector evaluated over this profile's series.
    pub fn annotation_vector(&self) -> Vec<f64> {
        self.annotation.compute(&self.series, self.window)
    }

    /// Bias the profile with `av`: `profile[i] + (1 - av[i]) * max(profile)`.
    pub fn apply_annotation(&self, av: &[f64]) -> Result<Vec<f64>> {
        if av.len() != self.profile.len() {
            return Err(ProfileError::LengthMismatch {
                actual: av.len(),
                expected: self.profile.len(),
            });
        }
        let max = self
            .profile
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(0.0, f64::max);
        Ok(self
            .profile
            .iter()
            .zip(av)
            .map(|(d, w)| d + (1.0 - w) * max)
            .collect())
    }

    /// Profile adjusted by the active annotation vector.
    pub fn adjusted_profile(&self) -> Result<Vec<f64>> {
        self.apply_annotation(&self.annotation_vector())
    }

    /// Corrected arc curve used for semantic segmentation.
    ///
    /// Counts nearest-neighbor arcs crossing each position and divides by
    /// the arc count expected from a random index (`2i(n-i)/n`). Values are
    /// clamped to `[0, 1]`; both endpoints are pinned to 1. Low values mark
    /// likely regime changes.
    pub fn corrected_arc_curve(&self) -> Vec<f64> {
        let n = self.index.len();
        let mut arcs = vec![0.0_f64; n];
        for (i, &j) in self.index.iter().enumerate() {
            let (lo, hi) = if j > i { (i, j) } else { (j, i) };
            if hi - lo < 2 {
                continue;
            }
            arcs[lo + 1] += 1.0;
            arcs[hi] -= 1.0;
        }

        let mut crossing = 0.0;
        for (i, slot) in arcs.iter_mut().enumerate() {
            crossing += *slot;
            *slot = if i == 0 || i + 1 == n {
                1.0
            } else {
                let x = i as f64;
                let ideal = 2.0 * x * (n as f64 - x) / n as f64;
                (crossing / ideal).min(1.0)
            };
        }
        arcs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> MatrixProfile {
        MatrixProfile::from_parts(
            vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
            3,
            vec![0.5, 0.2, 0.5, 0.2, 0.5, 0.2],
            vec![2, 3, 4, 5, 0, 1],
            AnnotationKind::Default,
        )
        .unwrap()
    }

    #[test]
    fn test_from_parts_rejects_mismatched_profile() {
        let err = MatrixProfile::from_parts(
            vec![0.0; 8],
            3,
            vec![0.0; 5],
            vec![0; 6],
            AnnotationKind::Default,
        )
        .unwrap_err();
        assert_eq!(err, ProfileError::LengthMismatch { actual: 5, expected: 6 });
    }

    #[test]
    fn test_from_parts_rejects_index_out_of_range() {
        let err = MatrixProfile::from_parts(
            vec![0.0; 8],
            3,
            vec![0.0; 6],
            vec![0, 1, 2, 3, 4, 9],
            AnnotationKind::Default,
        )
        .unwrap_err();
        assert!(matches!(err, ProfileError::LengthMismatch { actual: 9, .. }));
    }

    #[test]
    fn test_with_annotation_keeps_base_profile() {
        let mp = tiny();
        let swapped = mp.with_annotation(AnnotationKind::MeanStd);
        assert_eq!(swapped.annotation(), AnnotationKind::MeanStd);
        assert_eq!(swapped.profile(), mp.profile());
        assert_eq!(swapped.index(), mp.index());
        assert_eq!(swapped.window(), mp.window());
    }

    #[test]
    fn test_default_annotation_leaves_profile_unchanged() {
        let mp = tiny();
        assert_eq!(mp.adjusted_profile().unwrap(), mp.profile());
    }

    #[test]
    fn test_apply_annotation_raises_zero_weighted_positions() {
        let mp = tiny();
        let av = vec![1.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let adjusted = mp.apply_annotation(&av).unwrap();
        assert_eq!(adjusted[0], 0.5);
        assert!((adjusted[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_apply_annotation_rejects_wrong_length() {
        let mp = tiny();
        let err = mp.apply_annotation(&[1.0; 3]).unwrap_err();
        assert_eq!(err, ProfileError::LengthMismatch { actual: 3, expected: 6 });
    }

    #[test]
    fn test_arc_curve_pins_endpoints_and_stays_in_range() {
        let cac = tiny().corrected_arc_curve();
        assert_eq!(cac.len(), 6);
        assert_eq!(cac[0], 1.0);
        assert_eq!(cac[5], 1.0);
        assert!(cac.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_arc_curve_dips_between_disconnected_halves() {
        // Two halves whose neighbors never cross the midpoint
        let n = 40;
        let index: Vec<usize> = (0..n)
            .map(|i| if i < n / 2 { (i + 5) % (n / 2) } else { n / 2 + (i + 5) % (n / 2) })
            .collect();
        let mp = MatrixProfile::from_parts(
            vec![0.0; n + 3],
            4,
            vec![1.0; n],
            index,
            AnnotationKind::Default,
        )
        .unwrap();
        let cac = mp.corrected_arc_curve();
        assert_eq!(cac[n / 2], 0.0);
        assert!(cac[n / 4] > 0.5);
    }
}
