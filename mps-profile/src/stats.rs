//! Sliding-window statistics shared by the engine and the search routines

use crate::error::{ProfileError, Result};

/// Relative tolerance under which a window is treated as constant.
const FLAT_EPSILON: f64 = 1e-10;

/// Mean and population standard deviation of a slice.
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

pub(crate) fn is_flat(mean: f64, std: f64) -> bool {
    std <= FLAT_EPSILON * mean.abs().max(1.0)
}

/// Per-window mean and standard deviation for every subsequence of `window`.
///
/// Returns two vectors of length `series.len() - window + 1`. Callers must
/// ensure `1 <= window <= series.len()`.
pub fn moving_mean_std(series: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let count = series.len() + 1 - window;
    let mut means = Vec::with_capacity(count);
    let mut stds = Vec::with_capacity(count);
    for w in series.windows(window) {
        let (mean, std) = mean_std(w);
        means.push(mean);
        stds.push(std);
    }
    (means, stds)
}

/// Z-normalize a subsequence to zero mean and unit variance.
///
/// Fails with [`ProfileError::ZeroVariance`] for constant windows.
pub fn z_normalize(window: &[f64]) -> Result<Vec<f64>> {
    let (mean, std) = mean_std(window);
    if window.is_empty() || is_flat(mean, std) {
        return Err(ProfileError::ZeroVariance);
    }
    Ok(window.iter().map(|v| (v - mean) / std).collect())
}

/// Overwrite `[index - zone, index + zone]` with +inf, clamped to the profile.
pub fn apply_exclusion_zone(profile: &mut [f64], index: usize, zone: usize) {
    let start = index.saturating_sub(zone);
    let end = index.saturating_add(zone).saturating_add(1).min(profile.len());
    if start < end {
        profile[start..end].fill(f64::INFINITY);
    }
}

/// Dot products of the window starting at `row` against every window.
pub(crate) fn sliding_dot_products(series: &[f64], row: usize, window: usize) -> Vec<f64> {
    let query = &series[row..row + window];
    series
        .windows(window)
        .map(|w| w.iter().zip(query).map(|(a, b)| a * b).sum())
        .collect()
}

/// Precomputed window statistics for distance evaluation.
pub(crate) struct WindowStats {
    pub window: usize,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub flat: Vec<bool>,
}

impl WindowStats {
    pub fn new(series: &[f64], window: usize) -> Self {
        let (means, stds) = moving_mean_std(series, window);
        let flat = means
            .iter()
            .zip(&stds)
            .map(|(&m, &s)| is_flat(m, s))
            .collect();
        Self {
            window,
            means,
            stds,
            flat,
        }
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    /// Squared z-normalized Euclidean distance between windows `i` and `j`
    /// given their dot product `qt`.
    ///
    /// Two constant windows are identical; a constant window against a
    /// varying one sits at distance `sqrt(m)`.
    pub fn squared_distance(&self, i: usize, j: usize, qt: f64) -> f64 {
        let m = self.window as f64;
        match (self.flat[i], self.flat[j]) {
            (true, true) => 0.0,
            (true, false) | (false, true) => m,
            (false, false) => {
                let corr = (qt - m * self.means[i] * self.means[j])
                    / (m * self.stds[i] * self.stds[j]);
                (2.0 * m * (1.0 - corr)).max(0.0)
            }
        }
    }

    /// Full distance profile of window `row` against every window.
    pub fn distance_profile(&self, series: &[f64], row: usize) -> Vec<f64> {
        sliding_dot_products(series, row, self.window)
            .into_iter()
            .enumerate()
            .map(|(j, qt)| self.squared_distance(row, j, qt).sqrt())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_normalize_produces_zero_mean_unit_variance() {
        let window = [1.0, 2.0, 3.0, 4.0, 10.0];
        let normalized = z_normalize(&window).unwrap();
        let (mean, std) = mean_std(&normalized);
        assert!(mean.abs() < 1e-12);
        assert!((std - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_z_normalize_rejects_constant_window() {
        let window = [3.3; 50];
        assert_eq!(z_normalize(&window), Err(ProfileError::ZeroVariance));
    }

    #[test]
    fn test_z_normalize_rejects_large_constant_window() {
        // Rounding in the mean must not leak through as a tiny variance
        let window = [12345.678; 64];
        assert_eq!(z_normalize(&window), Err(ProfileError::ZeroVariance));
    }

    #[test]
    fn test_exclusion_zone_clamps_at_edges() {
        let mut profile = vec![1.0; 10];
        apply_exclusion_zone(&mut profile, 1, 3);
        assert!(profile[..5].iter().all(|v| v.is_infinite()));
        assert_eq!(profile[5], 1.0);

        apply_exclusion_zone(&mut profile, 9, 2);
        assert!(profile[7..].iter().all(|v| v.is_infinite()));
        assert_eq!(profile[6], 1.0);
    }

    #[test]
    fn test_moving_mean_std_lengths() {
        let series: Vec<f64> = (0..20).map(|v| v as f64).collect();
        let (means, stds) = moving_mean_std(&series, 5);
        assert_eq!(means.len(), 16);
        assert_eq!(stds.len(), 16);
        assert!((means[0] - 2.0).abs() < 1e-12);
        assert!((means[15] - 17.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_profile_self_match_is_zero() {
        let series: Vec<f64> = (0..64).map(|v| (v as f64 * 0.3).sin()).collect();
        let stats = WindowStats::new(&series, 8);
        let profile = stats.distance_profile(&series, 10);
        assert!(profile[10] < 1e-6);
        assert!(profile.iter().all(|d| d.is_finite() && *d >= 0.0));
    }
}
