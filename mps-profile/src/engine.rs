//! STOMP matrix profile computation
//!
//! Rows of the distance matrix are split into contiguous batches, one per
//! worker of a dedicated rayon pool. Each batch seeds its first row with a
//! direct sliding dot product and then walks down the diagonal using the
//! STOMP recurrence, so work per row is linear in the series length.

use std::ops::Range;

use rayon::prelude::*;
use tracing::debug;

use crate::annotation::AnnotationKind;
use crate::error::{ProfileError, Result};
use crate::profile::MatrixProfile;
use crate::stats::{sliding_dot_products, WindowStats};

/// Smallest supported subsequence length
pub const MIN_WINDOW: usize = 2;

/// Matrix profile engine with a fixed degree of internal parallelism.
///
/// The worker count bounds CPU use per computation and does not depend on
/// how many requests are in flight; concurrent callers share the pool.
pub struct ProfileEngine {
    pool: rayon::ThreadPool,
    concurrency: usize,
}

impl ProfileEngine {
    /// Create an engine backed by `concurrency` worker threads (minimum 1).
    pub fn new(concurrency: usize) -> Result<Self> {
        let concurrency = concurrency.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("mps-stomp-{i}"))
            .build()
            .map_err(|e| ProfileError::ThreadPool(e.to_string()))?;
        Ok(Self { pool, concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Compute the self-join matrix profile of `series` for subsequences of
    /// length `window`.
    ///
    /// Trivial matches within `window / 2` positions of a subsequence are
    /// excluded. Requires `window >= 2`, `2 * window < series.len()` and a
    /// series of finite values.
    pub fn compute(&self, series: &[f64], window: usize) -> Result<MatrixProfile> {
        validate_inputs(series, window)?;

        let stats = WindowStats::new(series, window);
        let first_row = sliding_dot_products(series, 0, window);
        let batches = batch_ranges(stats.len(), self.concurrency);
        debug!(
            len = series.len(),
            window,
            batches = batches.len(),
            "Computing matrix profile"
        );

        let ctx = StompContext {
            series,
            stats: &stats,
            first_row: &first_row,
            exclusion: window / 2,
        };
        let rows: Vec<Vec<(f64, usize)>> = self
            .pool
            .install(|| batches.par_iter().map(|r| ctx.batch(r.clone())).collect());

        let (profile, index): (Vec<f64>, Vec<usize>) = rows
            .into_iter()
            .flatten()
            .map(|(d2, j)| (d2.sqrt(), j))
            .unzip();
        MatrixProfile::from_parts(
            series.to_vec(),
            window,
            profile,
            index,
            AnnotationKind::Default,
        )
    }
}

impl std::fmt::Debug for ProfileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileEngine")
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

fn validate_inputs(series: &[f64], window: usize) -> Result<()> {
    if window < MIN_WINDOW {
        return Err(ProfileError::WindowTooShort {
            window,
            min: MIN_WINDOW,
        });
    }
    if window.saturating_mul(2) >= series.len() {
        return Err(ProfileError::WindowTooLong {
            window,
            len: series.len(),
        });
    }
    if let Some(pos) = series.iter().position(|v| !v.is_finite()) {
        return Err(ProfileError::NonFinite(pos));
    }
    Ok(())
}

/// Split `0..rows` into at most `parts` contiguous, non-empty ranges.
fn batch_ranges(rows: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, rows.max(1));
    let base = rows / parts;
    let extra = rows % parts;
    let mut start = 0;
    (0..parts)
        .map(|p| {
            let len = base + usize::from(p < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .filter(|r| !r.is_empty())
        .collect()
}

struct StompContext<'a> {
    series: &'a [f64],
    stats: &'a WindowStats,
    first_row: &'a [f64],
    exclusion: usize,
}

impl StompContext<'_> {
    /// Nearest neighbor (squared distance, position) for every row in `rows`.
    fn batch(&self, rows: Range<usize>) -> Vec<(f64, usize)> {
        let t = self.series;
        let m = self.stats.window;
        let n = self.stats.len();
        let mut qt = sliding_dot_products(t, rows.start, m);
        let mut out = Vec::with_capacity(rows.len());

        for i in rows.clone() {
            if i > rows.start {
                for j in (1..n).rev() {
                    qt[j] = qt[j - 1] - t[i - 1] * t[j - 1] + t[i + m - 1] * t[j + m - 1];
                }
                qt[0] = self.first_row[i];
            }

            let mut best = (f64::INFINITY, i);
            for (j, &dot) in qt.iter().enumerate() {
                if i.abs_diff(j) <= self.exclusion {
                    continue;
                }
                let d2 = self.stats.squared_distance(i, j, dot);
                if d2 < best.0 {
                    best = (d2, j);
                }
            }
            out.push(best);
        }
        out
    }
}
