//! Motif and discord search over a computed profile
//!
//! Both searches run on the annotation-adjusted profile, so swapping the
//! active annotation vector changes which regions they favor.

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};
use crate::profile::MatrixProfile;
use crate::stats::{apply_exclusion_zone, WindowStats};

/// A set of mutually similar subsequences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifGroup {
    /// Start positions of the member subsequences, ascending
    pub idx: Vec<usize>,
    /// Distance between the seed pair that formed the group
    pub min_dist: f64,
}

impl MatrixProfile {
    /// Find the `k` best motif groups.
    ///
    /// Each group is seeded by the lowest remaining adjusted profile value
    /// and its nearest neighbor, then grows with every subsequence whose
    /// distance to the seed is below `radius` times the seed pair distance.
    /// A zone of half a window around every member is removed before the
    /// next group is chosen. Fails when fewer than `k` groups can be formed.
    pub fn top_k_motifs(&self, k: usize, radius: f64) -> Result<Vec<MotifGroup>> {
        let mut current = self.adjusted_profile()?;
        let zone = self.window() / 2;
        let stats = WindowStats::new(self.series(), self.window());
        let mut groups: Vec<MotifGroup> = Vec::with_capacity(k.min(self.len()));

        while groups.len() < k {
            let Some(seed) = argmin_finite(&current) else {
                break;
            };
            let partner = self.index()[seed];
            if !current[partner].is_finite() {
                // Partner already belongs to an earlier group
                current[seed] = f64::INFINITY;
                continue;
            }
            let seed_dist = self.profile()[seed];
            let mut members = vec![seed, partner];

            let mut distances = stats.distance_profile(self.series(), seed);
            let taken = groups.iter().flat_map(|g| g.idx.iter());
            for &idx in members.iter().chain(taken) {
                apply_exclusion_zone(&mut distances, idx, zone);
            }

            while let Some(candidate) = argmin_finite(&distances) {
                if distances[candidate] >= radius * seed_dist {
                    break;
                }
                members.push(candidate);
                apply_exclusion_zone(&mut distances, candidate, zone);
            }

            members.sort_unstable();
            for &idx in &members {
                apply_exclusion_zone(&mut current, idx, zone);
            }
            groups.push(MotifGroup {
                idx: members,
                min_dist: seed_dist,
            });
        }

        if groups.len() < k {
            return Err(ProfileError::NotEnoughMotifs {
                requested: k,
                found: groups.len(),
            });
        }
        Ok(groups)
    }

    /// Find the `k` subsequences farthest from their nearest neighbor.
    ///
    /// After each pick, positions within `exclusion_zone` of it are removed,
    /// so any two returned positions differ by more than `exclusion_zone`.
    /// Fails when fewer than `k` discords can be found.
    pub fn top_k_discords(&self, k: usize, exclusion_zone: usize) -> Result<Vec<usize>> {
        let mut current = self.adjusted_profile()?;
        let mut discords = Vec::with_capacity(k.min(self.len()));

        while discords.len() < k {
            let Some(idx) = argmax_finite(&current) else {
                break;
            };
            discords.push(idx);
            apply_exclusion_zone(&mut current, idx, exclusion_zone);
        }

        if discords.len() < k {
            return Err(ProfileError::NotEnoughDiscords {
                requested: k,
                found: discords.len(),
            });
        }
        Ok(discords)
    }
}

fn argmin_finite(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

fn argmax_finite(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}
