//! # mps-profile
//!
//! Matrix profile engine used by the mpserver service:
//! - Self-join STOMP with a fixed-size worker pool ([`ProfileEngine`])
//! - Corrected arc curve for semantic segmentation
//! - Top-k motif and discord search
//! - Annotation vectors that bias the profile ([`AnnotationKind`])
//!
//! The crate is pure computation: no I/O, no async, no caching. Callers own
//! scheduling and decide where results are stored.
//!
//! ```ignore
//! use mps_profile::{AnnotationKind, ProfileEngine};
//!
//! let engine = ProfileEngine::new(2)?;
//! let mp = engine.compute(&series, 50)?;
//! let cac = mp.corrected_arc_curve();
//! let motifs = mp.top_k_motifs(3, 2.0)?;
//! let discords = mp.with_annotation(AnnotationKind::Complexity).top_k_discords(5, 25)?;
//! ```

pub mod annotation;
pub mod engine;
pub mod error;
pub mod profile;
pub mod search;
pub mod stats;

pub use annotation::AnnotationKind;
pub use engine::{ProfileEngine, MIN_WINDOW};
pub use error::{ProfileError, Result};
pub use profile::MatrixProfile;
pub use search::MotifGroup;
pub use stats::z_normalize;
