//! Instrumentation hooks for the query path
//!
//! [`QueryRouter`](crate::router::QueryRouter) reports cache and engine
//! activity here. The Prometheus implementation lives in
//! [`metrics`](crate::metrics); tests and embedders can use [`NoopObserver`].

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Hit,
    Miss,
    Error,
}

impl LookupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupOutcome::Hit => "hit",
            LookupOutcome::Miss => "miss",
            LookupOutcome::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored,
    Rejected,
    Error,
}

impl WriteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOutcome::Stored => "stored",
            WriteOutcome::Rejected => "rejected",
            WriteOutcome::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOp {
    Compute,
    Motifs,
    Discords,
    Annotation,
}

impl EngineOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineOp::Compute => "compute",
            EngineOp::Motifs => "motifs",
            EngineOp::Discords => "discords",
            EngineOp::Annotation => "annotation",
        }
    }
}

pub trait QueryObserver: Send + Sync {
    fn cache_lookup(&self, _outcome: LookupOutcome) {}

    /// `bytes` is the encoded artifact size, or 0 when unknown
    fn cache_write(&self, _outcome: WriteOutcome, _bytes: usize) {}

    fn engine_call(&self, _op: EngineOp, _elapsed: Duration, _succeeded: bool) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl QueryObserver for NoopObserver {}
