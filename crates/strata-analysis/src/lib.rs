//! Strata Analysis - async BPM/key/onset analysis
//!
//! A client service thread owns a pending-request table and talks to an
//! analyzer worker thread over channels. Requests resolve through oneshot
//! receivers (await or block), time out after 3 s by default, dedupe by
//! content hash, and fall back to sentinel results when no worker survives.

mod client;
mod error;
mod key;
mod protocol;
mod tempo;
mod worker;

pub use client::{AnalysisClient, PendingAnalysis, DEFAULT_TIMEOUT};
pub use error::AnalysisError;
pub use key::estimate_key;
pub use protocol::{
    AnalysisFeature, AnalysisOptions, AnalysisRequest, AnalysisResponse, AnalysisResult,
    BpmEstimate, KeyEstimate,
};
pub use tempo::{beat_grid, detect_onsets, estimate_bpm};
pub use worker::{Analyzer, DefaultAnalyzer, WorkerHandle};
