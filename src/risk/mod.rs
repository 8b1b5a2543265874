//! Hybrid verdict: anomaly gate + family classifier → label, confidence, risk tier.

mod engine;

pub use engine::{
    Diagnostics, RiskLevel, ScoringFailure, ScoringStage, Verdict, VerdictEngine, ERROR_LABEL,
};
