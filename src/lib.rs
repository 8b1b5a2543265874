//! Hybrid static malware scanner.
//!
//! Modular structure:
//! - [`features`]: PE structure parsing, entropy, feature catalog, normalization
//! - [`model`]: Scaler, autoencoder anomaly gate, family classifier (ONNX)
//! - [`risk`]: Verdict fusion and risk tiers
//! - [`scan`]: End-to-end pipeline over one or many inputs
//! - [`input`]: Input kind detection, CSV rows, upload spooling
//! - [`report`]: Serialized scan records
//! - [`logging`]: Structured logging

pub mod config;
pub mod error;
pub mod features;
pub mod input;
pub mod logging;
pub mod model;
pub mod report;
pub mod risk;
pub mod scan;

pub use config::ScannerConfig;
pub use error::{FeatureError, InputError, ScoringError, StartupError};
pub use features::{FeatureSchema, FeatureVector, Normalizer};
pub use input::InputKind;
pub use logging::StructuredLogger;
pub use model::ModelArtifacts;
pub use report::{ScanRecord, ScanReport};
pub use risk::{RiskLevel, Verdict, VerdictEngine};
pub use scan::{ScanContext, Scanner};
