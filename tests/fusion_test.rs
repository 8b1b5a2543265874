//! Verdict fusion policy and risk tiers.

mod common;

use common::*;
use hybrid_scan::config::FusionConfig;
use hybrid_scan::error::ScoringError;
use hybrid_scan::model::{AnomalyScore, Classification, ClassifierModel};
use hybrid_scan::risk::{RiskLevel, ScoringStage, VerdictEngine, ERROR_LABEL};

const CLASSES: &[&str] = &["Benign", "Ransomware.WannaCry", "Spyware.Agent", "Trojan.Generic"];

fn anomaly(mse: f64, threshold: f64) -> AnomalyScore {
    AnomalyScore {
        reconstruction_error: mse,
        threshold,
        is_anomaly: mse > threshold,
    }
}

fn classify(classes: &[&str], label: i64, probabilities: &[f32]) -> Classification {
    ClassifierModel::new(
        Box::new(FixedClassifier::index(label, probabilities)),
        common::classes(classes),
    )
    .classify(&[0.0])
    .unwrap()
}

fn engine() -> VerdictEngine {
    VerdictEngine::new(FusionConfig::default())
}

#[test]
fn risk_tiers_by_label() {
    assert_eq!(RiskLevel::from_label("Ransomware.X"), RiskLevel::Critical);
    assert_eq!(RiskLevel::from_label("Trojan.Y"), RiskLevel::High);
    assert_eq!(RiskLevel::from_label("Spyware.Z"), RiskLevel::Medium);
    assert_eq!(RiskLevel::from_label("Adware.Q"), RiskLevel::Medium);
    assert_eq!(RiskLevel::from_label("Benign"), RiskLevel::Medium);
    // first rule wins
    assert_eq!(RiskLevel::from_label("Trojan-Ransomware"), RiskLevel::Critical);
}

#[test]
fn anomalous_trojan_is_high_risk() {
    let c = classify(CLASSES, 3, &[0.05, 0.08, 0.05, 0.82]);
    let v = engine().fuse(Ok(anomaly(0.4, 0.1)), Ok(c), 0.1);
    assert!(v.is_malware);
    assert_eq!(v.malware_type, "Trojan.Generic");
    assert!((v.confidence - 82.0).abs() < 1e-4);
    assert_eq!(v.risk_level, RiskLevel::High);
    assert!(!v.is_degraded());
    assert_eq!(v.diagnostics.raw_label(), Some("Trojan.Generic"));
}

#[test]
fn normal_sample_is_benign_low_whatever_the_classifier_says() {
    let c = classify(CLASSES, 1, &[0.3, 0.6, 0.05, 0.05]);
    let v = engine().fuse(Ok(anomaly(0.01, 0.1)), Ok(c), 0.1);
    assert!(!v.is_malware);
    assert_eq!(v.malware_type, "Benign");
    assert_eq!(v.risk_level, RiskLevel::Low);
    // confidence is the benign class's probability, not the predicted one
    assert!((v.confidence - 30.0).abs() < 1e-4);
    assert_eq!(v.diagnostics.raw_label(), Some("Ransomware.WannaCry"));
}

#[test]
fn benign_confidence_falls_back_without_benign_class() {
    let c = classify(&["Trojan.A", "Worm.B"], 0, &[0.7, 0.3]);
    let v = engine().fuse(Ok(anomaly(0.0, 0.1)), Ok(c), 0.1);
    assert_eq!(v.malware_type, "Benign");
    assert_eq!(v.confidence, 99.0);
    assert_eq!(v.risk_level, RiskLevel::Low);
}

#[test]
fn anomalous_but_classified_benign_is_reported_verbatim() {
    let c = classify(CLASSES, 0, &[0.9, 0.04, 0.03, 0.03]);
    let v = engine().fuse(Ok(anomaly(5.0, 0.1)), Ok(c), 0.1);
    assert!(v.is_malware);
    assert_eq!(v.malware_type, "Benign");
    assert_eq!(v.risk_level, RiskLevel::Medium);
    assert!((v.confidence - 90.0).abs() < 1e-4);
    let a = v.diagnostics.anomaly.unwrap();
    assert!(a.is_anomaly);
    assert_eq!(v.diagnostics.raw_label(), Some("Benign"));
}

#[test]
fn any_model_failure_is_undetermined() {
    let c = classify(CLASSES, 3, &[0.05, 0.08, 0.05, 0.82]);
    let v = engine().fuse(Err(ScoringError::NonFinite), Ok(c), 0.1);
    assert!(!v.is_malware);
    assert_eq!(v.malware_type, ERROR_LABEL);
    assert_eq!(v.confidence, 0.0);
    assert_eq!(v.risk_level, RiskLevel::Undetermined);
    assert_eq!(v.failures.len(), 1);
    assert_eq!(v.failures[0].stage, ScoringStage::Anomaly);
    // the surviving model's output is still there for auditing
    assert_eq!(v.diagnostics.raw_label(), Some("Trojan.Generic"));

    let v = engine().fuse(
        Ok(anomaly(0.4, 0.1)),
        Err(ScoringError::EmptyDistribution),
        0.1,
    );
    assert_eq!(v.risk_level, RiskLevel::Undetermined);
    assert_eq!(v.failures[0].stage, ScoringStage::Classifier);
    // the autoencoder fired, but a degraded verdict never claims malware
    assert!(v.diagnostics.anomaly.unwrap().is_anomaly);
    assert!(!v.is_malware);
    assert!(v.is_degraded());

    let v = engine().fuse(
        Err(ScoringError::NonFinite),
        Err(ScoringError::EmptyDistribution),
        0.1,
    );
    assert_eq!(v.failures.len(), 2);
}

#[test]
fn fusion_is_deterministic() {
    let e = engine();
    let run = || {
        let c = classify(CLASSES, 2, &[0.1, 0.2, 0.6, 0.1]);
        e.fuse(Ok(anomaly(0.3, 0.1)), Ok(c), 0.1)
    };
    let first = run();
    for _ in 0..10 {
        let v = run();
        assert_eq!(v.malware_type, first.malware_type);
        assert_eq!(v.confidence.to_bits(), first.confidence.to_bits());
        assert_eq!(v.risk_level, first.risk_level);
    }
    assert_eq!(first.risk_level, RiskLevel::Medium);
}

#[test]
fn unmapped_label_uses_max_probability() {
    let model = ClassifierModel::new(
        Box::new(FixedClassifier::index(9, &[0.2, 0.7, 0.1])),
        common::classes(&["Benign", "Trojan.A", "Worm.B"]),
    );
    let c = model.classify(&[0.0]).unwrap();
    assert_eq!(c.class_index, None);
    assert_eq!(c.label, "9");
    assert!((c.confidence - 70.0).abs() < 1e-4);

    let model = ClassifierModel::new(
        Box::new(FixedClassifier::named("Trojan.A", &[0.2, 0.7, 0.1])),
        common::classes(&["Benign", "Trojan.A", "Worm.B"]),
    );
    assert_eq!(model.classify(&[0.0]).unwrap().class_index, Some(1));
}

#[test]
fn confidence_is_mass_on_predicted_label_not_maximum() {
    // a label output that disagrees with arg-max
    let c = classify(CLASSES, 3, &[0.1, 0.5, 0.0, 0.4]);
    assert_eq!(c.label, "Trojan.Generic");
    assert!((c.confidence - 40.0).abs() < 1e-4);
}

#[test]
fn distribution_size_must_match_classes() {
    let model = ClassifierModel::new(
        Box::new(FixedClassifier::index(0, &[1.0])),
        common::classes(&["Benign", "Trojan.A"]),
    );
    assert!(matches!(
        model.classify(&[0.0]),
        Err(ScoringError::DistributionMismatch { expected: 2, actual: 1 })
    ));
}
