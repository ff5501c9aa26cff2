//! End-to-end tests: load an exported document, predict with every model
//! family and with the ensemble.

use std::sync::Arc;
use std::thread;

use approx::assert_abs_diff_eq;

use classifier_engine::config::InferenceStrategy;
use classifier_engine::models::{Classifier, InferenceEngine, ModelKind, ModelLoader};
use classifier_engine::{InferenceError, ModelBundle, PredictionReport, ProbabilityAggregator};

const SETOSA: [f64; 4] = [5.1, 3.5, 1.4, 0.2];
const VERSICOLOR: [f64; 4] = [5.9, 2.8, 4.3, 1.3];
const VIRGINICA: [f64; 4] = [6.7, 3.0, 5.8, 2.2];

fn fixture_path() -> String {
    format!("{}/tests/fixtures/models.json", env!("CARGO_MANIFEST_DIR"))
}

fn load_bundle() -> Arc<ModelBundle> {
    Arc::new(ModelLoader::new().load_from_path(fixture_path()).unwrap())
}

#[test]
fn bundle_metadata() {
    let bundle = load_bundle();

    assert_eq!(bundle.n_features(), 4);
    assert_eq!(bundle.n_classes(), 3);
    assert_eq!(
        bundle.model_ids(),
        vec!["logistic", "mlp", "random_forest", "svm"]
    );
    assert_eq!(bundle.feature_names().map(|f| f.len()), Some(4));

    let kinds: Vec<ModelKind> = bundle.models().map(|(_, m)| m.kind()).collect();
    assert_eq!(
        kinds,
        vec![ModelKind::Linear, ModelKind::Mlp, ModelKind::Rf, ModelKind::Linear]
    );

    for (_, model) in bundle.models() {
        assert_eq!(model.n_features(), 4);
        assert_eq!(model.n_classes(), 3);
    }
}

#[test]
fn every_model_returns_a_distribution() {
    let bundle = load_bundle();

    for raw in [SETOSA, VERSICOLOR, VIRGINICA] {
        for id in bundle.model_ids() {
            let probs = bundle.predict_raw(&id, &raw).unwrap();
            assert_eq!(probs.len(), 3);
            assert_abs_diff_eq!(probs.sum(), 1.0, epsilon = 1e-6);
            assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }
}

#[test]
fn models_agree_on_clear_samples() {
    let bundle = load_bundle();

    for id in bundle.model_ids() {
        assert_eq!(bundle.predict_raw(&id, &SETOSA).unwrap().argmax(), 0, "{}", id);
        assert_eq!(bundle.predict_raw(&id, &VIRGINICA).unwrap().argmax(), 2, "{}", id);
    }
}

#[test]
fn forest_sums_leaf_counts_across_trees() {
    let bundle = load_bundle();

    // tree 0 -> [40, 2, 0], tree 1 -> [45, 0, 0]
    let probs = bundle.predict_raw("random_forest", &SETOSA).unwrap();
    assert_abs_diff_eq!(probs[0], 85.0 / 87.0, epsilon = 1e-12);
    assert_abs_diff_eq!(probs[1], 2.0 / 87.0, epsilon = 1e-12);
    assert_abs_diff_eq!(probs[2], 0.0, epsilon = 1e-12);

    // tree 0 -> [0, 3, 40], tree 1 -> [0, 25, 25]
    let probs = bundle.predict_raw("random_forest", &VIRGINICA).unwrap();
    assert_abs_diff_eq!(probs[1], 28.0 / 93.0, epsilon = 1e-12);
    assert_abs_diff_eq!(probs[2], 65.0 / 93.0, epsilon = 1e-12);
}

#[test]
fn mlp_hidden_relu_separates_versicolor() {
    let bundle = load_bundle();
    let probs = bundle.predict_raw("mlp", &VERSICOLOR).unwrap();
    assert_eq!(probs.argmax(), 1);
}

#[test]
fn ensemble_engine_averages_members() {
    let bundle = load_bundle();
    let engine = InferenceEngine::ensemble(bundle.clone(), Vec::new()).unwrap();
    assert_eq!(engine.strategy(), InferenceStrategy::Ensemble);

    let prediction = engine.predict(&VIRGINICA).unwrap();
    assert_eq!(prediction.contributors.len(), 4);
    assert_eq!(prediction.class_name, "virginica");

    let vectors: Vec<_> = prediction.model_probabilities.values().cloned().collect();
    let mean = ProbabilityAggregator::aggregate(&vectors).unwrap();
    for (a, b) in prediction.probabilities.iter().zip(mean.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }

    let scaled = bundle.scaler().normalize(&VIRGINICA).unwrap();
    let result = bundle
        .predict_ensemble(&prediction.contributors, &scaled)
        .unwrap();
    assert_eq!(result.probabilities, prediction.probabilities);
}

#[test]
fn report_uses_class_names() {
    let bundle = load_bundle();
    let engine = InferenceEngine::primary(bundle.clone(), "logistic").unwrap();

    let prediction = engine.predict(&SETOSA).unwrap();
    let report = PredictionReport::new(1, &prediction, bundle.class_names());

    assert_eq!(report.class_name, "setosa");
    assert_eq!(report.probabilities.len(), 3);
    assert!(report.model_probabilities.contains_key("logistic"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["mode"], "single");
}

#[test]
fn wrong_feature_count_is_rejected() {
    let bundle = load_bundle();
    let err = bundle.predict_raw("svm", &[1.0, 2.0, 3.0]).unwrap_err();

    assert_eq!(
        err,
        InferenceError::DimensionMismatch {
            expected: 4,
            got: 3
        }
    );
    assert!(err.is_recoverable());
}

#[test]
fn unknown_model_is_an_error_not_a_panic() {
    let bundle = load_bundle();
    let err = bundle.predict_raw("gradient_boosting", &SETOSA).unwrap_err();
    assert!(matches!(err, InferenceError::ModelNotFound { .. }));
}

#[test]
fn bundle_is_shared_across_threads() {
    let bundle = load_bundle();
    let expected = bundle.predict_raw("mlp", &VIRGINICA).unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            let bundle = Arc::clone(&bundle);
            let expected = expected.clone();
            s.spawn(move || {
                for _ in 0..100 {
                    assert_eq!(bundle.predict_raw("mlp", &VIRGINICA).unwrap(), expected);
                }
            });
        }
    });
}

#[test]
fn batch_prediction_matches_sequential() {
    let engine = InferenceEngine::primary(load_bundle(), "random_forest").unwrap();
    let rows: Vec<Vec<f64>> = [SETOSA, VERSICOLOR, VIRGINICA]
        .iter()
        .cycle()
        .take(30)
        .map(|r| r.to_vec())
        .collect();

    let batch = engine.predict_batch(&rows);
    for (row, result) in rows.iter().zip(batch) {
        assert_eq!(result.unwrap(), engine.predict(row).unwrap());
    }
}
