//! Accuracy regression tests for grove-rf.
//!
//! These tests verify that algorithmic changes do not degrade Random Forest
//! regression or classification quality on deterministic synthetic datasets.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use grove_rf::{
    DecisionTree, MaxFeatures, Node, OobMode, RandomForestClassifier, RandomForestConfig,
    RandomForestRegressor, RfError,
};

// ---------------------------------------------------------------------------
// Helpers: deterministic synthetic datasets
// ---------------------------------------------------------------------------

/// Generate a 400-sample, 8-feature regression dataset.
///
/// y = 5·x0 + 3·x1 - 2·x2 + x3 + noise in [0, 0.2]; x4-x7 are pure noise.
fn make_regression(n_samples: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n_samples);
    let mut targets = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row: Vec<f64> = (0..8).map(|_| rng.r#gen::<f64>()).collect();
        let y = 5.0 * row[0] + 3.0 * row[1] - 2.0 * row[2] + row[3] + rng.r#gen::<f64>() * 0.2;
        targets.push(y);
        features.push(row);
    }
    (features, targets)
}

/// Generate a near-separable 8-feature, 3-class dataset.
///
/// Features 0-2 are informative (class * 3.0 + noise in [0, 0.5]).
/// Features 3-7 are pure noise in [0, 0.5].
/// Samples are assigned round-robin across classes.
fn make_classification(n_samples: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n_classes = 3;
    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % n_classes;
        labels.push(class);
        let row: Vec<f64> = (0..8)
            .map(|f| {
                let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.5
            })
            .collect();
        features.push(row);
    }
    (features, labels)
}

fn scenario_config() -> RandomForestConfig {
    RandomForestConfig::new(15)
        .unwrap()
        .with_min_samples_leaf(3)
        .with_max_features(MaxFeatures::Fraction(0.3))
        .with_seed(42)
}

/// Check leaf sizes and impurity monotonicity on every node of `tree`.
fn assert_tree_invariants<P>(tree: &DecisionTree<P>) {
    let nodes = tree.nodes();
    for node in nodes {
        assert!(node.n_samples() >= 1, "node with zero samples");
        if let Node::Split {
            left,
            right,
            impurity,
            n_samples,
            ..
        } = node
        {
            let l = &nodes[left.index()];
            let r = &nodes[right.index()];
            assert_eq!(l.n_samples() + r.n_samples(), *n_samples);
            let weighted = (l.n_samples() as f64 * l.impurity().value()
                + r.n_samples() as f64 * r.impurity().value())
                / *n_samples as f64;
            assert!(
                weighted <= impurity.value() + 1e-9,
                "children impurity {weighted} exceeds parent {}",
                impurity.value()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// a) scenario: 400 x 8, 15 trees, min_samples_leaf 3, max_features 0.3
// ---------------------------------------------------------------------------

#[test]
fn regression_training_r2_above_threshold() {
    let (features, targets) = make_regression(400, 42);
    let model = scenario_config().fit_regressor(&features, &targets).unwrap();

    let r2 = model.score(&features, &targets).unwrap();
    assert!(r2 >= 0.85, "training r2 {r2} < 0.85");
    assert_eq!(model.metadata().unwrap().max_features_resolved, 2);
}

#[test]
fn classification_training_accuracy_above_threshold() {
    let (features, labels) = make_classification(400, 42);
    let model = scenario_config().fit_classifier(&features, &labels).unwrap();

    let acc = model.score(&features, &labels).unwrap();
    assert!(acc >= 0.95, "training accuracy {acc} < 0.95");
}

#[test]
fn prediction_length_matches_query_rows() {
    let (features, targets) = make_regression(400, 7);
    let model = scenario_config().fit_regressor(&features, &targets).unwrap();

    for n in [0, 1, 17, 400] {
        assert_eq!(model.predict(&features[..n]).unwrap().len(), n);
    }

    let (features, labels) = make_classification(400, 7);
    let model = scenario_config().fit_classifier(&features, &labels).unwrap();
    assert_eq!(model.predict(&features[..33]).unwrap().len(), 33);
}

#[test]
fn score_is_repeatable() {
    let (features, targets) = make_regression(400, 3);
    let model = scenario_config().fit_regressor(&features, &targets).unwrap();

    let first = model.score(&features, &targets).unwrap();
    let second = model.score(&features, &targets).unwrap();
    assert_eq!(first.to_bits(), second.to_bits());
}

// ---------------------------------------------------------------------------
// b) determinism under a fixed seed
// ---------------------------------------------------------------------------

#[test]
fn deterministic_predictions() {
    let (features, targets) = make_regression(200, 11);
    let config = RandomForestConfig::new(20).unwrap().with_seed(99);

    let a = config.fit_regressor(&features, &targets).unwrap();
    let b = config.fit_regressor(&features, &targets).unwrap();

    let bits = |preds: Vec<f64>| preds.into_iter().map(f64::to_bits).collect::<Vec<_>>();
    assert_eq!(
        bits(a.predict(&features).unwrap()),
        bits(b.predict(&features).unwrap()),
        "predictions differ across runs with the same seed"
    );

    let (features, labels) = make_classification(150, 11);
    let a = config.fit_classifier(&features, &labels).unwrap();
    let b = config.fit_classifier(&features, &labels).unwrap();
    assert_eq!(a.predict(&features).unwrap(), b.predict(&features).unwrap());
}

#[test]
fn different_seeds_grow_different_forests() {
    let (features, targets) = make_regression(200, 12);
    let a = RandomForestConfig::new(5)
        .unwrap()
        .with_seed(1)
        .fit_regressor(&features, &targets)
        .unwrap();
    let b = RandomForestConfig::new(5)
        .unwrap()
        .with_seed(2)
        .fit_regressor(&features, &targets)
        .unwrap();
    assert_ne!(a.oob_indices_per_tree(), b.oob_indices_per_tree());
}

// ---------------------------------------------------------------------------
// c) structural invariants
// ---------------------------------------------------------------------------

#[test]
fn leaves_are_nonempty_and_impurity_decreases() {
    let (features, targets) = make_regression(400, 5);
    let model = scenario_config().fit_regressor(&features, &targets).unwrap();
    for tree in model.trees() {
        assert_tree_invariants(tree);
    }

    let (features, labels) = make_classification(300, 5);
    let model = scenario_config().fit_classifier(&features, &labels).unwrap();
    for tree in model.trees() {
        assert_tree_invariants(tree);
    }
}

// ---------------------------------------------------------------------------
// d) OOB tracks held-out quality
// ---------------------------------------------------------------------------

#[test]
fn oob_r2_tracks_held_out_r2() {
    let (features, targets) = make_regression(800, 21);
    let (train_x, test_x) = features.split_at(600);
    let (train_y, test_y) = targets.split_at(600);

    let model = RandomForestConfig::new(60)
        .unwrap()
        .with_max_features(MaxFeatures::Fraction(0.5))
        .with_oob_mode(OobMode::Enabled)
        .with_seed(42)
        .fit_regressor(train_x, train_y)
        .unwrap();

    let oob = model.oob_score().expect("OOB score must be computed when OobMode::Enabled");
    let held_out = model.score(test_x, test_y).unwrap();
    assert!(
        (oob - held_out).abs() < 0.1,
        "oob r2 {oob} vs held-out r2 {held_out}"
    );
}

#[test]
fn oob_accuracy_tracks_held_out_accuracy() {
    let (features, labels) = make_classification(600, 22);
    let (train_x, test_x) = features.split_at(450);
    let (train_y, test_y) = labels.split_at(450);

    let model = RandomForestConfig::new(60)
        .unwrap()
        .with_oob_mode(OobMode::Enabled)
        .with_seed(42)
        .fit_classifier(train_x, train_y)
        .unwrap();

    let oob = model.oob_score().expect("OOB score must be computed when OobMode::Enabled");
    let held_out = model.score(test_x, test_y).unwrap();
    assert!(
        (oob - held_out).abs() < 0.1,
        "oob accuracy {oob} vs held-out accuracy {held_out}"
    );
}

// ---------------------------------------------------------------------------
// e) edge cases
// ---------------------------------------------------------------------------

#[test]
fn constant_targets_predict_constant() {
    let (features, _) = make_regression(100, 8);
    let targets = vec![-2.5; 100];
    let model = scenario_config().fit_regressor(&features, &targets).unwrap();

    let (queries, _) = make_regression(20, 9);
    for p in model.predict(&queries).unwrap() {
        assert!((p + 2.5).abs() < 1e-12, "prediction {p} != -2.5");
    }
}

#[test]
fn single_leaf_forest_returns_leaf_prediction() {
    let (features, targets) = make_regression(50, 10);
    let model = RandomForestConfig::new(1)
        .unwrap()
        .with_max_depth(Some(1))
        .with_min_samples_leaf(100)
        .fit_regressor(&features, &targets)
        .unwrap();

    let tree = &model.trees()[0];
    assert_eq!(tree.n_nodes(), 1);
    let Node::Leaf { prediction, .. } = &tree.nodes()[0] else {
        panic!("root should be a leaf");
    };
    for p in model.predict(&features).unwrap() {
        assert_eq!(p.to_bits(), prediction.to_bits());
    }
}

#[test]
fn degenerate_inputs_fit_without_error() {
    let identical = vec![vec![1.0, 2.0, 3.0]; 20];
    let targets: Vec<f64> = (0..20).map(f64::from).collect();
    let model = RandomForestConfig::new(3)
        .unwrap()
        .fit_regressor(&identical, &targets)
        .unwrap();
    assert!(model.trees().iter().all(|t| t.n_leaves() == 1));

    let single_row = RandomForestConfig::new(3)
        .unwrap()
        .fit_classifier(&[vec![0.5, 0.5]], &[1])
        .unwrap();
    assert_eq!(single_row.predict_one(&[9.0, -9.0]).unwrap(), 1);

    let single_feature: Vec<Vec<f64>> = (0..30).map(|i| vec![f64::from(i)]).collect();
    let model = RandomForestConfig::new(5)
        .unwrap()
        .fit_regressor(&single_feature, &targets.repeat(2)[..30])
        .unwrap();
    assert_eq!(model.metadata().unwrap().max_features_resolved, 1);
}

/// Step-shaped integer targets so a constant offset stays exactly representable.
fn make_steps(n_samples: usize, offset: f64, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let features: Vec<Vec<f64>> = (0..n_samples)
        .map(|_| vec![rng.r#gen::<f64>(), rng.r#gen::<f64>()])
        .collect();
    let targets = features
        .iter()
        .map(|row| {
            let step = if row[0] > 0.5 { 10.0 } else { 0.0 };
            offset + step + 2.0 * (row[1] * 4.0).floor()
        })
        .collect();
    (features, targets)
}

#[test]
fn large_target_offset_does_not_change_fit_quality() {
    let config = RandomForestConfig::new(20).unwrap().with_seed(9);
    let (features, base) = make_steps(200, 0.0, 21);
    let (_, shifted) = make_steps(200, 1.7e9, 21);

    let r2_base = config
        .fit_regressor(&features, &base)
        .unwrap()
        .score(&features, &base)
        .unwrap();
    let model = config.fit_regressor(&features, &shifted).unwrap();
    let r2_shifted = model.score(&features, &shifted).unwrap();

    assert!(r2_base > 0.99, "r2 without offset {r2_base}");
    assert!(
        (r2_base - r2_shifted).abs() < 1e-3,
        "offset changed r2: {r2_base} vs {r2_shifted}"
    );
    assert!(model.trees().iter().all(|t| t.n_nodes() > 1));
}

#[test]
fn sparse_and_extreme_labels_classify() {
    let (features, dense) = make_classification(150, 17);
    let label_of = [3, 1_000_000, usize::MAX];
    let labels: Vec<usize> = dense.iter().map(|&c| label_of[c]).collect();
    let model = scenario_config().fit_classifier(&features, &labels).unwrap();

    assert_eq!(model.classes(), &label_of);
    let acc = model.score(&features, &labels).unwrap();
    assert!(acc >= 0.95, "training accuracy {acc}");
    let preds = model.predict(&features).unwrap();
    assert!(preds.iter().all(|p| label_of.contains(p)));
}

#[test]
fn corrupted_model_is_rejected_on_load() {
    let (features, targets) = make_regression(60, 5);
    let model = RandomForestConfig::new(2)
        .unwrap()
        .fit_regressor(&features, &targets)
        .unwrap();
    let json = serde_json::to_value(&model).unwrap();

    let mut no_nodes = json.clone();
    no_nodes["forest"]["trees"][0]["nodes"] = serde_json::json!([]);
    assert!(serde_json::from_value::<RandomForestRegressor>(no_nodes).is_err());

    let mut dangling = json;
    let root = &mut dangling["forest"]["trees"][1]["nodes"][0]["Split"];
    assert!(root.is_object(), "root of a 60-row tree should split");
    root["left"] = serde_json::json!(10_000);
    let err = serde_json::from_value::<RandomForestRegressor>(dangling).unwrap_err();
    assert!(err.to_string().contains("invalid model"), "{err}");
}

#[test]
fn unfitted_models_report_not_fitted() {
    let config = RandomForestConfig::new(10).unwrap();
    let regressor = RandomForestRegressor::new(config.clone());
    let classifier = RandomForestClassifier::new(config);

    assert!(matches!(regressor.predict(&[vec![0.0]]), Err(RfError::NotFitted)));
    assert!(matches!(
        classifier.score(&[vec![0.0]], &[0]),
        Err(RfError::NotFitted)
    ));
    assert!(matches!(
        regressor.feature_importances(),
        Err(RfError::NotFitted)
    ));
}

// ---------------------------------------------------------------------------
// f) feature importance
// ---------------------------------------------------------------------------

/// The top 3 features by importance must include at least 2 of x0, x1, x2.
#[test]
fn top_features_are_informative() {
    let (features, labels) = make_classification(300, 42);
    let model = RandomForestConfig::new(100)
        .unwrap()
        .with_seed(42)
        .fit_classifier(&features, &labels)
        .unwrap();

    let top3: Vec<usize> = model
        .feature_importances()
        .unwrap()
        .iter()
        .take(3)
        .map(|f| f.feature.index())
        .collect();
    let informative_in_top3 = top3.iter().filter(|&&f| f < 3).count();

    assert!(
        informative_in_top3 >= 2,
        "only {informative_in_top3}/3 of top-3 features are informative; top-3: {top3:?}"
    );
}

#[test]
fn fitted_model_survives_json_round_trip() {
    let (features, targets) = make_regression(80, 13);
    let model = RandomForestConfig::new(4)
        .unwrap()
        .fit_regressor(&features, &targets)
        .unwrap();

    let json = serde_json::to_string(&model).unwrap();
    let restored: RandomForestRegressor = serde_json::from_str(&json).unwrap();
    assert_eq!(
        model.predict(&features).unwrap(),
        restored.predict(&features).unwrap()
    );
}
