//! End-to-end concept drift scenario.
//!
//! Three real attributes, the last one is the class. Four windows of fifty
//! records; from the third window on every non-class attribute is shifted by
//! +3. The single hidden variable must absorb the shift.

use latentdrift_core::{LearningSession, ModelConfig, PosteriorDistribution};
use latentdrift_data::{DataStream, DriftingGaussianGenerator};

const WINDOW: usize = 50;
const SHIFT: f64 = 3.0;

fn drifting_stream(seed: u64) -> DriftingGaussianGenerator {
    DriftingGaussianGenerator::new(3, 2, seed)
        .unwrap()
        .with_records(4 * WINDOW)
        .with_shift_at(2 * WINDOW, SHIFT)
}

fn session_for(stream: &DriftingGaussianGenerator) -> LearningSession {
    let attributes = stream.attributes().clone();
    let config = ModelConfig::for_attributes(&attributes)
        .with_class_index(2)
        .with_hidden_count(1)
        .with_window_size(WINDOW)
        .with_fading(1.0)
        .with_transition_variance(0.1)
        .with_seed(0);
    LearningSession::with_config(attributes, config)
}

/// Hidden posterior mean after each window.
fn hidden_trajectory(seed: u64) -> Vec<f64> {
    let mut stream = drifting_stream(seed);
    let mut session = session_for(&stream);
    let mut means = Vec::new();
    while let Some(batch) = stream.next_batch(WINDOW) {
        let report = session.update_model(&batch).unwrap().unwrap();
        assert!(report.converged, "window {} did not converge", report.window);
        let hidden = session
            .posterior_distribution("GlobalHidden_0")
            .unwrap()
            .as_hidden()
            .unwrap();
        means.push(hidden.mean);
    }
    means
}

#[test]
fn hidden_mean_tracks_the_shift() {
    for seed in 0..3 {
        let h = hidden_trajectory(seed);
        assert_eq!(h.len(), 4);
        assert!((h[1] - h[0]).abs() < 0.5, "seed {}: stable windows moved {:?}", seed, h);
        assert!(h[2] - h[1] > 1.0, "seed {}: shift not absorbed {:?}", seed, h);
        assert!(h[3] >= h[2] - 0.3, "seed {}: shift not retained {:?}", seed, h);
    }
}

#[test]
fn dag_lists_class_and_hidden_parents() {
    let stream = drifting_stream(0);
    let mut session = session_for(&stream);
    session.update_from_stream(stream).unwrap();

    let dag = session.dag().unwrap();
    let vars = dag.variables();
    let class = vars.by_name("GaussianVar2").unwrap().id();
    let hidden = vars.by_name("GlobalHidden_0").unwrap().id();
    for name in ["GaussianVar0", "GaussianVar1"] {
        let id = vars.by_name(name).unwrap().id();
        assert_eq!(dag.parent_set(id).unwrap().parents(), &[class, hidden]);
    }
    assert!(dag.parent_set(class).unwrap().is_empty());
    assert_eq!(dag.edge_count(), 4);
    assert_eq!(session.window_index(), 4);
    assert_eq!(session.transitions_applied(), 3);
}

#[test]
fn snapshot_describes_every_factor() {
    let stream = drifting_stream(1);
    let mut session = session_for(&stream);
    session.update_from_stream(stream).unwrap();

    let snapshot = session.model().unwrap();
    assert_eq!(snapshot.window, 4);
    assert_eq!(snapshot.factors.len(), 3);
    let x0 = snapshot.factor("GaussianVar0").unwrap();
    assert_eq!(x0.parents, vec!["GaussianVar2", "GlobalHidden_0"]);
    match &x0.posterior {
        PosteriorDistribution::LinearGaussian { coefficients, .. } => {
            let labels: Vec<&str> = coefficients.iter().map(|(l, _)| l.as_str()).collect();
            assert_eq!(labels, vec!["intercept", "GaussianVar2", "GlobalHidden_0"]);
            // Slope on the class is 0.5 in the generator.
            assert!((coefficients[1].1.mean - 0.5).abs() < 0.3);
        }
        other => panic!("unexpected posterior {:?}", other),
    }
    assert!(snapshot.hidden_mean("GlobalHidden_0").is_some());
    let rendered = snapshot.to_string();
    assert!(rendered.contains("P(GaussianVar0 | GaussianVar2, GlobalHidden_0)"));
}

#[test]
fn two_hidden_variables_attach_to_every_attribute() {
    let stream = drifting_stream(0);
    let attributes = stream.attributes().clone();
    let config = ModelConfig::for_attributes(&attributes)
        .with_hidden_count(2)
        .with_window_size(WINDOW);
    let mut session = LearningSession::with_config(attributes, config);
    let reports = session.update_from_stream(stream).unwrap();
    assert_eq!(reports.len(), 4);

    let dag = session.dag().unwrap();
    let x0 = dag.variables().by_name("GaussianVar0").unwrap().id();
    assert_eq!(dag.parent_set(x0).unwrap().len(), 3);
    assert_eq!(
        session.hidden_variable_names(),
        vec!["GlobalHidden_0", "GlobalHidden_1"]
    );
    for name in ["GlobalHidden_0", "GlobalHidden_1"] {
        let h = session.posterior_distribution(name).unwrap().as_hidden().unwrap();
        assert!(h.mean.is_finite() && h.variance > 0.0);
    }
}
