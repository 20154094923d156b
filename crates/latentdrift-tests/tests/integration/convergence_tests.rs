//! Termination behaviour of window refinement.

use std::sync::Arc;

use latentdrift_core::{
    ConceptDriftBuilder, Execution, FactorGraph, GaussianPosterior, GraphBuilder, LearnError, LearningSession,
    ModelConfig, ModelPosterior, ParameterPriors, PlateModel, SessionState, VariationalMessagePassing,
};
use latentdrift_data::{DataStream, DriftingGaussianGenerator};

fn stream(records: usize) -> DriftingGaussianGenerator {
    DriftingGaussianGenerator::new(3, 2, 11).unwrap().with_records(records)
}

#[test]
fn infinite_threshold_runs_one_sweep_per_window() {
    let source = stream(120);
    let attributes = source.attributes().clone();
    let config = ModelConfig::for_attributes(&attributes)
        .with_window_size(40)
        .with_threshold(f64::INFINITY);
    let mut session = LearningSession::with_config(attributes, config);
    let reports = session.update_from_stream(source).unwrap();

    assert_eq!(reports.len(), 3);
    for report in &reports {
        assert!(report.converged);
        assert_eq!(report.diagnostics.iterations_run, 1);
    }
}

#[test]
fn tight_threshold_uses_more_sweeps() {
    let run = |threshold: f64| {
        let mut source = stream(60);
        let attributes = source.attributes().clone();
        let config = ModelConfig::for_attributes(&attributes)
            .with_window_size(60)
            .with_threshold(threshold);
        let mut session = LearningSession::with_config(attributes, config);
        let batch = source.next_batch(60).unwrap();
        session.update_model(&batch).unwrap().unwrap()
    };
    let loose = run(1.0);
    let tight = run(1e-4);
    assert!(tight.diagnostics.iterations_run >= loose.diagnostics.iterations_run);
    assert!(tight.converged);
    assert!(tight.diagnostics.final_max_delta < 1e-4);
}

#[test]
fn exhausted_budget_is_reported_not_raised() {
    let mut source = stream(60);
    let attributes = source.attributes().clone();
    let config = ModelConfig::for_attributes(&attributes)
        .with_max_iterations(1)
        .with_threshold(1e-12);
    let mut session = LearningSession::with_config(attributes, config);
    let batch = source.next_batch(60).unwrap();
    let report = session.update_model(&batch).unwrap().unwrap();

    assert!(!report.converged);
    assert_eq!(report.diagnostics.iterations_run, 1);
    assert_eq!(session.state(), SessionState::Ready { window: 1 });
}

#[test]
fn session_rejects_zero_iteration_budget() {
    let source = stream(60);
    let attributes = source.attributes().clone();
    let config = ModelConfig::for_attributes(&attributes).with_max_iterations(0);
    let mut session = LearningSession::with_config(attributes, config);

    let err = session.init_learning().unwrap_err();
    assert!(matches!(err, LearnError::Configuration(_)));
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[test]
fn session_rejects_non_positive_threshold() {
    let source = stream(60);
    let attributes = source.attributes().clone();
    for threshold in [0.0, -0.5, f64::NAN] {
        let config = ModelConfig::for_attributes(&attributes).with_threshold(threshold);
        let mut session = LearningSession::with_config(attributes.clone(), config);
        assert!(session.init_learning().unwrap_err().is_configuration());
    }
}

#[test]
fn engine_with_zero_budget_returns_priors() {
    let mut source = stream(60);
    let attributes = source.attributes().clone();
    let config = ModelConfig::for_attributes(&attributes);
    let built = ConceptDriftBuilder.build(&attributes, &config).unwrap();
    let graph = FactorGraph::from_dag(&built.dag, &built.hidden, Arc::clone(&attributes)).unwrap();
    let batch = source.next_batch(60).unwrap();
    let plate = PlateModel::expand(&graph, &batch, Execution::Sequential).unwrap();

    let priors = ModelPosterior {
        hidden: vec![GaussianPosterior::standard(); graph.hidden().len()],
        parameters: graph.initial_priors(&ParameterPriors::default()),
    };
    let out = VariationalMessagePassing::new(0).refine(&plate, &priors, 0, 1e-3).unwrap();
    assert!(!out.converged);
    assert_eq!(out.diagnostics.iterations_run, 0);
    assert_eq!(out.posterior, priors);
}
