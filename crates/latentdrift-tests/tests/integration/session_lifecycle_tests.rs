//! Session state machine, window bookkeeping and reconfiguration.

use std::sync::Arc;

use latentdrift_core::{LearnError, LearningSession, ModelConfig, PosteriorDistribution, SessionState};
use latentdrift_data::{
    AttributeSpec, Attributes, DataInstance, DataOnMemory, DataStream, DriftingGaussianGenerator, InMemoryStream,
};

fn source(records: usize) -> DriftingGaussianGenerator {
    DriftingGaussianGenerator::new(3, 2, 5).unwrap().with_records(records)
}

fn session(window: usize) -> LearningSession {
    let attributes = source(0).attributes().clone();
    let config = ModelConfig::for_attributes(&attributes).with_window_size(window);
    LearningSession::with_config(attributes, config)
}

#[test]
fn lifecycle_walks_through_every_state() {
    let mut s = session(50);
    assert_eq!(s.state(), SessionState::Uninitialized);
    assert!(matches!(s.posterior(), Err(LearnError::NotInitialized(_))));

    s.init_learning().unwrap();
    assert_eq!(s.state(), SessionState::Ready { window: 0 });

    let mut stream = source(100);
    let first = stream.next_batch(50).unwrap();
    let report = s.update_model(&first).unwrap().unwrap();
    assert_eq!(report.window, 0);
    assert_eq!(s.state(), SessionState::Ready { window: 1 });
    assert_eq!(s.transitions_applied(), 0);

    let second = stream.next_batch(50).unwrap();
    s.update_model(&second).unwrap();
    assert_eq!(s.state(), SessionState::Ready { window: 2 });
    assert_eq!(s.transitions_applied(), 1);

    s.reset_model();
    assert_eq!(s.state(), SessionState::Uninitialized);
    assert!(s.last_report().is_none());
    assert_eq!(s.transitions_applied(), 0);
}

#[test]
fn update_model_initializes_lazily() {
    let mut s = session(50);
    let batch = source(50).next_batch(50).unwrap();
    let report = s.update_model(&batch).unwrap().unwrap();
    assert_eq!(report.window, 0);
    assert_eq!(report.records, 50);
    assert_eq!(s.window_index(), 1);
}

#[test]
fn unknown_names_are_not_found() {
    let mut s = session(50);
    s.init_learning().unwrap();
    assert!(matches!(s.posterior_distribution("missing"), Err(LearnError::NotFound(_))));
    assert!(matches!(
        s.posterior_distribution("GaussianVar0").unwrap(),
        PosteriorDistribution::LinearGaussian { .. }
    ));
}

#[test]
fn short_tail_becomes_its_own_window() {
    let mut s = session(50);
    let reports = s.update_from_stream(source(130)).unwrap();
    let sizes: Vec<usize> = reports.iter().map(|r| r.records).collect();
    assert_eq!(sizes, vec![50, 50, 30]);
    assert_eq!(s.window_index(), 3);
    assert_eq!(s.transitions_applied(), 2);
}

#[test]
fn small_direct_batches_are_learned_as_given() {
    let mut s = session(1000);
    let mut stream = source(12);
    while let Some(batch) = stream.next_batch(4) {
        let report = s.update_model(&batch).unwrap().unwrap();
        assert_eq!(report.records, 4);
    }
    assert_eq!(s.window_index(), 3);
    let h = s.posterior_distribution("GlobalHidden_0").unwrap().as_hidden().unwrap();
    assert!(h.mean.is_finite());
    assert!(h.variance > 0.0);
}

#[test]
fn stream_with_a_foreign_schema_is_rejected() {
    let mut s = session(10);
    let other = Arc::new(Attributes::new([AttributeSpec::real("u"), AttributeSpec::real("v")]).unwrap());
    let records = vec![DataInstance::new(vec![0.0, 1.0])];
    let stream = InMemoryStream::new(other, records).unwrap();
    let err = s.update_from_stream(stream).unwrap_err();
    assert!(matches!(err, LearnError::Data(_)));
    assert_eq!(s.state(), SessionState::Uninitialized);
}

#[test]
fn missing_values_skip_the_affected_factor() {
    let mut s = session(10);
    let attributes = s.attributes().clone();
    let mut batch = DataOnMemory::new(attributes);
    for i in 0..10 {
        let c = i as f64 / 10.0;
        let x0 = if i == 3 { f64::NAN } else { 1.0 + 0.5 * c };
        batch.push(DataInstance::new(vec![x0, -1.0 + 0.8 * c, c])).unwrap();
    }
    let report = s.update_model(&batch).unwrap().unwrap();
    assert_eq!(report.diagnostics.replica_count, 10);
    assert_eq!(report.diagnostics.skipped_replicas, 1);
}

#[test]
fn reconfigure_keeps_or_discards_the_model() {
    let mut s = session(40);
    s.update_from_stream(source(80)).unwrap();
    assert_eq!(s.window_index(), 2);

    let config = s.config().clone().with_window_size(20);
    s.reconfigure(config);
    assert_eq!(s.window_index(), 2);
    assert_eq!(s.config().window_size, 20);

    let config = s.config().clone().with_transition_variance(0.5);
    s.reconfigure(config);
    assert_eq!(s.state(), SessionState::Uninitialized);

    s.update_from_stream(source(40)).unwrap();
    assert_eq!(s.window_index(), 2);
    assert_eq!(s.transitions_applied(), 1);
}

#[test]
fn hidden_count_change_rebuilds_the_graph() {
    let mut s = session(40);
    s.init_learning().unwrap();
    assert_eq!(s.dag().unwrap().edge_count(), 4);

    s.set_hidden_count(3);
    assert_eq!(s.state(), SessionState::Uninitialized);
    s.init_learning().unwrap();
    assert_eq!(s.hidden_variable_names().len(), 3);
    assert_eq!(s.dag().unwrap().edge_count(), 8);
}
