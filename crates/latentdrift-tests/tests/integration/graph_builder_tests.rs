//! Graph builder behaviour through the public API.

use std::sync::Arc;

use latentdrift_core::{
    ConceptDriftBuilder, GraphBuilder, LearnError, LearningSession, LinearRegressionBuilder,
    ModelConfig, PosteriorDistribution,
};
use latentdrift_data::{AttributeSpec, Attributes, DataInstance, InMemoryStream};

fn mixed_schema() -> Arc<Attributes> {
    Arc::new(
        Attributes::new([
            AttributeSpec::real("x"),
            AttributeSpec::real("y"),
            AttributeSpec::discrete("SEQUENCE_ID", 100).special(),
            AttributeSpec::categorical("class", ["a", "b", "c"]),
        ])
        .unwrap(),
    )
}

#[test]
fn rebuild_is_idempotent() {
    let atts = mixed_schema();
    let config = ModelConfig::for_attributes(&atts).with_hidden_count(3);
    let first = ConceptDriftBuilder.build(&atts, &config).unwrap();
    let second = ConceptDriftBuilder.build(&atts, &config).unwrap();
    assert_eq!(first.dag.edges(), second.dag.edges());
    assert_eq!(first.hidden, second.hidden);
    let names = |b: &latentdrift_core::BuiltGraph| {
        b.variables().iter().map(|v| v.name().to_string()).collect::<Vec<_>>()
    };
    assert_eq!(names(&first), names(&second));
}

#[test]
fn special_attributes_are_not_variables() {
    let atts = mixed_schema();
    let config = ModelConfig::for_attributes(&atts);
    let built = ConceptDriftBuilder.build(&atts, &config).unwrap();
    assert!(built.variables().by_name("SEQUENCE_ID").is_none());
    // x, y, class and one hidden variable.
    assert_eq!(built.variables().len(), 4);
    assert_eq!(
        built.variables().get(built.class_variable).unwrap().name(),
        "class"
    );
    assert!(built.dag.validate().is_ok());
}

#[test]
fn class_index_naming_a_special_attribute_fails() {
    let atts = mixed_schema();
    let config = ModelConfig::for_attributes(&atts).with_class_index(2);
    let err = ConceptDriftBuilder.build(&atts, &config).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn finite_attribute_cannot_take_hidden_parents() {
    let atts = Arc::new(
        Attributes::new([
            AttributeSpec::discrete("d", 2),
            AttributeSpec::real("x"),
            AttributeSpec::discrete("class", 3),
        ])
        .unwrap(),
    );
    let mut session = LearningSession::new(atts);
    let err = session.init_learning().unwrap_err();
    assert!(err.is_configuration());

    // Without global hidden variables the same schema is valid.
    session.set_global_hidden(false);
    session.init_learning().unwrap();
    assert_eq!(session.dag().unwrap().edge_count(), 2);
}

#[test]
fn categorical_class_yields_indicator_coefficients() {
    let atts = mixed_schema();
    let records: Vec<DataInstance> = (0..90)
        .map(|i| {
            let class = (i % 3) as f64;
            DataInstance::new(vec![
                1.0 + class + 0.01 * (i % 5) as f64,
                -class + 0.01 * (i % 7) as f64,
                i as f64,
                class,
            ])
        })
        .collect();
    let stream = InMemoryStream::new(atts.clone(), records).unwrap();
    let config = ModelConfig::for_attributes(&atts).with_window_size(30);
    let mut session = LearningSession::with_config(atts, config);
    session.update_from_stream(stream).unwrap();

    let x = session.posterior_distribution("x").unwrap();
    assert!(x.coefficient("class=1").is_some());
    assert!(x.coefficient("class=2").is_some());
    assert!(x.coefficient("class=0").is_none());
    match session.posterior_distribution("class").unwrap() {
        PosteriorDistribution::Multinomial { tables } => {
            assert_eq!(tables.len(), 1);
            // Thirty records per state plus the pseudo-count.
            assert_eq!(tables[0].1.concentrations, vec![31.0, 31.0, 31.0]);
        }
        other => panic!("unexpected posterior {:?}", other),
    }
}

#[test]
fn linear_regression_builder_recovers_coefficients() {
    let atts = Arc::new(Attributes::real(["a", "b", "y"]).unwrap());
    let records: Vec<DataInstance> = (0..200)
        .map(|i| {
            let a = (i as f64 * 0.7).sin();
            let b = (i as f64 * 1.3).cos();
            let noise = ((i * 13) % 11) as f64 / 110.0 - 0.05;
            DataInstance::new(vec![a, b, 2.0 + 3.0 * a - b + noise])
        })
        .collect();
    let stream = InMemoryStream::new(atts.clone(), records).unwrap();
    let config = ModelConfig::for_attributes(&atts).with_window_size(200);
    let mut session = LearningSession::with_config(atts, config)
        .with_builder(Box::new(LinearRegressionBuilder { diagonal: true }));
    let reports = session.update_from_stream(stream).unwrap();
    assert!(reports[0].converged);
    assert!(session.hidden_variable_names().is_empty());

    let y = session.posterior_distribution("y").unwrap();
    assert!((y.coefficient("intercept").unwrap().mean - 2.0).abs() < 0.05);
    assert!((y.coefficient("a").unwrap().mean - 3.0).abs() < 0.05);
    assert!((y.coefficient("b").unwrap().mean + 1.0).abs() < 0.05);
}

#[test]
fn linear_regression_builder_rejects_finite_schema() {
    let atts = mixed_schema();
    let mut session = LearningSession::new(atts)
        .with_builder(Box::new(LinearRegressionBuilder::default()));
    assert!(matches!(
        session.init_learning(),
        Err(LearnError::Configuration(_))
    ));
}
