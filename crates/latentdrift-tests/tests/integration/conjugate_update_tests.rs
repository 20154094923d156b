//! Fully observed finite models reduce to exact Dirichlet counting.

use std::sync::Arc;

use latentdrift_core::{LearningSession, ModelConfig, PosteriorDistribution};
use latentdrift_data::{AttributeSpec, Attributes, DataInstance, DataOnMemory};

fn schema() -> Arc<Attributes> {
    Arc::new(
        Attributes::new([
            AttributeSpec::discrete("a", 2),
            AttributeSpec::categorical("class", ["x", "y", "z"]),
        ])
        .unwrap(),
    )
}

fn batch(atts: &Arc<Attributes>, rows: &[(u8, u8)]) -> DataOnMemory {
    let records = rows
        .iter()
        .map(|&(a, c)| DataInstance::new(vec![a as f64, c as f64]))
        .collect();
    DataOnMemory::from_instances(atts.clone(), records).unwrap()
}

fn tables(session: &LearningSession, name: &str) -> Vec<(String, Vec<f64>)> {
    match session.posterior_distribution(name).unwrap() {
        PosteriorDistribution::Multinomial { tables } => tables
            .into_iter()
            .map(|(label, table)| (label, table.concentrations))
            .collect(),
        other => panic!("unexpected posterior {:?}", other),
    }
}

fn session(fading: f64) -> LearningSession {
    let atts = schema();
    let config = ModelConfig::for_attributes(&atts)
        .with_global_hidden(false)
        .with_fading(fading);
    LearningSession::with_config(atts, config)
}

const FIRST: [(u8, u8); 6] = [(0, 0), (1, 0), (1, 0), (0, 1), (0, 2), (1, 2)];
const SECOND: [(u8, u8); 3] = [(1, 1), (1, 1), (0, 0)];

#[test]
fn posterior_is_prior_plus_counts() {
    let mut s = session(1.0);
    let atts = s.attributes().clone();
    let report = s.update_model(&batch(&atts, &FIRST)).unwrap().unwrap();
    assert!(report.converged);

    assert_eq!(
        tables(&s, "class"),
        vec![("marginal".to_string(), vec![4.0, 2.0, 3.0])]
    );
    assert_eq!(
        tables(&s, "a"),
        vec![
            ("class=0".to_string(), vec![2.0, 3.0]),
            ("class=1".to_string(), vec![2.0, 1.0]),
            ("class=2".to_string(), vec![2.0, 2.0]),
        ]
    );
}

#[test]
fn fading_discounts_earlier_windows() {
    let mut s = session(0.5);
    let atts = s.attributes().clone();
    s.update_model(&batch(&atts, &FIRST)).unwrap();
    s.update_model(&batch(&atts, &SECOND)).unwrap();

    let class = &tables(&s, "class")[0].1;
    let expected = [4.0 * 0.5 + 1.0, 2.0 * 0.5 + 2.0, 3.0 * 0.5];
    for (got, want) in class.iter().zip(expected) {
        assert!((got - want).abs() < 1e-12, "{:?}", class);
    }
    let a_given_y = &tables(&s, "a")[1].1;
    assert!((a_given_y[0] - 1.0).abs() < 1e-12);
    assert!((a_given_y[1] - 2.5).abs() < 1e-12);
}

#[test]
fn hidden_variables_stay_unattached_without_global_hidden() {
    let mut s = session(1.0);
    s.init_learning().unwrap();
    assert_eq!(s.dag().unwrap().edge_count(), 1);
    assert_eq!(s.hidden_variable_names(), vec!["GlobalHidden_0"]);
}
