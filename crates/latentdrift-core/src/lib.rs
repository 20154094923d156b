//! # LatentDrift Core
//!
//! Streaming variational Bayesian learning with global hidden drift
//! variables. Each window of records is learned by variational message
//! passing; the posterior is carried to the next window through a Gaussian
//! random-walk transition, so the hidden variables track concept drift.

#![forbid(unsafe_code)]

pub mod engine;

// Re-export commonly used types
pub use engine::builder::{BuiltGraph, ConceptDriftBuilder, GraphBuilder, LinearRegressionBuilder};
pub use engine::config::{Execution, ModelConfig, ParameterPriors};
pub use engine::dag::{Dag, ParentSet};
pub use engine::distributions::{DirichletPosterior, GammaPosterior, GaussianPosterior, MIN_VARIANCE};
pub use engine::errors::LearnError;
pub use engine::estimators::{FactorEstimator, FactorGraph, ParameterPosterior};
pub use engine::plate::PlateModel;
pub use engine::posterior::{ModelPosterior, ModelSnapshot, PosteriorDistribution};
pub use engine::session::{LearningSession, SessionState, WindowReport};
pub use engine::transition::{GaussianHiddenTransition, TransitionMethod};
pub use engine::variables::{StateSpaceType, Variable, VariableId, Variables};
pub use engine::vmp::{Refinement, VariationalMessagePassing, VmpDiagnostics};
