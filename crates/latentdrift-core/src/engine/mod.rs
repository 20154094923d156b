//! The learning engine for drifting latent-variable models.
//!
//! This module provides:
//! - **errors**: Error types for configuration, inference and queries
//! - **distributions**: Gaussian, Gamma and Dirichlet posterior families
//! - **variables** / **dag**: Model variables and the dependency graph
//! - **builder**: Graph layouts (concept drift, linear regression)
//! - **estimators**: Per-variable conditional distributions and their updates
//! - **plate**: Replication of the model over a window of records
//! - **vmp**: Variational message passing within a window
//! - **transition**: Posterior-to-prior transition between windows
//! - **session**: The streaming learning controller

pub mod builder;
pub mod config;
pub mod dag;
pub mod distributions;
pub mod errors;
pub mod estimators;
pub mod plate;
pub mod posterior;
pub mod session;
pub mod transition;
pub mod variables;
pub mod vmp;
