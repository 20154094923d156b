//! # LatentDrift - online learning under concept drift
//!
//! LatentDrift learns a Bayesian network from a stream of data windows. Every
//! non-class attribute receives the class variable and a set of global hidden
//! Gaussian variables as parents; the hidden variables evolve between windows
//! as a random walk, so a shift in the data distribution shows up as a move
//! of their posterior means.
//!
//! ## Architecture
//!
//! - **data**: attribute schemas, records, batches and streams
//! - **core**: graph builders, estimators, variational message passing,
//!   transitions and the learning session
//!
//! ## Usage
//!
//! ```rust,no_run
//! use latentdrift::{DataStream, DriftingGaussianGenerator, LearningSession, ModelConfig};
//!
//! let stream = DriftingGaussianGenerator::new(3, 2, 0)?
//!     .with_records(200)
//!     .with_shift_at(100, 3.0);
//! let attributes = stream.attributes().clone();
//! let config = ModelConfig::for_attributes(&attributes).with_window_size(50);
//! let mut session = LearningSession::with_config(attributes, config);
//! let reports = session.update_from_stream(stream)?;
//! println!("learned {} windows", reports.len());
//! println!("{}", session.posterior_distribution("GlobalHidden_0")?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

pub use latentdrift_core::*;
pub use latentdrift_data::*;
