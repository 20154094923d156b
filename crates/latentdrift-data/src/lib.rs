//! # LatentDrift Data
//!
//! Attribute schemas, records, in-memory batches and the data-stream
//! interface consumed by the learning engine.

pub mod attributes;
pub mod errors;
pub mod generator;
pub mod instance;
pub mod stream;

// Re-export commonly used types
pub use attributes::{Attribute, AttributeSpec, Attributes, ValueDomain};
pub use errors::DataError;
pub use generator::{DriftPoint, DriftingGaussianGenerator};
pub use instance::{DataInstance, DataOnMemory};
pub use stream::{Batches, DataStream, InMemoryStream};
