//! Seeded synthetic data with scheduled concept drift.
//!
//! Every attribute is real-valued. The designated class column is drawn from
//! N(0, 1); every other column `k` is a linear function of the class plus
//! Gaussian noise:
//!
//! ```text
//! x_k = intercept_k + slope_k * class + shift(t) + noise_sd * eps
//! ```
//!
//! `shift(t)` is the mean shift of the most recent drift point at or before
//! record `t`, which lets tests inject a drift at a known position.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::attributes::Attributes;
use crate::errors::DataError;
use crate::instance::{DataInstance, DataOnMemory};
use crate::stream::DataStream;

const DEFAULT_NOISE_SD: f64 = 0.5;
const DEFAULT_RECORDS: usize = 1000;

/// A mean shift applied to every non-class column from `from_record` on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftPoint {
    pub from_record: usize,
    pub shift: f64,
}

/// Finite stream of drifting Gaussian records.
#[derive(Debug, Clone)]
pub struct DriftingGaussianGenerator {
    attributes: Arc<Attributes>,
    class_index: usize,
    intercepts: Vec<f64>,
    slopes: Vec<f64>,
    noise_sd: f64,
    drift: Vec<DriftPoint>,
    total: usize,
    produced: usize,
    rng: StdRng,
}

impl DriftingGaussianGenerator {
    /// Creates a generator over `GaussianVar0..GaussianVar{n-1}`.
    ///
    /// Non-class columns alternate intercepts of `1` and `-1` and slopes of
    /// `0.5` and `0.8`.
    pub fn new(num_attributes: usize, class_index: usize, seed: u64) -> Result<Self, DataError> {
        if num_attributes == 0 {
            return Err(DataError::Schema(
                "generator needs at least one attribute".into(),
            ));
        }
        if class_index >= num_attributes {
            return Err(DataError::Schema(format!(
                "class index {} out of range for {} attributes",
                class_index, num_attributes
            )));
        }
        let attributes = Attributes::real((0..num_attributes).map(|i| format!("GaussianVar{}", i)))?;
        let mut intercepts = vec![0.0; num_attributes];
        let mut slopes = vec![0.0; num_attributes];
        for (k, idx) in (0..num_attributes).filter(|&i| i != class_index).enumerate() {
            intercepts[idx] = if k % 2 == 0 { 1.0 } else { -1.0 };
            slopes[idx] = if k % 2 == 0 { 0.5 } else { 0.8 };
        }
        Ok(Self {
            attributes: Arc::new(attributes),
            class_index,
            intercepts,
            slopes,
            noise_sd: DEFAULT_NOISE_SD,
            drift: Vec::new(),
            total: DEFAULT_RECORDS,
            produced: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Total number of records the stream will produce.
    pub fn with_records(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    pub fn with_noise_sd(mut self, noise_sd: f64) -> Self {
        self.noise_sd = noise_sd.abs();
        self
    }

    /// Schedules a mean shift starting at `from_record`.
    pub fn with_shift_at(mut self, from_record: usize, shift: f64) -> Self {
        self.drift.push(DriftPoint { from_record, shift });
        self.drift.sort_by_key(|point| point.from_record);
        self
    }

    pub fn class_index(&self) -> usize {
        self.class_index
    }

    /// Mean shift in force for record number `record`.
    pub fn shift_at(&self, record: usize) -> f64 {
        self.drift
            .iter()
            .rev()
            .find(|point| point.from_record <= record)
            .map_or(0.0, |point| point.shift)
    }

    fn next_record(&mut self) -> DataInstance {
        let shift = self.shift_at(self.produced);
        let class: f64 = StandardNormal.sample(&mut self.rng);
        let mut values = vec![0.0; self.attributes.len()];
        for (idx, value) in values.iter_mut().enumerate() {
            if idx == self.class_index {
                *value = class;
                continue;
            }
            let eps: f64 = StandardNormal.sample(&mut self.rng);
            *value = self.intercepts[idx] + self.slopes[idx] * class + shift + self.noise_sd * eps;
        }
        self.produced += 1;
        DataInstance::new(values)
    }
}

impl DataStream for DriftingGaussianGenerator {
    fn attributes(&self) -> &Arc<Attributes> {
        &self.attributes
    }

    fn next_batch(&mut self, size: usize) -> Option<DataOnMemory> {
        let remaining = self.total.saturating_sub(self.produced);
        if size == 0 || remaining == 0 {
            return None;
        }
        let mut batch = DataOnMemory::new(self.attributes.clone());
        for _ in 0..size.min(remaining) {
            let record = self.next_record();
            if batch.push(record).is_err() {
                return None;
            }
        }
        Some(batch)
    }
}
