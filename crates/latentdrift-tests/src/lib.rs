//! Integration and property tests for LatentDrift live in `tests/`.
