//! Adapters that connect the engine's payment processor seam to real card processors.
pub mod stripe;
