//! Helpers for tests against a throwaway SQLite database and a scripted card processor.
pub mod fake_processor;
pub mod prepare_env;
pub mod seed;
