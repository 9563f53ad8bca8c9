//! Configuration tests for stepper-io.
//!
//! Parsing and validation are exercised through TOML text, the way a
//! controller configuration file is loaded.

mod config_parsing;
mod config_validation;
