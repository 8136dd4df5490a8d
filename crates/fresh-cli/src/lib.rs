//! Pipeline orchestration for the `fresh-migrate` binary.

pub mod code_service;
pub mod config;
pub mod context;
pub mod logging;
pub mod pipeline;
pub mod steps;
pub mod types;
