//! restspec runner: sequential execution of compiled suites
//!
//! This crate is the impure half of restspec. It takes the
//! `CompiledSuite` IR produced by `restspec-core` and drives it over
//! HTTP, one case at a time: the authentication pre-step (built-in
//! password-grant and basic adapters, pluggable for other kinds), the
//! single request built from the merged case context, and the
//! fail-fast expectation chain.

pub mod auth;
pub mod error;
pub mod request;
pub mod runner;

pub use auth::{AdapterRegistry, AuthAdapter, BasicAuthAdapter, PasswordGrantAdapter};
pub use error::{RunError, RunResult};
pub use runner::{CaseOutcome, Runner, RunnerConfig, SuiteReport};
