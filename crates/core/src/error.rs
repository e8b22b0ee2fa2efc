//! Error types for specification building and expectation evaluation

use thiserror::Error;

/// Result type alias for specification-time operations
pub type SpecResult<T> = std::result::Result<T, SpecError>;

/// Build-time configuration and argument errors.
///
/// These are raised synchronously while the specification tree is being
/// constructed or compiled, before any test case exists. A malformed
/// suite definition never silently produces zero tests.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("cannot test a different resource in a child test")]
    ResourceAlreadySet,

    #[error("cannot test a different method in a child test")]
    MethodAlreadySet,

    #[error("terminal test cases must have at least one expectation: {0}")]
    NoExpectations(String),

    #[error("credentials could not be deduced: no mapping named '{0}' in scope")]
    UnknownCredentials(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("no HTTP method declared for test case: {0}")]
    NoMethod(String),

    #[error("end() called on the root scope; call compile() instead")]
    EndOnRoot,
}

/// Run-time expectation mismatches.
///
/// The first failing check aborts the chain and becomes the case's
/// reported error; later checks in that case never run.
#[derive(Error, Debug)]
pub enum ExpectError {
    #[error("expected status {expected}, got {actual}")]
    Status { expected: u16, actual: u16 },

    #[error("expected header '{name}' = {expected:?}, got {actual:?}")]
    Header {
        name: String,
        expected: String,
        actual: Option<String>,
    },

    #[error("response has no body")]
    MissingBody,

    #[error("body mismatch at {path}: {detail}")]
    Body { path: String, detail: String },

    #[error("expected a JSON array body")]
    NotAnArray,

    #[error("expected array of length {expected}, got {actual}")]
    ArrayLen { expected: usize, actual: usize },

    #[error("element {index} has unexpected fields: {fields:?}")]
    UnexpectedFields { index: usize, fields: Vec<String> },

    #[error("{0}")]
    Check(String),
}
