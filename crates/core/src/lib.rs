//! restspec core: declarative REST API test specifications
//!
//! This crate is the pure half of restspec: callers describe a tree of
//! nested test scopes (resource, method, parameters, credentials, auth
//! schemes, expectations), and the compiler flattens that tree into
//! nested suite/case registrations executed by `restspec-runner`.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    restspec-core                           │
//! ├────────────────────────────────────────────────────────────┤
//! │  SpecTree (builder)                                        │
//! │    ├── begin(desc) / end()            nested scopes        │
//! │    ├── resource / method              single-assignment    │
//! │    ├── params / remove_*              tombstone overlays   │
//! │    ├── credentials / auth schemes     inherited, removable │
//! │    └── expect_*                       ordered expectations │
//! ├────────────────────────────────────────────────────────────┤
//! │  compile()  ->  CompiledSuite                              │
//! │    └── CompiledCase { label, CaseContext }                 │
//! │          merged params, credentials, schemes, expectations │
//! ├────────────────────────────────────────────────────────────┤
//! │  evaluate(CaseResponse, [Expect])     fail-fast chain      │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod compile;
pub mod credential;
pub mod error;
pub mod expect;
pub mod merge;
pub mod node;

pub use compile::{CaseContext, CompiledCase, CompiledSuite, SuiteItem};
pub use credential::{CredentialState, Credentials};
pub use error::{ExpectError, SpecError, SpecResult};
pub use expect::{evaluate, CaseResponse, CheckFn, Expect};
pub use merge::{EffectiveParams, ParamKind};
pub use node::{MethodSpec, Resource, SpecTree};
