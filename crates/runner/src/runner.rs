//! Sequential execution of a compiled suite
//!
//! Cases run one at a time, in declaration order. Each case builds its
//! state from its compiled context, runs the authentication pre-step,
//! issues its one request, and walks the fail-fast expectation chain.
//! The only state shared between cases is the token cache living on a
//! shared credential value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use restspec_core::{evaluate, CompiledCase, CompiledSuite, SuiteItem};

use crate::auth::{authorize_case, AdapterRegistry, AuthAdapter};
use crate::error::RunResult;
use crate::request;

/// Outcome of one executed case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    /// Full suite path plus case label.
    pub name: String,
    pub passed: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Outcome of a whole suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub cases: Vec<CaseOutcome>,
}

impl SuiteReport {
    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> RunResult<PathBuf> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Results written to: {}", path.display());
        Ok(path.to_path_buf())
    }
}

/// Configuration for the runner's transport.
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Transport-level timeout applied to every request, including
    /// token exchanges. A hit surfaces as the case's failure.
    pub request_timeout: Option<Duration>,

    /// Optional User-Agent header.
    pub user_agent: Option<String>,
}

/// Executes compiled suites against a shared HTTP client.
pub struct Runner {
    client: reqwest::Client,
    adapters: AdapterRegistry,
}

impl Runner {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            adapters: AdapterRegistry::builtin(),
        }
    }

    pub fn with_config(config: RunnerConfig) -> RunResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(agent) = config.user_agent {
            builder = builder.user_agent(agent);
        }
        Ok(Self {
            client: builder.build()?,
            adapters: AdapterRegistry::builtin(),
        })
    }

    /// Register a custom authentication adapter for a credential kind.
    pub fn register_adapter(&mut self, adapter: Arc<dyn AuthAdapter>) {
        self.adapters.register(adapter);
    }

    /// Run every case in the suite, sequentially and in order.
    pub async fn run(&self, suite: &CompiledSuite) -> SuiteReport {
        let start = Instant::now();
        let mut flat = Vec::new();
        collect(suite, "", &mut flat);

        info!("Running {} test case(s)...", flat.len());

        let mut cases = Vec::with_capacity(flat.len());
        let mut passed = 0;
        let mut failed = 0;
        for (name, case) in flat {
            let outcome = self.run_case(name, case).await;
            if outcome.passed {
                passed += 1;
            } else {
                failed += 1;
            }
            cases.push(outcome);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        SuiteReport {
            total: cases.len(),
            passed,
            failed,
            duration_ms,
            cases,
        }
    }

    async fn run_case(&self, name: String, case: &CompiledCase) -> CaseOutcome {
        let start = Instant::now();
        debug!("Running case: {}", name);

        let result = self.execute_case(case).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!("✓ {} ({} ms)", name, duration_ms);
                CaseOutcome {
                    name,
                    passed: true,
                    duration_ms,
                    error: None,
                }
            }
            Err(e) => {
                error!("✗ {} - {}", name, e);
                CaseOutcome {
                    name,
                    passed: false,
                    duration_ms,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Auth pre-step, request, expectation chain; strictly in order.
    async fn execute_case(&self, case: &CompiledCase) -> RunResult<()> {
        let authorization = authorize_case(&self.adapters, &case.context, &self.client).await?;
        let response =
            request::execute(&self.client, &case.context, authorization.as_deref()).await?;
        evaluate(&response, &case.context.expects)?;
        Ok(())
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten the suite tree into `(full name, case)` pairs in
/// registration order; suites contribute their label to the path.
fn collect<'a>(suite: &'a CompiledSuite, prefix: &str, out: &mut Vec<(String, &'a CompiledCase)>) {
    let path = if prefix.is_empty() {
        suite.label.clone()
    } else {
        format!("{prefix} {}", suite.label)
    };
    for item in &suite.items {
        match item {
            SuiteItem::Case(case) => out.push((format!("{path} {}", case.label), case)),
            SuiteItem::Suite(nested) => collect(nested, &path, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restspec_core::SpecTree;

    #[test]
    fn collect_preserves_registration_order_and_builds_full_names() {
        let mut spec = SpecTree::root("api", "http://localhost");
        spec.resource("users", Some("/users/{id}")).unwrap();
        spec.begin("read");
        spec.method("GET", None).unwrap();
        spec.expect_status(200);
        spec.end().unwrap();
        spec.begin("remove");
        spec.method("DELETE", None).unwrap();
        spec.expect_status(204);
        spec.end().unwrap();

        let suite = spec.compile().unwrap();
        let mut flat = Vec::new();
        collect(&suite, "", &mut flat);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].0, "api users GET read");
        assert_eq!(flat[1].0, "api users DELETE remove");
        assert_eq!(flat[1].1.context.verb, "del");
    }
}
