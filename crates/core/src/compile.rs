//! Compilation of a specification tree into a suite/case IR
//!
//! Compilation is a pure tree-to-IR transform. Each node contributes
//! nested suite groupings for the groupable attributes it declares
//! (resource first, then method), labeled with the attribute's
//! description; non-leaf nodes contribute their own description as the
//! enclosing suite; a leaf contributes exactly one case, carrying the
//! explicit per-case context flattened from its whole ancestor chain.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::credential::Credentials;
use crate::error::{SpecError, SpecResult};
use crate::expect::Expect;
use crate::merge::{merge_params, merge_schemes, EffectiveParams};
use crate::node::SpecTree;

/// A compiled suite grouping. Items preserve declaration order.
#[derive(Debug)]
pub struct CompiledSuite {
    pub label: String,
    pub items: Vec<SuiteItem>,
}

#[derive(Debug)]
pub enum SuiteItem {
    Suite(CompiledSuite),
    Case(CompiledCase),
}

/// One compiled test case.
#[derive(Debug)]
pub struct CompiledCase {
    pub label: String,
    pub context: CaseContext,
}

/// The explicit per-case context: every attribute a case needs,
/// flattened from its root-to-leaf chain at compile time. The runner
/// builds fresh per-case state from this for every execution; the only
/// intentionally shared state is the token cache inside `credentials`.
#[derive(Clone, Debug)]
pub struct CaseContext {
    pub base_url: String,
    /// Resource path template; empty when no resource was declared.
    pub path: String,
    /// Lower-cased verb, `del` for DELETE.
    pub verb: String,
    pub params: EffectiveParams,
    pub credentials: Option<Arc<Credentials>>,
    pub auth_schemes: BTreeMap<String, Value>,
    /// Opaque options, shallow-merged along the chain.
    pub options: BTreeMap<String, Value>,
    /// Inherited expectations first, then the leaf's own, in
    /// registration order.
    pub expects: Vec<Expect>,
}

impl SpecTree {
    /// Compile the whole tree. Consuming `self` makes re-compilation
    /// unrepresentable. Every leaf is validated: it must carry at
    /// least one expectation of its own and a method somewhere in its
    /// lineage.
    pub fn compile(self) -> SpecResult<CompiledSuite> {
        debug!(scopes = self.nodes.len(), "compiling specification tree");
        let item = self.compile_node(0)?;
        if self.nodes[0].children.is_empty() {
            // A root with no children is itself a single case; its
            // description still forms the outermost suite.
            Ok(CompiledSuite {
                label: self.nodes[0].description.clone(),
                items: vec![item],
            })
        } else {
            match item {
                SuiteItem::Suite(suite) => Ok(suite),
                SuiteItem::Case(_) => unreachable!("non-leaf nodes compile to suites"),
            }
        }
    }

    fn compile_node(&self, index: usize) -> SpecResult<SuiteItem> {
        let node = &self.nodes[index];

        // Groupable attributes in fixed order: resource, then method.
        let mut attrs: Vec<String> = Vec::new();
        if let Some(resource) = &node.resource {
            attrs.push(resource.description.clone());
        }
        if let Some(method) = &node.method {
            attrs.push(method.description.clone());
        }

        if node.children.is_empty() {
            if node.expects.is_empty() {
                return Err(SpecError::NoExpectations(node.description.clone()));
            }
            let mut item = SuiteItem::Case(CompiledCase {
                label: node.description.clone(),
                context: self.context_for(index)?,
            });
            for label in attrs.into_iter().rev() {
                item = SuiteItem::Suite(CompiledSuite {
                    label,
                    items: vec![item],
                });
            }
            Ok(item)
        } else {
            let mut items = Vec::with_capacity(node.children.len());
            for &child in &node.children {
                items.push(self.compile_node(child)?);
            }
            // Attribute groupings nest inside the description suite.
            for label in attrs.into_iter().rev() {
                items = vec![SuiteItem::Suite(CompiledSuite { label, items })];
            }
            Ok(SuiteItem::Suite(CompiledSuite {
                label: node.description.clone(),
                items,
            }))
        }
    }

    /// Flatten the chain above `index` into one case context.
    fn context_for(&self, index: usize) -> SpecResult<CaseContext> {
        let chain = self.chain(index);
        let nodes: Vec<_> = chain.iter().map(|&i| &self.nodes[i]).collect();

        let path = nodes
            .iter()
            .find_map(|n| n.resource.as_ref())
            .map(|r| r.path.clone())
            .unwrap_or_default();

        let verb = nodes
            .iter()
            .find_map(|n| n.method.as_ref())
            .map(|m| m.verb.clone())
            .ok_or_else(|| SpecError::NoMethod(self.nodes[index].description.clone()))?;

        let params = merge_params(nodes.iter().map(|n| &n.params));
        let auth_schemes = merge_schemes(nodes.iter().map(|n| &n.auth_schemes));

        let credentials = nodes
            .iter()
            .fold(None, |acc, n| n.credentials.apply(acc));

        let mut options = BTreeMap::new();
        let mut expects = Vec::new();
        for n in &nodes {
            options.extend(n.options.iter().map(|(k, v)| (k.clone(), v.clone())));
            expects.extend(n.expects.iter().cloned());
        }

        Ok(CaseContext {
            base_url: self.base_url.clone(),
            path,
            verb,
            params,
            credentials,
            auth_schemes,
            options,
            expects,
        })
    }
}
