//! The specification tree and its cursor-style builder
//!
//! Nodes live in an arena (`Vec<NodeData>` plus parent indices) so
//! children are exclusively owned while upward lookups (credential
//! resolution, single-assignment checks) walk plain indices. The
//! builder keeps a cursor on the scope currently being described:
//! `begin` descends into a new child, `end` seals the current scope and
//! ascends.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::credential::{CredentialState, Credentials};
use crate::error::{SpecError, SpecResult};
use crate::expect::{CheckFn, Expect};
use crate::merge::{bulk_entries, ParamEntry, ParamKind, ParamLayer, ParamOverlay};

/// A named resource with its path template (`{key}` tokens).
#[derive(Clone, Debug)]
pub struct Resource {
    pub description: String,
    pub path: String,
}

/// A named HTTP method. The verb is stored lower-cased; `delete` is
/// stored as the client alias `del`.
#[derive(Clone, Debug)]
pub struct MethodSpec {
    pub description: String,
    pub verb: String,
}

pub(crate) fn normalize_verb(verb: &str) -> String {
    let verb = verb.to_ascii_lowercase();
    if verb == "delete" {
        "del".to_string()
    } else {
        verb
    }
}

/// One scope in the specification tree.
#[derive(Debug, Default)]
pub(crate) struct NodeData {
    pub description: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub resource: Option<Resource>,
    pub method: Option<MethodSpec>,
    pub auth_schemes: BTreeMap<String, Value>,
    pub credentials_map: BTreeMap<String, Arc<Credentials>>,
    pub credentials: CredentialState,
    pub options: BTreeMap<String, Value>,
    pub params: ParamLayer,
    pub expects: Vec<Expect>,
}

/// Builder for a tree of nested test scopes.
///
/// Attributes set on a scope are inherited by its descendants unless a
/// descendant overrides or tombstones them; resource and method are
/// single-assignment along any root-to-leaf lineage. Compilation
/// (`compile`, defined in [`crate::compile`]) consumes the tree, so a
/// specification compiles at most once.
#[derive(Debug)]
pub struct SpecTree {
    pub(crate) base_url: String,
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) cursor: usize,
}

impl SpecTree {
    /// Create the root scope against a base URL.
    pub fn root(description: impl Into<String>, base_url: impl Into<String>) -> Self {
        let root = NodeData {
            description: description.into(),
            ..NodeData::default()
        };
        Self {
            base_url: base_url.into(),
            nodes: vec![root],
            cursor: 0,
        }
    }

    /// Create a child scope under the current one and descend into it.
    pub fn begin(&mut self, description: impl Into<String>) -> &mut Self {
        let child = NodeData {
            description: description.into(),
            parent: Some(self.cursor),
            ..NodeData::default()
        };
        let index = self.nodes.len();
        self.nodes.push(child);
        self.nodes[self.cursor].children.push(index);
        self.cursor = index;
        self
    }

    /// Seal the current scope and return to its parent.
    ///
    /// A scope with no children must carry at least one expectation of
    /// its own by the time it is sealed.
    pub fn end(&mut self) -> SpecResult<&mut Self> {
        let node = &self.nodes[self.cursor];
        if node.children.is_empty() && node.expects.is_empty() {
            return Err(SpecError::NoExpectations(node.description.clone()));
        }
        let parent = node.parent;
        match parent {
            Some(parent) => {
                self.cursor = parent;
                Ok(self)
            }
            None => Err(SpecError::EndOnRoot),
        }
    }

    /// Indices of the chain from the root down to `index`, inclusive.
    pub(crate) fn chain(&self, index: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            chain.push(i);
            current = self.nodes[i].parent;
        }
        chain.reverse();
        chain
    }

    fn current(&mut self) -> &mut NodeData {
        &mut self.nodes[self.cursor]
    }

    /// Declare the resource under test. The path template defaults to
    /// the description. Fails when any scope in the lineage already
    /// declared a resource.
    pub fn resource(
        &mut self,
        description: impl Into<String>,
        path: Option<&str>,
    ) -> SpecResult<&mut Self> {
        if self
            .chain(self.cursor)
            .iter()
            .any(|&i| self.nodes[i].resource.is_some())
        {
            return Err(SpecError::ResourceAlreadySet);
        }
        let description = description.into();
        let path = path.unwrap_or(&description).to_string();
        self.current().resource = Some(Resource { description, path });
        Ok(self)
    }

    /// Declare the HTTP method under test. The verb defaults to the
    /// description. Fails when any scope in the lineage already
    /// declared a method.
    pub fn method(
        &mut self,
        description: impl Into<String>,
        verb: Option<&str>,
    ) -> SpecResult<&mut Self> {
        if self
            .chain(self.cursor)
            .iter()
            .any(|&i| self.nodes[i].method.is_some())
        {
            return Err(SpecError::MethodAlreadySet);
        }
        let description = description.into();
        let verb = normalize_verb(verb.unwrap_or(&description));
        self.current().method = Some(MethodSpec { description, verb });
        Ok(self)
    }

    /// Set one auth scheme configuration, shallow-merged into the
    /// scope's local scheme map.
    pub fn auth_scheme(&mut self, name: impl Into<String>, config: Value) -> &mut Self {
        self.current().auth_schemes.insert(name.into(), config);
        self
    }

    /// Bulk form of [`auth_scheme`](Self::auth_scheme).
    pub fn auth_schemes(&mut self, schemes: Value) -> SpecResult<&mut Self> {
        let Value::Object(map) = schemes else {
            return Err(SpecError::InvalidParams(
                "auth schemes must be given as a JSON object".to_string(),
            ));
        };
        for (name, config) in map {
            self.current().auth_schemes.insert(name, config);
        }
        Ok(self)
    }

    /// Register a named credential definition on this scope, resolvable
    /// by descendants via [`use_named_credentials`](Self::use_named_credentials).
    pub fn map_credentials(
        &mut self,
        name: impl Into<String>,
        credentials: Arc<Credentials>,
    ) -> &mut Self {
        self.current().credentials_map.insert(name.into(), credentials);
        self
    }

    /// Use a concrete credential value for this scope and its
    /// descendants.
    pub fn use_credentials(&mut self, credentials: Credentials) -> &mut Self {
        self.use_shared_credentials(Arc::new(credentials))
    }

    /// Use an already shared credential value. Sharing the same `Arc`
    /// across scopes shares the token cache across their test cases.
    pub fn use_shared_credentials(&mut self, credentials: Arc<Credentials>) -> &mut Self {
        self.current().credentials = CredentialState::Set(credentials);
        self
    }

    /// Use a credential registered by name on this scope or an
    /// ancestor; the nearest definition wins.
    pub fn use_named_credentials(&mut self, name: &str) -> SpecResult<&mut Self> {
        let credentials = self
            .resolve_named(name)
            .ok_or_else(|| SpecError::UnknownCredentials(name.to_string()))?;
        self.current().credentials = CredentialState::Set(credentials);
        Ok(self)
    }

    /// Explicitly remove inherited credentials for this scope and its
    /// descendants (a tombstone, distinct from leaving them unset).
    pub fn remove_credentials(&mut self) -> &mut Self {
        self.current().credentials = CredentialState::Removed;
        self
    }

    /// Upward named-credential lookup from the current scope.
    pub fn resolve_named(&self, name: &str) -> Option<Arc<Credentials>> {
        let mut current = Some(self.cursor);
        while let Some(i) = current {
            if let Some(found) = self.nodes[i].credentials_map.get(name) {
                return Some(Arc::clone(found));
            }
            current = self.nodes[i].parent;
        }
        None
    }

    /// Opaque configuration option passed through to the compiled case.
    pub fn option(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.current().options.insert(key.into(), value);
        self
    }

    fn overlay(&mut self, kind: ParamKind) -> &mut ParamOverlay {
        self.current().params.entry(kind).or_default()
    }

    /// Set a single parameter in the given category.
    pub fn param(&mut self, kind: ParamKind, key: impl Into<String>, value: Value) -> &mut Self {
        self.overlay(kind)
            .entries
            .insert(key.into(), ParamEntry::Value(value));
        self
    }

    /// Set a whole category from a JSON object.
    pub fn params(&mut self, kind: ParamKind, bulk: Value) -> SpecResult<&mut Self> {
        let entries = bulk_entries(kind, bulk)?;
        let overlay = self.overlay(kind);
        for (key, entry) in entries {
            overlay.entries.insert(key, entry);
        }
        Ok(self)
    }

    /// Tombstone every parameter category inherited up to this scope.
    pub fn remove_all_params(&mut self) -> &mut Self {
        for kind in ParamKind::ALL {
            self.overlay(kind).cleared = true;
        }
        self
    }

    /// Tombstone one whole category. Entries added at this scope or
    /// deeper are unaffected by the tombstone.
    pub fn remove_params(&mut self, kind: ParamKind) -> &mut Self {
        self.overlay(kind).cleared = true;
        self
    }

    /// Tombstone a single key in a category.
    pub fn remove_param(&mut self, kind: ParamKind, key: impl Into<String>) -> &mut Self {
        self.overlay(kind)
            .entries
            .insert(key.into(), ParamEntry::Removed);
        self
    }

    pub fn path_param(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.param(ParamKind::Path, key, value.into())
    }

    pub fn header(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.param(ParamKind::Header, key, value.into())
    }

    pub fn query(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.param(ParamKind::Query, key, value.into())
    }

    pub fn body(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.param(ParamKind::Body, key, value.into())
    }

    pub fn form(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.param(ParamKind::Form, key, value.into())
    }

    /// Register an expectation on this scope. Expectations registered
    /// on a non-leaf scope are inherited by every descendant case,
    /// ancestors first.
    pub fn expect(&mut self, expect: Expect) -> &mut Self {
        self.current().expects.push(expect);
        self
    }

    pub fn expect_status(&mut self, status: u16) -> &mut Self {
        self.expect(Expect::Status(status))
    }

    pub fn expect_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.expect(Expect::Header {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn expect_body(&mut self, pattern: Value) -> &mut Self {
        self.expect(Expect::Body(pattern))
    }

    pub fn expect_check(&mut self, check: CheckFn) -> &mut Self {
        self.expect(Expect::Check(check))
    }

    pub fn expect_array_len(&mut self, len: usize) -> &mut Self {
        self.expect(Expect::ArrayLen { len, status: None })
    }

    pub fn expect_array_len_and_status(&mut self, len: usize, status: u16) -> &mut Self {
        self.expect(Expect::ArrayLen {
            len,
            status: Some(status),
        })
    }

    pub fn expect_array_shape(&mut self, allowed: &[&str]) -> &mut Self {
        self.expect(Expect::ArrayShape {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_is_single_assignment_along_a_lineage() {
        let mut spec = SpecTree::root("api", "http://localhost");
        spec.resource("users", Some("/users")).unwrap();
        spec.begin("child");
        let err = spec.resource("posts", Some("/posts")).unwrap_err();
        assert!(matches!(err, SpecError::ResourceAlreadySet));
        // Even re-setting the same value is rejected.
        let err = spec.resource("users", Some("/users")).unwrap_err();
        assert!(matches!(err, SpecError::ResourceAlreadySet));
    }

    #[test]
    fn method_is_single_assignment_and_siblings_are_independent() {
        let mut spec = SpecTree::root("api", "http://localhost");
        spec.begin("reads");
        spec.method("GET", None).unwrap();
        spec.expect_status(200);
        spec.end().unwrap();
        spec.begin("writes");
        // Sibling lineage: setting a method here is fine.
        spec.method("POST", None).unwrap();
        let err = spec.method("PUT", None).unwrap_err();
        assert!(matches!(err, SpecError::MethodAlreadySet));
    }

    #[test]
    fn delete_verb_compiles_to_the_client_alias() {
        assert_eq!(normalize_verb("DELETE"), "del");
        assert_eq!(normalize_verb("delete"), "del");
        assert_eq!(normalize_verb("GET"), "get");
        assert_eq!(normalize_verb("Patch"), "patch");
    }

    #[test]
    fn verb_defaults_to_the_description() {
        let mut spec = SpecTree::root("api", "http://localhost");
        spec.method("DELETE", None).unwrap();
        assert_eq!(spec.nodes[0].method.as_ref().unwrap().verb, "del");
        assert_eq!(spec.nodes[0].method.as_ref().unwrap().description, "DELETE");
    }

    #[test]
    fn leaf_without_expectations_cannot_be_sealed() {
        let mut spec = SpecTree::root("api", "http://localhost");
        spec.begin("empty leaf");
        let err = spec.end().unwrap_err();
        assert!(matches!(err, SpecError::NoExpectations(label) if label == "empty leaf"));
    }

    #[test]
    fn named_credentials_resolve_to_the_nearest_scope() {
        let shadow = Credentials::basic("outer", "u1", "p1").shared();
        let near = Credentials::basic("inner", "u2", "p2").shared();
        let mut spec = SpecTree::root("api", "http://localhost");
        spec.map_credentials("svc", shadow);
        spec.begin("mid");
        spec.map_credentials("svc", near);
        spec.begin("leaf");
        let resolved = spec.resolve_named("svc").unwrap();
        assert_eq!(resolved.description, "inner");
        assert!(spec.resolve_named("missing").is_none());
    }

    #[test]
    fn bare_name_that_resolves_nowhere_is_a_configuration_error() {
        let mut spec = SpecTree::root("api", "http://localhost");
        let err = spec.use_named_credentials("nobody").unwrap_err();
        assert!(matches!(err, SpecError::UnknownCredentials(name) if name == "nobody"));
    }

    #[test]
    fn bulk_params_reject_non_objects() {
        let mut spec = SpecTree::root("api", "http://localhost");
        assert!(spec.params(ParamKind::Query, json!({"limit": 10})).is_ok());
        assert!(spec.params(ParamKind::Query, json!("limit")).is_err());
    }

    #[test]
    fn end_on_root_is_rejected() {
        let mut spec = SpecTree::root("api", "http://localhost");
        spec.expect_status(200);
        assert!(matches!(spec.end(), Err(SpecError::EndOnRoot)));
    }
}
