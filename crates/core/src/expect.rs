//! Response expectations and their fail-fast evaluation chain

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ExpectError;

/// A custom response check supplied by the caller.
pub type CheckFn = Arc<dyn Fn(&CaseResponse) -> Result<(), ExpectError> + Send + Sync>;

/// One response expectation.
///
/// A closed set of variants rather than dispatch on argument shape:
/// the builder exposes one registration method per variant.
#[derive(Clone)]
pub enum Expect {
    /// Status code equality.
    Status(u16),
    /// Header value equality; the name is matched case-insensitively.
    Header { name: String, value: String },
    /// Recursive body pattern match, see [`match_pattern`].
    Body(Value),
    /// Body is a JSON array of exactly `len` elements; when `status` is
    /// present it is checked first.
    ArrayLen { len: usize, status: Option<u16> },
    /// Every array element's key set, minus the allowed fields, must be
    /// empty.
    ArrayShape { allowed: Vec<String> },
    /// Raw custom check.
    Check(CheckFn),
}

impl fmt::Debug for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expect::Status(code) => write!(f, "Status({code})"),
            Expect::Header { name, value } => write!(f, "Header({name}: {value})"),
            Expect::Body(pattern) => write!(f, "Body({pattern})"),
            Expect::ArrayLen { len, status } => write!(f, "ArrayLen({len}, {status:?})"),
            Expect::ArrayShape { allowed } => write!(f, "ArrayShape({allowed:?})"),
            Expect::Check(_) => write!(f, "Check(..)"),
        }
    }
}

/// A flattened HTTP response handed to the expectation chain.
///
/// Header names are stored lower-cased. The body is parsed JSON when
/// the payload parses, otherwise the raw text as a JSON string.
#[derive(Clone, Debug, Default)]
pub struct CaseResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl CaseResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Run the expectation chain: strictly sequential, fail-fast. The
/// first mismatch aborts and becomes the case's error.
pub fn evaluate(response: &CaseResponse, expects: &[Expect]) -> Result<(), ExpectError> {
    for expect in expects {
        check_one(response, expect)?;
    }
    Ok(())
}

fn check_one(response: &CaseResponse, expect: &Expect) -> Result<(), ExpectError> {
    match expect {
        Expect::Status(expected) => {
            if response.status != *expected {
                return Err(ExpectError::Status {
                    expected: *expected,
                    actual: response.status,
                });
            }
            Ok(())
        }
        Expect::Header { name, value } => match response.header(name) {
            Some(actual) if actual == value => Ok(()),
            actual => Err(ExpectError::Header {
                name: name.clone(),
                expected: value.clone(),
                actual: actual.map(str::to_string),
            }),
        },
        Expect::Body(pattern) => {
            let body = response.body.as_ref().ok_or(ExpectError::MissingBody)?;
            match_pattern(pattern, body, "$")
        }
        Expect::ArrayLen { len, status } => {
            if let Some(expected) = status {
                check_one(response, &Expect::Status(*expected))?;
            }
            let body = response.body.as_ref().ok_or(ExpectError::MissingBody)?;
            let array = body.as_array().ok_or(ExpectError::NotAnArray)?;
            if array.len() != *len {
                return Err(ExpectError::ArrayLen {
                    expected: *len,
                    actual: array.len(),
                });
            }
            Ok(())
        }
        Expect::ArrayShape { allowed } => {
            let body = response.body.as_ref().ok_or(ExpectError::MissingBody)?;
            let array = body.as_array().ok_or(ExpectError::NotAnArray)?;
            for (index, element) in array.iter().enumerate() {
                let extra: Vec<String> = element
                    .as_object()
                    .map(|obj| {
                        obj.keys()
                            .filter(|key| !allowed.iter().any(|a| a == *key))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                if !extra.is_empty() {
                    return Err(ExpectError::UnexpectedFields {
                        index,
                        fields: extra,
                    });
                }
            }
            Ok(())
        }
        Expect::Check(check) => check(response),
    }
}

/// Recursive pattern match of `pattern` against `actual`.
///
/// Objects: every pattern key must exist and match; extra actual keys
/// are allowed. Arrays: equal length, element-wise match. Strings of
/// the form `/re/` are regexes tested against the actual value
/// rendered as a string. Everything else is plain equality.
pub fn match_pattern(pattern: &Value, actual: &Value, path: &str) -> Result<(), ExpectError> {
    match pattern {
        Value::Object(expected) => {
            let object = actual.as_object().ok_or_else(|| ExpectError::Body {
                path: path.to_string(),
                detail: format!("expected an object, got {actual}"),
            })?;
            for (key, sub) in expected {
                let value = object.get(key).ok_or_else(|| ExpectError::Body {
                    path: format!("{path}.{key}"),
                    detail: "missing field".to_string(),
                })?;
                match_pattern(sub, value, &format!("{path}.{key}"))?;
            }
            Ok(())
        }
        Value::Array(expected) => {
            let array = actual.as_array().ok_or_else(|| ExpectError::Body {
                path: path.to_string(),
                detail: format!("expected an array, got {actual}"),
            })?;
            if array.len() != expected.len() {
                return Err(ExpectError::Body {
                    path: path.to_string(),
                    detail: format!(
                        "expected {} elements, got {}",
                        expected.len(),
                        array.len()
                    ),
                });
            }
            for (index, (sub, value)) in expected.iter().zip(array).enumerate() {
                match_pattern(sub, value, &format!("{path}[{index}]"))?;
            }
            Ok(())
        }
        Value::String(literal) if is_regex_literal(literal) => {
            let source = &literal[1..literal.len() - 1];
            let regex = Regex::new(source).map_err(|e| ExpectError::Body {
                path: path.to_string(),
                detail: format!("invalid pattern /{source}/: {e}"),
            })?;
            let rendered = render(actual);
            if regex.is_match(&rendered) {
                Ok(())
            } else {
                Err(ExpectError::Body {
                    path: path.to_string(),
                    detail: format!("'{rendered}' does not match /{source}/"),
                })
            }
        }
        _ => {
            if pattern == actual {
                Ok(())
            } else {
                Err(ExpectError::Body {
                    path: path.to_string(),
                    detail: format!("expected {pattern}, got {actual}"),
                })
            }
        }
    }
}

fn is_regex_literal(literal: &str) -> bool {
    literal.len() >= 2 && literal.starts_with('/') && literal.ends_with('/')
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
