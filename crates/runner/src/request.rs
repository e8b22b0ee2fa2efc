//! Request construction and execution from a merged case context

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use restspec_core::{CaseContext, CaseResponse, ParamKind};

use crate::error::{RunError, RunResult};

/// Substitute `{key}` tokens in the path template from the path
/// params. Best-effort string replace: a param with no matching token
/// is not an error, and unreplaced tokens pass through unchanged.
pub fn build_url(base_url: &str, template: &str, path_params: &BTreeMap<String, Value>) -> String {
    let mut path = template.to_string();
    for (key, value) in path_params {
        path = path.replace(&format!("{{{key}}}"), &render(value));
    }
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Map a stored verb to a reqwest method. `del` is the stored alias
/// for DELETE; everything else maps through its upper-cased name.
pub fn method_for(verb: &str) -> RunResult<Method> {
    if verb == "del" {
        return Ok(Method::DELETE);
    }
    Method::from_bytes(verb.to_ascii_uppercase().as_bytes())
        .map_err(|_| RunError::InvalidVerb(verb.to_string()))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build and issue the one request for a case.
///
/// A transport-level failure aborts the case; the expectation chain is
/// never reached.
pub async fn execute(
    client: &reqwest::Client,
    context: &CaseContext,
    authorization: Option<&str>,
) -> RunResult<CaseResponse> {
    let empty = BTreeMap::new();
    let path_params = context.params.get(&ParamKind::Path).unwrap_or(&empty);
    let url = build_url(&context.base_url, &context.path, path_params);
    let method = method_for(&context.verb)?;

    debug!(%url, verb = %context.verb, "issuing request");
    let mut request = client.request(method, &url).header(ACCEPT, "application/json");

    if let Some(value) = authorization {
        request = request.header(AUTHORIZATION, value);
    }

    if let Some(headers) = context.params.get(&ParamKind::Header) {
        for (name, value) in headers {
            request = request.header(name.as_str(), render(value));
        }
    }

    if let Some(query) = context.params.get(&ParamKind::Query) {
        let pairs: Vec<(&str, String)> = query
            .iter()
            .map(|(key, value)| (key.as_str(), render(value)))
            .collect();
        request = request.query(&pairs);
    }

    let body = context.params.get(&ParamKind::Body).filter(|m| !m.is_empty());
    let form = context.params.get(&ParamKind::Form).filter(|m| !m.is_empty());
    match (body, form) {
        (Some(body), form) => {
            if form.is_some() {
                warn!("case declares both body and form params, sending the JSON body");
            }
            let object: serde_json::Map<String, Value> = body
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            request = request.json(&object);
        }
        (None, Some(form)) => {
            let fields: BTreeMap<&str, String> = form
                .iter()
                .map(|(key, value)| (key.as_str(), render(value)))
                .collect();
            request = request.form(&fields);
        }
        (None, None) => {}
    }

    let response = request.send().await?;
    flatten(response).await
}

/// Flatten a transport response into the shape the expectation chain
/// consumes: lower-cased header names, JSON body when it parses.
async fn flatten(response: reqwest::Response) -> RunResult<CaseResponse> {
    let status = response.status().as_u16();
    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        if let Ok(text) = value.to_str() {
            headers.insert(name.as_str().to_ascii_lowercase(), text.to_string());
        }
    }
    let text = response.text().await?;
    let body = if text.is_empty() {
        None
    } else {
        serde_json::from_str(&text)
            .ok()
            .or(Some(Value::String(text)))
    };
    Ok(CaseResponse {
        status,
        headers,
        body,
    })
}
