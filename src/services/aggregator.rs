use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::gateway::ProviderGateway;
use crate::models::{ErrorKind, Failure, ProviderRequest};

/// One labelled provider call inside an aggregated request.
pub struct Branch {
    pub label: String,
    pub gateway: Arc<dyn ProviderGateway>,
    pub request: ProviderRequest,
}

impl Branch {
    pub fn new(
        label: impl Into<String>,
        gateway: Arc<dyn ProviderGateway>,
        request: ProviderRequest,
    ) -> Self {
        Self {
            label: label.into(),
            gateway,
            request,
        }
    }
}

/// Run every branch concurrently and wait for all of them.
///
/// Each label maps to the branch's extracted text, or to a readable failure
/// description when that branch failed. A failing branch never affects the
/// others. A repeated label is kept as `label#2`, `label#3`, ... so the map
/// always holds one entry per branch.
///
/// Branches run inside the caller's task, so dropping the returned future
/// cancels the in-flight provider calls.
pub async fn combine(branches: Vec<Branch>) -> BTreeMap<String, String> {
    log::info!("🔀 Dispatching {} provider branches", branches.len());

    let pending = branches.into_iter().map(|branch| async move {
        let outcome = resolve_text(branch.gateway.as_ref(), &branch.request).await;
        (branch.label, outcome)
    });

    let mut combined = BTreeMap::new();
    for (label, outcome) in join_all(pending).await {
        let key = unique_label(&combined, label);
        combined.insert(key, outcome);
    }
    combined
}

/// `label`, or `label#2`, `label#3`, ... when an earlier branch already took it.
fn unique_label(taken: &BTreeMap<String, String>, label: String) -> String {
    if !taken.contains_key(&label) {
        return label;
    }

    let key = (2..)
        .map(|n| format!("{}#{}", label, n))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or_default();
    log::warn!("⚠️ Duplicate branch label '{}', reporting it as '{}'", label, key);
    key
}

/// Call one provider and reduce its reply to display text.
pub async fn resolve_text(gateway: &dyn ProviderGateway, request: &ProviderRequest) -> String {
    let outcome = gateway
        .call(request)
        .await
        .into_result()
        .and_then(|raw| gateway.extract(&raw))
        .and_then(|payload| {
            if payload.is_empty() {
                log::debug!("{} reply carried no content", gateway.name());
            }
            payload.text.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
                Failure::new(ErrorKind::EmptyResponse, "reply contained no text content")
            })
        });

    match outcome {
        Ok(text) => text,
        Err(failure) => describe_failure(gateway.name(), &failure),
    }
}

/// Caller-facing description of a failure from `provider`.
pub fn describe_failure(provider: &str, failure: &Failure) -> String {
    log::warn!("⚠️ {} branch failed: {}", provider, failure);
    format!("{} request failed ({})", provider, failure)
}
