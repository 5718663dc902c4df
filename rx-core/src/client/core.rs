//! Shared per-call machinery for the NHS client façades

use std::sync::Arc;

use serde_json::{json, Value};

use crate::audit::{AuditAction, AuditCategory, AuditRecord, AuditSink};
use crate::auth::TokenCache;
use crate::cache::{request_signature, ResponseCache};
use crate::clock::Clock;
use crate::error::{Result, RxError};
use crate::fhir::OperationOutcome;
use crate::limit::{Decision, RateLimiter};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Audit context for one call
#[derive(Debug, Clone, Copy)]
pub(crate) struct Call<'a> {
    pub category: &'a str,
    pub action: AuditAction,
    pub audit_category: AuditCategory,
    pub actor: &'a str,
    pub resource_id: Option<&'a str>,
}

/// Composes the rate limiter, token cache, response cache, transport, and
/// audit sink into the per-call protocol shared by every façade
pub struct ClientCore {
    transport: Arc<dyn Transport>,
    tokens: TokenCache,
    limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl ClientCore {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: TokenCache,
        limiter: Arc<RateLimiter>,
        cache: Arc<ResponseCache>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            tokens,
            limiter,
            cache,
            audit,
            clock,
        }
    }

    /// Idempotent GET with optional response caching
    pub(crate) async fn get_json(
        &self,
        call: Call<'_>,
        path: &str,
        query: Vec<(String, String)>,
        use_cache: bool,
    ) -> Result<Value> {
        self.check_rate(call.category).await?;

        let key = {
            let params: Vec<(&str, &str)> = query
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            request_signature(&format!("GET {}", path), &params)
        };

        if use_cache {
            if let Some(cached) = self.cache.get(&key) {
                self.emit_audit(&call, json!({"cached": true})).await;
                return Ok(cached);
            }
        }

        let token = self.tokens.bearer_token().await?;
        let request = ApiRequest::get(path)
            .with_query(query)
            .with_bearer(token.value);

        let response = self.transport.execute(request).await?;
        let body = ensure_success(response)?;

        if use_cache {
            self.cache.set(&key, body.clone());
        }
        self.emit_audit(&call, json!({"cached": false})).await;

        Ok(body)
    }

    /// Mutating call (PUT/POST); never cached
    pub(crate) async fn send_json(
        &self,
        call: Call<'_>,
        mut request: ApiRequest,
        audit_details: Value,
    ) -> Result<Value> {
        self.check_rate(call.category).await?;

        let token = self.tokens.bearer_token().await?;
        request = request.with_bearer(token.value);

        let response = self.transport.execute(request).await?;
        let body = ensure_success(response)?;

        self.emit_audit(&call, audit_details).await;

        Ok(body)
    }

    async fn check_rate(&self, category: &str) -> Result<()> {
        match self.limiter.check(category).await {
            Decision::Allowed { .. } => Ok(()),
            Decision::Limited { retry_after, .. } => Err(RxError::RateLimited {
                category: category.to_string(),
                retry_after,
            }),
        }
    }

    async fn emit_audit(&self, call: &Call<'_>, details: Value) {
        let mut record = AuditRecord::new(
            call.action,
            call.audit_category,
            call.actor,
            self.clock.now_utc(),
        )
        .with_details(details);
        if let Some(resource_id) = call.resource_id {
            record = record.with_resource(resource_id);
        }

        // Fire-and-forget: audit failure never fails the operation
        if let Err(err) = self.audit.record(record).await {
            tracing::warn!(error = %err, "audit sink failed");
        }
    }
}

impl std::fmt::Debug for ClientCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCore").finish_non_exhaustive()
    }
}

/// Map a non-2xx response to a typed upstream error
///
/// The upstream message is pulled from the FHIR OperationOutcome body when
/// one is present.
fn ensure_success(response: ApiResponse) -> Result<Value> {
    if response.is_success() {
        return Ok(response.body);
    }

    let message = serde_json::from_value::<OperationOutcome>(response.body.clone())
        .ok()
        .and_then(|o| o.message().map(str::to_string))
        .unwrap_or_else(|| "upstream error".to_string());

    Err(RxError::Upstream {
        status: response.status,
        message,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::auth::{TokenGrant, TokenProvider};
    use crate::clock::MockClock;
    use crate::limit::{InMemoryWindowStore, RateLimiterConfig};
    use crate::transport::{HttpMethod, MockTransport};
    use async_trait::async_trait;
    use std::time::Duration;

    pub(crate) struct StaticTokenProvider;

    #[async_trait]
    impl TokenProvider for StaticTokenProvider {
        async fn exchange(&self) -> Result<TokenGrant> {
            Ok(TokenGrant {
                access_token: "test-token".to_string(),
                expires_in: Duration::from_secs(600),
                scopes: Vec::new(),
            })
        }
    }

    pub(crate) struct CoreHarness {
        pub core: Arc<ClientCore>,
        pub transport: Arc<MockTransport>,
        pub audit: Arc<MemoryAuditSink>,
        pub clock: Arc<MockClock>,
    }

    pub(crate) fn core_harness(ceiling: u64) -> CoreHarness {
        let clock = Arc::new(MockClock::new());
        let transport = Arc::new(MockTransport::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let limiter = Arc::new(RateLimiter::with_config(
            RateLimiterConfig::default().with_ceiling(ceiling),
            Arc::new(InMemoryWindowStore::new()),
            clock.clone(),
        ));
        let cache = Arc::new(ResponseCache::new(clock.clone()));
        let tokens = TokenCache::new(Arc::new(StaticTokenProvider), clock.clone());

        let core = Arc::new(ClientCore::new(
            transport.clone(),
            tokens,
            limiter,
            cache,
            audit.clone(),
            clock.clone(),
        ));

        CoreHarness {
            core,
            transport,
            audit,
            clock,
        }
    }

    fn call<'a>() -> Call<'a> {
        Call {
            category: "pds",
            action: AuditAction::PatientLookup,
            audit_category: AuditCategory::Patient,
            actor: "tester",
            resource_id: Some("9434765870"),
        }
    }

    #[tokio::test]
    async fn test_get_attaches_bearer_and_audits() {
        let h = core_harness(10);
        h.transport
            .on(HttpMethod::Get, "/Patient/9434765870", json!({"id": "p"}));

        let body = h
            .core
            .get_json(call(), "/Patient/9434765870", Vec::new(), true)
            .await
            .unwrap();
        assert_eq!(body["id"], "p");

        let requests = h.transport.requests();
        assert_eq!(requests[0].bearer.as_deref(), Some("test-token"));

        let records = h.audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].details["cached"], false);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_transport_but_still_audits() {
        let h = core_harness(10);
        h.transport
            .on(HttpMethod::Get, "/Patient/9434765870", json!({"id": "p"}));

        h.core
            .get_json(call(), "/Patient/9434765870", Vec::new(), true)
            .await
            .unwrap();
        h.core
            .get_json(call(), "/Patient/9434765870", Vec::new(), true)
            .await
            .unwrap();

        assert_eq!(h.transport.call_count(), 1);
        assert_eq!(h.audit.len(), 2);
        assert_eq!(h.audit.records()[1].details["cached"], true);
    }

    #[tokio::test]
    async fn test_rate_limited_call_never_reaches_transport() {
        let h = core_harness(1);
        h.transport
            .on(HttpMethod::Get, "/Patient/9434765870", json!({"id": "p"}));

        h.core
            .get_json(call(), "/Patient/9434765870", Vec::new(), false)
            .await
            .unwrap();

        match h
            .core
            .get_json(call(), "/Patient/9434765870", Vec::new(), false)
            .await
        {
            Err(RxError::RateLimited { category, .. }) => assert_eq!(category, "pds"),
            other => panic!("expected RateLimited, got {:?}", other),
        }

        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_upstream_error_carries_outcome_message() {
        let h = core_harness(10);
        h.transport.on_status(
            HttpMethod::Get,
            "/Patient/9434765870",
            400,
            json!({
                "resourceType": "OperationOutcome",
                "issue": [{"severity": "error", "code": "invalid", "diagnostics": "Bad search"}]
            }),
        );

        match h
            .core
            .get_json(call(), "/Patient/9434765870", Vec::new(), false)
            .await
        {
            Err(RxError::Upstream { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad search");
            }
            other => panic!("expected Upstream, got {:?}", other),
        }
    }
}
