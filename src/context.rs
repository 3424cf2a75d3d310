use serde_json::{json, Map, Value};
use tokio::time::Instant;
use uuid::Uuid;

/// Header carrying the caller-supplied correlation id, and echoed back on
/// the response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation metadata for one in-flight request.
///
/// Created once at request entry and owned by that request until it
/// completes. The `request_id` never changes after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    request_id: String,
    start: Instant,
}

impl RequestContext {
    /// Reuse `inbound` as the request id when it is present and non-empty,
    /// otherwise generate a UUID v4.
    pub fn create(inbound: Option<&str>) -> Self {
        let request_id = match inbound.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        Self::with_start(request_id, Instant::now())
    }

    pub fn with_start(request_id: impl Into<String>, start: Instant) -> Self {
        Self {
            request_id: request_id.into(),
            start,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    /// Milliseconds elapsed since `start` on the monotonic clock.
    pub fn elapsed_ms(&self) -> u64 {
        let millis = self.start.elapsed().as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }

    /// Metadata merged into every record this request emits.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("requestId".to_string(), json!(self.request_id));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn generated_id_is_uuid_v4() {
        let ctx = RequestContext::create(None);
        let parsed = Uuid::parse_str(ctx.request_id()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn inbound_id_is_reused() {
        let ctx = RequestContext::create(Some("abc-123"));
        assert_eq!(ctx.request_id(), "abc-123");
    }

    #[test]
    fn blank_inbound_id_is_treated_as_absent() {
        let ctx = RequestContext::create(Some("   "));
        assert!(Uuid::parse_str(ctx.request_id()).is_ok());
    }

    #[test]
    fn metadata_carries_request_id() {
        let ctx = RequestContext::create(Some("r1"));
        assert_eq!(ctx.metadata()["requestId"], json!("r1"));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_uses_monotonic_clock() {
        let ctx = RequestContext::create(None);
        tokio::time::advance(Duration::from_millis(7)).await;
        assert_eq!(ctx.elapsed_ms(), 7);
    }
}
