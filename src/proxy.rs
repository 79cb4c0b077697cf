use crate::config::ProxyConfig;
use crate::error::Result;
use crate::logging::{Outcome, RequestRecord, SharedLogger};
use crate::translate::nim_types::UpstreamPayload;
use crate::translate::response::upstream_error;

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Raw upstream bytes, relayed to the caller chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send>>;

/// Successful non-streaming reply: the upstream's status and its body, untouched.
#[derive(Debug, Clone)]
pub struct UnaryReply {
    pub status: u16,
    pub body: Bytes,
}

/// Successful streaming reply. Dropping `chunks` releases the upstream connection.
pub struct StreamReply {
    pub status: u16,
    pub chunks: ByteStream,
}

/// Build the shared upstream client from config.
pub fn build_client(config: &ProxyConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.upstream.connect_timeout_secs));
    if let Some(secs) = config.upstream.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

/// Send the payload upstream. Anything but a 2xx answer becomes an error
/// carrying the upstream status and its declared message.
async fn dispatch(
    payload: &UpstreamPayload,
    config: &ProxyConfig,
    client: &reqwest::Client,
) -> Result<reqwest::Response> {
    let api_key = config.require_api_key()?;
    let url = config.upstream_url("chat/completions");
    let accept = if payload.is_streaming() {
        "text/event-stream"
    } else {
        "application/json"
    };

    debug!(url = %url, model = %payload.model, stream = %payload.stream, "dispatching upstream");

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .header("Accept", accept)
        .json(payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        warn!(
            status = status.as_u16(),
            body = %String::from_utf8_lossy(truncate(&body, 500)),
            "upstream returned an error"
        );
        return Err(upstream_error(status.as_u16(), &body));
    }

    Ok(response)
}

/// Forward a non-streaming request and return the upstream body verbatim.
pub async fn proxy_non_streaming(
    payload: &UpstreamPayload,
    config: &ProxyConfig,
    client: &reqwest::Client,
) -> Result<UnaryReply> {
    let response = dispatch(payload, config, client).await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?;

    debug!(status, body_len = body.len(), "upstream response received");

    Ok(UnaryReply { status, body })
}

/// Forward a streaming request. The returned stream yields upstream chunks in
/// arrival order, unmodified. `record` is completed and journaled when the
/// relay ends, however it ends.
pub async fn proxy_streaming(
    payload: &UpstreamPayload,
    config: &ProxyConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
    record: RequestRecord,
) -> Result<StreamReply> {
    let started = Instant::now();
    let response = dispatch(payload, config, client).await?;
    let status = response.status().as_u16();

    info!(request_id = %record.request_id, status, "stream relay started");

    let guard = RelayGuard {
        logger: logger.clone(),
        record: Some(record),
        started,
        status,
        chunks: 0,
        bytes: 0,
        outcome: Outcome::Aborted,
        error: None,
    };

    Ok(StreamReply {
        status,
        chunks: Box::pin(relay_stream(response.bytes_stream(), guard)),
    })
}

/// Move chunks from upstream to caller one at a time. If the consumer stops
/// polling and drops the stream, the upstream body and the guard go with it.
fn relay_stream(
    upstream: impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
    mut guard: RelayGuard,
) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + 'static {
    async_stream::stream! {
        tokio::pin!(upstream);

        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => {
                    guard.chunks += 1;
                    guard.bytes += bytes.len() as u64;
                    yield Ok(bytes);
                }
                Err(e) => {
                    // Headers are already committed; all we can do is end the stream.
                    warn!(error = %e, "upstream stream failed mid-relay");
                    guard.error = Some(e.to_string());
                    break;
                }
            }
        }

        if guard.error.is_none() {
            guard.outcome = Outcome::Completed;
        }
    }
}

/// Journals the stream's fate on drop: normal end, upstream failure, or the
/// caller going away.
struct RelayGuard {
    logger: SharedLogger,
    record: Option<RequestRecord>,
    started: Instant,
    status: u16,
    chunks: u64,
    bytes: u64,
    outcome: Outcome,
    error: Option<String>,
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        record = record
            .bytes(self.bytes)
            .finish(self.status, self.outcome.clone(), self.started);
        if let Some(error) = self.error.take() {
            record = record.error(error);
        }

        info!(
            request_id = %record.request_id,
            chunks = self.chunks,
            bytes = self.bytes,
            outcome = ?record.outcome,
            duration_ms = record.duration_ms,
            "stream relay ended"
        );

        self.logger.record(record);
    }
}

fn truncate(b: &[u8], max: usize) -> &[u8] {
    if b.len() <= max {
        b
    } else {
        &b[..max]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(logger: &SharedLogger) -> RelayGuard {
        RelayGuard {
            logger: logger.clone(),
            record: Some(RequestRecord::new("req-1", "/v1/chat/completions").stream(true)),
            started: Instant::now(),
            status: 200,
            chunks: 0,
            bytes: 0,
            outcome: Outcome::Aborted,
            error: None,
        }
    }

    fn chunks(parts: &[&'static str]) -> Vec<std::result::Result<Bytes, reqwest::Error>> {
        parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect()
    }

    #[tokio::test]
    async fn test_relay_preserves_chunks_in_order() {
        let logger = SharedLogger::in_memory();
        let parts = ["data: {\"a\":1}\n\n", "data: {\"b\"", ":2}\n\n", "data: [DONE]\n\n"];
        let upstream = futures::stream::iter(chunks(&parts));

        let relayed: Vec<Bytes> = relay_stream(upstream, guard(&logger))
            .map(|r| r.unwrap())
            .collect()
            .await;

        let expected: Vec<Bytes> = parts.iter().map(|p| Bytes::from_static(p.as_bytes())).collect();
        assert_eq!(relayed, expected);

        let records = logger.recent(1);
        assert_eq!(records[0].outcome, Outcome::Completed);
        assert_eq!(records[0].bytes, parts.iter().map(|p| p.len() as u64).sum::<u64>());
    }

    #[tokio::test]
    async fn test_dropped_relay_is_journaled_as_aborted() {
        let logger = SharedLogger::in_memory();
        let upstream = futures::stream::iter(chunks(&["one", "two", "three"]));

        let mut relay = Box::pin(relay_stream(upstream, guard(&logger)));
        let first = relay.next().await.unwrap().unwrap();
        assert_eq!(first, Bytes::from_static(b"one"));
        drop(relay);

        let records = logger.recent(1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, Outcome::Aborted);
        assert_eq!(records[0].bytes, 3);
    }

    #[test]
    fn test_build_client_with_timeout() {
        let mut config = ProxyConfig::default();
        config.upstream.timeout_secs = Some(5);
        assert!(build_client(&config).is_ok());
    }
}
