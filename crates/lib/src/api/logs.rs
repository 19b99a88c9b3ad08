//! Newline-delimited JSON log stream.
//!
//! The subscription counts as connected as soon as the response headers
//! arrive; events are then decoded one line at a time from the body.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use reqwest::header::AUTHORIZATION;
use tracing::debug;

use super::types::LogEvent;
use super::{ApiError, LogStream, LogSubscription, authorization_header};
use crate::config::PushConfig;

/// Log stream served at `{logging_endpoint}/apps/:guid/stream`.
#[derive(Debug, Clone)]
pub struct HttpLogStream {
  http: reqwest::Client,
  base_url: String,
  authorization: String,
}

impl HttpLogStream {
  pub fn new(config: &PushConfig) -> Result<Self, ApiError> {
    let http = reqwest::Client::builder()
      .danger_accept_invalid_certs(config.skip_ssl_validation)
      .build()
      .map_err(|e| ApiError::Transport {
        url: config.logging_endpoint.clone(),
        source: e,
      })?;

    Ok(Self {
      http,
      base_url: config.logging_endpoint.clone(),
      authorization: authorization_header(&config.access_token),
    })
  }
}

#[async_trait]
impl LogStream for HttpLogStream {
  async fn subscribe(&self, app_guid: &str) -> Result<LogSubscription, ApiError> {
    let url = format!("{}/apps/{}/stream", self.base_url, app_guid);
    debug!(%url, "subscribing to logs");

    let response = self
      .http
      .get(&url)
      .header(AUTHORIZATION, &self.authorization)
      .send()
      .await
      .map_err(|e| ApiError::Transport {
        url: url.clone(),
        source: e,
      })?;

    let status = response.status();
    if !status.is_success() {
      return Err(ApiError::Http {
        status: status.as_u16(),
        code: 0,
        error_code: String::new(),
        description: format!("log stream rejected: {}", status),
      });
    }

    let chunks: BoxStream<'static, Result<Vec<u8>, reqwest::Error>> =
      response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())).boxed();

    Ok(decode_events(chunks, url))
  }
}

/// Splits a byte stream into lines.
#[derive(Debug, Default)]
struct LineBuffer {
  buf: Vec<u8>,
}

impl LineBuffer {
  fn push(&mut self, chunk: &[u8]) {
    self.buf.extend_from_slice(chunk);
  }

  /// Next complete, non-blank line.
  fn next_line(&mut self) -> Option<Vec<u8>> {
    while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
      let line: Vec<u8> = self.buf.drain(..=pos).collect();
      let line = trim_line(&line);
      if !line.is_empty() {
        return Some(line.to_vec());
      }
    }
    None
  }

  /// Whatever is left once the stream has ended.
  fn finish(&mut self) -> Option<Vec<u8>> {
    let rest = std::mem::take(&mut self.buf);
    let rest = trim_line(&rest);
    (!rest.is_empty()).then(|| rest.to_vec())
  }
}

fn trim_line(line: &[u8]) -> &[u8] {
  let end = line
    .iter()
    .rposition(|b| !b.is_ascii_whitespace())
    .map_or(0, |p| p + 1);
  &line[..end]
}

struct DecodeState {
  chunks: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
  lines: LineBuffer,
  url: String,
  ended: bool,
}

fn decode_events(chunks: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>, url: String) -> LogSubscription {
  let state = DecodeState {
    chunks,
    lines: LineBuffer::default(),
    url,
    ended: false,
  };

  stream::unfold(state, |mut state| async move {
    loop {
      if let Some(line) = state.lines.next_line() {
        let event = parse_event(&line, &state.url);
        return Some((event, state));
      }

      if state.ended {
        let line = state.lines.finish()?;
        let event = parse_event(&line, &state.url);
        return Some((event, state));
      }

      match state.chunks.next().await {
        Some(Ok(chunk)) => state.lines.push(&chunk),
        Some(Err(e)) => {
          state.ended = true;
          state.lines = LineBuffer::default();
          let err = ApiError::Transport {
            url: state.url.clone(),
            source: e,
          };
          return Some((Err(err), state));
        }
        None => state.ended = true,
      }
    }
  })
  .boxed()
}

fn parse_event(line: &[u8], url: &str) -> Result<LogEvent, ApiError> {
  serde_json::from_slice(line).map_err(|e| ApiError::Decode {
    url: url.to_string(),
    source: e,
  })
}
