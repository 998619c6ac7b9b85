use crate::app_state::AppPaths;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Stable wire code attached to job-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
  InvalidRequest,
  ConnectFail,
  Timeout,
  AuthExpired,
  Http4xx,
  Http5xx,
  ExportFail,
  Unknown,
}

impl ErrorCode {
  pub fn is_retryable(&self) -> bool {
    matches!(self, ErrorCode::ConnectFail | ErrorCode::Timeout | ErrorCode::Http5xx)
  }
}

/// Why an extraction job failed. Converted into the error response shape
/// (and an `error` progress event) at the submission boundary.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
  #[error("cookie is missing or empty")]
  EmptyCookie,
  #[error("failed to reach the reading service: {0}")]
  UpstreamUnreachable(String),
  #[error("request to the reading service timed out")]
  UpstreamTimeout,
  #[error("reading service returned HTTP {status}")]
  UpstreamStatus { status: u16, body: Option<String> },
  #[error("could not fetch the book list, the cookie may have expired")]
  BookListUnavailable,
  #[error("failed to write export files: {0}")]
  Export(#[source] std::io::Error),
  #[error(transparent)]
  Other(#[from] anyhow::Error),
}

impl ExtractError {
  pub fn code(&self) -> ErrorCode {
    match self {
      ExtractError::EmptyCookie => ErrorCode::InvalidRequest,
      ExtractError::UpstreamUnreachable(_) => ErrorCode::ConnectFail,
      ExtractError::UpstreamTimeout => ErrorCode::Timeout,
      ExtractError::UpstreamStatus { status, .. } if (400..500).contains(status) => ErrorCode::Http4xx,
      ExtractError::UpstreamStatus { status, .. } if (500..600).contains(status) => ErrorCode::Http5xx,
      ExtractError::UpstreamStatus { .. } => ErrorCode::Unknown,
      ExtractError::BookListUnavailable => ErrorCode::AuthExpired,
      ExtractError::Export(_) => ErrorCode::ExportFail,
      ExtractError::Other(_) => ErrorCode::Unknown,
    }
  }

  /// Diagnostic payload for the response's expandable details panel.
  pub fn details(&self) -> Option<String> {
    match self {
      ExtractError::UpstreamStatus { body: Some(body), .. } => Some(body.clone()),
      ExtractError::Export(source) => Some(source.to_string()),
      ExtractError::Other(err) => Some(format!("{err:#}")),
      _ => None,
    }
  }

  pub fn from_reqwest(err: &reqwest::Error) -> Self {
    if err.is_timeout() {
      ExtractError::UpstreamTimeout
    } else {
      ExtractError::UpstreamUnreachable(err.to_string())
    }
  }
}

pub fn init_tracing(paths: &AppPaths) -> anyhow::Result<()> {
  // Rotate daily; keep logs under the data dir so they are easy to find.
  let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, "shelfpull.jsonl");
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
  let _ = LOG_GUARD.set(guard);

  let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,reqwest=warn,hyper=warn"));

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(non_blocking)
    .json()
    .with_current_span(true)
    .with_span_list(true)
    .init();

  Ok(())
}

/// Terminal-friendly logging for the `extract` subcommand: progress lines go
/// to stdout, diagnostics to stderr.
pub fn init_client_tracing() {
  let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr)
    .init();
}
