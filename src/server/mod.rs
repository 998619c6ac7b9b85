//! HTTP surface: the progress channel, job submission, artifact download.

pub mod retention;

use crate::{
  app_state::AppState,
  error::ErrorCode,
  events::ServerMessage,
  model::{ArtifactFiles, ExportBundle, ExtractRequest, ExtractResponse, JobSpec},
  session::SessionRegistry,
};
use axum::{
  extract::{
    ws::{Message, WebSocket, WebSocketUpgrade},
    Query, State,
  },
  http::{header, HeaderMap, StatusCode},
  response::{IntoResponse, Response},
  routing::{get, post},
  Form, Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;

/// Used for upstream calls when the submitter sends no User-Agent.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/ws", get(ws_handler))
    .route("/extract", post(post_extract))
    .route("/download", get(get_download))
    .route("/healthz", get(get_healthz))
    .layer(CorsLayer::permissive())
    .with_state(state)
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
  let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port).parse()?;
  tracing::info!(%addr, "starting shelfpull server");

  retention::spawn_retention_sweeper(
    state.paths.output_dir.clone(),
    std::time::Duration::from_secs(state.config.retention_hours * 3600),
  );

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, router(state)).await?;
  Ok(())
}

/// Upgrade to the progress channel. The session id minted here is only
/// valid while this socket stays open.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
  ws.on_upgrade(move |socket| handle_socket(socket, state.sessions.clone()))
}

async fn handle_socket(mut socket: WebSocket, sessions: SessionRegistry) {
  let (sid, mut rx) = sessions.register();
  tracing::info!(%sid, "progress channel connected");

  // Connection establishment: the hello frame carries the session id and
  // must arrive before any progress frame.
  let hello = match serde_json::to_string(&ServerMessage::Hello { sid: sid.clone() }) {
    Ok(frame) => frame,
    Err(e) => {
      tracing::error!(%sid, error = %e, "hello frame unserializable");
      sessions.remove(&sid);
      return;
    }
  };
  if socket.send(Message::Text(hello)).await.is_err() {
    sessions.remove(&sid);
    return;
  }

  let (mut sink, mut stream) = socket.split();

  loop {
    tokio::select! {
      maybe_event = rx.recv() => {
        let Some(event) = maybe_event else { break };
        let frame = match serde_json::to_string(&ServerMessage::Progress(event)) {
          Ok(frame) => frame,
          Err(e) => {
            tracing::warn!(%sid, error = %e, "skipping unserializable event");
            continue;
          }
        };
        if sink.send(Message::Text(frame)).await.is_err() {
          break;
        }
      }
      inbound = stream.next() => {
        match inbound {
          Some(Ok(Message::Close(_))) | None => break,
          Some(Ok(_)) => {
            // The channel is server-push only; inbound frames are ignored.
          }
          Some(Err(e)) => {
            tracing::debug!(%sid, error = %e, "progress channel receive error");
            break;
          }
        }
      }
    }
  }

  // From here the sid is stale: submissions naming it route to nowhere.
  sessions.remove(&sid);
  tracing::info!(%sid, "progress channel closed");
}

async fn post_extract(
  State(state): State<AppState>,
  headers: HeaderMap,
  Form(req): Form<ExtractRequest>,
) -> Response {
  if req.cookie.trim().is_empty() {
    return error_response(
      StatusCode::BAD_REQUEST,
      "Please provide a valid cookie",
      Some(ErrorCode::InvalidRequest),
      None,
    );
  }

  let user_agent = headers
    .get(header::USER_AGENT)
    .and_then(|v| v.to_str().ok())
    .filter(|ua| !ua.is_empty())
    .unwrap_or(DEFAULT_USER_AGENT)
    .to_string();

  let sink = state.sessions.sink(&req.sid);
  let spec = JobSpec {
    cookie: req.cookie,
    user_agent,
  };

  match state.engine.extract(spec, sink).await {
    Ok(bundle) => Json(ExtractResponse::Success {
      message: "Export complete".to_string(),
      files: download_urls(&bundle),
    })
    .into_response(),
    Err(e) => {
      let status = match e.code() {
        ErrorCode::InvalidRequest | ErrorCode::AuthExpired | ErrorCode::Http4xx => {
          StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      };
      error_response(status, &e.to_string(), Some(e.code()), e.details())
    }
  }
}

fn error_response(
  status: StatusCode,
  message: &str,
  code: Option<ErrorCode>,
  details: Option<String>,
) -> Response {
  (
    status,
    Json(ExtractResponse::Error {
      message: message.to_string(),
      code,
      details,
    }),
  )
    .into_response()
}

fn download_urls(bundle: &ExportBundle) -> ArtifactFiles {
  ArtifactFiles {
    excel: format!("/download?file={}&dir={}", bundle.spreadsheet_file, bundle.dir_name),
    json: format!("/download?file={}&dir={}", bundle.json_file, bundle.dir_name),
  }
}

#[derive(serde::Deserialize)]
struct DownloadQuery {
  file: String,
  dir: String,
}

async fn get_download(State(state): State<AppState>, Query(q): Query<DownloadQuery>) -> Response {
  if q.file.is_empty() || q.dir.is_empty() {
    return error_response(StatusCode::BAD_REQUEST, "invalid download parameters", None, None);
  }
  // Artifacts live exactly one directory below the output root.
  if q.dir.contains(['/', '\\']) || q.dir.contains("..") {
    return error_response(StatusCode::BAD_REQUEST, "invalid directory parameter", None, None);
  }
  let filename = sanitize_filename::sanitize(&q.file);

  let path = state.paths.output_dir.join(&q.dir).join(&filename);
  match tokio::fs::read(&path).await {
    Ok(bytes) => {
      let mime = mime_guess::from_path(&filename).first_or_octet_stream();
      (
        [
          (header::CONTENT_TYPE, mime.essence_str().to_string()),
          (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
          ),
        ],
        bytes,
      )
        .into_response()
    }
    Err(_) => error_response(StatusCode::NOT_FOUND, "file not found", None, None),
  }
}

async fn get_healthz(State(state): State<AppState>) -> Response {
  Json(serde_json::json!({
    "status": "ok",
    "sessions": state.sessions.len(),
  }))
  .into_response()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn download_urls_point_into_the_job_dir() {
    let bundle = ExportBundle {
      dir_name: "job-abc".into(),
      spreadsheet_file: "reading_notes_1.csv".into(),
      json_file: "reading_notes_1.json".into(),
    };
    let files = download_urls(&bundle);
    assert_eq!(files.excel, "/download?file=reading_notes_1.csv&dir=job-abc");
    assert_eq!(files.json, "/download?file=reading_notes_1.json&dir=job-abc");
  }
}
