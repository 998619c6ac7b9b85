//! Reference client: opens the progress channel, folds events into a
//! [`ProgressModel`], submits the job, and resolves the terminal outcome.
//!
//! Two independent listeners feed one shared model: the channel listener
//! drives the live progress log, the submission future decides the terminal
//! panel. Neither overwrites the other's state; the log survives whatever
//! the submission returns.

pub mod outcome;
pub mod progress;

use crate::events::ServerMessage;
use crate::model::ExtractReply;
use anyhow::{bail, Context};
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use outcome::Outcome;
use progress::ProgressModel;

/// How long to wait for the `Hello { sid }` frame after the upgrade.
const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ClientOptions {
  /// Server base, e.g. `http://127.0.0.1:8930`.
  pub server: String,
  pub cookie: String,
}

/// One-job-at-a-time guard for the submission trigger. Mirrors a disabled
/// submit button: `try_begin` fails while a run is in flight, and `release`
/// must run on every exit path.
#[derive(Default)]
pub struct SubmitTrigger {
  busy: AtomicBool,
}

impl SubmitTrigger {
  pub fn try_begin(&self) -> bool {
    self
      .busy
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  pub fn release(&self) {
    self.busy.store(false, Ordering::Release);
  }

  pub fn is_busy(&self) -> bool {
    self.busy.load(Ordering::Acquire)
  }
}

pub async fn run_extract(opts: ClientOptions) -> anyhow::Result<()> {
  let model = Arc::new(Mutex::new(ProgressModel::new()));
  let trigger = SubmitTrigger::default();

  let ws_url = ws_endpoint(&opts.server)?;
  let (ws_stream, _response) = connect_async(ws_url.as_str())
    .await
    .with_context(|| format!("failed to open progress channel at {ws_url}"))?;
  let (_sink, mut stream) = ws_stream.split();

  println!("{}", model.lock().connection_opened());

  // The first frame is always the hello carrying our session id.
  let sid = tokio::time::timeout(HELLO_TIMEOUT, async {
    while let Some(frame) = stream.next().await {
      if let Ok(Message::Text(text)) = frame {
        if let Ok(ServerMessage::Hello { sid }) = serde_json::from_str::<ServerMessage>(&text) {
          return Some(sid);
        }
      }
    }
    None
  })
  .await
  .context("timed out waiting for a session id")?
  .context("progress channel closed before a session id arrived")?;

  tracing::debug!(%sid, "session established");

  // Channel listener: folds events in arrival order and streams log lines.
  let listener_model = model.clone();
  let listener = tokio::spawn(async move {
    while let Some(frame) = stream.next().await {
      match frame {
        Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
          Ok(ServerMessage::Progress(event)) => {
            for line in listener_model.lock().apply(&event) {
              println!("{line}");
            }
          }
          Ok(ServerMessage::Hello { .. }) => {}
          Err(e) => {
            tracing::warn!(error = %e, raw = %text, "unparseable progress frame");
          }
        },
        Ok(Message::Close(_)) | Err(_) => {
          println!("{}", listener_model.lock().connection_lost());
          break;
        }
        Ok(_) => {}
      }
    }
  });

  let opening_line = begin_submission(&mut model.lock(), &trigger)?;
  println!("{opening_line}");

  let reply = submit_job(&opts.server, &opts.cookie, &sid).await;
  let outcome = outcome::resolve(reply, &mut model.lock());

  // Guaranteed cleanup: the trigger is usable again whatever happened.
  trigger.release();

  listener.abort();
  render_outcome(&opts.server, &outcome);

  match outcome {
    Outcome::Success { .. } => Ok(()),
    Outcome::Failed { message, .. } => bail!(message),
  }
}

/// Gate one submission: refuse while the channel is down or another run is
/// in flight, and only after both checks pass clear per-run state. A
/// rejected submission issues no network call and leaves the model as-is.
fn begin_submission(model: &mut ProgressModel, trigger: &SubmitTrigger) -> anyhow::Result<String> {
  if !model.is_connected() {
    bail!("not connected to the server, refusing to submit");
  }
  if !trigger.try_begin() {
    bail!("a job is already in flight");
  }
  model.reset();
  Ok(model.push_log("Starting extraction..."))
}

async fn submit_job(server: &str, cookie: &str, sid: &str) -> Result<ExtractReply, reqwest::Error> {
  let client = reqwest::Client::new();
  let resp = client
    .post(format!("{server}/extract"))
    .form(&[("cookie", cookie), ("sid", sid)])
    .send()
    .await?;
  resp.json::<ExtractReply>().await
}

fn render_outcome(server: &str, outcome: &Outcome) {
  match outcome {
    Outcome::Success { excel_url, json_url } => {
      println!();
      println!("Export ready:");
      println!("  spreadsheet: {server}{excel_url}");
      println!("  json:        {server}{json_url}");
    }
    Outcome::Failed { message, details } => {
      println!();
      println!("Failed: {message}");
      if let Some(details) = details {
        println!("Details:");
        for line in details.lines() {
          println!("  {line}");
        }
      }
    }
  }
}

/// Turn the HTTP base into the matching WebSocket endpoint.
fn ws_endpoint(server: &str) -> anyhow::Result<String> {
  let trimmed = server.trim_end_matches('/');
  if let Some(rest) = trimmed.strip_prefix("https://") {
    Ok(format!("wss://{rest}/ws"))
  } else if let Some(rest) = trimmed.strip_prefix("http://") {
    Ok(format!("ws://{rest}/ws"))
  } else {
    bail!("server url must start with http:// or https://: {server}");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ws_endpoint_maps_schemes() {
    assert_eq!(ws_endpoint("http://127.0.0.1:8930").unwrap(), "ws://127.0.0.1:8930/ws");
    assert_eq!(ws_endpoint("https://host/").unwrap(), "wss://host/ws");
    assert!(ws_endpoint("ftp://host").is_err());
  }

  #[test]
  fn disconnected_channel_rejects_submission_without_clearing_state() {
    let mut model = ProgressModel::new();
    model.connection_opened();
    model.apply(&crate::events::ProgressEvent::processing(2, 5, "Dune"));
    model.connection_lost();
    let log_before = model.log().to_vec();
    let percent_before = model.percent;

    let trigger = SubmitTrigger::default();
    assert!(begin_submission(&mut model, &trigger).is_err());

    // Nothing was reset and the trigger was never taken.
    assert_eq!(model.log(), log_before.as_slice());
    assert_eq!(model.percent, percent_before);
    assert_eq!(model.book_counter_display(), "2/5");
    assert!(!trigger.is_busy());
  }

  #[test]
  fn in_flight_run_rejects_a_second_submission_without_clearing_state() {
    let mut model = ProgressModel::new();
    model.connection_opened();
    model.apply(&crate::events::ProgressEvent::fetching_books("Fetching book list..."));
    let log_before = model.log().to_vec();

    let trigger = SubmitTrigger::default();
    assert!(trigger.try_begin());
    assert!(begin_submission(&mut model, &trigger).is_err());
    assert_eq!(model.log(), log_before.as_slice());

    trigger.release();
    let line = begin_submission(&mut model, &trigger).unwrap();
    assert_eq!(model.log(), [line.clone()]);
    assert!(trigger.is_busy());
  }

  #[test]
  fn trigger_blocks_concurrent_submissions_until_released() {
    let trigger = SubmitTrigger::default();
    assert!(trigger.try_begin());
    assert!(trigger.is_busy());
    assert!(!trigger.try_begin());

    trigger.release();
    assert!(!trigger.is_busy());
    assert!(trigger.try_begin());
  }
}
