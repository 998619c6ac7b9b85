//! Cumulative progress state, folded one event at a time.
//!
//! This is not a strict automaton: each event overwrites a visible subset of
//! the fields and appends at most one log line, and rendering reflects the
//! union of everything folded so far. Counter and title set by a
//! `processing` event persist across later `processing_detail` events until
//! the next `processing` event overwrites them.

use crate::events::{ProgressEvent, ProgressPhase};

const PLACEHOLDER_TITLE: &str = "Waiting to start...";
const FALLBACK_TITLE: &str = "Unknown title";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
  Connected,
  Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressModel {
  connection: ConnectionStatus,
  /// Last-seen status kind, including `Unknown`.
  pub phase: Option<ProgressPhase>,
  pub status_message: String,
  pub percent: u8,
  /// (current, total) book counter.
  pub book_counter: (u32, u32),
  pub current_book_title: String,
  log: Vec<String>,
}

impl Default for ProgressModel {
  fn default() -> Self {
    Self {
      connection: ConnectionStatus::Disconnected,
      phase: None,
      status_message: String::new(),
      percent: 0,
      book_counter: (0, 0),
      current_book_title: PLACEHOLDER_TITLE.to_string(),
      log: Vec::new(),
    }
  }
}

impl ProgressModel {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fold one event into the model. Returns the log lines this event
  /// appended so a renderer can stream them; scalar updates are idempotent,
  /// the log is not. Never panics, whatever the event carries.
  pub fn apply(&mut self, event: &ProgressEvent) -> Vec<String> {
    // Message and percent apply regardless of the status kind.
    if let Some(message) = &event.message {
      self.status_message = message.clone();
    }
    if let Some(percent) = event.percent {
      self.percent = percent.clamp(0.0, 100.0).round() as u8;
    }
    self.phase = Some(event.status);

    let line = match event.status {
      ProgressPhase::Connecting => Some("Connecting to the reading service...".to_string()),
      ProgressPhase::FetchingBooks => Some("Fetching book list...".to_string()),
      ProgressPhase::StartProcessing => {
        if let Some(total) = event.total_books {
          self.book_counter = (0, total);
        } else {
          self.book_counter.0 = 0;
        }
        Some(format!(
          "Found {} books, starting processing...",
          self.book_counter.1
        ))
      }
      ProgressPhase::Processing => {
        if let Some(current) = event.current_book {
          self.book_counter.0 = current;
        }
        if let Some(total) = event.total_books {
          self.book_counter.1 = total;
        }
        self.current_book_title = event
          .book_title
          .clone()
          .filter(|t| !t.is_empty())
          .unwrap_or_else(|| FALLBACK_TITLE.to_string());
        Some(format!("Processing: \u{201c}{}\u{201d}", self.current_book_title))
      }
      ProgressPhase::ProcessingDetail => {
        Some(format!("  \u{2514}\u{2500} {}", event.message.as_deref().unwrap_or_default()))
      }
      ProgressPhase::Exporting => Some("Exporting data...".to_string()),
      ProgressPhase::Completed => Some("Processing complete, files are ready.".to_string()),
      ProgressPhase::Error => Some(format!(
        "Error: {}",
        event.message.as_deref().unwrap_or("unknown error")
      )),
      // Forward compatibility: an unrecognized status still updated
      // message/percent above but contributes no log line.
      ProgressPhase::Unknown => None,
    };

    match line {
      Some(line) => {
        self.log.push(line.clone());
        vec![line]
      }
      None => Vec::new(),
    }
  }

  pub fn connection_opened(&mut self) -> String {
    self.connection = ConnectionStatus::Connected;
    let line = "Connected to server".to_string();
    self.log.push(line.clone());
    line
  }

  pub fn connection_lost(&mut self) -> String {
    self.connection = ConnectionStatus::Disconnected;
    let line = "Connection to server lost".to_string();
    self.log.push(line.clone());
    line
  }

  pub fn is_connected(&self) -> bool {
    self.connection == ConnectionStatus::Connected
  }

  /// Clear per-run state. Called exactly once at submission start; the
  /// connection status is not per-run and survives.
  pub fn reset(&mut self) {
    let connection = self.connection;
    *self = Self::default();
    self.connection = connection;
  }

  /// Append a line that did not come from the event stream (e.g. the
  /// transport failure of the submission call).
  pub fn push_log(&mut self, line: impl Into<String>) -> String {
    let line = line.into();
    self.log.push(line.clone());
    line
  }

  pub fn log(&self) -> &[String] {
    &self.log
  }

  pub fn book_counter_display(&self) -> String {
    format!("{}/{}", self.book_counter.0, self.book_counter.1)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::events::ProgressEvent;

  fn event(json: &str) -> ProgressEvent {
    serde_json::from_str(json).expect("test event json")
  }

  #[test]
  fn percent_updates_only_when_present() {
    let mut model = ProgressModel::new();
    model.apply(&event(r#"{"status":"processing","percent":40}"#));
    assert_eq!(model.percent, 40);

    model.apply(&event(r#"{"status":"processing_detail","message":"still going"}"#));
    assert_eq!(model.percent, 40);

    model.apply(&event(r#"{"status":"processing","percent":55}"#));
    assert_eq!(model.percent, 55);
  }

  #[test]
  fn counter_tracks_latest_processing_event_across_details() {
    let mut model = ProgressModel::new();
    model.apply(&event(r#"{"status":"start_processing","total_books":12}"#));
    assert_eq!(model.book_counter_display(), "0/12");

    model.apply(&event(
      r#"{"status":"processing","current_book":3,"total_books":12,"book_title":"Dune"}"#,
    ));
    assert_eq!(model.book_counter_display(), "3/12");
    assert_eq!(model.current_book_title, "Dune");

    let before = model.log().len();
    model.apply(&event(r#"{"status":"processing_detail","message":"parsed highlights"}"#));
    assert_eq!(model.log().len(), before + 1);
    assert_eq!(model.book_counter_display(), "3/12");
    assert_eq!(model.current_book_title, "Dune");
  }

  #[test]
  fn log_is_append_only_and_counts_events_plus_transitions() {
    let mut model = ProgressModel::new();
    model.connection_opened();

    let events = [
      r#"{"status":"connecting"}"#,
      r#"{"status":"fetching_books"}"#,
      r#"{"status":"start_processing","total_books":2}"#,
      r#"{"status":"processing","current_book":1,"total_books":2,"book_title":"A"}"#,
      r#"{"status":"completed","percent":100}"#,
    ];
    let mut snapshots: Vec<Vec<String>> = Vec::new();
    for raw in events {
      snapshots.push(model.log().to_vec());
      model.apply(&event(raw));
    }
    model.connection_lost();

    assert_eq!(model.log().len(), events.len() + 2);
    // Every earlier prefix is untouched.
    for snapshot in snapshots {
      assert_eq!(&model.log()[..snapshot.len()], snapshot.as_slice());
    }
  }

  #[test]
  fn refolding_an_event_is_idempotent_for_scalars_not_the_log() {
    let evt = event(
      r#"{"status":"processing","current_book":3,"total_books":12,"book_title":"Dune","percent":25}"#,
    );

    let mut once = ProgressModel::new();
    once.apply(&evt);
    let mut twice = ProgressModel::new();
    twice.apply(&evt);
    twice.apply(&evt);

    assert_eq!(twice.percent, once.percent);
    assert_eq!(twice.book_counter, once.book_counter);
    assert_eq!(twice.current_book_title, once.current_book_title);
    assert_eq!(twice.log().len(), once.log().len() * 2);
  }

  #[test]
  fn unknown_status_updates_scalars_but_never_fails() {
    let mut model = ProgressModel::new();
    let lines = model.apply(&event(r#"{"status":"repacking","message":"hm","percent":12}"#));
    assert!(lines.is_empty());
    assert_eq!(model.status_message, "hm");
    assert_eq!(model.percent, 12);
    assert_eq!(model.phase, Some(ProgressPhase::Unknown));
    assert!(model.log().is_empty());
  }

  #[test]
  fn processing_without_title_falls_back_to_placeholder() {
    let mut model = ProgressModel::new();
    model.apply(&event(r#"{"status":"processing","current_book":1,"total_books":4}"#));
    assert_eq!(model.current_book_title, FALLBACK_TITLE);
    assert_eq!(model.book_counter_display(), "1/4");
  }

  #[test]
  fn out_of_range_percent_is_clamped() {
    let mut model = ProgressModel::new();
    model.apply(&event(r#"{"status":"processing","percent":250}"#));
    assert_eq!(model.percent, 100);

    model.apply(&event(r#"{"status":"processing","percent":-3}"#));
    assert_eq!(model.percent, 0);
  }

  #[test]
  fn fractional_percent_folds_to_the_nearest_whole() {
    let mut model = ProgressModel::new();
    let lines = model.apply(&event(r#"{"status":"processing","percent":62.5,"book_title":"Dune"}"#));
    assert_eq!(model.percent, 63);
    // The whole event still folded; its log line was not dropped.
    assert_eq!(lines.len(), 1);
  }

  #[test]
  fn connection_transitions_flip_is_connected_and_log() {
    let mut model = ProgressModel::new();
    assert!(!model.is_connected());

    model.connection_opened();
    assert!(model.is_connected());

    model.connection_lost();
    assert!(!model.is_connected());
    assert_eq!(
      model.log(),
      ["Connected to server".to_string(), "Connection to server lost".to_string()]
    );
  }

  #[test]
  fn reset_clears_run_state_but_keeps_connection() {
    let mut model = ProgressModel::new();
    model.connection_opened();
    model.apply(&event(r#"{"status":"processing","current_book":2,"total_books":5,"book_title":"B","percent":40}"#));

    model.reset();
    assert!(model.is_connected());
    assert!(model.log().is_empty());
    assert_eq!(model.percent, 0);
    assert_eq!(model.book_counter, (0, 0));
    assert_eq!(model.current_book_title, PLACEHOLDER_TITLE);
    assert!(model.phase.is_none());
  }
}
