//! Wire contract for the progress channel: one JSON text frame per message.

/// Discriminant of a progress event. Unknown tags deserialize to `Unknown`
/// so the consumer stays forward-compatible with server additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
  Connecting,
  FetchingBooks,
  StartProcessing,
  Processing,
  ProcessingDetail,
  Exporting,
  Completed,
  Error,
  #[serde(other)]
  Unknown,
}

/// One incremental update describing job status. Optional fields are
/// omitted from the frame when absent; consumers must tolerate any subset.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProgressEvent {
  pub status: ProgressPhase,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  /// Overall progress, 0 to 100. A number on the wire, so fractional
  /// values from other producers still parse; consumers clamp and round.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub percent: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total_books: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current_book: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub book_title: Option<String>,
}

impl ProgressEvent {
  fn bare(status: ProgressPhase) -> Self {
    Self {
      status,
      message: None,
      percent: None,
      total_books: None,
      current_book: None,
      book_title: None,
    }
  }

  pub fn connecting(message: impl Into<String>) -> Self {
    Self {
      message: Some(message.into()),
      ..Self::bare(ProgressPhase::Connecting)
    }
  }

  pub fn fetching_books(message: impl Into<String>) -> Self {
    Self {
      message: Some(message.into()),
      ..Self::bare(ProgressPhase::FetchingBooks)
    }
  }

  pub fn start_processing(total_books: u32) -> Self {
    Self {
      message: Some(format!("Starting, {total_books} books to process")),
      percent: Some(0.0),
      total_books: Some(total_books),
      current_book: Some(0),
      ..Self::bare(ProgressPhase::StartProcessing)
    }
  }

  pub fn processing(current_book: u32, total_books: u32, book_title: impl Into<String>) -> Self {
    let title = book_title.into();
    let percent = if total_books == 0 {
      0.0
    } else {
      (current_book as f64 * 100.0 / total_books as f64).min(100.0)
    };
    Self {
      message: Some(format!("Processing ({current_book}/{total_books}): {title}")),
      percent: Some(percent),
      total_books: Some(total_books),
      current_book: Some(current_book),
      book_title: Some(title),
      ..Self::bare(ProgressPhase::Processing)
    }
  }

  pub fn processing_detail(message: impl Into<String>) -> Self {
    Self {
      message: Some(message.into()),
      ..Self::bare(ProgressPhase::ProcessingDetail)
    }
  }

  pub fn exporting(message: impl Into<String>) -> Self {
    Self {
      message: Some(message.into()),
      percent: Some(95.0),
      ..Self::bare(ProgressPhase::Exporting)
    }
  }

  pub fn completed(message: impl Into<String>) -> Self {
    Self {
      message: Some(message.into()),
      percent: Some(100.0),
      ..Self::bare(ProgressPhase::Completed)
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      message: Some(message.into()),
      ..Self::bare(ProgressPhase::Error)
    }
  }
}

/// A frame on the progress channel. The first frame after upgrade is always
/// `Hello` carrying the freshly minted session id; every later frame is a
/// progress event. Untagged: `Hello` is the only shape with a `sid` field.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
  Hello { sid: String },
  Progress(ProgressEvent),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn phase_round_trips_snake_case() {
    let json = serde_json::to_string(&ProgressPhase::FetchingBooks).unwrap();
    assert_eq!(json, "\"fetching_books\"");
    let back: ProgressPhase = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ProgressPhase::FetchingBooks);
  }

  #[test]
  fn unknown_phase_tag_does_not_fail() {
    let evt: ProgressEvent =
      serde_json::from_str(r#"{"status":"repacking","message":"hi"}"#).unwrap();
    assert_eq!(evt.status, ProgressPhase::Unknown);
    assert_eq!(evt.message.as_deref(), Some("hi"));
  }

  #[test]
  fn absent_optional_fields_are_omitted() {
    let json = serde_json::to_string(&ProgressEvent::exporting("Exporting data...")).unwrap();
    assert!(json.contains("\"percent\":95.0"));
    assert!(!json.contains("total_books"));
    assert!(!json.contains("book_title"));
  }

  #[test]
  fn hello_and_progress_frames_are_distinguishable() {
    let hello: ServerMessage = serde_json::from_str(r#"{"sid":"abc-123"}"#).unwrap();
    assert_eq!(
      hello,
      ServerMessage::Hello {
        sid: "abc-123".to_string()
      }
    );

    let frame: ServerMessage = serde_json::from_str(
      r#"{"status":"processing","current_book":3,"total_books":12,"book_title":"Dune"}"#,
    )
    .unwrap();
    match frame {
      ServerMessage::Progress(evt) => {
        assert_eq!(evt.status, ProgressPhase::Processing);
        assert_eq!(evt.current_book, Some(3));
      }
      other => panic!("expected progress frame, got {other:?}"),
    }
  }

  #[test]
  fn processing_percent_is_proportional() {
    let evt = ProgressEvent::processing(3, 12, "Dune");
    assert_eq!(evt.percent, Some(25.0));
    let evt = ProgressEvent::processing(12, 12, "Last");
    assert_eq!(evt.percent, Some(100.0));
  }

  #[test]
  fn fractional_percent_frames_still_parse() {
    let evt: ProgressEvent =
      serde_json::from_str(r#"{"status":"processing","percent":62.5}"#).unwrap();
    assert_eq!(evt.percent, Some(62.5));
  }
}
