//! Terminal-outcome resolution: the submission response is reconciled with
//! the progress model without ever touching the event-derived log, except
//! to append a transport-failure line.

use crate::client::progress::ProgressModel;
use crate::model::ExtractReply;

pub const GENERIC_FAILURE: &str = "Processing failed";
pub const NETWORK_FAILURE: &str = "Network error, please try again later";

/// What the client finally shows once the submission call resolves. This is
/// independent of whether a `completed` event was ever seen on the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  Success {
    excel_url: String,
    json_url: String,
  },
  /// `details` of `None` means the details panel is hidden, not shown empty.
  Failed {
    message: String,
    details: Option<String>,
  },
}

/// Resolve the submission result. A transport-level failure (the response
/// never arrived) is normalized into `Failed` with the raw error text as
/// details, and additionally logged; the log is never cleared here.
pub fn resolve<E: std::fmt::Display>(
  result: Result<ExtractReply, E>,
  model: &mut ProgressModel,
) -> Outcome {
  match result {
    Ok(reply) if reply.is_success() => match reply.files {
      Some(files) => Outcome::Success {
        excel_url: files.excel,
        json_url: files.json,
      },
      // A success without artifact locations is a malformed response.
      None => Outcome::Failed {
        message: reply.message.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        details: Some("success response carried no artifact locations".to_string()),
      },
    },
    Ok(reply) => Outcome::Failed {
      message: reply.message.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
      details: reply.details,
    },
    Err(err) => {
      let details = err.to_string();
      model.push_log(format!("Network error: {details}"));
      Outcome::Failed {
        message: NETWORK_FAILURE.to_string(),
        details: Some(details),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::events::ProgressEvent;

  fn reply(json: &str) -> ExtractReply {
    serde_json::from_str(json).expect("test reply json")
  }

  #[test]
  fn success_binds_both_urls_verbatim() {
    let mut model = ProgressModel::new();
    // The response can land before a `completed` event is ever seen.
    let outcome = resolve::<String>(
      Ok(reply(r#"{"status":"success","files":{"excel":"/x.csv","json":"/x.json"}}"#)),
      &mut model,
    );
    assert_eq!(
      outcome,
      Outcome::Success {
        excel_url: "/x.csv".into(),
        json_url: "/x.json".into(),
      }
    );
    assert!(model.log().is_empty());
  }

  #[test]
  fn failure_without_details_hides_the_panel() {
    let mut model = ProgressModel::new();
    let outcome = resolve::<String>(
      Ok(reply(r#"{"status":"failure","message":"auth expired"}"#)),
      &mut model,
    );
    assert_eq!(
      outcome,
      Outcome::Failed {
        message: "auth expired".into(),
        details: None,
      }
    );
  }

  #[test]
  fn failure_without_message_gets_the_generic_string() {
    let mut model = ProgressModel::new();
    let outcome = resolve::<String>(Ok(reply(r#"{"status":"error"}"#)), &mut model);
    match outcome {
      Outcome::Failed { message, details } => {
        assert_eq!(message, GENERIC_FAILURE);
        assert!(details.is_none());
      }
      other => panic!("expected failure, got {other:?}"),
    }
  }

  #[test]
  fn transport_failure_is_normalized_and_logged() {
    let mut model = ProgressModel::new();
    model.apply(&ProgressEvent::fetching_books("Fetching book list..."));
    let before = model.log().len();

    let outcome = resolve(Err("connection refused".to_string()), &mut model);
    assert_eq!(
      outcome,
      Outcome::Failed {
        message: NETWORK_FAILURE.into(),
        details: Some("connection refused".into()),
      }
    );
    // Appended, never cleared.
    assert_eq!(model.log().len(), before + 1);
    assert!(model.log().last().unwrap().contains("connection refused"));
  }
}
