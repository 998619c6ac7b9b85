//! Artifact writers: one structured JSON export and one flat spreadsheet
//! (CSV) per job, in a fresh per-job directory under the output root.

use crate::error::ExtractError;
use crate::model::{BookExport, ExportBundle};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

pub fn write_exports(output_root: &Path, books: &[BookExport]) -> Result<ExportBundle, ExtractError> {
  let dir_name = format!("job-{}", Uuid::new_v4());
  let job_dir = output_root.join(&dir_name);
  std::fs::create_dir_all(&job_dir).map_err(ExtractError::Export)?;

  let stamp = OffsetDateTime::now_utc().unix_timestamp();
  let json_file = format!("reading_notes_{stamp}.json");
  let spreadsheet_file = format!("reading_notes_{stamp}.csv");

  let json_bytes = serde_json::to_vec_pretty(books).map_err(|e| ExtractError::Other(e.into()))?;
  std::fs::write(job_dir.join(&json_file), json_bytes).map_err(ExtractError::Export)?;

  let csv = render_spreadsheet(books);
  std::fs::write(job_dir.join(&spreadsheet_file), csv).map_err(ExtractError::Export)?;

  Ok(ExportBundle {
    dir_name,
    spreadsheet_file,
    json_file,
  })
}

/// One row per note; books without notes contribute nothing. An entirely
/// empty dataset still yields a header plus one blank row so spreadsheet
/// tools open something sensible.
fn render_spreadsheet(books: &[BookExport]) -> String {
  let mut out = String::from("Book,Author,Chapter,Highlight,Note,Created\n");
  let mut rows = 0usize;

  for book in books {
    for note in &book.notes {
      push_row(
        &mut out,
        &[
          &book.book.title,
          &book.book.author,
          &note.chapter_title,
          &note.highlight,
          &note.note,
          &format_created(note.create_time),
        ],
      );
      rows += 1;
    }
  }

  if rows == 0 {
    out.push_str(",,,,,\n");
  }
  out
}

fn push_row(out: &mut String, fields: &[&str]) {
  let mut first = true;
  for field in fields {
    if !first {
      out.push(',');
    }
    first = false;
    out.push_str(&csv_field(field));
  }
  out.push('\n');
}

/// Quote a field when it contains a comma, quote, or newline; embedded
/// quotes are doubled per RFC 4180.
fn csv_field(raw: &str) -> String {
  if raw.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", raw.replace('"', "\"\""))
  } else {
    raw.to_string()
  }
}

fn format_created(unix_seconds: i64) -> String {
  OffsetDateTime::from_unix_timestamp(unix_seconds)
    .ok()
    .and_then(|t| t.format(&Rfc3339).ok())
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{BookMeta, NoteRecord};

  fn sample_book(title: &str, notes: Vec<NoteRecord>) -> BookExport {
    BookExport {
      book: BookMeta {
        book_id: "b1".into(),
        title: title.into(),
        author: "A. Author".into(),
      },
      isbn: "".into(),
      rating: 4.2,
      notes,
      summaries: Vec::new(),
    }
  }

  #[test]
  fn spreadsheet_has_one_row_per_note() {
    let book = sample_book(
      "Dune",
      vec![
        NoteRecord {
          chapter_uid: 1,
          chapter_title: "Ch 1".into(),
          range: "0-10".into(),
          highlight: "fear is the mind-killer".into(),
          note: String::new(),
          create_time: 0,
        },
        NoteRecord {
          chapter_uid: 2,
          chapter_title: "Ch 2".into(),
          range: "5-9".into(),
          highlight: String::new(),
          note: "spice, again".into(),
          create_time: 0,
        },
      ],
    );

    let csv = render_spreadsheet(&[book]);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("Dune,A. Author,Ch 1"));
  }

  #[test]
  fn empty_dataset_still_renders_a_blank_row() {
    let csv = render_spreadsheet(&[]);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], ",,,,,");
  }

  #[test]
  fn fields_with_commas_and_quotes_are_escaped() {
    assert_eq!(csv_field("plain"), "plain");
    assert_eq!(csv_field("a,b"), "\"a,b\"");
    assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
  }

  #[test]
  fn write_exports_creates_both_artifacts() {
    let root = std::env::temp_dir().join(format!("shelfpull-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).unwrap();

    let bundle = write_exports(&root, &[sample_book("Dune", Vec::new())]).unwrap();
    let dir = root.join(&bundle.dir_name);
    assert!(dir.join(&bundle.json_file).is_file());
    assert!(dir.join(&bundle.spreadsheet_file).is_file());

    let json: serde_json::Value =
      serde_json::from_slice(&std::fs::read(dir.join(&bundle.json_file)).unwrap()).unwrap();
    assert_eq!(json[0]["book"]["title"], "Dune");

    std::fs::remove_dir_all(&root).unwrap();
  }
}
