use crate::error::ErrorCode;

/// Form body of a job submission. The sid ties emitted progress events back
/// to the submitting client's channel; it may be absent (no live progress).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExtractRequest {
  pub cookie: String,
  #[serde(default)]
  pub sid: String,
}

/// Artifact locations handed back on success. The spreadsheet key stays
/// `excel` for wire compatibility even though the artifact is CSV.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArtifactFiles {
  pub excel: String,
  pub json: String,
}

/// Server-side response body for `/extract`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractResponse {
  Success {
    message: String,
    files: ArtifactFiles,
  },
  Error {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
  },
}

/// Client-side view of the `/extract` response. Deliberately loose: any
/// status other than `success` is a failure, including ones this version
/// has never heard of.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct ExtractReply {
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub details: Option<String>,
  #[serde(default)]
  pub files: Option<ArtifactFiles>,
}

impl ExtractReply {
  pub fn is_success(&self) -> bool {
    self.status == "success"
  }
}

/// What one job extracts, as handed to the engine.
#[derive(Debug, Clone)]
pub struct JobSpec {
  pub cookie: String,
  pub user_agent: String,
}

/// Where a finished job left its artifacts, relative to the output root.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBundle {
  pub dir_name: String,
  pub spreadsheet_file: String,
  pub json_file: String,
}

// ---- upstream records ----------------------------------------------------

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BookMeta {
  #[serde(rename = "bookId", default)]
  pub book_id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub author: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NotebookEntry {
  pub book: BookMeta,
  #[serde(default)]
  pub sort: i64,
}

/// A highlight ("bookmark") as the reading service reports it.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct HighlightItem {
  #[serde(rename = "chapterUid", default = "default_chapter_uid")]
  pub chapter_uid: u32,
  #[serde(default)]
  pub range: String,
  #[serde(rename = "markText", default)]
  pub mark_text: String,
  #[serde(rename = "createTime", default)]
  pub create_time: i64,
  #[serde(rename = "type", default)]
  pub kind: i32,
}

fn default_chapter_uid() -> u32 {
  1
}

/// A review/note as the reading service reports it. `kind` 1 is a note
/// attached to a passage, 4 a whole-book summary.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ReviewItem {
  #[serde(rename = "chapterUid", default = "default_chapter_uid")]
  pub chapter_uid: u32,
  #[serde(default)]
  pub range: String,
  #[serde(default)]
  pub content: String,
  #[serde(rename = "createTime", default)]
  pub create_time: i64,
  #[serde(rename = "type", default)]
  pub kind: i32,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChapterItem {
  #[serde(rename = "chapterUid")]
  pub chapter_uid: u32,
  #[serde(default)]
  pub title: String,
}

/// One merged annotation after cleaning: either a highlight or a note,
/// ordered by chapter and passage offset, with the chapter title attached.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct NoteRecord {
  pub chapter_uid: u32,
  pub chapter_title: String,
  pub range: String,
  pub highlight: String,
  pub note: String,
  pub create_time: i64,
}

impl NoteRecord {
  /// Sort key mirroring the reading order: chapter first, then the start
  /// offset of the passage range ("123-456" → 123; malformed → 0).
  pub fn order_key(&self) -> (u32, i64) {
    let start = self
      .range
      .split('-')
      .next()
      .and_then(|s| s.parse::<i64>().ok())
      .unwrap_or(0);
    (self.chapter_uid, start)
  }
}

/// Everything extracted for one book; unit of the structured-data export.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BookExport {
  pub book: BookMeta,
  pub isbn: String,
  pub rating: f64,
  pub notes: Vec<NoteRecord>,
  pub summaries: Vec<String>,
}
