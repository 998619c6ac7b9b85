//! One extraction job: walk the upstream reading service, emit the progress
//! event sequence against the submitter's session, and write both artifacts.

use crate::{
  engine::export,
  error::ExtractError,
  events::ProgressEvent,
  model::{BookExport, ExportBundle, HighlightItem, JobSpec, NoteRecord, ReviewItem},
  session::ProgressSink,
  upstream::UpstreamClient,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const FALLBACK_TITLE: &str = "Unknown title";

pub struct JobContext {
  pub upstream_base: String,
  pub upstream_api_base: String,
  pub output_root: PathBuf,
  pub book_pause: Duration,
}

pub async fn run_extract_job(
  ctx: &JobContext,
  spec: JobSpec,
  sink: ProgressSink,
) -> Result<ExportBundle, ExtractError> {
  if spec.cookie.trim().is_empty() {
    return Err(ExtractError::EmptyCookie);
  }

  let client = UpstreamClient::new(
    &ctx.upstream_base,
    &ctx.upstream_api_base,
    &spec.cookie,
    &spec.user_agent,
  )?;

  sink.send(ProgressEvent::connecting("Connecting to the reading service..."));
  client.warm_up().await?;

  sink.send(ProgressEvent::fetching_books("Fetching book list..."));
  let books = client.notebook_list().await?;
  let total = books.len() as u32;
  tracing::info!(sid = %sink.sid(), total, "starting extraction");

  sink.send(ProgressEvent::start_processing(total));

  let mut exports: Vec<BookExport> = Vec::with_capacity(books.len());
  for (idx, entry) in books.into_iter().enumerate() {
    let current = idx as u32 + 1;
    let book = entry.book;
    let title = if book.title.is_empty() {
      FALLBACK_TITLE.to_string()
    } else {
      book.title.clone()
    };

    sink.send(ProgressEvent::processing(current, total, title.clone()));

    let (isbn, rating) = client.book_info(&book.book_id).await;
    let chapters = client.chapter_titles(&book.book_id).await;
    let highlights = client.highlight_list(&book.book_id).await;
    let (summaries, reviews) = client.review_lists(&book.book_id).await;

    if !highlights.is_empty() {
      sink.send(ProgressEvent::processing_detail(format!(
        "\u{201c}{title}\u{201d} - {} highlights",
        highlights.len()
      )));
    }
    if !reviews.is_empty() {
      sink.send(ProgressEvent::processing_detail(format!(
        "\u{201c}{title}\u{201d} - {} notes",
        reviews.len()
      )));
    }

    let notes = merge_notes(highlights, reviews, &chapters);
    exports.push(BookExport {
      book,
      isbn,
      rating,
      notes,
      summaries,
    });

    // Be polite to the upstream service between books.
    if current < total && !ctx.book_pause.is_zero() {
      tokio::time::sleep(ctx.book_pause).await;
    }
  }

  sink.send(ProgressEvent::exporting("Exporting data..."));
  let bundle = export::write_exports(&ctx.output_root, &exports)?;

  sink.send(ProgressEvent::completed("All done, files are ready to download."));
  Ok(bundle)
}

/// Merge highlights and passage notes into one sequence ordered by chapter
/// and passage offset, with chapter titles attached.
pub fn merge_notes(
  highlights: Vec<HighlightItem>,
  reviews: Vec<ReviewItem>,
  chapters: &HashMap<u32, String>,
) -> Vec<NoteRecord> {
  let mut notes: Vec<NoteRecord> = Vec::with_capacity(highlights.len() + reviews.len());

  for h in highlights {
    notes.push(NoteRecord {
      chapter_uid: h.chapter_uid,
      chapter_title: chapters.get(&h.chapter_uid).cloned().unwrap_or_default(),
      range: h.range,
      highlight: h.mark_text,
      note: String::new(),
      create_time: h.create_time,
    });
  }
  for r in reviews {
    notes.push(NoteRecord {
      chapter_uid: r.chapter_uid,
      chapter_title: chapters.get(&r.chapter_uid).cloned().unwrap_or_default(),
      range: r.range,
      highlight: String::new(),
      note: r.content,
      create_time: r.create_time,
    });
  }

  notes.sort_by_key(NoteRecord::order_key);
  notes
}
