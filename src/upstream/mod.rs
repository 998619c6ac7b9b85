//! HTTP client for the reading service the notes are pulled from.
//!
//! The caller supplies the raw cookie string of a logged-in browser session;
//! every request carries it verbatim plus a browser user agent. Endpoints
//! that only enrich the export degrade to defaults on failure instead of
//! aborting the whole job.

use crate::error::ExtractError;
use crate::model::{ChapterItem, HighlightItem, NotebookEntry, ReviewItem};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

const NOTEBOOK_LIST_RETRIES: usize = 3;
const NOTEBOOK_LIST_RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Highlight rows come back with a `type` field; only plain underlines
/// (type 1) belong in the export.
const HIGHLIGHT_KIND: i32 = 1;
/// Review `type` 1 is a passage note, 4 a whole-book summary.
const REVIEW_KIND_NOTE: i32 = 1;
const REVIEW_KIND_SUMMARY: i32 = 4;

#[derive(Clone)]
pub struct UpstreamClient {
  client: reqwest::Client,
  home: Url,
  api: Url,
}

impl UpstreamClient {
  pub fn new(
    home_base: &str,
    api_base: &str,
    cookie: &str,
    user_agent: &str,
  ) -> anyhow::Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(
      COOKIE,
      HeaderValue::from_str(cookie).context("cookie contains invalid header characters")?,
    );
    headers.insert(
      USER_AGENT,
      HeaderValue::from_str(user_agent).unwrap_or(HeaderValue::from_static("shelfpull/0.1")),
    );

    let client = reqwest::Client::builder()
      .default_headers(headers)
      .redirect(reqwest::redirect::Policy::limited(10))
      .connect_timeout(Duration::from_secs(15))
      .timeout(Duration::from_secs(60))
      .build()
      .context("failed to build upstream client")?;

    Ok(Self {
      client,
      home: Url::parse(home_base).context("invalid upstream base url")?,
      api: Url::parse(api_base).context("invalid upstream api base url")?,
    })
  }

  fn api_url(&self, path: &str) -> Url {
    let mut url = self.api.clone();
    url.set_path(path);
    url
  }

  /// Visit the home page once so the service sees a plausible session
  /// before any API call.
  pub async fn warm_up(&self) -> Result<(), ExtractError> {
    self
      .client
      .get(self.home.clone())
      .send()
      .await
      .map_err(|e| ExtractError::from_reqwest(&e))?;
    Ok(())
  }

  /// Fetch the notebook list, the one upstream call a job cannot proceed
  /// without. Retried a few times; entries come back sorted by their
  /// `sort` key.
  pub async fn notebook_list(&self) -> Result<Vec<NotebookEntry>, ExtractError> {
    #[derive(serde::Deserialize)]
    struct NotebookListResponse {
      #[serde(default)]
      books: Vec<NotebookEntry>,
    }

    let url = self.api_url("/user/notebooks");
    let mut last_status: Option<u16> = None;
    let mut last_body: Option<String> = None;

    for attempt in 1..=NOTEBOOK_LIST_RETRIES {
      match self.client.get(url.clone()).send().await {
        Ok(resp) if resp.status().is_success() => {
          match resp.json::<NotebookListResponse>().await {
            Ok(body) if !body.books.is_empty() => {
              let mut books = body.books;
              books.sort_by_key(|b| b.sort);
              return Ok(books);
            }
            Ok(_) => {
              tracing::warn!(attempt, "notebook list came back empty");
            }
            Err(e) => {
              tracing::warn!(attempt, error = %e, "notebook list body unreadable");
            }
          }
        }
        Ok(resp) => {
          let status = resp.status().as_u16();
          tracing::warn!(attempt, status, "notebook list request failed");
          last_status = Some(status);
          last_body = resp.text().await.ok().filter(|b| !b.is_empty());
        }
        Err(e) => {
          tracing::warn!(attempt, error = %e, "notebook list request errored");
        }
      }
      if attempt < NOTEBOOK_LIST_RETRIES {
        tokio::time::sleep(NOTEBOOK_LIST_RETRY_PAUSE).await;
      }
    }

    match last_status {
      Some(status) if status == 401 || status == 403 => Err(ExtractError::BookListUnavailable),
      Some(status) => Err(ExtractError::UpstreamStatus { status, body: last_body }),
      None => Err(ExtractError::BookListUnavailable),
    }
  }

  /// ISBN and rating for one book. Best-effort: failures return defaults.
  pub async fn book_info(&self, book_id: &str) -> (String, f64) {
    #[derive(serde::Deserialize)]
    struct BookInfoResponse {
      #[serde(default)]
      isbn: String,
      #[serde(rename = "newRating", default)]
      new_rating: f64,
    }

    let url = self.api_url("/book/info");
    let resp = self.client.get(url).query(&[("bookId", book_id)]).send().await;
    match resp {
      Ok(r) if r.status().is_success() => match r.json::<BookInfoResponse>().await {
        Ok(body) => (body.isbn, body.new_rating / 1000.0),
        Err(e) => {
          tracing::warn!(book_id, error = %e, "book info body unreadable");
          (String::new(), 0.0)
        }
      },
      Ok(r) => {
        tracing::warn!(book_id, status = r.status().as_u16(), "book info request failed");
        (String::new(), 0.0)
      }
      Err(e) => {
        tracing::warn!(book_id, error = %e, "book info request errored");
        (String::new(), 0.0)
      }
    }
  }

  /// Chapter uid → title map for one book. Best-effort.
  pub async fn chapter_titles(&self, book_id: &str) -> HashMap<u32, String> {
    #[derive(serde::Deserialize)]
    struct ChapterInfosResponse {
      #[serde(default)]
      data: Vec<ChapterInfosEntry>,
    }
    #[derive(serde::Deserialize)]
    struct ChapterInfosEntry {
      #[serde(default)]
      updated: Vec<ChapterItem>,
    }

    let url = self.api_url("/book/chapterInfos");
    let body = serde_json::json!({
      "bookIds": [book_id],
      "synckeys": [0],
      "teenmode": 0,
    });

    let resp = self.client.post(url).json(&body).send().await;
    let parsed = match resp {
      Ok(r) if r.status().is_success() => r.json::<ChapterInfosResponse>().await.ok(),
      Ok(r) => {
        tracing::warn!(book_id, status = r.status().as_u16(), "chapter infos request failed");
        None
      }
      Err(e) => {
        tracing::warn!(book_id, error = %e, "chapter infos request errored");
        None
      }
    };

    parsed
      .and_then(|mut body| (!body.data.is_empty()).then(|| body.data.remove(0).updated))
      .map(|items| items.into_iter().map(|c| (c.chapter_uid, c.title)).collect())
      .unwrap_or_default()
  }

  /// Highlights (underlined passages) for one book, filtered to plain
  /// underlines. Best-effort.
  pub async fn highlight_list(&self, book_id: &str) -> Vec<HighlightItem> {
    #[derive(serde::Deserialize)]
    struct BookmarkListResponse {
      #[serde(default)]
      updated: Vec<HighlightItem>,
    }

    let url = self.api_url("/book/bookmarklist");
    let resp = self.client.get(url).query(&[("bookId", book_id)]).send().await;
    match resp {
      Ok(r) if r.status().is_success() => match r.json::<BookmarkListResponse>().await {
        Ok(body) => body
          .updated
          .into_iter()
          .filter(|h| h.kind == HIGHLIGHT_KIND)
          .collect(),
        Err(e) => {
          tracing::warn!(book_id, error = %e, "bookmark list body unreadable");
          Vec::new()
        }
      },
      Ok(r) => {
        tracing::warn!(book_id, status = r.status().as_u16(), "bookmark list request failed");
        Vec::new()
      }
      Err(e) => {
        tracing::warn!(book_id, error = %e, "bookmark list request errored");
        Vec::new()
      }
    }
  }

  /// Reviews for one book, split into whole-book summaries and passage
  /// notes. Best-effort.
  pub async fn review_lists(&self, book_id: &str) -> (Vec<String>, Vec<ReviewItem>) {
    #[derive(serde::Deserialize)]
    struct ReviewListResponse {
      #[serde(default)]
      reviews: Vec<ReviewEnvelope>,
    }
    #[derive(serde::Deserialize)]
    struct ReviewEnvelope {
      review: ReviewItem,
    }

    let url = self.api_url("/review/list");
    let resp = self
      .client
      .get(url)
      .query(&[("bookId", book_id), ("listType", "11"), ("mine", "1"), ("syncKey", "0")])
      .send()
      .await;

    let reviews = match resp {
      Ok(r) if r.status().is_success() => match r.json::<ReviewListResponse>().await {
        Ok(body) => body.reviews,
        Err(e) => {
          tracing::warn!(book_id, error = %e, "review list body unreadable");
          Vec::new()
        }
      },
      Ok(r) => {
        tracing::warn!(book_id, status = r.status().as_u16(), "review list request failed");
        Vec::new()
      }
      Err(e) => {
        tracing::warn!(book_id, error = %e, "review list request errored");
        Vec::new()
      }
    };

    let mut summaries = Vec::new();
    let mut notes = Vec::new();
    for envelope in reviews {
      let review = envelope.review;
      match review.kind {
        REVIEW_KIND_SUMMARY => summaries.push(review.content),
        REVIEW_KIND_NOTE => notes.push(review),
        _ => {}
      }
    }
    (summaries, notes)
  }
}
