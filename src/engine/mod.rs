mod job;
pub mod export;

pub use job::{merge_notes, JobContext};

use crate::{
  error::ExtractError,
  events::ProgressEvent,
  model::{ExportBundle, JobSpec},
  session::ProgressSink,
};
use anyhow::anyhow;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

/// Clonable submission handle. One submission produces exactly one terminal
/// reply; progress flows separately through the sink's session channel.
#[derive(Clone)]
pub struct ExtractEngineHandle {
  tx: mpsc::Sender<EngineCommand>,
}

impl ExtractEngineHandle {
  pub async fn extract(
    &self,
    spec: JobSpec,
    sink: ProgressSink,
  ) -> Result<ExportBundle, ExtractError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .tx
      .send(EngineCommand::Extract {
        spec,
        sink,
        reply: reply_tx,
      })
      .await
      .map_err(|_| ExtractError::Other(anyhow!("engine channel closed")))?;
    reply_rx
      .await
      .map_err(|_| ExtractError::Other(anyhow!("engine dropped the job reply")))?
  }
}

pub enum EngineCommand {
  Extract {
    spec: JobSpec,
    sink: ProgressSink,
    reply: oneshot::Sender<Result<ExportBundle, ExtractError>>,
  },
}

pub struct ExtractEngine {
  ctx: Arc<JobContext>,
  tx: mpsc::Sender<EngineCommand>,
  rx: Mutex<Option<mpsc::Receiver<EngineCommand>>>,
}

impl ExtractEngine {
  pub fn new(ctx: JobContext) -> Self {
    let (tx, rx) = mpsc::channel(64);
    Self {
      ctx: Arc::new(ctx),
      tx,
      rx: Mutex::new(Some(rx)),
    }
  }

  pub fn handle(&self) -> ExtractEngineHandle {
    ExtractEngineHandle { tx: self.tx.clone() }
  }

  /// Run the command loop. Each submission gets its own task; concurrent
  /// jobs across different sessions are fine, the one-job-per-client rule
  /// is the client's responsibility.
  pub fn start(&self) {
    let mut guard = self.rx.try_lock().expect("engine started twice");
    let mut rx = guard.take().expect("engine started twice");
    let ctx = self.ctx.clone();

    tokio::spawn(async move {
      while let Some(cmd) = rx.recv().await {
        match cmd {
          EngineCommand::Extract { spec, sink, reply } => {
            let ctx = ctx.clone();
            tokio::spawn(async move {
              let job_id = Uuid::new_v4();
              tracing::info!(%job_id, sid = %sink.sid(), "extract job started");

              let res = job::run_extract_job(&ctx, spec, sink.clone()).await;
              match &res {
                Ok(bundle) => {
                  tracing::info!(%job_id, dir = %bundle.dir_name, "extract job finished");
                }
                Err(e) => {
                  tracing::error!(%job_id, error = %e, "extract job failed");
                  sink.send(ProgressEvent::error(format!("Processing failed: {e}")));
                }
              }

              // The submitter may have gone away; that is not an error.
              let _ = reply.send(res);
            });
          }
        }
      }
    });
  }
}
