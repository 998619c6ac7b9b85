//! Session registry: routes progress events to the WebSocket that owns them.
//!
//! A session id is minted when a progress channel is accepted and stays
//! valid only while that channel is open. Events addressed to an unknown or
//! closed session are dropped, not queued.

use crate::events::ProgressEvent;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct SessionRegistry {
  sessions: Arc<DashMap<String, mpsc::UnboundedSender<ProgressEvent>>>,
}

impl SessionRegistry {
  pub fn new() -> Self {
    Self {
      sessions: Arc::new(DashMap::new()),
    }
  }

  /// Mint a session id and register its event channel. The caller owns the
  /// receiver and must call [`remove`](Self::remove) when the channel closes.
  pub fn register(&self) -> (String, mpsc::UnboundedReceiver<ProgressEvent>) {
    let sid = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded_channel();
    self.sessions.insert(sid.clone(), tx);
    (sid, rx)
  }

  pub fn remove(&self, sid: &str) {
    self.sessions.remove(sid);
  }

  /// Deliver one event to a session. Returns false when the sid is unknown
  /// or its channel is gone; stale sessions route to nowhere by design.
  pub fn emit(&self, sid: &str, event: ProgressEvent) -> bool {
    match self.sessions.get(sid) {
      Some(tx) => tx.send(event).is_ok(),
      None => false,
    }
  }

  pub fn len(&self) -> usize {
    self.sessions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sessions.is_empty()
  }

  /// Handle for a job executor to push events correlated to one session.
  /// An empty sid (submission without a session) yields a null sink.
  pub fn sink(&self, sid: &str) -> ProgressSink {
    ProgressSink {
      registry: self.clone(),
      sid: sid.to_string(),
    }
  }
}

/// Fire-and-forget event emitter bound to a single session id.
#[derive(Clone)]
pub struct ProgressSink {
  registry: SessionRegistry,
  sid: String,
}

impl ProgressSink {
  pub fn send(&self, event: ProgressEvent) {
    if self.sid.is_empty() {
      return;
    }
    if !self.registry.emit(&self.sid, event) {
      tracing::debug!(sid = %self.sid, "dropping progress event for stale session");
    }
  }

  pub fn sid(&self) -> &str {
    &self.sid
  }
}
