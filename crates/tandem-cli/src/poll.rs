//! The message poll loop for one open chat.
//!
//! A [`Poller`] owns a background task that asks its [`MessageSource`] for
//! messages newer than the log's cursor, merges whatever arrives into the
//! shared [`MessageLog`], waits, and asks again. There is never more than one
//! request in flight, and every finished request (success or failure)
//! schedules exactly one follow-up: after [`PollTiming::delay`] on success,
//! after the longer [`PollTiming::backoff`] on failure. The loop only ends
//! when the poller is stopped or dropped.
//!
//! Stopping cancels the in-flight request and any pending sleep. The merge
//! step checks for cancellation while holding the log lock, and stopping
//! takes that same lock, so no poll result can touch the log once
//! [`Poller::stop`] (or drop) has returned.

use std::{
  future::Future,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use chrono::{DateTime, Utc};
use tandem_core::{message::Message, timeline::MessageLog};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Where poll results come from; the HTTP client in production.
pub trait MessageSource: Send + Sync + 'static {
  /// Messages in `chat_id` newer than `since` (all of them when `None`).
  /// May wait server-side before answering.
  fn poll(
    &self,
    chat_id: Uuid,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = anyhow::Result<Vec<Message>>> + Send;
}

/// Delays between poll requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
  /// After a successful response.
  pub delay:   Duration,
  /// After a failed request or a non-2xx response.
  pub backoff: Duration,
}

impl Default for PollTiming {
  fn default() -> Self {
    Self { delay: Duration::from_secs(2), backoff: Duration::from_secs(10) }
  }
}

/// Progress reports from a poll task to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
  /// New messages were merged into the chat's log.
  Delivered { chat_id: Uuid, added: usize },
  /// A request failed; the task is backing off.
  Failed { chat_id: Uuid, error: String },
}

/// Lock the shared log. A panic elsewhere while holding the lock leaves the
/// log in a consistent state (every mutation is a single call), so a poisoned
/// lock is still usable.
pub fn lock_log(log: &Mutex<MessageLog>) -> MutexGuard<'_, MessageLog> {
  log.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Poller ──────────────────────────────────────────────────────────────────

/// Handle to a running poll loop. Dropping it tears the loop down.
pub struct Poller {
  chat_id: Uuid,
  log:     Arc<Mutex<MessageLog>>,
  cancel:  CancellationToken,
  handle:  Option<JoinHandle<()>>,
}

impl Poller {
  /// Start polling `chat_id` into `log`, reporting to `events`.
  pub fn spawn<M: MessageSource>(
    source: Arc<M>,
    chat_id: Uuid,
    log: Arc<Mutex<MessageLog>>,
    timing: PollTiming,
    events: UnboundedSender<PollEvent>,
  ) -> Self {
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run(
      source,
      chat_id,
      Arc::clone(&log),
      timing,
      events,
      cancel.clone(),
    ));
    Self { chat_id, log, cancel, handle: Some(handle) }
  }

  pub fn chat_id(&self) -> Uuid { self.chat_id }

  /// Stop the loop and wait for the task to finish.
  pub async fn stop(mut self) {
    self.teardown();
    if let Some(handle) = self.handle.take() {
      let _ = handle.await;
    }
  }

  fn teardown(&self) {
    let _held = lock_log(&self.log);
    self.cancel.cancel();
  }
}

impl Drop for Poller {
  fn drop(&mut self) { self.teardown(); }
}

async fn run<M: MessageSource>(
  source: Arc<M>,
  chat_id: Uuid,
  log: Arc<Mutex<MessageLog>>,
  timing: PollTiming,
  events: UnboundedSender<PollEvent>,
  cancel: CancellationToken,
) {
  tracing::debug!(%chat_id, "poll loop starting");

  loop {
    let since = lock_log(&log).cursor();

    let result = tokio::select! {
      _ = cancel.cancelled() => break,
      result = source.poll(chat_id, since) => result,
    };

    let wait = match result {
      Ok(batch) => {
        let added = {
          let mut log = lock_log(&log);
          if cancel.is_cancelled() {
            break;
          }
          log.extend_delivered(batch)
        };
        if added > 0 {
          let _ = events.send(PollEvent::Delivered { chat_id, added });
        }
        timing.delay
      }
      Err(error) => {
        tracing::warn!(%chat_id, error = %error, "poll failed, backing off");
        let _ = events.send(PollEvent::Failed { chat_id, error: error.to_string() });
        timing.backoff
      }
    };

    tokio::select! {
      _ = cancel.cancelled() => break,
      _ = tokio::time::sleep(wait) => {}
    }
  }

  tracing::debug!(%chat_id, "poll loop stopped");
}

#[cfg(test)]
mod tests {
  use std::collections::VecDeque;

  use anyhow::anyhow;
  use chrono::TimeDelta;
  use tokio::{
    sync::{Notify, mpsc},
    time::Instant,
  };

  use super::*;

  fn msg_at(secs: i64) -> Message {
    Message {
      id:                Uuid::new_v4(),
      chat_id:           Uuid::nil(),
      content:           format!("at {secs}"),
      created_at:        DateTime::UNIX_EPOCH + TimeDelta::seconds(secs),
      author_id:         None,
      author:            None,
      is_system_message: false,
    }
  }

  /// Answers from a fixed script, then never answers again.
  struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<Message>, String>>>,
    calls:  Mutex<Vec<(Instant, Option<DateTime<Utc>>)>>,
  }

  impl ScriptedSource {
    fn new(script: Vec<Result<Vec<Message>, String>>) -> Arc<Self> {
      Arc::new(Self { script: Mutex::new(script.into()), calls: Mutex::default() })
    }

    fn calls(&self) -> Vec<(Instant, Option<DateTime<Utc>>)> { self.calls.lock().unwrap().clone() }
  }

  impl MessageSource for ScriptedSource {
    async fn poll(&self, _: Uuid, since: Option<DateTime<Utc>>) -> anyhow::Result<Vec<Message>> {
      self.calls.lock().unwrap().push((Instant::now(), since));
      let next = self.script.lock().unwrap().pop_front();
      match next {
        Some(Ok(batch)) => Ok(batch),
        Some(Err(e)) => Err(anyhow!(e)),
        None => std::future::pending().await,
      }
    }
  }

  /// Holds every request open until released, then answers with one message.
  struct GatedSource {
    gate:  Notify,
    calls: Mutex<usize>,
    reply: Message,
  }

  impl MessageSource for GatedSource {
    async fn poll(&self, _: Uuid, _: Option<DateTime<Utc>>) -> anyhow::Result<Vec<Message>> {
      *self.calls.lock().unwrap() += 1;
      self.gate.notified().await;
      Ok(vec![self.reply.clone()])
    }
  }

  /// Timer deadlines are rounded up to the next millisecond.
  fn assert_gap(actual: Duration, expected: Duration) {
    assert!(
      actual >= expected && actual <= expected + Duration::from_millis(2),
      "expected ~{expected:?}, got {actual:?}"
    );
  }

  fn start<M: MessageSource>(
    source: &Arc<M>,
  ) -> (Poller, Arc<Mutex<MessageLog>>, mpsc::UnboundedReceiver<PollEvent>) {
    let log = Arc::new(Mutex::new(MessageLog::new()));
    let (tx, rx) = mpsc::unbounded_channel();
    let poller =
      Poller::spawn(Arc::clone(source), Uuid::nil(), Arc::clone(&log), PollTiming::default(), tx);
    (poller, log, rx)
  }

  #[tokio::test(start_paused = true)]
  async fn overlapping_batches_are_deduplicated_and_cursor_advances() {
    let (m1, m2, m3) = (msg_at(1), msg_at(2), msg_at(3));
    let source = ScriptedSource::new(vec![
      Ok(vec![m1.clone(), m2.clone()]),
      Ok(vec![m2.clone(), m3.clone()]),
    ]);
    let (poller, log, mut rx) = start(&source);

    tokio::time::sleep(Duration::from_secs(5)).await;

    let ids: Vec<_> = lock_log(&log).messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, [m1.id, m2.id, m3.id]);

    let cursors: Vec<_> = source.calls().into_iter().map(|(_, since)| since).collect();
    assert_eq!(cursors, [None, Some(m2.created_at), Some(m3.created_at)]);

    assert_eq!(rx.recv().await, Some(PollEvent::Delivered { chat_id: Uuid::nil(), added: 2 }));
    assert_eq!(rx.recv().await, Some(PollEvent::Delivered { chat_id: Uuid::nil(), added: 1 }));
    poller.stop().await;
  }

  #[tokio::test(start_paused = true)]
  async fn failure_backs_off_then_success_polls_quickly() {
    let source = ScriptedSource::new(vec![
      Err("connection refused".into()),
      Ok(vec![msg_at(1)]),
      Ok(vec![]),
    ]);
    let (poller, log, mut rx) = start(&source);

    tokio::time::sleep(Duration::from_secs(15)).await;

    let calls = source.calls();
    assert_eq!(calls.len(), 4);
    let timing = PollTiming::default();
    assert_gap(calls[1].0 - calls[0].0, timing.backoff);
    assert_gap(calls[2].0 - calls[1].0, timing.delay);
    assert_gap(calls[3].0 - calls[2].0, timing.delay);
    assert_eq!(lock_log(&log).len(), 1);

    assert!(matches!(rx.recv().await, Some(PollEvent::Failed { .. })));
    poller.stop().await;
  }

  #[tokio::test(start_paused = true)]
  async fn failed_poll_leaves_log_untouched() {
    let source = ScriptedSource::new(vec![Err("502 Bad Gateway".into())]);
    let (poller, log, _rx) = start(&source);

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(lock_log(&log).is_empty());
    assert!(lock_log(&log).cursor().is_none());
    poller.stop().await;
  }

  #[tokio::test(start_paused = true)]
  async fn stopped_poller_never_mutates_the_log() {
    let source = Arc::new(GatedSource {
      gate:  Notify::new(),
      calls: Mutex::new(0),
      reply: msg_at(1),
    });
    let (poller, log, mut rx) = start(&source);

    // Let the first request go out, then tear down while it is in flight.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(*source.calls.lock().unwrap(), 1);
    poller.stop().await;

    source.gate.notify_waiters();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(lock_log(&log).is_empty());
    assert_eq!(*source.calls.lock().unwrap(), 1);
    assert_eq!(rx.recv().await, None);
  }

  #[tokio::test(start_paused = true)]
  async fn dropping_the_poller_stops_rescheduling() {
    let source = ScriptedSource::new(vec![Ok(vec![msg_at(1)]), Ok(vec![msg_at(2)])]);
    let (poller, log, _rx) = start(&source);

    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(poller);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(source.calls().len(), 1);
    assert_eq!(lock_log(&log).len(), 1);
  }
}
