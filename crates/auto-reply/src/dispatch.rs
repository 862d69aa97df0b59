//! Dispatch loop: polls the message store past the watermark and hands each
//! message to the interpreter, one at a time.
//!
//! The watermark moves past a timestamp once every message carrying it has
//! been handled, never ahead of one that failed. A message that keeps
//! failing is retried every cycle until `max_attempts` is reached, then
//! logged and skipped.

use std::{sync::Arc, time::Duration};

use {
    pincer_channels::MessageStore,
    pincer_common::{ChannelMessage, preview},
    pincer_config::PincerConfig,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use pincer_metrics::{counter, dispatch as dispatch_metrics, gauge, labels};

use crate::{
    Error, Result,
    reply::Interpreter,
    state::RouterState,
};

/// Summary of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Messages returned by the store.
    pub fetched: usize,
    /// Messages the watermark moved past after handling (self replies
    /// included).
    pub handled: usize,
    /// Messages skipped after too many failed attempts.
    pub quarantined: usize,
    /// A message failed and the rest of the batch was left for next cycle.
    pub stalled: bool,
}

/// Consecutive failures of one message.
struct Attempts {
    id: String,
    conversation_id: String,
    count: u32,
}

pub struct DispatchLoop {
    store: Arc<dyn MessageStore>,
    interpreter: Interpreter,
    state: RouterState,
    poll_interval: Duration,
    max_attempts: u32,
    reply_prefix: String,
    failing: Option<Attempts>,
    cancel: CancellationToken,
}

impl DispatchLoop {
    pub fn new(
        config: &PincerConfig,
        store: Arc<dyn MessageStore>,
        interpreter: Interpreter,
        state: RouterState,
    ) -> Self {
        Self {
            store,
            reply_prefix: interpreter.assistant().reply_prefix(),
            interpreter,
            state,
            poll_interval: config.dispatch.poll_interval(),
            max_attempts: config.dispatch.max_attempts,
            failing: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    pub fn into_state(self) -> RouterState {
        self.state
    }

    /// Poll until `cancel` fires. A message in progress is finished first.
    pub async fn run(mut self, cancel: CancellationToken) -> RouterState {
        self.cancel = cancel;
        info!(
            trigger = %format!("@{}", self.interpreter.assistant().name),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            watermark = %self.state.watermark.current(),
            "dispatch loop started"
        );

        while !self.cancel.is_cancelled() {
            match self.poll_once().await {
                Ok(report) if report.fetched > 0 => {
                    debug!(
                        fetched = report.fetched,
                        handled = report.handled,
                        quarantined = report.quarantined,
                        stalled = report.stalled,
                        "poll cycle complete"
                    );
                },
                Ok(_) => {},
                Err(e) => error!(error = %e, "poll cycle failed"),
            }

            tokio::select! {
                () = self.cancel.cancelled() => {},
                () = tokio::time::sleep(self.poll_interval) => {},
            }
        }

        info!(watermark = %self.state.watermark.current(), "dispatch loop stopped");
        self.state
    }

    /// One poll cycle.
    ///
    /// `Err` only when the store query or a watermark save failed; handling
    /// failures are reported through [`CycleReport::stalled`].
    pub async fn poll_once(&mut self) -> Result<CycleReport> {
        #[cfg(feature = "metrics")]
        counter!(dispatch_metrics::POLL_CYCLES_TOTAL).increment(1);

        let mut report = CycleReport::default();

        self.state.registry.refresh();
        let ids = self.state.registry.registered_ids();
        if ids.is_empty() {
            return Ok(report);
        }

        let messages = self
            .store
            .query_after(&ids, self.state.watermark.current())
            .await
            .map_err(Error::Store)?;
        report.fetched = messages.len();

        #[cfg(feature = "metrics")]
        gauge!(dispatch_metrics::BATCH_SIZE).set(messages.len() as f64);

        for (i, message) in messages.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            // Messages sharing a timestamp move the watermark together, after
            // the last of them.
            let closes_group = messages
                .get(i + 1)
                .is_none_or(|next| next.timestamp != message.timestamp);

            if self.is_own_reply(message) {
                debug!(
                    conversation_id = %message.conversation_id,
                    message_id = %message.id,
                    "skipping own reply"
                );
                self.mark_handled(message, closes_group, "self_reply")?;
                report.handled += 1;
                continue;
            }

            let conversation = self.state.registry.get(&message.conversation_id).cloned();
            let result = self
                .interpreter
                .handle(message, conversation.as_ref(), &mut self.state.sessions)
                .await;

            match result {
                Ok(outcome) => {
                    debug!(
                        conversation_id = %message.conversation_id,
                        message_id = %message.id,
                        outcome = outcome.as_str(),
                        "message handled"
                    );
                    self.mark_handled(message, closes_group, outcome.as_str())?;
                    report.handled += 1;
                },
                Err(e) => {
                    if self.record_failure(message, &e) {
                        self.mark_handled(message, closes_group, "quarantined")?;
                        report.quarantined += 1;
                        continue;
                    }
                    report.stalled = true;
                    break;
                },
            }
        }

        Ok(report)
    }

    fn is_own_reply(&self, message: &ChannelMessage) -> bool {
        message.content.trim_start().starts_with(&self.reply_prefix)
    }

    fn mark_handled(
        &mut self,
        message: &ChannelMessage,
        advance: bool,
        _outcome: &'static str,
    ) -> Result<()> {
        if advance {
            self.state.watermark.advance(&message.timestamp)?;
        }
        if self
            .failing
            .as_ref()
            .is_some_and(|a| a.id == message.id && a.conversation_id == message.conversation_id)
        {
            self.failing = None;
        }
        #[cfg(feature = "metrics")]
        counter!(dispatch_metrics::MESSAGES_HANDLED_TOTAL, labels::OUTCOME => _outcome)
            .increment(1);
        Ok(())
    }

    /// Count a failed attempt. Returns `true` when the message has now
    /// failed `max_attempts` times in a row and should be skipped.
    fn record_failure(&mut self, message: &ChannelMessage, err: &Error) -> bool {
        #[cfg(feature = "metrics")]
        counter!(dispatch_metrics::HANDLING_FAILURES_TOTAL).increment(1);

        let count = match &mut self.failing {
            Some(a) if a.id == message.id && a.conversation_id == message.conversation_id => {
                a.count += 1;
                a.count
            },
            _ => {
                self.failing = Some(Attempts {
                    id: message.id.clone(),
                    conversation_id: message.conversation_id.clone(),
                    count: 1,
                });
                1
            },
        };

        if self.max_attempts > 0 && count >= self.max_attempts {
            error!(
                conversation_id = %message.conversation_id,
                message_id = %message.id,
                timestamp = %message.timestamp,
                attempts = count,
                error = %err,
                "giving up on message: {}",
                preview(&message.content, 100)
            );
            #[cfg(feature = "metrics")]
            counter!(dispatch_metrics::MESSAGES_QUARANTINED_TOTAL).increment(1);
            return true;
        }

        warn!(
            conversation_id = %message.conversation_id,
            message_id = %message.id,
            timestamp = %message.timestamp,
            attempt = count,
            error = %err,
            "message handling failed, will retry"
        );
        false
    }
}

impl std::fmt::Debug for DispatchLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchLoop")
            .field("watermark", self.state.watermark.current())
            .field("poll_interval", &self.poll_interval)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        crate::reply::RESET_REPLY,
        pincer_agents::{AgentEngine, EngineReply, EngineRequest},
        pincer_channels::{ChannelOutbound, InMemoryMessageStore},
        pincer_common::Timestamp,
        pincer_config::DataLayout,
        std::sync::{
            Mutex,
            atomic::{AtomicBool, Ordering},
        },
    };

    struct EchoEngine;

    #[async_trait]
    impl AgentEngine for EchoEngine {
        fn name(&self) -> &str {
            "echo"
        }

        async fn run(&self, request: EngineRequest) -> pincer_agents::Result<EngineReply> {
            Ok(EngineReply {
                text: Some("ok".into()),
                session_token: Some(format!("tok-{}", request.prompt.len())),
            })
        }
    }

    #[derive(Default)]
    struct FlakyOutbound {
        down: AtomicBool,
        /// Fail only the reset confirmation.
        fail_reset: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChannelOutbound for FlakyOutbound {
        async fn send_text(&self, _conversation_id: &str, text: &str) -> pincer_channels::Result<()> {
            if self.down.load(Ordering::SeqCst)
                || (self.fail_reset.load(Ordering::SeqCst) && text.contains(RESET_REPLY))
            {
                return Err(pincer_channels::Error::unavailable("transport down"));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        store: Arc<InMemoryMessageStore>,
        outbound: Arc<FlakyOutbound>,
        config: PincerConfig,
    }

    impl Harness {
        fn new(max_attempts: u32) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = PincerConfig::default();
            config.assistant.name = "Assistant".into();
            config.dispatch.max_attempts = max_attempts;
            config.paths.data_dir = Some(dir.path().to_path_buf());

            let layout = DataLayout::new(dir.path());
            let mut registry = pincer_sessions::ConversationRegistry::load(layout.registry_file());
            registry.register("c1", "Ops", None).unwrap();

            Self {
                dir,
                store: Arc::new(InMemoryMessageStore::new()),
                outbound: Arc::new(FlakyOutbound::default()),
                config,
            }
        }

        fn dispatch(&self) -> DispatchLoop {
            let layout = DataLayout::new(self.dir.path());
            let interpreter = Interpreter::new(
                &self.config,
                layout.groups_dir(),
                Arc::new(EchoEngine),
                self.outbound.clone(),
            )
            .unwrap();
            DispatchLoop::new(
                &self.config,
                self.store.clone(),
                interpreter,
                RouterState::load(&layout),
            )
        }

        async fn put(&self, id: &str, ms: i64, content: &str) {
            self.store
                .upsert(&ChannelMessage {
                    id: id.into(),
                    conversation_id: "c1".into(),
                    sender_id: "u1".into(),
                    sender_name: "Alice".into(),
                    content: content.into(),
                    timestamp: Timestamp::from_unix_millis(ms).unwrap(),
                    is_self: false,
                })
                .await
                .unwrap();
        }
    }

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_unix_millis(ms).unwrap()
    }

    #[tokio::test]
    async fn own_replies_are_skipped() {
        let h = Harness::new(5);
        h.put("m1", 1_000, "*Assistant:* @Assistant hello").await;

        let mut dispatch = h.dispatch();
        let report = dispatch.poll_once().await.unwrap();
        assert_eq!(report.handled, 1);
        assert!(h.outbound.sent.lock().unwrap().is_empty());
        assert_eq!(dispatch.state().watermark.current(), &ts(1_000));
    }

    #[tokio::test]
    async fn no_registered_conversations_issues_no_query() {
        let h = Harness::new(5);
        std::fs::remove_file(DataLayout::new(h.dir.path()).registry_file()).unwrap();
        h.put("m1", 1_000, "@Assistant hi").await;

        let mut dispatch = h.dispatch();
        assert_eq!(dispatch.poll_once().await.unwrap(), CycleReport::default());
        assert!(dispatch.state().watermark.current().is_empty());
    }

    #[tokio::test]
    async fn send_failure_blocks_watermark_then_recovers() {
        let h = Harness::new(5);
        h.put("m1", 1_000, "@Assistant one").await;
        h.put("m2", 2_000, "@Assistant two").await;
        h.outbound.down.store(true, Ordering::SeqCst);

        let mut dispatch = h.dispatch();
        let report = dispatch.poll_once().await.unwrap();
        assert!(report.stalled);
        assert_eq!(report.handled, 0);
        assert!(dispatch.state().watermark.current().is_empty());

        h.outbound.down.store(false, Ordering::SeqCst);
        let report = dispatch.poll_once().await.unwrap();
        assert_eq!(report.handled, 2);
        assert_eq!(dispatch.state().watermark.current(), &ts(2_000));
    }

    #[tokio::test]
    async fn same_timestamp_message_is_retried_after_failure() {
        let h = Harness::new(5);
        h.put("m1", 1_000, "@Assistant one").await;
        h.put("m2", 1_000, "/clear").await;
        h.outbound.fail_reset.store(true, Ordering::SeqCst);

        let mut dispatch = h.dispatch();
        let report = dispatch.poll_once().await.unwrap();
        assert_eq!(report.handled, 1);
        assert!(report.stalled);
        // The group is not complete, so the watermark stays put.
        assert!(dispatch.state().watermark.current().is_empty());

        h.outbound.fail_reset.store(false, Ordering::SeqCst);
        let report = dispatch.poll_once().await.unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.handled, 2);
        assert_eq!(dispatch.state().watermark.current(), &ts(1_000));
        let sent = h.outbound.sent.lock().unwrap().clone();
        assert_eq!(
            sent.iter().filter(|t| t.contains(RESET_REPLY)).count(),
            1
        );
    }

    #[tokio::test]
    async fn replaying_group_does_not_reset_attempt_count() {
        let h = Harness::new(2);
        h.put("m1", 1_000, "@Assistant one").await;
        h.put("m2", 1_000, "/clear").await;
        h.outbound.fail_reset.store(true, Ordering::SeqCst);

        let mut dispatch = h.dispatch();
        assert!(dispatch.poll_once().await.unwrap().stalled);
        let report = dispatch.poll_once().await.unwrap();
        assert_eq!(report.quarantined, 1);
        assert_eq!(dispatch.state().watermark.current(), &ts(1_000));
    }

    #[tokio::test]
    async fn poison_message_is_quarantined_after_max_attempts() {
        let h = Harness::new(3);
        h.put("m1", 1_000, "@Assistant one").await;
        h.outbound.down.store(true, Ordering::SeqCst);

        let mut dispatch = h.dispatch();
        for _ in 0..2 {
            let report = dispatch.poll_once().await.unwrap();
            assert!(report.stalled);
            assert!(dispatch.state().watermark.current().is_empty());
        }
        let report = dispatch.poll_once().await.unwrap();
        assert_eq!(report.quarantined, 1);
        assert!(!report.stalled);
        assert_eq!(dispatch.state().watermark.current(), &ts(1_000));
    }

    #[tokio::test]
    async fn zero_max_attempts_retries_forever() {
        let h = Harness::new(0);
        h.put("m1", 1_000, "@Assistant one").await;
        h.outbound.down.store(true, Ordering::SeqCst);

        let mut dispatch = h.dispatch();
        for _ in 0..10 {
            assert!(dispatch.poll_once().await.unwrap().stalled);
        }
        assert!(dispatch.state().watermark.current().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancel() {
        let h = Harness::new(5);
        h.put("m1", 1_000, "@Assistant one").await;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(h.dispatch().run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
        let state = task.await.unwrap();

        assert_eq!(state.watermark.current(), &ts(1_000));
        assert_eq!(state.sessions.len(), 1);
        assert_eq!(h.outbound.sent.lock().unwrap().as_slice(), ["*Assistant:* ok"]);
    }
}
