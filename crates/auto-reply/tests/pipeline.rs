//! End-to-end tests for ingest → store → dispatch → interpreter → outbound.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    chrono::{TimeZone, Utc},
    pincer_agents::{AgentEngine, EngineReply, EngineRequest, persona},
    pincer_auto_reply::{DispatchLoop, IngestHandler, Interpreter, RouterState},
    pincer_channels::{
        ChannelOutbound, InMemoryMessageStore, InboundEvent, InboundSink, MessageContent,
        MessageStore,
    },
    pincer_common::Timestamp,
    pincer_config::{DataLayout, PincerConfig},
    pincer_sessions::ConversationRegistry,
};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Engine that answers every prompt and records what it was asked.
#[derive(Default)]
struct RecordingEngine {
    requests: Mutex<Vec<EngineRequest>>,
}

impl RecordingEngine {
    fn requests(&self) -> Vec<EngineRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The stripped message text embedded in each prompt.
    fn contents(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.prompt.split("\n\n").nth(1).unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl AgentEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    async fn run(&self, request: EngineRequest) -> pincer_agents::Result<EngineReply> {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests.push(request);
        Ok(EngineReply {
            text: Some(format!("answer {}", requests.len())),
            session_token: Some(format!("session-{}", requests.len())),
        })
    }
}

/// Outbound that fails every send whose text contains `fail_on`.
#[derive(Default)]
struct RecordingOutbound {
    fail_on: Mutex<HashSet<String>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingOutbound {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn send_text(&self, conversation_id: &str, text: &str) -> pincer_channels::Result<()> {
        let fail_on = self.fail_on.lock().unwrap_or_else(|e| e.into_inner());
        if fail_on.iter().any(|f| text.contains(f.as_str())) {
            return Err(pincer_channels::Error::unavailable("connection reset"));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((conversation_id.to_string(), text.to_string()));
        Ok(())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

struct Pipeline {
    dir: tempfile::TempDir,
    config: PincerConfig,
    store: Arc<InMemoryMessageStore>,
    engine: Arc<RecordingEngine>,
    outbound: Arc<RecordingOutbound>,
    ingest: IngestHandler,
}

impl Pipeline {
    fn new(registered: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PincerConfig::default();
        config.assistant.name = "Assistant".into();
        config.paths.data_dir = Some(dir.path().to_path_buf());

        let layout = DataLayout::new(dir.path());
        let mut registry = ConversationRegistry::load(layout.registry_file());
        for id in registered {
            registry.register(id, &format!("Group {id}"), None).unwrap();
        }

        let store = Arc::new(InMemoryMessageStore::new());
        let ingest = IngestHandler::new(
            store.clone(),
            ConversationRegistry::load(layout.registry_file()),
        );
        Self {
            dir,
            config,
            store,
            engine: Arc::new(RecordingEngine::default()),
            outbound: Arc::new(RecordingOutbound::default()),
            ingest,
        }
    }

    fn layout(&self) -> DataLayout {
        DataLayout::new(self.dir.path())
    }

    /// A fresh dispatch loop built from the state on disk, as after a restart.
    fn boot(&self) -> DispatchLoop {
        let interpreter = Interpreter::new(
            &self.config,
            self.layout().groups_dir(),
            self.engine.clone(),
            self.outbound.clone(),
        )
        .unwrap();
        DispatchLoop::new(
            &self.config,
            self.store.clone(),
            interpreter,
            RouterState::load(&self.layout()),
        )
    }

    async fn deliver(&self, conversation_id: &str, id: &str, secs: i64, text: &str) {
        self.ingest
            .on_event(InboundEvent {
                id: id.into(),
                conversation_id: conversation_id.into(),
                sender_id: "u1".into(),
                sender_name: Some("Alice".into()),
                content: MessageContent::text(text),
                sent_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
                is_self: false,
            })
            .await;
    }
}

fn at(secs: i64) -> Timestamp {
    Timestamp::from_datetime(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn crash_while_handling_resumes_from_failed_message() {
    let p = Pipeline::new(&["g1"]);
    for i in 1..=5 {
        p.deliver("g1", &format!("m{i}"), i, &format!("@Assistant q{i}"))
            .await;
    }

    // Replying to the third query fails; the process then dies.
    p.outbound
        .fail_on
        .lock()
        .unwrap()
        .insert("answer 3".into());
    {
        let mut dispatch = p.boot();
        let report = dispatch.poll_once().await.unwrap();
        assert!(report.stalled);
        assert_eq!(report.handled, 2);
        assert_eq!(dispatch.state().watermark.current(), &at(2));
    }
    assert_eq!(p.engine.contents(), ["q1", "q2", "q3"]);

    p.outbound.fail_on.lock().unwrap().clear();
    let mut dispatch = p.boot();
    assert_eq!(dispatch.state().watermark.current(), &at(2));
    let report = dispatch.poll_once().await.unwrap();
    assert_eq!(report.handled, 3);
    assert_eq!(dispatch.state().watermark.current(), &at(5));

    // q1 and q2 are not asked again; q3 is retried.
    assert_eq!(p.engine.contents(), ["q1", "q2", "q3", "q3", "q4", "q5"]);
}

#[tokio::test]
async fn watermark_never_moves_backwards() {
    let p = Pipeline::new(&["g1"]);
    p.deliver("g1", "m1", 10, "chatter").await;
    let mut dispatch = p.boot();
    dispatch.poll_once().await.unwrap();
    assert_eq!(dispatch.state().watermark.current(), &at(10));

    // A late delivery with an older timestamp is never fetched.
    p.deliver("g1", "m0", 5, "@Assistant late").await;
    let report = dispatch.poll_once().await.unwrap();
    assert_eq!(report.fetched, 0);
    assert_eq!(dispatch.state().watermark.current(), &at(10));
    assert!(p.engine.requests().is_empty());

    let persisted = RouterState::load(&p.layout());
    assert_eq!(persisted.watermark.current(), &at(10));
}

#[tokio::test]
async fn reset_round_trip() {
    let p = Pipeline::new(&["g1"]);
    p.deliver("g1", "m1", 1, "@Assistant remember me").await;
    p.deliver("g1", "m2", 2, "/clear").await;
    p.deliver("g1", "m3", 3, "@Assistant who am I?").await;
    p.deliver("g1", "m4", 4, "@Assistant and now?").await;

    let mut dispatch = p.boot();
    dispatch.poll_once().await.unwrap();

    let tokens: Vec<Option<String>> = p
        .engine
        .requests()
        .into_iter()
        .map(|r| r.session_token)
        .collect();
    assert_eq!(tokens, [None, None, Some("session-2".to_string())]);

    let replies: Vec<String> = p.outbound.sent().into_iter().map(|(_, t)| t).collect();
    assert_eq!(replies, [
        "*Assistant:* answer 1",
        "*Assistant:* Conversation cleared! Starting fresh.",
        "*Assistant:* answer 2",
        "*Assistant:* answer 3",
    ]);
}

#[tokio::test]
async fn trigger_is_stripped_and_bare_trigger_ignored() {
    let p = Pipeline::new(&["g1"]);
    p.deliver("g1", "m1", 1, "@Assistant  what time is it?").await;
    p.deliver("g1", "m2", 2, "@Assistant").await;

    let mut dispatch = p.boot();
    let report = dispatch.poll_once().await.unwrap();
    assert_eq!(report.handled, 2);
    assert_eq!(p.engine.contents(), ["what time is it?"]);
    assert_eq!(p.outbound.sent().len(), 1);
}

#[tokio::test]
async fn unregistered_conversation_gets_nothing() {
    let p = Pipeline::new(&["g1"]);
    p.deliver("stranger", "m1", 1, "@Assistant hello").await;

    assert_eq!(p.store.count("stranger").await.unwrap(), 0);
    let mut dispatch = p.boot();
    dispatch.poll_once().await.unwrap();
    assert!(p.engine.requests().is_empty());
    assert!(p.outbound.sent().is_empty());
}

#[tokio::test]
async fn duplicate_delivery_replies_once() {
    let p = Pipeline::new(&["g1"]);
    p.deliver("g1", "m1", 1, "@Assistant hi").await;
    p.deliver("g1", "m1", 1, "@Assistant hi").await;

    let mut dispatch = p.boot();
    let report = dispatch.poll_once().await.unwrap();
    assert_eq!(report.fetched, 1);

    // Redelivery after handling is below the watermark.
    p.deliver("g1", "m1", 1, "@Assistant hi").await;
    dispatch.poll_once().await.unwrap();
    assert_eq!(p.outbound.sent().len(), 1);
}

#[tokio::test]
async fn echoed_reply_is_not_answered() {
    let p = Pipeline::new(&["g1"]);
    p.deliver("g1", "m1", 1, "*Assistant:* @Assistant loops are bad").await;

    let mut dispatch = p.boot();
    let report = dispatch.poll_once().await.unwrap();
    assert_eq!(report.handled, 1);
    assert!(p.engine.requests().is_empty());
    assert!(p.outbound.sent().is_empty());
}

#[tokio::test]
async fn persona_update_keeps_memories() {
    let p = Pipeline::new(&["g1"]);
    let workdir = p.layout().groups_dir().join("group-g1");
    std::fs::create_dir_all(&workdir).unwrap();
    std::fs::write(
        workdir.join(persona::DOCUMENT_FILE),
        "# Assistant\n\nOld.\n\n## Memories\nfoo\n\n## Saved Files\nbar.txt — x\n",
    )
    .unwrap();

    p.deliver("g1", "m1", 1, "/personality Be terse").await;
    let mut dispatch = p.boot();
    dispatch.poll_once().await.unwrap();

    let doc = persona::InstructionDocument::parse(
        &std::fs::read_to_string(workdir.join(persona::DOCUMENT_FILE)).unwrap(),
    );
    assert_eq!(doc.instructions, "Be terse");
    assert_eq!(doc.memories, "foo");
    assert_eq!(doc.saved_files, "bar.txt — x");
}

#[tokio::test]
async fn conversations_keep_separate_sessions() {
    let p = Pipeline::new(&["g1", "g2"]);
    p.deliver("g1", "a1", 1, "@Assistant one").await;
    p.deliver("g2", "b1", 2, "@Assistant two").await;
    p.deliver("g1", "a2", 3, "@Assistant three").await;

    let mut dispatch = p.boot();
    dispatch.poll_once().await.unwrap();

    let requests = p.engine.requests();
    assert_eq!(requests[0].session_token, None);
    assert_eq!(requests[1].session_token, None);
    assert_eq!(requests[2].session_token.as_deref(), Some("session-1"));
    assert_eq!(dispatch.state().sessions.get("g2"), Some("session-2"));
}
