//! End-to-end ordering properties of the per-channel turn pipeline, driven
//! through the public registry/queue/turn API with a scripted backend and an
//! in-memory platform surface.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::http::Http;
use serenity::model::id::ChannelId;
use tokio::sync::{mpsc, oneshot, Mutex};

use tether_agent::{
    AiThread, BackendError, ContentPart, FilePayload, FileRef, StreamEvent, ThreadService,
    TurnRequest,
};
use tether_discord::error::DiscordError;
use tether_discord::registry::{ChatRegistry, Session};
use tether_discord::surface::{ChatSurface, MessageHandle};
use tether_discord::turn::{run_turn, InboundTurn, TurnSettings};

struct NullSurface;

#[async_trait]
impl ChatSurface for NullSurface {
    async fn reply(&self, _text: &str) -> Result<MessageHandle, DiscordError> {
        Ok(MessageHandle(1))
    }
    async fn send(&self, _text: &str) -> Result<MessageHandle, DiscordError> {
        Ok(MessageHandle(2))
    }
    async fn edit(&self, _message: MessageHandle, _text: &str) -> Result<(), DiscordError> {
        Ok(())
    }
    async fn typing(&self) {}
}

/// Records `start`/`end` markers per submitted turn, with a pause in between
/// so overlapping execution would interleave the log.
struct EchoThread {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AiThread for EchoThread {
    async fn upload_file(&self, file: FilePayload) -> Result<FileRef, BackendError> {
        Ok(FileRef {
            id: "f".into(),
            name: file.name,
        })
    }

    async fn stream_turn(
        &self,
        req: TurnRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), BackendError> {
        let label = turn_label(&req);
        self.log.lock().await.push(format!("start {label}"));
        tokio::time::sleep(Duration::from_millis(15)).await;
        let _ = tx
            .send(StreamEvent::TextDelta { text: "ok".into() })
            .await;
        self.log.lock().await.push(format!("end {label}"));
        Ok(())
    }
}

/// Fails the first submission, succeeds afterwards.
struct FlakyThread {
    log: Arc<Mutex<Vec<String>>>,
    failed_once: Mutex<bool>,
}

#[async_trait]
impl AiThread for FlakyThread {
    async fn upload_file(&self, file: FilePayload) -> Result<FileRef, BackendError> {
        Ok(FileRef {
            id: "f".into(),
            name: file.name,
        })
    }

    async fn stream_turn(
        &self,
        req: TurnRequest,
        _tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), BackendError> {
        let mut failed = self.failed_once.lock().await;
        if !*failed {
            *failed = true;
            return Err(BackendError::Api {
                status: 500,
                body: "backend down".into(),
            });
        }
        self.log.lock().await.push(turn_label(&req));
        Ok(())
    }
}

/// Never yields an event and never returns.
struct HangingThread;

#[async_trait]
impl AiThread for HangingThread {
    async fn upload_file(&self, file: FilePayload) -> Result<FileRef, BackendError> {
        Ok(FileRef {
            id: "f".into(),
            name: file.name,
        })
    }

    async fn stream_turn(
        &self,
        _req: TurnRequest,
        _tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), BackendError> {
        std::future::pending().await
    }
}

/// Hands out pre-scripted threads, one per `create_thread` call.
struct ScriptedService {
    threads: Mutex<VecDeque<Arc<dyn AiThread>>>,
}

impl ScriptedService {
    fn new(threads: Vec<Arc<dyn AiThread>>) -> Arc<Self> {
        Arc::new(Self {
            threads: Mutex::new(threads.into()),
        })
    }
}

#[async_trait]
impl ThreadService for ScriptedService {
    async fn create_thread(&self) -> Result<Arc<dyn AiThread>, BackendError> {
        Ok(self
            .threads
            .lock()
            .await
            .pop_front()
            .expect("no scripted thread left"))
    }
}

fn turn_label(req: &TurnRequest) -> String {
    match req.contents.first() {
        Some(ContentPart::Text { text }) => text.lines().last().unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

fn settings() -> TurnSettings {
    TurnSettings {
        reply_window: 10,
        max_attachment_bytes: u64::MAX,
        model_label: "test".into(),
    }
}

fn turn(text: &str) -> InboundTurn {
    InboundTurn {
        author_id: 9,
        author_name: "U".into(),
        author_tag: "u#0".into(),
        text: text.into(),
        attachments: Vec::new(),
        reply_target: None,
    }
}

/// Queue a full turn the way the event handler does, swallowing failures.
fn enqueue_turn(session: &Arc<Session>, http: &Arc<Http>, text: &str) {
    let worker_session = Arc::clone(session);
    let http = Arc::clone(http);
    let inbound = turn(text);
    let settings = settings();
    session.queue.enqueue(async move {
        let _ = run_turn(
            &worker_session,
            &NullSurface,
            &http,
            ChannelId::new(1),
            inbound,
            &settings,
        )
        .await;
    });
}

async fn drained(session: &Arc<Session>) {
    let (tx, rx) = oneshot::channel();
    session.queue.enqueue(async move {
        let _ = tx.send(());
    });
    tokio::time::timeout(Duration::from_secs(10), rx)
        .await
        .expect("queue stalled")
        .unwrap();
}

#[tokio::test]
async fn burst_of_turns_runs_serially_in_arrival_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let service = ScriptedService::new(vec![Arc::new(EchoThread {
        log: Arc::clone(&log),
    })]);
    let registry = ChatRegistry::new(service, None);
    let session = registry.get_or_create(1).await.unwrap();
    let http = Arc::new(Http::new(""));

    for i in 0..5 {
        enqueue_turn(&session, &http, &format!("turn-{i}"));
    }
    drained(&session).await;

    let log = log.lock().await;
    let expected: Vec<String> = (0..5)
        .flat_map(|i| [format!("start turn-{i}"), format!("end turn-{i}")])
        .collect();
    assert_eq!(*log, expected);
}

#[tokio::test]
async fn failed_turn_does_not_block_the_queue() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let service = ScriptedService::new(vec![Arc::new(FlakyThread {
        log: Arc::clone(&log),
        failed_once: Mutex::new(false),
    })]);
    let registry = ChatRegistry::new(service, None);
    let session = registry.get_or_create(1).await.unwrap();
    let http = Arc::new(Http::new(""));

    enqueue_turn(&session, &http, "doomed");
    enqueue_turn(&session, &http, "survivor");
    drained(&session).await;

    assert_eq!(*log.lock().await, vec!["survivor".to_string()]);
}

#[tokio::test]
async fn channels_do_not_block_each_other() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let service = ScriptedService::new(vec![
        Arc::new(HangingThread),
        Arc::new(EchoThread {
            log: Arc::clone(&log),
        }),
    ]);
    let registry = ChatRegistry::new(service, None);
    let http = Arc::new(Http::new(""));

    // The first channel's backend call never resolves.
    let stuck = registry.get_or_create(1).await.unwrap();
    enqueue_turn(&stuck, &http, "stuck");

    // The second channel still makes progress.
    let live = registry.get_or_create(2).await.unwrap();
    enqueue_turn(&live, &http, "independent");
    drained(&live).await;

    assert_eq!(
        *log.lock().await,
        vec!["start independent".to_string(), "end independent".to_string()]
    );
}
