//! Scripted fakes for pipeline integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use relaycast::adapters::{
    ApprovalChannel, ApprovalDecision, FeedEntry, FeedSource, PostGenerator, PublishResult,
    Publisher, Transcriber, Transcript,
};
use relaycast::domain::{Item, Platform, Post};
use relaycast::error::PipelineError;
use relaycast::guardrails::Moderator;
use relaycast::pipeline::Orchestrator;
use relaycast::retry::RetryPolicy;
use relaycast::store::Store;

/// A transcript long and varied enough to clear every transcript rule
pub const GOOD_TRANSCRIPT: &str = "In this episode we walk through how the release \
pipeline schedules builds, why the artifact cache occasionally serves stale \
entries, and what the team changed to make deployments reproducible across \
regions without manual intervention from the operators on call.";

/// A draft that clears every post rule
pub const GOOD_POST: &str =
    "We traced the flaky deployments to a stale artifact cache. Full writeup on the channel.";

pub fn entry(source_id: &str, hours_ago: i64) -> FeedEntry {
    FeedEntry {
        source_id: source_id.to_string(),
        title: format!("Video {}", source_id),
        url: format!("https://www.youtube.com/watch?v={}", source_id),
        description: None,
        published_at: Utc::now() - Duration::hours(hours_ago),
        thumbnail_url: None,
    }
}

/// Feed returning a fixed entry list on every poll
pub struct ScriptedFeed {
    pub entries: Mutex<Vec<FeedEntry>>,
    pub calls: AtomicU32,
}

impl ScriptedFeed {
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch_candidates(&self, _window_hours: f64) -> Result<Vec<FeedEntry>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.lock().unwrap().clone())
    }
}

/// Transcriber returning a fixed text, or failing when `text` is None
pub struct ScriptedTranscriber {
    pub text: Option<String>,
    pub calls: AtomicU32,
}

impl ScriptedTranscriber {
    pub fn good() -> Self {
        Self {
            text: Some(GOOD_TRANSCRIPT.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            text: None,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        source_id: &str,
        _preferred_languages: &[String],
    ) -> Result<Transcript, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.text {
            Some(text) => Ok(Transcript {
                text: text.clone(),
                language: "en".to_string(),
                word_count: text.split_whitespace().count(),
            }),
            None => Err(PipelineError::TranscriptNotAvailable(format!(
                "No captions for {}",
                source_id
            ))),
        }
    }
}

/// Generator returning a fixed draft
pub struct ScriptedGenerator {
    pub output: String,
}

impl ScriptedGenerator {
    pub fn good() -> Self {
        Self {
            output: GOOD_POST.to_string(),
        }
    }

    pub fn with_output(output: &str) -> Self {
        Self {
            output: output.to_string(),
        }
    }
}

#[async_trait]
impl PostGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _transcript: &str,
        _platform: Platform,
        _item: &Item,
    ) -> Result<String, PipelineError> {
        Ok(self.output.clone())
    }
}

/// What the scripted publisher does on each call
pub enum PublishScript {
    Succeed,
    RejectContent,
    FailAuth,
    FailTransientAlways,
}

pub struct ScriptedPublisher {
    pub script: PublishScript,
    pub calls: AtomicU32,
}

impl ScriptedPublisher {
    pub fn new(script: PublishScript) -> Self {
        Self {
            script,
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for ScriptedPublisher {
    async fn publish(&self, _content: &str) -> Result<PublishResult, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            PublishScript::Succeed => Ok(PublishResult::published(
                "17923".to_string(),
                "https://threads.net/t/17923".to_string(),
            )),
            PublishScript::RejectContent => {
                Ok(PublishResult::rejected("Media not supported".to_string()))
            }
            PublishScript::FailAuth => {
                Err(PipelineError::Auth("Token expired".to_string()))
            }
            PublishScript::FailTransientAlways => {
                Err(PipelineError::Transient("Connection reset".to_string()))
            }
        }
    }
}

/// Approval channel that records requests and serves queued decisions
#[derive(Default)]
pub struct ScriptedApproval {
    pub requested: Mutex<Vec<i64>>,
    pub queued: Mutex<Vec<ApprovalDecision>>,
}

impl ScriptedApproval {
    pub fn queue(&self, decision: ApprovalDecision) {
        self.queued.lock().unwrap().push(decision);
    }

    pub fn requested_items(&self) -> Vec<i64> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApprovalChannel for ScriptedApproval {
    async fn request_approval(&self, item: &Item, _post: &Post) -> Result<(), PipelineError> {
        self.requested.lock().unwrap().push(item.id);
        Ok(())
    }

    async fn poll_decisions(&self) -> Result<Vec<ApprovalDecision>, PipelineError> {
        Ok(self.queued.lock().unwrap().drain(..).collect())
    }
}

/// Millisecond-scale retry policy so tests never sleep for real
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
    }
}

pub struct Harness {
    pub store: Arc<Store>,
    pub feed: Arc<ScriptedFeed>,
    pub transcriber: Arc<ScriptedTranscriber>,
    pub publisher: Arc<ScriptedPublisher>,
    pub approval: Arc<ScriptedApproval>,
    pub orchestrator: Orchestrator,
}

/// Wire an orchestrator around an in-memory store and scripted fakes
pub fn harness(
    feed_entries: Vec<FeedEntry>,
    generator: ScriptedGenerator,
    publish: PublishScript,
) -> Harness {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let feed = Arc::new(ScriptedFeed::new(feed_entries));
    let transcriber = Arc::new(ScriptedTranscriber::good());
    let publisher = Arc::new(ScriptedPublisher::new(publish));
    let approval = Arc::new(ScriptedApproval::default());

    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&feed) as Arc<dyn FeedSource>,
        Arc::clone(&transcriber) as Arc<dyn Transcriber>,
        Arc::new(generator),
        Arc::clone(&publisher) as Arc<dyn Publisher>,
        Arc::clone(&approval) as Arc<dyn ApprovalChannel>,
        Moderator::default(),
        fast_retry(),
    )
    .with_publish_retry(fast_retry());

    Harness {
        store,
        feed,
        transcriber,
        publisher,
        approval,
        orchestrator,
    }
}
