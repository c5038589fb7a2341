// End-to-end scenarios across the whole stack: schedules persisted in an
// in-memory store, dispatcher ticks driving the studio executor, fake
// generation/post/ledger/transport collaborators, real publish pipeline.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use dreamfeed_core::config::StudioConfig;
use dreamfeed_core::{MediaRef, Platform, Post, PostId, PostStatus, UserId};
use dreamfeed_publish::{
    Connection, PublishRecordStore, Publisher, SocialProfile, SocialTransport, SubmitReceipt,
    SubmitRequest, TransportError,
};
use dreamfeed_scheduler::{
    ActionType, CalendarError, CalendarLookup, CalendarSlot, Dispatcher, NewSchedule, NoCalendar,
    ScheduleKind, ScheduleManager, ScheduleStatus, ScheduleStore, TriggerResolver,
};
use dreamfeed_studio::{
    GenerationBackend, GenerationError, GenerationJob, GenerationRequest, GenerationStart,
    JobState, LedgerError, PointsLedger, PostDraft, PostStore, PostStoreError, StudioExecutor,
    WaitPolicy,
};

// ---- fake collaborators ----------------------------------------------------

enum BackendMode {
    /// Every generation returns an artifact synchronously.
    Immediate,
    /// Every generation queues a job; `get_job` walks the probe script, the
    /// last entry repeating once exhausted.
    Queued(Vec<GenerationJob>),
}

struct FakeBackend {
    mode: BackendMode,
    probes: Mutex<usize>,
    starts: Mutex<u32>,
}

impl FakeBackend {
    fn immediate() -> Arc<Self> {
        Arc::new(Self {
            mode: BackendMode::Immediate,
            probes: Mutex::new(0),
            starts: Mutex::new(0),
        })
    }

    fn queued(script: Vec<GenerationJob>) -> Arc<Self> {
        Arc::new(Self {
            mode: BackendMode::Queued(script),
            probes: Mutex::new(0),
            starts: Mutex::new(0),
        })
    }

    fn start_count(&self) -> u32 {
        *self.starts.lock().unwrap()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn start_generation(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GenerationStart, GenerationError> {
        let mut starts = self.starts.lock().unwrap();
        *starts += 1;
        match self.mode {
            BackendMode::Immediate => Ok(GenerationStart::Immediate {
                artifact_url: format!("https://cdn.example/gen-{starts}.png"),
            }),
            BackendMode::Queued(_) => Ok(GenerationStart::Queued {
                job_id: "job-1".to_string(),
            }),
        }
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<GenerationJob>, GenerationError> {
        let BackendMode::Queued(script) = &self.mode else {
            return Ok(None);
        };
        let mut cursor = self.probes.lock().unwrap();
        let idx = (*cursor).min(script.len() - 1);
        *cursor += 1;
        Ok(Some(GenerationJob {
            id: job_id.to_string(),
            ..script[idx].clone()
        }))
    }
}

fn job(state: JobState, artifacts: &[&str]) -> GenerationJob {
    GenerationJob {
        id: String::new(),
        state,
        artifacts: artifacts.iter().map(|s| s.to_string()).collect(),
        webhook_completed: false,
    }
}

struct MemoryPosts {
    posts: Mutex<Vec<Post>>,
}

impl MemoryPosts {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            posts: Mutex::new(Vec::new()),
        })
    }

    fn insert(&self, post: Post) {
        self.posts.lock().unwrap().push(post);
    }

    fn all(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostStore for MemoryPosts {
    async fn create_image_post(&self, draft: &PostDraft) -> Result<Post, PostStoreError> {
        let post = Post {
            id: PostId::new(),
            owner_id: draft.owner_id.clone(),
            caption: draft.caption.clone(),
            media: vec![MediaRef::image(draft.media_url.clone())],
            platforms: draft.platforms.clone(),
            nsfw: draft.nsfw,
            status: PostStatus::Ready,
            created_at: Utc::now(),
        };
        self.insert(post.clone());
        Ok(post)
    }

    async fn create_video_post(&self, draft: &PostDraft) -> Result<Post, PostStoreError> {
        let post = Post {
            id: PostId::new(),
            owner_id: draft.owner_id.clone(),
            caption: draft.caption.clone(),
            media: vec![MediaRef::video(draft.media_url.clone())],
            platforms: draft.platforms.clone(),
            nsfw: draft.nsfw,
            status: PostStatus::Ready,
            created_at: Utc::now(),
        };
        self.insert(post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: &PostId) -> Result<Option<Post>, PostStoreError> {
        Ok(self.posts.lock().unwrap().iter().find(|p| &p.id == id).cloned())
    }

    async fn update_status(&self, id: &PostId, status: PostStatus) -> Result<(), PostStoreError> {
        let mut posts = self.posts.lock().unwrap();
        let post = posts
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| PostStoreError(format!("no post {id}")))?;
        post.status = status;
        Ok(())
    }
}

struct RecordingLedger {
    charges: Mutex<Vec<(i64, String)>>,
}

impl RecordingLedger {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            charges: Mutex::new(Vec::new()),
        })
    }

    fn total(&self) -> i64 {
        self.charges.lock().unwrap().iter().map(|(a, _)| a).sum()
    }
}

#[async_trait]
impl PointsLedger for RecordingLedger {
    async fn deduct(&self, _owner: &UserId, amount: i64, reason: &str) -> Result<(), LedgerError> {
        self.charges
            .lock()
            .unwrap()
            .push((amount, reason.to_string()));
        Ok(())
    }
}

struct ConnectedTransport {
    platforms: Vec<Platform>,
    submits: Mutex<u32>,
}

impl ConnectedTransport {
    fn new(platforms: &[Platform]) -> Arc<Self> {
        Arc::new(Self {
            platforms: platforms.to_vec(),
            submits: Mutex::new(0),
        })
    }

    fn submit_count(&self) -> u32 {
        *self.submits.lock().unwrap()
    }
}

#[async_trait]
impl SocialTransport for ConnectedTransport {
    async fn resolve_profile(
        &self,
        _owner: &UserId,
    ) -> Result<Option<SocialProfile>, TransportError> {
        Ok(Some(SocialProfile {
            profile_id: "prof-1".to_string(),
            connections: self
                .platforms
                .iter()
                .map(|p| Connection {
                    platform: *p,
                    connection_id: format!("conn-{p}"),
                })
                .collect(),
        }))
    }

    async fn submit_post(&self, _request: &SubmitRequest) -> Result<SubmitReceipt, TransportError> {
        *self.submits.lock().unwrap() += 1;
        Ok(SubmitReceipt {
            remote_post_id: "remote-1".to_string(),
        })
    }
}

// ---- harness ---------------------------------------------------------------

struct Harness {
    store: Arc<ScheduleStore>,
    manager: Arc<ScheduleManager>,
    dispatcher: Dispatcher,
    posts: Arc<MemoryPosts>,
    ledger: Arc<RecordingLedger>,
    records: Arc<PublishRecordStore>,
}

struct HarnessOptions {
    backend: Arc<FakeBackend>,
    transport: Arc<ConnectedTransport>,
    calendar: Arc<dyn CalendarLookup>,
    wait_policy: WaitPolicy,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            backend: FakeBackend::immediate(),
            transport: ConnectedTransport::new(&[]),
            calendar: Arc::new(NoCalendar),
            wait_policy: WaitPolicy::default(),
        }
    }
}

fn harness(options: HarnessOptions) -> Harness {
    let store = Arc::new(
        ScheduleStore::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap(),
    );
    let manager = Arc::new(ScheduleManager::new(
        store.clone(),
        TriggerResolver::new(options.calendar),
    ));
    let posts = MemoryPosts::new();
    let ledger = RecordingLedger::new();
    let records = Arc::new(
        PublishRecordStore::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap(),
    );
    let publisher = Arc::new(Publisher::new(options.transport, records.clone()));
    let executor = Arc::new(StudioExecutor::new(
        options.backend,
        posts.clone(),
        ledger.clone(),
        publisher,
        options.wait_policy,
        StudioConfig::default(),
    ));
    let dispatcher = Dispatcher::new(
        store.clone(),
        manager.clone(),
        executor,
        Duration::from_secs(60),
    );
    Harness {
        store,
        manager,
        dispatcher,
        posts,
        ledger,
        records,
    }
}

fn owner() -> UserId {
    "user-e2e".into()
}

async fn create_due_single(h: &Harness, action_data: serde_json::Value) -> dreamfeed_scheduler::Schedule {
    let schedule = h
        .manager
        .create(NewSchedule {
            owner_id: owner(),
            kind: ScheduleKind::Single,
            name: "one shot".to_string(),
            action_type: ActionType::GenerateImage,
            action_data,
            scheduled_for: Some(Utc::now() + ChronoDuration::hours(1)),
            cron_expression: None,
            calendar_id: None,
            max_executions: None,
            end_date: None,
        })
        .await
        .unwrap();
    // Creation demands a future time; rewind it so the next tick is due.
    let mut due = schedule.clone();
    due.scheduled_for = Some(Utc::now() - ChronoDuration::seconds(1));
    h.store.update_definition(&due).unwrap();
    schedule
}

fn force_due(h: &Harness, schedule: &dreamfeed_scheduler::Schedule) {
    let mut rewound = h.manager.get(&schedule.id, &schedule.owner_id).unwrap();
    rewound.next_execution_at = Some(Utc::now() - ChronoDuration::minutes(1));
    rewound.updated_at = Utc::now();
    h.store.update_definition(&rewound).unwrap();
}

// ---- scenarios -------------------------------------------------------------

// Scenario: a due single image schedule completes and its post references the
// generated artifact.
#[tokio::test]
async fn single_image_schedule_completes_with_post() {
    let h = harness(HarnessOptions::default());
    let schedule = create_due_single(&h, serde_json::json!({ "prompt": "sunrise" })).await;

    h.dispatcher.tick().await;

    let done = h.manager.get(&schedule.id, &owner()).unwrap();
    assert_eq!(done.status, ScheduleStatus::Completed);
    assert!(done.executed_at.is_some());

    let posts = h.posts.all();
    assert_eq!(posts.len(), 1);
    let result = done.result.unwrap();
    assert_eq!(result["post_id"], posts[0].id.as_str());
    assert_eq!(result["artifact_url"], posts[0].media[0].url);
    assert_eq!(h.ledger.total(), 5);
}

// Scenario: a minutely recurring schedule capped at two runs completes after
// two dispatch cycles with two generated posts.
#[tokio::test]
async fn recurring_schedule_generates_until_cap() {
    let h = harness(HarnessOptions::default());
    let schedule = h
        .manager
        .create(NewSchedule {
            owner_id: owner(),
            kind: ScheduleKind::Recurring,
            name: "minutely".to_string(),
            action_type: ActionType::GenerateImage,
            action_data: serde_json::json!({ "prompt": "skyline" }),
            scheduled_for: None,
            cron_expression: Some("* * * * *".to_string()),
            calendar_id: None,
            max_executions: Some(2),
            end_date: None,
        })
        .await
        .unwrap();

    for _ in 0..2 {
        force_due(&h, &schedule);
        h.dispatcher.tick().await;
    }

    let done = h.manager.get(&schedule.id, &owner()).unwrap();
    assert_eq!(done.status, ScheduleStatus::Completed);
    assert_eq!(done.execution_count, 2);
    assert_eq!(done.generated_post_ids.len(), 2);
    assert!(done.next_execution_at.is_none());
    assert_eq!(h.posts.all().len(), 2);
    assert_eq!(h.ledger.total(), 10);
}

// Scenario: the provider queues a job that then fails; the schedule fails
// without waiting out the full deadline.
#[tokio::test]
async fn queued_generation_failure_fails_schedule() {
    let backend = FakeBackend::queued(vec![
        job(JobState::Pending, &[]),
        job(JobState::Processing, &[]),
        job(JobState::Failed, &[]),
    ]);
    let h = harness(HarnessOptions {
        backend: backend.clone(),
        wait_policy: WaitPolicy {
            max_wait_ms: 5_000,
            poll_interval_ms: 50,
        },
        ..Default::default()
    });
    let schedule = create_due_single(&h, serde_json::json!({ "prompt": "doomed" })).await;

    let started = std::time::Instant::now();
    h.dispatcher.tick().await;
    assert!(started.elapsed() < Duration::from_secs(2));

    let done = h.manager.get(&schedule.id, &owner()).unwrap();
    assert_eq!(done.status, ScheduleStatus::Failed);
    assert!(done
        .last_error
        .unwrap()
        .contains("failed or timed out"));
    assert_eq!(backend.start_count(), 1);
    // The charge was taken before the provider failed; no refund here.
    assert_eq!(h.ledger.total(), 5);
    assert!(h.posts.all().is_empty());
}

// Scenario: a queued job completes after a few probes; the post carries the
// job's artifact.
#[tokio::test]
async fn queued_generation_completes_after_polling() {
    let backend = FakeBackend::queued(vec![
        job(JobState::Pending, &[]),
        job(JobState::Completed, &["https://cdn.example/late.png"]),
    ]);
    let h = harness(HarnessOptions {
        backend,
        wait_policy: WaitPolicy {
            max_wait_ms: 5_000,
            poll_interval_ms: 20,
        },
        ..Default::default()
    });
    let schedule = create_due_single(&h, serde_json::json!({ "prompt": "patience" })).await;

    h.dispatcher.tick().await;

    let done = h.manager.get(&schedule.id, &owner()).unwrap();
    assert_eq!(done.status, ScheduleStatus::Completed);
    let posts = h.posts.all();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].media[0].url, "https://cdn.example/late.png");
}

// Scenario: a calendar-triggered recurring schedule completes once its
// calendar runs out of slots, instead of idling active forever.
#[tokio::test]
async fn calendar_schedule_completes_when_exhausted() {
    struct OneSlot {
        served: Mutex<bool>,
    }

    #[async_trait]
    impl CalendarLookup for OneSlot {
        async fn next_available_slot(
            &self,
            _calendar_id: &str,
            _after: chrono::DateTime<Utc>,
        ) -> Result<Option<CalendarSlot>, CalendarError> {
            let mut served = self.served.lock().unwrap();
            if *served {
                return Ok(None);
            }
            *served = true;
            Ok(Some(CalendarSlot {
                starts_at: Utc::now() - ChronoDuration::minutes(1),
            }))
        }
    }

    let h = harness(HarnessOptions {
        calendar: Arc::new(OneSlot {
            served: Mutex::new(false),
        }),
        ..Default::default()
    });
    let schedule = h
        .manager
        .create(NewSchedule {
            owner_id: owner(),
            kind: ScheduleKind::Recurring,
            name: "calendar drops".to_string(),
            action_type: ActionType::GenerateImage,
            action_data: serde_json::json!({ "prompt": "slotted" }),
            scheduled_for: None,
            cron_expression: None,
            calendar_id: Some("cal-1".to_string()),
            max_executions: None,
            end_date: None,
        })
        .await
        .unwrap();

    h.dispatcher.tick().await;

    let done = h.manager.get(&schedule.id, &owner()).unwrap();
    assert_eq!(done.status, ScheduleStatus::Completed);
    assert_eq!(done.execution_count, 1);
    assert_eq!(done.generated_post_ids.len(), 1);
    assert_eq!(h.posts.all().len(), 1);
}

// Scenario: auto-publish delivers the generated post and records it.
#[tokio::test]
async fn auto_publish_delivers_generated_post() {
    let transport = ConnectedTransport::new(&[Platform::X, Platform::Reddit]);
    let h = harness(HarnessOptions {
        transport: transport.clone(),
        ..Default::default()
    });
    let schedule = create_due_single(
        &h,
        serde_json::json!({
            "prompt": "launch day",
            "caption": "it's live",
            "auto_publish": true,
            "platforms": ["x", "reddit"]
        }),
    )
    .await;

    h.dispatcher.tick().await;

    let done = h.manager.get(&schedule.id, &owner()).unwrap();
    assert_eq!(done.status, ScheduleStatus::Completed);
    let publish = &done.result.unwrap()["publish"];
    assert_eq!(publish["published"], true);
    assert_eq!(publish["remote_post_id"], "remote-1");

    assert_eq!(transport.submit_count(), 1);
    let posts = h.posts.all();
    assert_eq!(posts[0].status, PostStatus::Published);
    assert_eq!(h.records.list_for_post(&posts[0].id).unwrap().len(), 2);
}

// Scenario: the content policy empties the platform set; generation still
// completes and the skip is recorded.
#[tokio::test]
async fn nsfw_filtered_auto_publish_still_completes() {
    let transport = ConnectedTransport::new(&[Platform::Instagram]);
    let h = harness(HarnessOptions {
        transport: transport.clone(),
        ..Default::default()
    });
    let schedule = create_due_single(
        &h,
        serde_json::json!({
            "prompt": "after dark",
            "nsfw": true,
            "auto_publish": true,
            "platforms": ["instagram"]
        }),
    )
    .await;

    h.dispatcher.tick().await;

    let done = h.manager.get(&schedule.id, &owner()).unwrap();
    assert_eq!(done.status, ScheduleStatus::Completed);
    let publish = &done.result.unwrap()["publish"];
    assert_eq!(publish["published"], false);
    assert_eq!(publish["detail"], "nsfw_filtered");
    assert_eq!(transport.submit_count(), 0);
    // The post exists; it just was not delivered anywhere.
    assert_eq!(h.posts.all().len(), 1);
}

// Scenario: a publish-type schedule pushes an existing post.
#[tokio::test]
async fn publish_post_schedule_delivers_existing_post() {
    let transport = ConnectedTransport::new(&[Platform::X]);
    let h = harness(HarnessOptions {
        transport: transport.clone(),
        ..Default::default()
    });

    let post = Post {
        id: "p-existing".into(),
        owner_id: owner(),
        caption: Some("archive drop".to_string()),
        media: vec![MediaRef::image("https://cdn.example/old.png")],
        platforms: vec![Platform::X],
        nsfw: false,
        status: PostStatus::Ready,
        created_at: Utc::now(),
    };
    h.posts.insert(post);

    let schedule = h
        .manager
        .create(NewSchedule {
            owner_id: owner(),
            kind: ScheduleKind::Single,
            name: "push archive".to_string(),
            action_type: ActionType::PublishPost,
            action_data: serde_json::json!({ "post_id": "p-existing" }),
            scheduled_for: Some(Utc::now() + ChronoDuration::hours(1)),
            cron_expression: None,
            calendar_id: None,
            max_executions: None,
            end_date: None,
        })
        .await
        .unwrap();
    let mut due = schedule.clone();
    due.scheduled_for = Some(Utc::now() - ChronoDuration::seconds(1));
    h.store.update_definition(&due).unwrap();

    h.dispatcher.tick().await;

    let done = h.manager.get(&schedule.id, &owner()).unwrap();
    assert_eq!(done.status, ScheduleStatus::Completed);
    assert_eq!(transport.submit_count(), 1);
    // No generation happened, so nothing was charged.
    assert_eq!(h.ledger.total(), 0);
    let posts = h.posts.all();
    assert_eq!(posts[0].status, PostStatus::Published);
}

// Scenario: the synchronous test-run path executes without touching the
// schedule store.
#[tokio::test]
async fn run_now_previews_without_persisting() {
    let h = harness(HarnessOptions::default());

    let outcome = h
        .dispatcher
        .run_now(
            &owner(),
            ActionType::GenerateImage,
            serde_json::json!({ "prompt": "preview" }),
        )
        .await;

    assert!(outcome.success);
    assert_eq!(h.posts.all().len(), 1);
    assert_eq!(h.manager.stats(&owner()).unwrap().total, 0);
}
