use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::RwLock;

use chat_assist::config::{AiSettings, EngineConfig};
use chat_assist::http::{ApiState, api_routes};
use chat_assist::llm::HttpCompletionClient;
use chat_assist::pipeline::{MessageRouter, RuleMatcher};
use chat_assist::pipeline::rules::AutoReplyRule;
use chat_assist::reply::{EscalationNotifier, ReplyComposer};
use chat_assist::schedule::{self, ScheduleDispatcher, ScheduleQueue, ScheduledMessage};
use chat_assist::store::contacts::{self, ContactStore, ContactsSnapshot};
use chat_assist::store::persist::{
    self, CONTACTS_DOC, FileStore, RULES_DOC, SCHEDULE_DOC, SETTINGS_DOC,
};
use chat_assist::transport::Transport;
use chat_assist::transport::local::LocalTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let engine_config = EngineConfig::default();

    let data_dir =
        std::env::var("CHAT_ASSIST_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let http_port: u16 = std::env::var("CHAT_ASSIST_HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(engine_config.http_port);

    eprintln!("💬 Chat Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data dir: {}", data_dir);
    eprintln!("   API: http://0.0.0.0:{}/api/status", http_port);
    eprintln!("   Type a message and press Enter ('sender-id: text' to fake a contact).\n");

    // ── Stored state ─────────────────────────────────────────────────────
    let store = Arc::new(FileStore::new(&data_dir));

    let mut settings: AiSettings = store.load(SETTINGS_DOC, AiSettings::default()).await;
    // An env credential overrides the stored one (never written back); the
    // master switch stays with the stored settings.
    settings.apply_env_credential(std::env::var("CHAT_ASSIST_API_KEY").ok());
    let settings = Arc::new(RwLock::new(settings));

    let rules: Vec<AutoReplyRule> = store.load(RULES_DOC, Vec::new()).await;
    eprintln!("   Rules: {} loaded", rules.len());
    let rules = Arc::new(RwLock::new(RuleMatcher::new(rules)));

    let snapshot: ContactsSnapshot = store.load(CONTACTS_DOC, ContactsSnapshot::default()).await;
    let contacts = ContactStore::from_snapshot(engine_config.history_window, snapshot);

    let scheduled: Vec<ScheduledMessage> = store.load(SCHEDULE_DOC, Vec::new()).await;
    eprintln!("   Scheduled: {} queued", scheduled.len());
    let schedule_queue = ScheduleQueue::new(scheduled);

    // ── Collaborators ────────────────────────────────────────────────────
    let transport: Arc<dyn Transport> = Arc::new(LocalTransport::new());

    let llm = Arc::new(HttpCompletionClient::new(
        settings.clone(),
        engine_config.completion_timeout,
    ));

    let notifier = Arc::new(EscalationNotifier::new(transport.clone()));
    let composer = Arc::new(ReplyComposer::new(
        llm,
        contacts.clone(),
        notifier,
        settings.clone(),
        engine_config.reply_debounce,
        engine_config.completion_timeout,
    ));
    let router = Arc::new(MessageRouter::new(
        transport.clone(),
        contacts.clone(),
        rules.clone(),
        composer,
        settings.clone(),
    ));

    // ── Background tasks ─────────────────────────────────────────────────
    let dispatcher = Arc::new(ScheduleDispatcher::new(
        schedule_queue.clone(),
        transport.clone(),
    ));
    let _dispatch_handle =
        schedule::spawn_dispatch_task(dispatcher, engine_config.dispatch_interval);
    let _sweep_handle = contacts::spawn_retention_task(
        contacts.clone(),
        engine_config.sweep_interval,
        engine_config.retention_horizon,
    );
    let _backup_handle = persist::spawn_backup_task(
        store.clone(),
        contacts.clone(),
        schedule_queue.clone(),
        engine_config.backup_interval,
    );

    // ── Control API ──────────────────────────────────────────────────────
    let api_state = ApiState {
        settings,
        rules,
        schedule: schedule_queue,
        contacts,
        transport: transport.clone(),
        store,
    };
    let app = api_routes(api_state);
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(format!("0.0.0.0:{http_port}")).await {
            Ok(listener) => {
                tracing::info!(port = http_port, "Control API started");
                axum::serve(listener, app).await.ok();
            }
            Err(e) => tracing::error!(error = %e, "Failed to bind control API port"),
        }
    });

    // ── Inbound loop ─────────────────────────────────────────────────────
    let mut inbound = transport.start().await?;
    while let Some(message) = inbound.next().await {
        router.route(&message).await;
    }

    Ok(())
}
