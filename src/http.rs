//! Control API — settings, rules, scheduled messages, status.
//!
//! Small axum surface consumed by the dashboard. Writes persist through the
//! file store; the message path never depends on this module.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::error;
use uuid::Uuid;

use crate::config::AiSettings;
use crate::pipeline::rules::{AutoReplyRule, RuleMatcher};
use crate::schedule::{ScheduleQueue, ScheduledMessage};
use crate::store::contacts::ContactStore;
use crate::store::persist::{FileStore, RULES_DOC, SCHEDULE_DOC, SETTINGS_DOC};
use crate::transport::Transport;

/// Shared state behind the control API.
#[derive(Clone)]
pub struct ApiState {
    pub settings: Arc<RwLock<AiSettings>>,
    pub rules: Arc<RwLock<RuleMatcher>>,
    pub schedule: Arc<ScheduleQueue>,
    pub contacts: Arc<ContactStore>,
    pub transport: Arc<dyn Transport>,
    pub store: Arc<FileStore>,
}

/// Settings as exposed over the API: the credential itself is never
/// returned, only whether one is set.
#[derive(Debug, Serialize)]
struct SettingsView {
    enabled: bool,
    api_key_set: bool,
    model: String,
    emergency_contact: String,
    owner_name: String,
    emergency_keywords: Vec<String>,
}

impl From<&AiSettings> for SettingsView {
    fn from(s: &AiSettings) -> Self {
        Self {
            enabled: s.enabled,
            api_key_set: !s.api_key.trim().is_empty(),
            model: s.model.clone(),
            emergency_contact: s.emergency_contact.clone(),
            owner_name: s.owner_name.clone(),
            emergency_keywords: s.emergency_keywords.clone(),
        }
    }
}

/// Settings update; absent fields keep their current value.
#[derive(Debug, Deserialize)]
struct SettingsUpdate {
    enabled: Option<bool>,
    api_key: Option<String>,
    model: Option<String>,
    emergency_contact: Option<String>,
    owner_name: Option<String>,
    emergency_keywords: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ScheduleRequest {
    phone: String,
    message: String,
    datetime: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct StatusSummary {
    connected: bool,
    conversations: usize,
    business_contacts: usize,
    rules: usize,
    scheduled_pending: usize,
    scheduled_failed: usize,
}

/// Build the control-API router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/rules", get(get_rules).put(put_rules))
        .route("/api/scheduled", get(get_scheduled).post(post_scheduled))
        .route("/api/scheduled/{id}", delete(delete_scheduled))
        .route("/api/status", get(get_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_settings(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let settings = state.settings.read().await;
    Json(serde_json::to_value(SettingsView::from(&*settings)).unwrap_or_default())
}

async fn put_settings(
    State(state): State<ApiState>,
    Json(update): Json<SettingsUpdate>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut settings = state.settings.write().await;
    if let Some(enabled) = update.enabled {
        settings.enabled = enabled;
    }
    if let Some(api_key) = update.api_key {
        settings.api_key = api_key;
    }
    if let Some(model) = update.model {
        settings.model = model;
    }
    if let Some(contact) = update.emergency_contact {
        settings.emergency_contact = contact;
    }
    if let Some(owner) = update.owner_name {
        settings.owner_name = owner;
    }
    if let Some(keywords) = update.emergency_keywords {
        settings.emergency_keywords = keywords;
    }

    if let Err(e) = state.store.save(SETTINGS_DOC, &*settings).await {
        error!(error = %e, "Failed to persist settings");
    }

    (
        StatusCode::OK,
        Json(serde_json::to_value(SettingsView::from(&*settings)).unwrap_or_default()),
    )
}

async fn get_rules(State(state): State<ApiState>) -> Json<Vec<AutoReplyRule>> {
    Json(state.rules.read().await.rules().to_vec())
}

async fn put_rules(
    State(state): State<ApiState>,
    Json(rules): Json<Vec<AutoReplyRule>>,
) -> StatusCode {
    state.rules.write().await.set_rules(rules.clone());
    if let Err(e) = state.store.save(RULES_DOC, &rules).await {
        error!(error = %e, "Failed to persist rules");
    }
    StatusCode::OK
}

async fn get_scheduled(State(state): State<ApiState>) -> Json<Vec<ScheduledMessage>> {
    Json(state.schedule.list().await)
}

async fn post_scheduled(
    State(state): State<ApiState>,
    Json(request): Json<ScheduleRequest>,
) -> (StatusCode, Json<ScheduledMessage>) {
    let entry = ScheduledMessage::new(&request.phone, &request.message, request.datetime);
    state.schedule.add(entry.clone()).await;
    persist_schedule(&state).await;
    (StatusCode::CREATED, Json(entry))
}

async fn delete_scheduled(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    if state.schedule.remove(id).await {
        persist_schedule(&state).await;
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn get_status(State(state): State<ApiState>) -> Json<StatusSummary> {
    let (pending, failed) = state.schedule.counts().await;
    Json(StatusSummary {
        connected: state.transport.is_connected(),
        conversations: state.contacts.conversation_count().await,
        business_contacts: state.contacts.business_count().await,
        rules: state.rules.read().await.len(),
        scheduled_pending: pending,
        scheduled_failed: failed,
    })
}

async fn persist_schedule(state: &ApiState) {
    let entries = state.schedule.list().await;
    if let Err(e) = state.store.save(SCHEDULE_DOC, &entries).await {
        error!(error = %e, "Failed to persist scheduled messages");
    }
}
