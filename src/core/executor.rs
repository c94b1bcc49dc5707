//! Action execution against an opened worker client.
//!
//! Actions run sequentially and best-effort: a failing action is recorded and
//! the next one still runs. Successful screenshots and snapshots are archived
//! through the configured [`ArtifactStore`]; archiving only ever adds fields to
//! the action data and never changes its outcome.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::task::{Action, ActionOutcome, TaskResult};
use crate::infra::storage::ArtifactStore;
use crate::protocol::WorkerClient;
use crate::util::clock::now_ms;

const SCREENSHOT_DATA_KEYS: [&str; 4] = ["base64", "data", "imageData", "content"];
const SCREENSHOT_PATH_KEYS: [&str; 3] = ["path", "filePath", "screenshot_path"];

/// Runs actions and archives their artifacts.
#[derive(Clone, Default)]
pub struct ActionExecutor {
    store: Option<Arc<dyn ArtifactStore>>,
}

impl ActionExecutor {
    /// Executor without artifact archiving.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor that archives artifacts into `store`.
    ///
    /// Worker responses are trusted: a screenshot reply naming a local file
    /// path makes this process read that file and upload it.
    #[must_use]
    pub fn with_store(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Run every action in order and aggregate the outcomes.
    pub async fn run_task(&self, client: &mut dyn WorkerClient, actions: &[Action]) -> TaskResult {
        let mut outcomes = Vec::with_capacity(actions.len());
        for action in actions {
            let outcome = self.run_action(client, action).await;
            debug!(action = action.kind(), success = outcome.success, "action finished");
            outcomes.push(outcome);
        }
        TaskResult::from_outcomes(outcomes)
    }

    /// Run a single action.
    pub async fn run_action(&self, client: &mut dyn WorkerClient, action: &Action) -> ActionOutcome {
        match action {
            Action::Navigate { url } => {
                invoke(client, action, "browser_navigate", json!({ "url": url })).await
            }
            Action::Screenshot { filename } => {
                let args = filename
                    .as_ref()
                    .map_or_else(|| json!({}), |f| json!({ "filename": f }));
                let mut outcome = invoke(client, action, "browser_take_screenshot", args).await;
                if let (Some(store), Some(data)) = (&self.store, outcome.data.as_mut()) {
                    archive_screenshot(store.as_ref(), data, filename.as_deref()).await;
                }
                outcome
            }
            Action::Snapshot { filename } => {
                let mut outcome = invoke(client, action, "browser_snapshot", json!({})).await;
                if let (Some(store), Some(data)) = (&self.store, outcome.data.as_mut()) {
                    archive_snapshot(store.as_ref(), data, filename.as_deref()).await;
                }
                outcome
            }
            Action::Click { element, reference } => {
                let args = json!({ "element": element, "ref": reference });
                invoke(client, action, "browser_click", args).await
            }
            Action::Type {
                element,
                reference,
                text,
            } => {
                let args = json!({ "element": element, "ref": reference, "text": text });
                invoke(client, action, "browser_type", args).await
            }
            Action::Wait { time } => {
                tokio::time::sleep(wait_duration(*time)).await;
                ActionOutcome::ok(action, json!("completed"))
            }
            Action::Close => invoke(client, action, "browser_tab_close", json!({})).await,
            Action::ListTools => match client.list_capabilities().await {
                Some(tools) if !tools.is_empty() => {
                    ActionOutcome::ok(action, json!(format!("{} tools available", tools.len())))
                }
                _ => ActionOutcome::failed(action, Some(json!("no tools available"))),
            },
            Action::HealthCheck => {
                if client.probe().await {
                    ActionOutcome::ok(action, json!("health check passed"))
                } else {
                    ActionOutcome::failed(action, Some(json!("health check failed")))
                }
            }
            Action::Unknown { kind } => {
                warn!(action = %kind, "unknown action type");
                ActionOutcome::failed(action, Some(json!(format!("unknown action type: {kind}"))))
            }
        }
    }
}

async fn invoke(client: &mut dyn WorkerClient, action: &Action, tool: &str, args: Value) -> ActionOutcome {
    match client.invoke(tool, args).await {
        Some(payload) => ActionOutcome::ok(action, payload),
        None => ActionOutcome::failed(action, None),
    }
}

fn wait_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

fn first_str<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn decode_image(encoded: &str) -> Option<Vec<u8>> {
    let raw = encoded
        .split_once(";base64,")
        .map_or(encoded, |(_, rest)| rest);
    match STANDARD.decode(raw.trim()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "screenshot payload is not valid base64");
            None
        }
    }
}

fn screenshot_name(filename: Option<&str>) -> String {
    match filename {
        Some(name) if Path::new(name).extension().is_some() => name.to_string(),
        Some(name) => format!("{name}.png"),
        None => format!("screenshot_{}.png", now_ms()),
    }
}

async fn archive_screenshot(store: &dyn ArtifactStore, data: &mut Value, filename: Option<&str>) {
    let Some(map) = data.as_object_mut() else {
        return;
    };
    let name = screenshot_name(filename);

    let stored = if let Some(bytes) = first_str(map, &SCREENSHOT_DATA_KEYS).and_then(decode_image) {
        store.save_binary(&bytes, &name, "image/png").await
    } else if let Some(path) = first_str(map, &SCREENSHOT_PATH_KEYS) {
        store.save_file(Path::new(path), &name, "image/png").await
    } else {
        return;
    };

    match stored.location {
        Some(location) if stored.success => {
            map.insert("artifact_url".into(), Value::String(location));
            map.insert("archived".into(), Value::Bool(true));
        }
        _ => warn!(name = %name, error = ?stored.error, "screenshot not archived"),
    }
}

fn snapshot_text(map: &Map<String, Value>) -> Option<String> {
    if let Some(text) = map.get("text").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    map.get("content")?
        .as_array()?
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .and_then(|item| item.get("text").and_then(Value::as_str))
        .map(str::to_string)
}

async fn archive_snapshot(store: &dyn ArtifactStore, data: &mut Value, filename: Option<&str>) {
    let Some(map) = data.as_object_mut() else {
        return;
    };

    let html = snapshot_text(map).filter(|s| !s.is_empty());
    let structured = map
        .get("structuredContent")
        .filter(|v| !v.is_null())
        .map(Value::to_string);
    let tree = map
        .get("snapshot")
        .or_else(|| map.get("accessibility"))
        .map(Value::to_string);
    if html.is_none() && structured.is_none() && tree.is_none() {
        return;
    }

    let base = filename.map_or_else(|| format!("snapshot_{}", now_ms()), str::to_string);
    let pending = [
        ("html", html, format!("{base}.html"), "text/html"),
        ("json", structured, format!("{base}.json"), "application/json"),
        ("snapshot", tree, format!("{base}_snapshot.json"), "application/json"),
    ];

    let mut urls = Map::new();
    for (key, content, name, content_type) in pending {
        let Some(content) = content else { continue };
        let stored = store.save_text(&content, &name, content_type).await;
        match stored.location {
            Some(location) if stored.success => {
                urls.insert(key.into(), Value::String(location));
            }
            _ => warn!(name = %name, error = ?stored.error, "snapshot part not archived"),
        }
    }

    if !urls.is_empty() {
        map.insert("artifact_urls".into(), Value::Object(urls));
        map.insert("archived".into(), Value::Bool(true));
    }
}
