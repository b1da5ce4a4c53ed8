//! Server-Sent Events stream and working-directory watcher.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use notify::{Event as NotifyEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::{AppState, ChangeEvent};

#[derive(Debug, Serialize)]
struct SsePayload {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_artifacts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    names: Option<Vec<String>>,
}

impl SsePayload {
    fn bare(event_type: &'static str) -> Self {
        Self {
            event_type,
            failed: None,
            new_artifacts: None,
            names: None,
        }
    }
}

impl From<&ChangeEvent> for SsePayload {
    fn from(event: &ChangeEvent) -> Self {
        match event {
            ChangeEvent::RunStarted => SsePayload::bare("run_started"),
            ChangeEvent::RunFinished {
                failed,
                new_artifacts,
            } => SsePayload {
                failed: Some(*failed),
                new_artifacts: Some(*new_artifacts),
                ..SsePayload::bare("run_finished")
            },
            ChangeEvent::FilesChanged { names } => SsePayload {
                names: Some(names.clone()),
                ..SsePayload::bare("files_changed")
            },
            ChangeEvent::ConfigChanged => SsePayload::bare("config_changed"),
        }
    }
}

/// SSE endpoint handler.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_tx.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(change_event) => {
                    let payload = SsePayload::from(&change_event);
                    if let Ok(json) = serde_json::to_string(&payload) {
                        yield Ok(Event::default().event("change").data(json));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Start the working-directory watcher in a background task.
pub fn start_file_watcher(state: AppState) {
    tokio::spawn(async move {
        if let Err(e) = run_file_watcher(state).await {
            warn!(error = %e, "file watcher failed");
        }
    });
}

async fn run_file_watcher(state: AppState) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<NotifyEvent>(100);

    let mut watcher = PollWatcher::new(
        move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.try_send(event);
            }
        },
        notify::Config::default().with_poll_interval(Duration::from_millis(250)),
    )?;

    watcher.watch(&state.workdir, RecursiveMode::NonRecursive)?;
    info!(path = %state.workdir.display(), "watching working directory");
    let state_dir = state.state_dir();
    if state_dir.exists() {
        watcher.watch(&state_dir, RecursiveMode::NonRecursive)?;
        info!(path = %state_dir.display(), "watching config directory");
    }

    // Batch at a fixed interval so a script writing many files yields one event.
    let mut pending_events: Vec<NotifyEvent> = Vec::new();
    let mut flush_tick = tokio::time::interval(Duration::from_millis(250));
    flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                pending_events.push(event);
            }
            _ = flush_tick.tick() => {
                if pending_events.is_empty() {
                    continue;
                }
                process_events(&state, &pending_events);
                pending_events.clear();
            }
        }
    }
}

fn process_events(state: &AppState, events: &[NotifyEvent]) {
    let mut names: BTreeSet<String> = BTreeSet::new();
    let mut config_changed = false;
    let config_path = state.config_path();

    for event in events {
        // Only care about create/modify events
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            continue;
        }

        for path in &event.paths {
            if path == &config_path {
                config_changed = true;
            } else if path.parent() == Some(state.workdir.as_path())
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                names.insert(name.to_string());
            }
        }
    }

    if config_changed {
        debug!("broadcasting config change");
        state.notify(ChangeEvent::ConfigChanged);
    }
    if !names.is_empty() {
        debug!(count = names.len(), "broadcasting file changes");
        state.notify(ChangeEvent::FilesChanged {
            names: names.into_iter().collect(),
        });
    }
}
