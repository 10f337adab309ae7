//! The progress stream: a long-lived SSE channel reflecting run and
//! job state to the client.
//!
//! The protocol is built for severed transports (the deployment
//! gateway cuts streams on the order of 29 s): a full `all_jobs`
//! snapshot is sent on every connect, diffs only while the run is
//! `ingesting`, and a final snapshot plus terminal `status` at the
//! end. No server-side session state survives a disconnect, so
//! reconnecting is free.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use futures::stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use jobscout_core::run::RunStatus;
use jobscout_core::{RunId, UserId};
use jobscout_db::JobRecord;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    /// Bearer credential; browsers cannot set headers on EventSource.
    token: String,
}

pub async fn progress(
    State(state): State<AppState>,
    Path(run_id): Path<i64>,
    Query(query): Query<ProgressQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let user_id = state.verifier.verify(&query.token).await?;
    let run_id = RunId::new(run_id);

    // Ownership is checked once on open; 404 either way.
    state.runs.get_owned(run_id, user_id).await?;

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(poll_loop(state, run_id, user_id, tx));

    let stream = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(event), rx))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Drive one client's stream. Every iteration runs fresh queries
/// against the pool; no transaction or session is held across polls,
/// so worker writes are always visible. The loop ends as soon as a
/// send fails, which is how client disconnects are observed.
async fn poll_loop(state: AppState, run_id: RunId, user_id: UserId, tx: mpsc::Sender<Event>) {
    let mut prev: Option<StatusIndex> = None;

    loop {
        let Ok(record) = state.runs.get_owned(run_id, user_id).await else {
            break;
        };
        let Ok(status) = record.run_status() else {
            break;
        };

        // Before ingesting the only thing worth reporting is the run
        // status itself.
        if matches!(status, RunStatus::Pending | RunStatus::Initializing) {
            if send_status(&tx, status).await.is_err() {
                break;
            }
            tokio::time::sleep(state.progress_poll_interval).await;
            continue;
        }

        let Ok(jobs) = state.jobs.list_for_run(run_id).await else {
            break;
        };
        let current = status_index(&jobs);

        match &prev {
            None => {
                // First sight of the job map: snapshot, always.
                if send_json(&tx, "all_jobs", snapshot(&jobs)).await.is_err() {
                    break;
                }
                prev = Some(current);
                if status.is_terminal() {
                    let _ = send_status(&tx, status).await;
                    break;
                }
            }
            Some(previous) => {
                if status.is_terminal() {
                    // Closing contract: final snapshot, then the
                    // terminal status.
                    if send_json(&tx, "all_jobs", snapshot(&jobs)).await.is_err() {
                        break;
                    }
                    let _ = send_status(&tx, status).await;
                    break;
                }
                let changes = diff(previous, &current);
                if !changes.is_empty() {
                    if send_json(&tx, "update", update_payload(&changes)).await.is_err() {
                        break;
                    }
                }
                prev = Some(current);
            }
        }

        tokio::time::sleep(state.progress_poll_interval).await;
    }
    debug!(run_id = %run_id, "progress stream closed");
}

async fn send_status(tx: &mpsc::Sender<Event>, status: RunStatus) -> Result<(), ()> {
    tx.send(Event::default().event("status").data(status.as_str()))
        .await
        .map_err(|_| ())
}

async fn send_json(
    tx: &mpsc::Sender<Event>,
    kind: &'static str,
    payload: serde_json::Value,
) -> Result<(), ()> {
    tx.send(Event::default().event(kind).data(payload.to_string()))
        .await
        .map_err(|_| ())
}

/// Job statuses keyed by (company, external_id).
type StatusIndex = BTreeMap<(String, String), String>;

fn status_index(jobs: &[JobRecord]) -> StatusIndex {
    jobs.iter()
        .map(|job| {
            (
                (job.company.clone(), job.external_id.clone()),
                job.status.clone(),
            )
        })
        .collect()
}

/// Full `all_jobs` payload: `{company: [{external_id, title, status}]}`.
fn snapshot(jobs: &[JobRecord]) -> serde_json::Value {
    let mut by_company: BTreeMap<&str, Vec<serde_json::Value>> = BTreeMap::new();
    for job in jobs {
        by_company
            .entry(job.company.as_str())
            .or_default()
            .push(serde_json::json!({
                "external_id": job.external_id,
                "title": job.title,
                "status": job.status,
            }));
    }
    serde_json::to_value(by_company).unwrap_or_default()
}

/// Jobs whose status changed since the previous poll.
fn diff(previous: &StatusIndex, current: &StatusIndex) -> StatusIndex {
    current
        .iter()
        .filter(|(key, status)| previous.get(*key) != Some(status))
        .map(|(key, status)| (key.clone(), status.clone()))
        .collect()
}

/// Diff payload: `{company: {external_id: status}}`.
fn update_payload(changes: &StatusIndex) -> serde_json::Value {
    let mut by_company: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();
    for ((company, external_id), status) in changes {
        by_company
            .entry(company)
            .or_default()
            .insert(external_id, status);
    }
    serde_json::to_value(by_company).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job(company: &str, external_id: &str, status: &str, title: &str) -> JobRecord {
        JobRecord {
            id: 1,
            run_id: Some(9),
            user_id: 42,
            company: company.into(),
            external_id: external_id.into(),
            url: format!("https://example.com/{company}/{external_id}"),
            status: status.into(),
            title: title.into(),
            location: "Remote".into(),
            description: None,
            requirements: None,
            simhash: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_snapshot_groups_by_company() {
        let jobs = vec![
            job("acme", "A1", "pending", "Engineer"),
            job("acme", "A2", "ready", "Designer"),
            job("globex", "G1", "skipped", "Analyst"),
        ];
        let value = snapshot(&jobs);
        assert_eq!(
            value,
            serde_json::json!({
                "acme": [
                    {"external_id": "A1", "title": "Engineer", "status": "pending"},
                    {"external_id": "A2", "title": "Designer", "status": "ready"},
                ],
                "globex": [
                    {"external_id": "G1", "title": "Analyst", "status": "skipped"},
                ],
            })
        );
    }

    #[test]
    fn test_diff_reports_only_changes() {
        let before = vec![
            job("acme", "A1", "pending", "Engineer"),
            job("acme", "A2", "pending", "Designer"),
        ];
        let after = vec![
            job("acme", "A1", "ready", "Engineer"),
            job("acme", "A2", "pending", "Designer"),
        ];

        let changes = diff(&status_index(&before), &status_index(&after));
        assert_eq!(changes.len(), 1);
        assert_eq!(
            update_payload(&changes),
            serde_json::json!({"acme": {"A1": "ready"}})
        );
    }

    #[test]
    fn test_diff_includes_newly_appearing_jobs() {
        let before = vec![job("acme", "A1", "pending", "Engineer")];
        let after = vec![
            job("acme", "A1", "pending", "Engineer"),
            job("globex", "G1", "pending", "Analyst"),
        ];

        let changes = diff(&status_index(&before), &status_index(&after));
        assert_eq!(
            update_payload(&changes),
            serde_json::json!({"globex": {"G1": "pending"}})
        );
    }

    #[test]
    fn test_no_changes_means_empty_diff() {
        let jobs = vec![job("acme", "A1", "ready", "Engineer")];
        let index = status_index(&jobs);
        assert!(diff(&index, &index).is_empty());
    }
}
