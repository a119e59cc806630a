//! Progress Broadcaster (spec §4.C): per-task listener registry plus
//! weighted percent-complete computation.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::ScrapePhase;

/// Phase weights from spec §4.C, summing to 100. Declared in pipeline order
/// so "phases before P" has a stable meaning.
const WEIGHTED_PHASES: &[(&str, u32)] = &[
    ("fetch_links", 20),
    ("fetch_contents", 50),
    ("update_dataframe", 10),
    ("save_to_csv", 10),
    ("save_to_database", 10),
];

/// JSON-like payload delivered to listeners (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct ProgressPayload {
    pub scrape_phase: ScrapePhase,
    pub progress: u32,
    pub message: String,
    pub start_time: DateTime<Utc>,
}

pub type Listener = Arc<dyn Fn(&ProgressPayload) + Send + Sync>;

/// Compute the weighted percent for a named pipeline stage and its
/// sub-progress `s` (clamped to `[0, 1]`). Phases not in `WEIGHTED_PHASES`
/// contribute zero for their own slice, but prior phases still count —
/// callers pass the stage name that best matches one of the weighted keys,
/// or `None` to report only completed-phase weight (e.g. `COMPLETED`).
pub fn compute_percent(stage: Option<&str>, sub_progress: f64) -> u32 {
    let s = sub_progress.clamp(0.0, 1.0);
    let mut completed_weight = 0u32;
    let mut current_weight = 0u32;
    let mut found = stage.is_none();

    for (name, weight) in WEIGHTED_PHASES {
        if found {
            break;
        }
        if Some(*name) == stage {
            current_weight = *weight;
            found = true;
        } else {
            completed_weight += *weight;
        }
    }

    let raw = completed_weight as f64 + current_weight as f64 * s;
    raw.floor().clamp(0.0, 100.0) as u32
}

/// Per-task listener registry. `notify` snapshots the listener list before
/// invoking any of them, so concurrent `add`/`remove` during delivery never
/// blocks on or races with the snapshot (spec §5: "read side takes a
/// snapshot").
#[derive(Clone, Default)]
pub struct ProgressBroadcaster {
    listeners: Arc<Mutex<HashMap<String, Vec<(u64, Listener)>>>>,
    next_id: Arc<Mutex<u64>>,
}

/// Handle returned by `add`, usable with `remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, task_id: &str, listener: Listener) -> ListenerHandle {
        let id = {
            let mut next_id = self.next_id.lock().expect("progress listener id lock");
            let id = *next_id;
            *next_id += 1;
            id
        };
        let mut listeners = self.listeners.lock().expect("progress listener lock");
        listeners
            .entry(task_id.to_string())
            .or_default()
            .push((id, listener));
        ListenerHandle(id)
    }

    pub fn remove(&self, task_id: &str, handle: ListenerHandle) {
        let mut listeners = self.listeners.lock().expect("progress listener lock");
        if let Some(entries) = listeners.get_mut(task_id) {
            entries.retain(|(id, _)| *id != handle.0);
        }
    }

    pub fn clear(&self, task_id: &str) {
        let mut listeners = self.listeners.lock().expect("progress listener lock");
        listeners.remove(task_id);
    }

    /// Snapshot current listeners for `task_id`, release the lock, then
    /// invoke each one. A panicking listener is caught and logged; it never
    /// interrupts delivery to its siblings.
    pub fn notify(&self, task_id: &str, payload: &ProgressPayload) {
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.lock().expect("progress listener lock");
            listeners
                .get(task_id)
                .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default()
        };

        for listener in snapshot {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener(payload)));
            if result.is_err() {
                tracing::warn!(task_id, "progress listener panicked; continuing delivery");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn percent_accumulates_completed_phase_weight() {
        assert_eq!(compute_percent(Some("fetch_links"), 0.0), 0);
        assert_eq!(compute_percent(Some("fetch_links"), 1.0), 20);
        assert_eq!(compute_percent(Some("fetch_contents"), 0.0), 20);
        assert_eq!(compute_percent(Some("fetch_contents"), 0.5), 45);
        assert_eq!(compute_percent(Some("save_to_database"), 1.0), 100);
    }

    #[test]
    fn percent_for_unknown_stage_only_counts_prior_phases() {
        assert_eq!(compute_percent(None, 0.0), 0);
        assert_eq!(compute_percent(Some("not_a_real_stage"), 0.5), 100);
    }

    fn sample_payload() -> ProgressPayload {
        ProgressPayload {
            scrape_phase: ScrapePhase::ContentScraping,
            progress: 45,
            message: "scraping".to_string(),
            start_time: Utc::now(),
        }
    }

    #[test]
    fn notify_delivers_to_all_listeners_and_survives_panics() {
        let broadcaster = ProgressBroadcaster::new();
        let good_calls = Arc::new(AtomicUsize::new(0));
        let good_calls_clone = good_calls.clone();

        broadcaster.add(
            "task-1",
            Arc::new(move |_payload: &ProgressPayload| {
                good_calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        broadcaster.add(
            "task-1",
            Arc::new(|_payload: &ProgressPayload| panic!("listener exploded")),
        );

        broadcaster.notify("task-1", &sample_payload());
        assert_eq!(good_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_stops_further_delivery() {
        let broadcaster = ProgressBroadcaster::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let handle = broadcaster.add(
            "task-1",
            Arc::new(move |_: &ProgressPayload| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        broadcaster.notify("task-1", &sample_payload());
        broadcaster.remove("task-1", handle);
        broadcaster.notify("task-1", &sample_payload());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_removes_all_listeners_for_task() {
        let broadcaster = ProgressBroadcaster::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        broadcaster.add(
            "task-1",
            Arc::new(move |_: &ProgressPayload| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        broadcaster.clear("task-1");
        broadcaster.notify("task-1", &sample_payload());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
