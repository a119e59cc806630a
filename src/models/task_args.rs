//! `task_args` — the opaque, validated per-task parameter map from spec §3.
//!
//! Modeled as a typed struct (not a loose map) so callers get compile-time
//! field access, while `merge_patch` still implements the two-level deep
//! merge the update path requires: nested maps merge recursively, scalars
//! overwrite, and undeclared keys in a patch never clobber keys the patch
//! didn't mention.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ScrapeMode;

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    2.0
}

fn default_csv_file_prefix() -> String {
    "articles".to_string()
}

/// Recognized `task_args` keys and their effects, per spec §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskArgs {
    pub scrape_mode: ScrapeMode,
    #[serde(default)]
    pub max_pages: Option<u32>,
    #[serde(default)]
    pub num_articles: Option<u32>,
    #[serde(default)]
    pub min_keywords: Option<u32>,
    #[serde(default)]
    pub ai_only: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub is_test: bool,
    #[serde(default)]
    pub save_to_csv: bool,
    #[serde(default = "default_csv_file_prefix")]
    pub csv_file_prefix: String,
    #[serde(default)]
    pub save_to_database: bool,
    #[serde(default)]
    pub get_links_by_task_id: bool,
    #[serde(default)]
    pub article_links: Vec<String>,
    #[serde(default)]
    pub save_partial_results_on_cancel: bool,
    #[serde(default)]
    pub save_partial_to_database: bool,
    #[serde(default)]
    pub max_cancel_wait: Option<u32>,
    #[serde(default)]
    pub cancel_interrupt_interval: Option<u32>,
    #[serde(default)]
    pub cancel_timeout: Option<u32>,
    /// Keys this crate doesn't recognize are preserved verbatim so a
    /// round-trip through validate → serialize → validate is lossless.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskArgs {
    pub fn new(scrape_mode: ScrapeMode) -> Self {
        Self {
            scrape_mode,
            max_pages: None,
            num_articles: None,
            min_keywords: None,
            ai_only: false,
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            timeout: None,
            is_test: false,
            save_to_csv: false,
            csv_file_prefix: default_csv_file_prefix(),
            save_to_database: false,
            get_links_by_task_id: false,
            article_links: Vec::new(),
            save_partial_results_on_cancel: false,
            save_partial_to_database: false,
            max_cancel_wait: None,
            cancel_interrupt_interval: None,
            cancel_timeout: None,
            extra: Map::new(),
        }
    }

    /// Deep-merge a patch into this `task_args`: nested maps recursively
    /// merged, scalars overwritten. The patch is applied as a JSON value so
    /// callers (the Task Service Facade's `update_task`) can pass a raw,
    /// partial document without knowing every field ahead of time.
    pub fn merge_patch(&self, patch: &Value) -> Result<Self, serde_json::Error> {
        let mut base = serde_json::to_value(self)?;
        deep_merge(&mut base, patch);
        serde_json::from_value(base)
    }
}

/// Recursively merge `patch` into `target`. Maps merge key-by-key; any other
/// value (including arrays) overwrites the target wholesale — arrays are
/// scalars for merge purposes, matching spec §9's two-level merge rule.
fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match target_map.get_mut(key) {
                    Some(target_value) => deep_merge(target_value, patch_value),
                    None => {
                        target_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (target_slot, patch_value) => {
            *target_slot = patch_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_patch_overwrites_scalars_and_preserves_untouched_keys() {
        let args = TaskArgs::new(ScrapeMode::FullScrape);
        let patched = args
            .merge_patch(&json!({"max_retries": 7}))
            .expect("merge");
        assert_eq!(patched.max_retries, 7);
        assert_eq!(patched.retry_delay, args.retry_delay);
        assert_eq!(patched.scrape_mode, ScrapeMode::FullScrape);
    }

    #[test]
    fn merge_patch_recursively_merges_extra_nested_maps() {
        let mut args = TaskArgs::new(ScrapeMode::FullScrape);
        args.extra.insert(
            "custom".to_string(),
            json!({"a": 1, "b": 2}),
        );
        let patched = args
            .merge_patch(&json!({"custom": {"b": 99}}))
            .expect("merge");
        assert_eq!(patched.extra["custom"]["a"], json!(1));
        assert_eq!(patched.extra["custom"]["b"], json!(99));
    }

    #[test]
    fn validate_serialize_validate_round_trips() {
        let args = TaskArgs::new(ScrapeMode::ContentOnly);
        let value = serde_json::to_value(&args).unwrap();
        let reparsed: TaskArgs = serde_json::from_value(value).unwrap();
        assert_eq!(args, reparsed);
    }
}
