//! Phase, mode, and status enums shared by the task state machine.
//!
//! All four enums serialize as their lower_snake_case value string across
//! every boundary (DB, CSV, progress payloads) per the wire-form contract.

use serde::{Deserialize, Serialize};

/// Current phase of a task's execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapePhase {
    Init,
    LinkCollection,
    ContentScraping,
    SaveToCsv,
    SaveToDatabase,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

impl ScrapePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::LinkCollection => "link_collection",
            Self::ContentScraping => "content_scraping",
            Self::SaveToCsv => "save_to_csv",
            Self::SaveToDatabase => "save_to_database",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "init" => Some(Self::Init),
            "link_collection" => Some(Self::LinkCollection),
            "content_scraping" => Some(Self::ContentScraping),
            "save_to_csv" => Some(Self::SaveToCsv),
            "save_to_database" => Some(Self::SaveToDatabase),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// High-level dispatch discriminator controlling which phases a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeMode {
    LinksOnly,
    ContentOnly,
    FullScrape,
}

impl ScrapeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinksOnly => "links_only",
            Self::ContentOnly => "content_only",
            Self::FullScrape => "full_scrape",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "links_only" => Some(Self::LinksOnly),
            "content_only" => Some(Self::ContentOnly),
            "full_scrape" => Some(Self::FullScrape),
            _ => None,
        }
    }
}

/// Per-article scrape reconciliation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleScrapeStatus {
    Pending,
    LinkSaved,
    PartialSaved,
    ContentScraped,
    Failed,
}

impl ArticleScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::LinkSaved => "link_saved",
            Self::PartialSaved => "partial_saved",
            Self::ContentScraped => "content_scraped",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "link_saved" => Some(Self::LinkSaved),
            "partial_saved" => Some(Self::PartialSaved),
            "content_scraped" => Some(Self::ContentScraped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Invariant from spec §3: `is_scraped=true ⇔ scrape_status ∈ {CONTENT_SCRAPED, PARTIAL_SAVED}`.
    pub fn implies_scraped(&self) -> bool {
        matches!(self, Self::ContentScraped | Self::PartialSaved)
    }
}

/// Execution-attempt status recorded on a `TaskHistory` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Init,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "init" => Some(Self::Init),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_round_trips_through_wire_form() {
        for phase in [
            ScrapePhase::Init,
            ScrapePhase::LinkCollection,
            ScrapePhase::ContentScraping,
            ScrapePhase::SaveToCsv,
            ScrapePhase::SaveToDatabase,
            ScrapePhase::Completed,
            ScrapePhase::Failed,
            ScrapePhase::Cancelled,
            ScrapePhase::Unknown,
        ] {
            assert_eq!(ScrapePhase::from_str(phase.as_str()), Some(phase));
        }
    }

    #[test]
    fn article_status_implies_scraped_matches_invariant() {
        assert!(ArticleScrapeStatus::ContentScraped.implies_scraped());
        assert!(ArticleScrapeStatus::PartialSaved.implies_scraped());
        assert!(!ArticleScrapeStatus::Failed.implies_scraped());
        assert!(!ArticleScrapeStatus::Pending.implies_scraped());
        assert!(!ArticleScrapeStatus::LinkSaved.implies_scraped());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!(ScrapeMode::from_str("FULL_SCRAPE"), Some(ScrapeMode::FullScrape));
    }
}
