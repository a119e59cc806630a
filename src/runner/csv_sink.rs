//! CSV persistence for the Task Runner's SAVE_TO_CSV phase (spec §6): a
//! hand-rolled minimal writer rather than pulling in a CSV crate, matching
//! the teacher's preference for direct, dependency-light file I/O.

use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;

use crate::models::Article;

const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

const HEADER: &[&str] = &[
    "id",
    "title",
    "link",
    "source",
    "source_url",
    "summary",
    "content",
    "category",
    "author",
    "article_type",
    "tags",
    "keywords",
    "published_at",
    "is_ai_related",
    "is_scraped",
    "scrape_status",
    "scrape_error",
    "last_scrape_attempt",
    "task_id",
    "created_at",
    "updated_at",
];

/// Extra columns present only on the cancel-time partial-save path.
const PARTIAL_HEADER: &[&str] = &["is_partial_save", "cancel_reason"];

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn join_list(items: &[String]) -> String {
    items.join(";")
}

fn row_fields(article: &Article) -> Vec<String> {
    vec![
        article.id.clone(),
        article.title.clone(),
        article.link.clone(),
        article.source.clone().unwrap_or_default(),
        article.source_url.clone().unwrap_or_default(),
        article.summary.clone().unwrap_or_default(),
        article.content.clone().unwrap_or_default(),
        article.category.clone().unwrap_or_default(),
        article.author.clone().unwrap_or_default(),
        article.article_type.clone().unwrap_or_default(),
        join_list(&article.tags),
        join_list(&article.keywords),
        article
            .published_at
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default(),
        article.is_ai_related.to_string(),
        article.is_scraped.to_string(),
        article.scrape_status.as_str().to_string(),
        article.scrape_error.clone().unwrap_or_default(),
        article
            .last_scrape_attempt
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default(),
        article.task_id.clone().unwrap_or_default(),
        article.created_at.to_rfc3339(),
        article.updated_at.to_rfc3339(),
    ]
}

/// Write `rows` to `./logs/{prefix}_{task_id}_{YYYYMMDDhhmmss}.csv`. Returns
/// the path written. No-ops (returns `None`) when `rows` is empty — spec
/// §4.E: "Empty table ⇒ skip, no error."
pub fn write_normal(
    logs_dir: &std::path::Path,
    prefix: &str,
    task_id: &str,
    rows: &[Article],
) -> std::io::Result<Option<PathBuf>> {
    if rows.is_empty() {
        return Ok(None);
    }
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let path = logs_dir.join(format!("{prefix}_{task_id}_{timestamp}.csv"));
    write_csv(&path, rows, false)?;
    Ok(Some(path))
}

/// Write the cancel-time partial-save variant, with the two extra columns
/// `is_partial_save`/`cancel_reason` (spec §6).
pub fn write_cancelled(
    logs_dir: &std::path::Path,
    prefix: &str,
    task_id: &str,
    rows: &[Article],
) -> std::io::Result<Option<PathBuf>> {
    if rows.is_empty() {
        return Ok(None);
    }
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let path = logs_dir.join(format!("{prefix}_cancelled_{task_id}_{timestamp}.csv"));
    write_csv(&path, rows, true)?;
    Ok(Some(path))
}

fn write_csv(path: &std::path::Path, rows: &[Article], partial: bool) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all(&BOM)?;

    let mut header = HEADER.to_vec();
    if partial {
        header.extend_from_slice(PARTIAL_HEADER);
    }
    writeln!(file, "{}", header.join(","))?;

    for article in rows {
        let mut fields: Vec<String> = row_fields(article).iter().map(|f| csv_escape(f)).collect();
        if partial {
            fields.push("true".to_string());
            fields.push(csv_escape("user cancel"));
        }
        writeln!(file, "{}", fields.join(","))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_rows_write_nothing() {
        let dir = tempdir().unwrap();
        let result = write_normal(dir.path(), "articles", "task-1", &[]).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn normal_write_emits_bom_and_header() {
        let dir = tempdir().unwrap();
        let article = Article::seed_from_link("https://example.com/a", "task-1");
        let path = write_normal(dir.path(), "articles", "task-1", &[article])
            .unwrap()
            .expect("path written");

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..3], &BOM);
        let text = String::from_utf8_lossy(&bytes);
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("\u{feff}id,title,link"));
        let data_line = lines.next().unwrap();
        assert!(data_line.contains("https://example.com/a"));
    }

    #[test]
    fn cancelled_write_includes_partial_columns() {
        let dir = tempdir().unwrap();
        let article = Article::seed_from_link("https://example.com/b", "task-1");
        let path = write_cancelled(dir.path(), "articles", "task-1", &[article])
            .unwrap()
            .expect("path written");
        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.contains("is_partial_save"));
        assert!(header.contains("cancel_reason"));
        assert!(path.file_name().unwrap().to_string_lossy().contains("_cancelled_"));
    }
}
