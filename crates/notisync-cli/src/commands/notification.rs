//! Notification inbox commands.

use chrono::Utc;
use clap::Args;
use dialoguer::Confirm;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use notisync_core::config::AppConfig;
use notisync_core::error::AppError;
use notisync_core::types::id::NotificationId;
use notisync_entity::Notification;
use notisync_source::NotificationSource;

/// Arguments for `list`
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only show unread notifications
    #[arg(short, long)]
    pub unread: bool,

    /// Show at most this many rows
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Notification display row for table output
#[derive(Debug, Serialize, Tabled)]
struct NotificationRow {
    /// Notification ID
    id: String,
    /// Unread marker
    #[tabled(rename = "")]
    unread: String,
    /// Priority
    priority: String,
    /// Kind
    kind: String,
    /// Title
    title: String,
    /// Age
    age: String,
}

impl NotificationRow {
    fn from_notification(n: &Notification, now: chrono::DateTime<Utc>) -> Self {
        Self {
            id: n.id.to_string(),
            unread: if n.is_unread() { "●" } else { "" }.to_string(),
            priority: n.priority.as_str().to_string(),
            kind: n.kind.as_str().to_string(),
            title: n.title.clone(),
            age: format_age(now.signed_duration_since(n.created_at)),
        }
    }
}

/// Compact relative age, e.g. `5m`, `3h`, `2d`.
fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}

/// Fetch and print the full list.
pub async fn list(
    source: &dyn NotificationSource,
    config: &AppConfig,
    args: &ListArgs,
    format: OutputFormat,
) -> Result<(), AppError> {
    let items = source
        .fetch_all(config.api.page_size, config.api.max_pages)
        .await?;
    let unread = items.iter().filter(|n| n.is_unread()).count();

    let now = Utc::now();
    let rows: Vec<NotificationRow> = items
        .iter()
        .filter(|n| !args.unread || n.is_unread())
        .take(args.limit.unwrap_or(usize::MAX))
        .map(|n| NotificationRow::from_notification(n, now))
        .collect();

    output::print_list(&rows, format);
    if format == OutputFormat::Table {
        output::print_kv("Unread", &unread.to_string());
    }
    Ok(())
}

/// Mark one notification read.
pub async fn mark_read(source: &dyn NotificationSource, id: &str) -> Result<(), AppError> {
    source.mark_read(&NotificationId::new(id)).await?;
    output::print_success(&format!("Notification '{}' marked read", id));
    Ok(())
}

/// Mark every notification read.
pub async fn mark_all_read(source: &dyn NotificationSource) -> Result<(), AppError> {
    source.mark_all_read().await?;
    output::print_success("All notifications marked read");
    Ok(())
}

/// Delete a notification after confirmation.
pub async fn delete(source: &dyn NotificationSource, id: &str, yes: bool) -> Result<(), AppError> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete notification '{}'?", id))
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Prompt failed: {}", e)))?;
        if !confirmed {
            output::print_warning("Cancelled");
            return Ok(());
        }
    }

    source.delete(&NotificationId::new(id)).await?;
    output::print_success(&format!("Notification '{}' deleted", id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::seconds(-5)), "0s");
        assert_eq!(format_age(Duration::seconds(42)), "42s");
        assert_eq!(format_age(Duration::minutes(5)), "5m");
        assert_eq!(format_age(Duration::hours(3)), "3h");
        assert_eq!(format_age(Duration::days(2)), "2d");
    }

    #[test]
    fn test_row_marks_unread() {
        let now = Utc::now();
        let unread = Notification::new("a", "Hello", "", now - Duration::minutes(2));
        let row = NotificationRow::from_notification(&unread, now);
        assert_eq!(row.unread, "●");
        assert_eq!(row.age, "2m");

        let read = unread.with_read_at(now);
        assert_eq!(NotificationRow::from_notification(&read, now).unread, "");
    }
}
