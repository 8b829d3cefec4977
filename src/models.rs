use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Represents a single task in the list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque unique identifier, assigned at creation.
    pub id: String,
    /// Display text, always stored trimmed and non-empty.
    pub title: String,
    /// Whether the task has been completed.
    #[serde(default)]
    pub completed: bool,
    /// Creation timestamp, the default ordering key.
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Builds a fresh, not yet completed task with a new id and the current time.
    pub fn new(title: &str) -> Task {
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.trim().to_string(),
            completed: false,
            created_at: Utc::now(),
        }
    }

    /// Applies the fields present in `patch`, leaving the others untouched.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }
}

/// Partial update of a task's mutable fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> TaskPatch {
        TaskPatch { title: Some(title.into()), completed: None }
    }

    pub fn completed(completed: bool) -> TaskPatch {
        TaskPatch { title: None, completed: Some(completed) }
    }
}

/// Completion-status filter applied to the displayed list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.completed,
            Filter::Completed => task.completed,
        }
    }

    /// Cycles All -> Active -> Completed -> All.
    pub fn next(&self) -> Filter {
        match self {
            Filter::All => Filter::Active,
            Filter::Active => Filter::Completed,
            Filter::Completed => Filter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Filter::All => "All",
            Filter::Active => "Active",
            Filter::Completed => "Completed",
        }
    }
}

/// Ordering by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    #[value(alias = "asc")]
    Ascending,
    #[default]
    #[value(alias = "desc")]
    Descending,
}

impl SortOrder {
    pub fn reversed(&self) -> SortOrder {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "Oldest First",
            SortOrder::Descending => "Newest First",
        }
    }
}

/// Transient view parameters. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewParams {
    pub filter: Filter,
    pub sort: SortOrder,
    pub search_query: String,
}

/// Timestamps are written the way a browser's `Date#toJSON` writes them
/// (`2024-05-01T10:00:00.000Z`). Reading accepts RFC 3339 and also ISO-8601
/// date-times without an offset, which are taken as local time.
mod iso_millis {
    use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
            return Some(d.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
            .ok()?;
        let utc = match Local.from_local_datetime(&naive).earliest() {
            Some(local) => local.with_timezone(&Utc),
            // Skipped by a DST transition; no local reading exists.
            None => Utc.from_utc_datetime(&naive),
        };
        Some(utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDate, TimeZone};

    #[test]
    fn test_created_at_uses_browser_json_format() {
        let task = Task {
            id: "a".into(),
            title: "Buy milk".into(),
            completed: false,
            created_at: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap().with_timezone(&Utc),
        };
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"createdAt\":\"2024-05-01T10:00:00.000Z\""));
    }

    #[test]
    fn test_timestamp_without_offset_reads_as_local_time() {
        let json = r#"{"id":"a","title":"T","completed":false,"createdAt":"2024-05-01T10:00:00"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        let expected = Local
            .from_local_datetime(&NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(10, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(task.created_at, expected);

        let json = r#"{"id":"a","title":"T","createdAt":"2024-05-01T10:00:00.250"}"#;
        assert!(serde_json::from_str::<Task>(json).is_ok());
        let json = r#"{"id":"a","title":"T","createdAt":"yesterday"}"#;
        assert!(serde_json::from_str::<Task>(json).is_err());
    }

    #[test]
    fn test_new_trims_title() {
        let task = Task::new("  Walk the dog ");
        assert_eq!(task.title, "Walk the dog");
        assert!(!task.completed);
        assert!(!task.id.is_empty());
    }

    #[test]
    fn test_filter_cycle() {
        assert_eq!(Filter::All.next(), Filter::Active);
        assert_eq!(Filter::Active.next(), Filter::Completed);
        assert_eq!(Filter::Completed.next(), Filter::All);
    }
}
