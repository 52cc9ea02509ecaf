use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Categories of notifications produced upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Alert,
    Warning,
    Info,
    Suggestion,
    Insight,
    Digest,
}

/// Priority levels for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

/// Read/act lifecycle status of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Unread,
    Read,
    ActedUpon,
    Dismissed,
}

/// Domain notification as produced upstream and persisted by the store.
///
/// Only a flattened projection of this type crosses the WebSocket; heavier
/// fields such as `full_analysis` stay on the REST read path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub subscriber_id: Uuid,
    pub category: Category,
    pub priority: Priority,
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_analysis: Option<String>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        tenant_id: Uuid,
        subscriber_id: Uuid,
        category: Category,
        priority: Priority,
        title: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            subscriber_id,
            category,
            priority,
            title: title.into(),
            summary: summary.into(),
            full_analysis: None,
            status: Status::default(),
            created_at: Utc::now(),
        }
    }
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Alert => "alert",
            Category::Warning => "warning",
            Category::Info => "info",
            Category::Suggestion => "suggestion",
            Category::Insight => "insight",
            Category::Digest => "digest",
        }
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unread => "unread",
            Status::Read => "read",
            Status::ActedUpon => "acted_upon",
            Status::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alert" => Ok(Category::Alert),
            "warning" => Ok(Category::Warning),
            "info" => Ok(Category::Info),
            "suggestion" => Ok(Category::Suggestion),
            "insight" => Ok(Category::Insight),
            "digest" => Ok(Category::Digest),
            other => Err(format!("unknown notification category: {}", other)),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown notification priority: {}", other)),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unread" => Ok(Status::Unread),
            "read" => Ok(Status::Read),
            "acted_upon" => Ok(Status::ActedUpon),
            "dismissed" => Ok(Status::Dismissed),
            other => Err(format!("unknown notification status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_defaults() {
        let tenant = Uuid::new_v4();
        let subscriber = Uuid::new_v4();
        let n = Notification::new(
            tenant,
            subscriber,
            Category::Alert,
            Priority::High,
            "Stockout risk",
            "SKU-42 projected to run out in 3 days",
        );

        assert_eq!(n.tenant_id, tenant);
        assert_eq!(n.subscriber_id, subscriber);
        assert_eq!(n.status, Status::Unread);
        assert!(n.full_analysis.is_none());
    }

    #[test]
    fn test_enum_string_round_trip() {
        for c in [
            Category::Alert,
            Category::Warning,
            Category::Info,
            Category::Suggestion,
            Category::Insight,
            Category::Digest,
        ] {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        for p in [Priority::Critical, Priority::High, Priority::Medium, Priority::Low] {
            assert_eq!(p.as_str().parse::<Priority>().unwrap(), p);
        }
        for s in [Status::Unread, Status::Read, Status::ActedUpon, Status::Dismissed] {
            assert_eq!(s.as_str().parse::<Status>().unwrap(), s);
        }
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&Status::ActedUpon).unwrap();
        assert_eq!(json, "\"acted_upon\"");
    }
}
