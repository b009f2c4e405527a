use chrono::{DateTime, Utc};
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};

use crate::models::{Task, TaskFilter, TaskPriority, TaskStatus};

/// A task query that is always constrained to a single owner.
///
/// There is no constructor without an owner, so the repositories cannot be
/// asked for another user's rows. Every clause is AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskQuery {
    owner_id: String,
    id: Option<String>,
    status: Option<TaskStatus>,
    status_not: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    search: Option<String>,
    due_before: Option<DateTime<Utc>>,
}

impl TaskQuery {
    pub fn owned_by(owner_id: impl Into<String>) -> Self {
        TaskQuery {
            owner_id: owner_id.into(),
            id: None,
            status: None,
            status_not: None,
            priority: None,
            search: None,
            due_before: None,
        }
    }

    /// Owner-scoped query carrying the list filter.
    pub fn from_filter(owner_id: impl Into<String>, filter: &TaskFilter) -> Self {
        let mut query = TaskQuery::owned_by(owner_id);
        query.status = filter.status;
        query.priority = filter.priority;
        query.search = filter.search_text().map(str::to_string);
        query
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn excluding_status(mut self, status: TaskStatus) -> Self {
        self.status_not = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.is_empty() { None } else { Some(search) };
        self
    }

    pub fn due_before(mut self, instant: DateTime<Utc>) -> Self {
        self.due_before = Some(instant);
        self
    }

    /// Evaluates the query against a task held in memory.
    pub fn matches(&self, task: &Task) -> bool {
        if task.owner_id != self.owner_id {
            return false;
        }
        if self.id.as_deref().is_some_and(|id| id != task.id) {
            return false;
        }
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.status_not.is_some_and(|s| s == task.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        if let Some(search) = &self.search {
            if !task.mentions(&search.to_lowercase()) {
                return false;
            }
        }
        if let Some(limit) = self.due_before {
            // Tasks without a due date are never overdue.
            if !task.due_date.is_some_and(|due| due < limit) {
                return false;
            }
        }
        true
    }

    /// Renders the query as a MongoDB filter over the `tasks` collection.
    pub fn to_document(&self) -> Document {
        let mut filter = doc! { "owner_id": &self.owner_id };
        if let Some(id) = &self.id {
            filter.insert("_id", id);
        }

        let mut status_clause = Document::new();
        if let Some(status) = self.status {
            status_clause.insert("$eq", status.as_str());
        }
        if let Some(status) = self.status_not {
            status_clause.insert("$ne", status.as_str());
        }
        if !status_clause.is_empty() {
            filter.insert("status", status_clause);
        }

        if let Some(priority) = self.priority {
            filter.insert("priority", priority.as_str());
        }
        if let Some(search) = &self.search {
            let pattern = regex::escape(search);
            filter.insert(
                "$or",
                vec![
                    doc! { "title": { "$regex": &pattern, "$options": "i" } },
                    doc! { "description": { "$regex": &pattern, "$options": "i" } },
                ],
            );
        }
        if let Some(limit) = self.due_before {
            filter.insert(
                "due_date",
                doc! { "$lt": BsonDateTime::from_millis(limit.timestamp_millis()) },
            );
        }
        filter
    }
}

/// Result ordering for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOrder {
    NewestFirst,
    DueSoonest,
}

impl TaskOrder {
    pub fn sort(&self, tasks: &mut [Task]) {
        match self {
            TaskOrder::NewestFirst => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            TaskOrder::DueSoonest => tasks.sort_by(|a, b| a.due_date.cmp(&b.due_date)),
        }
    }

    pub fn to_document(&self) -> Document {
        match self {
            TaskOrder::NewestFirst => doc! { "created_at": -1 },
            TaskOrder::DueSoonest => doc! { "due_date": 1 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn task(owner: &str, title: &str, description: Option<&str>) -> Task {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        Task {
            id: format!("{}-{}", owner, title),
            title: title.to_string(),
            description: description.map(str::to_string),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            owner_id: owner.to_string(),
            due_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn other_owners_never_match() {
        let query = TaskQuery::owned_by("alice");
        assert!(query.matches(&task("alice", "a", None)));
        assert!(!query.matches(&task("bob", "a", None)));
    }

    #[test]
    fn search_is_case_insensitive_over_title_or_description() {
        let query = TaskQuery::owned_by("alice").with_search("RePoRt");
        assert!(query.matches(&task("alice", "Quarterly report", None)));
        assert!(query.matches(&task("alice", "Numbers", Some("for the REPORT deck"))));
        assert!(!query.matches(&task("alice", "Numbers", None)));
    }

    #[test]
    fn empty_search_is_ignored() {
        let filter = TaskFilter {
            search: Some(String::new()),
            ..Default::default()
        };
        let query = TaskQuery::from_filter("alice", &filter);
        assert!(query.matches(&task("alice", "anything", None)));
        assert!(!query.to_document().contains_key("$or"));
    }

    #[test]
    fn due_before_skips_undated_tasks() {
        let cutoff = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let query = TaskQuery::owned_by("alice").due_before(cutoff);
        let mut dated = task("alice", "dated", None);
        dated.due_date = Some(cutoff - Duration::days(1));
        assert!(query.matches(&dated));
        dated.due_date = Some(cutoff);
        assert!(!query.matches(&dated));
        assert!(!query.matches(&task("alice", "undated", None)));
    }

    #[test]
    fn document_scopes_by_owner_and_escapes_search() {
        let query = TaskQuery::owned_by("alice")
            .with_status(TaskStatus::Done)
            .excluding_status(TaskStatus::Cancelled)
            .with_priority(TaskPriority::High)
            .with_search("a.b");
        let filter = query.to_document();
        assert_eq!(filter.get_str("owner_id").unwrap(), "alice");
        assert_eq!(filter.get_str("priority").unwrap(), "HIGH");
        let status = filter.get_document("status").unwrap();
        assert_eq!(status.get_str("$eq").unwrap(), "DONE");
        assert_eq!(status.get_str("$ne").unwrap(), "CANCELLED");
        let or = filter.get_array("$or").unwrap();
        let title = or[0].as_document().unwrap().get_document("title").unwrap();
        assert_eq!(title.get_str("$regex").unwrap(), r"a\.b");
    }

    #[test]
    fn newest_first_orders_by_created_at_descending() {
        let mut older = task("alice", "older", None);
        let mut newer = task("alice", "newer", None);
        older.created_at -= Duration::hours(1);
        newer.created_at += Duration::hours(1);
        let mut tasks = vec![older.clone(), newer.clone()];
        TaskOrder::NewestFirst.sort(&mut tasks);
        assert_eq!(tasks, vec![newer, older]);
    }
}
