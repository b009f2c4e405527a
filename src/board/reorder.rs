//! Pure board arithmetic over a column-partitioned mirror.
//!
//! The mirror is a flat list whose statuses never decrease in column order
//! (TODO, IN_PROGRESS, DONE, CANCELLED). Everything here preserves that.

use thiserror::Error;

use crate::models::{Task, TaskPriority, TaskStatus};

/// A drag-and-drop report from the UI layer. Columns are raw identifiers and
/// may not name a real status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    pub source_column: String,
    pub dest_column: String,
    pub task_id: String,
    pub dest_index: usize,
}

impl MoveIntent {
    pub fn new(
        source_column: impl Into<String>,
        dest_column: impl Into<String>,
        task_id: impl Into<String>,
        dest_index: usize,
    ) -> Self {
        MoveIntent {
            source_column: source_column.into(),
            dest_column: dest_column.into(),
            task_id: task_id.into(),
            dest_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveRejected {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("task {0} is not on the board")]
    UnknownTask(String),
    #[error("task {task_id} is in {actual}, not {claimed}")]
    SourceMismatch {
        task_id: String,
        claimed: TaskStatus,
        actual: TaskStatus,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// The task is already where the intent wants it.
    Unchanged,
    Moved { mirror: Vec<Task>, dest: TaskStatus },
}

pub fn resolve_column(raw: &str) -> Result<TaskStatus, MoveRejected> {
    raw.parse()
        .map_err(|_| MoveRejected::UnknownColumn(raw.to_string()))
}

fn column_len(mirror: &[Task], status: TaskStatus) -> usize {
    mirror.iter().filter(|t| t.status == status).count()
}

/// Global index at which a task lands when inserted at `index_in_column`.
/// The column index is clamped to the column length.
pub fn global_index(mirror: &[Task], status: TaskStatus, index_in_column: usize) -> usize {
    let preceding = mirror
        .iter()
        .filter(|t| t.status.column_index() < status.column_index())
        .count();
    preceding + index_in_column.min(column_len(mirror, status))
}

/// Computes the mirror after a move without touching the input.
pub fn plan_move(mirror: &[Task], intent: &MoveIntent) -> Result<MoveOutcome, MoveRejected> {
    let source = resolve_column(&intent.source_column)?;
    let dest = resolve_column(&intent.dest_column)?;
    let from = mirror
        .iter()
        .position(|t| t.id == intent.task_id)
        .ok_or_else(|| MoveRejected::UnknownTask(intent.task_id.clone()))?;
    if mirror[from].status != source {
        return Err(MoveRejected::SourceMismatch {
            task_id: intent.task_id.clone(),
            claimed: source,
            actual: mirror[from].status,
        });
    }

    let mut next = mirror.to_vec();
    let mut task = next.remove(from);

    if source == dest {
        let current = mirror[..from].iter().filter(|t| t.status == source).count();
        if intent.dest_index.min(column_len(&next, dest)) == current {
            return Ok(MoveOutcome::Unchanged);
        }
    }

    task.status = dest;
    let at = global_index(&next, dest, intent.dest_index);
    next.insert(at, task);
    Ok(MoveOutcome::Moved { mirror: next, dest })
}

/// Stable partition into column order; relative order inside a column is kept.
pub fn partition_by_column(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by_key(|t| t.status.column_index());
    tasks
}

pub fn is_partitioned(mirror: &[Task]) -> bool {
    mirror
        .windows(2)
        .all(|pair| pair[0].status.column_index() <= pair[1].status.column_index())
}

/// Inserts `task` as the last card of its column.
pub fn insert_at_column_end(mirror: &mut Vec<Task>, task: Task) {
    let at = global_index(mirror, task.status, usize::MAX);
    mirror.insert(at, task);
}

/// Client-side display filter. Status is expressed by column placement, so
/// only search text and priority are checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayFilter {
    pub search: Option<String>,
    pub priority: Option<TaskPriority>,
}

pub fn apply_filters<'a>(mirror: &'a [Task], filter: &DisplayFilter) -> Vec<&'a Task> {
    let needle = filter
        .search
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    mirror
        .iter()
        .filter(|t| filter.priority.map_or(true, |p| t.priority == p))
        .filter(|t| needle.as_deref().map_or(true, |n| t.mentions(n)))
        .collect()
}
