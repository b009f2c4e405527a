//! Client-side board: an in-memory mirror of the signed-in user's tasks with
//! optimistic create/update/delete/move.
//!
//! Each mutation is split in two. `begin_*` applies the change to the mirror
//! and returns a [`PendingMutation`]; once the remote call settles, `confirm`
//! reconciles with the server record or `fail` rolls the mirror back. The
//! async methods (`create_task`, `move_task`, ...) run both halves around the
//! remote call.
//!
//! A result is stale when a later mutation touched the same task after this
//! one began; stale results are ignored. A failure restores the exact
//! snapshot when nothing changed in between, otherwise only the failed task
//! is put back where it was.

pub mod api;
pub mod reorder;

use std::collections::HashMap;

use chrono::Utc;
use log::{debug, warn};
use uuid::Uuid;

use crate::models::{
    parse_due_date, AuthResponse, CreateTaskInput, LoginInput, PublicUser, RegisterInput, Task,
    TaskFilter, TaskStatus, UpdateTaskInput,
};

pub use api::{ClientError, HttpTaskApi, TaskApi};
pub use reorder::{
    apply_filters, is_partitioned, plan_move, DisplayFilter, MoveIntent, MoveOutcome,
    MoveRejected,
};
use reorder::{global_index, insert_at_column_end, partition_by_column};

const PENDING_PREFIX: &str = "pending-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A user-facing toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone)]
struct Session {
    user: PublicUser,
    token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MutationKind {
    Create { temp_id: String },
    Update { task_id: String },
    Delete { task_id: String },
    Move { task_id: String, requested: TaskStatus },
}

impl MutationKind {
    fn task_id(&self) -> &str {
        match self {
            MutationKind::Create { temp_id } => temp_id,
            MutationKind::Update { task_id }
            | MutationKind::Delete { task_id }
            | MutationKind::Move { task_id, .. } => task_id,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            MutationKind::Create { .. } => "create",
            MutationKind::Update { .. } => "update",
            MutationKind::Delete { .. } => "delete",
            MutationKind::Move { .. } => "move",
        }
    }
}

/// A change applied to the mirror that the server has not confirmed yet.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    kind: MutationKind,
    snapshot: Vec<Task>,
    revision: u64,
    epoch: u64,
}

impl PendingMutation {
    /// Id of the affected task; a temporary id for creates.
    pub fn task_id(&self) -> &str {
        self.kind.task_id()
    }
}

pub struct BoardController<A> {
    api: A,
    state: SessionState,
    session: Option<Session>,
    mirror: Vec<Task>,
    filters: TaskFilter,
    notifications: Vec<Notification>,
    // Bumped on every local change to the mirror.
    revision: u64,
    // Task id -> revision of the latest mutation that touched it.
    touched: HashMap<String, u64>,
    // Bumped whenever the session starts or ends.
    epoch: u64,
}

impl<A: TaskApi> BoardController<A> {
    pub fn new(api: A) -> Self {
        BoardController {
            api,
            state: SessionState::Unauthenticated,
            session: None,
            mirror: Vec::new(),
            filters: TaskFilter::default(),
            notifications: Vec::new(),
            revision: 0,
            touched: HashMap::new(),
            epoch: 0,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user(&self) -> Option<&PublicUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    /// The full mirror in column order.
    pub fn tasks(&self) -> &[Task] {
        &self.mirror
    }

    pub fn filters(&self) -> &TaskFilter {
        &self.filters
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn token(&self) -> Result<String, ClientError> {
        self.session
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(ClientError::NotAuthenticated)
    }

    fn notify(&mut self, level: NotificationLevel, title: &str, message: impl Into<String>) {
        self.notifications.push(Notification {
            level,
            title: title.to_string(),
            message: message.into(),
        });
    }

    // ---- session -------------------------------------------------------

    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), ClientError> {
        let input = LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        };
        match self.api.login(&input).await {
            Ok(auth) => {
                self.open_session(auth).await;
                Ok(())
            }
            Err(e) => {
                self.logout();
                self.notify(NotificationLevel::Error, "Login failed", e.to_string());
                Err(e)
            }
        }
    }

    pub async fn register(&mut self, input: RegisterInput) -> Result<(), ClientError> {
        match self.api.register(&input).await {
            Ok(auth) => {
                self.open_session(auth).await;
                Ok(())
            }
            Err(e) => {
                self.logout();
                self.notify(NotificationLevel::Error, "Registration failed", e.to_string());
                Err(e)
            }
        }
    }

    async fn open_session(&mut self, auth: AuthResponse) {
        self.epoch += 1;
        self.session = Some(Session {
            user: auth.user,
            token: auth.access_token,
        });
        if let Err(e) = self.load().await {
            debug!("Initial task load failed: {}", e);
        }
    }

    /// Discards the session and the mirror.
    pub fn logout(&mut self) {
        self.epoch += 1;
        self.revision += 1;
        self.session = None;
        self.state = SessionState::Unauthenticated;
        self.mirror.clear();
        self.touched.clear();
    }

    /// Replaces the filters and, when ready, reloads the authoritative list.
    pub async fn set_filters(&mut self, filters: TaskFilter) -> Result<(), ClientError> {
        self.filters = filters;
        if self.state == SessionState::Ready {
            self.load().await
        } else {
            Ok(())
        }
    }

    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        if self.session.is_none() {
            return Err(ClientError::NotAuthenticated);
        }
        self.load().await
    }

    // Non-optimistic: waits for the server and clears the mirror on failure.
    async fn load(&mut self) -> Result<(), ClientError> {
        let token = self.token()?;
        self.state = SessionState::Loading;
        let result = self.api.list_tasks(&token, &self.filters).await;
        self.revision += 1;
        self.touched.clear();
        self.state = SessionState::Ready;
        match result {
            Ok(tasks) => {
                self.mirror = partition_by_column(tasks);
                Ok(())
            }
            Err(e) => {
                self.mirror.clear();
                self.notify(NotificationLevel::Error, "Could not load tasks", e.to_string());
                Err(e)
            }
        }
    }

    // ---- display -------------------------------------------------------

    fn display_filter(&self) -> DisplayFilter {
        DisplayFilter {
            search: self.filters.search.clone(),
            priority: self.filters.priority,
        }
    }

    /// Mirror entries that pass the search and priority filters.
    pub fn apply_filters(&self) -> Vec<&Task> {
        apply_filters(&self.mirror, &self.display_filter())
    }

    /// Visible cards of one column, top to bottom.
    pub fn column(&self, status: TaskStatus) -> Vec<&Task> {
        self.apply_filters()
            .into_iter()
            .filter(|t| t.status == status)
            .collect()
    }

    // ---- optimistic half -----------------------------------------------

    fn position(&self, id: &str) -> Option<usize> {
        self.mirror.iter().position(|t| t.id == id)
    }

    fn track(&mut self, kind: MutationKind, snapshot: Vec<Task>) -> PendingMutation {
        self.revision += 1;
        self.touched.insert(kind.task_id().to_string(), self.revision);
        PendingMutation {
            kind,
            snapshot,
            revision: self.revision,
            epoch: self.epoch,
        }
    }

    // Replaces the entry with the same id, moving it to the end of its new
    // column when the status changed.
    fn replace_entry(&mut self, id: &str, task: Task) {
        let Some(pos) = self.position(id) else {
            return;
        };
        self.revision += 1;
        if self.mirror[pos].status == task.status {
            self.mirror[pos] = task;
        } else {
            self.mirror.remove(pos);
            insert_at_column_end(&mut self.mirror, task);
        }
    }

    pub fn begin_create(&mut self, input: &CreateTaskInput) -> Result<PendingMutation, ClientError> {
        let owner_id = self
            .session
            .as_ref()
            .map(|s| s.user.id.clone())
            .ok_or(ClientError::NotAuthenticated)?;
        let title = match input.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(ClientError::Validation("title should not be empty".to_string())),
        };
        let due_date = input
            .due_date
            .as_deref()
            .map(parse_due_date)
            .transpose()
            .map_err(|e| ClientError::Validation(e.to_string()))?;

        let now = Utc::now();
        let draft = Task {
            id: format!("{}{}", PENDING_PREFIX, Uuid::new_v4()),
            title,
            description: input.description.clone(),
            status: input.status.unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            owner_id,
            due_date,
            created_at: now,
            updated_at: now,
        };
        let temp_id = draft.id.clone();
        let snapshot = self.mirror.clone();
        insert_at_column_end(&mut self.mirror, draft);
        Ok(self.track(MutationKind::Create { temp_id }, snapshot))
    }

    // Cards whose create is still in flight have no server id to address.
    fn ensure_saved(id: &str) -> Result<(), ClientError> {
        if id.starts_with(PENDING_PREFIX) {
            return Err(ClientError::Unsaved(id.to_string()));
        }
        Ok(())
    }

    pub fn begin_update(
        &mut self,
        id: &str,
        patch: &UpdateTaskInput,
    ) -> Result<PendingMutation, ClientError> {
        Self::ensure_saved(id)?;
        let pos = self
            .position(id)
            .ok_or_else(|| ClientError::UnknownTask(id.to_string()))?;
        let mut task = self.mirror[pos].clone();

        if let Some(title) = patch.title.as_deref() {
            let title = title.trim();
            if title.is_empty() {
                return Err(ClientError::Validation("title should not be empty".to_string()));
            }
            task.title = title.to_string();
        }
        if let Some(description) = &patch.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(raw) = patch.due_date.as_deref() {
            task.due_date =
                Some(parse_due_date(raw).map_err(|e| ClientError::Validation(e.to_string()))?);
        }

        let snapshot = self.mirror.clone();
        self.replace_entry(id, task);
        Ok(self.track(
            MutationKind::Update {
                task_id: id.to_string(),
            },
            snapshot,
        ))
    }

    pub fn begin_delete(&mut self, id: &str) -> Result<PendingMutation, ClientError> {
        Self::ensure_saved(id)?;
        let pos = self
            .position(id)
            .ok_or_else(|| ClientError::UnknownTask(id.to_string()))?;
        let snapshot = self.mirror.clone();
        self.mirror.remove(pos);
        Ok(self.track(
            MutationKind::Delete {
                task_id: id.to_string(),
            },
            snapshot,
        ))
    }

    /// Applies a drag locally. `None` when the intent is malformed, targets
    /// an unsaved card or would not change anything; none of these needs a
    /// remote call.
    pub fn begin_move(&mut self, intent: &MoveIntent) -> Option<PendingMutation> {
        if let Err(e) = Self::ensure_saved(&intent.task_id) {
            warn!("Ignoring drag intent {:?}: {}", intent, e);
            return None;
        }
        match plan_move(&self.mirror, intent) {
            Ok(MoveOutcome::Unchanged) => None,
            Ok(MoveOutcome::Moved { mirror, dest }) => {
                let snapshot = std::mem::replace(&mut self.mirror, mirror);
                Some(self.track(
                    MutationKind::Move {
                        task_id: intent.task_id.clone(),
                        requested: dest,
                    },
                    snapshot,
                ))
            }
            Err(rejected) => {
                warn!("Ignoring drag intent {:?}: {}", intent, rejected);
                None
            }
        }
    }

    // ---- confirmation half ---------------------------------------------

    fn is_latest(&self, pending: &PendingMutation) -> bool {
        self.touched.get(pending.task_id()) == Some(&pending.revision)
    }

    fn settle(&mut self, pending: &PendingMutation) {
        if self.is_latest(pending) {
            self.touched.remove(pending.task_id());
        }
    }

    /// Reconciles a successful remote call. `saved` is the server record for
    /// create, update and move, `None` for delete.
    pub fn confirm(&mut self, pending: PendingMutation, saved: Option<&Task>) {
        if pending.epoch != self.epoch {
            debug!("Dropping {} result from a closed session", pending.kind.verb());
            return;
        }
        let fresh = self.is_latest(&pending);
        self.settle(&pending);

        match (&pending.kind, saved) {
            (MutationKind::Create { temp_id }, Some(server)) => {
                // A refresh may already have replaced the temporary card.
                self.replace_entry(temp_id, server.clone());
                self.notify(
                    NotificationLevel::Info,
                    "Task created",
                    "Your new task has been added successfully.",
                );
            }
            (MutationKind::Update { task_id }, Some(server)) => {
                if fresh {
                    self.replace_entry(task_id, server.clone());
                } else {
                    debug!("Ignoring stale update result for {}", task_id);
                }
                self.notify(
                    NotificationLevel::Info,
                    "Task updated",
                    "Your task has been updated successfully.",
                );
            }
            (MutationKind::Move { task_id, requested }, Some(server)) => {
                if fresh && server.status != *requested {
                    self.replace_entry(task_id, server.clone());
                }
            }
            (MutationKind::Delete { .. }, _) => {
                self.notify(
                    NotificationLevel::Info,
                    "Task deleted",
                    "The task has been removed from your project.",
                );
            }
            (kind, None) => {
                debug!("No server record to reconcile {} of {}", kind.verb(), kind.task_id());
            }
        }
    }

    /// Rolls back a failed remote call and reports it. Returns the error.
    pub fn fail(&mut self, pending: PendingMutation, error: ClientError) -> ClientError {
        if pending.epoch != self.epoch {
            debug!("Dropping {} failure from a closed session", pending.kind.verb());
            return error;
        }
        warn!(
            "Remote {} of {} failed, rolling back: {}",
            pending.kind.verb(),
            pending.task_id(),
            error
        );

        if self.revision == pending.revision {
            self.settle(&pending);
            self.mirror = pending.snapshot;
        } else {
            match &pending.kind {
                MutationKind::Create { temp_id } => {
                    if let Some(pos) = self.position(temp_id) {
                        self.mirror.remove(pos);
                    }
                }
                kind if self.is_latest(&pending) => {
                    self.restore_from(&pending.snapshot, kind.task_id());
                }
                kind => debug!("{} of {} superseded; not rolling back", kind.verb(), kind.task_id()),
            }
            self.settle(&pending);
        }
        self.revision += 1;

        let title = format!("Could not {} task", pending.kind.verb());
        self.notify(NotificationLevel::Error, &title, error.to_string());
        error
    }

    // Puts one task back at its snapshot column position.
    fn restore_from(&mut self, snapshot: &[Task], id: &str) {
        if let Some(pos) = self.position(id) {
            self.mirror.remove(pos);
        }
        let Some(at) = snapshot.iter().position(|t| t.id == id) else {
            return;
        };
        let original = snapshot[at].clone();
        let index_in_column = snapshot[..at]
            .iter()
            .filter(|t| t.status == original.status)
            .count();
        let global = global_index(&self.mirror, original.status, index_in_column);
        self.mirror.insert(global, original);
    }

    // ---- full round trips ----------------------------------------------

    pub async fn create_task(&mut self, input: CreateTaskInput) -> Result<Task, ClientError> {
        let token = self.token()?;
        let pending = self.begin_create(&input)?;
        match self.api.create_task(&token, &input).await {
            Ok(task) => {
                self.confirm(pending, Some(&task));
                Ok(task)
            }
            Err(e) => Err(self.fail(pending, e)),
        }
    }

    pub async fn update_task(
        &mut self,
        id: &str,
        patch: UpdateTaskInput,
    ) -> Result<Task, ClientError> {
        let token = self.token()?;
        let pending = self.begin_update(id, &patch)?;
        match self.api.update_task(&token, id, &patch).await {
            Ok(task) => {
                self.confirm(pending, Some(&task));
                Ok(task)
            }
            Err(e) => Err(self.fail(pending, e)),
        }
    }

    pub async fn delete_task(&mut self, id: &str) -> Result<(), ClientError> {
        let token = self.token()?;
        let pending = self.begin_delete(id)?;
        match self.api.delete_task(&token, id).await {
            Ok(()) => {
                self.confirm(pending, None);
                Ok(())
            }
            Err(e) => Err(self.fail(pending, e)),
        }
    }

    /// Drags a card. Returns `false` when nothing moved and no request was sent.
    pub async fn move_task(&mut self, intent: &MoveIntent) -> Result<bool, ClientError> {
        let token = self.token()?;
        Self::ensure_saved(&intent.task_id)?;
        let Some(pending) = self.begin_move(intent) else {
            return Ok(false);
        };
        let MutationKind::Move { requested, .. } = &pending.kind else {
            return Ok(false);
        };
        let patch = UpdateTaskInput::status(*requested);
        match self.api.update_task(&token, &intent.task_id, &patch).await {
            Ok(task) => {
                self.confirm(pending, Some(&task));
                Ok(true)
            }
            Err(e) => Err(self.fail(pending, e)),
        }
    }
}
