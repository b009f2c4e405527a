use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use log::info;
use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Document},
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};

use super::{email_taken, TaskOrder, TaskQuery, TaskRepository, UserRepository};
use crate::error::AppError;
use crate::models::{Task, TaskPriority, TaskStatistics, TaskStatus, User};

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoDB {
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Result<Self, AppError> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        info!("Connected to MongoDB database '{}'", db_name);
        Ok(MongoDB { db })
    }
}

fn to_bson_date(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

fn from_bson_date(dt: BsonDateTime) -> DateTime<Utc> {
    dt.to_system_time().into()
}

/// Shape of a row in the `tasks` collection.
#[derive(Debug, Serialize, Deserialize)]
struct TaskDocument {
    #[serde(rename = "_id")]
    id: String,
    owner_id: String,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: TaskPriority,
    due_date: Option<BsonDateTime>,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

impl From<&Task> for TaskDocument {
    fn from(task: &Task) -> Self {
        TaskDocument {
            id: task.id.clone(),
            owner_id: task.owner_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            due_date: task.due_date.map(to_bson_date),
            created_at: to_bson_date(task.created_at),
            updated_at: to_bson_date(task.updated_at),
        }
    }
}

impl From<TaskDocument> for Task {
    fn from(row: TaskDocument) -> Self {
        Task {
            id: row.id,
            title: row.title,
            description: row.description,
            status: row.status,
            priority: row.priority,
            owner_id: row.owner_id,
            due_date: row.due_date.map(from_bson_date),
            created_at: from_bson_date(row.created_at),
            updated_at: from_bson_date(row.updated_at),
        }
    }
}

pub struct MongoTaskRepository {
    collection: Collection<TaskDocument>,
}

impl MongoTaskRepository {
    pub fn new(mongodb: &MongoDB) -> Self {
        MongoTaskRepository {
            collection: mongodb.db.collection::<TaskDocument>("tasks"),
        }
    }

    /// Counts matching tasks grouped by `field`.
    async fn group_counts(
        &self,
        query: &TaskQuery,
        field: &str,
    ) -> Result<Vec<(String, u64)>, AppError> {
        let pipeline = vec![
            doc! { "$match": query.to_document() },
            doc! { "$group": { "_id": format!("${}", field), "count": { "$sum": 1 } } },
        ];
        let rows: Vec<Document> = self
            .collection
            .aggregate(pipeline)
            .await?
            .try_collect()
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let key = row.get_str("_id").ok()?;
                let count = match row.get("count")? {
                    Bson::Int32(n) => *n as u64,
                    Bson::Int64(n) => *n as u64,
                    _ => return None,
                };
                Some((key.to_string(), count))
            })
            .collect())
    }
}

#[async_trait]
impl TaskRepository for MongoTaskRepository {
    async fn insert(&self, task: &Task) -> Result<(), AppError> {
        self.collection.insert_one(TaskDocument::from(task)).await?;
        Ok(())
    }

    async fn find(&self, query: &TaskQuery, order: TaskOrder) -> Result<Vec<Task>, AppError> {
        let rows: Vec<TaskDocument> = self
            .collection
            .find(query.to_document())
            .sort(order.to_document())
            .await?
            .try_collect()
            .await?;
        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn find_one(&self, query: &TaskQuery) -> Result<Option<Task>, AppError> {
        let row = self.collection.find_one(query.to_document()).await?;
        Ok(row.map(Task::from))
    }

    async fn replace(&self, task: &Task) -> Result<bool, AppError> {
        let filter = doc! { "_id": &task.id, "owner_id": &task.owner_id };
        let result = self
            .collection
            .replace_one(filter, TaskDocument::from(task))
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, query: &TaskQuery) -> Result<u64, AppError> {
        let result = self.collection.delete_many(query.to_document()).await?;
        Ok(result.deleted_count)
    }

    async fn statistics(&self, query: &TaskQuery) -> Result<TaskStatistics, AppError> {
        let mut stats = TaskStatistics::default();
        for (key, count) in self.group_counts(query, "status").await? {
            if let Ok(status) = key.parse::<TaskStatus>() {
                stats.by_status.insert(status, count);
            }
        }
        for (key, count) in self.group_counts(query, "priority").await? {
            if let Some(priority) = TaskPriority::ALL.into_iter().find(|p| p.as_str() == key) {
                stats.by_priority.insert(priority, count);
            }
        }
        Ok(stats)
    }
}

/// Shape of a row in the `users` collection.
#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    created_at: BsonDateTime,
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        UserDocument {
            id: user.id.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            created_at: to_bson_date(user.created_at),
        }
    }
}

impl From<UserDocument> for User {
    fn from(row: UserDocument) -> Self {
        User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            created_at: from_bson_date(row.created_at),
        }
    }
}

pub struct MongoUserRepository {
    collection: Collection<UserDocument>,
}

impl MongoUserRepository {
    /// Opens the `users` collection and makes sure emails are unique.
    pub async fn init(mongodb: &MongoDB) -> Result<Self, AppError> {
        let collection = mongodb.db.collection::<UserDocument>("users");
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection.create_index(index).await?;
        Ok(MongoUserRepository { collection })
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn insert(&self, user: &User) -> Result<(), AppError> {
        match self.collection.insert_one(UserDocument::from(user)).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(email_taken()),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = self.collection.find_one(doc! { "email": email }).await?;
        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = self.collection.find_one(doc! { "_id": id }).await?;
        Ok(row.map(User::from))
    }
}
