use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, Document},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};

use super::{
    CourseStore, LeaderboardStore, LiveSessionStore, ProgressStore, StoreError, StoreLifecycle,
    StoreResult,
};
use crate::metrics::track_db_operation;
use crate::models::{
    course::{Course, Item, Section},
    leaderboard::LeaderboardEntry,
    live_session::{date_key, LiveSession, SessionStatus},
    chrono_to_bson,
    progress::Progress,
};

const COURSES: &str = "courses";
const PROGRESS: &str = "course_progress";
const LIVE_SESSIONS: &str = "live_sessions";
const LEADERBOARD: &str = "leaderboard";

const DUPLICATE_KEY_CODE: i32 = 11000;
const BAD_VALUE_CODE: i32 = 2;

/// MongoDB backend. Each write touches a single document.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await.map_err(map_mongo_error)?;
        let db = client.database(database);
        let store = Self { client, db };

        store.ensure_indexes().await?;
        tracing::info!("MongoDB connected (database: {})", database);

        Ok(store)
    }

    /// Unique indexes backstop the existence checks done by the services.
    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.sessions()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "topic": 1, "batch": 1, "date": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .map_err(map_mongo_error)?;

        self.sessions()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "recurs_weekly": 1, "date": 1 })
                    .build(),
            )
            .await
            .map_err(map_mongo_error)?;

        self.progress()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "course_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .map_err(map_mongo_error)?;

        self.leaderboard()
            .create_index(IndexModel::builder().keys(doc! { "batch": 1 }).build())
            .await
            .map_err(map_mongo_error)?;

        tracing::debug!("MongoDB indexes ensured");
        Ok(())
    }

    fn courses(&self) -> Collection<Course> {
        self.db.collection::<Course>(COURSES)
    }

    fn progress(&self) -> Collection<Progress> {
        self.db.collection::<Progress>(PROGRESS)
    }

    fn sessions(&self) -> Collection<LiveSession> {
        self.db.collection::<LiveSession>(LIVE_SESSIONS)
    }

    fn leaderboard(&self) -> Collection<LeaderboardEntry> {
        self.db.collection::<LeaderboardEntry>(LEADERBOARD)
    }
}

fn map_mongo_error(err: MongoError) -> StoreError {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY_CODE => {
            StoreError::DuplicateKey(we.message.clone())
        }
        ErrorKind::Command(ref ce) if ce.code == DUPLICATE_KEY_CODE => {
            StoreError::DuplicateKey(ce.message.clone())
        }
        // `$inc` past the int64 range is rejected as BadValue.
        ErrorKind::Command(ref ce) if ce.code == BAD_VALUE_CODE && ce.message.contains("$inc") => {
            StoreError::Overflow(ce.message.clone())
        }
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. } => {
            StoreError::Connection(err.to_string())
        }
        ErrorKind::Shutdown => StoreError::Closed,
        ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
            StoreError::Serialization(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}

fn bson_value<T: serde::Serialize>(value: &T) -> StoreResult<mongodb::bson::Bson> {
    to_bson(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl CourseStore for MongoStore {
    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        track_db_operation("insert_one", COURSES, async {
            self.courses()
                .insert_one(course)
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(())
    }

    async fn find_course(&self, course_id: &str) -> StoreResult<Option<Course>> {
        track_db_operation("find_one", COURSES, async {
            self.courses()
                .find_one(doc! { "_id": course_id })
                .await
                .map_err(map_mongo_error)
        })
        .await
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        track_db_operation("find", COURSES, async {
            let cursor = self
                .courses()
                .find(doc! {})
                .sort(doc! { "createdAt": 1, "_id": 1 })
                .await
                .map_err(map_mongo_error)?;
            cursor.try_collect::<Vec<_>>().await.map_err(map_mongo_error)
        })
        .await
    }

    async fn push_section(&self, course_id: &str, section: &Section) -> StoreResult<bool> {
        let section_bson = bson_value(section)?;
        let result = track_db_operation("update_one", COURSES, async {
            self.courses()
                .update_one(
                    doc! { "_id": course_id },
                    doc! {
                        "$push": { "sections": section_bson },
                        "$set": { "updatedAt": chrono_to_bson(Utc::now()) },
                    },
                )
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(result.matched_count > 0)
    }

    async fn push_item(
        &self,
        course_id: &str,
        section_id: &str,
        item: &Item,
    ) -> StoreResult<bool> {
        let item_bson = bson_value(item)?;
        let result = track_db_operation("update_one", COURSES, async {
            self.courses()
                .update_one(
                    doc! { "_id": course_id, "sections.id": section_id },
                    doc! {
                        "$push": { "sections.$.items": item_bson },
                        "$set": { "updatedAt": chrono_to_bson(Utc::now()) },
                    },
                )
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(result.matched_count > 0)
    }

    async fn pull_item(&self, course_id: &str, item_id: &str) -> StoreResult<bool> {
        let result = track_db_operation("update_one", COURSES, async {
            self.courses()
                .update_one(
                    doc! { "_id": course_id, "sections.items.id": item_id },
                    doc! {
                        "$pull": { "sections.$[].items": { "id": item_id } },
                        "$set": { "updatedAt": chrono_to_bson(Utc::now()) },
                    },
                )
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl ProgressStore for MongoStore {
    async fn find_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<Progress>> {
        track_db_operation("find_one", PROGRESS, async {
            self.progress()
                .find_one(doc! { "user_id": user_id, "course_id": course_id })
                .await
                .map_err(map_mongo_error)
        })
        .await
    }

    async fn save_progress(&self, progress: &Progress) -> StoreResult<()> {
        track_db_operation("replace_one", PROGRESS, async {
            self.progress()
                .replace_one(
                    doc! { "user_id": &progress.user_id, "course_id": &progress.course_id },
                    progress,
                )
                .upsert(true)
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LiveSessionStore for MongoStore {
    async fn find_session(&self, session_id: &str) -> StoreResult<Option<LiveSession>> {
        track_db_operation("find_one", LIVE_SESSIONS, async {
            self.sessions()
                .find_one(doc! { "_id": session_id })
                .await
                .map_err(map_mongo_error)
        })
        .await
    }

    async fn occurrence_exists(
        &self,
        topic: &str,
        batch: &str,
        date: NaiveDate,
    ) -> StoreResult<bool> {
        let found = track_db_operation("find_one", LIVE_SESSIONS, async {
            self.db
                .collection::<Document>(LIVE_SESSIONS)
                .find_one(doc! { "topic": topic, "batch": batch, "date": date_key(date) })
                .projection(doc! { "_id": 1 })
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(found.is_some())
    }

    async fn insert_session(&self, session: &LiveSession) -> StoreResult<()> {
        track_db_operation("insert_one", LIVE_SESSIONS, async {
            self.sessions()
                .insert_one(session)
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(())
    }

    async fn find_due_recurring(&self, date: NaiveDate) -> StoreResult<Vec<LiveSession>> {
        track_db_operation("find", LIVE_SESSIONS, async {
            let cursor = self
                .sessions()
                .find(doc! { "recurs_weekly": true, "date": { "$lte": date_key(date) } })
                .sort(doc! { "date": 1, "_id": 1 })
                .await
                .map_err(map_mongo_error)?;
            cursor.try_collect::<Vec<_>>().await.map_err(map_mongo_error)
        })
        .await
    }

    async fn list_sessions(
        &self,
        batch: &str,
        from: Option<NaiveDate>,
    ) -> StoreResult<Vec<LiveSession>> {
        let mut filter = doc! { "batch": batch };
        if let Some(from) = from {
            filter.insert("date", doc! { "$gte": date_key(from) });
        }

        track_db_operation("find", LIVE_SESSIONS, async {
            let cursor = self
                .sessions()
                .find(filter)
                .sort(doc! { "date": 1, "time": 1, "topic": 1 })
                .await
                .map_err(map_mongo_error)?;
            cursor.try_collect::<Vec<_>>().await.map_err(map_mongo_error)
        })
        .await
    }

    async fn set_status(&self, session_id: &str, status: SessionStatus) -> StoreResult<bool> {
        let result = track_db_operation("update_one", LIVE_SESSIONS, async {
            self.sessions()
                .update_one(
                    doc! { "_id": session_id },
                    doc! { "$set": { "status": status.as_str() } },
                )
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl LeaderboardStore for MongoStore {
    async fn increment(
        &self,
        user_id: &str,
        batch: &str,
        points: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<LeaderboardEntry> {
        let updated = track_db_operation("find_one_and_update", LEADERBOARD, async {
            self.leaderboard()
                .find_one_and_update(
                    doc! { "_id": user_id },
                    doc! {
                        "$inc": { "points": points, "tasks_completed": 1_i64 },
                        "$set": { "batch": batch, "lastUpdated": chrono_to_bson(at) },
                    },
                )
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await
                .map_err(map_mongo_error)
        })
        .await?;

        updated.ok_or_else(|| StoreError::Query(format!("upsert returned no entry for {}", user_id)))
    }

    async fn find_entry(&self, user_id: &str) -> StoreResult<Option<LeaderboardEntry>> {
        track_db_operation("find_one", LEADERBOARD, async {
            self.leaderboard()
                .find_one(doc! { "_id": user_id })
                .await
                .map_err(map_mongo_error)
        })
        .await
    }

    async fn list_entries(&self, batch: Option<&str>) -> StoreResult<Vec<LeaderboardEntry>> {
        let filter = match batch {
            Some(batch) => doc! { "batch": batch },
            None => doc! {},
        };

        track_db_operation("find", LEADERBOARD, async {
            let cursor = self
                .leaderboard()
                .find(filter)
                .await
                .map_err(map_mongo_error)?;
            cursor.try_collect::<Vec<_>>().await.map_err(map_mongo_error)
        })
        .await
    }

    async fn reset_all(&self) -> StoreResult<u64> {
        let result = track_db_operation("update_many", LEADERBOARD, async {
            self.leaderboard()
                .update_many(
                    doc! {},
                    doc! { "$set": { "points": 0_i64, "tasks_completed": 0_i64 } },
                )
                .await
                .map_err(map_mongo_error)
        })
        .await?;
        Ok(result.matched_count)
    }
}

#[async_trait]
impl StoreLifecycle for MongoStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}
