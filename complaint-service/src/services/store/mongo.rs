use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, ClientSession, Collection, Database, IndexModel,
};
use service_core::error::AppError;

use super::{not_deleted, sort_groups, ComplaintStore, GroupCount, UserDirectory, UserPatch};
use crate::models::{Comment, Complaint, ComplaintStatus, User, UserRole};
use crate::services::error::ServiceError;
use crate::services::query::{ListStore, Page, Predicate, QueryPlan};
use crate::utils::document_to_json;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for complaint-service");

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("email_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.users()
            .create_index(email_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create email index on users collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created unique index on users.email");

        let complaint_indexes = [
            ("department_status", doc! { "department": 1, "status": 1 }),
            ("citizen_lookup", doc! { "citizen": 1, "createdAt": -1 }),
            ("location_lookup", doc! { "district": 1, "thana": 1 }),
        ];

        for (name, keys) in complaint_indexes {
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build();

            self.complaints()
                .create_index(index, None)
                .await
                .map_err(|e| {
                    tracing::error!(index = name, "Failed to create complaints index: {}", e);
                    AppError::from(e)
                })?;
            tracing::info!(index = name, "Created index on complaints");
        }

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn complaints(&self) -> Collection<Complaint> {
        self.db.collection("complaints")
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn return_after() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

async fn begin(client: &MongoClient) -> Result<ClientSession, ServiceError> {
    let mut session = client.start_session(None).await?;
    session.start_transaction(None).await?;
    Ok(session)
}

/// Commit on success, abort on failure. Nothing written inside the unit
/// survives an abort.
async fn settle<T>(
    mut session: ClientSession,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match result {
        Ok(value) => {
            session.commit_transaction().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = session.abort_transaction().await {
                tracing::warn!(error = %abort_err, "Failed to abort transaction");
            }
            Err(err)
        }
    }
}

async fn fetch_documents<T: Send + Sync>(
    collection: &Collection<T>,
    plan: &QueryPlan,
) -> Result<Page, ServiceError> {
    let raw = collection.clone_with_type::<Document>();
    let filter = plan.count_filter().to_document();

    let total = raw.count_documents(filter.clone(), None).await?;

    let options = FindOptions::builder()
        .sort(plan.sort_document())
        .skip(plan.skip)
        .limit(i64::try_from(plan.limit).unwrap_or(i64::MAX))
        .projection(plan.projection.to_document())
        .build();

    let items = raw
        .find(filter, options)
        .await?
        .try_collect::<Vec<Document>>()
        .await?
        .into_iter()
        .map(document_to_json)
        .collect();

    Ok(Page { items, total })
}

#[derive(Clone)]
pub struct MongoUserDirectory {
    db: MongoDb,
}

impl MongoUserDirectory {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    fn live(mut filter: Document) -> Document {
        filter.insert("isDeleted", doc! { "$ne": true });
        filter
    }
}

#[async_trait]
impl ListStore for MongoUserDirectory {
    async fn fetch_page(&self, plan: &QueryPlan) -> Result<Page, ServiceError> {
        let mut scoped = plan.clone();
        scoped.filter = plan.filter.clone().and(not_deleted());
        fetch_documents(&self.db.users(), &scoped).await
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let filter = Self::live(doc! { "email": email.trim().to_lowercase() });
        Ok(self.db.users().find_one(filter, None).await?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, ServiceError> {
        let filter = Self::live(doc! { "_id": id });
        Ok(self.db.users().find_one(filter, None).await?)
    }

    async fn update(&self, id: &str, patch: UserPatch) -> Result<User, ServiceError> {
        let mut session = begin(self.db.client()).await?;

        let filter = Self::live(doc! { "_id": id });
        let update = doc! { "$set": patch.to_set_document(Utc::now()) };

        let result = self
            .db
            .users()
            .find_one_and_update_with_session(filter, update, return_after(), &mut session)
            .await
            .map_err(ServiceError::from)
            .and_then(|updated| updated.ok_or_else(|| ServiceError::not_found("User not found")));

        settle(session, result).await
    }

    async fn insert(&self, user: User) -> Result<User, ServiceError> {
        let mut session = begin(self.db.client()).await?;

        let result = self
            .db
            .users()
            .insert_one_with_session(&user, None, &mut session)
            .await
            .map(|_| ())
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    ServiceError::Conflict("User already exists with this email".to_string())
                } else {
                    ServiceError::from(e)
                }
            });

        settle(session, result).await?;
        Ok(user)
    }

    async fn exists_with_role(&self, role: UserRole) -> Result<bool, ServiceError> {
        let count = self
            .db
            .users()
            .count_documents(Self::live(doc! { "role": role.as_str() }), None)
            .await?;
        Ok(count > 0)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.db
            .health_check()
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e.to_string())))
    }
}

#[derive(Clone)]
pub struct MongoComplaintStore {
    db: MongoDb,
}

impl MongoComplaintStore {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    async fn modify(&self, id: &str, update: Document) -> Result<Complaint, ServiceError> {
        self.db
            .complaints()
            .find_one_and_update(doc! { "_id": id }, update, return_after())
            .await?
            .ok_or_else(|| ServiceError::not_found("Complaint not found"))
    }
}

#[async_trait]
impl ListStore for MongoComplaintStore {
    async fn fetch_page(&self, plan: &QueryPlan) -> Result<Page, ServiceError> {
        fetch_documents(&self.db.complaints(), plan).await
    }
}

#[async_trait]
impl ComplaintStore for MongoComplaintStore {
    async fn insert(&self, complaint: Complaint) -> Result<Complaint, ServiceError> {
        self.db.complaints().insert_one(&complaint, None).await?;
        Ok(complaint)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Complaint>, ServiceError> {
        Ok(self
            .db
            .complaints()
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn set_status(
        &self,
        id: &str,
        status: ComplaintStatus,
    ) -> Result<Complaint, ServiceError> {
        self.modify(
            id,
            doc! {
                "$set": {
                    "status": status.as_str(),
                    "updatedAt": bson::DateTime::from_chrono(Utc::now()),
                },
                "$inc": { "__v": 1_i64 },
            },
        )
        .await
    }

    async fn add_vote(&self, id: &str, user_id: &str) -> Result<Complaint, ServiceError> {
        self.modify(
            id,
            doc! {
                "$addToSet": { "votes": user_id },
                "$set": { "updatedAt": bson::DateTime::from_chrono(Utc::now()) },
                "$inc": { "__v": 1_i64 },
            },
        )
        .await
    }

    async fn push_comment(&self, id: &str, comment: Comment) -> Result<Complaint, ServiceError> {
        let comment = bson::to_bson(&comment)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode comment: {}", e)))?;
        self.modify(
            id,
            doc! {
                "$push": { "comments": comment },
                "$set": { "updatedAt": bson::DateTime::from_chrono(Utc::now()) },
                "$inc": { "__v": 1_i64 },
            },
        )
        .await
    }

    async fn count_by(
        &self,
        field: &str,
        scope: &Predicate,
    ) -> Result<Vec<GroupCount>, ServiceError> {
        let pipeline = vec![
            doc! { "$match": scope.to_document() },
            doc! { "$group": { "_id": format!("${}", field), "count": { "$sum": 1 } } },
            doc! { "$sort": { "count": -1, "_id": 1 } },
        ];

        let rows: Vec<Document> = self
            .db
            .complaints()
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;

        let mut groups: Vec<GroupCount> = rows
            .into_iter()
            .map(|row| GroupCount {
                key: match row.get("_id") {
                    Some(Bson::String(key)) => Some(key.clone()),
                    _ => None,
                },
                count: match row.get("count") {
                    Some(Bson::Int32(n)) => (*n).max(0) as u64,
                    Some(Bson::Int64(n)) => (*n).max(0) as u64,
                    _ => 0,
                },
            })
            .collect();

        sort_groups(&mut groups);
        Ok(groups)
    }

    async fn find_matching(&self, filter: &Predicate) -> Result<Vec<Complaint>, ServiceError> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .build();
        Ok(self
            .db
            .complaints()
            .find(filter.to_document(), options)
            .await?
            .try_collect()
            .await?)
    }
}
