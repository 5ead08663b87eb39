//! Persistence contracts consumed by the services, with MongoDB and
//! in-memory implementations.

mod memory;
mod mongo;

pub use memory::{MemoryComplaintStore, MemoryUserDirectory};
pub use mongo::{MongoComplaintStore, MongoDb, MongoUserDirectory};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use serde::Serialize;

use super::error::ServiceError;
use super::query::{ListStore, Predicate, RangeOp};
use crate::models::{Comment, Complaint, ComplaintStatus, Department, User, UserRole};

/// Account storage. Reads never return soft-deleted records.
#[async_trait]
pub trait UserDirectory: ListStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, ServiceError>;

    /// Apply `patch` as one atomic unit and return the updated record.
    /// Fails `NotFound` when no live record has this id.
    async fn update(&self, id: &str, patch: UserPatch) -> Result<User, ServiceError>;

    /// Fails `Conflict` when the email is already registered.
    async fn insert(&self, user: User) -> Result<User, ServiceError>;

    async fn exists_with_role(&self, role: UserRole) -> Result<bool, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Complaint storage with the append/grouping primitives the handlers need.
#[async_trait]
pub trait ComplaintStore: ListStore {
    async fn insert(&self, complaint: Complaint) -> Result<Complaint, ServiceError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Complaint>, ServiceError>;

    async fn set_status(
        &self,
        id: &str,
        status: ComplaintStatus,
    ) -> Result<Complaint, ServiceError>;

    /// Append-if-absent.
    async fn add_vote(&self, id: &str, user_id: &str) -> Result<Complaint, ServiceError>;

    async fn push_comment(&self, id: &str, comment: Comment) -> Result<Complaint, ServiceError>;

    /// Count matching complaints grouped by `field`, largest group first.
    async fn count_by(
        &self,
        field: &str,
        scope: &Predicate,
    ) -> Result<Vec<GroupCount>, ServiceError>;

    async fn find_matching(&self, filter: &Predicate) -> Result<Vec<Complaint>, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    #[serde(rename = "_id")]
    pub key: Option<String>,
    pub count: u64,
}

pub(crate) fn sort_groups(groups: &mut [GroupCount]) {
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
}

/// Live-record restriction applied to every directory read.
pub fn not_deleted() -> Predicate {
    Predicate::Range("isDeleted".to_string(), RangeOp::Ne, Bson::Boolean(true))
}

/// Partial update of a user record. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub designation: Option<String>,
    pub department: Option<Department>,
    pub post_code: Option<String>,
    pub thana: Option<String>,
    pub district: Option<String>,
    pub division: Option<String>,
    pub address: Option<String>,
    pub profile_img: Option<String>,
    pub role: Option<UserRole>,
    pub is_banned: Option<bool>,
    pub is_deleted: Option<bool>,
    /// Argon2 hash; always paired with `password_changed_at`.
    pub password: Option<String>,
    pub password_changed_at: Option<DateTime<Utc>>,
}

impl UserPatch {
    /// New credentials together with the change timestamp that revokes
    /// earlier tokens.
    pub fn credentials(password_hash: String, changed_at: DateTime<Utc>) -> Self {
        Self {
            password: Some(password_hash),
            password_changed_at: Some(changed_at),
            ..Default::default()
        }
    }

    pub fn soft_delete() -> Self {
        Self {
            is_deleted: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `$set` body for MongoDB, including the `updatedAt` bump.
    pub fn to_set_document(&self, now: DateTime<Utc>) -> Document {
        let mut set = doc! { "updatedAt": bson::DateTime::from_chrono(now) };

        let strings = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("phone", &self.phone),
            ("designation", &self.designation),
            ("postCode", &self.post_code),
            ("thana", &self.thana),
            ("district", &self.district),
            ("division", &self.division),
            ("address", &self.address),
            ("profileImg", &self.profile_img),
            ("password", &self.password),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                set.insert(key, value.clone());
            }
        }

        if let Some(department) = self.department {
            set.insert("department", department.as_str());
        }
        if let Some(role) = self.role {
            set.insert("role", role.as_str());
        }
        if let Some(is_banned) = self.is_banned {
            set.insert("isBanned", is_banned);
        }
        if let Some(is_deleted) = self.is_deleted {
            set.insert("isDeleted", is_deleted);
        }
        if let Some(changed_at) = self.password_changed_at {
            set.insert("passwordChangedAt", bson::DateTime::from_chrono(changed_at));
        }

        set
    }

    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut user.first_name, &self.first_name);
        set(&mut user.last_name, &self.last_name);
        set(&mut user.phone, &self.phone);
        set_opt(&mut user.designation, &self.designation);
        set_opt(&mut user.department, &self.department);
        set(&mut user.post_code, &self.post_code);
        set(&mut user.thana, &self.thana);
        set(&mut user.district, &self.district);
        set(&mut user.division, &self.division);
        set(&mut user.address, &self.address);
        set_opt(&mut user.profile_img, &self.profile_img);
        set(&mut user.role, &self.role);
        set(&mut user.is_banned, &self.is_banned);
        set(&mut user.is_deleted, &self.is_deleted);
        set(&mut user.password, &self.password);
        set_opt(&mut user.password_changed_at, &self.password_changed_at);
        user.updated_at = now;
    }
}
