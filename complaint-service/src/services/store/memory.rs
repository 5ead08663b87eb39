//! In-process stores used by the test suite and local runs without MongoDB.
//! List queries go through the same [`Predicate`] evaluation as the
//! MongoDB stores compile to, so results agree between the two.

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::{self, Bson, Document};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{not_deleted, sort_groups, ComplaintStore, GroupCount, UserDirectory, UserPatch};
use crate::models::{Comment, Complaint, ComplaintStatus, User, UserRole};
use crate::services::error::ServiceError;
use crate::services::query::{ListStore, Page, Predicate, QueryPlan};

fn to_document<T: serde::Serialize>(value: &T) -> Result<Document, ServiceError> {
    bson::to_document(value)
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode record: {}", e)))
}

fn to_documents<'a, T: serde::Serialize + 'a>(
    values: impl Iterator<Item = &'a T>,
) -> Result<Vec<Document>, ServiceError> {
    values.map(to_document).collect()
}

#[derive(Clone, Default)]
pub struct MemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, soft-deleted ones included.
    pub async fn all(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl ListStore for MemoryUserDirectory {
    async fn fetch_page(&self, plan: &QueryPlan) -> Result<Page, ServiceError> {
        let documents = to_documents(self.users.read().await.values())?;
        let mut scoped = plan.clone();
        scoped.filter = plan.filter.clone().and(not_deleted());
        Ok(scoped.apply_in_memory(documents))
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email && !u.is_deleted)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .users
            .read()
            .await
            .get(id)
            .filter(|u| !u.is_deleted)
            .cloned())
    }

    async fn update(&self, id: &str, patch: UserPatch) -> Result<User, ServiceError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(id)
            .filter(|u| !u.is_deleted)
            .ok_or_else(|| ServiceError::not_found("User not found"))?;
        patch.apply(user, Utc::now());
        Ok(user.clone())
    }

    async fn insert(&self, user: User) -> Result<User, ServiceError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(ServiceError::Conflict(
                "User already exists with this email".to_string(),
            ));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn exists_with_role(&self, role: UserRole) -> Result<bool, ServiceError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .any(|u| u.role == role && !u.is_deleted))
    }
}

#[derive(Clone, Default)]
pub struct MemoryComplaintStore {
    complaints: Arc<RwLock<HashMap<String, Complaint>>>,
}

impl MemoryComplaintStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify<F>(&self, id: &str, change: F) -> Result<Complaint, ServiceError>
    where
        F: FnOnce(&mut Complaint) + Send,
    {
        let mut complaints = self.complaints.write().await;
        let complaint = complaints
            .get_mut(id)
            .ok_or_else(|| ServiceError::not_found("Complaint not found"))?;
        change(complaint);
        complaint.updated_at = Utc::now();
        complaint.revision += 1;
        Ok(complaint.clone())
    }

    async fn matching(&self, filter: &Predicate) -> Result<Vec<(Document, Complaint)>, ServiceError> {
        let complaints = self.complaints.read().await;
        let mut out = Vec::new();
        for complaint in complaints.values() {
            let document = to_document(complaint)?;
            if filter.matches(&document) {
                out.push((document, complaint.clone()));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ListStore for MemoryComplaintStore {
    async fn fetch_page(&self, plan: &QueryPlan) -> Result<Page, ServiceError> {
        let documents = to_documents(self.complaints.read().await.values())?;
        Ok(plan.apply_in_memory(documents))
    }
}

#[async_trait]
impl ComplaintStore for MemoryComplaintStore {
    async fn insert(&self, complaint: Complaint) -> Result<Complaint, ServiceError> {
        self.complaints
            .write()
            .await
            .insert(complaint.id.clone(), complaint.clone());
        Ok(complaint)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Complaint>, ServiceError> {
        Ok(self.complaints.read().await.get(id).cloned())
    }

    async fn set_status(
        &self,
        id: &str,
        status: ComplaintStatus,
    ) -> Result<Complaint, ServiceError> {
        self.modify(id, |c| c.status = status).await
    }

    async fn add_vote(&self, id: &str, user_id: &str) -> Result<Complaint, ServiceError> {
        self.modify(id, |c| {
            if !c.votes.iter().any(|v| v == user_id) {
                c.votes.push(user_id.to_string());
            }
        })
        .await
    }

    async fn push_comment(&self, id: &str, comment: Comment) -> Result<Complaint, ServiceError> {
        self.modify(id, |c| c.comments.push(comment)).await
    }

    async fn count_by(
        &self,
        field: &str,
        scope: &Predicate,
    ) -> Result<Vec<GroupCount>, ServiceError> {
        let mut counts: HashMap<Option<String>, u64> = HashMap::new();
        for (document, _) in self.matching(scope).await? {
            let key = match document.get(field) {
                Some(Bson::String(value)) => Some(value.clone()),
                _ => None,
            };
            *counts.entry(key).or_default() += 1;
        }

        let mut groups: Vec<GroupCount> = counts
            .into_iter()
            .map(|(key, count)| GroupCount { key, count })
            .collect();
        sort_groups(&mut groups);
        Ok(groups)
    }

    async fn find_matching(&self, filter: &Predicate) -> Result<Vec<Complaint>, ServiceError> {
        let mut found: Vec<Complaint> = self
            .matching(filter)
            .await?
            .into_iter()
            .map(|(_, complaint)| complaint)
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Department, NewComplaint, NewUser, Priority, Visibility};
    use crate::services::query::{QueryBuilder, QuerySchema, QuerySpec};

    fn user(email: &str) -> User {
        User::new(
            NewUser {
                first_name: "Karim".into(),
                last_name: "Ali".into(),
                email: email.into(),
                phone: "01711111111".into(),
                designation: None,
                department: None,
                post_code: "1000".into(),
                thana: "Ramna".into(),
                district: "Dhaka".into(),
                division: "Dhaka".into(),
                address: "12 Minto Road, Ramna".into(),
                role: UserRole::User,
                profile_img: None,
            },
            "hash".into(),
        )
    }

    fn complaint(department: Department, priority: Priority) -> Complaint {
        Complaint::new(
            NewComplaint {
                title: "Water logging".into(),
                description: "Street floods after every rain".into(),
                category: "drainage".into(),
                post_code: "1000".into(),
                thana: "Ramna".into(),
                district: "Dhaka".into(),
                division: "Dhaka".into(),
                address: "Kakrail mosque road, Ramna".into(),
                priority,
                visibility: Visibility::Public,
                department,
                is_anonymous: false,
            },
            "citizen-1",
        )
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let directory = MemoryUserDirectory::new();
        directory.insert(user("a@x.com")).await.unwrap();
        let err = directory.insert(user("A@x.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn soft_deleted_users_are_invisible() {
        let directory = MemoryUserDirectory::new();
        let stored = directory.insert(user("a@x.com")).await.unwrap();

        directory.update(&stored.id, UserPatch::soft_delete()).await.unwrap();

        assert!(directory.find_by_id(&stored.id).await.unwrap().is_none());
        assert!(directory.find_by_email("a@x.com").await.unwrap().is_none());
        assert!(matches!(
            directory.update(&stored.id, UserPatch::default()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(directory.all().await.len(), 1);

        static SCHEMA: QuerySchema = QuerySchema { fields: &[], hidden: &["password"] };
        let spec = QuerySpec::default();
        let plan = QueryBuilder::new(&SCHEMA, &spec).sort().paginate().fields().build();
        assert_eq!(directory.fetch_page(&plan).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn votes_are_added_once() {
        let store = MemoryComplaintStore::new();
        let c = store
            .insert(complaint(Department::Drainage, Priority::High))
            .await
            .unwrap();

        store.add_vote(&c.id, "u1").await.unwrap();
        let after = store.add_vote(&c.id, "u1").await.unwrap();

        assert_eq!(after.votes, vec!["u1".to_string()]);
        assert_eq!(after.revision, 2);
    }

    #[tokio::test]
    async fn count_by_groups_largest_first() {
        let store = MemoryComplaintStore::new();
        for (department, priority) in [
            (Department::Drainage, Priority::High),
            (Department::Drainage, Priority::Low),
            (Department::Health, Priority::High),
        ] {
            store.insert(complaint(department, priority)).await.unwrap();
        }

        let groups = store
            .count_by("department", &Predicate::always())
            .await
            .unwrap();
        assert_eq!(groups[0], GroupCount { key: Some("drainage".into()), count: 2 });
        assert_eq!(groups[1].count, 1);

        let scoped = store
            .count_by("priority", &Predicate::eq("department", "health"))
            .await
            .unwrap();
        assert_eq!(scoped, vec![GroupCount { key: Some("high".into()), count: 1 }]);
    }

    #[tokio::test]
    async fn missing_complaint_is_not_found() {
        let store = MemoryComplaintStore::new();
        assert!(matches!(
            store.set_status("nope", ComplaintStatus::Resolved).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
