use mongodb::bson;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::email::{templates, Notifier};
use super::error::ServiceError;
use super::jwt::IdentityClaims;
use super::query::{
    execute, FieldKind, FieldSpec, Predicate, QueryBuilder, QueryResult, QuerySchema, QuerySpec,
    FILTER, SEARCH, SELECT, SORT,
};
use super::store::{ComplaintStore, GroupCount, UserDirectory};
use crate::models::{
    Comment, Complaint, ComplaintStatus, Department, NewComplaint, UserRole, Visibility,
};
use crate::utils::document_to_json;

pub static COMPLAINT_SCHEMA: QuerySchema = QuerySchema {
    fields: &[
        FieldSpec::new("_id", FieldKind::Keyword, FILTER | SELECT),
        FieldSpec::new("title", FieldKind::Text, FILTER | SORT | SEARCH | SELECT),
        FieldSpec::new("description", FieldKind::Text, SEARCH | SELECT),
        FieldSpec::new("category", FieldKind::Keyword, FILTER | SORT | SEARCH | SELECT),
        FieldSpec::new("postCode", FieldKind::Keyword, FILTER | SORT | SELECT),
        FieldSpec::new("thana", FieldKind::Text, FILTER | SORT | SELECT),
        FieldSpec::new("district", FieldKind::Text, FILTER | SORT | SELECT),
        FieldSpec::new("division", FieldKind::Text, FILTER | SORT | SELECT),
        FieldSpec::new("address", FieldKind::Text, SELECT),
        FieldSpec::new("status", FieldKind::Keyword, FILTER | SORT | SELECT),
        FieldSpec::new("priority", FieldKind::Keyword, FILTER | SORT | SELECT),
        FieldSpec::new("visibility", FieldKind::Keyword, FILTER | SELECT),
        FieldSpec::new("department", FieldKind::Keyword, FILTER | SORT | SELECT),
        FieldSpec::new("citizen", FieldKind::Keyword, FILTER | SELECT),
        FieldSpec::new("assignedAdmin", FieldKind::Keyword, FILTER | SELECT),
        FieldSpec::new("isAnonymous", FieldKind::Bool, FILTER | SELECT),
        FieldSpec::new("votes", FieldKind::Keyword, FILTER | SELECT),
        FieldSpec::new("comments", FieldKind::Text, SELECT),
        FieldSpec::new("createdAt", FieldKind::DateTime, FILTER | SORT | SELECT),
        FieldSpec::new("updatedAt", FieldKind::DateTime, FILTER | SORT | SELECT),
    ],
    hidden: &["__v"],
};

pub const COMPLAINT_SEARCH_FIELDS: [&str; 3] = ["title", "description", "category"];

const RECENT_LIMIT: &str = "10";
const MAX_COMMENT_CHARS: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct CitizenDashboard {
    pub stats: Vec<GroupCount>,
    pub recent: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub department: Department,
    pub stats: Vec<GroupCount>,
    pub priority: Vec<GroupCount>,
    pub recent: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperAdminDashboard {
    pub stats: Vec<GroupCount>,
    pub department_wise: Vec<GroupCount>,
    pub priority: Vec<GroupCount>,
}

/// Stored complaint as API JSON.
pub fn complaint_json(complaint: &Complaint) -> Result<Value, ServiceError> {
    bson::to_document(complaint)
        .map(document_to_json)
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode complaint: {}", e)))
}

#[derive(Clone)]
pub struct ComplaintService {
    complaints: Arc<dyn ComplaintStore>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl ComplaintService {
    pub fn new(
        complaints: Arc<dyn ComplaintStore>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            complaints,
            users,
            notifier,
        }
    }

    pub async fn create(
        &self,
        identity: &IdentityClaims,
        input: NewComplaint,
    ) -> Result<Value, ServiceError> {
        let complaint = self
            .complaints
            .insert(Complaint::new(input, &identity.id))
            .await?;
        tracing::info!(
            complaint_id = %complaint.id,
            department = %complaint.department,
            anonymous = complaint.is_anonymous,
            "Complaint submitted"
        );
        complaint_json(&complaint)
    }

    /// Role-scoped listing: superAdmin sees everything, an admin their
    /// department, a citizen public complaints plus their own.
    pub async fn list(
        &self,
        identity: &IdentityClaims,
        spec: &QuerySpec,
    ) -> Result<QueryResult, ServiceError> {
        let scope = match identity.role {
            UserRole::SuperAdmin => Predicate::always(),
            UserRole::Admin => match self.department_of(identity).await? {
                Some(department) => Predicate::eq("department", department.as_str()),
                None => Predicate::Any(Vec::new()),
            },
            UserRole::User => Predicate::Any(vec![
                Predicate::eq("visibility", Visibility::Public.as_str()),
                Predicate::eq("citizen", identity.id.as_str()),
            ]),
        };
        self.query(scope, spec).await
    }

    pub async fn list_public(&self, spec: &QuerySpec) -> Result<QueryResult, ServiceError> {
        let scope = Predicate::Any(vec![
            Predicate::eq("visibility", Visibility::Public.as_str()),
            Predicate::eq("isAnonymous", true),
        ]);
        self.query(scope, spec).await
    }

    /// Admins may only resolve complaints of their own department. The
    /// citizen is notified best-effort unless the complaint is anonymous.
    pub async fn resolve(
        &self,
        identity: &IdentityClaims,
        complaint_id: &str,
    ) -> Result<Value, ServiceError> {
        let complaint = self.require(complaint_id).await?;

        if identity.role != UserRole::SuperAdmin {
            let admin = self
                .users
                .find_by_id(&identity.id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Admin user not found"))?;

            if admin.department != Some(complaint.department) {
                tracing::warn!(
                    admin_id = %admin.id,
                    complaint_id = %complaint.id,
                    "Resolve refused: complaint outside admin department"
                );
                return Err(ServiceError::unauthorized(
                    "Not authorized to resolve this complaint",
                ));
            }
        }

        let resolved = self
            .complaints
            .set_status(&complaint.id, ComplaintStatus::Resolved)
            .await?;
        tracing::info!(complaint_id = %resolved.id, resolver = %identity.id, "Complaint resolved");

        if !resolved.is_anonymous {
            if let Some(citizen_id) = resolved.citizen.as_deref() {
                self.notify_resolved(citizen_id, &resolved).await;
            }
        }

        complaint_json(&resolved)
    }

    pub async fn vote(&self, complaint_id: &str, user_id: &str) -> Result<Value, ServiceError> {
        let complaint = self.require(complaint_id).await?;
        let updated = self.complaints.add_vote(&complaint.id, user_id).await?;
        complaint_json(&updated)
    }

    pub async fn comment(
        &self,
        complaint_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<Value, ServiceError> {
        let complaint = self.require(complaint_id).await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::bad_request("Comment text is required"));
        }
        if text.chars().count() > MAX_COMMENT_CHARS {
            return Err(ServiceError::bad_request(
                "Comment cannot exceed 1000 characters",
            ));
        }

        let comment = Comment {
            user: user_id.to_string(),
            text: text.to_string(),
            created_at: chrono::Utc::now(),
        };
        let updated = self.complaints.push_comment(&complaint.id, comment).await?;
        complaint_json(&updated)
    }

    pub async fn citizen_dashboard(
        &self,
        identity: &IdentityClaims,
    ) -> Result<CitizenDashboard, ServiceError> {
        let mine = Predicate::eq("citizen", identity.id.as_str());
        Ok(CitizenDashboard {
            stats: self.complaints.count_by("status", &mine).await?,
            recent: self.recent(mine).await?,
        })
    }

    /// Department comes from the live user record, not the token.
    pub async fn admin_dashboard(
        &self,
        identity: &IdentityClaims,
    ) -> Result<AdminDashboard, ServiceError> {
        let department = self
            .department_of(identity)
            .await?
            .ok_or_else(|| ServiceError::bad_request("Admin has no department assigned"))?;
        let scope = Predicate::eq("department", department.as_str());

        Ok(AdminDashboard {
            department,
            stats: self.complaints.count_by("status", &scope).await?,
            priority: self.complaints.count_by("priority", &scope).await?,
            recent: self.recent(scope).await?,
        })
    }

    pub async fn super_admin_dashboard(&self) -> Result<SuperAdminDashboard, ServiceError> {
        let all = Predicate::always();
        Ok(SuperAdminDashboard {
            stats: self.complaints.count_by("status", &all).await?,
            department_wise: self.complaints.count_by("department", &all).await?,
            priority: self.complaints.count_by("priority", &all).await?,
        })
    }

    async fn query(&self, scope: Predicate, spec: &QuerySpec) -> Result<QueryResult, ServiceError> {
        let plan = QueryBuilder::new(&COMPLAINT_SCHEMA, spec)
            .scope(scope)
            .search(&COMPLAINT_SEARCH_FIELDS)
            .filter()?
            .sort()
            .paginate()
            .fields()
            .build();
        execute(self.complaints.as_ref(), &plan).await
    }

    async fn recent(&self, scope: Predicate) -> Result<Vec<Value>, ServiceError> {
        let spec = QuerySpec {
            limit: Some(RECENT_LIMIT.to_string()),
            ..Default::default()
        };
        Ok(self.query(scope, &spec).await?.data)
    }

    async fn require(&self, complaint_id: &str) -> Result<Complaint, ServiceError> {
        self.complaints
            .find_by_id(complaint_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Complaint not found"))
    }

    async fn department_of(
        &self,
        identity: &IdentityClaims,
    ) -> Result<Option<Department>, ServiceError> {
        let user = self
            .users
            .find_by_id(&identity.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;
        Ok(user.department)
    }

    async fn notify_resolved(&self, citizen_id: &str, complaint: &Complaint) {
        let citizen = match self.users.find_by_id(citizen_id).await {
            Ok(Some(citizen)) => citizen,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load citizen for resolution notice");
                return;
            }
        };

        let name = match citizen.full_name() {
            name if name.is_empty() => "Citizen".to_string(),
            name => name,
        };
        let body = templates::complaint_resolved(&name, &complaint.title);

        if let Err(e) = self
            .notifier
            .send(&citizen.email, &body, templates::RESOLVED_SUBJECT)
            .await
        {
            tracing::warn!(
                complaint_id = %complaint.id,
                error = %e,
                "Resolution notice not delivered"
            );
        }
    }
}
