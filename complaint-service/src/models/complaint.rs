//! Complaints as stored in the `complaints` collection.

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ComplaintStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
    Rejected,
    Closed,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "pending",
            ComplaintStatus::InProgress => "in-progress",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::Rejected => "rejected",
            ComplaintStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn is_pressing(&self) -> bool {
        matches!(self, Priority::High | Priority::Urgent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Department {
    Municipality,
    Health,
    Education,
    WaterSupply,
    Electricity,
    Transport,
    RoadInfrastructure,
    Drainage,
    WasteManagement,
    LawEnforcement,
    Corruption,
    LandDisputes,
    Environmental,
    SocialWelfare,
    ConsumerRights,
    Security,
    Traffic,
    PublicOrder,
    Other,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Municipality => "municipality",
            Department::Health => "health",
            Department::Education => "education",
            Department::WaterSupply => "water-supply",
            Department::Electricity => "electricity",
            Department::Transport => "transport",
            Department::RoadInfrastructure => "road-infrastructure",
            Department::Drainage => "drainage",
            Department::WasteManagement => "waste-management",
            Department::LawEnforcement => "law-enforcement",
            Department::Corruption => "corruption",
            Department::LandDisputes => "land-disputes",
            Department::Environmental => "environmental",
            Department::SocialWelfare => "social-welfare",
            Department::ConsumerRights => "consumer-rights",
            Department::Security => "security",
            Department::Traffic => "traffic",
            Department::PublicOrder => "public-order",
            Department::Other => "other",
        }
    }
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub user: String,
    pub text: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub post_code: String,
    pub thana: String,
    pub district: String,
    pub division: String,
    pub address: String,
    #[serde(default)]
    pub status: ComplaintStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub visibility: Visibility,
    pub department: Department,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citizen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_admin: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub votes: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "__v", default)]
    pub revision: i64,
}

#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub category: String,
    pub post_code: String,
    pub thana: String,
    pub district: String,
    pub division: String,
    pub address: String,
    pub priority: Priority,
    pub visibility: Visibility,
    pub department: Department,
    pub is_anonymous: bool,
}

impl Complaint {
    /// Anonymous complaints are always public and never linked to their author.
    pub fn new(input: NewComplaint, citizen: &str) -> Self {
        let now = Utc::now();
        let (visibility, citizen) = if input.is_anonymous {
            (Visibility::Public, None)
        } else {
            (input.visibility, Some(citizen.to_string()))
        };

        Self {
            id: Uuid::new_v4().to_string(),
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            category: input.category.trim().to_string(),
            post_code: input.post_code.trim().to_string(),
            thana: input.thana.trim().to_string(),
            district: input.district.trim().to_string(),
            division: input.division.trim().to_string(),
            address: input.address.trim().to_string(),
            status: ComplaintStatus::Pending,
            priority: input.priority,
            visibility,
            department: input.department,
            citizen,
            assigned_admin: None,
            is_anonymous: input.is_anonymous,
            votes: Vec::new(),
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }
}
