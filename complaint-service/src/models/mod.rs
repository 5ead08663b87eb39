pub mod complaint;
pub mod user;

pub use complaint::{
    Comment, Complaint, ComplaintStatus, Department, NewComplaint, Priority, Visibility,
};
pub use user::{NewUser, PublicUser, User, UserProfile, UserRole};

/// Serde adapter storing `Option<DateTime<Utc>>` as a BSON date.
pub mod optional_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(bson::DateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|dt| dt.to_chrono()))
    }
}
