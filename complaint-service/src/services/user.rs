use chrono::Utc;
use std::sync::Arc;

use super::email::{templates, Notifier};
use super::error::ServiceError;
use super::jwt::IdentityClaims;
use super::query::{
    execute, FieldKind, FieldSpec, QueryBuilder, QueryResult, QuerySchema, QuerySpec, FILTER,
    SEARCH, SELECT, SORT,
};
use super::store::{UserDirectory, UserPatch};
use crate::config::{PasswordConfig, SuperAdminSeed};
use crate::models::{NewUser, User, UserProfile, UserRole};
use crate::utils::{hash_password, Password};

pub static USER_SCHEMA: QuerySchema = QuerySchema {
    fields: &[
        FieldSpec::new("_id", FieldKind::Keyword, FILTER | SELECT),
        FieldSpec::new("firstName", FieldKind::Text, FILTER | SORT | SEARCH | SELECT),
        FieldSpec::new("lastName", FieldKind::Text, FILTER | SORT | SEARCH | SELECT),
        FieldSpec::new("email", FieldKind::Keyword, FILTER | SORT | SEARCH | SELECT),
        FieldSpec::new("phone", FieldKind::Keyword, FILTER | SEARCH | SELECT),
        FieldSpec::new("role", FieldKind::Keyword, FILTER | SORT | SELECT),
        FieldSpec::new("department", FieldKind::Keyword, FILTER | SORT | SELECT),
        FieldSpec::new("designation", FieldKind::Text, FILTER | SELECT),
        FieldSpec::new("postCode", FieldKind::Keyword, FILTER | SELECT),
        FieldSpec::new("thana", FieldKind::Text, FILTER | SORT | SEARCH | SELECT),
        FieldSpec::new("district", FieldKind::Text, FILTER | SORT | SEARCH | SELECT),
        FieldSpec::new("division", FieldKind::Text, FILTER | SORT | SELECT),
        FieldSpec::new("isBanned", FieldKind::Bool, FILTER | SELECT),
        FieldSpec::new("createdAt", FieldKind::DateTime, FILTER | SORT | SELECT),
        FieldSpec::new("updatedAt", FieldKind::DateTime, FILTER | SORT | SELECT),
    ],
    hidden: &["password", "isDeleted"],
};

pub const USER_SEARCH_FIELDS: [&str; 5] = ["firstName", "lastName", "email", "phone", "district"];

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    password: PasswordConfig,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        password: PasswordConfig,
    ) -> Self {
        Self {
            users,
            notifier,
            password,
        }
    }

    /// Self-registration always yields a plain `user` account. The welcome
    /// mail is best-effort.
    pub async fn signup(
        &self,
        mut profile: NewUser,
        password: &str,
    ) -> Result<UserProfile, ServiceError> {
        profile.role = UserRole::User;
        let hash = hash_password(&Password::new(password), &self.password)?;
        let user = self.users.insert(User::new(profile, hash.into_string())).await?;

        tracing::info!(user_id = %user.id, "User registered");

        if let Err(e) = self
            .notifier
            .send(
                &user.email,
                &templates::welcome(&user.first_name),
                templates::WELCOME_SUBJECT,
            )
            .await
        {
            tracing::warn!(user_id = %user.id, error = %e, "Welcome email not delivered");
        }

        Ok(user.profile())
    }

    pub async fn get_me(&self, identity: &IdentityClaims) -> Result<UserProfile, ServiceError> {
        self.get_user(&identity.id).await
    }

    /// Profile fields only; role, ban and credential fields are dropped.
    pub async fn update_me(
        &self,
        identity: &IdentityClaims,
        patch: UserPatch,
    ) -> Result<UserProfile, ServiceError> {
        let patch = UserPatch {
            role: None,
            is_banned: None,
            is_deleted: None,
            password: None,
            password_changed_at: None,
            department: None,
            ..patch
        };
        if patch.is_empty() {
            return Err(ServiceError::bad_request("No profile fields to update"));
        }
        let user = self.users.update(&identity.id, patch).await?;
        Ok(user.profile())
    }

    pub async fn list_users(&self, spec: &QuerySpec) -> Result<QueryResult, ServiceError> {
        let plan = QueryBuilder::new(&USER_SCHEMA, spec)
            .search(&USER_SEARCH_FIELDS)
            .filter()?
            .sort()
            .paginate()
            .fields()
            .build();
        execute(self.users.as_ref(), &plan).await
    }

    pub async fn get_user(&self, id: &str) -> Result<UserProfile, ServiceError> {
        self.users
            .find_by_id(id)
            .await?
            .map(|u| u.profile())
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    /// Administrative update. A supplied password is hashed and advances
    /// `passwordChangedAt` like any other credential change.
    pub async fn update_user(
        &self,
        id: &str,
        patch: UserPatch,
        new_password: Option<&str>,
    ) -> Result<UserProfile, ServiceError> {
        let mut patch = UserPatch {
            is_deleted: None,
            password: None,
            password_changed_at: None,
            ..patch
        };
        if let Some(password) = new_password {
            let hash = hash_password(&Password::new(password), &self.password)?;
            patch.password = Some(hash.into_string());
            patch.password_changed_at = Some(Utc::now());
        }
        if patch.is_empty() {
            return Err(ServiceError::bad_request("No fields to update"));
        }

        let user = self.users.update(id, patch).await?;
        tracing::info!(user_id = %user.id, "User updated by administrator");
        Ok(user.profile())
    }

    pub async fn delete_user(&self, id: &str) -> Result<UserProfile, ServiceError> {
        let user = self.users.update(id, UserPatch::soft_delete()).await?;
        tracing::info!(user_id = %user.id, "User soft-deleted");
        Ok(user.profile())
    }

    /// Creates the bootstrap superAdmin unless one already exists.
    pub async fn seed_super_admin(&self, seed: &SuperAdminSeed) -> Result<bool, ServiceError> {
        if self.users.exists_with_role(UserRole::SuperAdmin).await? {
            tracing::debug!("Super admin already present; skipping seed");
            return Ok(false);
        }

        let hash = hash_password(&Password::new(seed.password.as_str()), &self.password)?;
        let admin = User::new(
            NewUser {
                first_name: "Super".to_string(),
                last_name: "Admin".to_string(),
                email: seed.email.clone(),
                phone: "00000000000".to_string(),
                designation: Some("System administrator".to_string()),
                department: None,
                post_code: "0000".to_string(),
                thana: "N/A".to_string(),
                district: "N/A".to_string(),
                division: "N/A".to_string(),
                address: "Head office".to_string(),
                role: UserRole::SuperAdmin,
                profile_img: None,
            },
            hash.into_string(),
        );

        let admin = self.users.insert(admin).await?;
        tracing::info!(user_id = %admin.id, "Super admin seeded");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::email::MockNotifier;
    use crate::services::store::MemoryUserDirectory;
    use std::collections::HashMap;

    const CHEAP: PasswordConfig = PasswordConfig {
        hash_cost: 1,
        hash_memory_kib: 64,
    };

    fn profile(email: &str, role: UserRole) -> NewUser {
        NewUser {
            first_name: "Nusrat".into(),
            last_name: "Jahan".into(),
            email: email.into(),
            phone: "01900000000".into(),
            designation: None,
            department: None,
            post_code: "4000".into(),
            thana: "Kotwali".into(),
            district: "Chattogram".into(),
            division: "Chattogram".into(),
            address: "22 Station Road, Kotwali".into(),
            role,
            profile_img: None,
        }
    }

    fn service() -> (UserService, MemoryUserDirectory, MockNotifier) {
        let users = MemoryUserDirectory::new();
        let notifier = MockNotifier::new();
        let service = UserService::new(Arc::new(users.clone()), Arc::new(notifier.clone()), CHEAP);
        (service, users, notifier)
    }

    #[tokio::test]
    async fn signup_forces_user_role_and_welcomes() {
        let (service, _, notifier) = service();
        let created = service
            .signup(profile("n@x.com", UserRole::SuperAdmin), "secret1")
            .await
            .unwrap();

        assert_eq!(created.role, UserRole::User);
        assert_eq!(
            notifier.last_to("n@x.com").unwrap().subject,
            templates::WELCOME_SUBJECT
        );
    }

    #[tokio::test]
    async fn signup_survives_mail_failure_and_rejects_duplicates() {
        let (service, _, notifier) = service();
        notifier.fail_deliveries(true);

        assert!(service.signup(profile("n@x.com", UserRole::User), "secret1").await.is_ok());
        assert!(matches!(
            service.signup(profile("n@x.com", UserRole::User), "secret1").await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn update_me_ignores_privileged_fields() {
        let (service, users, _) = service();
        let created = service.signup(profile("n@x.com", UserRole::User), "pw1234").await.unwrap();
        let stored = users.find_by_id(&created.id).await.unwrap().unwrap();
        let identity = IdentityClaims::from(&stored);

        let updated = service
            .update_me(
                &identity,
                UserPatch {
                    first_name: Some("Nadia".into()),
                    role: Some(UserRole::SuperAdmin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Nadia");
        assert_eq!(updated.role, UserRole::User);

        assert!(matches!(
            service
                .update_me(&identity, UserPatch { role: Some(UserRole::Admin), ..Default::default() })
                .await,
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn admin_password_update_advances_change_timestamp() {
        let (service, users, _) = service();
        let created = service.signup(profile("n@x.com", UserRole::User), "pw1234").await.unwrap();

        service
            .update_user(&created.id, UserPatch::default(), Some("new-pass"))
            .await
            .unwrap();

        let stored = users.find_by_id(&created.id).await.unwrap().unwrap();
        assert!(stored.password_changed_at.is_some());
    }

    #[tokio::test]
    async fn deleted_users_disappear_from_reads_and_lists() {
        let (service, _, _) = service();
        let a = service.signup(profile("a@x.com", UserRole::User), "pw1234").await.unwrap();
        service.signup(profile("b@x.com", UserRole::User), "pw1234").await.unwrap();

        service.delete_user(&a.id).await.unwrap();

        assert!(matches!(service.get_user(&a.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.delete_user(&a.id).await, Err(ServiceError::NotFound(_))));

        let listed = service.list_users(&QuerySpec::from_params(HashMap::new())).await.unwrap();
        assert_eq!(listed.pagination.total, 1);
        assert!(listed.data[0].get("password").is_none());
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let (service, users, _) = service();
        let seed = SuperAdminSeed {
            email: "root@x.com".into(),
            password: "rootpass".into(),
        };

        assert!(service.seed_super_admin(&seed).await.unwrap());
        assert!(!service.seed_super_admin(&seed).await.unwrap());
        assert_eq!(users.all().await.len(), 1);
    }
}
