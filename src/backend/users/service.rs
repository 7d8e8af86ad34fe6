/**
 * User Management
 *
 * Admin-side account maintenance. Passwords are bcrypt-hashed before they
 * reach the store and never leave this module; callers only see
 * [`UserProfile`]s.
 *
 * Deleting is soft: the row stays for the ledger's `created_by` references,
 * the session is dropped and the email becomes free again. Deactivating keeps
 * the account but every token it holds is refused on the next request.
 */

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::backend::auth::sessions::{hash_password, MIN_PASSWORD_LEN};
use crate::backend::error::BackendError;
use crate::backend::store::{StoreError, UserStore};
use crate::shared::event::ActorInfo;
use crate::shared::models::{
    normalize_privileges, CreateUserRequest, NewUser, PrivilegesRequest, UpdateUserRequest, User, UserProfile,
};

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, BackendError> {
        let users = self.users.list_users().await?;
        Ok(users.iter().map(User::profile).collect())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserProfile, BackendError> {
        Ok(self.load(id).await?.profile())
    }

    pub async fn create_user(&self, request: CreateUserRequest, actor: &ActorInfo) -> Result<UserProfile, BackendError> {
        request.validate(MIN_PASSWORD_LEN)?;
        let email = request.email.trim().to_string();

        if self.users.find_user_by_email(&email).await?.is_some() {
            tracing::warn!("[Users] Rejected duplicate email {}", email);
            return Err(BackendError::DuplicateEmail { email });
        }

        let new_user = NewUser {
            email: email.clone(),
            password_hash: hash_password(&request.password)?,
            full_name: request.full_name.trim().to_string(),
            role_code: request.role_code.filter(|r| !r.trim().is_empty()),
            is_active: true,
            privileges: normalize_privileges(&request.privileges)?,
        };

        let user = match self.users.insert_user(new_user, Utc::now()).await {
            Ok(user) => user,
            Err(StoreError::UniqueViolation(_)) => return Err(BackendError::DuplicateEmail { email }),
            Err(err) => return Err(err.into()),
        };

        tracing::info!("[Users] {} created user {} ({})", actor.email, user.id, user.email);
        Ok(user.profile())
    }

    /// Apply the fields present in `request`. An empty password is ignored.
    pub async fn update_user(
        &self,
        id: Uuid,
        request: UpdateUserRequest,
        actor: &ActorInfo,
    ) -> Result<UserProfile, BackendError> {
        request.validate(MIN_PASSWORD_LEN)?;
        let mut user = self.load(id).await?;

        if let Some(email) = request.email.as_deref().map(str::trim) {
            if email != user.email {
                if let Some(other) = self.users.find_user_by_email(email).await? {
                    if other.id != user.id {
                        tracing::warn!("[Users] Rejected email change of {} to taken {}", id, email);
                        return Err(BackendError::DuplicateEmail { email: email.to_string() });
                    }
                }
                user.email = email.to_string();
            }
        }
        if let Some(full_name) = request.full_name {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(role_code) = request.role_code {
            user.role_code = Some(role_code).filter(|r| !r.trim().is_empty());
        }
        if let Some(is_active) = request.is_active {
            user.is_active = is_active;
        }
        if let Some(password) = request.password.as_deref().filter(|p| !p.is_empty()) {
            user.password_hash = hash_password(password)?;
        }

        self.save(&user).await?;
        tracing::info!(
            "[Users] {} updated user {} (active: {})",
            actor.email,
            user.id,
            user.is_active
        );
        Ok(user.profile())
    }

    /// Replace the whole privilege set
    pub async fn update_privileges(
        &self,
        id: Uuid,
        request: PrivilegesRequest,
        actor: &ActorInfo,
    ) -> Result<UserProfile, BackendError> {
        let privileges = normalize_privileges(&request.privileges)?;
        let mut user = self.load(id).await?;
        user.privileges = privileges;

        self.save(&user).await?;
        tracing::info!(
            "[Users] {} set privileges of {} to [{}]",
            actor.email,
            user.id,
            user.privileges.join(", ")
        );
        Ok(user.profile())
    }

    pub async fn delete_user(&self, id: Uuid, actor: &ActorInfo) -> Result<(), BackendError> {
        if !self.users.soft_delete_user(id, actor.id, Utc::now()).await? {
            return Err(BackendError::not_found("user"));
        }
        tracing::info!("[Users] {} deleted user {}", actor.email, id);
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<User, BackendError> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| BackendError::not_found("user"))
    }

    async fn save(&self, user: &User) -> Result<(), BackendError> {
        match self.users.update_user(user).await {
            Ok(()) => Ok(()),
            // lost a race against another write taking the same email
            Err(StoreError::UniqueViolation(_)) => Err(BackendError::DuplicateEmail {
                email: user.email.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::error::ErrorKind;
    use crate::backend::store::MemoryStore;
    use crate::shared::models::privileges;
    use assert_matches::assert_matches;

    fn actor() -> ActorInfo {
        ActorInfo {
            id: Uuid::new_v4(),
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
        }
    }

    fn service() -> (UserService, MemoryStore) {
        let store = MemoryStore::new();
        (UserService::new(Arc::new(store.clone())), store)
    }

    fn create_request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: "secret123".to_string(),
            full_name: "Casey Clerk".to_string(),
            role_code: Some("staff".to_string()),
            privileges: vec![
                privileges::SHIFT_CREATE.to_string(),
                privileges::PRODUCT_CREATE.to_string(),
                privileges::SHIFT_CREATE.to_string(),
            ],
        }
    }

    #[tokio::test]
    async fn test_create_user_hashes_password() {
        let (service, store) = service();

        let profile = service.create_user(create_request(" casey@example.com "), &actor()).await.unwrap();
        assert_eq!(profile.email, "casey@example.com");
        assert!(profile.is_active);
        assert_eq!(
            profile.privileges,
            vec![privileges::SHIFT_CREATE.to_string(), privileges::PRODUCT_CREATE.to_string()]
        );

        let stored = store.find_user(profile.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret123");
        assert!(bcrypt::verify("secret123", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_email() {
        let (service, _store) = service();
        service.create_user(create_request("casey@example.com"), &actor()).await.unwrap();

        let err = service
            .create_user(create_request("casey@example.com"), &actor())
            .await
            .unwrap_err();
        assert_matches!(err, BackendError::DuplicateEmail { .. });
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_create_user_rejects_unknown_privilege() {
        let (service, _store) = service();
        let mut request = create_request("casey@example.com");
        request.privileges = vec!["warehouse:teleport".to_string()];

        let err = service.create_user(request, &actor()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_update_user_is_partial() {
        let (service, store) = service();
        let created = service.create_user(create_request("casey@example.com"), &actor()).await.unwrap();
        let before = store.find_user(created.id).await.unwrap().unwrap();

        let update = UpdateUserRequest {
            full_name: Some("Casey Lead".to_string()),
            is_active: Some(false),
            password: Some(String::new()),
            ..Default::default()
        };
        let profile = service.update_user(created.id, update, &actor()).await.unwrap();

        assert_eq!(profile.full_name, "Casey Lead");
        assert_eq!(profile.email, "casey@example.com");
        assert_eq!(profile.role_code.as_deref(), Some("staff"));
        assert!(!profile.is_active);

        let after = store.find_user(created.id).await.unwrap().unwrap();
        assert_eq!(after.password_hash, before.password_hash);
    }

    #[tokio::test]
    async fn test_update_user_rehashes_password() {
        let (service, store) = service();
        let created = service.create_user(create_request("casey@example.com"), &actor()).await.unwrap();

        let update = UpdateUserRequest {
            password: Some("another-secret".to_string()),
            ..Default::default()
        };
        service.update_user(created.id, update, &actor()).await.unwrap();

        let stored = store.find_user(created.id).await.unwrap().unwrap();
        assert!(bcrypt::verify("another-secret", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_update_user_rejects_taken_email() {
        let (service, _store) = service();
        service.create_user(create_request("first@example.com"), &actor()).await.unwrap();
        let second = service.create_user(create_request("second@example.com"), &actor()).await.unwrap();

        let update = UpdateUserRequest {
            email: Some("first@example.com".to_string()),
            ..Default::default()
        };
        let err = service.update_user(second.id, update, &actor()).await.unwrap_err();
        assert_matches!(err, BackendError::DuplicateEmail { email } if email == "first@example.com");

        // keeping your own email is not a conflict
        let update = UpdateUserRequest {
            email: Some("second@example.com".to_string()),
            ..Default::default()
        };
        assert!(service.update_user(second.id, update, &actor()).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_privileges_replaces_set() {
        let (service, _store) = service();
        let created = service.create_user(create_request("casey@example.com"), &actor()).await.unwrap();

        let request = PrivilegesRequest {
            privileges: vec![privileges::TRANSACTION_VIEW.to_string()],
        };
        let profile = service.update_privileges(created.id, request, &actor()).await.unwrap();
        assert_eq!(profile.privileges, vec![privileges::TRANSACTION_VIEW.to_string()]);

        let request = PrivilegesRequest {
            privileges: vec!["nope".to_string()],
        };
        let err = service.update_privileges(created.id, request, &actor()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(
            service.get_user(created.id).await.unwrap().privileges,
            vec![privileges::TRANSACTION_VIEW.to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_user_hides_it() {
        let (service, _store) = service();
        let created = service.create_user(create_request("casey@example.com"), &actor()).await.unwrap();

        service.delete_user(created.id, &actor()).await.unwrap();

        assert_matches!(service.get_user(created.id).await, Err(BackendError::NotFound { .. }));
        assert!(service.list_users().await.unwrap().is_empty());
        assert_matches!(
            service.delete_user(created.id, &actor()).await,
            Err(BackendError::NotFound { .. })
        );

        // the email is free again
        assert!(service.create_user(create_request("casey@example.com"), &actor()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let (service, _store) = service();
        let err = service
            .update_user(Uuid::new_v4(), UpdateUserRequest::default(), &actor())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
