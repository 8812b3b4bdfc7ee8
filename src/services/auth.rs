//! Authentication and user management service

use std::collections::BTreeSet;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{
    access::Role,
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        user::{CreateUser, NewUser},
        User, UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    pub fn token_lifetime_secs(&self) -> i64 {
        self.config.jwt_expiration_hours as i64 * 3600
    }

    /// Authenticate by login and password and return a JWT with the user
    pub async fn authenticate(&self, login: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users_get_by_login(login)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid login or password".to_string()))?;

        if !verify_password(&user, password)? {
            tracing::info!(login = %login, "Rejected login attempt");
            return Err(AppError::Authentication("Invalid login or password".to_string()));
        }

        let token = self.issue_token(&user)?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok((token, user))
    }

    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        UserClaims::for_user(user, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.repository.users_list().await
    }

    pub async fn create_user(&self, data: CreateUser) -> AppResult<User> {
        let new_user = NewUser {
            login: data.login,
            password_hash: hash_password(&data.password)?,
            roles: data.roles.into_iter().collect(),
        };
        let user = self.repository.users_create(&new_user).await?;
        tracing::info!(user_id = user.id, login = %user.login, "User created");
        Ok(user)
    }

    /// Create the configured administrator if it does not exist yet
    pub async fn ensure_bootstrap_admin(&self) -> AppResult<Option<User>> {
        let (Some(login), Some(password)) = (
            self.config.bootstrap_admin_login.as_deref(),
            self.config.bootstrap_admin_password.as_deref(),
        ) else {
            return Ok(None);
        };

        if self.repository.users_get_by_login(login).await?.is_some() {
            return Ok(None);
        }

        let user = self
            .repository
            .users_create(&NewUser {
                login: login.to_string(),
                password_hash: hash_password(password)?,
                roles: BTreeSet::from([Role::Admin]),
            })
            .await?;
        tracing::warn!(login = %user.login, "Bootstrap administrator created");
        Ok(Some(user))
    }
}

fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::repository::MemoryRepository;

    fn service(bootstrap: bool) -> AuthService {
        let config = AuthConfig {
            bootstrap_admin_login: bootstrap.then(|| "admin".to_string()),
            bootstrap_admin_password: bootstrap.then(|| "admin-pass".to_string()),
            ..AuthConfig::default()
        };
        AuthService::new(Arc::new(MemoryRepository::new()), config)
    }

    #[tokio::test]
    async fn login_round_trip() {
        let auth = service(false);
        auth.create_user(CreateUser {
            login: "manager".into(),
            password: "secret".into(),
            roles: vec![Role::Manager],
        })
        .await
        .unwrap();

        let (token, user) = auth.authenticate("manager", "secret").await.unwrap();
        let claims = UserClaims::from_token(&token, &AuthConfig::default().jwt_secret).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert!(claims.roles.contains(&Role::Manager));

        assert!(matches!(
            auth.authenticate("manager", "wrong").await,
            Err(AppError::Authentication(_))
        ));
        assert!(matches!(
            auth.authenticate("nobody", "secret").await,
            Err(AppError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn bootstrap_admin_is_created_once() {
        let auth = service(true);
        let created = auth.ensure_bootstrap_admin().await.unwrap();
        assert!(created.unwrap().roles.contains(&Role::Admin));
        assert!(auth.ensure_bootstrap_admin().await.unwrap().is_none());
        assert!(auth.authenticate("admin", "admin-pass").await.is_ok());
    }

    #[tokio::test]
    async fn bootstrap_is_skipped_without_credentials() {
        assert!(service(false).ensure_bootstrap_admin().await.unwrap().is_none());
    }
}
