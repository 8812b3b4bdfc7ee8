//! User model and JWT claims

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::access::{Principal, Role};

/// Internal row structure (roles stored as TEXT[])
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    id: i32,
    login: String,
    password: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            login: row.login,
            password: row.password,
            roles: row.roles.iter().filter_map(|r| r.parse().ok()).collect(),
            created_at: row.created_at,
        }
    }
}

/// Catalog user
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: i32,
    pub login: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    #[schema(value_type = Vec<Role>)]
    pub roles: BTreeSet<Role>,
    pub created_at: DateTime<Utc>,
}

/// User ready for insertion (password already hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
}

/// Create user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 3, max = 150, message = "Login must be 3-150 characters"))]
    pub login: String,
    #[validate(length(min = 4, message = "Password must be at least 4 characters"))]
    pub password: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// JWT claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub roles: BTreeSet<Role>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn for_user(user: &User, expiration_hours: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.login.clone(),
            user_id: user.id,
            roles: user.roles.clone(),
            exp: now + expiration_hours as i64 * 3600,
            iat: now,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn into_principal(self) -> Principal {
        Principal {
            user_id: self.user_id,
            login: self.sub,
            roles: self.roles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: &[Role]) -> User {
        User {
            id: 7,
            login: "manager".to_string(),
            password: String::new(),
            roles: roles.iter().copied().collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trip_preserves_roles() {
        let claims = UserClaims::for_user(&user(&[Role::Manager, Role::Viewer]), 1);
        let token = claims.create_token("secret").unwrap();
        let principal = UserClaims::from_token(&token, "secret").unwrap().into_principal();

        assert_eq!(principal.user_id, 7);
        assert_eq!(principal.login, "manager");
        assert!(principal.roles.contains(&Role::Manager));
        assert!(principal.roles.contains(&Role::Viewer));
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let token = UserClaims::for_user(&user(&[Role::Admin]), 1)
            .create_token("secret")
            .unwrap();
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = UserClaims::for_user(&user(&[Role::Admin]), 1);
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;
        let token = claims.create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "secret").is_err());
    }
}
