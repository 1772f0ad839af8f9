//! Bearer-credential authentication for HTTP and handshake requests.

mod token;

pub use token::{issue, verify, TokenError, TokenKey};

use std::fmt;
use std::str::FromStr;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Coach,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coach => write!(f, "coach"),
            Role::Client => write!(f, "client"),
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coach" => Ok(Role::Coach),
            "client" => Ok(Role::Client),
            _ => Err(()),
        }
    }
}

/// Validated caller identity, extracted from the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    /// The caller's own role-profile id: their coach profile if they are a
    /// coach, client profile if a client. `None` when no profile row exists.
    pub async fn profile_id(&self, pool: &SqlitePool) -> Result<Option<i64>, sqlx::Error> {
        let query = match self.role {
            Role::Coach => "SELECT id FROM coach_profiles WHERE user_id=?",
            Role::Client => "SELECT id FROM client_profiles WHERE user_id=?",
        };
        let row: Option<(i64,)> = sqlx::query_as(query)
            .bind(self.user_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }
}

impl<S> FromRequestParts<S> for Identity
where
    TokenKey: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let key = TokenKey::from_ref(state);
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthenticated("missing bearer token"))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthenticated("missing bearer token"))?;

        match verify(&key, token) {
            Ok(identity) => Ok(identity),
            Err(TokenError::Expired) => Err(AppError::Unauthenticated("token expired")),
            Err(_) => Err(AppError::Unauthenticated("invalid token")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn seed(pool: &SqlitePool) {
        sqlx::query("INSERT INTO users (id,display_name,role) VALUES (1,'Ann','coach'),(2,'Bob','client')")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO coach_profiles (id,user_id,approved) VALUES (30,1,1)")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO client_profiles (id,user_id) VALUES (70,2)")
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn resolves_profile_by_role() {
        let pool = db::memory_pool().await;
        seed(&pool).await;

        let coach = Identity { user_id: 1, role: Role::Coach };
        assert_eq!(coach.profile_id(&pool).await.unwrap(), Some(30));

        let client = Identity { user_id: 2, role: Role::Client };
        assert_eq!(client.profile_id(&pool).await.unwrap(), Some(70));

        // Coach-role user with no coach profile resolves to nothing.
        let orphan = Identity { user_id: 2, role: Role::Coach };
        assert_eq!(orphan.profile_id(&pool).await.unwrap(), None);
    }
}
