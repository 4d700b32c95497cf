use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::prelude::*;
use chrono::Duration;
use futures::prelude::*;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use validator::Validate;

use super::types::*;
use crate::errors::{Error, RepoError};
use crate::models::*;
use crate::types::DbPool;

const SESSION_TOKEN_LEN: usize = 48;

/// Back-office authentication: email/password accounts with opaque session
/// tokens carried by a cookie.
pub trait AdminService: Send + Sync {
    fn login(&self, payload: AdminLoginPayload) -> ServiceFuture<AdminSession>;
    fn authenticate(&self, token: String) -> ServiceFuture<Admin>;
    fn logout(&self, token: String) -> ServiceFuture<()>;
}

pub struct AdminServiceImpl {
    pub db_pool: DbPool,
    pub admin_repo_factory: AdminRepoFactory,
    pub session_repo_factory: AdminSessionRepoFactory,
}

pub fn hash_password(password: &str) -> Result<String, failure::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| format_err!("Failed to hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> Result<(), failure::Error> {
    let parsed = PasswordHash::new(hash).map_err(|e| format_err!("Stored password hash is invalid: {}", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| Error::Unauthorized.into())
}

fn generate_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

impl AdminService for AdminServiceImpl {
    fn login(&self, payload: AdminLoginPayload) -> ServiceFuture<AdminSession> {
        let db_pool = self.db_pool.clone();
        let admin_repo_factory = self.admin_repo_factory.clone();
        let session_repo_factory = self.session_repo_factory.clone();
        async move {
            payload
                .validate()
                .map_err(|e| Error::Validate(e.to_string()))?;

            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let admin_repo = (admin_repo_factory)();
            let session_repo = (session_repo_factory)();

            let admin = admin_repo
                .select(
                    &tx,
                    AdminFilter {
                        email: Some(payload.email.clone()),
                        ..Default::default()
                    },
                )
                .await?
                .pop()
                .ok_or(Error::Unauthorized)?;
            verify_password(&payload.password, &admin.password_hash)?;

            let session = session_repo
                .insert_exactly_one(
                    &tx,
                    AdminSessionInserter {
                        token: generate_token(),
                        admin_id: admin.id,
                        expires_at: Utc::now() + Duration::hours(SESSION_TTL_HOURS),
                    },
                )
                .await?;
            tx.commit().await.map_err(RepoError::from)?;

            info!("Admin {} opened a back-office session", admin.id);
            Ok(session)
        }
        .boxed()
    }

    fn authenticate(&self, token: String) -> ServiceFuture<Admin> {
        let db_pool = self.db_pool.clone();
        let admin_repo_factory = self.admin_repo_factory.clone();
        let session_repo_factory = self.session_repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let admin_repo = (admin_repo_factory)();
            let session_repo = (session_repo_factory)();

            let session = session_repo
                .select(&tx, AdminSessionFilter::from(token.clone()))
                .await?
                .pop()
                .ok_or(Error::Unauthorized)?;

            if session.is_expired(Utc::now()) {
                session_repo
                    .delete(&tx, AdminSessionFilter::from(token))
                    .await?;
                tx.commit().await.map_err(RepoError::from)?;
                return Err(Error::Unauthorized.into());
            }

            let admin = admin_repo
                .select(
                    &tx,
                    AdminFilter {
                        id: Some(session.admin_id),
                        ..Default::default()
                    },
                )
                .await?
                .pop()
                .ok_or(Error::Unauthorized)?;
            tx.commit().await.map_err(RepoError::from)?;

            Ok(admin)
        }
        .boxed()
    }

    fn logout(&self, token: String) -> ServiceFuture<()> {
        let db_pool = self.db_pool.clone();
        let session_repo_factory = self.session_repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let session_repo = (session_repo_factory)();
            session_repo
                .delete(&tx, AdminSessionFilter::from(token))
                .await?;
            tx.commit().await.map_err(RepoError::from)?;

            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips_through_hash() {
        let hash = hash_password("hiver-2024!").unwrap();
        assert!(verify_password("hiver-2024!", &hash).is_ok());
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let hash = hash_password("hiver-2024!").unwrap();
        let err = verify_password("ete-2024!", &hash).unwrap_err();
        assert_eq!(
            err.find_root_cause().downcast_ref::<Error>(),
            Some(&Error::Unauthorized)
        );
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(
            hash_password("hiver-2024!").unwrap(),
            hash_password("hiver-2024!").unwrap()
        );
    }

    #[test]
    fn tokens_are_long_and_alphanumeric() {
        let token = generate_token();
        assert_eq!(token.len(), SESSION_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token());
    }
}
