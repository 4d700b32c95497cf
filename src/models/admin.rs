use chrono::prelude::*;
use tokio_postgres::Row;
use validator::Validate;

use super::common::*;
use crate::util::*;

const ID_COLUMN: &str = "id";
const EMAIL_COLUMN: &str = "email";
const PASSWORD_HASH_COLUMN: &str = "password_hash";
const CREATED_AT_COLUMN: &str = "created_at";

const TOKEN_COLUMN: &str = "token";
const ADMIN_ID_COLUMN: &str = "admin_id";
const EXPIRES_AT_COLUMN: &str = "expires_at";

/// Back-office sessions live this long.
pub const SESSION_TTL_HOURS: i64 = 8;

/// Back-office account. Provisioned out of band, never exposed over HTTP.
#[derive(Clone, Debug, PartialEq)]
pub struct Admin {
    pub id: AdminId,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<Row> for Admin {
    fn from(row: Row) -> Self {
        Self {
            id: AdminId(row.get(ID_COLUMN)),
            email: row.get(EMAIL_COLUMN),
            password_hash: row.get(PASSWORD_HASH_COLUMN),
            created_at: row.get(CREATED_AT_COLUMN),
        }
    }
}

pub struct AdminInserter {
    pub email: String,
    pub password_hash: String,
}

impl Inserter for AdminInserter {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(EMAIL_COLUMN, self.email)
            .with_arg(PASSWORD_HASH_COLUMN, self.password_hash)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AdminFilter {
    pub id: Option<AdminId>,
    pub email: Option<String>,
}

impl Filter for AdminFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(id) = self.id {
            b = b.with_filter(ID_COLUMN, id.0);
        }

        if let Some(email) = self.email {
            b = b.with_filter(EMAIL_COLUMN, email);
        }

        b
    }
}

pub struct DummyAdminUpdater {}

impl Updater for DummyAdminUpdater {
    fn into_update_builder(self, _table: &'static str) -> UpdateBuilder {
        unreachable!()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdminSession {
    pub token: String,
    #[serde(skip)]
    pub admin_id: AdminId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AdminSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl From<Row> for AdminSession {
    fn from(row: Row) -> Self {
        Self {
            token: row.get(TOKEN_COLUMN),
            admin_id: AdminId(row.get(ADMIN_ID_COLUMN)),
            created_at: row.get(CREATED_AT_COLUMN),
            expires_at: row.get(EXPIRES_AT_COLUMN),
        }
    }
}

pub struct AdminSessionInserter {
    pub token: String,
    pub admin_id: AdminId,
    pub expires_at: DateTime<Utc>,
}

impl Inserter for AdminSessionInserter {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(TOKEN_COLUMN, self.token)
            .with_arg(ADMIN_ID_COLUMN, self.admin_id.0)
            .with_arg(EXPIRES_AT_COLUMN, self.expires_at)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AdminSessionFilter {
    pub token: Option<String>,
}

impl From<String> for AdminSessionFilter {
    fn from(token: String) -> Self {
        Self { token: Some(token) }
    }
}

impl Filter for AdminSessionFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(token) = self.token {
            b = b.with_filter(TOKEN_COLUMN, token);
        }

        b
    }
}

pub struct DummyAdminSessionUpdater {}

impl Updater for DummyAdminSessionUpdater {
    fn into_update_builder(self, _table: &'static str) -> UpdateBuilder {
        unreachable!()
    }
}

#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct AdminLoginPayload {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: DateTime<Utc>) -> AdminSession {
        AdminSession {
            token: "token".to_string(),
            admin_id: AdminId(1),
            created_at: expires_at - Duration::hours(SESSION_TTL_HOURS),
            expires_at,
        }
    }

    #[test]
    fn session_expiry_is_inclusive() {
        let now = Utc::now();
        assert!(session(now).is_expired(now));
        assert!(session(now - Duration::seconds(1)).is_expired(now));
        assert!(!session(now + Duration::seconds(1)).is_expired(now));
    }

    #[test]
    fn session_json_does_not_leak_admin_id() {
        let serialized = serde_json::to_string(&session(Utc::now())).unwrap();
        assert!(serialized.contains("token"));
        assert!(!serialized.contains("admin_id"));
    }
}
