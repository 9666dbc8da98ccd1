//! SurrealDB implementation of [`SessionStore`].
//!
//! Every operation is a single SurrealQL statement per record, so the
//! engine provides the per-record atomicity: `UPSERT` for last-enter,
//! `array::union` for IP sets, conditional `UPDATE ... WHERE` for token
//! insertion and `DELETE ... RETURN BEFORE` for find-and-delete.
//!
//! Operations that write both a session and its owner's `last_enter`
//! record send the two queries concurrently and join their errors.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sessionstore_core::deadline::with_timeout;
use sessionstore_core::error::{SessionError, SessionResult};
use sessionstore_core::key::RecordKey;
use sessionstore_core::models::last_enter::LastEnter;
use sessionstore_core::models::session::{AdditionalToken, Session};
use sessionstore_core::repository::SessionStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;

use crate::error::DbError;
use crate::schema::run_migrations;

/// Projection used on every read path that must not expose the secret.
const PUBLIC_FIELDS: &str = "meta::id(id) AS record_id, user_id, ip, \
                             last_usage, user_agent, auth_method, tokens";

#[derive(Debug, SurrealValue)]
struct TokenRow {
    value: String,
    created_at: DateTime<Utc>,
}

impl From<TokenRow> for AdditionalToken {
    fn from(row: TokenRow) -> Self {
        AdditionalToken {
            value: row.value,
            created_at: row.created_at,
        }
    }
}

impl From<AdditionalToken> for TokenRow {
    fn from(token: AdditionalToken) -> Self {
        TokenRow {
            value: token.value,
            created_at: token.created_at,
        }
    }
}

/// DB-side session row, with the record ID via `meta::id(id)`.
///
/// `secret` is absent when the query projects it away.
#[derive(Debug, SurrealValue)]
struct SessionRow {
    record_id: String,
    secret: Option<String>,
    user_id: String,
    ip: Vec<String>,
    last_usage: DateTime<Utc>,
    user_agent: String,
    auth_method: String,
    tokens: BTreeMap<String, Vec<TokenRow>>,
}

impl SessionRow {
    fn try_into_session<Id: RecordKey, UserId: RecordKey>(
        self,
    ) -> SessionResult<Session<Id, UserId>> {
        Ok(Session {
            id: Id::from_key(&self.record_id)?,
            secret: self.secret.unwrap_or_default(),
            user_id: UserId::from_key(&self.user_id)?,
            ip: self.ip,
            last_usage: self.last_usage,
            user_agent: self.user_agent,
            auth_method: self.auth_method,
            tokens: self
                .tokens
                .into_iter()
                .map(|(service, tokens)| {
                    (service, tokens.into_iter().map(Into::into).collect())
                })
                .collect(),
        })
    }
}

#[derive(Debug, SurrealValue)]
struct LastEnterRow {
    record_id: String,
    last_enter: DateTime<Utc>,
    ip: Vec<String>,
}

/// Store-level behaviour settings.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Upper bound for each operation. `None` leaves deadlines to the
    /// caller.
    pub operation_timeout: Option<Duration>,
}

/// Field path of one service's token list inside `tokens`.
///
/// The service name is embedded as an escaped identifier, so characters
/// that would end the escape are refused.
fn token_path(service: &str) -> SessionResult<String> {
    if service.is_empty() || service.contains(['`', '\\']) {
        return Err(SessionError::InvalidService(service.to_string()));
    }
    Ok(format!("tokens.`{service}`"))
}

fn not_found(entity: &str, id: String) -> SessionError {
    DbError::NotFound {
        entity: entity.into(),
        id,
    }
    .into()
}

/// SurrealDB implementation of the session store.
pub struct SurrealSessionStore<C: Connection, Id, UserId> {
    db: Surreal<C>,
    config: StoreConfig,
    _keys: PhantomData<fn() -> (Id, UserId)>,
}

impl<C: Connection, Id, UserId> Clone for SurrealSessionStore<C, Id, UserId> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            config: self.config.clone(),
            _keys: PhantomData,
        }
    }
}

impl<C, Id, UserId> SurrealSessionStore<C, Id, UserId>
where
    C: Connection,
    Id: RecordKey,
    UserId: RecordKey,
{
    /// Wrap a database whose schema is already in place.
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            config: StoreConfig::default(),
            _keys: PhantomData,
        }
    }

    /// Apply pending migrations (tables, the UNIQUE index on `secret`
    /// and the index on `user_id`), then wrap the database.
    pub async fn init(db: Surreal<C>) -> Result<Self, DbError> {
        run_migrations(&db).await?;
        Ok(Self::new(db))
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    async fn fetch_by_id(&self, id: &Id) -> SessionResult<Session<Id, UserId>> {
        let id_str = id.to_key();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('session', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| not_found("session", id_str))?;

        row.try_into_session()
    }

    /// Set `last_enter` to now. With `upsert` the record is created when
    /// missing, otherwise a missing record is left alone.
    async fn touch_last_enter(&self, user_id: &UserId, upsert: bool) -> SessionResult<()> {
        let verb = if upsert { "UPSERT" } else { "UPDATE" };

        self.db
            .query(format!(
                "{verb} type::record('last_enter', $user_id) SET last_enter = $now"
            ))
            .bind(("user_id", user_id.to_key()))
            .bind(("now", Utc::now()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write("last_enter", e))?;

        Ok(())
    }

    async fn insert_session(&self, session: Session<Id, UserId>) -> SessionResult<()> {
        let tokens: BTreeMap<String, Vec<TokenRow>> = session
            .tokens
            .into_iter()
            .map(|(service, tokens)| (service, tokens.into_iter().map(Into::into).collect()))
            .collect();

        self.db
            .query(
                "CREATE type::record('session', $id) SET \
                 secret = $secret, \
                 user_id = $user_id, \
                 ip = array::distinct($ip), \
                 last_usage = $last_usage, \
                 user_agent = $user_agent, \
                 auth_method = $auth_method, \
                 tokens = $tokens",
            )
            .bind(("id", session.id.to_key()))
            .bind(("secret", session.secret))
            .bind(("user_id", session.user_id.to_key()))
            .bind(("ip", session.ip))
            .bind(("last_usage", session.last_usage))
            .bind(("user_agent", session.user_agent))
            .bind(("auth_method", session.auth_method))
            .bind(("tokens", tokens))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write("session", e))?;

        Ok(())
    }

    async fn refresh_session(&self, session: &Session<Id, UserId>) -> SessionResult<()> {
        self.db
            .query(
                "UPDATE type::record('session', $id) SET \
                 user_agent = $user_agent, \
                 last_usage = $last_usage",
            )
            .bind(("id", session.id.to_key()))
            .bind(("user_agent", session.user_agent.clone()))
            .bind(("last_usage", session.last_usage))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write("session", e))?;

        Ok(())
    }

    /// Union `ip` into the `ip` array of a single record. A missing
    /// record is left alone.
    async fn add_ip_to(&self, table: &str, key: String, ip: &str) -> SessionResult<()> {
        self.db
            .query("UPDATE type::record($table, $key) SET ip = array::union(ip, [$ip])")
            .bind(("table", table.to_string()))
            .bind(("key", key))
            .bind(("ip", ip.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(table, e))?;

        Ok(())
    }

    /// Find-and-delete returning the removed rows, secrets included.
    async fn take_deleted(
        &self,
        query: &'static str,
        key: &'static str,
        value: String,
    ) -> SessionResult<Vec<SessionRow>> {
        let mut result = self
            .db
            .query(query)
            .bind((key, value))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows)
    }
}

impl<C, Id, UserId> SessionStore<Id, UserId> for SurrealSessionStore<C, Id, UserId>
where
    C: Connection,
    Id: RecordKey,
    UserId: RecordKey,
{
    async fn create_session(&self, session: Session<Id, UserId>) -> SessionResult<()> {
        with_timeout(self.config.operation_timeout, async move {
            let user_id = session.user_id.clone();
            debug!(user_id = %user_id.to_key(), "Creating session");

            let (inserted, touched) = tokio::join!(
                self.insert_session(session),
                self.touch_last_enter(&user_id, true),
            );

            SessionError::join(inserted, touched)
        })
        .await
    }

    async fn update_session(&self, session: &Session<Id, UserId>) -> SessionResult<()> {
        with_timeout(self.config.operation_timeout, async {
            let (refreshed, touched) = tokio::join!(
                self.refresh_session(session),
                self.touch_last_enter(&session.user_id, false),
            );

            SessionError::join(refreshed, touched)
        })
        .await
    }

    async fn delete_all_sessions_except_this(&self, id: &Id) -> SessionResult<()> {
        with_timeout(self.config.operation_timeout, async {
            let session = self.fetch_by_id(id).await?;

            let mut result = self
                .db
                .query(
                    "DELETE session WHERE user_id = $user_id \
                     AND id != type::record('session', $id) RETURN BEFORE",
                )
                .bind(("user_id", session.user_id.to_key()))
                .bind(("id", id.to_key()))
                .await
                .map_err(DbError::from)?;

            let removed: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
            debug!(
                session_id = %id.to_key(),
                removed = removed.len(),
                "Deleted other sessions of user"
            );

            Ok(())
        })
        .await
    }

    async fn delete_session_by_secret(&self, secret: &str) -> SessionResult<Session<Id, UserId>> {
        with_timeout(self.config.operation_timeout, async {
            let rows = self
                .take_deleted(
                    "SELECT meta::id(id) AS record_id, * FROM \
                     (DELETE session WHERE secret = $secret RETURN BEFORE)",
                    "secret",
                    secret.to_string(),
                )
                .await?;

            rows.into_iter()
                .next()
                .ok_or_else(|| not_found("session", "secret=<redacted>".into()))?
                .try_into_session()
        })
        .await
    }

    async fn delete_session_by_id(&self, id: &Id) -> SessionResult<Session<Id, UserId>> {
        with_timeout(self.config.operation_timeout, async {
            let id_str = id.to_key();
            let rows = self
                .take_deleted(
                    "SELECT meta::id(id) AS record_id, * FROM \
                     (DELETE type::record('session', $id) RETURN BEFORE)",
                    "id",
                    id_str.clone(),
                )
                .await?;

            rows.into_iter()
                .next()
                .ok_or_else(|| not_found("session", id_str))?
                .try_into_session()
        })
        .await
    }

    async fn delete_sessions_by_user(&self, user_id: &UserId) -> SessionResult<()> {
        with_timeout(self.config.operation_timeout, async {
            let mut result = self
                .db
                .query("DELETE session WHERE user_id = $user_id RETURN BEFORE")
                .bind(("user_id", user_id.to_key()))
                .await
                .map_err(DbError::from)?;

            let removed: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
            debug!(
                user_id = %user_id.to_key(),
                removed = removed.len(),
                "Deleted user sessions"
            );

            Ok(())
        })
        .await
    }

    async fn get_sessions_by_user(&self, user_id: &UserId) -> SessionResult<Vec<Session<Id, UserId>>> {
        with_timeout(self.config.operation_timeout, async {
            let mut result = self
                .db
                .query(format!(
                    "SELECT {PUBLIC_FIELDS} FROM session WHERE user_id = $user_id"
                ))
                .bind(("user_id", user_id.to_key()))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
            rows.into_iter()
                .map(|row| row.try_into_session().map(Session::redacted))
                .collect()
        })
        .await
    }

    async fn get_last_enter_by_user(&self, user_id: &UserId) -> SessionResult<DateTime<Utc>> {
        self.get_last_enter(user_id)
            .await
            .map(|record| record.last_enter)
    }

    async fn get_last_enter(&self, user_id: &UserId) -> SessionResult<LastEnter<UserId>> {
        with_timeout(self.config.operation_timeout, async {
            let user_id_str = user_id.to_key();

            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, last_enter, ip \
                     FROM type::record('last_enter', $user_id)",
                )
                .bind(("user_id", user_id_str.clone()))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<LastEnterRow> = result.take(0).map_err(DbError::from)?;
            let row = rows
                .into_iter()
                .next()
                .ok_or_else(|| not_found("last_enter", user_id_str))?;

            Ok(LastEnter {
                user_id: UserId::from_key(&row.record_id)?,
                last_enter: row.last_enter,
                ip: row.ip,
            })
        })
        .await
    }

    async fn get_session_by_secret(&self, secret: &str) -> SessionResult<Session<Id, UserId>> {
        with_timeout(self.config.operation_timeout, async {
            let mut result = self
                .db
                .query(format!(
                    "SELECT {PUBLIC_FIELDS} FROM session WHERE secret = $secret LIMIT 1"
                ))
                .bind(("secret", secret.to_string()))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
            rows.into_iter()
                .next()
                .ok_or_else(|| not_found("session", "secret=<redacted>".into()))?
                .try_into_session()
                .map(Session::redacted)
        })
        .await
    }

    async fn get_session_by_id(&self, id: &Id) -> SessionResult<Session<Id, UserId>> {
        with_timeout(self.config.operation_timeout, async {
            self.fetch_by_id(id).await.map(Session::redacted)
        })
        .await
    }

    async fn add_unique_ip(&self, id: &Id, ip: &str) -> SessionResult<()> {
        with_timeout(self.config.operation_timeout, async {
            let session = self.fetch_by_id(id).await?;

            let (on_session, on_last_enter) = tokio::join!(
                self.add_ip_to("session", id.to_key(), ip),
                self.add_ip_to("last_enter", session.user_id.to_key(), ip),
            );

            SessionError::join(on_session, on_last_enter)
        })
        .await
    }

    async fn append_unique_token_to_session(
        &self,
        id: &Id,
        service: &str,
        token: &str,
    ) -> SessionResult<()> {
        let path = token_path(service)?;

        // `$token` is a protected session variable, hence `$token_value`.
        with_timeout(self.config.operation_timeout, async {
            let query = format!(
                "UPDATE type::record('session', $id) SET \
                 {path} = array::append({path} ?? [], {{ value: $token_value, created_at: $now }}) \
                 WHERE $token_value NOTINSIDE ({path}.value ?? [])"
            );

            self.db
                .query(query)
                .bind(("id", id.to_key()))
                .bind(("token_value", token.to_string()))
                .bind(("now", Utc::now()))
                .await
                .map_err(DbError::from)?
                .check()
                .map_err(|e| DbError::from_write("session", e))?;

            Ok(())
        })
        .await
    }

    async fn remove_token_from_session(
        &self,
        id: &Id,
        service: &str,
        token: &str,
    ) -> SessionResult<()> {
        let path = token_path(service)?;

        with_timeout(self.config.operation_timeout, async {
            let query = format!(
                "UPDATE type::record('session', $id) SET \
                 {path} = {path}[WHERE value != $token_value] \
                 WHERE {path} != NONE"
            );

            self.db
                .query(query)
                .bind(("id", id.to_key()))
                .bind(("token_value", token.to_string()))
                .await
                .map_err(DbError::from)?
                .check()
                .map_err(|e| DbError::from_write("session", e))?;

            Ok(())
        })
        .await
    }

    async fn get_all_tokens_by_user_and_service(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> SessionResult<Vec<AdditionalToken>> {
        let path = token_path(service)?;

        with_timeout(self.config.operation_timeout, async {
            // match on owner and service -> project the service list -> flatten
            let query = format!(
                "RETURN array::flatten(\
                 (SELECT VALUE {path} FROM session \
                 WHERE user_id = $user_id AND {path} != NONE))"
            );

            let mut result = self
                .db
                .query(query)
                .bind(("user_id", user_id.to_key()))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_path_escapes_service_name() {
        assert_eq!(token_path("github").unwrap(), "tokens.`github`");
        assert_eq!(token_path("my service.v2").unwrap(), "tokens.`my service.v2`");
    }

    #[test]
    fn token_path_rejects_unescapable_names() {
        for bad in ["", "a`b", "a\\b"] {
            assert!(matches!(
                token_path(bad),
                Err(SessionError::InvalidService(_))
            ));
        }
    }
}
