//! Repository trait for session storage.
//!
//! All operations are async. Dropping a returned future abandons the
//! outstanding backing-store request; see [`crate::deadline`] for
//! deadline-bound calls.
//!
//! Operations that touch both a session and the owner's last-enter
//! record issue two independent writes. Both are always attempted and
//! their failures are combined with [`SessionError::join`]; nothing is
//! rolled back.
//!
//! [`SessionError::join`]: crate::error::SessionError::join

use chrono::{DateTime, Utc};

use crate::error::SessionResult;
use crate::key::RecordKey;
use crate::models::last_enter::LastEnter;
use crate::models::session::{AdditionalToken, Session};

pub trait SessionStore<Id: RecordKey, UserId: RecordKey>: Send + Sync {
    /// Insert a session and upsert the owner's last-enter time.
    ///
    /// Fails with `DuplicateKey` when the id or the secret is taken.
    fn create_session(
        &self,
        session: Session<Id, UserId>,
    ) -> impl Future<Output = SessionResult<()>> + Send;

    /// Refresh `user_agent` and `last_usage`, and the owner's last-enter
    /// time. A missing session is not an error.
    fn update_session(
        &self,
        session: &Session<Id, UserId>,
    ) -> impl Future<Output = SessionResult<()>> + Send;

    /// Delete every session of the owner of `id`, except `id` itself.
    fn delete_all_sessions_except_this(
        &self,
        id: &Id,
    ) -> impl Future<Output = SessionResult<()>> + Send;

    /// Remove and return the session holding `secret`.
    fn delete_session_by_secret(
        &self,
        secret: &str,
    ) -> impl Future<Output = SessionResult<Session<Id, UserId>>> + Send;

    /// Remove and return the session with the given id.
    fn delete_session_by_id(
        &self,
        id: &Id,
    ) -> impl Future<Output = SessionResult<Session<Id, UserId>>> + Send;

    /// Remove all sessions of a user. Removing nothing is success.
    fn delete_sessions_by_user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = SessionResult<()>> + Send;

    /// All sessions of a user, secrets redacted. Order is unspecified.
    fn get_sessions_by_user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = SessionResult<Vec<Session<Id, UserId>>>> + Send;

    fn get_last_enter_by_user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = SessionResult<DateTime<Utc>>> + Send;

    /// Full last-enter record, including the mirrored IP set.
    fn get_last_enter(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = SessionResult<LastEnter<UserId>>> + Send;

    /// Session holding `secret`, with the secret redacted.
    fn get_session_by_secret(
        &self,
        secret: &str,
    ) -> impl Future<Output = SessionResult<Session<Id, UserId>>> + Send;

    /// Session by id, with the secret redacted.
    fn get_session_by_id(
        &self,
        id: &Id,
    ) -> impl Future<Output = SessionResult<Session<Id, UserId>>> + Send;

    /// Add `ip` to the session's IP set and to the owner's last-enter
    /// record. Already-present addresses are left as they are.
    fn add_unique_ip(&self, id: &Id, ip: &str) -> impl Future<Output = SessionResult<()>> + Send;

    /// Append `token` under `service` unless an entry with that value
    /// already exists there.
    fn append_unique_token_to_session(
        &self,
        id: &Id,
        service: &str,
        token: &str,
    ) -> impl Future<Output = SessionResult<()>> + Send;

    /// Remove every entry under `service` whose value is `token`.
    fn remove_token_from_session(
        &self,
        id: &Id,
        service: &str,
        token: &str,
    ) -> impl Future<Output = SessionResult<()>> + Send;

    /// Tokens under `service` across all of a user's sessions, flattened.
    /// Each session's own insertion order is kept.
    fn get_all_tokens_by_user_and_service(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> impl Future<Output = SessionResult<Vec<AdditionalToken>>> + Send;
}
