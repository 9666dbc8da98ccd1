//! Session store core — domain models, key abstraction, repository
//! trait and error types shared by every backend.

pub mod deadline;
pub mod error;
pub mod key;
pub mod models;
pub mod repository;

pub use error::{SessionError, SessionResult};
pub use key::RecordKey;
pub use models::last_enter::LastEnter;
pub use models::session::{AdditionalToken, Session};
pub use repository::SessionStore;
