//! Domain models for the session store.

pub mod last_enter;
pub mod session;
