//! Database models split into separate files.
//! This module re-exports individual model modules so imports like
//! `use crate::db::models::*;` keep working.

pub mod discord_session;
pub mod profile;
pub mod user_role;

pub use self::discord_session::*;
pub use self::profile::*;
pub use self::user_role::*;
