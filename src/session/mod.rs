//! Device-local session handling for the site client.
//!
//! The browser keeps a Discord-only login (independent of the account
//! system) in persistent local storage. Storage and navigation are trait
//! seams so the whole callback flow is testable without a real browser.

pub mod callback;
pub mod storage;

pub use callback::{CallbackController, CallbackFailure, CallbackFlow, CallbackPhase, Navigator, RedirectTarget};
pub use storage::{AuthContext, AuthState, JsonFileStorage, MemoryStorage, SessionStorage, StoredIdentity};
