use serde::Serialize;

use super::storage::StoredIdentity;

/// Which OAuth return page is running. The session flow signs the device in;
/// the link flow attaches Discord to an existing site account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFlow {
    SessionLogin,
    AccountLink,
}

/// Lifecycle of a callback page. It renders `Loading` until the backend
/// answers, then exactly one of the terminal phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPhase {
    Loading,
    Success,
    Error,
}

/// Why a callback attempt did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackFailure {
    /// Discord redirected back without a `code` parameter.
    MissingCode,
    /// The link flow needs a signed-in site account and there is none.
    NotSignedIn,
    /// The backend reported a failure while finishing the flow.
    RemoteError(String),
}

/// Where the page sends the user once it reaches a terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RedirectTarget {
    Home,
    LoginPage,
    ProfilePage,
}

/// Navigation seam so the state machine can be driven in tests without a
/// browser history API.
pub trait Navigator {
    fn navigate(&self, target: RedirectTarget);
}

/// Drives a callback page from `Loading` to a terminal phase and issues the
/// final redirect through the injected navigator.
pub struct CallbackController<N: Navigator> {
    flow: CallbackFlow,
    navigator: N,
    phase: CallbackPhase,
}

impl<N: Navigator> CallbackController<N> {
    pub fn new(flow: CallbackFlow, navigator: N) -> Self {
        Self {
            flow,
            navigator,
            phase: CallbackPhase::Loading,
        }
    }

    pub fn phase(&self) -> CallbackPhase {
        self.phase
    }

    /// Feed the outcome of the backend exchange into the page. Returns the
    /// redirect target it navigated to.
    pub fn resolve(
        &mut self,
        outcome: Result<StoredIdentity, CallbackFailure>,
    ) -> RedirectTarget {
        let target = match outcome {
            Ok(_) => {
                self.phase = CallbackPhase::Success;
                match self.flow {
                    CallbackFlow::SessionLogin => RedirectTarget::Home,
                    CallbackFlow::AccountLink => RedirectTarget::ProfilePage,
                }
            }
            Err(failure) => {
                self.phase = CallbackPhase::Error;
                error_target(self.flow, &failure)
            }
        };
        self.navigator.navigate(target);
        target
    }
}

/// The error redirect depends on why the flow failed, not just that it did.
/// A link attempt that never had a code or hit a backend error returns to
/// the profile page the user came from; a missing site session sends them to
/// sign in first. The session flow always falls back to the login page.
fn error_target(flow: CallbackFlow, failure: &CallbackFailure) -> RedirectTarget {
    match flow {
        CallbackFlow::SessionLogin => RedirectTarget::LoginPage,
        CallbackFlow::AccountLink => match failure {
            CallbackFailure::NotSignedIn => RedirectTarget::LoginPage,
            CallbackFailure::MissingCode | CallbackFailure::RemoteError(_) => {
                RedirectTarget::ProfilePage
            }
        },
    }
}
