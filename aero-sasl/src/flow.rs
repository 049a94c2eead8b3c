use aero_buffer::Buffer;

use super::encode::{Encode, PlainMessage, AUTHENTICATE_PLAIN};
use super::types::*;

const LOGGING_IN: &str = "Logging in...";
const LOGIN_FAILED: &str = "Login failed";

/// Identity resolved for one attempt
pub struct Credentials {
    authz: String,
    user: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("authz", &self.authz)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Encoded credentials waiting for the server's continuation request
pub struct Pending(Buffer);

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pending({} bytes)", self.0.len())
    }
}

#[derive(Debug)]
pub enum State {
    Init,
    CredentialsResolved(Credentials),
    CommandSent { pending: Option<Pending> },
    ContinuationReceived { payload: Pending },
    StatusReceived(Step),
    Done(AuthRes),
}

impl State {
    pub fn new() -> Self {
        Self::Init
    }

    pub fn outcome(&self) -> Option<AuthRes> {
        match self {
            Self::Done(res) => Some(*res),
            _ => None,
        }
    }

    fn transport_failure(err: anyhow::Error, during: &str) -> Self {
        tracing::error!(err=?err, during, "Transport failed, treating it as a BAD response");
        Self::StatusReceived(Step::Bad)
    }

    pub async fn progress<T, A, N>(&mut self, transport: &mut T, account: &mut A, notifier: &mut N)
    where
        T: Transport + ?Sized,
        A: CredentialProvider + ?Sized,
        N: Notifier + ?Sized,
    {
        let was_done = matches!(self, Self::Done(_));
        let new_state = 'state: {
            match std::mem::replace(self, Self::Done(AuthRes::Failed)) {
                Self::Init => {
                    let user = match account.username() {
                        Ok(u) => u,
                        Err(e) => {
                            tracing::error!(err=?e, "Unable to get the account login");
                            break 'state Self::Done(AuthRes::Failed);
                        }
                    };
                    let password = match account.password() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::error!(err=?e, user=%user, "Unable to get the account password");
                            break 'state Self::Done(AuthRes::Failed);
                        }
                    };
                    let authz = account
                        .authorization_identity()
                        .unwrap_or_else(|| user.clone());

                    notifier.progress(LOGGING_IN);
                    Self::CredentialsResolved(Credentials {
                        authz,
                        user,
                        password,
                    })
                }
                Self::CredentialsResolved(creds) => {
                    let mut buf = Buffer::new();
                    let msg = PlainMessage {
                        command: AUTHENTICATE_PLAIN,
                        authz: &creds.authz,
                        authc: &creds.user,
                        password: &creds.password,
                    };
                    if let Err(e) = msg.encode(&mut buf) {
                        tracing::error!(err=?e, "Unable to build the AUTHENTICATE command");
                        break 'state Self::Done(AuthRes::Failed);
                    }

                    if transport.sasl_ir() {
                        break 'state match transport.start_command(buf.as_bytes()).await {
                            Ok(()) => Self::CommandSent { pending: None },
                            Err(e) => Self::transport_failure(e, "AUTHENTICATE"),
                        };
                    }

                    // No SASL-IR: send the bare command, credentials follow
                    // once the server sends a continuation request.
                    let payload = match buf.split_off(AUTHENTICATE_PLAIN.len() + 1) {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::error!(err=?e, "Unable to split the AUTHENTICATE command");
                            break 'state Self::Done(AuthRes::Failed);
                        }
                    };
                    buf.truncate(AUTHENTICATE_PLAIN.len());

                    match transport.start_command(buf.as_bytes()).await {
                        Ok(()) => Self::CommandSent {
                            pending: Some(Pending(payload)),
                        },
                        Err(e) => Self::transport_failure(e, "AUTHENTICATE"),
                    }
                }
                Self::CommandSent { pending } => {
                    let status = match transport.step().await {
                        Ok(s) => s,
                        Err(e) => break 'state Self::transport_failure(e, "step"),
                    };

                    match (status, pending) {
                        (Step::Continue, pending) => Self::CommandSent { pending },
                        (Step::Respond, Some(payload)) => Self::ContinuationReceived { payload },
                        (status, Some(_)) => {
                            tracing::debug!(status=?status, "Server answered before asking for credentials");
                            Self::StatusReceived(status)
                        }
                        (Step::Respond, None) => {
                            tracing::warn!("Continuation with nothing left to send, assuming success");
                            Self::StatusReceived(Step::Respond)
                        }
                        (status, None) => Self::StatusReceived(status),
                    }
                }
                Self::ContinuationReceived {
                    payload: Pending(mut payload),
                } => {
                    if let Err(e) = payload.append_str("\r\n") {
                        tracing::error!(err=?e, "Unable to terminate the credentials line");
                        break 'state Self::Done(AuthRes::Failed);
                    }

                    match transport.send_raw(payload.as_bytes()).await {
                        Ok(()) => Self::CommandSent { pending: None },
                        Err(e) => Self::transport_failure(e, "credentials"),
                    }
                }
                Self::StatusReceived(status) => {
                    let res = match status {
                        Step::Bad => AuthRes::Unavailable,
                        Step::No => {
                            notifier.error(LOGIN_FAILED);
                            AuthRes::Failed
                        }
                        _ => AuthRes::Success,
                    };
                    Self::Done(res)
                }
                Self::Done(res) => Self::Done(res),
            }
        };
        tracing::debug!(state=?new_state, "Made progress");

        if let (false, Self::Done(res)) = (was_done, &new_state) {
            tracing::info!(res=?res, "SASL PLAIN authentication finished");
            notifier.clear();
        }
        *self = new_state;
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a whole `AUTHENTICATE PLAIN` exchange on `transport`.
///
/// The notifier's status line is always cleared before returning.
pub async fn authenticate_plain<T, A, N>(
    transport: &mut T,
    account: &mut A,
    notifier: &mut N,
) -> AuthRes
where
    T: Transport + ?Sized,
    A: CredentialProvider + ?Sized,
    N: Notifier + ?Sized,
{
    let mut state = State::new();
    loop {
        state.progress(transport, account, notifier).await;
        if let Some(res) = state.outcome() {
            return res;
        }
    }
}
