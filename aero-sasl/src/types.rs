use anyhow::Result;
use async_trait::async_trait;

/// How the command/response reader classified the last server line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Untagged data or a line for another command, keep reading
    Continue,
    /// Command continuation request (`+ ...`), the server waits for data
    Respond,
    /// Tagged `OK`
    Ok,
    /// Tagged `NO`, the command was understood but refused
    No,
    /// Tagged `BAD`, the command was not understood
    Bad,
}

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRes {
    Success,
    /// Wrong or missing credentials
    Failed,
    /// The server does not handle this mechanism, another one may be tried
    Unavailable,
}

/// Where the account's identity comes from (config file, prompt, keyring...)
pub trait CredentialProvider {
    fn username(&mut self) -> Result<String>;
    fn password(&mut self) -> Result<String>;

    /// Identity to act as. `None` means the username itself.
    fn authorization_identity(&self) -> Option<String> {
        None
    }
}

/// The IMAP connection as seen by the authentication flow.
#[async_trait]
pub trait Transport: Send {
    /// Send `line` as a new tagged command. Tag and line terminator are
    /// added by the transport.
    async fn start_command(&mut self, line: &[u8]) -> Result<()>;

    /// Read and classify the next server line.
    async fn step(&mut self) -> Result<Step>;

    /// Send bytes as they are, outside of any command.
    async fn send_raw(&mut self, bytes: &[u8]) -> Result<()>;

    /// Server advertised SASL-IR (RFC 4959): credentials may follow the
    /// AUTHENTICATE command on the same line.
    fn sasl_ir(&self) -> bool;
}

/// User facing status line. Purely advisory.
pub trait Notifier {
    fn progress(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
    fn clear(&mut self);
}
