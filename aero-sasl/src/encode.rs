use aero_buffer::{bprintf, Buffer};
use anyhow::{bail, Result};
use base64::Engine;

pub const AUTHENTICATE_PLAIN: &str = "AUTHENTICATE PLAIN";

pub trait Encode {
    fn encode(&self, out: &mut Buffer) -> Result<()>;
}

/// A command followed by a SASL PLAIN initial response (RFC 4616)
///
/// ```text
/// AUTHENTICATE PLAIN base64(authz NUL authc NUL password)
/// ```
pub struct PlainMessage<'a> {
    pub command: &'a str,
    pub authz: &'a str,
    pub authc: &'a str,
    pub password: &'a str,
}

impl std::fmt::Debug for PlainMessage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainMessage")
            .field("command", &self.command)
            .field("authz", &self.authz)
            .field("authc", &self.authc)
            .finish_non_exhaustive()
    }
}

impl Encode for PlainMessage<'_> {
    fn encode(&self, out: &mut Buffer) -> Result<()> {
        if self.authc.is_empty() || self.password.is_empty() {
            bail!("SASL PLAIN needs a non-empty login and password");
        }

        bprintf!(out, "{} ", self.command)?;
        out.append_str(&plain_credentials(self.authz, self.authc, self.password))?;
        Ok(())
    }
}

/// The base64 PLAIN payload alone
pub fn plain_credentials(authz: &str, authc: &str, password: &str) -> String {
    let mut raw = Vec::with_capacity(authz.len() + authc.len() + password.len() + 2);
    raw.extend_from_slice(authz.as_bytes());
    raw.push(0x00);
    raw.extend_from_slice(authc.as_bytes());
    raw.push(0x00);
    raw.extend_from_slice(password.as_bytes());

    base64::engine::general_purpose::STANDARD.encode(raw)
}
