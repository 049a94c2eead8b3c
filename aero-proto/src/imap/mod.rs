pub mod response;

use std::collections::HashSet;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};

use aero_buffer::{bprintf, Buffer};
use aero_sasl::types::{Step, Transport};

use response::*;

/// Just enough of an IMAP client to greet a server, learn its capabilities
/// and drive an authentication exchange.
pub struct ImapClient<S> {
    stream: BufStream<S>,
    seqno: u32,
    current_tag: Option<String>,
    capabilities: HashSet<String>,
    write_buf: Buffer,
}

impl<S> ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufStream::new(stream),
            seqno: 0,
            current_tag: None,
            capabilities: HashSet::new(),
            write_buf: Buffer::new(),
        }
    }

    /// Read the server greeting. `* BYE` is an error.
    pub async fn greeting(&mut self) -> Result<Status> {
        let line = self.read_line().await?;
        let (_, resp) = response_line(&line).map_err(|_| anyhow!("Unable to parse server greeting"))?;

        let text = match resp {
            Response::Untagged(text) => text,
            _ => bail!("Server greeting must be an untagged response"),
        };
        let (rest, status) =
            untagged_status(text).map_err(|_| anyhow!("Server greeting has no status"))?;

        match status {
            Status::Ok | Status::Preauth => {
                if let Ok((_, caps)) = capability_code(rest) {
                    self.record_capabilities(caps);
                }
                Ok(status)
            }
            Status::Bye => bail!(
                "Server refused the connection: {}",
                String::from_utf8_lossy(rest)
            ),
            _ => bail!("Unexpected greeting status {:?}", status),
        }
    }

    pub async fn capability(&mut self) -> Result<()> {
        self.run("CAPABILITY").await
    }

    pub async fn logout(&mut self) -> Result<()> {
        self.run("LOGOUT").await
    }

    pub fn capabilities(&self) -> &HashSet<String> {
        &self.capabilities
    }

    /// Capability names are compared case-insensitively
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains(&name.to_ascii_uppercase())
    }

    async fn run(&mut self, cmd: &str) -> Result<()> {
        self.start_command(cmd.as_bytes()).await?;
        loop {
            match self.step().await? {
                Step::Continue => continue,
                Step::Ok => return Ok(()),
                other => bail!("{} failed with {:?}", cmd, other),
            }
        }
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let bread = self.stream.read_until(b'\n', &mut line).await?;
        if bread == 0 {
            bail!("Connection has been closed by the server");
        }
        tracing::trace!(line=%String::from_utf8_lossy(&line).trim_end(), "S");
        Ok(line)
    }

    fn record_capabilities(&mut self, caps: Vec<&[u8]>) {
        self.capabilities = caps
            .into_iter()
            .map(|c| String::from_utf8_lossy(c).to_ascii_uppercase())
            .collect();
        tracing::debug!(capabilities=?self.capabilities, "Server capabilities");
    }
}

#[async_trait]
impl<S> Transport for ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn start_command(&mut self, line: &[u8]) -> Result<()> {
        let tag = format!("a{:04}", self.seqno);
        self.seqno = self.seqno.wrapping_add(1);

        self.write_buf.clear();
        bprintf!(self.write_buf, "{} ", tag)?;
        self.write_buf.append_bytes(line)?;
        self.write_buf.append_str("\r\n")?;

        let sent = self.stream.write_all(self.write_buf.as_bytes()).await;
        // the line may carry credentials, its storage goes with it
        self.write_buf = Buffer::new();
        sent?;
        self.stream.flush().await?;

        tracing::trace!(tag = %tag, "C");
        self.current_tag = Some(tag);
        Ok(())
    }

    async fn step(&mut self) -> Result<Step> {
        let line = self.read_line().await?;
        let (_, resp) = response_line(&line).map_err(|_| {
            anyhow!(
                "Unable to parse server response: {}",
                String::from_utf8_lossy(&line).trim_end()
            )
        })?;

        let step = match resp {
            Response::Continuation(_) => Step::Respond,
            Response::Untagged(text) => {
                if let Ok((_, caps)) = capability_data(text) {
                    self.record_capabilities(caps);
                }
                Step::Continue
            }
            Response::Tagged { tag, status, text }
                if Some(tag) == self.current_tag.as_deref().map(str::as_bytes) =>
            {
                self.current_tag = None;
                if let Ok((_, caps)) = capability_code(text) {
                    self.record_capabilities(caps);
                }
                match status {
                    Status::Ok => Step::Ok,
                    Status::No => Step::No,
                    Status::Bad => Step::Bad,
                    other => bail!("Unexpected tagged status {:?}", other),
                }
            }
            Response::Tagged { tag, .. } => {
                tracing::warn!(tag=%String::from_utf8_lossy(tag), "Response to a command we did not send");
                Step::Continue
            }
        };

        Ok(step)
    }

    async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    fn sasl_ir(&self) -> bool {
        self.has_capability("SASL-IR")
    }
}
