mod config;
mod login;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpStream;

use aero_buffer::Buffer;
use aero_proto::imap::{response::Status, ImapClient};
use aero_sasl::encode::{Encode, PlainMessage, AUTHENTICATE_PLAIN};
use aero_sasl::flow::authenticate_plain;
use aero_sasl::types::AuthRes;

use config::*;
use login::*;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    #[clap(
        short,
        long,
        env = "AERO_LOGIN_CONFIG",
        default_value = "aero-login.toml"
    )]
    /// Path to the configuration file
    config_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the configured IMAP server and log in with SASL PLAIN
    Authenticate {
        #[clap(env = "AERO_PASSWORD")]
        maybe_password: Option<String>,
    },

    #[clap(subcommand)]
    /// Specific tooling, for debug & experimentation only
    Tools(ToolsCommand),
}

#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// Print the AUTHENTICATE PLAIN command line sent to SASL-IR servers
    PlainMessage {
        user: String,

        #[clap(env = "AERO_PASSWORD")]
        maybe_password: Option<String>,
    },
}

fn tracer() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var(
            "RUST_LOG",
            "main=info,aero_login=info,aero_proto=info,aero_sasl=info",
        )
    }

    // Abort on panic (same behavior as in Go)
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{}", panic_info);
        eprintln!("{:?}", backtrace::Backtrace::new());
        std::process::abort();
    }));

    tracer();

    let args = Args::parse();
    match args.command {
        Command::Authenticate { maybe_password } => {
            let config: Config = read_config(args.config_file.clone()).context(format!(
                "'{:?}' must be an aero-login configuration file",
                args.config_file
            ))?;
            authenticate(config, maybe_password).await?;
        }
        Command::Tools(ToolsCommand::PlainMessage {
            user,
            maybe_password,
        }) => {
            let password = match maybe_password {
                Some(pwd) => pwd,
                None => rpassword::prompt_password("Enter password: ")?,
            };

            let mut out = Buffer::new();
            PlainMessage {
                command: AUTHENTICATE_PLAIN,
                authz: &user,
                authc: &user,
                password: &password,
            }
            .encode(&mut out)?;
            println!("{}", out.as_str()?);
        }
    }

    Ok(())
}

async fn authenticate(config: Config, maybe_password: Option<String>) -> Result<()> {
    let addr = config.imap.address.clone();
    let timeout = Duration::from_secs(config.imap.connect_timeout_secs);

    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr.as_str()))
        .await
        .with_context(|| format!("connection to {} timed out", addr))?
        .with_context(|| format!("unable to connect to {}", addr))?;
    tracing::info!(addr = %addr, "Connected");

    let mut client = ImapClient::new(stream);
    if client.greeting().await? == Status::Preauth {
        tracing::warn!("Connection is already authenticated, nothing to do");
        return Ok(());
    }
    if client.capabilities().is_empty() {
        client.capability().await?;
    }
    if !client.has_capability("AUTH=PLAIN") {
        tracing::warn!("Server does not advertise AUTH=PLAIN, trying anyway");
    }

    let mut account = ConfigAccount::new(config.account, maybe_password);
    let mut notifier = ConsoleNotifier::default();
    match authenticate_plain(&mut client, &mut account, &mut notifier).await {
        AuthRes::Success => {
            tracing::info!("Authenticated");
            client.logout().await?;
            Ok(())
        }
        AuthRes::Failed => bail!("Authentication failed"),
        AuthRes::Unavailable => bail!("SASL PLAIN is not available on this server"),
    }
}
