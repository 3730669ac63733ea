//! Operator client for poking a running warden.
//!
//! Sends one protocol message and, for the commands that get one, prints
//! the warden's reply. Useful for checking whether a warden is active,
//! triggering it by hand, and exercising it from scripts.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time;

use wake_warden::protocol::{Message, MAX_DATAGRAM_LEN};
use wake_warden::ClientId;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Probe,
    Trigger,
    Hello(ClientId),
    Heartbeat(Option<ClientId>),
    Kill(Option<ClientId>),
}

#[derive(Debug)]
struct CtlArgs {
    addr: SocketAddr,
    timeout: Duration,
    command: Option<Command>,
    help: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args_from(std::env::args_os())?;

    if args.help {
        print_help();
        return Ok(());
    }

    let Some(command) = args.command else {
        print_help();
        return Err("missing command".into());
    };

    let message = match command {
        Command::Probe => Message::Probe,
        Command::Trigger => Message::Trigger,
        Command::Hello(id) => Message::Hello(id),
        Command::Heartbeat(Some(id)) => Message::Heartbeat(id),
        Command::Heartbeat(None) => Message::LegacyHeartbeat,
        Command::Kill(Some(id)) => Message::Kill(id),
        Command::Kill(None) => Message::LegacyKill,
    };
    // Only these three get a reply; heartbeats and kills are silent.
    let expects_reply = matches!(
        message,
        Message::Probe | Message::Trigger | Message::Hello(_)
    );

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.send_to(&message.encode(), args.addr).await?;

    if expects_reply {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        match time::timeout(args.timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => println!("{}", String::from_utf8_lossy(&buf[..len])),
            Ok(Err(error)) => return Err(error.into()),
            Err(_) => {
                return Err(format!(
                    "no reply from {} within {}s",
                    args.addr,
                    args.timeout.as_secs()
                )
                .into())
            }
        }
    }

    Ok(())
}

fn parse_args_from<I>(args: I) -> Result<CtlArgs, CtlError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut addr: SocketAddr = "127.0.0.1:46317".parse().unwrap();
    let mut timeout = Duration::from_secs(2);
    let mut positionals: Vec<String> = Vec::new();
    let mut help = false;

    let mut parser = lexopt::Parser::from_iter(args);
    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                help = true;
            }
            Short('a') | Long("addr") => {
                let value: String = parser.value()?.parse()?;
                addr = value
                    .parse()
                    .map_err(|_| CtlError::InvalidValue("addr", value))?;
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                let secs: u64 = value
                    .parse()
                    .map_err(|_| CtlError::InvalidValue("timeout", value))?;
                timeout = Duration::from_secs(secs);
            }
            Value(val) => {
                positionals.push(val.to_string_lossy().into());
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    let command = if positionals.is_empty() {
        None
    } else {
        Some(build_command(&positionals)?)
    };

    Ok(CtlArgs {
        addr,
        timeout,
        command,
        help,
    })
}

fn build_command(positionals: &[String]) -> Result<Command, CtlError> {
    if positionals.len() > 2 {
        return Err(CtlError::TooManyArguments);
    }
    let name = positionals[0].as_str();
    let id = positionals.get(1).map(|s| ClientId::new(s.as_str()));

    match name {
        "probe" => no_id(name, id).map(|_| Command::Probe),
        "trigger" => no_id(name, id).map(|_| Command::Trigger),
        "hello" => require_id(name, id).map(Command::Hello),
        "heartbeat" => Ok(Command::Heartbeat(id)),
        "kill" => Ok(Command::Kill(id)),
        other => Err(CtlError::UnknownCommand(other.to_string())),
    }
}

fn require_id(name: &'static str, id: Option<ClientId>) -> Result<ClientId, CtlError> {
    id.ok_or(CtlError::MissingClientId(name))
}

fn no_id(name: &'static str, id: Option<ClientId>) -> Result<(), CtlError> {
    match id {
        None => Ok(()),
        Some(_) => Err(CtlError::UnexpectedClientId(name)),
    }
}

fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"wardenctl {version}
Operator client for a running wake-warden

USAGE:
    wardenctl [OPTIONS] <COMMAND> [CLIENT_ID]

COMMANDS:
    probe               Ask whether the warden is active (AYA)
    trigger             Start the active phase (START_HEARTBEAT)
    hello <id>          Announce a client (HELLO|<id>)
    heartbeat [id]      Send one liveness signal; no id sends the legacy form
    kill [id]           Remove one client, or force-terminate with no id

OPTIONS:
    -a, --addr <ADDR>     Warden address [default: 127.0.0.1:46317]
    -t, --timeout <SECS>  How long to wait for a reply [default: 2]
    -h, --help            Print help

EXAMPLES:
    # Is anything active on the default port?
    wardenctl probe

    # Wake the warden on another host
    wardenctl -a 10.8.0.1:46317 trigger

    # Keep a session alive from a cron job
    wardenctl -a 10.8.0.1:46317 heartbeat nas-01
"#
    );
}

/// Argument parsing errors.
#[derive(Debug)]
enum CtlError {
    Lexopt(lexopt::Error),
    InvalidValue(&'static str, String),
    UnknownCommand(String),
    MissingClientId(&'static str),
    UnexpectedClientId(&'static str),
    TooManyArguments,
}

impl std::fmt::Display for CtlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnknownCommand(name) => write!(f, "unknown command: '{}'", name),
            Self::MissingClientId(name) => write!(f, "'{}' needs a client id", name),
            Self::UnexpectedClientId(name) => write!(f, "'{}' takes no client id", name),
            Self::TooManyArguments => write!(f, "too many arguments"),
        }
    }
}

impl std::error::Error for CtlError {}

impl From<lexopt::Error> for CtlError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
