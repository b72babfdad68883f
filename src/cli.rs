use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

const USAGE: &str = "usage: hush [--config <path>] <resolve|register|deliver|prune>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Pressure input on stdin, urgency resolution on stdout.
    Resolve,
    /// Device registration on stdin; the raw token is sealed, never echoed.
    Register,
    /// Delivery request on stdin, receipt on stdout.
    Deliver,
    Prune,
}

impl Command {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "resolve" => Some(Self::Resolve),
            "register" => Some(Self::Register),
            "deliver" => Some(Self::Deliver),
            "prune" => Some(Self::Prune),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: PathBuf,
    pub command: Command,
}

pub fn invocation_from_args() -> Result<Invocation> {
    parse_args(env::args().skip(1))
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Invocation> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut command = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --config"))?;
                config_path = Some(PathBuf::from(value));
            }
            other => match (Command::parse(other), command) {
                (Some(parsed), None) => command = Some(parsed),
                (Some(_), Some(_)) => return Err(anyhow!("expected one command. {USAGE}")),
                (None, _) => return Err(anyhow!("unknown argument: {other}. {USAGE}")),
            },
        }
    }

    Ok(Invocation {
        config_path: config_path.unwrap_or_else(|| PathBuf::from("./hush.jsonc")),
        command: command.ok_or_else(|| anyhow!("missing command. {USAGE}"))?,
    })
}
