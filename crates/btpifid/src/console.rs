//! Interactive client for the in-process bus
//!
//! Reads one GATT operation per line from stdin and runs it against the
//! running application, the way a remote client would.

use anyhow::{anyhow, bail, Context, Result};
use btpifi::transport::BusEvent;
use btpifi::{Application, LocalBus, MethodCall, ObjectPath, Reply, WifiProvider};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "\
commands:
  read <path> [offset]     ReadValue
  write <path> <text>      WriteValue with the UTF-8 bytes of <text>
  notify <path> on|off     StartNotify / StopNotify
  objects                  GetManagedObjects as JSON
  events                   bus events so far
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Read { path: ObjectPath, offset: usize },
    Write { path: ObjectPath, text: String },
    Notify { path: ObjectPath, enable: bool },
    Objects,
    Events,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim_start();
        match verb {
            "read" => {
                let mut parts = rest.split_whitespace();
                let path = parse_path(parts.next())?;
                let offset = match parts.next() {
                    Some(offset) => offset.parse().context("offset must be a number")?,
                    None => 0,
                };
                Ok(ConsoleCommand::Read { path, offset })
            }
            "write" => {
                let (path, text) = rest.split_once(' ').unwrap_or((rest, ""));
                Ok(ConsoleCommand::Write {
                    path: parse_path(Some(path))?,
                    text: text.to_string(),
                })
            }
            "notify" => {
                let mut parts = rest.split_whitespace();
                let path = parse_path(parts.next())?;
                let enable = match parts.next() {
                    Some("on") => true,
                    Some("off") => false,
                    _ => bail!("usage: notify <path> on|off"),
                };
                Ok(ConsoleCommand::Notify { path, enable })
            }
            "objects" => Ok(ConsoleCommand::Objects),
            "events" => Ok(ConsoleCommand::Events),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(anyhow!("unknown command {:?}, try `help`", other)),
        }
    }
}

fn parse_path(path: Option<&str>) -> Result<ObjectPath> {
    let path = path.filter(|p| !p.is_empty()).context("missing object path")?;
    ObjectPath::new(path).map_err(|e| anyhow!(e))
}

fn describe(reply: Reply) -> Result<String> {
    Ok(match reply {
        Reply::Empty => "ok".to_string(),
        Reply::Value(value) => match String::from_utf8(value) {
            Ok(text) => format!("{:?}", text),
            Err(e) => format!("0x{}", hex::encode(e.into_bytes())),
        },
        Reply::Property(value) => serde_json::to_string(&value)?,
        Reply::Properties(bag) => serde_json::to_string_pretty(&bag)?,
        Reply::ManagedObjects(objects) => serde_json::to_string_pretty(&objects)?,
    })
}

fn describe_event(event: &BusEvent) -> String {
    match event {
        BusEvent::PropertiesChanged { path, changed } => format!(
            "{} changed {}",
            path,
            serde_json::to_string(changed).unwrap_or_default()
        ),
        other => format!("{:?}", other),
    }
}

/// Run one console command; returns false when the console should exit
pub fn execute<P: WifiProvider>(
    app: &Application<LocalBus, P>,
    command: ConsoleCommand,
) -> Result<bool> {
    let call = match command {
        ConsoleCommand::Read { path, offset } => Some((path, MethodCall::ReadValue { offset })),
        ConsoleCommand::Write { path, text } => Some((
            path,
            MethodCall::WriteValue {
                offset: 0,
                value: text.into_bytes(),
            },
        )),
        ConsoleCommand::Notify { path, enable } => Some((
            path,
            if enable {
                MethodCall::StartNotify
            } else {
                MethodCall::StopNotify
            },
        )),
        ConsoleCommand::Objects => {
            Some((app.peripheral().manager.root().clone(), MethodCall::GetManagedObjects))
        }
        ConsoleCommand::Events => {
            for event in app.bus().events() {
                println!("{}", describe_event(&event));
            }
            None
        }
        ConsoleCommand::Help => {
            println!("{}", HELP);
            None
        }
        ConsoleCommand::Quit => return Ok(false),
    };

    if let Some((path, call)) = call {
        match app.dispatch(&path, call) {
            Ok(reply) => println!("{}", describe(reply)?),
            Err(e) => println!("error {}: {}", e.error_name(), e),
        }
    }
    Ok(true)
}

/// Read commands from stdin until `quit`, EOF or Ctrl-C
pub async fn run<P: WifiProvider>(app: &Application<LocalBus, P>) -> Result<()> {
    let mut events = app.bus().subscribe();
    let mut events_closed = false;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match ConsoleCommand::parse(&line) {
                    Ok(command) => {
                        if !execute(app, command)? {
                            break;
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            event = events.recv(), if !events_closed => match event {
                Ok(event @ BusEvent::PropertiesChanged { .. }) => {
                    println!("* {}", describe_event(&event));
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => events_closed = true,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
