//! Interactive session over one hub connection.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

use harmony_hub_connection::{HubClient, HubEvent};

use crate::commands;

const HELP: &str = "\
commands:
  config                  print the hub configuration
  current                 print the running activity
  start <activity>        start an activity by label or id fragment
  send <device> <command> send one IR command
  sync                    sync the hub with the cloud
  off                     power off
  help                    show this text
  quit                    end the session";

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Config,
    Current,
    Start(String),
    Send { device_id: String, command: String },
    Sync,
    Off,
    Help,
    Quit,
}

fn parse(line: &str) -> Result<ReplCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(String::new());
    };
    let rest: Vec<&str> = words.collect();

    match (verb.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("config", []) => Ok(ReplCommand::Config),
        ("current", []) => Ok(ReplCommand::Current),
        ("start", []) => Err("usage: start <activity>".into()),
        ("start", words) => Ok(ReplCommand::Start(words.join(" "))),
        ("send", [device_id, command]) => Ok(ReplCommand::Send {
            device_id: (*device_id).to_string(),
            command: (*command).to_string(),
        }),
        ("send", _) => Err("usage: send <device> <command>".into()),
        ("sync", []) => Ok(ReplCommand::Sync),
        ("off", []) => Ok(ReplCommand::Off),
        ("help" | "?", _) => Ok(ReplCommand::Help),
        ("quit" | "exit", _) => Ok(ReplCommand::Quit),
        (other, _) => Err(format!("unknown command '{other}', try 'help'")),
    }
}

/// Reads commands from `input` until `quit` or end of input.
///
/// A failed command is printed and the session continues.
pub async fn run<R, W>(client: &HubClient, input: R, out: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    client.set_event_listener(Box::new(|event| match event {
        HubEvent::ActivityChanged {
            activity_id,
            status,
        } => info!(%activity_id, status, "activity changed"),
        HubEvent::Notification(msg) => info!(cmd = ?msg.cmd, "hub notification"),
    }));

    let mut lines = input.lines();
    loop {
        write!(out, "harmony> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        let command = match parse(&line) {
            Ok(command) => command,
            Err(usage) if usage.is_empty() => continue,
            Err(usage) => {
                writeln!(out, "{usage}")?;
                continue;
            }
        };

        let result = match command {
            ReplCommand::Config => commands::show_config(client, out).await,
            ReplCommand::Current => commands::show_current_activity(client, out).await,
            ReplCommand::Start(query) => commands::start_activity(client, &query, out).await,
            ReplCommand::Send { device_id, command } => client
                .send_command(&device_id, &command)
                .await
                .map_err(Into::into),
            ReplCommand::Sync => client.sync().await.map_err(Into::into),
            ReplCommand::Off => client.power_off().await.map_err(Into::into),
            ReplCommand::Help => writeln!(out, "{HELP}").map_err(Into::into),
            ReplCommand::Quit => break,
        };

        if let Err(e) = result {
            writeln!(out, "error: {e:#}")?;
        }
    }
    Ok(())
}
