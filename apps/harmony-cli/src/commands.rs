//! Subcommand implementations over a connected [`HubClient`].

use std::io::Write;

use anyhow::Context;
use serde::Serialize;

use harmony_hub_connection::HubClient;

use crate::cli::Command;
use crate::resolve::{Match, resolve};

/// Runs one non-interactive subcommand.
pub async fn run<W: Write>(command: &Command, client: &HubClient, out: &mut W) -> anyhow::Result<()> {
    match command {
        Command::ShowConfig => show_config(client, out).await,
        Command::ShowCurrentActivity => show_current_activity(client, out).await,
        Command::StartActivity { activity } => start_activity(client, activity, out).await,
        Command::SendCommand { device_id, command } => client
            .send_command(device_id, command)
            .await
            .with_context(|| format!("sending {command} to device {device_id}")),
        Command::Sync => client.sync().await.context("syncing hub"),
        Command::PowerOff => client.power_off().await.context("powering off"),
        Command::Repl => anyhow::bail!("repl is not a one-shot command"),
    }
}

pub(crate) fn print_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub async fn show_config<W: Write>(client: &HubClient, out: &mut W) -> anyhow::Result<()> {
    let config = client.get_config().await.context("fetching configuration")?;
    print_json(out, &config)
}

pub async fn show_current_activity<W: Write>(
    client: &HubClient,
    out: &mut W,
) -> anyhow::Result<()> {
    let config = client.get_config().await.context("fetching configuration")?;
    let current = client
        .get_current_activity()
        .await
        .context("fetching current activity")?;
    let activity = config
        .activity(&current)
        .with_context(|| format!("current activity {current} is not in the configuration"))?;
    print_json(out, activity)
}

/// Starts the activity matching `query`. Ambiguous or unmatched queries
/// are reported and start nothing.
pub async fn start_activity<W: Write>(
    client: &HubClient,
    query: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    let config = client.get_config().await.context("fetching configuration")?;
    match resolve(&config.activities, query) {
        Match::Unique(activity) => {
            writeln!(
                out,
                "Found activity named {} (id {})",
                activity.label, activity.id
            )?;
            client
                .start_activity(&activity.id)
                .await
                .with_context(|| format!("starting activity {}", activity.id))?;
        }
        Match::Ambiguous(candidates) => {
            let labels: Vec<&str> = candidates.iter().map(|a| a.label.as_str()).collect();
            writeln!(out, "found too many! {}", labels.join(" "))?;
        }
        Match::None => writeln!(out, "no activity matches '{query}'")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmony_hub_connection::{ClientConfig, SessionToken};
    use harmony_hub_sim::{HubSimulator, SimConfig};
    use harmony_protocol::MessageType;
    use std::sync::Arc;

    async fn setup() -> (Arc<HubSimulator>, HubClient) {
        let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
        let token = SessionToken::new(sim.issue_session_token().await);
        let client = HubClient::connect(sim.address(), &token, ClientConfig::default())
            .await
            .unwrap();
        (sim, client)
    }

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn show_config_prints_json() {
        let (_sim, client) = setup().await;
        let mut out = Vec::new();
        run(&Command::ShowConfig, &client, &mut out).await.unwrap();

        let printed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed["activity"][1]["label"], "Watch TV");
    }

    #[tokio::test]
    async fn show_current_activity_prints_block() {
        let (sim, client) = setup().await;
        client.start_activity("2").await.unwrap();
        assert_eq!(sim.current_activity().await, "2");

        let mut out = Vec::new();
        run(&Command::ShowCurrentActivity, &client, &mut out)
            .await
            .unwrap();
        let printed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed["id"], "2");
        assert_eq!(printed["label"], "Listen to Music");
    }

    #[tokio::test]
    async fn start_activity_by_fragment() {
        let (sim, client) = setup().await;
        let mut out = Vec::new();
        let cmd = Command::StartActivity {
            activity: "music".into(),
        };
        run(&cmd, &client, &mut out).await.unwrap();

        assert!(text(out).contains("Listen to Music (id 2)"));
        assert_eq!(sim.current_activity().await, "2");
    }

    #[tokio::test]
    async fn ambiguous_activity_starts_nothing() {
        let (sim, client) = setup().await;
        let mut out = Vec::new();
        let cmd = Command::StartActivity {
            activity: "o".into(),
        };
        run(&cmd, &client, &mut out).await.unwrap();

        assert!(text(out).starts_with("found too many!"));
        assert!(sim.received_of(MessageType::StartActivity).await.is_empty());
    }

    #[tokio::test]
    async fn power_off_and_sync() {
        let (sim, client) = setup().await;
        client.start_activity("1").await.unwrap();

        let mut out = Vec::new();
        run(&Command::PowerOff, &client, &mut out).await.unwrap();
        run(&Command::Sync, &client, &mut out).await.unwrap();
        assert_eq!(sim.current_activity().await, "-1");
        assert_eq!(sim.received_of(MessageType::Sync).await.len(), 1);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn send_command_error_has_context() {
        let (_sim, client) = setup().await;
        let mut out = Vec::new();
        let cmd = Command::SendCommand {
            device_id: "999".into(),
            command: "Mute".into(),
        };
        let err = run(&cmd, &client, &mut out).await.unwrap_err();
        assert!(format!("{err:#}").contains("device 999"));
    }
}
