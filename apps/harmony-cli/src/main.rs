//! `harmony` command-line entry point.

mod cli;
mod commands;
mod config;
mod repl;
mod resolve;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use harmony_hub_connection::{ClientConfig, Credential, Exchanger, ExchangerConfig, HubClient};
use harmony_protocol::HubAddress;

use crate::cli::{Cli, Command};
use crate::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let level = cli.loglevel.or(settings.loglevel).unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_directive())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting harmony");

    let address = hub_address(&cli, &settings)?;
    let exchanger = Exchanger::new(exchanger_config(&settings)).context("building HTTP client")?;
    let credential = Credential::new(cli.email.clone(), cli.password.clone());

    let client = HubClient::login(&credential, address.clone(), &exchanger, client_config(&cli, &settings))
        .await
        .with_context(|| format!("connecting to hub at {address}"))?;

    let mut stdout = std::io::stdout().lock();
    let result = match &cli.command {
        Command::Repl => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            repl::run(&client, stdin, &mut stdout).await
        }
        command => commands::run(command, &client, &mut stdout).await,
    };

    client.disconnect(true).await;
    result
}

/// Resolves the hub address from flags, then the settings file.
fn hub_address(cli: &Cli, settings: &Settings) -> anyhow::Result<HubAddress> {
    let host = cli
        .harmony_ip
        .as_deref()
        .or(settings.harmony_ip.as_deref())
        .context("no hub address: pass --harmony-ip or set harmony_ip in the settings file")?;
    let mut address: HubAddress = host
        .parse()
        .with_context(|| format!("invalid hub address '{host}'"))?;
    if let Some(port) = cli.harmony_port.or(settings.harmony_port) {
        address.port = port;
    }
    Ok(address)
}

fn exchanger_config(settings: &Settings) -> ExchangerConfig {
    let mut config = ExchangerConfig::default();
    if let Some(url) = &settings.identity_url {
        config.identity_url = url.clone();
    }
    config
}

fn client_config(cli: &Cli, settings: &Settings) -> ClientConfig {
    let mut config = ClientConfig::default();
    if let Some(secs) = cli.timeout.or(settings.timeout_secs) {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = settings.connect_timeout_secs {
        config.connect_timeout = Duration::from_secs(secs);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmony_protocol::constants::DEFAULT_HUB_PORT;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["harmony", "--email", "a@b.c", "--password", "pw"];
        full.extend_from_slice(args);
        full.push("sync");
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn address_from_flags() {
        let address = hub_address(&cli(&["--harmony-ip", "10.0.0.5"]), &Settings::default()).unwrap();
        assert_eq!(address, HubAddress::new("10.0.0.5", DEFAULT_HUB_PORT));

        let address = hub_address(
            &cli(&["--harmony-ip", "10.0.0.5", "--harmony-port", "6000"]),
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(address.port, 6000);
    }

    #[test]
    fn flags_override_settings() {
        let settings = Settings {
            harmony_ip: Some("hub.local:7000".into()),
            harmony_port: None,
            timeout_secs: Some(5),
            ..Settings::default()
        };

        let address = hub_address(&cli(&[]), &settings).unwrap();
        assert_eq!(address, HubAddress::new("hub.local", 7000));

        let address = hub_address(&cli(&["--harmony-ip", "10.0.0.9"]), &settings).unwrap();
        assert_eq!(address.host, "10.0.0.9");

        assert_eq!(client_config(&cli(&[]), &settings).request_timeout, Duration::from_secs(5));
        assert_eq!(
            client_config(&cli(&["--timeout", "2"]), &settings).request_timeout,
            Duration::from_secs(2)
        );
    }

    #[test]
    fn missing_address_is_an_error() {
        let err = hub_address(&cli(&[]), &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("--harmony-ip"));
    }

    #[test]
    fn identity_url_override() {
        let settings = Settings {
            identity_url: Some("http://127.0.0.1:9/login".into()),
            ..Settings::default()
        };
        assert_eq!(exchanger_config(&settings).identity_url, "http://127.0.0.1:9/login");
        assert_ne!(exchanger_config(&Settings::default()).identity_url, "");
    }
}
