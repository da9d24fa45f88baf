//! CLI Command Handlers
//!
//! Implements all CLI commands on top of `DeviceClient`.
//! Each handler takes the resolved config and Output, returns ExitCode.

use anyhow::Result;

use openwebif::cli::{
    Cli, Command, CommandOutcome, ExitCode, MessageCmd, Output, PowerAction, SourcesCmd, ZapCmd,
};
use openwebif::config::Config;
use openwebif::{DeviceClient, OpenWebIfError};

/// Settings from the config file, then the environment, then flags
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    let mut config = config.with_env();

    if let Some(host) = &cli.host {
        config.host = Some(host.clone());
    }
    if let Some(port) = cli.port {
        config.port = Some(port);
    }
    if let Some(user) = &cli.user {
        config.username = Some(user.clone());
    }
    if let Some(password) = &cli.password {
        config.password = Some(password.clone());
    }
    if cli.https {
        config.use_https = true;
    }

    Ok(config)
}

pub async fn run(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::ConfigError),
    };

    match cli.command {
        Command::Status => status_cmd(&config, &output).await,
        Command::About => about_cmd(&config, &output).await,
        Command::Bouquets => bouquets_cmd(&config, &output).await,
        Command::Sources(cmd) => sources_cmd(cmd, &config, &output).await,
        Command::Zap(cmd) => zap_cmd(cmd, &config, &output).await,
        Command::Volume(cmd) => {
            with_client(&config, &output, "volume", |mut client| async move {
                client.set_volume(cmd.level).await
            })
            .await
        }
        Command::Mute => {
            with_client(&config, &output, "mute", |mut client| async move {
                client.toggle_mute().await
            })
            .await
        }
        Command::Up => {
            with_client(&config, &output, "up", |mut client| async move {
                client.channel_up().await
            })
            .await
        }
        Command::Down => {
            with_client(&config, &output, "down", |mut client| async move {
                client.channel_down().await
            })
            .await
        }
        Command::PlayPause => {
            with_client(&config, &output, "play-pause", |mut client| async move {
                client.toggle_play_pause().await
            })
            .await
        }
        Command::Stop => {
            with_client(&config, &output, "stop", |mut client| async move {
                client.stop().await
            })
            .await
        }
        Command::Power(cmd) => power_cmd(cmd.action, &config, &output).await,
        Command::Wake => wake_cmd(&config, &output).await,
        Command::Message(cmd) => message_cmd(cmd, &config, &output).await,
        Command::Picon => picon_cmd(&config, &output).await,
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn fail(output: &Output, context: &str, err: OpenWebIfError) -> ExitCode {
    output.error(format!("{}: {}", context, err), ExitCode::from(&err))
}

fn open(config: &Config, output: &Output) -> std::result::Result<DeviceClient, ExitCode> {
    DeviceClient::new(config.to_options()).map_err(|e| fail(output, "Invalid configuration", e))
}

async fn connect(config: &Config, output: &Output) -> std::result::Result<DeviceClient, ExitCode> {
    DeviceClient::connect(config.to_options())
        .await
        .map_err(|e| fail(output, "Cannot connect", e))
}

fn report_command(
    output: &Output,
    command: &str,
    result: std::result::Result<bool, OpenWebIfError>,
) -> ExitCode {
    match result {
        Ok(accepted) => {
            let outcome = CommandOutcome {
                command: command.to_string(),
                accepted,
            };
            if let Err(e) = output.print_display(&outcome) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            if accepted {
                ExitCode::Success
            } else {
                ExitCode::CommandFailed
            }
        }
        Err(e) => fail(output, command, e),
    }
}

/// Run a single command against a freshly opened client
async fn with_client<F, Fut>(config: &Config, output: &Output, command: &str, f: F) -> ExitCode
where
    F: FnOnce(DeviceClient) -> Fut,
    Fut: std::future::Future<Output = std::result::Result<bool, OpenWebIfError>>,
{
    let client = match open(config, output) {
        Ok(client) => client,
        Err(code) => return code,
    };

    report_command(output, command, f(client).await)
}

// =============================================================================
// Status Commands
// =============================================================================

pub async fn status_cmd(config: &Config, output: &Output) -> ExitCode {
    let mut client = match open(config, output) {
        Ok(client) => client,
        Err(code) => return code,
    };

    if let Err(e) = client.refresh_state().await {
        return fail(output, "Status request failed", e);
    }

    if let Err(e) = output.print_display(client.state()) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

pub async fn about_cmd(config: &Config, output: &Output) -> ExitCode {
    let mut client = match open(config, output) {
        Ok(client) => client,
        Err(code) => return code,
    };

    match client.get_about().await {
        Ok(Some(info)) => {
            if let Err(e) = output.print_display(&info) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Ok(None) if client.is_offline() => {
            output.error("Receiver is unreachable", ExitCode::NetworkError)
        }
        Ok(None) => output.error("Receiver returned no device info", ExitCode::Error),
        Err(e) => fail(output, "About request failed", e),
    }
}

pub async fn picon_cmd(config: &Config, output: &Output) -> ExitCode {
    let mut client = match open(config, output) {
        Ok(client) => client,
        Err(code) => return code,
    };

    if let Err(e) = client.refresh_state().await {
        return fail(output, "Status request failed", e);
    }

    match client.state().picon_url.clone() {
        Some(url) => {
            if let Err(e) = output.print_display(url) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        None if client.is_offline() => {
            output.error("Receiver is unreachable", ExitCode::NetworkError)
        }
        None => output.error("No picon available", ExitCode::CommandFailed),
    }
}

// =============================================================================
// Channel Commands
// =============================================================================

pub async fn bouquets_cmd(config: &Config, output: &Output) -> ExitCode {
    let mut client = match open(config, output) {
        Ok(client) => client,
        Err(code) => return code,
    };

    match client.get_all_bouquets().await {
        Ok(bouquets) => {
            if let Err(e) = output.print(&bouquets) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => fail(output, "Bouquet listing failed", e),
    }
}

pub async fn sources_cmd(cmd: SourcesCmd, config: &Config, output: &Output) -> ExitCode {
    let mut client = match open(config, output) {
        Ok(client) => client,
        Err(code) => return code,
    };

    let result = match cmd.bouquet.as_deref() {
        Some(bouquet) => client.get_bouquet_sources(Some(bouquet)).await,
        None => client.load_sources().await.map(|sources| sources.clone()),
    };

    match result {
        Ok(sources) => {
            if let Err(e) = output.print(&sources) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => fail(output, "Source listing failed", e),
    }
}

pub async fn zap_cmd(cmd: ZapCmd, config: &Config, output: &Output) -> ExitCode {
    if cmd.is_service_ref() {
        let mut client = match open(config, output) {
            Ok(client) => client,
            Err(code) => return code,
        };
        let result = client.select_source(&cmd.target).await;
        return report_command(output, "zap", result);
    }

    // Names are resolved through the source list, which connect() loads
    let mut client = match connect(config, output).await {
        Ok(client) => client,
        Err(code) => return code,
    };
    output.info(format!("Switching to: {}", cmd.target));

    let result = client.select_source_by_name(&cmd.target).await;
    report_command(output, "zap", result)
}

pub async fn message_cmd(cmd: MessageCmd, config: &Config, output: &Output) -> ExitCode {
    let mut client = match open(config, output) {
        Ok(client) => client,
        Err(code) => return code,
    };

    let result = client
        .send_message(&cmd.text, cmd.level.into(), cmd.timeout)
        .await;
    report_command(output, "message", result)
}

// =============================================================================
// Power Commands
// =============================================================================

pub async fn power_cmd(action: PowerAction, config: &Config, output: &Output) -> ExitCode {
    let mut client = match open(config, output) {
        Ok(client) => client,
        Err(code) => return code,
    };

    let result = match action {
        PowerAction::On => {
            // Learn whether the box is reachable so turn_on knows to send Wake-on-LAN
            if let Err(e) = client.refresh_state().await {
                return fail(output, "Status request failed", e);
            }
            client.turn_on().await
        }
        PowerAction::Off => client.turn_off().await,
        other => match other.power_state() {
            Some(state) => client.set_power_state(state).await,
            None => return output.error("Unsupported power action", ExitCode::InvalidArgs),
        },
    };

    report_command(output, "power", result)
}

pub async fn wake_cmd(config: &Config, output: &Output) -> ExitCode {
    let mut client = match open(config, output) {
        Ok(client) => client,
        Err(code) => return code,
    };

    if client.mac_address().is_none() {
        // Only works while the box is still up, e.g. in standby
        let _ = client.get_about().await;
    }

    match client.wake_up() {
        Ok(true) => report_command(output, "wake", Ok(true)),
        Ok(false) => output.error(
            "MAC address unknown; set mac_address in the config file",
            ExitCode::ConfigError,
        ),
        Err(e) => fail(output, "wake", e),
    }
}
