//! mvpn: Terminal VPN Client
//!
//! Logs in through the browser, registers this machine's key and lets the
//! user pick a relay.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mvpn::{
    AppConfig, ConnectionToggle, Ready, Selection, Services, StartupError, load_relays, start,
};
use mvpn_api::{Device, RelayList};
use mvpn_device::{MAX_DEVICES, current_device};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "mvpn")]
#[command(about = "VPN client: browser login, device keys and relay selection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to <config_dir>/mvpn/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log in again through the browser if the stored session is rejected
    #[arg(long, global = true)]
    relogin: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and show the account
    Login,
    /// List the account's devices
    Devices,
    /// Browse relays: countries, cities of a country, or relays of a city
    Relays {
        #[arg(long)]
        country: Option<String>,
        #[arg(long, requires = "country")]
        city: Option<String>,
    },
    /// Select a relay and switch the connection on
    Connect {
        #[arg(long)]
        country: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        relay: String,
    },
    /// Forget the stored session
    Logout,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path)?;
    if cli.relogin {
        config.relogin_on_rejected_token = true;
    }

    let services = Services::from_config(&config)?;

    if let Command::Logout = cli.command {
        if mvpn_auth::logout(services.store.as_ref())? {
            println!("Logged out");
        } else {
            println!("Not logged in");
        }
        return Ok(());
    }

    // Ctrl-C aborts whatever is in flight: login, device upload or relay fetch.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted");
            on_interrupt.cancel();
        }
    });

    info!("mvpn {} starting", env!("CARGO_PKG_VERSION"));
    let ready = match start(&services, &config, &cancel).await {
        Ok(ready) => ready,
        Err(e) => {
            if let StartupError::Auth(auth) = &e {
                if auth.is_abandoned() {
                    warn!("Login was not completed in the browser; run the command again to retry");
                }
            }
            return Err(e).context("Startup failed");
        }
    };

    match cli.command {
        Command::Login => print_account(&ready),
        Command::Devices => print_devices(&ready, &services),
        Command::Relays { country, city } => {
            let list = relays(&services, &cancel).await?;
            print_relays(&list, country.as_deref(), city.as_deref())?;
        }
        Command::Connect {
            country,
            city,
            relay,
        } => {
            let list = relays(&services, &cancel).await?;

            let mut selection = Selection::new();
            selection.select_country(&list, &country)?;
            selection.select_city(&list, &city)?;
            selection.select_relay(&list, &relay)?;

            let mut toggle = ConnectionToggle::default();
            toggle.toggle();
            if let Some(relay) = selection.resolve(&list) {
                println!("Connected to {} ({})", relay.hostname, relay.ipv4_addr_in);
            }
        }
        // Handled before startup.
        Command::Logout => {}
    }

    Ok(())
}

async fn relays(services: &Services, cancel: &CancellationToken) -> Result<RelayList> {
    tokio::select! {
        list = load_relays(services.api.as_ref()) => Ok(list),
        _ = cancel.cancelled() => bail!("Interrupted"),
    }
}

fn print_account(ready: &Ready) {
    let user = &ready.session.user;
    let subscription = if user.has_active_subscription() {
        "active"
    } else {
        "inactive"
    };
    // The profile was fetched before a new device was added.
    let devices = user.devices.len() + usize::from(ready.device.is_new());

    println!("{} <{}>", user.display_name, user.email);
    println!("Subscription: {}", subscription);
    println!("Devices: {} of {}", devices, MAX_DEVICES);
    println!("This device: {}", ready.device.device().label());
}

fn print_device(device: &Device, current: bool) {
    println!(
        "{} {}  {}  {}",
        if current { "*" } else { " " },
        device.label(),
        device.ipv4_address,
        device
            .created_at
            .map(|t| t.date_naive().to_string())
            .unwrap_or_else(|| "-".to_string())
    );
}

fn print_devices(ready: &Ready, services: &Services) {
    let user = &ready.session.user;
    let current = current_device(user, services.store.as_ref()).map(|d| d.pubkey.as_str());

    for device in &user.devices {
        print_device(device, Some(device.pubkey.as_str()) == current);
    }
    if ready.device.is_new() {
        print_device(ready.device.device(), true);
    }
}

fn print_relays(list: &RelayList, country: Option<&str>, city: Option<&str>) -> Result<()> {
    let mut selection = Selection::new();

    let Some(country) = country else {
        for c in &list.countries {
            println!("{} ({})  {} cities", c.name, c.code, c.cities.len());
        }
        return Ok(());
    };
    selection.select_country(list, country)?;
    let Some(country) = list.country(country) else {
        return Ok(());
    };

    let Some(city) = city else {
        for c in &country.cities {
            println!("{} ({})  {} relays", c.name, c.code, c.relays.len());
        }
        return Ok(());
    };
    selection.select_city(list, city)?;
    let Some(city) = country.city(city) else {
        return Ok(());
    };

    for r in &city.relays {
        println!("{}  {}  {}  {}", r.hostname, r.ipv4_addr_in, r.ipv6_addr_in, r.public_key);
    }
    Ok(())
}
