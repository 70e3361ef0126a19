use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::runtime::Handle;

use mail_relay::auth::secret_store::{self, Secret};
use mail_relay::bot::client::TelegramClient;
use mail_relay::config::{Settings, load_config, resolve_bot_token};
use mail_relay::daemon::Poller;
use mail_relay::mail::ImapMailAccessor;
use mail_relay::mail::imap_client::ImapClient;
use mail_relay::relay::router::InteractionRouter;
use mail_relay::relay::{RelayState, Services};
use mail_relay::store::SqliteUserStore;
use mail_relay::webhook::WebhookServer;

const ADMIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "mail_relay")]
#[command(about = "Relay an IMAP mailbox to Telegram chats", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the poller and the webhook server
    Serve,

    /// Run a single poll cycle and exit
    Check,

    /// Store a secret in the OS keyring (value read from stdin)
    SetSecret {
        #[arg(long, value_enum)]
        name: Secret,
    },

    /// List chats that recently wrote to the bot
    Chats,

    /// Register the public URL Telegram should push updates to
    SetWebhook {
        #[arg(long)]
        url: String,
    },
}

fn services(settings: &Settings) -> Result<Services> {
    let imap = ImapClient::new(
        settings.imap_server.clone(),
        settings.imap_port,
        settings.user_email.clone(),
        settings.mail_password.clone(),
        settings.timeout,
    );
    let telegram = TelegramClient::new(&settings.bot_token, settings.timeout)?;
    let users = SqliteUserStore::open(&settings.db_path, settings.access_password.clone())?;

    Ok(Services {
        mail: Arc::new(ImapMailAccessor::new(imap, settings.timeout)),
        delivery: Arc::new(telegram),
        users: Arc::new(users),
    })
}

fn load_settings() -> Result<Settings> {
    let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
    Settings::resolve(&cfg, secret_store::load_secret)
}

fn admin_client() -> Result<TelegramClient> {
    let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
    let token = resolve_bot_token(&cfg, secret_store::load_secret)?;
    Ok(TelegramClient::new(&token, ADMIN_TIMEOUT)?)
}

async fn serve(settings: Settings) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r2 = running.clone();
    ctrlc::set_handler(move || {
        r2.store(false, Ordering::SeqCst);
    })?;

    let services = services(&settings)?;
    let relay = settings.relay_settings();
    info!(
        "relaying {}@{} to {} allowed chat(s)",
        settings.user_email,
        settings.imap_server,
        relay.allowed_chats.len()
    );

    match services.users.registered_users() {
        Ok(users) => info!("{} chat(s) registered", users.len()),
        Err(e) => warn!("could not list registered chats: {e}"),
    }

    let state = Arc::new(RelayState::new());
    let poller = Arc::new(Poller::new(
        Arc::clone(&state),
        services.clone(),
        relay.clone(),
        settings.poll_interval,
    ));
    let router = Arc::new(InteractionRouter::new(state, services, relay));
    let server = WebhookServer::new(
        router,
        Arc::clone(&poller),
        settings.cron_secret.clone(),
        Handle::current(),
    );

    let poll_running = running.clone();
    let poll_task = tokio::spawn(async move { poller.run(poll_running).await });

    let addr = settings.listen_addr.clone();
    let http_running = running.clone();
    let served = tokio::task::spawn_blocking(move || server.serve(&addr, http_running)).await?;

    // a bind failure must stop the poller too
    running.store(false, Ordering::SeqCst);
    poll_task.await?;
    served
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetSecret { name } => {
            eprintln!("Paste secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::stdin().read_to_string(&mut secret)?;
            let secret = secret.trim();
            if secret.is_empty() {
                return Err(anyhow!("empty secret, nothing stored"));
            }
            secret_store::save_secret(name, secret)?;
            println!("Saved {name:?} in the keyring");
            Ok(())
        }

        Command::Chats => {
            let client = admin_client()?;
            let me = client.get_me().await?;
            let updates = client.get_updates().await?;

            let mut chats = BTreeMap::new();
            for event in updates.into_iter().filter_map(|u| u.into_event()) {
                chats.insert(event.chat.to_string(), event.profile.name);
            }
            if chats.is_empty() {
                let bot = me.username.unwrap_or(me.first_name);
                println!("No recent chats. Send a message to @{bot} first.");
                return Ok(());
            }
            for (chat, name) in chats {
                println!("{chat}\t{name}");
            }
            Ok(())
        }

        Command::SetWebhook { url } => {
            let client = admin_client()?;
            client.set_webhook(&url).await?;
            println!("Webhook set to {url}");
            Ok(())
        }

        Command::Check => {
            let settings = load_settings()?;
            let services = services(&settings)?;
            let poller = Poller::new(
                Arc::new(RelayState::new()),
                services,
                settings.relay_settings(),
                settings.poll_interval,
            );
            let report = poller.poll_once().await?;
            // queues live in memory, so send the backlog before exiting
            let sent = poller.flush().await;
            println!(
                "{} new message(s) for {} chat(s), {} more sent from the queue",
                report.new_messages, report.recipients, sent
            );
            Ok(())
        }

        Command::Serve => serve(load_settings()?).await,
    }
}
