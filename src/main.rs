// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (database, credential API)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands, event handlers, and background tasks

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::mutes::MuteService;
use crate::core::relay::RelayService;
use crate::core::verification::VerificationService;
use crate::discord::commands::mutes::MUTED_ROLE_NAME;
use crate::discord::commands::presence;
use crate::discord::events;
use crate::discord::{Data, Error};
use crate::infra::auth::PortalAuthClient;
use crate::infra::mutes::SqliteMuteStore;
use crate::infra::relay::SqliteRelayStore;
use crate::infra::verification::SqliteServerStore;
use clap::Parser;
use poise::serenity_prelude as serenity;

const DEFAULT_AUTH_API_URL: &str = "https://pesu-auth.onrender.com";
const DEFAULT_PREFIX: &str = "campus.";

/// Command-line flags controlling slash-command registration scope.
#[derive(Parser, Debug)]
#[command(name = "campus-auth-bot")]
struct Cli {
    /// Register slash commands in one guild only (instant, for development)
    #[arg(long, value_name = "GUILD_ID", conflicts_with = "skip_register")]
    register_guild: Option<u64>,

    /// Start without touching command registration at all
    #[arg(long)]
    skip_register: bool,
}

/// Central error hook. Permission failures get a dedicated reply; anything
/// unexpected is logged and answered with a generic error embed.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::error!(
                command = %ctx.command().qualified_name,
                "command error: {}",
                error
            );
            let embed = serenity::CreateEmbed::new()
                .title("Error")
                .description(error.to_string())
                .color(0xFF0000);
            let _ = ctx
                .send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await;
        }
        poise::FrameworkError::MissingUserPermissions { ctx, .. }
        | poise::FrameworkError::NotAnOwner { ctx, .. } => {
            let embed = serenity::CreateEmbed::new()
                .title("Error")
                .description("You do not have the required permissions to run this command")
                .color(0xFF0000);
            let _ = ctx
                .send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await;
        }
        poise::FrameworkError::UnknownCommand { .. } => {}
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}

/// One pass of the mute reconciliation loop: revoke the muted role for every
/// lapsed record, then forget the record.
async fn sweep_expired_mutes(http: &serenity::Http, mutes: &MuteService<SqliteMuteStore>) {
    let now = chrono::Utc::now().timestamp();
    let expired = match mutes.expired(now).await {
        Ok(expired) => expired,
        Err(e) => {
            tracing::warn!("Mute sweep failed: {}", e);
            return;
        }
    };

    for record in expired {
        let guild_id = serenity::GuildId::new(record.guild_id);
        let user_id = serenity::UserId::new(record.user_id);

        match http.get_guild_roles(guild_id).await {
            Ok(roles) => {
                if let Some(role) = roles.iter().find(|r| r.name == MUTED_ROLE_NAME) {
                    match http
                        .remove_member_role(guild_id, user_id, role.id, Some("Mute duration expired"))
                        .await
                    {
                        Ok(()) => tracing::info!(
                            user_id = record.user_id,
                            guild_id = record.guild_id,
                            "unmuted member"
                        ),
                        Err(e) => tracing::warn!(
                            user_id = record.user_id,
                            guild_id = record.guild_id,
                            "could not remove muted role: {}",
                            e
                        ),
                    }
                }
            }
            Err(e) => tracing::warn!(guild_id = record.guild_id, "could not fetch roles: {}", e),
        }

        // Drop the record even when the role edit failed; the member may
        // have left or the role may be gone.
        if let Err(e) = mutes.unmute(record.user_id, record.guild_id).await {
            tracing::error!("Failed to clear expired mute: {}", e);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Log to a file so `/dev log` can read it back
    let log_path = std::env::var("LOG_PATH").unwrap_or_else(|_| "bot.log".to_string());
    let log_file = std::fs::File::create(&log_path).expect("Failed to create log file");
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );
    let prefix = std::env::var("BOT_PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string());
    let auth_api_url =
        std::env::var("AUTH_API_URL").unwrap_or_else(|_| DEFAULT_AUTH_API_URL.to_string());
    let relay_channel_id = std::env::var("RELAY_CHANNEL_ID")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .expect("Missing or invalid RELAY_CHANNEL_ID environment variable!");
    let owners: std::collections::HashSet<serenity::UserId> = std::env::var("DEVELOPER_USER_IDS")
        .map(|raw| {
            raw.split(',')
                .filter_map(|id| id.trim().parse::<u64>().ok())
                .map(serenity::UserId::new)
                .collect()
        })
        .unwrap_or_default();
    let health_port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);

    // Keep the runtime database in a dedicated folder so the repo root stays tidy.
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    std::fs::create_dir_all(&data_dir).expect("Failed to create data directory for SQLite files");
    let db_path = format!("{}/bot.db", data_dir);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    use std::sync::Arc;

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", db_path))
        .await
        .expect("Failed to connect to bot DB");

    let server_store = SqliteServerStore::new(pool.clone());
    server_store
        .migrate()
        .await
        .expect("Failed to migrate servers table");
    let mute_store = SqliteMuteStore::new(pool.clone());
    mute_store
        .migrate()
        .await
        .expect("Failed to migrate mutes table");
    let relay_store = SqliteRelayStore::new(pool.clone());
    relay_store
        .migrate()
        .await
        .expect("Failed to migrate relay tables");

    let verification_service = Arc::new(VerificationService::new(
        server_store,
        PortalAuthClient::new(auth_api_url),
    ));
    let mute_service = Arc::new(MuteService::new(mute_store));
    let relay_service = Arc::new(RelayService::new(relay_store));

    // Create the data structure that will be shared across all commands
    let data = Data {
        verification: Arc::clone(&verification_service),
        mutes: Arc::clone(&mute_service),
        relay: Arc::clone(&relay_service),
        relay_channel_id,
        log_path: std::path::PathBuf::from(&log_path),
    };

    // Liveness endpoint for the hosting platform
    tokio::spawn(async move {
        if let Err(e) = infra::health::serve(health_port).await {
            tracing::error!("Health endpoint failed: {}", e);
        }
    });

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Configure the poise framework with our commands and settings.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required for prefix commands
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            // Register all our commands here
            commands: vec![
                discord::commands::verification::auth(),
                discord::commands::relay::anon(),
                discord::commands::relay::anonban(),
                discord::commands::relay::anonunban(),
                discord::commands::mutes::mute(),
                discord::commands::mutes::unmute(),
                discord::commands::moderator::mod_root(),
                discord::commands::developer::dev(),
                discord::commands::developer::register(),
            ],
            // Event handler for guild lifecycle events
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            owners,
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                if cli.skip_register {
                    tracing::info!("Skipping command registration");
                } else if let Some(guild_id) = cli.register_guild {
                    // Guild registration shows up immediately
                    poise::builtins::register_in_guild(
                        ctx,
                        &framework.options().commands,
                        serenity::GuildId::new(guild_id),
                    )
                    .await?;
                    tracing::info!(guild_id, "Commands registered in guild");
                } else {
                    // Global registration can take up to an hour to propagate;
                    // use --register-guild during development.
                    poise::builtins::register_globally(ctx, &framework.options().commands)
                        .await?;
                    tracing::info!("Commands registered globally");
                }

                presence::on_ready(ctx);

                // Background mute sweeper. Runs every 60 seconds.
                let mutes = Arc::clone(&data.mutes);
                let sweep_http = ctx.http.clone();
                tokio::spawn(async move {
                    use std::time::Duration as StdDuration;
                    use tokio::time::sleep;

                    loop {
                        sweep_expired_mutes(&sweep_http, &mutes).await;
                        sleep(StdDuration::from_secs(60)).await;
                    }
                });

                // Rotate the presence every 5 hours
                let presence_ctx = ctx.clone();
                tokio::spawn(async move {
                    use std::time::Duration as StdDuration;
                    use tokio::time::sleep;

                    let mut index = 0usize;
                    loop {
                        sleep(StdDuration::from_secs(5 * 60 * 60)).await;
                        index = index.wrapping_add(1);
                        presence::rotate_status(&presence_ctx, index);
                    }
                });

                Ok(data)
            })
        })
        .build();

    // Create the client and start the bot
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
