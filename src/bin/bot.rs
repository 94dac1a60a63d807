use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::*;
use std::sync::Arc;
use tokio::sync::watch;

use birthday_bot::commands::{register_global_commands, register_guild_commands, CommandHandler};
use birthday_bot::core::Config;
use birthday_bot::database::Database;
use birthday_bot::features::{BirthdayFlows, BirthdayNotifier, RateLimiter};
use birthday_bot::message_components::{DiscordTransport, MessageComponentHandler};

struct Handler {
    command_handler: Arc<CommandHandler>,
    component_handler: Arc<MessageComponentHandler>,
    guild_id: Option<GuildId>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        if let Err(e) = self.command_handler.handle_message(&ctx, &msg).await {
            error!("Error handling message: {e:#}");
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());
        info!("🤖 Bot ID: {}", ready.user.id);

        if let Some(shard) = ready.shard {
            info!("⚡ Shard: {}/{}", shard[0] + 1, shard[1]);
        }

        let registered = match self.guild_id {
            Some(guild_id) => {
                info!("🛠️ Development mode: registering commands for guild {guild_id}");
                register_guild_commands(&ctx, guild_id).await
            }
            None => register_global_commands(&ctx).await,
        };
        if let Err(e) = registered {
            error!("Failed to register slash commands: {e}");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::ApplicationCommand(command) => {
                if let Err(e) = self
                    .command_handler
                    .handle_slash_command(&ctx, &command)
                    .await
                {
                    error!(
                        "Error handling slash command '{}': {:#}",
                        command.data.name, e
                    );
                }
            }
            Interaction::MessageComponent(component) => {
                if let Err(e) = self
                    .component_handler
                    .handle_component_interaction(&ctx, &component)
                    .await
                {
                    error!(
                        "Error handling component interaction '{}': {:#}",
                        component.data.custom_id, e
                    );

                    // The press may not have been acknowledged yet
                    let _ = component
                        .create_interaction_response(&ctx.http, |response| {
                            response
                                .kind(InteractionResponseType::ChannelMessageWithSource)
                                .interaction_response_data(|message| {
                                    message
                                        .content("❌ Sorry, I encountered an error processing your interaction. Please try again.")
                                        .ephemeral(true)
                                })
                        })
                        .await;
                }
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Birthday Reminder Bot...");

    let database = Database::new(&config.database_path).await?;
    let store = Arc::new(database);

    let http = Arc::new(Http::new(&config.discord_token));
    let transport = Arc::new(DiscordTransport::new(http));

    let flows = Arc::new(BirthdayFlows::new(store.clone(), transport.clone()));
    let rate_limiter = Arc::new(RateLimiter::default());

    let command_handler = CommandHandler::new(flows.clone(), rate_limiter.clone());
    let component_handler = MessageComponentHandler::new(flows, rate_limiter);

    // Parse guild ID if provided for development mode
    let guild_id = config
        .discord_guild_id
        .as_ref()
        .and_then(|id| id.parse::<u64>().ok())
        .map(GuildId);

    let handler = Handler {
        command_handler: Arc::new(command_handler),
        component_handler: Arc::new(component_handler),
        guild_id,
    };

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    info!("Bot configured successfully. Connecting to Discord gateway...");

    // Start the birthday notifier jobs
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let notifier = Arc::new(BirthdayNotifier::new(store, transport, config.timezone));
    let jobs = notifier.spawn(shutdown_rx);

    // Stop shards and notifier jobs on Ctrl-C
    let shard_manager = client.shard_manager.clone();
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        info!("🛑 Shutdown requested");
        let _ = signal_tx.send(true);
        shard_manager.lock().await.shutdown_all().await;
    });

    let result = client.start().await;

    let _ = shutdown_tx.send(true);
    for job in jobs {
        if let Err(e) = job.await {
            warn!("Reminder job ended abnormally: {e}");
        }
    }

    if let Err(why) = result {
        error!("Gateway connection failed: {why:?}");
        return Err(anyhow::anyhow!(
            "Failed to establish gateway connection: {}",
            why
        ));
    }

    info!("👋 Bot stopped");
    Ok(())
}
