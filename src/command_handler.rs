use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::channel::Message;
use serenity::model::id::UserId;
use serenity::prelude::Context;
use uuid::Uuid;

use crate::commands::slash::get_string_option;
use crate::features::birthdays::{BirthdayFlows, Command, Inbound};
use crate::features::rate_limiting::{RateLimiter, RATE_LIMITED_MESSAGE};

/// Turns Discord messages and slash commands into dialog events
#[derive(Clone)]
pub struct CommandHandler {
    flows: Arc<BirthdayFlows>,
    rate_limiter: Arc<RateLimiter>,
}

/// Drop a leading `<@id>` or `<@!id>` mention of the bot
pub fn strip_bot_mention(content: &str, bot_id: UserId) -> &str {
    let plain = format!("<@{}>", bot_id.0);
    let nick = format!("<@!{}>", bot_id.0);
    content
        .strip_prefix(plain.as_str())
        .or_else(|| content.strip_prefix(nick.as_str()))
        .unwrap_or(content)
        .trim()
}

impl CommandHandler {
    pub fn new(flows: Arc<BirthdayFlows>, rate_limiter: Arc<RateLimiter>) -> Self {
        CommandHandler {
            flows,
            rate_limiter,
        }
    }

    pub async fn handle_message(&self, ctx: &Context, msg: &Message) -> Result<()> {
        let request_id = Uuid::new_v4();
        let user_id = msg.author.id;
        let bot_id = ctx.cache.current_user_id();
        let is_dm = msg.guild_id.is_none();

        let replying_to_bot = msg
            .referenced_message
            .as_ref()
            .is_some_and(|referenced| referenced.author.id == bot_id);
        let mentions_bot = msg.mentions.iter().any(|user| user.id == bot_id);
        let content = strip_bot_mention(msg.content.trim(), bot_id);

        // In guilds only react to commands and messages aimed at the bot
        if !is_dm && !content.starts_with('/') && !replying_to_bot && !mentions_bot {
            debug!("[{request_id}] ℹ️ Guild message not addressed to the bot, ignoring");
            return Ok(());
        }

        info!(
            "[{}] 📥 Message received | User: {} | Channel: {} | Content: '{}'",
            request_id,
            user_id,
            msg.channel_id,
            content.chars().take(100).collect::<String>()
        );

        if !self.rate_limiter.check(user_id.0) {
            warn!("[{request_id}] 🚫 Rate limit exceeded for user: {user_id}");
            msg.channel_id.say(&ctx.http, RATE_LIMITED_MESSAGE).await?;
            return Ok(());
        }

        let reply_to = if replying_to_bot {
            msg.message_reference
                .as_ref()
                .and_then(|reference| reference.message_id)
                .map(|id| id.0)
        } else {
            None
        };

        self.flows
            .handle(Inbound::Text {
                conversation_id: msg.channel_id.0 as i64,
                reply_to,
                text: content.to_string(),
            })
            .await?;

        debug!("[{request_id}] ✅ Message processing completed");
        Ok(())
    }

    pub async fn handle_slash_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let request_id = Uuid::new_v4();
        let user_id = command.user.id;

        info!(
            "[{}] 📥 Slash command received | Command: {} | User: {} | Channel: {}",
            request_id, command.data.name, user_id, command.channel_id
        );

        if !self.rate_limiter.check(user_id.0) {
            warn!("[{request_id}] 🚫 Rate limit exceeded for user: {user_id} in slash command");
            command
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::ChannelMessageWithSource)
                        .interaction_response_data(|message| {
                            message.content(RATE_LIMITED_MESSAGE).ephemeral(true)
                        })
                })
                .await?;
            return Ok(());
        }

        let name = get_string_option(&command.data.options, "name");
        let Some(parsed) = Command::from_slash(&command.data.name, name.as_deref()) else {
            warn!("[{}] ❓ Unknown slash command: {}", request_id, command.data.name);
            command
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::ChannelMessageWithSource)
                        .interaction_response_data(|message| {
                            message.content("Unknown command.").ephemeral(true)
                        })
                })
                .await?;
            return Ok(());
        };

        // Echo the command so the dialog that follows has visible context
        let echo = match &name {
            Some(name) => format!("`/{} {}`", command.data.name, name),
            None => format!("`/{}`", command.data.name),
        };
        command
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| message.content(echo))
            })
            .await?;

        self.flows
            .handle(Inbound::Command {
                conversation_id: command.channel_id.0 as i64,
                command: parsed,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bot_mention() {
        let bot = UserId(42);
        assert_eq!(strip_bot_mention("<@42> /add Anna", bot), "/add Anna");
        assert_eq!(strip_bot_mention("<@!42>   hi", bot), "hi");
        assert_eq!(strip_bot_mention("<@7> hi", bot), "<@7> hi");
        assert_eq!(strip_bot_mention("/showall", bot), "/showall");
    }
}
