//! Discord rendering of dialog keyboards and the component interaction handler
//!
//! Keyboards become button rows when they fit Discord's 5x5 button grid and
//! select menus otherwise. Every custom id carries the prompt's flow token.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use serenity::builder::CreateComponents;
use serenity::http::Http;
use serenity::model::application::component::ButtonStyle;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::id::{ChannelId, MessageId as DiscordMessageId};
use serenity::prelude::Context;
use uuid::Uuid;

use crate::features::birthdays::{
    BirthdayFlows, Choice, Delivery, FlowToken, Inbound, Keyboard, MessageId, Outbound, Transport,
};
use crate::features::rate_limiting::{RateLimiter, RATE_LIMITED_MESSAGE};

/// Custom id prefix for every birthday dialog component
pub const CUSTOM_ID_PREFIX: &str = "bday:";

const MAX_ROWS: usize = 5;
const MAX_BUTTONS_PER_ROW: usize = 5;
const MAX_SELECT_OPTIONS: usize = 25;
const MAX_PLACEHOLDER_LEN: usize = 150;

/// Appended to prompts that expect a typed answer
const REPLY_HINT: &str = "\n*Reply to this message with your answer.*";

pub fn button_custom_id(token: FlowToken, value: &str) -> String {
    format!("{CUSTOM_ID_PREFIX}{}:{value}", token.simple())
}

pub fn select_custom_id(token: FlowToken, index: usize) -> String {
    format!("{CUSTOM_ID_PREFIX}{}#{index}", token.simple())
}

/// Split a custom id into its token and, for buttons, the chosen value.
/// Select menus return `None` for the value; it arrives in the interaction data.
pub fn parse_custom_id(custom_id: &str) -> Option<(FlowToken, Option<String>)> {
    let rest = custom_id.strip_prefix(CUSTOM_ID_PREFIX)?;
    if let Some((token, value)) = rest.split_once(':') {
        return Some((Uuid::parse_str(token).ok()?, Some(value.to_string())));
    }
    let token = rest.split('#').next()?;
    Some((Uuid::parse_str(token).ok()?, None))
}

fn fits_buttons(keyboard: &Keyboard) -> bool {
    keyboard.rows.len() <= MAX_ROWS
        && keyboard
            .rows
            .iter()
            .all(|row| row.len() <= MAX_BUTTONS_PER_ROW)
}

fn button_label(choice: &Choice) -> String {
    if choice.is_blank() {
        "·".to_string()
    } else {
        choice.label.clone()
    }
}

/// Menu placeholder naming the first and last option, cut to Discord's limit
fn menu_placeholder(chunk: &[&Choice]) -> String {
    let placeholder = match (chunk.first(), chunk.last()) {
        (Some(first), Some(last)) if first != last => format!("{} - {}", first.label, last.label),
        (Some(only), _) => only.label.clone(),
        _ => "Choose".to_string(),
    };
    if placeholder.chars().count() <= MAX_PLACEHOLDER_LEN {
        return placeholder;
    }
    let mut cut: String = placeholder.chars().take(MAX_PLACEHOLDER_LEN - 1).collect();
    cut.push('…');
    cut
}

/// Render a keyboard as Discord components
pub fn render_keyboard(keyboard: &Keyboard) -> CreateComponents {
    let mut components = CreateComponents::default();

    if fits_buttons(keyboard) {
        for row in &keyboard.rows {
            components.create_action_row(|action_row| {
                for choice in row {
                    action_row.create_button(|button| {
                        button
                            .custom_id(button_custom_id(keyboard.token, &choice.value))
                            .label(button_label(choice))
                            .style(ButtonStyle::Secondary)
                            .disabled(choice.is_blank())
                    });
                }
                action_row
            });
        }
        return components;
    }

    let options: Vec<&Choice> = keyboard.choices().filter(|c| !c.is_blank()).collect();
    let menus = options.chunks(MAX_SELECT_OPTIONS).take(MAX_ROWS);
    if options.len() > MAX_SELECT_OPTIONS * MAX_ROWS {
        warn!(
            "⚠️ Keyboard with {} choices truncated to {}",
            options.len(),
            MAX_SELECT_OPTIONS * MAX_ROWS
        );
    }

    for (index, chunk) in menus.enumerate() {
        let placeholder = menu_placeholder(chunk);
        components.create_action_row(|action_row| {
            action_row.create_select_menu(|menu| {
                menu.custom_id(select_custom_id(keyboard.token, index))
                    .placeholder(placeholder)
                    .options(|menu_options| {
                        for choice in chunk {
                            menu_options.create_option(|option| {
                                option.label(&choice.label).value(&choice.value)
                            });
                        }
                        menu_options
                    })
            })
        });
    }
    components
}

/// Text as shown on Discord
pub fn render_text(message: &Outbound) -> String {
    if message.expects_reply {
        format!("{}{REPLY_HINT}", message.text)
    } else {
        message.text.clone()
    }
}

/// Sends dialog messages to Discord channels
pub struct DiscordTransport {
    http: Arc<Http>,
}

impl DiscordTransport {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for DiscordTransport {
    async fn deliver(&self, message: Outbound) -> Result<MessageId> {
        let channel = ChannelId(message.conversation_id as u64);
        let text = render_text(&message);
        let components = message.keyboard.as_ref().map(render_keyboard);

        let sent = match message.delivery {
            Delivery::New => {
                channel
                    .send_message(&self.http, |m| {
                        m.content(&text);
                        if let Some(components) = components {
                            m.set_components(components);
                        }
                        m
                    })
                    .await?
            }
            Delivery::Replace(id) => {
                channel
                    .edit_message(&self.http, DiscordMessageId(id), |m| {
                        m.content(&text)
                            .set_components(components.unwrap_or_default())
                    })
                    .await?
            }
        };
        debug!("📤 [{}] Delivered message {}", message.conversation_id, sent.id);
        Ok(sent.id.0)
    }
}

/// Handler for all message component interactions
pub struct MessageComponentHandler {
    flows: Arc<BirthdayFlows>,
    rate_limiter: Arc<RateLimiter>,
}

impl MessageComponentHandler {
    pub fn new(flows: Arc<BirthdayFlows>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self { flows, rate_limiter }
    }

    /// Acknowledge the press and feed it to the dialog flows
    pub async fn handle_component_interaction(
        &self,
        ctx: &Context,
        interaction: &MessageComponentInteraction,
    ) -> Result<()> {
        let custom_id = &interaction.data.custom_id;
        let conversation_id = interaction.channel_id.0 as i64;
        let user_id = interaction.user.id.0;

        info!("Processing component interaction: {custom_id} from user: {user_id}");

        let Some((token, value)) = parse_custom_id(custom_id) else {
            interaction
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::ChannelMessageWithSource)
                        .interaction_response_data(|message| {
                            message.content("Unknown component interaction.")
                        })
                })
                .await?;
            return Ok(());
        };

        if !self.rate_limiter.check(user_id) {
            warn!("🚫 Rate limit exceeded for user: {user_id}");
            interaction
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

        interaction
            .create_interaction_response(&ctx.http, |response| {
                response.kind(InteractionResponseType::DeferredUpdateMessage)
            })
            .await?;

        let Some(choice) = value.or_else(|| interaction.data.values.first().cloned()) else {
            debug!("🔍 [{conversation_id}] Component {custom_id} carried no value");
            return Ok(());
        };

        self.flows
            .handle(Inbound::Callback {
                conversation_id,
                message_id: interaction.message.id.0,
                token,
                choice,
            })
            .await
    }
}
