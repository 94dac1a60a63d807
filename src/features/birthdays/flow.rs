//! # Feature: Birthday Dialog Flows
//!
//! Multi-step `/add`, `/search`, `/remove` and `/edit` conversations. Each
//! inbound event is matched to the prompt it answers, advances that prompt's
//! stage, and finishes with at most one store mutation.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Added `/edit` with rename and reschedule
//! - 1.0.0: Add, search and remove flows with token correlated pickers

use std::sync::Arc;

use anyhow::Result;
use log::{debug, error, info};

use crate::core::{chunk_for_message, FlowError, StoreError};

use super::command::Command;
use super::dialog::{Action, DateStep, DialogState, FlowToken, Stage};
use super::keyboards::{self, parse_name, parse_number, Selection, BLANK, CANCEL};
use super::messages;
use super::model::{clean_name, is_valid_date, Birthday, ConversationId, SearchMode, SearchQuery};
use super::query;
use super::store::BirthdayStore;
use super::transport::{MessageId, Outbound, Transport};

/// Something a user did in a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A plain message, possibly replying to an earlier bot message
    Text {
        conversation_id: ConversationId,
        reply_to: Option<MessageId>,
        text: String,
    },
    /// A command that arrived already parsed (slash commands)
    Command {
        conversation_id: ConversationId,
        command: Command,
    },
    /// A keyboard press on a bot message
    Callback {
        conversation_id: ConversationId,
        message_id: MessageId,
        token: FlowToken,
        choice: String,
    },
}

/// Flow engine; one instance owns its dialog state
pub struct BirthdayFlows {
    store: Arc<dyn BirthdayStore>,
    transport: Arc<dyn Transport>,
    dialog: DialogState,
}

fn select<T>(choice: &str, value: impl FnOnce(&str) -> Option<T>) -> Result<Selection<T>, FlowError> {
    Selection::parse(choice, value)
        .ok_or_else(|| FlowError::InvalidInput(format!("unexpected picker value {choice:?}")))
}

fn parse_month(raw: &str) -> Option<u32> {
    parse_number(raw).filter(|month| (1..=12).contains(month))
}

fn parse_day(raw: &str) -> Option<u32> {
    parse_number(raw).filter(|day| (1..=31).contains(day))
}

/// Errors the user can recover from by starting the command again
fn is_recoverable(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<FlowError>() {
        Some(flow) => !flow.is_defect(),
        None => err.downcast_ref::<StoreError>().is_some(),
    }
}

impl BirthdayFlows {
    pub fn new(store: Arc<dyn BirthdayStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            dialog: DialogState::new(),
        }
    }

    pub fn dialog(&self) -> &DialogState {
        &self.dialog
    }

    /// Process one inbound event. Only defects and transport failures are returned as errors.
    pub async fn handle(&self, event: Inbound) -> Result<()> {
        match event {
            Inbound::Text {
                conversation_id,
                reply_to,
                text,
            } => self.on_text(conversation_id, reply_to, &text).await,
            Inbound::Command {
                conversation_id,
                command,
            } => self.run_command(conversation_id, command).await,
            Inbound::Callback {
                conversation_id,
                message_id,
                token,
                choice,
            } => self.on_callback(conversation_id, message_id, token, &choice).await,
        }
    }

    async fn say(&self, conversation_id: ConversationId, text: impl Into<String>) -> Result<()> {
        self.transport
            .deliver(Outbound::text(conversation_id, text))
            .await?;
        Ok(())
    }

    async fn send_help(&self, conversation_id: ConversationId) -> Result<()> {
        debug!("❓ [{conversation_id}] Unrecognized input, sending help");
        self.say(conversation_id, messages::HELP).await
    }

    /// Turn user-recoverable failures into the retry message; pass everything else up
    async fn recover(
        &self,
        conversation_id: ConversationId,
        command: &str,
        stage: &str,
        result: Result<()>,
    ) -> Result<()> {
        let Err(err) = result else {
            return Ok(());
        };
        if !is_recoverable(&err) {
            return Err(err);
        }
        error!("❌ [{conversation_id}] /{command} failed at {stage}: {err:#}");
        self.say(conversation_id, messages::retry(command)).await
    }

    fn cancel(&self, conversation_id: ConversationId, token: FlowToken) {
        if let Some(stage) = self.dialog.close_prompt(token, conversation_id) {
            info!("🚫 [{conversation_id}] /{} cancelled", stage.flow());
        }
    }

    async fn on_text(
        &self,
        conversation_id: ConversationId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> Result<()> {
        if let Some(stage) = reply_to.and_then(|id| self.dialog.take_reply(conversation_id, id)) {
            debug!("💬 [{conversation_id}] Reply for {stage:?}");
            let result = self.on_reply(conversation_id, &stage, text).await;
            return self
                .recover(conversation_id, stage.flow(), &format!("{stage:?}"), result)
                .await;
        }

        match Command::parse(text) {
            Some(command) => self.run_command(conversation_id, command).await,
            None => self.send_help(conversation_id).await,
        }
    }

    async fn run_command(&self, conversation_id: ConversationId, command: Command) -> Result<()> {
        info!("🎯 [{conversation_id}] Processing /{}", command.name());
        let name = command.name();
        let result = match command {
            Command::Add(None) => self.say(conversation_id, messages::ADD_USAGE).await,
            Command::Add(Some(person)) => match clean_name(&person) {
                Some(person) => self.start_add(conversation_id, person).await,
                None => {
                    debug!("✋ [{conversation_id}] Rejected /add name of {} chars", person.chars().count());
                    self.say(conversation_id, messages::name_too_long()).await
                }
            },
            Command::ShowAll => {
                self.run_search(Action::Search, SearchQuery::all(conversation_id))
                    .await
            }
            Command::Search => self.start_search(conversation_id, Action::Search).await,
            Command::Remove => self.start_search(conversation_id, Action::Remove).await,
            Command::Edit => self.start_search(conversation_id, Action::Edit).await,
        };
        self.recover(conversation_id, name, "start", result).await
    }

    async fn on_callback(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        token: FlowToken,
        choice: &str,
    ) -> Result<()> {
        let Some(stage) = self.dialog.prompt_stage(token, conversation_id) else {
            debug!("🔍 [{conversation_id}] Ignoring stale callback {token} ({choice:?})");
            return Ok(());
        };
        debug!("🔘 [{conversation_id}] /{} {stage:?} <- {choice:?}", stage.flow());

        let result = match &stage {
            Stage::AddDate(step) => {
                self.on_add_date(conversation_id, token, message_id, *step, choice)
                    .await
            }
            Stage::Mode(action) => self.on_mode(conversation_id, token, *action, choice).await,
            Stage::Day(action) => self.on_day(conversation_id, token, *action, choice).await,
            Stage::Month(action) => self.on_month(conversation_id, token, *action, choice).await,
            Stage::Date(action, step) => {
                self.on_date(conversation_id, token, message_id, *action, *step, choice)
                    .await
            }
            Stage::RemovePick => self.on_remove_pick(conversation_id, choice).await,
            Stage::EditPick => self.on_edit_pick(conversation_id, token, choice).await,
            Stage::EditField { name } => {
                self.on_edit_field(conversation_id, token, message_id, name, choice)
                    .await
            }
            Stage::Reschedule { name, step } => {
                self.on_reschedule(conversation_id, token, message_id, name, *step, choice)
                    .await
            }
            Stage::Name(_) | Stage::Rename { .. } => {
                debug!("🔍 [{conversation_id}] {stage:?} expects text, ignoring callback");
                Ok(())
            }
        };
        self.recover(conversation_id, stage.flow(), &format!("{stage:?}"), result)
            .await
    }

    async fn on_reply(&self, conversation_id: ConversationId, stage: &Stage, text: &str) -> Result<()> {
        match stage {
            Stage::Name(action) => {
                let name = text.trim();
                if name.is_empty() {
                    return Err(FlowError::InvalidInput("empty name".to_string()).into());
                }
                self.run_search(*action, SearchQuery::by_name(conversation_id, name))
                    .await
            }
            Stage::Rename { name } => self.complete_rename(conversation_id, name, text).await,
            other => {
                debug!("🔍 [{conversation_id}] {other:?} does not take replies");
                self.send_help(conversation_id).await
            }
        }
    }

    // ---- shared date picker ----

    /// Month then day, edited in place under one token. Returns the date once a day is picked.
    #[allow(clippy::too_many_arguments)]
    async fn advance_date(
        &self,
        conversation_id: ConversationId,
        token: FlowToken,
        message_id: MessageId,
        step: DateStep,
        choice: &str,
        text: &str,
        next: impl Fn(DateStep) -> Stage + Send,
    ) -> Result<Option<(u32, u32)>> {
        match step {
            DateStep::Month => match select(choice, parse_month)? {
                Selection::Blank => Ok(None),
                Selection::Cancel => {
                    self.cancel(conversation_id, token);
                    Ok(None)
                }
                Selection::Value(month) => {
                    if self
                        .dialog
                        .advance_prompt(token, conversation_id, next(DateStep::Day { month }))
                    {
                        self.transport
                            .deliver(
                                Outbound::text(conversation_id, text)
                                    .with_keyboard(keyboards::day_picker_for_month(token, month))
                                    .replacing(message_id),
                            )
                            .await?;
                    }
                    Ok(None)
                }
            },
            DateStep::Day { month } => {
                match select(choice, |raw| parse_number(raw).filter(|day| is_valid_date(*day, month)))? {
                    Selection::Blank => Ok(None),
                    Selection::Cancel => {
                        self.cancel(conversation_id, token);
                        Ok(None)
                    }
                    Selection::Value(day) => {
                        // A concurrent press may have finished this prompt already
                        if self.dialog.close_prompt(token, conversation_id).is_none() {
                            return Ok(None);
                        }
                        Ok(Some((day, month)))
                    }
                }
            }
        }
    }

    // ---- /add ----

    async fn start_add(&self, conversation_id: ConversationId, name: String) -> Result<()> {
        let existing = self
            .store
            .find_by_name(conversation_id, &name)
            .await
            .map_err(FlowError::from)?;

        if let Some(existing) = existing {
            info!("📋 [{conversation_id}] '{name}' already exists, offering removal");
            let token = self.dialog.open_prompt(conversation_id, Stage::RemovePick);
            self.transport
                .deliver(
                    Outbound::text(conversation_id, messages::already_exists(&name))
                        .with_keyboard(keyboards::birthday_picker(token, &[existing])),
                )
                .await?;
            return Ok(());
        }

        self.dialog.set_pending(conversation_id, name.clone());
        let token = self
            .dialog
            .open_prompt(conversation_id, Stage::AddDate(DateStep::Month));
        self.transport
            .deliver(
                Outbound::text(conversation_id, messages::select_birthday_of(&name))
                    .with_keyboard(keyboards::month_picker(token)),
            )
            .await?;
        Ok(())
    }

    async fn on_add_date(
        &self,
        conversation_id: ConversationId,
        token: FlowToken,
        message_id: MessageId,
        step: DateStep,
        choice: &str,
    ) -> Result<()> {
        let text = self.pending_prompt_text(conversation_id);
        let Some((day, month)) = self
            .advance_date(conversation_id, token, message_id, step, choice, &text, Stage::AddDate)
            .await?
        else {
            return Ok(());
        };
        self.complete_add(conversation_id, day, month).await
    }

    fn pending_prompt_text(&self, conversation_id: ConversationId) -> String {
        match self.dialog.peek_pending(conversation_id) {
            Some(name) => messages::select_birthday_of(&name),
            None => messages::SELECT_DATE.to_string(),
        }
    }

    async fn complete_add(&self, conversation_id: ConversationId, day: u32, month: u32) -> Result<()> {
        let pending = self
            .dialog
            .take_pending(conversation_id)
            .ok_or(FlowError::StaleState(conversation_id))?;

        let birthday = Birthday::new(conversation_id, pending.name, day, month);
        self.store.create(&birthday).await.map_err(FlowError::from)?;

        info!("🎂 [{conversation_id}] Added {birthday}");
        self.say(conversation_id, messages::added(&birthday)).await
    }

    // ---- /search, /remove and /edit share the search front half ----

    async fn start_search(&self, conversation_id: ConversationId, action: Action) -> Result<()> {
        let token = self.dialog.open_prompt(conversation_id, Stage::Mode(action));
        self.transport
            .deliver(
                Outbound::text(conversation_id, messages::SELECT_SEARCH_TYPE)
                    .with_keyboard(keyboards::mode_picker(token)),
            )
            .await?;
        Ok(())
    }

    async fn on_mode(
        &self,
        conversation_id: ConversationId,
        token: FlowToken,
        action: Action,
        choice: &str,
    ) -> Result<()> {
        let mode: SearchMode = match choice {
            BLANK => return Ok(()),
            CANCEL => {
                self.cancel(conversation_id, token);
                return Ok(());
            }
            raw => raw.parse()?,
        };
        if self.dialog.close_prompt(token, conversation_id).is_none() {
            return Ok(());
        }
        debug!("🔎 [{conversation_id}] /{} by {mode}", action.command());

        match mode {
            SearchMode::All => self.run_search(action, SearchQuery::all(conversation_id)).await,
            SearchMode::Name => {
                let prompt = Outbound::text(conversation_id, messages::enter_name(action.command()))
                    .expecting_reply();
                let message_id = self.transport.deliver(prompt).await?;
                self.dialog
                    .await_reply(conversation_id, message_id, Stage::Name(action));
                Ok(())
            }
            SearchMode::Day => {
                let token = self.dialog.open_prompt(conversation_id, Stage::Day(action));
                self.transport
                    .deliver(
                        Outbound::text(conversation_id, messages::SELECT_DAY)
                            .with_keyboard(keyboards::day_picker(token, 31)),
                    )
                    .await?;
                Ok(())
            }
            SearchMode::Month => {
                let token = self.dialog.open_prompt(conversation_id, Stage::Month(action));
                self.transport
                    .deliver(
                        Outbound::text(conversation_id, messages::SELECT_MONTH)
                            .with_keyboard(keyboards::month_picker(token)),
                    )
                    .await?;
                Ok(())
            }
            SearchMode::Date => {
                let token = self
                    .dialog
                    .open_prompt(conversation_id, Stage::Date(action, DateStep::Month));
                self.transport
                    .deliver(
                        Outbound::text(conversation_id, messages::SELECT_DATE)
                            .with_keyboard(keyboards::month_picker(token)),
                    )
                    .await?;
                Ok(())
            }
        }
    }

    async fn on_day(
        &self,
        conversation_id: ConversationId,
        token: FlowToken,
        action: Action,
        choice: &str,
    ) -> Result<()> {
        match select(choice, parse_day)? {
            Selection::Blank => Ok(()),
            Selection::Cancel => {
                self.cancel(conversation_id, token);
                Ok(())
            }
            Selection::Value(day) => {
                if self.dialog.close_prompt(token, conversation_id).is_none() {
                    return Ok(());
                }
                self.run_search(action, SearchQuery::by_day(conversation_id, day))
                    .await
            }
        }
    }

    async fn on_month(
        &self,
        conversation_id: ConversationId,
        token: FlowToken,
        action: Action,
        choice: &str,
    ) -> Result<()> {
        match select(choice, parse_month)? {
            Selection::Blank => Ok(()),
            Selection::Cancel => {
                self.cancel(conversation_id, token);
                Ok(())
            }
            Selection::Value(month) => {
                if self.dialog.close_prompt(token, conversation_id).is_none() {
                    return Ok(());
                }
                self.run_search(action, SearchQuery::by_month(conversation_id, month))
                    .await
            }
        }
    }

    async fn on_date(
        &self,
        conversation_id: ConversationId,
        token: FlowToken,
        message_id: MessageId,
        action: Action,
        step: DateStep,
        choice: &str,
    ) -> Result<()> {
        let picked = self
            .advance_date(
                conversation_id,
                token,
                message_id,
                step,
                choice,
                messages::SELECT_DATE,
                |step| Stage::Date(action, step),
            )
            .await?;
        match picked {
            Some((day, month)) => {
                self.run_search(action, SearchQuery::by_date(conversation_id, day, month))
                    .await
            }
            None => Ok(()),
        }
    }

    /// Execute a query and hand the results to the acting command
    async fn run_search(&self, action: Action, search: SearchQuery) -> Result<()> {
        let conversation_id = search.conversation_id;
        let filter = query::route(&search)?;
        let results = self
            .store
            .search(conversation_id, &filter)
            .await
            .map_err(FlowError::from)?;
        info!(
            "📋 [{conversation_id}] /{} {} search matched {} birthdays",
            action.command(),
            search.mode,
            results.len()
        );

        if results.is_empty() {
            return self.say(conversation_id, messages::NO_RESULTS).await;
        }

        let stage = match action {
            Action::Search => {
                for chunk in chunk_for_message(&messages::search_results(&results)) {
                    self.say(conversation_id, chunk).await?;
                }
                return Ok(());
            }
            Action::Remove => Stage::RemovePick,
            Action::Edit => Stage::EditPick,
        };

        let token = self.dialog.open_prompt(conversation_id, stage);
        self.transport
            .deliver(
                Outbound::text(conversation_id, messages::select_birthday_to(action.command()))
                    .with_keyboard(keyboards::birthday_picker(token, &results)),
            )
            .await?;
        Ok(())
    }

    // ---- /remove ----

    /// The list stays open so several entries can be removed from it
    async fn on_remove_pick(&self, conversation_id: ConversationId, choice: &str) -> Result<()> {
        let name = match select(choice, parse_name)? {
            Selection::Value(name) => name,
            Selection::Blank | Selection::Cancel => return Ok(()),
        };

        let removed = self
            .store
            .delete(conversation_id, &name)
            .await
            .map_err(FlowError::from)?;
        if removed {
            info!("🗑️ [{conversation_id}] Removed '{name}'");
        } else {
            info!("🗑️ [{conversation_id}] '{name}' was already gone");
        }
        self.say(conversation_id, messages::removed(&name)).await
    }

    // ---- /edit ----

    async fn on_edit_pick(&self, conversation_id: ConversationId, token: FlowToken, choice: &str) -> Result<()> {
        let name = match select(choice, parse_name)? {
            Selection::Value(name) => name,
            Selection::Blank => return Ok(()),
            Selection::Cancel => {
                self.cancel(conversation_id, token);
                return Ok(());
            }
        };
        if self.dialog.close_prompt(token, conversation_id).is_none() {
            return Ok(());
        }

        let token = self
            .dialog
            .open_prompt(conversation_id, Stage::EditField { name: name.clone() });
        self.transport
            .deliver(
                Outbound::text(conversation_id, messages::edit_what(&name))
                    .with_keyboard(keyboards::edit_field_picker(token)),
            )
            .await?;
        Ok(())
    }

    async fn on_edit_field(
        &self,
        conversation_id: ConversationId,
        token: FlowToken,
        message_id: MessageId,
        name: &str,
        choice: &str,
    ) -> Result<()> {
        match choice {
            BLANK => Ok(()),
            CANCEL => {
                self.cancel(conversation_id, token);
                Ok(())
            }
            "name" => {
                if self.dialog.close_prompt(token, conversation_id).is_none() {
                    return Ok(());
                }
                let prompt = Outbound::text(conversation_id, messages::enter_new_name(name))
                    .expecting_reply();
                let reply_to = self.transport.deliver(prompt).await?;
                self.dialog.await_reply(
                    conversation_id,
                    reply_to,
                    Stage::Rename {
                        name: name.to_string(),
                    },
                );
                Ok(())
            }
            "date" => {
                let next = Stage::Reschedule {
                    name: name.to_string(),
                    step: DateStep::Month,
                };
                if self.dialog.advance_prompt(token, conversation_id, next) {
                    self.transport
                        .deliver(
                            Outbound::text(conversation_id, messages::select_birthday_of(name))
                                .with_keyboard(keyboards::month_picker(token))
                                .replacing(message_id),
                        )
                        .await?;
                }
                Ok(())
            }
            other => Err(FlowError::InvalidInput(format!("unexpected edit field {other:?}")).into()),
        }
    }

    async fn complete_rename(&self, conversation_id: ConversationId, old_name: &str, text: &str) -> Result<()> {
        let new_name = clean_name(text)
            .ok_or_else(|| FlowError::InvalidInput(format!("unusable name {text:?}")))?;

        let renamed = self
            .store
            .rename(conversation_id, old_name, &new_name)
            .await
            .map_err(FlowError::from)?;
        if !renamed {
            info!("✏️ [{conversation_id}] '{old_name}' was already gone, nothing renamed");
        } else {
            info!("✏️ [{conversation_id}] Renamed '{old_name}' to '{new_name}'");
        }
        self.say(conversation_id, messages::renamed(old_name, &new_name))
            .await
    }

    async fn on_reschedule(
        &self,
        conversation_id: ConversationId,
        token: FlowToken,
        message_id: MessageId,
        name: &str,
        step: DateStep,
        choice: &str,
    ) -> Result<()> {
        let text = messages::select_birthday_of(name);
        let picked = self
            .advance_date(conversation_id, token, message_id, step, choice, &text, |step| {
                Stage::Reschedule {
                    name: name.to_string(),
                    step,
                }
            })
            .await?;
        let Some((day, month)) = picked else {
            return Ok(());
        };

        let updated = self
            .store
            .reschedule(conversation_id, name, day, month)
            .await
            .map_err(FlowError::from)?;
        if !updated {
            info!("📅 [{conversation_id}] '{name}' was already gone, nothing rescheduled");
        } else {
            info!("📅 [{conversation_id}] Moved '{name}' to {day}/{month}");
        }
        self.say(conversation_id, messages::rescheduled(name, day, month))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::features::birthdays::query::Filter;
    use crate::features::birthdays::transport::Delivery;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    const CHAT: ConversationId = 1001;
    const OTHER_CHAT: ConversationId = 2002;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(MessageId, Outbound)>>,
        next_id: AtomicU64,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn deliver(&self, message: Outbound) -> Result<MessageId> {
            let id = match message.delivery {
                Delivery::Replace(id) => id,
                Delivery::New => self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            };
            self.sent.lock().unwrap().push((id, message));
            Ok(id)
        }
    }

    impl RecordingTransport {
        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        fn last(&self) -> (MessageId, Outbound) {
            self.sent.lock().unwrap().last().cloned().expect("nothing was sent")
        }

        fn last_text(&self) -> String {
            self.last().1.text
        }

        /// Message id and token of the most recent keyboard
        fn prompt(&self) -> (MessageId, FlowToken) {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find_map(|(id, m)| m.keyboard.as_ref().map(|k| (*id, k.token)))
                .expect("no keyboard was sent")
        }
    }

    struct FailingStore;

    fn offline() -> StoreError {
        StoreError::Corrupt("store offline".to_string())
    }

    #[async_trait]
    impl BirthdayStore for FailingStore {
        async fn create(&self, _: &Birthday) -> Result<(), StoreError> {
            Err(offline())
        }
        async fn find_by_name(&self, _: ConversationId, _: &str) -> Result<Option<Birthday>, StoreError> {
            Err(offline())
        }
        async fn find_on_calendar_day(&self, _: u32, _: u32) -> Result<Vec<Birthday>, StoreError> {
            Err(offline())
        }
        async fn search(&self, _: ConversationId, _: &Filter) -> Result<Vec<Birthday>, StoreError> {
            Err(offline())
        }
        async fn rename(&self, _: ConversationId, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(offline())
        }
        async fn reschedule(&self, _: ConversationId, _: &str, _: u32, _: u32) -> Result<bool, StoreError> {
            Err(offline())
        }
        async fn delete(&self, _: ConversationId, _: &str) -> Result<bool, StoreError> {
            Err(offline())
        }
    }

    async fn setup() -> (BirthdayFlows, Arc<RecordingTransport>, Database) {
        let db = Database::new(":memory:").await.unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let flows = BirthdayFlows::new(Arc::new(db.clone()), transport.clone());
        (flows, transport, db)
    }

    async fn seeded() -> (BirthdayFlows, Arc<RecordingTransport>, Database) {
        let (flows, transport, db) = setup().await;
        for (name, day, month) in [("Anna", 15, 6), ("Sanjay", 2, 1), ("Bob", 30, 12), ("Priya", 15, 3)] {
            db.create(&Birthday::new(CHAT, name, day, month)).await.unwrap();
        }
        db.create(&Birthday::new(OTHER_CHAT, "Anna", 15, 6)).await.unwrap();
        (flows, transport, db)
    }

    async fn command(flows: &BirthdayFlows, text: &str) -> Result<()> {
        flows
            .handle(Inbound::Text {
                conversation_id: CHAT,
                reply_to: None,
                text: text.to_string(),
            })
            .await
    }

    async fn press(flows: &BirthdayFlows, transport: &RecordingTransport, choice: &str) -> Result<()> {
        let (message_id, token) = transport.prompt();
        flows
            .handle(Inbound::Callback {
                conversation_id: CHAT,
                message_id,
                token,
                choice: choice.to_string(),
            })
            .await
    }

    async fn reply(flows: &BirthdayFlows, transport: &RecordingTransport, text: &str) -> Result<()> {
        let (message_id, last) = transport.last();
        assert!(last.expects_reply);
        flows
            .handle(Inbound::Text {
                conversation_id: CHAT,
                reply_to: Some(message_id),
                text: text.to_string(),
            })
            .await
    }

    #[tokio::test]
    async fn test_add_completes_with_one_record() {
        let (flows, transport, db) = setup().await;

        command(&flows, "/add Anna").await.unwrap();
        assert_eq!(transport.last_text(), "Select the Birthday of 'Anna'");
        assert_eq!(flows.dialog().pending_count(), 1);

        press(&flows, &transport, "6").await.unwrap();
        let (_, day_picker) = transport.last();
        assert!(matches!(day_picker.delivery, Delivery::Replace(_)));
        assert_eq!(day_picker.keyboard.unwrap().choices().filter(|c| !c.is_blank()).count(), 30);

        press(&flows, &transport, "15").await.unwrap();
        assert_eq!(transport.last_text(), "**Added Birthday** for Anna (June 15)");
        assert_eq!(flows.dialog().pending_count(), 0);
        assert_eq!(
            db.find_by_name(CHAT, "Anna").await.unwrap(),
            Some(Birthday::new(CHAT, "Anna", 15, 6))
        );
        assert_eq!(db.search(CHAT, &Filter::All).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_existing_name_offers_removal() {
        let (flows, transport, db) = seeded().await;

        command(&flows, "/add Anna").await.unwrap();
        let (_, message) = transport.last();
        assert_eq!(message.text, "Name 'Anna' already exists.\nDo you want to /remove it?");
        let values: Vec<_> = message.keyboard.unwrap().choices().map(|c| c.value.clone()).collect();
        assert_eq!(values, vec!["=Anna", "cancel"]);
        assert_eq!(flows.dialog().pending_count(), 0);

        press(&flows, &transport, "=Anna").await.unwrap();
        assert_eq!(transport.last_text(), "**Removed Birthday** of Anna");
        assert!(db.find_by_name(CHAT, "Anna").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_without_name_shows_usage() {
        let (flows, transport, _db) = setup().await;
        command(&flows, "/add").await.unwrap();
        assert_eq!(transport.last_text(), "Please provide a name: /add <name>");
    }

    #[tokio::test]
    async fn test_add_with_overlong_name_says_so() {
        let (flows, transport, _db) = setup().await;
        let name = "x".repeat(crate::features::birthdays::model::MAX_NAME_LEN + 1);
        command(&flows, &format!("/add {name}")).await.unwrap();
        assert_eq!(transport.last_text(), messages::name_too_long());
        assert_eq!(flows.dialog().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_superseded_add_picker_is_ignored() {
        let (flows, transport, db) = setup().await;

        command(&flows, "/add Anna").await.unwrap();
        let (anna_message, anna_token) = transport.prompt();
        command(&flows, "/add Bob").await.unwrap();
        let sent = transport.count();

        for choice in ["3", "4"] {
            flows
                .handle(Inbound::Callback {
                    conversation_id: CHAT,
                    message_id: anna_message,
                    token: anna_token,
                    choice: choice.to_string(),
                })
                .await
                .unwrap();
        }
        assert_eq!(transport.count(), sent);
        assert_eq!(flows.dialog().peek_pending(CHAT), Some("Bob".to_string()));
        assert!(db.find_by_name(CHAT, "Bob").await.unwrap().is_none());

        press(&flows, &transport, "2").await.unwrap();
        press(&flows, &transport, "1").await.unwrap();
        assert_eq!(transport.last_text(), "**Added Birthday** for Bob (February 01)");
        assert!(db.find_by_name(CHAT, "Anna").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_date_without_pending_add_asks_to_retry() {
        let (flows, transport, db) = setup().await;

        command(&flows, "/add Anna").await.unwrap();
        assert!(flows.dialog().take_pending(CHAT).is_some());

        press(&flows, &transport, "2").await.unwrap();
        press(&flows, &transport, "1").await.unwrap();
        assert_eq!(transport.last_text(), "Something went wrong. Please try /add again.");
        assert!(db.find_by_name(CHAT, "Anna").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repeated_commands_keep_prompt_registry_bounded() {
        let (flows, transport, _db) = seeded().await;

        for _ in 0..50 {
            command(&flows, "/remove").await.unwrap();
            press(&flows, &transport, "all").await.unwrap();
            press(&flows, &transport, "=Anna").await.unwrap();
        }
        for _ in 0..50 {
            command(&flows, "/search").await.unwrap();
        }
        for _ in 0..50 {
            command(&flows, "/add Anna").await.unwrap();
        }

        // one live prompt each for remove, search and add
        assert_eq!(flows.dialog().open_prompt_count(), 3);
        assert_eq!(flows.dialog().pending_count(), 1);
    }

    #[tokio::test]
    async fn test_showall_is_ordered_by_month_then_day() {
        let (flows, transport, _db) = seeded().await;
        command(&flows, "/showall").await.unwrap();
        assert_eq!(
            transport.last_text(),
            "**Search Results:**\n• Sanjay (January 02)\n• Priya (March 15)\n• Anna (June 15)\n• Bob (December 30)"
        );
    }

    #[tokio::test]
    async fn test_showall_empty() {
        let (flows, transport, _db) = setup().await;
        flows
            .handle(Inbound::Command {
                conversation_id: CHAT,
                command: Command::ShowAll,
            })
            .await
            .unwrap();
        assert_eq!(transport.last_text(), "***No Birthdays found***");
    }

    #[tokio::test]
    async fn test_search_by_name_is_case_insensitive_contains() {
        let (flows, transport, _db) = seeded().await;

        command(&flows, "/search").await.unwrap();
        assert_eq!(transport.last_text(), "Select the search type");
        press(&flows, &transport, "name").await.unwrap();
        assert_eq!(transport.last_text(), "Enter the name of the person to /search");

        reply(&flows, &transport, "AN").await.unwrap();
        assert_eq!(
            transport.last_text(),
            "**Search Results:**\n• Sanjay (January 02)\n• Anna (June 15)"
        );
    }

    #[tokio::test]
    async fn test_search_by_month_and_day() {
        let (flows, transport, _db) = seeded().await;

        command(&flows, "/search").await.unwrap();
        press(&flows, &transport, "month").await.unwrap();
        assert_eq!(transport.last_text(), "Select the month");
        press(&flows, &transport, "6").await.unwrap();
        assert_eq!(transport.last_text(), "**Search Results:**\n• Anna (June 15)");

        command(&flows, "/search").await.unwrap();
        press(&flows, &transport, "day").await.unwrap();
        assert_eq!(transport.last_text(), "Select the day");
        press(&flows, &transport, "15").await.unwrap();
        assert_eq!(
            transport.last_text(),
            "**Search Results:**\n• Priya (March 15)\n• Anna (June 15)"
        );
    }

    #[tokio::test]
    async fn test_search_by_date_uses_two_step_picker() {
        let (flows, transport, _db) = seeded().await;

        command(&flows, "/search").await.unwrap();
        press(&flows, &transport, "date").await.unwrap();
        assert_eq!(transport.last_text(), "Select the date");
        press(&flows, &transport, "3").await.unwrap();
        press(&flows, &transport, "15").await.unwrap();
        assert_eq!(transport.last_text(), "**Search Results:**\n• Priya (March 15)");
    }

    #[tokio::test]
    async fn test_blank_and_cancel_are_no_ops() {
        let (flows, transport, _db) = seeded().await;

        command(&flows, "/search").await.unwrap();
        press(&flows, &transport, "day").await.unwrap();
        let sent = transport.count();
        press(&flows, &transport, " ").await.unwrap();
        assert_eq!(transport.count(), sent);

        press(&flows, &transport, "cancel").await.unwrap();
        assert_eq!(transport.count(), sent);
        // the cancelled picker is now stale
        press(&flows, &transport, "15").await.unwrap();
        assert_eq!(transport.count(), sent);
        assert_eq!(flows.dialog().open_prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_mode_is_a_defect() {
        let (flows, transport, _db) = seeded().await;
        command(&flows, "/search").await.unwrap();
        let sent = transport.count();

        let err = press(&flows, &transport, "weekday").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FlowError>(),
            Some(FlowError::InvalidMode(mode)) if mode == "weekday"
        ));
        assert_eq!(transport.count(), sent);
    }

    #[tokio::test]
    async fn test_malformed_picker_value_asks_to_retry() {
        let (flows, transport, _db) = seeded().await;
        command(&flows, "/remove").await.unwrap();
        press(&flows, &transport, "month").await.unwrap();
        press(&flows, &transport, "13").await.unwrap();
        assert_eq!(transport.last_text(), "Something went wrong. Please try /remove again.");
    }

    #[tokio::test]
    async fn test_remove_and_edit_without_matches_report_no_results() {
        let (flows, transport, _db) = seeded().await;

        command(&flows, "/remove").await.unwrap();
        press(&flows, &transport, "name").await.unwrap();
        reply(&flows, &transport, "zzz").await.unwrap();
        let (_, message) = transport.last();
        assert_eq!(message.text, messages::NO_RESULTS);
        assert!(message.keyboard.is_none());

        command(&flows, "/edit").await.unwrap();
        press(&flows, &transport, "month").await.unwrap();
        press(&flows, &transport, "7").await.unwrap();
        let (_, message) = transport.last();
        assert_eq!(message.text, messages::NO_RESULTS);
        assert!(message.keyboard.is_none());
        assert_eq!(flows.dialog().open_prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_keeps_list_open_for_more_removals() {
        let (flows, transport, db) = seeded().await;

        command(&flows, "/remove").await.unwrap();
        press(&flows, &transport, "all").await.unwrap();
        assert_eq!(transport.last_text(), "Select the birthday to /remove");

        press(&flows, &transport, "=Anna").await.unwrap();
        assert_eq!(transport.last_text(), "**Removed Birthday** of Anna");
        press(&flows, &transport, "=Bob").await.unwrap();
        assert_eq!(transport.last_text(), "**Removed Birthday** of Bob");

        command(&flows, "/showall").await.unwrap();
        assert_eq!(
            transport.last_text(),
            "**Search Results:**\n• Sanjay (January 02)\n• Priya (March 15)"
        );
        // the other conversation's Anna is untouched
        assert!(db.find_by_name(OTHER_CHAT, "Anna").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_removing_missing_name_reports_success() {
        let (flows, transport, _db) = seeded().await;
        command(&flows, "/remove").await.unwrap();
        press(&flows, &transport, "all").await.unwrap();

        press(&flows, &transport, "=Anna").await.unwrap();
        press(&flows, &transport, "=Anna").await.unwrap();
        assert_eq!(transport.last_text(), "**Removed Birthday** of Anna");
    }

    #[tokio::test]
    async fn test_callbacks_from_other_conversations_are_ignored() {
        let (flows, transport, db) = seeded().await;
        command(&flows, "/remove").await.unwrap();
        press(&flows, &transport, "all").await.unwrap();
        let (message_id, token) = transport.prompt();
        let sent = transport.count();

        flows
            .handle(Inbound::Callback {
                conversation_id: OTHER_CHAT,
                message_id,
                token,
                choice: "=Anna".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(transport.count(), sent);
        assert!(db.find_by_name(OTHER_CHAT, "Anna").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_failures_become_retry_text() {
        let transport = Arc::new(RecordingTransport::default());
        let flows = BirthdayFlows::new(Arc::new(FailingStore), transport.clone());

        command(&flows, "/add Anna").await.unwrap();
        assert_eq!(transport.last_text(), "Something went wrong. Please try /add again.");
        assert_eq!(flows.dialog().pending_count(), 0);

        command(&flows, "/showall").await.unwrap();
        assert_eq!(transport.last_text(), "Something went wrong. Please try /showall again.");

        command(&flows, "/search").await.unwrap();
        press(&flows, &transport, "all").await.unwrap();
        assert_eq!(transport.last_text(), "Something went wrong. Please try /search again.");
    }

    #[tokio::test]
    async fn test_edit_rename() {
        let (flows, transport, db) = seeded().await;

        command(&flows, "/edit").await.unwrap();
        press(&flows, &transport, "all").await.unwrap();
        assert_eq!(transport.last_text(), "Select the birthday to /edit");
        press(&flows, &transport, "=Anna").await.unwrap();
        assert_eq!(transport.last_text(), "What do you want to change for 'Anna'?");
        press(&flows, &transport, "name").await.unwrap();
        assert_eq!(transport.last_text(), "Enter the new name for 'Anna'");

        reply(&flows, &transport, " Anne ").await.unwrap();
        assert_eq!(transport.last_text(), "**Renamed** Anna to Anne");
        assert_eq!(
            db.find_by_name(CHAT, "Anne").await.unwrap(),
            Some(Birthday::new(CHAT, "Anne", 15, 6))
        );
    }

    #[tokio::test]
    async fn test_edit_rename_onto_existing_name_asks_to_retry() {
        let (flows, transport, db) = seeded().await;

        command(&flows, "/edit").await.unwrap();
        press(&flows, &transport, "all").await.unwrap();
        press(&flows, &transport, "=Anna").await.unwrap();
        press(&flows, &transport, "name").await.unwrap();
        reply(&flows, &transport, "Bob").await.unwrap();

        assert_eq!(transport.last_text(), "Something went wrong. Please try /edit again.");
        assert!(db.find_by_name(CHAT, "Anna").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_edit_reschedule() {
        let (flows, transport, db) = seeded().await;

        command(&flows, "/edit").await.unwrap();
        press(&flows, &transport, "name").await.unwrap();
        reply(&flows, &transport, "bob").await.unwrap();
        press(&flows, &transport, "=Bob").await.unwrap();
        press(&flows, &transport, "date").await.unwrap();
        assert_eq!(transport.last_text(), "Select the Birthday of 'Bob'");
        press(&flows, &transport, "1").await.unwrap();
        press(&flows, &transport, "5").await.unwrap();

        assert_eq!(transport.last_text(), "**Updated Birthday** of Bob (January 05)");
        assert_eq!(
            db.find_by_name(CHAT, "Bob").await.unwrap(),
            Some(Birthday::new(CHAT, "Bob", 5, 1))
        );
    }

    #[tokio::test]
    async fn test_unrecognized_input_shows_help() {
        let (flows, transport, _db) = setup().await;

        command(&flows, "hello there").await.unwrap();
        assert_eq!(transport.last_text(), messages::HELP);

        command(&flows, "/start").await.unwrap();
        assert_eq!(transport.last_text(), messages::HELP);

        flows
            .handle(Inbound::Text {
                conversation_id: CHAT,
                reply_to: Some(424242),
                text: "Anna".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(transport.last_text(), messages::HELP);
    }
}
