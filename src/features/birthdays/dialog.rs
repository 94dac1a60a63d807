//! Dialog state shared by concurrent handler invocations
//!
//! Holds the pending `/add` per conversation and the registry of outstanding
//! prompts. Owned by one flow engine instance; nothing here is process-global.
//!
//! A conversation has at most one live prompt and one awaited reply per flow.
//! Opening a new one retires the previous, so the registry stays bounded by
//! the number of conversations.

use dashmap::DashMap;
use uuid::Uuid;

use super::model::ConversationId;
use super::transport::MessageId;

/// Correlation token carried by every keyboard the bot sends
pub type FlowToken = Uuid;

/// Command whose search results the flow is collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Search,
    Remove,
    Edit,
}

impl Action {
    /// Command word without the slash
    pub fn command(&self) -> &'static str {
        match self {
            Action::Search => "search",
            Action::Remove => "remove",
            Action::Edit => "edit",
        }
    }
}

/// Two-step date picker: month first, then a day valid for that month
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStep {
    Month,
    Day { month: u32 },
}

/// Where a flow is waiting for input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// `/add` waiting for its date
    AddDate(DateStep),
    /// Search type picker
    Mode(Action),
    Day(Action),
    Month(Action),
    Date(Action, DateStep),
    /// Free-text reply naming who to look up
    Name(Action),
    /// Selection list feeding deletions; stays open after each removal
    RemovePick,
    EditPick,
    EditField { name: String },
    /// Free-text reply carrying the new name
    Rename { name: String },
    Reschedule { name: String, step: DateStep },
}

impl Stage {
    /// Flow label used in log lines
    pub fn flow(&self) -> &'static str {
        match self {
            Stage::AddDate(_) => "add",
            Stage::Mode(action)
            | Stage::Day(action)
            | Stage::Month(action)
            | Stage::Date(action, _)
            | Stage::Name(action) => action.command(),
            Stage::RemovePick => "remove",
            Stage::EditPick
            | Stage::EditField { .. }
            | Stage::Rename { .. }
            | Stage::Reschedule { .. } => "edit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAdd {
    pub conversation_id: ConversationId,
    pub name: String,
}

#[derive(Debug, Clone)]
struct Prompt {
    conversation_id: ConversationId,
    stage: Stage,
}

/// Slot holding the one live prompt or reply of a flow in a conversation
type FlowSlot = (ConversationId, &'static str);

#[derive(Default)]
pub struct DialogState {
    pending: DashMap<ConversationId, PendingAdd>,
    prompts: DashMap<FlowToken, Prompt>,
    live_prompts: DashMap<FlowSlot, FlowToken>,
    replies: DashMap<(ConversationId, MessageId), Stage>,
    live_replies: DashMap<FlowSlot, MessageId>,
}

impl DialogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the name an `/add` is waiting to date. Overwrites any earlier one.
    pub fn set_pending(&self, conversation_id: ConversationId, name: impl Into<String>) {
        self.pending.insert(
            conversation_id,
            PendingAdd {
                conversation_id,
                name: name.into(),
            },
        );
    }

    /// Atomically remove and return the pending add for a conversation
    pub fn take_pending(&self, conversation_id: ConversationId) -> Option<PendingAdd> {
        self.pending.remove(&conversation_id).map(|(_, pending)| pending)
    }

    /// Name of the pending add without consuming it
    pub fn peek_pending(&self, conversation_id: ConversationId) -> Option<String> {
        self.pending.get(&conversation_id).map(|pending| pending.name.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Register a keyboard prompt and return the token its buttons must carry.
    /// Any earlier prompt of the same flow in this conversation goes stale.
    pub fn open_prompt(&self, conversation_id: ConversationId, stage: Stage) -> FlowToken {
        let token = Uuid::new_v4();
        let slot = (conversation_id, stage.flow());
        self.prompts.insert(
            token,
            Prompt {
                conversation_id,
                stage,
            },
        );
        if let Some(previous) = self.live_prompts.insert(slot, token) {
            self.prompts.remove(&previous);
        }
        token
    }

    /// Current stage of a prompt, if the token is live and belongs to this conversation
    pub fn prompt_stage(&self, token: FlowToken, conversation_id: ConversationId) -> Option<Stage> {
        self.prompts
            .get(&token)
            .filter(|prompt| prompt.conversation_id == conversation_id)
            .map(|prompt| prompt.stage.clone())
    }

    /// Move a live prompt to its next stage. Returns false if the token is gone.
    pub fn advance_prompt(&self, token: FlowToken, conversation_id: ConversationId, stage: Stage) -> bool {
        match self.prompts.get_mut(&token) {
            Some(mut prompt) if prompt.conversation_id == conversation_id => {
                prompt.stage = stage;
                true
            }
            _ => false,
        }
    }

    /// Retire a prompt so later presses on it are ignored
    pub fn close_prompt(&self, token: FlowToken, conversation_id: ConversationId) -> Option<Stage> {
        let (_, prompt) = self
            .prompts
            .remove_if(&token, |_, prompt| prompt.conversation_id == conversation_id)?;
        self.live_prompts
            .remove_if(&(conversation_id, prompt.stage.flow()), |_, live| *live == token);
        Some(prompt.stage)
    }

    pub fn open_prompt_count(&self) -> usize {
        self.prompts.len()
    }

    /// Expect a free-text reply to `message_id`, replacing the flow's earlier one
    pub fn await_reply(&self, conversation_id: ConversationId, message_id: MessageId, stage: Stage) {
        let slot = (conversation_id, stage.flow());
        self.replies.insert((conversation_id, message_id), stage);
        if let Some(previous) = self.live_replies.insert(slot, message_id) {
            if previous != message_id {
                self.replies.remove(&(conversation_id, previous));
            }
        }
    }

    /// Consume the stage a reply to `message_id` answers
    pub fn take_reply(&self, conversation_id: ConversationId, message_id: MessageId) -> Option<Stage> {
        let (_, stage) = self.replies.remove(&(conversation_id, message_id))?;
        self.live_replies
            .remove_if(&(conversation_id, stage.flow()), |_, live| *live == message_id);
        Some(stage)
    }

    pub fn awaited_reply_count(&self) -> usize {
        self.replies.len()
    }
}
