//! Conversation front-end
//!
//! - `events`: transport-neutral inbound events and ids
//! - `messenger`: the outbound seam the core talks to
//! - `dispatcher`: per-user state machines driven by inbound events
//! - `telegram`: teloxide adapter for both directions

mod dispatcher;
mod events;
mod messenger;
pub mod telegram;

pub use dispatcher::Dispatcher;
pub use events::{
    command_name, ChatId, EventPayload, InboundEvent, MenuAction, MenuSelection, MessageRef, UserId,
};
pub use messenger::{Messenger, OutputKind};
