//! Prompt-cache breakpoints on recent user turns.

use deskpilot_core::message::{CacheControl, Conversation, Role};

/// How many user messages carry a breakpoint at once. The system block
/// takes the fourth slot the API allows.
pub const MAX_CACHE_BREAKPOINTS: usize = 3;

pub struct CacheBreakpointInjector;

impl CacheBreakpointInjector {
    /// Annotate the last block of the `max_breakpoints` newest non-empty
    /// user messages, and clear the stale annotation on the one just older
    /// than them. Earlier messages are left as they are.
    pub fn apply(conversation: &mut Conversation, max_breakpoints: usize) {
        let mut remaining = max_breakpoints;
        let user_turns = conversation
            .messages
            .iter_mut()
            .rev()
            .filter(|m| m.role == Role::User);

        for message in user_turns {
            let Some(last) = message.content.last_mut() else {
                continue;
            };
            if remaining > 0 {
                last.set_cache_control(Some(CacheControl::Ephemeral));
                remaining -= 1;
            } else {
                last.set_cache_control(None);
                break;
            }
        }
    }
}
