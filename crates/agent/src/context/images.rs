//! Screenshot retention.
//!
//! Every computer action returns a screenshot, so long sessions accumulate
//! images the model no longer needs. This policy keeps only the most recent
//! ones. Removal happens in multiples of a chunk size so the conversation
//! prefix stays stable between several consecutive calls.

use deskpilot_core::message::{ContentBlock, Conversation};
use tracing::debug;

pub struct ImageRetentionPolicy;

impl ImageRetentionPolicy {
    /// Drop the oldest images so that about `keep` remain.
    ///
    /// The number removed is rounded down to a multiple of
    /// `min_removal_chunk`, so up to `keep + chunk - 1` images can survive.
    /// `keep == 0` disables the policy. Returns how many images were removed.
    pub fn apply(conversation: &mut Conversation, keep: usize, min_removal_chunk: usize) -> usize {
        if keep == 0 {
            return 0;
        }
        let chunk = min_removal_chunk.max(1);
        let total = conversation.image_count();
        let mut to_remove = total.saturating_sub(keep);
        to_remove -= to_remove % chunk;
        if to_remove == 0 {
            return 0;
        }

        let mut remaining = to_remove;
        for message in &mut conversation.messages {
            for block in &mut message.content {
                let ContentBlock::ToolResult(result) = block else {
                    continue;
                };
                result.content.retain(|item| {
                    if remaining > 0 && item.is_image() {
                        remaining -= 1;
                        false
                    } else {
                        true
                    }
                });
            }
        }

        debug!(total, removed = to_remove, "Pruned old screenshots");
        to_remove
    }
}
