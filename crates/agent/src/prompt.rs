//! System prompt for screen-control sessions.

use chrono::Local;
use deskpilot_core::message::{CacheControl, TextBlock};

const PREAMBLE: &str = "\
<SYSTEM_CAPABILITY>
* You control a desktop computer ({arch} architecture) through the `computer` tool: \
you see it through screenshots and act on it with the mouse and keyboard.
* Applications can be slow to open or redraw. After an action that should change the \
screen, wait or take another screenshot to confirm the result before moving on.
* Use the `run_command` action for shell work instead of opening a terminal window, and \
redirect large outputs to a file you then search.
* Zoom out or scroll to see a whole page before deciding that something is missing.
* Several actions can be requested in one response; they run in order.
* The current date is {date}.
</SYSTEM_CAPABILITY>

<IMPORTANT>
Do not install new software and do not delete files.
</IMPORTANT>";

/// Renders the system prompt sent with every model call.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    suffix: String,
}

impl SystemPrompt {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }

    pub fn render(&self) -> String {
        let date = Local::now().format("%A, %B %-d, %Y").to_string();
        let base = PREAMBLE
            .replace("{arch}", std::env::consts::ARCH)
            .replace("{date}", &date);
        if self.suffix.trim().is_empty() {
            base
        } else {
            format!("{base} {}", self.suffix)
        }
    }

    /// The prompt as a single system block, cache-annotated when prompt
    /// caching is on.
    pub fn blocks(&self, caching: bool) -> Vec<TextBlock> {
        vec![TextBlock {
            text: self.render(),
            cache_control: caching.then_some(CacheControl::Ephemeral),
        }]
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::new("")
    }
}
