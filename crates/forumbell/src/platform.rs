//! Terminal implementation of the registry's platform hooks.

use owo_colors::OwoColorize;

use forumbell_core::Platform;

/// Alerts go to stderr; a terminal has no badge.
#[derive(Debug, Clone)]
pub struct TerminalPlatform {
    device_name: String,
    color: bool,
}

impl TerminalPlatform {
    pub fn new(device_name: String, color: bool) -> Self {
        Self { device_name, color }
    }
}

impl Platform for TerminalPlatform {
    fn device_name(&self) -> String {
        self.device_name.clone()
    }

    fn alert(&self, message: &str) {
        if self.color {
            eprintln!("{} {}", "!".yellow().bold(), message.yellow());
        } else {
            eprintln!("! {message}");
        }
    }
}
