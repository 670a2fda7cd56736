use crate::cache::NameCache;
use crate::capabilities::Capabilities;
use crate::config::BotConfig;
use crate::cooldown::{Cooldown, CooldownGate, REFRESH_COMMAND};
use crate::dlc::DlcScanner;
use crate::mods::{ModRecord, ModScanner};
use anyhow::Result;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{error, info};

pub const CHAT_SEGMENT_LIMIT: usize = 500;
pub const SEGMENT_DELAY: Duration = Duration::from_millis(500);

const NAME_DISPLAY_LIMIT: usize = 33;
const NAME_TRUNCATED_LEN: usize = 30;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub user: String,
    pub command: String,
}

type Handler = fn(&mut Bot, &ChatRequest) -> Result<String>;

pub struct Bot {
    cooldowns: CooldownGate,
    cache: Arc<NameCache>,
    scanner: ModScanner,
    dlc: DlcScanner,
    handlers: HashMap<&'static str, Handler>,
}

impl Bot {
    pub fn new(config: BotConfig, cache: Arc<NameCache>, caps: Capabilities) -> Self {
        let cooldowns = CooldownGate::new(
            Duration::from_secs(config.user_cooldown_secs),
            Duration::from_secs(config.refresh_cooldown_secs),
        );
        let dlc = DlcScanner::new(config.steam_dir.clone(), config.profile_dir.clone());
        let scanner = ModScanner::new(config, Arc::clone(&cache), caps.crypto);

        let mut handlers: HashMap<&'static str, Handler> = HashMap::new();
        handlers.insert("mods", Bot::handle_mods);
        handlers.insert(REFRESH_COMMAND, Bot::handle_refresh);

        Self {
            cooldowns,
            cache,
            scanner,
            dlc,
            handlers,
        }
    }

    pub fn known_commands(&self) -> Vec<&'static str> {
        let mut commands: Vec<&'static str> = self.handlers.keys().copied().collect();
        commands.sort_unstable();
        commands
    }

    pub fn dispatch(&mut self, request: &ChatRequest) -> Vec<String> {
        let Some(&handler) = self.handlers.get(request.command.as_str()) else {
            return Vec::new();
        };

        match self.cooldowns.check(&request.user, &request.command) {
            Cooldown::Ready => {}
            Cooldown::UserBlocked { remaining_secs } => {
                return vec![format!(
                    "@{}: ⏰ Please wait {remaining_secs} seconds before using commands again.",
                    request.user
                )];
            }
            Cooldown::RefreshBlocked { remaining_secs } => {
                return vec![format!(
                    "@{}: ⏰ Please wait {remaining_secs} seconds before refreshing mods again (global cooldown).",
                    request.user
                )];
            }
        }

        match handler(self, request) {
            Ok(response) => split_message(&response, CHAT_SEGMENT_LIMIT),
            Err(err) => {
                error!(command = %request.command, %err, "command handler failed");
                vec![format!(
                    "@{}: ❌ An error occurred. Please try again later.",
                    request.user
                )]
            }
        }
    }

    fn handle_mods(&mut self, _request: &ChatRequest) -> Result<String> {
        let mods = self.scanner.active_mods();
        let dlcs = self.dlc.active_dlc();
        Ok(format_response(&mods, &dlcs))
    }

    fn handle_refresh(&mut self, request: &ChatRequest) -> Result<String> {
        self.cache.clear();
        let mods = self.scanner.active_mods();
        info!(count = mods.len(), "cache refreshed");
        Ok(format!(
            "@{}: ✅ Mod cache refreshed! Found {} active mods. Use !mods to see the list.",
            request.user,
            mods.len()
        ))
    }
}

pub fn format_response(mods: &[ModRecord], dlcs: &[String]) -> String {
    if mods.is_empty() && dlcs.is_empty() {
        return "❌ No mods or DLC detected! Check your ETS2 installation paths.".to_string();
    }

    let mut parts = Vec::new();
    if mods.is_empty() {
        parts.push("🚛 MODS: None detected".to_string());
    } else {
        parts.push("🚛 MODS (Load Order - MUST MATCH FOR CONVOY): ".to_string());
        let formatted: Vec<String> = mods
            .iter()
            .enumerate()
            .map(|(rank, record)| format!("{}.{}", rank + 1, truncate_name(&record.display_name)))
            .collect();
        parts.push(formatted.join(" | "));
    }

    if dlcs.is_empty() {
        parts.push(" || 🗺️ DLC: None detected".to_string());
    } else {
        parts.push(format!(" || 🗺️ DLC: {}", dlcs.join(", ")));
    }

    parts.concat()
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() > NAME_DISPLAY_LIMIT {
        let cut: String = name.chars().take(NAME_TRUNCATED_LEN).collect();
        format!("{cut}...")
    } else {
        name.to_string()
    }
}

// Prefer breaking at a separator near the boundary instead of mid-token.
pub fn split_message(message: &str, limit: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut rest = message.trim();

    while !rest.is_empty() {
        if rest.chars().count() <= limit {
            segments.push(rest.to_string());
            break;
        }

        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(index, _)| index)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];
        let cut = window
            .rfind(['|', ',', ' '])
            .filter(|index| *index > 0)
            .unwrap_or(window_end);

        segments.push(rest[..cut].trim_end_matches(['|', ',', ' ']).to_string());
        rest = rest[cut..]
            .trim_start_matches(['|', ',', ' '])
            .trim_start();
    }

    segments.retain(|segment| !segment.is_empty());
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mods::ModOrigin;

    fn record(name: &str, order: u32) -> ModRecord {
        ModRecord {
            display_name: name.to_string(),
            identifier: format!("{name}.scs"),
            load_order: order,
            origin: ModOrigin::Profile,
        }
    }

    #[test]
    fn empty_lists_yield_nothing_detected() {
        assert_eq!(
            format_response(&[], &[]),
            "❌ No mods or DLC detected! Check your ETS2 installation paths."
        );
    }

    #[test]
    fn mods_are_ranked_and_joined() {
        let mods = [record("Alpha", 2), record("Bravo", 1)];
        let dlcs = vec!["Iberia".to_string(), "Scandinavia".to_string()];
        let response = format_response(&mods, &dlcs);
        assert!(response.contains("1.Alpha | 2.Bravo"));
        assert!(response.contains("|| 🗺️ DLC: Iberia, Scandinavia"));
    }

    #[test]
    fn long_names_are_truncated_with_ellipsis() {
        let name = "A".repeat(40);
        let mods = [record(&name, 0)];
        let response = format_response(&mods, &[]);
        let expected = format!("1.{}...", "A".repeat(30));
        assert!(response.contains(&expected));
        assert!(!response.contains(&"A".repeat(34)));
    }

    #[test]
    fn name_exactly_at_limit_is_kept() {
        let name = "B".repeat(33);
        let mods = [record(&name, 0)];
        let response = format_response(&mods, &[]);
        assert!(response.contains(&format!("1.{name}")));
        assert!(!response.contains("..."));
    }

    #[test]
    fn dlc_only_response_reports_no_mods() {
        let response = format_response(&[], &["Italia".to_string()]);
        assert!(response.starts_with("🚛 MODS: None detected"));
        assert!(response.ends_with("|| 🗺️ DLC: Italia"));
    }

    #[test]
    fn short_message_is_one_segment() {
        assert_eq!(split_message("1.Alpha | 2.Bravo", 500), ["1.Alpha | 2.Bravo"]);
    }

    #[test]
    fn long_message_breaks_at_separator() {
        let message = format!("{} | {}", "a".repeat(40), "b".repeat(40));
        let segments = split_message(&message, 50);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "a".repeat(40));
        assert_eq!(segments[1], "b".repeat(40));
    }

    #[test]
    fn segment_without_separator_breaks_at_limit() {
        let message = "x".repeat(120);
        let segments = split_message(&message, 50);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|segment| segment.chars().count() <= 50));
    }

    #[test]
    fn every_segment_respects_the_limit() {
        let items: Vec<String> = (1..60).map(|i| format!("{i}.Some Mod Name")).collect();
        let message = items.join(" | ");
        for segment in split_message(&message, CHAT_SEGMENT_LIMIT) {
            assert!(segment.chars().count() <= CHAT_SEGMENT_LIMIT);
        }
    }
}
