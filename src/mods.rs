use crate::cache::NameCache;
use crate::capabilities::CryptoSupport;
use crate::config::BotConfig;
use crate::names::NameResolver;
use crate::profiles::{self, PROFILE_FILE};
use crate::sii;
use regex::Regex;
use std::{fs, path::Path, sync::Arc, sync::OnceLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModRecord {
    pub display_name: String,
    pub identifier: String,
    pub load_order: u32,
    pub origin: ModOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModOrigin {
    Profile,
    Folder,
}

// The highest index applies first, so the result is sorted by index descending.
pub fn extract_active_mods(content: &str) -> Vec<ModRecord> {
    let mut entries: Vec<(u32, &str, &str)> = active_mods_re()
        .captures_iter(content)
        .filter_map(|caps| {
            let index: u32 = caps.get(1)?.as_str().parse().ok()?;
            Some((index, caps.get(2)?.as_str(), caps.get(3)?.as_str()))
        })
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0));

    entries
        .into_iter()
        .filter_map(|(index, identifier, display_name)| {
            let display_name = display_name.trim();
            // placeholder noise
            if display_name.chars().count() <= 2 {
                return None;
            }
            Some(ModRecord {
                display_name: display_name.to_string(),
                identifier: identifier.to_string(),
                load_order: index,
                origin: ModOrigin::Profile,
            })
        })
        .collect()
}

fn active_mods_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?im)active_mods\[(\d+)\]:\s*"([^|]+)\|([^"]+)""#)
            .expect("valid active_mods regex")
    })
}

pub struct ModScanner {
    config: BotConfig,
    crypto: CryptoSupport,
    resolver: NameResolver,
}

impl ModScanner {
    pub fn new(config: BotConfig, cache: Arc<NameCache>, crypto: CryptoSupport) -> Self {
        Self {
            config,
            crypto,
            resolver: NameResolver::new(cache),
        }
    }

    pub fn active_mods(&self) -> Vec<ModRecord> {
        let from_profile = self.from_profile();
        if !from_profile.is_empty() {
            info!(count = from_profile.len(), "found active mods in profile");
            return from_profile;
        }

        warn!("no profile mods found, falling back to mod folder scan");
        self.from_folder()
    }

    fn from_profile(&self) -> Vec<ModRecord> {
        let candidates = profiles::find_profiles(&self.config.profile_dir, self.crypto);
        let Some(latest) = profiles::latest_profile(&candidates) else {
            return Vec::new();
        };
        info!(
            profile = %latest.display_name,
            container = %latest.container_label,
            "using most recent profile"
        );

        // A newest profile reporting zero mods is authoritative; never reach
        // for an older profile that still lists some.
        if latest.active_mod_count == 0 {
            return Vec::new();
        }

        let Some(content) = sii::decode_file(&latest.location.join(PROFILE_FILE), self.crypto)
        else {
            return Vec::new();
        };
        extract_active_mods(&content)
    }

    fn from_folder(&self) -> Vec<ModRecord> {
        let mut archives = list_scs_archives(&self.config.mod_dir);
        archives.sort();

        archives
            .iter()
            .enumerate()
            .map(|(position, name)| ModRecord {
                display_name: self.resolver.resolve(&self.config.mod_dir.join(name)),
                identifier: name.clone(),
                load_order: position as u32,
                origin: ModOrigin::Folder,
            })
            .collect()
    }
}

fn list_scs_archives(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(path = %dir.display(), %err, "cannot read mod folder");
            return Vec::new();
        }
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.to_lowercase().ends_with(".scs").then_some(name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_come_back_in_reverse_index_order() {
        let content = concat!(
            "active_mods[1]: \"mod_b|Bravo\"\n",
            "active_mods[0]: \"mod_a|Alpha\"\n",
            "active_mods[2]: \"mod_c|Charlie\"\n",
        );
        let mods = extract_active_mods(content);
        let names: Vec<&str> = mods.iter().map(|m| m.display_name.as_str()).collect();
        assert_eq!(names, ["Charlie", "Bravo", "Alpha"]);
        assert_eq!(mods[0].load_order, 2);
        assert_eq!(mods[2].load_order, 0);
        assert!(mods.iter().all(|m| m.origin == ModOrigin::Profile));
    }

    #[test]
    fn short_display_names_are_noise() {
        let content = concat!(
            "active_mods[0]: \"mod_a|ab\"\n",
            "active_mods[1]: \"mod_b|abc\"\n",
        );
        let mods = extract_active_mods(content);
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].display_name, "abc");
    }

    #[test]
    fn display_name_keeps_extra_pipes() {
        let content = "active_mods[0]: \"mod_a|Name | Extra\"\n";
        let mods = extract_active_mods(content);
        assert_eq!(mods[0].identifier, "mod_a");
        assert_eq!(mods[0].display_name, "Name | Extra");
    }

    #[test]
    fn no_entries_is_an_empty_list() {
        assert!(extract_active_mods("SiiNunit {}").is_empty());
    }
}
