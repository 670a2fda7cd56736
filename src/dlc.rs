use regex::RegexBuilder;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const MAJOR_MAP_DLC: [(&str, &str); 8] = [
    ("east", "Going East!"),
    ("north", "Scandinavia"),
    ("fr", "Vive la France!"),
    ("it", "Italia"),
    ("balt", "Beyond the Baltic Sea"),
    ("iberia", "Iberia"),
    ("balkan_w", "West Balkans"),
    ("greece", "Greece"),
];

const PROFILE_CONFIG_FILES: [&str; 3] = ["profile.sii", "config.cfg", "config_local.cfg"];

pub struct DlcScanner {
    steam_dir: PathBuf,
    profile_dir: PathBuf,
    patterns: Vec<(Vec<regex::Regex>, &'static str)>,
}

impl DlcScanner {
    pub fn new(steam_dir: PathBuf, profile_dir: PathBuf) -> Self {
        let patterns = MAJOR_MAP_DLC
            .iter()
            .map(|(code, name)| {
                let escaped = regex::escape(code);
                let sources = [
                    format!(r"dlc_{escaped}\s*[:=]\s*[1-9]"),
                    format!(r"{escaped}\s*.*enabled"),
                    format!(r"{escaped}\s*.*active"),
                    format!(r#""{escaped}""#),
                ];
                let compiled = sources
                    .iter()
                    .filter_map(|source| {
                        RegexBuilder::new(source).case_insensitive(true).build().ok()
                    })
                    .collect();
                (compiled, *name)
            })
            .collect();
        Self {
            steam_dir,
            profile_dir,
            patterns,
        }
    }

    pub fn active_dlc(&self) -> Vec<String> {
        let mut found = BTreeSet::new();
        self.scan_steam_dir(&mut found);
        self.scan_profile_configs(&mut found);
        found.into_iter().collect()
    }

    fn scan_steam_dir(&self, found: &mut BTreeSet<String>) {
        let entries = match fs::read_dir(&self.steam_dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(path = %self.steam_dir.display(), %err, "cannot read steam dir");
                return;
            }
        };
        for entry in entries.filter_map(Result::ok) {
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(code) = name
                .strip_prefix("dlc_")
                .and_then(|rest| rest.strip_suffix(".scs"))
            else {
                continue;
            };
            if let Some((_, display)) = MAJOR_MAP_DLC.iter().find(|(key, _)| *key == code) {
                found.insert(display.to_string());
            }
        }
    }

    // Newest subdirectory, no validity filtering, so non-canonical profile
    // shapes still count.
    fn scan_profile_configs(&self, found: &mut BTreeSet<String>) {
        let Some(latest) = newest_subdir(&self.profile_dir) else {
            return;
        };
        for file in PROFILE_CONFIG_FILES {
            let path = latest.join(file);
            let Ok(bytes) = fs::read(&path) else {
                continue;
            };
            let content = String::from_utf8_lossy(&bytes);
            self.match_activation_flags(&content, found);
        }
    }

    fn match_activation_flags(&self, content: &str, found: &mut BTreeSet<String>) {
        for (patterns, name) in &self.patterns {
            if patterns.iter().any(|pattern| pattern.is_match(content)) {
                found.insert(name.to_string());
            }
        }
    }
}

fn newest_subdir(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .max_by_key(|path| {
            fs::metadata(path)
                .and_then(|meta| meta.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steam_archives_map_to_display_names() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["dlc_north.scs", "dlc_iberia.scs", "dlc_unknown.scs", "base.scs"] {
            fs::write(dir.path().join(file), b"x").unwrap();
        }
        let scanner = DlcScanner::new(dir.path().to_path_buf(), PathBuf::from("/nonexistent"));
        assert_eq!(scanner.active_dlc(), ["Iberia", "Scandinavia"]);
    }

    #[test]
    fn profile_flags_activate_dlc() {
        let steam = tempfile::tempdir().unwrap();
        let profiles = tempfile::tempdir().unwrap();
        let profile = profiles.path().join("deadbeef");
        fs::create_dir_all(&profile).unwrap();
        fs::write(
            profile.join("config.cfg"),
            "dlc_east: 1\nbalt is enabled here\n\"greece\"\n",
        )
        .unwrap();

        let scanner = DlcScanner::new(
            steam.path().to_path_buf(),
            profiles.path().to_path_buf(),
        );
        assert_eq!(
            scanner.active_dlc(),
            ["Beyond the Baltic Sea", "Going East!", "Greece"]
        );
    }

    #[test]
    fn missing_sources_contribute_nothing() {
        let scanner = DlcScanner::new(PathBuf::from("/nope"), PathBuf::from("/also/nope"));
        assert!(scanner.active_dlc().is_empty());
    }

    #[test]
    fn results_are_deduplicated_across_sources() {
        let steam = tempfile::tempdir().unwrap();
        let profiles = tempfile::tempdir().unwrap();
        fs::write(steam.path().join("dlc_it.scs"), b"x").unwrap();
        let profile = profiles.path().join("cafe");
        fs::create_dir_all(&profile).unwrap();
        fs::write(profile.join("config_local.cfg"), "dlc_it = 1\n").unwrap();

        let scanner = DlcScanner::new(
            steam.path().to_path_buf(),
            profiles.path().to_path_buf(),
        );
        assert_eq!(scanner.active_dlc(), ["Italia"]);
    }
}
