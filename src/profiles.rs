use crate::capabilities::CryptoSupport;
use crate::sii;
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, warn};

pub const PROFILE_FILE: &str = "profile.sii";

#[derive(Debug, Clone)]
pub struct ProfileCandidate {
    pub location: PathBuf,
    pub display_name: String,
    pub active_mod_count: u32,
    pub last_modified: SystemTime,
    pub container_label: String,
}

pub fn find_profiles(profile_dir: &Path, crypto: CryptoSupport) -> Vec<ProfileCandidate> {
    let mut candidates = Vec::new();
    let Some(docs_dir) = profile_dir.parent() else {
        return candidates;
    };
    let entries = match fs::read_dir(docs_dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(path = %docs_dir.display(), %err, "cannot read documents dir");
            return candidates;
        }
    };

    for entry in entries.filter_map(Result::ok) {
        let container = entry.path();
        if !container.is_dir() {
            continue;
        }
        let label = entry.file_name().to_string_lossy().into_owned();
        let lower = label.to_lowercase();
        // steam_profiles also matches the prefix but is a separate namespace
        if !lower.starts_with("profiles") || lower.starts_with("steam_profiles") {
            continue;
        }
        let subdirs = match fs::read_dir(&container) {
            Ok(subdirs) => subdirs,
            Err(err) => {
                warn!(path = %container.display(), %err, "skipping unreadable profile container");
                continue;
            }
        };
        for subdir in subdirs.filter_map(Result::ok) {
            let path = subdir.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(candidate) = analyze_profile(&path, &label, crypto) {
                candidates.push(candidate);
            }
        }
    }

    candidates
}

// A zero-mod profile still wins if it is the newest.
pub fn latest_profile(candidates: &[ProfileCandidate]) -> Option<&ProfileCandidate> {
    candidates.iter().max_by_key(|candidate| candidate.last_modified)
}

fn analyze_profile(
    dir: &Path,
    container_label: &str,
    crypto: CryptoSupport,
) -> Option<ProfileCandidate> {
    let profile_file = dir.join(PROFILE_FILE);
    let metadata = fs::metadata(&profile_file).ok()?;
    let last_modified = metadata.modified().ok()?;

    let active_mod_count = sii::decode_file(&profile_file, crypto)
        .map(|content| parse_mod_count(&content))
        .unwrap_or(0);

    let raw_name = dir.file_name()?.to_string_lossy().into_owned();
    let display_name = hex_to_display_name(&raw_name);

    Some(ProfileCandidate {
        location: dir.to_path_buf(),
        display_name,
        active_mod_count,
        last_modified,
        container_label: container_label.to_string(),
    })
}

pub fn parse_mod_count(content: &str) -> u32 {
    for line in content.lines() {
        if let Some(rest) = line.split_once("active_mods:").map(|(_, rest)| rest) {
            return rest.trim().parse().unwrap_or(0);
        }
    }
    0
}

// Profile directory names are hex-encoded; fall back to the raw name when the
// decoded form is not sane ASCII.
pub fn hex_to_display_name(name: &str) -> String {
    if !name.chars().all(|c| c.is_ascii_hexdigit()) {
        return name.to_string();
    }
    if name.len() % 2 != 0 || name.len() < 4 || name.len() > 100 {
        return name.to_string();
    }
    let Some(bytes) = decode_hex(name) else {
        return name.to_string();
    };

    for decoded in [decode_utf8(&bytes), decode_utf16_le(&bytes)]
        .into_iter()
        .flatten()
    {
        let cleaned: String = decoded.chars().filter(|c| !c.is_control()).collect();
        if !cleaned.is_empty() && cleaned.chars().count() >= 2 && cleaned.is_ascii() {
            return cleaned;
        }
    }

    name.to_string()
}

fn decode_hex(name: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = name.bytes().collect();
    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks_exact(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        bytes.push((hi * 16 + lo) as u8);
    }
    Some(bytes)
}

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    String::from_utf8(bytes.to_vec()).ok()
}

fn decode_utf16_le(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}
