use crate::cache::NameCache;
use regex::Regex;
use std::{fs::File, io::Read, path::Path, sync::Arc, sync::OnceLock, time::Duration};
use tracing::debug;

const WORKSHOP_URL: &str = "https://steamcommunity.com/workshop/browse/";
const ETS2_APP_ID: &str = "227300";

const FUNCTION_WORDS: [&str; 10] = ["v", "by", "for", "and", "the", "of", "to", "in", "on", "at"];

// cache, then embedded manifest, then workshop search, then filename cleanup
pub struct NameResolver {
    cache: Arc<NameCache>,
    agent: ureq::Agent,
}

impl NameResolver {
    pub fn new(cache: Arc<NameCache>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(5))
            .timeout_write(Duration::from_secs(5))
            .build();
        Self { cache, agent }
    }

    pub fn resolve(&self, archive: &Path) -> String {
        let key = archive
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| archive.to_string_lossy().into_owned());

        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }

        if let Some(name) = manifest_name(archive) {
            self.cache.set(&key, &name);
            return name;
        }

        if let Some(name) = self.workshop_name(&key) {
            self.cache.set(&key, &name);
            return name;
        }

        let cleaned = clean_filename(&key);
        self.cache.set(&key, &cleaned);
        cleaned
    }

    fn workshop_name(&self, filename: &str) -> Option<String> {
        let stem = Path::new(filename)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let search_term = stem.replace(['_', '-'], " ");

        let response = self
            .agent
            .get(WORKSHOP_URL)
            .query("appid", ETS2_APP_ID)
            .query("searchtext", search_term.trim())
            .query("browsesort", "trend")
            .query("section", "readytouseitems")
            .call()
            .ok()?;
        let body = response.into_string().ok()?;
        let title = workshop_title_re()
            .captures(&body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())?;
        if title.is_empty() {
            None
        } else {
            Some(title)
        }
    }
}

fn manifest_name(archive: &Path) -> Option<String> {
    let file = File::open(archive).ok()?;
    let mut zip = zip::ZipArchive::new(file).ok()?;
    let mut entry = match zip.by_name("manifest.sii") {
        Ok(entry) => entry,
        Err(err) => {
            debug!(archive = %archive.display(), %err, "no manifest.sii in archive");
            return None;
        }
    };
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).ok()?;
    let content = String::from_utf8_lossy(&bytes);
    let name = manifest_name_re()
        .captures(&content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())?;
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub fn clean_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let spaced = stem.replace(['_', '-'], " ");

    let mut words = Vec::new();
    for token in spaced.split_whitespace() {
        let lower = token.to_lowercase();
        if FUNCTION_WORDS.contains(&lower.as_str()) {
            words.push(lower);
        } else if is_version_token(token) {
            words.push(token.to_uppercase());
        } else if lower.starts_with("promods") {
            words.push(promods_token(token));
        } else {
            words.push(title_case(token));
        }
    }
    words.join(" ")
}

// v1.2 -> V1.2
fn is_version_token(token: &str) -> bool {
    let Some(rest) = token.strip_prefix('v') else {
        return false;
    };
    let digits: String = rest.chars().filter(|c| *c != '.' && *c != '_').collect();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

// "promodsmapv2" -> "ProMods Map V2"
fn promods_token(token: &str) -> String {
    let parts: Vec<&str> = token.split('v').collect();
    if parts.len() > 1 {
        let remainder = title_case(&parts[0][parts[0].len().min(7)..]);
        let joined = format!("ProMods {} V{}", remainder, parts[1]);
        joined.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        title_case(token)
    }
}

fn title_case(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut boundary = true;
    for ch in token.chars() {
        if ch.is_alphabetic() {
            if boundary {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(ch);
            boundary = true;
        }
    }
    out
}

fn manifest_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"mod_name:\s*"(.*?)""#).expect("valid manifest regex"))
}

fn workshop_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<div class="workshopItemTitle">(.+?)</div>"#).expect("valid title regex")
    })
}
