//! # Subtree Configuration
//!
//! This module parses persisted configuration text into [`SubtreeRecord`]s
//! and tool [`Settings`]. The text uses a subset of git's configuration
//! syntax, so the same parser reads both the repository's own git config
//! and the tracked `.gitsubtrees` manifests that declare nested subtrees.
//!
//! ## Format
//!
//! ```text
//! [subtree "vendor/lib"]
//!     url = git@example.com:org/lib.git
//!     branch = release-1.x
//!
//! [rp]
//!     remote = upstream
//!     defaultBranch = main
//!     maxDepth = 8
//! ```
//!
//! - Section and key names are case-insensitive; the quoted subsection is not.
//! - A `[subtree "<id>"]` block declares one subtree. The id is its path
//!   unless a `path` key overrides it. Blocks with the same id merge, later
//!   keys winning, the way git itself reads repeated sections.
//! - `#` and `;` start a comment anywhere outside double quotes.
//! - Values may be double-quoted; `\"`, `\\`, `\t` and `\n` are unescaped.
//!
//! Each block parses to a [`BlockParse`]: either a valid record or a
//! malformed block with a reason. Malformed blocks are skipped with a
//! warning; they never stop the other blocks from applying.

use std::path::{Component, Path};
use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use serde::Serialize;

use crate::defaults::{
    DEFAULT_BRANCH, DEFAULT_MAX_DEPTH, DEFAULT_REMOTE, SETTINGS_SECTION, SUBTREE_SECTION,
};
use crate::error::Error;

/// One embedded repository slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubtreeRecord {
    /// Directory the subtree occupies, relative to the scope it was declared in.
    pub path: String,
    /// Remote the extracted history is pushed to.
    pub url: String,
    /// Branch to update on that remote.
    pub branch: String,
}

impl SubtreeRecord {
    pub fn new(path: impl Into<String>, url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            branch: branch.into(),
        }
    }
}

/// Result of parsing one subtree block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockParse {
    Valid(SubtreeRecord),
    Malformed {
        /// Subsection id, when the header had one.
        id: Option<String>,
        /// 1-based line of the block header (or offending line).
        line: usize,
        reason: String,
    },
}

impl BlockParse {
    /// Convert a malformed block into the warning error it represents.
    pub fn to_warning(&self) -> Option<Error> {
        match self {
            BlockParse::Valid(_) => None,
            BlockParse::Malformed { id, line, reason } => Some(Error::ConfigParse {
                message: match id {
                    Some(id) => format!("subtree block \"{}\" (line {}): {}", id, line, reason),
                    None => format!("subtree block at line {}: {}", line, reason),
                },
                hint: Some(
                    "each block needs the form [subtree \"<path>\"] with a 'url = <remote>' entry"
                        .to_string(),
                ),
            }),
        }
    }
}

/// A `key = value` line inside a section.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    /// Lower-cased key name
    key: String,
    /// `None` for a bare key without `=`
    value: Option<String>,
    line: usize,
}

/// A `[name "subsection"]` block and the entries that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    /// Lower-cased section name
    name: String,
    subsection: Option<String>,
    line: usize,
    entries: Vec<Entry>,
    /// Syntax problems found while reading this section
    errors: Vec<String>,
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r#"^\[\s*([A-Za-z0-9.-]+)\s*(?:"((?:[^"\\]|\\.)*)")?\s*\]$"#)
            .expect("static header pattern is valid")
    })
}

fn key_regex() -> &'static Regex {
    static KEY: OnceLock<Regex> = OnceLock::new();
    KEY.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").expect("static key pattern is valid"))
}

/// Split a raw value into its unquoted text, dropping any trailing comment.
fn parse_value(raw: &str) -> Result<String, String> {
    let mut value = String::new();
    let mut in_quotes = false;
    let mut chars = raw.chars();
    // Whitespace outside quotes is kept only between other characters
    let mut pending_space = String::new();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                value.push_str(&pending_space);
                pending_space.clear();
                in_quotes = !in_quotes;
            }
            '\\' => {
                let escaped = match chars.next() {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('t') => '\t',
                    Some('n') => '\n',
                    Some(other) => return Err(format!("unknown escape sequence '\\{}'", other)),
                    None => return Err("dangling backslash at end of value".to_string()),
                };
                value.push_str(&pending_space);
                pending_space.clear();
                value.push(escaped);
            }
            '#' | ';' if !in_quotes => break,
            c if c.is_whitespace() && !in_quotes => {
                if !value.is_empty() {
                    pending_space.push(c);
                }
            }
            c => {
                value.push_str(&pending_space);
                pending_space.clear();
                value.push(c);
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted value".to_string());
    }
    Ok(value)
}

fn unescape_subsection(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split configuration text into sections.
///
/// Entries before the first header are ignored; git itself rejects them, and
/// they cannot belong to a subtree block.
fn parse_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if trimmed.starts_with('[') {
            // Only a comment may follow the closing bracket
            let header = header_end(trimmed).and_then(|end| {
                let rest = trimmed[end + 1..].trim();
                (rest.is_empty() || rest.starts_with('#') || rest.starts_with(';'))
                    .then(|| &trimmed[..=end])
            });

            match header.and_then(|h| header_regex().captures(h)) {
                Some(caps) => sections.push(Section {
                    name: caps[1].to_lowercase(),
                    subsection: caps.get(2).map(|m| unescape_subsection(m.as_str())),
                    line: line_no,
                    entries: Vec::new(),
                    errors: Vec::new(),
                }),
                None => sections.push(Section {
                    name: guess_section_name(trimmed),
                    subsection: None,
                    line: line_no,
                    entries: Vec::new(),
                    errors: vec![format!("invalid section header '{}'", trimmed)],
                }),
            }
            continue;
        }

        let Some(section) = sections.last_mut() else {
            debug!("ignoring line {} outside of any section", line_no);
            continue;
        };

        let (key, value) = match trimmed.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value)),
            None => {
                // A bare key may still carry a trailing comment
                let key = trimmed
                    .split(['#', ';'])
                    .next()
                    .unwrap_or_default()
                    .trim();
                (key, None)
            }
        };

        if !key_regex().is_match(key) {
            section
                .errors
                .push(format!("line {}: invalid key '{}'", line_no, key));
            continue;
        }

        let value = match value.map(parse_value).transpose() {
            Ok(value) => value,
            Err(reason) => {
                section.errors.push(format!("line {}: {}", line_no, reason));
                continue;
            }
        };

        section.entries.push(Entry {
            key: key.to_lowercase(),
            value,
            line: line_no,
        });
    }

    sections
}

/// Byte index of the `]` closing a section header, skipping quoted text.
fn header_end(line: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ']' if !in_quotes => return Some(index),
            _ => {}
        }
    }
    None
}

/// Best-effort section name for a header that failed to parse, so a broken
/// `[subtree ...` header is still reported as a malformed subtree block.
fn guess_section_name(header: &str) -> String {
    header
        .trim_start_matches('[')
        .split(|c: char| c.is_whitespace() || c == '"' || c == ']')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Normalise a declared subtree path, rejecting anything not repository-relative.
fn normalize_path(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err("path is empty".to_string());
    }

    let path = Path::new(trimmed);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(format!("path '{}' escapes its repository via '..'", raw))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("path '{}' must be relative", raw))
            }
        }
    }
    Ok(trimmed.to_string())
}

/// Parse every subtree block in `text`, in declaration order.
///
/// Sections that share an id are merged into the first occurrence, so the
/// result holds at most one entry per id.
pub fn parse_blocks(text: &str, default_branch: &str) -> Vec<BlockParse> {
    // Merge same-id sections while keeping first-seen order
    let mut merged: Vec<Section> = Vec::new();
    for section in parse_sections(text) {
        if section.name != SUBTREE_SECTION {
            continue;
        }
        let existing = section.subsection.as_ref().and_then(|id| {
            merged
                .iter_mut()
                .find(|s| s.subsection.as_ref() == Some(id) && s.errors.is_empty())
        });
        match existing {
            Some(target) if section.errors.is_empty() => target.entries.extend(section.entries),
            _ => merged.push(section),
        }
    }

    merged
        .into_iter()
        .map(|section| block_from_section(section, default_branch))
        .collect()
}

fn block_from_section(section: Section, default_branch: &str) -> BlockParse {
    let malformed = |reason: String| BlockParse::Malformed {
        id: section.subsection.clone(),
        line: section.line,
        reason,
    };

    if let Some(error) = section.errors.first() {
        return malformed(error.clone());
    }

    let mut path = section.subsection.clone();
    let mut url: Option<String> = None;
    let mut branch: Option<String> = None;

    for entry in &section.entries {
        let Some(value) = entry.value.clone() else {
            return malformed(format!("line {}: '{}' has no value", entry.line, entry.key));
        };
        match entry.key.as_str() {
            "path" => path = Some(value),
            "url" => url = Some(value),
            "branch" => branch = Some(value),
            other => debug!("ignoring unknown subtree key '{}' at line {}", other, entry.line),
        }
    }

    let Some(raw_path) = path else {
        return malformed("block has no path".to_string());
    };
    let path = match normalize_path(&raw_path) {
        Ok(path) => path,
        Err(reason) => return malformed(reason),
    };

    let url = match url {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => return malformed("block has no url".to_string()),
    };

    let branch = branch
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| default_branch.to_string());

    BlockParse::Valid(SubtreeRecord { path, url, branch })
}

/// Discover the subtree records declared in `text`.
///
/// Malformed blocks are logged as warnings and skipped. Empty text, or text
/// without subtree blocks, yields an empty list.
pub fn discover(text: &str, default_branch: &str) -> Vec<SubtreeRecord> {
    parse_blocks(text, default_branch)
        .into_iter()
        .filter_map(|block| match block {
            BlockParse::Valid(record) => Some(record),
            malformed => {
                if let Some(warning) = malformed.to_warning() {
                    warn!("{}", warning);
                }
                None
            }
        })
        .collect()
}

/// Append `secondary` records whose paths `primary` does not already declare.
pub fn merge_records(
    mut primary: Vec<SubtreeRecord>,
    secondary: Vec<SubtreeRecord>,
) -> Vec<SubtreeRecord> {
    for record in secondary {
        if primary.iter().any(|existing| existing.path == record.path) {
            debug!(
                "subtree '{}' declared twice in one scope; keeping the first declaration",
                record.path
            );
            continue;
        }
        primary.push(record);
    }
    primary
}

/// Tool settings read from the `[rp]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub remote: String,
    pub default_branch: String,
    pub max_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Values given on the command line or through the environment.
///
/// Each `Some` replaces whatever the configuration text says.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub remote: Option<String>,
    pub default_branch: Option<String>,
    pub max_depth: Option<usize>,
}

impl Settings {
    /// Read settings from configuration text, falling back to defaults.
    pub fn from_config_text(text: &str) -> Self {
        let mut settings = Settings::default();

        for section in parse_sections(text) {
            if section.name != SETTINGS_SECTION || section.subsection.is_some() {
                continue;
            }
            for error in &section.errors {
                warn!("[{}] section: {}", SETTINGS_SECTION, error);
            }
            for entry in section.entries {
                let Some(value) = entry.value.filter(|v| !v.trim().is_empty()) else {
                    warn!(
                        "[{}] {} at line {} has no value; ignoring",
                        SETTINGS_SECTION, entry.key, entry.line
                    );
                    continue;
                };
                match entry.key.as_str() {
                    "remote" => settings.remote = value.trim().to_string(),
                    "defaultbranch" => settings.default_branch = value.trim().to_string(),
                    "maxdepth" => match value.trim().parse::<usize>() {
                        Ok(depth) if depth > 0 => settings.max_depth = depth,
                        _ => warn!(
                            "[{}] maxDepth '{}' is not a positive integer; using {}",
                            SETTINGS_SECTION, value, settings.max_depth
                        ),
                    },
                    other => debug!("ignoring unknown setting '{}'", other),
                }
            }
        }

        settings
    }

    pub fn with_overrides(mut self, overrides: &SettingsOverrides) -> Self {
        if let Some(remote) = &overrides.remote {
            self.remote = remote.clone();
        }
        if let Some(branch) = &overrides.default_branch {
            self.default_branch = branch.clone();
        }
        if let Some(depth) = overrides.max_depth {
            self.max_depth = depth;
        }
        self
    }
}
