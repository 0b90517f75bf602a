//! Output format tags and the selection state that drives a batch
//!
//! A `FormatSet` is what the compression service is asked to produce for every
//! file. The `FormatSelector` owns the user's current selection and publishes
//! every change over a watch channel so the orchestrator can restart the batch.

use crate::error::{Result, TinyImgError};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;

/// Output encodings the compression service can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Png,
    Jpg,
    WebP,
}

impl FormatTag {
    /// Every tag, in the order `selectAll` produces them
    pub const ALL: [FormatTag; 3] = [FormatTag::Png, FormatTag::Jpg, FormatTag::WebP];

    /// Tag as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::Png => "png",
            FormatTag::Jpg => "jpg",
            FormatTag::WebP => "webp",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FormatTag {
    type Err = TinyImgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(FormatTag::Png),
            "jpg" | "jpeg" => Ok(FormatTag::Jpg),
            "webp" => Ok(FormatTag::WebP),
            _ => Err(TinyImgError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// A toggle action from the format picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatToggle {
    Format(FormatTag),
    SelectAll,
}

impl FromStr for FormatToggle {
    type Err = TinyImgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "selectall" | "all" => Ok(FormatToggle::SelectAll),
            other => Ok(FormatToggle::Format(other.parse()?)),
        }
    }
}

/// Set of requested output formats.
///
/// Keeps insertion order for the request string; equality only looks at membership.
#[derive(Debug, Clone, Default)]
pub struct FormatSet {
    tags: Vec<FormatTag>,
}

impl FormatSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            tags: FormatTag::ALL.to_vec(),
        }
    }

    pub fn contains(&self, tag: FormatTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Returns `false` if the tag was already present
    pub fn insert(&mut self, tag: FormatTag) -> bool {
        if self.contains(tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Returns `false` if the tag was not present
    pub fn remove(&mut self, tag: FormatTag) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| *t != tag);
        self.tags.len() != before
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = FormatTag> + '_ {
        self.tags.iter().copied()
    }

    /// Results the service returns per file. An empty set still yields one
    /// result in the file's own format, so it counts as 1.
    pub fn results_per_file(&self) -> usize {
        self.tags.len().max(1)
    }

    /// Comma-joined tags for the multipart `formats` field
    pub fn to_request_value(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse a comma separated list such as `png,webp`. Blank input gives an empty set.
    pub fn parse_list(s: &str) -> Result<Self> {
        let mut set = FormatSet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.parse::<FormatToggle>()? {
                FormatToggle::SelectAll => set = FormatSet::all(),
                FormatToggle::Format(tag) => {
                    set.insert(tag);
                }
            }
        }
        Ok(set)
    }
}

impl PartialEq for FormatSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|t| other.contains(t))
    }
}

impl Eq for FormatSet {}

impl FromIterator<FormatTag> for FormatSet {
    fn from_iter<I: IntoIterator<Item = FormatTag>>(iter: I) -> Self {
        let mut set = FormatSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl fmt::Display for FormatSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "original")
        } else {
            write!(f, "{}", self.to_request_value())
        }
    }
}

/// Holds the "convert my image" switch and the selected formats.
///
/// Switching conversion off keeps the selection; it only hides the picker.
#[derive(Debug)]
pub struct FormatSelector {
    enabled: bool,
    selected: FormatSet,
    tx: watch::Sender<FormatSet>,
}

impl Default for FormatSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatSelector {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FormatSet::new());
        Self {
            enabled: false,
            selected: FormatSet::new(),
            tx,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn selected(&self) -> &FormatSet {
        &self.selected
    }

    /// Receiver that observes every published selection
    pub fn subscribe(&self) -> watch::Receiver<FormatSet> {
        self.tx.subscribe()
    }

    /// Apply a toggle and publish the resulting set.
    ///
    /// `SelectAll` always yields the full set; it never clears it.
    pub fn toggle(&mut self, toggle: FormatToggle) -> &FormatSet {
        match toggle {
            FormatToggle::SelectAll => self.selected = FormatSet::all(),
            FormatToggle::Format(tag) => {
                if !self.selected.remove(tag) {
                    self.selected.insert(tag);
                }
            }
        }
        self.tx.send_replace(self.selected.clone());
        &self.selected
    }
}
