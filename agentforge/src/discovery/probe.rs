//! Best-effort discovery of integration registries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Top-level keys recognized in a registry document, in priority order.
pub const REGISTRY_KEYS: &[&str] = &["mcpServers", "mcp_servers", "servers"];

/// A candidate location for a registry document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Location {
    /// A file on disk.
    File {
        /// The file path.
        path: PathBuf,
    },
    /// An in-memory payload, e.g. from an environment variable.
    Inline {
        /// A label used in results and errors.
        label: String,
        /// The payload.
        content: String,
    },
}

impl Location {
    /// Creates a file location.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// Creates an inline location.
    #[must_use]
    pub fn inline(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Inline {
            label: label.into(),
            content: content.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path } => write!(f, "{}", path.display()),
            Self::Inline { label, .. } => write!(f, "{label}"),
        }
    }
}

/// Resolves a location to its text payload.
pub trait LocationReader {
    /// Reads the payload.
    ///
    /// # Errors
    ///
    /// Returns any IO error; `NotFound` means the candidate is absent.
    fn read(&self, location: &Location) -> io::Result<String>;
}

/// Reads file locations from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl LocationReader for FsReader {
    fn read(&self, location: &Location) -> io::Result<String> {
        match location {
            Location::File { path } => std::fs::read_to_string(path),
            Location::Inline { content, .. } => Ok(content.clone()),
        }
    }
}

impl<F> LocationReader for F
where
    F: Fn(&Location) -> io::Result<String>,
{
    fn read(&self, location: &Location) -> io::Result<String> {
        self(location)
    }
}

/// Why a candidate could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryErrorKind {
    /// The candidate could not be read for lack of permission.
    PermissionDenied,
    /// Any other read failure.
    Io,
    /// The payload is not valid JSON.
    Parse,
    /// The payload parsed but has no usable registry mapping.
    Schema,
}

/// A non-fatal problem with one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryError {
    /// The candidate location.
    pub location: String,
    /// Classification.
    pub kind: DiscoveryErrorKind,
    /// Detail.
    pub message: String,
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    /// The entry name.
    pub name: String,
    /// The entry's metadata, as found.
    pub metadata: serde_json::Value,
}

impl DiscoveredItem {
    /// Returns true if the entry is marked `"disabled": true`.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.metadata
            .get("disabled")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// The result of a discovery pass. Always structurally valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    /// Usable entries from the winning candidate.
    pub available: Vec<DiscoveredItem>,
    /// Entries from the winning candidate that are disabled.
    pub unavailable: Vec<DiscoveredItem>,
    /// Every location that was considered, in order.
    pub search_locations: Vec<String>,
    /// Non-fatal problems, in order.
    pub errors: Vec<DiscoveryError>,
    /// The location the entries came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl DiscoveryResult {
    /// Returns the names of available entries.
    #[must_use]
    pub fn available_names(&self) -> Vec<&str> {
        self.available.iter().map(|i| i.name.as_str()).collect()
    }

    /// Returns true if nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.available.is_empty() && self.unavailable.is_empty()
    }

    /// Returns true if any candidate produced an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Converts the result to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let names = |items: &[DiscoveredItem]| -> Vec<String> {
            items.iter().map(|i| i.name.clone()).collect()
        };
        let mut map = HashMap::new();
        map.insert("available".to_string(), serde_json::json!(names(&self.available)));
        map.insert("unavailable".to_string(), serde_json::json!(names(&self.unavailable)));
        map.insert(
            "search_locations".to_string(),
            serde_json::json!(self.search_locations),
        );
        map.insert(
            "errors".to_string(),
            serde_json::json!(self.errors.iter().map(ToString::to_string).collect::<Vec<_>>()),
        );
        map
    }
}

/// Scans candidate locations in priority order.
///
/// The first candidate whose payload holds a non-empty mapping under one of
/// the recognized keys wins; results are never merged across candidates.
#[derive(Debug, Clone)]
pub struct DiscoveryProbe<R = FsReader> {
    reader: R,
    keys: Vec<String>,
}

impl Default for DiscoveryProbe<FsReader> {
    fn default() -> Self {
        Self::new(FsReader)
    }
}

impl<R: LocationReader> DiscoveryProbe<R> {
    /// Creates a probe with the given reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            keys: REGISTRY_KEYS.iter().map(|k| (*k).to_string()).collect(),
        }
    }

    /// Replaces the recognized top-level keys.
    #[must_use]
    pub fn with_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Runs the probe. Never fails.
    #[must_use]
    pub fn discover(&self, candidates: &[Location]) -> DiscoveryResult {
        let mut result = DiscoveryResult::default();

        for location in candidates {
            let label = location.to_string();
            result.search_locations.push(label.clone());

            let payload = match self.reader.read(location) {
                Ok(payload) => payload,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(location = %label, "Registry candidate not present");
                    continue;
                }
                Err(e) => {
                    let kind = if e.kind() == io::ErrorKind::PermissionDenied {
                        DiscoveryErrorKind::PermissionDenied
                    } else {
                        DiscoveryErrorKind::Io
                    };
                    record(&mut result, &label, kind, e.to_string());
                    continue;
                }
            };

            let document: serde_json::Value = match serde_json::from_str(&payload) {
                Ok(doc) => doc,
                Err(e) => {
                    record(&mut result, &label, DiscoveryErrorKind::Parse, format!("invalid JSON - {e}"));
                    continue;
                }
            };

            match self.extract(&document) {
                Ok(Some(items)) => {
                    let (unavailable, available): (Vec<_>, Vec<_>) =
                        items.into_iter().partition(DiscoveredItem::is_disabled);
                    info!(
                        location = %label,
                        available = available.len(),
                        unavailable = unavailable.len(),
                        "Registry found"
                    );
                    result.available = available;
                    result.unavailable = unavailable;
                    result.source = Some(label);
                    return result;
                }
                Ok(None) => {
                    debug!(location = %label, "Registry candidate has no entries");
                }
                Err(message) => {
                    record(&mut result, &label, DiscoveryErrorKind::Schema, message);
                }
            }
        }

        info!(
            searched = result.search_locations.len(),
            errors = result.errors.len(),
            "No registry found, continuing without integrations"
        );
        result
    }

    /// Returns the entries under the first recognized key with entries.
    ///
    /// `Ok(None)` means a recognized key exists but every one is empty.
    fn extract(&self, document: &serde_json::Value) -> Result<Option<Vec<DiscoveredItem>>, String> {
        let Some(object) = document.as_object() else {
            return Err("expected a JSON object at the top level".to_string());
        };

        let mut recognized = false;
        for key in &self.keys {
            let Some(value) = object.get(key) else {
                continue;
            };
            recognized = true;
            let Some(entries) = value.as_object() else {
                return Err(format!("'{key}' should map entry names to metadata"));
            };
            if entries.is_empty() {
                continue;
            }
            return Ok(Some(
                entries
                    .iter()
                    .map(|(name, metadata)| DiscoveredItem {
                        name: name.clone(),
                        metadata: metadata.clone(),
                    })
                    .collect(),
            ));
        }

        if recognized {
            Ok(None)
        } else {
            Err(format!("none of the keys {} found", self.keys.join(", ")))
        }
    }
}

fn record(result: &mut DiscoveryResult, location: &str, kind: DiscoveryErrorKind, message: String) {
    warn!(location = %location, kind = ?kind, error = %message, "Registry candidate skipped");
    result.errors.push(DiscoveryError {
        location: location.to_string(),
        kind,
        message,
    });
}

/// Runs the probe over the filesystem.
#[must_use]
pub fn discover(candidates: &[Location]) -> DiscoveryResult {
    DiscoveryProbe::default().discover(candidates)
}

/// Returns the conventional registry locations, highest priority first.
///
/// Home-relative locations are omitted when the home directory is unknown.
#[must_use]
pub fn default_locations() -> Vec<Location> {
    let home = home::home_dir();
    let mut locations = Vec::new();
    if let Some(home) = &home {
        locations.push(Location::file(home.join(".config/claude/claude_desktop_config.json")));
        locations.push(Location::file(home.join(".claude/mcp_config.json")));
    }
    locations.push(Location::file("./mcp_config.json"));
    locations.push(Location::file("../mcp_config.json"));
    if let Some(home) = &home {
        locations.push(Location::file(
            home.join("Library/Application Support/Claude/claude_desktop_config.json"),
        ));
    }
    locations
}
