//! Core shared types for changemount.
//!
//! These types mirror the JSON shapes exchanged with the hosted search index
//! (search hits, search pages, partial-update payloads) and model the mount
//! prefixes that a rename operates on.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;

/// Attributes requested from the index for every page of a rename scan.
pub const RENAME_ATTRIBUTES: [&str; 2] = ["objectID", "path"];

/// A logical path prefix naming a collection of records in the index.
///
/// `Root` is the literal `/`. A named mount such as `/ms/` is stored without
/// its surrounding slashes (`ms`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mount {
    Root,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    #[error("should be either '/' or start and end with a '/': {0}")]
    Invalid(String),
}

impl Mount {
    /// Parse a mount prefix: either `/` or `/<name>/` with a non-empty name.
    pub fn parse(raw: &str) -> Result<Self, MountError> {
        if raw == "/" {
            return Ok(Self::Root);
        }
        if raw.len() > 2 && raw.starts_with('/') && raw.ends_with('/') {
            return Ok(Self::Named(raw[1..raw.len() - 1].to_string()));
        }
        Err(MountError::Invalid(raw.to_string()))
    }

    pub const fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    /// Prefix a stored `path` must start with to belong to this mount.
    ///
    /// Paths carry no leading slash, so `/ms/` matches `ms/`. Root matches
    /// everything and yields the empty string.
    pub fn match_prefix(&self) -> String {
        match self {
            Self::Root => String::new(),
            Self::Named(name) => format!("{name}/"),
        }
    }

    /// Bare mount name used in `name:relative/path` addressing.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("/"),
            Self::Named(name) => write!(f, "/{name}/"),
        }
    }
}

/// One search hit restricted to the attributes a rename needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Hit {
    pub fn new(object_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            path: Some(path.into()),
        }
    }
}

/// Search parameters sent with every page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    pub attributes_to_retrieve: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl SearchOptions {
    /// Options for a rename scan; `None` leaves the page to the index default (0).
    pub fn rename_scan(page: Option<u32>) -> Self {
        Self {
            attributes_to_retrieve: RENAME_ATTRIBUTES.iter().map(ToString::to_string).collect(),
            page,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub nb_pages: u32,
    pub nb_hits: u64,
    pub hits: Vec<Hit>,
}

/// Write-back payload: only these fields are merged into the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRecord {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub path: String,
    pub parents: Vec<String>,
    pub dir: String,
}
