//! Per-backend translation tables from raw event codes to canonical kinds.
//!
//! Every backend declares the full vocabulary of codes it can emit. A mapping table must
//! route each of those codes either to a [`WatchEventKind`] or explicitly to
//! [`EventRoute::Ignore`]; tables with gaps are rejected when they are built. A code that
//! still shows up unmapped at runtime (a backend emitting something outside its declared
//! vocabulary) is reported as [`Error::UnmappedEventCode`] rather than dropped.

use crate::error::{Error, Result};
use crate::events::WatchEventKind;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Where a backend code goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRoute {
    /// Deliver as this canonical kind.
    Emit(WatchEventKind),
    /// Deliberately not delivered.
    Ignore,
}

impl EventRoute {
    /// Parse a configuration value: a canonical kind name or `ignore`.
    pub fn parse(value: &str) -> Option<Self> {
        if value == "ignore" {
            return Some(Self::Ignore);
        }
        WatchEventKind::parse(value).map(Self::Emit)
    }
}

impl fmt::Display for EventRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emit(kind) => f.write_str(kind.as_str()),
            Self::Ignore => f.write_str("ignore"),
        }
    }
}

/// Exhaustive translation table for one backend vocabulary.
#[derive(Debug, Clone)]
pub struct EventMapping {
    backend: &'static str,
    routes: HashMap<String, EventRoute>,
}

impl EventMapping {
    /// Build a table, verifying that every code in `vocabulary` has a route and that no
    /// route names a code outside it.
    pub fn new<'a>(
        backend: &'static str,
        vocabulary: &[&str],
        entries: impl IntoIterator<Item = (&'a str, EventRoute)>,
    ) -> Result<Self> {
        let mut routes = HashMap::new();
        for (code, route) in entries {
            if !vocabulary.iter().any(|known| *known == code) {
                return Err(Error::Config(format!(
                    "Mapping for '{}' names unknown event code '{}'",
                    backend, code
                )));
            }
            routes.insert(code.to_string(), route);
        }

        let missing: Vec<&str> = vocabulary
            .iter()
            .copied()
            .filter(|code| !routes.contains_key(*code))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Mapping for '{}' does not cover event codes: {}",
                backend,
                missing.join(", ")
            )));
        }

        Ok(Self { backend, routes })
    }

    /// Apply configuration overrides on top of this table.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Result<Self> {
        for (code, target) in overrides {
            if !self.routes.contains_key(code) {
                return Err(Error::Config(format!(
                    "Override names unknown event code '{}' for backend '{}'",
                    code, self.backend
                )));
            }
            let route = EventRoute::parse(target).ok_or_else(|| {
                Error::Config(format!(
                    "Override for '{}' has unknown target '{}' (expected create, change, rename, delete or ignore)",
                    code, target
                ))
            })?;
            self.routes.insert(code.clone(), route);
        }
        Ok(self)
    }

    /// Backend this table belongs to.
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Look up the route for a raw code.
    pub fn route(&self, code: &str) -> Result<EventRoute> {
        self.routes
            .get(code)
            .copied()
            .ok_or_else(|| Error::UnmappedEventCode {
                backend: self.backend.to_string(),
                code: code.to_string(),
            })
    }

    /// Number of codes in the table.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
