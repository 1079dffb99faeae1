// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backwards compatibility gate: which client features an older runtime
// version cannot handle.

use std::collections::HashMap;

use crate::types::UnsupportedFeatures;

/// Lookup table from version prefix (`"8"`, `"8.10"`, `"8.12.0"`) to the
/// features that version does not support.
#[derive(Debug, Clone)]
pub struct CompatTable {
    entries: HashMap<String, UnsupportedFeatures>,
}

impl Default for CompatTable {
    /// Runtime versions known to predate client-side reload and splash handling.
    fn default() -> Self {
        let hide_splash = UnsupportedFeatures {
            reload_in_client: false,
            hide_splash_screen_in_client: true,
        };
        Self::from_entries([
            (
                "8.9",
                UnsupportedFeatures {
                    reload_in_client: true,
                    hide_splash_screen_in_client: true,
                },
            ),
            ("8.10", hide_splash),
            ("8.11", hide_splash),
            ("8.12.0", hide_splash),
        ])
    }
}

impl CompatTable {
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = (&'a str, UnsupportedFeatures)>,
    ) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Resolve by longest prefix: three components, then two, then one.
    /// Unknown versions support everything.
    pub fn resolve(&self, version: &str) -> UnsupportedFeatures {
        let parts: Vec<&str> = version.split('.').collect();
        (1..=parts.len().min(3))
            .rev()
            .find_map(|n| self.entries.get(&parts[..n].join(".")))
            .copied()
            .unwrap_or_default()
    }

    /// Whether the client may hide the splash screen itself.
    pub fn hide_splash_screen_supported(&self, version: &str) -> bool {
        !self.resolve(version).hide_splash_screen_in_client
    }
}
