//! Public catalog statistics.

use serde::{Deserialize, Serialize};

/// Aggregate numbers served by the public stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CatalogStats {
    #[serde(default)]
    pub total_notes: u64,
    #[serde(default)]
    pub total_downloads: u64,
    #[serde(default)]
    pub total_file_size: u64,
    /// Top uploaders as (display name, note count), highest first
    #[serde(default)]
    pub top_uploaders: Vec<(String, u64)>,
}

impl CatalogStats {
    /// Total stored size in whole mebibytes, rounded down.
    #[must_use]
    pub const fn total_size_mib(&self) -> u64 {
        self.total_file_size / (1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_size_mib_rounds_down() {
        let stats = CatalogStats {
            total_file_size: 10 * 1024 * 1024 + 512,
            ..Default::default()
        };
        assert_eq!(stats.total_size_mib(), 10);
    }
}
