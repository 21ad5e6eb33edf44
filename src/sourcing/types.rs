//! Reports returned by sourcing operations.

use serde::Serialize;

use crate::storage::{UpsertOutcome, UpsertStats};

/// Outcome of sourcing one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeReport {
    pub remote_type: String,
    pub node_type: String,
    /// Requests made; 1 for singletons.
    pub pages: usize,
    /// Distinct items after key deduplication.
    pub items: usize,
    #[serde(flatten)]
    pub stats: UpsertStats,
}

/// Outcome of a full run, in sourcing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub types: Vec<TypeReport>,
}

impl RunReport {
    /// Upsert outcomes summed over all types.
    #[must_use]
    pub fn totals(&self) -> UpsertStats {
        let mut totals = UpsertStats::default();
        for report in &self.types {
            totals.merge(report.stats);
        }
        totals
    }

    #[must_use]
    pub fn get(&self, remote_type: &str) -> Option<&TypeReport> {
        self.types.iter().find(|t| t.remote_type == remote_type)
    }
}

/// Outcome of refreshing one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub node_id: String,
    pub node_type: String,
    pub outcome: UpsertOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let report = RunReport {
            types: vec![
                TypeReport {
                    remote_type: "Product".to_string(),
                    node_type: "NacelleProduct".to_string(),
                    pages: 2,
                    items: 150,
                    stats: UpsertStats { created: 100, updated: 0, unchanged: 50 },
                },
                TypeReport {
                    remote_type: "Space".to_string(),
                    node_type: "NacelleSpace".to_string(),
                    pages: 1,
                    items: 1,
                    stats: UpsertStats { created: 0, updated: 1, unchanged: 0 },
                },
            ],
        };

        assert_eq!(report.totals(), UpsertStats { created: 100, updated: 1, unchanged: 50 });
        assert_eq!(report.get("Space").unwrap().pages, 1);
        assert!(report.get("Collection").is_none());

        let json = serde_json::to_value(&report.types[0]).unwrap();
        assert_eq!(json["created"], 100);
    }
}
