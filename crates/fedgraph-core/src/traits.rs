//! # Store Traits
//!
//! Declared capabilities of a store, and the reconciliation of many trait
//! sets into the federation-wide set.
//!
//! The federation can only promise a capability every constituent offers, so
//! the merged set is the intersection of all constituent sets:
//! - adding a graph can only shrink (or keep) the merged set
//! - removing a graph can only grow (or keep) the merged set
//! - no graphs means no capabilities

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A capability a store declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreTrait {
    PreAggregationFiltering,
    PostAggregationFiltering,
    Transformation,
    PostTransformationFiltering,
    MatchedVertex,
    Ordered,
    QueryAggregation,
    StoreAggregation,
    IngestAggregation,
    Visibility,
    StoreValidation,
}

impl StoreTrait {
    /// Every known trait, in declaration order.
    pub const ALL: [StoreTrait; 11] = [
        StoreTrait::PreAggregationFiltering,
        StoreTrait::PostAggregationFiltering,
        StoreTrait::Transformation,
        StoreTrait::PostTransformationFiltering,
        StoreTrait::MatchedVertex,
        StoreTrait::Ordered,
        StoreTrait::QueryAggregation,
        StoreTrait::StoreAggregation,
        StoreTrait::IngestAggregation,
        StoreTrait::Visibility,
        StoreTrait::StoreValidation,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            StoreTrait::PreAggregationFiltering => "PRE_AGGREGATION_FILTERING",
            StoreTrait::PostAggregationFiltering => "POST_AGGREGATION_FILTERING",
            StoreTrait::Transformation => "TRANSFORMATION",
            StoreTrait::PostTransformationFiltering => "POST_TRANSFORMATION_FILTERING",
            StoreTrait::MatchedVertex => "MATCHED_VERTEX",
            StoreTrait::Ordered => "ORDERED",
            StoreTrait::QueryAggregation => "QUERY_AGGREGATION",
            StoreTrait::StoreAggregation => "STORE_AGGREGATION",
            StoreTrait::IngestAggregation => "INGEST_AGGREGATION",
            StoreTrait::Visibility => "VISIBILITY",
            StoreTrait::StoreValidation => "STORE_VALIDATION",
        }
    }
}

impl fmt::Display for StoreTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Intersect every constituent trait set.
///
/// An empty input yields an empty set, not the universe of traits.
pub fn reconcile<'a, I>(sets: I) -> BTreeSet<StoreTrait>
where
    I: IntoIterator<Item = &'a BTreeSet<StoreTrait>>,
{
    let mut sets = sets.into_iter();
    let Some(first) = sets.next() else {
        return BTreeSet::new();
    };
    sets.fold(first.clone(), |acc, next| {
        acc.intersection(next).copied().collect()
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn set(traits: &[StoreTrait]) -> BTreeSet<StoreTrait> {
        traits.iter().copied().collect()
    }

    #[test]
    fn no_sets_reconcile_to_nothing() {
        let empty: Vec<BTreeSet<StoreTrait>> = Vec::new();
        assert!(reconcile(&empty).is_empty());
    }

    #[test]
    fn single_set_is_kept() {
        let only = set(&StoreTrait::ALL);
        assert_eq!(reconcile([&only]), only);
    }

    #[test]
    fn intersection_of_overlapping_sets() {
        let a = set(&[
            StoreTrait::Ordered,
            StoreTrait::Visibility,
            StoreTrait::Transformation,
        ]);
        let b = set(&[StoreTrait::Transformation, StoreTrait::StoreAggregation]);
        assert_eq!(reconcile([&a, &b]), set(&[StoreTrait::Transformation]));
    }

    #[test]
    fn trait_names_serialize_screaming() {
        let json = serde_json::to_string(&StoreTrait::PreAggregationFiltering).expect("json");
        assert_eq!(json, "\"PRE_AGGREGATION_FILTERING\"");
        assert_eq!(StoreTrait::MatchedVertex.to_string(), "MATCHED_VERTEX");
    }
}
