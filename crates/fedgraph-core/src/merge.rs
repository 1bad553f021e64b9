//! # Schema Merger
//!
//! Folds constituent schemas into the federation's schema with
//! [`Schema::merge`]. Order does not matter; an incompatible duplicate
//! definition anywhere fails the whole fold.

use crate::schema::Schema;
use crate::FederationError;

/// Union every schema. No schemas gives the empty schema.
pub fn merge_schemas<'a, I>(schemas: I) -> Result<Schema, FederationError>
where
    I: IntoIterator<Item = &'a Schema>,
{
    schemas
        .into_iter()
        .try_fold(Schema::new(), |acc, next| acc.merge(next))
}
