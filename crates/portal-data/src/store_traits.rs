//! Record store abstraction
//!
//! A store answers [`QueryExpression`]s and applies [`TransformOperation`]s.
//! The remote JSON:API source and the in-memory cache both sit behind this
//! trait; an in-memory implementation is provided in the `fakes` module.
//!
//! Transport failures are returned unchanged as `StoreError::Transport`.
//! Nothing here retries.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::query::{QueryExpression, RequestOptions, TransformOperation};
use crate::record::Record;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Answer to a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// `findRecord` / `findRelatedRecord` (empty to-one yields `None`)
    One(Option<Record>),
    /// `findRecords` / `findRelatedRecords`
    Many(Vec<Record>),
}

impl QueryResult {
    pub fn into_record(self) -> Option<Record> {
        match self {
            QueryResult::One(record) => record,
            QueryResult::Many(records) => records.into_iter().next(),
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            QueryResult::One(record) => record.into_iter().collect(),
            QueryResult::Many(records) => records,
        }
    }
}

/// Queryable, updatable record store.
///
/// Guarantees:
/// - `FindRecord` fails with `StoreError::RecordNotFound` when absent.
/// - `ReplaceRecord` only overwrites the members it carries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Run a query.
    async fn query(
        &self,
        expression: QueryExpression,
        options: &RequestOptions,
    ) -> StoreResult<QueryResult>;

    /// Apply a transform.
    async fn update(
        &self,
        operation: TransformOperation,
        options: &RequestOptions,
    ) -> StoreResult<()>;
}
