//! In-memory record store
//!
//! `MemoryRecordStore` satisfies the `RecordStore` contract without a
//! network. It can optionally behave like the server and assign remote ids
//! to records it receives without one.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::error::StoreError;
use crate::identity::{IdentityReconciler, LocalId, RecordIdentity};
use crate::jsonapi::{self, ResourceDocument};
use crate::query::{QueryExpression, RequestOptions, TransformOperation};
use crate::record::{Record, RelationshipData};
use crate::schema::{RecordType, Schema};
use crate::store_traits::{QueryResult, RecordStore, StoreResult};

type RecordKey = (RecordType, LocalId);

/// In-memory store backed by a `BTreeMap<(type, local id), Record>`.
#[derive(Debug)]
pub struct MemoryRecordStore {
    identities: Arc<IdentityReconciler>,
    records: Mutex<BTreeMap<RecordKey, Record>>,
    assign_remote_ids: bool,
    next_remote_id: AtomicU64,
}

impl MemoryRecordStore {
    /// Plain cache: records keep whatever identity they arrive with
    pub fn new(identities: Arc<IdentityReconciler>) -> Self {
        Self {
            identities,
            records: Mutex::new(BTreeMap::new()),
            assign_remote_ids: false,
            next_remote_id: AtomicU64::new(1),
        }
    }

    /// Assign sequential remote ids to added records that have none, as the
    /// server would.
    pub fn with_remote_assignment(mut self, first_id: u64) -> Self {
        self.assign_remote_ids = true;
        self.next_remote_id = AtomicU64::new(first_id);
        self
    }

    /// Insert a record, merging into any existing record with the same identity.
    pub fn insert(&self, record: Record) {
        let key = self.key_of(&record.identity);
        let mut records = self.records();
        match records.get_mut(&key) {
            Some(existing) => existing.merge(record),
            None => {
                records.insert(key, record);
            }
        }
    }

    /// Hydrate a JSON:API document and insert every record it carries.
    /// Returns the number of records inserted.
    pub fn seed(&self, schema: &Schema, document: &ResourceDocument) -> StoreResult<usize> {
        let hydrated = jsonapi::hydrate_document(schema, &self.identities, document)?;
        let mut count = 0;
        for record in hydrated.primary.into_iter().chain(hydrated.included) {
            self.insert(record);
            count += 1;
        }
        info!(event = "store.seeded", records = count);
        Ok(count)
    }

    pub fn get(&self, identity: &RecordIdentity) -> Option<Record> {
        self.records().get(&self.key_of(identity)).cloned()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<RecordKey, Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_of(&self, identity: &RecordIdentity) -> RecordKey {
        (identity.record_type, self.identities.local_id_of(identity))
    }

    fn not_found(&self, identity: &RecordIdentity) -> StoreError {
        StoreError::RecordNotFound {
            record_type: identity.record_type.to_string(),
            id: self.identities.remote_id_of(identity),
        }
    }

    fn find(&self, identity: &RecordIdentity) -> StoreResult<Record> {
        self.get(identity).ok_or_else(|| self.not_found(identity))
    }

    fn related(
        &self,
        identity: &RecordIdentity,
        relationship: &str,
    ) -> StoreResult<Option<RelationshipData>> {
        Ok(self.find(identity)?.related(relationship).cloned())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn query(
        &self,
        expression: QueryExpression,
        _options: &RequestOptions,
    ) -> StoreResult<QueryResult> {
        match expression {
            QueryExpression::FindRecord { record } => {
                Ok(QueryResult::One(Some(self.find(&record)?)))
            }
            QueryExpression::FindRecords { record_type } => {
                let records: Vec<Record> = self
                    .records()
                    .iter()
                    .filter(|((t, _), _)| *t == record_type)
                    .map(|(_, r)| r.clone())
                    .collect();
                Ok(QueryResult::Many(records))
            }
            QueryExpression::FindRelatedRecord {
                record,
                relationship,
            } => {
                let related = self
                    .related(&record, &relationship)?
                    .and_then(|data| data.as_one().cloned());
                match related {
                    Some(identity) => Ok(QueryResult::One(Some(self.find(&identity)?))),
                    None => Ok(QueryResult::One(None)),
                }
            }
            QueryExpression::FindRelatedRecords {
                record,
                relationship,
            } => {
                // Related records that were never loaded are skipped.
                let records: Vec<Record> = self
                    .related(&record, &relationship)?
                    .map(|data| {
                        data.identities()
                            .into_iter()
                            .filter_map(|identity| self.get(identity))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(QueryResult::Many(records))
            }
        }
    }

    async fn update(
        &self,
        operation: TransformOperation,
        options: &RequestOptions,
    ) -> StoreResult<()> {
        match operation {
            TransformOperation::AddRecord { mut record } => {
                if self.assign_remote_ids
                    && self.identities.bound_remote_id(&record.identity).is_none()
                {
                    let remote_id = self.next_remote_id.fetch_add(1, Ordering::SeqCst);
                    record.identity = self
                        .identities
                        .register_remote_id(&record.identity, &remote_id.to_string())?;
                }
                info!(
                    event = "store.record_added",
                    label = %options.label,
                    identity = %record.identity,
                );
                self.insert(record);
                Ok(())
            }
            TransformOperation::ReplaceRecord { record } => {
                let key = self.key_of(&record.identity);
                let identity = record.identity.clone();
                let mut records = self.records();
                let existing = records.get_mut(&key).ok_or_else(|| self.not_found(&identity))?;
                existing.merge(record);
                info!(
                    event = "store.record_replaced",
                    label = %options.label,
                    identity = %identity,
                );
                Ok(())
            }
        }
    }
}
