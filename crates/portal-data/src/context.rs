//! Store context: the schema, reconciler and config shared by every caller
//!
//! `StoreContext` is the entry point UI and socket code use to build records
//! and queries and to create or update records through a [`RecordStore`].

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::identity::{IdentityReconciler, RecordIdentity};
use crate::jsonapi::{self, HydratedDocument, ResourceDocument, ResourceObject};
use crate::query::{
    build_options, QueryBuilder, QueryExpression, QueryOptions, RequestOptions, TransformOperation,
};
use crate::record::{self, Record, RecordOptions};
use crate::schema::{RecordType, RelationshipMetadata, Schema, SchemaResult};
use crate::store_traits::{RecordStore, StoreResult};

#[derive(Debug, Clone)]
pub struct StoreContext {
    schema: Arc<Schema>,
    identities: Arc<IdentityReconciler>,
    config: StoreConfig,
}

impl StoreContext {
    pub fn new(
        schema: Arc<Schema>,
        identities: Arc<IdentityReconciler>,
        config: StoreConfig,
    ) -> Self {
        Self {
            schema,
            identities,
            config,
        }
    }

    /// Context over the built-in portal schema with a fresh reconciler
    pub fn portal(config: StoreConfig) -> SchemaResult<Self> {
        Ok(Self::new(
            Arc::new(Schema::portal()?),
            Arc::new(IdentityReconciler::new()),
            config,
        ))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn identities(&self) -> &Arc<IdentityReconciler> {
        &self.identities
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.schema, &self.identities)
    }

    /// Shorthand for `query().find_record(..)`
    pub fn find_record(&self, record_type: RecordType, remote_id: &str) -> QueryExpression {
        self.query().find_record(record_type, remote_id)
    }

    /// Related type and inverse name of one of `record`'s relationships
    pub fn relationship_metadata(
        &self,
        record: &Record,
        relationship: &str,
    ) -> SchemaResult<RelationshipMetadata> {
        self.schema
            .relationship_metadata(record.record_type(), relationship)
    }

    pub fn build_new(
        &self,
        record_type: RecordType,
        options: RecordOptions,
    ) -> SchemaResult<Record> {
        record::build_new_record(&self.schema, &self.identities, record_type, options)
    }

    /// Request options with the configured defaults
    pub fn default_options(&self) -> RequestOptions {
        self.build_options(&QueryOptions::default(), None)
    }

    pub fn build_options(&self, options: &QueryOptions, label: Option<&str>) -> RequestOptions {
        build_options(&self.config.default_source_settings(), options, label)
    }

    pub fn hydrate(&self, resource: &ResourceObject) -> Result<Record, StoreError> {
        jsonapi::hydrate(&self.schema, &self.identities, resource)
    }

    pub fn hydrate_document(
        &self,
        document: &ResourceDocument,
    ) -> Result<HydratedDocument, StoreError> {
        jsonapi::hydrate_document(&self.schema, &self.identities, document)
    }

    pub fn serialize(&self, record: &Record) -> Result<ResourceObject, StoreError> {
        jsonapi::serialize(&self.identities, record)
    }

    /// Build a new record, add it to `store`, and read it back.
    #[instrument(skip_all, fields(record_type = %record_type))]
    pub async fn create<S>(
        &self,
        store: &S,
        record_type: RecordType,
        options: RecordOptions,
    ) -> StoreResult<Record>
    where
        S: RecordStore + ?Sized,
    {
        let record = self.build_new(record_type, options)?;
        let identity = record.identity.clone();
        let request = self.default_options();

        store
            .update(TransformOperation::AddRecord { record }, &request)
            .await?;

        let created = store
            .query(QueryExpression::FindRecord { record: identity.clone() }, &request)
            .await?
            .into_record()
            .ok_or_else(|| StoreError::RecordNotFound {
                record_type: identity.record_type.to_string(),
                id: identity.id.to_string(),
            })?;
        info!(event = "record.created", identity = %created.identity);
        Ok(created)
    }

    /// Replace the supplied members of an existing record.
    #[instrument(skip_all, fields(identity = %identity))]
    pub async fn update<S>(
        &self,
        store: &S,
        identity: &RecordIdentity,
        options: RecordOptions,
    ) -> StoreResult<()>
    where
        S: RecordStore + ?Sized,
    {
        let record_type = identity.record_type;
        let attributes =
            record::validate_attributes(&self.schema, record_type, options.attributes)?;
        let relationships = record::build_relationships(
            &self.schema,
            &self.identities,
            record_type,
            options.relationships,
        )?;
        let record = Record {
            identity: identity.clone(),
            attributes,
            relationships,
        };

        store
            .update(TransformOperation::ReplaceRecord { record }, &self.default_options())
            .await?;
        info!(event = "record.updated", identity = %identity);
        Ok(())
    }
}
