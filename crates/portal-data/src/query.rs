//! Query and transform descriptors plus request options
//!
//! Builders here resolve remote ids through the reconciler so that every
//! descriptor handed to a store names records by their local identity.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::identity::{IdentityReconciler, RecordIdentity};
use crate::record::Record;
use crate::schema::{Cardinality, RecordType, Schema, SchemaResult};

/// Label used when a caller does not name its request
pub const DEFAULT_LABEL: &str = "Remote Query";

/// Read against a record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum QueryExpression {
    FindRecord {
        record: RecordIdentity,
    },
    FindRecords {
        #[serde(rename = "type")]
        record_type: RecordType,
    },
    FindRelatedRecord {
        record: RecordIdentity,
        relationship: String,
    },
    FindRelatedRecords {
        record: RecordIdentity,
        relationship: String,
    },
}

/// Write against a record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum TransformOperation {
    AddRecord { record: Record },
    ReplaceRecord { record: Record },
}

impl TransformOperation {
    pub fn record(&self) -> &Record {
        match self {
            TransformOperation::AddRecord { record }
            | TransformOperation::ReplaceRecord { record } => record,
        }
    }
}

/// Builds schema-checked query expressions.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    schema: &'a Schema,
    identities: &'a IdentityReconciler,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a Schema, identities: &'a IdentityReconciler) -> Self {
        Self { schema, identities }
    }

    /// Find one record by its remote id
    pub fn find_record(&self, record_type: RecordType, remote_id: &str) -> QueryExpression {
        QueryExpression::FindRecord {
            record: self.identities.build_identity(remote_id, record_type),
        }
    }

    pub fn find_records(&self, record_type: RecordType) -> QueryExpression {
        QueryExpression::FindRecords { record_type }
    }

    /// Find the record on the other side of a to-one relationship
    pub fn find_related_record(
        &self,
        record: &RecordIdentity,
        relationship: &str,
    ) -> SchemaResult<QueryExpression> {
        self.expect_cardinality(record.record_type, relationship, Cardinality::HasOne)?;
        Ok(QueryExpression::FindRelatedRecord {
            record: record.clone(),
            relationship: relationship.to_string(),
        })
    }

    /// Find the records on the other side of a to-many relationship.
    ///
    /// Only type and local id are carried; keys are dropped.
    pub fn find_related_records(
        &self,
        record: &RecordIdentity,
        relationship: &str,
    ) -> SchemaResult<QueryExpression> {
        self.expect_cardinality(record.record_type, relationship, Cardinality::HasMany)?;
        Ok(QueryExpression::FindRelatedRecords {
            record: RecordIdentity::new(record.record_type, record.id.clone()),
            relationship: relationship.to_string(),
        })
    }

    fn expect_cardinality(
        &self,
        record_type: RecordType,
        relationship: &str,
        expected: Cardinality,
    ) -> SchemaResult<()> {
        let def = self.schema.relationship(record_type, relationship)?;
        if def.cardinality != expected {
            return Err(SchemaError::CardinalityMismatch {
                record_type: record_type.to_string(),
                relationship: relationship.to_string(),
                expected: def.cardinality.to_string(),
            });
        }
        Ok(())
    }
}

/// Per-call request options supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Related resources to side-load (`include=`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// Overrides merged over the default source settings
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.include.push(path.into());
        self
    }

    pub fn setting(mut self, name: impl Into<String>, value: Value) -> Self {
        self.settings.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSourceOptions {
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOptions {
    pub remote: RemoteSourceOptions,
}

/// Options handed to a store with each query or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub label: String,
    pub sources: SourceOptions,
}

impl RequestOptions {
    pub fn remote_settings(&self) -> &Map<String, Value> {
        &self.sources.remote.settings
    }

    pub fn include(&self) -> &[String] {
        &self.sources.remote.include
    }
}

/// Combine caller options with the default source settings.
///
/// Overrides replace defaults key by key (a shallow merge).
pub fn build_options(
    defaults: &Map<String, Value>,
    options: &QueryOptions,
    label: Option<&str>,
) -> RequestOptions {
    let mut settings = defaults.clone();
    settings.extend(options.settings.clone());

    RequestOptions {
        label: label.unwrap_or(DEFAULT_LABEL).to_string(),
        sources: SourceOptions {
            remote: RemoteSourceOptions {
                settings,
                include: options.include.clone(),
            },
        },
    }
}
