//! Error types for portal-data

use thiserror::Error;

/// Schema lookup and validation failures.
///
/// These are programmer errors: an unknown model or member name means the
/// calling code disagrees with the static schema table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Model name not present in the schema
    #[error("Unknown record type: {0}")]
    UnknownType(String),

    /// Attribute not declared on the model
    #[error("Unknown attribute `{attribute}` on `{record_type}`")]
    UnknownAttribute {
        record_type: String,
        attribute: String,
    },

    /// Relationship not declared on the model
    #[error("Unknown relationship `{relationship}` on `{record_type}`")]
    UnknownRelationship {
        record_type: String,
        relationship: String,
    },

    /// Attribute value does not match the declared kind
    #[error("Attribute `{record_type}.{attribute}` expects {expected}, got {actual}")]
    AttributeKindMismatch {
        record_type: String,
        attribute: String,
        expected: String,
        actual: String,
    },

    /// Related record has a different type than the relationship declares
    #[error("Relationship `{record_type}.{relationship}` expects `{expected}`, got `{actual}`")]
    RelatedTypeMismatch {
        record_type: String,
        relationship: String,
        expected: String,
        actual: String,
    },

    /// to-one data given for a to-many relationship, or the reverse
    #[error("Relationship `{record_type}.{relationship}` is {expected}")]
    CardinalityMismatch {
        record_type: String,
        relationship: String,
        expected: String,
    },

    /// Model declared twice
    #[error("Duplicate model definition: {0}")]
    DuplicateModel(String),

    /// Attribute or relationship declared twice on one model
    #[error("Duplicate member `{member}` on `{record_type}`")]
    DuplicateMember { record_type: String, member: String },

    /// Inverse relationship missing on the related model
    #[error("Inverse `{related_type}.{inverse}` of `{record_type}.{relationship}` does not exist")]
    DanglingInverse {
        record_type: String,
        relationship: String,
        related_type: String,
        inverse: String,
    },

    /// Inverse relationship exists but does not point back
    #[error("`{record_type}.{relationship}` and inverse `{related_type}.{inverse}` disagree")]
    AsymmetricInverse {
        record_type: String,
        relationship: String,
        related_type: String,
        inverse: String,
    },
}

/// Key map and identity construction failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// A key value is already bound to another local id, or the local id
    /// already holds another value for the key
    #[error("Key `{record_type}.{key}` = `{value}` conflicts with binding to `{existing}`")]
    KeyConflict {
        record_type: String,
        key: String,
        value: String,
        existing: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Errors surfaced by record stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record not present in the store
    #[error("Record not found: {record_type} {id}")]
    RecordNotFound { record_type: String, id: String },

    /// Network or backend failure, passed through unchanged
    #[error("Transport failed: {0}")]
    Transport(String),

    /// Malformed JSON:API payload
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
