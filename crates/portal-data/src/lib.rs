//! Portal-Data: client record store helpers for the AppBuilder Portal
//!
//! Records in the portal's client cache carry a local id generated on the
//! client; once the server has persisted them they also carry the server's
//! id under the `remoteId` key. This crate keeps the two id spaces
//! reconciled and builds records and queries that are aware of both.
//!
//! ## Key Components
//!
//! - `Schema`: validated table of every model, attribute and relationship
//! - `KeyMap`: bidirectional `(type, key, value) <-> local id` index
//! - `IdentityReconciler`: resolves remote ids to stable local identities
//! - `StoreContext`: builds records/queries, creates and updates through a `RecordStore`
//! - `NotificationListener`: loads pushed notification ids into the store

mod config;
mod context;
mod error;
pub mod fakes;
mod identity;
mod inflect;
pub mod jsonapi;
mod key_map;
pub mod notifications;
pub mod query;
pub mod record;
pub mod schema;
pub mod store_traits;
pub mod telemetry;

pub use config::{StoreConfig, JSONAPI_MEDIA_TYPE};
pub use context::StoreContext;
pub use error::{IdentityError, SchemaError, StoreError};
pub use identity::{
    IdGenerator, IdentityReconciler, IdentitySeed, LocalId, RecordIdentity, RecordKeys, REMOTE_ID,
};
pub use inflect::{camelize, dasherize};
pub use key_map::KeyMap;
pub use notifications::NotificationListener;
pub use query::{
    build_options, QueryBuilder, QueryExpression, QueryOptions, RequestOptions,
    TransformOperation, DEFAULT_LABEL,
};
pub use record::{
    build_new_record, AttributeValue, Record, RecordOptions, Relationship, RelationshipData,
    RelationshipSpec, ResourceRef,
};
pub use schema::{
    AttributeDef, AttributeKind, Cardinality, ModelDef, RecordType, RelationshipDef,
    RelationshipMetadata, Schema,
};
pub use store_traits::{QueryResult, RecordStore, StoreResult};

/// Result type for portal-data operations
pub type Result<T> = std::result::Result<T, StoreError>;
