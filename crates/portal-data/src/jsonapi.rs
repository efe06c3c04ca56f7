//! JSON:API resource documents
//!
//! Server payloads name records by remote id with plural, dasherized types
//! and member names. Hydrating a resource registers its remote id and yields
//! a [`Record`] keyed by local id; serializing goes the other way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{SchemaError, StoreError};
use crate::identity::{IdentityReconciler, RecordIdentity};
use crate::inflect::{camelize, dasherize};
use crate::record::{
    build_relationships, AttributeValue, Record, RelationshipData, RelationshipSpec, ResourceRef,
};
use crate::schema::{RecordType, Schema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

/// Relationship `data` member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceLinkage {
    Many(Vec<ResourceIdentifier>),
    One(ResourceIdentifier),
    /// Explicit `null`: empty to-one relationship
    Empty,
    /// `data` not present (links-only relationship)
    #[default]
    #[serde(skip)]
    Absent,
}

impl ResourceLinkage {
    pub fn is_absent(&self) -> bool {
        matches!(self, ResourceLinkage::Absent)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRelationship {
    #[serde(default, skip_serializing_if = "ResourceLinkage::is_absent")]
    pub data: ResourceLinkage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, ResourceRelationship>,
}

/// Primary data of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<ResourceObject>),
    One(Box<ResourceObject>),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDocument {
    pub data: PrimaryData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceObject>,
}

impl ResourceDocument {
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        serde_json::from_str(raw).map_err(|err| StoreError::InvalidDocument(err.to_string()))
    }

    pub fn single(resource: ResourceObject) -> Self {
        Self {
            data: PrimaryData::One(Box::new(resource)),
            included: Vec::new(),
        }
    }

    pub fn primary(&self) -> Vec<&ResourceObject> {
        match &self.data {
            PrimaryData::Many(resources) => resources.iter().collect(),
            PrimaryData::One(resource) => vec![resource.as_ref()],
            PrimaryData::Empty => Vec::new(),
        }
    }
}

/// Records produced from a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydratedDocument {
    pub primary: Vec<Record>,
    pub included: Vec<Record>,
}

impl HydratedDocument {
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.primary.iter().chain(self.included.iter())
    }
}

/// Convert a server resource into a locally identified record.
///
/// A resource with an id has it registered as the record's remote id. Members
/// the schema does not declare are skipped; declared members must match
/// their declared kind and cardinality.
pub fn hydrate(
    schema: &Schema,
    identities: &IdentityReconciler,
    resource: &ResourceObject,
) -> Result<Record, StoreError> {
    let record_type = RecordType::parse(&resource.resource_type)?;
    let model = schema.model(record_type)?;

    let identity = match &resource.id {
        Some(remote_id) => identities.build_identity(remote_id, record_type),
        None => identities.new_identity(record_type),
    };

    let mut attributes = BTreeMap::new();
    for (member, raw) in &resource.attributes {
        let name = camelize(member);
        let Some(def) = model.attribute(&name) else {
            debug!(
                event = "jsonapi.unknown_attribute",
                record_type = %record_type,
                attribute = %name,
            );
            continue;
        };
        let value: AttributeValue = serde_json::from_value(raw.clone())?;
        let value = value.coerce(def.kind);
        if !def.kind.accepts(&value) {
            return Err(SchemaError::AttributeKindMismatch {
                record_type: record_type.to_string(),
                attribute: name,
                expected: def.kind.to_string(),
                actual: value.kind_name().to_string(),
            }
            .into());
        }
        attributes.insert(name, value);
    }

    let mut specs = BTreeMap::new();
    for (member, relationship) in &resource.relationships {
        let name = camelize(member);
        if model.relationship(&name).is_none() {
            debug!(
                event = "jsonapi.unknown_relationship",
                record_type = %record_type,
                relationship = %name,
            );
            continue;
        }
        let spec = match &relationship.data {
            ResourceLinkage::Absent => continue,
            ResourceLinkage::Empty => RelationshipSpec::Empty,
            ResourceLinkage::One(related) => RelationshipSpec::One(resource_ref(related)),
            ResourceLinkage::Many(related) => {
                RelationshipSpec::Many(related.iter().map(resource_ref).collect())
            }
        };
        specs.insert(name, spec);
    }
    let relationships = build_relationships(schema, identities, record_type, specs)?;

    Ok(Record {
        identity,
        attributes,
        relationships,
    })
}

/// Hydrate every primary and included resource of a document.
pub fn hydrate_document(
    schema: &Schema,
    identities: &IdentityReconciler,
    document: &ResourceDocument,
) -> Result<HydratedDocument, StoreError> {
    let primary = document
        .primary()
        .into_iter()
        .map(|resource| hydrate(schema, identities, resource))
        .collect::<Result<Vec<_>, _>>()?;
    let included = document
        .included
        .iter()
        .map(|resource| hydrate(schema, identities, resource))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HydratedDocument { primary, included })
}

/// Convert a record into a server resource.
///
/// The resource id is the record's remote id; records that were never
/// persisted carry no id. Related identifiers use the remote id when one is
/// bound and the local id otherwise.
pub fn serialize(
    identities: &IdentityReconciler,
    record: &Record,
) -> Result<ResourceObject, StoreError> {
    let mut attributes = Map::new();
    for (name, value) in &record.attributes {
        attributes.insert(dasherize(name), serde_json::to_value(value)?);
    }

    let relationships = record
        .relationships
        .iter()
        .map(|(name, relationship)| {
            let data = match &relationship.data {
                RelationshipData::HasOne(None) => ResourceLinkage::Empty,
                RelationshipData::HasOne(Some(related)) => {
                    ResourceLinkage::One(identifier(identities, related))
                }
                RelationshipData::HasMany(related) => ResourceLinkage::Many(
                    related.iter().map(|r| identifier(identities, r)).collect(),
                ),
            };
            (dasherize(name), ResourceRelationship { data })
        })
        .collect();

    Ok(ResourceObject {
        resource_type: record.record_type().resource_type().to_string(),
        id: identities.bound_remote_id(&record.identity),
        attributes,
        relationships,
    })
}

fn resource_ref(identifier: &ResourceIdentifier) -> ResourceRef {
    ResourceRef::new(identifier.resource_type.clone(), identifier.id.clone())
}

fn identifier(identities: &IdentityReconciler, identity: &RecordIdentity) -> ResourceIdentifier {
    ResourceIdentifier {
        resource_type: identity.record_type.resource_type().to_string(),
        id: identities.remote_id_of(identity),
    }
}
