//! Records held in the client cache and the helpers that build new ones

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::SchemaError;
use crate::identity::{IdentityReconciler, RecordIdentity};
use crate::schema::{AttributeKind, Cardinality, RecordType, Schema, SchemaResult};

/// Scalar attribute value
///
/// Strings always deserialize as `String`; a `Date` is only produced by
/// coercing against an attribute declared as a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
}

impl AttributeValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "boolean",
            AttributeValue::Number(_) => "number",
            AttributeValue::String(_) => "string",
            AttributeValue::Date(_) => "date",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a timestamp string to `Date` when the attribute is a date.
    ///
    /// RFC 3339 is tried first; a timestamp without an offset is read as UTC.
    pub fn coerce(self, kind: AttributeKind) -> Self {
        match (kind, self) {
            (AttributeKind::Date, AttributeValue::String(s)) => match parse_timestamp(&s) {
                Some(date) => AttributeValue::Date(date),
                None => AttributeValue::String(s),
            },
            (_, value) => value,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl AttributeKind {
    /// Null is accepted for every kind.
    pub fn accepts(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (_, AttributeValue::Null)
                | (AttributeKind::String, AttributeValue::String(_))
                | (AttributeKind::Boolean, AttributeValue::Bool(_))
                | (AttributeKind::Number, AttributeValue::Number(_))
                | (AttributeKind::Date, AttributeValue::Date(_))
        )
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Non-finite values have no JSON form and become `Null`.
impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(AttributeValue::Null, AttributeValue::Number)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value.into())
    }
}

impl From<Number> for AttributeValue {
    fn from(value: Number) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        AttributeValue::Date(value)
    }
}

/// Related identities of one relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    HasMany(Vec<RecordIdentity>),
    HasOne(Option<RecordIdentity>),
}

impl RelationshipData {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            RelationshipData::HasMany(_) => Cardinality::HasMany,
            RelationshipData::HasOne(_) => Cardinality::HasOne,
        }
    }

    pub fn as_one(&self) -> Option<&RecordIdentity> {
        match self {
            RelationshipData::HasOne(identity) => identity.as_ref(),
            RelationshipData::HasMany(_) => None,
        }
    }

    pub fn identities(&self) -> Vec<&RecordIdentity> {
        match self {
            RelationshipData::HasMany(identities) => identities.iter().collect(),
            RelationshipData::HasOne(identity) => identity.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub data: RelationshipData,
}

impl Relationship {
    pub fn has_one(identity: Option<RecordIdentity>) -> Self {
        Self {
            data: RelationshipData::HasOne(identity),
        }
    }

    pub fn has_many(identities: Vec<RecordIdentity>) -> Self {
        Self {
            data: RelationshipData::HasMany(identities),
        }
    }
}

/// A cached record: identity plus attributes and relationships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub identity: RecordIdentity,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Relationship>,
}

impl Record {
    pub fn new(identity: RecordIdentity) -> Self {
        Self {
            identity,
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.identity.record_type
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn related(&self, name: &str) -> Option<&RelationshipData> {
        self.relationships.get(name).map(|r| &r.data)
    }

    /// Overwrite the members present in `other`, keeping everything else.
    pub fn merge(&mut self, other: Record) {
        self.attributes.extend(other.attributes);
        self.relationships.extend(other.relationships);
        if let Some(keys) = other.identity.keys {
            let merged = self.identity.keys.get_or_insert_with(Default::default);
            for (name, value) in keys.iter() {
                merged.insert(name, value);
            }
        }
    }
}

/// Reference to a related record by type name and remote id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub record_type: String,
    pub id: String,
}

impl ResourceRef {
    pub fn new(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            id: id.into(),
        }
    }
}

/// Relationship input for new or replaced records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipSpec {
    Many(Vec<ResourceRef>),
    One(ResourceRef),
    Empty,
}

/// Attributes and relationships supplied when creating or replacing a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordOptions {
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipSpec>,
}

impl RecordOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn relationship(mut self, name: impl Into<String>, spec: RelationshipSpec) -> Self {
        self.relationships.insert(name.into(), spec);
        self
    }
}

/// Build a record that has not been persisted yet.
///
/// The record gets a fresh local id and no keys. Every related reference is
/// resolved through [`IdentityReconciler::build_identity`], so related
/// records share local ids with anything already cached.
pub fn build_new_record(
    schema: &Schema,
    identities: &IdentityReconciler,
    record_type: RecordType,
    options: RecordOptions,
) -> SchemaResult<Record> {
    let attributes = validate_attributes(schema, record_type, options.attributes)?;
    let relationships =
        build_relationships(schema, identities, record_type, options.relationships)?;

    Ok(Record {
        identity: identities.new_identity(record_type),
        attributes,
        relationships,
    })
}

/// Check attribute names and kinds against the schema, coercing dates.
pub fn validate_attributes(
    schema: &Schema,
    record_type: RecordType,
    attributes: BTreeMap<String, AttributeValue>,
) -> SchemaResult<BTreeMap<String, AttributeValue>> {
    attributes
        .into_iter()
        .map(|(name, value)| {
            let def = schema.attribute(record_type, &name)?;
            let value = value.coerce(def.kind);
            if !def.kind.accepts(&value) {
                return Err(SchemaError::AttributeKindMismatch {
                    record_type: record_type.to_string(),
                    attribute: name,
                    expected: def.kind.to_string(),
                    actual: value.kind_name().to_string(),
                });
            }
            Ok((name, value))
        })
        .collect()
}

/// Resolve relationship specs into identities, checking names, related
/// types and cardinality.
pub fn build_relationships(
    schema: &Schema,
    identities: &IdentityReconciler,
    record_type: RecordType,
    specs: BTreeMap<String, RelationshipSpec>,
) -> SchemaResult<BTreeMap<String, Relationship>> {
    let mut relationships = BTreeMap::new();
    for (name, spec) in specs {
        let def = schema.relationship(record_type, &name)?;
        let resolve = |reference: &ResourceRef| -> SchemaResult<RecordIdentity> {
            let related = RecordType::parse(&reference.record_type)?;
            if related != def.model {
                return Err(SchemaError::RelatedTypeMismatch {
                    record_type: record_type.to_string(),
                    relationship: name.clone(),
                    expected: def.model.to_string(),
                    actual: related.to_string(),
                });
            }
            Ok(identities.build_identity(&reference.id, related))
        };

        let relationship = match (def.cardinality, &spec) {
            (Cardinality::HasOne, RelationshipSpec::One(reference)) => {
                Relationship::has_one(Some(resolve(reference)?))
            }
            (Cardinality::HasOne, RelationshipSpec::Empty) => Relationship::has_one(None),
            (Cardinality::HasMany, RelationshipSpec::Many(references)) => Relationship::has_many(
                references
                    .iter()
                    .map(&resolve)
                    .collect::<SchemaResult<Vec<_>>>()?,
            ),
            (Cardinality::HasMany, RelationshipSpec::Empty) => Relationship::has_many(Vec::new()),
            (cardinality, _) => {
                return Err(SchemaError::CardinalityMismatch {
                    record_type: record_type.to_string(),
                    relationship: name.clone(),
                    expected: cardinality.to_string(),
                })
            }
        };
        relationships.insert(name, relationship);
    }
    Ok(relationships)
}
