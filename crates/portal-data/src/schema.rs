//! Static record schema for the portal client store
//!
//! Every model the portal holds in its client cache is declared here with its
//! attributes and relationships. The table is validated once when a
//! [`Schema`] is constructed: each relationship must name an inverse that
//! exists on the related model and points back at it.
//!
//! Models:
//! - organizations, memberships, invites and their product definitions/stores
//! - projects, products, artifacts, tasks and reviewers
//! - users, roles, groups and notifications

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::identity::REMOTE_ID;
use crate::inflect::camelize;

/// Result type for schema lookups
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

/// Every model type known to the portal store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordType {
    OrganizationInvite,
    Organization,
    OrganizationMembership,
    GroupMembership,
    OrganizationProductDefinition,
    OrganizationStore,
    Project,
    ApplicationType,
    Product,
    ProductArtifact,
    ProductDefinition,
    Store,
    StoreLanguage,
    StoreType,
    Task,
    Notification,
    Role,
    Group,
    Reviewer,
    User,
}

impl RecordType {
    pub const ALL: [RecordType; 20] = [
        RecordType::OrganizationInvite,
        RecordType::Organization,
        RecordType::OrganizationMembership,
        RecordType::GroupMembership,
        RecordType::OrganizationProductDefinition,
        RecordType::OrganizationStore,
        RecordType::Project,
        RecordType::ApplicationType,
        RecordType::Product,
        RecordType::ProductArtifact,
        RecordType::ProductDefinition,
        RecordType::Store,
        RecordType::StoreLanguage,
        RecordType::StoreType,
        RecordType::Task,
        RecordType::Notification,
        RecordType::Role,
        RecordType::Group,
        RecordType::Reviewer,
        RecordType::User,
    ];

    /// camelCase model name, as used in the client cache
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::OrganizationInvite => "organizationInvite",
            RecordType::Organization => "organization",
            RecordType::OrganizationMembership => "organizationMembership",
            RecordType::GroupMembership => "groupMembership",
            RecordType::OrganizationProductDefinition => "organizationProductDefinition",
            RecordType::OrganizationStore => "organizationStore",
            RecordType::Project => "project",
            RecordType::ApplicationType => "applicationType",
            RecordType::Product => "product",
            RecordType::ProductArtifact => "productArtifact",
            RecordType::ProductDefinition => "productDefinition",
            RecordType::Store => "store",
            RecordType::StoreLanguage => "storeLanguage",
            RecordType::StoreType => "storeType",
            RecordType::Task => "task",
            RecordType::Notification => "notification",
            RecordType::Role => "role",
            RecordType::Group => "group",
            RecordType::Reviewer => "reviewer",
            RecordType::User => "user",
        }
    }

    /// Plural dasherized type used on the JSON:API wire
    pub fn resource_type(&self) -> &'static str {
        match self {
            RecordType::OrganizationInvite => "organization-invites",
            RecordType::Organization => "organizations",
            RecordType::OrganizationMembership => "organization-memberships",
            RecordType::GroupMembership => "group-memberships",
            RecordType::OrganizationProductDefinition => "organization-product-definitions",
            RecordType::OrganizationStore => "organization-stores",
            RecordType::Project => "projects",
            RecordType::ApplicationType => "application-types",
            RecordType::Product => "products",
            RecordType::ProductArtifact => "product-artifacts",
            RecordType::ProductDefinition => "product-definitions",
            RecordType::Store => "stores",
            RecordType::StoreLanguage => "store-languages",
            RecordType::StoreType => "store-types",
            RecordType::Task => "tasks",
            RecordType::Notification => "notifications",
            RecordType::Role => "roles",
            RecordType::Group => "groups",
            RecordType::Reviewer => "reviewers",
            RecordType::User => "users",
        }
    }

    /// Parse a model name in any of its spellings: `organizationMembership`,
    /// `organization-membership` or the wire type `organization-memberships`.
    pub fn parse(name: &str) -> SchemaResult<Self> {
        let camel = camelize(name);
        RecordType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == camel || t.resource_type() == name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }
}

impl FromStr for RecordType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::parse(s)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared attribute type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    String,
    Boolean,
    Number,
    Date,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttributeKind::String => "string",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Number => "number",
            AttributeKind::Date => "date",
        };
        f.write_str(s)
    }
}

/// Relationship cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    HasOne,
    HasMany,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::HasOne => f.write_str("hasOne"),
            Cardinality::HasMany => f.write_str("hasMany"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDef {
    pub name: &'static str,
    pub kind: AttributeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipDef {
    pub name: &'static str,
    pub cardinality: Cardinality,
    /// Related model
    pub model: RecordType,
    /// Name of the relationship on `model` that points back here
    pub inverse: &'static str,
}

/// One model: its key names, attributes and relationships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDef {
    pub record_type: RecordType,
    pub keys: Vec<&'static str>,
    pub attributes: Vec<AttributeDef>,
    pub relationships: Vec<RelationshipDef>,
}

impl ModelDef {
    /// Create a model carrying the `remoteId` key and no members
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            keys: vec![REMOTE_ID],
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &'static str, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeDef { name, kind });
        self
    }

    pub fn has_one(
        mut self,
        name: &'static str,
        model: RecordType,
        inverse: &'static str,
    ) -> Self {
        self.relationships.push(RelationshipDef {
            name,
            cardinality: Cardinality::HasOne,
            model,
            inverse,
        });
        self
    }

    pub fn has_many(
        mut self,
        name: &'static str,
        model: RecordType,
        inverse: &'static str,
    ) -> Self {
        self.relationships.push(RelationshipDef {
            name,
            cardinality: Cardinality::HasMany,
            model,
            inverse,
        });
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn has_key(&self, name: &str) -> bool {
        self.keys.iter().any(|k| *k == name)
    }
}

/// Result of a relationship lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipMetadata {
    pub related_type: RecordType,
    pub inverse: &'static str,
    pub cardinality: Cardinality,
}

/// Validated, immutable model table.
#[derive(Debug, Clone)]
pub struct Schema {
    models: BTreeMap<RecordType, ModelDef>,
}

impl Schema {
    /// Build a schema from model definitions, rejecting duplicate declarations
    /// and relationships whose inverse is missing or does not point back.
    pub fn new(definitions: Vec<ModelDef>) -> SchemaResult<Self> {
        let mut models = BTreeMap::new();
        for def in definitions {
            check_unique_members(&def)?;
            let record_type = def.record_type;
            if models.insert(record_type, def).is_some() {
                return Err(SchemaError::DuplicateModel(record_type.to_string()));
            }
        }

        for model in models.values() {
            for rel in &model.relationships {
                let related = models
                    .get(&rel.model)
                    .ok_or_else(|| SchemaError::UnknownType(rel.model.to_string()))?;
                let inverse =
                    related
                        .relationship(rel.inverse)
                        .ok_or_else(|| SchemaError::DanglingInverse {
                            record_type: model.record_type.to_string(),
                            relationship: rel.name.to_string(),
                            related_type: rel.model.to_string(),
                            inverse: rel.inverse.to_string(),
                        })?;
                if inverse.model != model.record_type || inverse.inverse != rel.name {
                    return Err(SchemaError::AsymmetricInverse {
                        record_type: model.record_type.to_string(),
                        relationship: rel.name.to_string(),
                        related_type: rel.model.to_string(),
                        inverse: rel.inverse.to_string(),
                    });
                }
            }
        }

        Ok(Self { models })
    }

    /// The portal's built-in model table
    pub fn portal() -> SchemaResult<Self> {
        Self::new(portal_models())
    }

    pub fn model(&self, record_type: RecordType) -> SchemaResult<&ModelDef> {
        self.models
            .get(&record_type)
            .ok_or_else(|| SchemaError::UnknownType(record_type.to_string()))
    }

    pub fn model_named(&self, name: &str) -> SchemaResult<&ModelDef> {
        self.model(RecordType::parse(name)?)
    }

    pub fn attribute(&self, record_type: RecordType, name: &str) -> SchemaResult<&AttributeDef> {
        self.model(record_type)?
            .attribute(name)
            .ok_or_else(|| SchemaError::UnknownAttribute {
                record_type: record_type.to_string(),
                attribute: name.to_string(),
            })
    }

    pub fn relationship(
        &self,
        record_type: RecordType,
        name: &str,
    ) -> SchemaResult<&RelationshipDef> {
        self.model(record_type)?
            .relationship(name)
            .ok_or_else(|| SchemaError::UnknownRelationship {
                record_type: record_type.to_string(),
                relationship: name.to_string(),
            })
    }

    /// Related model and inverse relationship name for `record_type.name`.
    pub fn relationship_metadata(
        &self,
        record_type: RecordType,
        name: &str,
    ) -> SchemaResult<RelationshipMetadata> {
        let rel = self.relationship(record_type, name)?;
        Ok(RelationshipMetadata {
            related_type: rel.model,
            inverse: rel.inverse,
            cardinality: rel.cardinality,
        })
    }

    /// String-typed form of [`Schema::relationship_metadata`]
    pub fn relationship_metadata_named(
        &self,
        type_name: &str,
        name: &str,
    ) -> SchemaResult<RelationshipMetadata> {
        self.relationship_metadata(RecordType::parse(type_name)?, name)
    }

    /// Related model only
    pub fn related_type(&self, record_type: RecordType, name: &str) -> SchemaResult<RecordType> {
        Ok(self.relationship(record_type, name)?.model)
    }

    /// Inverse relationship name only
    pub fn inverse_of(&self, record_type: RecordType, name: &str) -> SchemaResult<&'static str> {
        Ok(self.relationship(record_type, name)?.inverse)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDef> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn check_unique_members(def: &ModelDef) -> SchemaResult<()> {
    let duplicate = |member: &str| SchemaError::DuplicateMember {
        record_type: def.record_type.to_string(),
        member: member.to_string(),
    };

    for (i, a) in def.attributes.iter().enumerate() {
        if def.attributes[..i].iter().any(|b| b.name == a.name) {
            return Err(duplicate(a.name));
        }
    }
    // Attributes and relationships live in separate namespaces (project has
    // both a `type` attribute and a `type` relationship).
    for (i, r) in def.relationships.iter().enumerate() {
        if def.relationships[..i].iter().any(|s| s.name == r.name) {
            return Err(duplicate(r.name));
        }
    }
    Ok(())
}

fn portal_models() -> Vec<ModelDef> {
    use AttributeKind::{Boolean, Date, Number, String};
    use RecordType as T;

    vec![
        ModelDef::new(T::OrganizationInvite)
            .attr("name", String)
            .attr("ownerEmail", String)
            .attr("token", String)
            .attr("expiresAt", Date),
        ModelDef::new(T::Organization)
            .attr("name", String)
            .attr("websiteUrl", String)
            .attr("buildEngineUrl", String)
            .attr("logoUrl", String)
            .attr("makePrivateByDefault", Boolean)
            .attr("useSilBuildInfrastructure", Boolean)
            .attr("buildEngineApiAccessToken", String)
            // send-only: accepting an invite to create an organization
            .attr("token", String)
            // filter key
            .attr("scopeToCurrentUser", String)
            .has_one("owner", T::User, "ownedOrganizations")
            .has_many("users", T::User, "organizations")
            .has_many("projects", T::Project, "organization")
            .has_many("userMemberships", T::OrganizationMembership, "organization")
            .has_many("groups", T::Group, "owner")
            .has_many(
                "organizationProductDefinitions",
                T::OrganizationProductDefinition,
                "organization",
            )
            .has_many("organizationStores", T::OrganizationStore, "organization"),
        ModelDef::new(T::OrganizationMembership)
            .has_one("user", T::User, "organizationMemberships")
            .has_one("organization", T::Organization, "userMemberships"),
        ModelDef::new(T::GroupMembership)
            .has_one("user", T::User, "groupMemberships")
            .has_one("group", T::Group, "groupMemberships"),
        ModelDef::new(T::OrganizationProductDefinition)
            .has_one(
                "organization",
                T::Organization,
                "organizationProductDefinitions",
            )
            .has_one(
                "productDefinition",
                T::ProductDefinition,
                "organizationProductDefinitions",
            ),
        ModelDef::new(T::OrganizationStore)
            .has_one("organization", T::Organization, "organizationStores")
            .has_one("store", T::Store, "organizationStores"),
        ModelDef::new(T::Project)
            .attr("name", String)
            .attr("status", String)
            .attr("dateCreated", Date)
            .attr("dateArchived", Date)
            .attr("language", String)
            .attr("type", String)
            .attr("description", String)
            .attr("automaticBuilds", Boolean)
            .attr("allowDownloads", Boolean)
            .attr("location", String)
            .attr("isPublic", Boolean)
            // filter key
            .attr("ownerId", String)
            .has_many("tasks", T::Task, "project")
            .has_many("products", T::Product, "project")
            .has_one("organization", T::Organization, "projects")
            .has_one("owner", T::User, "projects")
            .has_one("group", T::Group, "projects")
            .has_many("reviewers", T::Reviewer, "project")
            .has_one("type", T::ApplicationType, "projects"),
        ModelDef::new(T::ApplicationType)
            .attr("name", String)
            .attr("description", String)
            .has_many("projects", T::Project, "type")
            .has_many("productDefinitions", T::ProductDefinition, "type"),
        ModelDef::new(T::Product)
            .attr("dateCreated", String)
            .attr("dateUpdated", String)
            .attr("datePublished", String)
            .attr("dateBuilt", String)
            .attr("versionBuilt", String)
            .attr("publishLink", String)
            .attr("properties", String)
            .has_one("project", T::Project, "products")
            .has_one("productDefinition", T::ProductDefinition, "products")
            .has_one("store", T::Store, "products")
            .has_one("storeLanguage", T::StoreLanguage, "products")
            .has_many("artifacts", T::ProductArtifact, "product")
            .has_many("tasks", T::Task, "product"),
        ModelDef::new(T::ProductArtifact)
            .attr("artifactType", String)
            .attr("url", String)
            .attr("fileSize", Number)
            .attr("contentType", String)
            .attr("dateCreated", String)
            .attr("dateUpdated", String)
            .has_one("product", T::Product, "artifacts"),
        ModelDef::new(T::ProductDefinition)
            .attr("name", String)
            .attr("description", String)
            .has_many("products", T::Product, "productDefinition")
            .has_many(
                "organizationProductDefinitions",
                T::OrganizationProductDefinition,
                "productDefinition",
            )
            .has_one("type", T::ApplicationType, "productDefinitions"),
        ModelDef::new(T::Store)
            .attr("name", String)
            .attr("description", String)
            .has_many("organizationStores", T::OrganizationStore, "store")
            .has_one("storeType", T::StoreType, "stores")
            .has_many("products", T::Product, "store"),
        ModelDef::new(T::StoreLanguage)
            .attr("name", String)
            .attr("description", String)
            .has_one("storeType", T::StoreType, "storeLanguages")
            .has_many("products", T::Product, "storeLanguage"),
        ModelDef::new(T::StoreType)
            .attr("name", String)
            .attr("description", String)
            .has_many("stores", T::Store, "storeType")
            .has_many("storeLanguages", T::StoreLanguage, "storeType"),
        ModelDef::new(T::Task)
            .attr("status", String)
            .attr("waitTime", Number)
            .has_one("project", T::Project, "tasks")
            .has_one("product", T::Product, "tasks")
            .has_one("assigned", T::User, "assignedTasks"),
        ModelDef::new(T::Notification)
            .attr("title", String)
            .attr("description", String)
            .attr("time", Date)
            .attr("link", String)
            .attr("isViewed", Boolean)
            .attr("show", Boolean),
        ModelDef::new(T::Role)
            .attr("name", String)
            .has_many("users", T::User, "role"),
        ModelDef::new(T::Group)
            .attr("name", String)
            .has_many("groupMemberships", T::GroupMembership, "group")
            .has_many("projects", T::Project, "group")
            .has_one("owner", T::Organization, "groups"),
        ModelDef::new(T::Reviewer)
            .attr("name", String)
            .attr("email", String)
            .has_one("project", T::Project, "reviewers"),
        ModelDef::new(T::User)
            .attr("name", String)
            .attr("givenName", String)
            .attr("familyName", String)
            .attr("auth0Id", String)
            .attr("email", String)
            .attr("phone", String)
            .attr("isLocked", Boolean)
            .attr("profileVisibility", Number)
            .attr("emailNotification", Boolean)
            .attr("timezone", String)
            .attr("localization", String)
            .attr("decimalSeparator", String)
            .has_many("ownedOrganizations", T::Organization, "owner")
            .has_many(
                "organizationMemberships",
                T::OrganizationMembership,
                "user",
            )
            .has_many("groupMemberships", T::GroupMembership, "user")
            .has_many("organizations", T::Organization, "users")
            .has_many("assignedTasks", T::Task, "assigned")
            .has_many("projects", T::Project, "owner")
            .has_one("role", T::Role, "users"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_schema_is_consistent() {
        let schema = Schema::portal().unwrap();
        assert_eq!(schema.len(), RecordType::ALL.len());
    }

    #[test]
    fn project_owner_points_at_users() {
        let schema = Schema::portal().unwrap();
        let meta = schema
            .relationship_metadata(RecordType::Project, "owner")
            .unwrap();
        assert_eq!(meta.related_type, RecordType::User);
        assert_eq!(meta.inverse, "projects");
        assert_eq!(meta.cardinality, Cardinality::HasOne);
    }

    #[test]
    fn unknown_relationship_fails() {
        let schema = Schema::portal().unwrap();
        let err = schema
            .relationship_metadata(RecordType::Project, "doesNotExist")
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownRelationship { .. }));
    }

    #[test]
    fn unknown_type_name_fails() {
        let schema = Schema::portal().unwrap();
        let err = schema
            .relationship_metadata_named("widget", "owner")
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownType("widget".to_string()));
    }

    #[test]
    fn parse_accepts_all_spellings() {
        for name in [
            "organizationMembership",
            "organization-membership",
            "organization-memberships",
        ] {
            assert_eq!(
                RecordType::parse(name).unwrap(),
                RecordType::OrganizationMembership
            );
        }
        assert_eq!("users".parse::<RecordType>().unwrap(), RecordType::User);
    }

    #[test]
    fn every_type_round_trips_through_its_names() {
        for t in RecordType::ALL {
            assert_eq!(RecordType::parse(t.as_str()).unwrap(), t);
            assert_eq!(RecordType::parse(t.resource_type()).unwrap(), t);
        }
    }

    #[test]
    fn dangling_inverse_rejected() {
        let err = Schema::new(vec![
            ModelDef::new(RecordType::Project).has_one("owner", RecordType::User, "projects"),
            ModelDef::new(RecordType::User),
        ])
        .unwrap_err();
        assert!(matches!(err, SchemaError::DanglingInverse { .. }));
    }

    #[test]
    fn asymmetric_inverse_rejected() {
        let err = Schema::new(vec![
            ModelDef::new(RecordType::Project).has_one("owner", RecordType::User, "projects"),
            ModelDef::new(RecordType::User).has_many("projects", RecordType::Project, "group"),
        ])
        .unwrap_err();
        assert!(matches!(err, SchemaError::AsymmetricInverse { .. }));
    }

    #[test]
    fn related_model_must_be_declared() {
        let err = Schema::new(vec![
            ModelDef::new(RecordType::Project).has_one("owner", RecordType::User, "projects")
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::UnknownType("user".to_string()));
    }

    #[test]
    fn duplicate_model_rejected() {
        let err = Schema::new(vec![
            ModelDef::new(RecordType::Role),
            ModelDef::new(RecordType::Role),
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateModel("role".to_string()));
    }

    #[test]
    fn duplicate_attribute_rejected() {
        let err = Schema::new(vec![ModelDef::new(RecordType::Role)
            .attr("name", AttributeKind::String)
            .attr("name", AttributeKind::Boolean)])
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateMember { .. }));
    }

    #[test]
    fn attribute_and_relationship_may_share_a_name() {
        let schema = Schema::portal().unwrap();
        assert_eq!(
            schema.attribute(RecordType::Project, "type").unwrap().kind,
            AttributeKind::String
        );
        assert_eq!(
            schema.related_type(RecordType::Project, "type").unwrap(),
            RecordType::ApplicationType
        );
    }

    #[test]
    fn every_model_carries_remote_id_key() {
        let schema = Schema::portal().unwrap();
        assert!(schema.models().all(|m| m.has_key(REMOTE_ID)));
    }
}
