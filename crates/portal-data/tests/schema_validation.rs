//! Schema table checks across every built-in model.

use portal_data::{Cardinality, ModelDef, RecordType, Schema, SchemaError, REMOTE_ID};

#[test]
fn every_record_type_has_a_model() {
    let schema = Schema::portal().unwrap();
    assert_eq!(schema.len(), RecordType::ALL.len());
    for t in RecordType::ALL {
        let model = schema.model(t).unwrap();
        assert!(model.has_key(REMOTE_ID), "{t} is missing remoteId");
    }
}

#[test]
fn every_relationship_round_trips_through_its_inverse() {
    let schema = Schema::portal().unwrap();
    for model in schema.models() {
        for rel in &model.relationships {
            let back = schema.relationship_metadata(rel.model, rel.inverse).unwrap();
            assert_eq!(back.related_type, model.record_type);
            assert_eq!(back.inverse, rel.name);
        }
    }
}

#[test]
fn type_names_parse_in_every_spelling() {
    for t in RecordType::ALL {
        assert_eq!(RecordType::parse(t.as_str()).unwrap(), t);
        assert_eq!(RecordType::parse(t.resource_type()).unwrap(), t);
    }
    assert_eq!(
        RecordType::parse("organization-product-definition").unwrap(),
        RecordType::OrganizationProductDefinition
    );
    assert!(matches!(
        RecordType::parse("widget"),
        Err(SchemaError::UnknownType(_))
    ));
}

#[test]
fn corrected_relationships() {
    let schema = Schema::portal().unwrap();

    let projects = schema
        .relationship_metadata(RecordType::Organization, "projects")
        .unwrap();
    assert_eq!(projects.related_type, RecordType::Project);
    assert_eq!(projects.cardinality, Cardinality::HasMany);

    assert_eq!(
        schema.inverse_of(RecordType::Product, "tasks").unwrap(),
        "product"
    );
    assert_eq!(
        schema.inverse_of(RecordType::StoreLanguage, "storeType").unwrap(),
        "storeLanguages"
    );
}

#[test]
fn custom_schema_is_validated_on_load() {
    let ok = Schema::new(vec![
        ModelDef::new(RecordType::Project).has_one("owner", RecordType::User, "projects"),
        ModelDef::new(RecordType::User).has_many("projects", RecordType::Project, "owner"),
    ])
    .unwrap();
    assert_eq!(ok.related_type(RecordType::User, "projects").unwrap(), RecordType::Project);

    let err = Schema::new(vec![
        ModelDef::new(RecordType::Project).has_one("owner", RecordType::User, "projects"),
        ModelDef::new(RecordType::User).has_many("tasks", RecordType::Task, "assigned"),
        ModelDef::new(RecordType::Task).has_one("assigned", RecordType::User, "tasks"),
    ])
    .unwrap_err();
    assert!(matches!(err, SchemaError::DanglingInverse { .. }));
}
