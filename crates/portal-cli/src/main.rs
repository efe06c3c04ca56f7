//! Portal - client record store CLI
//!
//! The `portal` command exercises the record store helpers offline.
//!
//! ## Commands
//!
//! - `schema`: List models, or show one model's keys and members
//! - `relationship`: Show the related type and inverse of a relationship
//! - `build-new`: Build a new record and print it as a JSON:API resource
//! - `hydrate`: Load a JSON:API document and print the reconciled records
//! - `notify`: Replay notification ids against a document-seeded store
//! - `config`: Show the remote source URL and request settings

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use portal_data::fakes::MemoryRecordStore;
use portal_data::jsonapi::ResourceDocument;
use portal_data::{
    AttributeKind, AttributeValue, Cardinality, NotificationListener, RecordOptions, RecordType,
    RelationshipSpec, ResourceRef, Schema, StoreConfig, StoreContext,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "portal")]
#[command(author = "SIL AppBuilder Portal Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AppBuilder Portal record store tools", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List models, or show a single model
    Schema {
        /// Model name (camelCase, dasherized, or plural resource type)
        record_type: Option<String>,
    },

    /// Show the related type and inverse name of a relationship
    Relationship {
        /// Model name
        record_type: String,

        /// Relationship name on that model
        name: String,
    },

    /// Build a new record and print its JSON:API resource
    BuildNew {
        /// Model name
        record_type: String,

        /// Attribute as name=value (repeatable)
        #[arg(long = "attr", value_name = "NAME=VALUE")]
        attributes: Vec<String>,

        /// Relationship as name=type:id[,type:id] (repeatable, empty clears)
        #[arg(long = "rel", value_name = "NAME=REFS")]
        relationships: Vec<String>,
    },

    /// Hydrate a JSON:API document and print the local records
    Hydrate {
        /// Path to the document (JSON)
        document: PathBuf,
    },

    /// Load notification ids into a store seeded from a document
    Notify {
        /// Document used to seed the store
        #[arg(short, long)]
        document: PathBuf,

        /// Notification ids as pushed by the server
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// Show the remote source configuration read from the environment
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    portal_data::telemetry::init_tracing(cli.json, level);

    let config = StoreConfig::from_env().map_err(anyhow::Error::msg)?;
    let context = StoreContext::portal(config).context("Failed to load portal schema")?;

    match cli.command {
        Commands::Schema { record_type } => cmd_schema(&context, record_type.as_deref()),
        Commands::Relationship { record_type, name } => {
            cmd_relationship(&context, &record_type, &name)
        }
        Commands::BuildNew {
            record_type,
            attributes,
            relationships,
        } => cmd_build_new(&context, &record_type, &attributes, &relationships),
        Commands::Hydrate { document } => cmd_hydrate(&context, &document),
        Commands::Notify { document, ids } => cmd_notify(context, &document, ids).await,
        Commands::Config => print_json(&source_summary(context.config())),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_schema(context: &StoreContext, record_type: Option<&str>) -> Result<()> {
    let schema = context.schema();
    match record_type {
        Some(name) => print_json(schema.model_named(name)?),
        None => {
            for model in schema.models() {
                println!(
                    "{:<22} {:<24} {:>2} attributes  {:>2} relationships",
                    model.record_type.as_str(),
                    model.record_type.resource_type(),
                    model.attributes.len(),
                    model.relationships.len()
                );
            }
            Ok(())
        }
    }
}

fn cmd_relationship(context: &StoreContext, record_type: &str, name: &str) -> Result<()> {
    let meta = context
        .schema()
        .relationship_metadata_named(record_type, name)?;
    println!("type:     {}", meta.related_type);
    println!("inverse:  {}", meta.inverse);
    println!("kind:     {}", meta.cardinality);
    Ok(())
}

fn cmd_build_new(
    context: &StoreContext,
    record_type: &str,
    attributes: &[String],
    relationships: &[String],
) -> Result<()> {
    let record_type = RecordType::parse(record_type)?;
    let options = parse_record_options(context.schema(), record_type, attributes, relationships)?;

    let record = context.build_new(record_type, options)?;
    info!(event = "cli.record_built", identity = %record.identity);

    let resource = context.serialize(&record)?;
    print_json(&ResourceDocument::single(resource))
}

fn cmd_hydrate(context: &StoreContext, path: &Path) -> Result<()> {
    let document = read_document(path)?;
    let hydrated = context.hydrate_document(&document)?;

    let records: Vec<_> = hydrated.records().collect();
    print_json(&records)?;
    info!(
        event = "cli.hydrated",
        primary = hydrated.primary.len(),
        included = hydrated.included.len(),
    );
    Ok(())
}

async fn cmd_notify(context: StoreContext, path: &Path, ids: Vec<u64>) -> Result<()> {
    let document = read_document(path)?;
    let context = Arc::new(context);
    let store = Arc::new(MemoryRecordStore::new(context.identities().clone()));
    store.seed(context.schema(), &document)?;

    let listener = NotificationListener::new(context.clone(), store.clone());
    let (tx, rx) = mpsc::channel(ids.len().max(1));
    for id in &ids {
        tx.send(*id).await?;
    }
    drop(tx);
    let loaded = listener.run(rx).await;
    info!(event = "cli.notifications_replayed", requested = ids.len(), loaded = loaded);

    let resources = ids
        .iter()
        .filter_map(|id| {
            let identity = context
                .identities()
                .build_identity(&id.to_string(), RecordType::Notification);
            store.get(&identity)
        })
        .map(|record| context.serialize(&record))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    print_json(&resources)
}

/// Base URL and request settings, with the bearer token masked.
fn source_summary(config: &StoreConfig) -> Value {
    let mut settings = config.default_source_settings();
    if let Some(Value::Object(headers)) = settings.get_mut("headers") {
        if let Some(auth) = headers.get_mut("Authorization") {
            *auth = json!("Bearer ***");
        }
    }
    json!({
        "baseUrl": config.base_url(),
        "settings": settings,
    })
}

fn read_document(path: &Path) -> Result<ResourceDocument> {
    let raw = std::fs::read_to_string(path).context(format!("Failed to read {:?}", path))?;
    ResourceDocument::from_json(&raw).context(format!("Invalid JSON:API document in {:?}", path))
}

/// Parse `--attr` and `--rel` arguments against the model's declarations.
fn parse_record_options(
    schema: &Schema,
    record_type: RecordType,
    attributes: &[String],
    relationships: &[String],
) -> Result<RecordOptions> {
    let mut options = RecordOptions::new();

    for arg in attributes {
        let (name, raw) = split_assignment(arg)?;
        let kind = schema.attribute(record_type, name)?.kind;
        options = options.attribute(name, parse_attribute(kind, raw)?);
    }

    for arg in relationships {
        let (name, raw) = split_assignment(arg)?;
        let cardinality = schema.relationship_metadata(record_type, name)?.cardinality;
        options = options.relationship(name, parse_relationship(cardinality, raw)?);
    }

    Ok(options)
}

fn split_assignment(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => bail!("expected NAME=VALUE, got '{}'", arg),
    }
}

fn parse_attribute(kind: AttributeKind, raw: &str) -> Result<AttributeValue> {
    if raw == "null" {
        return Ok(AttributeValue::Null);
    }
    let value = match kind {
        AttributeKind::String => AttributeValue::from(raw),
        AttributeKind::Boolean => AttributeValue::Bool(
            raw.parse()
                .context(format!("'{}' is not a boolean", raw))?,
        ),
        AttributeKind::Number => AttributeValue::Number(
            serde_json::from_str(raw).context(format!("'{}' is not a number", raw))?,
        ),
        AttributeKind::Date => {
            let value = AttributeValue::from(raw).coerce(kind);
            if !kind.accepts(&value) {
                bail!("'{}' is not a timestamp", raw);
            }
            value
        }
    };
    Ok(value)
}

fn parse_relationship(cardinality: Cardinality, raw: &str) -> Result<RelationshipSpec> {
    let mut refs = raw
        .split(',')
        .filter(|part| !part.is_empty())
        .map(parse_ref)
        .collect::<Result<Vec<_>>>()?;

    match cardinality {
        Cardinality::HasMany => Ok(RelationshipSpec::Many(refs)),
        Cardinality::HasOne => {
            if refs.len() > 1 {
                bail!("to-one relationship given {} references", refs.len());
            }
            Ok(refs.pop().map_or(RelationshipSpec::Empty, RelationshipSpec::One))
        }
    }
}

fn parse_ref(part: &str) -> Result<ResourceRef> {
    match part.split_once(':') {
        Some((record_type, id)) if !record_type.is_empty() && !id.is_empty() => {
            Ok(ResourceRef::new(record_type, id))
        }
        _ => bail!("expected type:id, got '{}'", part),
    }
}
