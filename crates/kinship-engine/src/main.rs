//! CLI entry point for the kinship engine.
//!
//! Designed for subprocess invocation from the application API: scan
//! requests are read as JSON from stdin, results are written as JSON to
//! stdout, logs go to stderr.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use kinship_audit::{AuditLog, FileAuditLog, MemoryAuditLog};
use kinship_core::{Actor, KinshipConfig, ParentType, PersonId, PredictionId, ReviewAction, TenantId, UnionKind};
use kinship_engine::{DuplicateRequest, KinshipEngine, ScanControl};
use kinship_graph::{Neo4jStore, StoreConfig};

#[derive(Parser)]
#[command(name = "kinship")]
#[command(about = "Integrity-guarded kinship graph engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Tenant (tree) ID.
    #[arg(long, global = true)]
    tenant_id: Option<String>,

    /// Acting user recorded in the audit trail.
    #[arg(long, default_value = "cli", global = true)]
    actor: String,

    /// Config file prefix (default: kinship).
    #[arg(short, long, default_value = "kinship", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create a parent-child edge through the integrity guard.
    ProposeEdge {
        #[arg(long)]
        parent: String,
        #[arg(long)]
        child: String,
        /// biological, adoptive, step, foster or guardian.
        #[arg(long, default_value = "biological")]
        edge_type: String,
    },
    /// Create a union between two or more persons.
    ProposeUnion {
        #[arg(long = "member", required = true, num_args = 1..)]
        members: Vec<String>,
        /// marriage or partnership.
        #[arg(long, default_value = "marriage")]
        kind: String,
    },
    /// Name the relationship of person B to person A.
    Classify {
        #[arg(long)]
        a: String,
        #[arg(long)]
        b: String,
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Detect duplicate person records (reads a JSON request from stdin).
    Duplicates,
    /// Run the relationship prediction rules for a tenant.
    Scan,
    /// Confirm, dismiss or apply a prediction.
    Resolve {
        #[arg(long)]
        prediction_id: String,
        #[arg(long, value_enum)]
        action: Action,
        /// Dismissal reason.
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    Confirm,
    Dismiss,
    Apply,
}

/// Engine configuration plus the store connection.
#[derive(Debug, Deserialize)]
struct Settings {
    #[serde(flatten)]
    kinship: KinshipConfig,
    #[serde(default)]
    neo4j: StoreConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let settings = load_settings(&cli.config)?;

    let store = Neo4jStore::connect(&settings.neo4j).await?;
    store.ensure_schema().await?;

    let audit_log: Arc<dyn AuditLog> = match &settings.kinship.audit.dir {
        Some(dir) => Arc::new(FileAuditLog::new(dir.as_str())?),
        None => Arc::new(MemoryAuditLog::new()),
    };
    let engine = KinshipEngine::new(Arc::new(store))
        .with_config(settings.kinship)
        .with_audit_log(audit_log);
    let actor = Actor::new(cli.actor.clone());

    match &cli.command {
        Command::ProposeEdge {
            parent,
            child,
            edge_type,
        } => {
            let tenant = resolve_tenant_id(&cli)?;
            let edge_type: ParentType = parse_tag(edge_type)?;
            let edge = engine
                .propose_edge(tenant, parse_person(parent)?, parse_person(child)?, edge_type, &actor)
                .await?;
            println!("{}", serde_json::to_string(&edge)?);
        }
        Command::ProposeUnion { members, kind } => {
            let tenant = resolve_tenant_id(&cli)?;
            let kind: UnionKind = parse_tag(kind)?;
            let members = members
                .iter()
                .map(|m| parse_person(m))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let union = engine.propose_union(tenant, &members, kind, &actor).await?;
            println!("{}", serde_json::to_string(&union)?);
        }
        Command::Classify { a, b, max_depth } => {
            let tenant = resolve_tenant_id(&cli)?;
            let outcome = engine
                .classify_relationship(tenant, parse_person(a)?, parse_person(b)?, *max_depth)
                .await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Command::Duplicates => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let request: DuplicateRequest = serde_json::from_str(&input)?;
            let page = engine.detect_duplicates(request, ScanControl::new()).await?;
            println!("{}", serde_json::to_string(&page)?);
        }
        Command::Scan => {
            let tenant = resolve_tenant_id(&cli)?;
            let summary = engine
                .scan_predictions(tenant, &actor, ScanControl::new())
                .await?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Command::Resolve {
            prediction_id,
            action,
            reason,
        } => {
            let id = PredictionId(uuid::Uuid::parse_str(prediction_id)?);
            let action = match action {
                Action::Confirm => ReviewAction::Confirm,
                Action::Dismiss => ReviewAction::Dismiss {
                    reason: reason.clone(),
                },
                Action::Apply => ReviewAction::Apply,
            };
            let prediction = engine.resolve_prediction(id, action, &actor).await?;
            println!("{}", serde_json::to_string(&prediction)?);
        }
    }

    Ok(())
}

fn resolve_tenant_id(cli: &Cli) -> anyhow::Result<TenantId> {
    let raw = cli
        .tenant_id
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("--tenant-id is required for this command"))?;
    Ok(TenantId(uuid::Uuid::parse_str(raw)?))
}

fn parse_person(raw: &str) -> anyhow::Result<PersonId> {
    Ok(PersonId(uuid::Uuid::parse_str(raw)?))
}

/// Parse a lowercase enum tag such as `adoptive` or `partnership`.
fn parse_tag<T: DeserializeOwned>(raw: &str) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
        .map_err(|_| anyhow::anyhow!("unrecognized value: {raw}"))
}

fn load_settings(file_prefix: &str) -> anyhow::Result<Settings> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("KINSHIP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg.try_deserialize()?)
}
