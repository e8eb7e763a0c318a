//! Command-line explorer for OpenID Connect Federation trust hierarchies:
//! one subcommand per `oidf_core::OidfClient` operation.

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use oidf_core::http::FetcherConfig;
use oidf_core::{EntityId, EntityType, ListFilter, OidfClient};

#[derive(Parser)]
#[command(name = "oidf", about = "Explore and verify OpenID Connect Federation trust hierarchies")]
struct Args {
    /// Skip TLS certificate verification. Never use against a production federation.
    #[arg(long, global = true, env = "OIDF_INSECURE")]
    insecure: bool,

    /// Request timeout applied to every HTTP fetch.
    #[arg(long, global = true, env = "OIDF_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Increase log verbosity; repeat for more (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Dot,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and decode an entity's self-signed configuration.
    EntityConfiguration {
        entity: String,
        #[arg(long, default_value_t = true)]
        verify: bool,
    },
    /// Fetch an entity's effective metadata claim.
    Metadata {
        entity: String,
        #[arg(long, default_value_t = true)]
        verify: bool,
    },
    /// Fetch an entity's federation JWKS.
    Jwks { entity: String },
    /// Fetch the subordinate statement `issuer` has published about `entity`.
    FetchStatement { entity: String, issuer: String },
    /// List the subordinates an entity advertises.
    ListSubordinates {
        entity: String,
        #[arg(long)]
        entity_type: Option<String>,
        #[arg(long)]
        trust_marked: Option<bool>,
        #[arg(long)]
        trust_mark_id: Option<String>,
    },
    /// Resolve every trust chain from an entity to a set of trust anchors.
    TrustChains {
        entity: String,
        #[arg(long = "anchor", required = true)]
        anchors: Vec<String>,
    },
    /// Discover the federation subtree rooted at an entity.
    Subtree { entity: String },
    /// Discover every OpenID Provider reachable from a relying party.
    DiscoverOps {
        relying_party: String,
        #[arg(long = "anchor", required = true)]
        anchors: Vec<String>,
    },
    /// Resolve an entity's effective metadata under a single trust anchor.
    ResolveEntity {
        entity: String,
        anchor: String,
        #[arg(long = "type")]
        entity_type: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = FetcherConfig { verify_tls: !args.insecure, request_timeout: args.timeout, ..Default::default() };
    let client = OidfClient::new(config)?;

    match args.command {
        Command::EntityConfiguration { entity, verify } => {
            let id = parse_id(&entity)?;
            let statement = client.get_entity_configuration(&id, verify).await?;
            print_json(&statement);
        }
        Command::Metadata { entity, verify } => {
            let id = parse_id(&entity)?;
            let metadata = client.get_entity_metadata(&id, verify).await?;
            print_json(&metadata);
        }
        Command::Jwks { entity } => {
            let id = parse_id(&entity)?;
            let jwks = client.get_entity_jwks(&id).await?;
            print_json(&jwks);
        }
        Command::FetchStatement { entity, issuer } => {
            let id = parse_id(&entity)?;
            let issuer = parse_id(&issuer)?;
            let statement = client.fetch_statement(&id, &issuer).await?;
            print_json(&statement);
        }
        Command::ListSubordinates { entity, entity_type, trust_marked, trust_mark_id } => {
            let id = parse_id(&entity)?;
            let filter = ListFilter { entity_type, trust_marked, trust_mark_id };
            let ids = client.list_subordinates(&id, &filter).await?;
            print_json(&ids);
        }
        Command::TrustChains { entity, anchors } => {
            let id = parse_id(&entity)?;
            let anchors = parse_ids(&anchors)?;
            let chains = client.get_trust_chains(&id, &anchors).await?;
            match args.format {
                Format::Dot => println!("{}", oidf_core::graph::chains_to_dot(&chains)),
                Format::Json => print_json(&chains.iter().map(|c| c.statements()).collect::<Vec<_>>()),
                Format::Text => {
                    for chain in &chains {
                        println!("{} (expires {})", chain.summary(), chain.expiration());
                    }
                }
            }
        }
        Command::Subtree { entity } => {
            let id = parse_id(&entity)?;
            let subtree = client.subtree(&id).await?;
            match args.format {
                Format::Dot => println!("{}", oidf_core::graph::subtree_to_dot(&subtree)),
                _ => print_json(&subtree),
            }
        }
        Command::DiscoverOps { relying_party, anchors } => {
            let id = parse_id(&relying_party)?;
            let anchors = parse_ids(&anchors)?;
            let ops = client.discover_ops(&id, &anchors).await?;
            print_json(&ops);
        }
        Command::ResolveEntity { entity, anchor, entity_type } => {
            let id = parse_id(&entity)?;
            let anchor = parse_id(&anchor)?;
            let entity_type: EntityType = entity_type.parse().map_err(anyhow::Error::msg)?;
            let metadata = client.resolve_entity(&id, &anchor, entity_type).await?;
            print_json(&metadata);
        }
    }

    Ok(())
}

fn parse_id(raw: &str) -> anyhow::Result<EntityId> {
    EntityId::parse(raw).map_err(anyhow::Error::from)
}

fn parse_ids(raw: &[String]) -> anyhow::Result<Vec<EntityId>> {
    raw.iter().map(|s| parse_id(s)).collect()
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).expect("value is always representable as JSON"));
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
