//! REST surface over `oidf_core::OidfClient`: one `GET` route per §4.9
//! operation, mirroring `oidf-cli`'s subcommands. Entity ids are full
//! HTTPS URLs and so travel as query parameters rather than path
//! segments — a path segment can't carry the embedded slashes of a URL.

use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use oidf_core::http::FetcherConfig;
use oidf_core::{EntityId, EntityType, ListFilter, OidfClient, OidfError};
use serde::Deserialize;

struct AppError(OidfError);

impl From<OidfError> for AppError {
    fn from(err: OidfError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Error kind -> HTTP status mapping (spec.md §6).
fn status_for(err: &OidfError) -> StatusCode {
    match err {
        OidfError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        OidfError::NotFederationEntity { .. } => StatusCode::BAD_REQUEST,
        OidfError::MetadataMissing(_) | OidfError::EndpointMissing { .. } | OidfError::NoChain { .. } => {
            StatusCode::NOT_FOUND
        }
        OidfError::HttpFailure { status, .. } if *status == 404 => StatusCode::NOT_FOUND,
        OidfError::HttpFailure { .. }
        | OidfError::NetworkFailure { .. }
        | OidfError::Malformed(_)
        | OidfError::MissingClaim(_)
        | OidfError::VerificationFailed { .. }
        | OidfError::UnknownCriticalExtension(_)
        | OidfError::Cycle(_) => StatusCode::BAD_GATEWAY,
        OidfError::PolicyConflict { .. } | OidfError::PolicyViolation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type AppResult<T> = Result<T, AppError>;

fn parse_entity(raw: &str) -> AppResult<EntityId> {
    EntityId::parse(raw).map_err(AppError::from)
}

fn parse_anchors(raw: &str) -> AppResult<Vec<EntityId>> {
    raw.split(',').filter(|s| !s.is_empty()).map(parse_entity).collect()
}

#[derive(Deserialize)]
struct EntityQuery {
    entity: String,
    #[serde(default = "default_true")]
    verify: bool,
}

fn default_true() -> bool {
    true
}

async fn get_entity_configuration(
    State(client): State<OidfClient>,
    Query(q): Query<EntityQuery>,
) -> AppResult<Json<oidf_core::EntityStatement>> {
    let entity = parse_entity(&q.entity)?;
    let statement = client.get_entity_configuration(&entity, q.verify).await?;
    Ok(Json(statement))
}

async fn get_entity_metadata(
    State(client): State<OidfClient>,
    Query(q): Query<EntityQuery>,
) -> AppResult<Json<serde_json::Map<String, serde_json::Value>>> {
    let entity = parse_entity(&q.entity)?;
    let metadata = client.get_entity_metadata(&entity, q.verify).await?;
    Ok(Json(metadata))
}

#[derive(Deserialize)]
struct SingleEntityQuery {
    entity: String,
}

async fn get_entity_jwks(
    State(client): State<OidfClient>,
    Query(q): Query<SingleEntityQuery>,
) -> AppResult<Json<oidf_core::jwk::Jwks>> {
    let entity = parse_entity(&q.entity)?;
    let jwks = client.get_entity_jwks(&entity).await?;
    Ok(Json(jwks))
}

#[derive(Deserialize)]
struct StatementQuery {
    entity: String,
    issuer: String,
}

async fn get_statement(
    State(client): State<OidfClient>,
    Query(q): Query<StatementQuery>,
) -> AppResult<Json<oidf_core::EntityStatement>> {
    let entity = parse_entity(&q.entity)?;
    let issuer = parse_entity(&q.issuer)?;
    let statement = client.fetch_statement(&entity, &issuer).await?;
    Ok(Json(statement))
}

#[derive(Deserialize)]
struct SubordinatesQuery {
    entity: String,
    entity_type: Option<String>,
    trust_marked: Option<bool>,
    trust_mark_id: Option<String>,
}

async fn get_subordinates(
    State(client): State<OidfClient>,
    Query(q): Query<SubordinatesQuery>,
) -> AppResult<Json<Vec<EntityId>>> {
    let entity = parse_entity(&q.entity)?;
    let filter = ListFilter { entity_type: q.entity_type, trust_marked: q.trust_marked, trust_mark_id: q.trust_mark_id };
    let ids = client.list_subordinates(&entity, &filter).await?;
    Ok(Json(ids))
}

#[derive(Deserialize)]
struct TrustChainsQuery {
    entity: String,
    anchors: String,
}

async fn get_trust_chains(
    State(client): State<OidfClient>,
    Query(q): Query<TrustChainsQuery>,
) -> AppResult<Json<Vec<Vec<oidf_core::EntityStatement>>>> {
    let entity = parse_entity(&q.entity)?;
    let anchors = parse_anchors(&q.anchors)?;
    let chains = client.get_trust_chains(&entity, &anchors).await?;
    Ok(Json(chains.iter().map(|c| c.statements().to_vec()).collect()))
}

async fn get_subtree(
    State(client): State<OidfClient>,
    Query(q): Query<SingleEntityQuery>,
) -> AppResult<Json<oidf_core::SubtreeNode>> {
    let entity = parse_entity(&q.entity)?;
    let subtree = client.subtree(&entity).await?;
    Ok(Json(subtree))
}

#[derive(Deserialize)]
struct DiscoverOpsQuery {
    entity: String,
    anchors: String,
}

async fn get_discover_ops(
    State(client): State<OidfClient>,
    Query(q): Query<DiscoverOpsQuery>,
) -> AppResult<Json<Vec<EntityId>>> {
    let entity = parse_entity(&q.entity)?;
    let anchors = parse_anchors(&q.anchors)?;
    let ops = client.discover_ops(&entity, &anchors).await?;
    Ok(Json(ops))
}

#[derive(Deserialize)]
struct ResolveQuery {
    entity: String,
    anchor: String,
    #[serde(rename = "type")]
    entity_type: String,
}

async fn resolve_entity(
    State(client): State<OidfClient>,
    Query(q): Query<ResolveQuery>,
) -> AppResult<Json<serde_json::Map<String, serde_json::Value>>> {
    let entity = parse_entity(&q.entity)?;
    let anchor = parse_entity(&q.anchor)?;
    let entity_type: EntityType = q
        .entity_type
        .parse()
        .map_err(|_| AppError(OidfError::Malformed(format!("unknown entity type `{}`", q.entity_type))))?;
    let metadata = client.resolve_entity(&entity, &anchor, entity_type).await?;
    Ok(Json(metadata))
}

fn app(client: OidfClient) -> Router {
    Router::new()
        .route("/entities/configuration", get(get_entity_configuration))
        .route("/entities/metadata", get(get_entity_metadata))
        .route("/entities/jwks", get(get_entity_jwks))
        .route("/entities/statement", get(get_statement))
        .route("/entities/subordinates", get(get_subordinates))
        .route("/entities/trust-chains", get(get_trust_chains))
        .route("/entities/subtree", get(get_subtree))
        .route("/entities/discover-ops", get(get_discover_ops))
        .route("/resolve", get(resolve_entity))
        .with_state(client)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let client = OidfClient::new(FetcherConfig::default())?;
    let router = app(client);

    let addr: SocketAddr = std::env::var("OIDF_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()).parse()?;
    tracing::info!(%addr, "starting oidf-rest");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
