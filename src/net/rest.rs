use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::watch;

use crate::api::error::{MirrorError, MirrorResult};
use crate::api::types::BlockId;
use crate::index::{block as block_index, height as height_index, tx as tx_index};
use crate::runtime::feed::BlockFeed;
use crate::runtime::metrics::{MetricsSnapshot, MirrorMetrics};
use crate::storage::kv::KvStore;

/// Shared state handed to every REST handler.
#[derive(Clone)]
pub struct RestContext {
    pub index_store: Arc<dyn KvStore>,
    pub height_rx: watch::Receiver<BlockId>,
    pub feed: Arc<dyn BlockFeed>,
    pub metrics: Arc<MirrorMetrics>,
}

/// Handler-level failures. Malformed parameters and heights the indexers
/// have not reached are both client errors; only storage faults surface as
/// internal errors.
pub enum RestError {
    InvalidHeight(String),
    NotIndexed(String),
    Internal(MirrorError),
}

impl From<MirrorError> for RestError {
    fn from(err: MirrorError) -> Self {
        RestError::Internal(err)
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            RestError::InvalidHeight(message) => (StatusCode::BAD_REQUEST, message),
            RestError::NotIndexed(message) => (StatusCode::BAD_REQUEST, message),
            RestError::Internal(err) => {
                tracing::error!(%err, "rest handler failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn parse_height(raw: &str) -> Result<BlockId, RestError> {
    raw.parse()
        .map_err(|_| RestError::InvalidHeight(format!("invalid height '{raw}'")))
}

async fn get_block(
    State(ctx): State<RestContext>,
    Path(height): Path<String>,
) -> Result<Response, RestError> {
    let height = parse_height(&height)?;
    let record = block_index::block_by_height(ctx.index_store.as_ref(), height)?
        .ok_or_else(|| RestError::NotIndexed(format!("no block indexed at height {height}")))?;
    Ok(Json(record).into_response())
}

async fn get_tx(
    State(ctx): State<RestContext>,
    Path(hash): Path<String>,
) -> Result<Response, RestError> {
    let record = tx_index::tx_by_hash(ctx.index_store.as_ref(), &hash)?
        .ok_or_else(|| RestError::NotIndexed(format!("no transaction indexed for {hash}")))?;
    Ok(Json(record).into_response())
}

async fn get_txs(
    State(ctx): State<RestContext>,
    Path(height): Path<String>,
) -> Result<Response, RestError> {
    let height = parse_height(&height)?;
    let records = tx_index::txs_by_height(ctx.index_store.as_ref(), height)?
        .ok_or_else(|| RestError::NotIndexed(format!("no block indexed at height {height}")))?;
    Ok(Json(records).into_response())
}

async fn get_height(State(ctx): State<RestContext>) -> Result<Response, RestError> {
    let record = height_index::latest_height(ctx.index_store.as_ref())?
        .ok_or_else(|| RestError::NotIndexed("no block indexed yet".into()))?;
    Ok(Json(record).into_response())
}

#[derive(Serialize)]
struct StatusResponse {
    synced: bool,
    latest_height: BlockId,
    metrics: MetricsSnapshot,
}

async fn get_status(State(ctx): State<RestContext>) -> Json<StatusResponse> {
    Json(StatusResponse {
        synced: ctx.feed.is_synced(),
        latest_height: *ctx.height_rx.borrow(),
        metrics: ctx.metrics.snapshot(),
    })
}

pub fn build_router(ctx: RestContext) -> Router {
    Router::new()
        .route("/index/blocks/:height", get(get_block))
        .route("/index/tx/:hash", get(get_tx))
        .route("/index/txs/:height", get(get_txs))
        .route("/index/height", get(get_height))
        .route("/status", get(get_status))
        .with_state(ctx)
}

/// Serves the REST API until the shutdown future resolves.
pub async fn serve(
    addr: SocketAddr,
    ctx: RestContext,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> MirrorResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "rest api listening");
    axum::serve(listener, build_router(ctx))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{zero_hash, Block, BlockHeader, BlockIdentifier, EventCollector};
    use crate::runtime::feed::ChannelBlockFeed;
    use crate::storage::kv::{KvBatch, MemKvStore};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn context(store: MemKvStore, latest: BlockId) -> RestContext {
        let (feed, publisher) = ChannelBlockFeed::new();
        publisher.set_synced(true);
        let (_tx, height_rx) = watch::channel(latest);
        RestContext {
            index_store: Arc::new(store),
            height_rx,
            feed: Arc::new(feed),
            metrics: Arc::new(MirrorMetrics::new()),
        }
    }

    fn indexed_store() -> MemKvStore {
        let store = MemKvStore::new();
        let block = Block {
            header: BlockHeader {
                chain_id: "test-1".into(),
                height: 5,
                time: 0,
                last_block_hash: zero_hash(),
                app_hash: zero_hash(),
                data_hash: zero_hash(),
            },
            txs: vec![],
        };
        let block_id = BlockIdentifier::for_block(&block).unwrap();
        let mut batch = crate::storage::kv::BufferedBatch::new(Arc::new(store.clone()));
        block_index::index_block(&mut batch, &block, &block_id, &EventCollector::new()).unwrap();
        height_index::index_height(&mut batch, &block, &block_id, &EventCollector::new()).unwrap();
        KvBatch::write_sync(&mut batch).unwrap();
        store
    }

    async fn status_of(router: Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn indexed_block_is_served() {
        let router = build_router(context(indexed_store(), 5));
        let response = router
            .oneshot(Request::get("/index/blocks/5").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let record: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(record["block"]["header"]["height"], 5);
    }

    #[tokio::test]
    async fn malformed_and_missing_heights_are_client_errors() {
        let router = build_router(context(indexed_store(), 5));
        assert_eq!(
            status_of(router.clone(), "/index/blocks/not-a-number").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(router.clone(), "/index/blocks/99").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(router, "/index/tx/deadbeef").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn height_marker_and_status_are_served() {
        let router = build_router(context(indexed_store(), 5));
        let response = router
            .clone()
            .oneshot(Request::get("/index/height").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let record: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(record["height"], 5);

        let response = router
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["synced"], true);
        assert_eq!(status["latest_height"], 5);
    }
}
