use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{BoxError, Router};
use axum_prometheus::PrometheusMetricLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use markethub::aggregate::Aggregator;
use markethub::cache::{DistributedCache, LocalCache, LOCAL_MAX_ENTRIES, LOCAL_TTL};
use markethub::error::ApiError;
use markethub::stores::{
    Blacklist, ListingStore, SalesStore, TaxRatesStore, TrustedSourceRegistry, UploadCountStore,
};
use markethub::upload::{behaviors, UploadPipeline};
use markethub::world::WorldDcResolver;
use markethub::{db, routes, AppState};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();

    // initialize tracing
    tracing_subscriber::fmt::init();

    let game_data_path =
        std::env::var("GAME_DATA_PATH").unwrap_or_else(|_| "assets/game.bin.zstd".to_string());
    let resolver = match WorldDcResolver::load(Path::new(&game_data_path)) {
        Ok(resolver) => Arc::new(resolver),
        Err(err) => {
            tracing::error!(path = %game_data_path, error = %err, "failed to load game data");
            std::process::exit(1);
        }
    };
    info!(
        "loaded {} worlds across {} data centers",
        resolver.worlds_by_id().len(),
        resolver.data_centers().len()
    );

    let pool = db::connect(
        &std::env::var("DATABASE_URL")?,
        std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|x| x.parse().ok())
            .unwrap_or(30),
    )
    .await?;
    db::apply_schema(&pool).await?;

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    let replica_urls: Vec<String> = std::env::var("REDIS_REPLICA_URLS")
        .map(|urls| {
            urls.split(',')
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let redis_conn = redis::Client::open(redis_url.as_str())?
        .get_tokio_connection_manager()
        .await?;
    let distributed = DistributedCache::connect(&redis_url, &replica_urls).await?;
    let local = LocalCache::new(LOCAL_MAX_ENTRIES, LOCAL_TTL);

    let listings = Arc::new(ListingStore::new(pool.clone(), local, distributed));
    let sales = Arc::new(SalesStore::new(pool.clone()));
    let tax_rates = Arc::new(TaxRatesStore::new(redis_conn.clone()));
    let trusted = Arc::new(TrustedSourceRegistry::new(pool.clone()));
    let blacklist = Arc::new(Blacklist::new(redis_conn));
    let upload_counts = Arc::new(UploadCountStore::new(pool.clone()));

    let pipeline = Arc::new(UploadPipeline::new(
        trusted.clone(),
        blacklist.clone(),
        behaviors::default_behaviors(
            listings.clone(),
            sales.clone(),
            tax_rates.clone(),
            trusted.clone(),
            upload_counts.clone(),
        ),
    ));
    let aggregator = Arc::new(Aggregator::new(
        resolver.clone(),
        listings.clone(),
        sales.clone(),
    ));

    let state = AppState {
        pool,
        resolver,
        listings,
        sales,
        tax_rates,
        trusted,
        blacklist,
        upload_counts,
        pipeline,
        aggregator,
    };

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = Router::new()
        .route(
            "/api/v2/:item_id/:world_or_dc",
            get(routes::market::current_listings),
        )
        .route(
            "/api/v2/history/:item_id/:world_or_dc",
            get(routes::market::sale_history),
        )
        .route(
            "/api/v2/extra/stats/upload-history",
            get(routes::stats::upload_history),
        )
        .route(
            "/api/v2/extra/stats/uploader-upload-counts",
            get(routes::stats::uploader_upload_counts),
        )
        .route("/upload/:api_key", post(routes::upload::upload))
        .route("/metrics", get(move || async move { metric_handle.render() }))
        .layer(TraceLayer::new_for_http())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(Duration::from_secs(5)),
        )
        .layer(prometheus_layer)
        .with_state(state);

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()?;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn handle_middleware_error(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        ApiError::Cancelled.into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("internal error: {err}"),
        )
            .into_response()
    }
}
