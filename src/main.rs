use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{Router, routing::get};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tulum_backend::{
    AppState,
    cache::{ReadThroughCache, keys},
    common::MapLocation,
    config::Config,
    database::VenueRepository,
    middleware::{RateLimiter, log_errors, rate_limit},
    routes,
    sync::{
        GooglePlacesClient, PhotoCache, PhotoSource, PoiSyncPipeline, SEARCH_SPECS, SearchProvider,
        SearchRegion, SupabaseStorage, SyncPacing, VenueStore,
    },
};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'tulum_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 设置 Redis 客户端
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let redis_arc = Arc::new(redis_client);

    // 读穿缓存
    let cache = Arc::new(ReadThroughCache::new(redis_arc.clone()));

    // 设置应用状态
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        redis: redis_arc,
        cache: cache.clone(),
    };

    // 设置限流器
    let rate_limiter = Arc::new(RateLimiter::new());

    // 组装同步管道
    let places = Arc::new(GooglePlacesClient::new(&config.places_api_key));
    let provider: Arc<dyn SearchProvider> = places.clone();
    let photo_source: Arc<dyn PhotoSource> = places;
    let blobs = Arc::new(SupabaseStorage::new(
        &config.storage_url,
        &config.storage_service_key,
    ));
    let venue_store: Arc<dyn VenueStore> = Arc::new(VenueRepository::new(pool.clone()));
    let photo_cache = PhotoCache::new(
        venue_store.clone(),
        photo_source,
        blobs,
        config.photo_bucket.clone(),
    );
    let pipeline = PoiSyncPipeline::new(
        provider,
        venue_store,
        photo_cache,
        SearchRegion {
            center: MapLocation {
                latitude: config.sync_center_latitude,
                longitude: config.sync_center_longitude,
            },
            radius_m: config.sync_radius_m,
        },
        SEARCH_SPECS.to_vec(),
        SyncPacing::default(),
    );

    // 周期性触发同步；成功后按前缀清掉场所缓存，避免读到同步前的数据
    let sync_cache = cache.clone();
    let sync_interval = config.sync_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sync_interval);
        loop {
            interval.tick().await;
            match pipeline.run_pass().await {
                Ok(report) => {
                    tracing::info!(
                        upserted = report.upserted,
                        photos_cached = report.photos_cached,
                        "poi sync pass committed"
                    );
                    sync_cache.invalidate_prefix(keys::VENUE_PREFIX).await;
                }
                Err(e) => tracing::error!("poi sync pass failed: {}", e),
            }
        }
    });

    // 场所查询路由
    let venue_routes = Router::new()
        .route("/venues/by-id", get(routes::venue::find_by_id))
        .route("/venues/by-location", get(routes::venue::find_by_location))
        .route("/venues/by-category", get(routes::venue::find_by_category));

    let router = Router::new().nest(&config.api_base_uri.clone(), venue_routes);

    // 添加日志中间件和限流中间件
    let router = router.layer(axum::middleware::from_fn(log_errors)).layer(
        axum::middleware::from_fn_with_state(rate_limiter, rate_limit),
    );

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
