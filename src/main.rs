//! geotiller - A vector tile server for GeoJSON datasets.
//!
//! This binary wires the catalog, pipeline, cache and HTTP server together.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geotiller::{
    build::{BuildStatus, CacheBuilder},
    cache::{CacheStore, SqliteCacheStore},
    config::{BuildConfig, CheckConfig, Cli, Command, ServeConfig},
    server::{create_router, RouterConfig},
    source::{GeoJsonStore, TilesetCatalog},
    spatial::GeoEngine,
    tile::{TilePipeline, TileService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Build(config) => run_build(config).await,
        Command::Check(config) => run_check(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "geotiller=debug,tower_http=debug"
    } else {
        "geotiller=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Open the data directory and derive the tileset catalog.
fn load_catalog(
    data_dir: &std::path::Path,
    min_zoom: u8,
    max_zoom: u8,
) -> Result<(Arc<GeoJsonStore>, Arc<TilesetCatalog>), String> {
    let store = GeoJsonStore::open(data_dir).map_err(|e| e.to_string())?;
    let catalog = TilesetCatalog::load(&store, &GeoEngine::new(), min_zoom, max_zoom)
        .map_err(|e| e.to_string())?;
    Ok((Arc::new(store), Arc::new(catalog)))
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("geotiller v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Data directory: {}", config.data_dir.display());
    info!("  Zoom range: {}-{}", config.min_zoom, config.max_zoom);
    info!("  Tile timeout: {}ms", config.tile_timeout_ms);

    let (store, catalog) = match load_catalog(&config.data_dir, config.min_zoom, config.max_zoom) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to load data directory: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if catalog.is_empty() {
        warn!("  No tilesets found in {}", config.data_dir.display());
    }
    for tileset in catalog.iter() {
        info!("  Tileset: {} ({} layers)", tileset.name, tileset.layers.len());
    }

    let pipeline = Arc::new(TilePipeline::new(store, config.pipeline_config()));
    let mut tile_service = TileService::new(catalog, pipeline);

    match &config.cache_dir {
        Some(dir) => match SqliteCacheStore::open(dir) {
            Ok(cache) => {
                info!("  Cache: {}", cache.path().display());
                tile_service = tile_service.with_cache(Arc::new(cache));
            }
            Err(e) => {
                error!("Failed to open cache in {}: {}", dir.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => info!("  Cache: disabled (on-demand only)"),
    }

    let public_url = config.public_url();
    let mut router_config = RouterConfig::new(public_url.clone()).with_tracing(!config.no_tracing);
    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }
    let router = create_router(tile_service, router_config);

    let addr = config.bind_address();
    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("  Tilesets:      {}/tilesets", public_url);
    info!("  Starter style: {}/styles/starter.json", public_url);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Build Command
// =============================================================================

async fn run_build(config: BuildConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let (store, catalog) = match load_catalog(&config.data_dir, config.min_zoom, config.max_zoom) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to load data directory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cache: Arc<dyn CacheStore> = match SqliteCacheStore::open(&config.cache_dir) {
        Ok(cache) => {
            info!("Writing cache to {}", cache.path().display());
            Arc::new(cache)
        }
        Err(e) => {
            error!("Failed to open cache in {}: {}", config.cache_dir.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = Arc::new(TilePipeline::new(store, config.pipeline_config()));
    let builder = CacheBuilder::new(pipeline, catalog, cache);
    let param = config.job_param();

    let reports = match &config.tileset {
        Some(name) => match builder.build_tileset(name, &param).await {
            Ok(Some(report)) => vec![report],
            Ok(None) => {
                error!("Tileset not found: {}", name);
                return ExitCode::FAILURE;
            }
            Err(e) => {
                error!("Build failed: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => match builder.build_all(&param).await {
            Ok(report) => report.tilesets,
            Err(e) => {
                error!("Build failed: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    for report in &reports {
        match report.status {
            BuildStatus::Built => info!(
                "  {}: {} tiles written ({} empty, {} failed) in {:.1}s",
                report.name,
                report.written,
                report.empty,
                report.failed,
                report.elapsed.as_secs_f64()
            ),
            BuildStatus::Skipped => info!("  {}: skipped (no features)", report.name),
        }
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Check Command
// =============================================================================

fn run_check(config: CheckConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    println!("Checking data directory: {}", config.data_dir.display());
    let (_, catalog) = match load_catalog(&config.data_dir, config.min_zoom, config.max_zoom) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if catalog.is_empty() {
        println!("No tilesets found.");
        return ExitCode::SUCCESS;
    }

    for tileset in catalog.iter() {
        println!();
        println!("{}", tileset.name);
        println!("  source: {}", tileset.source);
        println!("  crs:    {}", tileset.crs);
        match tileset.bounds {
            Some(b) => println!(
                "  bounds: [{:.6}, {:.6}, {:.6}, {:.6}]",
                b.west, b.south, b.east, b.north
            ),
            None => println!("  bounds: none"),
        }
        for layer in &tileset.layers {
            println!(
                "  - {} ({}, {} fields, {})",
                layer.name,
                layer.geometry_type,
                layer.fields.len(),
                layer.crs
            );
        }
    }
    println!();
    println!("{} tileset(s) found.", catalog.len());

    ExitCode::SUCCESS
}
