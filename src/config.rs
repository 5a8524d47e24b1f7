//! Configuration management.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `TILLER_` prefix; command-line values win.
//!
//! # Subcommands
//!
//! - `serve` - Serve tiles over HTTP, from the pre-built cache when one is
//!   configured and on demand otherwise
//! - `build` - Pre-compute tile pyramids into the SQLite cache
//! - `check` - Scan the data directory and print the discovered tilesets
//!
//! # Environment Variables
//!
//! - `TILLER_HOST` - Server bind address (default: 0.0.0.0)
//! - `TILLER_PORT` - Server port (default: 8080)
//! - `TILLER_DATA_DIR` - Directory with GeoJSON datasets (required)
//! - `TILLER_CACHE_DIR` - Directory holding `cache.mbtiles`
//! - `TILLER_PUBLIC_URL` - Base URL written into TileJSON and styles
//! - `TILLER_MIN_ZOOM` / `TILLER_MAX_ZOOM` - Zoom range
//! - `TILLER_TILE_TIMEOUT_MS` - On-demand tile deadline (default: 1000)
//! - `TILLER_SIMPLIFY_BELOW_ZOOM` - Simplify below this zoom (default: 13)
//! - `TILLER_SIMPLIFY_TOLERANCE` - Simplification tolerance (default: 0.00005)
//! - `TILLER_CONCURRENCY` - Build workers (default: number of cores)
//! - `TILLER_BATCH_SIZE` - Cache rows per write transaction (default: 1000)
//! - `TILLER_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::build::{JobParam, DEFAULT_BATCH_SIZE};
use crate::tile::{
    PipelineConfig, DEFAULT_SIMPLIFY_BELOW_ZOOM, DEFAULT_SIMPLIFY_TOLERANCE, MAX_ZOOM,
};

// =============================================================================
// Default Values
// =============================================================================

pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 8080;

pub const DEFAULT_MIN_ZOOM: u8 = 0;

/// Highest zoom served on demand.
pub const DEFAULT_SERVE_MAX_ZOOM: u8 = 22;

/// Target level of a cache build.
pub const DEFAULT_BUILD_MAX_ZOOM: u8 = 14;

pub const DEFAULT_TILE_TIMEOUT_MS: u64 = 1000;

// =============================================================================
// CLI Arguments
// =============================================================================

/// geotiller - A vector tile server for GeoJSON datasets.
#[derive(Parser, Debug, Clone)]
#[command(name = "geotiller")]
#[command(author, version, about, long_about = None, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve vector tiles over HTTP
    Serve(ServeConfig),

    /// Pre-compute tile pyramids into the cache
    Build(BuildConfig),

    /// Scan the data directory and print the discovered tilesets
    Check(CheckConfig),
}

/// Options shared by every command that runs the tile pipeline.
#[derive(Args, Debug, Clone)]
pub struct SimplifyArgs {
    /// Simplify geometries of tiles below this zoom level.
    #[arg(long, default_value_t = DEFAULT_SIMPLIFY_BELOW_ZOOM, env = "TILLER_SIMPLIFY_BELOW_ZOOM")]
    pub simplify_below_zoom: u8,

    /// Simplification tolerance, in source CRS units.
    #[arg(long, default_value_t = DEFAULT_SIMPLIFY_TOLERANCE, env = "TILLER_SIMPLIFY_TOLERANCE")]
    pub simplify_tolerance: f64,
}

impl SimplifyArgs {
    fn validate(&self) -> Result<(), String> {
        if !self.simplify_tolerance.is_finite() || self.simplify_tolerance < 0.0 {
            return Err("simplify_tolerance must be a non-negative number".to_string());
        }
        Ok(())
    }
}

fn validate_zoom_range(min_zoom: u8, max_zoom: u8) -> Result<(), String> {
    if max_zoom > MAX_ZOOM {
        return Err(format!("max_zoom must be between 0 and {}", MAX_ZOOM));
    }
    if min_zoom > max_zoom {
        return Err(format!(
            "min_zoom ({}) must not exceed max_zoom ({})",
            min_zoom, max_zoom
        ));
    }
    Ok(())
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TILLER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TILLER_PORT")]
    pub port: u16,

    /// Base URL clients use to reach this server.
    ///
    /// Defaults to http://localhost:{port}.
    #[arg(long, env = "TILLER_PUBLIC_URL")]
    pub public_url: Option<String>,

    // =========================================================================
    // Data Configuration
    // =========================================================================
    /// Directory containing GeoJSON datasets.
    #[arg(long, env = "TILLER_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Directory holding a pre-built tile cache.
    ///
    /// When set, tiles are looked up in the cache before being computed.
    #[arg(long, env = "TILLER_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    // =========================================================================
    // Tile Configuration
    // =========================================================================
    #[arg(long, default_value_t = DEFAULT_MIN_ZOOM, env = "TILLER_MIN_ZOOM")]
    pub min_zoom: u8,

    #[arg(long, default_value_t = DEFAULT_SERVE_MAX_ZOOM, env = "TILLER_MAX_ZOOM")]
    pub max_zoom: u8,

    /// Deadline for computing one tile on demand, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TILE_TIMEOUT_MS, env = "TILLER_TILE_TIMEOUT_MS")]
    pub tile_timeout_ms: u64,

    #[command(flatten)]
    pub simplify: SimplifyArgs,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "TILLER_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        validate_zoom_range(self.min_zoom, self.max_zoom)?;
        if self.tile_timeout_ms == 0 {
            return Err("tile_timeout_ms must be greater than 0".to_string());
        }
        self.simplify.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            timeout: Duration::from_millis(self.tile_timeout_ms),
            simplify_below_zoom: self.simplify.simplify_below_zoom,
            simplify_tolerance: self.simplify.simplify_tolerance,
        }
    }
}

// =============================================================================
// Build
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct BuildConfig {
    /// Directory containing GeoJSON datasets.
    #[arg(long, env = "TILLER_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Directory to write `cache.mbtiles` into.
    #[arg(long, env = "TILLER_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Build a single tileset instead of resetting and rebuilding all.
    #[arg(long)]
    pub tileset: Option<String>,

    /// Seed level of the pyramid.
    #[arg(long, default_value_t = DEFAULT_MIN_ZOOM, env = "TILLER_MIN_ZOOM")]
    pub min_zoom: u8,

    /// Target level of the pyramid.
    #[arg(long, default_value_t = DEFAULT_BUILD_MAX_ZOOM, env = "TILLER_MAX_ZOOM")]
    pub max_zoom: u8,

    /// Number of build workers.
    #[arg(long, default_value_t = num_cpus::get(), env = "TILLER_CONCURRENCY")]
    pub concurrency: usize,

    /// Cache rows per write transaction.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, env = "TILLER_BATCH_SIZE")]
    pub batch_size: usize,

    /// Also cache every intermediate zoom level, not just the target level.
    #[arg(long, default_value_t = false)]
    pub all_levels: bool,

    #[command(flatten)]
    pub simplify: SimplifyArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl BuildConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_zoom_range(self.min_zoom, self.max_zoom)?;
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        self.simplify.validate()
    }

    pub fn job_param(&self) -> JobParam {
        JobParam {
            concurrency: self.concurrency,
            batch_size: self.batch_size,
            all_levels: self.all_levels,
        }
    }

    /// Builds have no per-tile deadline; only simplification applies.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            simplify_below_zoom: self.simplify.simplify_below_zoom,
            simplify_tolerance: self.simplify.simplify_tolerance,
            ..PipelineConfig::default()
        }
    }
}

// =============================================================================
// Check
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Directory containing GeoJSON datasets.
    #[arg(long, env = "TILLER_DATA_DIR")]
    pub data_dir: PathBuf,

    #[arg(long, default_value_t = DEFAULT_MIN_ZOOM, env = "TILLER_MIN_ZOOM")]
    pub min_zoom: u8,

    #[arg(long, default_value_t = DEFAULT_SERVE_MAX_ZOOM, env = "TILLER_MAX_ZOOM")]
    pub max_zoom: u8,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_zoom_range(self.min_zoom, self.max_zoom)
    }
}

// =============================================================================
// Tests
// =============================================================================
