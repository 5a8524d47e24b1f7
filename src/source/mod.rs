//! Vector feature sources.
//!
//! - [`FeatureStore`]: read access to datasets and their layers
//! - [`GeoJsonStore`]: datasets discovered in a directory of GeoJSON files
//! - [`MemoryFeatureStore`]: datasets assembled in memory
//! - [`TilesetCatalog`]: the tilesets derived from a store at startup

mod catalog;
mod geojson_store;
mod index;
mod memory;
mod store;

pub use catalog::{LayerInfo, Tileset, TilesetCatalog};
pub use geojson_store::GeoJsonStore;
pub use index::IndexedLayer;
pub use memory::MemoryFeatureStore;
pub use store::{FeatureIter, FeatureStore, FieldType, GeometryType, LayerSchema, SourceFeature};
