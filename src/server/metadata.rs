//! Metadata documents: TileJSON and the starter map style.
//!
//! Both are plain `serde_json` values built from the catalog; nothing here
//! touches the feature store.

use rand::Rng;
use serde_json::{json, Value};

use crate::source::{GeometryType, Tileset, TilesetCatalog};

/// TileJSON version emitted by [`tilejson`].
pub const TILEJSON_VERSION: &str = "3.0.0";

/// Layer colors, assigned in order before falling back to random ones.
pub const PALETTE: [&str; 12] = [
    "#a6cee3", "#1f78b4", "#b2df8a", "#33a02c", "#fb9a99", "#e31a1c", "#fdbf6f", "#ff7f00",
    "#cab2d6", "#6a3d9a", "#ffff99", "#b15928",
];

/// Order in which style layers are stacked, bottom first.
const GEOMETRY_ORDER: [GeometryType; 7] = [
    GeometryType::Point,
    GeometryType::MultiPoint,
    GeometryType::LineString,
    GeometryType::MultiLineString,
    GeometryType::Polygon,
    GeometryType::MultiPolygon,
    GeometryType::Unknown,
];

// =============================================================================
// URLs
// =============================================================================

pub fn tilejson_url(public_url: &str, tileset: &str) -> String {
    format!(
        "{}/tilesets/{}/info/tile.json",
        public_url.trim_end_matches('/'),
        tileset
    )
}

pub fn tile_url_template(public_url: &str, tileset: &str) -> String {
    format!(
        "{}/tilesets/{}/tiles/{{z}}/{{x}}/{{y}}.mvt",
        public_url.trim_end_matches('/'),
        tileset
    )
}

// =============================================================================
// TileJSON
// =============================================================================

/// Build the TileJSON document of a tileset.
///
/// `bounds` and `center` are `null` for a tileset without features.
pub fn tilejson(tileset: &Tileset, public_url: &str) -> Value {
    let bounds = tileset.bounds.map(|b| b.to_array());
    let center = tileset
        .center()
        .map(|(lng, lat)| json!([lng, lat, tileset.min_zoom]));

    let vector_layers: Vec<Value> = tileset
        .layers
        .iter()
        .map(|layer| {
            json!({
                "id": layer.name,
                "fields": layer.fields,
                "geometryType": layer.geometry_type,
            })
        })
        .collect();

    json!({
        "tilejson": TILEJSON_VERSION,
        "id": tileset.name,
        "name": tileset.name,
        "scheme": "xyz",
        "tiles": [tile_url_template(public_url, &tileset.name)],
        "minzoom": tileset.min_zoom,
        "maxzoom": tileset.max_zoom,
        "bounds": bounds,
        "center": center,
        "crs": tileset.crs.to_string(),
        "vector_layers": vector_layers,
    })
}

// =============================================================================
// Starter Style
// =============================================================================

/// Color for the `index`-th styled layer.
pub fn layer_color(index: usize) -> String {
    match PALETTE.get(index) {
        Some(color) => (*color).to_string(),
        None => {
            let rgb: u32 = rand::thread_rng().gen_range(0..=0xFF_FFFF);
            format!("#{:06X}", rgb)
        }
    }
}

/// Build a style (version 8) drawing every layer of every tileset.
pub fn starter_style(catalog: &TilesetCatalog, public_url: &str) -> Value {
    let mut sources = serde_json::Map::new();
    for tileset in catalog.iter() {
        sources.insert(
            tileset.name.clone(),
            json!({
                "type": "vector",
                "url": tilejson_url(public_url, &tileset.name),
            }),
        );
    }

    let mut layers = Vec::new();
    let mut index = 0;
    for geometry_type in GEOMETRY_ORDER {
        for tileset in catalog.iter() {
            for layer in tileset.layers.iter().filter(|l| l.geometry_type == geometry_type) {
                let color = layer_color(index);
                index += 1;
                // Layer names repeat across tilesets; style ids must not.
                let id = format!("{}_{}", tileset.name, layer.name);

                if geometry_type == GeometryType::Unknown {
                    for (suffix, kind) in [
                        ("point", GeometryType::Point),
                        ("linestring", GeometryType::LineString),
                        ("polygon", GeometryType::Polygon),
                    ] {
                        let id = format!("{}_{}", id, suffix);
                        layers.push(layer_style(&tileset.name, &id, &layer.name, kind, &color));
                    }
                } else {
                    layers.push(layer_style(
                        &tileset.name,
                        &id,
                        &layer.name,
                        geometry_type,
                        &color,
                    ));
                }
            }
        }
    }

    json!({
        "version": 8,
        "sources": sources,
        "layers": layers,
    })
}

fn layer_style(
    source: &str,
    id: &str,
    source_layer: &str,
    geometry_type: GeometryType,
    color: &str,
) -> Value {
    match geometry_type {
        GeometryType::Point | GeometryType::MultiPoint => json!({
            "id": id,
            "type": "circle",
            "source": source,
            "source-layer": source_layer,
            "filter": ["==", "$type", "Point"],
            "paint": {
                "circle-color": color,
                "circle-radius": 2.5,
                "circle-opacity": 0.75,
            },
        }),
        _ => {
            let filter_type = match geometry_type {
                GeometryType::LineString | GeometryType::MultiLineString => "LineString",
                _ => "Polygon",
            };
            json!({
                "id": id,
                "type": "line",
                "source": source,
                "source-layer": source_layer,
                "filter": ["==", "$type", filter_type],
                "layout": {
                    "line-join": "round",
                    "line-cap": "round",
                },
                "paint": {
                    "line-color": color,
                    "line-width": 1,
                    "line-opacity": 0.75,
                },
            })
        }
    }
}
