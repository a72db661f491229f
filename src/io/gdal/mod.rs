//! Read from and write to vector datasets (shapefile, GeoJSON, KML and anything else GDAL can
//! open) through GDAL.

pub use reader::{read_gdal, GdalReaderOptions};
pub use writer::write_gdal;

mod field;
mod reader;
mod writer;

/// Extensions of the vector datasets [`load`](crate::io::load::load) hands to GDAL.
pub const VECTOR_EXTENSIONS: [&str; 6] = ["shp", "geojson", "json", "kml", "gpkg", "gml"];

/// GDAL driver names used by the `save_*` shorthands.
pub const SHAPEFILE_DRIVER: &str = "ESRI Shapefile";
pub const GEOJSON_DRIVER: &str = "GeoJSON";
pub const KML_DRIVER: &str = "KML";

/// KML presentation fields that are not attributes of the features.
pub const KML_EXCLUDED_FIELDS: [&str; 11] = [
    "description",
    "timestamp",
    "begin",
    "end",
    "altitudeMode",
    "tessellate",
    "extrude",
    "visibility",
    "drawOrder",
    "icon",
    "snippet",
];

pub(crate) fn is_kml_driver(driver_name: &str) -> bool {
    matches!(driver_name, "KML" | "LIBKML")
}
