//! Load any supported source into a [`GeoTable`].

use std::path::{Path, PathBuf};

use geo::{Geometry, Polygon};

use crate::algorithm::filter::bounding_box_polygon;
use crate::error::{GeoTableError, Result};
use crate::io::archive::{self, has_extension};
use crate::io::cache::CacheConfig;
use crate::io::csv::{read_csv_path, CsvReaderOptions};
use crate::io::gdal::{read_gdal, GdalReaderOptions, VECTOR_EXTENSIONS};
use crate::table::GeoTable;

/// Options for [`load`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOptions {
    /// CRS of geometries whose source does not declare one.
    pub source_proj4: Option<String>,

    /// CRS to reproject every geometry to.
    pub target_proj4: Option<String>,

    /// Keep only rows intersecting `(min_x, min_y, max_x, max_y)`.
    pub bounding_box: Option<(f64, f64, f64, f64)>,

    /// Keep only rows intersecting this polygon. Applied after `bounding_box`.
    pub bounding_polygon: Option<Polygon>,

    /// CRS of the bounding box and polygon, longitude-latitude by default.
    pub bounding_proj4: Option<String>,

    /// Pass-through options for CSV sources.
    pub csv: CsvReaderOptions,

    /// Where URL sources are cached.
    pub cache: Option<CacheConfig>,
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(feature = "http")]
fn fetch(source: &str, options: &LoadOptions) -> Result<PathBuf> {
    options.cache.clone().unwrap_or_default().fetch(source)
}

#[cfg(not(feature = "http"))]
fn fetch(source: &str, options: &LoadOptions) -> Result<PathBuf> {
    let cache = options.cache.clone().unwrap_or_default();
    cache.get(source)?.ok_or_else(|| {
        GeoTableError::general(format!(
            "url sources require the http feature ({})",
            source
        ))
    })
}

/// Load a path or URL.
///
/// URLs are downloaded once into the cache. Archives are unpacked into a temporary folder and
/// every CSV or vector dataset inside is loaded, in file name order. `.csv` files go to the CSV
/// reader and [`VECTOR_EXTENSIONS`] to GDAL; anything else fails.
pub fn load(source: &str, options: &LoadOptions) -> Result<GeoTable> {
    let path = if is_url(source) {
        fetch(source, options)?
    } else {
        PathBuf::from(source)
    };
    let table = load_path(&path, options)?;
    filter_bounds(table, options)
}

fn load_path(path: &Path, options: &LoadOptions) -> Result<GeoTable> {
    if archive::is_archive(path) {
        return load_archive(path, options);
    }
    if has_extension(path, &["csv"]) {
        let csv_options = CsvReaderOptions {
            source_proj4: options
                .source_proj4
                .clone()
                .or_else(|| options.csv.source_proj4.clone()),
            target_proj4: options
                .target_proj4
                .clone()
                .or_else(|| options.csv.target_proj4.clone()),
            ..options.csv.clone()
        };
        return read_csv_path(path, &csv_options);
    }
    if has_extension(path, &VECTOR_EXTENSIONS) {
        let gdal_options = GdalReaderOptions {
            source_proj4: options.source_proj4.clone(),
            target_proj4: options.target_proj4.clone(),
        };
        return read_gdal(path, &gdal_options);
    }
    Err(GeoTableError::general(format!(
        "format unsupported ({})",
        path.display()
    )))
}

fn load_archive(path: &Path, options: &LoadOptions) -> Result<GeoTable> {
    let staging = tempfile::tempdir()?;
    archive::extract(path, staging.path())?;
    let sources: Vec<PathBuf> = archive::list_files(staging.path())?
        .into_iter()
        .filter(|path| has_extension(path, &["csv"]) || has_extension(path, &VECTOR_EXTENSIONS))
        .collect();
    if sources.is_empty() {
        return Err(GeoTableError::general(format!(
            "archive has no loadable files ({})",
            path.display()
        )));
    }
    let tables = sources
        .iter()
        .map(|source| load_path(source, options))
        .collect::<Result<Vec<_>>>()?;
    Ok(GeoTable::concat(tables))
}

fn filter_bounds(mut table: GeoTable, options: &LoadOptions) -> Result<GeoTable> {
    let bounding_proj4 = options.bounding_proj4.as_deref();
    if let Some(bounding_box) = options.bounding_box {
        let bounds = Geometry::Polygon(bounding_box_polygon(bounding_box));
        table = table.filter_intersecting(&bounds, bounding_proj4)?;
    }
    if let Some(bounding_polygon) = &options.bounding_polygon {
        let bounds = Geometry::Polygon(bounding_polygon.clone());
        table = table.filter_intersecting(&bounds, bounding_proj4)?;
    }
    Ok(table)
}

impl GeoTable {
    /// Load a path or URL. See [`load`].
    pub fn load(source: &str, options: &LoadOptions) -> Result<Self> {
        load(source, options)
    }

    /// Read a CSV file. See [`read_csv_path`].
    pub fn from_csv(path: impl AsRef<Path>, options: &CsvReaderOptions) -> Result<Self> {
        read_csv_path(path, options)
    }
}
