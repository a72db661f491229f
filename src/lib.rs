//! Load, reproject and save spatial vectors as uniform row-oriented tables.
//!
//! A [`GeoTable`] holds rows read from CSV files (with well-known-text or coordinate columns),
//! shapefiles, KML/KMZ or GeoJSON. Every row keeps its own geometry, layer and CRS, so a table
//! can mix sources in different projections and still be written back out in one.
//!
//! ```no_run
//! use geotable::io::load::LoadOptions;
//! use geotable::GeoTable;
//!
//! let table = GeoTable::load("points.csv", &LoadOptions::default()).unwrap();
//! table.save_shp("points.shp.zip", None).unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub use error::{GeoTableError, Result};
pub use io::load::load;
pub use table::{GeoRow, GeoTable, Record, Value};

pub mod algorithm;
pub mod error;
pub mod io;
pub mod table;
#[cfg(test)]
pub(crate) mod test;
