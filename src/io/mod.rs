//! Readers and writers for the supported source formats, plus the [`load`](load::load) entry
//! point that picks one for a path or URL.

pub mod archive;
pub mod cache;
pub mod csv;
pub mod gdal;
pub mod load;
