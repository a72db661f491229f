//! Defines [`GeoTableError`], representing all errors returned by this crate.

use thiserror::Error;

/// Enum with all errors in this crate.
///
/// [`GeoTableError::General`] is the base case. [`GeoTableError::EmptyGeoTable`],
/// [`GeoTableError::SpatialReference`] and [`GeoTableError::CoordinateTransformation`] are its
/// more specific flavors; everything else wraps an error raised by a dependency.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GeoTableError {
    /// Malformed or unsupported input, unreadable source, incompatible geometry types.
    #[error("{0}")]
    General(String),

    /// The source parsed to zero rows or columns.
    #[error("geotable empty ({0})")]
    EmptyGeoTable(String),

    /// A CRS descriptor could not be parsed.
    #[error("{0}")]
    SpatialReference(String),

    /// Reprojecting a specific geometry failed.
    #[error(
        "coordinate transformation failed (source_proj4='{source_proj4}', target_proj4='{target_proj4}', wkt='{wkt}')"
    )]
    CoordinateTransformation {
        source_proj4: String,
        target_proj4: String,
        wkt: String,
    },

    /// [csv::Error]
    #[error(transparent)]
    CsvError(#[from] csv::Error),

    /// [gdal::errors::GdalError]
    #[error(transparent)]
    GdalError(#[from] gdal::errors::GdalError),

    /// [geozero::error::GeozeroError]
    #[error(transparent)]
    GeozeroError(#[from] geozero::error::GeozeroError),

    /// [std::io::Error]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// [reqwest::Error]
    #[cfg(feature = "http")]
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    /// [walkdir::Error]
    #[error(transparent)]
    WalkDirError(#[from] walkdir::Error),

    /// [zip::result::ZipError]
    #[error(transparent)]
    ZipError(#[from] zip::result::ZipError),
}

impl GeoTableError {
    /// Shorthand for the base error case.
    pub(crate) fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }
}

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, GeoTableError>;
