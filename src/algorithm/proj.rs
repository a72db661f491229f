//! Canonical CRS descriptors and geometry reprojection through GDAL/PROJ.
//!
//! CRS descriptors are proj4 strings. Two descriptors are interchangeable iff their normalized
//! forms (as exported back out of a GDAL spatial reference) are textually equal.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal::vector::{Geometry as GdalGeometry, ToGdal};
use geo::Geometry;

use crate::error::{GeoTableError, Result};

/// The standard longitude-latitude CRS, already in normalized form.
pub const LONGITUDE_LATITUDE_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";

const SPHERICAL_MERCATOR_PROJ4: &str = "+proj=merc +a=6378137 +b=6378137 +lat_ts=0.0 +lon_0=0.0 \
     +x_0=0.0 +y_0=0 +k=1.0 +units=m +nadgrids=@null +wktext +no_defs";

// GDAL handles are not Send, so memoization is per thread.
thread_local! {
    static NORMALIZED_PROJ4S: RefCell<HashMap<String, String>> = RefCell::new(HashMap::new());
    static COORDINATE_TRANSFORMS: RefCell<HashMap<(String, String), Rc<CoordTransform>>> =
        RefCell::new(HashMap::new());
}

/// Parse a proj4 string into a GDAL spatial reference.
pub(crate) fn spatial_reference_from_proj4(proj4: &str) -> Result<SpatialRef> {
    SpatialRef::from_proj4(proj4)
        .map_err(|_| GeoTableError::SpatialReference(format!("proj4 unparseable ({})", proj4)))
}

/// Canonicalize a proj4 string.
pub fn normalize_proj4(proj4: &str) -> Result<String> {
    if let Some(normalized) = NORMALIZED_PROJ4S.with(|cache| cache.borrow().get(proj4).cloned()) {
        return Ok(normalized);
    }
    let spatial_reference = spatial_reference_from_proj4(proj4)?;
    let normalized = spatial_reference
        .to_proj4()
        .map_err(|_| GeoTableError::SpatialReference(format!("proj4 unparseable ({})", proj4)))?
        .trim()
        .to_string();
    NORMALIZED_PROJ4S.with(|cache| {
        cache
            .borrow_mut()
            .insert(proj4.to_string(), normalized.clone())
    });
    Ok(normalized)
}

/// Normalized proj4 string for an EPSG code.
pub fn get_proj4_from_epsg(epsg: u32) -> Result<String> {
    let spatial_reference = SpatialRef::from_epsg(epsg)
        .map_err(|_| GeoTableError::SpatialReference(format!("epsg unknown ({})", epsg)))?;
    normalize_proj4(&spatial_reference.to_proj4()?)
}

/// Normalized proj4 string of the spherical mercator projection used by web maps.
pub fn spherical_mercator_proj4() -> Result<String> {
    normalize_proj4(SPHERICAL_MERCATOR_PROJ4)
}

/// Whether a proj4 string is, once normalized, the standard longitude-latitude CRS.
pub fn is_longitude_latitude(proj4: &str) -> Result<bool> {
    Ok(normalize_proj4(proj4)? == LONGITUDE_LATITUDE_PROJ4)
}

/// A reusable function from geometries in one CRS to geometries in another.
#[derive(Clone)]
pub enum GeometryTransform {
    Identity,
    Reproject {
        source_proj4: String,
        target_proj4: String,
        transform: Rc<CoordTransform>,
    },
}

impl GeometryTransform {
    pub fn is_identity(&self) -> bool {
        matches!(self, GeometryTransform::Identity)
    }
}

impl std::fmt::Debug for GeometryTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryTransform::Identity => f.write_str("GeometryTransform::Identity"),
            GeometryTransform::Reproject {
                source_proj4,
                target_proj4,
                ..
            } => f
                .debug_struct("GeometryTransform::Reproject")
                .field("source_proj4", source_proj4)
                .field("target_proj4", target_proj4)
                .finish(),
        }
    }
}

/// Build the transform from `source_proj4` to `target_proj4`.
///
/// This is the identity when the target is missing or empty, or when both descriptors normalize
/// to the same string. Coordinate transformation objects are cached per (source, target) pair.
pub fn get_transform_geometry(
    source_proj4: &str,
    target_proj4: Option<&str>,
) -> Result<GeometryTransform> {
    let target_proj4 = match target_proj4 {
        Some(target_proj4) if !target_proj4.trim().is_empty() => target_proj4,
        _ => return Ok(GeometryTransform::Identity),
    };
    let source_proj4 = normalize_proj4(source_proj4)?;
    let target_proj4 = normalize_proj4(target_proj4)?;
    if source_proj4 == target_proj4 {
        return Ok(GeometryTransform::Identity);
    }

    let key = (source_proj4.clone(), target_proj4.clone());
    let cached = COORDINATE_TRANSFORMS.with(|cache| cache.borrow().get(&key).cloned());
    let transform = match cached {
        Some(transform) => transform,
        None => {
            let transform = Rc::new(CoordTransform::new(
                &spatial_reference_from_proj4(&source_proj4)?,
                &spatial_reference_from_proj4(&target_proj4)?,
            )?);
            COORDINATE_TRANSFORMS.with(|cache| cache.borrow_mut().insert(key, transform.clone()));
            transform
        }
    };
    Ok(GeometryTransform::Reproject {
        source_proj4,
        target_proj4,
        transform,
    })
}

/// Reproject a geometry using a [`GeometryTransform`].
pub trait Reproject {
    fn reproject(&self, transform: &GeometryTransform) -> Result<Self>
    where
        Self: Sized;
}

impl Reproject for GdalGeometry {
    fn reproject(&self, transform: &GeometryTransform) -> Result<Self> {
        match transform {
            GeometryTransform::Identity => Ok(self.clone()),
            GeometryTransform::Reproject {
                source_proj4,
                target_proj4,
                transform,
            } => self
                .transform(transform)
                .map_err(|_| GeoTableError::CoordinateTransformation {
                    source_proj4: source_proj4.clone(),
                    target_proj4: target_proj4.clone(),
                    wkt: self.wkt().unwrap_or_default(),
                }),
        }
    }
}

impl Reproject for Geometry {
    fn reproject(&self, transform: &GeometryTransform) -> Result<Self> {
        if transform.is_identity() {
            return Ok(self.clone());
        }
        Ok(self.to_gdal()?.reproject(transform)?.to_geo()?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{point, Point};

    const UTM_PROJ4: &str = "+proj=utm +zone=17 +ellps=WGS84 +datum=WGS84 +units=m +no_defs";

    #[test]
    fn test_normalize_proj4() {
        assert_eq!(
            normalize_proj4(LONGITUDE_LATITUDE_PROJ4).unwrap(),
            LONGITUDE_LATITUDE_PROJ4
        );
        assert!(matches!(
            normalize_proj4(""),
            Err(GeoTableError::SpatialReference(_))
        ));
    }

    #[test]
    fn test_get_proj4_from_epsg() {
        assert_eq!(get_proj4_from_epsg(4326).unwrap(), LONGITUDE_LATITUDE_PROJ4);
    }

    #[test]
    fn test_identity_transform() {
        let transform = get_transform_geometry(LONGITUDE_LATITUDE_PROJ4, None).unwrap();
        assert!(transform.is_identity());

        let transform =
            get_transform_geometry(LONGITUDE_LATITUDE_PROJ4, Some(LONGITUDE_LATITUDE_PROJ4))
                .unwrap();
        assert!(transform.is_identity());

        let geometry = Geometry::Point(point!(x: -83.7430378, y: 42.280826));
        assert_eq!(geometry.reproject(&transform).unwrap(), geometry);
    }

    #[test]
    fn test_reproject_round_trip() {
        let forward = get_transform_geometry(LONGITUDE_LATITUDE_PROJ4, Some(UTM_PROJ4)).unwrap();
        let backward = get_transform_geometry(UTM_PROJ4, Some(LONGITUDE_LATITUDE_PROJ4)).unwrap();
        assert!(!forward.is_identity());

        let geometry = Geometry::Point(point!(x: -83.7430378, y: 42.280826));
        let projected = geometry.reproject(&forward).unwrap();
        let projected_point = Point::try_from(projected.clone()).unwrap();
        assert!(projected_point.x() > 100_000.0);

        let point = Point::try_from(projected.reproject(&backward).unwrap()).unwrap();
        assert_relative_eq!(point.x(), -83.7430378, epsilon = 1e-6);
        assert_relative_eq!(point.y(), 42.280826, epsilon = 1e-6);
    }

    #[test]
    fn test_reproject_out_of_domain() {
        let transform = get_transform_geometry(
            LONGITUDE_LATITUDE_PROJ4,
            Some(&spherical_mercator_proj4().unwrap()),
        )
        .unwrap();
        let geometry = Geometry::Point(point!(x: 100., y: 100.));
        assert!(matches!(
            geometry.reproject(&transform),
            Err(GeoTableError::CoordinateTransformation { .. })
        ));
    }
}
