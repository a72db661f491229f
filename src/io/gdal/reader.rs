use std::collections::HashMap;
use std::path::Path;

use gdal::vector::{Geometry as GdalGeometry, Layer, LayerAccess};
use gdal::Dataset;
use geo::Geometry;

use crate::algorithm::proj::{
    get_transform_geometry, normalize_proj4, GeometryTransform, Reproject,
    LONGITUDE_LATITUDE_PROJ4,
};
use crate::error::{GeoTableError, Result};
use crate::io::gdal::field::value_from_field;
use crate::io::gdal::{is_kml_driver, KML_EXCLUDED_FIELDS};
use crate::table::{GeoTable, Record};

/// Options for the GDAL reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GdalReaderOptions {
    /// CRS of layers that do not declare one.
    pub source_proj4: Option<String>,

    /// CRS to reproject every geometry to.
    pub target_proj4: Option<String>,
}

/// Read every layer of a vector dataset into one [`GeoTable`].
///
/// Each row is tagged with the name of its layer and with the CRS its geometry ends up in.
/// Features whose geometry cannot be decoded are skipped with a warning.
pub fn read_gdal(path: impl AsRef<Path>, options: &GdalReaderOptions) -> Result<GeoTable> {
    let path = path.as_ref();
    let dataset = Dataset::open(path).map_err(|error| {
        GeoTableError::general(format!("dataset unopenable ({}: {})", path.display(), error))
    })?;
    let is_kml = is_kml_driver(&dataset.driver().short_name());
    let target_proj4 = options
        .target_proj4
        .as_deref()
        .filter(|proj4| !proj4.trim().is_empty())
        .map(normalize_proj4)
        .transpose()?;

    let mut tables = Vec::new();
    for mut layer in dataset.layers() {
        let layer_name = layer.name();
        let source_proj4 = match layer_proj4(&layer) {
            Some(proj4) => proj4,
            None => {
                log::warn!(
                    "layer has no spatial reference (path={}, layer={})",
                    path.display(),
                    layer_name
                );
                options
                    .source_proj4
                    .clone()
                    .unwrap_or_else(|| LONGITUDE_LATITUDE_PROJ4.to_string())
            }
        };
        let source_proj4 = normalize_proj4(&source_proj4)?;
        let transform = get_transform_geometry(&source_proj4, target_proj4.as_deref())?;
        let output_proj4 = target_proj4.clone().unwrap_or(source_proj4);
        let table = read_layer(&mut layer, is_kml, &transform, &output_proj4).map_err(|error| {
            match error {
                GeoTableError::GdalError(error) => GeoTableError::general(format!(
                    "features unreadable ({}, layer={}: {})",
                    path.display(),
                    layer_name,
                    error
                )),
                error => error,
            }
        })?;
        tables.push(table);
    }
    Ok(GeoTable::concat(tables))
}

fn layer_proj4(layer: &Layer) -> Option<String> {
    let proj4 = layer.spatial_ref()?.to_proj4().ok()?;
    let proj4 = proj4.trim();
    (!proj4.is_empty()).then(|| proj4.to_string())
}

fn read_layer(
    layer: &mut Layer,
    is_kml: bool,
    transform: &GeometryTransform,
    proj4: &str,
) -> Result<GeoTable> {
    let layer_name = layer.name();
    let field_names: Vec<String> = layer
        .defn()
        .fields()
        .map(|field| field.name())
        .filter(|name| {
            !(is_kml
                && KML_EXCLUDED_FIELDS
                    .iter()
                    .any(|excluded| excluded.eq_ignore_ascii_case(name)))
        })
        .collect();

    let mut records = Vec::new();
    for feature in layer.features() {
        let geometry = match feature.geometry() {
            None => None,
            Some(geometry) => match decode_geometry(geometry, transform)? {
                Some(geometry) => Some(geometry),
                None => {
                    log::warn!(
                        "skipping feature with undecodable geometry (layer={}, fid={:?})",
                        layer_name,
                        feature.fid()
                    );
                    continue;
                }
            },
        };
        let mut values: HashMap<String, _> = feature
            .fields()
            .map(|(name, value)| (name, value_from_field(value)))
            .collect();
        let values = field_names
            .iter()
            .map(|name| values.remove(name).unwrap_or_default())
            .collect();
        records.push(
            Record::new(values, geometry)
                .with_layer(layer_name.clone())
                .with_proj4(proj4),
        );
    }
    log::debug!("read layer (layer={}, rows={})", layer_name, records.len());
    GeoTable::try_new(field_names, records)
}

/// Reproject a feature geometry and convert it to a planar geometry. Geometry types without a
/// planar counterpart, such as curves, give `None`.
fn decode_geometry(
    geometry: &GdalGeometry,
    transform: &GeometryTransform,
) -> Result<Option<Geometry>> {
    match geometry.reproject(transform)?.to_geo() {
        Ok(geometry) => Ok(Some(geometry)),
        Err(error) => {
            log::debug!("geometry undecodable ({})", error);
            Ok(None)
        }
    }
}

impl GeoTable {
    /// Read a vector dataset. See [`read_gdal`].
    pub fn from_gdal(path: impl AsRef<Path>, options: &GdalReaderOptions) -> Result<Self> {
        read_gdal(path, options)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::table::Value;
    use crate::test::{fixture, UTM_PROJ4};
    use approx::assert_relative_eq;
    use geo::Point;

    #[test]
    fn test_read_geojson() {
        let table = read_gdal(fixture("points.geojson"), &Default::default()).unwrap();
        assert_eq!(table.len(), 2);
        let row = table.row(0).unwrap();
        assert_eq!(row.get("name"), Some(&Value::from("a")));
        assert_eq!(row.get("count"), Some(&Value::Int(1)));
        assert_eq!(row.get("height"), Some(&Value::Float(1.5)));
        assert_eq!(row.layer(), Some("points"));
        assert_eq!(row.proj4(), Some(LONGITUDE_LATITUDE_PROJ4));
        let point = Point::try_from(row.geometry().cloned().unwrap()).unwrap();
        assert_eq!(point.x(), -83.7430378);

        let row = table.row(1).unwrap();
        assert_eq!(row.get("count"), Some(&Value::Null));
        assert!(row.geometry().is_none());
    }

    #[test]
    fn test_read_geojson_reprojected() {
        let options = GdalReaderOptions {
            target_proj4: Some(UTM_PROJ4.to_string()),
            ..Default::default()
        };
        let table = read_gdal(fixture("points.geojson"), &options).unwrap();
        let expected = normalize_proj4(UTM_PROJ4).unwrap();
        assert_eq!(table.records()[0].proj4.as_deref(), Some(expected.as_str()));
        let point = Point::try_from(table.records()[0].geometry.clone().unwrap()).unwrap();
        let back = table.geometries(Some(LONGITUDE_LATITUDE_PROJ4)).unwrap()[0]
            .clone()
            .unwrap();
        assert!(point.x() > 100_000.);
        assert_relative_eq!(Point::try_from(back).unwrap().y(), 42.280826, epsilon = 1e-6);
    }

    #[test]
    fn test_read_kml_drops_presentation_fields() {
        let table = read_gdal(fixture("placemarks.kml"), &Default::default()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(!table
            .field_names()
            .iter()
            .any(|name| name.eq_ignore_ascii_case("description")));
        assert!(table.records()[0].geometry.is_some());
    }

    #[test]
    fn test_decode_geometry() {
        let point = GdalGeometry::from_wkt("POINT (1 2)").unwrap();
        assert_eq!(
            decode_geometry(&point, &GeometryTransform::Identity).unwrap(),
            Some(Geometry::Point(Point::new(1., 2.)))
        );
        let curve = GdalGeometry::from_wkt("CIRCULARSTRING (0 0,1 1,2 0)").unwrap();
        assert_eq!(
            decode_geometry(&curve, &GeometryTransform::Identity).unwrap(),
            None
        );
    }

    #[test]
    fn test_read_skips_curved_features() {
        let table = read_gdal(fixture("curves.gml"), &Default::default()).unwrap();
        assert_eq!(table.column("name").unwrap(), vec![&Value::from("straight")]);
    }

    #[test]
    fn test_read_malformed_dates_as_null() {
        let table = read_gdal(fixture("dates.dbf"), &Default::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.column("visited").unwrap(),
            vec![
                &Value::Date(chrono::NaiveDate::from_ymd_opt(2001, 2, 3).unwrap()),
                &Value::Null
            ]
        );
        assert_eq!(table.column("name").unwrap(), vec![&Value::from("a"), &Value::from("b")]);
        assert!(table.records().iter().all(|record| record.geometry.is_none()));
    }

    #[test]
    fn test_read_unopenable() {
        let error = read_gdal(fixture("missing.geojson"), &Default::default()).unwrap_err();
        assert!(matches!(error, GeoTableError::General(_)));
        assert!(error.to_string().contains("missing.geojson"));
    }
}
