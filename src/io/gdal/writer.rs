use std::fs;
use std::path::{Path, PathBuf};

use gdal::vector::{Feature, FieldValue, LayerAccess, OGRFieldType, OGRwkbGeometryType, ToGdal};
use gdal::vector::LayerOptions;
use gdal::{Dataset, DriverManager, Metadata};
use geo::Geometry;
use indexmap::IndexMap;

use crate::algorithm::proj::{
    get_transform_geometry, normalize_proj4, spatial_reference_from_proj4, Reproject,
    LONGITUDE_LATITUDE_PROJ4,
};
use crate::error::{GeoTableError, Result};
use crate::io::archive;
use crate::io::gdal::field::FieldKind;
use crate::io::gdal::{is_kml_driver, GEOJSON_DRIVER, KML_DRIVER, SHAPEFILE_DRIVER};
use crate::table::crs::group_by_crs;
use crate::table::GeoTable;

/// Write a [`GeoTable`] through the GDAL driver named `driver_name`, one output layer per
/// distinct row layer.
///
/// Every layer is written in `target_proj4`, or else in the CRS of its first row. Columns that
/// are entirely null are left out and rows without a geometry become features with a null
/// geometry. Shapefiles must
/// target a zip archive, and KML targeting a `.kmz` is packaged as a zip holding `doc.kml`.
pub fn write_gdal(
    table: &GeoTable,
    target_path: impl AsRef<Path>,
    driver_name: &str,
    target_proj4: Option<&str>,
) -> Result<()> {
    let target_path = target_path.as_ref();
    let driver = DriverManager::get_driver_by_name(driver_name)
        .map_err(|_| GeoTableError::general(format!("driver unknown ({})", driver_name)))?;
    let is_shapefile = driver_name == SHAPEFILE_DRIVER;
    let is_archive = archive::is_archive(target_path);
    if is_shapefile && !is_archive {
        return Err(GeoTableError::general(format!(
            "shapefile target must be a zip archive ({})",
            target_path.display()
        )));
    }

    let base_name = base_name(target_path);
    let table = table.prepared(Some(Path::new(&base_name)))?;
    let target_proj4 = target_proj4
        .filter(|proj4| !proj4.trim().is_empty())
        .map(normalize_proj4)
        .transpose()?;

    let staging = tempfile::tempdir()?;
    let staged_path: PathBuf = if is_shapefile {
        staging.path().join(&base_name)
    } else if is_archive && is_kml_driver(driver_name) {
        staging.path().join("doc.kml")
    } else if is_archive {
        let extension = driver
            .metadata_item("DMD_EXTENSION", "")
            .unwrap_or_default();
        staging.path().join(&base_name).with_extension(extension)
    } else {
        staging.path().join(target_path.file_name().unwrap_or(base_name.as_ref()))
    };
    log::debug!(
        "writing vector dataset (driver={}, target_path={}, staged_path={})",
        driver_name,
        target_path.display(),
        staged_path.display()
    );
    {
        let mut dataset = driver.create_vector_only(&staged_path)?;
        write_layers(&mut dataset, &table, &base_name, target_proj4.as_deref())?;
    }

    if is_shapefile {
        archive::compress(&staged_path, target_path)
    } else if is_archive {
        archive::compress(staging.path(), target_path)
    } else {
        fs::copy(&staged_path, target_path)?;
        Ok(())
    }
}

/// The file name of `path` up to its first dot, so that `points.shp.zip` becomes `points`.
fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.split('.').next().map(str::to_string))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "geotable".to_string())
}

fn write_layers(
    dataset: &mut Dataset,
    table: &GeoTable,
    default_layer: &str,
    target_proj4: Option<&str>,
) -> Result<()> {
    let mut layers: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (index, record) in table.records().iter().enumerate() {
        let layer = record
            .layer
            .as_deref()
            .filter(|layer| !layer.is_empty())
            .unwrap_or(default_layer);
        layers.entry(layer).or_default().push(index);
    }
    for (layer_name, indices) in layers {
        write_layer(dataset, &table.take(&indices)?, layer_name, target_proj4)?;
    }
    Ok(())
}

fn write_layer(
    dataset: &mut Dataset,
    table: &GeoTable,
    layer_name: &str,
    target_proj4: Option<&str>,
) -> Result<()> {
    let mut fields: Vec<(&str, FieldKind, usize)> = Vec::new();
    for (position, name) in table.field_names().into_iter().enumerate() {
        let values = table.records().iter().map(|record| &record.values[position]);
        match FieldKind::infer(values) {
            Some(kind) => fields.push((name, kind, position)),
            None => log::debug!(
                "dropping empty column (layer={}, column={})",
                layer_name,
                name
            ),
        }
    }

    let layer_proj4 = match target_proj4 {
        Some(proj4) => proj4.to_string(),
        None => normalize_proj4(
            table
                .records()
                .first()
                .and_then(|record| record.proj4.as_deref())
                .unwrap_or(LONGITUDE_LATITUDE_PROJ4),
        )?,
    };
    let spatial_reference = spatial_reference_from_proj4(&layer_proj4)?;
    let mut layer = dataset.create_layer(LayerOptions {
        name: layer_name,
        srs: Some(&spatial_reference),
        ty: OGRwkbGeometryType::wkbUnknown,
        options: None,
    })?;
    let definitions: Vec<(&str, OGRFieldType::Type)> = fields
        .iter()
        .map(|(name, kind, _)| (*name, kind.ogr_type()))
        .collect();
    layer.create_defn_fields(&definitions)?;

    let mut first_geometry_type: Option<&'static str> = None;
    for (source_proj4, indices) in group_by_crs(table.records(), LONGITUDE_LATITUDE_PROJ4)? {
        let transform = get_transform_geometry(&source_proj4, Some(&layer_proj4))?;
        for index in indices {
            let record = &table.records()[index];
            let (names, values): (Vec<&str>, Vec<FieldValue>) = fields
                .iter()
                .filter_map(|(name, kind, position)| {
                    kind.to_field_value(&record.values[*position])
                        .map(|value| (*name, value))
                })
                .unzip();
            let geometry = match &record.geometry {
                Some(geometry) => geometry,
                None => {
                    let mut feature = Feature::new(layer.defn())?;
                    for (name, value) in names.iter().zip(&values) {
                        feature.set_field(name, value)?;
                    }
                    feature.create(&layer)?;
                    continue;
                }
            };
            let geometry_type = geometry_type_name(geometry);
            let gdal_geometry = geometry.to_gdal()?.reproject(&transform)?;
            if let Err(error) = layer.create_feature_fields(gdal_geometry, &names, &values) {
                return Err(match first_geometry_type {
                    Some(first) if first != geometry_type => GeoTableError::general(format!(
                        "incompatible geometry types must be written to separate layers \
                         (layer={}, first={}, current={})",
                        layer_name, first, geometry_type
                    )),
                    _ => error.into(),
                });
            }
            first_geometry_type.get_or_insert(geometry_type);
        }
    }
    Ok(())
}

fn geometry_type_name(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

impl GeoTable {
    /// Save through any GDAL vector driver. See [`write_gdal`].
    pub fn save_gdal(
        &self,
        target_path: impl AsRef<Path>,
        driver_name: &str,
        target_proj4: Option<&str>,
    ) -> Result<()> {
        write_gdal(self, target_path, driver_name, target_proj4)
    }

    /// Save as a zipped shapefile.
    pub fn save_shp(&self, target_path: impl AsRef<Path>, target_proj4: Option<&str>) -> Result<()> {
        write_gdal(self, target_path, SHAPEFILE_DRIVER, target_proj4)
    }

    /// Save as KMZ (or plain KML when the target does not end in `.kmz`). Geometries default to
    /// longitude-latitude.
    pub fn save_kmz(&self, target_path: impl AsRef<Path>, target_proj4: Option<&str>) -> Result<()> {
        let target_proj4 = target_proj4.unwrap_or(LONGITUDE_LATITUDE_PROJ4);
        write_gdal(self, target_path, KML_DRIVER, Some(target_proj4))
    }

    pub fn save_geojson(
        &self,
        target_path: impl AsRef<Path>,
        target_proj4: Option<&str>,
    ) -> Result<()> {
        write_gdal(self, target_path, GEOJSON_DRIVER, target_proj4)
    }
}
