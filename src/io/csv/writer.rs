use std::fs;
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use geozero::ToWkt;
use itertools::Itertools;

use crate::algorithm::proj::{is_longitude_latitude, normalize_proj4, LONGITUDE_LATITUDE_PROJ4};
use crate::error::{GeoTableError, Result};
use crate::io::archive::{self, has_extension};
use crate::io::csv::PROJ4_EXTENSION;
use crate::table::{crs, GeoTable, GEOMETRY_LAYER, GEOMETRY_PROJ4};

/// What [`write_csv`] decided about the implicit columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvOutput {
    /// The single non-standard CRS shared by all rows, which belongs in a sidecar file instead
    /// of a `geometry_proj4` column.
    pub sidecar_proj4: Option<String>,
}

/// Write a [`GeoTable`] as CSV with a `wkt` column.
///
/// Geometries are reprojected to `target_proj4` one CRS group at a time. The `geometry_layer`
/// column is only written when rows differ in layer and the `geometry_proj4` column only when
/// rows differ in CRS. An empty table is written as a single blank cell.
pub fn write_csv<W: Write>(
    table: &GeoTable,
    writer: W,
    target_proj4: Option<&str>,
) -> Result<CsvOutput> {
    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    if table.is_empty() {
        csv_writer.write_record([""])?;
        csv_writer.write_record([""])?;
        csv_writer.flush()?;
        return Ok(CsvOutput::default());
    }

    let table = table.prepared(None)?;
    let target_proj4 = target_proj4
        .filter(|proj4| !proj4.trim().is_empty())
        .map(normalize_proj4)
        .transpose()?;
    let geometries =
        crs::transform_geometries(table.records(), LONGITUDE_LATITUDE_PROJ4, target_proj4.as_deref())?;
    let proj4s: Vec<&str> = table
        .records()
        .iter()
        .map(|record| {
            target_proj4
                .as_deref()
                .or(record.proj4.as_deref())
                .unwrap_or(LONGITUDE_LATITUDE_PROJ4)
        })
        .collect();
    let layers: Vec<&str> = table
        .records()
        .iter()
        .map(|record| record.layer.as_deref().unwrap_or_default())
        .collect();

    let write_layers = layers.iter().unique().count() > 1;
    let mut output = CsvOutput::default();
    let write_proj4s = if proj4s
        .iter()
        .map(|proj4| is_longitude_latitude(proj4))
        .collect::<Result<Vec<bool>>>()?
        .into_iter()
        .all(|lonlat| lonlat)
    {
        false
    } else if proj4s.iter().all_equal() {
        output.sidecar_proj4 = Some(proj4s[0].to_string());
        false
    } else {
        true
    };

    let mut header: Vec<&str> = table.field_names();
    header.push("wkt");
    if write_layers {
        header.push(GEOMETRY_LAYER);
    }
    if write_proj4s {
        header.push(GEOMETRY_PROJ4);
    }
    csv_writer.write_record(&header)?;

    for (index, record) in table.records().iter().enumerate() {
        let mut row: Vec<String> = record.values.iter().map(ToString::to_string).collect();
        row.push(match &geometries[index] {
            Some(geometry) => geometry.to_wkt()?,
            None => String::new(),
        });
        if write_layers {
            row.push(layers[index].to_string());
        }
        if write_proj4s {
            row.push(proj4s[index].to_string());
        }
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    log::debug!(
        "wrote csv (rows={}, layer_column={}, proj4_column={}, sidecar={})",
        table.len(),
        write_layers,
        write_proj4s,
        output.sidecar_proj4.is_some()
    );
    Ok(output)
}

/// Write a [`GeoTable`] to a CSV file, plus a `<stem>.proj4` sidecar when all rows share a
/// non-standard CRS.
///
/// A `.zip` target receives an archive holding the CSV and its sidecar. Other archive
/// extensions are refused. Otherwise the CSV is staged next to the target and moved into place,
/// and a sidecar left by an earlier save is removed when the new output needs none.
pub fn write_csv_path(
    table: &GeoTable,
    target_path: impl AsRef<Path>,
    target_proj4: Option<&str>,
) -> Result<()> {
    let target_path = target_path.as_ref();
    if has_extension(target_path, &["zip"]) {
        let stem = target_path
            .file_stem()
            .map(|stem| Path::new(stem).with_extension("csv"))
            .unwrap_or_else(|| "geotable.csv".into());
        let staging = tempfile::tempdir()?;
        write_csv_file(table, &staging.path().join(stem), target_path, target_proj4)?;
        return archive::compress(staging.path(), target_path);
    }
    if archive::is_archive(target_path) {
        return Err(GeoTableError::general(format!(
            "csv target must be a zip archive ({})",
            target_path.display()
        )));
    }

    let folder = match target_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::NamedTempFile::new_in(folder)?;
    let output = write_csv(&*table.prepared(Some(target_path))?, staged.as_file(), target_proj4)?;
    staged.persist(target_path).map_err(|error| error.error)?;
    write_sidecar(target_path, &output)
}

fn write_csv_file(
    table: &GeoTable,
    path: &Path,
    target_path: &Path,
    target_proj4: Option<&str>,
) -> Result<()> {
    let file = fs::File::create(path)?;
    let output = write_csv(&*table.prepared(Some(target_path))?, file, target_proj4)?;
    write_sidecar(path, &output)
}

fn write_sidecar(path: &Path, output: &CsvOutput) -> Result<()> {
    let sidecar_path = path.with_extension(PROJ4_EXTENSION);
    match &output.sidecar_proj4 {
        Some(proj4) => fs::write(sidecar_path, proj4)?,
        None if sidecar_path.exists() => {
            log::debug!("removing stale sidecar ({})", sidecar_path.display());
            fs::remove_file(sidecar_path)?;
        }
        None => {}
    }
    Ok(())
}

impl GeoTable {
    /// Save as CSV, optionally reprojecting to `target_proj4`. See [`write_csv_path`].
    pub fn save_csv(&self, target_path: impl AsRef<Path>, target_proj4: Option<&str>) -> Result<()> {
        write_csv_path(self, target_path, target_proj4)
    }
}
