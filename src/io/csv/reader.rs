use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::algorithm::proj::{
    get_transform_geometry, normalize_proj4, Reproject, LONGITUDE_LATITUDE_PROJ4,
};
use crate::error::{GeoTableError, Result};
use crate::io::csv::PROJ4_EXTENSION;
use crate::table::{
    crs, infer_column, resolve_geometry_columns, GeoTable, Record, Value, GEOMETRY_LAYER,
    GEOMETRY_PROJ4, RESERVED_COLUMNS,
};

/// Options for the CSV reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvReaderOptions {
    /// Field delimiter.
    pub delimiter: u8,

    /// Columns parsed as dates or datetimes. Cells that do not parse are kept as text.
    pub parse_dates: Vec<String>,

    /// CRS of rows without a `geometry_proj4` value. Takes precedence over a sidecar file.
    pub source_proj4: Option<String>,

    /// CRS to reproject every geometry to.
    pub target_proj4: Option<String>,
}

impl CsvReaderOptions {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            parse_dates: Vec::new(),
            source_proj4: None,
            target_proj4: None,
        }
    }
}

impl Default for CsvReaderOptions {
    fn default() -> Self {
        Self::new(b',')
    }
}

/// Read CSV text into a [`GeoTable`]. Rows without a layer get the empty layer name.
pub fn read_csv<R: Read>(reader: R, options: &CsvReaderOptions) -> Result<GeoTable> {
    read(reader, "<reader>", "", options.source_proj4.as_deref(), options)
}

/// Read a CSV file into a [`GeoTable`].
///
/// Without an explicit source CRS, a sidecar `<stem>.proj4` next to the file supplies the
/// default CRS. Rows without a layer are assigned the file stem.
pub fn read_csv_path(path: impl AsRef<Path>, options: &CsvReaderOptions) -> Result<GeoTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|error| {
        GeoTableError::general(format!("source unreadable ({}: {})", path.display(), error))
    })?;
    let default_proj4 = match &options.source_proj4 {
        Some(proj4) => Some(proj4.clone()),
        None => read_sidecar_proj4(path)?,
    };
    let layer = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    read(
        BufReader::new(file),
        &path.display().to_string(),
        &layer,
        default_proj4.as_deref(),
        options,
    )
}

fn read_sidecar_proj4(path: &Path) -> Result<Option<String>> {
    let sidecar_path = path.with_extension(PROJ4_EXTENSION);
    if !sidecar_path.exists() {
        return Ok(None);
    }
    let proj4 = fs::read_to_string(&sidecar_path)?.trim().to_string();
    log::debug!(
        "read sidecar proj4 (path={}, proj4='{}')",
        sidecar_path.display(),
        proj4
    );
    Ok((!proj4.is_empty()).then_some(proj4))
}

fn read<R: Read>(
    reader: R,
    source_name: &str,
    default_layer: &str,
    default_proj4: Option<&str>,
    options: &CsvReaderOptions,
) -> Result<GeoTable> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(GeoTableError::EmptyGeoTable(source_name.to_string()));
    }
    let rows = csv_reader
        .records()
        .collect::<std::result::Result<Vec<StringRecord>, csv::Error>>()?;
    let cells = |index: usize| -> Vec<&str> {
        rows.iter()
            .map(|row| row.get(index).unwrap_or_default())
            .collect()
    };
    let position = |name: &str| headers.iter().position(|header| header == name);

    let attribute_names: Vec<&str> = headers
        .iter()
        .map(String::as_str)
        .filter(|name| !RESERVED_COLUMNS.contains(name))
        .collect();
    let geometry_columns = resolve_geometry_columns(&attribute_names)
        .map_err(|error| GeoTableError::general(format!("{} ({})", error, source_name)))?;
    let geometry_names = geometry_columns.names();
    let field_names: Vec<&str> = attribute_names
        .iter()
        .copied()
        .filter(|name| !geometry_names.contains(name))
        .collect();

    let mut field_columns: Vec<std::vec::IntoIter<Value>> = field_names
        .iter()
        .map(|name| {
            let parse_dates = options.parse_dates.iter().any(|column| column == name);
            infer_column(&cells(position(*name).unwrap_or_default()), parse_dates).into_iter()
        })
        .collect();
    let geometry_columns_values: Vec<Vec<Value>> = geometry_names
        .iter()
        .map(|name| infer_column(&cells(position(*name).unwrap_or_default()), false))
        .collect();
    let layer_cells = position(GEOMETRY_LAYER).map(cells);
    let proj4_cells = position(GEOMETRY_PROJ4).map(cells);

    let mut records = Vec::with_capacity(rows.len());
    for index in 0..rows.len() {
        let values: Vec<Value> = field_columns
            .iter_mut()
            .map(|column| column.next().unwrap_or_default())
            .collect();
        let geometry_values: Vec<&Value> = geometry_columns_values
            .iter()
            .map(|column| &column[index])
            .collect();
        let geometry = geometry_columns.load(&geometry_values)?;
        let layer = layer_cells
            .as_ref()
            .map(|cells| cells[index].trim())
            .filter(|layer| !layer.is_empty())
            .unwrap_or(default_layer);
        let proj4 = proj4_cells
            .as_ref()
            .map(|cells| cells[index].trim())
            .filter(|proj4| !proj4.is_empty())
            .map(normalize_proj4)
            .transpose()?;
        records.push(Record {
            values,
            geometry,
            layer: Some(layer.to_string()),
            proj4,
        });
    }

    let default_proj4 = normalize_proj4(default_proj4.unwrap_or(LONGITUDE_LATITUDE_PROJ4))?;
    let target_proj4 = options
        .target_proj4
        .as_deref()
        .filter(|proj4| !proj4.trim().is_empty())
        .map(normalize_proj4)
        .transpose()?;
    if crs::has_single_crs(&records)? {
        let source_proj4 = records[0]
            .proj4
            .clone()
            .unwrap_or_else(|| default_proj4.clone());
        let transform = get_transform_geometry(&source_proj4, target_proj4.as_deref())?;
        let output_proj4 = target_proj4.unwrap_or(source_proj4);
        for record in records.iter_mut() {
            record.geometry = record
                .geometry
                .as_ref()
                .map(|geometry| geometry.reproject(&transform))
                .transpose()?;
            record.proj4 = Some(output_proj4.clone());
        }
    } else {
        let geometries =
            crs::transform_geometries(&records, &default_proj4, target_proj4.as_deref())?;
        for (record, geometry) in records.iter_mut().zip(geometries) {
            record.geometry = geometry;
            if let Some(target_proj4) = &target_proj4 {
                record.proj4 = Some(target_proj4.clone());
            } else if record.proj4.is_none() {
                record.proj4 = Some(default_proj4.clone());
            }
        }
    }
    log::debug!(
        "read csv (source={}, rows={}, geometry_columns={:?})",
        source_name,
        records.len(),
        geometry_names
    );
    GeoTable::try_new(field_names, records)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{fixture, UTM_PROJ4};
    use approx::assert_relative_eq;
    use geo::{point, Geometry, Point};

    #[test]
    fn test_read_lon_lat() {
        let table = read_csv_path(fixture("lat_lon.csv"), &Default::default()).unwrap();
        assert_eq!(table.len(), 1);
        let point = Point::try_from(table.records()[0].geometry.clone().unwrap()).unwrap();
        assert_eq!(point.x(), -83.7430378);
        assert_eq!(point.y(), 42.280826);
        assert_eq!(table.records()[0].layer.as_deref(), Some("lat_lon"));
        assert_eq!(
            table.records()[0].proj4.as_deref(),
            Some(LONGITUDE_LATITUDE_PROJ4)
        );
        assert_eq!(table.field_names(), vec!["name"]);
    }

    #[test]
    fn test_read_wkt() {
        let table = read_csv_path(fixture("wkt.csv"), &Default::default()).unwrap();
        assert_eq!(table.len(), 3);
        assert!(!table.has_field("wkt"));
        assert_eq!(
            table.column("count").unwrap(),
            vec![&Value::Int(1), &Value::Int(2), &Value::Null]
        );
        assert!(matches!(
            table.records()[1].geometry,
            Some(Geometry::LineString(_))
        ));
        assert!(matches!(
            table.records()[2].geometry,
            Some(Geometry::Polygon(_))
        ));
    }

    #[test]
    fn test_read_latitude_longitude_wkt() {
        let table =
            read_csv_path(fixture("latitude_longitude_wkt.csv"), &Default::default()).unwrap();
        assert_eq!(
            table.records()[0].geometry,
            Some(Geometry::Point(point!(x: -71.1, y: 42.3)))
        );
    }

    #[test]
    fn test_read_sidecar_proj4() {
        let table = read_csv_path(fixture("proj4_from_file.csv"), &Default::default()).unwrap();
        let expected = normalize_proj4(UTM_PROJ4).unwrap();
        assert_eq!(table.records()[0].proj4.as_deref(), Some(expected.as_str()));

        let options = CsvReaderOptions {
            target_proj4: Some(LONGITUDE_LATITUDE_PROJ4.to_string()),
            ..Default::default()
        };
        let table = read_csv_path(fixture("proj4_from_file.csv"), &options).unwrap();
        let point = Point::try_from(table.records()[0].geometry.clone().unwrap()).unwrap();
        assert_relative_eq!(point.x(), -81., epsilon = 1e-6);
    }

    #[test]
    fn test_read_proj4_per_row() {
        let options = CsvReaderOptions {
            target_proj4: Some(LONGITUDE_LATITUDE_PROJ4.to_string()),
            ..Default::default()
        };
        let table = read_csv_path(fixture("proj4_from_row.csv"), &options).unwrap();
        assert_eq!(table.len(), 2);
        for record in table.records() {
            let point = Point::try_from(record.geometry.clone().unwrap()).unwrap();
            assert_relative_eq!(point.x(), -81., epsilon = 1e-6);
            assert_eq!(record.proj4.as_deref(), Some(LONGITUDE_LATITUDE_PROJ4));
        }
        assert!(!table.has_field(GEOMETRY_PROJ4));
    }

    #[test]
    fn test_read_layer_column() {
        let text = "x,y,geometry_layer\n0,0,a\n1,1,\n";
        let table = read_csv(text.as_bytes(), &Default::default()).unwrap();
        assert_eq!(table.records()[0].layer.as_deref(), Some("a"));
        assert_eq!(table.records()[1].layer.as_deref(), Some(""));
    }

    #[test]
    fn test_read_delimiter_and_dates() {
        let text = "lon;lat;seen\n1;2;2020-01-02\n3;4;x\n";
        let options = CsvReaderOptions {
            delimiter: b';',
            parse_dates: vec!["seen".to_string()],
            ..Default::default()
        };
        let table = read_csv(text.as_bytes(), &options).unwrap();
        assert_eq!(
            table.column("seen").unwrap(),
            vec![
                &Value::Date(chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()),
                &Value::from("x")
            ]
        );
    }

    #[test]
    fn test_read_empty() {
        let error = read_csv("".as_bytes(), &Default::default()).unwrap_err();
        assert!(matches!(error, GeoTableError::EmptyGeoTable(_)));

        let table = read_csv("wkt,name\n".as_bytes(), &Default::default()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.field_names(), vec!["name"]);
    }

    #[test]
    fn test_read_bad_geometry() {
        let error = read_csv("wkt\nPOINT(0\n".as_bytes(), &Default::default()).unwrap_err();
        assert!(matches!(error, GeoTableError::General(_)));
        assert!(error.to_string().starts_with("wkt unparseable"));

        let error = read_csv("a,b\n1,2\n".as_bytes(), &Default::default()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "geometry columns expected (<reader>)"
        );
    }
}
