//! A row-oriented table of spatial features. Every row carries a geometry, the layer it belongs
//! to and the CRS of its geometry next to an arbitrary set of typed attribute columns.

use std::borrow::Cow;
use std::ops::Range;
use std::path::Path;

use geo::Geometry;
use indexmap::{IndexMap, IndexSet};

use crate::algorithm::proj::{normalize_proj4, LONGITUDE_LATITUDE_PROJ4};
use crate::error::{GeoTableError, Result};

pub mod columns;
pub mod crs;
pub mod draw;
mod row;
mod value;

pub use columns::{resolve_geometry_columns, AxisOrder, GeometryColumns};
pub use row::GeoRow;
pub use value::Value;
pub(crate) use value::infer_column;

/// Name of the implicit geometry column.
pub const GEOMETRY_OBJECT: &str = "geometry_object";
/// Name of the implicit layer column.
pub const GEOMETRY_LAYER: &str = "geometry_layer";
/// Name of the implicit CRS column.
pub const GEOMETRY_PROJ4: &str = "geometry_proj4";

/// The three implicit columns that are never part of [`GeoTable::field_names`].
pub const RESERVED_COLUMNS: [&str; 3] = [GEOMETRY_OBJECT, GEOMETRY_LAYER, GEOMETRY_PROJ4];

/// One spatial feature as stored in a [`GeoTable`].
///
/// `values` lines up with the table's field names. A missing `layer` or `proj4` means the row
/// never had one assigned; defaults are filled in by [`GeoTable::prepared`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub values: Vec<Value>,
    pub geometry: Option<Geometry>,
    pub layer: Option<String>,
    pub proj4: Option<String>,
}

impl Record {
    pub fn new(values: Vec<Value>, geometry: Option<Geometry>) -> Self {
        Self {
            values,
            geometry,
            layer: None,
            proj4: None,
        }
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn with_proj4(mut self, proj4: impl Into<String>) -> Self {
        self.proj4 = Some(proj4.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoTable {
    field_names: IndexSet<String>,
    records: Vec<Record>,
}

impl GeoTable {
    /// An empty table with the given attribute columns.
    pub fn new<S: Into<String>>(field_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            field_names: field_names
                .into_iter()
                .map(Into::into)
                .filter(|name: &String| !RESERVED_COLUMNS.contains(&name.as_str()))
                .collect(),
            records: Vec::new(),
        }
    }

    pub fn try_new<S: Into<String>>(
        field_names: impl IntoIterator<Item = S>,
        records: Vec<Record>,
    ) -> Result<Self> {
        let mut table = Self::new(field_names);
        for record in records {
            table.push(record)?;
        }
        Ok(table)
    }

    /// Build a table from loosely structured rows.
    ///
    /// Columns are the union of all keys in first-seen order and a key missing from a row is
    /// null. String values under `geometry_layer` and `geometry_proj4` are lifted into the
    /// implicit columns. Geometries are derived from geometry-encoding columns (see
    /// [`resolve_geometry_columns`]) by [`GeoTable::prepared`].
    pub fn from_records(rows: Vec<IndexMap<String, Value>>) -> Result<Self> {
        let field_names: IndexSet<String> = rows
            .iter()
            .flat_map(|row| row.keys())
            .filter(|name| !RESERVED_COLUMNS.contains(&name.as_str()))
            .cloned()
            .collect();
        let records = rows
            .into_iter()
            .map(|mut row| {
                let reserved_text = |value: Option<Value>| match value {
                    Some(Value::Null) | None => None,
                    Some(value) => Some(value.to_string()),
                };
                let layer = reserved_text(row.shift_remove(GEOMETRY_LAYER));
                let proj4 = reserved_text(row.shift_remove(GEOMETRY_PROJ4));
                let values = field_names
                    .iter()
                    .map(|name| row.shift_remove(name).unwrap_or_default())
                    .collect();
                Record {
                    values,
                    geometry: None,
                    layer,
                    proj4,
                }
            })
            .collect();
        Ok(Self {
            field_names,
            records,
        })
    }

    /// Append a record, which must have one value per field.
    pub fn push(&mut self, record: Record) -> Result<()> {
        if record.values.len() != self.field_names.len() {
            return Err(GeoTableError::general(format!(
                "record width mismatch (expected={}, actual={})",
                self.field_names.len(),
                record.values.len()
            )));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attribute column names, excluding the implicit geometry columns.
    pub fn field_names(&self) -> Vec<&str> {
        self.field_names.iter().map(String::as_str).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_names.contains(name)
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.field_names.get_index_of(name)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Mutable access to the rows. Each record must keep one value per field.
    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    /// A read-only view of one row.
    pub fn row(&self, index: usize) -> Option<GeoRow<'_>> {
        (index < self.len()).then(|| GeoRow::new(self, index))
    }

    pub fn iter(&self) -> impl Iterator<Item = GeoRow<'_>> {
        (0..self.len()).map(|index| GeoRow::new(self, index))
    }

    /// A new table holding the rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        let records = indices
            .iter()
            .map(|&index| {
                self.records.get(index).cloned().ok_or_else(|| {
                    GeoTableError::general(format!("row index out of range ({})", index))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.with_records(records))
    }

    /// A new table holding a contiguous range of rows.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.with_records(self.records[start..end].to_vec())
    }

    /// A new table holding the rows for which `predicate` is true.
    pub fn filter<F: FnMut(&GeoRow) -> bool>(&self, mut predicate: F) -> Self {
        let records = self
            .iter()
            .filter(|row| predicate(row))
            .map(|row| row.record().clone())
            .collect();
        self.with_records(records)
    }

    pub(crate) fn with_records(&self, records: Vec<Record>) -> Self {
        Self {
            field_names: self.field_names.clone(),
            records,
        }
    }

    /// The values of one attribute column in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.field_index(name)?;
        Some(
            self.records
                .iter()
                .map(|record| &record.values[index])
                .collect(),
        )
    }

    /// Add or replace an attribute column in place.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if RESERVED_COLUMNS.contains(&name) {
            return Err(GeoTableError::general(format!(
                "column reserved (column_name='{}')",
                name
            )));
        }
        if values.len() != self.len() {
            return Err(GeoTableError::general(format!(
                "column length mismatch (column_name='{}', expected={}, actual={})",
                name,
                self.len(),
                values.len()
            )));
        }
        match self.field_index(name) {
            Some(index) => {
                for (record, value) in self.records.iter_mut().zip(values) {
                    record.values[index] = value;
                }
            }
            None => {
                self.field_names.insert(name.to_string());
                for (record, value) in self.records.iter_mut().zip(values) {
                    record.values.push(value);
                }
            }
        }
        Ok(())
    }

    /// A new table without the given attribute columns. Unknown names are ignored.
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let keep: Vec<usize> = self
            .field_names
            .iter()
            .enumerate()
            .filter(|(_, field_name)| !names.iter().any(|name| name.as_ref() == *field_name))
            .map(|(index, _)| index)
            .collect();
        let field_names = keep
            .iter()
            .map(|&index| self.field_names[index].clone())
            .collect();
        let records = self
            .records
            .iter()
            .map(|record| Record {
                values: keep
                    .iter()
                    .map(|&index| record.values[index].clone())
                    .collect(),
                ..record.clone()
            })
            .collect();
        Self {
            field_names,
            records,
        }
    }

    /// Stack tables vertically. Columns are unioned and missing values are null.
    pub fn concat(tables: impl IntoIterator<Item = GeoTable>) -> Self {
        let tables: Vec<GeoTable> = tables.into_iter().collect();
        let field_names: IndexSet<String> = tables
            .iter()
            .flat_map(|table| table.field_names.iter().cloned())
            .collect();
        let mut records = Vec::with_capacity(tables.iter().map(GeoTable::len).sum());
        for table in tables {
            let positions: Vec<Option<usize>> = field_names
                .iter()
                .map(|name| table.field_index(name))
                .collect();
            for mut record in table.records {
                record.values = positions
                    .iter()
                    .map(|position| {
                        position
                            .map(|index| std::mem::take(&mut record.values[index]))
                            .unwrap_or_default()
                    })
                    .collect();
                records.push(record);
            }
        }
        Self {
            field_names,
            records,
        }
    }

    /// Whether all rows share one CRS. See [`crs::has_single_crs`].
    pub fn has_single_crs(&self) -> Result<bool> {
        crs::has_single_crs(&self.records)
    }

    /// Geometries in row order, reprojected to `target_proj4` when given.
    ///
    /// Rows without a CRS are taken to be in longitude-latitude.
    pub fn geometries(&self, target_proj4: Option<&str>) -> Result<Vec<Option<Geometry>>> {
        let table = self.prepared(None)?;
        crs::transform_geometries(table.records(), LONGITUDE_LATITUDE_PROJ4, target_proj4)
    }

    /// A new table whose geometries are all expressed in `target_proj4`.
    pub fn to_proj4(&self, target_proj4: &str) -> Result<Self> {
        let table = self.prepared(None)?;
        let target_proj4 = normalize_proj4(target_proj4)?;
        let geometries =
            crs::transform_geometries(table.records(), LONGITUDE_LATITUDE_PROJ4, Some(&target_proj4))?;
        let records = table
            .records
            .iter()
            .zip(geometries)
            .map(|(record, geometry)| Record {
                geometry,
                proj4: Some(target_proj4.clone()),
                ..record.clone()
            })
            .collect();
        Ok(self.with_records(records))
    }

    /// Guarantee that the implicit columns hold usable values.
    ///
    /// A missing CRS becomes longitude-latitude and every CRS is normalized. A missing layer
    /// becomes the file stem of `target_path`, or the empty string. When no row has a geometry
    /// and the attribute columns encode geometries, those columns are parsed into geometries
    /// and dropped. Tables that need none of this are borrowed rather than copied.
    pub fn prepared(&self, target_path: Option<&Path>) -> Result<Cow<'_, GeoTable>> {
        let derive_geometries = !self.is_empty()
            && self.records.iter().all(|record| record.geometry.is_none())
            && resolve_geometry_columns(&self.field_names()).is_ok();
        let fill_defaults = self.records.iter().any(|record| {
            record.layer.is_none()
                || record
                    .proj4
                    .as_deref()
                    .map_or(true, |proj4| normalize_proj4(proj4).ok().as_deref() != Some(proj4))
        });
        if !derive_geometries && !fill_defaults {
            return Ok(Cow::Borrowed(self));
        }

        let default_layer = target_path
            .and_then(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut table = if derive_geometries {
            self.derive_geometries()?
        } else {
            self.clone()
        };
        for record in table.records.iter_mut() {
            if record.layer.is_none() {
                record.layer = Some(default_layer.clone());
            }
            record.proj4 = Some(match record.proj4.as_deref() {
                Some(proj4) => normalize_proj4(proj4)?,
                None => LONGITUDE_LATITUDE_PROJ4.to_string(),
            });
        }
        Ok(Cow::Owned(table))
    }

    fn derive_geometries(&self) -> Result<Self> {
        let geometry_columns = resolve_geometry_columns(&self.field_names())?;
        let positions = geometry_columns
            .names()
            .iter()
            .filter_map(|name| self.field_index(name))
            .collect::<Vec<_>>();
        let mut table = self.drop_columns(&geometry_columns.names());
        for (record, source) in table.records.iter_mut().zip(&self.records) {
            let values: Vec<&Value> = positions.iter().map(|&index| &source.values[index]).collect();
            record.geometry = geometry_columns.load(&values)?;
        }
        Ok(table)
    }
}

impl<'a> IntoIterator for &'a GeoTable {
    type Item = GeoRow<'a>;
    type IntoIter = Box<dyn Iterator<Item = GeoRow<'a>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{geotable, UTM_PROJ4};
    use geo::point;
    use indexmap::indexmap;

    #[test]
    fn test_field_names() {
        let table = geotable();
        assert!(!table.field_names().contains(&GEOMETRY_OBJECT));
        assert!(table.field_names().contains(&"category"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_row_and_slices() {
        let table = geotable();
        let row = table.row(0).unwrap();
        assert_eq!(row.get("category"), Some(&Value::from("vegetable")));
        assert!(table.row(1).is_none());

        let sliced = table.slice(0..5);
        assert_eq!(sliced.len(), 1);
        assert!(table.slice(1..5).is_empty());
        assert_eq!(table.take(&[0, 0]).unwrap().len(), 2);
        assert!(table.take(&[3]).is_err());
        assert!(table.filter(|row| row.get("int8") == Some(&Value::Int(2))).is_empty());
    }

    #[test]
    fn test_from_records() {
        let table = GeoTable::from_records(vec![
            indexmap! {
                "lon".to_string() => Value::Float(0.),
                "lat".to_string() => Value::Float(1.),
                "geometry_layer".to_string() => Value::from("a"),
            },
            indexmap! {
                "lat".to_string() => Value::Float(3.),
                "lon".to_string() => Value::Float(2.),
                "name".to_string() => Value::from("b"),
            },
        ])
        .unwrap();
        assert_eq!(table.field_names(), vec!["lon", "lat", "name"]);
        assert_eq!(table.records()[0].values[2], Value::Null);
        assert_eq!(table.records()[0].layer.as_deref(), Some("a"));

        let prepared = table.prepared(Some(Path::new("/tmp/b.csv"))).unwrap();
        assert_eq!(prepared.field_names(), vec!["name"]);
        assert_eq!(
            prepared.records()[1].geometry,
            Some(Geometry::Point(point!(x: 2., y: 3.)))
        );
        assert_eq!(prepared.records()[0].layer.as_deref(), Some("a"));
        assert_eq!(prepared.records()[1].layer.as_deref(), Some("b"));
        assert_eq!(
            prepared.records()[1].proj4.as_deref(),
            Some(LONGITUDE_LATITUDE_PROJ4)
        );
    }

    #[test]
    fn test_prepared_borrows_complete_tables() {
        let table = geotable();
        assert!(matches!(table.prepared(None).unwrap(), Cow::Borrowed(_)));

        let empty = GeoTable::new(["a"]);
        assert!(matches!(empty.prepared(None).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_set_and_drop_columns() {
        let mut table = geotable();
        table.set_column("extra", vec![Value::Int(7)]).unwrap();
        assert_eq!(table.column("extra").unwrap(), vec![&Value::Int(7)]);
        assert!(table.set_column("extra", vec![]).is_err());
        assert!(table.set_column(GEOMETRY_LAYER, vec![Value::Null]).is_err());

        let dropped = table.drop_columns(&["extra", "missing"]);
        assert!(!dropped.has_field("extra"));
        assert!(table.has_field("extra"));
    }

    #[test]
    fn test_concat() {
        let a = GeoTable::try_new(["x"], vec![Record::new(vec![Value::Int(1)], None)]).unwrap();
        let b = GeoTable::try_new(["y"], vec![Record::new(vec![Value::Int(2)], None)]).unwrap();
        let table = GeoTable::concat([a, b]);
        assert_eq!(table.field_names(), vec!["x", "y"]);
        assert_eq!(table.records()[0].values, vec![Value::Int(1), Value::Null]);
        assert_eq!(table.records()[1].values, vec![Value::Null, Value::Int(2)]);
    }

    #[test]
    fn test_geometries_across_crs() {
        let lonlat = Record::new(vec![], Some(Geometry::Point(point!(x: -81., y: 0.))))
            .with_proj4(LONGITUDE_LATITUDE_PROJ4);
        let utm = Record::new(vec![], Some(Geometry::Point(point!(x: 500000., y: 0.))))
            .with_proj4(UTM_PROJ4);
        let table = GeoTable::try_new(Vec::<String>::new(), vec![lonlat, utm]).unwrap();

        let geometries = table.geometries(Some(UTM_PROJ4)).unwrap();
        let first = geo::Point::try_from(geometries[0].clone().unwrap()).unwrap();
        let second = geo::Point::try_from(geometries[1].clone().unwrap()).unwrap();
        approx::assert_relative_eq!(first.x(), 500000., epsilon = 1e-3);
        assert_eq!(second, point!(x: 500000., y: 0.));

        let reprojected = table.to_proj4(UTM_PROJ4).unwrap();
        assert!(reprojected
            .records()
            .iter()
            .all(|record| record.proj4.as_deref() == Some(normalize_proj4(UTM_PROJ4).unwrap().as_str())));
    }
}
