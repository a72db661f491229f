use std::collections::HashSet;

use geozero::{CoordDimensions, ToWkb};

use crate::error::Result;
use crate::table::GeoTable;

impl GeoTable {
    /// Keep only the first row of every group of rows whose geometries are byte-for-byte equal
    /// as well-known-binary. Rows without a geometry are always kept.
    pub fn drop_duplicate_geometries(&self) -> Result<Self> {
        let table = self.prepared(None)?;
        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut indices = Vec::with_capacity(table.len());
        for (index, record) in table.records().iter().enumerate() {
            match &record.geometry {
                Some(geometry) => {
                    if seen.insert(geometry.to_wkb(CoordDimensions::xy())?) {
                        indices.push(index);
                    }
                }
                None => indices.push(index),
            }
        }
        log::debug!(
            "dropped duplicate geometries (before={}, after={})",
            table.len(),
            indices.len()
        );
        table.take(&indices)
    }
}

#[cfg(test)]
mod test {
    use crate::table::{GeoTable, Value};
    use geo::{point, Geometry};
    use indexmap::indexmap;

    #[test]
    fn test_drop_duplicate_geometries() {
        let rows = [(0., 0.), (0., 0.), (0., 1.), (1., 2.)]
            .into_iter()
            .enumerate()
            .map(|(index, (lon, lat))| {
                indexmap! {
                    "name".to_string() => Value::Int(index as i64),
                    "lon".to_string() => Value::Float(lon),
                    "lat".to_string() => Value::Float(lat),
                }
            })
            .collect();
        let table = GeoTable::from_records(rows).unwrap();

        let deduplicated = table.drop_duplicate_geometries().unwrap();
        assert_eq!(deduplicated.len(), 3);
        assert_eq!(
            deduplicated.column("name").unwrap(),
            vec![&Value::Int(0), &Value::Int(2), &Value::Int(3)]
        );
        assert_eq!(
            deduplicated.records()[2].geometry,
            Some(Geometry::Point(point!(x: 1., y: 2.)))
        );
    }
}
