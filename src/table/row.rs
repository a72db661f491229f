use geo::Geometry;

use crate::table::draw::ColorfulGeometryCollection;
use crate::table::{GeoTable, Record, Value};

/// A read-only view of a single row of a [`GeoTable`].
#[derive(Debug, Clone, Copy)]
pub struct GeoRow<'a> {
    table: &'a GeoTable,
    index: usize,
}

impl<'a> GeoRow<'a> {
    pub(crate) fn new(table: &'a GeoTable, index: usize) -> Self {
        Self { table, index }
    }

    /// Position of this row in its table.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn record(&self) -> &'a Record {
        &self.table.records()[self.index]
    }

    /// The value of an attribute column, or `None` if the table has no such column.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        let index = self.table.field_index(name)?;
        self.record().values.get(index)
    }

    pub fn values(&self) -> &'a [Value] {
        &self.record().values
    }

    pub fn field_names(&self) -> Vec<&'a str> {
        self.table.field_names()
    }

    pub fn geometry(&self) -> Option<&'a Geometry> {
        self.record().geometry.as_ref()
    }

    pub fn layer(&self) -> Option<&'a str> {
        self.record().layer.as_deref()
    }

    pub fn proj4(&self) -> Option<&'a str> {
        self.record().proj4.as_deref()
    }

    /// Expand this row back into a one-row table with the same columns.
    pub fn to_table(&self) -> GeoTable {
        self.table.with_records(vec![self.record().clone()])
    }

    pub fn draw(&self) -> ColorfulGeometryCollection {
        ColorfulGeometryCollection::new(self.geometry().cloned().into_iter().collect(), vec![])
    }
}
