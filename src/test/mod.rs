use std::path::PathBuf;

use chrono::NaiveDate;
use geo::{point, Geometry};

use crate::algorithm::proj::LONGITUDE_LATITUDE_PROJ4;
use crate::table::{GeoTable, Record, Value};

pub(crate) const UTM_PROJ4: &str =
    "+proj=utm +zone=17 +ellps=WGS84 +datum=WGS84 +units=m +no_defs";

pub(crate) fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

/// One row holding a value of every attribute type the writers must handle.
pub(crate) fn geotable() -> GeoTable {
    let datetime = NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let columns = [
        ("float16", Value::Float(1.)),
        ("float32", Value::Float(1.)),
        ("float64", Value::Float(1.)),
        ("float_nan", Value::Float(f64::NAN)),
        ("int8", Value::Int(1)),
        ("int16", Value::Int(1)),
        ("int32", Value::Int(1)),
        ("int64", Value::Int(1)),
        ("bool", Value::Bool(true)),
        ("dt", Value::DateTime(datetime)),
        ("category", Value::from("vegetable")),
        ("object_dt", Value::DateTime(datetime)),
        ("object_st", Value::from("whee")),
    ];
    let record = Record::new(
        columns.iter().map(|(_, value)| value.clone()).collect(),
        Some(Geometry::Point(point!(x: 0., y: 0.))),
    )
    .with_layer("layer_name")
    .with_proj4(LONGITUDE_LATITUDE_PROJ4);
    GeoTable::try_new(columns.iter().map(|(name, _)| *name), vec![record]).unwrap()
}
