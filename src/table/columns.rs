//! Detect which attribute columns encode geometry and turn their values into geometries.

use geo::{Coord, Geometry, MapCoords, Point};
use geozero::wkt::WktStr;
use geozero::ToGeo;

use crate::error::{GeoTableError, Result};
use crate::table::Value;

/// Axis order of the coordinates inside a well-known-text column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// Conventional x, y (longitude, latitude) order.
    LonLat,
    /// The column was authored with latitude first; x and y must be swapped after parsing.
    LatLon,
}

/// The column(s) of a table that encode its geometries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryColumns {
    Wkt {
        column: String,
        axis_order: AxisOrder,
    },
    Coordinates {
        x_column: String,
        y_column: String,
    },
}

impl GeometryColumns {
    /// The one or two column names, x before y.
    pub fn names(&self) -> Vec<&str> {
        match self {
            GeometryColumns::Wkt { column, .. } => vec![column.as_str()],
            GeometryColumns::Coordinates { x_column, y_column } => {
                vec![x_column.as_str(), y_column.as_str()]
            }
        }
    }

    /// Build a geometry from the values of [`GeometryColumns::names`], in the same order.
    ///
    /// Null values produce no geometry.
    pub fn load(&self, values: &[&Value]) -> Result<Option<Geometry>> {
        match self {
            GeometryColumns::Wkt { axis_order, .. } => {
                let value = match values.first() {
                    Some(value) if !value.is_null() => *value,
                    _ => return Ok(None),
                };
                let text = value.to_string();
                let geometry = WktStr(&text)
                    .to_geo()
                    .map_err(|_| GeoTableError::general(format!("wkt unparseable ({})", text)))?;
                Ok(Some(match axis_order {
                    AxisOrder::LonLat => geometry,
                    AxisOrder::LatLon => swap_xy(&geometry),
                }))
            }
            GeometryColumns::Coordinates { .. } => {
                let (x, y) = match values {
                    [x, y] => (*x, *y),
                    _ => return Err(GeoTableError::general("coordinate pair expected")),
                };
                if x.is_null() || y.is_null() {
                    return Ok(None);
                }
                match (x.as_f64(), y.as_f64()) {
                    (Some(x), Some(y)) => Ok(Some(Geometry::Point(Point::new(x, y)))),
                    _ => Err(GeoTableError::general(format!(
                        "coordinates unparseable ({}, {})",
                        x, y
                    ))),
                }
            }
        }
    }
}

fn swap_xy(geometry: &Geometry) -> Geometry {
    geometry.map_coords(|Coord { x, y }| Coord { x: y, y: x })
}

fn simplify_name(column_name: &str) -> String {
    column_name.to_lowercase().replace('_', "")
}

/// Find the columns that encode geometry, matching case-insensitively and ignoring underscores.
///
/// In order of precedence: a well-known-text column (`wkt`, or a name ending in
/// `longitude_latitude_wkt` / `latitude_longitude_wkt`), then the coordinate pairs
/// `longitude`/`latitude`, `*longitude`/`*latitude`, `lon`/`lat` and `x`/`y`.
pub fn resolve_geometry_columns<S: AsRef<str>>(column_names: &[S]) -> Result<GeometryColumns> {
    let simplified: Vec<(&str, String)> = column_names
        .iter()
        .map(|name| (name.as_ref(), simplify_name(name.as_ref())))
        .collect();

    let find_wkt = |matches: &dyn Fn(&str) -> bool| {
        simplified
            .iter()
            .find(|(_, simple)| matches(simple.as_str()))
            .map(|(name, _)| name.to_string())
    };
    if let Some(column) = find_wkt(&|simple| simple == "wkt") {
        return Ok(GeometryColumns::Wkt {
            column,
            axis_order: AxisOrder::LonLat,
        });
    }
    if let Some(column) =
        find_wkt(&|simple| simple.ends_with("longitudelatitudewkt") || simple == "lonlatwkt")
    {
        return Ok(GeometryColumns::Wkt {
            column,
            axis_order: AxisOrder::LonLat,
        });
    }
    if let Some(column) =
        find_wkt(&|simple| simple.ends_with("latitudelongitudewkt") || simple == "latlonwkt")
    {
        return Ok(GeometryColumns::Wkt {
            column,
            axis_order: AxisOrder::LatLon,
        });
    }

    let find_pair = |matches_x: &dyn Fn(&str) -> bool, matches_y: &dyn Fn(&str) -> bool| {
        let x_column = simplified.iter().find(|(_, simple)| matches_x(simple.as_str()));
        let y_column = simplified.iter().find(|(_, simple)| matches_y(simple.as_str()));
        match (x_column, y_column) {
            (Some((x_column, _)), Some((y_column, _))) => Some(GeometryColumns::Coordinates {
                x_column: x_column.to_string(),
                y_column: y_column.to_string(),
            }),
            _ => None,
        }
    };
    find_pair(&|simple| simple == "longitude", &|simple| simple == "latitude")
        .or_else(|| {
            find_pair(&|simple| simple.ends_with("longitude"), &|simple| {
                simple.ends_with("latitude")
            })
        })
        .or_else(|| find_pair(&|simple| simple == "lon", &|simple| simple == "lat"))
        .or_else(|| find_pair(&|simple| simple == "x", &|simple| simple == "y"))
        .ok_or_else(|| GeoTableError::general("geometry columns expected"))
}
