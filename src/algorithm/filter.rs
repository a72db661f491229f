use geo::{Geometry, Intersects, Polygon, Rect};

use crate::algorithm::proj::{get_transform_geometry, Reproject, LONGITUDE_LATITUDE_PROJ4};
use crate::error::Result;
use crate::table::crs::group_by_crs;
use crate::table::GeoTable;

/// Build the polygon of a `(min_x, min_y, max_x, max_y)` bounding box.
pub fn bounding_box_polygon(bounding_box: (f64, f64, f64, f64)) -> Polygon {
    let (min_x, min_y, max_x, max_y) = bounding_box;
    Rect::new((min_x, min_y), (max_x, max_y)).to_polygon()
}

impl GeoTable {
    /// Keep the rows whose geometry intersects `bounds`, which is expressed in `bounds_proj4`
    /// (longitude-latitude when missing). The bounds are reprojected once per CRS group.
    ///
    /// Rows without a geometry are dropped.
    pub fn filter_intersecting(&self, bounds: &Geometry, bounds_proj4: Option<&str>) -> Result<Self> {
        let table = self.prepared(None)?;
        let bounds_proj4 = bounds_proj4.unwrap_or(LONGITUDE_LATITUDE_PROJ4);
        let mut keep = vec![false; table.len()];
        for (proj4, indices) in group_by_crs(table.records(), LONGITUDE_LATITUDE_PROJ4)? {
            let transform = get_transform_geometry(bounds_proj4, Some(&proj4))?;
            let bounds = bounds.reproject(&transform)?;
            for index in indices {
                keep[index] = table.records()[index]
                    .geometry
                    .as_ref()
                    .is_some_and(|geometry| geometry.intersects(&bounds));
            }
        }
        let indices: Vec<usize> = (0..table.len()).filter(|&index| keep[index]).collect();
        table.take(&indices)
    }
}
