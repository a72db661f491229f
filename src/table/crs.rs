//! Reconcile the per-row CRS of a table: decide whether rows share one CRS and transform rows
//! in groups of equal CRS.

use geo::Geometry;
use indexmap::IndexMap;

use crate::algorithm::proj::{get_transform_geometry, normalize_proj4, Reproject};
use crate::error::Result;
use crate::table::Record;

/// Whether every row shares a single CRS.
///
/// True when no row carries its own CRS or all rows carry the same normalized CRS. An empty set
/// of rows is *not* single-CRS, so that callers take the per-row path with their default CRS.
pub fn has_single_crs(records: &[Record]) -> Result<bool> {
    if records.is_empty() {
        return Ok(false);
    }
    if records.iter().all(|record| record.proj4.is_none()) {
        return Ok(true);
    }
    let mut proj4s = records.iter().map(|record| match &record.proj4 {
        Some(proj4) => normalize_proj4(proj4).map(Some),
        None => Ok(None),
    });
    let first = proj4s.next().transpose()?.flatten();
    for proj4 in proj4s {
        if proj4? != first {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Partition row positions by normalized CRS, in order of first appearance. Rows without a CRS
/// fall into the `default_proj4` group.
pub fn group_by_crs(
    records: &[Record],
    default_proj4: &str,
) -> Result<IndexMap<String, Vec<usize>>> {
    let default_proj4 = normalize_proj4(default_proj4)?;
    let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (index, record) in records.iter().enumerate() {
        let proj4 = match &record.proj4 {
            Some(proj4) => normalize_proj4(proj4)?,
            None => default_proj4.clone(),
        };
        groups.entry(proj4).or_default().push(index);
    }
    Ok(groups)
}

/// Transform every row's geometry to `target_proj4`, building one transform per CRS group and
/// returning the geometries in original row order.
///
/// With no target the geometries are returned unchanged.
pub fn transform_geometries(
    records: &[Record],
    default_proj4: &str,
    target_proj4: Option<&str>,
) -> Result<Vec<Option<Geometry>>> {
    let mut geometries: Vec<Option<Geometry>> = vec![None; records.len()];
    for (source_proj4, indices) in group_by_crs(records, default_proj4)? {
        let transform = get_transform_geometry(&source_proj4, target_proj4)?;
        for index in indices {
            geometries[index] = records[index]
                .geometry
                .as_ref()
                .map(|geometry| geometry.reproject(&transform))
                .transpose()?;
        }
    }
    Ok(geometries)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algorithm::proj::LONGITUDE_LATITUDE_PROJ4;
    use crate::test::UTM_PROJ4;
    use geo::point;

    fn record(proj4: Option<&str>) -> Record {
        Record {
            geometry: Some(Geometry::Point(point!(x: -81., y: 0.))),
            proj4: proj4.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_has_single_crs() {
        assert!(!has_single_crs(&[]).unwrap());
        assert!(has_single_crs(&[record(None), record(None)]).unwrap());
        assert!(has_single_crs(&[
            record(Some(LONGITUDE_LATITUDE_PROJ4)),
            record(Some("+proj=longlat  +datum=WGS84 +no_defs ")),
        ])
        .unwrap());
        assert!(!has_single_crs(&[record(Some(LONGITUDE_LATITUDE_PROJ4)), record(None)]).unwrap());
        assert!(
            !has_single_crs(&[record(Some(LONGITUDE_LATITUDE_PROJ4)), record(Some(UTM_PROJ4))])
                .unwrap()
        );
    }

    #[test]
    fn test_group_by_crs() {
        let records = [
            record(Some(UTM_PROJ4)),
            record(None),
            record(Some(UTM_PROJ4)),
            record(Some(LONGITUDE_LATITUDE_PROJ4)),
        ];
        let groups = group_by_crs(&records, LONGITUDE_LATITUDE_PROJ4).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![0, 2]);
        assert_eq!(groups[1], vec![1, 3]);
    }

    #[test]
    fn test_transform_geometries_keeps_order() {
        let mut utm = record(Some(UTM_PROJ4));
        utm.geometry = Some(Geometry::Point(point!(x: 500000., y: 0.)));
        let mut empty = record(None);
        empty.geometry = None;
        let records = [record(None), utm, empty];

        let geometries =
            transform_geometries(&records, LONGITUDE_LATITUDE_PROJ4, Some(LONGITUDE_LATITUDE_PROJ4))
                .unwrap();
        assert_eq!(geometries.len(), 3);
        assert_eq!(geometries[0], records[0].geometry);
        let point = geo::Point::try_from(geometries[1].clone().unwrap()).unwrap();
        approx::assert_relative_eq!(point.x(), -81., epsilon = 1e-6);
        assert!(geometries[2].is_none());
    }
}
