//! Universal Transverse Mercator zones.

use geo::{Centroid, GeometryCollection};

use crate::algorithm::proj::{normalize_proj4, LONGITUDE_LATITUDE_PROJ4};
use crate::error::{GeoTableError, Result};
use crate::io::load::{load, LoadOptions};
use crate::table::GeoTable;

const ZONE_LETTERS: &[u8] = b"CDEFGHJKLMNPQRSTUVWXX";

/// Normalized proj4 string of a UTM zone. Letters before `N` are in the southern hemisphere.
pub fn get_utm_proj4(zone_number: u8, zone_letter: char) -> Result<String> {
    if !(1..=60).contains(&zone_number) {
        return Err(GeoTableError::general(format!(
            "utm zone number out of range ({})",
            zone_number
        )));
    }
    let south = if zone_letter.to_ascii_uppercase() < 'N' {
        "+south "
    } else {
        ""
    };
    normalize_proj4(&format!(
        "+proj=utm +zone={} {}+ellps=WGS84 +datum=WGS84 +units=m +no_defs",
        zone_number, south
    ))
}

/// The UTM zone number and letter containing a longitude-latitude position, including the
/// Norway and Svalbard exceptions.
pub fn utm_zone(longitude: f64, latitude: f64) -> Result<(u8, char)> {
    if !(-80.0..=84.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(GeoTableError::general(format!(
            "position outside utm coverage (longitude={}, latitude={})",
            longitude, latitude
        )));
    }
    let letter_index = (((latitude + 80.0) / 8.0).floor() as usize).min(ZONE_LETTERS.len() - 1);
    let zone_letter = ZONE_LETTERS[letter_index] as char;

    let mut zone_number = (((longitude + 180.0) / 6.0).floor() as u8 + 1).min(60);
    if (56.0..64.0).contains(&latitude) && (3.0..12.0).contains(&longitude) {
        zone_number = 32;
    }
    if (72.0..=84.0).contains(&latitude) && longitude >= 0.0 {
        zone_number = match longitude {
            x if x < 9.0 => 31,
            x if x < 21.0 => 33,
            x if x < 33.0 => 35,
            x if x < 42.0 => 37,
            _ => zone_number,
        };
    }
    Ok((zone_number, zone_letter))
}

impl GeoTable {
    /// The UTM CRS of the zone containing the centroid of all geometries.
    pub fn get_utm_proj4(&self) -> Result<String> {
        let geometries: GeometryCollection = self
            .geometries(Some(LONGITUDE_LATITUDE_PROJ4))?
            .into_iter()
            .flatten()
            .collect();
        let centroid = geometries
            .centroid()
            .ok_or_else(|| GeoTableError::EmptyGeoTable("no geometries".to_string()))?;
        let (zone_number, zone_letter) = utm_zone(centroid.x(), centroid.y())?;
        get_utm_proj4(zone_number, zone_letter)
    }

    /// Load a source and return the UTM CRS that best fits it.
    pub fn load_utm_proj4(source: &str) -> Result<String> {
        load(source, &LoadOptions::default())?.get_utm_proj4()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{geotable, UTM_PROJ4};

    #[test]
    fn test_utm_zone() {
        assert_eq!(utm_zone(-83.7430378, 42.280826).unwrap(), (17, 'T'));
        assert_eq!(utm_zone(-70., -33.).unwrap(), (19, 'H'));
        assert_eq!(utm_zone(5., 60.).unwrap(), (32, 'V'));
        assert_eq!(utm_zone(180., 0.).unwrap(), (60, 'N'));
        assert!(utm_zone(0., 85.).is_err());
    }

    #[test]
    fn test_get_utm_proj4() {
        assert_eq!(
            get_utm_proj4(17, 'T').unwrap(),
            normalize_proj4(UTM_PROJ4).unwrap()
        );
        assert!(get_utm_proj4(19, 'H').unwrap().contains("+south"));
        assert!(get_utm_proj4(0, 'T').is_err());
    }

    #[test]
    fn test_table_utm_proj4() {
        let proj4 = geotable().get_utm_proj4().unwrap();
        assert!(proj4.contains("+zone=31"));
        assert!(!proj4.contains("+south"));

        let empty = GeoTable::new(["a"]);
        assert!(matches!(
            empty.get_utm_proj4(),
            Err(GeoTableError::EmptyGeoTable(_))
        ));
    }

    #[test]
    fn test_load_utm_proj4() {
        let path = crate::test::fixture("lat_lon.csv");
        let proj4 = GeoTable::load_utm_proj4(path.to_str().unwrap()).unwrap();
        assert!(proj4.contains("+zone=17"));
    }
}
