//! Render geometries as SVG fragments, optionally with one color per geometry.

use std::fmt;

use geo::{Coord, Geometry, LineString, Polygon};
use itertools::Itertools;

use crate::error::Result;
use crate::table::GeoTable;

const DEFAULT_COLOR: &str = "#66cc99";

/// A collection of geometries where each member may carry its own fill color.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorfulGeometryCollection {
    pub geometries: Vec<Geometry>,
    pub colors: Vec<String>,
}

impl ColorfulGeometryCollection {
    pub fn new(geometries: Vec<Geometry>, colors: Vec<String>) -> Self {
        Self { geometries, colors }
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// An SVG group with one element per geometry. Geometries without a color of their own use
    /// the default color.
    pub fn svg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ColorfulGeometryCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<g />");
        }
        f.write_str("<g>")?;
        for (index, geometry) in self.geometries.iter().enumerate() {
            let color = self
                .colors
                .get(index)
                .map(String::as_str)
                .unwrap_or(DEFAULT_COLOR);
            write_geometry(f, geometry, color)?;
        }
        f.write_str("</g>")
    }
}

fn format_points(coords: impl Iterator<Item = Coord>) -> String {
    coords.map(|coord| format!("{},{}", coord.x, coord.y)).join(" ")
}

fn ring_path(line_string: &LineString) -> String {
    format!("M {} z", format_points(line_string.coords().copied()).replacen(' ', " L ", 1))
}

fn polygon_path(polygon: &Polygon) -> String {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_path)
        .join(" ")
}

fn write_geometry<W: fmt::Write>(svg: &mut W, geometry: &Geometry, color: &str) -> fmt::Result {
    match geometry {
        Geometry::Point(point) => write!(
            svg,
            r##"<circle cx="{}" cy="{}" r="3.0" stroke="#555555" stroke-width="1.0" fill="{}" opacity="0.6" />"##,
            point.x(),
            point.y(),
            color
        ),
        Geometry::Line(line) => write!(
            svg,
            r#"<polyline fill="none" stroke="{}" stroke-width="2.0" points="{}" opacity="0.8" />"#,
            color,
            format_points([line.start, line.end].into_iter())
        ),
        Geometry::LineString(line_string) => write!(
            svg,
            r#"<polyline fill="none" stroke="{}" stroke-width="2.0" points="{}" opacity="0.8" />"#,
            color,
            format_points(line_string.coords().copied())
        ),
        Geometry::Polygon(polygon) => write!(
            svg,
            r##"<path fill-rule="evenodd" fill="{}" stroke="#555555" stroke-width="2.0" opacity="0.6" d="{}" />"##,
            color,
            polygon_path(polygon)
        ),
        Geometry::Rect(rect) => write_geometry(svg, &Geometry::Polygon(rect.to_polygon()), color),
        Geometry::Triangle(triangle) => {
            write_geometry(svg, &Geometry::Polygon(triangle.to_polygon()), color)
        }
        Geometry::MultiPoint(multi_point) => {
            write_group(svg, multi_point.iter().map(|x| Geometry::Point(*x)), color)
        }
        Geometry::MultiLineString(multi_line_string) => write_group(
            svg,
            multi_line_string.iter().cloned().map(Geometry::LineString),
            color,
        ),
        Geometry::MultiPolygon(multi_polygon) => {
            write_group(svg, multi_polygon.iter().cloned().map(Geometry::Polygon), color)
        }
        Geometry::GeometryCollection(collection) => {
            write_group(svg, collection.iter().cloned(), color)
        }
    }
}

fn write_group<W: fmt::Write>(
    svg: &mut W,
    geometries: impl Iterator<Item = Geometry>,
    color: &str,
) -> fmt::Result {
    svg.write_str("<g>")?;
    for geometry in geometries {
        write_geometry(svg, &geometry, color)?;
    }
    svg.write_str("</g>")
}

impl GeoTable {
    /// Collect the table's geometries, in longitude-latitude, for drawing.
    pub fn draw(&self) -> Result<ColorfulGeometryCollection> {
        let geometries = self
            .geometries(Some(crate::algorithm::proj::LONGITUDE_LATITUDE_PROJ4))?
            .into_iter()
            .flatten()
            .collect();
        Ok(ColorfulGeometryCollection::new(geometries, vec![]))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::geotable;
    use geo::{point, polygon, MultiPoint};

    #[test]
    fn test_svg() {
        assert_eq!(ColorfulGeometryCollection::default().svg(), "<g />");

        let collection =
            ColorfulGeometryCollection::new(vec![Geometry::Point(point!(x: 0., y: 0.))], vec![]);
        assert!(collection.svg().contains("circle"));
        assert!(collection.svg().contains(DEFAULT_COLOR));

        let collection = ColorfulGeometryCollection::new(
            vec![Geometry::Polygon(polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.)])],
            vec!["red".to_string()],
        );
        let svg = collection.svg();
        assert!(svg.contains(r#"fill="red""#));
        assert!(svg.contains("d=\"M 0,0 L 1,0 1,1 0,0 z\""));
    }

    #[test]
    fn test_svg_multi_geometry() {
        let multi_point = MultiPoint::new(vec![point!(x: 0., y: 0.), point!(x: 1., y: 1.)]);
        let collection =
            ColorfulGeometryCollection::new(vec![Geometry::MultiPoint(multi_point)], vec![]);
        let svg = collection.to_string();
        assert!(svg.starts_with("<g><g><circle"));
        assert_eq!(svg.matches("<circle").count(), 2);
        assert!(svg.ends_with("</g></g>"));
    }

    #[test]
    fn test_draw_table() {
        let collection = geotable().draw().unwrap();
        assert_eq!(collection.geometries.len(), 1);
        assert!(collection.svg().contains("circle"));
    }
}
