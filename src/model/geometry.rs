//! GML geometries: `gml:Point`, `gml:LineString` and `gml:Polygon`.
//!
//! Coordinates are plain planar pairs; no reprojection happens here. Only the
//! exterior ring of a polygon is modelled, interior rings are skipped on read.

use geo::{Coord, LineString, Point, Polygon};
use std::io::BufRead;
use tracing::debug;

use crate::error::{ImaerError, Result};
use crate::xml::{format_number_list, parse_number_list, Element, Tag, XmlCursor};

pub const SRS_NAME_PREFIX: &str = "urn:ogc:def:crs:EPSG::";

fn srs_name(epsg_id: u32) -> String {
    format!("{SRS_NAME_PREFIX}{epsg_id}")
}

/// EPSG code from the last `:` separated segment of an `srsName`.
pub fn epsg_from_srs_name(srs_name: &str) -> Option<u32> {
    let code = srs_name.rsplit(':').next()?;
    match code.trim().parse() {
        Ok(epsg) => Some(epsg),
        Err(_) => {
            debug!("No EPSG code in srsName '{}'", srs_name);
            None
        }
    }
}

fn geometry_element(
    name: &str,
    epsg_id: Option<u32>,
    gml_id: Option<&str>,
    default_gml_id: &str,
) -> Result<Element> {
    let epsg_id = epsg_id.ok_or_else(|| {
        ImaerError::invalid_feature(name, format!("{default_gml_id} has no EPSG code"))
    })?;
    Ok(Element::new(name)
        .with_attr("srsName", srs_name(epsg_id))
        .with_attr("gml:id", gml_id.unwrap_or(default_gml_id)))
}

fn read_header(tag: &Tag) -> (Option<u32>, Option<String>) {
    let epsg_id = tag.attr("srsName").and_then(epsg_from_srs_name);
    let gml_id = tag.attr("gml:id").map(str::to_string);
    (epsg_id, gml_id)
}

fn pairs(element: &str, values: Vec<f64>) -> Result<Vec<Coord<f64>>> {
    if values.len() % 2 != 0 {
        return Err(ImaerError::invalid_value(
            element,
            format_number_list(values),
            "odd number of ordinates",
        ));
    }
    Ok(values
        .chunks_exact(2)
        .map(|xy| Coord { x: xy[0], y: xy[1] })
        .collect())
}

fn flatten(coords: &[Coord<f64>]) -> String {
    format_number_list(coords.iter().flat_map(|c| [c.x, c.y]))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GmlPoint {
    pub epsg_id: Option<u32>,
    pub gml_id: Option<String>,
    pub x: f64,
    pub y: f64,
}

impl GmlPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            epsg_id: None,
            gml_id: None,
            x,
            y,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn to_element(&self, default_gml_id: &str) -> Result<Element> {
        Ok(
            geometry_element("gml:Point", self.epsg_id, self.gml_id.as_deref(), default_gml_id)?
                .with_child(Element::text_element(
                    "gml:pos",
                    format_number_list([self.x, self.y]),
                )),
        )
    }

    /// Reads a `gml:Point`; its `gml:pos` must hold exactly two numbers.
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Self> {
        let (epsg_id, gml_id) = read_header(tag);
        let mut pos = None;
        cursor.read_children(tag, |cursor, child| {
            if child.local_name() != "pos" {
                return Ok(false);
            }
            let text = cursor.read_text(child)?;
            let values = parse_number_list(child.name(), &text)?;
            if values.len() != 2 {
                return Err(ImaerError::invalid_value(
                    child.name(),
                    text,
                    "expected exactly two coordinates",
                ));
            }
            pos = Some((values[0], values[1]));
            Ok(true)
        })?;
        let (x, y) = pos.ok_or_else(|| ImaerError::invalid_feature(tag.name(), "missing gml:pos"))?;
        Ok(Self {
            epsg_id,
            gml_id,
            x,
            y,
        })
    }

    pub fn to_geometry(&self) -> Point<f64> {
        Point::new(self.x, self.y)
    }

    pub fn from_geometry(point: &Point<f64>) -> Self {
        Self::new(point.x(), point.y())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GmlLineString {
    pub epsg_id: Option<u32>,
    pub gml_id: Option<String>,
    pub coords: Vec<Coord<f64>>,
}

impl GmlLineString {
    pub fn is_valid(&self) -> bool {
        self.coords.len() >= 2
    }

    pub fn to_element(&self, default_gml_id: &str) -> Result<Element> {
        Ok(geometry_element(
            "gml:LineString",
            self.epsg_id,
            self.gml_id.as_deref(),
            default_gml_id,
        )?
        .with_child(Element::text_element("gml:posList", flatten(&self.coords))))
    }

    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Self> {
        let (epsg_id, gml_id) = read_header(tag);
        let mut coords = Vec::new();
        cursor.read_children(tag, |cursor, child| {
            match child.local_name() {
                "posList" | "pos" => {
                    let text = cursor.read_text(child)?;
                    coords.extend(pairs(child.name(), parse_number_list(child.name(), &text)?)?);
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(Self {
            epsg_id,
            gml_id,
            coords,
        })
    }

    pub fn to_geometry(&self) -> LineString<f64> {
        LineString::new(self.coords.clone())
    }

    pub fn from_geometry(line: &LineString<f64>) -> Self {
        Self {
            coords: line.0.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GmlPolygon {
    pub epsg_id: Option<u32>,
    pub gml_id: Option<String>,
    pub exterior: Vec<Coord<f64>>,
}

impl GmlPolygon {
    /// A closed exterior ring of at least four positions.
    pub fn is_valid(&self) -> bool {
        self.exterior.len() >= 4 && self.exterior.first() == self.exterior.last()
    }

    pub fn to_element(&self, default_gml_id: &str) -> Result<Element> {
        let ring = Element::new("gml:LinearRing")
            .with_child(Element::text_element("gml:posList", flatten(&self.exterior)));
        Ok(geometry_element(
            "gml:Polygon",
            self.epsg_id,
            self.gml_id.as_deref(),
            default_gml_id,
        )?
        .with_child(Element::new("gml:exterior").with_child(ring)))
    }

    /// Follows `Polygon/exterior/LinearRing/posList`. Anything off that path
    /// leaves the ring empty or partial instead of failing.
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Self> {
        let (epsg_id, gml_id) = read_header(tag);
        let mut exterior = Vec::new();
        cursor.read_children(tag, |cursor, exterior_tag| {
            if exterior_tag.local_name() != "exterior" {
                return Ok(false);
            }
            cursor.read_children(exterior_tag, |cursor, ring| {
                if ring.local_name() != "LinearRing" {
                    return Ok(false);
                }
                cursor.read_children(ring, |cursor, list| {
                    match list.local_name() {
                        "posList" | "pos" => {
                            let text = cursor.read_text(list)?;
                            exterior.extend(pairs(list.name(), parse_number_list(list.name(), &text)?)?);
                        }
                        _ => return Ok(false),
                    }
                    Ok(true)
                })?;
                Ok(true)
            })?;
            Ok(true)
        })?;
        Ok(Self {
            epsg_id,
            gml_id,
            exterior,
        })
    }

    pub fn to_geometry(&self) -> Polygon<f64> {
        Polygon::new(LineString::new(self.exterior.clone()), Vec::new())
    }

    /// Takes the exterior ring; interior rings are dropped.
    pub fn from_geometry(polygon: &Polygon<f64>) -> Self {
        Self {
            exterior: polygon.exterior().0.clone(),
            ..Self::default()
        }
    }
}

/// Geometry of a feature member.
#[derive(Debug, Clone, PartialEq)]
pub enum GmlGeometry {
    Point(GmlPoint),
    LineString(GmlLineString),
    Polygon(GmlPolygon),
}

impl GmlGeometry {
    pub fn from_geometry(geometry: &geo::Geometry<f64>) -> Result<Self> {
        match geometry {
            geo::Geometry::Point(p) => Ok(Self::Point(GmlPoint::from_geometry(p))),
            geo::Geometry::LineString(l) => Ok(Self::LineString(GmlLineString::from_geometry(l))),
            geo::Geometry::Polygon(p) => Ok(Self::Polygon(GmlPolygon::from_geometry(p))),
            geo::Geometry::MultiPolygon(mp) if mp.0.len() == 1 => {
                Ok(Self::Polygon(GmlPolygon::from_geometry(&mp.0[0])))
            }
            other => Err(ImaerError::invalid_feature(
                "geometry",
                format!("unsupported geometry type {other:?}"),
            )),
        }
    }

    pub fn to_geometry(&self) -> geo::Geometry<f64> {
        match self {
            Self::Point(p) => p.to_geometry().into(),
            Self::LineString(l) => l.to_geometry().into(),
            Self::Polygon(p) => p.to_geometry().into(),
        }
    }

    pub fn epsg_id(&self) -> Option<u32> {
        match self {
            Self::Point(p) => p.epsg_id,
            Self::LineString(l) => l.epsg_id,
            Self::Polygon(p) => p.epsg_id,
        }
    }

    pub fn gml_id(&self) -> Option<&str> {
        match self {
            Self::Point(p) => p.gml_id.as_deref(),
            Self::LineString(l) => l.gml_id.as_deref(),
            Self::Polygon(p) => p.gml_id.as_deref(),
        }
    }

    /// Sets the EPSG code and the gml id.
    pub fn tag(&mut self, epsg_id: u32, owner_gml_id: &str) {
        let gml_id = Some(format!("{owner_gml_id}.{}", self.id_suffix()));
        match self {
            Self::Point(p) => {
                p.epsg_id = Some(epsg_id);
                p.gml_id = gml_id;
            }
            Self::LineString(l) => {
                l.epsg_id = Some(epsg_id);
                l.gml_id = gml_id;
            }
            Self::Polygon(p) => {
                p.epsg_id = Some(epsg_id);
                p.gml_id = gml_id;
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::Point(p) => p.is_valid(),
            Self::LineString(l) => l.is_valid(),
            Self::Polygon(p) => p.is_valid(),
        }
    }

    fn id_suffix(&self) -> &'static str {
        match self {
            Self::Point(_) => "POINT",
            Self::LineString(_) => "CURVE",
            Self::Polygon(_) => "SURFACE",
        }
    }

    /// `imaer:GM_Point`, `imaer:GM_Curve` or `imaer:GM_Surface` holding the
    /// GML geometry.
    pub fn to_wrapped_element(&self, owner_gml_id: &str) -> Result<Element> {
        let default_id = format!("{owner_gml_id}.{}", self.id_suffix());
        let (wrapper, inner) = match self {
            Self::Point(p) => ("imaer:GM_Point", p.to_element(&default_id)?),
            Self::LineString(l) => ("imaer:GM_Curve", l.to_element(&default_id)?),
            Self::Polygon(p) => ("imaer:GM_Surface", p.to_element(&default_id)?),
        };
        Ok(Element::new(wrapper).with_child(inner))
    }

    /// Reads the geometry inside a `GM_*` wrapper.
    pub fn from_wrapped_xml<R: BufRead>(
        cursor: &mut XmlCursor<R>,
        wrapper: &Tag,
    ) -> Result<Option<Self>> {
        let mut geometry = None;
        cursor.read_children(wrapper, |cursor, child| {
            geometry = match child.local_name() {
                "Point" => Some(Self::Point(GmlPoint::from_xml(cursor, child)?)),
                "LineString" => Some(Self::LineString(GmlLineString::from_xml(cursor, child)?)),
                "Polygon" => Some(Self::Polygon(GmlPolygon::from_xml(cursor, child)?)),
                _ => return Ok(false),
            };
            Ok(true)
        })?;
        Ok(geometry)
    }
}
