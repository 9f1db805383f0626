use std::io::BufRead;

use crate::error::{ImaerError, Result};
use crate::model::geometry::GmlGeometry;
use crate::model::identifier::Nen3610Id;
use crate::xml::{Element, Tag, XmlCursor};

const GML_ID_PREFIX: &str = "Building";

/// `#Building.{id}`
pub fn building_href(local_id: &str) -> String {
    format!("#{GML_ID_PREFIX}.{local_id}")
}

/// Local id from a `#Building.{id}` reference.
pub fn building_id_from_href(href: &str) -> String {
    let id = href.trim().trim_start_matches('#');
    id.strip_prefix("Building.").unwrap_or(id).to_string()
}

/// A building that shelters emission sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub local_id: String,
    pub identifier: Nen3610Id,
    pub label: Option<String>,
    /// Footprint polygon, or a point for circular buildings.
    pub geometry: Option<GmlGeometry>,
    pub height: f64,
    pub diameter: Option<f64>,
}

impl Building {
    pub fn new(local_id: impl Into<String>, height: f64) -> Self {
        let local_id = local_id.into();
        Self {
            identifier: Nen3610Id::new(format!("{GML_ID_PREFIX}.{local_id}")),
            local_id,
            label: None,
            geometry: None,
            height,
            diameter: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_geometry(mut self, geometry: &geo::Geometry<f64>, epsg_id: u32) -> Result<Self> {
        let mut geometry = GmlGeometry::from_geometry(geometry)?;
        geometry.tag(epsg_id, &self.gml_id());
        self.geometry = Some(geometry);
        Ok(self)
    }

    pub fn gml_id(&self) -> String {
        format!("{GML_ID_PREFIX}.{}", self.local_id)
    }

    /// Needs an id, a valid identifier, a point or polygon footprint and a
    /// finite height.
    pub fn is_valid(&self) -> bool {
        !self.local_id.is_empty()
            && self.identifier.is_valid()
            && self.height.is_finite()
            && matches!(
                &self.geometry,
                Some(g @ (GmlGeometry::Point(_) | GmlGeometry::Polygon(_))) if g.is_valid()
            )
    }

    pub fn to_element(&self) -> Result<Element> {
        if !self.is_valid() {
            return Err(ImaerError::invalid_feature(
                self.gml_id(),
                "a building needs an id, a point or polygon footprint and a height",
            ));
        }
        let gml_id = self.gml_id();
        let mut element = Element::new("imaer:Building").with_attr("gml:id", &gml_id);
        element.push(self.identifier.to_wrapped_element()?);
        element.push_opt("imaer:label", self.label.as_ref());
        if let Some(geometry) = &self.geometry {
            element.push(
                Element::new("imaer:geometry").with_child(
                    Element::new("imaer:BuildingGeometry")
                        .with_child(geometry.to_wrapped_element(&gml_id)?),
                ),
            );
        }
        element.push_value("imaer:height", self.height);
        element.push_opt("imaer:diameter", self.diameter);
        Ok(element)
    }

    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Self> {
        let local_id = tag
            .attr("gml:id")
            .map(building_id_from_href)
            .ok_or_else(|| ImaerError::invalid_feature(tag.name(), "missing gml:id"))?;
        let mut building = Self::new(local_id, f64::NAN);
        cursor.read_children(tag, |cursor, field| {
            match field.local_name() {
                "identifier" => {
                    if let Some(id) = Nen3610Id::from_wrapped_xml(cursor, field)? {
                        if id.is_valid() {
                            building.identifier = id;
                        }
                    }
                }
                "label" => building.label = Some(cursor.read_text(field)?),
                "geometry" => {
                    cursor.read_children(field, |cursor, inner| {
                        if inner.local_name() != "BuildingGeometry" {
                            return Ok(false);
                        }
                        cursor.read_children(inner, |cursor, wrapper| {
                            if !wrapper.local_name().starts_with("GM_") {
                                return Ok(false);
                            }
                            building.geometry = GmlGeometry::from_wrapped_xml(cursor, wrapper)?;
                            Ok(true)
                        })?;
                        Ok(true)
                    })?;
                }
                "height" => building.height = cursor.read_value(field)?,
                "diameter" => building.diameter = Some(cursor.read_value(field)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        if !building.is_valid() {
            return Err(ImaerError::invalid_feature(
                tag.name(),
                format!("building {} is incomplete", building.local_id),
            ));
        }
        Ok(building)
    }
}
