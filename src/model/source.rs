//! Emission sources: the generic source and its road variants.

use std::io::BufRead;

use crate::error::{ImaerError, Result};
use crate::model::characteristics::SourceCharacteristics;
use crate::model::emission::{push_emissions, Emission};
use crate::model::geometry::GmlGeometry;
use crate::model::identifier::Nen3610Id;
use crate::model::road::{AdmsRoadSideBarrier, RoadSideBarrier, Vehicle};
use crate::options::WriteContext;
use crate::xml::cursor::parse_value;
use crate::xml::{Element, Tag, XmlCursor};

const GML_ID_PREFIX: &str = "ES";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Srm2Road {
    pub road_area_type: Option<String>,
    pub road_type: Option<String>,
    pub vehicles: Vec<Vehicle>,
    pub tunnel_factor: Option<f64>,
    /// `NORMAL`, `STEEP_DYKE`, `VIADUCT`, ...
    pub elevation: Option<String>,
    pub elevation_height: Option<f64>,
    pub barrier_left: Option<RoadSideBarrier>,
    pub barrier_right: Option<RoadSideBarrier>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdmsRoad {
    pub road_area_type: Option<String>,
    pub road_type: Option<String>,
    pub vehicles: Vec<Vehicle>,
    pub width: Option<f64>,
    pub elevation: Option<f64>,
    pub gradient: Option<f64>,
    pub coverage: Option<f64>,
    pub barrier_left: Option<AdmsRoadSideBarrier>,
    pub barrier_right: Option<AdmsRoadSideBarrier>,
}

/// What kind of source this is, with the fields only that kind has.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SourceKind {
    #[default]
    Generic,
    Srm2Road(Srm2Road),
    AdmsRoad(AdmsRoad),
}

impl SourceKind {
    pub fn element_name(&self) -> &'static str {
        match self {
            Self::Generic => "imaer:EmissionSource",
            Self::Srm2Road(_) => "imaer:SRM2Road",
            Self::AdmsRoad(_) => "imaer:ADMSRoad",
        }
    }

    fn road_header(&self) -> Option<(&Option<String>, &Option<String>, &[Vehicle])> {
        match self {
            Self::Generic => None,
            Self::Srm2Road(r) => Some((&r.road_area_type, &r.road_type, r.vehicles.as_slice())),
            Self::AdmsRoad(r) => Some((&r.road_area_type, &r.road_type, r.vehicles.as_slice())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmissionSource {
    pub local_id: String,
    pub identifier: Nen3610Id,
    pub sector_id: u32,
    pub label: Option<String>,
    pub geometry: Option<GmlGeometry>,
    pub characteristics: Option<SourceCharacteristics>,
    pub emissions: Vec<Emission>,
    pub kind: SourceKind,
}

impl EmissionSource {
    pub fn new(local_id: impl ToString, sector_id: u32) -> Self {
        let local_id = local_id.to_string();
        Self {
            identifier: Nen3610Id::new(format!("{GML_ID_PREFIX}.{local_id}")),
            local_id,
            sector_id,
            label: None,
            geometry: None,
            characteristics: None,
            emissions: Vec::new(),
            kind: SourceKind::Generic,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Converts `geometry` and tags it with `epsg_id` and this source's ids.
    pub fn with_geometry(mut self, geometry: &geo::Geometry<f64>, epsg_id: u32) -> Result<Self> {
        let mut geometry = GmlGeometry::from_geometry(geometry)?;
        geometry.tag(epsg_id, &self.gml_id());
        self.geometry = Some(geometry);
        Ok(self)
    }

    pub fn with_characteristics(mut self, characteristics: impl Into<SourceCharacteristics>) -> Self {
        self.characteristics = Some(characteristics.into());
        self
    }

    pub fn with_emission(mut self, emission: Emission) -> Self {
        self.emissions.push(emission);
        self
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    /// `ES.{local_id}`
    pub fn gml_id(&self) -> String {
        format!("{GML_ID_PREFIX}.{}", self.local_id)
    }

    pub fn is_valid(&self) -> bool {
        let vehicles_ok = self
            .kind
            .road_header()
            .map_or(true, |(_, _, vehicles)| vehicles.iter().all(Vehicle::is_valid));
        !self.local_id.is_empty()
            && self.identifier.is_valid()
            && self.geometry.as_ref().is_some_and(GmlGeometry::is_valid)
            && self
                .characteristics
                .as_ref()
                .map_or(true, SourceCharacteristics::is_valid)
            && vehicles_ok
    }

    pub fn to_element(&self, ctx: &WriteContext<'_>) -> Result<Element> {
        let gml_id = self.gml_id();
        if !self.is_valid() {
            return Err(ImaerError::invalid_feature(
                &gml_id,
                "an emission source needs an id and a valid geometry",
            ));
        }

        let mut element = Element::new(self.kind.element_name())
            .with_attr("sectorId", self.sector_id)
            .with_attr("gml:id", &gml_id);
        if let Some((road_area_type, road_type, _)) = self.kind.road_header() {
            if let Some(value) = road_area_type {
                element.set_attr("roadAreaType", value);
            }
            if let Some(value) = road_type {
                element.set_attr("roadType", value);
            }
        }

        element.push(self.identifier.to_wrapped_element()?);
        element.push_opt("imaer:label", self.label.as_ref());
        if let Some(characteristics) = &self.characteristics {
            element.push(characteristics.to_element(ctx, &gml_id)?);
        }
        if let Some(geometry) = &self.geometry {
            element.push(
                Element::new("imaer:geometry").with_child(
                    Element::new("imaer:EmissionSourceGeometry")
                        .with_child(geometry.to_wrapped_element(&gml_id)?),
                ),
            );
        }
        push_emissions(&mut element, &self.emissions);

        match &self.kind {
            SourceKind::Generic => {}
            SourceKind::Srm2Road(road) => {
                push_vehicles(&mut element, &road.vehicles);
                element.push_opt("imaer:tunnelFactor", road.tunnel_factor);
                element.push_opt("imaer:elevation", road.elevation.as_ref());
                element.push_opt("imaer:elevationHeight", road.elevation_height);
                if let Some(barrier) = &road.barrier_left {
                    element.push(barrier.to_element("imaer:barrierLeft"));
                }
                if let Some(barrier) = &road.barrier_right {
                    element.push(barrier.to_element("imaer:barrierRight"));
                }
            }
            SourceKind::AdmsRoad(road) => {
                push_vehicles(&mut element, &road.vehicles);
                element.push_opt("imaer:width", road.width);
                element.push_opt("imaer:elevation", road.elevation);
                element.push_opt("imaer:gradient", road.gradient);
                element.push_opt("imaer:coverage", road.coverage);
                if let Some(barrier) = &road.barrier_left {
                    element.push(barrier.to_element("imaer:barrierLeft"));
                }
                if let Some(barrier) = &road.barrier_right {
                    element.push(barrier.to_element("imaer:barrierRight"));
                }
            }
        }
        Ok(element)
    }

    /// Reads an `EmissionSource`, `SRM2Road` or `ADMSRoad` element.
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Self> {
        let local_id = tag
            .attr("gml:id")
            .map(|id| id.strip_prefix("ES.").unwrap_or(id).to_string())
            .ok_or_else(|| ImaerError::invalid_feature(tag.name(), "missing gml:id"))?;
        let sector_id: u32 = match tag.attr("sectorId") {
            Some(value) => parse_value(tag.name(), value)?,
            None => return Err(ImaerError::invalid_feature(tag.name(), "missing sectorId")),
        };
        let road_area_type = tag.attr("roadAreaType").map(str::to_string);
        let road_type = tag.attr("roadType").map(str::to_string);

        let mut source = Self::new(local_id, sector_id);
        source.kind = match tag.local_name() {
            "SRM2Road" => SourceKind::Srm2Road(Srm2Road {
                road_area_type,
                road_type,
                ..Srm2Road::default()
            }),
            "ADMSRoad" => SourceKind::AdmsRoad(AdmsRoad {
                road_area_type,
                road_type,
                ..AdmsRoad::default()
            }),
            _ => SourceKind::Generic,
        };

        cursor.read_children(tag, |cursor, field| {
            match field.local_name() {
                "identifier" => {
                    if let Some(id) = Nen3610Id::from_wrapped_xml(cursor, field)? {
                        if id.is_valid() {
                            source.identifier = id;
                        }
                    }
                }
                "label" => source.label = Some(cursor.read_text(field)?),
                "characteristics" | "emissionSourceCharacteristics" => {
                    source.characteristics = SourceCharacteristics::from_xml(cursor, field)?;
                }
                "geometry" => source.geometry = read_source_geometry(cursor, field)?,
                "emission" => source.emissions.extend(Emission::from_xml(cursor, field)?),
                _ => return read_road_field(cursor, field, &mut source.kind),
            }
            Ok(true)
        })?;

        if !source.is_valid() {
            return Err(ImaerError::invalid_feature(
                tag.name(),
                format!("source {} is incomplete", source.local_id),
            ));
        }
        Ok(source)
    }
}

fn push_vehicles(element: &mut Element, vehicles: &[Vehicle]) {
    for vehicle in vehicles {
        element.push(vehicle.to_element());
    }
}

fn read_source_geometry<R: BufRead>(
    cursor: &mut XmlCursor<R>,
    tag: &Tag,
) -> Result<Option<GmlGeometry>> {
    let mut geometry = None;
    cursor.read_children(tag, |cursor, inner| {
        if inner.local_name() != "EmissionSourceGeometry" {
            return Ok(false);
        }
        cursor.read_children(inner, |cursor, wrapper| {
            if !wrapper.local_name().starts_with("GM_") {
                return Ok(false);
            }
            geometry = GmlGeometry::from_wrapped_xml(cursor, wrapper)?;
            Ok(true)
        })?;
        Ok(true)
    })?;
    Ok(geometry)
}

/// Fields that only road sources have. Returns `Ok(false)` for anything the
/// kind does not know.
fn read_road_field<R: BufRead>(
    cursor: &mut XmlCursor<R>,
    field: &Tag,
    kind: &mut SourceKind,
) -> Result<bool> {
    match kind {
        SourceKind::Generic => return Ok(false),
        SourceKind::Srm2Road(road) => match field.local_name() {
            "vehicles" => road.vehicles.extend(Vehicle::from_xml(cursor, field)?),
            "tunnelFactor" => road.tunnel_factor = Some(cursor.read_value(field)?),
            "elevation" => road.elevation = Some(cursor.read_code(field)?),
            "elevationHeight" => road.elevation_height = Some(cursor.read_value(field)?),
            "barrierLeft" => road.barrier_left = RoadSideBarrier::from_xml(cursor, field)?,
            "barrierRight" => road.barrier_right = RoadSideBarrier::from_xml(cursor, field)?,
            _ => return Ok(false),
        },
        SourceKind::AdmsRoad(road) => match field.local_name() {
            "vehicles" => road.vehicles.extend(Vehicle::from_xml(cursor, field)?),
            "width" => road.width = Some(cursor.read_value(field)?),
            "elevation" => road.elevation = Some(cursor.read_value(field)?),
            "gradient" => road.gradient = Some(cursor.read_value(field)?),
            "coverage" => road.coverage = Some(cursor.read_value(field)?),
            "barrierLeft" => road.barrier_left = AdmsRoadSideBarrier::from_xml(cursor, field)?,
            "barrierRight" => road.barrier_right = AdmsRoadSideBarrier::from_xml(cursor, field)?,
            _ => return Ok(false),
        },
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::characteristics::{HeatContent, OpsCharacteristics};
    use crate::model::emission::Substance;
    use crate::model::profile::VariationProfile;
    use crate::model::road::{CustomVehicle, StandardVehicle};
    use crate::model::Definitions;
    use crate::options::ImaerVersion;
    use crate::xml::{read_fragment, ParseMode};
    use geo::{line_string, point, Geometry};

    fn write(source: &EmissionSource) -> String {
        let definitions = Definitions::default();
        let ctx = WriteContext::new(ImaerVersion::V5_1, &definitions);
        source.to_element(&ctx).unwrap().to_xml_string().unwrap()
    }

    fn round_trip(source: &EmissionSource) -> EmissionSource {
        read_fragment(&write(source), ParseMode::Strict, EmissionSource::from_xml).unwrap()
    }

    fn line() -> Geometry<f64> {
        line_string![(x: 311279.0, y: 723504.3), (x: 311262.5, y: 723349.6)].into()
    }

    #[test]
    fn test_simple_source() {
        let point: Geometry<f64> = point!(x: 148458.0, y: 411641.0).into();
        let source = EmissionSource::new(123, 9000)
            .with_label("Bron 123")
            .with_geometry(&point, 28992)
            .unwrap()
            .with_emission(Emission::new(Substance::Nh3, 1.0));
        let xml = write(&source);
        assert!(xml.starts_with(r#"<imaer:EmissionSource sectorId="9000" gml:id="ES.123">"#));
        assert!(xml.contains(
            r#"<gml:Point srsName="urn:ogc:def:crs:EPSG::28992" gml:id="ES.123.POINT"><gml:pos>148458 411641</gml:pos></gml:Point>"#
        ));
        assert_eq!(round_trip(&source), source);
    }

    #[test]
    fn test_source_with_characteristics() {
        let source = EmissionSource::new(1234, 9999)
            .with_geometry(&line(), 28992)
            .unwrap()
            .with_characteristics(
                OpsCharacteristics::new(HeatContent::Specified(12.5), 2.4)
                    .with_spread(3.0)
                    .with_profile(VariationProfile::standard("LIGHT_DUTY_VEHICLES")),
            )
            .with_emission(Emission::new(Substance::Nh3, 4.3))
            .with_emission(Emission::new(Substance::Nox, 4.4));
        let parsed = round_trip(&source);
        assert_eq!(parsed, source);
        assert_eq!(parsed.emissions.len(), 2);
    }

    #[test]
    fn test_srm2_road_round_trip() {
        let road = Srm2Road {
            road_area_type: Some("NL".to_string()),
            road_type: Some("FREEWAY".to_string()),
            vehicles: vec![StandardVehicle {
                vehicle_type: "BUS".to_string(),
                vehicles_per_time_unit: 333.0,
                time_unit: "DAY".to_string(),
                stagnation_factor: Some(0.0),
                maximum_speed: Some(33),
                strict_enforcement: Some(false),
            }
            .into()],
            tunnel_factor: Some(1.0),
            elevation: Some("NORMAL".to_string()),
            elevation_height: Some(0.0),
            barrier_left: Some(RoadSideBarrier {
                barrier_type: "SCREEN".to_string(),
                height: 2.0,
                distance: 5.0,
            }),
            barrier_right: None,
        };
        let source = EmissionSource::new(33, 3100)
            .with_label("testlabel")
            .with_geometry(&line(), 28992)
            .unwrap()
            .with_kind(SourceKind::Srm2Road(road));
        let xml = write(&source);
        assert!(xml.starts_with(
            r#"<imaer:SRM2Road sectorId="3100" gml:id="ES.33" roadAreaType="NL" roadType="FREEWAY">"#
        ));
        assert!(xml.contains("<imaer:barrierLeft><imaer:RoadSideBarrier>"));
        assert_eq!(round_trip(&source), source);
    }

    #[test]
    fn test_adms_road_round_trip() {
        let road = AdmsRoad {
            road_area_type: Some("Sco".to_string()),
            road_type: Some("Urb".to_string()),
            vehicles: vec![
                StandardVehicle {
                    vehicle_type: "BUS".to_string(),
                    vehicles_per_time_unit: 1000.0,
                    time_unit: "DAY".to_string(),
                    maximum_speed: Some(50),
                    ..StandardVehicle::default()
                }
                .into(),
                CustomVehicle {
                    vehicles_per_time_unit: 1000.0,
                    time_unit: "DAY".to_string(),
                    description: Some("Test test ...".to_string()),
                    emissions: vec![Emission::new(Substance::Nox, 111.0)],
                }
                .into(),
            ],
            width: Some(8.0),
            elevation: Some(2.0),
            gradient: Some(0.5),
            coverage: Some(0.0),
            barrier_left: Some(AdmsRoadSideBarrier {
                barrier_type: "BRICK_WALL".to_string(),
                distance: 5.0,
                average_height: 7.0,
                maximum_height: 10.0,
                minimum_height: 3.0,
                porosity: 5.0,
            }),
            barrier_right: None,
        };
        let source = EmissionSource::new(33, 3100)
            .with_geometry(&line(), 27700)
            .unwrap()
            .with_kind(SourceKind::AdmsRoad(road));
        let xml = write(&source);
        assert!(xml.starts_with("<imaer:ADMSRoad "));
        assert!(xml.contains("urn:ogc:def:crs:EPSG::27700"));
        assert_eq!(round_trip(&source), source);
    }

    #[test]
    fn test_source_without_geometry_is_rejected() {
        let source = EmissionSource::new(1, 9000);
        let definitions = Definitions::default();
        let ctx = WriteContext::new(ImaerVersion::V5_1, &definitions);
        assert!(matches!(
            source.to_element(&ctx),
            Err(ImaerError::InvalidFeature { .. })
        ));
    }

    #[test]
    fn test_road_fields_are_unexpected_on_generic_sources() {
        let xml = r#"<imaer:EmissionSource sectorId="1" gml:id="ES.1"><imaer:tunnelFactor>1</imaer:tunnelFactor><imaer:geometry><imaer:EmissionSourceGeometry><imaer:GM_Point><gml:Point srsName="urn:ogc:def:crs:EPSG::28992" gml:id="ES.1.POINT"><gml:pos>1 2</gml:pos></gml:Point></imaer:GM_Point></imaer:EmissionSourceGeometry></imaer:geometry></imaer:EmissionSource>"#;
        let lenient = read_fragment(xml, ParseMode::Lenient, EmissionSource::from_xml).unwrap();
        assert_eq!(lenient.local_id, "1");
        assert!(read_fragment(xml, ParseMode::Strict, EmissionSource::from_xml).is_err());
    }

    #[test]
    fn test_invalid_sector_id() {
        let xml = r#"<imaer:EmissionSource sectorId="abc" gml:id="ES.1"/>"#;
        let err = read_fragment(xml, ParseMode::Lenient, EmissionSource::from_xml).unwrap_err();
        assert!(matches!(err, ImaerError::InvalidValue { .. }));
    }
}
