//! Physical characteristics of an emission source.

use std::io::BufRead;

use crate::error::{ImaerError, Result};
use crate::model::building::{building_href, building_id_from_href};
use crate::model::profile::VariationProfile;
use crate::options::{ImaerVersion, WriteContext};
use crate::xml::{Element, Tag, XmlCursor};

#[derive(Debug, Clone, PartialEq)]
pub enum HeatContent {
    /// Heat content in MW.
    Specified(f64),
    /// Derived from the outflow.
    Calculated {
        emission_temperature: f64,
        outflow_diameter: f64,
        outflow_velocity: f64,
        outflow_direction: Option<String>,
    },
}

impl Default for HeatContent {
    fn default() -> Self {
        Self::Specified(0.0)
    }
}

impl HeatContent {
    fn to_element(&self) -> Element {
        let inner = match self {
            Self::Specified(value) => Element::new("imaer:SpecifiedHeatContent")
                .with_child(Element::text_element("imaer:value", value)),
            Self::Calculated {
                emission_temperature,
                outflow_diameter,
                outflow_velocity,
                outflow_direction,
            } => {
                let mut calculated = Element::new("imaer:CalculatedHeatContent");
                calculated.push_value("imaer:emissionTemperature", emission_temperature);
                calculated.push_value("imaer:outflowDiameter", outflow_diameter);
                calculated.push_opt("imaer:outflowDirection", outflow_direction.as_ref());
                calculated.push_value("imaer:outflowVelocity", outflow_velocity);
                calculated
            }
        };
        Element::new("imaer:heatContent").with_child(inner)
    }

    fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, wrapper: &Tag) -> Result<Option<Self>> {
        let mut heat_content = None;
        cursor.read_children(wrapper, |cursor, tag| {
            match tag.local_name() {
                "SpecifiedHeatContent" => {
                    let mut value: Option<f64> = None;
                    cursor.read_children(tag, |cursor, field| {
                        if field.local_name() != "value" {
                            return Ok(false);
                        }
                        value = Some(cursor.read_value(field)?);
                        Ok(true)
                    })?;
                    let value = value
                        .ok_or_else(|| ImaerError::invalid_feature(tag.name(), "missing value"))?;
                    heat_content = Some(Self::Specified(value));
                }
                "CalculatedHeatContent" => {
                    let mut temperature: Option<f64> = None;
                    let mut diameter: Option<f64> = None;
                    let mut velocity: Option<f64> = None;
                    let mut direction = None;
                    cursor.read_children(tag, |cursor, field| {
                        match field.local_name() {
                            "emissionTemperature" => temperature = Some(cursor.read_value(field)?),
                            "outflowDiameter" => diameter = Some(cursor.read_value(field)?),
                            "outflowVelocity" => velocity = Some(cursor.read_value(field)?),
                            "outflowDirection" => direction = Some(cursor.read_code(field)?),
                            _ => return Ok(false),
                        }
                        Ok(true)
                    })?;
                    let missing = |name: &str| ImaerError::invalid_feature(tag.name(), format!("missing {name}"));
                    heat_content = Some(Self::Calculated {
                        emission_temperature: temperature.ok_or_else(|| missing("emissionTemperature"))?,
                        outflow_diameter: diameter.ok_or_else(|| missing("outflowDiameter"))?,
                        outflow_velocity: velocity.ok_or_else(|| missing("outflowVelocity"))?,
                        outflow_direction: direction,
                    });
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(heat_content)
    }
}

/// OPS characteristics: stack height, heat content and spread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpsCharacteristics {
    /// Local id of a sheltering building.
    pub building_id: Option<String>,
    pub heat_content: HeatContent,
    pub emission_height: f64,
    pub spread: Option<f64>,
    pub profile: Option<VariationProfile>,
}

impl OpsCharacteristics {
    pub fn new(heat_content: HeatContent, emission_height: f64) -> Self {
        Self {
            heat_content,
            emission_height,
            ..Self::default()
        }
    }

    pub fn with_spread(mut self, spread: f64) -> Self {
        self.spread = Some(spread);
        self
    }

    pub fn with_profile(mut self, profile: VariationProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_building(mut self, building_id: impl Into<String>) -> Self {
        self.building_id = Some(building_id.into());
        self
    }
}

/// ADMS point/area source characteristics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdmsCharacteristics {
    pub building_id: Option<String>,
    pub height: f64,
    pub specific_heat_capacity: Option<f64>,
    pub source_type: Option<String>,
    pub diameter: Option<f64>,
    pub elevation_angle: Option<f64>,
    pub horizontal_angle: Option<f64>,
    pub buoyancy_type: Option<String>,
    pub temperature: Option<f64>,
    pub efflux_type: Option<String>,
    pub vertical_velocity: Option<f64>,
    pub profile: Option<VariationProfile>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceCharacteristics {
    Ops(OpsCharacteristics),
    Adms(AdmsCharacteristics),
}

impl From<OpsCharacteristics> for SourceCharacteristics {
    fn from(value: OpsCharacteristics) -> Self {
        Self::Ops(value)
    }
}

impl From<AdmsCharacteristics> for SourceCharacteristics {
    fn from(value: AdmsCharacteristics) -> Self {
        Self::Adms(value)
    }
}

fn wrapper_name(version: ImaerVersion) -> &'static str {
    match version {
        ImaerVersion::V4_0 => "imaer:emissionSourceCharacteristics",
        _ => "imaer:characteristics",
    }
}

fn push_building(element: &mut Element, building_id: Option<&String>) {
    if let Some(id) = building_id {
        element.push(Element::new("imaer:building").with_attr("xlink:href", building_href(id)));
    }
}

fn push_profile(
    element: &mut Element,
    profile: Option<&VariationProfile>,
    ctx: &WriteContext<'_>,
    owner: &str,
) -> Result<()> {
    if let Some(profile) = profile {
        element.push(profile.to_element(ctx, owner)?);
    }
    Ok(())
}

impl SourceCharacteristics {
    pub fn building_id(&self) -> Option<&str> {
        match self {
            Self::Ops(ops) => ops.building_id.as_deref(),
            Self::Adms(adms) => adms.building_id.as_deref(),
        }
    }

    pub fn profile(&self) -> Option<&VariationProfile> {
        match self {
            Self::Ops(ops) => ops.profile.as_ref(),
            Self::Adms(adms) => adms.profile.as_ref(),
        }
    }

    pub fn is_valid(&self) -> bool {
        let height_ok = match self {
            Self::Ops(ops) => ops.emission_height.is_finite(),
            Self::Adms(adms) => adms.height.is_finite(),
        };
        height_ok && self.profile().map_or(true, VariationProfile::is_valid)
    }

    /// `owner` names the source in referential integrity errors.
    pub fn to_element(&self, ctx: &WriteContext<'_>, owner: &str) -> Result<Element> {
        let inner = match self {
            Self::Ops(ops) => {
                let name = match ctx.version {
                    ImaerVersion::V4_0 => "imaer:EmissionSourceCharacteristics",
                    _ => "imaer:OPSSourceCharacteristics",
                };
                let mut element = Element::new(name);
                push_building(&mut element, ops.building_id.as_ref());
                element.push(ops.heat_content.to_element());
                element.push_value("imaer:emissionHeight", ops.emission_height);
                element.push_opt("imaer:spread", ops.spread);
                push_profile(&mut element, ops.profile.as_ref(), ctx, owner)?;
                element
            }
            Self::Adms(adms) => {
                let mut element = Element::new("imaer:ADMSSourceCharacteristics");
                push_building(&mut element, adms.building_id.as_ref());
                element.push_value("imaer:height", adms.height);
                element.push_opt("imaer:specificHeatCapacity", adms.specific_heat_capacity);
                element.push_opt("imaer:sourceType", adms.source_type.as_ref());
                element.push_opt("imaer:diameter", adms.diameter);
                element.push_opt("imaer:elevationAngle", adms.elevation_angle);
                element.push_opt("imaer:horizontalAngle", adms.horizontal_angle);
                element.push_opt("imaer:buoyancyType", adms.buoyancy_type.as_ref());
                element.push_opt("imaer:temperature", adms.temperature);
                element.push_opt("imaer:effluxType", adms.efflux_type.as_ref());
                element.push_opt("imaer:verticalVelocity", adms.vertical_velocity);
                push_profile(&mut element, adms.profile.as_ref(), ctx, owner)?;
                element
            }
        };
        Ok(Element::new(wrapper_name(ctx.version)).with_child(inner))
    }

    /// Reads the characteristics inside `characteristics` or
    /// `emissionSourceCharacteristics`.
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, wrapper: &Tag) -> Result<Option<Self>> {
        let mut characteristics = None;
        cursor.read_children(wrapper, |cursor, tag| {
            characteristics = match tag.local_name() {
                "OPSSourceCharacteristics" | "EmissionSourceCharacteristics" => {
                    Some(Self::Ops(read_ops(cursor, tag)?))
                }
                "ADMSSourceCharacteristics" => Some(Self::Adms(read_adms(cursor, tag)?)),
                _ => return Ok(false),
            };
            Ok(true)
        })?;
        Ok(characteristics)
    }
}

fn read_ops<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<OpsCharacteristics> {
    let mut ops = OpsCharacteristics::default();
    cursor.read_children(tag, |cursor, field| {
        match field.local_name() {
            "building" => ops.building_id = field.attr("xlink:href").map(building_id_from_href),
            "heatContent" => {
                if let Some(heat_content) = HeatContent::from_xml(cursor, field)? {
                    ops.heat_content = heat_content;
                }
            }
            "emissionHeight" => ops.emission_height = cursor.read_value(field)?,
            "spread" => ops.spread = Some(cursor.read_value(field)?),
            "diurnalVariation" | "timeVaryingProfile" => {
                ops.profile = VariationProfile::from_xml(cursor, field)?
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    Ok(ops)
}

fn read_adms<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<AdmsCharacteristics> {
    let mut adms = AdmsCharacteristics::default();
    cursor.read_children(tag, |cursor, field| {
        match field.local_name() {
            "building" => adms.building_id = field.attr("xlink:href").map(building_id_from_href),
            "height" => adms.height = cursor.read_value(field)?,
            "specificHeatCapacity" => adms.specific_heat_capacity = Some(cursor.read_value(field)?),
            "sourceType" => adms.source_type = Some(cursor.read_code(field)?),
            "diameter" => adms.diameter = Some(cursor.read_value(field)?),
            "elevationAngle" => adms.elevation_angle = Some(cursor.read_value(field)?),
            "horizontalAngle" => adms.horizontal_angle = Some(cursor.read_value(field)?),
            "buoyancyType" => adms.buoyancy_type = Some(cursor.read_code(field)?),
            "temperature" => adms.temperature = Some(cursor.read_value(field)?),
            "effluxType" => adms.efflux_type = Some(cursor.read_code(field)?),
            "verticalVelocity" => adms.vertical_velocity = Some(cursor.read_value(field)?),
            "diurnalVariation" | "timeVaryingProfile" => {
                adms.profile = VariationProfile::from_xml(cursor, field)?
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    Ok(adms)
}
