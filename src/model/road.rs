//! Road traffic: vehicle groups and road side barriers.

use std::io::BufRead;

use crate::error::{ImaerError, Result};
use crate::model::emission::{push_emissions, Emission};
use crate::xml::{Element, Tag, XmlCursor};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardVehicle {
    /// e.g. `LIGHT_TRAFFIC`, `HEAVY_FREIGHT`, `BUS`
    pub vehicle_type: String,
    pub vehicles_per_time_unit: f64,
    /// `DAY`, `MONTH`, `YEAR`, ...
    pub time_unit: String,
    pub stagnation_factor: Option<f64>,
    pub maximum_speed: Option<u32>,
    pub strict_enforcement: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomVehicle {
    pub vehicles_per_time_unit: f64,
    pub time_unit: String,
    pub description: Option<String>,
    /// Emission per vehicle.
    pub emissions: Vec<Emission>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Vehicle {
    Standard(StandardVehicle),
    Custom(CustomVehicle),
}

impl From<StandardVehicle> for Vehicle {
    fn from(value: StandardVehicle) -> Self {
        Self::Standard(value)
    }
}

impl From<CustomVehicle> for Vehicle {
    fn from(value: CustomVehicle) -> Self {
        Self::Custom(value)
    }
}

impl Vehicle {
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Standard(v) => {
                !v.vehicle_type.is_empty()
                    && !v.time_unit.is_empty()
                    && v.vehicles_per_time_unit >= 0.0
            }
            Self::Custom(v) => !v.time_unit.is_empty() && v.vehicles_per_time_unit >= 0.0,
        }
    }

    /// `imaer:vehicles` holding a `StandardVehicle` or `CustomVehicle`.
    pub fn to_element(&self) -> Element {
        let inner = match self {
            Self::Standard(v) => {
                let mut element =
                    Element::new("imaer:StandardVehicle").with_attr("vehicleType", &v.vehicle_type);
                element.push_value("imaer:vehiclesPerTimeUnit", v.vehicles_per_time_unit);
                element.push_value("imaer:timeUnit", &v.time_unit);
                element.push_opt("imaer:stagnationFactor", v.stagnation_factor);
                element.push_opt("imaer:maximumSpeed", v.maximum_speed);
                element.push_opt("imaer:strictEnforcement", v.strict_enforcement);
                element
            }
            Self::Custom(v) => {
                let mut element = Element::new("imaer:CustomVehicle");
                element.push_value("imaer:vehiclesPerTimeUnit", v.vehicles_per_time_unit);
                element.push_value("imaer:timeUnit", &v.time_unit);
                element.push_opt("imaer:description", v.description.as_ref());
                push_emissions(&mut element, &v.emissions);
                element
            }
        };
        Element::new("imaer:vehicles").with_child(inner)
    }

    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, wrapper: &Tag) -> Result<Option<Self>> {
        let mut vehicle = None;
        cursor.read_children(wrapper, |cursor, tag| {
            vehicle = match tag.local_name() {
                "StandardVehicle" => Some(Self::Standard(read_standard(cursor, tag)?)),
                "CustomVehicle" => Some(Self::Custom(read_custom(cursor, tag)?)),
                _ => return Ok(false),
            };
            Ok(true)
        })?;
        Ok(vehicle)
    }
}

fn read_standard<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<StandardVehicle> {
    let mut vehicle = StandardVehicle {
        vehicle_type: tag
            .attr("vehicleType")
            .ok_or_else(|| ImaerError::invalid_feature(tag.name(), "missing vehicleType"))?
            .to_string(),
        ..StandardVehicle::default()
    };
    cursor.read_children(tag, |cursor, field| {
        match field.local_name() {
            "vehiclesPerTimeUnit" => vehicle.vehicles_per_time_unit = cursor.read_value(field)?,
            "timeUnit" => vehicle.time_unit = cursor.read_code(field)?,
            "stagnationFactor" => vehicle.stagnation_factor = Some(cursor.read_value(field)?),
            "maximumSpeed" => vehicle.maximum_speed = Some(cursor.read_value(field)?),
            "strictEnforcement" => vehicle.strict_enforcement = Some(cursor.read_bool(field)?),
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    Ok(vehicle)
}

fn read_custom<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<CustomVehicle> {
    let mut vehicle = CustomVehicle::default();
    cursor.read_children(tag, |cursor, field| {
        match field.local_name() {
            "vehiclesPerTimeUnit" => vehicle.vehicles_per_time_unit = cursor.read_value(field)?,
            "timeUnit" => vehicle.time_unit = cursor.read_code(field)?,
            "description" => vehicle.description = Some(cursor.read_text(field)?),
            "emission" => vehicle.emissions.extend(Emission::from_xml(cursor, field)?),
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    Ok(vehicle)
}

/// SRM2 road side barrier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadSideBarrier {
    /// `SCREEN` or `WALL`
    pub barrier_type: String,
    pub height: f64,
    pub distance: f64,
}

impl RoadSideBarrier {
    pub(crate) fn to_element(&self, name: &str) -> Element {
        let mut barrier = Element::new("imaer:RoadSideBarrier");
        barrier.push_value("imaer:barrierType", &self.barrier_type);
        barrier.push_value("imaer:height", self.height);
        barrier.push_value("imaer:distance", self.distance);
        Element::new(name).with_child(barrier)
    }

    pub(crate) fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, wrapper: &Tag) -> Result<Option<Self>> {
        let mut found = None;
        cursor.read_children(wrapper, |cursor, tag| {
            if tag.local_name() != "RoadSideBarrier" {
                return Ok(false);
            }
            let mut barrier = Self::default();
            cursor.read_children(tag, |cursor, field| {
                match field.local_name() {
                    "barrierType" => barrier.barrier_type = cursor.read_code(field)?,
                    "height" => barrier.height = cursor.read_value(field)?,
                    "distance" => barrier.distance = cursor.read_value(field)?,
                    _ => return Ok(false),
                }
                Ok(true)
            })?;
            found = Some(barrier);
            Ok(true)
        })?;
        Ok(found)
    }
}

/// ADMS road side barrier: canyon walls, tree rows, noise barriers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdmsRoadSideBarrier {
    /// e.g. `BRICK_WALL`, `TREE_BARRIER_OPEN`
    pub barrier_type: String,
    pub distance: f64,
    pub average_height: f64,
    pub maximum_height: f64,
    pub minimum_height: f64,
    /// Percentage, 0 for a closed wall.
    pub porosity: f64,
}

impl AdmsRoadSideBarrier {
    pub(crate) fn to_element(&self, name: &str) -> Element {
        let mut barrier = Element::new("imaer:ADMSRoadSideBarrier");
        barrier.push_value("imaer:barrierType", &self.barrier_type);
        barrier.push_value("imaer:distance", self.distance);
        barrier.push_value("imaer:averageHeight", self.average_height);
        barrier.push_value("imaer:maximumHeight", self.maximum_height);
        barrier.push_value("imaer:minimumHeight", self.minimum_height);
        barrier.push_value("imaer:porosity", self.porosity);
        Element::new(name).with_child(barrier)
    }

    pub(crate) fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, wrapper: &Tag) -> Result<Option<Self>> {
        let mut found = None;
        cursor.read_children(wrapper, |cursor, tag| {
            if tag.local_name() != "ADMSRoadSideBarrier" {
                return Ok(false);
            }
            let mut barrier = Self::default();
            cursor.read_children(tag, |cursor, field| {
                match field.local_name() {
                    "barrierType" => barrier.barrier_type = cursor.read_code(field)?,
                    "distance" => barrier.distance = cursor.read_value(field)?,
                    "averageHeight" => barrier.average_height = cursor.read_value(field)?,
                    "maximumHeight" => barrier.maximum_height = cursor.read_value(field)?,
                    "minimumHeight" => barrier.minimum_height = cursor.read_value(field)?,
                    "porosity" => barrier.porosity = cursor.read_value(field)?,
                    _ => return Ok(false),
                }
                Ok(true)
            })?;
            found = Some(barrier);
            Ok(true)
        })?;
        Ok(found)
    }
}
