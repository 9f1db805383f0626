//! Typed IMAER entities.
//!
//! Every entity builds its own [`Element`] tree for writing and reads itself
//! back from an [`XmlCursor`] positioned on its start tag.

use std::io::BufRead;

use crate::error::Result;
use crate::options::WriteContext;
use crate::xml::{Element, Tag, XmlCursor};

pub mod building;
pub mod characteristics;
pub mod definitions;
pub mod emission;
pub mod geometry;
pub mod identifier;
pub mod metadata;
pub mod profile;
pub mod receptor;
pub mod road;
pub mod source;

pub use building::Building;
pub use characteristics::{AdmsCharacteristics, HeatContent, OpsCharacteristics, SourceCharacteristics};
pub use definitions::Definitions;
pub use emission::{Emission, Substance};
pub use geometry::{GmlGeometry, GmlLineString, GmlPoint, GmlPolygon};
pub use identifier::Nen3610Id;
pub use metadata::Metadata;
pub use profile::{CustomVariationProfile, VariationProfile};
pub use receptor::{
    AttributeValue, CalculationResult, PointDetails, Receptor, ReceptorKind, ResultType,
};
pub use road::{AdmsRoadSideBarrier, CustomVehicle, RoadSideBarrier, StandardVehicle, Vehicle};
pub use source::{AdmsRoad, EmissionSource, SourceKind, Srm2Road};

/// Content of one `imaer:featureMember`.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureMember {
    EmissionSource(EmissionSource),
    Building(Building),
    Receptor(Receptor),
}

impl From<EmissionSource> for FeatureMember {
    fn from(value: EmissionSource) -> Self {
        Self::EmissionSource(value)
    }
}

impl From<Building> for FeatureMember {
    fn from(value: Building) -> Self {
        Self::Building(value)
    }
}

impl From<Receptor> for FeatureMember {
    fn from(value: Receptor) -> Self {
        Self::Receptor(value)
    }
}

impl FeatureMember {
    pub fn gml_id(&self) -> Option<String> {
        match self {
            Self::EmissionSource(source) => Some(source.gml_id()),
            Self::Building(building) => Some(building.gml_id()),
            Self::Receptor(receptor) => receptor.gml_id(),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::EmissionSource(source) => source.is_valid(),
            Self::Building(building) => building.is_valid(),
            Self::Receptor(receptor) => receptor.is_valid(),
        }
    }

    /// Short name used in logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmissionSource(_) => "source",
            Self::Building(_) => "building",
            Self::Receptor(_) => "receptor",
        }
    }

    pub fn as_receptor(&self) -> Option<&Receptor> {
        match self {
            Self::Receptor(receptor) => Some(receptor),
            _ => None,
        }
    }

    pub fn as_source(&self) -> Option<&EmissionSource> {
        match self {
            Self::EmissionSource(source) => Some(source),
            _ => None,
        }
    }

    /// The profile this member uses, if it points into the definitions.
    pub fn profile(&self) -> Option<&VariationProfile> {
        match self {
            Self::EmissionSource(source) => source.characteristics.as_ref()?.profile(),
            _ => None,
        }
    }

    /// `imaer:featureMember` wrapping the member's own element.
    pub fn to_element(&self, ctx: &WriteContext<'_>) -> Result<Element> {
        let inner = match self {
            Self::EmissionSource(source) => source.to_element(ctx)?,
            Self::Building(building) => building.to_element()?,
            Self::Receptor(receptor) => receptor.to_element()?,
        };
        Ok(Element::new("imaer:featureMember").with_child(inner))
    }

    /// Reads an `imaer:featureMember`. A member that fails to read is
    /// dropped in lenient mode and `None` is returned.
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, wrapper: &Tag) -> Result<Option<Self>> {
        let mut member = None;
        cursor.read_children(wrapper, |cursor, tag| {
            member = match tag.local_name() {
                "EmissionSource" | "SRM2Road" | "ADMSRoad" => cursor
                    .read_record(tag, EmissionSource::from_xml)?
                    .map(Self::from),
                "Building" => cursor.read_record(tag, Building::from_xml)?.map(Self::from),
                name if ReceptorKind::for_element(name).is_some() => {
                    cursor.read_record(tag, Receptor::from_xml)?.map(Self::from)
                }
                _ => return Ok(false),
            };
            Ok(true)
        })?;
        Ok(member)
    }
}
