//! Receptors: points where calculation results are evaluated.
//!
//! Four kinds share one layout: `gml:id` and identifier built from a kind
//! specific prefix (`RP`, `SP`, `CP`, `RR`), a `GM_Point`, an optional
//! polygon representation, the results, then the fields of the kind.

use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use crate::error::{ImaerError, Result};
use crate::model::emission::{substance_attr, Substance};
use crate::model::geometry::{GmlPoint, GmlPolygon};
use crate::model::identifier::Nen3610Id;
use crate::xml::{Element, Tag, XmlCursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResultType {
    Deposition,
    Concentration,
    ExceedanceDays,
    ExceedanceHours,
}

impl ResultType {
    pub const ALL: [ResultType; 4] = [
        Self::Deposition,
        Self::Concentration,
        Self::ExceedanceDays,
        Self::ExceedanceHours,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Deposition => "DEPOSITION",
            Self::Concentration => "CONCENTRATION",
            Self::ExceedanceDays => "EXCEEDANCE_DAYS",
            Self::ExceedanceHours => "EXCEEDANCE_HOURS",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ResultType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| format!("unknown result type '{code}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationResult {
    pub result_type: ResultType,
    pub substance: Substance,
    pub value: f64,
}

impl CalculationResult {
    pub fn new(result_type: ResultType, substance: Substance, value: f64) -> Self {
        Self {
            result_type,
            substance,
            value,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.value.is_finite()
    }

    /// `deposition_nh3`, `exceedance_days_pm10`, ...
    pub fn key(&self) -> String {
        format!(
            "{}_{}",
            self.result_type.code().to_lowercase(),
            self.substance.code().to_lowercase()
        )
    }

    fn to_element(self) -> Element {
        Element::new("imaer:result").with_child(
            Element::new("imaer:CalculationResult")
                .with_attr("resultType", self.result_type)
                .with_attr("substance", self.substance)
                .with_child(Element::text_element("imaer:value", self.value)),
        )
    }

    fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Self> {
        let code = tag
            .attr("resultType")
            .ok_or_else(|| ImaerError::invalid_feature(tag.name(), "missing resultType"))?;
        let result_type = code
            .parse()
            .map_err(|reason: String| ImaerError::invalid_value(tag.name(), code, reason))?;
        let substance = substance_attr(tag)?;
        let mut value: Option<f64> = None;
        cursor.read_children(tag, |cursor, field| {
            if field.local_name() != "value" {
                return Ok(false);
            }
            value = Some(cursor.read_value(field)?);
            Ok(true)
        })?;
        let value = value.ok_or_else(|| ImaerError::invalid_feature(tag.name(), "missing value"))?;
        Ok(Self::new(result_type, substance, value))
    }
}

/// Fields shared by calculation points and NCA custom calculation points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointDetails {
    pub label: Option<String>,
    /// Height above ground in metres. Not range checked.
    pub height: Option<f64>,
    pub assessment_category: Option<String>,
    pub description: Option<String>,
    pub road_local_fraction_no2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReceptorKind {
    ReceptorPoint {
        edge_effect: Option<bool>,
    },
    SubPoint {
        sub_point_id: Option<String>,
        /// Zoom level of the sub point grid. Not range checked.
        level: Option<i64>,
    },
    CalculationPoint(PointDetails),
    NcaCustomCalculationPoint(PointDetails),
}

impl ReceptorKind {
    /// Domain prefix of the `gml:id` and identifier.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::ReceptorPoint { .. } => "RP",
            Self::SubPoint { .. } => "SP",
            Self::CalculationPoint(_) => "CP",
            Self::NcaCustomCalculationPoint(_) => "RR",
        }
    }

    pub fn element_name(&self) -> &'static str {
        match self {
            Self::ReceptorPoint { .. } => "imaer:ReceptorPoint",
            Self::SubPoint { .. } => "imaer:SubPoint",
            Self::CalculationPoint(_) => "imaer:CalculationPoint",
            Self::NcaCustomCalculationPoint(_) => "imaer:NcaCustomCalculationPoint",
        }
    }

    /// Kind for an element local name, with empty fields.
    pub fn for_element(local_name: &str) -> Option<Self> {
        match local_name {
            "ReceptorPoint" => Some(Self::ReceptorPoint { edge_effect: None }),
            "SubPoint" => Some(Self::SubPoint {
                sub_point_id: None,
                level: None,
            }),
            "CalculationPoint" => Some(Self::CalculationPoint(PointDetails::default())),
            "NcaCustomCalculationPoint" => {
                Some(Self::NcaCustomCalculationPoint(PointDetails::default()))
            }
            _ => None,
        }
    }

    fn details(&self) -> Option<&PointDetails> {
        match self {
            Self::CalculationPoint(details) | Self::NcaCustomCalculationPoint(details) => {
                Some(details)
            }
            _ => None,
        }
    }
}

/// A value of the receptor attribute table.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Empty for null, `true`/`false` for booleans.
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Column order of [`Receptor::get_attributes_dict`].
pub const RECEPTOR_ATTRIBUTE_FIELDS: [&str; 19] = [
    "receptor_id",
    "edge_effect",
    "sub_point_id",
    "level",
    "label",
    "height",
    "assessment_category",
    "deposition_nh3",
    "deposition_nox",
    "deposition_nox_nh3_sum",
    "concentration_nh3",
    "concentration_nox",
    "concentration_no2",
    "concentration_pm25",
    "concentration_pm10",
    "exceedance_days_pm25",
    "exceedance_days_pm10",
    "exceedance_hours_pm25",
    "exceedance_hours_pm10",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Receptor {
    pub local_id: Option<String>,
    pub identifier: Nen3610Id,
    pub point: Option<GmlPoint>,
    pub representation: Option<GmlPolygon>,
    pub results: Vec<CalculationResult>,
    pub kind: ReceptorKind,
}

impl Receptor {
    fn with_kind(local_id: Option<String>, kind: ReceptorKind) -> Self {
        let identifier = match &local_id {
            Some(id) => Nen3610Id::new(format!("{}.{id}", kind.prefix())),
            None => Nen3610Id::default(),
        };
        Self {
            local_id,
            identifier,
            point: None,
            representation: None,
            results: Vec::new(),
            kind,
        }
    }

    pub fn receptor_point(local_id: impl ToString) -> Self {
        Self::with_kind(
            Some(local_id.to_string()),
            ReceptorKind::ReceptorPoint { edge_effect: None },
        )
    }

    pub fn sub_point(local_id: impl ToString, sub_point_id: impl ToString) -> Self {
        Self::with_kind(
            Some(local_id.to_string()),
            ReceptorKind::SubPoint {
                sub_point_id: Some(sub_point_id.to_string()),
                level: None,
            },
        )
    }

    pub fn calculation_point(local_id: impl ToString) -> Self {
        Self::with_kind(
            Some(local_id.to_string()),
            ReceptorKind::CalculationPoint(PointDetails::default()),
        )
    }

    pub fn nca_custom_calculation_point(local_id: impl ToString) -> Self {
        Self::with_kind(
            Some(local_id.to_string()),
            ReceptorKind::NcaCustomCalculationPoint(PointDetails::default()),
        )
    }

    /// `{prefix}.{local_id}`, once there is a local id.
    pub fn gml_id(&self) -> Option<String> {
        self.local_id
            .as_ref()
            .map(|id| format!("{}.{id}", self.kind.prefix()))
    }

    /// Places the receptor; the point gets id `{gml_id}.POINT`.
    pub fn with_point(mut self, x: f64, y: f64, epsg_id: u32) -> Self {
        let mut point = GmlPoint::new(x, y);
        point.epsg_id = Some(epsg_id);
        point.gml_id = self.gml_id().map(|id| format!("{id}.POINT"));
        self.point = Some(point);
        self
    }

    pub fn with_representation(mut self, polygon: &geo::Polygon<f64>, epsg_id: u32) -> Self {
        let mut representation = GmlPolygon::from_geometry(polygon);
        representation.epsg_id = Some(epsg_id);
        representation.gml_id = self.gml_id().map(|id| format!("{id}.SURFACE"));
        self.representation = Some(representation);
        self
    }

    pub fn with_result(mut self, result_type: ResultType, substance: Substance, value: f64) -> Self {
        self.results
            .push(CalculationResult::new(result_type, substance, value));
        self
    }

    /// A local id, plus a sub point id for sub points.
    pub fn is_valid(&self) -> bool {
        let kind_ok = match &self.kind {
            ReceptorKind::SubPoint { sub_point_id, .. } => sub_point_id.is_some(),
            _ => true,
        };
        self.local_id.as_deref().is_some_and(|id| !id.is_empty()) && kind_ok
    }

    /// Results keyed `{result_type}_{substance}`, lower case.
    pub fn get_results_dict(&self) -> BTreeMap<String, f64> {
        self.results
            .iter()
            .filter(|r| r.is_valid())
            .map(|r| (r.key(), r.value))
            .collect()
    }

    /// Flat attribute table row: every field of [`RECEPTOR_ATTRIBUTE_FIELDS`]
    /// (null when unknown), any further results, and the NOx + NH3
    /// deposition sum.
    pub fn get_attributes_dict(&self) -> BTreeMap<String, AttributeValue> {
        let mut row: BTreeMap<String, AttributeValue> = RECEPTOR_ATTRIBUTE_FIELDS
            .iter()
            .map(|field| (field.to_string(), AttributeValue::Null))
            .collect();

        row.insert("receptor_id".into(), self.local_id.clone().into());
        match &self.kind {
            ReceptorKind::ReceptorPoint { edge_effect } => {
                row.insert("edge_effect".into(), (*edge_effect).into());
            }
            ReceptorKind::SubPoint {
                sub_point_id,
                level,
            } => {
                row.insert("sub_point_id".into(), sub_point_id.clone().into());
                row.insert("level".into(), (*level).into());
            }
            ReceptorKind::CalculationPoint(details)
            | ReceptorKind::NcaCustomCalculationPoint(details) => {
                row.insert("label".into(), details.label.clone().into());
                row.insert("height".into(), details.height.into());
                row.insert(
                    "assessment_category".into(),
                    details.assessment_category.clone().into(),
                );
            }
        }

        for (key, value) in self.get_results_dict() {
            row.insert(key, AttributeValue::Float(value));
        }

        let deposition = |key: &str| row.get(key).and_then(AttributeValue::as_f64).unwrap_or(0.0);
        let sum = deposition("deposition_nh3") + deposition("deposition_nox");
        row.insert("deposition_nox_nh3_sum".into(), AttributeValue::Float(sum));
        row
    }

    pub fn to_element(&self) -> Result<Element> {
        let (Some(local_id), Some(gml_id)) = (self.local_id.as_deref(), self.gml_id()) else {
            return Err(ImaerError::invalid_feature(
                self.kind.element_name(),
                "a receptor needs a local id",
            ));
        };
        if !self.is_valid() {
            return Err(ImaerError::invalid_feature(&gml_id, "a sub point needs a sub point id"));
        }

        let mut element = Element::new(self.kind.element_name()).with_attr("gml:id", &gml_id);
        match &self.kind {
            ReceptorKind::ReceptorPoint { .. } => {
                element.set_attr("receptorPointId", local_id);
            }
            ReceptorKind::SubPoint { sub_point_id, .. } => {
                element.set_attr("receptorPointId", local_id);
                if let Some(id) = sub_point_id {
                    element.set_attr("subPointId", id);
                }
            }
            _ => {}
        }

        if self.identifier.is_valid() {
            element.push(self.identifier.to_wrapped_element()?);
        }
        if let Some(point) = &self.point {
            element.push(
                Element::new("imaer:GM_Point").with_child(point.to_element(&format!("{gml_id}.POINT"))?),
            );
        }
        if let Some(representation) = &self.representation {
            element.push(
                Element::new("imaer:representation")
                    .with_child(representation.to_element(&format!("{gml_id}.SURFACE"))?),
            );
        }
        for result in &self.results {
            element.push(result.to_element());
        }

        match &self.kind {
            ReceptorKind::ReceptorPoint { edge_effect } => {
                element.push_opt("imaer:edgeEffect", *edge_effect);
            }
            ReceptorKind::SubPoint { level, .. } => {
                element.push_opt("imaer:level", *level);
            }
            _ => {}
        }
        if let Some(details) = self.kind.details() {
            element.push_opt("imaer:label", details.label.as_ref());
            element.push_opt("imaer:height", details.height);
            element.push_opt("imaer:assessmentCategory", details.assessment_category.as_ref());
            element.push_opt("imaer:description", details.description.as_ref());
            element.push_opt("imaer:roadLocalFractionNO2", details.road_local_fraction_no2);
        }
        Ok(element)
    }

    /// Reads any of the four receptor elements.
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Self> {
        let kind = ReceptorKind::for_element(tag.local_name()).ok_or_else(|| {
            ImaerError::invalid_feature(tag.name(), "not a receptor element")
        })?;
        let prefix = format!("{}.", kind.prefix());
        let local_id = tag.attr("receptorPointId").map(str::to_string).or_else(|| {
            tag.attr("gml:id")
                .map(|id| id.strip_prefix(prefix.as_str()).unwrap_or(id).to_string())
        });
        let mut receptor = Self::with_kind(local_id, kind);
        if let ReceptorKind::SubPoint { sub_point_id, .. } = &mut receptor.kind {
            *sub_point_id = tag.attr("subPointId").map(str::to_string);
        }

        cursor.read_children(tag, |cursor, field| {
            match field.local_name() {
                "identifier" => {
                    if let Some(id) = Nen3610Id::from_wrapped_xml(cursor, field)? {
                        if id.is_valid() {
                            receptor.identifier = id;
                        }
                    }
                }
                "GM_Point" => {
                    cursor.read_children(field, |cursor, point| {
                        if point.local_name() != "Point" {
                            return Ok(false);
                        }
                        receptor.point = Some(GmlPoint::from_xml(cursor, point)?);
                        Ok(true)
                    })?;
                }
                "representation" => {
                    cursor.read_children(field, |cursor, polygon| {
                        if polygon.local_name() != "Polygon" {
                            return Ok(false);
                        }
                        let polygon = GmlPolygon::from_xml(cursor, polygon)?;
                        if polygon.is_valid() {
                            receptor.representation = Some(polygon);
                        }
                        Ok(true)
                    })?;
                }
                "result" => {
                    cursor.read_children(field, |cursor, result| {
                        if result.local_name() != "CalculationResult" {
                            return Ok(false);
                        }
                        receptor
                            .results
                            .extend(cursor.read_record(result, CalculationResult::from_xml)?);
                        Ok(true)
                    })?;
                }
                // IMAER 4 writes results without the `result` wrapper
                "CalculationResult" => {
                    receptor
                        .results
                        .extend(cursor.read_record(field, CalculationResult::from_xml)?);
                }
                _ => return read_kind_field(cursor, field, &mut receptor.kind),
            }
            Ok(true)
        })?;

        if !receptor.is_valid() {
            return Err(ImaerError::invalid_feature(
                tag.name(),
                "receptor without a local id or sub point id",
            ));
        }
        Ok(receptor)
    }
}

fn read_kind_field<R: BufRead>(
    cursor: &mut XmlCursor<R>,
    field: &Tag,
    kind: &mut ReceptorKind,
) -> Result<bool> {
    match kind {
        ReceptorKind::ReceptorPoint { edge_effect } => match field.local_name() {
            "edgeEffect" => *edge_effect = Some(cursor.read_bool(field)?),
            _ => return Ok(false),
        },
        ReceptorKind::SubPoint { level, .. } => match field.local_name() {
            "level" => *level = Some(cursor.read_value(field)?),
            _ => return Ok(false),
        },
        ReceptorKind::CalculationPoint(details) | ReceptorKind::NcaCustomCalculationPoint(details) => {
            match field.local_name() {
                "label" => details.label = Some(cursor.read_text(field)?),
                "height" => details.height = Some(cursor.read_value(field)?),
                "assessmentCategory" => details.assessment_category = Some(cursor.read_code(field)?),
                "description" => details.description = Some(cursor.read_text(field)?),
                "roadLocalFractionNO2" => {
                    details.road_local_fraction_no2 = Some(cursor.read_value(field)?)
                }
                _ => return Ok(false),
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{read_fragment, ParseMode};
    use geo::polygon;

    fn round_trip(receptor: &Receptor) -> Receptor {
        let xml = receptor.to_element().unwrap().to_xml_string().unwrap();
        read_fragment(&xml, ParseMode::Strict, Receptor::from_xml).unwrap()
    }

    #[test]
    fn test_domain_prefixes() {
        let rp = Receptor::receptor_point(42).to_element().unwrap();
        assert_eq!(rp.attribute("gml:id"), Some("RP.42"));
        assert_eq!(rp.attribute("receptorPointId"), Some("42"));

        let cp = Receptor::calculation_point(888).to_element().unwrap();
        assert_eq!(cp.attribute("gml:id"), Some("CP.888"));

        let sp = Receptor::sub_point(1, 7).to_element().unwrap();
        assert_eq!(sp.attribute("gml:id"), Some("SP.1"));
        assert_eq!(sp.attribute("subPointId"), Some("7"));

        let rr = Receptor::nca_custom_calculation_point("x").to_element().unwrap();
        assert_eq!(rr.name(), "imaer:NcaCustomCalculationPoint");
        assert_eq!(rr.attribute("gml:id"), Some("RR.x"));

        let identifier = Receptor::receptor_point(42).identifier;
        assert_eq!(identifier.local_id.as_deref(), Some("RP.42"));
    }

    #[test]
    fn test_receptor_without_local_id_is_rejected() {
        let receptor = Receptor::with_kind(None, ReceptorKind::ReceptorPoint { edge_effect: None });
        assert!(!receptor.is_valid());
        assert!(matches!(
            receptor.to_element(),
            Err(ImaerError::InvalidFeature { .. })
        ));
    }

    #[test]
    fn test_sub_point_needs_both_ids() {
        let mut receptor = Receptor::sub_point(3, 1);
        assert!(receptor.is_valid());
        receptor.kind = ReceptorKind::SubPoint {
            sub_point_id: None,
            level: Some(2),
        };
        assert!(!receptor.is_valid());
        assert!(receptor.to_element().is_err());
    }

    #[test]
    fn test_receptor_point_round_trip() {
        let mut receptor = Receptor::receptor_point(4_776_407)
            .with_point(208_413.0, 473_998.0, 28992)
            .with_representation(
                &polygon![
                    (x: 208_400.0, y: 473_990.0),
                    (x: 208_426.0, y: 473_990.0),
                    (x: 208_413.0, y: 474_010.0),
                    (x: 208_400.0, y: 473_990.0),
                ],
                28992,
            )
            .with_result(ResultType::Deposition, Substance::Nh3, 12.5)
            .with_result(ResultType::Concentration, Substance::Nox, 3.25);
        receptor.kind = ReceptorKind::ReceptorPoint {
            edge_effect: Some(true),
        };
        let element = receptor.to_element().unwrap();
        let names: Vec<_> = element.children().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "imaer:identifier",
                "imaer:GM_Point",
                "imaer:representation",
                "imaer:result",
                "imaer:result",
                "imaer:edgeEffect"
            ]
        );
        assert_eq!(round_trip(&receptor), receptor);
    }

    #[test]
    fn test_calculation_point_round_trip() {
        let mut receptor = Receptor::calculation_point(888).with_point(148_458.0, 411_641.0, 28992);
        receptor.kind = ReceptorKind::CalculationPoint(PointDetails {
            label: Some("Pnt 888".to_string()),
            height: Some(1.5),
            assessment_category: Some("ECOLOGY".to_string()),
            description: Some("Point number 888.".to_string()),
            road_local_fraction_no2: Some(0.4),
        });
        let parsed = round_trip(&receptor);
        assert_eq!(parsed, receptor);
        assert_eq!(parsed.local_id.as_deref(), Some("888"));
    }

    #[test]
    fn test_sub_point_level_and_height_are_not_range_checked() {
        let xml = r#"<imaer:SubPoint gml:id="SP.5" receptorPointId="5" subPointId="2"><imaer:level>-3</imaer:level></imaer:SubPoint>"#;
        let parsed = read_fragment(xml, ParseMode::Strict, Receptor::from_xml).unwrap();
        assert_eq!(
            parsed.kind,
            ReceptorKind::SubPoint {
                sub_point_id: Some("2".to_string()),
                level: Some(-3)
            }
        );

        let xml = r#"<imaer:CalculationPoint gml:id="CP.1"><imaer:height>-1000.5</imaer:height></imaer:CalculationPoint>"#;
        let parsed = read_fragment(xml, ParseMode::Strict, Receptor::from_xml).unwrap();
        assert_eq!(parsed.kind.details().and_then(|d| d.height), Some(-1000.5));

        let xml = r#"<imaer:SubPoint gml:id="SP.5" receptorPointId="5" subPointId="2"><imaer:level>2.5</imaer:level></imaer:SubPoint>"#;
        let err = read_fragment(xml, ParseMode::Lenient, Receptor::from_xml).unwrap_err();
        assert!(matches!(err, ImaerError::InvalidValue { .. }));
    }

    #[test]
    fn test_broken_result_only_drops_that_result() {
        let xml = r#"<imaer:ReceptorPoint gml:id="RP.7" receptorPointId="7">
  <imaer:result>
    <imaer:CalculationResult resultType="DEPOSITION" substance="NH3"><imaer:value>1.5</imaer:value></imaer:CalculationResult>
  </imaer:result>
  <imaer:result>
    <imaer:CalculationResult resultType="DEPOSITION" substance="NOXNH3"><imaer:value>2.5</imaer:value></imaer:CalculationResult>
  </imaer:result>
  <imaer:result>
    <imaer:CalculationResult resultType="DEPOSITION" substance="SO2"><imaer:value>9</imaer:value></imaer:CalculationResult>
  </imaer:result>
  <imaer:result>
    <imaer:CalculationResult resultType="PERCENTILE" substance="NOX"><imaer:value>9</imaer:value></imaer:CalculationResult>
  </imaer:result>
</imaer:ReceptorPoint>"#;

        let mut cursor = XmlCursor::new(xml.as_bytes(), ParseMode::Lenient);
        let root = cursor.read_root().unwrap();
        let receptor = Receptor::from_xml(&mut cursor, &root).unwrap();
        assert_eq!(receptor.local_id.as_deref(), Some("7"));
        assert_eq!(
            receptor.results,
            vec![
                CalculationResult::new(ResultType::Deposition, Substance::Nh3, 1.5),
                CalculationResult::new(ResultType::Deposition, Substance::NoxNh3, 2.5),
            ]
        );
        let rejected = &cursor.report().rejected;
        assert_eq!(rejected.len(), 2);
        assert!(rejected.iter().all(|r| r.element == "imaer:CalculationResult"));
        assert!(rejected[0].reason.contains("SO2"));
        assert!(rejected[1].reason.contains("PERCENTILE"));

        let err = read_fragment(xml, ParseMode::Strict, Receptor::from_xml).unwrap_err();
        assert!(matches!(err, ImaerError::InvalidValue { ref value, .. } if value == "SO2"));
    }

    #[test]
    fn test_results_dict_keys() {
        let receptor = Receptor::receptor_point(1)
            .with_result(ResultType::Deposition, Substance::Nh3, 1.0)
            .with_result(ResultType::ExceedanceDays, Substance::Pm10, 3.0);
        let results = receptor.get_results_dict();
        assert_eq!(results.get("deposition_nh3"), Some(&1.0));
        assert_eq!(results.get("exceedance_days_pm10"), Some(&3.0));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_deposition_sum() {
        let cases = [
            (None, None, 0.0),
            (Some(2.5), None, 2.5),
            (None, Some(4.0), 4.0),
            (Some(2.5), Some(4.0), 6.5),
        ];
        for (nh3, nox, expected) in cases {
            let mut receptor = Receptor::receptor_point(1);
            if let Some(value) = nh3 {
                receptor = receptor.with_result(ResultType::Deposition, Substance::Nh3, value);
            }
            if let Some(value) = nox {
                receptor = receptor.with_result(ResultType::Deposition, Substance::Nox, value);
            }
            let row = receptor.get_attributes_dict();
            assert_eq!(row["deposition_nox_nh3_sum"], AttributeValue::Float(expected));
        }
    }

    #[test]
    fn test_attribute_row_has_every_field() {
        let row = Receptor::sub_point(9, 4).get_attributes_dict();
        for field in RECEPTOR_ATTRIBUTE_FIELDS {
            assert!(row.contains_key(field), "missing {field}");
        }
        assert_eq!(row["receptor_id"], AttributeValue::Text("9".to_string()));
        assert_eq!(row["sub_point_id"], AttributeValue::Text("4".to_string()));
        assert!(row["concentration_pm25"].is_null());
        assert!(row["edge_effect"].is_null());
    }
}
