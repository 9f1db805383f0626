//! Emission variation profiles.
//!
//! A profile describes how an emission varies over a time cycle. Standard
//! profiles are named by a code, custom profiles carry their own values and
//! live in the document definitions, and references point at such a custom
//! profile by local id. IMAER 5 calls them diurnal variations, IMAER 6
//! time-varying profiles; IMAER 4 only knows standard codes.

use std::io::BufRead;

use crate::error::{ImaerError, Result};
use crate::options::{ImaerVersion, WriteContext};
use crate::xml::{Element, Tag, XmlCursor};

/// Element names of one profile generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileNames {
    /// Element at the point of use.
    pub wrapper: &'static str,
    pub standard: &'static str,
    pub reference: &'static str,
    /// Link element, both under the reference and in the definitions.
    pub link: &'static str,
    pub custom: &'static str,
    /// Prefix of `xlink:href` targets.
    pub href_prefix: &'static str,
    /// Prefix of the definition's `gml:id`.
    pub definition_prefix: &'static str,
}

const DIURNAL: ProfileNames = ProfileNames {
    wrapper: "imaer:diurnalVariation",
    standard: "imaer:StandardDiurnalVariation",
    reference: "imaer:ReferenceDiurnalVariation",
    link: "imaer:customDiurnalVariation",
    custom: "imaer:CustomDiurnalVariation",
    href_prefix: "DiurnalProfile",
    // The definition id and the href prefix differ in IMAER 5.
    definition_prefix: "DiurnalProfileS",
};

const TIME_VARYING: ProfileNames = ProfileNames {
    wrapper: "imaer:timeVaryingProfile",
    standard: "imaer:StandardTimeVaryingProfile",
    reference: "imaer:ReferenceTimeVaryingProfile",
    link: "imaer:customTimeVaryingProfile",
    custom: "imaer:CustomTimeVaryingProfile",
    href_prefix: "TimeVaryingProfile",
    definition_prefix: "TimeVaryingProfile",
};

const LEGACY_WRAPPER: &str = "imaer:diurnalVariation";

impl ImaerVersion {
    /// Element names for structured profiles; `None` for IMAER 4.
    pub fn profile_names(self) -> Option<&'static ProfileNames> {
        match self {
            Self::V4_0 => None,
            Self::V5_1 => Some(&DIURNAL),
            Self::V6_0 => Some(&TIME_VARYING),
        }
    }
}

/// Local id from a profile `gml:id` or `xlink:href`, with any known prefix
/// and the leading `#` removed.
fn profile_local_id(id: &str) -> String {
    let id = id.trim().trim_start_matches('#');
    ["DiurnalProfileS.", "DiurnalProfile.", "TimeVaryingProfile."]
        .iter()
        .find_map(|prefix| id.strip_prefix(prefix))
        .unwrap_or(id)
        .to_string()
}

/// Number of values a custom profile of a known type holds.
pub fn expected_value_count(custom_type: &str) -> Option<usize> {
    match custom_type {
        "DAY" => Some(24),
        "THREE_DAY" => Some(72),
        "MONTH" => Some(12),
        _ => None,
    }
}

/// Values as editable text: three per line, `;` between values on a line.
pub fn values_to_csv(values: &[f64]) -> String {
    let mut text = String::new();
    for (i, value) in values.iter().enumerate() {
        text.push_str(&value.to_string());
        text.push(if (i + 1) % 3 == 0 { '\n' } else { ';' });
    }
    text
}

/// Inverse of [`values_to_csv`]. Tokens that are not numbers are dropped.
pub fn values_from_csv(text: &str) -> Vec<f64> {
    text.split('\n')
        .flat_map(|line| line.split(';'))
        .filter_map(|token| token.trim().parse::<f64>().ok())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomVariationProfile {
    pub local_id: String,
    /// `DAY`, `THREE_DAY`, `MONTH`, ...
    pub custom_type: String,
    pub label: Option<String>,
    pub values: Vec<f64>,
}

impl CustomVariationProfile {
    pub fn new(local_id: impl Into<String>, custom_type: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            local_id: local_id.into(),
            custom_type: custom_type.into(),
            label: None,
            values,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Non-empty id and type; for known types also the right value count.
    pub fn is_valid(&self) -> bool {
        !self.local_id.is_empty()
            && !self.custom_type.is_empty()
            && expected_value_count(&self.custom_type)
                .map_or(!self.values.is_empty(), |n| n == self.values.len())
    }

    pub fn values_to_csv(&self) -> String {
        values_to_csv(&self.values)
    }

    pub fn set_values_from_csv(&mut self, text: &str) {
        self.values = values_from_csv(text);
    }

    /// The definitions entry: the link element wrapping the custom profile.
    pub fn to_definition_element(&self, version: ImaerVersion) -> Result<Element> {
        let names = version.profile_names().ok_or(ImaerError::UnsupportedProfile {
            profile: "custom",
            version: version.as_str(),
        })?;
        let mut custom = Element::new(names.custom).with_attr(
            "gml:id",
            format!("{}.{}", names.definition_prefix, self.local_id),
        );
        custom.push_opt("imaer:label", self.label.as_ref());
        custom.push_value("imaer:customType", &self.custom_type);
        for value in &self.values {
            custom.push_value("imaer:value", value);
        }
        Ok(Element::new(names.link).with_child(custom))
    }

    /// Reads a `CustomDiurnalVariation` or `CustomTimeVaryingProfile`.
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Self> {
        let local_id = tag
            .attr("gml:id")
            .map(profile_local_id)
            .ok_or_else(|| ImaerError::invalid_feature(tag.name(), "missing gml:id"))?;
        let mut profile = Self::new(local_id, String::new(), Vec::new());
        cursor.read_children(tag, |cursor, child| {
            match child.local_name() {
                "label" => profile.label = Some(cursor.read_text(child)?),
                "customType" => profile.custom_type = cursor.read_code(child)?,
                "value" => profile.values.push(cursor.read_value(child)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(profile)
    }

    /// Reads the custom profile inside a definitions link element.
    pub fn from_definition_xml<R: BufRead>(
        cursor: &mut XmlCursor<R>,
        link: &Tag,
    ) -> Result<Option<Self>> {
        let mut profile = None;
        cursor.read_children(link, |cursor, child| {
            match child.local_name() {
                "CustomDiurnalVariation" | "CustomTimeVaryingProfile" => {
                    profile = Some(Self::from_xml(cursor, child)?);
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(profile)
    }
}

/// How an emission varies over time, as used by source characteristics.
#[derive(Debug, Clone, PartialEq)]
pub enum VariationProfile {
    /// A predefined profile code, e.g. `INDUSTRIAL_ACTIVITY`.
    Standard(String),
    /// Local id of a custom profile in the definitions.
    Reference(String),
    Custom(CustomVariationProfile),
}

impl VariationProfile {
    pub fn standard(code: impl Into<String>) -> Self {
        Self::Standard(code.into())
    }

    pub fn reference(local_id: impl Into<String>) -> Self {
        Self::Reference(local_id.into())
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::Standard(code) => !code.is_empty(),
            Self::Reference(id) => !id.is_empty(),
            Self::Custom(custom) => custom.is_valid(),
        }
    }

    /// Local id of the definition this profile depends on, if any.
    pub fn definition_id(&self) -> Option<&str> {
        match self {
            Self::Standard(_) => None,
            Self::Reference(id) => Some(id),
            Self::Custom(custom) => Some(&custom.local_id),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Standard(_) => "standard",
            Self::Reference(_) => "reference",
            Self::Custom(_) => "custom",
        }
    }

    /// Point of use element. A custom profile is written as a reference to
    /// its definition, which must be registered with the document.
    pub fn to_element(&self, ctx: &WriteContext<'_>, owner: &str) -> Result<Element> {
        let Some(names) = ctx.version.profile_names() else {
            return match self {
                Self::Standard(code) => Ok(Element::text_element(LEGACY_WRAPPER, code)),
                _ => Err(ImaerError::UnsupportedProfile {
                    profile: self.kind(),
                    version: ctx.version.as_str(),
                }),
            };
        };

        let inner = match self {
            Self::Standard(code) => {
                Element::new(names.standard).with_child(Element::text_element("imaer:standardType", code))
            }
            Self::Reference(_) | Self::Custom(_) => {
                let id = self.definition_id().unwrap_or_default();
                if !ctx.definitions.contains(id) {
                    return Err(ImaerError::ReferentialIntegrity {
                        owner: owner.to_string(),
                        reference: id.to_string(),
                    });
                }
                Element::new(names.reference).with_child(
                    Element::new(names.link)
                        .with_attr("xlink:href", format!("#{}.{}", names.href_prefix, id)),
                )
            }
        };
        Ok(Element::new(names.wrapper).with_child(inner))
    }

    /// Reads a `diurnalVariation` or `timeVaryingProfile` element. The shape
    /// is recognised by what it holds: a bare code, a standard element, a
    /// reference element, an inline custom profile or an `xlink:href`.
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Option<Self>> {
        if let Some(href) = tag.attr("xlink:href") {
            return Ok(Some(Self::Reference(profile_local_id(href))));
        }

        let mut profile = None;
        let text = cursor.read_mixed(tag, |cursor, child| {
            match child.local_name() {
                "StandardDiurnalVariation" | "StandardTimeVaryingProfile" => {
                    cursor.read_children(child, |cursor, field| {
                        if field.local_name() != "standardType" {
                            return Ok(false);
                        }
                        profile = Some(Self::Standard(cursor.read_code(field)?));
                        Ok(true)
                    })?;
                }
                "ReferenceDiurnalVariation" | "ReferenceTimeVaryingProfile" => {
                    cursor.read_children(child, |_, link| {
                        match link.attr("xlink:href") {
                            Some(href) => {
                                profile = Some(Self::Reference(profile_local_id(href)));
                                Ok(true)
                            }
                            None => Ok(false),
                        }
                    })?;
                }
                "CustomDiurnalVariation" | "CustomTimeVaryingProfile" => {
                    profile = Some(Self::Custom(CustomVariationProfile::from_xml(cursor, child)?));
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;

        let code = text.trim();
        if profile.is_none() && !code.is_empty() {
            profile = Some(Self::Standard(code.to_string()));
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Definitions;
    use crate::xml::{read_fragment, ParseMode};

    fn day_profile() -> CustomVariationProfile {
        CustomVariationProfile::new("125", "DAY", [150.0, 50.0].repeat(12))
    }

    fn write(profile: &VariationProfile, version: ImaerVersion, definitions: &Definitions) -> Result<String> {
        let ctx = WriteContext::new(version, definitions);
        profile.to_element(&ctx, "ES.1")?.to_xml_string()
    }

    #[test]
    fn test_csv_three_values_per_line() {
        assert_eq!(values_to_csv(&[1.0, 2.0, 3.0, 4.5]), "1;2;3\n4.5;");
        assert_eq!(values_to_csv(&[]), "");
    }

    #[test]
    fn test_csv_round_trip() {
        let values = [150.0, 50.0].repeat(12);
        assert_eq!(values_from_csv(&values_to_csv(&values)), values);
        let odd = vec![0.1, -2.5, 1e-3, 7.0];
        assert_eq!(values_from_csv(&values_to_csv(&odd)), odd);
    }

    #[test]
    fn test_csv_drops_malformed_tokens() {
        assert_eq!(values_from_csv("1;x;3"), vec![1.0, 3.0]);
        assert_eq!(values_from_csv("1;2;3\n;;\nfoo\n4"), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_custom_validity() {
        assert!(day_profile().is_valid());
        assert!(!CustomVariationProfile::new("1", "DAY", vec![1.0; 12]).is_valid());
        assert!(CustomVariationProfile::new("1", "MONTH", vec![1.0; 12]).is_valid());
        assert!(CustomVariationProfile::new("1", "OTHER", vec![1.0]).is_valid());
    }

    #[test]
    fn test_standard_element_per_version() {
        let definitions = Definitions::default();
        let profile = VariationProfile::standard("INDUSTRIAL_ACTIVITY");
        assert_eq!(
            write(&profile, ImaerVersion::V5_1, &definitions).unwrap(),
            "<imaer:diurnalVariation><imaer:StandardDiurnalVariation><imaer:standardType>INDUSTRIAL_ACTIVITY</imaer:standardType></imaer:StandardDiurnalVariation></imaer:diurnalVariation>"
        );
        assert_eq!(
            write(&profile, ImaerVersion::V6_0, &definitions).unwrap(),
            "<imaer:timeVaryingProfile><imaer:StandardTimeVaryingProfile><imaer:standardType>INDUSTRIAL_ACTIVITY</imaer:standardType></imaer:StandardTimeVaryingProfile></imaer:timeVaryingProfile>"
        );
        assert_eq!(
            write(&profile, ImaerVersion::V4_0, &definitions).unwrap(),
            "<imaer:diurnalVariation>INDUSTRIAL_ACTIVITY</imaer:diurnalVariation>"
        );
    }

    #[test]
    fn test_reference_needs_definition() {
        let mut definitions = Definitions::default();
        let profile = VariationProfile::reference("125");
        assert!(matches!(
            write(&profile, ImaerVersion::V5_1, &definitions),
            Err(ImaerError::ReferentialIntegrity { .. })
        ));

        definitions.register(day_profile()).unwrap();
        assert_eq!(
            write(&profile, ImaerVersion::V5_1, &definitions).unwrap(),
            r##"<imaer:diurnalVariation><imaer:ReferenceDiurnalVariation><imaer:customDiurnalVariation xlink:href="#DiurnalProfile.125"/></imaer:ReferenceDiurnalVariation></imaer:diurnalVariation>"##
        );
        // an inline custom profile is written as a reference as well
        assert_eq!(
            write(&VariationProfile::Custom(day_profile()), ImaerVersion::V5_1, &definitions).unwrap(),
            write(&profile, ImaerVersion::V5_1, &definitions).unwrap()
        );
    }

    #[test]
    fn test_legacy_version_rejects_custom_profiles() {
        let mut definitions = Definitions::default();
        definitions.register(day_profile()).unwrap();
        let err = write(&VariationProfile::reference("125"), ImaerVersion::V4_0, &definitions).unwrap_err();
        assert!(matches!(err, ImaerError::UnsupportedProfile { profile: "reference", .. }));
        assert!(day_profile().to_definition_element(ImaerVersion::V4_0).is_err());
    }

    #[test]
    fn test_definition_element() {
        let profile = CustomVariationProfile::new("7", "MONTH", vec![1.0, 2.5]).with_label("winter");
        let xml = profile
            .to_definition_element(ImaerVersion::V5_1)
            .unwrap()
            .to_xml_string()
            .unwrap();
        assert_eq!(
            xml,
            r#"<imaer:customDiurnalVariation><imaer:CustomDiurnalVariation gml:id="DiurnalProfileS.7"><imaer:label>winter</imaer:label><imaer:customType>MONTH</imaer:customType><imaer:value>1</imaer:value><imaer:value>2.5</imaer:value></imaer:CustomDiurnalVariation></imaer:customDiurnalVariation>"#
        );
        let parsed = read_fragment(&xml, ParseMode::Strict, CustomVariationProfile::from_definition_xml)
            .unwrap()
            .unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_time_varying_definition_id() {
        let element = day_profile().to_definition_element(ImaerVersion::V6_0).unwrap();
        let custom = element.find("imaer:CustomTimeVaryingProfile").unwrap();
        assert_eq!(custom.attribute("gml:id"), Some("TimeVaryingProfile.125"));
    }

    #[test]
    fn test_parse_recognises_each_shape() {
        let standard = "<imaer:diurnalVariation><imaer:StandardDiurnalVariation><imaer:standardType>TRAFFIC</imaer:standardType></imaer:StandardDiurnalVariation></imaer:diurnalVariation>";
        let reference = r##"<imaer:timeVaryingProfile><imaer:ReferenceTimeVaryingProfile><imaer:customTimeVaryingProfile xlink:href="#TimeVaryingProfile.9"/></imaer:ReferenceTimeVaryingProfile></imaer:timeVaryingProfile>"##;
        let legacy = "<imaer:diurnalVariation>CONTINUOUS</imaer:diurnalVariation>";
        let inline = r#"<imaer:diurnalVariation><imaer:CustomDiurnalVariation gml:id="DiurnalProfileS.3"><imaer:customType>MONTH</imaer:customType><imaer:value>2</imaer:value></imaer:CustomDiurnalVariation></imaer:diurnalVariation>"#;
        let attribute = r##"<imaer:diurnalVariation xlink:href="#DiurnalProfile.4"/>"##;

        let read = |xml| read_fragment(xml, ParseMode::Strict, VariationProfile::from_xml).unwrap();
        assert_eq!(read(standard), Some(VariationProfile::standard("TRAFFIC")));
        assert_eq!(read(reference), Some(VariationProfile::reference("9")));
        assert_eq!(read(legacy), Some(VariationProfile::standard("CONTINUOUS")));
        assert_eq!(
            read(inline),
            Some(VariationProfile::Custom(CustomVariationProfile::new("3", "MONTH", vec![2.0])))
        );
        assert_eq!(read(attribute), Some(VariationProfile::reference("4")));
    }

    #[test]
    fn test_unparsable_value_fails_the_profile() {
        let xml = r#"<imaer:CustomDiurnalVariation gml:id="DiurnalProfileS.3"><imaer:customType>DAY</imaer:customType><imaer:value>high</imaer:value></imaer:CustomDiurnalVariation>"#;
        let err = read_fragment(xml, ParseMode::Lenient, CustomVariationProfile::from_xml).unwrap_err();
        assert!(err.is_recoverable());
    }
}
