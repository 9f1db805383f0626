use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use crate::error::{ImaerError, Result};
use crate::xml::{Element, Tag, XmlCursor};

/// Pollutants known to IMAER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Substance {
    Nox,
    No2,
    Nh3,
    Pm10,
    Pm25,
    Ec,
    /// NOx and NH3 together, used for summed deposition results.
    NoxNh3,
}

impl Substance {
    pub const ALL: [Substance; 7] = [
        Self::Nox,
        Self::No2,
        Self::Nh3,
        Self::Pm10,
        Self::Pm25,
        Self::Ec,
        Self::NoxNh3,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Nox => "NOX",
            Self::No2 => "NO2",
            Self::Nh3 => "NH3",
            Self::Pm10 => "PM10",
            Self::Pm25 => "PM25",
            Self::Ec => "EC",
            Self::NoxNh3 => "NOXNH3",
        }
    }
}

impl fmt::Display for Substance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Substance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|substance| substance.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| format!("unknown substance '{code}'"))
    }
}

/// Reads the `substance` attribute of `tag`.
pub(crate) fn substance_attr(tag: &Tag) -> Result<Substance> {
    let code = tag
        .attr("substance")
        .ok_or_else(|| ImaerError::invalid_feature(tag.name(), "missing substance attribute"))?;
    code.parse()
        .map_err(|reason: String| ImaerError::invalid_value(tag.name(), code, reason))
}

/// Yearly emission of one substance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emission {
    pub substance: Substance,
    pub value: f64,
}

impl Emission {
    pub fn new(substance: Substance, value: f64) -> Self {
        Self { substance, value }
    }

    /// `imaer:emission/imaer:Emission substance=".."/imaer:value`
    pub fn to_element(&self) -> Element {
        Element::new("imaer:emission").with_child(
            Element::new("imaer:Emission")
                .with_attr("substance", self.substance)
                .with_child(Element::text_element("imaer:value", self.value)),
        )
    }

    /// Reads the `Emission` inside an `imaer:emission` element.
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, wrapper: &Tag) -> Result<Option<Self>> {
        let mut emission = None;
        cursor.read_children(wrapper, |cursor, tag| {
            if tag.local_name() != "Emission" {
                return Ok(false);
            }
            let substance = substance_attr(tag)?;
            let mut value: Option<f64> = None;
            cursor.read_children(tag, |cursor, field| {
                if field.local_name() != "value" {
                    return Ok(false);
                }
                value = Some(cursor.read_value(field)?);
                Ok(true)
            })?;
            let value =
                value.ok_or_else(|| ImaerError::invalid_feature(tag.name(), "missing value"))?;
            emission = Some(Self { substance, value });
            Ok(true)
        })?;
        Ok(emission)
    }
}

/// Appends one `imaer:emission` element per emission, in order.
pub(crate) fn push_emissions(element: &mut Element, emissions: &[Emission]) {
    for emission in emissions {
        element.push(emission.to_element());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{read_fragment, ParseMode};

    #[test]
    fn test_substance_codes() {
        assert_eq!("NH3".parse::<Substance>(), Ok(Substance::Nh3));
        assert_eq!("pm25".parse::<Substance>(), Ok(Substance::Pm25));
        assert_eq!("NOXNH3".parse::<Substance>(), Ok(Substance::NoxNh3));
        assert!("SO2".parse::<Substance>().is_err());
        for substance in Substance::ALL {
            assert_eq!(substance.code().parse::<Substance>(), Ok(substance));
        }
    }

    #[test]
    fn test_emission_element() {
        let xml = Emission::new(Substance::Nh3, 1.0)
            .to_element()
            .to_xml_string()
            .unwrap();
        assert_eq!(
            xml,
            r#"<imaer:emission><imaer:Emission substance="NH3"><imaer:value>1</imaer:value></imaer:Emission></imaer:emission>"#
        );
        let parsed = read_fragment(&xml, ParseMode::Strict, Emission::from_xml).unwrap();
        assert_eq!(parsed, Some(Emission::new(Substance::Nh3, 1.0)));
    }

    #[test]
    fn test_unknown_substance_is_recoverable() {
        let xml = r#"<imaer:emission><imaer:Emission substance="SO2"><imaer:value>1</imaer:value></imaer:Emission></imaer:emission>"#;
        let err = read_fragment(xml, ParseMode::Lenient, Emission::from_xml).unwrap_err();
        assert!(matches!(err, ImaerError::InvalidValue { .. }));
        assert!(err.is_recoverable());
    }
}
