use std::io::BufRead;

use crate::error::Result;
use crate::model::emission::Substance;
use crate::model::receptor::ResultType;
use crate::xml::{Element, Tag, XmlCursor};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectMetadata {
    pub year: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SituationMetadata {
    pub name: Option<String>,
    pub reference: Option<String>,
    /// `REFERENCE`, `PROPOSED`, `TEMPORARY`, ...
    pub situation_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculationMetadata {
    /// `NATURE_AREA`, `CUSTOM_POINTS`, ...
    pub calculation_type: Option<String>,
    pub substances: Vec<Substance>,
    pub result_type: Option<ResultType>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionMetadata {
    pub aerius_version: Option<String>,
    pub database_version: Option<String>,
}

/// `AeriusCalculatorMetadata`. Sections without any value are not written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub project: ProjectMetadata,
    pub situation: SituationMetadata,
    pub calculation: CalculationMetadata,
    pub version: VersionMetadata,
}

fn section(name: &str, fields: Element) -> Option<Element> {
    if fields.children().next().is_none() {
        return None;
    }
    Some(Element::new(name).with_child(fields))
}

/// Walks `section/SectionMetadata` and hands each field to `visit`.
fn read_section<R, F>(cursor: &mut XmlCursor<R>, tag: &Tag, mut visit: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&mut XmlCursor<R>, &Tag) -> Result<bool>,
{
    cursor.read_children(tag, |cursor, inner| {
        if !inner.local_name().ends_with("Metadata") {
            return Ok(false);
        }
        cursor.read_children(inner, &mut visit)?;
        Ok(true)
    })
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_element(&self) -> Element {
        let mut root = Element::new("imaer:AeriusCalculatorMetadata");

        let mut project = Element::new("imaer:ProjectMetadata");
        project.push_opt("imaer:year", self.project.year);
        project.push_opt("imaer:description", self.project.description.as_ref());

        let mut situation = Element::new("imaer:SituationMetadata");
        situation.push_opt("imaer:name", self.situation.name.as_ref());
        situation.push_opt("imaer:reference", self.situation.reference.as_ref());
        situation.push_opt("imaer:situationType", self.situation.situation_type.as_ref());

        let mut calculation = Element::new("imaer:CalculationMetadata");
        calculation.push_opt("imaer:type", self.calculation.calculation_type.as_ref());
        for substance in &self.calculation.substances {
            calculation.push_value("imaer:substance", substance);
        }
        calculation.push_opt("imaer:resultType", self.calculation.result_type);

        let mut version = Element::new("imaer:VersionMetadata");
        version.push_opt("imaer:aeriusVersion", self.version.aerius_version.as_ref());
        version.push_opt("imaer:databaseVersion", self.version.database_version.as_ref());

        let sections = [
            section("imaer:project", project),
            section("imaer:situation", situation),
            section("imaer:calculation", calculation),
            section("imaer:version", version),
        ];
        for element in sections.into_iter().flatten() {
            root.push(element);
        }
        Element::new("imaer:metadata").with_child(root)
    }

    /// Reads an `imaer:metadata` element.
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Self> {
        let mut metadata = Self::default();
        cursor.read_children(tag, |cursor, root| {
            if root.local_name() != "AeriusCalculatorMetadata" {
                return Ok(false);
            }
            cursor.read_children(root, |cursor, section| {
                match section.local_name() {
                    "project" => read_section(cursor, section, |cursor, field| {
                        match field.local_name() {
                            "year" => metadata.project.year = Some(cursor.read_value(field)?),
                            "description" => {
                                metadata.project.description = Some(cursor.read_text(field)?)
                            }
                            _ => return Ok(false),
                        }
                        Ok(true)
                    })?,
                    "situation" => read_section(cursor, section, |cursor, field| {
                        let value = Some(match field.local_name() {
                            "name" | "reference" => cursor.read_text(field)?,
                            "situationType" => cursor.read_code(field)?,
                            _ => return Ok(false),
                        });
                        match field.local_name() {
                            "name" => metadata.situation.name = value,
                            "reference" => metadata.situation.reference = value,
                            _ => metadata.situation.situation_type = value,
                        }
                        Ok(true)
                    })?,
                    "calculation" => read_section(cursor, section, |cursor, field| {
                        match field.local_name() {
                            "type" => {
                                metadata.calculation.calculation_type = Some(cursor.read_code(field)?)
                            }
                            "substance" => metadata.calculation.substances.push(cursor.read_value(field)?),
                            "resultType" => {
                                metadata.calculation.result_type = Some(cursor.read_value(field)?)
                            }
                            _ => return Ok(false),
                        }
                        Ok(true)
                    })?,
                    "version" => read_section(cursor, section, |cursor, field| {
                        match field.local_name() {
                            "aeriusVersion" => {
                                metadata.version.aerius_version = Some(cursor.read_code(field)?)
                            }
                            "databaseVersion" => {
                                metadata.version.database_version = Some(cursor.read_code(field)?)
                            }
                            _ => return Ok(false),
                        }
                        Ok(true)
                    })?,
                    _ => return Ok(false),
                }
                Ok(true)
            })?;
            Ok(true)
        })?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{read_fragment, ParseMode};

    fn metadata() -> Metadata {
        Metadata {
            project: ProjectMetadata {
                year: Some(2020),
                description: Some("Some description...".to_string()),
            },
            situation: SituationMetadata {
                name: Some("Situation 1".to_string()),
                reference: Some("ABCDE12345".to_string()),
                situation_type: Some("PROPOSED".to_string()),
            },
            calculation: CalculationMetadata {
                calculation_type: Some("NATURE_AREA".to_string()),
                substances: vec![Substance::Nh3, Substance::Nox],
                result_type: Some(ResultType::Deposition),
            },
            version: VersionMetadata {
                aerius_version: Some("2019A_20200610_3aefc4c15b".to_string()),
                database_version: Some("2019A_20200610_3aefc4c15b".to_string()),
            },
        }
    }

    #[test]
    fn test_metadata_round_trip() {
        let xml = metadata().to_element().to_xml_string().unwrap();
        assert!(xml.contains(
            "<imaer:project><imaer:ProjectMetadata><imaer:year>2020</imaer:year>"
        ));
        let parsed = read_fragment(&xml, ParseMode::Strict, Metadata::from_xml).unwrap();
        assert_eq!(parsed, metadata());
    }

    #[test]
    fn test_empty_sections_are_left_out() {
        let only_year = Metadata {
            project: ProjectMetadata {
                year: Some(2030),
                description: None,
            },
            ..Metadata::default()
        };
        let element = only_year.to_element();
        let root = element.find("imaer:AeriusCalculatorMetadata").unwrap();
        assert_eq!(root.children().count(), 1);
        assert!(Metadata::default().is_empty());
        assert!(!only_year.is_empty());
    }
}
