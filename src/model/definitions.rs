use std::io::BufRead;
use tracing::debug;

use crate::error::{ImaerError, Result};
use crate::model::profile::CustomVariationProfile;
use crate::options::ImaerVersion;
use crate::xml::{Element, ParseMode, Tag, XmlCursor};

/// Shared custom profiles, looked up by local id. Insertion order is the
/// order they are written in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definitions {
    profiles: Vec<CustomVariationProfile>,
}

impl Definitions {
    /// Adds a profile; its local id must not be taken yet.
    pub fn register(&mut self, profile: CustomVariationProfile) -> Result<()> {
        if self.contains(&profile.local_id) {
            return Err(ImaerError::DuplicateDefinition(profile.local_id));
        }
        self.profiles.push(profile);
        Ok(())
    }

    pub fn get(&self, local_id: &str) -> Option<&CustomVariationProfile> {
        self.profiles.iter().find(|p| p.local_id == local_id)
    }

    pub fn contains(&self, local_id: &str) -> bool {
        self.get(local_id).is_some()
    }

    pub fn remove(&mut self, local_id: &str) -> Option<CustomVariationProfile> {
        let index = self.profiles.iter().position(|p| p.local_id == local_id)?;
        Some(self.profiles.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomVariationProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// `imaer:definitions/imaer:Definitions`, or `None` when there is
    /// nothing to define.
    pub fn to_element(&self, version: ImaerVersion) -> Result<Option<Element>> {
        if self.is_empty() {
            return Ok(None);
        }
        let mut inner = Element::new("imaer:Definitions");
        for profile in &self.profiles {
            inner.push(profile.to_definition_element(version)?);
        }
        Ok(Some(Element::new("imaer:definitions").with_child(inner)))
    }

    /// Reads an `imaer:definitions` element into this registry. Broken
    /// profiles are dropped in lenient mode; duplicates keep the first.
    pub fn read_xml<R: BufRead>(&mut self, cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<()> {
        cursor.read_children(tag, |cursor, inner| {
            if inner.local_name() != "Definitions" {
                return Ok(false);
            }
            cursor.read_children(inner, |cursor, link| {
                match link.local_name() {
                    "customDiurnalVariation" | "customTimeVaryingProfile" => {
                        let profile = cursor
                            .read_record(link, CustomVariationProfile::from_definition_xml)?
                            .flatten();
                        if let Some(profile) = profile {
                            debug!("Definition {}", profile.local_id);
                            if let Err(err) = self.register(profile) {
                                match cursor.mode() {
                                    ParseMode::Strict => return Err(err),
                                    ParseMode::Lenient => {
                                        cursor.reject(link.name(), err.to_string())
                                    }
                                }
                            }
                        }
                    }
                    _ => return Ok(false),
                }
                Ok(true)
            })?;
            Ok(true)
        })
    }
}

impl<'a> IntoIterator for &'a Definitions {
    type Item = &'a CustomVariationProfile;
    type IntoIter = std::slice::Iter<'a, CustomVariationProfile>;

    fn into_iter(self) -> Self::IntoIter {
        self.profiles.iter()
    }
}
