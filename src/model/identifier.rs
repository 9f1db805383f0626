use std::fmt;
use std::io::BufRead;

use crate::error::{ImaerError, Result};
use crate::xml::{Element, Tag, XmlCursor};

pub const DEFAULT_NAMESPACE: &str = "NL.IMAER";

/// `NEN3610ID`: a namespaced local id with an optional version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nen3610Id {
    pub namespace: String,
    pub local_id: Option<String>,
    pub version: Option<String>,
}

impl Default for Nen3610Id {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            local_id: None,
            version: None,
        }
    }
}

impl fmt::Display for Nen3610Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.namespace,
            self.local_id.as_deref().unwrap_or("?")
        )?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

impl Nen3610Id {
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: Some(local_id.into()),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.local_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn to_element(&self) -> Result<Element> {
        let local_id = self
            .local_id
            .as_deref()
            .ok_or_else(|| ImaerError::invalid_feature("NEN3610ID", "missing localId"))?;
        let mut element = Element::new("imaer:NEN3610ID");
        element.push_value("imaer:namespace", &self.namespace);
        element.push_value("imaer:localId", local_id);
        element.push_opt("imaer:versionId", self.version.as_ref());
        Ok(element)
    }

    /// `imaer:identifier` wrapping the `NEN3610ID`.
    pub fn to_wrapped_element(&self) -> Result<Element> {
        Ok(Element::new("imaer:identifier").with_child(self.to_element()?))
    }

    /// Reads a `NEN3610ID`, children in any order. The result may be invalid
    /// when `localId` is missing; callers check [`is_valid`](Self::is_valid).
    pub fn from_xml<R: BufRead>(cursor: &mut XmlCursor<R>, tag: &Tag) -> Result<Self> {
        let mut id = Self {
            namespace: String::new(),
            local_id: None,
            version: None,
        };
        cursor.read_children(tag, |cursor, child| {
            match child.local_name() {
                "namespace" => id.namespace = cursor.read_code(child)?,
                "localId" => id.local_id = Some(cursor.read_code(child)?),
                "versionId" => id.version = Some(cursor.read_code(child)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(id)
    }

    /// Reads the `NEN3610ID` inside an `imaer:identifier` element.
    pub fn from_wrapped_xml<R: BufRead>(
        cursor: &mut XmlCursor<R>,
        wrapper: &Tag,
    ) -> Result<Option<Self>> {
        let mut found = None;
        cursor.read_children(wrapper, |cursor, child| {
            if child.local_name() != "NEN3610ID" {
                return Ok(false);
            }
            found = Some(Self::from_xml(cursor, child)?);
            Ok(true)
        })?;
        Ok(found)
    }
}
