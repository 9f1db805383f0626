//! Codec configuration: schema version and read/write options.

use std::fmt;
use std::str::FromStr;

use crate::model::Definitions;
use crate::xml::ParseMode;

const NAMESPACE_BASE: &str = "http://imaer.aerius.nl/";

/// IMAER schema generation written or detected on read.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ImaerVersion {
    /// Standard profiles only, encoded as a bare code.
    V4_0,
    /// Diurnal variations.
    #[default]
    V5_1,
    /// Time-varying profiles.
    V6_0,
}

impl ImaerVersion {
    pub const ALL: [ImaerVersion; 3] = [Self::V4_0, Self::V5_1, Self::V6_0];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V4_0 => "4.0",
            Self::V5_1 => "5.1",
            Self::V6_0 => "6.0",
        }
    }

    /// `http://imaer.aerius.nl/5.1`
    pub fn namespace(self) -> String {
        format!("{NAMESPACE_BASE}{}", self.as_str())
    }

    pub fn schema_location(self) -> String {
        format!(
            "{ns} {ns}/IMAER.xsd",
            ns = self.namespace()
        )
    }

    /// Version from the `xmlns:imaer` declaration of a document.
    pub fn from_namespace(uri: &str) -> Option<Self> {
        let version = uri.trim().trim_end_matches('/').strip_prefix(NAMESPACE_BASE)?;
        version.parse().ok()
    }
}

impl fmt::Display for ImaerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImaerVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "4" | "4.0" => Ok(Self::V4_0),
            "5" | "5.1" => Ok(Self::V5_1),
            "6" | "6.0" => Ok(Self::V6_0),
            other => Err(format!(
                "unknown IMAER version '{other}' (expected 4.0, 5.1 or 6.0)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub mode: ParseMode,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self {
            mode: ParseMode::Strict,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Two space indentation; compact output otherwise.
    pub indent: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { indent: true }
    }
}

/// What feature members need from their document while writing.
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    pub version: ImaerVersion,
    pub definitions: &'a Definitions,
}

impl<'a> WriteContext<'a> {
    pub fn new(version: ImaerVersion, definitions: &'a Definitions) -> Self {
        Self {
            version,
            definitions,
        }
    }
}
