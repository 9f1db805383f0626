use thiserror::Error;

/// Errors raised while reading or writing IMAER documents.
#[derive(Debug, Error)]
pub enum ImaerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Text of an element could not be converted to the expected type.
    #[error("Invalid value '{value}' in <{element}>: {reason}")]
    InvalidValue {
        element: String,
        value: String,
        reason: String,
    },

    /// Only raised in strict parse mode.
    #[error("Unexpected element <{element}> inside <{parent}>")]
    UnexpectedElement { parent: String, element: String },

    #[error("Unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    #[error("Not an IMAER feature collection: root element is <{0}>")]
    NotImaer(String),

    /// A feature failed its validity check and cannot be written.
    #[error("Invalid {feature}: {reason}")]
    InvalidFeature { feature: String, reason: String },

    #[error("{owner} refers to profile '{reference}' which is not in the definitions")]
    ReferentialIntegrity { owner: String, reference: String },

    #[error("Profile '{0}' is defined more than once")]
    DuplicateDefinition(String),

    #[error("{profile} profiles cannot be written as IMAER {version}")]
    UnsupportedProfile {
        profile: &'static str,
        version: &'static str,
    },
}

impl ImaerError {
    pub fn invalid_value(
        element: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidValue {
            element: element.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_feature(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFeature {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    /// Errors after which the cursor is still positioned inside a well formed
    /// record, so a lenient reader can drop the record and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidValue { .. } | Self::InvalidFeature { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ImaerError>;
