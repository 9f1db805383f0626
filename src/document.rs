//! The IMAER feature collection: metadata, shared definitions and the
//! ordered feature members.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, Event};
use quick_xml::Writer;
use tracing::{debug, info, warn};

use crate::error::{ImaerError, Result};
use crate::model::{
    Building, CustomVariationProfile, Definitions, EmissionSource, FeatureMember, Metadata,
    Receptor, VariationProfile,
};
use crate::options::{ImaerVersion, ParseOptions, WriteContext, WriteOptions};
use crate::xml::{Element, ParseMode, ParseReport, XmlCursor, GML_NS, XLINK_NS, XSI_NS};

const ROOT_ELEMENT: &str = "imaer:FeatureCollectionCalculator";
const COLLECTION_GML_ID: &str = "NL.IMAER.Collection";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Schema flavour used for writing. Set from the namespace when parsed.
    pub version: ImaerVersion,
    pub metadata: Option<Metadata>,
    pub definitions: Definitions,
    pub feature_members: Vec<FeatureMember>,
}

impl Document {
    pub fn new(version: ImaerVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Registers a custom profile so members can refer to it.
    pub fn add_definition(&mut self, profile: CustomVariationProfile) -> Result<()> {
        self.definitions.register(profile)
    }

    pub fn add_member(&mut self, member: impl Into<FeatureMember>) {
        self.feature_members.push(member.into());
    }

    pub fn sources(&self) -> impl Iterator<Item = &EmissionSource> {
        self.feature_members.iter().filter_map(FeatureMember::as_source)
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.feature_members.iter().filter_map(|member| match member {
            FeatureMember::Building(building) => Some(building),
            _ => None,
        })
    }

    pub fn receptors(&self) -> impl Iterator<Item = &Receptor> {
        self.feature_members.iter().filter_map(FeatureMember::as_receptor)
    }

    /// Checks every member and every profile reference before writing.
    pub fn validate(&self) -> Result<()> {
        for member in &self.feature_members {
            let owner = member.gml_id().unwrap_or_else(|| member.kind().to_string());
            if !member.is_valid() {
                return Err(ImaerError::invalid_feature(owner, "failed its validity check"));
            }
            if let Some(reference) = member.profile().and_then(VariationProfile::definition_id) {
                if !self.definitions.contains(reference) {
                    return Err(ImaerError::ReferentialIntegrity {
                        owner,
                        reference: reference.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The complete element tree, root included.
    pub fn to_element(&self) -> Result<Element> {
        self.validate()?;
        let namespace = self.version.namespace();
        let mut root = Element::new(ROOT_ELEMENT)
            .with_attr("xmlns:imaer", &namespace)
            .with_attr("xmlns:gml", GML_NS)
            .with_attr("xmlns:xlink", XLINK_NS)
            .with_attr("xmlns:xsi", XSI_NS)
            .with_attr("gml:id", COLLECTION_GML_ID)
            .with_attr("xsi:schemaLocation", self.version.schema_location());

        if let Some(metadata) = self.metadata.as_ref().filter(|m| !m.is_empty()) {
            root.push(metadata.to_element());
        }
        if let Some(definitions) = self.definitions.to_element(self.version)? {
            root.push(definitions);
        }
        let ctx = WriteContext::new(self.version, &self.definitions);
        for member in &self.feature_members {
            root.push(member.to_element(&ctx)?);
        }
        Ok(root)
    }

    /// Writes the document, XML declaration included.
    pub fn to_writer<W: Write>(&self, writer: W, options: &WriteOptions) -> Result<()> {
        let root = self.to_element()?;
        let mut writer = if options.indent {
            Writer::new_with_indent(writer, b' ', 2)
        } else {
            Writer::new(writer)
        };
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        root.write_to(&mut writer)?;
        writer.into_inner().flush()?;
        Ok(())
    }

    pub fn to_xml_string(&self, options: &WriteOptions) -> Result<String> {
        let mut buffer = Vec::new();
        self.to_writer(&mut buffer, options)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn serialize_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.serialize_to_file_with(path, &WriteOptions::default())
    }

    pub fn serialize_to_file_with<P: AsRef<Path>>(&self, path: P, options: &WriteOptions) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.to_writer(BufWriter::new(file), options)?;
        info!(
            "Written {} feature members as IMAER {} to {:?}",
            self.feature_members.len(),
            self.version,
            path
        );
        Ok(())
    }

    /// Parses leniently and logs whatever had to be left out.
    pub fn parse_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (document, report) = Self::parse_from_file_with(path, &ParseOptions::default())?;
        for record in &report.rejected {
            warn!("Dropped <{}>: {}", record.element, record.reason);
        }
        Ok(document)
    }

    pub fn parse_from_file_with<P: AsRef<Path>>(
        path: P,
        options: &ParseOptions,
    ) -> Result<(Self, ParseReport)> {
        let path = path.as_ref();
        info!("Parsing {:?}", path);
        let file = File::open(path)?;
        Self::from_reader_with(BufReader::new(file), options)
    }

    pub fn parse_str(xml: &str, options: &ParseOptions) -> Result<(Self, ParseReport)> {
        Self::from_reader_with(xml.as_bytes(), options)
    }

    /// Reads a whole feature collection from `reader`.
    pub fn from_reader_with<R: BufRead>(reader: R, options: &ParseOptions) -> Result<(Self, ParseReport)> {
        let mut cursor = XmlCursor::new(reader, options.mode);
        let root = cursor.read_root()?;
        if !root.local_name().starts_with("FeatureCollection") {
            return Err(ImaerError::NotImaer(root.name().to_string()));
        }

        let mut document = Self::default();
        match root.attr("xmlns:imaer").and_then(ImaerVersion::from_namespace) {
            Some(version) => document.version = version,
            None if options.mode == ParseMode::Strict => {
                return Err(ImaerError::NotImaer(root.name().to_string()));
            }
            None => warn!(
                "No known IMAER namespace on <{}>, assuming {}",
                root.name(),
                document.version
            ),
        }
        debug!("IMAER version {}", document.version);

        cursor.read_children(&root, |cursor, tag| {
            match tag.local_name() {
                "metadata" => {
                    document.metadata = cursor.read_record(tag, Metadata::from_xml)?;
                }
                "definitions" => document.definitions.read_xml(cursor, tag)?,
                "featureMember" => {
                    if let Some(member) = FeatureMember::from_xml(cursor, tag)? {
                        document.feature_members.push(member);
                    }
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;

        document.collect_inline_profiles(&mut cursor)?;
        document.check_references(&mut cursor)?;

        let report = cursor.into_report();
        info!(
            "Parsed {} feature members, {} definitions ({} skipped, {} rejected)",
            document.feature_members.len(),
            document.definitions.len(),
            report.skipped.len(),
            report.rejected.len()
        );
        Ok((document, report))
    }

    /// Custom profiles written inline at their point of use end up in the
    /// definitions, the way a document built in memory would hold them.
    /// An inline profile whose id is already defined with other values is
    /// a conflict: rejected when lenient, an error when strict.
    fn collect_inline_profiles<R: BufRead>(&mut self, cursor: &mut XmlCursor<R>) -> Result<()> {
        let inline: Vec<(String, CustomVariationProfile)> = self
            .feature_members
            .iter()
            .filter_map(|member| match member.profile() {
                Some(VariationProfile::Custom(custom)) => Some((
                    member.gml_id().unwrap_or_else(|| member.kind().to_string()),
                    custom.clone(),
                )),
                _ => None,
            })
            .collect();
        for (owner, profile) in inline {
            match self.definitions.get(&profile.local_id) {
                Some(existing) if *existing == profile => {}
                Some(_) => {
                    let err = ImaerError::DuplicateDefinition(profile.local_id);
                    match cursor.mode() {
                        ParseMode::Strict => return Err(err),
                        ParseMode::Lenient => cursor.reject(&owner, err.to_string()),
                    }
                }
                None => {
                    debug!("Registering inline profile {}", profile.local_id);
                    self.definitions.register(profile)?;
                }
            }
        }
        Ok(())
    }

    fn check_references<R: BufRead>(&self, cursor: &mut XmlCursor<R>) -> Result<()> {
        for member in &self.feature_members {
            let Some(reference) = member.profile().and_then(VariationProfile::definition_id) else {
                continue;
            };
            if self.definitions.contains(reference) {
                continue;
            }
            let owner = member.gml_id().unwrap_or_else(|| member.kind().to_string());
            let err = ImaerError::ReferentialIntegrity {
                owner: owner.clone(),
                reference: reference.to_string(),
            };
            match cursor.mode() {
                ParseMode::Strict => return Err(err),
                ParseMode::Lenient => cursor.reject(&owner, err.to_string()),
            }
        }
        Ok(())
    }
}
