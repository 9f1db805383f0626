use imaer::model::VariationProfile;
use imaer::{Document, ImaerError, ImaerVersion, ParseOptions, ZipHandler};
use std::fs::File;
use std::io::Write;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn collection(members: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<imaer:FeatureCollectionCalculator xmlns:imaer="http://imaer.aerius.nl/5.1" xmlns:gml="http://www.opengis.net/gml/3.2" xmlns:xlink="http://www.w3.org/1999/xlink" gml:id="NL.IMAER.Collection">
{members}
</imaer:FeatureCollectionCalculator>"#
    )
}

fn source(gml_id: &str, sector_id: &str, extra: &str) -> String {
    format!(
        r#"<imaer:featureMember>
  <imaer:EmissionSource sectorId="{sector_id}" gml:id="{gml_id}">
    {extra}
    <imaer:geometry>
      <imaer:EmissionSourceGeometry>
        <imaer:GM_Point>
          <gml:Point srsName="urn:ogc:def:crs:EPSG::28992" gml:id="{gml_id}.POINT">
            <gml:pos>148458.0 411641.0</gml:pos>
          </gml:Point>
        </imaer:GM_Point>
      </imaer:EmissionSourceGeometry>
    </imaer:geometry>
    <imaer:emission>
      <imaer:Emission substance="NH3">
        <imaer:value>1.0</imaer:value>
      </imaer:Emission>
    </imaer:emission>
  </imaer:EmissionSource>
</imaer:featureMember>"#
    )
}

fn characteristics(profile: &str) -> String {
    format!(
        r#"<imaer:characteristics>
      <imaer:OPSSourceCharacteristics>
        <imaer:heatContent><imaer:SpecifiedHeatContent><imaer:value>0.0</imaer:value></imaer:SpecifiedHeatContent></imaer:heatContent>
        <imaer:emissionHeight>10.0</imaer:emissionHeight>
        {profile}
      </imaer:OPSSourceCharacteristics>
    </imaer:characteristics>"#
    )
}

#[test]
fn test_broken_record_is_dropped_when_lenient() {
    let xml = collection(&format!(
        "{}\n{}",
        source("ES.1", "abc", ""),
        source("ES.2", "9000", "")
    ));

    let (document, report) = Document::parse_str(&xml, &ParseOptions::default()).unwrap();
    assert_eq!(document.feature_members.len(), 1);
    assert_eq!(document.sources().next().unwrap().local_id, "2");
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].element, "imaer:EmissionSource");
    assert!(!report.is_complete());

    let err = Document::parse_str(&xml, &ParseOptions::strict()).unwrap_err();
    assert!(matches!(err, ImaerError::InvalidValue { .. }));
}

#[test]
fn test_unknown_field_is_skipped_when_lenient() {
    let xml = collection(&source("ES.1", "9000", "<imaer:jurisdictionId>3</imaer:jurisdictionId>"));

    let (document, report) = Document::parse_str(&xml, &ParseOptions::default()).unwrap();
    assert_eq!(document.feature_members.len(), 1);
    assert_eq!(report.skipped, vec!["imaer:EmissionSource/imaer:jurisdictionId".to_string()]);
    assert!(report.rejected.is_empty());

    let err = Document::parse_str(&xml, &ParseOptions::strict()).unwrap_err();
    assert!(matches!(
        err,
        ImaerError::UnexpectedElement { ref element, .. } if element == "imaer:jurisdictionId"
    ));
}

#[test]
fn test_inline_custom_profile_is_registered() {
    let values: String = (1..=12)
        .map(|v| format!("<imaer:value>{v}</imaer:value>"))
        .collect();
    let profile = format!(
        r#"<imaer:diurnalVariation>
          <imaer:CustomDiurnalVariation gml:id="DiurnalProfileS.9">
            <imaer:label>Kantoor</imaer:label>
            <imaer:customType>MONTH</imaer:customType>
            {values}
          </imaer:CustomDiurnalVariation>
        </imaer:diurnalVariation>"#
    );
    let xml = collection(&source("ES.1", "9000", &characteristics(&profile)));

    let (document, report) = Document::parse_str(&xml, &ParseOptions::strict()).unwrap();
    assert!(report.is_complete());
    let custom = document.definitions.get("9").unwrap();
    assert_eq!(custom.custom_type, "MONTH");
    assert_eq!(custom.label.as_deref(), Some("Kantoor"));
    assert_eq!(custom.values.len(), 12);
    assert_eq!(custom.values[11], 12.0);

    // written back as a definition plus a reference
    let written = document.to_xml_string(&Default::default()).unwrap();
    assert_eq!(written.matches("<imaer:CustomDiurnalVariation ").count(), 1);
    assert!(written.contains(r##"xlink:href="#DiurnalProfile.9""##));
}

#[test]
fn test_dangling_profile_reference_in_file() {
    let profile = r##"<imaer:diurnalVariation>
          <imaer:ReferenceDiurnalVariation>
            <imaer:customDiurnalVariation xlink:href="#DiurnalProfile.404"/>
          </imaer:ReferenceDiurnalVariation>
        </imaer:diurnalVariation>"##;
    let xml = collection(&source("ES.1", "9000", &characteristics(profile)));

    let (document, report) = Document::parse_str(&xml, &ParseOptions::default()).unwrap();
    let characteristics = document.sources().next().unwrap().characteristics.as_ref().unwrap();
    assert_eq!(
        characteristics.profile(),
        Some(&VariationProfile::reference("404"))
    );
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].element, "ES.1");

    let err = Document::parse_str(&xml, &ParseOptions::strict()).unwrap_err();
    assert!(matches!(err, ImaerError::ReferentialIntegrity { ref reference, .. } if reference == "404"));
}

#[test]
fn test_namespace_selects_version() {
    let xml = collection("").replace("imaer.aerius.nl/5.1", "imaer.aerius.nl/6.0");
    let (document, _) = Document::parse_str(&xml, &ParseOptions::strict()).unwrap();
    assert_eq!(document.version, ImaerVersion::V6_0);

    let unknown = collection("").replace("imaer.aerius.nl/5.1", "example.com/imaer");
    let (document, _) = Document::parse_str(&unknown, &ParseOptions::default()).unwrap();
    assert_eq!(document.version, ImaerVersion::default());
    assert!(Document::parse_str(&unknown, &ParseOptions::strict()).is_err());
}

#[test]
fn test_zip_archive() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.zip");
    {
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        zip.start_file("situation_1.gml", options).unwrap();
        zip.write_all(collection(&source("ES.1", "9000", "")).as_bytes()).unwrap();
        zip.start_file("summary.json", options).unwrap();
        zip.write_all(b"{}").unwrap();
        zip.start_file("broken.gml", options).unwrap();
        zip.write_all(b"<kml/>").unwrap();
        zip.finish().unwrap();
    }

    let handler = ZipHandler::new(&path);
    let mut names = handler.list_gml_entries().unwrap();
    names.sort();
    assert_eq!(names, vec!["broken.gml".to_string(), "situation_1.gml".to_string()]);

    let entries = handler.process_all_documents().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "situation_1.gml");
    assert_eq!(entries[0].document.feature_members.len(), 1);

    let strict = ZipHandler::new(&path).with_options(ParseOptions::strict());
    assert!(matches!(
        strict.process_all_documents().unwrap_err(),
        ImaerError::NotImaer(_)
    ));
}

fn receptor_with_results(results: &[(&str, &str, &str)]) -> String {
    let results: String = results
        .iter()
        .map(|(result_type, substance, value)| {
            format!(
                r#"
    <imaer:result>
      <imaer:CalculationResult resultType="{result_type}" substance="{substance}">
        <imaer:value>{value}</imaer:value>
      </imaer:CalculationResult>
    </imaer:result>"#
            )
        })
        .collect();
    format!(
        r#"<imaer:featureMember>
  <imaer:ReceptorPoint gml:id="RP.12" receptorPointId="12">
    <imaer:GM_Point>
      <gml:Point srsName="urn:ogc:def:crs:EPSG::28992" gml:id="RP.12.POINT">
        <gml:pos>1000.0 2000.0</gml:pos>
      </gml:Point>
    </imaer:GM_Point>{results}
    <imaer:edgeEffect>false</imaer:edgeEffect>
  </imaer:ReceptorPoint>
</imaer:featureMember>"#
    )
}

#[test]
fn test_unknown_substance_drops_only_that_result() {
    let xml = collection(&receptor_with_results(&[
        ("DEPOSITION", "NH3", "12.5"),
        ("DEPOSITION", "NOXNH3", "20.0"),
        ("DEPOSITION", "CO2", "7.0"),
    ]));

    let (document, report) = Document::parse_str(&xml, &ParseOptions::default()).unwrap();
    let receptor = document.receptors().next().unwrap();
    assert_eq!(receptor.local_id.as_deref(), Some("12"));
    assert!(receptor.point.is_some());
    let results = receptor.get_results_dict();
    assert_eq!(results.get("deposition_nh3"), Some(&12.5));
    assert_eq!(results.get("deposition_noxnh3"), Some(&20.0));
    assert_eq!(results.len(), 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].element, "imaer:CalculationResult");
    assert!(report.rejected[0].reason.contains("CO2"));

    let err = Document::parse_str(&xml, &ParseOptions::strict()).unwrap_err();
    assert!(matches!(err, ImaerError::InvalidValue { ref value, .. } if value == "CO2"));
}

#[test]
fn test_unknown_result_type_drops_only_that_result() {
    let xml = collection(&receptor_with_results(&[
        ("PERCENTILE_99", "NOX", "1.0"),
        ("CONCENTRATION", "NO2", "3.25"),
    ]));

    let (document, report) = Document::parse_str(&xml, &ParseOptions::default()).unwrap();
    assert_eq!(document.receptors().count(), 1);
    let receptor = document.receptors().next().unwrap();
    assert_eq!(receptor.get_results_dict().get("concentration_no2"), Some(&3.25));
    assert_eq!(receptor.results.len(), 1);
    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].reason.contains("PERCENTILE_99"));

    let err = Document::parse_str(&xml, &ParseOptions::strict()).unwrap_err();
    assert!(matches!(err, ImaerError::InvalidValue { .. }));
}

#[test]
fn test_known_results_parse_completely() {
    let xml = collection(&receptor_with_results(&[
        ("DEPOSITION", "NOXNH3", "20.0"),
        ("EXCEEDANCE_DAYS", "PM10", "3"),
    ]));
    let (document, report) = Document::parse_str(&xml, &ParseOptions::strict()).unwrap();
    assert!(report.is_complete());
    assert_eq!(document.receptors().next().unwrap().results.len(), 2);
}

fn month_profile(link: &str, value: f64) -> String {
    let values: String = (0..12)
        .map(|_| format!("<imaer:value>{value}</imaer:value>"))
        .collect();
    format!(
        r#"<imaer:{link}>
          <imaer:CustomDiurnalVariation gml:id="DiurnalProfileS.9">
            <imaer:customType>MONTH</imaer:customType>
            {values}
          </imaer:CustomDiurnalVariation>
        </imaer:{link}>"#
    )
}

#[test]
fn test_inline_profile_conflicting_with_definition() {
    let definitions = format!(
        "<imaer:definitions><imaer:Definitions>{}</imaer:Definitions></imaer:definitions>",
        month_profile("customDiurnalVariation", 1.0)
    );
    let member = source(
        "ES.1",
        "9000",
        &characteristics(&month_profile("diurnalVariation", 2.0)),
    );
    let xml = collection(&format!("{definitions}\n{member}"));

    let (document, report) = Document::parse_str(&xml, &ParseOptions::default()).unwrap();
    assert_eq!(document.definitions.len(), 1);
    assert_eq!(document.definitions.get("9").unwrap().values, vec![1.0; 12]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].element, "ES.1");

    let err = Document::parse_str(&xml, &ParseOptions::strict()).unwrap_err();
    assert!(matches!(err, ImaerError::DuplicateDefinition(ref id) if id == "9"));

    // the same values inline and in the definitions are not a conflict
    let member = source(
        "ES.1",
        "9000",
        &characteristics(&month_profile("diurnalVariation", 1.0)),
    );
    let xml = collection(&format!("{definitions}\n{member}"));
    let (document, report) = Document::parse_str(&xml, &ParseOptions::strict()).unwrap();
    assert!(report.is_complete());
    assert_eq!(document.definitions.len(), 1);
}
