use imaer::model::profile;
use imaer::model::receptor::AttributeValue;
use imaer::{Document, ImaerVersion, ParseMode, ParseOptions};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

#[pymodule]
#[pyo3(name = "imaer")]
fn imaer_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(parse_gml, m)?)?;
    m.add_function(wrap_pyfunction!(receptor_attributes, m)?)?;
    m.add_function(wrap_pyfunction!(convert, m)?)?;
    m.add_function(wrap_pyfunction!(values_to_csv, m)?)?;
    m.add_function(wrap_pyfunction!(values_from_csv, m)?)?;
    Ok(())
}

fn to_py_err(e: imaer::ImaerError) -> PyErr {
    match e {
        imaer::ImaerError::Io(io) => PyIOError::new_err(format!("Failed to open file: {}", io)),
        other => PyValueError::new_err(format!("Failed to read IMAER document: {}", other)),
    }
}

fn read(path: &str, strict: bool) -> PyResult<(Document, imaer::ParseReport)> {
    let options = ParseOptions {
        mode: if strict {
            ParseMode::Strict
        } else {
            ParseMode::Lenient
        },
    };
    Document::parse_from_file_with(path, &options).map_err(to_py_err)
}

/// Summary of a GML file: version, counts per feature kind and what a
/// lenient read left out.
#[pyfunction]
#[pyo3(signature = (path, strict=false))]
pub fn parse_gml<'py>(py: Python<'py>, path: &str, strict: bool) -> PyResult<Bound<'py, PyDict>> {
    let (document, report) = read(path, strict)?;
    let summary = PyDict::new_bound(py);
    summary.set_item("version", document.version.as_str())?;
    summary.set_item("sources", document.sources().count())?;
    summary.set_item("buildings", document.buildings().count())?;
    summary.set_item("receptors", document.receptors().count())?;
    summary.set_item(
        "definitions",
        document
            .definitions
            .iter()
            .map(|p| p.local_id.clone())
            .collect::<Vec<_>>(),
    )?;
    summary.set_item("skipped", report.skipped)?;
    summary.set_item(
        "rejected",
        report
            .rejected
            .into_iter()
            .map(|r| (r.element, r.reason))
            .collect::<Vec<_>>(),
    )?;
    Ok(summary)
}

fn attribute_to_py(py: Python<'_>, value: &AttributeValue) -> PyObject {
    match value {
        AttributeValue::Null => py.None(),
        AttributeValue::Bool(v) => (*v).into_py(py),
        AttributeValue::Int(v) => (*v).into_py(py),
        AttributeValue::Float(v) => (*v).into_py(py),
        AttributeValue::Text(v) => v.as_str().into_py(py),
    }
}

/// One dict per receptor, keyed like the attribute table of the GIS layer.
#[pyfunction]
pub fn receptor_attributes<'py>(py: Python<'py>, path: &str) -> PyResult<Bound<'py, PyList>> {
    let (document, _) = read(path, false)?;
    let rows = PyList::empty_bound(py);
    for receptor in document.receptors() {
        let row = PyDict::new_bound(py);
        for (key, value) in receptor.get_attributes_dict() {
            row.set_item(key, attribute_to_py(py, &value))?;
        }
        rows.append(row)?;
    }
    Ok(rows)
}

/// Reads `input` and writes it to `output`, optionally as another IMAER
/// version ("4.0", "5.1", "6.0").
#[pyfunction]
#[pyo3(signature = (input, output, version=None))]
pub fn convert(input: &str, output: &str, version: Option<&str>) -> PyResult<()> {
    let (mut document, _) = read(input, false)?;
    if let Some(version) = version {
        document.version = version.parse::<ImaerVersion>().map_err(PyValueError::new_err)?;
    }
    document.serialize_to_file(output).map_err(to_py_err)
}

/// Custom profile values as the `;` separated text of the profile editor.
#[pyfunction]
pub fn values_to_csv(values: Vec<f64>) -> String {
    profile::values_to_csv(&values)
}

/// Inverse of `values_to_csv`; tokens that are not numbers are dropped.
#[pyfunction]
pub fn values_from_csv(text: &str) -> Vec<f64> {
    profile::values_from_csv(text)
}
