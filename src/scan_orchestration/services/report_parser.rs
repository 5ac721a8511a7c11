use crate::scan_orchestration::domain::{
    ComplianceCheck, ComplianceStatus, Finding, ScanReport, Severity,
};
use crate::shared::error::ScanTriggerError;
use crate::shared::Result;
use serde_json::{Map, Value};

/// Maximum scanner output accepted for parsing (security limit)
pub const MAX_SCANNER_OUTPUT_BYTES: usize = 32 * 1024 * 1024;

/// Parses the scanner's JSON report into a [`ScanReport`].
///
/// The scanner output may arrive through a log stream, so anything before the
/// first `{` and after the last `}` is treated as noise. The extracted JSON
/// object is kept verbatim as the report's raw text.
pub struct ReportParser;

impl ReportParser {
    /// Parses scanner output for `image`.
    ///
    /// # Arguments
    /// * `image` - Normalized image reference, used in error messages
    /// * `output` - Raw scanner output (possibly surrounded by log noise)
    ///
    /// # Returns
    /// The parsed report, or a `ReportParse` error when the output is not
    /// JSON, has no findings list, or contains a finding without a severity
    pub fn parse(image: &str, output: &str) -> Result<ScanReport> {
        if output.len() > MAX_SCANNER_OUTPUT_BYTES {
            return Err(parse_error(
                image,
                format!(
                    "scanner output is too large ({} bytes). Maximum allowed: {} bytes",
                    output.len(),
                    MAX_SCANNER_OUTPUT_BYTES
                ),
            ));
        }

        let json_text = extract_json_object(output)
            .ok_or_else(|| parse_error(image, "scanner output contains no JSON object"))?;

        let root: Value = serde_json::from_str(json_text)
            .map_err(|e| parse_error(image, format!("invalid JSON: {}", e)))?;
        let root = root
            .as_object()
            .ok_or_else(|| parse_error(image, "report root is not a JSON object"))?;

        let vulnerabilities = section(root, "vulnerabilities")
            .ok_or_else(|| parse_error(image, "report has no vulnerabilities list"))?;
        let vulnerabilities = vulnerabilities
            .as_array()
            .ok_or_else(|| parse_error(image, "'vulnerabilities' is not a list"))?;

        let findings = vulnerabilities
            .iter()
            .enumerate()
            .map(|(index, entry)| parse_finding(entry).map_err(|reason| {
                parse_error(image, format!("finding #{}: {}", index, reason))
            }))
            .collect::<Result<Vec<_>>>()?;

        let compliance = section(root, "compliance")
            .and_then(Value::as_array)
            .map(|checks| checks.iter().map(parse_compliance_check).collect())
            .unwrap_or_default();

        let scanner_version = first_str(root, &["scannerVersion", "scanner_version", "version"])
            .or_else(|| {
                root.get("metadata")
                    .and_then(Value::as_object)
                    .and_then(|meta| first_str(meta, &["scannerVersion", "version"]))
            });

        let scan_duration_secs = ["scanDuration", "scanDurationSecs", "duration"]
            .iter()
            .find_map(|key| root.get(*key).and_then(Value::as_f64));

        Ok(ScanReport::new(
            json_text.to_string(),
            findings,
            compliance,
            scanner_version,
            scan_duration_secs,
        ))
    }
}

/// Returns the slice from the first `{` to the last `}`.
fn extract_json_object(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    (end > start).then(|| &output[start..=end])
}

/// Top-level key, or the same key nested under `results`.
fn section<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    root.get(key).or_else(|| {
        root.get("results")
            .and_then(Value::as_object)
            .and_then(|results| results.get(key))
    })
}

fn parse_finding(entry: &Value) -> std::result::Result<Finding, String> {
    let entry = entry
        .as_object()
        .ok_or_else(|| "finding is not a JSON object".to_string())?;

    let severity = match entry.get("severity") {
        Some(Value::String(s)) if !s.trim().is_empty() => Severity::normalize(s),
        Some(Value::Number(n)) => Severity::normalize(&n.to_string()),
        _ => return Err("missing severity".to_string()),
    };

    let package = entry.get("package");
    let (package_name, package_version) = match package.and_then(Value::as_object) {
        Some(pkg) => (first_str(pkg, &["name"]), first_str(pkg, &["version"])),
        None => (
            package
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| first_str(entry, &["packageName"])),
            first_str(entry, &["packageVersion", "installedVersion"]),
        ),
    };

    Ok(Finding {
        id: first_str(entry, &["qid", "id"]),
        cve: first_str(entry, &["cve", "cveId"]).or_else(|| {
            entry
                .get("cveIds")
                .and_then(Value::as_array)
                .and_then(|ids| ids.first())
                .and_then(Value::as_str)
                .map(String::from)
        }),
        severity,
        title: first_str(entry, &["title", "name"]),
        package: package_name,
        version: package_version,
        fixed_version: first_str(entry, &["fixedVersion", "fix"]),
    })
}

fn parse_compliance_check(entry: &Value) -> ComplianceCheck {
    let empty = Map::new();
    let entry = entry.as_object().unwrap_or(&empty);
    ComplianceCheck {
        id: first_str(entry, &["id", "checkId", "controlId"]),
        title: first_str(entry, &["title", "name"]),
        status: entry
            .get("status")
            .and_then(Value::as_str)
            .map(ComplianceStatus::normalize)
            .unwrap_or(ComplianceStatus::Other),
    }
}

/// First key whose value is a string or number, as a string.
fn first_str(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn parse_error(image: &str, details: impl Into<String>) -> anyhow::Error {
    ScanTriggerError::ReportParse {
        image: image.to_string(),
        details: details.into(),
    }
    .into()
}
