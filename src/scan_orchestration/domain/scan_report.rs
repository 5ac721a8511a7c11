use serde::{Deserialize, Serialize};
use std::fmt;

/// Vulnerability severity as reported by the scanner, normalized to four levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Normalizes the scanner's severity notation.
    ///
    /// Numeric Qualys levels map `5..=2` to CRITICAL..LOW; level 1 and
    /// informational findings count as LOW. Unrecognized text falls back to MEDIUM.
    pub fn normalize(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        match upper.as_str() {
            "5" => return Severity::Critical,
            "4" => return Severity::High,
            "3" => return Severity::Medium,
            "2" | "1" => return Severity::Low,
            _ => {}
        }

        if upper.contains("CRIT") {
            Severity::Critical
        } else if upper.contains("HIGH") {
            Severity::High
        } else if upper.contains("MED") || upper.contains("MODERATE") {
            Severity::Medium
        } else if upper.contains("LOW") || upper.contains("INFO") {
            Severity::Low
        } else {
            Severity::Medium
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
        }
    }
}

/// A single vulnerability finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: Option<String>,
    pub cve: Option<String>,
    pub severity: Severity,
    pub title: Option<String>,
    pub package: Option<String>,
    pub version: Option<String>,
    pub fixed_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplianceStatus {
    Pass,
    Fail,
    Other,
}

impl ComplianceStatus {
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "PASS" | "PASSED" => ComplianceStatus::Pass,
            "FAIL" | "FAILED" => ComplianceStatus::Fail,
            _ => ComplianceStatus::Other,
        }
    }
}

/// A single compliance control result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheck {
    pub id: Option<String>,
    pub title: Option<String>,
    pub status: ComplianceStatus,
}

/// Per-severity finding counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeveritySummary {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl SeveritySummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        findings
            .iter()
            .fold(SeveritySummary::default(), |mut summary, finding| {
                match finding.severity {
                    Severity::Critical => summary.critical += 1,
                    Severity::High => summary.high += 1,
                    Severity::Medium => summary.medium += 1,
                    Severity::Low => summary.low += 1,
                }
                summary
            })
    }

    pub fn total(&self) -> u64 {
        self.critical + self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceSummary {
    pub passed: u64,
    pub failed: u64,
    pub total: u64,
}

/// The scanner's structured output for one image.
///
/// `raw` keeps the report text exactly as the scanner produced it; that is
/// what gets written to blob storage. The parsed fields are derived from it.
#[derive(Debug, Clone)]
pub struct ScanReport {
    raw: String,
    findings: Vec<Finding>,
    compliance: Vec<ComplianceCheck>,
    scanner_version: Option<String>,
    scan_duration_secs: Option<f64>,
}

impl ScanReport {
    pub fn new(
        raw: String,
        findings: Vec<Finding>,
        compliance: Vec<ComplianceCheck>,
        scanner_version: Option<String>,
        scan_duration_secs: Option<f64>,
    ) -> Self {
        Self {
            raw,
            findings,
            compliance,
            scanner_version,
            scan_duration_secs,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn compliance(&self) -> &[ComplianceCheck] {
        &self.compliance
    }

    pub fn scanner_version(&self) -> Option<&str> {
        self.scanner_version.as_deref()
    }

    pub fn scan_duration_secs(&self) -> Option<f64> {
        self.scan_duration_secs
    }

    pub fn severity_summary(&self) -> SeveritySummary {
        SeveritySummary::from_findings(&self.findings)
    }

    pub fn compliance_summary(&self) -> ComplianceSummary {
        let passed = self
            .compliance
            .iter()
            .filter(|c| c.status == ComplianceStatus::Pass)
            .count() as u64;
        let failed = self
            .compliance
            .iter()
            .filter(|c| c.status == ComplianceStatus::Fail)
            .count() as u64;
        ComplianceSummary {
            passed,
            failed,
            total: self.compliance.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding {
            id: None,
            cve: None,
            severity,
            title: None,
            package: None,
            version: None,
            fixed_version: None,
        }
    }

    #[test]
    fn test_severity_normalize_numeric_levels() {
        assert_eq!(Severity::normalize("5"), Severity::Critical);
        assert_eq!(Severity::normalize("4"), Severity::High);
        assert_eq!(Severity::normalize("3"), Severity::Medium);
        assert_eq!(Severity::normalize("2"), Severity::Low);
        assert_eq!(Severity::normalize("1"), Severity::Low);
    }

    #[test]
    fn test_severity_normalize_text() {
        assert_eq!(Severity::normalize("critical"), Severity::Critical);
        assert_eq!(Severity::normalize("CRIT"), Severity::Critical);
        assert_eq!(Severity::normalize("High"), Severity::High);
        assert_eq!(Severity::normalize("MODERATE"), Severity::Medium);
        assert_eq!(Severity::normalize("medium"), Severity::Medium);
        assert_eq!(Severity::normalize("low"), Severity::Low);
        assert_eq!(Severity::normalize("INFORMATIONAL"), Severity::Low);
        assert_eq!(Severity::normalize("whatever"), Severity::Medium);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_summary_counts_every_finding() {
        let findings = vec![
            finding(Severity::Critical),
            finding(Severity::High),
            finding(Severity::High),
            finding(Severity::Low),
        ];
        let summary = SeveritySummary::from_findings(&findings);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.high, 2);
        assert_eq!(summary.medium, 0);
        assert_eq!(summary.low, 1);
        assert_eq!(summary.total(), findings.len() as u64);
    }

    #[test]
    fn test_compliance_summary() {
        let checks = vec![
            ComplianceCheck {
                id: Some("C1".to_string()),
                title: None,
                status: ComplianceStatus::normalize("passed"),
            },
            ComplianceCheck {
                id: Some("C2".to_string()),
                title: None,
                status: ComplianceStatus::normalize("FAIL"),
            },
            ComplianceCheck {
                id: Some("C3".to_string()),
                title: None,
                status: ComplianceStatus::normalize("skipped"),
            },
        ];
        let report = ScanReport::new("{}".to_string(), vec![], checks, None, None);
        let summary = report.compliance_summary();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total, 3);
    }
}
