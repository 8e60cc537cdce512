//! Reporting
//!
//! Scan results render two ways: a self-contained HTML document, and a PDF
//! produced by building a Markdown summary document and feeding it through
//! the in-repo Markdown parser and PDF writer.

pub mod html;
pub mod markdown;
pub mod pdf;

pub use html::HtmlReport;
pub use markdown::{Block, MarkdownDocument};
pub use pdf::PdfRenderer;

use crate::scan::ScanRecord;
use chrono::Local;
use std::collections::HashMap;
use std::fmt::Write;

/// Overall threat level derived from the malicious ratio of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatLevel {
    Unknown,
    Secure,
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Tier boundaries on `malware / total`: 0 is SECURE, then 0.25 / 0.5 /
    /// 0.75 cut LOW, MEDIUM, HIGH, CRITICAL. An empty batch is UNKNOWN.
    pub fn from_counts(malware: usize, total: usize) -> Self {
        if total == 0 {
            return ThreatLevel::Unknown;
        }
        let ratio = malware as f64 / total as f64;
        if ratio == 0.0 {
            ThreatLevel::Secure
        } else if ratio < 0.25 {
            ThreatLevel::Low
        } else if ratio < 0.5 {
            ThreatLevel::Medium
        } else if ratio < 0.75 {
            ThreatLevel::High
        } else {
            ThreatLevel::Critical
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThreatLevel::Unknown => "UNKNOWN",
            ThreatLevel::Secure => "SECURE",
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Critical => "CRITICAL",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            ThreatLevel::Unknown => "#888888",
            ThreatLevel::Secure => "#00f260",
            ThreatLevel::Low => "#ffc107",
            ThreatLevel::Medium => "#ff9800",
            ThreatLevel::High => "#ff5722",
            ThreatLevel::Critical => "#f44336",
        }
    }
}

/// Markdown scan-summary document, the source for the PDF variant
pub struct ReportDocument {
    report_id: String,
    markdown: String,
}

impl ReportDocument {
    /// Build the summary document from a batch of scan records
    pub fn from_records(records: &[ScanRecord]) -> Self {
        let now = Local::now();
        let report_id = now.format("%Y%m%d%H%M%S").to_string();

        let total = records.len();
        let malware_count = records.iter().filter(|r| r.is_malware()).count();
        let benign_count = total - malware_count;
        let anomalies = records.iter().filter(|r| r.is_anomaly).count();
        let level = ThreatLevel::from_counts(malware_count, total);

        let mut md = String::new();
        let _ = writeln!(md, "# Memory Forensics Scan Report");
        let _ = writeln!(md);
        let _ = writeln!(md, "Report ID: {report_id}");
        let _ = writeln!(md, "Generated: {}", now.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(md);
        let _ = writeln!(md, "## Executive Summary");
        let _ = writeln!(md);
        let _ = writeln!(md, "- Total samples scanned: {total}");
        let _ = writeln!(md, "- Benign: {benign_count}");
        let _ = writeln!(md, "- Malware detected: {malware_count}");
        let _ = writeln!(md, "- Anomalies flagged: {anomalies}");
        let _ = writeln!(md, "- Threat level: {}", level.label());

        if malware_count > 0 {
            let mut family_counts: HashMap<&str, usize> = HashMap::new();
            for r in records.iter().filter(|r| r.is_malware()) {
                *family_counts.entry(r.malware_type.as_str()).or_default() += 1;
            }
            let mut families: Vec<(&str, usize)> = family_counts.into_iter().collect();
            families.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

            let _ = writeln!(md);
            let _ = writeln!(md, "## Malware Family Breakdown");
            let _ = writeln!(md);
            let _ = writeln!(md, "| Family | Count | Percentage |");
            let _ = writeln!(md, "| --- | --- | --- |");
            for (family, count) in families {
                let _ = writeln!(
                    md,
                    "| {family} | {count} | {:.1}% |",
                    count as f64 / malware_count as f64 * 100.0
                );
            }
        }

        let _ = writeln!(md);
        let _ = writeln!(md, "## Detailed Results");
        let _ = writeln!(md);
        let _ = writeln!(md, "| Sample | Status | Type | Confidence | Anomaly Score |");
        let _ = writeln!(md, "| --- | --- | --- | --- | --- |");
        for r in records.iter().take(100) {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {:.1}% | {:.4} |",
                r.sample_id, r.status, r.malware_type, r.confidence, r.anomaly_score
            );
        }
        if total > 100 {
            let _ = writeln!(md);
            let _ = writeln!(md, "Showing first 100 results of {total}.");
        }

        Self {
            report_id,
            markdown: md,
        }
    }

    pub fn report_id(&self) -> &str {
        &self.report_id
    }

    /// The document as Markdown text
    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    /// Parse the document into blocks for the PDF renderer
    pub fn to_document(&self) -> MarkdownDocument {
        MarkdownDocument::parse(&self.markdown)
    }

    /// Render the PDF variant
    pub fn to_pdf(&self) -> Vec<u8> {
        PdfRenderer::new().render(&self.to_document(), "Memory Forensics Scan Report")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threat_level_tiers() {
        assert_eq!(ThreatLevel::from_counts(0, 0), ThreatLevel::Unknown);
        assert_eq!(ThreatLevel::from_counts(0, 10), ThreatLevel::Secure);
        assert_eq!(ThreatLevel::from_counts(2, 10), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_counts(3, 10), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::from_counts(5, 10), ThreatLevel::High);
        assert_eq!(ThreatLevel::from_counts(8, 10), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_counts(10, 10), ThreatLevel::Critical);
    }

    #[test]
    fn test_threat_level_colors() {
        assert_eq!(ThreatLevel::Unknown.color(), "#888888");
        assert_eq!(ThreatLevel::Secure.color(), "#00f260");
        assert_eq!(ThreatLevel::Critical.color(), "#f44336");
    }

    #[test]
    fn test_document_builds_family_table_for_malware() {
        let records = vec![
            ScanRecord {
                timestamp: "2026-08-29 10:00:00".to_string(),
                sample_id: 0,
                status: "Malware".to_string(),
                malware_type: "Ransomware".to_string(),
                confidence: 95.0,
                anomaly_score: -0.2,
                is_anomaly: true,
            },
            ScanRecord {
                timestamp: "2026-08-29 10:00:00".to_string(),
                sample_id: 1,
                status: "Benign".to_string(),
                malware_type: "N/A".to_string(),
                confidence: 99.0,
                anomaly_score: 0.1,
                is_anomaly: false,
            },
        ];

        let doc = ReportDocument::from_records(&records);
        assert!(doc.markdown().contains("## Malware Family Breakdown"));
        assert!(doc.markdown().contains("| Ransomware | 1 | 100.0% |"));
        assert!(doc.markdown().contains("Threat level: HIGH"));

        let parsed = doc.to_document();
        assert!(parsed
            .blocks
            .iter()
            .any(|b| matches!(b, Block::Table { .. })));
    }
}
