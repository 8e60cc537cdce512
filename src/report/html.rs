//! HTML report builder
//!
//! Renders a self-contained HTML document (inline CSS, no external assets)
//! from a batch of scan records: executive-summary metric cards, the
//! malware family breakdown, the per-sample results table capped at 100
//! rows, and threat-level-conditioned recommendations.

use crate::report::ThreatLevel;
use crate::scan::ScanRecord;
use chrono::Local;
use std::collections::HashMap;

/// Per-sample table cap; larger batches get a "showing first N" note
const MAX_DETAIL_ROWS: usize = 100;

/// Self-contained HTML scan report
pub struct HtmlReport {
    report_id: String,
    timestamp: String,
}

impl Default for HtmlReport {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlReport {
    /// Stamp a new report with the current local time
    pub fn new() -> Self {
        let now = Local::now();
        Self {
            report_id: now.format("%Y%m%d%H%M%S").to_string(),
            timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Report id in `%Y%m%d%H%M%S` form
    pub fn report_id(&self) -> &str {
        &self.report_id
    }

    /// Render the full document
    pub fn generate(&self, records: &[ScanRecord]) -> String {
        let total = records.len();
        let malware_count = records.iter().filter(|r| r.is_malware()).count();
        let benign_count = total - malware_count;
        let level = ThreatLevel::from_counts(malware_count, total);

        let mut family_counts: HashMap<&str, usize> = HashMap::new();
        for r in records.iter().filter(|r| r.is_malware()) {
            *family_counts.entry(r.malware_type.as_str()).or_default() += 1;
        }
        let mut families: Vec<(&str, usize)> = family_counts.into_iter().collect();
        families.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        let breakdown_section = if malware_count > 0 {
            let rows: String = families
                .iter()
                .map(|(family, count)| {
                    format!(
                        "<tr><td>{}</td><td>{}</td><td>{:.1}%</td></tr>\n",
                        escape(family),
                        count,
                        *count as f64 / malware_count as f64 * 100.0
                    )
                })
                .collect();
            format!(
                "<div class=\"section\"><h2>Malware Type Distribution</h2><table>\
                 <tr><th>Malware Family</th><th>Count</th><th>Percentage</th></tr>{rows}</table></div>"
            )
        } else {
            String::new()
        };

        let detail_rows: String = records
            .iter()
            .take(MAX_DETAIL_ROWS)
            .map(|r| {
                let class = if r.is_malware() { "malware" } else { "benign" };
                let flag = if r.anomaly_score < 0.0 { " !" } else { "" };
                format!(
                    "<tr class=\"{class}\"><td>{}</td>\
                     <td><span class=\"status-{class}\">{}</span></td>\
                     <td>{}</td><td>{:.1}%</td><td>{:.4}{flag}</td></tr>\n",
                    r.sample_id,
                    escape(&r.status),
                    escape(&r.malware_type),
                    r.confidence,
                    r.anomaly_score,
                )
            })
            .collect();
        let truncation_note = if total > MAX_DETAIL_ROWS {
            format!(
                "<p class=\"note\">Showing first {MAX_DETAIL_ROWS} results. Total: {total}</p>"
            )
        } else {
            String::new()
        };

        let recommendations = self.recommendations(level, malware_count, records);

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>Memory Forensics Report - {id}</title>
<style>
body {{ font-family: 'Segoe UI', Tahoma, sans-serif; background: #16213e; color: #ffffff; padding: 40px; }}
.container {{ max-width: 1200px; margin: 0 auto; }}
.header {{ text-align: center; margin-bottom: 40px; padding: 30px; background: rgba(255,255,255,0.05); border-radius: 15px; }}
.header h1 {{ color: #00f260; }}
.subtitle {{ color: #aaa; }}
.section {{ background: rgba(255,255,255,0.05); border-radius: 15px; padding: 25px; margin-bottom: 25px; }}
.section h2 {{ color: #0575e6; border-bottom: 2px solid rgba(5,117,230,0.3); padding-bottom: 10px; }}
.metrics-grid {{ display: grid; grid-template-columns: repeat(4, 1fr); gap: 20px; }}
.metric-card {{ background: rgba(255,255,255,0.08); padding: 25px; border-radius: 12px; text-align: center; }}
.metric-card .value {{ font-size: 2.5em; font-weight: bold; color: #00f260; }}
.metric-card .label {{ color: #aaa; margin-top: 5px; }}
.threat-indicator {{ font-size: 2em; font-weight: bold; color: {threat_color}; }}
table {{ width: 100%; border-collapse: collapse; margin-top: 15px; }}
th, td {{ padding: 12px 15px; text-align: left; border-bottom: 1px solid rgba(255,255,255,0.1); }}
th {{ background: rgba(0,242,96,0.1); color: #00f260; }}
.status-malware {{ color: #ff4b1f; font-weight: bold; }}
.status-benign {{ color: #00f260; font-weight: bold; }}
.recommendations {{ background: rgba(255,193,7,0.1); border-left: 4px solid #ffc107; padding: 20px; }}
.note {{ color: #888; margin-top: 15px; }}
.footer {{ text-align: center; margin-top: 40px; color: #666; font-size: 0.9em; }}
</style>
</head>
<body>
<div class="container">
<div class="header">
<h1>Memory Forensics Analysis Report</h1>
<p class="subtitle">Report ID: {id}</p>
<p class="subtitle">Generated: {timestamp}</p>
</div>
<div class="section">
<h2>Executive Summary</h2>
<div class="metrics-grid">
<div class="metric-card"><div class="value">{total}</div><div class="label">Total Samples</div></div>
<div class="metric-card"><div class="value">{benign}</div><div class="label">Benign</div></div>
<div class="metric-card"><div class="value" style="color:#ff4b1f;">{malware}</div><div class="label">Malware Detected</div></div>
<div class="metric-card"><div class="threat-indicator">{threat_text}</div><div class="label">Threat Level</div></div>
</div>
</div>
{breakdown}
<div class="section">
<h2>Detailed Scan Results</h2>
<table>
<tr><th>Sample #</th><th>Classification</th><th>Malware Type</th><th>Confidence</th><th>Anomaly Score</th></tr>
{details}</table>
{truncation}
</div>
<div class="section">
<h2>Recommendations</h2>
<div class="recommendations">
<h3>Security Actions</h3>
<ul>
{recommendations}</ul>
</div>
</div>
<div class="footer">
<p>Memory forensics analysis, automatically generated.</p>
<p>For detailed analysis, consult with security professionals.</p>
</div>
</div>
</body>
</html>
"#,
            id = escape(&self.report_id),
            timestamp = escape(&self.timestamp),
            threat_color = level.color(),
            threat_text = level.label(),
            total = total,
            benign = benign_count,
            malware = malware_count,
            breakdown = breakdown_section,
            details = detail_rows,
            truncation = truncation_note,
            recommendations = recommendations,
        )
    }

    fn recommendations(
        &self,
        level: ThreatLevel,
        malware_count: usize,
        records: &[ScanRecord],
    ) -> String {
        let mut items = Vec::new();
        if level == ThreatLevel::Critical {
            items.push(
                "CRITICAL: Immediately isolate affected systems and begin incident response procedures.",
            );
        }
        if malware_count > 0 {
            items.push(
                "HIGH PRIORITY: Quarantine detected malware samples and conduct deep forensic analysis.",
            );
        }
        if records.iter().any(|r| r.anomaly_score < 0.0) {
            items.push(
                "Review processes flagged with negative anomaly scores for potential zero-day threats.",
            );
        }
        items.push("Update endpoint protection signatures with detected malware indicators.");
        items.push("Document findings and update security incident log.");
        if malware_count == 0 {
            items.push("All systems appear clean. Continue regular monitoring.");
        }

        items
            .iter()
            .map(|item| format!("<li>{}</li>\n", escape(item)))
            .collect()
    }
}

/// Escape text for HTML interpolation
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: usize, status: &str, family: &str, anomaly_score: f64) -> ScanRecord {
        ScanRecord {
            timestamp: "2026-08-29 10:00:00".to_string(),
            sample_id: id,
            status: status.to_string(),
            malware_type: family.to_string(),
            confidence: 91.0,
            anomaly_score,
            is_anomaly: anomaly_score < 0.0,
        }
    }

    #[test]
    fn test_clean_scan_reports_secure() {
        let records = vec![record(0, "Benign", "N/A", 0.1), record(1, "Benign", "N/A", 0.2)];
        let html = HtmlReport::new().generate(&records);

        assert!(html.contains("SECURE"));
        assert!(html.contains("All systems appear clean"));
        assert!(!html.contains("Malware Type Distribution"));
    }

    #[test]
    fn test_family_breakdown_sorted_by_count() {
        let records = vec![
            record(0, "Malware", "Trojan", -0.1),
            record(1, "Malware", "Trojan", -0.2),
            record(2, "Malware", "Spyware", -0.3),
            record(3, "Malware", "Trojan", -0.1),
        ];
        let html = HtmlReport::new().generate(&records);

        assert!(html.contains("CRITICAL"));
        let trojan = html.find("<td>Trojan</td>").unwrap();
        let spyware = html.find("<td>Spyware</td>").unwrap();
        assert!(trojan < spyware);
        assert!(html.contains("75.0%"));
    }

    #[test]
    fn test_detail_table_caps_at_100_rows() {
        let records: Vec<ScanRecord> = (0..150).map(|i| record(i, "Benign", "N/A", 0.1)).collect();
        let html = HtmlReport::new().generate(&records);

        assert!(html.contains("Showing first 100 results. Total: 150"));
        assert!(html.contains("<td>99</td>"));
        assert!(!html.contains("<td>120</td>"));
    }

    #[test]
    fn test_interpolated_values_are_escaped() {
        let records = vec![record(0, "Malware", "<script>alert(1)</script>", -0.5)];
        let html = HtmlReport::new().generate(&records);
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
