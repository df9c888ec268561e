use crate::model::{MatchOutput, ReconSummary, ViewResult, ViewSummary};
use crate::normalize::{QualityLog, QualitySummary};
use crate::unify::Unified;

/// Counts and value totals for one view.
pub fn compute_view_summary(
    tax_records: usize,
    ledger_records: usize,
    output: &MatchOutput,
    unified: &Unified,
    quality: &QualityLog,
) -> ViewSummary {
    let mut summary = ViewSummary {
        tax_records,
        ledger_records,
        matched: output.matched.len(),
        left_only: output.left_only.len(),
        right_only: output.right_only.len(),
        unified_rows: unified.rows.len(),
        dropped_as_noise: unified.dropped_as_noise,
        quality: quality.summary(),
        ..ViewSummary::default()
    };
    for row in &unified.rows {
        summary.total_value_a += row.value_a;
        summary.total_value_b += row.value_b;
        summary.total_difference += row.difference;
    }
    summary
}

/// Roll the per-view summaries and the ingestion warnings up into run totals.
pub fn compute_summary(views: &[ViewResult], ingestion: &QualitySummary) -> ReconSummary {
    let mut summary = ReconSummary {
        views: views.len(),
        data_quality_warnings: ingestion.total,
        ingestion: ingestion.clone(),
        ..ReconSummary::default()
    };
    for view in views {
        let s = &view.summary;
        summary.matched += s.matched;
        summary.left_only += s.left_only;
        summary.right_only += s.right_only;
        summary.unified_rows += s.unified_rows;
        summary.data_quality_warnings += s.quality.total;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KeyedRecord, Outcome, Record};
    use crate::normalize::QualityIssue;
    use crate::report::GroupedReport;
    use crate::unify::UnifiedRow;

    fn view(matched: usize, warnings: usize) -> ViewResult {
        let mut quality = QualityLog::new("test");
        for _ in 0..warnings {
            quality.record(QualityIssue::UnparseableAmount, "total", "x");
        }
        ViewResult {
            name: "v".into(),
            sheet: "V".into(),
            summary: ViewSummary {
                matched,
                left_only: 1,
                right_only: 2,
                unified_rows: matched + 3,
                quality: quality.summary(),
                ..ViewSummary::default()
            },
            rows: Vec::new(),
            report: GroupedReport::default(),
        }
    }

    #[test]
    fn run_summary_adds_views() {
        let summary = compute_summary(&[view(2, 1), view(5, 0)], &QualitySummary::default());
        assert_eq!(summary.views, 2);
        assert_eq!(summary.matched, 7);
        assert_eq!(summary.left_only, 2);
        assert_eq!(summary.right_only, 4);
        assert_eq!(summary.unified_rows, 13);
        assert_eq!(summary.data_quality_warnings, 1);
    }

    #[test]
    fn ingestion_warnings_count_once() {
        let mut ledger = QualityLog::new("ledger");
        ledger.record(QualityIssue::UnparseableAmount, "debit", "cien");
        ledger.record(QualityIssue::UnparseableAmount, "credit", "n/a");

        let summary = compute_summary(&[view(1, 1), view(1, 0)], &ledger.summary());
        assert_eq!(summary.data_quality_warnings, 3);
        assert_eq!(summary.ingestion.total, 2);
        assert_eq!(summary.ingestion.counts.get("unparseable_amount"), Some(&2));
    }

    #[test]
    fn view_summary_totals() {
        let output = MatchOutput {
            left_only: vec![KeyedRecord {
                key: None,
                record: Record::new(),
            }],
            ..MatchOutput::default()
        };
        let row = UnifiedRow {
            identifier: String::new(),
            counterpart_name: "Beta".into(),
            counterpart_group: "BETA".into(),
            value_a: 40.0,
            value_b: 0.0,
            difference: 40.0,
            outcome: Outcome::LeftOnly,
            match_key: "X1".into(),
            account_label: String::new(),
            passthrough: Record::new(),
        };
        let unified = Unified {
            rows: vec![row],
            dropped_as_noise: 2,
        };
        let summary = compute_view_summary(3, 4, &output, &unified, &QualityLog::new("test"));
        assert_eq!(summary.tax_records, 3);
        assert_eq!(summary.ledger_records, 4);
        assert_eq!(summary.left_only, 1);
        assert_eq!(summary.unified_rows, 1);
        assert_eq!(summary.dropped_as_noise, 2);
        assert_eq!(summary.total_value_a, 40.0);
        assert_eq!(summary.total_difference, 40.0);
    }
}
