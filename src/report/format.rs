//! Formatted terminal output for fit, projection and line-list runs.

use crate::domain::{BatchReport, FittedRegion, PipelineConfig, ProjectionPoint, SkipReason};
use crate::linelist::{AgeGenderRow, OnsetSummary, SymptomRate};
use crate::report::rank_by_capacity;

/// Format the batch summary: counts, top regions by capacity, skip reasons.
pub fn format_batch_summary(report: &BatchReport, config: &PipelineConfig, top_n: usize) -> String {
    let mut out = String::new();

    out.push_str("=== epi - logistic growth fit ===\n");
    out.push_str(&format!("Study start: {}\n", config.study_start));
    out.push_str(&format!(
        "Regions: {} | fitted={} | skipped={}\n",
        report.total_regions(),
        report.fits.len(),
        report.skipped.len()
    ));
    out.push_str(&format!(
        "Bounds: L=({}, {}] x0=[{}, {}] k=({}, {}] | min_obs={}\n",
        config.fit.bounds.lower[0],
        config.fit.bounds.upper[0],
        config.fit.bounds.lower[1],
        config.fit.bounds.upper[1],
        config.fit.bounds.lower[2],
        config.fit.bounds.upper[2],
        config.fit.min_observations,
    ));

    if !report.fits.is_empty() {
        out.push_str(&format!("\nTop {} regions by carrying capacity:\n", top_n.min(report.fits.len())));
        out.push_str(&format_fit_table(&rank_by_capacity(report, top_n)));
    }

    if !report.skipped.is_empty() {
        out.push_str("\nSkipped:\n");
        let groups: [(&str, fn(&SkipReason) -> bool); 4] = [
            ("insufficient data", |r| matches!(r, SkipReason::InsufficientData { .. })),
            ("no convergence", |r| matches!(r, SkipReason::ConvergenceFailure)),
            ("non-finite", |r| matches!(r, SkipReason::NonFiniteParameters)),
            ("unreliable (L_std > L)", |r| matches!(r, SkipReason::UnreliableFit { .. })),
        ];
        for (label, pred) in groups {
            let n = report.count_skipped(pred);
            if n > 0 {
                out.push_str(&format!("- {label}: {n}\n"));
            }
        }
    }

    out
}

fn format_fit_table(rows: &[&FittedRegion]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<28} {:>12} {:>10} {:>8} {:>10} {:>8} {:>8} {:>6}\n",
            "region", "L", "L_std", "x0", "x0_std", "k", "k_std", "epoch"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<28} {:-<12} {:-<10} {:-<8} {:-<10} {:-<8} {:-<8} {:-<6}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for f in rows {
        let p = &f.params;
        out.push_str(
            format!(
                "{:<28} {:>12.1} {:>10.1} {:>8.2} {:>10.3} {:>8.4} {:>8.4} {:>6}\n",
                truncate(&p.region_id, 28),
                p.l,
                p.l_std,
                p.x0,
                p.x0_std,
                p.k,
                p.k_std,
                f.epoch_offset,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Format a projection as a table.
pub fn format_projection(region_id: &str, confidence_level: f64, points: &[ProjectionPoint]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Projection for {region_id} ({:.1}% band on L)\n",
        confidence_level * 100.0
    ));
    out.push_str(&format!("{:<10} {:>14} {:>14} {:>14}\n", "date", "lower", "predicted", "upper"));
    out.push_str(&format!("{:-<10} {:-<14} {:-<14} {:-<14}\n", "", "", "", ""));
    for p in points {
        out.push_str(&format!(
            "{:<10} {:>14.1} {:>14.1} {:>14.1}\n",
            p.date, p.lower, p.predicted, p.upper
        ));
    }
    out
}

/// Format line-list summaries: symptom rates, age/gender table, onset delay.
pub fn format_line_list(
    cases: usize,
    rates: &[SymptomRate],
    age_gender: &[AgeGenderRow],
    onset: Option<&OnsetSummary>,
) -> String {
    let mut out = String::new();
    out.push_str("=== epi - line list ===\n");
    out.push_str(&format!("Cases: {cases}\n"));

    if !rates.is_empty() {
        out.push_str("\nSymptom rates (cases reporting symptoms):\n");
        for r in rates {
            out.push_str(&format!("{:<28} {:>6.1}%\n", truncate(&r.symptom, 28), r.rate * 100.0));
        }
    }

    if !age_gender.is_empty() {
        out.push_str(&format!(
            "\n{:<8} {:<10} {:>7} {:>10} {:>7} {:>10}\n",
            "age", "gender", "cases", "share", "deaths", "death_rate"
        ));
        out.push_str(&format!("{:-<8} {:-<10} {:-<7} {:-<10} {:-<7} {:-<10}\n", "", "", "", "", "", ""));
        for row in age_gender {
            out.push_str(&format!(
                "{:<8} {:<10} {:>7} {:>10.4} {:>7} {:>10.4}\n",
                row.age_group.to_string(),
                truncate(&row.gender, 10),
                row.counts,
                row.proportion,
                row.deaths,
                row.death_rate
            ));
        }
    }

    if let Some(s) = onset {
        out.push_str(&format!(
            "\nSymptom onset delay: n={} mean={:.1}d median={:.1}d range=[{}, {}]d\n",
            s.cases, s.mean, s.median, s.min, s.max
        ));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DEFAULT_STUDY_START, FitParameters};

    fn report() -> BatchReport {
        let mut r = BatchReport::default();
        r.fits.insert(
            "Italy".to_string(),
            FittedRegion {
                params: FitParameters::from_values("Italy", [240000.0, 60.0, 0.1, 900.0, 0.5, 0.002]),
                epoch_offset: 9,
                quality: None,
            },
        );
        r.skipped
            .insert("Tiny".to_string(), SkipReason::InsufficientData { observations: 3 });
        r.skipped.insert(
            "Noisy".to_string(),
            SkipReason::UnreliableFit { l: 10.0, l_std: 40.0 },
        );
        r
    }

    #[test]
    fn summary_lists_fits_and_skip_counts() {
        let text = format_batch_summary(&report(), &PipelineConfig::default(), 10);
        assert!(text.contains("Regions: 3 | fitted=1 | skipped=2"));
        assert!(text.contains("Italy"));
        assert!(text.contains("- insufficient data: 1"));
        assert!(text.contains("- unreliable (L_std > L): 1"));
        assert!(!text.contains("no convergence"));
    }

    #[test]
    fn projection_table_has_one_line_per_date() {
        let pts = vec![
            ProjectionPoint {
                date: DEFAULT_STUDY_START,
                predicted: 5.0,
                lower: 4.0,
                upper: 6.0,
            };
            3
        ];
        let text = format_projection("Italy", 0.95, &pts);
        assert!(text.starts_with("Projection for Italy (95.0% band on L)"));
        assert_eq!(text.lines().count(), 3 + 3);
    }

    #[test]
    fn line_list_summary_skips_empty_sections() {
        let rates = vec![SymptomRate {
            symptom: "fever".to_string(),
            rate: 0.75,
        }];
        let text = format_line_list(4, &rates, &[], None);
        assert!(text.contains("Cases: 4"));
        assert!(text.contains("75.0%"));
        assert!(!text.contains("death_rate"));
        assert!(!text.contains("onset delay"));
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
