use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{Institution, InstitutionAnalytics, InstitutionSummary};
use crate::normalize::YearFilter;

pub fn build_report(
    institution_id: &str,
    institution: Option<&Institution>,
    year: &YearFilter,
    generated_at: DateTime<Utc>,
    analytics: &InstitutionAnalytics,
) -> String {
    let mut output = String::new();
    let label = match institution {
        Some(found) => format!("{} ({}, {})", found.name, found.code, found.location),
        None => institution_id.to_string(),
    };

    let _ = writeln!(output, "# Placement Report");
    let _ = writeln!(
        output,
        "Generated for {} covering {} on {}",
        label,
        year,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- Students: {} ({} placed, {:.2}%)",
        analytics.total_students, analytics.placed_students, analytics.placement_rate
    );
    let _ = writeln!(
        output,
        "- Packages: avg {:.2} LPA, highest {:.2} LPA",
        analytics.avg_package, analytics.highest_package
    );
    let _ = writeln!(output, "- Recruiting companies: {}", analytics.total_companies);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Branches");

    if analytics.branch_wise.is_empty() {
        let _ = writeln!(output, "No placement records for this selection.");
    } else {
        for branch in analytics.branch_wise.iter() {
            let _ = writeln!(
                output,
                "- {}: {}/{} placed ({:.2}%), avg {:.2} LPA, highest {:.2} LPA",
                branch.branch,
                branch.placed_students,
                branch.total_students,
                branch.placement_rate,
                branch.avg_package,
                branch.highest_package
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Recruiters");

    if analytics.company_wise.is_empty() {
        let _ = writeln!(output, "No recruiters recorded.");
    } else {
        for entry in analytics.company_wise.iter() {
            let _ = writeln!(output, "- {}: {} offers", entry.company, entry.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Batches");

    if analytics.year_wise.is_empty() {
        let _ = writeln!(output, "No batches recorded.");
    } else {
        for batch in analytics.year_wise.iter() {
            let _ = writeln!(
                output,
                "- {}: {}/{} placed ({:.2}%), avg {:.2} LPA",
                batch.year,
                batch.placed_students,
                batch.total_students,
                batch.placement_rate,
                batch.avg_package
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Package Bands");

    if analytics.package_distribution.is_empty() {
        let _ = writeln!(output, "No valid packages recorded.");
    } else {
        for band in analytics.package_distribution.iter() {
            let _ = writeln!(output, "- {}: {}", band.range, band.count);
        }
    }

    output
}

pub fn build_institution_listing(summaries: &[InstitutionSummary]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## Institutions by Placement");

    if summaries.is_empty() {
        let _ = writeln!(output, "No placement records found.");
    }

    for summary in summaries.iter() {
        let _ = writeln!(
            output,
            "- {}: {}/{} placed ({:.2}%), avg {:.2} LPA, highest {:.2} LPA, {} companies",
            summary.institution_id,
            summary.placed_students,
            summary.total_students,
            summary.placement_rate,
            summary.avg_package,
            summary.highest_package,
            summary.total_companies
        );
    }

    output
}
