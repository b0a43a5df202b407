use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::models::{
    BranchStats, BranchSummary, CompanyCount, GlobalStats, InstitutionAnalytics,
    InstitutionSummary, PackageBand, PlacementRecord, YearStats,
};
use crate::normalize::{RecordView, YearFilter};

pub const TOP_COMPANIES: usize = 10;

const PACKAGE_BANDS: [(&str, f64, Option<f64>); 5] = [
    ("0-5 LPA", 0.0, Some(5.0)),
    ("5-10 LPA", 5.0, Some(10.0)),
    ("10-15 LPA", 10.0, Some(15.0)),
    ("15-20 LPA", 15.0, Some(20.0)),
    ("20+ LPA", 20.0, None),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SummarySort {
    Rate,
    Package,
    Students,
}

#[derive(Debug, Default)]
struct Tally<'a> {
    total: usize,
    placed: usize,
    package_sum: f64,
    package_count: usize,
    highest: f64,
    companies: BTreeSet<&'a str>,
}

impl<'a> Tally<'a> {
    fn add(&mut self, view: &RecordView<'a>) {
        self.total += 1;
        if view.placed {
            self.placed += 1;
        }
        if let Some(package) = view.package {
            self.package_sum += package;
            self.package_count += 1;
            self.highest = self.highest.max(package);
        }
        if let Some(company) = view.company {
            self.companies.insert(company);
        }
    }

    fn raw_placement_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.placed as f64 / self.total as f64 * 100.0
        }
    }

    fn placement_rate(&self) -> f64 {
        round2(self.raw_placement_rate())
    }

    fn avg_package(&self) -> f64 {
        if self.package_count == 0 {
            0.0
        } else {
            round2(self.package_sum / self.package_count as f64)
        }
    }

    fn highest_package(&self) -> f64 {
        round2(self.highest)
    }
}

/// Groups keyed by string, iterated in the order keys were first seen.
struct OrderedGroups<T> {
    index: HashMap<String, usize>,
    entries: Vec<(String, T)>,
}

impl<T: Default> OrderedGroups<T> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry(&mut self, key: &str) -> &mut T {
        let slot = match self.index.get(key) {
            Some(slot) => *slot,
            None => {
                self.entries.push((key.to_string(), T::default()));
                self.index.insert(key.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[slot].1
    }

    fn into_entries(self) -> Vec<(String, T)> {
        self.entries
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn classify_all(records: &[PlacementRecord]) -> Vec<RecordView<'_>> {
    records.iter().map(RecordView::classify).collect()
}

pub fn compute_institution_analytics(
    records: &[PlacementRecord],
    year: &YearFilter,
) -> InstitutionAnalytics {
    let views: Vec<RecordView<'_>> = classify_all(records)
        .into_iter()
        .filter(|view| year.matches(&view.year))
        .collect();

    let mut overall = Tally::default();
    let mut branches: OrderedGroups<Tally<'_>> = OrderedGroups::new();
    let mut years: OrderedGroups<Tally<'_>> = OrderedGroups::new();
    let mut companies: OrderedGroups<usize> = OrderedGroups::new();

    for view in views.iter() {
        overall.add(view);
        branches.entry(view.branch).add(view);
        years.entry(&view.year).add(view);
        if let Some(company) = view.company {
            *companies.entry(company) += 1;
        }
    }

    debug!(
        records = overall.total,
        placed = overall.placed,
        valid_packages = overall.package_count,
        "computed institution analytics"
    );

    let branch_wise = branches
        .into_entries()
        .into_iter()
        .map(|(branch, tally)| BranchStats {
            branch,
            total_students: tally.total,
            placed_students: tally.placed,
            placement_rate: tally.placement_rate(),
            avg_package: tally.avg_package(),
            highest_package: tally.highest_package(),
        })
        .collect();

    let year_wise = years
        .into_entries()
        .into_iter()
        .map(|(year, tally)| YearStats {
            year,
            total_students: tally.total,
            placed_students: tally.placed,
            placement_rate: tally.placement_rate(),
            avg_package: tally.avg_package(),
        })
        .collect();

    let mut company_wise: Vec<CompanyCount> = companies
        .into_entries()
        .into_iter()
        .map(|(company, count)| CompanyCount { company, count })
        .collect();
    company_wise.sort_by(|a, b| b.count.cmp(&a.count));
    company_wise.truncate(TOP_COMPANIES);

    InstitutionAnalytics {
        total_students: overall.total,
        placed_students: overall.placed,
        placement_rate: overall.placement_rate(),
        avg_package: overall.avg_package(),
        highest_package: overall.highest_package(),
        total_companies: overall.companies.len(),
        branch_wise,
        company_wise,
        year_wise,
        package_distribution: package_distribution(views.iter().filter_map(|view| view.package)),
    }
}

/// Buckets packages into the fixed LPA bands, dropping empty bands.
pub fn package_distribution(packages: impl Iterator<Item = f64>) -> Vec<PackageBand> {
    let mut counts = [0usize; PACKAGE_BANDS.len()];

    for package in packages {
        let band = PACKAGE_BANDS.iter().position(|(_, min, max)| {
            package >= *min && max.map(|upper| package < upper).unwrap_or(true)
        });
        if let Some(band) = band {
            counts[band] += 1;
        }
    }

    PACKAGE_BANDS
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|((range, min, max), count)| PackageBand {
            range: range.to_string(),
            min: *min,
            max: *max,
            count,
        })
        .collect()
}

pub fn compute_global_stats(records: &[PlacementRecord]) -> GlobalStats {
    let mut overall = Tally::default();
    for view in classify_all(records).iter() {
        overall.add(view);
    }

    GlobalStats {
        total_offers: overall.total,
        placement_rate: overall.placement_rate(),
        avg_package: overall.avg_package(),
        total_companies: overall.companies.len(),
    }
}

pub fn compute_global_branch_wise(records: &[PlacementRecord]) -> Vec<BranchSummary> {
    let mut branches: OrderedGroups<Tally<'_>> = OrderedGroups::new();
    for view in classify_all(records).iter() {
        branches.entry(view.branch).add(view);
    }

    // Ranked by the unrounded rate; output rates are rounded afterwards.
    let mut entries = branches.into_entries();
    entries.sort_by(|(_, a), (_, b)| {
        b.raw_placement_rate()
            .partial_cmp(&a.raw_placement_rate())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    entries
        .into_iter()
        .map(|(branch, tally)| BranchSummary {
            branch,
            total_students: tally.total,
            placed_students: tally.placed,
            placement_rate: tally.placement_rate(),
            avg_package: tally.avg_package(),
            highest_package: tally.highest_package(),
            companies: tally.companies.iter().map(|name| name.to_string()).collect(),
        })
        .collect()
}

pub fn compute_all_institutions_summary(records: &[PlacementRecord]) -> Vec<InstitutionSummary> {
    let mut institutions: OrderedGroups<Tally<'_>> = OrderedGroups::new();
    for view in classify_all(records).iter() {
        institutions.entry(view.institution_id).add(view);
    }

    institutions
        .into_entries()
        .into_iter()
        .map(|(institution_id, tally)| InstitutionSummary {
            institution_id,
            total_students: tally.total,
            placed_students: tally.placed,
            placement_rate: tally.placement_rate(),
            avg_package: tally.avg_package(),
            highest_package: tally.highest_package(),
            total_companies: tally.companies.len(),
        })
        .collect()
}

pub fn sort_institution_summaries(summaries: &mut [InstitutionSummary], key: SummarySort) {
    match key {
        SummarySort::Rate => summaries.sort_by(|a, b| {
            b.placement_rate
                .partial_cmp(&a.placement_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        SummarySort::Package => summaries.sort_by(|a, b| {
            b.avg_package
                .partial_cmp(&a.avg_package)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        SummarySort::Students => summaries.sort_by(|a, b| b.total_students.cmp(&a.total_students)),
    }
}
