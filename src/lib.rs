pub mod analytics;
pub mod config;
pub mod db;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod report;

pub use analytics::{
    compute_all_institutions_summary, compute_global_branch_wise, compute_global_stats,
    compute_institution_analytics, sort_institution_summaries, SummarySort,
};
pub use models::{LooseValue, PlacementRecord};
pub use normalize::YearFilter;
