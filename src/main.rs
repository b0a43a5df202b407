use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use placement_pulse::config::Config;
use placement_pulse::models::{Institution, InstitutionChanges, PlacementRecord, StoredRecord};
use placement_pulse::{analytics, db, ingest, report, SummarySort, YearFilter};

#[derive(Parser)]
#[command(name = "placement-pulse")]
#[command(about = "College placement statistics over uploaded placement records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Manage institutions
    #[command(subcommand)]
    Institution(InstitutionCommand),
    /// Import placement records from an uploaded CSV file
    Import {
        #[arg(long)]
        institution: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Write a CSV upload template
    Template {
        #[arg(long, default_value = "placement_data_template.csv")]
        out: PathBuf,
    },
    /// List an institution's stored records, latest batch first
    Records {
        #[arg(long)]
        institution: String,
    },
    /// Placement analytics for one institution
    Analytics {
        #[arg(long)]
        institution: String,
        #[arg(long, default_value = "all")]
        year: YearFilter,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Placement statistics across every institution
    Global,
    /// Branch-wise statistics across every institution
    Branches,
    /// One summary per institution
    Institutions {
        #[arg(long, value_enum, default_value_t = SummarySort::Rate)]
        sort_by: SummarySort,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Delete every placement record of an institution, keeping the institution
    Purge {
        #[arg(long)]
        institution: String,
    },
}

#[derive(Subcommand)]
enum InstitutionCommand {
    /// Register a new institution
    Add {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        location: String,
        #[command(flatten)]
        details: InstitutionDetails,
    },
    /// List institutions by name
    List,
    /// Show an institution with its placement records
    Show {
        #[arg(long)]
        code: String,
    },
    /// Change an institution's details
    Update {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[command(flatten)]
        details: InstitutionDetails,
    },
    /// Remove an institution and all of its placement records
    Remove {
        #[arg(long)]
        code: String,
    },
}

#[derive(Args)]
struct InstitutionDetails {
    #[arg(long)]
    established: Option<i32>,
    #[arg(long)]
    ranking: Option<i32>,
    #[arg(long)]
    placement_officer: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn plain_records(stored: Vec<StoredRecord>) -> Vec<PlacementRecord> {
    stored.into_iter().map(|stored| stored.record).collect()
}

async fn run_institution(pool: &sqlx::PgPool, command: InstitutionCommand) -> anyhow::Result<()> {
    match command {
        InstitutionCommand::Add {
            code,
            name,
            location,
            details,
        } => {
            let mut institution = Institution::new(&code, &name, &location)?;
            institution.established = details.established;
            institution.ranking = details.ranking;
            institution.placement_officer = details.placement_officer;
            db::create_institution(pool, &institution).await?;
            print_json(&institution)?;
        }
        InstitutionCommand::List => {
            print_json(&db::list_institutions(pool).await?)?;
        }
        InstitutionCommand::Show { code } => {
            let detail = db::fetch_institution_detail(pool, &code)
                .await?
                .with_context(|| format!("institution '{code}' not found"))?;
            print_json(&detail)?;
        }
        InstitutionCommand::Update {
            code,
            name,
            location,
            details,
        } => {
            let changes = InstitutionChanges {
                name,
                location,
                established: details.established,
                ranking: details.ranking,
                placement_officer: details.placement_officer,
            };
            anyhow::ensure!(!changes.is_empty(), "nothing to update for '{code}'");

            if !db::update_institution(pool, &code, &changes).await? {
                anyhow::bail!("institution '{code}' not found");
            }
            let updated = db::require_institution(db::fetch_institution(pool, &code).await?, &code)?;
            print_json(&updated)?;
        }
        InstitutionCommand::Remove { code } => {
            let records = db::delete_institution(pool, &code)
                .await?
                .with_context(|| format!("institution '{code}' not found"))?;
            println!("Deleted {code} and {records} placement records.");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    if let Commands::Template { out } = &cli.command {
        let file = File::create(out)
            .with_context(|| format!("failed to create {}", out.display()))?;
        ingest::write_template(BufWriter::new(file))?;
        println!("Template written to {}.", out.display());
        return Ok(());
    }

    let config = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Institution(command) => run_institution(&pool, command).await?,
        Commands::Import { institution, csv } => {
            let found = db::fetch_institution(&pool, institution.trim()).await?;
            let known = db::require_institution(found, institution.trim())?;
            let file = File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let records = ingest::read_upload(file, &known.code)?;
            let inserted = db::import_records(&pool, &records).await?;
            info!(institution = %known.code, inserted, "upload imported");
            println!("Inserted {inserted} records from {}.", csv.display());
        }
        Commands::Template { .. } => {}
        Commands::Records { institution } => {
            print_json(&db::fetch_institution_records(&pool, &institution).await?)?;
        }
        Commands::Analytics {
            institution,
            year,
            format,
            out,
        } => {
            let records = plain_records(db::fetch_records(&pool, Some(&institution)).await?);
            info!(institution = %institution, records = records.len(), "computing analytics");
            let analytics = analytics::compute_institution_analytics(&records, &year);

            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&analytics)?,
                OutputFormat::Markdown => {
                    let found = db::fetch_institution(&pool, &institution).await?;
                    report::build_report(
                        &institution,
                        found.as_ref(),
                        &year,
                        chrono::Utc::now(),
                        &analytics,
                    )
                }
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Analytics written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Global => {
            let records = plain_records(db::fetch_records(&pool, None).await?);
            print_json(&analytics::compute_global_stats(&records))?;
        }
        Commands::Branches => {
            let records = plain_records(db::fetch_records(&pool, None).await?);
            print_json(&analytics::compute_global_branch_wise(&records))?;
        }
        Commands::Institutions {
            sort_by,
            limit,
            format,
        } => {
            let records = plain_records(db::fetch_records(&pool, None).await?);
            let mut summaries = analytics::compute_all_institutions_summary(&records);
            analytics::sort_institution_summaries(&mut summaries, sort_by);
            summaries.truncate(limit);

            match format {
                OutputFormat::Json => print_json(&summaries)?,
                OutputFormat::Markdown => {
                    print!("{}", report::build_institution_listing(&summaries))
                }
            }
        }
        Commands::Purge { institution } => {
            let deleted = db::purge_institution(&pool, &institution).await?;
            info!(institution = %institution, deleted, "purged placement records");
            println!("Deleted {deleted} records for {institution}.");
        }
    }

    Ok(())
}
