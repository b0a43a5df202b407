use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A field the store keeps as either a number or a string, or not at all.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Number(f64),
    Text(String),
    #[default]
    Absent,
}

impl From<f64> for LooseValue {
    fn from(value: f64) -> Self {
        LooseValue::Number(value)
    }
}

impl From<&str> for LooseValue {
    fn from(value: &str) -> Self {
        LooseValue::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRecord {
    pub institution_id: String,
    #[serde(default)]
    pub batch_year: LooseValue,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default, rename = "package")]
    pub compensation: LooseValue,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: PlacementRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    pub code: String,
    pub name: String,
    pub location: String,
    pub established: Option<i32>,
    pub ranking: Option<i32>,
    pub placement_officer: Option<String>,
}

impl Institution {
    /// Code, name and location are required; surrounding whitespace is dropped.
    pub fn new(code: &str, name: &str, location: &str) -> anyhow::Result<Self> {
        let (code, name, location) = (code.trim(), name.trim(), location.trim());
        anyhow::ensure!(
            !code.is_empty() && !name.is_empty() && !location.is_empty(),
            "name, location, and code are required"
        );

        Ok(Self {
            code: code.to_string(),
            name: name.to_string(),
            location: location.to_string(),
            established: None,
            ranking: None,
            placement_officer: None,
        })
    }
}

/// Partial update of an institution; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstitutionChanges {
    pub name: Option<String>,
    pub location: Option<String>,
    pub established: Option<i32>,
    pub ranking: Option<i32>,
    pub placement_officer: Option<String>,
}

impl InstitutionChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionDetail {
    #[serde(flatten)]
    pub institution: Institution,
    pub placement_data: Vec<StoredRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionAnalytics {
    pub total_students: usize,
    pub placed_students: usize,
    pub placement_rate: f64,
    pub avg_package: f64,
    pub highest_package: f64,
    pub total_companies: usize,
    pub branch_wise: Vec<BranchStats>,
    pub company_wise: Vec<CompanyCount>,
    pub year_wise: Vec<YearStats>,
    pub package_distribution: Vec<PackageBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchStats {
    pub branch: String,
    pub total_students: usize,
    pub placed_students: usize,
    pub placement_rate: f64,
    pub avg_package: f64,
    pub highest_package: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyCount {
    pub company: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearStats {
    pub year: String,
    pub total_students: usize,
    pub placed_students: usize,
    pub placement_rate: f64,
    pub avg_package: f64,
}

/// Count of placed offers whose package falls in `[min, max)`; `max` is
/// `None` for the open top band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageBand {
    pub range: String,
    pub min: f64,
    pub max: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_offers: usize,
    pub placement_rate: f64,
    pub avg_package: f64,
    pub total_companies: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSummary {
    pub branch: String,
    pub total_students: usize,
    pub placed_students: usize,
    pub placement_rate: f64,
    pub avg_package: f64,
    pub highest_package: f64,
    pub companies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionSummary {
    pub institution_id: String,
    pub total_students: usize,
    pub placed_students: usize,
    pub placement_rate: f64,
    pub avg_package: f64,
    pub highest_package: f64,
    pub total_companies: usize,
}
