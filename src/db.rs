use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    Institution, InstitutionChanges, InstitutionDetail, LooseValue, PlacementRecord, StoredRecord,
};
use crate::normalize::newest_batch_first;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let institutions = vec![
        ("IITB", "Indian Institute of Technology Bombay", "Mumbai"),
        ("NITK", "National Institute of Technology Karnataka", "Surathkal"),
        ("BITS", "Birla Institute of Technology and Science", "Pilani"),
    ];

    for (code, name, location) in institutions {
        sqlx::query(
            r#"
            INSERT INTO placement_pulse.institutions (code, name, location)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, location = EXCLUDED.location
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(location)
        .execute(pool)
        .await?;
    }

    let records = [
        ("seed-001", "IITB", 2024.0, "Avery Lee", "Computer Science", "Tech Corp", "24.5", "Placed"),
        ("seed-002", "IITB", 2024.0, "Jules Moreno", "Computer Science", "Software Inc", "15", "placed"),
        ("seed-003", "IITB", 2024.0, "Kiara Patel", "Electrical", "0", "0", "Not Placed"),
        ("seed-004", "IITB", 2023.0, "Rohan Mehta", "Mechanical", "Engineering Ltd", "6.0", "Intern"),
        ("seed-005", "NITK", 2024.0, "Sana Iyer", "Electronics", "Hardware Corp", "8.5", "PLACED"),
        ("seed-006", "NITK", 2024.0, "Dev Rao", "Electronics", "Tech Corp", "abc", "Placed"),
        ("seed-007", "BITS", 2023.0, "Meera Nair", "Computer Science", "Tech Corp", "18", "Placed"),
    ];

    for (source_key, institution_id, batch_year, name, branch, company, package, status) in records
    {
        let record = PlacementRecord {
            institution_id: institution_id.to_string(),
            batch_year: LooseValue::Number(batch_year),
            student_name: name.to_string(),
            branch: Some(branch.to_string()),
            company: Some(company.to_string()),
            compensation: LooseValue::from(package),
            status: Some(status.to_string()),
        };
        insert_record(pool, &record, source_key).await?;
    }

    info!("seeded sample institutions and placement records");
    Ok(())
}

/// Inserts a record unless `source_key` was already loaded. Returns whether a
/// row was written.
pub async fn insert_record<'e, E>(
    executor: E,
    record: &PlacementRecord,
    source_key: &str,
) -> anyhow::Result<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO placement_pulse.placement_records
        (id, institution_id, batch_year, student_name, branch, company, package, status, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&record.institution_id)
    .bind(Json(&record.batch_year))
    .bind(&record.student_name)
    .bind(record.branch.as_deref())
    .bind(record.company.as_deref())
    .bind(Json(&record.compensation))
    .bind(record.status.as_deref())
    .bind(source_key)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub fn upload_source_key(upload_id: Uuid, row_index: usize) -> String {
    format!("import-{upload_id}-{row_index}")
}

/// Writes a whole upload in one transaction; any failure leaves nothing behind.
pub async fn import_records(pool: &PgPool, records: &[PlacementRecord]) -> anyhow::Result<usize> {
    let upload_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (index, record) in records.iter().enumerate() {
        if insert_record(&mut *tx, record, &upload_source_key(upload_id, index)).await? {
            inserted += 1;
        }
    }

    tx.commit().await?;
    debug!(%upload_id, inserted, "committed upload");
    Ok(inserted)
}

fn record_from_row(row: &PgRow) -> Result<StoredRecord, sqlx::Error> {
    let batch_year: Json<LooseValue> = row.try_get("batch_year")?;
    let compensation: Json<LooseValue> = row.try_get("package")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(StoredRecord {
        id: row.try_get("id")?,
        created_at,
        record: PlacementRecord {
            institution_id: row.try_get("institution_id")?,
            batch_year: batch_year.0,
            student_name: row.try_get("student_name")?,
            branch: row.try_get("branch")?,
            company: row.try_get("company")?,
            compensation: compensation.0,
            status: row.try_get("status")?,
        },
    })
}

/// Fetches records in insertion order, optionally for one institution.
pub async fn fetch_records(
    pool: &PgPool,
    institution_id: Option<&str>,
) -> anyhow::Result<Vec<StoredRecord>> {
    let mut query = String::from(
        "SELECT id, institution_id, batch_year, student_name, branch, company, package, \
         status, created_at \
         FROM placement_pulse.placement_records",
    );

    if institution_id.is_some() {
        query.push_str(" WHERE institution_id = $1");
    }
    query.push_str(" ORDER BY created_at, id");

    let mut rows = sqlx::query(&query);

    if let Some(value) = institution_id {
        rows = rows.bind(value);
    }

    let fetched = rows.fetch_all(pool).await?;
    let mut records = Vec::with_capacity(fetched.len());

    for row in fetched.iter() {
        records.push(record_from_row(row)?);
    }

    debug!(
        institution = institution_id.unwrap_or("all"),
        count = records.len(),
        "fetched placement records"
    );
    Ok(records)
}

/// Records of one institution with the latest batch first.
pub async fn fetch_institution_records(
    pool: &PgPool,
    institution_id: &str,
) -> anyhow::Result<Vec<StoredRecord>> {
    let mut records = fetch_records(pool, Some(institution_id)).await?;
    newest_batch_first(&mut records);
    Ok(records)
}

fn institution_from_row(row: &PgRow) -> Result<Institution, sqlx::Error> {
    Ok(Institution {
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        location: row.try_get("location")?,
        established: row.try_get("established")?,
        ranking: row.try_get("ranking")?,
        placement_officer: row.try_get("placement_officer")?,
    })
}

fn conflict_or(err: sqlx::Error) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return anyhow::anyhow!("an institution with this name or code already exists");
        }
    }
    err.into()
}

pub async fn create_institution(pool: &PgPool, institution: &Institution) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO placement_pulse.institutions
        (code, name, location, established, ranking, placement_officer)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&institution.code)
    .bind(&institution.name)
    .bind(&institution.location)
    .bind(institution.established)
    .bind(institution.ranking)
    .bind(institution.placement_officer.as_deref())
    .execute(pool)
    .await
    .map_err(conflict_or)?;

    info!(code = %institution.code, "created institution");
    Ok(())
}

pub async fn list_institutions(pool: &PgPool) -> anyhow::Result<Vec<Institution>> {
    let rows = sqlx::query(
        "SELECT code, name, location, established, ranking, placement_officer \
         FROM placement_pulse.institutions ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut institutions = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        institutions.push(institution_from_row(row)?);
    }
    Ok(institutions)
}

pub async fn fetch_institution(pool: &PgPool, code: &str) -> anyhow::Result<Option<Institution>> {
    let row = sqlx::query(
        "SELECT code, name, location, established, ranking, placement_officer \
         FROM placement_pulse.institutions WHERE code = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(institution_from_row).transpose()?)
}

pub fn require_institution(found: Option<Institution>, code: &str) -> anyhow::Result<Institution> {
    found.ok_or_else(|| {
        anyhow::anyhow!("unknown institution '{code}'; add it with `institution add` first")
    })
}

pub async fn fetch_institution_detail(
    pool: &PgPool,
    code: &str,
) -> anyhow::Result<Option<InstitutionDetail>> {
    let Some(institution) = fetch_institution(pool, code).await? else {
        return Ok(None);
    };
    let placement_data = fetch_institution_records(pool, code).await?;

    Ok(Some(InstitutionDetail {
        institution,
        placement_data,
    }))
}

/// Returns `false` when no institution has `code`.
pub async fn update_institution(
    pool: &PgPool,
    code: &str,
    changes: &InstitutionChanges,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE placement_pulse.institutions
        SET name = COALESCE($2, name),
            location = COALESCE($3, location),
            established = COALESCE($4, established),
            ranking = COALESCE($5, ranking),
            placement_officer = COALESCE($6, placement_officer),
            updated_at = now()
        WHERE code = $1
        "#,
    )
    .bind(code)
    .bind(changes.name.as_deref())
    .bind(changes.location.as_deref())
    .bind(changes.established)
    .bind(changes.ranking)
    .bind(changes.placement_officer.as_deref())
    .execute(pool)
    .await
    .map_err(conflict_or)?;

    Ok(result.rows_affected() > 0)
}

/// Deletes an institution together with its placement records. Returns the
/// number of records removed, or `None` when the institution does not exist.
pub async fn delete_institution(pool: &PgPool, code: &str) -> anyhow::Result<Option<u64>> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM placement_pulse.institutions WHERE code = $1")
        .bind(code)
        .execute(&mut *tx)
        .await?;
    if removed.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let records =
        sqlx::query("DELETE FROM placement_pulse.placement_records WHERE institution_id = $1")
            .bind(code)
            .execute(&mut *tx)
            .await?;

    tx.commit().await?;
    info!(code, records = records.rows_affected(), "deleted institution");
    Ok(Some(records.rows_affected()))
}

pub async fn purge_institution(pool: &PgPool, institution_id: &str) -> anyhow::Result<u64> {
    let result =
        sqlx::query("DELETE FROM placement_pulse.placement_records WHERE institution_id = $1")
            .bind(institution_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_keys_are_unique_per_row_and_stable_per_upload() {
        let upload_id = Uuid::new_v4();
        assert_eq!(
            upload_source_key(upload_id, 3),
            upload_source_key(upload_id, 3)
        );
        assert_ne!(
            upload_source_key(upload_id, 3),
            upload_source_key(upload_id, 4)
        );
        assert!(upload_source_key(upload_id, 0).starts_with("import-"));
    }

    #[test]
    fn unknown_institutions_are_rejected() {
        let err = require_institution(None, "XYZ").unwrap_err();
        assert!(err.to_string().contains("unknown institution 'XYZ'"));

        let known = Institution::new("IITB", "IIT Bombay", "Mumbai").unwrap();
        assert_eq!(
            require_institution(Some(known.clone()), "IITB").unwrap(),
            known
        );
    }
}
