//! Reference data seeding and lookup
//!
//! Countries and institutions are fixed reference data: one Country per
//! [`CountryCode`], one Institution per (country, [`InstitutionKind`]).
//! Seeding relies on the UNIQUE constraints of both tables, so running it
//! again creates nothing.

use crate::db::models::{Country, Institution};
use crate::types::{CountryCode, InstitutionKind};
use crate::uuid_utils::{generate, parse_column, parse_optional_column};
use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Rows created by one [`seed_defaults`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub countries_created: usize,
    pub institutions_created: usize,
}

/// Human label of a seeded institution, e.g. "Parliament of Germany"
pub fn institution_label(kind: InstitutionKind, country: CountryCode) -> String {
    format!("{} of {}", kind, country)
}

/// Create any missing default countries and institutions
pub async fn seed_defaults(pool: &SqlitePool) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let mut tx = pool.begin().await?;

    for code in CountryCode::ALL {
        let inserted = sqlx::query("INSERT OR IGNORE INTO countries (id, code) VALUES (?, ?)")
            .bind(generate().to_string())
            .bind(code.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        report.countries_created += inserted as usize;

        let country_id: String = sqlx::query_scalar("SELECT id FROM countries WHERE code = ?")
            .bind(code.as_str())
            .fetch_one(&mut *tx)
            .await?;

        for kind in InstitutionKind::ALL {
            let inserted = sqlx::query(
                "INSERT OR IGNORE INTO institutions (id, country_id, kind, label) VALUES (?, ?, ?, ?)",
            )
            .bind(generate().to_string())
            .bind(&country_id)
            .bind(kind.as_str())
            .bind(institution_label(*kind, *code))
            .execute(&mut *tx)
            .await?
            .rows_affected();
            report.institutions_created += inserted as usize;
        }
    }

    tx.commit().await?;

    info!(
        "Seeded reference data: {} countries, {} institutions created",
        report.countries_created, report.institutions_created
    );

    Ok(report)
}

/// Load a country by its code
pub async fn load_country_by_code(pool: &SqlitePool, code: CountryCode) -> Result<Option<Country>> {
    let row = sqlx::query("SELECT id FROM countries WHERE code = ?")
        .bind(code.as_str())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            Ok(Some(Country {
                id: parse_column("countries.id", &id)?,
                code,
            }))
        }
        None => Ok(None),
    }
}

/// Load the institution of `kind` in the country with `code`
pub async fn load_institution(
    pool: &SqlitePool,
    code: CountryCode,
    kind: InstitutionKind,
) -> Result<Option<Institution>> {
    let row = sqlx::query(
        r#"
        SELECT i.id, i.country_id, i.label
        FROM institutions i
        JOIN countries c ON c.id = i.country_id
        WHERE c.code = ? AND i.kind = ?
        "#,
    )
    .bind(code.as_str())
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            let country_id: Option<String> = row.get("country_id");
            Ok(Some(Institution {
                id: parse_column("institutions.id", &id)?,
                country_id: parse_optional_column("institutions.country_id", country_id.as_deref())?,
                kind,
                label: row.get("label"),
            }))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[test]
    fn test_institution_label() {
        assert_eq!(
            institution_label(InstitutionKind::Parliament, CountryCode::Germany),
            "Parliament of Germany"
        );
        assert_eq!(
            institution_label(InstitutionKind::FederalAssembly, CountryCode::France),
            "Federal Assembly of France"
        );
    }

    #[tokio::test]
    async fn test_seed_defaults_is_idempotent() {
        let pool = init_memory_database().await.unwrap();

        let first = seed_defaults(&pool).await.unwrap();
        assert_eq!(first.countries_created, CountryCode::ALL.len());
        assert_eq!(
            first.institutions_created,
            CountryCode::ALL.len() * InstitutionKind::ALL.len()
        );

        let second = seed_defaults(&pool).await.unwrap();
        assert_eq!(second, SeedReport::default());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM institutions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count as usize, CountryCode::ALL.len() * InstitutionKind::ALL.len());
    }

    #[tokio::test]
    async fn test_load_institution_after_seed() {
        let pool = init_memory_database().await.unwrap();
        assert!(load_institution(&pool, CountryCode::Germany, InstitutionKind::Parliament)
            .await
            .unwrap()
            .is_none());

        seed_defaults(&pool).await.unwrap();

        let country = load_country_by_code(&pool, CountryCode::Germany).await.unwrap().unwrap();
        let institution = load_institution(&pool, CountryCode::Germany, InstitutionKind::Parliament)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(institution.country_id, Some(country.id));
        assert_eq!(institution.label, "Parliament of Germany");
    }
}
