//! Relational sink for parsed zoning records.
//!
//! SQLite via sqlx. Writes are idempotent: a zone is keyed by
//! (municipality, code) and re-runs update in place instead of duplicating.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;

/// One zoning designation scraped for a municipality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ZoneRecord {
    pub code: String,
    pub subtype: Option<String>,
    pub area_acres: Option<f64>,
    pub description: Option<String>,
}

/// Attribute names feature services commonly use, in preference order.
const CODE_KEYS: [&str; 4] = ["ZONING", "ZONE", "ZONE_CODE", "ZONECLASS"];
const SUBTYPE_KEYS: [&str; 2] = ["SUBTYPE", "ZONE_TYPE"];
const ACRES_KEYS: [&str; 3] = ["ACRES", "AREA_ACRES", "Shape_Area"];
const DESC_KEYS: [&str; 3] = ["DESCRIPTION", "ZONE_DESC", "ZONING_DESC"];

/// Map one raw feature's attributes onto a zone record. `None` when no
/// recognizable zoning code attribute is present.
pub fn zone_from_feature(feature: &Value) -> Option<ZoneRecord> {
    let attrs = feature.get("attributes")?;
    let code = pick_string(attrs, &CODE_KEYS)?;
    Some(ZoneRecord {
        code,
        subtype: pick_string(attrs, &SUBTYPE_KEYS),
        area_acres: pick_number(attrs, &ACRES_KEYS),
        description: pick_string(attrs, &DESC_KEYS),
    })
}

fn pick_string(attrs: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| attrs.get(k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn pick_number(attrs: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| attrs.get(k).and_then(Value::as_f64))
}

pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS municipalities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            state TEXT NOT NULL,
            UNIQUE (name, state)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create municipalities table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS zoning_codes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            municipality_id INTEGER NOT NULL REFERENCES municipalities (id),
            code TEXT NOT NULL,
            subtype TEXT,
            area_acres REAL,
            description TEXT,
            UNIQUE (municipality_id, code)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create zoning_codes table")?;

    Ok(())
}

/// Look up a municipality by (name, state), creating it on first sight.
pub async fn get_or_create_municipality(
    pool: &SqlitePool,
    name: &str,
    state: &str,
) -> Result<i64> {
    sqlx::query("INSERT OR IGNORE INTO municipalities (name, state) VALUES (?, ?)")
        .bind(name)
        .bind(state)
        .execute(pool)
        .await
        .context("Failed to insert municipality")?;

    let id: i64 =
        sqlx::query_scalar("SELECT id FROM municipalities WHERE name = ? AND state = ?")
            .bind(name)
            .bind(state)
            .fetch_one(pool)
            .await
            .context("Failed to look up municipality id")?;
    Ok(id)
}

/// Insert or update a zone record for a municipality.
pub async fn upsert_zone(pool: &SqlitePool, municipality_id: i64, zone: &ZoneRecord) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO zoning_codes (municipality_id, code, subtype, area_acres, description)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (municipality_id, code) DO UPDATE SET
            subtype = excluded.subtype,
            area_acres = excluded.area_acres,
            description = excluded.description
        ",
    )
    .bind(municipality_id)
    .bind(&zone.code)
    .bind(&zone.subtype)
    .bind(zone.area_acres)
    .bind(&zone.description)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to upsert zone {}", zone.code))?;
    Ok(())
}

pub async fn zones_for_municipality(
    pool: &SqlitePool,
    municipality_id: i64,
) -> Result<Vec<ZoneRecord>> {
    let zones = sqlx::query_as::<_, ZoneRecord>(
        "SELECT code, subtype, area_acres, description
         FROM zoning_codes WHERE municipality_id = ? ORDER BY code",
    )
    .bind(municipality_id)
    .fetch_all(pool)
    .await
    .context("Failed to list zones")?;
    Ok(zones)
}
