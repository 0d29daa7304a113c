//! `SQLite` schema for the semear collections.
//!
//! Two collections, `families` and `donations`, plus a metadata table
//! carrying the schema version. Ids are `AUTOINCREMENT` so the store never
//! reuses an identifier, even after deletes.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// The schema version this build writes and understands.
pub(crate) const SCHEMA_VERSION: i64 = 1;

/// Key under which the schema version is stored in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// SQL statement to create the families collection.
///
/// The member list is stored as a JSON document in the `members` column;
/// `member_count` is denormalized alongside it and rewritten on every
/// membership edit.
pub(crate) const CREATE_FAMILIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS families (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    responsible_name TEXT NOT NULL,
    member_count INTEGER NOT NULL,
    members TEXT NOT NULL,
    phone TEXT NOT NULL,
    email TEXT,
    cep TEXT NOT NULL,
    address TEXT NOT NULL,
    neighborhood TEXT NOT NULL,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    complemento TEXT,
    number TEXT,
    observations TEXT,
    created_at TEXT NOT NULL,
    last_donation TEXT
)
";

/// SQL statement to create the donations collection.
///
/// `family_id` is deliberately not a foreign key: deleting a family keeps
/// its donation history, with `family_name` as the surviving snapshot.
pub(crate) const CREATE_DONATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS donations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    family_id INTEGER NOT NULL,
    family_name TEXT NOT NULL,
    donation_type TEXT NOT NULL,
    quantity TEXT NOT NULL,
    date TEXT NOT NULL,
    responsible TEXT NOT NULL,
    observations TEXT,
    created_at TEXT NOT NULL
)
";

/// Index for the default family ordering (newest registration first).
pub(crate) const CREATE_FAMILY_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_families_created_at ON families(created_at DESC)
";

/// Index for neighborhood filtering.
pub(crate) const CREATE_FAMILY_NEIGHBORHOOD_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_families_neighborhood ON families(neighborhood)
";

/// Index for the per-family donation history query.
pub(crate) const CREATE_DONATION_FAMILY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_donations_family_id ON donations(family_id)
";

/// Index for the default donation ordering (most recent date first).
pub(crate) const CREATE_DONATION_DATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_donations_date ON donations(date DESC)
";

/// Metadata table for key-value pairs such as the schema version.
pub(crate) const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub(crate) const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_FAMILIES_TABLE,
    CREATE_DONATIONS_TABLE,
    CREATE_FAMILY_CREATED_INDEX,
    CREATE_FAMILY_NEIGHBORHOOD_INDEX,
    CREATE_DONATION_FAMILY_INDEX,
    CREATE_DONATION_DATE_INDEX,
    CREATE_METADATA_TABLE,
];

/// Create all tables and indexes and stamp the schema version.
///
/// Safe to run on every open; all statements are `IF NOT EXISTS` and the
/// version stamp is idempotent.
///
/// # Errors
///
/// Returns an error if a statement fails or the database carries a schema
/// version newer than this build understands.
pub(crate) fn initialize(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    match stored_version(conn)? {
        None => {
            conn.execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                (VERSION_KEY, SCHEMA_VERSION.to_string()),
            )?;
            Ok(())
        }
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(version) if version < SCHEMA_VERSION => {
            // No migrations exist yet; version 1 is the base schema.
            Err(Error::internal(format!(
                "no migration path from schema version {version}"
            )))
        }
        Some(version) => Err(Error::internal(format!(
            "database schema version {version} is newer than this build supports"
        ))),
    }
}

/// Read the stored schema version, if any.
fn stored_version(conn: &Connection) -> Result<Option<i64>> {
    use rusqlite::OptionalExtension;

    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| Error::internal(format!("invalid schema version: {value}"))),
    }
}
