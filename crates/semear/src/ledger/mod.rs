//! Data access layer for the family and donation collections.
//!
//! [`Ledger`] wraps the embedded `SQLite` store and exposes the typed
//! operations the console is built on: family CRUD with partial updates,
//! donation registration and deletion, per-family history, search, and
//! full-snapshot subscriptions.
//!
//! Donation mutations run their `last_donation` consistency update inside
//! the same store transaction as the record write, so a donation can never
//! be persisted without its family's derived field being maintained.

pub(crate) mod schema;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::consistency;
use crate::error::{Error, Result};
use crate::model::{
    Donation, DonationDraft, DonationType, Family, FamilyDraft, FamilyMember, FamilyPatch,
};
use crate::query;
use crate::subscription::Subscription;

/// Collection name for family records.
const FAMILIES: &str = "families";
/// Collection name for donation records.
const DONATIONS: &str = "donations";

const FAMILY_COLUMNS: &str = "id, responsible_name, member_count, members, phone, email, cep, \
     address, neighborhood, city, state, complemento, number, observations, created_at, \
     last_donation";

const DONATION_COLUMNS: &str =
    "id, family_id, family_name, donation_type, quantity, date, responsible, observations, \
     created_at";

/// Data access layer over the family and donation collections.
///
/// All mutations go through `&mut self` methods, push a fresh full snapshot
/// to every active subscription, and leave the store untouched on error.
pub struct Ledger {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Snapshot channel for the families collection.
    families_tx: watch::Sender<Vec<Family>>,
    /// Snapshot channel for the donations collection.
    donations_tx: watch::Sender<Vec<Donation>>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger").field("path", &self.path).finish()
    }
}

impl Ledger {
    /// Open or create the database at the given path.
    ///
    /// Creates parent directories if needed, enables WAL mode, initializes
    /// the schema, and primes the subscription snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL keeps concurrent admin sessions on the same file readable
        // while one of them writes.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        schema::initialize(&conn)?;

        let families_tx = watch::Sender::new(fetch_families(&conn)?);
        let donations_tx = watch::Sender::new(fetch_donations(&conn)?);

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn,
            families_tx,
            donations_tx,
        })
    }

    /// Create an in-memory ledger for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        schema::initialize(&conn)?;

        let families_tx = watch::Sender::new(Vec::new());
        let donations_tx = watch::Sender::new(Vec::new());

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
            families_tx,
            donations_tx,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Families ===

    /// Register a family.
    ///
    /// Assigns the creation timestamp, computes `member_count` from the
    /// draft's member list, and leaves `last_donation` absent. Returns the
    /// store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid draft, or a store error
    /// if the write fails (in which case the family does not exist).
    pub fn create_family(&mut self, draft: &FamilyDraft) -> Result<i64> {
        draft.validate()?;

        let created_at = Utc::now();
        let members_json = serde_json::to_string(&draft.members)?;

        self.conn.execute(
            r"
            INSERT INTO families
                (responsible_name, member_count, members, phone, email, cep, address,
                 neighborhood, city, state, complemento, number, observations, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ",
            params![
                draft.responsible_name,
                draft.members.len() as i64,
                members_json,
                draft.phone,
                draft.email,
                draft.cep,
                draft.address,
                draft.neighborhood,
                draft.city,
                draft.state,
                draft.complemento,
                draft.number,
                draft.observations,
                encode_ts(created_at),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(id, "registered family");
        self.push_families()?;
        Ok(id)
    }

    /// All families, newest registration first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_families(&self) -> Result<Vec<Family>> {
        fetch_families(&self.conn)
    }

    /// Get a family by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_family(&self, id: i64) -> Result<Option<Family>> {
        fetch_family(&self.conn, id)
    }

    /// Merge the supplied fields into an existing family record.
    ///
    /// Fields the patch does not carry are left untouched. A `members`
    /// patch also rewrites `member_count`. An empty patch is accepted and
    /// changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no family has the given id, or
    /// [`Error::Validation`] for invalid patch fields.
    pub fn update_family(&mut self, id: i64, patch: &FamilyPatch) -> Result<()> {
        patch.validate()?;

        if fetch_family(&self.conn, id)?.is_none() {
            return Err(Error::not_found(FAMILIES, id));
        }
        if patch.is_empty() {
            return Ok(());
        }

        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        let bind = |sets: &mut Vec<String>, values: &mut Vec<Value>, column: &str, value: Value| {
            values.push(value);
            sets.push(format!("{column} = ?{}", values.len()));
        };

        if let Some(v) = &patch.responsible_name {
            bind(&mut sets, &mut values, "responsible_name", text(v));
        }
        if let Some(members) = &patch.members {
            bind(
                &mut sets,
                &mut values,
                "members",
                Value::Text(serde_json::to_string(members)?),
            );
            // Membership edits always rewrite the denormalized count.
            bind(
                &mut sets,
                &mut values,
                "member_count",
                Value::Integer(members.len() as i64),
            );
        }
        if let Some(v) = &patch.phone {
            bind(&mut sets, &mut values, "phone", text(v));
        }
        if let Some(v) = &patch.email {
            bind(&mut sets, &mut values, "email", text(v));
        }
        if let Some(v) = &patch.cep {
            bind(&mut sets, &mut values, "cep", text(v));
        }
        if let Some(v) = &patch.address {
            bind(&mut sets, &mut values, "address", text(v));
        }
        if let Some(v) = &patch.neighborhood {
            bind(&mut sets, &mut values, "neighborhood", text(v));
        }
        if let Some(v) = &patch.city {
            bind(&mut sets, &mut values, "city", text(v));
        }
        if let Some(v) = &patch.state {
            bind(&mut sets, &mut values, "state", text(v));
        }
        if let Some(v) = &patch.complemento {
            bind(&mut sets, &mut values, "complemento", text(v));
        }
        if let Some(v) = &patch.number {
            bind(&mut sets, &mut values, "number", text(v));
        }
        if let Some(v) = &patch.observations {
            bind(&mut sets, &mut values, "observations", text(v));
        }

        values.push(Value::Integer(id));
        let sql = format!(
            "UPDATE families SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len()
        );

        let affected = self.conn.execute(&sql, params_from_iter(values))?;
        if affected == 0 {
            return Err(Error::not_found(FAMILIES, id));
        }

        debug!(id, "updated family");
        self.push_families()?;
        Ok(())
    }

    /// Delete a family record.
    ///
    /// Returns `true` if a record was deleted. Does not touch any donation
    /// referencing the family: history is kept under the donation's
    /// `family_name` snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_family(&mut self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM families WHERE id = ?1", [id])?;

        if affected == 0 {
            return Ok(false);
        }

        info!(id, "deleted family (donation history retained)");
        self.push_families()?;
        Ok(true)
    }

    /// Families whose responsible name or neighborhood contains the term,
    /// case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search_families(&self, term: &str) -> Result<Vec<Family>> {
        let mut families = fetch_families(&self.conn)?;
        families.retain(|family| query::matches_search(family, term));
        Ok(families)
    }

    /// Families with no donation in the last `days` days, including those
    /// that never received one.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn families_without_recent_donation(&self, days: i64) -> Result<Vec<Family>> {
        let now = Utc::now();
        let mut families = fetch_families(&self.conn)?;
        families.retain(|family| query::without_recent_donation(family, now, days));
        Ok(families)
    }

    // === Donations ===

    /// Register a donation for an existing family.
    ///
    /// Verifies the family exists, snapshots its responsible name into the
    /// record, assigns the creation timestamp, and raises the family's
    /// `last_donation`, all inside one store transaction, so the record and
    /// the derived field can never diverge through a partial failure.
    ///
    /// Returns the store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the family does not exist (no orphan
    /// donations are ever created), [`Error::Validation`] for an invalid
    /// draft, or a store error that leaves everything unchanged.
    pub fn create_donation(&mut self, draft: &DonationDraft) -> Result<i64> {
        draft.validate()?;

        let tx = self.conn.transaction()?;

        let family = fetch_family(&tx, draft.family_id)?
            .ok_or_else(|| Error::not_found(FAMILIES, draft.family_id))?;

        let created_at = Utc::now();
        tx.execute(
            r"
            INSERT INTO donations
                (family_id, family_name, donation_type, quantity, date, responsible,
                 observations, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                draft.family_id,
                family.responsible_name,
                draft.donation_type.to_string(),
                draft.quantity,
                encode_ts(draft.date),
                draft.responsible,
                draft.observations,
                encode_ts(created_at),
            ],
        )?;
        let id = tx.last_insert_rowid();

        consistency::raise_last_donation(&tx, draft.family_id, draft.date)?;
        tx.commit()?;

        debug!(id, family_id = draft.family_id, "registered donation");
        self.push_donations()?;
        self.push_families()?;
        Ok(id)
    }

    /// All donations, most recent date first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_donations(&self) -> Result<Vec<Donation>> {
        fetch_donations(&self.conn)
    }

    /// Donation history of one family, most recent date first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn donations_by_family(&self, family_id: i64) -> Result<Vec<Donation>> {
        let sql = format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE family_id = ?1 \
             ORDER BY date DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let donations = stmt
            .query_map([family_id], row_to_donation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(donations)
    }

    /// Delete a donation record.
    ///
    /// Reads the record back for its `family_id`, removes it, and recomputes
    /// the family's `last_donation` from the surviving donations, all
    /// inside one store transaction. The deleted record may have held the
    /// maximum date, so a full recompute is required. If the owning family
    /// was already deleted the recompute is a harmless no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no donation has the given id, or a
    /// store error that leaves everything unchanged.
    pub fn delete_donation(&mut self, id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;

        let donation =
            fetch_donation(&tx, id)?.ok_or_else(|| Error::not_found(DONATIONS, id))?;

        tx.execute("DELETE FROM donations WHERE id = ?1", [id])?;
        consistency::recompute_last_donation(&tx, donation.family_id)?;
        tx.commit()?;

        debug!(id, family_id = donation.family_id, "deleted donation");
        self.push_donations()?;
        self.push_families()?;
        Ok(())
    }

    // === Subscriptions ===

    /// Subscribe to the families collection.
    ///
    /// The subscription starts at the current full list and receives a
    /// fresh full replacement after every mutation that touches a family
    /// record, including donation mutations, which move `last_donation`.
    #[must_use]
    pub fn subscribe_families(&self) -> Subscription<Family> {
        Subscription::new(self.families_tx.subscribe())
    }

    /// Subscribe to the donations collection.
    ///
    /// Same contract as [`Self::subscribe_families`]: full replacement
    /// snapshots, never diffs.
    #[must_use]
    pub fn subscribe_donations(&self) -> Subscription<Donation> {
        Subscription::new(self.donations_tx.subscribe())
    }

    // === Statistics ===

    /// Get record counts and database size.
    ///
    /// # Errors
    ///
    /// Returns an error if a count query fails.
    pub fn stats(&self) -> Result<LedgerStats> {
        let family_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM families", [], |row| row.get(0))?;
        let donation_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM donations", [], |row| row.get(0))?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(LedgerStats {
            family_count,
            donation_count,
            db_size_bytes,
        })
    }

    /// Push the current families list to all subscribers.
    fn push_families(&self) -> Result<()> {
        let families = fetch_families(&self.conn)?;
        self.families_tx.send_replace(families);
        Ok(())
    }

    /// Push the current donations list to all subscribers.
    fn push_donations(&self) -> Result<()> {
        let donations = fetch_donations(&self.conn)?;
        self.donations_tx.send_replace(donations);
        Ok(())
    }
}

/// Statistics about the ledger.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LedgerStats {
    /// Number of family records.
    pub family_count: i64,
    /// Number of donation records.
    pub donation_count: i64,
    /// Size of the database file in bytes (0 for in-memory).
    pub db_size_bytes: u64,
}

/// Encode a timestamp for storage.
///
/// Fixed microsecond precision keeps the stored strings' lexicographic
/// order identical to chronological order, which the `ORDER BY` clauses
/// rely on.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp. Returns `None` for unparseable values.
pub(crate) fn decode_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn fetch_families(conn: &Connection) -> Result<Vec<Family>> {
    let sql = format!("SELECT {FAMILY_COLUMNS} FROM families ORDER BY created_at DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let families = stmt
        .query_map([], row_to_family)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(families)
}

fn fetch_family(conn: &Connection, id: i64) -> Result<Option<Family>> {
    let sql = format!("SELECT {FAMILY_COLUMNS} FROM families WHERE id = ?1");
    let family = conn.query_row(&sql, [id], row_to_family).optional()?;
    Ok(family)
}

fn fetch_donations(conn: &Connection) -> Result<Vec<Donation>> {
    let sql = format!("SELECT {DONATION_COLUMNS} FROM donations ORDER BY date DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let donations = stmt
        .query_map([], row_to_donation)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(donations)
}

fn fetch_donation(conn: &Connection, id: i64) -> Result<Option<Donation>> {
    let sql = format!("SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1");
    let donation = conn.query_row(&sql, [id], row_to_donation).optional()?;
    Ok(donation)
}

/// Convert a database row to a Family record.
fn row_to_family(row: &rusqlite::Row) -> rusqlite::Result<Family> {
    let members_json: String = row.get(3)?;
    let members: Vec<FamilyMember> = serde_json::from_str(&members_json).unwrap_or_else(|err| {
        warn!("unreadable member list, treating as empty: {err}");
        Vec::new()
    });

    let created_at_raw: String = row.get(14)?;
    let last_donation_raw: Option<String> = row.get(15)?;

    Ok(Family {
        id: row.get(0)?,
        responsible_name: row.get(1)?,
        member_count: row.get(2)?,
        members,
        phone: row.get(4)?,
        email: row.get(5)?,
        cep: row.get(6)?,
        address: row.get(7)?,
        neighborhood: row.get(8)?,
        city: row.get(9)?,
        state: row.get(10)?,
        complemento: row.get(11)?,
        number: row.get(12)?,
        observations: row.get(13)?,
        created_at: decode_ts(&created_at_raw).unwrap_or_else(Utc::now),
        last_donation: last_donation_raw.as_deref().and_then(decode_ts),
    })
}

/// Convert a database row to a Donation record.
fn row_to_donation(row: &rusqlite::Row) -> rusqlite::Result<Donation> {
    let type_raw: String = row.get(3)?;
    let donation_type = type_raw.parse::<DonationType>().unwrap_or_else(|_| {
        warn!("unknown donation type: {type_raw}, defaulting to other");
        DonationType::Other
    });

    let date_raw: String = row.get(5)?;
    let created_at_raw: String = row.get(8)?;

    Ok(Donation {
        id: row.get(0)?,
        family_id: row.get(1)?,
        family_name: row.get(2)?,
        donation_type,
        quantity: row.get(4)?,
        date: decode_ts(&date_raw).unwrap_or_else(Utc::now),
        responsible: row.get(6)?,
        observations: row.get(7)?,
        created_at: decode_ts(&created_at_raw).unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::members_from_ages;

    fn test_ledger() -> Ledger {
        Ledger::open_in_memory().expect("failed to create test ledger")
    }

    fn family_draft(name: &str, neighborhood: &str) -> FamilyDraft {
        FamilyDraft {
            responsible_name: name.to_string(),
            members: members_from_ages(&[34, 12]),
            phone: "(11) 91234-5678".to_string(),
            cep: "01310-100".to_string(),
            address: "Avenida Paulista".to_string(),
            neighborhood: neighborhood.to_string(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
            ..FamilyDraft::default()
        }
    }

    fn donation_draft(family_id: i64, date: DateTime<Utc>) -> DonationDraft {
        DonationDraft {
            family_id,
            donation_type: DonationType::NonPerishableFood,
            quantity: "5kg".to_string(),
            date,
            responsible: "João".to_string(),
            observations: None,
        }
    }

    fn day(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("{s}T00:00:00Z"))
            .expect("valid date")
            .with_timezone(&Utc)
    }

    #[test]
    fn test_open_in_memory() {
        assert!(Ledger::open_in_memory().is_ok());
    }

    #[test]
    fn test_create_and_get_family() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria Souza", "Bela Vista"))
            .unwrap();

        let family = ledger.get_family(id).unwrap().unwrap();
        assert_eq!(family.responsible_name, "Maria Souza");
        assert_eq!(family.member_count, 2);
        assert_eq!(family.members.len(), 2);
        assert!(family.last_donation.is_none());
    }

    #[test]
    fn test_create_family_rejects_invalid_draft() {
        let mut ledger = test_ledger();
        let mut draft = family_draft("", "Centro");
        draft.responsible_name = String::new();

        let err = ledger.create_family(&draft).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(ledger.list_families().unwrap().len(), 0);
    }

    #[test]
    fn test_get_nonexistent_family() {
        let ledger = test_ledger();
        assert!(ledger.get_family(99_999).unwrap().is_none());
    }

    #[test]
    fn test_list_families_newest_first() {
        let mut ledger = test_ledger();
        let first = ledger.create_family(&family_draft("Maria", "Centro")).unwrap();
        let second = ledger.create_family(&family_draft("José", "Lapa")).unwrap();

        let families = ledger.list_families().unwrap();
        assert_eq!(families.len(), 2);
        assert_eq!(families[0].id, second);
        assert_eq!(families[1].id, first);
    }

    #[test]
    fn test_update_family_merges_only_supplied_fields() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();

        let patch = FamilyPatch {
            phone: Some("(21) 99999-0000".to_string()),
            ..FamilyPatch::default()
        };
        ledger.update_family(id, &patch).unwrap();

        let family = ledger.get_family(id).unwrap().unwrap();
        assert_eq!(family.phone, "(21) 99999-0000");
        // Everything else untouched.
        assert_eq!(family.responsible_name, "Maria");
        assert_eq!(family.neighborhood, "Centro");
        assert_eq!(family.member_count, 2);
    }

    #[test]
    fn test_update_family_members_rewrites_count() {
        // Adding a member to a family of two leaves count == len == 3.
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();

        let mut family = ledger.get_family(id).unwrap().unwrap();
        family.add_member(7);

        let patch = FamilyPatch {
            members: Some(family.members.clone()),
            ..FamilyPatch::default()
        };
        ledger.update_family(id, &patch).unwrap();

        let updated = ledger.get_family(id).unwrap().unwrap();
        assert_eq!(updated.member_count, 3);
        assert_eq!(updated.members.len(), 3);
    }

    #[test]
    fn test_update_family_not_found() {
        let mut ledger = test_ledger();
        let patch = FamilyPatch {
            phone: Some("x".to_string()),
            ..FamilyPatch::default()
        };
        let err = ledger.update_family(12_345, &patch).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_family_empty_patch_is_accepted() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        assert!(ledger.update_family(id, &FamilyPatch::default()).is_ok());
    }

    #[test]
    fn test_delete_family() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();

        assert!(ledger.delete_family(id).unwrap());
        assert!(ledger.get_family(id).unwrap().is_none());
        assert!(!ledger.delete_family(id).unwrap());
    }

    #[test]
    fn test_delete_family_keeps_donation_history() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        ledger
            .create_donation(&donation_draft(id, day("2024-01-10")))
            .unwrap();

        ledger.delete_family(id).unwrap();

        let donations = ledger.list_donations().unwrap();
        assert_eq!(donations.len(), 1);
        assert_eq!(donations[0].family_id, id);
        assert_eq!(donations[0].family_name, "Maria");
    }

    #[test]
    fn test_create_donation_snapshots_family_name() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        let donation_id = ledger
            .create_donation(&donation_draft(id, day("2024-01-10")))
            .unwrap();

        // Rename the family afterwards; the snapshot must not move.
        let patch = FamilyPatch {
            responsible_name: Some("Maria de Souza".to_string()),
            ..FamilyPatch::default()
        };
        ledger.update_family(id, &patch).unwrap();

        let donations = ledger.list_donations().unwrap();
        assert_eq!(donations[0].id, donation_id);
        assert_eq!(donations[0].family_name, "Maria");
    }

    #[test]
    fn test_create_donation_for_missing_family() {
        let mut ledger = test_ledger();
        let err = ledger
            .create_donation(&donation_draft(77, day("2024-01-10")))
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(ledger.list_donations().unwrap().len(), 0);
    }

    #[test]
    fn test_first_donation_sets_last_donation() {
        // Scenario: family with no donations receives one dated 2024-01-10.
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();

        ledger
            .create_donation(&donation_draft(id, day("2024-01-10")))
            .unwrap();

        let family = ledger.get_family(id).unwrap().unwrap();
        assert_eq!(family.last_donation, Some(day("2024-01-10")));
    }

    #[test]
    fn test_backdated_donation_keeps_last_donation() {
        // Scenario: a donation dated 2024-01-05 registered after one dated
        // 2024-01-10 must not lower the field.
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        ledger
            .create_donation(&donation_draft(id, day("2024-01-10")))
            .unwrap();

        ledger
            .create_donation(&donation_draft(id, day("2024-01-05")))
            .unwrap();

        let family = ledger.get_family(id).unwrap().unwrap();
        assert_eq!(family.last_donation, Some(day("2024-01-10")));
    }

    #[test]
    fn test_deleting_latest_donation_recomputes() {
        // Scenario: donations on 2024-01-10 and 2024-02-01; deleting the
        // later one must fall back to the earlier date.
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        ledger
            .create_donation(&donation_draft(id, day("2024-01-10")))
            .unwrap();
        let latest = ledger
            .create_donation(&donation_draft(id, day("2024-02-01")))
            .unwrap();

        ledger.delete_donation(latest).unwrap();

        let family = ledger.get_family(id).unwrap().unwrap();
        assert_eq!(family.last_donation, Some(day("2024-01-10")));
    }

    #[test]
    fn test_deleting_only_donation_clears_field() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        let donation = ledger
            .create_donation(&donation_draft(id, day("2024-01-10")))
            .unwrap();

        ledger.delete_donation(donation).unwrap();

        let family = ledger.get_family(id).unwrap().unwrap();
        assert!(family.last_donation.is_none());
    }

    #[test]
    fn test_last_donation_converges_over_mixed_sequence() {
        // Arbitrary create/delete sequence; at the end the field must equal
        // the maximum date among the survivors.
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();

        let d1 = ledger
            .create_donation(&donation_draft(id, day("2024-03-01")))
            .unwrap();
        ledger
            .create_donation(&donation_draft(id, day("2024-01-15")))
            .unwrap();
        let d3 = ledger
            .create_donation(&donation_draft(id, day("2024-04-20")))
            .unwrap();
        ledger.delete_donation(d3).unwrap();
        ledger
            .create_donation(&donation_draft(id, day("2024-02-10")))
            .unwrap();
        ledger.delete_donation(d1).unwrap();

        let family = ledger.get_family(id).unwrap().unwrap();
        assert_eq!(family.last_donation, Some(day("2024-02-10")));
    }

    #[test]
    fn test_delete_donation_not_found() {
        let mut ledger = test_ledger();
        let err = ledger.delete_donation(4242).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_donation_of_deleted_family() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        let donation = ledger
            .create_donation(&donation_draft(id, day("2024-01-10")))
            .unwrap();

        ledger.delete_family(id).unwrap();

        // The orphaned record can still be deleted cleanly.
        ledger.delete_donation(donation).unwrap();
        assert_eq!(ledger.list_donations().unwrap().len(), 0);
    }

    #[test]
    fn test_list_donations_most_recent_date_first() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        ledger
            .create_donation(&donation_draft(id, day("2024-01-10")))
            .unwrap();
        ledger
            .create_donation(&donation_draft(id, day("2024-03-01")))
            .unwrap();
        ledger
            .create_donation(&donation_draft(id, day("2024-02-01")))
            .unwrap();

        let donations = ledger.list_donations().unwrap();
        assert_eq!(donations[0].date, day("2024-03-01"));
        assert_eq!(donations[1].date, day("2024-02-01"));
        assert_eq!(donations[2].date, day("2024-01-10"));
    }

    #[test]
    fn test_donations_by_family_filters_exactly() {
        let mut ledger = test_ledger();
        let one = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        let two = ledger.create_family(&family_draft("José", "Lapa")).unwrap();
        ledger
            .create_donation(&donation_draft(one, day("2024-01-10")))
            .unwrap();
        ledger
            .create_donation(&donation_draft(two, day("2024-01-12")))
            .unwrap();
        ledger
            .create_donation(&donation_draft(one, day("2024-02-01")))
            .unwrap();

        let history = ledger.donations_by_family(one).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|d| d.family_id == one));
        assert_eq!(history[0].date, day("2024-02-01"));
    }

    #[test]
    fn test_search_families() {
        let mut ledger = test_ledger();
        ledger
            .create_family(&family_draft("Maria Souza", "Bela Vista"))
            .unwrap();
        ledger
            .create_family(&family_draft("José Lima", "Centro"))
            .unwrap();

        let by_name = ledger.search_families("maria").unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].responsible_name, "Maria Souza");

        let by_neighborhood = ledger.search_families("CENT").unwrap();
        assert_eq!(by_neighborhood.len(), 1);
        assert_eq!(by_neighborhood[0].neighborhood, "Centro");

        assert!(ledger.search_families("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_families_without_recent_donation() {
        let mut ledger = test_ledger();
        let never = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        let recent = ledger.create_family(&family_draft("José", "Lapa")).unwrap();
        ledger
            .create_donation(&donation_draft(recent, Utc::now()))
            .unwrap();

        let stale = ledger.families_without_recent_donation(30).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, never);
    }

    #[test]
    fn test_stats() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        ledger
            .create_donation(&donation_draft(id, day("2024-01-10")))
            .unwrap();

        let stats = ledger.stats().unwrap();
        assert_eq!(stats.family_count, 1);
        assert_eq!(stats.donation_count, 1);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = std::env::temp_dir();
        let nested_path = temp_dir.join(format!(
            "semear_test_{}/nested/records.db",
            std::process::id()
        ));
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let ledger = Ledger::open(&nested_path).unwrap();
        assert!(nested_path.exists());
        assert_eq!(ledger.path(), nested_path);

        drop(ledger);
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent.parent().unwrap());
        }
    }

    #[tokio::test]
    async fn test_subscription_receives_full_replacements() {
        let mut ledger = test_ledger();
        let mut sub = ledger.subscribe_families();

        // New subscribers see the current snapshot immediately.
        assert_eq!(sub.snapshot().unwrap().len(), 0);

        ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        let snapshot = sub.updated().await.unwrap();
        assert_eq!(snapshot.len(), 1);

        ledger.create_family(&family_draft("José", "Lapa")).unwrap();
        let snapshot = sub.updated().await.unwrap();
        // The whole list, not a diff.
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_donation_mutation_pushes_families_snapshot() {
        let mut ledger = test_ledger();
        let id = ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();

        let mut sub = ledger.subscribe_families();
        ledger
            .create_donation(&donation_draft(id, day("2024-01-10")))
            .unwrap();

        let snapshot = sub.updated().await.unwrap();
        assert_eq!(snapshot[0].last_donation, Some(day("2024-01-10")));
    }

    #[tokio::test]
    async fn test_subscription_cancel_is_idempotent_and_final() {
        let mut ledger = test_ledger();
        let mut sub = ledger.subscribe_families();

        sub.cancel();
        sub.cancel();
        assert!(sub.is_cancelled());

        ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();
        assert!(sub.updated().await.is_none());
        assert!(sub.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_independent_subscribers() {
        let mut ledger = test_ledger();
        let mut one = ledger.subscribe_families();
        let mut two = ledger.subscribe_families();

        one.cancel();
        ledger
            .create_family(&family_draft("Maria", "Centro"))
            .unwrap();

        assert!(one.updated().await.is_none());
        assert_eq!(two.updated().await.unwrap().len(), 1);
    }
}
