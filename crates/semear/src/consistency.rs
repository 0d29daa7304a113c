//! Keeps a family's `last_donation` field consistent with its donation
//! records.
//!
//! The field is derived: it must always equal the maximum `date` among the
//! donation records whose `family_id` points at the family, or be absent
//! when no such records exist. Two paths maintain it:
//!
//! - the **add path** runs when a donation is registered and only ever
//!   raises the field;
//! - the **recompute path** runs when a donation is deleted and rebuilds
//!   the field from scratch, since the deleted record may have held the
//!   maximum.
//!
//! Both paths are invoked by the ledger inside the transaction of the
//! donation mutation that triggered them; nothing else calls them.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::Result;
use crate::ledger::{decode_ts, encode_ts};

/// Add path: record that a donation dated `date` now exists for the family.
///
/// Sets `last_donation = date` if and only if `date` is greater than or
/// equal to the current value, or no value is set. A backdated donation
/// registered after a more recent one must not lower the field, so an
/// unconditional overwrite would be wrong here.
///
/// Returns the field's value after the call. A missing family is a no-op
/// (`None`): the caller checks existence before inserting the donation, so
/// this only happens when racing a concurrent family deletion.
pub(crate) fn raise_last_donation(
    conn: &Connection,
    family_id: i64,
    date: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    let stored: Option<Option<String>> = conn
        .query_row(
            "SELECT last_donation FROM families WHERE id = ?1",
            [family_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(stored) = stored else {
        return Ok(None);
    };

    let current = stored.as_deref().and_then(decode_ts);
    if let Some(current) = current {
        if date < current {
            debug!(
                family_id,
                "keeping last_donation: registered donation is backdated"
            );
            return Ok(Some(current));
        }
    }

    conn.execute(
        "UPDATE families SET last_donation = ?1 WHERE id = ?2",
        params![encode_ts(date), family_id],
    )?;
    debug!(family_id, %date, "raised last_donation");
    Ok(Some(date))
}

/// Recompute path: rebuild `last_donation` from the surviving donations.
///
/// Scans every donation of the family, writes the maximum `date`, or clears
/// the field when none remain. Idempotent: running it twice with no
/// intervening donation change stores the same value both times.
///
/// Returns the recomputed value. A missing family is a no-op: deleting the
/// last donation of an already-deleted family has nothing left to maintain.
pub(crate) fn recompute_last_donation(
    conn: &Connection,
    family_id: i64,
) -> Result<Option<DateTime<Utc>>> {
    let mut stmt = conn.prepare("SELECT date FROM donations WHERE family_id = ?1")?;
    let dates = stmt
        .query_map([family_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let max = dates.iter().filter_map(|s| decode_ts(s)).max();

    match max {
        Some(date) => {
            conn.execute(
                "UPDATE families SET last_donation = ?1 WHERE id = ?2",
                params![encode_ts(date), family_id],
            )?;
        }
        None => {
            conn.execute(
                "UPDATE families SET last_donation = NULL WHERE id = ?1",
                [family_id],
            )?;
        }
    }

    debug!(family_id, "recomputed last_donation over {} donations", dates.len());
    Ok(max)
}
