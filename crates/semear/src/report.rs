//! Aggregate statistics for the reports view.
//!
//! [`Report::build`] condenses the two collections into the numbers the
//! reports panel shows: totals, the current month's activity, recency
//! buckets, the donation-type breakdown, and the families that have gone
//! longest without a delivery.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Donation, DonationType, Family};
use crate::query;

/// How many entries the top-N report sections retain.
const TOP_ENTRIES: usize = 5;

/// Count and share of one donation category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeStat {
    /// The category.
    pub donation_type: DonationType,
    /// Donations in this category.
    pub count: usize,
    /// Share of all donations, rounded to whole percent.
    pub percentage: u32,
}

/// A family flagged as needing attention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttentionEntry {
    /// The family's id.
    pub family_id: i64,
    /// The family's responsible name.
    pub responsible_name: String,
    /// Date of the last donation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_donation: Option<DateTime<Utc>>,
    /// Days since the last donation, absent if there never was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since: Option<i64>,
}

/// One line of the recent-donations section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonationEntry {
    /// The donation's id.
    pub donation_id: i64,
    /// The receiving family's name snapshot.
    pub family_name: String,
    /// The category.
    pub donation_type: DonationType,
    /// The effective date.
    pub date: DateTime<Utc>,
    /// Who delivered it.
    pub responsible: String,
}

/// The aggregate view over both collections at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Families registered.
    pub total_families: usize,
    /// Donations registered, all time.
    pub total_donations: usize,
    /// Donations whose date falls in the current calendar month.
    pub donations_this_month: usize,
    /// Families with a donation within the attention window.
    pub families_recent: usize,
    /// Families without a donation within the attention window, including
    /// those that never received one.
    pub families_needing_attention: usize,
    /// Share of families served recently, rounded to whole percent.
    pub service_rate: u32,
    /// Top categories by donation count.
    pub top_types: Vec<TypeStat>,
    /// The most recent donations.
    pub recent_donations: Vec<DonationEntry>,
    /// The families waiting longest, never-served first.
    pub attention: Vec<AttentionEntry>,
}

impl Report {
    /// Build the report from full snapshots of both collections.
    ///
    /// `attention_days` is the window separating "recent" from "needs
    /// attention"; the reports view uses 30 days.
    #[must_use]
    pub fn build(
        families: &[Family],
        donations: &[Donation],
        now: DateTime<Utc>,
        attention_days: i64,
    ) -> Self {
        let total_families = families.len();
        let total_donations = donations.len();

        let donations_this_month = donations
            .iter()
            .filter(|d| query::in_month(d, now))
            .count();

        let families_needing_attention = families
            .iter()
            .filter(|f| query::without_recent_donation(f, now, attention_days))
            .count();
        let families_recent = total_families - families_needing_attention;

        let service_rate = percentage(families_recent, total_families);

        Self {
            total_families,
            total_donations,
            donations_this_month,
            families_recent,
            families_needing_attention,
            service_rate,
            top_types: top_types(donations),
            recent_donations: recent_donations(donations),
            attention: attention_entries(families, now, attention_days),
        }
    }
}

/// Round `part / whole` to whole percent; 0 when `whole` is 0.
fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

/// Per-category counts, count-descending (tag ascending on ties), top 5.
fn top_types(donations: &[Donation]) -> Vec<TypeStat> {
    let mut counts: HashMap<DonationType, usize> = HashMap::new();
    for donation in donations {
        *counts.entry(donation.donation_type).or_insert(0) += 1;
    }

    let mut stats: Vec<TypeStat> = counts
        .into_iter()
        .map(|(donation_type, count)| TypeStat {
            donation_type,
            count,
            percentage: percentage(count, donations.len()),
        })
        .collect();

    stats.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.donation_type.to_string().cmp(&b.donation_type.to_string()))
    });
    stats.truncate(TOP_ENTRIES);
    stats
}

/// The 5 most recent donations by effective date.
fn recent_donations(donations: &[Donation]) -> Vec<DonationEntry> {
    let mut by_date: Vec<&Donation> = donations.iter().collect();
    by_date.sort_by(|a, b| b.date.cmp(&a.date));

    by_date
        .into_iter()
        .take(TOP_ENTRIES)
        .map(|d| DonationEntry {
            donation_id: d.id,
            family_name: d.family_name.clone(),
            donation_type: d.donation_type,
            date: d.date,
            responsible: d.responsible.clone(),
        })
        .collect()
}

/// The 5 families waiting longest: never-served first, then oldest last
/// donation.
fn attention_entries(
    families: &[Family],
    now: DateTime<Utc>,
    attention_days: i64,
) -> Vec<AttentionEntry> {
    let mut waiting: Vec<&Family> = families
        .iter()
        .filter(|f| query::without_recent_donation(f, now, attention_days))
        .collect();
    waiting.sort_by_key(|f| f.last_donation);

    waiting
        .into_iter()
        .take(TOP_ENTRIES)
        .map(|f| AttentionEntry {
            family_id: f.id,
            responsible_name: f.responsible_name.clone(),
            last_donation: f.last_donation,
            days_since: query::days_since_last_donation(f, now),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn family(id: i64, name: &str, last_donation: Option<DateTime<Utc>>) -> Family {
        Family {
            id,
            responsible_name: name.to_string(),
            member_count: 0,
            members: Vec::new(),
            phone: String::new(),
            email: None,
            cep: String::new(),
            address: String::new(),
            neighborhood: String::new(),
            city: String::new(),
            state: String::new(),
            complemento: None,
            number: None,
            observations: None,
            created_at: Utc::now(),
            last_donation,
        }
    }

    fn donation(id: i64, kind: DonationType, date: DateTime<Utc>) -> Donation {
        Donation {
            id,
            family_id: 1,
            family_name: "Maria".to_string(),
            donation_type: kind,
            quantity: "1".to_string(),
            date,
            responsible: "João".to_string(),
            observations: None,
            created_at: Utc::now(),
        }
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - Duration::days(days)
    }

    #[test]
    fn test_empty_report() {
        let report = Report::build(&[], &[], Utc::now(), 30);

        assert_eq!(report.total_families, 0);
        assert_eq!(report.total_donations, 0);
        assert_eq!(report.service_rate, 0);
        assert!(report.top_types.is_empty());
        assert!(report.recent_donations.is_empty());
        assert!(report.attention.is_empty());
    }

    #[test]
    fn test_recency_buckets_and_service_rate() {
        let families = vec![
            family(1, "Recent", Some(days_ago(5))),
            family(2, "Stale", Some(days_ago(45))),
            family(3, "Never", None),
        ];
        let report = Report::build(&families, &[], Utc::now(), 30);

        assert_eq!(report.families_recent, 1);
        assert_eq!(report.families_needing_attention, 2);
        // round(1/3 * 100) == 33
        assert_eq!(report.service_rate, 33);
    }

    #[test]
    fn test_donations_this_month() {
        let now = Utc::now();
        let donations = vec![
            donation(1, DonationType::Clothing, now),
            donation(2, DonationType::Clothing, now - Duration::days(70)),
        ];
        let report = Report::build(&[], &donations, now, 30);

        assert_eq!(report.donations_this_month, 1);
    }

    #[test]
    fn test_top_types_count_and_percentage() {
        let now = Utc::now();
        let donations = vec![
            donation(1, DonationType::Clothing, now),
            donation(2, DonationType::Clothing, now),
            donation(3, DonationType::Medicine, now),
        ];
        let report = Report::build(&[], &donations, now, 30);

        assert_eq!(report.top_types.len(), 2);
        assert_eq!(report.top_types[0].donation_type, DonationType::Clothing);
        assert_eq!(report.top_types[0].count, 2);
        // round(2/3 * 100) == 67
        assert_eq!(report.top_types[0].percentage, 67);
        assert_eq!(report.top_types[1].percentage, 33);
    }

    #[test]
    fn test_top_types_keeps_five() {
        let now = Utc::now();
        let kinds = [
            DonationType::Clothing,
            DonationType::Medicine,
            DonationType::Toys,
            DonationType::Hygiene,
            DonationType::Furniture,
            DonationType::Shoes,
        ];
        let donations: Vec<Donation> = kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| donation(i as i64, kind, now))
            .collect();

        let report = Report::build(&[], &donations, now, 30);
        assert_eq!(report.top_types.len(), 5);
    }

    #[test]
    fn test_top_types_tie_break_is_deterministic() {
        let now = Utc::now();
        let donations = vec![
            donation(1, DonationType::Toys, now),
            donation(2, DonationType::Clothing, now),
        ];
        let report = Report::build(&[], &donations, now, 30);

        // Equal counts sort by tag: "clothing" before "toys".
        assert_eq!(report.top_types[0].donation_type, DonationType::Clothing);
        assert_eq!(report.top_types[1].donation_type, DonationType::Toys);
    }

    #[test]
    fn test_recent_donations_ordered_and_capped() {
        let now = Utc::now();
        let donations: Vec<Donation> = (0..7)
            .map(|i| donation(i, DonationType::Clothing, now - Duration::days(i)))
            .collect();
        let report = Report::build(&[], &donations, now, 30);

        assert_eq!(report.recent_donations.len(), 5);
        assert_eq!(report.recent_donations[0].donation_id, 0);
        assert_eq!(report.recent_donations[4].donation_id, 4);
    }

    #[test]
    fn test_attention_never_served_first_then_oldest() {
        let families = vec![
            family(1, "Stale", Some(days_ago(45))),
            family(2, "Never", None),
            family(3, "Older", Some(days_ago(90))),
        ];
        let report = Report::build(&families, &[], Utc::now(), 30);

        let order: Vec<i64> = report.attention.iter().map(|e| e.family_id).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert_eq!(report.attention[0].days_since, None);
        assert_eq!(report.attention[1].days_since, Some(90));
    }

    #[test]
    fn test_attention_capped_at_five() {
        let families: Vec<Family> = (0..8).map(|i| family(i, "F", None)).collect();
        let report = Report::build(&families, &[], Utc::now(), 30);
        assert_eq!(report.attention.len(), 5);
    }

    #[test]
    fn test_report_serializes() {
        let report = Report::build(&[], &[], Utc::now(), 30);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("total_families"));
        assert!(json.contains("service_rate"));
    }
}
