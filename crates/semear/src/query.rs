//! Search and recency-classification semantics for the console views.
//!
//! Everything here is pure: the functions take record slices and a
//! reference instant, so the views and the reports stay deterministic and
//! testable.

use chrono::{DateTime, Datelike, Utc};

use crate::model::{Donation, Family};

/// A donation within this many days counts as recent.
pub const DEFAULT_RECENT_DAYS: i64 = 30;

/// A donation within this many days (but not recent) counts as moderate.
pub const DEFAULT_MODERATE_DAYS: i64 = 60;

/// How current a family's last donation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DonationStatus {
    /// Last donation within the recent window.
    Recent,
    /// Last donation past the recent window but within the moderate one.
    Moderate,
    /// Last donation older than the moderate window.
    Overdue,
    /// The family never received a donation.
    Never,
}

impl DonationStatus {
    /// Classify a `last_donation` value against the given windows.
    #[must_use]
    pub fn classify(
        last_donation: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        recent_days: i64,
        moderate_days: i64,
    ) -> Self {
        match last_donation {
            None => Self::Never,
            Some(last) => {
                let days = now.signed_duration_since(last).num_days();
                if days <= recent_days {
                    Self::Recent
                } else if days <= moderate_days {
                    Self::Moderate
                } else {
                    Self::Overdue
                }
            }
        }
    }

    /// Label for listings.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Moderate => "moderate",
            Self::Overdue => "overdue",
            Self::Never => "never",
        }
    }
}

impl std::fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Classify a family with the default 30/60-day windows.
#[must_use]
pub fn donation_status(family: &Family, now: DateTime<Utc>) -> DonationStatus {
    DonationStatus::classify(
        family.last_donation,
        now,
        DEFAULT_RECENT_DAYS,
        DEFAULT_MODERATE_DAYS,
    )
}

/// Whether a family matches a free-text search term.
///
/// Case-insensitive substring match against the responsible name OR the
/// neighborhood, not prefix-only.
#[must_use]
pub fn matches_search(family: &Family, term: &str) -> bool {
    let term = term.to_lowercase();
    family.responsible_name.to_lowercase().contains(&term)
        || family.neighborhood.to_lowercase().contains(&term)
}

/// Filter families by a free-text search term.
#[must_use]
pub fn search<'a>(families: &'a [Family], term: &str) -> Vec<&'a Family> {
    families
        .iter()
        .filter(|family| matches_search(family, term))
        .collect()
}

/// Days since the family's last donation, or `None` if it never received one.
#[must_use]
pub fn days_since_last_donation(family: &Family, now: DateTime<Utc>) -> Option<i64> {
    family
        .last_donation
        .map(|last| now.signed_duration_since(last).num_days())
}

/// Whether a family has had no donation within the last `days` days,
/// including families that never received one.
#[must_use]
pub fn without_recent_donation(family: &Family, now: DateTime<Utc>, days: i64) -> bool {
    days_since_last_donation(family, now).map_or(true, |since| since > days)
}

/// Whether a donation falls in the same calendar month as the reference
/// instant.
#[must_use]
pub fn in_month(donation: &Donation, reference: DateTime<Utc>) -> bool {
    donation.date.year() == reference.year() && donation.date.month() == reference.month()
}

/// Unique neighborhoods across the given families, sorted.
#[must_use]
pub fn neighborhoods(families: &[Family]) -> Vec<String> {
    let mut names: Vec<String> = families.iter().map(|f| f.neighborhood.clone()).collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FamilyDraft;
    use chrono::Duration;

    fn family(name: &str, neighborhood: &str, last_donation: Option<DateTime<Utc>>) -> Family {
        let draft = FamilyDraft {
            responsible_name: name.to_string(),
            neighborhood: neighborhood.to_string(),
            ..FamilyDraft::default()
        };
        Family {
            id: 1,
            responsible_name: draft.responsible_name,
            member_count: 0,
            members: Vec::new(),
            phone: draft.phone,
            email: None,
            cep: draft.cep,
            address: draft.address,
            neighborhood: draft.neighborhood,
            city: draft.city,
            state: draft.state,
            complemento: None,
            number: None,
            observations: None,
            created_at: Utc::now(),
            last_donation,
        }
    }

    fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        now - Duration::days(days)
    }

    #[test]
    fn test_classify_recent() {
        let now = Utc::now();
        assert_eq!(
            DonationStatus::classify(Some(days_ago(now, 10)), now, 30, 60),
            DonationStatus::Recent
        );
        // The boundary is inclusive.
        assert_eq!(
            DonationStatus::classify(Some(days_ago(now, 30)), now, 30, 60),
            DonationStatus::Recent
        );
    }

    #[test]
    fn test_classify_moderate() {
        let now = Utc::now();
        assert_eq!(
            DonationStatus::classify(Some(days_ago(now, 31)), now, 30, 60),
            DonationStatus::Moderate
        );
        assert_eq!(
            DonationStatus::classify(Some(days_ago(now, 60)), now, 30, 60),
            DonationStatus::Moderate
        );
    }

    #[test]
    fn test_classify_overdue() {
        let now = Utc::now();
        assert_eq!(
            DonationStatus::classify(Some(days_ago(now, 61)), now, 30, 60),
            DonationStatus::Overdue
        );
    }

    #[test]
    fn test_classify_never() {
        assert_eq!(
            DonationStatus::classify(None, Utc::now(), 30, 60),
            DonationStatus::Never
        );
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(DonationStatus::Recent.to_string(), "recent");
        assert_eq!(DonationStatus::Never.label(), "never");
    }

    #[test]
    fn test_matches_search_name_substring() {
        let f = family("Maria Souza", "Bela Vista", None);
        assert!(matches_search(&f, "maria"));
        assert!(matches_search(&f, "SOUZA"));
        // Substring, not prefix-only.
        assert!(matches_search(&f, "ouz"));
    }

    #[test]
    fn test_matches_search_neighborhood() {
        let f = family("Maria Souza", "Bela Vista", None);
        assert!(matches_search(&f, "vista"));
        assert!(!matches_search(&f, "centro"));
    }

    #[test]
    fn test_search_filters() {
        let families = vec![
            family("Maria", "Centro", None),
            family("José", "Lapa", None),
        ];
        let hits = search(&families, "lapa");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].responsible_name, "José");
    }

    #[test]
    fn test_days_since_last_donation() {
        let now = Utc::now();
        let f = family("Maria", "Centro", Some(days_ago(now, 12)));
        assert_eq!(days_since_last_donation(&f, now), Some(12));
        assert_eq!(
            days_since_last_donation(&family("José", "Lapa", None), now),
            None
        );
    }

    #[test]
    fn test_without_recent_donation() {
        let now = Utc::now();
        assert!(without_recent_donation(
            &family("Maria", "Centro", None),
            now,
            30
        ));
        assert!(without_recent_donation(
            &family("Maria", "Centro", Some(days_ago(now, 45))),
            now,
            30
        ));
        assert!(!without_recent_donation(
            &family("Maria", "Centro", Some(days_ago(now, 10))),
            now,
            30
        ));
    }

    #[test]
    fn test_neighborhoods_unique_sorted() {
        let families = vec![
            family("A", "Lapa", None),
            family("B", "Centro", None),
            family("C", "Lapa", None),
        ];
        assert_eq!(neighborhoods(&families), vec!["Centro", "Lapa"]);
    }
}
