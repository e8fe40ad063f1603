//! Ownership periods and chain gaps

use super::{DocType, DocumentKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a period's acquisition deed is supported by the prior owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    /// Grantor of this deed resolves to the prior period's owner
    Linked,
    /// No identity link to the prior owner; a gap was recorded
    Incomplete,
    /// Earliest period in the chain (nothing before it to link to)
    Root,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Linked => "LINKED",
            LinkStatus::Incomplete => "INCOMPLETE",
            LinkStatus::Root => "ROOT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LINKED" => Some(LinkStatus::Linked),
            "INCOMPLETE" => Some(LinkStatus::Incomplete),
            "ROOT" => Some(LinkStatus::Root),
            _ => None,
        }
    }
}

/// One owner's tenure: `[acquisition_date, disposition_date)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipPeriod {
    pub property_id: String,
    /// 1-based, strictly chronological
    pub sequence: u32,
    pub acquisition_date: NaiveDate,
    /// `None` only for the current owner
    pub disposition_date: Option<NaiveDate>,
    /// Grantee names of the acquisition deed
    pub owner_names: Vec<String>,
    /// Canonical key of the owning identity
    pub owner_identity: String,
    pub grantor_names: Vec<String>,
    pub acquisition_doc_type: DocType,
    pub acquisition_instrument: Option<DocumentKey>,
    pub is_root_of_title: bool,
    pub link_status: LinkStatus,
    /// Self-transfer deeds folded into this tenure
    pub self_transfers: Vec<DocumentKey>,
}

impl OwnershipPeriod {
    /// `[acquisition, disposition)` containment
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.acquisition_date && self.disposition_date.map_or(true, |end| date < end)
    }

    pub fn is_current(&self) -> bool {
        self.disposition_date.is_none()
    }
}

/// A period with the identity it is persisted under
///
/// Ids are minted by the rebuild immediately before the chain write, and
/// the store writes periods and the encumbrances associated against them
/// in one transaction. Loading reads them back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedPeriod {
    id: Uuid,
    period: OwnershipPeriod,
}

impl PersistedPeriod {
    pub(crate) fn new(id: Uuid, period: OwnershipPeriod) -> Self {
        Self { id, period }
    }

    pub(crate) fn mint(period: OwnershipPeriod) -> Self {
        Self::new(Uuid::new_v4(), period)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn period(&self) -> &OwnershipPeriod {
        &self.period
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapStatus {
    Incomplete,
}

/// Unsupported transition between two consecutive periods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainGap {
    pub property_id: String,
    /// Sequence of the period that opens after the gap
    pub before_sequence: u32,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub status: GapStatus,
    pub reason: String,
}

/// Document kept out of the chain walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedDocument {
    pub key: DocumentKey,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(from: (i32, u32, u32), to: Option<(i32, u32, u32)>) -> OwnershipPeriod {
        let date = |(y, m, d): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        OwnershipPeriod {
            property_id: "p1".to_string(),
            sequence: 1,
            acquisition_date: date(from),
            disposition_date: to.map(date),
            owner_names: vec!["DOE JANE".to_string()],
            owner_identity: "DOE JANE".to_string(),
            grantor_names: vec![],
            acquisition_doc_type: DocType::WarrantyDeed,
            acquisition_instrument: None,
            is_root_of_title: false,
            link_status: LinkStatus::Root,
            self_transfers: vec![],
        }
    }

    #[test]
    fn test_contains_is_half_open() {
        let p = period((2010, 1, 1), Some((2015, 6, 1)));
        assert!(p.contains(NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()));
        assert!(p.contains(NaiveDate::from_ymd_opt(2015, 5, 31).unwrap()));
        assert!(!p.contains(NaiveDate::from_ymd_opt(2015, 6, 1).unwrap()));
        assert!(!p.contains(NaiveDate::from_ymd_opt(2009, 12, 31).unwrap()));
    }

    #[test]
    fn test_current_period_is_open_ended() {
        let p = period((2015, 6, 1), None);
        assert!(p.is_current());
        assert!(p.contains(NaiveDate::from_ymd_opt(2040, 1, 1).unwrap()));
    }
}
