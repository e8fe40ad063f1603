//! Ownership-period walk over a property's deeds
//!
//! The builder picks one path through the deed set by starting at the most
//! recent deed and stepping backward to the closest earlier deed whose
//! grantee is the same party as the current grantor. When no earlier deed
//! links, the nearest earlier deed is taken anyway and the break is recorded
//! as an `INCOMPLETE` gap. The walk stops at a root-of-title instrument.
//!
//! Self-transfers never become periods; they are folded into the period
//! that contains them. Deeds whose legal description names a different
//! lot, block or unit in the target subdivision are rejected outright.

use crate::identity::{normalize, IdentityLinker};
use crate::legal::{self, ParsedLegal};
use crate::models::{
    ChainGap, DataQualityWarning, Document, DocumentKey, GapStatus, LinkStatus, OwnershipPeriod,
    RejectedDocument, WarningKind,
};
use chrono::NaiveDate;
use tracing::{debug, info};

/// Output of one chain build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainBuild {
    /// Chronological periods, sequence 1..n
    pub periods: Vec<OwnershipPeriod>,
    pub gaps: Vec<ChainGap>,
    pub rejected: Vec<RejectedDocument>,
    pub warnings: Vec<DataQualityWarning>,
}

struct Deed<'a> {
    date: NaiveDate,
    key: DocumentKey,
    document: &'a Document,
}

/// True when the document's legal text names another lot/unit of the target
pub fn is_cross_lot(document: &Document, target: Option<&ParsedLegal>) -> bool {
    match (target, document.legal_text.as_deref()) {
        (Some(target), Some(text)) => target.conflicts_with(&legal::parse(text)),
        _ => false,
    }
}

/// Build ownership periods from a property's documents
///
/// # Arguments
/// * `property_id` - Property the documents belong to
/// * `documents` - Every document discovered for the property
/// * `target` - The property's own parsed legal description, when known
/// * `linker` - Identity registry used to match grantees to grantors
pub fn build_chain(
    property_id: &str,
    documents: &[Document],
    target: Option<&ParsedLegal>,
    linker: &IdentityLinker,
) -> ChainBuild {
    let mut build = ChainBuild::default();
    let mut deeds = Vec::new();

    for document in documents.iter().filter(|d| d.doc_type.is_deed()) {
        let Some(key) = document.key() else {
            build.warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::UnkeyedDocument,
                None,
                format!("{} deed has no instrument or book/page", document.doc_type.as_str()),
            ));
            continue;
        };
        let Some(date) = document.recording_date else {
            build.warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::UnparseableDate,
                Some(key.to_string()),
                "deed has no usable recording date; left out of the chain",
            ));
            continue;
        };
        if is_cross_lot(document, target) {
            let reason = format!(
                "legal description '{}' names a different lot in the same subdivision",
                document.legal_text.as_deref().unwrap_or_default()
            );
            build.warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::CrossLotRejected,
                Some(key.to_string()),
                reason.clone(),
            ));
            build.rejected.push(RejectedDocument { key, reason });
            continue;
        }
        deeds.push(Deed { date, key, document });
    }

    deeds.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.key.cmp(&b.key)));

    let (self_transfers, mut walkable): (Vec<Deed>, Vec<Deed>) =
        deeds.into_iter().partition(|d| d.document.is_self_transfer);
    let mut self_transfers = self_transfers;
    if walkable.is_empty() {
        // Only self-transfers on record; they still evidence ownership
        walkable = std::mem::take(&mut self_transfers);
    }
    if walkable.is_empty() {
        debug!(property_id, "No deeds to build a chain from");
        return build;
    }

    // Latest deed first; status describes how each step links to its predecessor
    let mut path: Vec<(usize, LinkStatus)> = Vec::new();
    let mut current = walkable.len() - 1;
    loop {
        let deed = &walkable[current];
        if deed.document.doc_type.is_root_of_title() || current == 0 {
            path.push((current, LinkStatus::Root));
            break;
        }

        let grantors = deed.document.grantors();
        let linked = (0..current)
            .rev()
            .find(|&i| linker.any_same_party(walkable[i].document.grantees(), grantors));

        match linked {
            Some(prior) => {
                path.push((current, LinkStatus::Linked));
                current = prior;
            }
            None => {
                path.push((current, LinkStatus::Incomplete));
                current -= 1;
            }
        }
    }
    path.reverse();

    for (position, (index, link_status)) in path.iter().enumerate() {
        let deed = &walkable[*index];
        let sequence = position as u32 + 1;
        let disposition_date = path.get(position + 1).map(|(next, _)| walkable[*next].date);
        let owner_names = deed.document.grantees().to_vec();
        let owner_identity = owner_names
            .first()
            .map(|name| {
                linker
                    .identity_for(name)
                    .map(|identity| identity.canonical_name.clone())
                    .unwrap_or_else(|| normalize(name))
            })
            .unwrap_or_default();

        if *link_status == LinkStatus::Incomplete && position > 0 {
            let prior = &walkable[path[position - 1].0];
            let reason = format!(
                "no earlier grantee matches grantor(s) {}",
                deed.document.grantors().join("; ")
            );
            build.warnings.push(DataQualityWarning::new(
                property_id,
                WarningKind::ChainGap,
                Some(deed.key.to_string()),
                format!("{} between {} and {}", reason, prior.date, deed.date),
            ));
            build.gaps.push(ChainGap {
                property_id: property_id.to_string(),
                before_sequence: sequence,
                from_date: prior.date,
                to_date: deed.date,
                status: GapStatus::Incomplete,
                reason,
            });
        }

        build.periods.push(OwnershipPeriod {
            property_id: property_id.to_string(),
            sequence,
            acquisition_date: deed.date,
            disposition_date,
            owner_names,
            owner_identity,
            grantor_names: deed.document.grantors().to_vec(),
            acquisition_doc_type: deed.document.doc_type,
            acquisition_instrument: Some(deed.key.clone()),
            is_root_of_title: deed.document.doc_type.is_root_of_title(),
            link_status: if position == 0 {
                LinkStatus::Root
            } else {
                *link_status
            },
            self_transfers: Vec::new(),
        });
    }

    for transfer in self_transfers {
        if let Some(period) = build.periods.iter_mut().find(|p| p.contains(transfer.date)) {
            period.self_transfers.push(transfer.key);
        }
    }

    info!(
        property_id,
        periods = build.periods.len(),
        gaps = build.gaps.len(),
        rejected = build.rejected.len(),
        "Chain built"
    );
    build
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocType;

    fn deed(instrument: &str, date: &str, grantor: &str, grantee: &str) -> Document {
        Document {
            property_id: "p1".into(),
            instrument: Some(instrument.into()),
            book: None,
            page: None,
            recording_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            doc_type: DocType::WarrantyDeed,
            doc_type_code: "WD".into(),
            party_one: vec![grantor.into()],
            party_two: vec![grantee.into()],
            legal_text: Some("LOT 5 BLOCK 3 PALM ESTATES".into()),
            amount: None,
            case_number: None,
            maturity_date: None,
            referenced_instruments: vec![],
            is_self_transfer: false,
            raw_text: None,
            discovered_by: None,
        }
    }

    fn assert_non_overlapping(periods: &[OwnershipPeriod]) {
        let open = periods.iter().filter(|p| p.disposition_date.is_none()).count();
        assert_eq!(open, if periods.is_empty() { 0 } else { 1 });
        for pair in periods.windows(2) {
            assert_eq!(pair[0].disposition_date, Some(pair[1].acquisition_date));
            assert!(pair[0].acquisition_date <= pair[1].acquisition_date);
            assert_eq!(pair[0].sequence + 1, pair[1].sequence);
        }
    }

    #[test]
    fn test_linked_chain() {
        let docs = vec![
            deed("3", "2020-06-01", "DOE JANE", "GARCIA MARIA"),
            deed("1", "2001-03-15", "PALM DEVELOPERS LLC", "ROE RICHARD"),
            deed("2", "2010-05-01", "ROE RICHARD", "DOE JANE"),
        ];
        let build = build_chain("p1", &docs, None, &IdentityLinker::new());

        assert_eq!(build.periods.len(), 3);
        assert!(build.gaps.is_empty());
        assert_non_overlapping(&build.periods);
        assert_eq!(build.periods[0].link_status, LinkStatus::Root);
        assert_eq!(build.periods[2].link_status, LinkStatus::Linked);
        assert_eq!(build.periods[2].owner_identity, "GARCIA MARIA");
        assert!(build.periods[2].is_current());
    }

    #[test]
    fn test_gap_recorded_not_fatal() {
        let docs = vec![
            deed("1", "2001-03-15", "PALM DEVELOPERS LLC", "ROE RICHARD"),
            deed("2", "2010-05-01", "NGUYEN TAM", "DOE JANE"),
        ];
        let build = build_chain("p1", &docs, None, &IdentityLinker::new());

        assert_eq!(build.periods.len(), 2);
        assert_eq!(build.periods[1].link_status, LinkStatus::Incomplete);
        assert_eq!(build.gaps.len(), 1);
        assert_eq!(build.gaps[0].before_sequence, 2);
        assert_eq!(build.gaps[0].from_date, build.periods[0].acquisition_date);
        assert!(build.warnings.iter().any(|w| w.kind == WarningKind::ChainGap));
    }

    #[test]
    fn test_prefers_linked_over_nearest() {
        let docs = vec![
            deed("1", "2001-03-15", "PALM DEVELOPERS LLC", "ROE RICHARD"),
            // Unrelated deed recorded between the two real transfers
            deed("2", "2005-01-10", "SMITH ALAN", "BAKER TOM"),
            deed("3", "2010-05-01", "ROE RICHARD", "DOE JANE"),
        ];
        let build = build_chain("p1", &docs, None, &IdentityLinker::new());

        let instruments: Vec<_> = build
            .periods
            .iter()
            .filter_map(|p| p.acquisition_instrument.clone())
            .collect();
        assert_eq!(
            instruments,
            vec![DocumentKey::instrument("1"), DocumentKey::instrument("3")]
        );
    }

    #[test]
    fn test_cross_lot_deed_rejected() {
        let mut other_lot = deed("2", "2010-05-01", "ROE RICHARD", "DOE JANE");
        other_lot.legal_text = Some("LOT 6 BLOCK 3 PALM ESTATES".into());
        let docs = vec![
            deed("1", "2001-03-15", "PALM DEVELOPERS LLC", "ROE RICHARD"),
            other_lot,
        ];
        let target = legal::parse("LOT 5 BLOCK 3 PALM ESTATES");
        let build = build_chain("p1", &docs, Some(&target), &IdentityLinker::new());

        assert_eq!(build.periods.len(), 1);
        assert_eq!(build.rejected.len(), 1);
        assert_eq!(build.rejected[0].key, DocumentKey::instrument("2"));
    }

    #[test]
    fn test_self_transfer_folded_into_period() {
        let mut to_trust = deed(
            "3",
            "2015-02-01",
            "DOE JANE",
            "DOE JANE TRUSTEE OF THE DOE FAMILY TRUST",
        );
        to_trust.is_self_transfer = true;
        let docs = vec![
            deed("1", "2001-03-15", "PALM DEVELOPERS LLC", "ROE RICHARD"),
            deed("2", "2010-05-01", "ROE RICHARD", "DOE JANE"),
            to_trust,
            deed("4", "2020-06-01", "DOE JANE TRUSTEE", "GARCIA MARIA"),
        ];
        let build = build_chain("p1", &docs, None, &IdentityLinker::new());

        assert_eq!(build.periods.len(), 3);
        assert_non_overlapping(&build.periods);
        assert_eq!(build.periods[1].self_transfers, vec![DocumentKey::instrument("3")]);
    }

    #[test]
    fn test_undated_deed_warned() {
        let mut undated = deed("2", "", "ROE RICHARD", "DOE JANE");
        undated.recording_date = None;
        let docs = vec![deed("1", "2001-03-15", "PALM DEVELOPERS LLC", "ROE RICHARD"), undated];
        let build = build_chain("p1", &docs, None, &IdentityLinker::new());

        assert_eq!(build.periods.len(), 1);
        assert!(build.warnings.iter().any(|w| w.kind == WarningKind::UnparseableDate));
    }
}
