//! Statutory expiration windows

use crate::config::ExpirationConfig;
use crate::models::{Encumbrance, EncumbranceKind};
use chrono::NaiveDate;
use fcti_common::time::add_years;

/// Date an encumbrance stops being enforceable, if its kind expires
///
/// Mortgages run from maturity when it is known, otherwise from recording.
pub fn expiration_date(config: &ExpirationConfig, encumbrance: &Encumbrance) -> Option<NaiveDate> {
    let from_recording = |years| Some(add_years(encumbrance.recording_date, years));
    match encumbrance.kind {
        EncumbranceKind::MechanicsLien => from_recording(config.mechanics_lien),
        EncumbranceKind::AssociationLien => from_recording(config.association_claim),
        EncumbranceKind::JudgmentLien => from_recording(config.judgment_lien),
        EncumbranceKind::CodeEnforcement => from_recording(config.code_enforcement),
        EncumbranceKind::FederalTax => from_recording(config.federal_tax),
        EncumbranceKind::Mortgage => match encumbrance.maturity_date {
            Some(maturity) => Some(add_years(maturity, config.mortgage_after_maturity)),
            None => from_recording(config.mortgage_without_maturity),
        },
        EncumbranceKind::PropertyTax
        | EncumbranceKind::MunicipalUtility
        | EncumbranceKind::OtherLien => None,
    }
}

pub fn is_expired(config: &ExpirationConfig, encumbrance: &Encumbrance, as_of: NaiveDate) -> bool {
    expiration_date(config, encumbrance).map_or(false, |expires| expires <= as_of)
}
