//! Identity linking across name variants
//!
//! Decides whether two recorded party names refer to the same underlying
//! owner and groups linked names into `Identity` records. Decision rules
//! apply in order: exact canonical key, trust transfer, spelling variation,
//! name change. Institutional names are never linked.

use super::normalizer::{
    entity_type, has_trust_language, is_institutional, name_tokens, normalize,
    split_person_name, strip_trust_language,
};
use crate::models::{EntityType, Identity, IdentityMember, LinkDecision, LinkType};
use strsim::jaro_winkler;
use tracing::{debug, warn};
use uuid::Uuid;

/// Minimum similarity for trust base names and spelling variations
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.85;

pub const TRUST_TRANSFER_CONFIDENCE: f64 = 0.9;

/// Starting confidence for surname changes; heuristic, subject to tuning
pub const NAME_CHANGE_CONFIDENCE: f64 = 0.5;

/// Tokens ignored when comparing institutional names (creditor vs plaintiff)
const INSTITUTION_NOISE: &[&str] = &[
    "THE", "NA", "N", "A", "NATIONAL", "ASSOCIATION", "INC", "LLC", "CORP", "CORPORATION",
    "COMPANY", "CO", "FSB", "AS", "TRUSTEE", "FOR", "SUCCESSOR", "SUCCESSORS", "BY", "MERGER",
    "TO", "ITS", "AND", "ASSIGNS", "OF", "IN", "INTEREST", "FKA", "DBA", "LTD", "LP",
];

fn dedup_tokens(tokens: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    for t in tokens {
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

fn best_match(token: &str, others: &[String]) -> f64 {
    others
        .iter()
        .map(|o| jaro_winkler(token, o))
        .fold(0.0, f64::max)
}

/// Symmetric token-overlap similarity between two token sets
///
/// Every token on both sides is scored against its best counterpart with
/// Jaro-Winkler; the result is the mean over all tokens.
fn token_set_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let total: f64 = a.iter().map(|t| best_match(t, b)).sum::<f64>()
        + b.iter().map(|t| best_match(t, a)).sum::<f64>();
    total / (a.len() + b.len()) as f64
}

/// Token-overlap similarity of two raw party names, in `[0.0, 1.0]`
pub fn token_similarity(a: &str, b: &str) -> f64 {
    token_set_similarity(
        &dedup_tokens(name_tokens(a)),
        &dedup_tokens(name_tokens(b)),
    )
}

/// Decide whether two party names refer to the same owner
///
/// # Arguments
/// * `a`, `b` - Raw party names as recorded
///
/// # Returns
/// `LinkDecision` with `link_type = None` when no rule applies or either
/// name is institutional.
pub fn link_candidate(a: &str, b: &str) -> LinkDecision {
    if is_institutional(a) || is_institutional(b) {
        return LinkDecision::none();
    }
    let key_a = normalize(a);
    let key_b = normalize(b);
    if key_a.is_empty() || key_b.is_empty() {
        return LinkDecision::none();
    }

    if key_a == key_b {
        return LinkDecision::linked(LinkType::Exact, 1.0);
    }

    let trust_a = has_trust_language(a);
    let trust_b = has_trust_language(b);
    if trust_a || trust_b {
        let base_a = if trust_a { strip_trust_language(a) } else { a.to_string() };
        let base_b = if trust_b { strip_trust_language(b) } else { b.to_string() };
        if token_similarity(&base_a, &base_b) >= FUZZY_MATCH_THRESHOLD {
            return LinkDecision::linked(LinkType::TrustTransfer, TRUST_TRANSFER_CONFIDENCE);
        }
    }

    let similarity = token_similarity(a, b);
    if similarity >= FUZZY_MATCH_THRESHOLD {
        return LinkDecision::linked(LinkType::SpellingVariation, similarity);
    }

    if entity_type(a) == EntityType::Individual && entity_type(b) == EntityType::Individual {
        if let (Some((given_a, surname_a)), Some((given_b, surname_b))) =
            (split_person_name(a), split_person_name(b))
        {
            if given_a == given_b && surname_a != surname_b {
                return LinkDecision::linked(LinkType::NameChange, NAME_CHANGE_CONFIDENCE);
            }
        }
    }

    LinkDecision::none()
}

/// Best link between any name on one side and any name on the other
pub fn best_link(side_a: &[String], side_b: &[String]) -> LinkDecision {
    let mut best = LinkDecision::none();
    for a in side_a {
        for b in side_b {
            let decision = link_candidate(a, b);
            if decision.is_linked() && decision.confidence > best.confidence {
                best = decision;
            }
        }
    }
    best
}

/// Similarity of two creditor/plaintiff names, institution-aware
///
/// Unlike `link_candidate`, institutional names are compared (lenders are
/// exactly what a plaintiff usually is). Servicer boilerplate is dropped and
/// full containment of the shorter name's tokens counts as a match.
pub fn party_similarity(a: &str, b: &str) -> f64 {
    let core = |name: &str| -> Vec<String> {
        dedup_tokens(
            name_tokens(name)
                .into_iter()
                .filter(|t| !INSTITUTION_NOISE.contains(&t.as_str()))
                .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
                .collect(),
        )
    };
    let tokens_a = core(a);
    let tokens_b = core(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    if tokens_a == tokens_b {
        return 1.0;
    }

    let (shorter, longer) = if tokens_a.len() <= tokens_b.len() {
        (&tokens_a, &tokens_b)
    } else {
        (&tokens_b, &tokens_a)
    };
    if shorter.len() >= 2 && shorter.iter().all(|t| longer.contains(t)) {
        return 0.95;
    }
    // Lender names lead, so also compare against the longer name's head
    let head: Vec<String> = longer.iter().take(shorter.len()).cloned().collect();
    token_set_similarity(shorter, &head).max(token_set_similarity(shorter, longer))
}

/// True when two party names plausibly refer to the same creditor
pub fn parties_match(a: &str, b: &str) -> bool {
    party_similarity(a, b) >= FUZZY_MATCH_THRESHOLD
}

/// Result of feeding one observed name pair into the linker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkOutcome {
    /// Names did not link
    NotLinked,
    /// A new identity was created for the pair
    Created(Uuid),
    /// An existing identity gained a member
    Extended(Uuid),
    /// Both names already belonged to this identity
    AlreadyLinked(Uuid),
    /// Names linked but belong to two distinct identities; not merged
    Conflict { left: Uuid, right: Uuid },
}

/// Per-property identity registry
///
/// Identities grow by adding members and are never merged automatically.
#[derive(Debug, Default, Clone)]
pub struct IdentityLinker {
    identities: Vec<Identity>,
    dirty: Vec<Uuid>,
}

impl IdentityLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from previously persisted identities
    pub fn from_identities(identities: Vec<Identity>) -> Self {
        Self {
            identities,
            dirty: Vec::new(),
        }
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Identity containing this name's canonical key, if any
    pub fn identity_for(&self, name: &str) -> Option<&Identity> {
        let key = normalize(name);
        self.identities.iter().find(|i| i.contains_key(&key))
    }

    /// Observe a name pair, creating or extending an identity when they link
    ///
    /// # Returns
    /// The decision and what happened to the identity set.
    pub fn observe(&mut self, a: &str, b: &str) -> (LinkDecision, LinkOutcome) {
        let decision = link_candidate(a, b);
        let Some(link_type) = decision.link_type else {
            return (decision, LinkOutcome::NotLinked);
        };

        let key_a = normalize(a);
        let key_b = normalize(b);
        let pos_a = self.identities.iter().position(|i| i.contains_key(&key_a));
        let pos_b = self.identities.iter().position(|i| i.contains_key(&key_b));

        let outcome = match (pos_a, pos_b) {
            (Some(ia), Some(ib)) if ia == ib => LinkOutcome::AlreadyLinked(self.identities[ia].id),
            (Some(ia), Some(ib)) => {
                let left = self.identities[ia].id;
                let right = self.identities[ib].id;
                warn!(
                    name_a = %a,
                    name_b = %b,
                    %left,
                    %right,
                    "Names link across two distinct identities; leaving unmerged"
                );
                LinkOutcome::Conflict { left, right }
            }
            (Some(idx), None) | (None, Some(idx)) => {
                let (name, key) = if pos_a.is_some() { (b, key_b) } else { (a, key_a) };
                let identity = &mut self.identities[idx];
                identity.members.push(IdentityMember {
                    name: name.to_string(),
                    canonical_key: key,
                    link_type,
                    confidence: decision.confidence,
                });
                // Identity confidence is its weakest link
                if decision.confidence < identity.confidence {
                    identity.confidence = decision.confidence;
                    identity.link_type = link_type;
                }
                let id = identity.id;
                self.mark_dirty(id);
                LinkOutcome::Extended(id)
            }
            (None, None) => {
                let id = Uuid::new_v4();
                let canonical_entity = entity_type(a);
                self.identities.push(Identity {
                    id,
                    canonical_name: key_a.clone(),
                    entity_type: canonical_entity,
                    members: vec![
                        IdentityMember {
                            name: a.to_string(),
                            canonical_key: key_a,
                            link_type: LinkType::Exact,
                            confidence: 1.0,
                        },
                        IdentityMember {
                            name: b.to_string(),
                            canonical_key: key_b,
                            link_type,
                            confidence: decision.confidence,
                        },
                    ],
                    link_type,
                    confidence: decision.confidence,
                });
                self.mark_dirty(id);
                LinkOutcome::Created(id)
            }
        };

        debug!(name_a = %a, name_b = %b, ?link_type, confidence = decision.confidence, ?outcome, "Identity link");
        (decision, outcome)
    }

    /// Observe every cross pair of two party lists; returns the linked pairs
    pub fn observe_sides(&mut self, side_a: &[String], side_b: &[String]) -> Vec<(LinkDecision, LinkOutcome)> {
        let mut outcomes = Vec::new();
        for a in side_a {
            for b in side_b {
                let (decision, outcome) = self.observe(a, b);
                if decision.is_linked() {
                    outcomes.push((decision, outcome));
                }
            }
        }
        outcomes
    }

    /// True when the names link directly or already share an identity
    pub fn same_party(&self, a: &str, b: &str) -> bool {
        if link_candidate(a, b).is_linked() {
            return true;
        }
        match (self.identity_for(a), self.identity_for(b)) {
            (Some(x), Some(y)) => x.id == y.id,
            _ => false,
        }
    }

    /// True when any name on one side is the same party as any on the other
    pub fn any_same_party(&self, side_a: &[String], side_b: &[String]) -> bool {
        side_a
            .iter()
            .any(|a| side_b.iter().any(|b| self.same_party(a, b)))
    }

    /// True when a grantor and grantee are one owner with high confidence
    ///
    /// A direct link must reach `FUZZY_MATCH_THRESHOLD`; a shared identity
    /// counts only when its weakest link does too. Name changes alone never
    /// qualify.
    pub fn confidently_same_party(&self, side_a: &[String], side_b: &[String]) -> bool {
        side_a.iter().any(|a| {
            side_b.iter().any(|b| {
                if link_candidate(a, b).confidence >= FUZZY_MATCH_THRESHOLD {
                    return true;
                }
                match (self.identity_for(a), self.identity_for(b)) {
                    (Some(x), Some(y)) => x.id == y.id && x.confidence >= FUZZY_MATCH_THRESHOLD,
                    _ => false,
                }
            })
        })
    }

    /// Identities changed since the last call (for persistence)
    pub fn take_dirty(&mut self) -> Vec<Identity> {
        let dirty = std::mem::take(&mut self.dirty);
        self.identities
            .iter()
            .filter(|i| dirty.contains(&i.id))
            .cloned()
            .collect()
    }

    fn mark_dirty(&mut self, id: Uuid) {
        if !self.dirty.contains(&id) {
            self.dirty.push(id);
        }
    }
}
