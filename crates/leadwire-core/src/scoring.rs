// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Score and funnel-status arithmetic for automated contact updates.
//!
//! Automated stages may only raise the score (clamped to 0..=100) and only
//! advance the funnel status. Both rules make concurrent updates from the
//! analyzer and the classifier order-insensitive.

use crate::types::{Contact, ContactUpdate, FunnelStatus, ScoreUpdate};

/// Upper bound of `Contact::score`.
pub const MAX_SCORE: u8 = 100;

/// Clamp an arbitrary integer into the score range.
pub fn clamp_score(value: i64) -> u8 {
    value.clamp(0, MAX_SCORE as i64) as u8
}

/// Apply a score update. The result is never below `current`.
pub fn apply_score(current: u8, update: ScoreUpdate) -> u8 {
    let current = current.min(MAX_SCORE);
    match update {
        ScoreUpdate::Keep => current,
        ScoreUpdate::Add(delta) => clamp_score(current as i64 + delta.max(0) as i64),
        ScoreUpdate::AtLeast(target) => current.max(clamp_score(target as i64)),
    }
}

/// Resulting status for `current` given an automated `suggested` status.
///
/// Index semantics: `max(i, j)` along `NEW → … → WON`. `LOST` is terminal and
/// never produced or left automatically.
pub fn advance_status(current: FunnelStatus, suggested: FunnelStatus) -> FunnelStatus {
    match (current.rank(), suggested.rank()) {
        (Some(i), Some(j)) if j > i => suggested,
        _ => current,
    }
}

/// Apply `update` to `contact` in place. Returns whether anything changed.
pub fn apply_update(contact: &mut Contact, update: &ContactUpdate) -> bool {
    let mut changed = false;

    for tag in &update.add_tags {
        let tag = tag.trim();
        if !tag.is_empty() && contact.tags.insert(tag.to_string()) {
            changed = true;
        }
    }

    let score = apply_score(contact.score, update.score);
    if score != contact.score {
        contact.score = score;
        changed = true;
    }

    if let Some(suggested) = update.suggested_status {
        let status = advance_status(contact.funnel_status, suggested);
        if status != contact.funnel_status {
            contact.funnel_status = status;
            changed = true;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;

    const FORWARD: [FunnelStatus; 6] = [
        FunnelStatus::New,
        FunnelStatus::Contacted,
        FunnelStatus::Qualified,
        FunnelStatus::Proposal,
        FunnelStatus::Negotiation,
        FunnelStatus::Won,
    ];

    fn contact() -> Contact {
        Contact {
            id: "c1".into(),
            phone: "5491100000000".into(),
            name: None,
            remote_address: None,
            tags: BTreeSet::new(),
            score: 0,
            funnel_status: FunnelStatus::New,
            assigned_agent_id: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn add_clamps_at_hundred() {
        assert_eq!(apply_score(90, ScoreUpdate::Add(30)), 100);
        assert_eq!(apply_score(100, ScoreUpdate::Add(1)), 100);
    }

    #[test]
    fn negative_delta_never_lowers_score() {
        assert_eq!(apply_score(40, ScoreUpdate::Add(-15)), 40);
    }

    #[test]
    fn at_least_holds_higher_score() {
        assert_eq!(apply_score(70, ScoreUpdate::AtLeast(50)), 70);
        assert_eq!(apply_score(20, ScoreUpdate::AtLeast(50)), 50);
        assert_eq!(apply_score(20, ScoreUpdate::AtLeast(250)), 100);
    }

    #[test]
    fn status_never_regresses() {
        assert_eq!(
            advance_status(FunnelStatus::Qualified, FunnelStatus::Contacted),
            FunnelStatus::Qualified
        );
        assert_eq!(
            advance_status(FunnelStatus::Contacted, FunnelStatus::Proposal),
            FunnelStatus::Proposal
        );
    }

    #[test]
    fn lost_is_sticky_and_never_suggested() {
        assert_eq!(advance_status(FunnelStatus::Lost, FunnelStatus::Won), FunnelStatus::Lost);
        assert_eq!(advance_status(FunnelStatus::New, FunnelStatus::Lost), FunnelStatus::New);
    }

    #[test]
    fn tag_union_is_idempotent() {
        let mut c = contact();
        let update = ContactUpdate {
            add_tags: vec!["pedido".into(), "pedido".into()],
            ..Default::default()
        };
        assert!(apply_update(&mut c, &update));
        assert!(!apply_update(&mut c, &update));
        assert_eq!(c.tags.len(), 1);
    }

    proptest! {
        #[test]
        fn repeated_positive_delta_stays_in_range(start in 0u8..=100, delta in 0i32..200, n in 1usize..20) {
            let mut score = start;
            for _ in 0..n {
                let next = apply_score(score, ScoreUpdate::Add(delta));
                prop_assert!(next >= score);
                prop_assert!(next <= MAX_SCORE);
                score = next;
            }
        }

        #[test]
        fn status_is_max_of_indices(i in 0usize..6, j in 0usize..6) {
            let result = advance_status(FORWARD[i], FORWARD[j]);
            prop_assert_eq!(result, FORWARD[i.max(j)]);
        }

        #[test]
        fn either_order_keeps_both_score_floors(
            start in 0u8..=100,
            a in -50i32..80,
            b in 0i32..120,
            i in 0usize..6,
            j in 0usize..6,
        ) {
            let first = ContactUpdate { add_tags: vec!["saludo".into()], score: ScoreUpdate::Add(a), suggested_status: Some(FORWARD[i]) };
            let second = ContactUpdate { add_tags: vec![], score: ScoreUpdate::AtLeast(b), suggested_status: Some(FORWARD[j]) };

            let mut x = Contact { score: start, ..contact() };
            apply_update(&mut x, &first);
            apply_update(&mut x, &second);

            let mut y = Contact { score: start, ..contact() };
            apply_update(&mut y, &second);
            apply_update(&mut y, &first);

            // Status and tags commute exactly; the score lands between the
            // floors both updates promise and their stacked maximum.
            prop_assert_eq!(x.funnel_status, y.funnel_status);
            prop_assert_eq!(&x.tags, &y.tags);
            let gain = i64::from(a.max(0));
            let floor = clamp_score(i64::from(start) + gain).max(clamp_score(i64::from(b)));
            let ceiling = clamp_score(i64::from(start.max(clamp_score(i64::from(b)))) + gain);
            for score in [x.score, y.score] {
                prop_assert!(floor <= score && score <= ceiling);
            }
        }
    }
}
