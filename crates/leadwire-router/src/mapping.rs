// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Business policy attached to each intent.

use leadwire_core::types::{ContactUpdate, FunnelStatus, Intent, ScoreUpdate, Specialty};

/// What an intent does to the contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentPolicy {
    /// Tag unioned into the contact's tag set.
    pub tag: Option<&'static str>,
    /// Added to the score, then clamped.
    pub score_delta: i32,
    /// Funnel status floor; applied only if further along than the current one.
    pub suggested_status: FunnelStatus,
}

impl IntentPolicy {
    pub fn to_update(self) -> ContactUpdate {
        ContactUpdate {
            add_tags: self.tag.map(str::to_string).into_iter().collect(),
            score: ScoreUpdate::Add(self.score_delta),
            suggested_status: Some(self.suggested_status),
        }
    }
}

const fn policy(tag: Option<&'static str>, score_delta: i32, suggested_status: FunnelStatus) -> IntentPolicy {
    IntentPolicy {
        tag,
        score_delta,
        suggested_status,
    }
}

/// Fixed intent → {tag, score delta, suggested status} table.
pub fn policy_for(intent: Intent) -> IntentPolicy {
    use FunnelStatus::{Contacted, Qualified};
    match intent {
        Intent::Greeting => policy(Some("saludo"), 5, Contacted),
        Intent::PriceInquiry => policy(Some("consulta-precios"), 15, Qualified),
        Intent::StockInquiry => policy(Some("consulta-stock"), 10, Qualified),
        Intent::Order => policy(Some("pedido"), 30, Qualified),
        Intent::IncompleteOrder => policy(Some("pedido-incompleto"), 20, Qualified),
        Intent::GeneralInquiry => policy(Some("consulta-general"), 5, Contacted),
        Intent::Complaint => policy(Some("reclamo"), 0, Contacted),
        Intent::PriceListRequest => policy(Some("solicita-lista-precios"), 15, Qualified),
        Intent::AfterHours => policy(Some("fuera-de-horario"), 0, Contacted),
        Intent::Confirmation => policy(Some("confirmacion"), 10, Contacted),
        Intent::Farewell => policy(Some("despedida"), 0, Contacted),
        Intent::Other => policy(None, 0, Contacted),
    }
}

/// Specialty that answers `intent`, if any. `None` means the reply needs no grounding.
pub fn specialty_for(intent: Intent) -> Option<Specialty> {
    match intent {
        Intent::PriceInquiry | Intent::PriceListRequest => Some(Specialty::Pricing),
        Intent::StockInquiry => Some(Specialty::Stock),
        Intent::Order | Intent::IncompleteOrder => Some(Specialty::Ordering),
        Intent::Complaint => Some(Specialty::Complaints),
        Intent::Greeting
        | Intent::GeneralInquiry
        | Intent::AfterHours
        | Intent::Confirmation
        | Intent::Farewell
        | Intent::Other => None,
    }
}
