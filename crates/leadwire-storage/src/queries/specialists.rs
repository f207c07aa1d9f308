// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Specialist profile operations. One profile per specialty.

use leadwire_core::types::{SpecialistProfile, Specialty};
use leadwire_core::{now_timestamp, LeadwireError};
use rusqlite::{params, OptionalExtension};

use super::parse_column;
use crate::database::Database;

/// Insert or replace the profile for its specialty.
pub async fn upsert_specialist(
    db: &Database,
    profile: &SpecialistProfile,
) -> Result<(), LeadwireError> {
    let profile = profile.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO specialists (specialty, name, instructions, model, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(specialty) DO UPDATE SET
                     name = excluded.name,
                     instructions = excluded.instructions,
                     model = excluded.model,
                     updated_at = excluded.updated_at",
                params![
                    profile.specialty.to_string(),
                    profile.name,
                    profile.instructions,
                    profile.model,
                    now_timestamp(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The profile serving `specialty`, if one is configured.
pub async fn get_specialist(
    db: &Database,
    specialty: Specialty,
) -> Result<Option<SpecialistProfile>, LeadwireError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT specialty, name, instructions, model FROM specialists WHERE specialty = ?1",
                params![specialty.to_string()],
                |row| {
                    Ok(SpecialistProfile {
                        specialty: parse_column::<Specialty>(row, 0)?,
                        name: row.get(1)?,
                        instructions: row.get(2)?,
                        model: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::open_temp;

    fn profile(instructions: &str) -> SpecialistProfile {
        SpecialistProfile {
            name: "Precios".into(),
            specialty: Specialty::Pricing,
            instructions: instructions.into(),
            model: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_specialty() {
        let (db, _dir) = open_temp().await;
        upsert_specialist(&db, &profile("lista v1")).await.unwrap();
        upsert_specialist(&db, &profile("lista v2")).await.unwrap();
        let stored = get_specialist(&db, Specialty::Pricing).await.unwrap().unwrap();
        assert_eq!(stored.instructions, "lista v2");
    }

    #[tokio::test]
    async fn missing_specialty_is_none() {
        let (db, _dir) = open_temp().await;
        assert!(get_specialist(&db, Specialty::Stock).await.unwrap().is_none());
    }
}
