// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Staff operations.

use leadwire_core::types::StaffMember;
use leadwire_core::{now_timestamp, LeadwireError};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;

fn row_to_staff(row: &rusqlite::Row<'_>) -> Result<StaffMember, rusqlite::Error> {
    Ok(StaffMember {
        id: row.get(0)?,
        name: row.get(1)?,
        active: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Create an active staff member.
pub async fn create_staff(db: &Database, name: &str) -> Result<StaffMember, LeadwireError> {
    let member = StaffMember {
        id: super::new_id(),
        name: name.to_string(),
        active: true,
        created_at: now_timestamp(),
    };
    let row = member.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO staff (id, name, active, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![row.id, row.name, row.active, row.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(member)
}

/// The earliest-created active staff member.
pub async fn first_active_staff(db: &Database) -> Result<Option<StaffMember>, LeadwireError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT id, name, active, created_at FROM staff
                 WHERE active = 1 ORDER BY created_at ASC, rowid ASC LIMIT 1",
                [],
                row_to_staff,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Toggle whether a staff member receives new leads.
pub async fn set_staff_active(db: &Database, id: &str, active: bool) -> Result<(), LeadwireError> {
    let key = id.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE staff SET active = ?1 WHERE id = ?2",
                params![active, key],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if updated == 0 {
        return Err(LeadwireError::NotFound {
            entity: "staff",
            id: id.to_string(),
        });
    }
    Ok(())
}
