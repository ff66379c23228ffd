// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inquiry persistence and delivery status transitions.

use std::str::FromStr;

use concierge_core::{ConciergeError, InquiryRecord, InquiryStatus, NewInquiry};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::now_timestamp;

/// Insert a new inquiry with status `pending`, returning its generated id.
pub async fn insert_inquiry(db: &Database, inquiry: &NewInquiry) -> Result<String, ConciergeError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    let inquiry = inquiry.clone();
    let meta = inquiry.meta.as_ref().map(|m| m.to_string());
    let row_id = id.clone();

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO inquiries (id, name, email, message, product_id, product_slug, \
                 source, meta, status, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?9)",
                params![
                    row_id,
                    inquiry.name,
                    inquiry.email,
                    inquiry.message,
                    inquiry.product_id,
                    inquiry.product_slug,
                    inquiry.source,
                    meta,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    Ok(id)
}

/// Record a successful delivery.
pub async fn mark_sent(db: &Database, id: &str, delivery_id: &str) -> Result<(), ConciergeError> {
    let id = id.to_string();
    let delivery_id = delivery_id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE inquiries SET status = 'sent', delivery_id = ?2, error = NULL, \
                 updated_at = ?3 WHERE id = ?1",
                params![id, delivery_id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed delivery.
pub async fn mark_failed(db: &Database, id: &str, error: &str) -> Result<(), ConciergeError> {
    let id = id.to_string();
    let error = error.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE inquiries SET status = 'failed', error = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, error, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch an inquiry by id.
pub async fn get_inquiry(db: &Database, id: &str) -> Result<Option<InquiryRecord>, ConciergeError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, message, product_id, product_slug, source, status, \
                 delivery_id, error, created_at, updated_at FROM inquiries WHERE id = ?1",
            )?;
            let result = stmt.query_row(params![id], |row| {
                let status: String = row.get(7)?;
                Ok(InquiryRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    message: row.get(3)?,
                    product_id: row.get(4)?,
                    product_slug: row.get(5)?,
                    source: row.get(6)?,
                    status: InquiryStatus::from_str(&status).unwrap_or(InquiryStatus::Pending),
                    delivery_id: row.get(8)?,
                    error: row.get(9)?,
                    created_at: row.get(10)?,
                    updated_at: row.get(11)?,
                })
            });
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
