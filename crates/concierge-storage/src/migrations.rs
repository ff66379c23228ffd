// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary and applied on open.

use concierge_core::ConciergeError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), ConciergeError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| ConciergeError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
