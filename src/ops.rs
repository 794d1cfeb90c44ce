//! Mutation operations on the current dataset.
//!
//! Every operation loads the owner's current snapshot, fails with
//! `EmptyDataset` when there is nothing loaded, applies one change and writes
//! the result back through the store. A successful change invalidates the
//! derived session state. A failed one leaves the file and the session as they
//! were. Each returns the notice shown to the user.

use crate::error::{PlotError, PlotResult};
use crate::session::SessionState;
use crate::store::TabularStore;
use crate::table::TableSnapshot;
use log::info;

enum Change {
    /// The snapshot changed and must be persisted
    Written(String),
    /// Nothing to do
    Unchanged(String),
}

fn apply<F>(
    store: &TabularStore,
    owner: Option<&str>,
    session: &mut SessionState,
    change: F,
) -> PlotResult<String>
where
    F: FnOnce(&mut TableSnapshot) -> PlotResult<Change>,
{
    let mut table = store.load_current(owner)?;
    if table.is_empty() {
        return Err(PlotError::EmptyDataset);
    }
    let owner = owner.ok_or(PlotError::Unauthorized)?;

    match change(&mut table)? {
        Change::Written(notice) => {
            store.replace_current(owner, &table)?;
            session.invalidate();
            info!("{}: {}", owner, notice);
            Ok(notice)
        }
        Change::Unchanged(notice) => Ok(notice),
    }
}

/// Drop every row holding a null; a table without nulls is left alone.
pub fn clean(
    store: &TabularStore,
    owner: Option<&str>,
    session: &mut SessionState,
) -> PlotResult<String> {
    apply(store, owner, session, |table| {
        if !table.has_nulls() {
            return Ok(Change::Unchanged("No missing values found".to_string()));
        }
        let dropped = table.drop_null_rows();
        Ok(Change::Written(format!(
            "Removed {} row(s) with missing values",
            dropped
        )))
    })
}

pub fn delete_column(
    store: &TabularStore,
    owner: Option<&str>,
    session: &mut SessionState,
    column: &str,
) -> PlotResult<String> {
    apply(store, owner, session, |table| {
        table.delete_column(column)?;
        Ok(Change::Written(format!("Column '{}' deleted", column)))
    })
}

/// Remove the row whose `Index` equals `index`.
pub fn delete_row(
    store: &TabularStore,
    owner: Option<&str>,
    session: &mut SessionState,
    index: &str,
) -> PlotResult<String> {
    apply(store, owner, session, |table| {
        table.delete_row(index)?;
        Ok(Change::Written(format!(
            "Row with Index {} deleted",
            index.trim()
        )))
    })
}

pub fn edit_cell(
    store: &TabularStore,
    owner: Option<&str>,
    session: &mut SessionState,
    column: &str,
    index: &str,
    new_value: &str,
) -> PlotResult<String> {
    apply(store, owner, session, |table| {
        table.edit_cell(column, index, new_value)?;
        Ok(Change::Written(format!(
            "Cell ({}, {}) updated",
            index.trim(),
            column
        )))
    })
}

pub fn replace_value(
    store: &TabularStore,
    owner: Option<&str>,
    session: &mut SessionState,
    column: &str,
    match_value: &str,
    replacement: &str,
) -> PlotResult<String> {
    apply(store, owner, session, |table| {
        let changed = table.replace_value(column, match_value, replacement)?;
        if changed == 0 {
            return Ok(Change::Unchanged(format!(
                "No cells in '{}' matched '{}'",
                column, match_value
            )));
        }
        Ok(Change::Written(format!(
            "Replaced {} cell(s) in '{}'",
            changed, column
        )))
    })
}

/// Store an upload as the owner's new current dataset. The derived state of
/// the previous dataset is dropped.
pub fn upload(
    store: &TabularStore,
    owner: Option<&str>,
    session: &mut SessionState,
    bytes: &[u8],
    filename: &str,
) -> PlotResult<String> {
    let owner = owner.ok_or(PlotError::Unauthorized)?;
    let file = store.upload(owner, bytes, filename)?;
    session.invalidate();
    Ok(format!("Uploaded {}", file.original_name))
}

/// Forget the current dataset: derived session state is dropped and the file
/// detached from the owner, so nothing is loaded until the next upload.
/// Succeeds when nothing is loaded.
pub fn clear(
    store: &TabularStore,
    owner: Option<&str>,
    session: &mut SessionState,
) -> PlotResult<String> {
    session.invalidate();
    if let Some(owner) = owner {
        if store.detach_current(owner)? {
            info!("{}: dataset cleared", owner);
        }
    }
    Ok("Data cleared".to_string())
}
