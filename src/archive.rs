use crate::db::Database;
use crate::error::{PlotError, PlotResult};
use crate::graph::{ChartKind, ChartSpec, render};
use crate::session::SessionState;
use crate::store::{parse_timestamp, timestamp};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use std::sync::Arc;

/// A chart the user chose to keep. Saved charts are immutable and outlive
/// the dataset they were drawn from.
#[derive(Debug, Clone, Serialize)]
pub struct SavedChart {
    pub id: i64,
    pub owner: String,
    pub title: String,
    pub kind: ChartKind,
    /// The chart spec as JSON
    pub spec: String,
    pub saved_at: DateTime<Utc>,
}

impl SavedChart {
    pub fn chart_spec(&self) -> PlotResult<ChartSpec> {
        ChartSpec::from_json(&self.spec)
    }

    /// Redraw the chart as an SVG document.
    pub fn to_svg(&self) -> PlotResult<String> {
        render::to_svg(&self.chart_spec()?)
    }
}

pub struct ChartArchive {
    db: Arc<Database>,
}

impl ChartArchive {
    pub fn new(db: Arc<Database>) -> Self {
        ChartArchive { db }
    }

    pub fn insert(
        &self,
        owner: &str,
        title: &str,
        kind: ChartKind,
        spec: &str,
    ) -> PlotResult<SavedChart> {
        let saved_at = Utc::now();
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO saved_charts (owner, title, kind, spec, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![owner, title, kind.slug(), spec, timestamp(&saved_at)],
        )?;
        let id = conn.last_insert_rowid();
        info!("{} saved {} chart {} as '{}'", owner, kind, id, title);

        Ok(SavedChart {
            id,
            owner: owner.to_string(),
            title: title.to_string(),
            kind,
            spec: spec.to_string(),
            saved_at,
        })
    }

    /// The owner's saved charts, newest first.
    pub fn list(&self, owner: &str) -> PlotResult<Vec<SavedChart>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner, title, kind, spec, saved_at FROM saved_charts
             WHERE owner = ?1 ORDER BY saved_at DESC, id DESC",
        )?;
        let charts = stmt
            .query_map(params![owner], row_to_chart)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(charts)
    }

    /// One saved chart, if it exists and belongs to `owner`.
    pub fn get(&self, owner: &str, id: i64) -> PlotResult<Option<SavedChart>> {
        let conn = self.db.lock()?;
        let chart = conn
            .query_row(
                "SELECT id, owner, title, kind, spec, saved_at FROM saved_charts
                 WHERE owner = ?1 AND id = ?2",
                params![owner, id],
                row_to_chart,
            )
            .optional()?;
        Ok(chart)
    }
}

fn row_to_chart(row: &rusqlite::Row<'_>) -> rusqlite::Result<SavedChart> {
    let kind: String = row.get(3)?;
    let saved_at: String = row.get(5)?;
    Ok(SavedChart {
        id: row.get(0)?,
        owner: row.get(1)?,
        title: row.get(2)?,
        kind: kind
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        spec: row.get(4)?,
        saved_at: parse_timestamp(&saved_at),
    })
}

/// Persist the chart currently cached for `kind` in the session.
///
/// A blank title falls back to the kind's default title.
///
/// # Errors
/// * `Save` if nothing has been built for `kind` in this session
pub fn save_plot(
    archive: &ChartArchive,
    owner: &str,
    session: &SessionState,
    kind: ChartKind,
    title: Option<&str>,
) -> PlotResult<SavedChart> {
    let cached = session.charts[kind]
        .cached
        .as_ref()
        .ok_or_else(|| PlotError::Save("no plot".to_string()))?;
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(kind.save_title());
    archive.insert(owner, title, kind, &cached.spec_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{self, ChartForm};
    use crate::loader::from_csv_bytes;

    fn archive() -> ChartArchive {
        ChartArchive::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn save_before_build_fails() {
        let archive = archive();
        let session = SessionState::default();
        for kind in ChartKind::ALL {
            let err = save_plot(&archive, "alice", &session, kind, None).unwrap_err();
            assert!(matches!(err, PlotError::Save(_)));
        }
        assert!(archive.list("alice").unwrap().is_empty());
    }

    #[test]
    fn saved_chart_redraws_identically() {
        let archive = archive();
        let data = from_csv_bytes(b"k,v\na,1\nb,2\n").unwrap();
        let mut session = SessionState::default();
        graph::submit(&mut session, ChartKind::Pie, &data, &ChartForm::default()).unwrap();

        let saved = save_plot(&archive, "alice", &session, ChartKind::Pie, Some("  ")).unwrap();
        assert_eq!(saved.title, "Pie Chart");

        let cached = session.charts[ChartKind::Pie].cached.as_ref().unwrap();
        let svg = saved.to_svg().unwrap();
        assert!(cached.html.contains(&svg));
    }

    #[test]
    fn charts_are_owner_scoped_and_newest_first() {
        let archive = archive();
        let first = archive.insert("alice", "one", ChartKind::Bar, "{}").unwrap();
        let second = archive.insert("alice", "two", ChartKind::Line, "{}").unwrap();
        archive.insert("bob", "three", ChartKind::Box, "{}").unwrap();

        let ids: Vec<i64> = archive.list("alice").unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(archive.get("alice", first.id).unwrap().unwrap().kind, ChartKind::Bar);
        assert!(archive.get("bob", first.id).unwrap().is_none());
    }
}
