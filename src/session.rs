//! Per-user working state: the cached table view and, for every chart kind,
//! the last merged option form and the last rendered chart.
//!
//! Operations receive the state explicitly as `&mut SessionState`. The
//! [`SessionStore`] hands out copies per request and takes them back when the
//! request is done, keeping a gzip snapshot of each user's state on disk so it
//! survives restarts.

use crate::error::{PlotError, PlotResult};
use crate::graph::{ChartForm, ChartKind};
use crate::saving::{load_session, save_session};
use crate::store::safe_name;
use crate::table::TableSnapshot;
use crate::view::DatasetView;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Index, IndexMut};
use std::path::PathBuf;
use std::sync::RwLock;

pub const SESSION_FILE: &str = "session.bin.gz";

/// A rendered chart waiting to be shown or saved
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CachedChart {
    /// The serialized chart spec
    pub spec_json: String,
    /// The chart as an HTML fragment
    pub html: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ChartSlot {
    pub prior: Option<ChartForm>,
    pub cached: Option<CachedChart>,
}

/// One slot per chart kind, indexed by [`ChartKind`]
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ChartSlots([ChartSlot; 6]);

impl Index<ChartKind> for ChartSlots {
    type Output = ChartSlot;

    fn index(&self, kind: ChartKind) -> &ChartSlot {
        &self.0[kind.index()]
    }
}

impl IndexMut<ChartKind> for ChartSlots {
    fn index_mut(&mut self, kind: ChartKind) -> &mut ChartSlot {
        &mut self.0[kind.index()]
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SessionState {
    pub view: Option<DatasetView>,
    pub charts: ChartSlots,
}

impl SessionState {
    /// Drop everything derived from the dataset: the table view and every
    /// cached chart. Prior forms stay, they describe the user's choices rather
    /// than the data.
    pub fn invalidate(&mut self) {
        self.view = None;
        for slot in self.charts.0.iter_mut() {
            slot.cached = None;
        }
    }

    /// The cached view of `table`, formatting it first if needed.
    pub fn view_of(&mut self, table: &TableSnapshot) -> &DatasetView {
        self.view.get_or_insert_with(|| DatasetView::of(table))
    }
}

/// Session states of all users, in memory and on disk
pub struct SessionStore {
    data_dir: PathBuf,
    states: RwLock<HashMap<String, SessionState>>,
}

impl SessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        SessionStore {
            data_dir: data_dir.into(),
            states: RwLock::new(HashMap::new()),
        }
    }

    fn snapshot_path(&self, owner: &str) -> PathBuf {
        self.data_dir.join(safe_name(owner)).join(SESSION_FILE)
    }

    /// A working copy of the owner's state. Anonymous callers always start
    /// from an empty state.
    pub fn checkout(&self, owner: Option<&str>) -> PlotResult<SessionState> {
        let Some(owner) = owner else {
            return Ok(SessionState::default());
        };
        {
            let states = self
                .states
                .read()
                .map_err(|_| PlotError::Poisoned("sessions"))?;
            if let Some(state) = states.get(owner) {
                return Ok(state.clone());
            }
        }

        let path = self.snapshot_path(owner);
        let state = if path.exists() {
            match load_session(&path) {
                Ok(state) => {
                    debug!("restored session of {} from {}", owner, path.display());
                    state
                }
                Err(e) => {
                    warn!("discarding unreadable session of {}: {}", owner, e);
                    SessionState::default()
                }
            }
        } else {
            SessionState::default()
        };

        self.states
            .write()
            .map_err(|_| PlotError::Poisoned("sessions"))?
            .insert(owner.to_string(), state.clone());
        Ok(state)
    }

    /// Store the owner's state back, last write wins. Anonymous state is
    /// discarded.
    pub fn commit(&self, owner: Option<&str>, state: SessionState) -> PlotResult<()> {
        let Some(owner) = owner else {
            return Ok(());
        };
        save_session(&state, self.snapshot_path(owner))?;
        self.states
            .write()
            .map_err(|_| PlotError::Poisoned("sessions"))?
            .insert(owner.to_string(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached() -> CachedChart {
        CachedChart {
            spec_json: "{}".into(),
            html: "<div></div>".into(),
        }
    }

    #[test]
    fn invalidate_keeps_priors() {
        let mut state = SessionState::default();
        state.view = Some(DatasetView::default());
        for kind in ChartKind::ALL {
            state.charts[kind].prior = Some(ChartForm::default());
            state.charts[kind].cached = Some(cached());
        }
        state.invalidate();
        assert!(state.view.is_none());
        for kind in ChartKind::ALL {
            assert!(state.charts[kind].cached.is_none());
            assert!(state.charts[kind].prior.is_some());
        }
    }

    #[test]
    fn slots_are_independent() {
        let mut state = SessionState::default();
        state.charts[ChartKind::Line].cached = Some(cached());
        assert!(state.charts[ChartKind::Scatter].cached.is_none());
        assert!(state.charts[ChartKind::Line].cached.is_some());
    }

    #[test]
    fn committed_state_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut state = store.checkout(Some("alice")).unwrap();
        assert_eq!(state, SessionState::default());
        state.charts[ChartKind::Bar].cached = Some(cached());
        store.commit(Some("alice"), state.clone()).unwrap();

        let restarted = SessionStore::new(dir.path());
        assert_eq!(restarted.checkout(Some("alice")).unwrap(), state);
        assert_eq!(
            restarted.checkout(Some("bob")).unwrap(),
            SessionState::default()
        );
    }

    #[test]
    fn anonymous_state_is_never_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut state = SessionState::default();
        state.view = Some(DatasetView::default());
        store.commit(None, state).unwrap();
        assert_eq!(store.checkout(None).unwrap(), SessionState::default());
    }
}
