use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{PlotError, PlotResult};
use crate::session::SessionState;

/// Write a session snapshot as gzip-compressed bincode.
///
/// The snapshot goes to a sibling temporary file first and is renamed into
/// place once complete.
pub fn save_session(state: &SessionState, filename: impl AsRef<Path>) -> PlotResult<()> {
    let target = filename.as_ref();
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir)?;
    }
    let staging = target.with_extension("tmp");

    let file = File::create(&staging)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::new(encoder);
    serialize_into(&mut writer, state)?;

    let encoder = writer
        .into_inner()
        .map_err(|e| PlotError::from(e.into_error()))?;
    encoder.finish()?;

    fs::rename(&staging, target)?;
    Ok(())
}

pub fn load_session(filename: impl AsRef<Path>) -> PlotResult<SessionState> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);

    let state: SessionState = deserialize_from(&mut reader)?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ChartForm, ChartKind};
    use crate::session::CachedChart;
    use crate::view::DatasetView;

    #[test]
    fn snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice").join("session.bin.gz");

        let mut state = SessionState::default();
        state.view = Some(DatasetView {
            columns: vec!["Index".into(), "a".into()],
            rows: vec![vec!["0".into(), "1.5".into()]],
        });
        state.charts[ChartKind::Pie].prior = Some(ChartForm {
            title: Some("Shares".into()),
            ..Default::default()
        });
        state.charts[ChartKind::Pie].cached = Some(CachedChart {
            spec_json: "{}".into(),
            html: "<div></div>".into(),
        });

        save_session(&state, &path).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(load_session(&path).unwrap(), state);
    }

    #[test]
    fn missing_snapshot_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_session(dir.path().join("none.bin.gz")).unwrap_err();
        assert!(matches!(err, PlotError::Io { .. }));
    }
}
