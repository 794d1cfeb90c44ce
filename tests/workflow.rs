use plotter::archive::{ChartArchive, save_plot};
use plotter::cell::CellValue;
use plotter::db::Database;
use plotter::error::PlotError;
use plotter::graph::options::Binning;
use plotter::graph::{self, ChartForm, ChartKind, KindOptions, render};
use plotter::ops;
use plotter::session::{SessionState, SessionStore};
use plotter::store::TabularStore;
use std::sync::Arc;

struct Workspace {
    _dir: tempfile::TempDir,
    store: TabularStore,
    archive: ChartArchive,
    sessions: SessionStore,
}

fn workspace() -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open(dir.path().join("plotter.sqlite3")).unwrap());
    Workspace {
        store: TabularStore::new(db.clone(), dir.path()),
        archive: ChartArchive::new(db),
        sessions: SessionStore::new(dir.path()),
        _dir: dir,
    }
}

const ALICE: Option<&str> = Some("alice");

#[test]
fn upload_then_clean_keeps_original_index() {
    let ws = workspace();
    let mut session = SessionState::default();
    ops::upload(&ws.store, ALICE, &mut session, b"a,b\n1,2\n,4\n", "pairs.csv").unwrap();

    ops::clean(&ws.store, ALICE, &mut session).unwrap();
    let t = ws.store.load_current(ALICE).unwrap();
    assert_eq!(t.column_names(), vec!["Index", "a", "b"]);
    assert_eq!(
        t.rows,
        vec![vec![CellValue::Int(0), CellValue::Int(1), CellValue::Int(2)]]
    );

    // a second clean changes nothing
    let notice = ops::clean(&ws.store, ALICE, &mut session).unwrap();
    assert_eq!(notice, "No missing values found");
    assert_eq!(ws.store.load_current(ALICE).unwrap().rows.len(), 1);
}

#[test]
fn deleted_rows_keep_the_other_indices() {
    let ws = workspace();
    let mut session = SessionState::default();
    ops::upload(&ws.store, ALICE, &mut session, b"v\n10\n20\n30\n", "v.csv").unwrap();

    ops::delete_row(&ws.store, ALICE, &mut session, "1").unwrap();
    let t = ws.store.load_current(ALICE).unwrap();
    let indices: Vec<&CellValue> = t.rows.iter().map(|r| &r[0]).collect();
    assert_eq!(indices, vec![&CellValue::Int(0), &CellValue::Int(2)]);

    let err = ops::delete_row(&ws.store, ALICE, &mut session, "1").unwrap_err();
    assert!(matches!(err, PlotError::RowNotFound(_)));
}

#[test]
fn replacing_booleans_across_a_column() {
    let ws = workspace();
    let mut session = SessionState::default();
    let csv = b"flag\ntrue\nfalse\ntrue\nfalse\ntrue\n";
    ops::upload(&ws.store, ALICE, &mut session, csv, "flags.csv").unwrap();

    ops::replace_value(&ws.store, ALICE, &mut session, "flag", "true", "false").unwrap();
    let t = ws.store.load_current(ALICE).unwrap();
    let falses = t
        .rows
        .iter()
        .filter(|r| r[1] == CellValue::Bool(false))
        .count();
    assert_eq!(falses, 5);
}

#[test]
fn clear_detaches_until_the_next_upload() {
    let ws = workspace();
    let mut session = SessionState::default();
    ops::upload(&ws.store, ALICE, &mut session, b"a\n1\n", "first.csv").unwrap();
    ops::clear(&ws.store, ALICE, &mut session).unwrap();
    assert!(ws.store.load_current(ALICE).unwrap().is_empty());

    let err = ops::clean(&ws.store, ALICE, &mut session).unwrap_err();
    assert!(matches!(err, PlotError::EmptyDataset));

    ops::upload(&ws.store, ALICE, &mut session, b"b\n2\n", "second.csv").unwrap();
    let t = ws.store.load_current(ALICE).unwrap();
    assert_eq!(t.column_names(), vec!["Index", "b"]);
    assert_eq!(ws.store.files("alice").unwrap().len(), 2);
}

#[test]
fn charts_need_data() {
    let ws = workspace();
    let empty = ws.store.load_current(ALICE).unwrap();
    let mut session = SessionState::default();
    for kind in ChartKind::ALL {
        let err = graph::submit(&mut session, kind, &empty, &ChartForm::default()).unwrap_err();
        assert!(matches!(err, PlotError::EmptyDataset));
    }
    assert_eq!(session, SessionState::default());
}

#[test]
fn bin_count_wins_over_bin_width() {
    let ws = workspace();
    let mut session = SessionState::default();
    let csv = b"v\n1.0\n2.5\n3.0\n4.5\n5.0\n";
    ops::upload(&ws.store, ALICE, &mut session, csv, "v.csv").unwrap();
    let t = ws.store.load_current(ALICE).unwrap();

    let form = ChartForm {
        num_bins: Some("10".into()),
        bin_width: Some("0.5".into()),
        ..Default::default()
    };
    let built = graph::build(ChartKind::Histogram, &t, &form, None).unwrap();
    match built.spec.options {
        KindOptions::Histogram { binning } => assert_eq!(binning, Binning::Count(10)),
        other => panic!("unexpected options {:?}", other),
    }
}

#[test]
fn saved_charts_outlive_the_dataset() {
    let ws = workspace();
    let mut session = ws.sessions.checkout(ALICE).unwrap();
    ops::upload(&ws.store, ALICE, &mut session, b"k,v\na,3\nb,5\n", "kv.csv").unwrap();

    let err = save_plot(&ws.archive, "alice", &session, ChartKind::Bar, None).unwrap_err();
    assert!(matches!(err, PlotError::Save(_)));

    let t = ws.store.load_current(ALICE).unwrap();
    let form = ChartForm {
        title: Some("Sales".into()),
        ..Default::default()
    };
    graph::submit(&mut session, ChartKind::Bar, &t, &form).unwrap();
    let saved = save_plot(&ws.archive, "alice", &session, ChartKind::Bar, None).unwrap();
    assert_eq!(saved.title, "Bar Plot");

    ops::clear(&ws.store, ALICE, &mut session).unwrap();
    assert!(session.charts[ChartKind::Bar].cached.is_none());
    assert_eq!(
        session.charts[ChartKind::Bar].prior.as_ref().unwrap().title.as_deref(),
        Some("Sales")
    );

    let listed = ws.archive.list("alice").unwrap();
    assert_eq!(listed.len(), 1);
    let spec = listed[0].chart_spec().unwrap();
    assert_eq!(spec.title, "Sales");
    assert_eq!(render::to_svg(&spec).unwrap(), saved.to_svg().unwrap());
}

#[test]
fn session_state_survives_a_restart() {
    let ws = workspace();
    let mut session = ws.sessions.checkout(ALICE).unwrap();
    ops::upload(&ws.store, ALICE, &mut session, b"x,y\n1,2\n2,4\n", "xy.csv").unwrap();
    let t = ws.store.load_current(ALICE).unwrap();
    graph::submit(&mut session, ChartKind::Scatter, &t, &ChartForm::default()).unwrap();
    ws.sessions.commit(ALICE, session.clone()).unwrap();

    let restarted = SessionStore::new(ws.store.data_dir());
    let restored = restarted.checkout(ALICE).unwrap();
    assert_eq!(restored, session);
    assert!(restored.charts[ChartKind::Scatter].cached.is_some());
}

#[test]
fn index_survives_replace_and_clean() {
    let ws = workspace();
    let mut session = SessionState::default();
    ops::upload(&ws.store, ALICE, &mut session, b"a\n10\n20\n30\n", "a.csv").unwrap();

    let err = ops::replace_value(&ws.store, ALICE, &mut session, "Index", "2", "0").unwrap_err();
    assert!(matches!(err, PlotError::InvalidInput(_)));
    let err = ops::replace_value(&ws.store, ALICE, &mut session, "Index", "1", "nan").unwrap_err();
    assert!(matches!(err, PlotError::InvalidInput(_)));

    let notice = ops::clean(&ws.store, ALICE, &mut session).unwrap();
    assert_eq!(notice, "No missing values found");
    let t = ws.store.load_current(ALICE).unwrap();
    let indices: Vec<&CellValue> = t.rows.iter().map(|r| &r[0]).collect();
    assert_eq!(
        indices,
        vec![&CellValue::Int(0), &CellValue::Int(1), &CellValue::Int(2)]
    );
}
