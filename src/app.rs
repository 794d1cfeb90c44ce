//! HTTP surface: the axum router, shared application state and the page and
//! form handlers.
//!
//! Every handler runs one sequential chain: resolve the caller, check out
//! their session state, load the dataset, run one operation or chart builder,
//! commit the session and render. Form posts answer with a redirect carrying a
//! `notice` query parameter; errors from the user-facing taxonomy become that
//! notice, anything else is logged and answered with a 500.

use axum::{
    Extension, Form, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::archive::{self, ChartArchive};
use crate::config::Config;
use crate::db::Database;
use crate::describe;
use crate::downloader;
use crate::error::{PlotError, PlotResult};
use crate::graph::style::Theme;
use crate::graph::{self, ChartForm, ChartKind, options::text, render};
use crate::login::{self, Identity, NoticeQuery};
use crate::ops;
use crate::pages::{Pages, script_json};
use crate::session::{SessionState, SessionStore};
use crate::store::{TabularStore, safe_name};
use crate::table::INDEX_COLUMN;

/// Largest accepted upload
const UPLOAD_LIMIT: usize = 32 * 1024 * 1024;

const LEGEND_POSITIONS: [&str; 4] = ["top", "bottom", "left", "right"];
const LABEL_POSITIONS: [&str; 3] = ["auto", "inside", "outside"];
const MARKER_TYPES: [&str; 6] = ["circle", "square", "diamond", "cross", "x", "triangle-up"];

pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub store: TabularStore,
    pub archive: ChartArchive,
    pub sessions: SessionStore,
    pub pages: Pages,
}

impl AppState {
    /// Open (or create) everything under the configured data directory.
    pub fn open(config: Config) -> PlotResult<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let db = Arc::new(Database::open(config.database_path())?);
        Ok(AppState {
            store: TabularStore::new(db.clone(), config.data_dir.clone()),
            archive: ChartArchive::new(db.clone()),
            sessions: SessionStore::new(config.data_dir.clone()),
            pages: Pages::new()?,
            db,
            config,
        })
    }

    fn page(&self, name: &str, identity: &Identity, mut context: Value) -> AppResult<Html<String>> {
        context["user"] = json!(identity.owner());
        Ok(Html(self.pages.render(name, &context)?))
    }
}

/// An error that ends a request
pub struct AppError(PlotError);

pub type AppResult<T> = Result<T, AppError>;

impl From<PlotError> for AppError {
    fn from(e: PlotError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.0.is_user_facing() {
            return (StatusCode::BAD_REQUEST, self.0.to_string()).into_response();
        }
        error!("request failed: {}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}

/// `path` with `message` attached as the `notice` query parameter.
pub fn with_notice(path: &str, message: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}notice={}", path, separator, urlencoding::encode(message))
}

/// Redirect to `path` reporting the outcome of an operation.
fn notify(path: &str, outcome: PlotResult<String>) -> AppResult<Redirect> {
    match outcome {
        Ok(message) => Ok(Redirect::to(&with_notice(path, &message))),
        Err(e) if e.is_user_facing() => Ok(Redirect::to(&with_notice(path, &e.to_string()))),
        Err(e) => Err(e.into()),
    }
}

/// Run `op` against the caller's checked-out session state and store it back.
fn with_session<T>(
    state: &AppState,
    identity: &Identity,
    op: impl FnOnce(&mut SessionState) -> T,
) -> PlotResult<T> {
    let owner = identity.owner();
    let mut session = state.sessions.checkout(owner)?;
    let result = op(&mut session);
    state.sessions.commit(owner, session)?;
    Ok(result)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/about", get(serve_about))
        .route("/contact", get(serve_contact))
        .route(
            "/login",
            get(login::serve_login_page).post(login::handle_login),
        )
        .route(
            "/signup",
            get(login::serve_signup_page).post(login::handle_signup),
        )
        .route("/logout", get(login::handle_logout).post(login::handle_logout))
        .route("/data", get(serve_data))
        .route("/data/upload", post(handle_upload))
        .route("/data/clean", post(handle_clean))
        .route("/data/delete-column", post(handle_delete_column))
        .route("/data/delete-row", post(handle_delete_row))
        .route("/data/edit-cell", post(handle_edit_cell))
        .route("/data/replace-value", post(handle_replace_value))
        .route("/data/clear", post(handle_clear))
        .route("/data/download.csv", get(download_csv))
        .route("/data/download.xlsx", get(download_xlsx))
        .route("/describe", get(serve_describe))
        .route("/chart/:kind", get(serve_chart).post(handle_chart))
        .route("/export", get(serve_export))
        .route("/export/:id/svg", get(download_svg))
        .nest_service("/static", ServeDir::new("static"))
        .layer(middleware::from_fn(login::identify))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let bind = config.bind.clone();
    let state = Arc::new(AppState::open(config)?);
    let app = router(state);

    let listener = TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    state.page(
        "index",
        &identity,
        json!({ "title": "Home", "notice": query.notice }),
    )
}

async fn serve_about(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Html<String>> {
    state.page("about", &identity, json!({ "title": "About" }))
}

async fn serve_contact(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Html<String>> {
    state.page("contact", &identity, json!({ "title": "Contact" }))
}

#[derive(Debug, Deserialize)]
struct DataQuery {
    page: Option<String>,
    notice: Option<String>,
}

async fn serve_data(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<DataQuery>,
) -> AppResult<Html<String>> {
    let owner = identity.owner();
    let table = state.store.load_current(owner)?;
    let files = match owner {
        Some(owner) => state.store.files(owner)?,
        None => Vec::new(),
    };
    let file = match owner {
        Some(owner) => state.store.current_file(owner)?.map(|f| f.original_name),
        None => None,
    };

    let page = if table.is_empty() {
        None
    } else {
        let mut session = state.sessions.checkout(owner)?;
        let fresh = session.view.is_none();
        let page = session
            .view_of(&table)
            .page(query.page.as_deref(), state.config.page_size);
        // only a newly built view needs writing back
        if fresh {
            state.sessions.commit(owner, session)?;
        }
        Some(page)
    };
    let columns: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|c| c != INDEX_COLUMN)
        .collect();

    state.page(
        "data",
        &identity,
        json!({
            "title": "Data",
            "notice": query.notice,
            "has_data": page.is_some(),
            "file": file,
            "files": files,
            "page": page,
            "columns": columns,
        }),
    )
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> AppResult<Redirect> {
    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, bytes)),
                    Err(e) => {
                        return notify("/data", Err(PlotError::InvalidFormat(e.body_text())));
                    }
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => return notify("/data", Err(PlotError::InvalidFormat(e.body_text()))),
        }
    }

    let Some((filename, bytes)) = upload else {
        return notify(
            "/data",
            Err(PlotError::InvalidFormat("no file was sent".to_string())),
        );
    };
    let outcome = with_session(&state, &identity, |session| {
        ops::upload(&state.store, identity.owner(), session, &bytes, &filename)
    })?;
    notify("/data", outcome)
}

async fn handle_clean(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Redirect> {
    let outcome = with_session(&state, &identity, |session| {
        ops::clean(&state.store, identity.owner(), session)
    })?;
    notify("/data", outcome)
}

#[derive(Debug, Deserialize)]
struct ColumnForm {
    column: String,
}

async fn handle_delete_column(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<ColumnForm>,
) -> AppResult<Redirect> {
    let outcome = with_session(&state, &identity, |session| {
        ops::delete_column(&state.store, identity.owner(), session, &form.column)
    })?;
    notify("/data", outcome)
}

#[derive(Debug, Deserialize)]
struct RowForm {
    index: String,
}

async fn handle_delete_row(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<RowForm>,
) -> AppResult<Redirect> {
    let outcome = with_session(&state, &identity, |session| {
        ops::delete_row(&state.store, identity.owner(), session, &form.index)
    })?;
    notify("/data", outcome)
}

#[derive(Debug, Deserialize)]
struct EditForm {
    column: String,
    index: String,
    #[serde(default)]
    new_value: String,
}

async fn handle_edit_cell(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<EditForm>,
) -> AppResult<Redirect> {
    let outcome = with_session(&state, &identity, |session| {
        ops::edit_cell(
            &state.store,
            identity.owner(),
            session,
            &form.column,
            &form.index,
            &form.new_value,
        )
    })?;
    notify("/data", outcome)
}

#[derive(Debug, Deserialize)]
struct ReplaceForm {
    column: String,
    match_value: String,
    #[serde(default)]
    replacement: String,
}

async fn handle_replace_value(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<ReplaceForm>,
) -> AppResult<Redirect> {
    let outcome = with_session(&state, &identity, |session| {
        ops::replace_value(
            &state.store,
            identity.owner(),
            session,
            &form.column,
            &form.match_value,
            &form.replacement,
        )
    })?;
    notify("/data", outcome)
}

async fn handle_clear(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Redirect> {
    let outcome = with_session(&state, &identity, |session| {
        ops::clear(&state.store, identity.owner(), session)
    })?;
    notify("/data", outcome)
}

/// File name stem of the caller's current upload
fn download_stem(state: &AppState, identity: &Identity) -> PlotResult<String> {
    let name = match identity.owner() {
        Some(owner) => state.store.current_file(owner)?.map(|f| f.original_name),
        None => None,
    };
    let name = name.unwrap_or_else(|| "data.csv".to_string());
    let stem = name
        .strip_suffix(".csv")
        .or_else(|| name.strip_suffix(".CSV"))
        .unwrap_or(&name);
    Ok(safe_name(stem))
}

fn attachment(content_type: &str, filename: &str, body: impl IntoResponse) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

async fn download_csv(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Response> {
    let table = state.store.load_current(identity.owner())?;
    if table.is_empty() {
        return Ok(notify("/data", Err(PlotError::EmptyDataset))?.into_response());
    }
    let csv = downloader::to_csv(&table)?;
    let filename = format!("{}.csv", download_stem(&state, &identity)?);
    Ok(attachment("text/csv; charset=utf-8", &filename, csv))
}

async fn download_xlsx(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Response> {
    let table = state.store.load_current(identity.owner())?;
    if table.is_empty() {
        return Ok(notify("/data", Err(PlotError::EmptyDataset))?.into_response());
    }
    let workbook = downloader::to_xlsx(&table)?;
    let filename = format!("{}.xlsx", download_stem(&state, &identity)?);
    Ok(attachment(
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        &filename,
        workbook,
    ))
}

async fn serve_describe(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    let table = state.store.load_current(identity.owner())?;
    let (summary, notice) = if table.is_empty() {
        (None, query.notice)
    } else {
        match describe::describe(&table, state.config.top_values) {
            Ok(summary) => (Some(summary), query.notice),
            Err(e) if e.is_user_facing() => (None, Some(e.to_string())),
            Err(e) => return Err(e.into()),
        }
    };
    state.page(
        "describe",
        &identity,
        json!({ "title": "Describe", "notice": notice, "summary": summary }),
    )
}

fn chart_kind(slug: &str) -> Result<ChartKind, Response> {
    slug.parse()
        .map_err(|e: PlotError| (StatusCode::NOT_FOUND, e.to_string()).into_response())
}

/// `(name, selected)` entries for a select element.
fn choices<'a>(names: impl IntoIterator<Item = &'a str>, current: Option<&str>) -> Vec<Value> {
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let selected = match current {
                Some(current) => current == name,
                None => i == 0,
            };
            json!({ "name": name, "selected": selected })
        })
        .collect()
}

async fn serve_chart(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Response> {
    let kind = match chart_kind(&slug) {
        Ok(kind) => kind,
        Err(response) => return Ok(response),
    };
    let table = state.store.load_current(identity.owner())?;
    let session = state.sessions.checkout(identity.owner())?;
    let slot = &session.charts[kind];
    let form = slot.prior.clone().unwrap_or_default();

    let (default_x, default_y) = graph::default_columns(&table);
    let x = text(&form.x_column).map(str::to_string).or(default_x);
    let y = match text(&form.y_column) {
        Some(y) => Some(y.to_string()),
        None if kind.y_optional() => None,
        None => default_y,
    };
    let columns: Vec<Value> = table
        .column_names()
        .into_iter()
        .filter(|c| c != INDEX_COLUMN)
        .map(|name| {
            json!({
                "x_selected": x.as_deref() == Some(name.as_str()),
                "y_selected": y.as_deref() == Some(name.as_str()),
                "name": name,
            })
        })
        .collect();
    let kinds: Vec<Value> = ChartKind::ALL
        .iter()
        .map(|k| json!({ "slug": k.slug(), "title": k.save_title(), "active": *k == kind }))
        .collect();
    let style = text(&form.style).map(Theme::from_name).unwrap_or_default();

    let page = state.page(
        "chart",
        &identity,
        json!({
            "title": kind.save_title(),
            "notice": query.notice,
            "kind": kind.slug(),
            "kind_title": kind.save_title(),
            "kinds": kinds,
            "has_data": !table.is_empty(),
            "chart_html": slot.cached.as_ref().map(|c| c.html.as_str()),
            "columns": columns,
            "uses_y": kind.uses_y(),
            "y_optional": kind.y_optional(),
            "themes": choices(Theme::ALL.iter().map(Theme::name), Some(style.name())),
            "legend_positions": choices(LEGEND_POSITIONS, text(&form.legend_position)),
            "label_positions": choices(LABEL_POSITIONS, text(&form.label_position)),
            "marker_types": choices(MARKER_TYPES, text(&form.marker_type)),
            "form": form,
        }),
    )?;
    Ok(page.into_response())
}

#[derive(Debug, Deserialize)]
struct ChartRequest {
    #[serde(flatten)]
    form: ChartForm,
    save: Option<String>,
    save_title: Option<String>,
}

/// Rebuild the chart from the posted options, or save the cached one when the
/// form was posted with `save`.
async fn handle_chart(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
    Form(request): Form<ChartRequest>,
) -> AppResult<Response> {
    let kind = match chart_kind(&slug) {
        Ok(kind) => kind,
        Err(response) => return Ok(response),
    };
    let back = format!("/chart/{}", kind.slug());
    let owner = identity.owner();

    if request.save.is_some() {
        let Some(owner) = owner else {
            return Ok(notify(&back, Err(PlotError::Unauthorized))?.into_response());
        };
        let session = state.sessions.checkout(Some(owner))?;
        let outcome = archive::save_plot(
            &state.archive,
            owner,
            &session,
            kind,
            request.save_title.as_deref(),
        )
        .map(|saved| format!("Chart saved as '{}'", saved.title));
        return Ok(notify(&back, outcome)?.into_response());
    }

    let table = state.store.load_current(owner)?;
    let outcome = with_session(&state, &identity, |session| {
        graph::submit(session, kind, &table, &request.form)
    })?
    .map(|()| format!("{} updated", kind.save_title()));
    Ok(notify(&back, outcome)?.into_response())
}

async fn serve_export(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    let saved = match identity.owner() {
        Some(owner) => state.archive.list(owner)?,
        None => Vec::new(),
    };
    let mut charts = Vec::with_capacity(saved.len());
    for chart in &saved {
        charts.push(json!({
            "id": chart.id,
            "title": chart.title,
            "kind": chart.kind,
            "saved_at": chart.saved_at.format("%Y-%m-%d %H:%M").to_string(),
            "html": render::to_html(&chart.chart_spec()?)?,
        }));
    }

    state.page(
        "export",
        &identity,
        json!({
            "title": "Saved charts",
            "notice": query.notice,
            "charts": charts,
            "payload": script_json(&saved)?,
        }),
    )
}

async fn download_svg(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let Some(owner) = identity.owner() else {
        return Ok(Redirect::to(&with_notice("/login", &PlotError::Unauthorized.to_string()))
            .into_response());
    };
    let Some(chart) = state.archive.get(owner, id)? else {
        return Ok((StatusCode::NOT_FOUND, "No such chart").into_response());
    };
    let svg = chart.to_svg()?;
    let filename = format!("{}.svg", safe_name(&chart.title));
    Ok(attachment("image/svg+xml", &filename, svg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_are_url_encoded() {
        assert_eq!(
            with_notice("/data", "Column 'a b' deleted"),
            "/data?notice=Column%20%27a%20b%27%20deleted"
        );
        assert_eq!(with_notice("/data?page=2", "ok"), "/data?page=2&notice=ok");
    }

    #[test]
    fn infrastructure_errors_are_not_notices() {
        assert!(notify("/data", Err(PlotError::EmptyDataset)).is_ok());
        assert!(notify("/data", Err(PlotError::Poisoned("sessions"))).is_err());
    }

    #[test]
    fn first_choice_is_the_default() {
        let c = choices(LABEL_POSITIONS, None);
        assert_eq!(c[0]["selected"], json!(true));
        let c = choices(LABEL_POSITIONS, Some("outside"));
        assert_eq!(c[2]["selected"], json!(true));
        assert_eq!(c[0]["selected"], json!(false));
    }
}
