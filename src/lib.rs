/*!
# Plotter

A browser-based application for tidying up CSV data and charting it, built in Rust.

## Overview

Each user works on one current dataset: the newest CSV file they uploaded. The
dataset can be paged through, cleaned, edited cell by cell, summarized and drawn
as bar, box, histogram, line, pie or scatter charts. Charts the user likes can be
saved; a saved chart keeps its data and is redrawn identically later.

## Architecture

### Storage Layer
- **Tabular Store** - One current dataset per user, CSV files on disk and their
  upload records in SQLite
- **Saved Chart Archive** - Finalized chart specs per user, in SQLite
- **Session State** - Per-user derived state (table view, last chart options and
  rendered charts), persisted with Gzip compression and bincode serialization

### Core Layer
- **Table Snapshot** - Typed in-memory table with a synthesized `Index` column
- **Mutation Operations** - Clean, delete column, delete row, edit cell, replace
  value and clear, each invalidating the derived session state
- **Chart Builders** - One generic builder driven by a per-kind table, rendering
  SVG with plotters
- **Describe** - Summary statistics per column
- **Frames** - Polars series over snapshot columns for null masks, distinct
  counts and statistics

### Web Layer
- **Technologies**: Rust, axum, handlebars
- Cookie sessions, Argon2 password hashes, server-rendered pages

## Modules

- **cell**: Cell values and column type inference
- **table**: Table snapshots and their pure transformations
- **frame**: Polars views of snapshot columns
- **loader**: CSV parsing into snapshots
- **downloader**: Export functionality (CSV, XLSX)
- **db**: SQLite schema and connection
- **store**: The per-user current dataset
- **view**: Display formatting and pagination
- **session**: Per-user session state
- **saving**: Session snapshot persistence with compression
- **ops**: Mutation operations
- **graph**: Chart options, specs and rendering
- **archive**: Saved charts
- **describe**: Summary statistics
- **login**: User registration and session management
- **pages**: HTML templates
- **config**: Command-line and environment configuration
- **app**: Routing and handlers

## Routes

- `/data` - View, page through and edit the current dataset
- `/data/download.csv`, `/data/download.xlsx` - Export the current dataset
- `/describe` - Summary statistics
- `/chart/{kind}` - Draw and save a chart
- `/export` - Saved charts, `/export/{id}/svg` to download one
*/

pub mod archive;
pub mod cell;
pub mod db;
pub mod describe;
pub mod downloader;
pub mod error;
pub mod frame;
pub mod graph;
pub mod loader;
pub mod ops;
pub mod saving;
pub mod session;
pub mod store;
pub mod table;
pub mod view;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod pages;

pub use cell::{CellValue, DType};
pub use error::{PlotError, PlotResult};
pub use graph::{ChartKind, ChartSpec};
pub use session::SessionState;
pub use table::TableSnapshot;
