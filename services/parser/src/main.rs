//! Parser Service - Decodes checklist spreadsheets and reports the dashboard
//!
//! Responsibilities:
//! - Read one or two spreadsheet files (XLSX/XLS via calamine, CSV via csv)
//! - Turn the first sheet into header-keyed rows
//! - Hand the batch to the engine session (roles, merge, facets)
//! - Apply command-line filters and grain
//! - Print the dashboard as text or JSON
//!
//! CRITICAL: This service must be DETERMINISTIC
//! Same files + same filters + same grain = same report

use anyhow::{Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use clap::{Parser, ValueEnum};
use engine::{
    DashboardSnapshot, EngineError, Field, FileItem, Grain, RawRow, Record, Session,
    SessionSettings, SourceFile, StatusMessage,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "parser",
    about = "Merges a checklist extract with a systems list and reports completion"
)]
struct Args {
    /// Checklist data file and systems list (.xlsx, .xls or .csv), in any order
    #[arg(required = true, num_args = 1..=2)]
    files: Vec<PathBuf>,

    /// Time bucket for the Actual date series
    #[arg(long, default_value = "daily")]
    grain: Grain,

    /// Keep only rows where FIELD equals VALUE (repeatable; same field = OR)
    #[arg(long = "filter", value_name = "FIELD=VALUE", value_parser = parse_filter)]
    filters: Vec<(Field, String)>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Include the preview table in text output
    #[arg(long, default_value = "false")]
    preview: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_filter(raw: &str) -> std::result::Result<(Field, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", raw))?;
    let field: Field = field.parse().map_err(|e: EngineError| e.to_string())?;
    Ok((field, value.trim().to_string()))
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format '{}' (expected pretty or json)", other),
        }
    }
}

#[derive(Debug, Clone)]
struct Config {
    preview_rows: usize,
    resp_top_n: usize,
    log_format: LogFormat,
}

impl Config {
    fn from_env() -> Result<Self> {
        let preview_rows = std::env::var("PREVIEW_ROWS")
            .unwrap_or_else(|_| "200".to_string())
            .parse()
            .context("PREVIEW_ROWS must be a non-negative integer")?;
        let resp_top_n = std::env::var("RESP_TOP_N")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("RESP_TOP_N must be a non-negative integer")?;
        let log_format = std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "pretty".to_string())
            .parse()?;

        Ok(Self {
            preview_rows,
            resp_top_n,
            log_format,
        })
    }

    fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            preview_limit: self.preview_rows,
            resp_top_n: self.resp_top_n,
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parser=info,engine=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

// =============================================================================
// SHEET DECODING - first sheet, first row is the header
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetKind {
    Excel,
    Csv,
}

/// Detect the decoder from the file extension
fn sheet_kind(path: &Path) -> Option<SheetKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(SheetKind::Excel),
        "csv" => Some(SheetKind::Csv),
        _ => None,
    }
}

/// Header cells paired with their column index. Blank headers are dropped;
/// repeated headers get a numeric suffix ("Area", "Area_1").
fn unique_headers(cells: &[String]) -> Vec<(usize, String)> {
    let mut used: HashSet<String> = HashSet::new();
    let mut headers = Vec::new();
    for (idx, cell) in cells.iter().enumerate() {
        let base = cell.trim();
        if base.is_empty() {
            continue;
        }
        let mut name = base.to_string();
        let mut n = 0;
        while used.contains(&name) {
            n += 1;
            name = format!("{}_{}", base, n);
        }
        used.insert(name.clone());
        headers.push((idx, name));
    }
    headers
}

/// Build header-keyed rows from a grid of cell texts.
/// Fully blank rows are skipped; short rows are padded with "".
fn rows_from_grid<I>(mut grid: I) -> Vec<RawRow>
where
    I: Iterator<Item = Vec<String>>,
{
    let Some(header_cells) = grid.next() else {
        return Vec::new();
    };
    let headers = unique_headers(&header_cells);

    grid.filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|cells| {
            headers
                .iter()
                .map(|(idx, name)| (name.clone(), cells.get(*idx).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

/// Render one spreadsheet cell as text.
/// Dates become their serial number; the engine converts serials to dates.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        Data::Error(_) => String::new(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        other => format!("{}", other),
    }
}

fn parse_excel(bytes: &[u8]) -> Result<Vec<RawRow>> {
    // calamine auto-detects the container: xls, xlsx, xlsb, ods
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .context("Failed to open workbook")?;

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names.first().context("Workbook has no sheets")?;
    let range = workbook
        .worksheet_range(sheet_name)
        .context("Failed to read sheet")?;

    let (row_count, col_count) = range.get_size();
    info!(sheet = %sheet_name, rows = row_count, cols = col_count, "reading first sheet");

    Ok(rows_from_grid(
        range.rows().map(|row| row.iter().map(cell_text).collect()),
    ))
}

/// UTF-8 (BOM stripped) or, failing that, Windows-1252.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<RawRow>> {
    let content = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for (line_num, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV at line {}", line_num + 1))?;
        grid.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(rows_from_grid(grid.into_iter()))
}

fn decode_sheet(path: &Path, bytes: &[u8]) -> Result<Vec<RawRow>> {
    match sheet_kind(path) {
        Some(SheetKind::Excel) => parse_excel(bytes),
        Some(SheetKind::Csv) => parse_csv(bytes),
        None => anyhow::bail!("unsupported file type (expected .xlsx, .xls or .csv)"),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read and decode one file. Every failure is reported as unparseable.
async fn read_source(path: &Path) -> std::result::Result<SourceFile, EngineError> {
    let name = display_name(path);
    let unparseable = |err: anyhow::Error| EngineError::UnparseableFile {
        name: name.clone(),
        reason: format!("{:#}", err),
    };

    let bytes = fs::read(path)
        .await
        .context("Failed to read file")
        .map_err(unparseable)?;
    info!(file = %name, bytes = bytes.len(), "file read");

    let rows = decode_sheet(path, &bytes).map_err(unparseable)?;
    info!(file = %name, rows = rows.len(), "sheet decoded");
    Ok(SourceFile::new(name, rows))
}

/// Read every file before classification starts; order is kept.
async fn read_sources(paths: &[PathBuf]) -> std::result::Result<Vec<SourceFile>, EngineError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(read_source(path).await?);
    }
    Ok(files)
}

// =============================================================================
// REPORT
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    status: &'a StatusMessage,
    files: Vec<FileItem>,
    active_filters: IndexMap<Field, Vec<String>>,
    dashboard: DashboardSnapshot,
    preview: Vec<&'a Record>,
}

fn build_report(session: &Session) -> Report<'_> {
    Report {
        status: session.status(),
        files: session.file_items(),
        active_filters: session.active_filters().snapshot(),
        dashboard: session.snapshot(),
        preview: session.preview(),
    }
}

fn render_text(session: &Session, show_preview: bool) -> std::result::Result<String, std::fmt::Error> {
    let snap = session.snapshot();
    let mut out = String::new();

    writeln!(out, "=== Checklist Completion ===")?;
    writeln!(out, "Status: {}", session.status().text)?;
    for item in session.file_items() {
        writeln!(out, "{}: {}", item.label, item.name)?;
    }
    writeln!(out, "Rows: {} total, {} after filters", snap.total_rows, snap.filtered_rows)?;
    let distinct: Vec<String> = session
        .facets()
        .iter()
        .map(|(field, values)| format!("{} {}", field, values.len()))
        .collect();
    if !distinct.is_empty() {
        writeln!(out, "Distinct values: {}", distinct.join(", "))?;
    }
    for (field, values) in session.active_filters().snapshot() {
        if !values.is_empty() {
            writeln!(out, "Filter: {} in [{}]", field, values.join(", "))?;
        }
    }

    writeln!(out, "\n--- {} ---", session.dashboard().series_title())?;
    for point in &snap.time_series.points {
        writeln!(out, "  {:<12} {}", point.label, point.count)?;
    }
    if let Some(range) = &snap.time_range {
        writeln!(out, "  {}", range)?;
    }

    writeln!(out, "\n--- Cumulative (Daily) ---")?;
    for point in &snap.cumulative.points {
        writeln!(out, "  {:<12} {}", point.label, point.count)?;
    }

    writeln!(out, "\n--- Status ---")?;
    for entry in &snap.status {
        writeln!(
            out,
            "  {:<20} {:>6} ({:.1}%)",
            engine::filters::display_label(&entry.value),
            entry.count,
            entry.share(snap.filtered_rows)
        )?;
    }

    let resp_title = format!(
        "RespID top {} (Complete / Incomplete)",
        session.settings().resp_top_n
    );
    for (title, entries) in [
        ("Cert Disc (Complete / Incomplete)", &snap.disciplines),
        (resp_title.as_str(), &snap.responsibles),
    ] {
        writeln!(out, "\n--- {} ---", title)?;
        for entry in entries {
            writeln!(
                out,
                "  {:<20} {:>6} / {:<6}",
                entry.value, entry.complete, entry.incomplete
            )?;
        }
    }

    writeln!(out, "\n--- Systems Completion ---")?;
    writeln!(out, "  {}", snap.matrix.headers().join(" | "))?;
    if snap.matrix.is_empty() {
        writeln!(out, "  No data to display.")?;
    }
    for rec in &snap.matrix.records {
        let mut cells = vec![rec.system.clone(), rec.description.clone()];
        cells.extend(snap.matrix.events.iter().map(|e| rec.count(e).to_string()));
        cells.push(rec.actual_count.to_string());
        cells.push(rec.total_sheets.to_string());
        cells.push(rec.percent_label());
        writeln!(out, "  {}", cells.join(" | "))?;
    }

    if show_preview {
        let preview = session.preview();
        writeln!(
            out,
            "\n--- Preview ({} of {}) ---",
            preview.len(),
            snap.filtered_rows
        )?;
        let columns = session.preview_columns();
        writeln!(
            out,
            "  {}",
            columns.iter().map(|f| f.name()).collect::<Vec<_>>().join(" | ")
        )?;
        for row in preview {
            let cells: Vec<&str> = columns.iter().map(|f| row.get(*f)).collect();
            writeln!(out, "  {}", cells.join(" | "))?;
        }
    }

    Ok(out)
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Config::from_env()?;
    init_logging(config.log_format);

    info!(files = args.files.len(), grain = %args.grain, "starting");
    let mut session = Session::new(config.session_settings());
    let settings = session.settings();
    info!(
        preview_limit = settings.preview_limit,
        resp_top_n = settings.resp_top_n,
        "session ready"
    );

    let files = match read_sources(&args.files).await {
        Ok(files) => files,
        Err(err) => return Err(session.report(err).into()),
    };
    session.ingest_batch(files)?;

    for (field, value) in &args.filters {
        session.toggle_filter(*field, value, true);
    }
    if !session.set_grain(args.grain) {
        warn!(grain = %args.grain, "grain not available, using {}", session.grain());
    }

    match args.format {
        OutputFormat::Json => {
            let report = build_report(&session);
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        }
        OutputFormat::Text => {
            let text = render_text(&session, args.preview).context("Failed to render report")?;
            print!("{}", text);
        }
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
