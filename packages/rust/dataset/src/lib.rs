//! Service dataset loading.
//!
//! The dataset is a table with `Category ID`, `Service ID` and
//! `Question Funnel` columns, supplied as a spreadsheet (read with
//! `calamine`) or a CSV file. It is read once at startup; rows that cannot
//! take part in matching are skipped with a warning rather than failing
//! the whole load.

mod parser;

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use servicefunnel_shared::{Result, ServiceFunnelError, ServiceRecord};
use tracing::{debug, info, instrument, warn};

/// Header of the category column.
pub const CATEGORY_COLUMN: &str = "Category ID";

/// Header of the service id column.
pub const SERVICE_COLUMN: &str = "Service ID";

/// Header of the funnel column.
pub const FUNNEL_COLUMN: &str = "Question Funnel";

/// Spreadsheet extensions handed to calamine.
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How to read the dataset file.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Worksheet name for spreadsheets. `None` reads the first sheet.
    pub sheet: Option<String>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Load every usable service record from `path`, in file order.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_dataset(path: &Path, opts: &LoadOptions) -> Result<Vec<ServiceRecord>> {
    if !path.is_file() {
        return Err(ServiceFunnelError::dataset(format!(
            "dataset file not found: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = if extension == "csv" {
        read_csv(path)?
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        read_spreadsheet(path, opts.sheet.as_deref())?
    } else {
        return Err(ServiceFunnelError::dataset(format!(
            "unsupported dataset format '.{extension}' (expected .xlsx, .xls, .ods or .csv)"
        )));
    };

    let MappedRows {
        records,
        skipped_lines,
    } = records_from_rows(rows)?;

    let mut categories: Vec<&str> = records.iter().map(|r| r.category_id.as_str()).collect();
    categories.sort_unstable();
    categories.dedup();
    info!(
        records = records.len(),
        categories = categories.len(),
        skipped = skipped_lines.len(),
        "service dataset loaded"
    );

    Ok(records)
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// One row of the source file with the line it was read from (1-based).
#[derive(Debug, Clone)]
struct SourceRow {
    line: usize,
    cells: Vec<String>,
}

/// Read all rows of a worksheet as strings (header row included).
fn read_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<Vec<SourceRow>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        ServiceFunnelError::dataset(format!("failed to open {}: {e}", path.display()))
    })?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ServiceFunnelError::dataset("workbook has no sheets"))?,
    };
    debug!(sheet = %sheet_name, "reading worksheet");

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
        ServiceFunnelError::dataset(format!("failed to read sheet '{sheet_name}': {e}"))
    })?;

    // The range begins at the first used cell, not at A1.
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    Ok(range
        .rows()
        .enumerate()
        .map(|(offset, row)| SourceRow {
            line: first_row + offset + 1,
            cells: row.iter().map(cell_to_string).collect(),
        })
        .collect())
}

/// Read all rows of a CSV file as strings (header row included).
fn read_csv(path: &Path) -> Result<Vec<SourceRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            ServiceFunnelError::dataset(format!("failed to open {}: {e}", path.display()))
        })?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            ServiceFunnelError::dataset(format!("failed to read {}: {e}", path.display()))
        })?;
        // Blank lines are dropped by the reader, so the index alone drifts.
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);
        rows.push(SourceRow {
            line,
            cells: record.iter().map(|c| c.trim().to_string()).collect(),
        });
    }
    Ok(rows)
}

/// Render a spreadsheet cell the way it reads on screen.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Whole numbers are ids, not measurements.
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) | Data::DurationIso(_) => cell.to_string(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Row → record mapping
// ---------------------------------------------------------------------------

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    category: usize,
    service: usize,
    funnel: usize,
}

impl Columns {
    fn from_header(header: &[String]) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| {
                    h.trim_start_matches('\u{feff}')
                        .trim()
                        .eq_ignore_ascii_case(name)
                })
                .ok_or_else(|| ServiceFunnelError::dataset(format!("missing column '{name}'")))
        };

        Ok(Self {
            category: find(CATEGORY_COLUMN)?,
            service: find(SERVICE_COLUMN)?,
            funnel: find(FUNNEL_COLUMN)?,
        })
    }
}

/// Records mapped from a table, plus the source lines that were dropped.
#[derive(Debug)]
struct MappedRows {
    records: Vec<ServiceRecord>,
    skipped_lines: Vec<usize>,
}

/// Turn raw string rows (first row is the header) into service records.
fn records_from_rows(rows: Vec<SourceRow>) -> Result<MappedRows> {
    let mut rows = rows.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| ServiceFunnelError::dataset("dataset is empty (no header row)"))?;
    let cols = Columns::from_header(&header.cells)?;

    let mut records = Vec::new();
    let mut skipped_lines = Vec::new();

    for SourceRow { line, cells } in rows {
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let cell = |col: usize| cells.get(col).map(|c| c.trim()).unwrap_or_default();
        let category_id = cell(cols.category);
        let service_id = cell(cols.service);

        if category_id.is_empty() || service_id.is_empty() {
            warn!(line, "skipping row without category or service id");
            skipped_lines.push(line);
            continue;
        }

        let funnel = match parser::parse_funnel(cell(cols.funnel)) {
            Ok(funnel) => funnel,
            Err(e) => {
                warn!(line, %service_id, error = %e, "skipping row with unusable funnel");
                skipped_lines.push(line);
                continue;
            }
        };

        records.push(ServiceRecord {
            category_id: category_id.to_string(),
            service_id: service_id.to_string(),
            funnel,
        });
    }

    if records.is_empty() {
        return Err(ServiceFunnelError::dataset(format!(
            "no usable service records ({} row(s) skipped)",
            skipped_lines.len()
        )));
    }
    if !skipped_lines.is_empty() {
        warn!(lines = ?skipped_lines, "some dataset rows were skipped");
    }

    Ok(MappedRows {
        records,
        skipped_lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<SourceRow> {
        data.iter()
            .enumerate()
            .map(|(idx, r)| SourceRow {
                line: idx + 1,
                cells: r.iter().map(|c| c.to_string()).collect(),
            })
            .collect()
    }

    /// A per-test file under the temp dir, removed on drop.
    struct TempFile(std::path::PathBuf);

    impl TempFile {
        fn new(name: &str) -> Self {
            Self(std::env::temp_dir().join(format!(
                "servicefunnel-{}-{name}",
                std::process::id()
            )))
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn maps_rows_by_header_name() {
        let records = records_from_rows(rows(&[
            &["Service ID", "Question Funnel", "Category ID", "Notes"],
            &["S-1", "Type > Repair | Material > Wood", "1", "first"],
            &["S-2", "Type > Install", "1", ""],
        ]))
        .unwrap()
        .records;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category_id, "1");
        assert_eq!(records[0].service_id, "S-1");
        assert_eq!(records[0].funnel.len(), 2);
        assert_eq!(records[1].funnel.pairs()[0].answer, "Install");
    }

    #[test]
    fn header_match_ignores_case_and_bom() {
        let records = records_from_rows(rows(&[
            &["\u{feff}category id", " SERVICE ID ", "question funnel"],
            &["7", "S-7", "Type > Repair"],
        ]))
        .unwrap()
        .records;
        assert_eq!(records[0].category_id, "7");
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = records_from_rows(rows(&[
            &["Category ID", "Question Funnel"],
            &["1", "Type > Repair"],
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("missing column 'Service ID'"));
    }

    #[test]
    fn empty_dataset_is_an_error() {
        assert!(records_from_rows(Vec::new()).is_err());
        let err = records_from_rows(rows(&[&["Category ID", "Service ID", "Question Funnel"]]))
            .unwrap_err();
        assert!(err.to_string().contains("no usable service records"));
    }

    #[test]
    fn unusable_rows_are_skipped() {
        let mapped = records_from_rows(rows(&[
            &["Category ID", "Service ID", "Question Funnel"],
            &["", "", ""],
            &["1", "", "Type > Repair"],
            &["1", "S-2", ""],
            &["1", "S-3", "Type"],
            &["1", "S-4", "Type > Repair"],
            &["2"],
        ]))
        .unwrap();

        assert_eq!(mapped.records.len(), 1);
        assert_eq!(mapped.records[0].service_id, "S-4");
        // Blank row 2 is ignored silently; the rest are reported by line.
        assert_eq!(mapped.skipped_lines, [3, 4, 5, 7]);
    }

    #[test]
    fn csv_lines_survive_blank_lines() {
        let file = TempFile::new("blank-lines.csv");
        std::fs::write(
            &file.0,
            "Category ID,Service ID,Question Funnel\n\n1,S-1,Type > Repair\n\n1,,Type > Install\n",
        )
        .unwrap();

        let rows = read_csv(&file.0).unwrap();
        let lines: Vec<usize> = rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, [1, 3, 5]);

        let mapped = records_from_rows(rows).unwrap();
        assert_eq!(mapped.records.len(), 1);
        assert_eq!(mapped.skipped_lines, [5]);
    }

    fn write_workbook(path: &Path) -> std::result::Result<(), rust_xlsxwriter::XlsxError> {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();

        // Header on row 3: two empty rows above it.
        let services = workbook.add_worksheet();
        services.set_name("Services")?;
        services.write_string(2, 0, "Category ID")?;
        services.write_string(2, 1, "Service ID")?;
        services.write_string(2, 2, "Question Funnel")?;
        services.write_string(3, 0, "1")?;
        services.write_string(3, 1, "S-1")?;
        services.write_string(3, 2, "Type > Repair | Material > Wood")?;
        services.write_string(4, 0, "1")?;
        services.write_string(4, 1, "S-2")?;
        services.write_string(4, 2, "Type")?;

        let numeric = workbook.add_worksheet();
        numeric.set_name("Numeric")?;
        numeric.write_string(0, 0, "Category ID")?;
        numeric.write_string(0, 1, "Service ID")?;
        numeric.write_string(0, 2, "Question Funnel")?;
        numeric.write_number(1, 0, 7.0)?;
        numeric.write_number(1, 1, 100.0)?;
        numeric.write_string(1, 2, "Type > Install")?;

        workbook.save(path)
    }

    #[test]
    fn loads_first_sheet_of_workbook_by_default() {
        let file = TempFile::new("default-sheet.xlsx");
        write_workbook(&file.0).unwrap();

        let records = load_dataset(&file.0, &LoadOptions::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].service_id, "S-1");
        assert_eq!(records[0].funnel.to_string(), "Type > Repair | Material > Wood");
    }

    #[test]
    fn workbook_lines_follow_sheet_rows() {
        let file = TempFile::new("sheet-lines.xlsx");
        write_workbook(&file.0).unwrap();

        let rows = read_spreadsheet(&file.0, None).unwrap();
        assert_eq!(rows[0].line, 3);

        let mapped = records_from_rows(rows).unwrap();
        assert_eq!(mapped.skipped_lines, [5]);
    }

    #[test]
    fn named_sheet_renders_numeric_ids_as_text() {
        let file = TempFile::new("named-sheet.xlsx");
        write_workbook(&file.0).unwrap();

        let opts = LoadOptions {
            sheet: Some("Numeric".to_string()),
        };
        let records = load_dataset(&file.0, &opts).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category_id, "7");
        assert_eq!(records[0].service_id, "100");
    }

    #[test]
    fn unknown_sheet_is_an_error() {
        let file = TempFile::new("unknown-sheet.xlsx");
        write_workbook(&file.0).unwrap();

        let opts = LoadOptions {
            sheet: Some("Missing".to_string()),
        };
        let err = load_dataset(&file.0, &opts).unwrap_err();
        assert!(err.to_string().contains("failed to read sheet 'Missing'"));
    }

    #[test]
    fn spreadsheet_cells_render_as_text() {
        assert_eq!(cell_to_string(&Data::Float(7.0)), "7");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Int(12)), "12");
        assert_eq!(cell_to_string(&Data::String("  Wood ".into())), "Wood");
        assert_eq!(cell_to_string(&Data::Bool(true)), "true");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn loads_csv_fixture() {
        let path = Path::new("../../../fixtures/datasets/services.csv");
        let records = load_dataset(path, &LoadOptions::default()).expect("load fixture");
        assert_eq!(records.len(), 6);
        assert_eq!(records[0].category_id, "1");
        assert_eq!(records[0].funnel.to_string(), "Type > Repair | Material > Wood");
    }

    #[test]
    fn rejects_unknown_extension() {
        let path = Path::new("../../../fixtures/datasets/README.md");
        let err = load_dataset(path, &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unsupported dataset format"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_dataset(Path::new("does/not/exist.xlsx"), &LoadOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
