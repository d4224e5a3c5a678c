use crate::error::ExportError;
use crate::types::ExportRecord;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// `DD-MM-YYYY-HH-MM-SS`, used for derived session ids and completion stamps.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y-%H-%M-%S";

pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

fn is_completion_stamp(text: &str) -> bool {
    chrono::NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).is_ok()
}

/// File locations owned by one export session.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    emails_dir: PathBuf,
    session_id: String,
}

impl SessionPaths {
    pub fn new(emails_dir: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            emails_dir: emails_dir.into(),
            session_id: session_id.into(),
        }
    }

    pub fn in_progress(&self) -> PathBuf {
        self.emails_dir
            .join(format!("email_{}.csv", self.session_id))
    }

    pub fn completed(&self, finished_at: &str) -> PathBuf {
        self.emails_dir
            .join(format!("email_{}_{}.csv", self.session_id, finished_at))
    }

    /// Most recently modified completed export for this session, if any.
    pub fn find_completed(&self) -> Result<Option<PathBuf>, ExportError> {
        let prefix = format!("email_{}_", self.session_id);
        let entries = match fs::read_dir(&self.emails_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ExportError::output(&self.emails_dir, e)),
        };

        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(|e| ExportError::output(&self.emails_dir, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // The rest must be a bare stamp, or the file belongs to a session sharing our prefix
            let is_ours = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".csv"))
                .is_some_and(is_completion_stamp);
            if !is_ours {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| ExportError::output(entry.path(), e))?;
            if newest.as_ref().map_or(true, |(seen, _)| modified > *seen) {
                newest = Some((modified, entry.path()));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}

// Quote a CSV cell when it contains a delimiter, quote, or line break (RFC 4180)
pub fn csv_escape(value: &str) -> String {
    let needs_quotes = value.contains(',')
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');
    if !needs_quotes {
        return value.to_string();
    }
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_line(cells: &[String]) -> String {
    cells
        .iter()
        .map(|cell| csv_escape(cell))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn header_line() -> String {
    let columns: Vec<String> = ExportRecord::COLUMNS.iter().map(|c| c.to_string()).collect();
    csv_line(&columns)
}

/// Append `records` to the CSV at `path`, writing the header first when the
/// file does not exist yet. Returns the number of rows written.
pub fn append_records(path: &Path, records: &[ExportRecord]) -> Result<usize, ExportError> {
    let is_new = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ExportError::output(path, e))?;
    let mut writer = BufWriter::new(file);

    let result = (|| -> std::io::Result<()> {
        if is_new {
            writeln!(writer, "{}", header_line())?;
        }
        for record in records {
            writeln!(writer, "{}", csv_line(&record.to_row()))?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    })();
    result.map_err(|e| ExportError::output(path, e))?;

    Ok(records.len())
}

/// Write a header-only CSV, used when a session finishes without any rows.
pub fn write_empty(path: &Path) -> Result<(), ExportError> {
    let mut file = File::create(path).map_err(|e| ExportError::output(path, e))?;
    writeln!(file, "{}", header_line()).map_err(|e| ExportError::output(path, e))
}

// Split CSV text into records, keeping line breaks that sit inside quotes
pub fn split_records(content: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in content.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => {
                let record = content[start..i].trim_end_matches('\r');
                if !record.is_empty() {
                    records.push(record);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = content[start..].trim_end_matches('\r');
    if !tail.is_empty() {
        records.push(tail);
    }
    records
}

/// Concatenate finished exports into one CSV with a single header.
///
/// Every input must share the header of the first one. Returns the number of
/// data rows written.
pub fn combine_csv_files(inputs: &[PathBuf], output: &Path) -> Result<usize, ExportError> {
    // (header line, file it came from)
    let mut header: Option<(String, PathBuf)> = None;
    let mut rows: Vec<String> = Vec::new();

    for input in inputs {
        let content = fs::read_to_string(input).map_err(|e| ExportError::output(input, e))?;
        let mut records = split_records(&content).into_iter();
        let Some(file_header) = records.next() else {
            tracing::warn!("Skipping empty file {}", input.display());
            continue;
        };

        if let Some((expected, first)) = &header {
            if expected != file_header {
                return Err(ExportError::HeaderMismatch {
                    path: input.clone(),
                    expected: first.clone(),
                });
            }
        } else {
            header = Some((file_header.to_string(), input.clone()));
        }
        rows.extend(records.map(str::to_string));
    }

    let mut writer = BufWriter::new(File::create(output).map_err(|e| ExportError::output(output, e))?);
    let result = (|| -> std::io::Result<()> {
        if let Some((header, _)) = &header {
            writeln!(writer, "{}", header)?;
        }
        for row in &rows {
            writeln!(writer, "{}", row)?;
        }
        writer.flush()
    })();
    result.map_err(|e| ExportError::output(output, e))?;

    tracing::info!(
        "Combined {} files into {} ({} rows)",
        inputs.len(),
        output.display(),
        rows.len()
    );
    Ok(rows.len())
}
