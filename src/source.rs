//! Restartable record source over a delimited telemetry export.
//!
//! Every call to [`RecordSource::records`] starts a fresh pass. In
//! [`ReplayMode::Stream`] the file is reopened and parsed again; in
//! [`ReplayMode::Cached`] the rows are parsed once when the source is opened
//! and each pass walks an independent cursor over the shared copy.
//!
//! Input is read one physical line at a time and each line is one record, so
//! a blank line is a row with a single empty field, not something to skip.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord};
use flate2::bufread::GzDecoder;
use tracing::{debug, info};

use crate::error::{MalformedReason, ScanError};

/// Structural sanity check applied to every row, header included.
pub const MIN_FIELDS: usize = 18;

/// How repeated passes obtain their rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReplayMode {
    /// Reopen and re-parse the input on every pass.
    Stream,
    /// Parse once, replay from memory.
    #[default]
    Cached,
}

#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub delimiter: u8,
    /// Field names to use instead of the first line. Empty means the first
    /// line of the input is the header. Held to the same `min_fields` check
    /// as a header read from the input.
    pub header: Vec<String>,
    pub min_fields: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            header: Vec::new(),
            min_fields: MIN_FIELDS,
        }
    }
}

/// Ordered field names with a name → position lookup.
#[derive(Debug, PartialEq)]
pub struct Header {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Header {
    pub fn new(names: Vec<String>) -> Self {
        // a repeated name resolves to its last position
        let positions = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { names, positions }
    }

    fn from_record(record: &StringRecord) -> Self {
        Self::new(record.iter().map(str::to_string).collect())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One parsed data row, addressed by header field name. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Record {
    line: u64,
    header: Arc<Header>,
    values: Arc<StringRecord>,
}

impl Record {
    /// Builds a row from values in header order.
    pub fn from_fields<I, T>(line: u64, header: Arc<Header>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            line,
            header,
            values: Arc::new(values.into_iter().collect()),
        }
    }

    /// Value of the named field, or `None` if the header lacks the name or
    /// the row stops short of its position.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.header
            .position(name)
            .and_then(|i| self.values.get(i))
    }

    /// 1-based line in the input this row came from.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

#[derive(Debug)]
enum Backing {
    Stream,
    Cached {
        rows: Arc<[Record]>,
        failure: Option<(u64, MalformedReason)>,
    },
}

/// Source of [`Record`]s that can be traversed any number of times.
#[derive(Debug)]
pub struct RecordSource {
    path: PathBuf,
    options: SourceOptions,
    backing: Backing,
}

impl RecordSource {
    /// Opens `path`. In cached mode the whole input is parsed here; a
    /// structural row failure is remembered and replayed at the same point of
    /// every pass, while read failures are returned immediately.
    #[tracing::instrument(skip(path, options), fields(path = %path.as_ref().display()))]
    pub fn open(
        path: impl AsRef<Path>,
        options: SourceOptions,
        mode: ReplayMode,
    ) -> Result<Self, ScanError> {
        let path = path.as_ref().to_path_buf();

        if !options.header.is_empty() && options.header.len() < options.min_fields {
            return Err(ScanError::ExplicitHeader(MalformedReason::TooFewFields {
                required: options.min_fields,
                found: options.header.len(),
            }));
        }

        let backing = match mode {
            ReplayMode::Stream => {
                // fail early on a missing file rather than inside every worker
                File::open(&path)?;
                Backing::Stream
            }
            ReplayMode::Cached => {
                let mut rows = Vec::new();
                let mut failure = None;
                for row in Records::stream(&path, &options)? {
                    match row {
                        Ok(record) => rows.push(record),
                        Err(ScanError::MalformedRow { line, reason }) => {
                            failure = Some((line, reason));
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
                info!(rows = rows.len(), failed = failure.is_some(), "Input cached");
                Backing::Cached {
                    rows: rows.into(),
                    failure,
                }
            }
        };

        Ok(Self {
            path,
            options,
            backing,
        })
    }

    /// Starts a new pass from the first data row.
    pub fn records(&self) -> Result<Records, ScanError> {
        match &self.backing {
            Backing::Stream => Records::stream(&self.path, &self.options),
            Backing::Cached { rows, failure } => Ok(Records {
                inner: Inner::Cached {
                    rows: Arc::clone(rows),
                    pos: 0,
                    failure: failure.clone(),
                },
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> ReplayMode {
        match self.backing {
            Backing::Stream => ReplayMode::Stream,
            Backing::Cached { .. } => ReplayMode::Cached,
        }
    }
}

/// A single pass over the input. Stops after the first error.
pub struct Records {
    inner: Inner,
}

enum Inner {
    Stream {
        input: Box<dyn BufRead + Send>,
        buf: String,
        line: u64,
        delimiter: u8,
        header: Option<Arc<Header>>,
        min_fields: usize,
        done: bool,
    },
    Cached {
        rows: Arc<[Record]>,
        pos: usize,
        failure: Option<(u64, MalformedReason)>,
    },
}

impl Records {
    fn stream(path: &Path, options: &SourceOptions) -> Result<Self, ScanError> {
        let input = open_input(path)?;

        let header = if options.header.is_empty() {
            None
        } else {
            Some(Arc::new(Header::new(options.header.clone())))
        };

        Ok(Self {
            inner: Inner::Stream {
                input,
                buf: String::new(),
                line: 0,
                delimiter: options.delimiter,
                header,
                min_fields: options.min_fields,
                done: false,
            },
        })
    }
}

impl Iterator for Records {
    type Item = Result<Record, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Stream {
                input,
                buf,
                line,
                delimiter,
                header,
                min_fields,
                done,
            } => loop {
                if *done {
                    return None;
                }

                buf.clear();
                match input.read_line(buf) {
                    Ok(0) => {
                        *done = true;
                        return None;
                    }
                    Ok(_) => *line += 1,
                    Err(e) => {
                        *done = true;
                        return Some(Err(e.into()));
                    }
                }

                let raw = match split_line(buf.trim_end_matches(['\n', '\r']), *delimiter) {
                    Ok(raw) => raw,
                    Err(e) => {
                        *done = true;
                        return Some(Err(e.into()));
                    }
                };
                let line = *line;

                if raw.len() < *min_fields {
                    *done = true;
                    return Some(Err(ScanError::MalformedRow {
                        line,
                        reason: MalformedReason::TooFewFields {
                            required: *min_fields,
                            found: raw.len(),
                        },
                    }));
                }

                if let Some(known) = header.as_ref() {
                    return Some(Ok(Record {
                        line,
                        header: Arc::clone(known),
                        values: Arc::new(raw),
                    }));
                }

                let parsed = Header::from_record(&raw);
                debug!(fields = parsed.len(), "Header read");
                *header = Some(Arc::new(parsed));
            },
            Inner::Cached { rows, pos, failure } => {
                if let Some(record) = rows.get(*pos) {
                    *pos += 1;
                    return Some(Ok(record.clone()));
                }
                failure
                    .take()
                    .map(|(line, reason)| Err(ScanError::MalformedRow { line, reason }))
            }
        }
    }
}

/// Splits one line into fields. An empty line is a single empty field.
fn split_line(text: &str, delimiter: u8) -> Result<StringRecord, csv::Error> {
    let mut record = StringRecord::new();
    if text.is_empty() {
        record.push_field("");
        return Ok(record);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .buffer_capacity(text.len() + 1)
        .from_reader(text.as_bytes());
    reader.read_record(&mut record)?;
    Ok(record)
}

/// Opens the input, decompressing `.gz` files transparently.
fn open_input(path: &Path) -> std::io::Result<Box<dyn BufRead + Send>> {
    let file = BufReader::new(File::open(path)?);
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    /// Builds a comma-separated line padded to [`MIN_FIELDS`] columns.
    fn line(values: &[&str]) -> String {
        let mut fields: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        while fields.len() < MIN_FIELDS {
            fields.push(format!("pad{}", fields.len()));
        }
        fields.join(",")
    }

    fn write_input(lines: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for l in lines {
            writeln!(file, "{l}").unwrap();
        }
        file
    }

    fn sample() -> Vec<String> {
        vec![
            line(&["car_number", "distance_m"]),
            line(&["A1", "10.5"]),
            line(&["B2", "3"]),
        ]
    }

    #[test]
    fn test_first_line_becomes_header() {
        let file = write_input(&sample());
        let source =
            RecordSource::open(file.path(), SourceOptions::default(), ReplayMode::Stream).unwrap();

        let rows: Vec<Record> = source.records().unwrap().map(Result::unwrap).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("car_number"), Some("A1"));
        assert_eq!(rows[0].get("distance_m"), Some("10.5"));
        assert_eq!(rows[1].get("car_number"), Some("B2"));
        assert_eq!(rows[1].line(), 3);
        assert_eq!(rows[0].get("no_such_field"), None);
    }

    #[test]
    fn test_passes_are_restartable_in_both_modes() {
        let file = write_input(&sample());
        for mode in [ReplayMode::Stream, ReplayMode::Cached] {
            let source = RecordSource::open(file.path(), SourceOptions::default(), mode).unwrap();
            assert_eq!(source.mode(), mode);
            let first: Vec<_> = source
                .records()
                .unwrap()
                .map(|r| r.unwrap().get("car_number").unwrap().to_string())
                .collect();
            let second: Vec<_> = source
                .records()
                .unwrap()
                .map(|r| r.unwrap().get("car_number").unwrap().to_string())
                .collect();
            assert_eq!(first, vec!["A1", "B2"]);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_short_row_fails_pass() {
        let mut lines = sample();
        lines.insert(2, "C3,1,2".to_string());
        let file = write_input(&lines);
        let source =
            RecordSource::open(file.path(), SourceOptions::default(), ReplayMode::Stream).unwrap();

        let results: Vec<_> = source.records().unwrap().collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(ScanError::MalformedRow { line, reason }) => {
                assert_eq!(*line, 3);
                assert_eq!(
                    *reason,
                    MalformedReason::TooFewFields {
                        required: MIN_FIELDS,
                        found: 3
                    }
                );
            }
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn test_cached_mode_replays_failure_at_same_point() {
        let mut lines = sample();
        lines.push("short,row".to_string());
        let file = write_input(&lines);
        let source =
            RecordSource::open(file.path(), SourceOptions::default(), ReplayMode::Cached).unwrap();

        for _ in 0..2 {
            let results: Vec<_> = source.records().unwrap().collect();
            assert_eq!(results.len(), 3);
            assert!(matches!(
                results[2],
                Err(ScanError::MalformedRow { line: 4, .. })
            ));
        }
    }

    #[test]
    fn test_short_header_is_malformed() {
        let file = write_input(&["car_number,distance_m".to_string()]);
        let source =
            RecordSource::open(file.path(), SourceOptions::default(), ReplayMode::Stream).unwrap();

        let first = source.records().unwrap().next().unwrap();
        assert!(matches!(first, Err(ScanError::MalformedRow { line: 1, .. })));
    }

    #[test]
    fn test_explicit_header_treats_first_line_as_data() {
        let file = write_input(&[line(&["A1", "1"]), line(&["A1", "2"])]);
        let options = SourceOptions {
            header: line(&["car_number", "distance_m"])
                .split(',')
                .map(String::from)
                .collect(),
            ..SourceOptions::default()
        };
        let source = RecordSource::open(file.path(), options, ReplayMode::Cached).unwrap();

        let distances: Vec<_> = source
            .records()
            .unwrap()
            .map(|r| r.unwrap().get("distance_m").unwrap().to_string())
            .collect();

        assert_eq!(distances, vec!["1", "2"]);
    }

    #[test]
    fn test_short_explicit_header_fails_open() {
        let file = write_input(&sample());
        let options = SourceOptions {
            header: vec!["car_number".into(), "distance_m".into()],
            ..SourceOptions::default()
        };
        for mode in [ReplayMode::Stream, ReplayMode::Cached] {
            match RecordSource::open(file.path(), options.clone(), mode) {
                Err(ScanError::ExplicitHeader(reason)) => assert_eq!(
                    reason,
                    MalformedReason::TooFewFields {
                        required: MIN_FIELDS,
                        found: 2
                    }
                ),
                other => panic!("expected explicit header failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_blank_line_is_a_short_row_in_both_modes() {
        let mut lines = sample();
        lines.insert(2, String::new());
        let file = write_input(&lines);

        for mode in [ReplayMode::Stream, ReplayMode::Cached] {
            let source = RecordSource::open(file.path(), SourceOptions::default(), mode).unwrap();
            let results: Vec<_> = source.records().unwrap().collect();

            assert_eq!(results.len(), 2, "{mode:?}");
            assert_eq!(results[0].as_ref().unwrap().line(), 2);
            match &results[1] {
                Err(ScanError::MalformedRow { line, reason }) => {
                    assert_eq!(*line, 3);
                    assert_eq!(
                        *reason,
                        MalformedReason::TooFewFields {
                            required: MIN_FIELDS,
                            found: 1
                        }
                    );
                }
                other => panic!("expected malformed row, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_line_numbers_count_physical_lines() {
        let lines = [
            line(&["car_number", "note"]),
            line(&["A1", "\"quoted, with comma\""]),
            line(&["B2", "plain"]),
        ];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for l in &lines {
            write!(file, "{l}\r\n").unwrap();
        }

        let source =
            RecordSource::open(file.path(), SourceOptions::default(), ReplayMode::Stream).unwrap();
        let rows: Vec<Record> = source.records().unwrap().map(Result::unwrap).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("note"), Some("quoted, with comma"));
        assert_eq!(rows[1].line(), 3);
        assert_eq!(rows[1].get("pad17"), Some("pad17"));
    }

    #[test]
    fn test_row_shorter_than_header_leaves_trailing_fields_absent() {
        let mut header = line(&["car_number"]);
        header.push_str(",trailing");
        let file = write_input(&[header, line(&["A1"])]);
        let source =
            RecordSource::open(file.path(), SourceOptions::default(), ReplayMode::Stream).unwrap();

        let row = source.records().unwrap().next().unwrap().unwrap();

        assert_eq!(row.header().len(), MIN_FIELDS + 1);
        assert_eq!(row.get("car_number"), Some("A1"));
        assert_eq!(row.get("trailing"), None);
    }

    #[test]
    fn test_custom_delimiter() {
        let lines: Vec<String> = sample().iter().map(|l| l.replace(',', ";")).collect();
        let file = write_input(&lines);
        let options = SourceOptions {
            delimiter: b';',
            ..SourceOptions::default()
        };
        let source = RecordSource::open(file.path(), options, ReplayMode::Stream).unwrap();

        assert_eq!(source.records().unwrap().count(), 2);
    }

    #[test]
    fn test_gzip_input_is_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        for l in sample() {
            writeln!(encoder, "{l}").unwrap();
        }
        encoder.finish().unwrap();

        let source =
            RecordSource::open(&path, SourceOptions::default(), ReplayMode::Cached).unwrap();

        assert_eq!(source.records().unwrap().count(), 2);
    }

    #[test]
    fn test_missing_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.csv");
        for mode in [ReplayMode::Stream, ReplayMode::Cached] {
            assert!(matches!(
                RecordSource::open(&missing, SourceOptions::default(), mode),
                Err(ScanError::Io(_))
            ));
        }
    }

    #[test]
    fn test_header_only_input_is_empty() {
        let file = write_input(&sample()[..1]);
        let source =
            RecordSource::open(file.path(), SourceOptions::default(), ReplayMode::Cached).unwrap();
        assert_eq!(source.records().unwrap().count(), 0);
    }
}
