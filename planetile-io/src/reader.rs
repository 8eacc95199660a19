//! Memory-mapped record readers.
//!
//! Plane records are stored one JSON object per line, each matching
//! [`RawPlaneRecord`]. Tile descriptor files are read back in the format
//! [`crate::TileRecordWriter`] produced them in. Blank lines are ignored.

use crate::{Error, Result, TileFormat};
use memmap2::Mmap;
use planetile_core::{RawPlaneRecord, TileRecord};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Read-only memory map over a record file.
///
/// Backs [`PlaneRecordReader`] and [`TileRecordReader`]; records are
/// parsed straight from the mapped bytes, one line at a time.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Maps a record file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: record files are only read while mapped. Truncating one
        // from another process during a run is not supported.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// The mapped file contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was mapped from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Non-blank lines of a byte buffer with their 1-based line numbers.
struct Lines<'a> {
    rest: &'a [u8],
    line: usize,
}

impl<'a> Lines<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            rest: bytes,
            line: 0,
        }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = (usize, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let end = self
                .rest
                .iter()
                .position(|&b| b == b'\n')
                .unwrap_or(self.rest.len());
            let line = &self.rest[..end];
            self.rest = self.rest.get(end + 1..).unwrap_or_default();
            self.line += 1;
            if !line.iter().all(u8::is_ascii_whitespace) {
                return Some((self.line, line));
            }
        }
        None
    }
}

/// Reader for JSON-lines files of plane records.
pub struct PlaneRecordReader {
    reader: MappedFileReader,
}

impl PlaneRecordReader {
    /// Opens a record file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        log::info!(
            "opened {} ({} bytes)",
            reader.path().display(),
            reader.len()
        );
        Ok(Self { reader })
    }

    /// Path of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// File size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Lazily parses records in file order.
    #[must_use]
    pub fn records(&self) -> PlaneRecords<'_> {
        PlaneRecords {
            lines: Lines::new(self.reader.as_bytes()),
        }
    }

    /// Parses every record into memory.
    ///
    /// # Errors
    /// Returns the first parse error.
    pub fn read_all(&self) -> Result<Vec<RawPlaneRecord>> {
        self.records().collect()
    }
}

/// Iterator over the records of a [`PlaneRecordReader`].
pub struct PlaneRecords<'a> {
    lines: Lines<'a>,
}

impl Iterator for PlaneRecords<'_> {
    type Item = Result<RawPlaneRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let (line, bytes) = self.lines.next()?;
        Some(serde_json::from_slice(bytes).map_err(|source| Error::InvalidRecord { line, source }))
    }
}

/// Reader for tile descriptor files (CSV or JSON lines).
pub struct TileRecordReader {
    reader: MappedFileReader,
    format: TileFormat,
}

impl TileRecordReader {
    /// Opens a tile file, choosing the format from its extension.
    ///
    /// # Errors
    /// Returns an error if the extension is unknown or the file cannot be
    /// opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let format = TileFormat::from_path(&path)?;
        let reader = MappedFileReader::open(path)?;
        log::info!(
            "opened {} ({:?}, {} bytes)",
            reader.path().display(),
            format,
            reader.len()
        );
        Ok(Self { reader, format })
    }

    #[must_use]
    pub fn format(&self) -> TileFormat {
        self.format
    }

    /// Lazily parses tile descriptors in file order. CSV rows never carry
    /// pixels.
    #[must_use]
    pub fn records(&self) -> TileRecords<'_> {
        TileRecords {
            lines: Lines::new(self.reader.as_bytes()),
            format: self.format,
            header: None,
        }
    }
}

/// Iterator over the descriptors of a [`TileRecordReader`].
pub struct TileRecords<'a> {
    lines: Lines<'a>,
    format: TileFormat,
    header: Option<Vec<String>>,
}

impl Iterator for TileRecords<'_> {
    type Item = Result<TileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (line, bytes) = self.lines.next()?;
            match self.format {
                TileFormat::JsonLines => {
                    return Some(
                        serde_json::from_slice(bytes)
                            .map_err(|source| Error::InvalidRecord { line, source }),
                    );
                }
                TileFormat::Csv => {
                    let fields = match std::str::from_utf8(bytes) {
                        Ok(text) => split_csv(text.trim_end_matches('\r')),
                        Err(_) => {
                            return Some(Err(Error::InvalidTileRow {
                                line,
                                reason: "not valid UTF-8".into(),
                            }))
                        }
                    };
                    if let Some(header) = &self.header {
                        return Some(parse_tile_row(header, &fields, line));
                    }
                    self.header = Some(fields);
                }
            }
        }
    }
}

/// Splits one CSV line, honouring double-quoted fields with `""` escapes.
fn split_csv(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}

fn parse_tile_row(header: &[String], fields: &[String], line: usize) -> Result<TileRecord> {
    if fields.len() != header.len() {
        return Err(Error::InvalidTileRow {
            line,
            reason: format!("expected {} fields, got {}", header.len(), fields.len()),
        });
    }
    let field = |name: &str| -> Result<&str> {
        header
            .iter()
            .position(|h| h == name)
            .map(|i| fields[i].as_str())
            .ok_or_else(|| Error::InvalidTileRow {
                line,
                reason: format!("missing column {name:?}"),
            })
    };
    let number = |name: &str| -> Result<usize> {
        let value = field(name)?;
        value.trim().parse().map_err(|_| Error::InvalidTileRow {
            line,
            reason: format!("{name}: {value:?} is not a non-negative integer"),
        })
    };
    let series = u32::try_from(number("series")?).map_err(|_| Error::InvalidTileRow {
        line,
        reason: "series out of range".into(),
    })?;
    Ok(TileRecord {
        name: field("name")?.to_string(),
        series,
        z: number("z")?,
        c: number("c")?,
        t: number("t")?,
        x: number("x")?,
        y: number("y")?,
        w: number("w")?,
        h: number("h")?,
        pixels: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TileRecordWriter;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    const RECORD: &str = r#"{"name":"a","dimension_order":"XYZCT","series":0,"pixel_data":{"shape":[2,1,1,1,1],"offsets":[0,0,0,0,0],"deltas":[2,1,1,1,1],"dtype":"UINT8","little_endian":true,"data":[1,2]}}"#;

    #[test]
    fn test_read_records_skips_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{RECORD}").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{}", RECORD.replace("\"a\"", "\"b\"")).unwrap();
        file.flush().unwrap();

        let reader = PlaneRecordReader::open(file.path()).unwrap();
        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "a");
        assert_eq!(records[1].name, "b");
        assert_eq!(records[1].pixel_data.data, vec![1, 2]);
    }

    #[test]
    fn test_invalid_line_reports_line_number() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{RECORD}").unwrap();
        writeln!(file, "{{not json").unwrap();
        file.flush().unwrap();

        let reader = PlaneRecordReader::open(file.path()).unwrap();
        let results: Vec<_> = reader.records().collect();
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(Error::InvalidRecord { line: 2, .. })
        ));
    }

    #[test]
    fn test_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let reader = PlaneRecordReader::open(file.path()).unwrap();
        assert_eq!(reader.file_size(), 0);
        assert_eq!(reader.records().count(), 0);
    }

    #[test]
    fn test_split_csv_quotes() {
        assert_eq!(split_csv("a,b,,c"), vec!["a", "b", "", "c"]);
        assert_eq!(
            split_csv(r#""x,y",1,"say ""hi""""#),
            vec!["x,y", "1", r#"say "hi""#]
        );
    }

    fn tile(name: &str, x: usize) -> TileRecord {
        TileRecord {
            name: name.into(),
            series: 1,
            z: 2,
            c: 3,
            t: 4,
            x,
            y: 5,
            w: 6,
            h: 7,
            pixels: None,
        }
    }

    #[test]
    fn test_tiles_read_back_in_written_format() {
        let tiles = vec![tile("img", 0), tile("a,\"b\"", 6)];
        for suffix in [".csv", ".jsonl"] {
            let file = Builder::new().suffix(suffix).tempfile().unwrap();
            let mut writer = TileRecordWriter::create(file.path()).unwrap();
            writer.write_batch(&tiles).unwrap();
            writer.finish().unwrap();

            let reader = TileRecordReader::open(file.path()).unwrap();
            let read: Vec<TileRecord> = reader.records().collect::<Result<_>>().unwrap();
            assert_eq!(read, tiles, "{suffix}");
        }
    }

    #[test]
    fn test_bad_csv_row() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "name,series,z,c,t,x,y,w,h").unwrap();
        writeln!(file, "img,0,0,0,0,0,0,2,2").unwrap();
        writeln!(file, "img,0,0,0,0,-1,0,2,2").unwrap();
        writeln!(file, "img,0,0").unwrap();
        file.flush().unwrap();

        let reader = TileRecordReader::open(file.path()).unwrap();
        let results: Vec<_> = reader.records().collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(Error::InvalidTileRow { line: 3, .. })
        ));
        assert!(matches!(
            results[2],
            Err(Error::InvalidTileRow { line: 4, .. })
        ));
    }
}
