//! Writers for plane records and tile descriptors.

use crate::{Error, Result};
use planetile_core::{RawPlaneRecord, TileRecord};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Appends plane records to a JSON-lines file.
pub struct PlaneRecordWriter<W: Write = BufWriter<File>> {
    writer: W,
    count: usize,
}

impl PlaneRecordWriter {
    /// Creates a new record file, truncating any existing one.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(&path)?;
        log::info!("writing records to {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> PlaneRecordWriter<W> {
    /// Wraps an arbitrary writer.
    pub fn new(writer: W) -> Self {
        Self { writer, count: 0 }
    }

    /// Writes one record.
    ///
    /// # Errors
    /// Returns an error if serialization or the underlying write fails.
    pub fn write(&mut self, record: &RawPlaneRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    /// Number of records written so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Output format for tile descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    /// Metadata only, one row per tile.
    Csv,
    /// One JSON object per tile, pixels included when present.
    JsonLines,
}

impl TileFormat {
    /// Picks the format from a file extension (`csv`, `json`, `jsonl`).
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedFormat`] for any other extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(TileFormat::Csv),
            "json" | "jsonl" | "ndjson" => Ok(TileFormat::JsonLines),
            _ => Err(Error::UnsupportedFormat(ext)),
        }
    }
}

const CSV_HEADER: &str = "name,series,z,c,t,x,y,w,h";

/// Writer for tile descriptors.
pub struct TileRecordWriter<W: Write = BufWriter<File>> {
    writer: W,
    format: TileFormat,
    wrote_header: bool,
}

impl TileRecordWriter {
    /// Creates a file, choosing the format from its extension.
    ///
    /// # Errors
    /// Returns an error if the extension is unknown or the file cannot be
    /// created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let format = TileFormat::from_path(&path)?;
        let file = File::create(&path)?;
        log::info!("writing tiles to {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file), format))
    }
}

impl<W: Write> TileRecordWriter<W> {
    /// Wraps an arbitrary writer.
    pub fn new(writer: W, format: TileFormat) -> Self {
        Self {
            writer,
            format,
            wrote_header: false,
        }
    }

    #[must_use]
    pub fn format(&self) -> TileFormat {
        self.format
    }

    /// Writes a batch of tile descriptors.
    ///
    /// # Errors
    /// Returns an error if serialization or the underlying write fails.
    pub fn write_batch(&mut self, records: &[TileRecord]) -> Result<()> {
        match self.format {
            TileFormat::Csv => {
                if !self.wrote_header {
                    writeln!(self.writer, "{CSV_HEADER}")?;
                    self.wrote_header = true;
                }
                for r in records {
                    writeln!(
                        self.writer,
                        "{},{},{},{},{},{},{},{},{}",
                        csv_field(&r.name),
                        r.series,
                        r.z,
                        r.c,
                        r.t,
                        r.x,
                        r.y,
                        r.w,
                        r.h
                    )?;
                }
            }
            TileFormat::JsonLines => {
                for r in records {
                    serde_json::to_writer(&mut self.writer, r)?;
                    self.writer.write_all(b"\n")?;
                }
            }
        }
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Quotes a CSV field if it contains a separator, quote or newline.
fn csv_field(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\"")).into()
    } else {
        value.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlaneRecordReader;
    use planetile_core::RawArraySlice;
    use tempfile::NamedTempFile;

    fn tile(name: &str, x: usize, pixels: Option<Vec<f64>>) -> TileRecord {
        TileRecord {
            name: name.into(),
            series: 1,
            z: 2,
            c: 3,
            t: 4,
            x,
            y: 0,
            w: 2,
            h: 1,
            pixels,
        }
    }

    #[test]
    fn test_write_tiles_csv() {
        let mut writer = TileRecordWriter::new(Vec::new(), TileFormat::Csv);
        writer.write_batch(&[tile("img", 0, None)]).unwrap();
        writer.write_batch(&[tile("a,b", 2, None)]).unwrap();
        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![CSV_HEADER, "img,1,2,3,4,0,0,2,1", "\"a,b\",1,2,3,4,2,0,2,1"]
        );
    }

    #[test]
    fn test_write_tiles_json_lines() {
        let mut writer = TileRecordWriter::new(Vec::new(), TileFormat::JsonLines);
        writer
            .write_batch(&[tile("img", 0, Some(vec![1.0, 2.5])), tile("img", 2, None)])
            .unwrap();
        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: TileRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.pixels, Some(vec![1.0, 2.5]));
        assert!(!lines[1].contains("pixels"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TileFormat::from_path("out.CSV").unwrap(), TileFormat::Csv);
        assert_eq!(
            TileFormat::from_path("out.jsonl").unwrap(),
            TileFormat::JsonLines
        );
        assert!(matches!(
            TileFormat::from_path("out.bin"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_plane_records_round_trip_through_file() {
        let file = NamedTempFile::new().unwrap();
        let pixels = ndarray::ArrayD::from_elem(ndarray::IxDyn(&[2, 2, 1, 1, 1]), 7u16);
        let record = RawPlaneRecord {
            name: "img".into(),
            dimension_order: "XYZCT".into(),
            series: 0,
            pixel_data: RawArraySlice::encode_whole(&pixels.into(), false).unwrap(),
        };

        let mut writer = PlaneRecordWriter::create(file.path()).unwrap();
        writer.write(&record).unwrap();
        writer.write(&record).unwrap();
        assert_eq!(writer.count(), 2);
        writer.finish().unwrap();

        let reader = PlaneRecordReader::open(file.path()).unwrap();
        assert_eq!(reader.read_all().unwrap(), vec![record.clone(), record]);
    }
}
