//! Value summaries of tile descriptor sets.
//!
//! A [`TileSummary`] collects the distinct values of every identifying
//! field of a tile descriptor file. Runs of three or more consecutive
//! integers are shown as `first-last`.

use std::collections::BTreeSet;
use std::fmt;

use crate::tiles::TileRecord;

/// Integer fields, in the order they are reported.
const INT_KEYS: [&str; 8] = ["series", "z", "c", "t", "w", "h", "x", "y"];

/// Distinct field values seen across a set of tile descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileSummary {
    tiles: usize,
    names: BTreeSet<String>,
    ints: [BTreeSet<usize>; 8],
}

impl TileSummary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one descriptor.
    pub fn add(&mut self, record: &TileRecord) {
        self.tiles += 1;
        if !self.names.contains(&record.name) {
            self.names.insert(record.name.clone());
        }
        let series = usize::try_from(record.series).unwrap_or(usize::MAX);
        let values = [
            series, record.z, record.c, record.t, record.w, record.h, record.x, record.y,
        ];
        for (set, value) in self.ints.iter_mut().zip(values) {
            set.insert(value);
        }
    }

    /// Number of descriptors added.
    #[must_use]
    pub fn tiles(&self) -> usize {
        self.tiles
    }

    /// Distinct image names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Distinct values of an integer field (`series`, `z`, `c`, `t`, `w`,
    /// `h`, `x` or `y`), or `None` for any other key.
    #[must_use]
    pub fn values(&self, key: &str) -> Option<&BTreeSet<usize>> {
        INT_KEYS
            .iter()
            .position(|&k| k == key)
            .map(|i| &self.ints[i])
    }
}

impl Extend<TileRecord> for TileSummary {
    fn extend<I: IntoIterator<Item = TileRecord>>(&mut self, iter: I) {
        for record in iter {
            self.add(&record);
        }
    }
}

impl<'a> Extend<&'a TileRecord> for TileSummary {
    fn extend<I: IntoIterator<Item = &'a TileRecord>>(&mut self, iter: I) {
        for record in iter {
            self.add(record);
        }
    }
}

impl FromIterator<TileRecord> for TileSummary {
    fn from_iter<I: IntoIterator<Item = TileRecord>>(iter: I) -> Self {
        let mut summary = Self::new();
        summary.extend(iter);
        summary
    }
}

/// `a-b` for three or more consecutive values, a comma list otherwise.
fn format_values(values: &BTreeSet<usize>) -> String {
    if let (Some(&first), Some(&last)) = (values.first(), values.last()) {
        if values.len() > 2 && last - first + 1 == values.len() {
            return format!("{first}-{last}");
        }
    }
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for TileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tiles: {}", self.tiles)?;
        writeln!(f, "name: {}", self.names().collect::<Vec<_>>().join(", "))?;
        for (key, values) in INT_KEYS.iter().zip(&self.ints) {
            writeln!(f, "{key}: {}", format_values(values))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(name: &str, z: usize, x: usize, y: usize) -> TileRecord {
        TileRecord {
            name: name.into(),
            series: 0,
            z,
            c: 1,
            t: 0,
            x,
            y,
            w: 2,
            h: 2,
            pixels: None,
        }
    }

    #[test]
    fn test_ranges_and_lists() {
        let mut records = Vec::new();
        for z in 0..4 {
            for (x, y) in [(0, 0), (2, 0), (0, 2), (2, 2)] {
                records.push(tile(if z < 2 { "b" } else { "a" }, z, x, y));
            }
        }
        let summary: TileSummary = records.into_iter().collect();
        assert_eq!(summary.tiles(), 16);
        assert_eq!(summary.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            summary.to_string(),
            "tiles: 16\nname: a, b\nseries: 0\nz: 0-3\nc: 1\nt: 0\nw: 2\nh: 2\nx: 0, 2\ny: 0, 2\n"
        );
    }

    #[test]
    fn test_two_consecutive_values_are_listed() {
        let mut summary = TileSummary::new();
        summary.extend(&[tile("a", 4, 0, 0), tile("a", 5, 0, 0)]);
        assert_eq!(format_values(summary.values("z").unwrap()), "4, 5");
        summary.add(&tile("a", 6, 0, 0));
        assert_eq!(format_values(summary.values("z").unwrap()), "4-6");
        assert!(summary.values("name").is_none());
    }

    #[test]
    fn test_empty_summary() {
        let summary = TileSummary::new();
        assert!(summary.to_string().starts_with("tiles: 0\nname: \nseries: \n"));
    }
}
