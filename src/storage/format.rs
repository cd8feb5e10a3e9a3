//! Line-oriented text format for trained maps.
//!
//! ## Layout
//!
//! One tag per line, read back in exactly the order it was written:
//!
//! ```text
//! <width="16">
//! <height="16">
//! <creationMode="4">
//! <parameterCount="3">            strategy statistics, see below
//! <mean="0.5\t1.25\t-3.0">
//! <stddev="1.0\t0.5\t2.0">
//! <reference[0][0]="...">         y outer, x inner
//! <reference[1][0]="...">
//! ...
//! ```
//!
//! Binary maps carry `keyCount` and `keyFrequency` instead of the real
//! statistics. `creationMode` packs the neighbourhood shape into bits 0-1
//! and the toroidal, grow and fast-match flags into 4, 8 and 16.

use crate::config::CreationMode;
use crate::error::{Result, SomError};
use crate::som::{Grid, SelfOrganizingMap};
use crate::vector::VectorStrategy;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Writes `<key="value">` lines.
pub struct TagWriter<W: Write> {
    inner: W,
}

impl<W: Write> TagWriter<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes one tag line.
    pub fn write_tag(&mut self, key: &str, value: impl Display) -> Result<()> {
        writeln!(self.inner, "<{}=\"{}\">", key, value)?;
        Ok(())
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads `<key="value">` lines in a fixed order.
pub struct TagReader<R: BufRead> {
    inner: R,
    line: String,
    line_number: usize,
}

impl<R: BufRead> TagReader<R> {
    /// Wraps a buffered reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: String::new(),
            line_number: 0,
        }
    }

    /// Reads the next tag, which must be named `key`, and returns its value.
    pub fn read_tag(&mut self, key: &str) -> Result<String> {
        self.line.clear();
        self.line_number += 1;
        if self.inner.read_line(&mut self.line)? == 0 {
            return Err(SomError::format(format!(
                "unexpected end of file at line {}, expected <{}=",
                self.line_number, key
            )));
        }

        let line = self.line.trim_end_matches(['\r', '\n']);
        line.strip_prefix('<')
            .and_then(|rest| rest.strip_prefix(key))
            .and_then(|rest| rest.strip_prefix("=\""))
            .and_then(|rest| rest.strip_suffix("\">"))
            .map(str::to_string)
            .ok_or_else(|| {
                SomError::format(format!(
                    "line {}: expected <{}=\"...\">, found {:?}",
                    self.line_number,
                    key,
                    truncate(line, 40)
                ))
            })
    }

    /// Reads the next tag and parses its value.
    pub fn read_parsed<T: FromStr>(&mut self, key: &str) -> Result<T> {
        let value = self.read_tag(key)?;
        value
            .parse()
            .map_err(|_| SomError::format(format!("line {}: cannot parse {}={:?}", self.line_number, key, value)))
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Joins numbers with tabs; values read back bit-exact.
pub fn format_list(values: &[f64]) -> String {
    values.iter().map(|v| format!("{v:?}")).collect::<Vec<_>>().join("\t")
}

/// Parses a tab- or comma-separated list of numbers.
pub fn parse_list(text: &str) -> Result<Vec<f64>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(['\t', ','])
        .map(|item| {
            item.trim()
                .parse::<f64>()
                .map_err(|e| SomError::format(format!("bad number {:?}: {}", item, e)))
        })
        .collect()
}

/// Reader and writer for the text map format.
pub struct SomFormat;

impl SomFormat {
    /// Writes `map` to `path`.
    pub fn write<S: VectorStrategy, P: AsRef<Path>>(path: P, map: &SelfOrganizingMap<S>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        Self::write_to(&mut writer, map)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes `map` to any writer.
    pub fn write_to<S: VectorStrategy, W: Write>(writer: W, map: &SelfOrganizingMap<S>) -> Result<()> {
        let mut tags = TagWriter::new(writer);
        let grid = map.grid();

        tags.write_tag("width", grid.width())?;
        tags.write_tag("height", grid.height())?;
        tags.write_tag("creationMode", map.mode().to_bits())?;
        map.strategy().write_statistics(&mut tags)?;

        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let key = format!("reference[{x}][{y}]");
                tags.write_tag(&key, map.strategy().serialize_vector(grid.reference(x, y)))?;
            }
        }
        Ok(())
    }

    /// Reads a map from `path`.
    pub fn read<S: VectorStrategy, P: AsRef<Path>>(path: P) -> Result<SelfOrganizingMap<S>> {
        let file = File::open(path.as_ref())?;
        Self::read_from(BufReader::new(file))
    }

    /// Reads a map from any buffered reader.
    pub fn read_from<S: VectorStrategy, R: BufRead>(reader: R) -> Result<SelfOrganizingMap<S>> {
        let mut tags = TagReader::new(reader);

        let width: usize = tags.read_parsed("width")?;
        let height: usize = tags.read_parsed("height")?;
        let mode = CreationMode::from_bits(tags.read_parsed("creationMode")?)?;
        if width == 0 || height == 0 {
            return Err(SomError::format(format!("empty grid {width}x{height}")));
        }

        if width.checked_mul(height).is_none() {
            return Err(SomError::format(format!("grid {width}x{height} is too large")));
        }

        let strategy = S::read_statistics(&mut tags)?;

        // Header sizes are untrusted; cells grow as they are parsed.
        let mut cells = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let key = format!("reference[{x}][{y}]");
                let vector = strategy.deserialize_vector(&tags.read_tag(&key)?)?;
                strategy.check_dimension(&vector)?;
                cells.push(vector);
            }
        }

        let grid = Grid::from_cells(width, height, mode.topology, cells)?;
        Ok(SelfOrganizingMap::new(mode, strategy, grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Neighborhood, Topology};
    use crate::vector::{BinaryStrategy, BitVector, RealStrategy};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn real_map() -> SelfOrganizingMap<RealStrategy> {
        let mode = CreationMode {
            neighborhood: Neighborhood::MexicanHat,
            topology: Topology::Toroidal,
            grow: true,
            fast_best_match: false,
        };
        let grid = Grid::from_fn(3, 2, Topology::Toroidal, |x, y| vec![x as f64 * 0.1, -(y as f64) / 3.0]);
        SelfOrganizingMap::new(mode, RealStrategy::new(2), grid)
    }

    #[test]
    fn test_tag_reader() {
        let mut reader = TagReader::new(Cursor::new("<width=\"12\">\n<name=\"a b\">\n"));
        assert_eq!(reader.read_parsed::<usize>("width").unwrap(), 12);
        assert_eq!(reader.read_tag("name").unwrap(), "a b");
        assert!(reader.read_tag("height").is_err());
    }

    #[test]
    fn test_list_formats() {
        assert_eq!(parse_list("1.5,2\t-3").unwrap(), vec![1.5, 2.0, -3.0]);
        assert!(parse_list("").unwrap().is_empty());
        assert!(parse_list("1.0\tx").is_err());
        assert_eq!(format_list(&[1.0, 0.25]), "1.0\t0.25");
    }

    #[test]
    fn test_layout() {
        let mut buffer = Vec::new();
        SomFormat::write_to(&mut buffer, &real_map()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "<width=\"3\">");
        assert_eq!(lines[1], "<height=\"2\">");
        assert_eq!(lines[2], "<creationMode=\"13\">");
        assert_eq!(lines[3], "<parameterCount=\"2\">");
        assert!(lines[6].starts_with("<reference[0][0]="));
        assert!(lines[7].starts_with("<reference[1][0]="));
        assert!(lines[9].starts_with("<reference[0][1]="));
        assert_eq!(lines.len(), 6 + 6);
    }

    #[test]
    fn test_real_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("real.som");
        let map = real_map();

        SomFormat::write(&path, &map).unwrap();
        let loaded: SelfOrganizingMap<RealStrategy> = SomFormat::read(&path).unwrap();

        assert_eq!(loaded.mode(), map.mode());
        assert_eq!(loaded.grid(), map.grid());
        assert_eq!(loaded.strategy().stddev(), map.strategy().stddev());
    }

    #[test]
    fn test_binary_roundtrip() {
        let mode = CreationMode {
            neighborhood: Neighborhood::Linear,
            topology: Topology::Bounded,
            grow: false,
            fast_best_match: true,
        };
        let grid = Grid::from_fn(2, 2, Topology::Bounded, |x, y| BitVector::from_keys(&[x, 10 + y, 39], 40));
        let map = SelfOrganizingMap::new(mode, BinaryStrategy::new(40), grid);

        let mut buffer = Vec::new();
        SomFormat::write_to(&mut buffer, &map).unwrap();
        let loaded: SelfOrganizingMap<BinaryStrategy> = SomFormat::read_from(Cursor::new(buffer)).unwrap();

        assert_eq!(loaded.grid(), map.grid());
        assert_eq!(loaded.mode().to_bits(), 2 | 16);
    }

    #[test]
    fn test_bad_header() {
        let result: Result<SelfOrganizingMap<RealStrategy>> =
            SomFormat::read_from(Cursor::new("<height=\"3\">\n"));
        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("Invalid SOM file format"));
    }

    #[test]
    fn test_truncated_file() {
        let mut buffer = Vec::new();
        SomFormat::write_to(&mut buffer, &real_map()).unwrap();
        buffer.truncate(buffer.len() - 30);
        let result: Result<SelfOrganizingMap<RealStrategy>> = SomFormat::read_from(Cursor::new(buffer));
        assert!(matches!(result, Err(SomError::InvalidFormat(_))));
    }

    #[test]
    fn test_oversized_header_is_format_error() {
        let mut buffer = Vec::new();
        SomFormat::write_to(&mut buffer, &real_map()).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let huge = 1usize << 40;
        let overflowing = text
            .replacen("<width=\"3\">", &format!("<width=\"{huge}\">"), 1)
            .replacen("<height=\"2\">", &format!("<height=\"{huge}\">"), 1);
        let result: Result<SelfOrganizingMap<RealStrategy>> = SomFormat::read_from(Cursor::new(overflowing));
        assert!(matches!(result, Err(SomError::InvalidFormat(_))));

        let wide = text.replacen("<width=\"3\">", &format!("<width=\"{huge}\">"), 1);
        let result: Result<SelfOrganizingMap<RealStrategy>> = SomFormat::read_from(Cursor::new(wide));
        assert!(matches!(result, Err(SomError::InvalidFormat(_))));
    }

    #[test]
    fn test_wrong_strategy() {
        let mut buffer = Vec::new();
        SomFormat::write_to(&mut buffer, &real_map()).unwrap();
        let result: Result<SelfOrganizingMap<BinaryStrategy>> = SomFormat::read_from(Cursor::new(buffer));
        assert!(result.is_err());
    }
}
