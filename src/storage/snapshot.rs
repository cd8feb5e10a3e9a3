//! Compact bincode snapshots of trained maps.
//!
//! A snapshot holds the creation flags, the strategy statistics and the
//! grid. It is smaller and much faster to load than the text format but is
//! only readable by this crate.

use crate::error::{Result, SomError};
use crate::som::SelfOrganizingMap;
use crate::vector::VectorStrategy;
use log::debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic prefix of snapshot files.
const MAGIC: &[u8; 4] = b"CSOM";

/// Writes `map` to `path`.
pub fn save_snapshot<S: VectorStrategy, P: AsRef<Path>>(path: P, map: &SelfOrganizingMap<S>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    writer.write_all(MAGIC)?;
    bincode::serialize_into(&mut writer, map)?;
    writer.flush()?;
    debug!(
        "Wrote {}x{} snapshot to {}",
        map.width(),
        map.height(),
        path.as_ref().display()
    );
    Ok(())
}

/// Reads a snapshot written by [`save_snapshot`].
pub fn load_snapshot<S: VectorStrategy, P: AsRef<Path>>(path: P) -> Result<SelfOrganizingMap<S>> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|_| SomError::format("snapshot too short"))?;
    if &magic != MAGIC {
        return Err(SomError::format("not a map snapshot"));
    }

    let map: SelfOrganizingMap<S> = bincode::deserialize_from(&mut reader)?;
    map.validate()?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CreationMode, Neighborhood, Topology};
    use crate::som::Grid;
    use crate::vector::{BinaryStrategy, BitVector, RealStrategy};
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.bin");

        let mode = CreationMode {
            neighborhood: Neighborhood::Gaussian,
            topology: Topology::Toroidal,
            grow: false,
            fast_best_match: true,
        };
        let grid = Grid::from_fn(4, 2, Topology::Toroidal, |x, y| BitVector::from_keys(&[x * 2 + y], 70));
        let map = SelfOrganizingMap::new(mode, BinaryStrategy::new(70), grid);

        save_snapshot(&path, &map).unwrap();
        let loaded: SelfOrganizingMap<BinaryStrategy> = load_snapshot(&path).unwrap();
        assert_eq!(loaded.grid(), map.grid());
        assert_eq!(loaded.mode(), mode);
    }

    #[test]
    fn test_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.som");
        std::fs::write(&path, "<width=\"2\">\n").unwrap();
        let result: Result<SelfOrganizingMap<RealStrategy>> = load_snapshot(&path);
        assert!(matches!(result, Err(SomError::InvalidFormat(_))));
    }
}
