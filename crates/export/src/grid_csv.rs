//! CSV export of a cache's sample grid.

use std::io::Write;

use eph_cache::SampleGrid;
use serde::Serialize;

use crate::PersistError;

#[derive(Debug, Serialize)]
struct Row {
    epoch: f64,
    x: f64,
    y: f64,
    z: f64,
    vx: f64,
    vy: f64,
    vz: f64,
}

/// Write one `epoch,x,y,z,vx,vy,vz` row per grid point, with a header.
pub fn write_grid<W: Write>(writer: W, grid: &SampleGrid) -> Result<(), PersistError> {
    let mut csv = csv::Writer::from_writer(writer);
    for (epoch, state) in grid.iter() {
        let [x, y, z] = state.position;
        let [vx, vy, vz] = state.velocity;
        csv.serialize(Row {
            epoch,
            x,
            y,
            z,
            vx,
            vy,
            vz,
        })?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eph_cache::CacheBuilder;
    use eph_source::UniformMotion;

    #[test]
    fn rows_follow_grid_order() {
        let cache = CacheBuilder::new(0.0, 2.0)
            .samples(2)
            .build(&UniformMotion::new(0.0, [1.0, 0.0, 0.0], [0.5, 0.0, -1.0]))
            .unwrap()
            .cache;
        let mut out = Vec::new();
        write_grid(&mut out, cache.grid()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "epoch,x,y,z,vx,vy,vz");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "1.0,1.5,0.0,-1.0,0.5,0.0,-1.0");
    }
}
