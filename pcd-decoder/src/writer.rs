/// PCD encoding of decoded clouds
use crate::decoder::DecodedPointCloud;
use crate::header::DataMode;
use crate::lzf;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Encode `cloud` as a PCD v0.7 file with float32 `x y z [intensity]` fields.
pub fn encode(cloud: &DecodedPointCloud, mode: DataMode) -> Vec<u8> {
    let with_intensity = cloud.has_intensity();
    let points = cloud.len();
    let mut out = header_text(points, with_intensity, mode).into_bytes();

    match mode {
        DataMode::Ascii => {
            for i in 0..points {
                let p = &cloud.positions[i * 3..i * 3 + 3];
                let line = if with_intensity {
                    format!("{} {} {} {}\n", p[0], p[1], p[2], cloud.intensity[i])
                } else {
                    format!("{} {} {}\n", p[0], p[1], p[2])
                };
                out.extend_from_slice(line.as_bytes());
            }
        }
        DataMode::Binary => {
            for i in 0..points {
                for v in &cloud.positions[i * 3..i * 3 + 3] {
                    out.extend_from_slice(&v.to_le_bytes());
                }
                if with_intensity {
                    out.extend_from_slice(&cloud.intensity[i].to_le_bytes());
                }
            }
        }
        DataMode::BinaryCompressed => {
            let raw = structure_of_arrays(cloud, with_intensity);
            let packed = lzf::compress(&raw);
            out.extend_from_slice(&(packed.len() as u32).to_le_bytes());
            out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
            out.extend_from_slice(&packed);
        }
    }
    out
}

/// Write `cloud` to `path` in the given payload mode.
pub fn write_pcd_file(
    path: impl AsRef<Path>,
    cloud: &DecodedPointCloud,
    mode: DataMode,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&encode(cloud, mode))?;
    writer.flush()
}

fn header_text(points: usize, with_intensity: bool, mode: DataMode) -> String {
    let (fields, size, kind, count) = if with_intensity {
        ("x y z intensity", "4 4 4 4", "F F F F", "1 1 1 1")
    } else {
        ("x y z", "4 4 4", "F F F", "1 1 1")
    };
    format!(
        "# .PCD v0.7 - Point Cloud Data file format\n\
         VERSION 0.7\n\
         FIELDS {fields}\n\
         SIZE {size}\n\
         TYPE {kind}\n\
         COUNT {count}\n\
         WIDTH {points}\n\
         HEIGHT 1\n\
         VIEWPOINT 0 0 0 1 0 0 0\n\
         POINTS {points}\n\
         DATA {}\n",
        mode.as_str()
    )
}

fn structure_of_arrays(cloud: &DecodedPointCloud, with_intensity: bool) -> Vec<u8> {
    let points = cloud.len();
    let fields = if with_intensity { 4 } else { 3 };
    let mut raw = Vec::with_capacity(points * fields * 4);
    for axis in 0..3 {
        for i in 0..points {
            raw.extend_from_slice(&cloud.positions[i * 3 + axis].to_le_bytes());
        }
    }
    if with_intensity {
        for v in &cloud.intensity {
            raw.extend_from_slice(&v.to_le_bytes());
        }
    }
    raw
}
