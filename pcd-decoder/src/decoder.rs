/// PCD payload decoding into flat position/intensity arrays
use crate::error::{DecodeError, Result};
use crate::header::{DataMode, FieldKind, FieldLayout, PcdHeader, parse_header};
use crate::lzf;
use crate::ranges::{RangeTracker, Ranges};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decoded point cloud, immutable once produced.
///
/// `positions` holds `3 * len()` floats (x, y, z per point). `intensity` is either
/// empty or holds exactly one value per point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedPointCloud {
    pub positions: Vec<f32>,
    pub intensity: Vec<f32>,
    pub ranges: Ranges,
}

impl DecodedPointCloud {
    /// Build a cloud from raw arrays, computing ranges.
    pub fn from_points(positions: Vec<f32>, intensity: Vec<f32>) -> Self {
        let mut tracker = RangeTracker::new();
        for p in positions.chunks_exact(3) {
            tracker.update_position(p[0], p[1], p[2]);
        }
        for &v in &intensity {
            tracker.update_intensity(v);
        }
        Self {
            positions,
            intensity,
            ranges: tracker.finish(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn has_intensity(&self) -> bool {
        !self.intensity.is_empty()
    }

    pub fn position(&self, index: usize) -> Option<[f32; 3]> {
        let p = self.positions.get(index * 3..index * 3 + 3)?;
        Some([p[0], p[1], p[2]])
    }
}

/// Fields the decoder reads, with their resolved element readers.
struct Consumed<'h> {
    x: (&'h FieldLayout, FieldKind),
    y: (&'h FieldLayout, FieldKind),
    z: (&'h FieldLayout, FieldKind),
    intensity: Option<(&'h FieldLayout, FieldKind)>,
}

impl<'h> Consumed<'h> {
    fn resolve(header: &'h PcdHeader) -> Result<Self> {
        let required = |name: &'static str| -> Result<(&'h FieldLayout, FieldKind)> {
            let field = header
                .field(name)
                .ok_or(DecodeError::MissingHeader("x/y/z in FIELDS"))?;
            Ok((field, field.reader()?))
        };
        let intensity = match header.field("intensity") {
            Some(field) => Some((field, field.reader()?)),
            None => None,
        };
        Ok(Self {
            x: required("x")?,
            y: required("y")?,
            z: required("z")?,
            intensity,
        })
    }
}

/// Decode a complete `.pcd` file.
pub fn decode(bytes: &[u8]) -> Result<DecodedPointCloud> {
    let header = parse_header(bytes)?;
    let consumed = Consumed::resolve(&header)?;
    let payload = &bytes[header.header_len..];

    debug!(
        "Decoding {} points ({}, row size {})",
        header.points,
        header.data.as_str(),
        header.row_size
    );

    match header.data {
        DataMode::Ascii => decode_ascii(payload, &header, &consumed),
        DataMode::Binary => {
            let need = payload_size(&header)?;
            if payload.len() < need {
                return Err(DecodeError::corrupt(format!(
                    "binary payload is {} bytes, {} points need {}",
                    payload.len(),
                    header.points,
                    need
                )));
            }
            let row_size = header.row_size;
            decode_binary(payload, header.points, &consumed, |field, i| {
                i * row_size + field.byte_offset
            })
        }
        DataMode::BinaryCompressed => {
            let (compressed, decompressed_size) = compressed_block(payload)?;
            let need = payload_size(&header)?;
            let data = lzf::decompress(compressed, decompressed_size)?;
            if data.len() < need {
                return Err(DecodeError::corrupt(format!(
                    "decompressed payload is {} bytes, {} points need {}",
                    data.len(),
                    header.points,
                    need
                )));
            }
            // Structure of arrays: each field occupies one contiguous block.
            let points = header.points;
            decode_binary(&data, points, &consumed, |field, i| {
                points * field.byte_offset + field.stride() * i
            })
        }
    }
}

/// Bytes the declared points occupy. Once the payload is known to hold this many,
/// every per-field offset below it is in range.
fn payload_size(header: &PcdHeader) -> Result<usize> {
    header.points.checked_mul(header.row_size).ok_or_else(|| {
        DecodeError::corrupt(format!(
            "{} points of {} bytes overflow the addressable size",
            header.points, header.row_size
        ))
    })
}

fn compressed_block(payload: &[u8]) -> Result<(&[u8], usize)> {
    let sizes = payload
        .get(..8)
        .ok_or_else(|| DecodeError::corrupt("binary_compressed payload lacks size header"))?;
    let compressed_size = u32::from_le_bytes([sizes[0], sizes[1], sizes[2], sizes[3]]) as usize;
    let decompressed_size = u32::from_le_bytes([sizes[4], sizes[5], sizes[6], sizes[7]]) as usize;
    let end = compressed_size
        .checked_add(8)
        .ok_or_else(|| DecodeError::corrupt("compressed block size overflows"))?;
    let compressed = payload.get(8..end).ok_or_else(|| {
        DecodeError::corrupt(format!(
            "compressed block declares {} bytes, only {} present",
            compressed_size,
            payload.len() - 8
        ))
    })?;
    Ok((compressed, decompressed_size))
}

fn decode_binary(
    data: &[u8],
    points: usize,
    consumed: &Consumed<'_>,
    offset_of: impl Fn(&FieldLayout, usize) -> usize,
) -> Result<DecodedPointCloud> {
    // Reserve only what the payload can back; `read` rejects anything beyond it.
    let row = consumed.x.1.width() + consumed.y.1.width() + consumed.z.1.width();
    let reserve = points.min(data.len() / row);
    let mut positions = Vec::with_capacity(reserve * 3);
    let mut intensity = Vec::with_capacity(if consumed.intensity.is_some() { reserve } else { 0 });
    let mut tracker = RangeTracker::new();

    let read = |(field, kind): (&FieldLayout, FieldKind), i: usize| -> Result<f32> {
        kind.read_le(data, offset_of(field, i)).ok_or_else(|| {
            DecodeError::corrupt(format!("field '{}' of point {} is truncated", field.name, i))
        })
    };

    for i in 0..points {
        let x = read(consumed.x, i)?;
        let y = read(consumed.y, i)?;
        let z = read(consumed.z, i)?;
        positions.extend_from_slice(&[x, y, z]);
        tracker.update_position(x, y, z);

        if let Some(field) = consumed.intensity {
            let v = read(field, i)?;
            intensity.push(v);
            tracker.update_intensity(v);
        }
    }

    Ok(DecodedPointCloud {
        positions,
        intensity,
        ranges: tracker.finish(),
    })
}

fn decode_ascii(
    payload: &[u8],
    header: &PcdHeader,
    consumed: &Consumed<'_>,
) -> Result<DecodedPointCloud> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| DecodeError::corrupt(format!("ascii payload is not utf-8: {e}")))?;
    let rows: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    // Without POINTS/WIDTH every row counts.
    let points = if header.points == 0 {
        rows.len()
    } else {
        header.points
    };
    if rows.len() < points {
        return Err(DecodeError::corrupt(format!(
            "ascii payload has {} rows, header declares {}",
            rows.len(),
            points
        )));
    }

    let mut positions = Vec::with_capacity(points * 3);
    let mut intensity = Vec::new();
    let mut tracker = RangeTracker::new();

    for (i, row) in rows.iter().take(points).enumerate() {
        let columns: Vec<&str> = row.split_whitespace().collect();
        let read = |field: &FieldLayout| -> Result<f32> {
            let token = columns.get(field.column).ok_or_else(|| {
                DecodeError::corrupt(format!("row {} has no column for '{}'", i, field.name))
            })?;
            token.parse::<f32>().map_err(|_| {
                DecodeError::corrupt(format!("row {} has invalid '{}' value '{}'", i, field.name, token))
            })
        };

        let x = read(consumed.x.0)?;
        let y = read(consumed.y.0)?;
        let z = read(consumed.z.0)?;
        positions.extend_from_slice(&[x, y, z]);
        tracker.update_position(x, y, z);

        if let Some((field, _)) = consumed.intensity {
            let v = read(field)?;
            intensity.push(v);
            tracker.update_intensity(v);
        }
    }

    Ok(DecodedPointCloud {
        positions,
        intensity,
        ranges: tracker.finish(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::Range;

    #[test]
    fn three_point_ascii_cloud() {
        let text = "VERSION 0.7\nFIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 1\n\
                    WIDTH 3\nHEIGHT 1\nPOINTS 3\nDATA ascii\n0 0 0\n1 0 0\n0 1 0\n";
        let cloud = decode(text.as_bytes()).unwrap();
        assert_eq!(cloud.positions, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(cloud.ranges.x, Range { min: 0.0, max: 1.0 });
        assert_eq!(cloud.ranges.y, Range { min: 0.0, max: 1.0 });
        assert_eq!(cloud.ranges.z, Range { min: 0.0, max: 0.0 });
        assert!(cloud.intensity.is_empty());
        assert_eq!(cloud.ranges.intensity, Range::default());
    }

    #[test]
    fn ascii_columns_account_for_counts() {
        let text = "FIELDS normal x y z intensity\nSIZE 4 4 4 4 4\nTYPE F F F F F\n\
                    COUNT 3 1 1 1 1\nPOINTS 1\nDATA ascii\n9 9 9 1 2 3 0.5\n";
        let cloud = decode(text.as_bytes()).unwrap();
        assert_eq!(cloud.positions, vec![1.0, 2.0, 3.0]);
        assert_eq!(cloud.intensity, vec![0.5]);
    }

    #[test]
    fn truncated_binary_payload_is_corrupt() {
        let mut bytes = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nPOINTS 2\nDATA binary\n".to_vec();
        bytes.extend_from_slice(&[0u8; 20]);
        assert!(matches!(decode(&bytes), Err(DecodeError::CorruptData(_))));
    }

    #[test]
    fn empty_cloud_has_zero_ranges() {
        let cloud = decode(b"FIELDS x y z intensity\nSIZE 4 4 4 4\nTYPE F F F F\nPOINTS 0\nDATA binary\n").unwrap();
        assert!(cloud.is_empty());
        assert_eq!(cloud.ranges, Ranges::default());
    }

    #[test]
    fn integer_intensity_is_widened() {
        let mut bytes =
            b"FIELDS x y z intensity\nSIZE 4 4 4 1\nTYPE F F F U\nPOINTS 1\nDATA binary\n".to_vec();
        for v in [1.0f32, 2.0, 3.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(200);
        let cloud = decode(&bytes).unwrap();
        assert_eq!(cloud.intensity, vec![200.0]);
        assert_eq!(cloud.ranges.intensity, Range { min: 200.0, max: 200.0 });
    }

    #[test]
    fn oversized_point_count_is_corrupt() {
        let header = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nPOINTS 4611686018427387904\nDATA binary\n";
        assert!(matches!(
            decode(header.as_bytes()),
            Err(DecodeError::CorruptData(_))
        ));

        let mut compressed = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nPOINTS 4611686018427387904\nDATA binary_compressed\n".to_vec();
        compressed.extend_from_slice(&0u32.to_le_bytes());
        compressed.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode(&compressed), Err(DecodeError::CorruptData(_))));
    }

    #[test]
    fn large_count_with_short_payload_is_corrupt() {
        let mut bytes = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nPOINTS 100000000000\nDATA binary\n".to_vec();
        bytes.extend_from_slice(&[0u8; 24]);
        assert!(matches!(decode(&bytes), Err(DecodeError::CorruptData(_))));
    }
}
