/// PCD header parsing and field layout resolution.
use crate::error::{DecodeError, Result};
use serde::{Deserialize, Serialize};

/// Payload encoding declared by the `DATA` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataMode {
    Ascii,
    Binary,
    BinaryCompressed,
}

impl DataMode {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ascii" => Some(Self::Ascii),
            "binary" => Some(Self::Binary),
            "binary_compressed" => Some(Self::BinaryCompressed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Binary => "binary",
            Self::BinaryCompressed => "binary_compressed",
        }
    }
}

/// Numeric representation of one field element, resolved from `(TYPE, SIZE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    F32,
    F64,
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
}

impl FieldKind {
    pub fn resolve(kind: char, size: usize) -> Option<Self> {
        match (kind.to_ascii_uppercase(), size) {
            ('F', 4) => Some(Self::F32),
            ('F', 8) => Some(Self::F64),
            ('U', 1) => Some(Self::U8),
            ('U', 2) => Some(Self::U16),
            ('U', 4) => Some(Self::U32),
            ('I', 1) => Some(Self::I8),
            ('I', 2) => Some(Self::I16),
            ('I', 4) => Some(Self::I32),
            _ => None,
        }
    }

    /// Read one little-endian element at `offset`, widened or narrowed to f32.
    pub fn read_le(&self, bytes: &[u8], offset: usize) -> Option<f32> {
        let width = self.width();
        let slice = bytes.get(offset..offset.checked_add(width)?)?;
        let value = match self {
            Self::F32 => f32::from_le_bytes(slice.try_into().ok()?),
            Self::F64 => f64::from_le_bytes(slice.try_into().ok()?) as f32,
            Self::U8 => slice[0] as f32,
            Self::U16 => u16::from_le_bytes(slice.try_into().ok()?) as f32,
            Self::U32 => u32::from_le_bytes(slice.try_into().ok()?) as f32,
            Self::I8 => slice[0] as i8 as f32,
            Self::I16 => i16::from_le_bytes(slice.try_into().ok()?) as f32,
            Self::I32 => i32::from_le_bytes(slice.try_into().ok()?) as f32,
        };
        Some(value)
    }

    pub fn width(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::F32 | Self::U32 | Self::I32 => 4,
            Self::F64 => 8,
        }
    }
}

/// One declared field with its position in every payload layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    pub kind: char,
    pub size: usize,
    pub count: usize,
    /// Byte offset inside a binary row.
    pub byte_offset: usize,
    /// Column index inside an ascii row.
    pub column: usize,
}

impl FieldLayout {
    /// Resolve the element reader, failing for pairs the decoder cannot interpret.
    pub fn reader(&self) -> Result<FieldKind> {
        FieldKind::resolve(self.kind, self.size).ok_or_else(|| DecodeError::UnsupportedFieldType {
            field: self.name.clone(),
            kind: self.kind,
            size: self.size,
        })
    }

    pub fn stride(&self) -> usize {
        self.size * self.count
    }
}

/// Parsed header block, everything before and including the `DATA` line.
#[derive(Debug, Clone, PartialEq)]
pub struct PcdHeader {
    pub version: Option<String>,
    pub fields: Vec<FieldLayout>,
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub viewpoint: Option<String>,
    pub points: usize,
    pub data: DataMode,
    /// Length in bytes of the header, payload starts here.
    pub header_len: usize,
    /// Bytes per point in binary layouts.
    pub row_size: usize,
}

impl PcdHeader {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Parse the header at the start of `bytes`.
///
/// The header is always ascii; parsing stops at the first `DATA` line so that
/// binary payload bytes are never interpreted as text.
pub fn parse_header(bytes: &[u8]) -> Result<PcdHeader> {
    let mut version = None;
    let mut names: Vec<String> = Vec::new();
    let mut sizes: Option<Vec<usize>> = None;
    let mut types: Option<Vec<char>> = None;
    let mut counts: Option<Vec<usize>> = None;
    let mut width: Option<usize> = None;
    let mut height: Option<usize> = None;
    let mut viewpoint = None;
    let mut points = None;
    let mut data = None;
    let mut header_len = bytes.len();

    let mut cursor = 0;
    while cursor < bytes.len() {
        let line_end = bytes[cursor..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |p| cursor + p);
        let next = (line_end + 1).min(bytes.len());
        let raw = String::from_utf8_lossy(&bytes[cursor..line_end]);
        cursor = next;

        // Strip comments and carriage returns.
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else { continue };
        let rest: Vec<&str> = tokens.collect();

        match keyword.to_uppercase().as_str() {
            "VERSION" => version = rest.first().map(|s| s.to_string()),
            "FIELDS" => names = rest.iter().map(|s| s.to_string()).collect(),
            "SIZE" => sizes = Some(parse_numbers(&rest, "SIZE")?),
            "TYPE" => {
                types = Some(
                    rest.iter()
                        .map(|s| s.chars().next().unwrap_or('?').to_ascii_uppercase())
                        .collect(),
                )
            }
            "COUNT" => counts = Some(parse_numbers(&rest, "COUNT")?),
            "WIDTH" => width = rest.first().and_then(|s| s.parse().ok()),
            "HEIGHT" => height = rest.first().and_then(|s| s.parse().ok()),
            "VIEWPOINT" => viewpoint = Some(rest.join(" ")),
            "POINTS" => points = rest.first().and_then(|s| s.parse().ok()),
            "DATA" => {
                let mode = rest.first().ok_or(DecodeError::MissingHeader("DATA mode"))?;
                data = Some(DataMode::from_string(mode).ok_or_else(|| {
                    DecodeError::corrupt(format!("unknown DATA mode '{mode}'"))
                })?);
                header_len = cursor;
                break;
            }
            _ => {}
        }
    }

    let data = data.ok_or(DecodeError::MissingHeader("DATA line"))?;
    let points = match points {
        Some(p) => p,
        None => width
            .unwrap_or(0)
            .checked_mul(height.unwrap_or(1))
            .ok_or_else(|| DecodeError::corrupt("WIDTH * HEIGHT overflows"))?,
    };

    let counts = counts.unwrap_or_else(|| vec![1; names.len()]);
    // ascii files are allowed to omit SIZE/TYPE, binary ones are not.
    let sizes = match (sizes, data) {
        (Some(s), _) => s,
        (None, DataMode::Ascii) => vec![4; names.len()],
        (None, _) => return Err(DecodeError::MissingHeader("SIZE")),
    };
    let types = match (types, data) {
        (Some(t), _) => t,
        (None, DataMode::Ascii) => vec!['F'; names.len()],
        (None, _) => return Err(DecodeError::MissingHeader("TYPE")),
    };

    if sizes.len() != names.len() || types.len() != names.len() || counts.len() != names.len() {
        return Err(DecodeError::corrupt(format!(
            "FIELDS declares {} entries but SIZE/TYPE/COUNT declare {}/{}/{}",
            names.len(),
            sizes.len(),
            types.len(),
            counts.len()
        )));
    }

    let mut fields = Vec::with_capacity(names.len());
    let mut byte_offset: usize = 0;
    let mut column: usize = 0;
    for (i, name) in names.into_iter().enumerate() {
        let overflow = || DecodeError::corrupt(format!("row layout overflows at field '{name}'"));
        let stride = sizes[i].checked_mul(counts[i]).ok_or_else(overflow)?;
        let next_offset = byte_offset.checked_add(stride).ok_or_else(overflow)?;
        let next_column = column.checked_add(counts[i]).ok_or_else(overflow)?;
        let field = FieldLayout {
            name,
            kind: types[i],
            size: sizes[i],
            count: counts[i],
            byte_offset,
            column,
        };
        byte_offset = next_offset;
        column = next_column;
        fields.push(field);
    }

    Ok(PcdHeader {
        version,
        fields,
        width,
        height,
        viewpoint,
        points,
        data,
        header_len,
        row_size: byte_offset,
    })
}

fn parse_numbers(tokens: &[&str], keyword: &'static str) -> Result<Vec<usize>> {
    tokens
        .iter()
        .map(|t| {
            t.parse::<usize>()
                .map_err(|_| DecodeError::corrupt(format!("invalid {keyword} value '{t}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "# .PCD v0.7 - Point Cloud Data file format\n\
        VERSION 0.7\n\
        FIELDS x y z rgb intensity\n\
        SIZE 4 4 4 4 2\n\
        TYPE F F F U U\n\
        COUNT 1 1 1 1 1\n\
        WIDTH 3\n\
        HEIGHT 1\n\
        VIEWPOINT 0 0 0 1 0 0 0\n\
        POINTS 3\n\
        DATA binary\n";

    #[test]
    fn offsets_follow_declared_widths() {
        let header = parse_header(HEADER.as_bytes()).unwrap();
        assert_eq!(header.data, DataMode::Binary);
        assert_eq!(header.points, 3);
        assert_eq!(header.row_size, 18);
        assert_eq!(header.header_len, HEADER.len());
        assert_eq!(header.field("rgb").unwrap().byte_offset, 12);
        assert_eq!(header.field("intensity").unwrap().byte_offset, 16);
        assert_eq!(header.field("intensity").unwrap().reader(), Ok(FieldKind::U16));
    }

    #[test]
    fn points_fall_back_to_width_times_height() {
        let text = "FIELDS x y z\nWIDTH 4\nHEIGHT 2\nDATA ascii\n";
        let header = parse_header(text.as_bytes()).unwrap();
        assert_eq!(header.points, 8);
        assert!(header.fields.iter().all(|f| f.count == 1 && f.size == 4));
    }

    #[test]
    fn missing_data_line_is_reported() {
        let err = parse_header(b"FIELDS x y z\nPOINTS 1\n").unwrap_err();
        assert_eq!(err, DecodeError::MissingHeader("DATA line"));
    }

    #[test]
    fn unsupported_pairs_are_rejected() {
        let field = FieldLayout {
            name: "intensity".into(),
            kind: 'F',
            size: 2,
            count: 1,
            byte_offset: 0,
            column: 0,
        };
        assert!(matches!(
            field.reader(),
            Err(DecodeError::UnsupportedFieldType { size: 2, .. })
        ));
    }

    #[test]
    fn overflowing_dimensions_are_corrupt() {
        let text = "FIELDS x y z\nWIDTH 18446744073709551615\nHEIGHT 2\nDATA ascii\n";
        assert!(matches!(
            parse_header(text.as_bytes()),
            Err(DecodeError::CorruptData(_))
        ));

        let text = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 18446744073709551615\nPOINTS 1\nDATA binary\n";
        assert!(matches!(
            parse_header(text.as_bytes()),
            Err(DecodeError::CorruptData(_))
        ));
    }
}
