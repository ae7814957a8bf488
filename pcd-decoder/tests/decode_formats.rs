use pcd_decoder::{DataMode, DecodeError, DecodedPointCloud, decode, encode, write_pcd_file};

fn synthetic_cloud(n: usize, with_intensity: bool) -> DecodedPointCloud {
    let mut positions = Vec::with_capacity(n * 3);
    let mut intensity = Vec::new();
    for i in 0..n {
        let t = i as f32;
        positions.extend_from_slice(&[t * 0.5 - 10.0, (t * 0.37).sin() * 4.0, t.sqrt()]);
        if with_intensity {
            intensity.push((i % 255) as f32);
        }
    }
    DecodedPointCloud::from_points(positions, intensity)
}

#[test]
fn ascii_round_trip_keeps_points_and_ranges() {
    let cloud = synthetic_cloud(257, false);
    let decoded = decode(&encode(&cloud, DataMode::Ascii)).unwrap();
    assert_eq!(decoded.len(), 257);
    assert_eq!(decoded.positions, cloud.positions);
    assert_eq!(decoded.ranges.x.min, -10.0);
    assert_eq!(decoded.ranges.x.max, 256.0 * 0.5 - 10.0);
    assert_eq!(decoded.ranges.z.min, 0.0);
    assert_eq!(decoded.ranges, cloud.ranges);
}

#[test]
fn binary_and_compressed_decode_identically() {
    let cloud = synthetic_cloud(3000, true);
    let binary = decode(&encode(&cloud, DataMode::Binary)).unwrap();
    let compressed_bytes = encode(&cloud, DataMode::BinaryCompressed);
    let compressed = decode(&compressed_bytes).unwrap();

    assert_eq!(binary.positions, compressed.positions);
    assert_eq!(binary.intensity, compressed.intensity);
    assert_eq!(binary.ranges, compressed.ranges);
    assert_eq!(binary, cloud);
}

#[test]
fn unconsumed_fields_are_skipped_by_width() {
    let header = "VERSION 0.7\nFIELDS rgb x y z label intensity\nSIZE 4 4 4 4 2 1\n\
                  TYPE U F F F U U\nCOUNT 1 1 1 1 1 1\nWIDTH 2\nHEIGHT 1\nPOINTS 2\nDATA binary\n";
    let mut bytes = header.as_bytes().to_vec();
    for (p, intensity) in [([1.0f32, 2.0, 3.0], 10u8), ([-1.0, -2.0, -3.0], 20)] {
        bytes.extend_from_slice(&0xdeadbeefu32.to_le_bytes());
        for v in p {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&7u16.to_le_bytes());
        bytes.push(intensity);
    }

    let cloud = decode(&bytes).unwrap();
    assert_eq!(cloud.positions, vec![1.0, 2.0, 3.0, -1.0, -2.0, -3.0]);
    assert_eq!(cloud.intensity, vec![10.0, 20.0]);
    assert_eq!(cloud.ranges.intensity.max, 20.0);
}

#[test]
fn unsupported_type_only_fails_for_consumed_fields() {
    // F2 on an unconsumed field is skipped.
    let mut bytes =
        b"FIELDS x y z half\nSIZE 4 4 4 2\nTYPE F F F F\nPOINTS 1\nDATA binary\n".to_vec();
    for v in [1.0f32, 1.0, 1.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes.extend_from_slice(&[0, 0]);
    assert!(decode(&bytes).is_ok());

    let bytes = b"FIELDS x y z intensity\nSIZE 4 4 4 2\nTYPE F F F F\nPOINTS 0\nDATA binary\n";
    assert_eq!(
        decode(bytes),
        Err(DecodeError::UnsupportedFieldType {
            field: "intensity".into(),
            kind: 'F',
            size: 2,
        })
    );
}

#[test]
fn damaged_compressed_payload_is_corrupt() {
    let cloud = synthetic_cloud(64, false);
    let mut bytes = encode(&cloud, DataMode::BinaryCompressed);

    // Claim one more decompressed byte than the stream produces.
    let marker = b"DATA binary_compressed\n";
    let header_len = bytes
        .windows(marker.len())
        .position(|w| w == marker)
        .unwrap()
        + marker.len();
    let declared = u32::from_le_bytes(bytes[header_len + 4..header_len + 8].try_into().unwrap());
    bytes[header_len + 4..header_len + 8].copy_from_slice(&(declared + 1).to_le_bytes());
    assert!(matches!(decode(&bytes), Err(DecodeError::CorruptData(_))));

    // Truncate the compressed block itself.
    let mut truncated = encode(&cloud, DataMode::BinaryCompressed);
    truncated.truncate(truncated.len() - 5);
    assert!(matches!(decode(&truncated), Err(DecodeError::CorruptData(_))));
}

#[test]
fn written_files_decode_back() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = synthetic_cloud(100, true);
    for mode in [DataMode::Ascii, DataMode::Binary, DataMode::BinaryCompressed] {
        let path = dir.path().join(format!("cloud.{}.pcd", mode.as_str()));
        write_pcd_file(&path, &cloud, mode).unwrap();
        let decoded = decode(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(decoded.len(), 100, "{}", mode.as_str());
        assert_eq!(decoded.intensity, cloud.intensity);
    }
}
