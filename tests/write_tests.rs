//! Integration tests for writing PLY files and verifying round-trip.

use std::fs::File;
use std::io::{BufReader, Cursor};

use plyio::prelude::*;
use tempfile::NamedTempFile;

/// A cube: 8 vertices with positions and colors, 6 quads.
fn cube() -> PlyFile {
    let positions: Vec<f32> = (0..8u32)
        .flat_map(|i| [(i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32])
        .collect();
    let colors: Vec<u8> = (0..8u8).flat_map(|i| [i * 30, 255 - i * 30, 128]).collect();
    let quads: Vec<u32> = vec![
        0, 1, 3, 2, //
        4, 6, 7, 5, //
        0, 4, 5, 1, //
        2, 3, 7, 6, //
        0, 2, 6, 4, //
        1, 5, 7, 3,
    ];

    let mut ply = PlyFile::new();
    ply.add_comment("generated by write_tests");
    ply.add_obj_info("unit cube");
    ply.add_properties("vertex", &["x", "y", "z"], &positions).unwrap();
    ply.add_properties("vertex", &["red", "green", "blue"], &colors).unwrap();
    ply.add_list_property("face", "vertex_indices", &quads, 4, PropertyType::Uint8).unwrap();
    ply
}

struct Cube {
    positions: TypedBuffer,
    colors: TypedBuffer,
    faces: TypedBuffer,
    comments: Vec<String>,
    obj_info: Vec<String>,
}

fn read_cube(bytes: Vec<u8>) -> Cube {
    let mut cursor = Cursor::new(bytes);
    let mut ply = PlyFile::parse_header(&mut cursor).expect("Failed to parse header");
    let p = ply.request_properties("vertex", &["x", "y", "z"]).unwrap();
    let c = ply.request_properties("vertex", &["red", "green", "blue"]).unwrap();
    let f = ply.request_list_properties("face", "vertex_indices", 4).unwrap();
    let mut data = ply.read(&mut cursor).expect("Failed to read body");
    Cube {
        positions: data.take(p).unwrap(),
        colors: data.take(c).unwrap(),
        faces: data.take(f).unwrap(),
        comments: ply.comments().to_vec(),
        obj_info: ply.obj_info().to_vec(),
    }
}

#[test]
fn test_binary_roundtrip_is_exact() {
    let ply = cube();
    let mut bytes = Vec::new();
    ply.write(&mut bytes, true).expect("Failed to write");

    let text = String::from_utf8_lossy(&bytes);
    assert!(text.starts_with("ply\nformat binary_little_endian 1.0\n"));

    let back = read_cube(bytes);
    assert_eq!(back.positions.count(), 8);
    assert_eq!(back.positions.as_slice::<f32>().unwrap()[21..24], [1.0, 1.0, 1.0]);
    assert_eq!(back.colors.as_slice::<u8>().unwrap()[3..6], [30, 225, 128]);
    assert_eq!(back.faces.layout(), &ListLayout::Uniform(4));
    assert_eq!(back.faces.count(), 6);
    assert_eq!(back.faces.as_slice::<u32>().unwrap()[..4], [0, 1, 3, 2]);
    assert_eq!(back.comments, vec!["generated by write_tests".to_string()]);
    assert_eq!(back.obj_info, vec!["unit cube".to_string()]);
}

#[test]
fn test_all_encodings_agree() {
    let ply = cube();
    let decoded: Vec<Cube> = [Encoding::Ascii, Encoding::BinaryLittleEndian, Encoding::BinaryBigEndian]
        .into_iter()
        .map(|encoding| {
            let mut bytes = Vec::new();
            ply.write_encoded(&mut bytes, encoding).unwrap();
            read_cube(bytes)
        })
        .collect();
    for other in &decoded[1..] {
        assert_eq!(other.positions, decoded[0].positions);
        assert_eq!(other.colors, decoded[0].colors);
        assert_eq!(other.faces, decoded[0].faces);
    }
}

#[test]
fn test_ascii_output_text() {
    let mut ply = PlyFile::new();
    ply.add_properties("vertex", &["x", "y"], &[0.5f32, -1.25, 3.0, 0.1]).unwrap();
    ply.add_variable_list_property("face", "idx", &[0i32, 1, 0, 1, 1], &[2, 3], PropertyType::Uint8)
        .unwrap();
    let mut bytes = Vec::new();
    ply.write(&mut bytes, false).unwrap();

    let expected = "ply\n\
        format ascii 1.0\n\
        element vertex 2\n\
        property float x\n\
        property float y\n\
        element face 2\n\
        property list uchar int idx\n\
        end_header\n\
        0.5 -1.25\n\
        3 0.1\n\
        2 0 1\n\
        3 0 1 1\n";
    assert_eq!(String::from_utf8(bytes).unwrap(), expected);
}

#[test]
fn test_ascii_float_roundtrip() {
    let values = [0.1f32, 1.0 / 3.0, -7.0e-12, 123456.79];
    let doubles = [0.1f64, 2.0f64.sqrt(), -1.0e300, 5e-324];
    let mut ply = PlyFile::new();
    ply.add_properties("sample", &["f"], &values).unwrap();
    ply.add_properties("sample", &["d"], &doubles).unwrap();
    let mut bytes = Vec::new();
    ply.write(&mut bytes, false).unwrap();

    let mut cursor = Cursor::new(bytes);
    let mut back = PlyFile::parse_header(&mut cursor).unwrap();
    let f = back.request_properties("sample", &["f"]).unwrap();
    let d = back.request_properties("sample", &["d"]).unwrap();
    let data = back.read(&mut cursor).unwrap();
    assert_eq!(data.get(f).unwrap().as_slice::<f32>().unwrap(), &values);
    assert_eq!(data.get(d).unwrap().as_slice::<f64>().unwrap(), &doubles);
}

#[test]
fn test_file_roundtrip() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp.path();

    {
        let mut file = File::create(path).expect("Failed to create file");
        cube().write_encoded(&mut file, Encoding::BinaryBigEndian).expect("Failed to write");
    }

    let mut reader = BufReader::new(File::open(path).expect("Failed to open file"));
    let mut ply = PlyFile::parse_header(&mut reader).unwrap();
    assert_eq!(ply.encoding(), Encoding::BinaryBigEndian);
    let names: Vec<&str> = ply.elements().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["vertex", "face"]);
    assert_eq!(ply.element("vertex").unwrap().properties.len(), 6);

    let faces = ply.request_properties("face", &["vertex_indices"]).unwrap();
    let data = ply.read(&mut reader).unwrap();
    let faces = data.get(faces).unwrap();
    assert_eq!(faces.count(), 6);
    assert!(faces.instances().all(|r| r.len() == 4));
}

#[test]
fn test_reencode_read_buffers() {
    let mut bytes = Vec::new();
    cube().write(&mut bytes, true).unwrap();
    let original = read_cube(bytes);

    let mut copy = PlyFile::new();
    copy.add_buffer("vertex", &["x", "y", "z"], original.positions.clone(), None).unwrap();
    copy.add_buffer("vertex", &["red", "green", "blue"], original.colors.clone(), None).unwrap();
    copy.add_buffer("face", &["vertex_indices"], original.faces.clone(), Some(PropertyType::Uint8))
        .unwrap();
    let mut out = Vec::new();
    copy.write_encoded(&mut out, Encoding::Ascii).unwrap();

    let back = read_cube(out);
    assert_eq!(back.positions, original.positions);
    assert_eq!(back.colors, original.colors);
    assert_eq!(back.faces, original.faces);
}

#[test]
fn test_write_rejects_bad_input() {
    let mut ply = PlyFile::new();
    // 5 values do not split into xyz triples
    assert!(matches!(
        ply.add_properties("vertex", &["x", "y", "z"], &[0.0f32; 5]),
        Err(Error::InvalidRequest(_))
    ));
    // A list buffer without a count type
    let lists = TypedBuffer::from_uniform_lists(&[1i32, 2, 3], 3).unwrap();
    assert!(ply.add_buffer("face", &["idx"], lists, None).is_err());
    // Nothing was added by the failed calls
    assert!(ply.elements().is_empty());
}
