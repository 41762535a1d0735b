//! Shared fixtures for integration tests.
//!
//! Everything is built in memory: zip archives with `zip::ZipWriter`, PNG
//! textures with `image`, glTF documents with base64 data URIs.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use base64::Engine as _;
use model_viewer::asset::{AssetSource, ProgressTracker, SourceError};
use model_viewer::asset::source::SourceFuture;

/// Box spanning x 1..3, y 1..5, z 1..2 with a `usemtl wood` face
pub const BOX_OBJ: &str = "\
mtllib a.mtl
o box
v 1 1 1
v 3 1 1
v 3 5 1
v 1 5 2
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl wood
f 1/1 2/2 3/3 4/4
";

/// Material file referencing `tex.png` for the diffuse channel
pub const WOOD_MTL: &str = "\
newmtl wood
Kd 0.8 0.6 0.4
map_Kd tex.png
";

/// Encode a 2x2 PNG of one color
pub fn png_bytes(color: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba(color));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Build a deflated zip archive from `(path, bytes)` pairs, in order
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (path, bytes) in entries {
        writer.start_file(*path, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Archive with `a.obj`, `a.mtl` and `tex.png`
pub fn obj_archive() -> Vec<u8> {
    let png = png_bytes([200, 120, 40, 255]);
    zip_bytes(&[
        ("a.obj", BOX_OBJ.as_bytes()),
        ("a.mtl", WOOD_MTL.as_bytes()),
        ("tex.png", &png),
    ])
}

/// A single-triangle glTF, optionally with a camera node and a point light
pub fn gltf_json(with_camera: bool, with_light: bool) -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let bytes: Vec<u8> = positions.iter().flat_map(|v| v.to_le_bytes()).collect();
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    );

    let mut nodes = vec![serde_json::json!({ "mesh": 0, "name": "triangle" })];
    if with_camera {
        nodes.push(serde_json::json!({
            "camera": 0,
            "name": "shot",
            "translation": [0.0, 0.0, 5.0]
        }));
    }
    if with_light {
        nodes.push(serde_json::json!({
            "name": "lamp",
            "translation": [0.0, 2.0, 0.0],
            "extensions": { "KHR_lights_punctual": { "light": 0 } }
        }));
    }
    let node_ids: Vec<usize> = (0..nodes.len()).collect();

    let mut doc = serde_json::json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": node_ids }],
        "nodes": nodes,
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
        "buffers": [{ "byteLength": bytes.len(), "uri": uri }],
        "bufferViews": [{ "buffer": 0, "byteLength": bytes.len() }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }]
    });
    if with_camera {
        doc["cameras"] = serde_json::json!([{
            "type": "perspective",
            "perspective": { "yfov": 0.8, "znear": 0.05, "zfar": 50.0 }
        }]);
    }
    if with_light {
        doc["extensionsUsed"] = serde_json::json!(["KHR_lights_punctual"]);
        doc["extensions"] = serde_json::json!({
            "KHR_lights_punctual": { "lights": [{ "type": "point", "intensity": 2.0 }] }
        });
    }
    serde_json::to_vec(&doc).unwrap()
}

/// Little-endian positions of the triangle (0,0,0) (4,0,0) (0,2,0)
pub fn wide_triangle_bytes() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 4.0, 0.0, 0.0, 0.0, 2.0, 0.0];
    positions.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// glTF document for [`wide_triangle_bytes`]. Without a `uri` the buffer is
/// the GLB binary chunk.
fn wide_triangle_doc(uri: Option<&str>) -> serde_json::Value {
    let byte_length = wide_triangle_bytes().len();
    let mut buffer = serde_json::json!({ "byteLength": byte_length });
    if let Some(uri) = uri {
        buffer["uri"] = serde_json::json!(uri);
    }
    serde_json::json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "name": "wide" }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
        "buffers": [buffer],
        "bufferViews": [{ "buffer": 0, "byteLength": byte_length }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [4.0, 2.0, 0.0]
        }]
    })
}

/// glTF whose buffer lives in `bufs/data.bin` next to the document
pub fn external_buffer_gltf() -> Vec<u8> {
    serde_json::to_vec(&wide_triangle_doc(Some("bufs/data.bin"))).unwrap()
}

/// Binary glTF container: header, JSON chunk, BIN chunk
pub fn glb_bytes() -> Vec<u8> {
    let mut json = serde_json::to_vec(&wide_triangle_doc(None)).unwrap();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = wide_triangle_bytes();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}

/// Source whose fetches never complete
pub struct NeverSource;

impl AssetSource for NeverSource {
    fn fetch<'a>(
        &'a self,
        _url: &'a str,
        _progress: &'a ProgressTracker,
    ) -> SourceFuture<'a, Vec<u8>> {
        Box::pin(std::future::pending::<Result<Vec<u8>, SourceError>>())
    }
}
