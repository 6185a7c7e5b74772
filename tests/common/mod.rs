#![allow(dead_code)]

pub mod recording_device;

use skyview::{
    data_structures::mesh::VertexData,
    flow::{AssetSource, BatchDescription, Placement},
    render::Pass,
    resources::texture::PendingTexture,
};

pub use recording_device::{Op, RecordingDevice};

/// One triangle facing +z.
pub fn triangle() -> VertexData {
    VertexData {
        positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        tex_coords: vec![0.0, 1.0, 1.0, 1.0, 0.0, 0.0],
        normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
    }
}

pub fn loaded_texture(label: &str) -> PendingTexture {
    PendingTexture::ready(label, Ok(image::RgbaImage::new(4, 4)))
}

pub fn batch(mesh: &str, pass: Pass, count: usize) -> BatchDescription {
    BatchDescription {
        source: AssetSource::new(mesh, &format!("{mesh}.png"), 1.0),
        pass,
        placement: Placement::At((0..count).map(|i| [i as f32, 0.0, 0.0]).collect()),
    }
}
