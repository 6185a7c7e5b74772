use std::io::{BufReader, Cursor};

use anyhow::Context as _;

use crate::data_structures::mesh::VertexData;

/**
 * Parse Wavefront OBJ text into flat, non-indexed triangles.
 *
 * Faces are triangulated and every index is expanded into its own vertex, so
 * the result can be drawn without an index buffer. All objects of the file
 * end up in one mesh. Missing texture coordinates or normals are zero-filled,
 * V is flipped to match wgpu's texture origin. Materials are ignored.
 */
pub fn parse_obj(text: &str) -> anyhow::Result<VertexData> {
    let mut reader = BufReader::new(Cursor::new(text));
    let (models, _materials) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| Err(tobj::LoadError::OpenFileFailed),
    )
    .context("malformed OBJ data")?;

    let mut data = VertexData::default();
    for m in &models {
        let mesh = &m.mesh;
        for &index in &mesh.indices {
            let i = index as usize;
            let position = mesh
                .positions
                .get(i * 3..i * 3 + 3)
                .with_context(|| format!("vertex index {i} out of range in {}", m.name))?;
            data.positions.extend_from_slice(position);
            data.tex_coords.extend_from_slice(&[
                mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                1.0 - mesh.texcoords.get(i * 2 + 1).map_or(1.0, |f| *f),
            ]);
            data.normals.extend_from_slice(&[
                mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ]);
        }
    }
    Ok(data)
}
