/**
 * This module contains all logic for loading meshes and textures from external files.
 *
 * Natively files are read from `./assets/`, on the web they are fetched
 * relative to the page origin.
 */
pub mod mesh;
pub mod texture;

use crate::data_structures::mesh::VertexData;

pub async fn load_mesh(file_name: &str) -> anyhow::Result<VertexData> {
    let text = texture::load_string(file_name).await?;
    let data = mesh::parse_obj(&text)?;
    log::debug!("loaded {} with {} vertices", file_name, data.vertex_count());
    Ok(data)
}
