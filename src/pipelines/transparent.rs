use crate::{
    data_structures::texture::Texture,
    pipelines::basic::{mk_render_pipeline, scene_shader, scene_vertex_layouts},
};

/**
 * Pipeline for translucent meshes such as clouds.
 *
 * Textures are premultiplied on load, so blending is `ONE, ONE_MINUS_SRC_ALPHA`.
 * Depth writes stay on; translucent batches are drawn after all opaque ones.
 */
pub fn mk_transparent_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    layout: &wgpu::PipelineLayout,
) -> wgpu::RenderPipeline {
    mk_render_pipeline(
        device,
        layout,
        config.format,
        Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        Some(Texture::DEPTH_FORMAT),
        &scene_vertex_layouts(),
        scene_shader(),
    )
}
