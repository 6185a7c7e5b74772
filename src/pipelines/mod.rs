//! Render pipelines of the scene.
//!
//! Both pipelines share one shader and one layout and differ only in blending.

pub mod basic;
pub mod transparent;

use crate::render::BlendMode;

#[derive(Debug)]
pub struct Pipelines {
    pub opaque: wgpu::RenderPipeline,
    pub translucent: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        layout: &wgpu::PipelineLayout,
    ) -> Self {
        Self {
            opaque: basic::mk_basic_pipeline(device, config, layout),
            translucent: transparent::mk_transparent_pipeline(device, config, layout),
        }
    }

    pub fn for_blend(&self, mode: BlendMode) -> &wgpu::RenderPipeline {
        match mode {
            BlendMode::Opaque => &self.opaque,
            BlendMode::PremultipliedOver => &self.translucent,
        }
    }
}
