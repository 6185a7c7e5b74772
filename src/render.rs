//! The graphics device seam and the data that crosses it.
//!
//! Everything above this module (meshes, batches, the frame loop) talks to a
//! [`GraphicsDevice`]. The wgpu-backed [`Context`](crate::context::Context)
//! is the production implementation; tests plug in a recorder.
//!
//! # Key types
//!
//! - [`GraphicsDevice`] creates buffers/textures and accepts draw calls
//! - [`DrawCall`] is one self-contained instanced draw
//! - [`FrameUniforms`] carries view, projection and light for the shader
//! - [`Pass`] says whether a batch is drawn opaque or blended

use crate::{camera::CameraUniform, config::LightConfig};

/// Handle of a GPU buffer owned by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// Handle of a GPU texture owned by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// Blending used for subsequent draws.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// No blending, the fragment replaces the target.
    #[default]
    Opaque,
    /// Premultiplied "over": `src + dst * (1 - src.a)`.
    PremultipliedOver,
}

/// Which part of the frame a batch belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Pass {
    #[default]
    Opaque,
    /// Drawn after all opaque batches with blending enabled.
    Translucent,
}

/// The vertex buffers of one mesh: one per attribute plus the instance matrices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshBuffers {
    pub positions: BufferId,
    pub tex_coords: BufferId,
    pub normals: BufferId,
    pub instances: BufferId,
}

/// One instanced draw: `vertex_count` vertices for each of `instance_count` instances.
///
/// A draw call names every resource it needs, so nothing stays bound on the
/// device once it has been submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub buffers: MeshBuffers,
    pub texture: TextureId,
    pub vertex_count: u32,
    pub instance_count: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub direction: [f32; 3],
    pub intensity: f32,
    pub color: [f32; 3],
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    pub _padding: u32,
}

impl From<&LightConfig> for LightUniform {
    fn from(light: &LightConfig) -> Self {
        Self {
            direction: light.direction,
            intensity: light.intensity,
            color: light.color,
            _padding: 0,
        }
    }
}

/// Per-draw shader inputs. They are identical for all draws of a frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameUniforms {
    pub camera: CameraUniform,
    pub light: LightUniform,
}

/// A thin, synchronous graphics device.
///
/// Buffer writes replace the full contents; the device grows the underlying
/// allocation whenever the new contents do not fit.
pub trait GraphicsDevice {
    fn create_buffer(&mut self, label: &str, contents: &[u8]) -> BufferId;

    fn write_buffer(&mut self, buffer: BufferId, contents: &[u8]);

    /// A texture that samples as transparent black until something is uploaded.
    fn create_texture(&mut self, label: &str) -> TextureId;

    /// Replace a texture's image. Colour is expected to be premultiplied.
    fn upload_texture(&mut self, texture: TextureId, image: &image::RgbaImage);

    /// Largest width or height [`GraphicsDevice::upload_texture`] accepts.
    fn max_texture_dimension(&self) -> u32;

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Start a frame: clear colour and depth and reset blending to [`BlendMode::Opaque`].
    fn clear(&mut self, colour: wgpu::Color);

    fn set_blend(&mut self, mode: BlendMode);

    fn set_uniforms(&mut self, uniforms: &FrameUniforms);

    fn draw_instanced(&mut self, call: &DrawCall);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_uniform_is_two_vec4s() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 32);
        let light = LightUniform::from(&LightConfig::default());
        assert_eq!(light.direction, [-0.5, -1.0, -0.5]);
        assert_eq!(light.intensity, 1.2);
    }

    #[test]
    fn camera_uniform_matches_shader_layout() {
        // vec4 + two mat4x4
        assert_eq!(std::mem::size_of::<CameraUniform>(), 16 + 64 + 64);
    }
}
