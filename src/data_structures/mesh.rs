//! Non-indexed triangle meshes and their GPU buffers.
//!
//! A mesh keeps every attribute in its own vertex buffer:
//!
//! | location | attribute  | format      |
//! |----------|------------|-------------|
//! | 0        | position   | `Float32x3` |
//! | 1        | tex coords | `Float32x2` |
//! | 2        | normal     | `Float32x3` |
//!
//! Locations 3 to 6 hold the per-instance model matrix, see
//! [`InstanceRaw`](crate::data_structures::instance::InstanceRaw).

use crate::{
    data_structures::instance::InstanceSet,
    render::{DrawCall, FrameUniforms, GraphicsDevice, MeshBuffers, TextureId},
    resources::texture::{PendingTexture, TexturePoll, fit_within},
};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const TEX_COORD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];
const NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x3];

/// Layouts of the three per-vertex buffers, in binding order.
pub fn vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 3] {
    use std::mem;
    [
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &POSITION_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &TEX_COORD_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &NORMAL_ATTRIBUTES,
        },
    ]
}

/// Flat, already de-indexed vertex attributes. Every three vertices form a triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexData {
    pub positions: Vec<f32>,
    pub tex_coords: Vec<f32>,
    pub normals: Vec<f32>,
}

impl VertexData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Copy with every position multiplied by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            positions: self.positions.iter().map(|p| p * factor).collect(),
            ..self.clone()
        }
    }
}

/// Where a mesh's texture currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureStatus {
    /// The decode has not finished, the placeholder is bound.
    Waiting,
    Uploaded,
    /// The decode failed; the placeholder stays bound for good.
    Placeholder,
}

/// A mesh living on the GPU, together with its texture and instance buffer.
#[derive(Debug)]
pub struct MeshAsset {
    pub label: String,
    vertex_count: u32,
    instance_count: u32,
    buffers: MeshBuffers,
    texture: TextureId,
    pending: Option<PendingTexture>,
    status: TextureStatus,
}

impl MeshAsset {
    /// Upload the vertex data and bind a placeholder texture until `texture` resolves.
    pub fn create<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        label: &str,
        data: &VertexData,
        texture: PendingTexture,
        uniform_scale: f32,
    ) -> Self {
        let data = if uniform_scale == 1.0 {
            data.clone()
        } else {
            data.scaled(uniform_scale)
        };
        let buffers = MeshBuffers {
            positions: device.create_buffer(
                &format!("{label} positions"),
                bytemuck::cast_slice(&data.positions),
            ),
            tex_coords: device.create_buffer(
                &format!("{label} tex coords"),
                bytemuck::cast_slice(&data.tex_coords),
            ),
            normals: device.create_buffer(
                &format!("{label} normals"),
                bytemuck::cast_slice(&data.normals),
            ),
            instances: device.create_buffer(&format!("{label} instances"), &[]),
        };
        let texture_id = device.create_texture(label);

        Self {
            label: label.to_string(),
            vertex_count: data.vertex_count() as u32,
            instance_count: 0,
            buffers,
            texture: texture_id,
            pending: Some(texture),
            status: TextureStatus::Waiting,
        }
    }

    pub fn buffers(&self) -> MeshBuffers {
        self.buffers
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn texture_status(&self) -> TextureStatus {
        self.status
    }

    /// Upload the decoded texture if it became ready. Never blocks.
    pub fn poll_texture<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> TextureStatus {
        let Some(pending) = self.pending.as_mut() else {
            return self.status;
        };
        match pending.poll() {
            TexturePoll::Pending => {}
            TexturePoll::Ready(image) => {
                let image = fit_within(image, device.max_texture_dimension());
                log::debug!(
                    "texture {} ready ({}x{})",
                    pending.label(),
                    image.width(),
                    image.height()
                );
                device.upload_texture(self.texture, &image);
                self.pending = None;
                self.status = TextureStatus::Uploaded;
            }
            TexturePoll::Failed(e) => {
                log::warn!("keeping placeholder texture for {}: {e:#}", self.label);
                self.pending = None;
                self.status = TextureStatus::Placeholder;
            }
        }
        self.status
    }

    /// Replace the instance buffer contents. Earlier, longer uploads are not drawn.
    pub fn upload_instances<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        instances: &InstanceSet,
    ) {
        let raw = instances.to_raw();
        device.write_buffer(self.buffers.instances, bytemuck::cast_slice(&raw));
        self.instance_count = raw.len() as u32;
    }

    /// One instanced draw of every uploaded instance. Nothing is drawn without instances.
    pub fn draw_instanced<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        uniforms: &FrameUniforms,
    ) {
        if self.instance_count == 0 || self.vertex_count == 0 {
            return;
        }
        device.set_uniforms(uniforms);
        device.draw_instanced(&DrawCall {
            buffers: self.buffers,
            texture: self.texture,
            vertex_count: self.vertex_count,
            instance_count: self.instance_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> VertexData {
        VertexData {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            tex_coords: vec![0.0, 1.0, 1.0, 1.0, 0.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn layouts_cover_locations_zero_to_two() {
        let layouts = vertex_layouts();
        let strides: Vec<u64> = layouts.iter().map(|l| l.array_stride).collect();
        assert_eq!(strides, vec![12, 8, 12]);
        for (location, layout) in layouts.iter().enumerate() {
            assert_eq!(layout.step_mode, wgpu::VertexStepMode::Vertex);
            assert_eq!(layout.attributes.len(), 1);
            assert_eq!(layout.attributes[0].shader_location, location as u32);
            assert_eq!(layout.attributes[0].offset, 0);
        }
    }

    #[test]
    fn scaling_only_touches_positions() {
        let mesh = triangle();
        let scaled = mesh.scaled(2.0);
        assert_eq!(scaled.vertex_count(), 3);
        assert_eq!(&scaled.positions[3..6], &[2.0, 0.0, 0.0]);
        assert_eq!(scaled.tex_coords, mesh.tex_coords);
        assert_eq!(scaled.normals, mesh.normals);
    }
}
