//! Instance transformation data for GPU rendering.
//!
//! Every instance of a mesh is one 4x4 model matrix. The matrices of a batch
//! are serialized back to back, 16 column-major floats each, and read by the
//! vertex shader as four `vec4` attributes that advance once per instance.

use cgmath::Matrix4;

use crate::data_structures::mesh::Vertex;

/**
 * The raw instance is the actual data stored on the GPU: one column-major
 * model matrix, 64 bytes.
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
}

impl From<Matrix4<f32>> for InstanceRaw {
    fn from(matrix: Matrix4<f32>) -> Self {
        Self {
            model: matrix.into(),
        }
    }
}

/// Shader locations of the four matrix columns.
pub const INSTANCE_LOCATIONS: std::ops::RangeInclusive<u32> = 3..=6;

impl Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Advance once per instance, not per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            // A mat4 takes up 4 vertex slots as it is technically 4 vec4s.
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// An ordered set of model matrices, one per instance.
///
/// The set does not know which mesh it belongs to; an
/// [`InstanceBatch`](crate::data_structures::batch::InstanceBatch) pairs it
/// with one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceSet {
    matrices: Vec<Matrix4<f32>>,
}

impl InstanceSet {
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Swap in a whole new set of matrices.
    pub fn replace<I: IntoIterator<Item = Matrix4<f32>>>(&mut self, matrices: I) {
        self.matrices.clear();
        self.matrices.extend(matrices);
    }

    pub fn matrices(&self) -> &[Matrix4<f32>] {
        &self.matrices
    }

    pub fn to_raw(&self) -> Vec<InstanceRaw> {
        self.matrices.iter().copied().map(InstanceRaw::from).collect()
    }
}

impl FromIterator<Matrix4<f32>> for InstanceSet {
    fn from_iter<T: IntoIterator<Item = Matrix4<f32>>>(iter: T) -> Self {
        Self {
            matrices: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{SquareMatrix, Vector3};

    use super::*;

    #[test]
    fn raw_instance_is_sixteen_floats() {
        assert_eq!(std::mem::size_of::<InstanceRaw>(), 64);
        let layout = InstanceRaw::desc();
        assert_eq!(layout.array_stride, 64);
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Instance);
        let locations: Vec<u32> = layout.attributes.iter().map(|a| a.shader_location).collect();
        assert_eq!(locations, INSTANCE_LOCATIONS.collect::<Vec<_>>());
        let offsets: Vec<u64> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 16, 32, 48]);
    }

    #[test]
    fn matrices_serialize_column_major() {
        let set: InstanceSet = [Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0))]
            .into_iter()
            .collect();
        let raw = set.to_raw();
        let floats: &[f32] = bytemuck::cast_slice(&raw);
        assert_eq!(floats.len(), 16);
        // The translation lives in the last column
        assert_eq!(&floats[12..16], &[1.0, 2.0, 3.0, 1.0]);
        assert_eq!(floats[0], 1.0);
    }

    #[test]
    fn replace_drops_previous_instances() {
        let mut set: InstanceSet = (0..5).map(|_| Matrix4::identity()).collect();
        assert_eq!(set.len(), 5);
        set.replace([Matrix4::identity(); 2]);
        assert_eq!(set.len(), 2);
        set.replace(std::iter::empty());
        assert!(set.is_empty());
    }
}
