use cgmath::Matrix4;

use crate::{
    data_structures::{instance::InstanceSet, mesh::MeshAsset},
    render::{FrameUniforms, GraphicsDevice, Pass},
};

/**
 * An `InstanceBatch` draws one mesh many times with a single draw call.
 *
 * The instance set is re-uploaded before a draw only after it changed.
 */
#[derive(Debug)]
pub struct InstanceBatch {
    pub mesh: MeshAsset,
    pub pass: Pass,
    instances: InstanceSet,
    dirty: bool,
}

impl InstanceBatch {
    pub fn new(mesh: MeshAsset, instances: InstanceSet, pass: Pass) -> Self {
        Self {
            mesh,
            pass,
            instances,
            dirty: true,
        }
    }

    pub fn set_instances<I: IntoIterator<Item = Matrix4<f32>>>(&mut self, matrices: I) {
        self.instances.replace(matrices);
        self.dirty = true;
    }

    pub fn upload<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        if self.dirty {
            self.mesh.upload_instances(device, &self.instances);
            self.dirty = false;
        }
    }

    pub fn draw<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, uniforms: &FrameUniforms) {
        self.upload(device);
        self.mesh.draw_instanced(device, uniforms);
    }
}
