use skyview::render::{
    BlendMode, BufferId, DrawCall, FrameUniforms, GraphicsDevice, TextureId,
};

/// Everything the scene asked the device to do, in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    CreateBuffer { id: BufferId, label: String, len: usize },
    WriteBuffer { id: BufferId, len: usize },
    CreateTexture { id: TextureId, label: String },
    UploadTexture { id: TextureId, width: u32, height: u32 },
    Viewport { width: u32, height: u32 },
    Clear,
    Blend(BlendMode),
    Uniforms,
    Draw { call: DrawCall, blend: BlendMode },
}

/// A [`GraphicsDevice`] that keeps buffer contents in memory and logs every call.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    pub ops: Vec<Op>,
    pub buffers: Vec<Vec<u8>>,
    /// Size of the last uploaded image, `None` while the placeholder is bound.
    pub textures: Vec<Option<(u32, u32)>>,
    pub last_uniforms: Option<FrameUniforms>,
    /// Defaults to the WebGL2 limit.
    pub max_texture_dimension: u32,
    blend: BlendMode,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            max_texture_dimension: 2048,
            ..Self::default()
        }
    }

    pub fn draws(&self) -> Vec<(DrawCall, BlendMode)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Draw { call, blend } => Some((*call, *blend)),
                _ => None,
            })
            .collect()
    }

    pub fn texture_uploads(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::UploadTexture { .. }))
            .count()
    }

    /// The model matrices currently stored in `buffer`, 16 floats each.
    pub fn matrices(&self, buffer: BufferId) -> Vec<[f32; 16]> {
        let floats: &[f32] = bytemuck::cast_slice(&self.buffers[buffer.0]);
        floats
            .chunks_exact(16)
            .map(|chunk| {
                let mut matrix = [0.0; 16];
                matrix.copy_from_slice(chunk);
                matrix
            })
            .collect()
    }

    /// Forget the log, keep the resources.
    pub fn reset_ops(&mut self) {
        self.ops.clear();
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_buffer(&mut self, label: &str, contents: &[u8]) -> BufferId {
        let id = BufferId(self.buffers.len());
        self.buffers.push(contents.to_vec());
        self.ops.push(Op::CreateBuffer {
            id,
            label: label.to_string(),
            len: contents.len(),
        });
        id
    }

    fn write_buffer(&mut self, buffer: BufferId, contents: &[u8]) {
        self.buffers[buffer.0] = contents.to_vec();
        self.ops.push(Op::WriteBuffer {
            id: buffer,
            len: contents.len(),
        });
    }

    fn create_texture(&mut self, label: &str) -> TextureId {
        let id = TextureId(self.textures.len());
        self.textures.push(None);
        self.ops.push(Op::CreateTexture {
            id,
            label: label.to_string(),
        });
        id
    }

    fn upload_texture(&mut self, texture: TextureId, image: &image::RgbaImage) {
        self.textures[texture.0] = Some(image.dimensions());
        self.ops.push(Op::UploadTexture {
            id: texture,
            width: image.width(),
            height: image.height(),
        });
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.ops.push(Op::Viewport { width, height });
    }

    fn clear(&mut self, _colour: wgpu::Color) {
        self.blend = BlendMode::Opaque;
        self.ops.push(Op::Clear);
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
        self.ops.push(Op::Blend(mode));
    }

    fn set_uniforms(&mut self, uniforms: &FrameUniforms) {
        self.last_uniforms = Some(*uniforms);
        self.ops.push(Op::Uniforms);
    }

    fn draw_instanced(&mut self, call: &DrawCall) {
        self.ops.push(Op::Draw {
            call: *call,
            blend: self.blend,
        });
    }
}
