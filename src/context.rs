//! The wgpu-backed graphics device.
//!
//! [`Context`] owns the surface, device, queue and every buffer and texture
//! the scene creates. Draw calls are recorded during a tick and encoded into
//! one render pass by [`Context::present`].

use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::CameraUniform,
    config::ViewerConfig,
    data_structures::{
        instance::InstanceRaw,
        texture::{self, Texture},
    },
    error::ViewerError,
    pipelines::{Pipelines, basic::mk_scene_pipeline_layout},
    render::{BlendMode, BufferId, DrawCall, FrameUniforms, GraphicsDevice, LightUniform, TextureId},
};

/// Vertex buffers are never smaller than one instance matrix.
const MIN_BUFFER_SIZE: wgpu::BufferAddress = 64;

#[derive(Debug)]
struct GpuBuffer {
    label: String,
    buffer: wgpu::Buffer,
}

#[derive(Debug)]
struct GpuTexture {
    label: String,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
struct RecordedDraw {
    call: DrawCall,
    blend: BlendMode,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pipelines: Pipelines,
    texture_layout: wgpu::BindGroupLayout,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    light_buffer: wgpu::Buffer,
    light_bind_group: wgpu::BindGroup,
    buffers: Vec<GpuBuffer>,
    textures: Vec<GpuTexture>,
    clear_colour: wgpu::Color,
    blend: BlendMode,
    frame: Vec<RecordedDraw>,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> Result<Self, ViewerError> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("using adapter {:?}", adapter.get_info().name);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader assumes an Srgb surface texture. Using a different
        // one will result all the colors coming out darker.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(ViewerError::NoSurfaceFormat)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform::new()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout = uniform_layout(&device, "camera_bind_group_layout");
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light VB"),
            contents: bytemuck::cast_slice(&[LightUniform::from(&viewer.light)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let light_bind_group_layout = uniform_layout(&device, "light_bind_group_layout");
        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &light_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
            label: Some("light_bind_group"),
        });

        let texture_layout = texture::diffuse_layout(&device);
        let layout = mk_scene_pipeline_layout(
            &device,
            &texture_layout,
            &camera_bind_group_layout,
            &light_bind_group_layout,
        );
        let pipelines = Pipelines::new(&device, &config, &layout);

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        let [r, g, b, a] = viewer.clear_colour;
        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            pipelines,
            texture_layout,
            camera_buffer,
            camera_bind_group,
            light_buffer,
            light_bind_group,
            buffers: Vec::new(),
            textures: Vec::new(),
            clear_colour: wgpu::Color { r, g, b, a },
            blend: BlendMode::Opaque,
            frame: Vec::new(),
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigure the surface and depth buffer. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
    }

    /// Encode every draw recorded since the last [`GraphicsDevice::clear`] and show the frame.
    pub fn present(&mut self) -> Result<(), wgpu::SurfaceError> {
        let draws = std::mem::take(&mut self.frame);
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(1, &self.camera_bind_group, &[]);
            render_pass.set_bind_group(2, &self.light_bind_group, &[]);
            for draw in &draws {
                let call = &draw.call;
                let (Some(positions), Some(tex_coords), Some(normals), Some(instances)) = (
                    self.buffers.get(call.buffers.positions.0),
                    self.buffers.get(call.buffers.tex_coords.0),
                    self.buffers.get(call.buffers.normals.0),
                    self.buffers.get(call.buffers.instances.0),
                ) else {
                    log::warn!("skipping draw with unknown buffers");
                    continue;
                };
                let Some(texture) = self.textures.get(call.texture.0) else {
                    log::warn!("skipping draw with unknown texture {:?}", call.texture);
                    continue;
                };
                let instance_bytes = call.instance_count as wgpu::BufferAddress
                    * std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress;
                if instance_bytes > instances.buffer.size() {
                    log::warn!("{} holds fewer instances than drawn", instances.label);
                    continue;
                }

                render_pass.set_pipeline(self.pipelines.for_blend(draw.blend));
                render_pass.set_bind_group(0, &texture.bind_group, &[]);
                render_pass.set_vertex_buffer(0, positions.buffer.slice(..));
                render_pass.set_vertex_buffer(1, tex_coords.buffer.slice(..));
                render_pass.set_vertex_buffer(2, normals.buffer.slice(..));
                render_pass.set_vertex_buffer(3, instances.buffer.slice(..instance_bytes));
                render_pass.draw(0..call.vertex_count, 0..call.instance_count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn make_buffer(&self, label: &str, contents: &[u8]) -> wgpu::Buffer {
        let size = (contents.len() as wgpu::BufferAddress).max(MIN_BUFFER_SIZE);
        let usage = wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST;
        if contents.is_empty() {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        } else {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage,
                })
        }
    }
}

impl GraphicsDevice for Context {
    fn create_buffer(&mut self, label: &str, contents: &[u8]) -> BufferId {
        let buffer = self.make_buffer(label, contents);
        self.buffers.push(GpuBuffer {
            label: label.to_string(),
            buffer,
        });
        BufferId(self.buffers.len() - 1)
    }

    fn write_buffer(&mut self, id: BufferId, contents: &[u8]) {
        let Some(current) = self.buffers.get(id.0) else {
            log::warn!("write to unknown buffer {:?}", id);
            return;
        };
        if contents.is_empty() {
            return;
        }
        if contents.len() as wgpu::BufferAddress > current.buffer.size() {
            // Grow to the next power of two so a slowly growing set does not reallocate every frame
            let capacity = (contents.len() as wgpu::BufferAddress).next_power_of_two();
            let label = current.label.clone();
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&label),
                size: capacity,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.queue.write_buffer(&buffer, 0, contents);
            self.buffers[id.0] = GpuBuffer { label, buffer };
        } else {
            self.queue.write_buffer(&current.buffer, 0, contents);
        }
    }

    fn create_texture(&mut self, label: &str) -> TextureId {
        let placeholder = Texture::placeholder(&self.device, &self.queue, label);
        let bind_group = placeholder.bind_group(&self.device, &self.texture_layout);
        self.textures.push(GpuTexture {
            label: label.to_string(),
            bind_group,
        });
        TextureId(self.textures.len() - 1)
    }

    fn upload_texture(&mut self, id: TextureId, image: &image::RgbaImage) {
        let Some(slot) = self.textures.get(id.0) else {
            log::warn!("upload to unknown texture {:?}", id);
            return;
        };
        let texture = Texture::from_rgba(&self.device, &self.queue, image, Some(&slot.label));
        let bind_group = texture.bind_group(&self.device, &self.texture_layout);
        self.textures[id.0].bind_group = bind_group;
    }

    fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        if (width, height) != self.size() {
            self.resize(width, height);
        }
    }

    fn clear(&mut self, colour: wgpu::Color) {
        self.clear_colour = colour;
        self.blend = BlendMode::Opaque;
        self.frame.clear();
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    fn set_uniforms(&mut self, uniforms: &FrameUniforms) {
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniforms.camera]));
        self.queue
            .write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(&[uniforms.light]));
    }

    fn draw_instanced(&mut self, call: &DrawCall) {
        self.frame.push(RecordedDraw {
            call: *call,
            blend: self.blend,
        });
    }
}

/// Layout of a single uniform buffer at binding 0, used for camera and light.
pub fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some(label),
    })
}
