//! Flow control and application event loop.
//!
//! This module ties the viewer together. A [`Scene`] owns all simulation
//! state (camera, input, entity, instance batches) and renders one frame per
//! [`Scene::tick`] against any [`GraphicsDevice`]. The winit [`App`] feeds it
//! events, drives the [`FrameClock`] and presents through the wgpu
//! [`Context`].
//!
//! # Lifecycle Flow
//!
//! Each tick follows this pattern:
//! 1. Ingest the input events queued since the last tick
//! 2. Resize the projection if the viewport changed
//! 3. Apply texture decodes that finished in the meantime
//! 4. Clear colour and depth
//! 5. Update the entity, which retargets the camera
//! 6. Draw opaque batches, then translucent batches with blending
//! 7. Present frame

use std::sync::Arc;

use cgmath::{Matrix4, Rad, Vector3};
use instant::{Duration, Instant};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{CursorGrabMode, Window},
};

use crate::{
    camera::{Camera, CameraUniform, Projection},
    config::ViewerConfig,
    context::Context,
    data_structures::{
        batch::InstanceBatch,
        instance::InstanceSet,
        mesh::{MeshAsset, VertexData},
    },
    entity::Entity,
    error::ViewerError,
    input::{self, Command, InputEvent, InputQueue, InputState},
    render::{BlendMode, FrameUniforms, GraphicsDevice, LightUniform, Pass},
    resources::{self, texture::{PendingTexture, TextureLoader}},
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ClockState {
    #[default]
    Idle,
    Running { last: Instant },
}

/// Wall-clock delta time between frames.
///
/// The first tick moves the clock from `Idle` to `Running` and reports zero,
/// so the first frame never makes a large jump.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameClock {
    state: ClockState,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Duration {
        let dt = match self.state {
            ClockState::Idle => Duration::ZERO,
            ClockState::Running { last } => now.duration_since(last),
        };
        self.state = ClockState::Running { last: now };
        dt
    }
}

/// A mesh file, its texture and the uniform scale applied on upload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetSource {
    pub mesh: String,
    pub texture: String,
    pub scale: f32,
}

impl AssetSource {
    pub fn new(mesh: &str, texture: &str, scale: f32) -> Self {
        Self {
            mesh: mesh.into(),
            texture: texture.into(),
            scale,
        }
    }
}

/// Where the instances of a batch go.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Placement {
    /// One unrotated instance per translation.
    At(Vec<[f32; 3]>),
    /// `count` instances spread uniformly in the box `center ± half_extent`,
    /// each rotated by random angles in `[0, 1)` radians about x, y and z.
    Scatter {
        count: usize,
        seed: u64,
        center: [f32; 3],
        half_extent: [f32; 3],
    },
}

impl Placement {
    pub fn instances(&self) -> InstanceSet {
        match self {
            Placement::At(translations) => translations
                .iter()
                .map(|t| Matrix4::from_translation(Vector3::from(*t)))
                .collect(),
            Placement::Scatter {
                count,
                seed,
                center,
                half_extent,
            } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                (0..*count)
                    .map(|_| {
                        let mut offset = [0.0f32; 3];
                        for (axis, value) in offset.iter_mut().enumerate() {
                            *value = center[axis]
                                + half_extent[axis] * rng.gen_range(-1.0f32..=1.0);
                        }
                        Matrix4::from_translation(offset.into())
                            * Matrix4::from_angle_x(Rad(rng.gen_range(0.0f32..1.0)))
                            * Matrix4::from_angle_y(Rad(rng.gen_range(0.0f32..1.0)))
                            * Matrix4::from_angle_z(Rad(rng.gen_range(0.0f32..1.0)))
                    })
                    .collect()
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchDescription {
    pub source: AssetSource,
    #[serde(default)]
    pub pass: Pass,
    pub placement: Placement,
}

/// Everything the viewer loads at start-up. Batches are drawn in this order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    pub entity: Option<AssetSource>,
    pub batches: Vec<BatchDescription>,
}

impl Default for SceneDescription {
    fn default() -> Self {
        let sky = |count, seed| Placement::Scatter {
            count,
            seed,
            center: [0.0, 6.0, 0.0],
            half_extent: [15.0, 2.0, 15.0],
        };
        Self {
            entity: Some(AssetSource::new("zeppelin.obj", "zeppelin.png", 0.02)),
            batches: vec![
                BatchDescription {
                    source: AssetSource::new("tree.obj", "tree.png", 4.0),
                    pass: Pass::Opaque,
                    placement: Placement::At(vec![[0.0, -10.0, 0.0]]),
                },
                BatchDescription {
                    source: AssetSource::new("nokia.obj", "nokia.png", 0.003),
                    pass: Pass::Opaque,
                    placement: sky(20, 7),
                },
                BatchDescription {
                    source: AssetSource::new("land.obj", "Cloud.png", 100.0),
                    pass: Pass::Opaque,
                    placement: Placement::At(vec![[0.0, -10.0, 0.0]]),
                },
                BatchDescription {
                    source: AssetSource::new("cloud.obj", "Cloud.png", 0.01),
                    pass: Pass::Translucent,
                    placement: sky(20, 11),
                },
            ],
        }
    }
}

/// A pointer capture change the host has to carry out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerRequest {
    Capture,
    Release,
}

/// All per-session state of the viewer. Nothing here is global, so several
/// scenes can live side by side.
#[derive(Debug)]
pub struct Scene {
    pub config: ViewerConfig,
    pub camera: Camera,
    pub projection: Projection,
    pub input: InputState,
    pub entity: Entity,
    queue: InputQueue,
    batches: Vec<InstanceBatch>,
    viewport: (u32, u32),
    pointer_requests: Vec<PointerRequest>,
}

impl Scene {
    pub fn new(config: ViewerConfig, viewport: (u32, u32)) -> Self {
        let camera = Camera::new(&config.camera);
        let projection = Projection::from_config(viewport.0, viewport.1, &config.projection);
        let entity = Entity::new(config.entity.clone(), config.camera.limits);
        Self {
            config,
            camera,
            projection,
            input: InputState::default(),
            entity,
            queue: InputQueue::default(),
            batches: Vec::new(),
            viewport,
            pointer_requests: Vec::new(),
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn batches(&self) -> &[InstanceBatch] {
        &self.batches
    }

    /// Buffer an event until the next tick.
    pub fn push_input(&mut self, event: InputEvent) {
        self.queue.push(event);
    }

    pub fn take_pointer_requests(&mut self) -> Vec<PointerRequest> {
        std::mem::take(&mut self.pointer_requests)
    }

    /// Turn loaded vertex data into a batch. A failed load is logged and skipped.
    pub fn add_mesh<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        description: &BatchDescription,
        data: anyhow::Result<VertexData>,
        texture: PendingTexture,
    ) -> bool {
        let source = &description.source;
        let data = match data {
            Ok(data) => data,
            Err(e) => {
                log::error!("skipping {}: {e:#}", source.mesh);
                return false;
            }
        };
        let mesh = MeshAsset::create(device, &source.mesh, &data, texture, source.scale);
        self.batches.push(InstanceBatch::new(
            mesh,
            description.placement.instances(),
            description.pass,
        ));
        true
    }

    /// Give the entity its mesh. Without one it still steers the camera.
    pub fn set_entity_mesh<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        source: &AssetSource,
        data: anyhow::Result<VertexData>,
        texture: PendingTexture,
    ) -> bool {
        match data {
            Ok(data) => {
                let mesh = MeshAsset::create(device, &source.mesh, &data, texture, source.scale);
                let model = self.entity.model_matrix();
                self.entity.attach(InstanceBatch::new(
                    mesh,
                    std::iter::once(model).collect(),
                    Pass::Opaque,
                ));
                true
            }
            Err(e) => {
                log::error!("entity mesh {} unavailable: {e:#}", source.mesh);
                false
            }
        }
    }

    pub fn frame_uniforms(&self) -> FrameUniforms {
        let mut camera = CameraUniform::new();
        camera.update_view_proj(&self.camera, &self.projection);
        FrameUniforms {
            camera,
            light: LightUniform::from(&self.config.light),
        }
    }

    /// Run one frame: update all state first, then draw.
    pub fn tick<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, dt: f32, viewport: (u32, u32)) {
        self.ingest_input();

        if viewport != self.viewport {
            self.viewport = viewport;
            self.projection.resize(viewport.0, viewport.1);
            device.set_viewport(viewport.0, viewport.1);
        }

        if let Some(batch) = self.entity.batch_mut() {
            batch.mesh.poll_texture(device);
        }
        for batch in &mut self.batches {
            batch.mesh.poll_texture(device);
        }

        let [r, g, b, a] = self.config.clear_colour;
        device.clear(wgpu::Color { r, g, b, a });

        let movement = self.input.movement(&self.config.input);
        self.entity.update(dt, movement, &mut self.camera);

        let uniforms = self.frame_uniforms();
        self.entity.render(device, &uniforms);
        for batch in self.batches.iter_mut().filter(|b| b.pass == Pass::Opaque) {
            batch.draw(device, &uniforms);
        }
        device.set_blend(BlendMode::PremultipliedOver);
        for batch in self.batches.iter_mut().filter(|b| b.pass == Pass::Translucent) {
            batch.draw(device, &uniforms);
        }
    }

    fn ingest_input(&mut self) {
        let events: Vec<InputEvent> = self.queue.drain().collect();
        for event in events {
            let Some(command) = self.input.apply(event, &self.config.input) else {
                continue;
            };
            match command {
                Command::Rotate { dx, dy } => self.camera.process_rotation(dx, dy),
                Command::Zoom(delta) => self.camera.process_zoom(delta),
                Command::ToggleSpotlight => self.entity.toggle_spotlight(),
                Command::CapturePointer => self.pointer_requests.push(PointerRequest::Capture),
                Command::ReleasePointer => self.pointer_requests.push(PointerRequest::Release),
            }
        }
    }
}

/// Load every mesh of `description` and start its texture decode.
///
/// Meshes that fail to load are left out; the rest of the scene still comes up.
pub async fn load_scene<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    loader: &TextureLoader,
    config: ViewerConfig,
    description: &SceneDescription,
    viewport: (u32, u32),
) -> Scene {
    let mut scene = Scene::new(config, viewport);
    if let Some(source) = &description.entity {
        let data = resources::load_mesh(&source.mesh).await;
        scene.set_entity_mesh(device, source, data, loader.load(&source.texture));
    }
    for batch in &description.batches {
        let data = resources::load_mesh(&batch.source.mesh).await;
        let texture = loader.load(&batch.source.texture);
        scene.add_mesh(device, batch, data, texture);
    }
    log::info!(
        "scene ready with {} of {} batches",
        scene.batches().len(),
        description.batches.len()
    );
    scene
}

/// GPU context and scene, created together once the window exists.
#[derive(Debug)]
pub struct AppState {
    pub(crate) ctx: Context,
    scene: Scene,
}

impl AppState {
    async fn new(
        window: Arc<Window>,
        config: ViewerConfig,
        description: SceneDescription,
        loader: TextureLoader,
    ) -> Result<Self, ViewerError> {
        let mut ctx = Context::new(window, &config).await?;
        let viewport = ctx.size();
        let scene = load_scene(&mut ctx, &loader, config, &description, viewport).await;
        Ok(Self { ctx, scene })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }

    fn apply_pointer_requests(&mut self) {
        let window = self.ctx.window().clone();
        for request in self.scene.take_pointer_requests() {
            match request {
                PointerRequest::Capture => {
                    let grabbed = window
                        .set_cursor_grab(CursorGrabMode::Locked)
                        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
                    match grabbed {
                        Ok(()) => {
                            window.set_cursor_visible(false);
                            self.scene.push_input(InputEvent::PointerCaptured(true));
                        }
                        Err(e) => log::warn!("cannot capture the pointer: {e}"),
                    }
                }
                PointerRequest::Release => {
                    if let Err(e) = window.set_cursor_grab(CursorGrabMode::None) {
                        log::warn!("cannot release the pointer: {e}");
                    }
                    window.set_cursor_visible(true);
                    self.scene.push_input(InputEvent::PointerCaptured(false));
                }
            }
        }
    }

    fn render(&mut self, dt: Duration) -> Result<(), wgpu::SurfaceError> {
        let viewport = self.ctx.size();
        self.scene.tick(&mut self.ctx, dt.as_secs_f32(), viewport);
        self.apply_pointer_requests();
        self.ctx.present()
    }
}

/// Delivered to the event loop once the asynchronous start-up on wasm finishes.
pub enum ViewerEvent {
    #[allow(dead_code)]
    Initialized(Box<AppState>),
    #[allow(dead_code)]
    Failed(ViewerError),
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: winit::event_loop::EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    // Taken once the window exists
    description: Option<SceneDescription>,
    state: Option<AppState>,
    clock: FrameClock,
}

impl App {
    fn new(
        event_loop: &EventLoop<ViewerEvent>,
        config: ViewerConfig,
        description: SceneDescription,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            description: Some(description),
            state: None,
            clock: FrameClock::new(),
        })
    }

    fn texture_loader(&self) -> TextureLoader {
        #[cfg(not(target_arch = "wasm32"))]
        {
            TextureLoader::new(self.async_runtime.handle().clone())
        }
        #[cfg(target_arch = "wasm32")]
        {
            TextureLoader::new()
        }
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(description) = self.description.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(&self.config.title);

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;
            window_attributes = window_attributes.with_canvas(find_canvas());
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("cannot create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        let init_future = AppState::new(window, self.config.clone(), description, self.texture_loader());

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok(state) => {
                    state.ctx.window().request_redraw();
                    self.state = Some(state);
                }
                Err(e) => {
                    log::error!("{e}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok(state) => ViewerEvent::Initialized(Box::new(state)),
                    Err(e) => ViewerEvent::Failed(e),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("event loop closed before the viewer was initialized");
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Initialized(state) => {
                // This is the message from our wasm `spawn_local`
                let mut state = *state;
                let size = state.ctx.window().inner_size();
                state.resize(size.width, size.height);
                state.ctx.window().request_redraw();
                self.state = Some(state);
            }
            // The canvas stays blank
            ViewerEvent::Failed(e) => log::error!("{e}"),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let Some(input) = input::translate_device_event(&event) {
            state.scene.push_input(input);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        if let Some(input) = input::translate_window_event(&event) {
            state.scene.push_input(input);
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.clock.tick();
                match state.render(dt) {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window().inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
                state.ctx.window().request_redraw();
            }
            _ => {}
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn find_canvas() -> Option<web_sys::HtmlCanvasElement> {
    use wasm_bindgen::JsCast;

    const CANVAS_ID: &str = "canvas";

    let canvas = web_sys::window()?
        .document()?
        .get_element_by_id(CANVAS_ID)?;
    canvas.dyn_into::<web_sys::HtmlCanvasElement>().ok()
}

/// Start the viewer and block until its window is closed.
pub fn run(config: ViewerConfig, description: SceneDescription) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {e}").into());
        }
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config, description)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_zero_then_wall_clock() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.state(), ClockState::Idle);
        let start = Instant::now();
        assert_eq!(clock.tick_at(start), Duration::ZERO);
        assert_eq!(clock.state(), ClockState::Running { last: start });
        let later = start + Duration::from_millis(16);
        assert_eq!(clock.tick_at(later), Duration::from_millis(16));
        assert_eq!(clock.tick_at(later + Duration::from_millis(20)), Duration::from_millis(20));
    }

    #[test]
    fn scatter_is_seeded_and_bounded() {
        let placement = Placement::Scatter {
            count: 20,
            seed: 7,
            center: [0.0, 6.0, 0.0],
            half_extent: [15.0, 2.0, 15.0],
        };
        let a = placement.instances();
        let b = placement.instances();
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);
        for m in a.matrices() {
            let t = m.w;
            assert!((-15.0..=15.0).contains(&t.x));
            assert!((4.0..=8.0).contains(&t.y));
            assert!((-15.0..=15.0).contains(&t.z));
        }
    }

    #[test]
    fn fixed_placement_translates_only() {
        let set = Placement::At(vec![[0.0, -10.0, 0.0], [1.0, 2.0, 3.0]]).instances();
        assert_eq!(set.len(), 2);
        assert_eq!(set.matrices()[1].w, cgmath::Vector4::new(1.0, 2.0, 3.0, 1.0));
    }

    #[test]
    fn default_scene_draws_clouds_last() {
        let description = SceneDescription::default();
        let last = description.batches.last().map(|b| b.pass);
        assert_eq!(last, Some(Pass::Translucent));
        assert!(description.batches[..3].iter().all(|b| b.pass == Pass::Opaque));
    }

    #[test]
    fn scene_description_reads_from_ron() {
        let text = r#"(
            entity: None,
            batches: [(
                source: (mesh: "rock.obj", texture: "rock.png", scale: 2.0),
                placement: At([(1.0, 0.0, 0.0)]),
            )],
        )"#;
        let description: SceneDescription = ron::from_str(text).unwrap();
        assert_eq!(description.batches[0].pass, Pass::Opaque);
        assert_eq!(description.batches[0].source.scale, 2.0);
    }
}
