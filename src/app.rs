use std::sync::Arc;

use anyhow::{Context, Result};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

use crate::camera::Camera;
use crate::cli::Cli;
use crate::core::{Clock, WgpuBackend, WinitController};
use crate::loaders::GltfImporter;
use crate::model::{FailurePolicy, Model};
use crate::shader::compile_or_builtin;
use crate::traits::RenderBackend;
use glam::Vec3;

/// Initial camera position, a few units back from the origin
const CAMERA_START: Vec3 = Vec3::new(0.0, 0.0, 3.0);

/// Compile the configured shader under the command-line failure policy
pub fn load_program<B: RenderBackend>(cli: &Cli, backend: &mut B) -> Result<B::Program> {
    let program = match cli.policy() {
        FailurePolicy::Abort => {
            let source = cli.shader_source()?;
            backend.compile_program(&source)?
        }
        FailurePolicy::Degrade => compile_or_builtin(backend, cli.shader_source())?,
    };
    Ok(program)
}

/// Load the configured model under the command-line failure policy
pub fn load_model<B: RenderBackend>(cli: &Cli, backend: &mut B) -> Result<Model<B>> {
    let options = cli.load_options();
    let model = match cli.policy() {
        FailurePolicy::Abort => Model::load(&cli.model, &GltfImporter, backend, &options)
            .with_context(|| format!("Failed to load model {:?}", cli.model))?,
        FailurePolicy::Degrade => Model::load_or_empty(&cli.model, &GltfImporter, backend, &options),
    };

    let summary = model.summary();
    log::info!(
        "Model ready: {} meshes, {} vertices, {} textures ({} references)",
        summary.meshes,
        summary.vertices,
        summary.textures,
        summary.texture_references
    );
    Ok(model)
}

struct Viewer {
    backend: WgpuBackend,
    program: <WgpuBackend as RenderBackend>::Program,
    model: Model<WgpuBackend>,
}

pub struct App {
    cli: Cli,
    window: Option<Arc<Window>>,
    viewer: Option<Viewer>,
    camera: Camera,
    controller: WinitController,
    clock: Clock,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(cli: Cli) -> Self {
        let mut camera = Camera::new(CAMERA_START, Vec3::Y);
        camera.movement_speed = cli.speed;
        camera.mouse_sensitivity = cli.sensitivity;

        Self {
            cli,
            window: None,
            viewer: None,
            camera,
            controller: WinitController::new(),
            clock: Clock::new(),
            error: None,
        }
    }

    fn init_viewer(&self, window: Arc<Window>) -> Result<Viewer> {
        let mut backend =
            pollster::block_on(WgpuBackend::new(window)).context("Failed to initialize renderer")?;
        let program = load_program(&self.cli, &mut backend)?;
        let model = load_model(&self.cli, &mut backend)?;
        Ok(Viewer {
            backend,
            program,
            model,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn render_frame(&mut self, event_loop: &ActiveEventLoop) {
        let delta = self.clock.tick();
        self.controller.frame_input(delta).apply_to(&mut self.camera);
        self.controller.reset_deltas();

        let Some(viewer) = &mut self.viewer else {
            return;
        };
        let backend = &mut viewer.backend;
        let program = &viewer.program;

        let aspect = backend.aspect_ratio();
        backend.set_mat4(program, "projection", self.camera.projection_matrix(aspect));
        backend.set_mat4(program, "view", self.camera.view_matrix());
        backend.set_mat4(program, "model", self.cli.model_matrix());
        viewer.model.draw(backend, program);

        match backend.present() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow::anyhow!("GPU out of memory"));
            }
            Err(e) => log::warn!("Render error: {}", e),
        }
    }
}

/// Grab and hide the cursor so mouse movement only steers the camera
///
/// Returns whether the grab succeeded; a grabbed cursor stops at the window
/// edge (or never moves when locked), so look input then comes from raw motion.
fn capture_cursor(window: &Window) -> bool {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Locked)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
    window.set_cursor_visible(false);
    match grabbed {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Could not grab cursor, using cursor position for look: {}", e);
            false
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("Model Viewer")
                .with_inner_size(winit::dpi::LogicalSize::new(self.cli.width, self.cli.height)),
        ) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };

        match self.init_viewer(window.clone()) {
            Ok(viewer) => self.viewer = Some(viewer),
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        }

        let grabbed = capture_cursor(&window);
        self.controller.set_raw_motion(grabbed);
        self.window = Some(window);
        // the model load blocks; don't feed its duration to the camera
        self.clock.reset();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        self.controller.process_event(&event);

        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(viewer) = &mut self.viewer {
                    viewer.backend.resize(size);
                }
            }
            WindowEvent::Focused(true) => {
                if let Some(window) = &self.window {
                    let grabbed = capture_cursor(window);
                    self.controller.set_raw_motion(grabbed);
                }
            }
            WindowEvent::RedrawRequested => self.render_frame(event_loop),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        self.controller.process_device_event(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Open the window and run the draw loop until it closes
pub fn run(cli: Cli) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(cli);
    event_loop.run_app(&mut app).context("Event loop error")?;

    match app.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
