pub mod egui_host;
mod input;
mod timing;

use crate::assets::{self, AssetError, ModelFetch, TextureLibrary};
use crate::catalog::{Catalog, CatalogError};
use crate::config::AppConfig;
use crate::customize::{reconcile, CustomizerSession, HoverStyle};
use crate::host::{DesktopHost, HostServices, PrintOutcome, ShareRequest, Snapshot};
use crate::render::{pick, CameraController, Ray, RenderContext, RenderError};
use crate::resource::{ResourceFetcher, ResourceLocator};
use crate::scene::{MeshId, SceneGraph};
use crate::ui::{UiActions, UiState, UiView};
use egui_host::EguiHost;
use input::{DragMode, InputAction, InputState};
use timing::FrameTiming;

use glam::Vec2;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

/// Pixels of trackpad scroll that count as one wheel notch.
const PIXELS_PER_NOTCH: f32 = 50.0;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

pub struct App {
    config: AppConfig,
    catalog: Catalog,
    fetcher: ResourceFetcher,
    textures: TextureLibrary,
    scene: SceneGraph,
    pending_model: Option<ModelFetch>,
    session: CustomizerSession,
    hover_style: HoverStyle,
    reconciled_revision: Option<u64>,
    host: Box<dyn HostServices>,
    ui: UiState,
    window: Option<Arc<Window>>,
    egui: Option<EguiHost>,
    render: Option<RenderContext>,
    input: InputState,
    camera: CameraController,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
}

impl App {
    fn new(config: AppConfig, catalog: Catalog) -> Self {
        let fetcher = ResourceFetcher::new(config.base_dir.clone(), config.cache_path());
        let textures = TextureLibrary::new(fetcher.clone());
        let session = CustomizerSession::new(&catalog, config.defaults.clone());
        let hover_style = HoverStyle {
            emissive: config.viewer.hover_emissive.to_linear(),
            intensity: config.viewer.hover_intensity,
        };
        let timing = FrameTiming::new(config.window.title.clone());

        let mut app = Self {
            catalog,
            fetcher,
            textures,
            scene: SceneGraph::new("empty"),
            pending_model: None,
            session,
            hover_style,
            reconciled_revision: None,
            host: Box::new(DesktopHost::new()),
            ui: UiState::new(),
            window: None,
            egui: None,
            render: None,
            input: InputState::default(),
            camera: CameraController::from_bounds(None, config.viewer.frame_margin),
            timing,
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
            config,
        };
        app.load_scene();
        app
    }

    /// (Re)loads the configured model and frames it. Remote models download in
    /// the background and the scene stays empty until they arrive. A model that
    /// fails to load leaves an empty scene and an alert.
    fn load_scene(&mut self) {
        self.pending_model = None;
        match ResourceLocator::parse(&self.config.model) {
            Ok(ResourceLocator::Local(path)) => {
                let loaded = assets::load_model(&self.fetcher, &path, &mut self.textures);
                self.install_loaded(loaded);
            }
            Ok(remote @ ResourceLocator::Remote(_)) => {
                match ModelFetch::spawn(self.fetcher.clone(), remote) {
                    Ok(fetch) => {
                        log::info!("Downloading {} in the background", fetch.name());
                        self.install_scene(SceneGraph::new(fetch.name()));
                        self.pending_model = Some(fetch);
                    }
                    Err(err) => self.install_loaded(Err(err)),
                }
            }
            Err(err) => self.install_loaded(Err(err.into())),
        }
    }

    fn poll_pending_model(&mut self) {
        let Some(fetch) = &self.pending_model else {
            return;
        };
        let Some(result) = fetch.poll() else {
            return;
        };
        let name = fetch.name().to_string();
        self.pending_model = None;
        let loaded =
            result.and_then(|bytes| assets::load_model_slice(&name, &bytes, &mut self.textures));
        self.install_loaded(loaded);
    }

    fn install_loaded(&mut self, loaded: Result<SceneGraph, AssetError>) {
        let scene = match loaded {
            Ok(scene) => scene,
            Err(err) => {
                log::error!("Failed to load model '{}': {}", self.config.model, err);
                self.ui
                    .show_alert(format!("Could not load the house model.\n{}", err));
                SceneGraph::new("empty")
            }
        };
        self.install_scene(scene);
    }

    fn install_scene(&mut self, scene: SceneGraph) {
        self.scene = scene;
        self.timing
            .set_base_title(format!("{} - {}", self.config.window.title, self.scene.name));
        self.camera = CameraController::from_bounds(self.scene.bounds(), self.config.viewer.frame_margin)
            .with_damping(self.config.viewer.damping);
        self.reconciled_revision = None;
        if let Some(render) = &mut self.render {
            render.upload_scene(&self.scene);
        }
    }

    fn init_renderer(&mut self, window: Arc<Window>) -> Result<(), RenderError> {
        let mut render = pollster::block_on(RenderContext::new(window.clone(), &self.config.viewer))?;
        render.upload_scene(&self.scene);
        self.egui = Some(EguiHost::new(&window));
        self.render = Some(render);
        Ok(())
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn mesh_at(&self, cursor: Vec2) -> Option<MeshId> {
        let render = self.render.as_ref()?;
        let size = render.size();
        let viewport = Vec2::new(size.width as f32, size.height as f32);
        let ray = Ray::from_screen(cursor, viewport, self.camera.view_proj(render.aspect()))?;
        pick(&self.scene, &ray).map(|hit| hit.mesh)
    }

    fn pointer_over_ui(&self) -> bool {
        self.egui.as_ref().is_some_and(EguiHost::pointer_over_ui)
    }

    fn viewport_height(&self) -> f32 {
        self.render
            .as_ref()
            .map_or(1.0, |render| render.size().height as f32)
    }

    fn handle_pointer(&mut self, action: InputAction) {
        match action {
            InputAction::None => {}
            InputAction::Select(cursor) => {
                let picked = self.mesh_at(cursor).and_then(|id| self.scene.mesh(id));
                if let Some(mesh) = picked {
                    log::debug!("Picked {} ({})", mesh.name, mesh.id);
                    let (id, name) = (mesh.id, mesh.material_name().to_string());
                    self.session.select_part(&self.catalog, id, name);
                }
            }
            InputAction::Drag { mode, delta } => {
                let height = self.viewport_height();
                match mode {
                    DragMode::Orbit => self.camera.orbit(delta.x, delta.y, height),
                    DragMode::Pan => self.camera.pan(delta.x, delta.y, height),
                }
            }
            InputAction::Hover(cursor) => {
                let target = if self.pointer_over_ui() {
                    None
                } else {
                    self.mesh_at(cursor)
                };
                match target {
                    Some(id) => self.session.hover(id),
                    None => self.session.unhover(),
                }
            }
        }
    }

    fn reconcile_if_needed(&mut self) {
        let revision = self.session.revision();
        if self.reconciled_revision == Some(revision) {
            return;
        }
        reconcile(
            &mut self.scene,
            self.session.overrides(),
            self.session.hovered(),
            &mut self.textures,
            &self.hover_style,
        );
        self.reconciled_revision = Some(revision);
    }

    fn download(&mut self) {
        let Some(render) = &mut self.render else {
            return;
        };
        let image = match render.capture(&self.camera) {
            Ok(image) => image,
            Err(err) => {
                log::error!("Snapshot capture failed: {}", err);
                self.ui.show_alert(format!("Could not capture the view.\n{}", err));
                return;
            }
        };
        let stem = self
            .scene
            .name
            .rsplit_once('.')
            .map_or(self.scene.name.as_str(), |(stem, _)| stem);
        let snapshot = Snapshot {
            image,
            suggested_name: format!("{}.png", stem),
        };
        match self.host.print(&snapshot) {
            Ok(PrintOutcome::Saved(_) | PrintOutcome::Cancelled) => {}
            Err(err) => {
                log::error!("{}", err);
                self.ui.show_alert(err.to_string());
            }
        }
    }

    fn share(&mut self) {
        let url = match ResourceLocator::parse(&self.config.model) {
            Ok(ResourceLocator::Remote(url)) => Some(url),
            _ => None,
        };
        let request = ShareRequest {
            title: self.config.window.title.clone(),
            text: "Check out this house design!".to_string(),
            url,
        };
        if let Err(err) = self.host.share(&request) {
            self.ui.show_alert(err.to_string());
        }
    }

    fn reset(&mut self) {
        self.session.reset(&self.catalog);
        self.input.cancel_drag();
        self.load_scene();
    }

    fn frame(&mut self) {
        let frame_start = Instant::now();
        self.timing.update(self.window.as_deref(), frame_start);
        self.poll_pending_model();
        let finished = self.textures.poll();
        if !finished.is_empty() {
            log::debug!(
                "{} textures finished loading ({} of {} still in flight)",
                finished.len(),
                self.textures.in_flight(),
                self.textures.len()
            );
        }
        self.camera.update();

        let (Some(window), Some(egui)) = (self.window.clone(), self.egui.as_mut()) else {
            return;
        };
        let mut actions = UiActions::default();
        let ui = &mut self.ui;
        let textures = &mut self.textures;
        let ui_output = egui.run_ui(&window, |ctx| {
            let view = UiView {
                catalog: &self.catalog,
                session: &self.session,
                textures: &mut *textures,
                model_name: &self.scene.name,
            };
            actions = ui.draw(ctx, view);
        });

        actions.apply(&mut self.session, &self.catalog);
        self.reconcile_if_needed();

        if let Some(render) = &mut self.render {
            render.sync_materials(&self.scene, &self.textures);
            if let Err(err) = render.render(&self.camera, &ui_output) {
                log::warn!("Frame skipped: {}", err);
            }
        }
        self.timing
            .set_render_ms(frame_start.elapsed().as_secs_f32() * 1000.0);

        if actions.download {
            self.download();
        }
        if actions.share {
            self.share();
        }
        if actions.reset {
            self.reset();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.window.width, self.config.window.height))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };
        if let Err(err) = self.init_renderer(window.clone()) {
            log::error!("Failed to initialise renderer: {}", err);
            event_loop.exit();
            return;
        }
        self.update_target_frame_duration(&window);
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let consumed = match (&self.window, &mut self.egui) {
            (Some(window), Some(egui)) => egui.on_window_event(window, &event),
            _ => false,
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Focused(false) => {
                self.input.cancel_drag();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if !consumed
                    && event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(render) = &mut self.render {
                    render.resize(new_size);
                }
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let action = self
                    .input
                    .handle_cursor_moved(Vec2::new(position.x as f32, position.y as f32));
                self.handle_pointer(action);
            }
            WindowEvent::CursorLeft { .. } => {
                self.input.handle_cursor_left();
                self.session.unhover();
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let over_ui = consumed || self.pointer_over_ui();
                let action = self
                    .input
                    .handle_button(button, state == ElementState::Pressed, over_ui);
                self.handle_pointer(action);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if !consumed && !self.pointer_over_ui() {
                    let notches = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_NOTCH,
                    };
                    self.camera.zoom(notches);
                }
            }
            WindowEvent::RedrawRequested => {
                self.frame();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

fn load_catalog(config: &AppConfig) -> Result<Catalog, CatalogError> {
    let catalog = match config.catalog_path() {
        Some(path) => {
            log::info!("Loading catalog from {}", path.display());
            Catalog::load(&path)?
        }
        None => Catalog::builtin()?,
    };
    for warning in catalog.validate() {
        log::warn!("Catalog: {}", warning);
    }
    Ok(catalog)
}

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let catalog = load_catalog(&config)?;
    log::info!(
        "Catalog: {} swatches, {} room / {} tile / {} ceiling categories",
        catalog.palette.len(),
        catalog.textures.len(),
        catalog.tiles.len(),
        catalog.ceilings.len()
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, catalog);
    event_loop.run_app(&mut app)?;

    log::info!("Goodbye");
    Ok(())
}
