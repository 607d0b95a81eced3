//! Preview host: a winit window on its own thread that renders on demand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Sender};
use tracing::{debug, error, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::window::{Window, WindowBuilder};

use crate::gpu::{FrameStatus, MeshRenderer, RenderError, RendererOptions};
use crate::sync::{RedrawNotifier, RenderSyncBridge, Submitter};
use crate::tessellate::TopologyKey;
use crate::types::ControlGrid;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub title: String,
    pub size: (u32, u32),
    pub visible: bool,
    pub renderer: RendererOptions,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Mesh Gradient Preview".into(),
            size: (960, 640),
            visible: true,
            renderer: RendererOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
enum WindowCommand {
    SnapshotReady,
    SetSubdivisions(u32),
    Shutdown,
}

/// Forwards redraw requests into the event loop.
struct ProxyNotifier(Mutex<EventLoopProxy<WindowCommand>>);

impl RedrawNotifier for ProxyNotifier {
    fn request_redraw(&self) {
        let Ok(proxy) = self.0.lock() else {
            return;
        };
        // Fails only once the loop has exited; the producer finds out via `is_closed`.
        let _ = proxy.send_event(WindowCommand::SnapshotReady);
    }
}

/// Field order matters: the renderer's surface must drop before the window.
struct WindowState {
    renderer: MeshRenderer,
    window: Arc<Window>,
}

impl WindowState {
    fn draw(&mut self, elwt: &winit::event_loop::EventLoopWindowTarget<WindowCommand>) {
        match self.renderer.render() {
            Ok(FrameStatus::Presented) | Ok(FrameStatus::Idle) => {}
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.renderer.recover_surface();
                self.window.request_redraw();
            }
            Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                error!("surface out of memory; exiting preview");
                elwt.exit();
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                warn!("surface timeout; retrying next frame");
                self.window.request_redraw();
            }
            Err(RenderError::Surface(other)) => {
                warn!("surface error: {other:?}; retrying next frame");
                self.window.request_redraw();
            }
            Err(RenderError::Topology(err)) => {
                error!("failed to build mesh topology: {err}");
            }
        }
    }
}

pub struct WindowRuntime {
    proxy: EventLoopProxy<WindowCommand>,
    closed: Arc<AtomicBool>,
    grid_size: (u32, u32),
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl WindowRuntime {
    /// Opens the preview window and returns the producer handle for `grid`.
    pub fn spawn(config: ViewerConfig, grid: ControlGrid) -> Result<(Self, Submitter)> {
        TopologyKey::new(
            grid.dims().width(),
            grid.dims().height(),
            config.renderer.subdivisions,
        )
        .lattice_size()?;

        let grid_size = (grid.dims().width(), grid.dims().height());
        let closed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded(1);
        let thread_closed = closed.clone();
        let handle = thread::Builder::new()
            .name("meshgrad-window".into())
            .spawn(move || run_window_thread(config, grid, ready_tx, thread_closed))
            .map_err(|err| anyhow!("failed to spawn window thread: {err}"))?;

        let (proxy, submitter) = ready_rx
            .recv()
            .map_err(|err| anyhow!("window thread failed to initialise: {err}"))??;

        Ok((
            Self {
                proxy,
                closed,
                grid_size,
                join_handle: Some(handle),
            },
            submitter,
        ))
    }

    /// Whether the user closed the window or the event loop stopped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn set_subdivisions(&self, subdivisions: u32) -> Result<()> {
        let (width, height) = self.grid_size;
        TopologyKey::new(width, height, subdivisions).lattice_size()?;
        self.proxy
            .send_event(WindowCommand::SetSubdivisions(subdivisions))
            .map_err(|err| anyhow!(err))
    }

    pub fn shutdown(mut self) -> Result<()> {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.proxy.send_event(WindowCommand::Shutdown);
            handle
                .join()
                .map_err(|err| anyhow!("window thread panicked: {err:?}"))??;
        }
        Ok(())
    }
}

impl Drop for WindowRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.proxy.send_event(WindowCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

type Ready = Result<(EventLoopProxy<WindowCommand>, Submitter), anyhow::Error>;

fn run_window_thread(
    config: ViewerConfig,
    grid: ControlGrid,
    ready_tx: Sender<Ready>,
    closed: Arc<AtomicBool>,
) -> Result<()> {
    let result = run_event_loop(config, grid, &ready_tx, &closed);
    closed.store(true, Ordering::Release);
    if let Err(err) = &result {
        // Only delivered if the handshake has not happened yet.
        let _ = ready_tx.try_send(Err(anyhow!("{err:#}")));
    }
    result
}

fn run_event_loop(
    config: ViewerConfig,
    grid: ControlGrid,
    ready_tx: &Sender<Ready>,
    closed: &Arc<AtomicBool>,
) -> Result<()> {
    let mut builder = EventLoopBuilder::<WindowCommand>::with_user_event();
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        use winit::platform::wayland::EventLoopBuilderExtWayland;
        EventLoopBuilderExtWayland::with_any_thread(&mut builder, true);
    }

    #[cfg(any(
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    }
    let event_loop = builder
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let proxy = event_loop.create_proxy();

    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(config.size.0, config.size.1))
        .with_visible(config.visible)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let (bridge, submitter) =
        RenderSyncBridge::new(grid, ProxyNotifier(Mutex::new(proxy.clone())));
    let renderer = MeshRenderer::new(window.as_ref(), window.inner_size(), bridge, config.renderer)
        .map_err(|err| anyhow!("failed to initialise window renderer: {err:#}"))?;
    let mut state = WindowState { renderer, window };
    state.window.request_redraw();

    ready_tx
        .send(Ok((proxy, submitter)))
        .map_err(|_| anyhow!("window runtime dropped before the handshake"))?;
    debug!(
        width = config.size.0,
        height = config.size.1,
        subdivisions = config.renderer.subdivisions,
        "preview window ready"
    );

    let loop_closed = closed.clone();
    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            match event {
                Event::UserEvent(command) => match command {
                    WindowCommand::SnapshotReady => state.window.request_redraw(),
                    WindowCommand::SetSubdivisions(subdivisions) => {
                        match state.renderer.set_subdivisions(subdivisions) {
                            Ok(()) => state.window.request_redraw(),
                            Err(err) => error!("failed to change subdivisions: {err}"),
                        }
                    }
                    WindowCommand::Shutdown => elwt.exit(),
                },
                Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            loop_closed.store(true, Ordering::Release);
                            elwt.exit();
                        }
                        WindowEvent::Resized(new_size) => {
                            state.renderer.resize(new_size);
                            state.window.request_redraw();
                        }
                        WindowEvent::Occluded(false) => {
                            state.renderer.invalidate();
                            state.window.request_redraw();
                        }
                        WindowEvent::RedrawRequested => state.draw(elwt),
                        _ => {}
                    }
                }
                Event::LoopExiting => {
                    loop_closed.store(true, Ordering::Release);
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
