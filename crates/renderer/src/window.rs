use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::backend::RedrawScheduler;
use crate::frame::TickOutcome;
use crate::gpu::WgpuBackend;
use crate::scene::{Scene, SceneDescription};
use crate::types::{RendererConfig, SurfaceSize};

/// Forwards redraw registrations to the host, holding them while the window is occluded.
struct WindowScheduler<F> {
    request_redraw: F,
    occluded: bool,
    deferred: bool,
}

impl<F: FnMut()> WindowScheduler<F> {
    fn new(request_redraw: F) -> Self {
        Self {
            request_redraw,
            occluded: false,
            deferred: false,
        }
    }

    fn set_occluded(&mut self, occluded: bool) {
        self.occluded = occluded;
        if !occluded && std::mem::take(&mut self.deferred) {
            tracing::debug!("window visible again; resuming redraws");
            (self.request_redraw)();
        }
    }
}

impl<F: FnMut()> RedrawScheduler for WindowScheduler<F> {
    fn schedule_redraw(&mut self) {
        if self.occluded {
            tracing::trace!("window occluded; deferring redraw");
            self.deferred = true;
        } else {
            (self.request_redraw)();
        }
    }
}

/// Opens a window, sets the scene up on a wgpu backend, and runs it until closed.
pub fn run_window(description: SceneDescription, config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let (width, height) = config.surface_size;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(width, height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut backend = WgpuBackend::new(window.clone(), config.antialiasing)
        .context("failed to initialise GPU backend")?;
    let mut scene = Scene::setup(&mut backend, description, &config)?;
    let redraw_window = window.clone();
    let mut scheduler = WindowScheduler::new(move || redraw_window.request_redraw());
    let size = backend.size();
    scene.start(&mut backend, &mut scheduler, size)?;

    let mut scene = Some(scene);
    let run_result = event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        let Event::WindowEvent { window_id, event } = event else {
            return;
        };
        if window_id != window.id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                if let Some(scene) = scene.take() {
                    scene.release(&mut backend);
                }
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                if let Some(scene) = scene.take() {
                    scene.release(&mut backend);
                }
                elwt.exit();
            }
            WindowEvent::Occluded(occluded) => {
                scheduler.set_occluded(occluded);
            }
            WindowEvent::Resized(new_size) => {
                let size = SurfaceSize::new(new_size.width, new_size.height);
                backend.resize(size);
                let size = backend.size();
                if let Some(scene) = scene.as_mut() {
                    if let Err(err) = scene.resize(&mut backend, size) {
                        tracing::warn!(error = %err, "failed to update projection after resize");
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(active) = scene.as_mut() {
                    if active.tick(&mut backend, &mut scheduler) == TickOutcome::Stopped {
                        tracing::info!("frame loop stopped; closing window");
                        if let Some(stopped) = scene.take() {
                            stopped.release(&mut backend);
                        }
                        elwt.exit();
                    }
                }
            }
            _ => {}
        }
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
