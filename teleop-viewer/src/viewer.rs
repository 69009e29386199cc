//! Viewer window and event loop

use std::sync::Arc;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, Event, MouseButton, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, WindowBuilder},
};

use teleop_core::{Error, OrbitCamera, Result, Scene, Shape, KEY_ROTATE_STEP};
use teleop_gpu::{RenderConfig, SceneRenderer};

/// Viewport height is capped at 70% of the window height...
const HEIGHT_FRACTION: f32 = 0.7;
/// ...and never exceeds this many pixels
const MAX_VIEW_HEIGHT: f32 = 600.0;

const ORBIT_SENSITIVITY: f32 = 0.01;
const WHEEL_SENSITIVITY: f32 = 0.1;

/// Actions the viewer delegates to the shell
pub trait ShellHooks {
    /// Webcam still capture
    fn capture_screenshot(&mut self);
    /// 3D still capture; `None` when no draw surface was available
    fn capture_3d(&mut self, frame: Option<Vec<u8>>);
    fn toggle_recording(&mut self);
    fn toggle_screen_recording(&mut self);
    fn toggle_mirror(&mut self);
    fn toggle_audio(&mut self);
    fn download_latest_recording(&mut self);
    fn download_latest_screen_recording(&mut self);
    /// Called once per rendered frame; the shell surfaces metrics here
    fn on_frame(&mut self);
}

/// The interactive 3D viewer
pub struct Viewer {
    scene: Scene,
    camera: OrbitCamera,
    show_help: bool,
    fullscreen: bool,
    mouse_pressed: bool,
    last_mouse_pos: Option<PhysicalPosition<f64>>,
}

impl Viewer {
    /// Create a viewer seeded with the cube point cloud
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            camera: OrbitCamera::default(),
            show_help: true,
            fullscreen: false,
            mouse_pressed: false,
            last_mouse_pos: None,
        }
    }

    fn print_help() {
        log::info!("Controls:");
        log::info!("  Mouse drag     orbit camera");
        log::info!("  Mouse wheel    zoom");
        log::info!("  Arrow keys     rotate point cloud");
        log::info!("  + / -          zoom in/out");
        log::info!("  1 / 2 / 3      cube / sphere / circle");
        log::info!("  C              webcam screenshot");
        log::info!("  V              capture 3D view");
        log::info!("  R / S          toggle webcam / screen recording");
        log::info!("  D / X          download latest webcam / screen recording");
        log::info!("  M / A          mirror / audio toggle");
        log::info!("  F              fullscreen");
        log::info!("  H              toggle this help");
    }

    /// Viewport size for a window size: full width, capped height
    fn view_size(width: u32, height: u32) -> (u32, u32) {
        let view_height = (height as f32 * HEIGHT_FRACTION).min(MAX_VIEW_HEIGHT) as u32;
        (width.max(1), view_height.max(1))
    }

    fn handle_key(
        &mut self,
        key: &Key,
        window: &winit::window::Window,
        renderer: &mut SceneRenderer,
        hooks: &mut impl ShellHooks,
    ) {
        // Cloud manipulation keys are a no-op when the slot is empty
        let have_cloud = self.scene.cloud().is_some();

        match key {
            Key::Named(NamedKey::ArrowLeft) if have_cloud => {
                self.scene.rotate_cloud(0.0, -KEY_ROTATE_STEP);
            }
            Key::Named(NamedKey::ArrowRight) if have_cloud => {
                self.scene.rotate_cloud(0.0, KEY_ROTATE_STEP);
            }
            Key::Named(NamedKey::ArrowUp) if have_cloud => {
                self.scene.rotate_cloud(-KEY_ROTATE_STEP, 0.0);
            }
            Key::Named(NamedKey::ArrowDown) if have_cloud => {
                self.scene.rotate_cloud(KEY_ROTATE_STEP, 0.0);
            }
            Key::Character(c) => match c.as_str() {
                "+" | "=" if have_cloud => self.camera.zoom_in_step(),
                "-" | "_" if have_cloud => self.camera.zoom_out_step(),
                "1" => self.scene.set_shape(Shape::Cube),
                "2" => self.scene.set_shape(Shape::Sphere),
                "3" => self.scene.set_shape(Shape::Circle),
                "c" | "C" => hooks.capture_screenshot(),
                "v" | "V" => {
                    let frame = match renderer.capture_frame(&self.scene, &self.camera) {
                        Ok(png) => Some(png),
                        Err(e) => {
                            log::debug!("no frame to capture: {}", e);
                            None
                        }
                    };
                    hooks.capture_3d(frame);
                }
                "r" | "R" => hooks.toggle_recording(),
                "s" | "S" => hooks.toggle_screen_recording(),
                "d" | "D" => hooks.download_latest_recording(),
                "x" | "X" => hooks.download_latest_screen_recording(),
                "m" | "M" => hooks.toggle_mirror(),
                "a" | "A" => hooks.toggle_audio(),
                "f" | "F" => {
                    self.fullscreen = !self.fullscreen;
                    window.set_fullscreen(
                        self.fullscreen.then(|| Fullscreen::Borderless(None)),
                    );
                }
                "h" | "H" => {
                    self.show_help = !self.show_help;
                    if self.show_help {
                        Self::print_help();
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    /// Run the viewer until the window closes.
    ///
    /// All input handlers live and die with this event loop; when it exits
    /// the renderer's GPU resources are released before the window.
    pub fn run(mut self, mut hooks: impl ShellHooks) -> Result<()> {
        let event_loop = EventLoop::new()
            .map_err(|e| Error::Visualization(format!("failed to create event loop: {}", e)))?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title("Teleop Dashboard")
                .with_inner_size(winit::dpi::LogicalSize::new(1200.0, 800.0))
                .build(&event_loop)
                .map_err(|e| Error::Visualization(format!("failed to create window: {}", e)))?,
        );

        let window_clone = window.clone();
        let mut renderer = pollster::block_on(SceneRenderer::new(
            &window_clone,
            RenderConfig::default(),
            &self.scene,
        ))?;

        let size = window.inner_size();
        let (view_w, view_h) = Self::view_size(size.width, size.height);
        renderer.resize(view_w, view_h);
        self.camera.set_aspect_ratio(view_w as f32 / view_h as f32);

        if self.show_help {
            Self::print_help();
        }

        event_loop
            .run(move |event, target| {
                target.set_control_flow(ControlFlow::Poll);

                match event {
                    Event::WindowEvent { event, .. } => match event {
                        WindowEvent::CloseRequested => {
                            target.exit();
                        }
                        WindowEvent::Resized(new_size) => {
                            let (w, h) = Self::view_size(new_size.width, new_size.height);
                            renderer.resize(w, h);
                            self.camera.set_aspect_ratio(w as f32 / h as f32);
                        }
                        WindowEvent::MouseInput { state, button, .. } => {
                            if button == MouseButton::Left {
                                self.mouse_pressed = state == ElementState::Pressed;
                            }
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            if let Some(last_pos) = self.last_mouse_pos {
                                if self.mouse_pressed {
                                    let delta_x = (position.x - last_pos.x) as f32;
                                    let delta_y = (position.y - last_pos.y) as f32;
                                    self.camera.orbit(
                                        delta_x * ORBIT_SENSITIVITY,
                                        -delta_y * ORBIT_SENSITIVITY,
                                    );
                                }
                            }
                            self.last_mouse_pos = Some(position);
                        }
                        WindowEvent::MouseWheel { delta, .. } => {
                            let scroll_delta = match delta {
                                winit::event::MouseScrollDelta::LineDelta(_, y) => y,
                                winit::event::MouseScrollDelta::PixelDelta(pos) => {
                                    pos.y as f32 / 100.0
                                }
                            };
                            self.camera.zoom(scroll_delta * WHEEL_SENSITIVITY);
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state == ElementState::Pressed {
                                let key = event.logical_key.clone();
                                self.handle_key(&key, &window, &mut renderer, &mut hooks);
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            self.camera.update();
                            self.scene.tick();
                            if let Err(e) = self.renderer_draw(&mut renderer) {
                                log::error!("render error: {}", e);
                            }
                            hooks.on_frame();
                            window.request_redraw();
                        }
                        _ => {}
                    },
                    _ => {}
                }
            })
            .map_err(|e| Error::Visualization(format!("event loop error: {}", e)))?;

        Ok(())
    }

    fn renderer_draw(&self, renderer: &mut SceneRenderer) -> Result<()> {
        renderer.render(&self.scene, &self.camera)
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_height_capped_at_70_percent() {
        let (w, h) = Viewer::view_size(1200, 500);
        assert_eq!(w, 1200);
        assert_eq!(h, 350);
    }

    #[test]
    fn view_height_never_exceeds_600() {
        let (_, h) = Viewer::view_size(1920, 2000);
        assert_eq!(h, 600);
    }

    #[test]
    fn view_size_never_zero() {
        let (w, h) = Viewer::view_size(0, 0);
        assert!(w >= 1 && h >= 1);
    }
}
