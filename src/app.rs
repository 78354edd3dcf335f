use std::{cell::RefCell, rc::Rc};

use anyhow::{anyhow, Result};
use log::error;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{prelude::*, JsCast};
use web_sys::{window, HtmlCanvasElement};

use crate::game::{
    FrameClock, Game, GameState, InputEvent, Palette, BOARD_HEIGHT, BOARD_WIDTH,
};
use crate::hud::Hud;
use crate::renderer::{RectInstance, Renderer};

type EventQueue = Rc<RefCell<Vec<InputEvent>>>;
type RafHandle = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();

    let window = window().ok_or_else(|| JsValue::from_str("No window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document"))?;

    let canvas = document
        .get_element_by_id("game-canvas")
        .ok_or_else(|| JsValue::from_str("Missing canvas"))?
        .dyn_into::<HtmlCanvasElement>()?;

    let hud = Hud::new(&document)?;

    let input_queue: EventQueue = Rc::new(RefCell::new(Vec::new()));
    install_key_listeners(&window, &input_queue)?;

    match run(canvas, hud, input_queue).await {
        Ok(()) => Ok(()),
        Err(err) => {
            error!("{:#}", err);
            Err(JsValue::from_str(&format!("{err:#}")))
        }
    }
}

/// Translates browser key events into the game's input events. Key codes
/// outside the handled set never enter the queue; auto-repeat is dropped so
/// the game only sees discrete presses and releases.
fn install_key_listeners(window: &web_sys::Window, queue: &EventQueue) -> Result<(), JsValue> {
    let press_queue = queue.clone();
    let down_closure = Closure::wrap(Box::new(move |event: web_sys::KeyboardEvent| {
        if event.repeat() {
            return;
        }
        let input = match event.code().as_str() {
            "ArrowUp" => InputEvent::LiftPressed,
            "ArrowDown" => InputEvent::DropPressed,
            "Enter" => InputEvent::ConfirmPressed,
            "Space" => InputEvent::PausePressed,
            _ => return,
        };
        event.prevent_default();
        press_queue.borrow_mut().push(input);
    }) as Box<dyn FnMut(_)>);
    window.add_event_listener_with_callback("keydown", down_closure.as_ref().unchecked_ref())?;
    down_closure.forget();

    let release_queue = queue.clone();
    let up_closure = Closure::wrap(Box::new(move |event: web_sys::KeyboardEvent| {
        let input = match event.code().as_str() {
            "ArrowUp" => InputEvent::LiftReleased,
            "ArrowDown" => InputEvent::DropReleased,
            _ => return,
        };
        release_queue.borrow_mut().push(input);
    }) as Box<dyn FnMut(_)>);
    window.add_event_listener_with_callback("keyup", up_closure.as_ref().unchecked_ref())?;
    up_closure.forget();

    Ok(())
}

async fn run(canvas: HtmlCanvasElement, hud: Hud, input_queue: EventQueue) -> Result<()> {
    let win = window().ok_or_else(|| anyhow!("No window"))?;
    let performance = win.performance().ok_or_else(|| anyhow!("No performance"))?;

    let instance = wgpu::Instance::default();
    let surface = instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| {
            hud.set_error("WebGPU not available\nCheck browser support");
            anyhow!("WebGPU adapter not available")
        })?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
            },
            None,
        )
        .await
        .map_err(|e| anyhow!("Request device failed: {}", e))?;

    let (width, height) = canvas_size(&canvas);
    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = surface_caps
        .formats
        .iter()
        .find(|format| format.is_srgb())
        .copied()
        .unwrap_or(surface_caps.formats[0]);

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: width.max(1),
        height: height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        desired_maximum_frame_latency: 1,
        alpha_mode: wgpu::CompositeAlphaMode::Opaque,
        view_formats: vec![],
    };
    surface.configure(&device, &config);

    let renderer = Renderer::new(&device, surface_format)?;
    let game = Game::new(Palette::default());
    let clock = FrameClock::new(performance.now());

    let state = Rc::new(RefCell::new(AppState {
        surface,
        config,
        device,
        queue,
        renderer,
        game,
        hud,
        input_queue,
        canvas,
        clock,
    }));

    start_animation_loop(state)
}

/// Drives `AppState::frame` from `requestAnimationFrame`. The closure
/// holds itself through `RafHandle` so it can reschedule; on a fatal frame
/// error it simply stops rescheduling.
fn start_animation_loop(state: Rc<RefCell<AppState>>) -> Result<()> {
    let handle: RafHandle = Rc::new(RefCell::new(None));

    let loop_state = state;
    let loop_handle = handle.clone();
    let closure = Closure::wrap(Box::new(move |now: f64| {
        let frame_result = loop_state.borrow_mut().frame(now);
        if let Err(err) = frame_result {
            error!("Frame error: {err:#}");
            loop_state
                .borrow()
                .hud
                .set_error(&format!("WebGPU error\n{err:#}"));
            return;
        }
        if let Some(win) = window() {
            if let Some(cb) = loop_handle.borrow().as_ref() {
                if win
                    .request_animation_frame(cb.as_ref().unchecked_ref())
                    .is_err()
                {
                    error!("Failed to schedule animation frame");
                }
            }
        }
    }) as Box<dyn FnMut(f64)>);
    *handle.borrow_mut() = Some(closure);

    let win = window().ok_or_else(|| anyhow!("No window"))?;
    if let Some(cb) = handle.borrow().as_ref() {
        win.request_animation_frame(cb.as_ref().unchecked_ref())
            .map_err(|_| anyhow!("Failed to request animation frame"))?;
    }
    Ok(())
}

fn canvas_size(canvas: &HtmlCanvasElement) -> (u32, u32) {
    let width = canvas.client_width().max(1) as u32;
    let height = canvas.client_height().max(1) as u32;
    (width, height)
}

struct AppState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    renderer: Renderer,
    game: Game,
    hud: Hud,
    input_queue: EventQueue,
    canvas: HtmlCanvasElement,
    clock: FrameClock,
}

impl AppState {
    fn frame(&mut self, now: f64) -> Result<()> {
        self.apply_inputs();

        let due = self
            .clock
            .advance(now, self.game.state() == GameState::Running);
        for _ in 0..due.ticks {
            self.game.tick();
        }
        for _ in 0..due.spawns {
            self.game.spawn_gap();
        }

        self.hud.set_score(self.game.score(), self.game.high_score());
        self.hud.set_status(&self.game.status_text());

        self.resize_if_needed();

        let instances = board_instances(&self.game, self.config.width, self.config.height);
        match self.renderer.render(
            &self.surface,
            &self.device,
            &self.queue,
            &self.config,
            &instances,
        ) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                // Skip this frame silently.
            }
            Err(err) => return Err(anyhow!("Surface error: {err}")),
        }

        Ok(())
    }

    fn apply_inputs(&mut self) {
        let events: Vec<InputEvent> = self.input_queue.borrow_mut().drain(..).collect();
        for event in events {
            let before = self.game.state();
            self.game.handle_event(event);
            // A fresh start or a restart arms both schedules from zero; a
            // resume from pause keeps their remainders.
            if self.game.state() == GameState::Running
                && matches!(before, GameState::NotStarted | GameState::GameOver)
            {
                self.clock.rearm();
            }
        }
    }

    fn resize_if_needed(&mut self) {
        let (width, height) = canvas_size(&self.canvas);
        if width > 0 && height > 0 && (width != self.config.width || height != self.config.height) {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }
}

/// Maps the game's board-space rectangles onto the canvas, letterboxed and
/// centered at a uniform scale.
fn board_instances(game: &Game, screen_w: u32, screen_h: u32) -> Vec<RectInstance> {
    let scale_x = screen_w as f32 / BOARD_WIDTH as f32;
    let scale_y = screen_h as f32 / BOARD_HEIGHT as f32;
    let scale = scale_x.min(scale_y);
    let offset = [
        (screen_w as f32 - BOARD_WIDTH as f32 * scale) * 0.5,
        (screen_h as f32 - BOARD_HEIGHT as f32 * scale) * 0.5,
    ];

    game.draw_rects()
        .into_iter()
        .map(|rect| RectInstance {
            position: [
                rect.pos[0] * scale + offset[0],
                rect.pos[1] * scale + offset[1],
            ],
            size: [rect.size[0] * scale, rect.size[1] * scale],
            color: rect.color,
        })
        .collect()
}
