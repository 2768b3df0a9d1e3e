//! The fixed-tick driver (component K): the frame loop that samples input,
//! writes `RuntimeRegisters`, ticks the engine, composes a frame, and
//! presents it.
//!
//! Grounded on `frontend/src/emulator.rs`'s SDL2 event-pump/run_frame/
//! render_frame/present loop, generalized from a fixed 60Hz machine clock
//! to the module-declared `fps` the reference's `update()` loop reads from
//! `RuntimeRegisters::fps_addr`, clamped to `1..=50` per §4.K.

use std::time::{Duration, Instant};

use gamos_core::compositor::{compose_frame, DirtyRects, Rect, Surface};
use gamos_core::engine::EngineState;
use gamos_core::vm::VmHost;

use crate::host::{EngineHost, HostSignal};
use crate::input::InputLatch;
use crate::video::Video;

/// Ticks/second used until the module's own `0x12` registers say otherwise
/// (no `fps_addr` configured, or it reads back as 0).
const DEFAULT_FPS: u32 = 15;

/// Runs `state` to completion: a fixed-tick loop that ends only on a window
/// close, Escape, or a host-issued quit signal. Module reloads are handled
/// in-place by `reload` without returning control to the caller, matching
/// §4.K's "`update()` returns 2: driver re-enters `update()` for the new
/// module without tearing down the window".
pub fn run(
    sdl_context: &sdl2::Sdl,
    state: &mut EngineState,
    host: &mut EngineHost,
    mut reload: impl FnMut(u32, &mut EngineState, &mut EngineHost),
) {
    let sdl_video = sdl_context.video().expect("failed to init SDL video");
    let mut video = Video::new(&sdl_video, "gamos", state.grid.width().max(1), state.grid.height().max(1), 3);
    let mut event_pump = sdl_context.event_pump().expect("failed to get event pump");

    let mut background = Surface::new(1, 1);
    let mut screen = Surface::new(1, 1);
    refresh_surfaces(state, &mut background, &mut screen);
    state.dirty.add(full_rect(state));

    let mut input = InputLatch::new();

    'main: loop {
        for event in event_pump.poll_iter() {
            input.handle_event(&event);
        }
        if input.quit_requested {
            break 'main;
        }

        let should_tick = latch_registers(state, host, &input);
        input.clear_edges();

        let tick_started = Instant::now();
        if should_tick {
            state.tick(host);
        }

        if let Some(module_id) = reload_requested(state, host) {
            reload(module_id, state, host);
            refresh_surfaces(state, &mut background, &mut screen);
            state.dirty.add(full_rect(state));
            continue 'main;
        }
        if state.quit {
            break 'main;
        }

        present_frame(state, &background, &mut screen, &mut video);
        sleep_out_tick(state, host, tick_started);
    }
}

fn full_rect(state: &EngineState) -> Rect {
    Rect::new(0, 0, state.grid.width().max(1) as i32, state.grid.height().max(1) as i32)
}

/// A reload can be requested either by a `CALL_FUNC` callback (latched on
/// `host`) or by `EngineState::need_reload` set directly by a rule's
/// function phase; either source wins identically.
fn reload_requested(state: &mut EngineState, host: &mut EngineHost) -> Option<u32> {
    match host.take_signal() {
        HostSignal::ReloadModule(module_id) => return Some(module_id),
        HostSignal::Quit => {
            state.quit = true;
            return None;
        }
        HostSignal::None => {}
    }
    state.need_reload.take()
}

/// Writes the frame counter and input state into VM memory at the
/// addresses the module's `0x12` resource named, and returns whether
/// ticking should proceed (`pause_addr`'s byte is zero, or unset).
fn latch_registers(state: &EngineState, host: &mut EngineHost, input: &InputLatch) -> bool {
    let regs = state.registers;
    let mem = host.memory();

    if regs.frame_counter_addr != 0 {
        let v = mem.get_u32(regs.frame_counter_addr).wrapping_add(1);
        mem.set_u32(regs.frame_counter_addr, v);
    }
    if regs.key_down_addr != 0 {
        mem.set_u32(regs.key_down_addr, input.key_down_bits());
    }
    if regs.key_code_addr != 0 {
        mem.set_u8(regs.key_code_addr, input.last_key_code().unwrap_or(0));
    }
    if regs.pause_addr != 0 {
        mem.get_u8(regs.pause_addr) == 0
    } else {
        true
    }
}

fn effective_fps(state: &EngineState, host: &mut EngineHost) -> u32 {
    let addr = state.registers.fps_addr;
    if addr == 0 {
        return DEFAULT_FPS;
    }
    let fps = host.memory().get_u32(addr);
    if fps == 0 {
        DEFAULT_FPS
    } else {
        fps.clamp(1, 50)
    }
}

fn sleep_out_tick(state: &EngineState, host: &mut EngineHost, tick_started: Instant) {
    let fps = effective_fps(state, host);
    let budget = Duration::from_millis(1000 / fps as u64);
    let elapsed = tick_started.elapsed();
    if elapsed < budget {
        std::thread::sleep(budget - elapsed);
    }
}

/// Rebuilds `background`/`screen` to the current grid dimensions and
/// copies the module's background pixels in, called once up front and
/// again after every reload (a new module may change grid size).
fn refresh_surfaces(state: &EngineState, background: &mut Surface, screen: &mut Surface) {
    let (width, height) = (state.grid.width().max(1), state.grid.height().max(1));
    *background = Surface::new(width, height);
    *screen = Surface::new(width, height);
    if let Some(bg) = &state.background {
        if let Some(pixels) = &bg.image.pixels {
            let n = background.pixels.len().min(pixels.len());
            background.pixels[..n].copy_from_slice(&pixels[..n]);
        }
    }
}

fn present_frame(state: &mut EngineState, background: &Surface, screen: &mut Surface, video: &mut Video) {
    let mut dirty: DirtyRects = std::mem::replace(&mut state.dirty, DirtyRects::new());
    compose_frame(&mut dirty, background, screen, &state.pool, &state.sprites);
    state.dirty = dirty;

    let palette = state.background.as_ref().map(|b| b.palette).unwrap_or([[0u8; 3]; 256]);
    video.present(screen, &palette);
}
