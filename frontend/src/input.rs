//! The latched input state the fixed-tick driver samples once per tick.
//!
//! Grounded on `proc.h`'s `SystemProc` (`_act1`, `_act2`, `_mouseReported`,
//! `_mouseAct`, `_keyCodes[12]`), the concrete shape behind the external
//! interface's "keyboard events are latched by key-code indices 0..11 into
//! one of eight primary actions and four secondary actions" (§6). SDL2
//! event translation replaces the reference's `processMessage` as the
//! platform-specific half of the same latch.

use sdl2::event::Event;
use sdl2::keyboard::Scancode;

/// Secondary-action codes named by §6: primary-mousedown, primary-up,
/// secondary-up, reserved, deselect-active-player.
pub const ACT2_PRIMARY_DOWN: u8 = 0x81;
pub const ACT2_PRIMARY_UP: u8 = 0x82;
pub const ACT2_SECONDARY_UP: u8 = 0x83;
pub const ACT2_RESERVED: u8 = 0x84;
pub const ACT2_DESELECT: u8 = 0x8F;

/// The 12 key-code slots, bound to a scancode each. The reference's keymap
/// is itself module-configurable (resource `0x0F`, unread by this core); a
/// fixed digit-row binding stands in until that resource is consumed.
const KEY_SCANCODES: [Scancode; 12] = [
    Scancode::Num1,
    Scancode::Num2,
    Scancode::Num3,
    Scancode::Num4,
    Scancode::Num5,
    Scancode::Num6,
    Scancode::Num7,
    Scancode::Num8,
    Scancode::Num9,
    Scancode::Num0,
    Scancode::Minus,
    Scancode::Equals,
];

/// One tick's worth of sampled input: held movement direction, the last
/// primary/secondary action transitions, and the 12 latched key-code bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputLatch {
    /// Movement delta from held arrow keys, `-1..=1` per axis.
    pub act1_dx: i32,
    pub act1_dy: i32,
    /// Last secondary-action code observed since the previous sample, or 0.
    pub act2: u8,
    pub mouse_reported: bool,
    pub mouse_x: i32,
    pub mouse_y: i32,
    pub key_codes: [bool; 12],
    pub quit_requested: bool,
}

impl InputLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one SDL event into the latch. Movement and key-code bits are
    /// level-triggered (reflect current key state); `act2` and mouse
    /// position are edge-triggered and persist until the next sample.
    pub fn handle_event(&mut self, event: &Event) {
        match *event {
            Event::Quit { .. } => self.quit_requested = true,
            Event::KeyDown {
                scancode: Some(Scancode::Escape),
                ..
            } => self.act2 = ACT2_DESELECT,
            Event::KeyDown {
                scancode: Some(sc), ..
            } => self.set_key(sc, true),
            Event::KeyUp {
                scancode: Some(sc), ..
            } => self.set_key(sc, false),
            Event::MouseButtonDown { x, y, .. } => {
                self.mouse_reported = true;
                self.mouse_x = x;
                self.mouse_y = y;
                self.act2 = ACT2_PRIMARY_DOWN;
            }
            Event::MouseButtonUp { x, y, .. } => {
                self.mouse_reported = true;
                self.mouse_x = x;
                self.mouse_y = y;
                self.act2 = ACT2_PRIMARY_UP;
            }
            _ => {}
        }
    }

    fn set_key(&mut self, sc: Scancode, down: bool) {
        match sc {
            Scancode::Left => self.act1_dx = if down { -1 } else { 0 },
            Scancode::Right => self.act1_dx = if down { 1 } else { 0 },
            Scancode::Up => self.act1_dy = if down { -1 } else { 0 },
            Scancode::Down => self.act1_dy = if down { 1 } else { 0 },
            Scancode::Space if down => self.act2 = ACT2_SECONDARY_UP,
            _ => {
                if let Some(idx) = KEY_SCANCODES.iter().position(|&k| k == sc) {
                    self.key_codes[idx] = down;
                }
            }
        }
    }

    /// Packs the 12 key-code bits into a single word, matching
    /// `RuntimeRegisters::key_down_addr`'s VM cell layout (bit N set = key
    /// N currently held).
    pub fn key_down_bits(&self) -> u32 {
        self.key_codes
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, &down)| if down { acc | (1 << i) } else { acc })
    }

    /// The index (0..11) of the most recently pressed key-code slot, if any.
    pub fn last_key_code(&self) -> Option<u8> {
        self.key_codes.iter().position(|&d| d).map(|i| i as u8)
    }

    /// Clears the edge-triggered fields after a sample has been consumed by
    /// a tick; level-triggered fields (movement, key bits) are left intact.
    pub fn clear_edges(&mut self) {
        self.act2 = 0;
        self.mouse_reported = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_down_bits_reflects_held_keys() {
        let mut latch = InputLatch::new();
        latch.key_codes[0] = true;
        latch.key_codes[3] = true;
        assert_eq!(latch.key_down_bits(), 0b1001);
    }

    #[test]
    fn last_key_code_finds_lowest_held_index() {
        let mut latch = InputLatch::new();
        latch.key_codes[5] = true;
        latch.key_codes[7] = true;
        assert_eq!(latch.last_key_code(), Some(5));
    }

    #[test]
    fn clear_edges_resets_act2_and_mouse_reported_only() {
        let mut latch = InputLatch::new();
        latch.act2 = ACT2_PRIMARY_DOWN;
        latch.mouse_reported = true;
        latch.act1_dx = 1;
        latch.clear_edges();
        assert_eq!(latch.act2, 0);
        assert!(!latch.mouse_reported);
        assert_eq!(latch.act1_dx, 1);
    }
}
