//! The aggregate engine state — the "globals → state object" design note.
//!
//! The reference threads dozens of module-scope mutables (`PTR_00417218` the
//! active object, `BYTE_004177f6` the current orientation, `_preprocDataId`
//! the active transform, the scratch grid coordinates) through every
//! component entry point. This crate collects them into one `EngineState`
//! value owned by the caller (the module loader on load, the fixed-tick
//! driver on every tick) and passed by mutable reference to the interpreter,
//! compositor, and pathing modules instead.

use std::cell::Cell as StdCell;
use std::collections::HashMap;

use crate::compositor::DirtyRects;
use crate::grid::Grid;
use crate::interpreter::{self, RuleContext, Rng};
use crate::pool::ObjectPool;
use crate::rules::{Actions, ObjectAction};
use crate::save::ScrambleKey;
use crate::sprite::{BackgroundImage, Sprite};
use crate::vm::VmHost;

/// Resource type `0x12`'s runtime register block: VM memory addresses the
/// driver polls or writes every tick (frame counter, FPS, key state).
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeRegisters {
    pub frame_counter_addr: u32,
    pub fps_addr: u32,
    pub key_down_addr: u32,
    pub key_code_addr: u32,
    /// "blk12" in §4.K: a fifth address some modules append to the `0x12`
    /// body. A non-zero byte there pauses ticking. 0 (absent) disables the
    /// gate; see `DESIGN.md` for why this isn't folded into the 4-field
    /// shape the resource body documents.
    pub pause_addr: u32,
}

/// Resource type `0x10`'s main header: the module's nominal grid size and
/// its initial PRNG seed, recorded for reference; [`EngineState::grid`] is
/// sized by the caller before a load, not resized here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleHeader {
    pub width: u32,
    pub height: u32,
    pub seed: u32,
    pub flags: u32,
}

/// Per-actor-id `ObjectAction` tables, populated by the module loader as it
/// dispatches resource types `0x20`-`0x2C`.
#[derive(Default)]
pub struct ActionTable {
    entries: HashMap<u8, ObjectAction>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, act_id: u8, action: ObjectAction) {
        self.entries.insert(act_id, action);
    }

    pub fn get(&self, act_id: u8) -> Option<ObjectAction> {
        self.entries.get(&act_id).cloned()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Everything one module's worth of play state touches except VM memory
/// itself: the tile grid, the object pool, the rule PRNG, the per-actor
/// action tables, and the handful of scalars the reference keeps as
/// file-scope statics. VM memory lives behind the [`VmHost`] every method
/// here takes, not in this struct — the module loader writes bytecode and
/// scratch data through the same `host.memory()` the interpreter later
/// reads scripts from, so the two can never disagree about what's loaded.
pub struct EngineState {
    pub grid: Grid,
    pub pool: ObjectPool,
    pub rng: Rng,
    pub actions: ActionTable,
    pub dirty: DirtyRects,
    /// Set by a `CALL_FUNC` callback ("reload module") to abort every
    /// running VM instance and unwind every in-flight rule walk.
    pub interrupt: StdCell<bool>,
    /// Module id requested by a reload callback, consumed by the driver's
    /// `update()` re-entry once every call stack has unwound.
    pub need_reload: Option<u32>,
    /// Set by a `CALL_FUNC` callback to request a full shutdown (`update()`
    /// returning 0 in §4.K). Consumed and cleared by the driver.
    pub quit: bool,
    /// `PTR_00417218` in the reference: the unique live object with
    /// behavior class 3 (player), which receives input and is swept first.
    pub active_object: Option<usize>,
    /// `_preprocDataId`: the geometric transform currently applied to every
    /// neighbor/move/spawn offset, set by the active object's orientation.
    pub preproc_data_id: u8,
    /// Resource type `0x10`, set once per load.
    pub header: ModuleHeader,
    /// Resource type `0x12`, set once per load.
    pub registers: RuntimeRegisters,
    /// Resource type `0x18`, the module's single background/palette pair.
    pub background: Option<BackgroundImage>,
    /// Resource types `0x40..0x43`, keyed by sprite id.
    pub sprites: HashMap<u8, Sprite>,
    /// Resource types `0x38..0x3A`, keyed by family id: the member actor id
    /// list consulted by [`Entry::is_family_index`](crate::rules::Entry::is_family_index)
    /// resolution in the interpreter.
    pub families: HashMap<u8, Vec<u8>>,
    /// Resource types `0x7C..0x7E`, the three key sequences save/load reads.
    pub scramble_sequences: [Vec<ScrambleKey>; 3],
    /// Resource types `0x50..0x52`/`0x60..0x61`: raw payloads for the audio
    /// and subtitle externals this core only schedules, never decodes.
    pub audio_blobs: HashMap<u8, Vec<u8>>,
    pub caption_blobs: HashMap<u8, Vec<u8>>,
    depth: u32,
}

impl EngineState {
    pub fn new(width: u32, height: u32, seed: u32) -> Self {
        Self {
            grid: Grid::new(width, height),
            pool: ObjectPool::new(),
            rng: Rng::new(seed),
            actions: ActionTable::new(),
            dirty: DirtyRects::new(),
            interrupt: StdCell::new(false),
            need_reload: None,
            quit: false,
            active_object: None,
            preproc_data_id: 0,
            header: ModuleHeader::default(),
            registers: RuntimeRegisters::default(),
            background: None,
            sprites: HashMap::new(),
            families: HashMap::new(),
            scramble_sequences: [Vec::new(), Vec::new(), Vec::new()],
            audio_blobs: HashMap::new(),
            caption_blobs: HashMap::new(),
            depth: 0,
        }
    }

    /// Clears every piece of per-module state, as a module load does before
    /// dispatching resources into the empty state (§3 "Lifecycle").
    pub fn reset_for_load(&mut self) {
        self.grid.clear();
        self.pool.clear();
        self.actions.clear();
        self.dirty.clear();
        self.active_object = None;
        self.need_reload = None;
        self.quit = false;
        self.interrupt.set(false);
        self.header = ModuleHeader::default();
        self.registers = RuntimeRegisters::default();
        self.background = None;
        self.sprites.clear();
        self.families.clear();
        self.scramble_sequences = [Vec::new(), Vec::new(), Vec::new()];
        self.audio_blobs.clear();
        self.caption_blobs.clear();
        self.depth = 0;
    }

    /// Writes `(actor_id, orientation)` into the cell at `(x, y)`, running
    /// the outgoing resident's `onDelete` first and (for a non-inert,
    /// non-empty incoming actor) the new resident's `onCreate` after, per
    /// the reference's `setCell`. This is the only entry point that should
    /// place actors outside of a tick's rule evaluation (e.g. a loader
    /// dispatching a startup tile map).
    pub fn set_cell(&mut self, host: &mut dyn VmHost, x: i32, y: i32, actor_id: u8, orientation: u8) {
        let actions = &self.actions;
        let lookup = move |id: u8| actions.get(id);
        let families = &self.families;
        let family_lookup = move |id: u8| families.get(&id).map(|v| v.as_slice());
        let mut ctx = RuleContext {
            grid: &mut self.grid,
            pool: &mut self.pool,
            rng: &mut self.rng,
            host,
            interrupt: &self.interrupt,
            depth: &mut self.depth,
            preproc_data_id: self.preproc_data_id,
            actions: &lookup,
            families: &family_lookup,
        };
        interpreter::set_cell(&mut ctx, x, y, actor_id, orientation);
    }

    /// Runs one tick of rule evaluation: sweeps the object pool in index
    /// order starting from [`EngineState::active_object`] if set, walking
    /// each live rule-driven object's action list exactly once.
    pub fn tick(&mut self, host: &mut dyn VmHost) {
        let active_hint = self.active_object;
        let actions = &self.actions;
        let lookup = move |id: u8| actions.get(id);
        let families = &self.families;
        let family_lookup = move |id: u8| families.get(&id).map(|v| v.as_slice());
        let mut ctx = RuleContext {
            grid: &mut self.grid,
            pool: &mut self.pool,
            rng: &mut self.rng,
            host,
            interrupt: &self.interrupt,
            depth: &mut self.depth,
            preproc_data_id: self.preproc_data_id,
            actions: &lookup,
            families: &family_lookup,
        };
        interpreter::sweep_tick(&mut ctx, active_hint);
    }

    /// Interprets a module's startup rules (resource type `0x19`) with
    /// `absolute=true`, per §4.E.
    pub fn run_startup_rule(&mut self, host: &mut dyn VmHost, rule: &Actions) {
        let actions = &self.actions;
        let lookup = move |id: u8| actions.get(id);
        let families = &self.families;
        let family_lookup = move |id: u8| families.get(&id).map(|v| v.as_slice());
        let mut ctx = RuleContext {
            grid: &mut self.grid,
            pool: &mut self.pool,
            rng: &mut self.rng,
            host,
            interrupt: &self.interrupt,
            depth: &mut self.depth,
            preproc_data_id: self.preproc_data_id,
            actions: &lookup,
            families: &family_lookup,
        };
        interpreter::do_actions(&mut ctx, 0, 0, 0, rule, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ObjectAction;
    use crate::vm::memory::Memory;
    use crate::vm::VmThread;

    struct NoopHost(Memory);
    impl VmHost for NoopHost {
        fn memory(&mut self) -> &mut Memory {
            &mut self.0
        }
        fn call_func(&mut self, _vm: &mut VmThread, _func_id: u32) {}
    }

    #[test]
    fn reset_for_load_clears_everything() {
        let mut state = EngineState::new(8, 8, 1);
        let mut host = NoopHost(Memory::new());
        state.actions.insert(
            9,
            ObjectAction {
                unk1: 1,
                on_create: None,
                on_delete: None,
                actions: Vec::new(),
            },
        );
        state.set_cell(&mut host, 0, 0, 9, 0xF);
        assert_eq!(state.pool.len(), 1);

        state.reset_for_load();
        assert_eq!(state.pool.len(), 0);
        assert!(state.grid.get(0, 0).is_empty());
        assert!(state.actions.get(9).is_none());
    }

    #[test]
    fn set_cell_allocates_a_live_object() {
        let mut state = EngineState::new(8, 8, 1);
        let mut host = NoopHost(Memory::new());
        state.actions.insert(
            3,
            ObjectAction {
                unk1: 0x02,
                on_create: None,
                on_delete: None,
                actions: Vec::new(),
            },
        );
        state.set_cell(&mut host, 1, 1, 3, 0x1);
        assert_eq!(state.grid.get(1, 1).actor_id(), 3);
        assert_eq!(state.pool.len(), 1);
        assert!(state.pool.get(0).unwrap().is_live());
    }

    #[test]
    fn tick_runs_without_panicking_over_an_empty_pool() {
        let mut state = EngineState::new(4, 4, 1);
        let mut host = NoopHost(Memory::new());
        state.tick(&mut host);
        assert_eq!(state.pool.len(), 0);
    }
}
