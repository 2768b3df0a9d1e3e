//! Save/load (component L): in-memory game-screen snapshots and the
//! on-disk xor-scrambled save file.
//!
//! Two distinct mechanisms share this module, both grounded on
//! `saveload.cpp`: `GameScreens` is the in-engine screen-swap cache used
//! when a module presents more than one play area (`storeToGameScreen`/
//! `switchToGameScreen`), while [`SaveHeader`] plus [`save_scrambled`]/
//! [`load_scrambled`] are the on-disk persistence format described in §4.L
//! and §6 "Persistence".

use std::collections::HashMap;
use std::fmt;

use crate::engine::EngineState;
use crate::grid::Cell;
use crate::pool::Object;
use crate::vm::memory::Memory;

/// One compacted snapshot of a module's play area: the full grid plus every
/// live object, reindexed to consecutive ids.
#[derive(Debug, Clone)]
pub struct GameScreen {
    pub width: u32,
    pub height: u32,
    pub cells: Vec<Cell>,
    pub objects: Vec<Object>,
}

/// Reindexes every live object in `pool` to consecutive ids starting at 0,
/// remapping `owner` references (shadows, subtitle/attachment children) to
/// match, so the snapshot is independent of the pool's internal slot
/// positions at the moment it was taken.
fn compact_objects(pool: &crate::pool::ObjectPool) -> Vec<Object> {
    let live: Vec<&Object> = pool.iter().filter(|o| o.is_live()).collect();
    let remap: HashMap<usize, usize> = live.iter().enumerate().map(|(new_idx, o)| (o.index, new_idx)).collect();
    live.iter()
        .map(|&o| {
            let mut c = o.clone();
            c.index = remap[&o.index];
            c.owner = o.owner.and_then(|old| remap.get(&old).copied());
            c
        })
        .collect()
}

/// The in-engine cache of game screens, keyed by screen id. Not persisted
/// to disk on its own; it is what `storeToGameScreen`/`switchToGameScreen`
/// operate on while the engine is running (e.g. swapping between an
/// overworld and a building interior without reloading the module).
#[derive(Default)]
pub struct GameScreens {
    screens: HashMap<u32, GameScreen>,
}

impl GameScreens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots `state`'s current grid and compacted object vector under `id`.
    pub fn store(&mut self, id: u32, state: &EngineState) {
        let screen = GameScreen {
            width: state.grid.width(),
            height: state.grid.height(),
            cells: state.grid.cells().to_vec(),
            objects: compact_objects(&state.pool),
        };
        self.screens.insert(id, screen);
    }

    /// Restores the screen previously stored under `id` into `state`,
    /// re-allocating objects in the pool with identity indices (the
    /// compacted index from `store` becomes the pool slot index again) and
    /// clearing accumulated dirty rects so the caller composes a full
    /// repaint of the restored frame. Returns `false` if no screen was
    /// ever stored under `id`.
    pub fn switch(&mut self, id: u32, state: &mut EngineState) -> bool {
        let Some(screen) = self.screens.get(&id) else {
            return false;
        };

        state.pool.clear();
        state.grid = crate::grid::Grid::new(screen.width, screen.height);
        state.grid.cells_mut().copy_from_slice(&screen.cells);

        for obj in &screen.objects {
            let idx = state.pool.get_free_object();
            if let Some(slot) = state.pool.get_mut(idx) {
                *slot = obj.clone();
            }
        }

        state.dirty.clear();
        true
    }

    pub fn contains(&self, id: u32) -> bool {
        self.screens.contains_key(&id)
    }
}

/// Header size in bytes, per §4.L "~76-byte header" (0x4C = 76).
pub const HEADER_SIZE: usize = 0x4C;

/// The on-disk save header. The first four bytes are always the
/// engine-supplied state-extension string (§6 "Persistence"); the
/// remainder carries the handful of scalars the reference keeps alongside
/// the scrambled VM regions (engine flags, module/screen identity, scroll
/// position, key map). Bytes past the fields this crate names are reserved
/// and written as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveHeader {
    pub extension: [u8; 4],
    pub engine_flags: u32,
    pub module_id: u32,
    pub screen_id: u32,
    pub scroll_x: i32,
    pub scroll_y: i32,
    pub key_map: [u8; 12],
}

impl SaveHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.extension);
        buf[4..8].copy_from_slice(&self.engine_flags.to_le_bytes());
        buf[8..12].copy_from_slice(&self.module_id.to_le_bytes());
        buf[12..16].copy_from_slice(&self.screen_id.to_le_bytes());
        buf[16..20].copy_from_slice(&self.scroll_x.to_le_bytes());
        buf[20..24].copy_from_slice(&self.scroll_y.to_le_bytes());
        buf[24..36].copy_from_slice(&self.key_map);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, SaveError> {
        if buf.len() < HEADER_SIZE {
            return Err(SaveError::TruncatedHeader { available: buf.len() });
        }
        let mut extension = [0u8; 4];
        extension.copy_from_slice(&buf[0..4]);
        let mut key_map = [0u8; 12];
        key_map.copy_from_slice(&buf[24..36]);
        Ok(Self {
            extension,
            engine_flags: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            module_id: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            screen_id: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            scroll_x: i32::from_le_bytes(buf[16..20].try_into().unwrap()),
            scroll_y: i32::from_le_bytes(buf[20..24].try_into().unwrap()),
            key_map,
        })
    }
}

/// One `{pos, len}` VM memory range xored on persistence, as named by
/// resource types `0x7C..0x7E` (one [`ScrambleKey`] list per type).
#[derive(Debug, Clone, Copy)]
pub struct ScrambleKey {
    pub pos: u32,
    pub len: u32,
}

fn xor_buf(buf: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }
    for (i, b) in buf.iter_mut().enumerate() {
        *b ^= key[i % key.len()];
    }
}

/// Reads every range named by `sequences` out of `memory`, xors each with
/// `key`, and concatenates the results in sequence order — the scrambled
/// body that follows the header in a save file.
pub fn save_scrambled(memory: &mut Memory, sequences: &[Vec<ScrambleKey>; 3], key: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for seq in sequences {
        for k in seq {
            let mut buf = memory.read_mem_blocks(k.pos, k.len as usize);
            xor_buf(&mut buf, key);
            out.extend(buf);
        }
    }
    out
}

/// Inverse of [`save_scrambled`]: unscrambles `data` back into `memory` at
/// the positions named by `sequences`. Scramble key sequence 1 (resource
/// type `0x7D`) is zeroed rather than unscrambled, matching the reference's
/// observed (and otherwise unexplained) load behavior — see `DESIGN.md`.
pub fn load_scrambled(memory: &mut Memory, sequences: &[Vec<ScrambleKey>; 3], key: &[u8], data: &[u8]) -> Result<(), SaveError> {
    let mut cursor = 0usize;
    for (seq_idx, seq) in sequences.iter().enumerate() {
        for k in seq {
            let len = k.len as usize;
            let end = cursor + len;
            let chunk = data.get(cursor..end).ok_or(SaveError::TruncatedBody {
                wanted: end,
                available: data.len(),
            })?;
            if seq_idx == 1 {
                memory.write_memory(k.pos, &vec![0u8; len]);
            } else {
                let mut buf = chunk.to_vec();
                xor_buf(&mut buf, key);
                memory.write_memory(k.pos, &buf);
            }
            cursor = end;
        }
    }
    Ok(())
}

/// Errors raised while reading or writing the on-disk save format.
#[derive(Debug)]
pub enum SaveError {
    /// The file was shorter than [`HEADER_SIZE`].
    TruncatedHeader { available: usize },
    /// A scrambled region's declared range ran past the end of the file.
    TruncatedBody { wanted: usize, available: usize },
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedHeader { available } => {
                write!(f, "save header truncated: wanted {HEADER_SIZE} bytes, have {available}")
            }
            Self::TruncatedBody { wanted, available } => {
                write!(f, "save body truncated: wanted {wanted} bytes, have {available}")
            }
        }
    }
}

impl std::error::Error for SaveError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ObjectAction;

    #[test]
    fn header_round_trips() {
        let h = SaveHeader {
            extension: *b"SAV1",
            engine_flags: 7,
            module_id: 3,
            screen_id: 1,
            scroll_x: -5,
            scroll_y: 12,
            key_map: [9; 12],
        };
        let buf = h.encode();
        assert_eq!(buf.len(), HEADER_SIZE);
        let decoded = SaveHeader::decode(&buf).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn header_decode_rejects_truncated_input() {
        assert!(SaveHeader::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn scramble_round_trips_through_sequence_0_and_2() {
        let mut memory = Memory::new();
        memory.write_memory(0, &[1, 2, 3, 4]);
        memory.write_memory(100, &[5, 6]);
        let sequences: [Vec<ScrambleKey>; 3] = [
            vec![ScrambleKey { pos: 0, len: 4 }],
            vec![],
            vec![ScrambleKey { pos: 100, len: 2 }],
        ];
        let key = [0xAA, 0x55];
        let body = save_scrambled(&mut memory, &sequences, &key);

        let mut restored = Memory::new();
        load_scrambled(&mut restored, &sequences, &key, &body).unwrap();
        assert_eq!(restored.read_mem_blocks(0, 4), vec![1, 2, 3, 4]);
        assert_eq!(restored.read_mem_blocks(100, 2), vec![5, 6]);
    }

    #[test]
    fn scramble_sequence_1_is_zeroed_on_load() {
        let mut memory = Memory::new();
        memory.write_memory(50, &[9, 9, 9]);
        let sequences: [Vec<ScrambleKey>; 3] = [vec![], vec![ScrambleKey { pos: 50, len: 3 }], vec![]];
        let key = [0x11];
        let body = save_scrambled(&mut memory, &sequences, &key);

        let mut restored = Memory::new();
        restored.write_memory(50, &[1, 1, 1]);
        load_scrambled(&mut restored, &sequences, &key, &body).unwrap();
        assert_eq!(restored.read_mem_blocks(50, 3), vec![0, 0, 0]);
    }

    #[test]
    fn store_and_switch_round_trips_objects_and_grid() {
        let mut state = EngineState::new(4, 4, 1);
        let mut host = NoopHost(Memory::new());
        state.actions.insert(
            5,
            ObjectAction {
                unk1: 0x01,
                on_create: None,
                on_delete: None,
                actions: Vec::new(),
            },
        );
        state.set_cell(&mut host, 1, 2, 5, 0x2);

        let mut screens = GameScreens::new();
        screens.store(0, &state);

        state.reset_for_load();
        assert_eq!(state.pool.len(), 0);

        assert!(screens.switch(0, &mut state));
        assert_eq!(state.grid.get(1, 2).actor_id(), 5);
        assert_eq!(state.pool.len(), 1);
        assert!(state.pool.get(0).unwrap().is_live());
    }

    struct NoopHost(Memory);
    impl crate::vm::VmHost for NoopHost {
        fn memory(&mut self) -> &mut Memory {
            &mut self.0
        }
        fn call_func(&mut self, _vm: &mut crate::vm::VmThread, _func_id: u32) {}
    }
}
