//! The module loader proper (component E).
//!
//! Grounded on the reference's per-module bootstrap loop: a stream of
//! command bytes read from directory `1` (the shared header stream) that,
//! on its first `0` command, switches to directory `2 + moduleId` (the
//! per-module stream) and, on its second `0`, ends the load. Three packed
//! int "registers" (`p1`, `p2`, `p3`) are set by commands `1..3` and read by
//! whichever resource type's handler needs them; `p3` in particular names a
//! script's entry offset within a just-dispatched bytecode chunk.
//!
//! Every other command either dispatches a just-read archive chunk under
//! the most recently named resource type (`4`, `0xFF`), skips an
//! intro-movie blob the core has no player for (`5`), unpacks a small
//! inlined mini-stream of fixed-size resources (`6`), or names the next
//! resource type and optionally its id (anything else, packed as
//! `(resType << 1) | hasId`).

use std::io::{Read, Seek};

use gamos_core::engine::{EngineState, ModuleHeader, RuntimeRegisters};
use gamos_core::save::ScrambleKey;
use gamos_core::sprite::{BackgroundImage, Image, ImagePos, Sprite};
use gamos_core::vm::VmHost;

use crate::rule_parser::{parse_actions, parse_object_descriptor};
use crate::LoaderError;

/// Resource types with a fixed-shape structured body, decoded directly
/// instead of handed to VM memory as raw bytecode.
mod res {
    pub const ENGINE_CONFIG: u8 = 0x0F;
    pub const MAIN_HEADER: u8 = 0x10;
    pub const ELEMENT_COUNTS: u8 = 0x11;
    pub const RUNTIME_REGISTERS: u8 = 0x12;
    pub const SCRATCH_DATA: u8 = 0x13;
    pub const BACKGROUND_IMAGE: u8 = 0x18;
    pub const STARTUP_RULES: u8 = 0x19;
    pub const ACTOR_DESCRIPTOR: u8 = 0x20;
    pub const ACTOR_CREATE_SCRIPT: u8 = 0x21;
    pub const ACTOR_DELETE_SCRIPT: u8 = 0x22;
    pub const RULE_TABLE_FIRST: u8 = 0x23;
    pub const RULE_TABLE_LAST: u8 = 0x2C;
    pub const FAMILY_TABLE_FIRST: u8 = 0x38;
    pub const FAMILY_TABLE_LAST: u8 = 0x3A;
    pub const SPRITE_META: u8 = 0x40;
    pub const SPRITE_SEQUENCE: u8 = 0x41;
    pub const SPRITE_FRAME: u8 = 0x42;
    pub const SPRITE_IMAGE: u8 = 0x43;
    pub const AUDIO_FIRST: u8 = 0x50;
    pub const AUDIO_LAST: u8 = 0x52;
    pub const CAPTION_FIRST: u8 = 0x60;
    pub const CAPTION_LAST: u8 = 0x61;
    pub const SCRAMBLE_FIRST: u8 = 0x7C;
    pub const SCRAMBLE_LAST: u8 = 0x7E;
}

/// The three packed-int registers commands `1..3` assign and resource
/// handlers read back.
#[derive(Debug, Clone, Copy, Default)]
struct Registers {
    p1: i32,
    p2: i32,
    p3: i32,
}

/// Decodes a module's load stream into `state`, running any `0x19` startup
/// rules immediately against `host` as they're encountered.
pub struct ModuleLoader;

impl ModuleLoader {
    pub fn load<R: Read + Seek>(
        archive: &mut gamos_core::archive::Archive<R>,
        module_id: u32,
        state: &mut EngineState,
        host: &mut dyn VmHost,
    ) -> Result<(), LoaderError> {
        log::debug!("loading module {module_id}");
        state.reset_for_load();
        host.memory().clear();
        archive.seek_dir(1)?;

        let mut regs = Registers::default();
        let mut last_res_type: Option<u8> = None;
        let mut last_id: Option<u32> = None;
        let mut last_chunk: Option<Vec<u8>> = None;
        let mut last_chunk_info = gamos_core::archive::ChunkInfo::default();
        let mut current_actor: u8 = 0;
        let mut current_sprite: u8 = 0;
        let mut loaded_cursor: u32 = 0;
        let mut switched_to_module = false;

        loop {
            let cmd = archive.read_u8()?;
            match cmd {
                0 => {
                    if !switched_to_module {
                        switched_to_module = true;
                        archive.seek_dir(2 + module_id as u8)?;
                        continue;
                    }
                    break;
                }
                1 => regs.p1 = archive.read_packed_int()?,
                2 => regs.p2 = archive.read_packed_int()?,
                3 => regs.p3 = archive.read_packed_int()?,
                4 => {
                    let chunk = archive.read_chunk()?;
                    let chunk_info = archive.last_chunk;
                    if let Some(res_type) = last_res_type {
                        dispatch(
                            res_type,
                            last_id,
                            &chunk,
                            chunk_info,
                            &regs,
                            &mut loaded_cursor,
                            &mut current_actor,
                            &mut current_sprite,
                            state,
                            host,
                        )?;
                    }
                    last_chunk = Some(chunk);
                    last_chunk_info = chunk_info;
                }
                5 => skip_movie_blob(archive)?,
                6 => {
                    let chunk = archive.read_chunk()?;
                    dispatch_inline_stream(&chunk, state)?;
                }
                0xFF => {
                    // Re-dispatch the most recently read chunk, possibly
                    // under a different resource type named since then —
                    // the reference uses this to attach several resources'
                    // worth of metadata to one physical chunk without
                    // re-reading it from disk.
                    if let Some(res_type) = last_res_type {
                        let body = last_chunk.clone().unwrap_or_default();
                        dispatch(
                            res_type,
                            last_id,
                            &body,
                            last_chunk_info,
                            &regs,
                            &mut loaded_cursor,
                            &mut current_actor,
                            &mut current_sprite,
                            state,
                            host,
                        )?;
                    }
                }
                other => {
                    let res_type = other >> 1;
                    let has_id = other & 1 != 0;
                    last_id = if has_id {
                        Some(archive.read_packed_int()? as u32)
                    } else {
                        None
                    };
                    last_res_type = Some(res_type);
                }
            }
        }

        Ok(())
    }
}

/// Command `5`: an intro-movie blob this core has no player for. Flag byte
/// `(flag & 0xEC) == 0xEC` introduces a `(flag & 3) + 1`-byte little-endian
/// size that the loader must skip past without decoding.
fn skip_movie_blob<R: Read + Seek>(archive: &mut gamos_core::archive::Archive<R>) -> Result<(), LoaderError> {
    let flag = archive.read_u8()?;
    if flag & 0xEC == 0xEC {
        let szsize = ((flag & 3) + 1) as usize;
        let size_bytes = archive.read_bytes(szsize)?;
        let mut size: u32 = 0;
        for (i, b) in size_bytes.iter().enumerate() {
            size |= (*b as u32) << (i * 8);
        }
        let _ = archive.read_bytes(size as usize)?;
    }
    Ok(())
}

/// Command `6`: an inlined compressed mini-stream of `{type:u8, len:u16,
/// payload}` entries, each dispatched through the same structured decoders
/// as a regular chunk. Used by the reference for a handful of small,
/// always-present resources (engine config, runtime registers) that don't
/// warrant a full directory round trip.
fn dispatch_inline_stream(chunk: &[u8], state: &mut EngineState) -> Result<(), LoaderError> {
    let mut pos = 0usize;
    while pos + 3 <= chunk.len() {
        let ty = chunk[pos];
        let len = u16::from_le_bytes([chunk[pos + 1], chunk[pos + 2]]) as usize;
        pos += 3;
        if pos + len > chunk.len() {
            return Err(LoaderError::Logic {
                res_type: ty,
                offset: pos,
                message: "loader2 inline stream entry overruns its chunk",
            });
        }
        let body = &chunk[pos..pos + len];
        pos += len;
        match ty {
            res::ENGINE_CONFIG => { /* engine/input config: no fields this core reads yet */ }
            res::MAIN_HEADER => apply_header(state, parse_header(body, ty)?),
            res::RUNTIME_REGISTERS => state.registers = parse_registers(body, ty)?,
            _ => { /* anything else inlined here has no structured meaning to this core */ }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn dispatch(
    res_type: u8,
    id: Option<u32>,
    body: &[u8],
    chunk_info: gamos_core::archive::ChunkInfo,
    regs: &Registers,
    loaded_cursor: &mut u32,
    current_actor: &mut u8,
    current_sprite: &mut u8,
    state: &mut EngineState,
    host: &mut dyn VmHost,
) -> Result<(), LoaderError> {
    use res::*;

    if let Some(id) = id {
        match res_type {
            ACTOR_DESCRIPTOR | ACTOR_CREATE_SCRIPT | ACTOR_DELETE_SCRIPT => *current_actor = id as u8,
            RULE_TABLE_FIRST..=RULE_TABLE_LAST => *current_actor = id as u8,
            SPRITE_META | SPRITE_SEQUENCE | SPRITE_FRAME | SPRITE_IMAGE => *current_sprite = id as u8,
            _ => {}
        }
    }

    match res_type {
        ENGINE_CONFIG => { /* engine/input config: consumed by the frontend, not the core */ }
        MAIN_HEADER => apply_header(state, parse_header(body, res_type)?),
        ELEMENT_COUNTS => { /* preallocation hint only; this core's pools grow on demand */ }
        RUNTIME_REGISTERS => state.registers = parse_registers(body, res_type)?,
        SCRATCH_DATA => host.memory().write_memory(regs.p1 as u32, body),
        BACKGROUND_IMAGE => state.background = Some(parse_background(body, res_type)?),
        STARTUP_RULES => {
            let rule = parse_actions(body, res_type)?;
            state.run_startup_rule(host, &rule);
        }
        ACTOR_DESCRIPTOR => {
            let mut action = parse_object_descriptor(body)?;
            // `0x21`/`0x22` may still arrive afterward and overwrite these.
            if let Some(existing) = state.actions.get(*current_actor) {
                action.actions = existing.actions;
            }
            state.actions.insert(*current_actor, action);
        }
        ACTOR_CREATE_SCRIPT => set_script_addr(state, *current_actor, body, res_type, true)?,
        ACTOR_DELETE_SCRIPT => set_script_addr(state, *current_actor, body, res_type, false)?,
        RULE_TABLE_FIRST..=RULE_TABLE_LAST => {
            let rule = parse_actions(body, res_type)?;
            let mut action = state.actions.get(*current_actor).unwrap_or_else(blank_object_action);
            action.actions.push(rule);
            state.actions.insert(*current_actor, action);
        }
        FAMILY_TABLE_FIRST..=FAMILY_TABLE_LAST => {
            state.families.insert(*current_actor, body.to_vec());
        }
        SPRITE_META => {
            let sprite = parse_sprite_meta(body, res_type)?;
            state.sprites.insert(*current_sprite, sprite);
        }
        SPRITE_SEQUENCE => add_sequence_slot(state, *current_sprite, body, res_type)?,
        SPRITE_FRAME => add_frame(state, *current_sprite, body, res_type)?,
        SPRITE_IMAGE => set_image(state, *current_sprite, body, chunk_info, res_type)?,
        AUDIO_FIRST..=AUDIO_LAST => {
            state.audio_blobs.insert(id.unwrap_or(0) as u8, body.to_vec());
        }
        CAPTION_FIRST..=CAPTION_LAST => {
            state.caption_blobs.insert(id.unwrap_or(0) as u8, body.to_vec());
        }
        SCRAMBLE_FIRST..=SCRAMBLE_LAST => {
            let seq = (res_type - SCRAMBLE_FIRST) as usize;
            state.scramble_sequences[seq] = parse_scramble_keys(body, res_type)?;
        }
        _ => {
            // Anything outside the documented table is a raw bytecode
            // resource: its payload lands in VM memory at the running
            // `loadedDataSize` cursor, and `cursor + p3` is recorded as its
            // script entrypoint for whichever structured resource named it.
            host.memory().write_memory(*loaded_cursor, body);
            let _entry_point = loaded_cursor.wrapping_add(regs.p3 as u32);
            *loaded_cursor = loaded_cursor.wrapping_add(body.len() as u32);
        }
    }
    Ok(())
}

fn blank_object_action() -> gamos_core::rules::ObjectAction {
    gamos_core::rules::ObjectAction {
        unk1: 0,
        on_create: None,
        on_delete: None,
        actions: Vec::new(),
    }
}

fn set_script_addr(
    state: &mut EngineState,
    actor: u8,
    body: &[u8],
    res_type: u8,
    create: bool,
) -> Result<(), LoaderError> {
    if body.len() < 4 {
        return Err(LoaderError::Logic {
            res_type,
            offset: 0,
            message: "create/delete script resource shorter than 4 bytes",
        });
    }
    let v = i32::from_le_bytes(body[0..4].try_into().unwrap());
    let addr = if v < 0 { None } else { Some(v as u32) };
    let mut action = state.actions.get(actor).unwrap_or_else(blank_object_action);
    if create {
        action.on_create = addr;
    } else {
        action.on_delete = addr;
    }
    state.actions.insert(actor, action);
    Ok(())
}

/// Installs a decoded `0x10` header: records it, resizes the grid to match
/// its declared dimensions (the only resource that names them) before any
/// tile-placing resource (startup rules, inline streams) can run against
/// it, and reseeds the rule PRNG from its declared initial seed so a
/// module's content is deterministic across loads.
fn apply_header(state: &mut EngineState, header: ModuleHeader) {
    if header.width != state.grid.width() || header.height != state.grid.height() {
        state.grid = gamos_core::grid::Grid::new(header.width, header.height);
    }
    state.rng = gamos_core::interpreter::Rng::new(header.seed);
    state.header = header;
}

/// `0x10`: `{width:u32, height:u32, seed:u32, flags:u32}`.
fn parse_header(body: &[u8], res_type: u8) -> Result<ModuleHeader, LoaderError> {
    let words = read_u32s(body, 4, res_type)?;
    Ok(ModuleHeader {
        width: words[0],
        height: words[1],
        seed: words[2],
        flags: words[3],
    })
}

/// `0x12`: `{frameCounterAddr, fpsAddr, keyDownAddr, keyCodeAddr}`, each a
/// `u32` VM memory address, with an optional trailing fifth `pauseAddr`
/// word some modules append (see `RuntimeRegisters::pause_addr`).
fn parse_registers(body: &[u8], res_type: u8) -> Result<RuntimeRegisters, LoaderError> {
    let words = read_u32s(body, 4, res_type)?;
    let pause_addr = if body.len() >= 20 {
        u32::from_le_bytes(body[16..20].try_into().unwrap())
    } else {
        0
    };
    Ok(RuntimeRegisters {
        frame_counter_addr: words[0],
        fps_addr: words[1],
        key_down_addr: words[2],
        key_code_addr: words[3],
        pause_addr,
    })
}

fn read_u32s(body: &[u8], count: usize, res_type: u8) -> Result<Vec<u32>, LoaderError> {
    if body.len() < count * 4 {
        return Err(LoaderError::Logic {
            res_type,
            offset: body.len(),
            message: "fixed-shape resource body shorter than expected",
        });
    }
    Ok((0..count)
        .map(|i| u32::from_le_bytes(body[i * 4..i * 4 + 4].try_into().unwrap()))
        .collect())
}

/// `0x18`: `{width:u16, height:u16}` followed by a 256*3-byte RGB palette,
/// then the raw (possibly archive-decompressed) pixel data.
fn parse_background(body: &[u8], res_type: u8) -> Result<BackgroundImage, LoaderError> {
    if body.len() < 4 + 256 * 3 {
        return Err(LoaderError::Logic {
            res_type,
            offset: body.len(),
            message: "background image resource shorter than its fixed header",
        });
    }
    let width = u16::from_le_bytes([body[0], body[1]]) as u32;
    let height = u16::from_le_bytes([body[2], body[3]]) as u32;
    let mut palette = [[0u8; 3]; 256];
    for (i, entry) in palette.iter_mut().enumerate() {
        let off = 4 + i * 3;
        *entry = [body[off], body[off + 1], body[off + 2]];
    }
    let pixels = body[4 + 256 * 3..].to_vec();
    Ok(BackgroundImage {
        image: Image {
            pixels: Some(pixels),
            offset: None,
            width,
            height,
            compressed_size: 0,
        },
        palette,
    })
}

/// `0x40`: `{imageCount:u16}` declares a fresh, all-default image table.
fn parse_sprite_meta(body: &[u8], res_type: u8) -> Result<Sprite, LoaderError> {
    if body.len() < 2 {
        return Err(LoaderError::Logic {
            res_type,
            offset: 0,
            message: "sprite meta resource shorter than 2 bytes",
        });
    }
    let count = u16::from_le_bytes([body[0], body[1]]) as usize;
    let mut sprite = Sprite::new();
    sprite.images = vec![Image::default(); count];
    Ok(sprite)
}

/// `0x41`: `{seqIndex:u8}` reserves an (initially empty) sequence slot; its
/// frames arrive one at a time as `0x42` resources.
fn add_sequence_slot(
    state: &mut EngineState,
    sprite_id: u8,
    body: &[u8],
    res_type: u8,
) -> Result<(), LoaderError> {
    if body.is_empty() {
        return Err(LoaderError::Logic {
            res_type,
            offset: 0,
            message: "sprite sequence resource is empty",
        });
    }
    let seq = body[0] as usize;
    if let Some(sprite) = state.sprites.get_mut(&sprite_id) {
        if let Some(slot) = sprite.sequences.get_mut(seq) {
            slot.clear();
        }
    }
    Ok(())
}

/// `0x42`: `{seqIndex:u8, dx:i8, dy:i8, imageIndex:u16}`.
fn add_frame(state: &mut EngineState, sprite_id: u8, body: &[u8], res_type: u8) -> Result<(), LoaderError> {
    if body.len() < 5 {
        return Err(LoaderError::Logic {
            res_type,
            offset: body.len(),
            message: "sprite frame resource shorter than 5 bytes",
        });
    }
    let seq = body[0] as usize;
    let dx = body[1] as i8 as i32;
    let dy = body[2] as i8 as i32;
    let image_index = u16::from_le_bytes([body[3], body[4]]) as usize;
    if let Some(sprite) = state.sprites.get_mut(&sprite_id) {
        if let Some(slot) = sprite.sequences.get_mut(seq) {
            slot.push(ImagePos { dx, dy, image_index });
        }
    }
    Ok(())
}

/// `0x43`: `{imageIndex:u16, width:u16, height:u16}` followed by the pixel
/// source. The source has already been decompressed by [`Archive::read_chunk`]
/// by the time it reaches this dispatcher, so the image is materialized
/// immediately rather than left for [`Sprite::load_image`]'s lazy path
/// (which remains available for a caller re-deriving pixels from a still-open
/// archive handle outside the load stream, e.g. on save/restore).
fn set_image(
    state: &mut EngineState,
    sprite_id: u8,
    body: &[u8],
    chunk_info: gamos_core::archive::ChunkInfo,
    res_type: u8,
) -> Result<(), LoaderError> {
    if body.len() < 6 {
        return Err(LoaderError::Logic {
            res_type,
            offset: body.len(),
            message: "sprite image resource shorter than its fixed header",
        });
    }
    let image_index = u16::from_le_bytes([body[0], body[1]]) as usize;
    let width = u16::from_le_bytes([body[2], body[3]]) as u32;
    let height = u16::from_le_bytes([body[4], body[5]]) as u32;
    let pixels = body[6..].to_vec();
    let Some(sprite) = state.sprites.get_mut(&sprite_id) else {
        return Ok(());
    };
    if image_index >= sprite.images.len() {
        sprite.images.resize(image_index + 1, Image::default());
    }
    sprite.images[image_index] = Image {
        pixels: Some(pixels),
        offset: Some(chunk_info.src_offset),
        width,
        height,
        compressed_size: chunk_info.decompressed_size.min(chunk_info.src_size),
    };
    Ok(())
}

/// `0x7C..0x7E`: a packed count followed by that many `{pos:u32, len:u32}` pairs.
fn parse_scramble_keys(body: &[u8], res_type: u8) -> Result<Vec<ScrambleKey>, LoaderError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let count = body[0] as usize;
    let mut out = Vec::with_capacity(count);
    let mut pos = 1usize;
    for _ in 0..count {
        if pos + 8 > body.len() {
            return Err(LoaderError::Logic {
                res_type,
                offset: pos,
                message: "scramble key sequence ran out of bytes",
            });
        }
        let key_pos = u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap());
        let key_len = u32::from_le_bytes(body[pos + 4..pos + 8].try_into().unwrap());
        out.push(ScrambleKey { pos: key_pos, len: key_len });
        pos += 8;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamos_core::vm::memory::Memory;
    use gamos_core::vm::VmThread;
    use std::io::Cursor;

    struct NoopHost(Memory);
    impl VmHost for NoopHost {
        fn memory(&mut self) -> &mut Memory {
            &mut self.0
        }
        fn call_func(&mut self, _vm: &mut VmThread, _func_id: u32) {}
    }

    /// Builds a two-directory archive (`1` and `2+moduleId`) the way
    /// `archive.rs`'s own round-trip test does: `{dirCount, dataOffset}`
    /// immediately followed by the entries, then the 12-byte trailer.
    /// `dir1`/`module_dir` are written verbatim — they are a raw command
    /// byte stream, not archive chunks, so nothing here adds chunk framing.
    fn archive_with_streams(dir1: &[u8], module_dir: &[u8], module_id: u32) -> gamos_core::archive::Archive<Cursor<Vec<u8>>> {
        let mut data = Vec::new();
        let mut entries = Vec::new();

        let off1 = data.len() as u32;
        data.extend_from_slice(dir1);
        entries.push((off1, 1u8));

        let off2 = data.len() as u32;
        data.extend_from_slice(module_dir);
        entries.push((off2, (2 + module_id) as u8));

        data.extend_from_slice(&(entries.len() as u32).to_le_bytes()); // dirCount
        data.extend_from_slice(&0u32.to_le_bytes()); // dataOffset
        for (offset, id) in &entries {
            data.extend_from_slice(&offset.to_le_bytes());
            data.push(*id);
        }
        let table_and_header_len = 8 + entries.len() as u32 * 5;
        data.extend_from_slice(&table_and_header_len.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0x3d53563du32.to_le_bytes());

        gamos_core::archive::Archive::open(Cursor::new(data)).unwrap()
    }

    #[test]
    fn empty_streams_load_without_error() {
        // dir1: one command byte `0` (switch), module dir: one `0` (end).
        let mut arc = archive_with_streams(&[0], &[0], 7);
        let mut state = EngineState::new(8, 8, 1);
        let mut host = NoopHost(Memory::new());
        ModuleLoader::load(&mut arc, 7, &mut state, &mut host).unwrap();
        assert_eq!(state.actions.get(0), None);
    }

    #[test]
    fn runtime_register_resource_populates_state() {
        let mut regs_body = Vec::new();
        regs_body.extend_from_slice(&0x1000u32.to_le_bytes());
        regs_body.extend_from_slice(&0x1004u32.to_le_bytes());
        regs_body.extend_from_slice(&0x1008u32.to_le_bytes());
        regs_body.extend_from_slice(&0x100Cu32.to_le_bytes());

        // dir1: name resource 0x12 with no id `(0x12<<1)|0`, dispatch the
        // chunk that immediately follows, then switch to the module dir.
        let mut dir1 = Vec::new();
        dir1.push((res::RUNTIME_REGISTERS << 1) | 0);
        dir1.push(4); // dispatch chunk
        dir1.push(0x80); // chunk tag: szsize=1, no compression
        dir1.push(regs_body.len() as u8);
        dir1.extend_from_slice(&regs_body);
        dir1.push(0); // switch to module dir

        let mut arc = archive_with_streams(&dir1, &[0], 0);
        let mut state = EngineState::new(4, 4, 1);
        let mut host = NoopHost(Memory::new());
        ModuleLoader::load(&mut arc, 0, &mut state, &mut host).unwrap();
        assert_eq!(state.registers.frame_counter_addr, 0x1000);
        assert_eq!(state.registers.key_code_addr, 0x100C);
    }

    #[test]
    fn inline_stream_populates_header() {
        let mut header_body = Vec::new();
        header_body.extend_from_slice(&16u32.to_le_bytes());
        header_body.extend_from_slice(&16u32.to_le_bytes());
        header_body.extend_from_slice(&42u32.to_le_bytes());
        header_body.extend_from_slice(&0u32.to_le_bytes());

        let mut inline = Vec::new();
        inline.push(res::MAIN_HEADER);
        inline.extend_from_slice(&(header_body.len() as u16).to_le_bytes());
        inline.extend_from_slice(&header_body);

        let mut state = EngineState::new(4, 4, 1);
        dispatch_inline_stream(&inline, &mut state).unwrap();
        assert_eq!(state.header.width, 16);
        assert_eq!(state.header.seed, 42);
    }

    #[test]
    fn scramble_keys_round_trip() {
        let mut body = vec![2u8];
        body.extend_from_slice(&100u32.to_le_bytes());
        body.extend_from_slice(&8u32.to_le_bytes());
        body.extend_from_slice(&200u32.to_le_bytes());
        body.extend_from_slice(&16u32.to_le_bytes());
        let keys = parse_scramble_keys(&body, res::SCRAMBLE_FIRST).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].pos, 100);
        assert_eq!(keys[1].len, 16);
    }
}
