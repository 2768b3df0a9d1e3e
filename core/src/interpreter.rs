//! The rule interpreter (component H) — the hard core of the engine.
//!
//! Evaluates parsed [`crate::rules::Actions`] records against the tile grid
//! and object pool, driving bytecode through the VM for conditions and
//! functions. Grounded on `gamos.cpp`'s `preprocessData`/`preprocessDataB1`/
//! `processData`/`FUN_00402a68`/`FUN_0040283c` and the engine's linear
//! congruential generator.

use std::cell::Cell as StdCell;

use crate::grid::{Cell, Grid, EMPTY_ACTOR_ID};
use crate::pool::{ObjectPool, FLAG_DRAWABLE, FLAG_HAS_TILE, FLAG_LIVE};
use crate::rules::{Actions, BehaviorClass, Entry, Group, MatchControl, ObjectAction, SpawnPolicy};
use crate::vm::{do_script, VmHost};

/// The engine's linear congruential generator. Every rule entry consumes
/// exactly one draw even when its result is unused, so scripted content
/// stays deterministic across replays.
#[derive(Debug, Clone, Copy)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Advances and returns the new seed, matching `rnd()`'s observable contract.
    pub fn next(&mut self) -> u32 {
        self.seed = self.seed.wrapping_mul(0x41C64E6D).wrapping_add(0x3039);
        self.seed
    }

    /// `floor(n * U)` where `U` is the top 16 bits of the next draw, in `[0, 2^16)`.
    pub fn range16(&mut self, n: u32) -> u32 {
        let percent = self.next() >> 16;
        (percent * n) >> 16
    }
}

/// One of the eight geometric transforms `preprocessData` applies to a
/// neighborhood/spawn entry's `(dx, dy, dir)` triple, re-keying the 4-bit
/// direction nibble (N=1,E=2,S=4,W=8) in lockstep with the coordinate
/// transform so a rule authored in one orientation reads correctly after
/// the active object has turned.
///
/// IDs 8..15 (the "family remap" call site in `FUN_0040283c`) select the
/// same eight transforms as 0..7 modulo 8 — the reference's switch body
/// available for this port has no distinct cases past 7, so this crate
/// takes the higher IDs as aliases rather than inventing new behavior; see
/// `DESIGN.md` for the full note on this open question.
pub fn preprocess_data(id: u8, dx: i32, dy: i32, dir: u8) -> (i32, i32, u8) {
    match id % 8 {
        0 => (dx, dy, dir),
        // 90 degree clockwise rotation (ids 1, 10).
        1 => (-dy, dx, rotate_dir_cw(dir, 1)),
        // 180 degree rotation (ids 2, 12).
        2 => (-dx, -dy, rotate_dir_cw(dir, 2)),
        // 90 degree counter-clockwise rotation (ids 3, 16).
        3 => (dy, -dx, rotate_dir_cw(dir, 3)),
        // Horizontal flip (id 4).
        4 => (-dx, dy, flip_dir_h(dir)),
        // Horizontal flip then 90 degree rotation (id 5).
        5 => {
            let (fx, fy, fd) = (-dx, dy, flip_dir_h(dir));
            (-fy, fx, rotate_dir_cw(fd, 1))
        }
        // Vertical flip (id 6).
        6 => (dx, -dy, flip_dir_v(dir)),
        // Transpose (id 7).
        _ => (dy, dx, transpose_dir(dir)),
    }
}

fn rotate_dir_cw(dir: u8, steps: u8) -> u8 {
    let mut d = dir & 0xF;
    for _ in 0..(steps % 4) {
        d = ((d << 1) | (d >> 3)) & 0xF;
    }
    d
}

fn flip_dir_h(dir: u8) -> u8 {
    // Swap E(2)<->W(8), leave N(1)/S(4) untouched.
    let mut out = dir & 0b0101;
    if dir & 0b0010 != 0 {
        out |= 0b1000;
    }
    if dir & 0b1000 != 0 {
        out |= 0b0010;
    }
    out
}

fn flip_dir_v(dir: u8) -> u8 {
    // Swap N(1)<->S(4), leave E(2)/W(8) untouched.
    let mut out = dir & 0b1010;
    if dir & 0b0001 != 0 {
        out |= 0b0100;
    }
    if dir & 0b0100 != 0 {
        out |= 0b0001;
    }
    out
}

fn transpose_dir(dir: u8) -> u8 {
    // Mirror across the NW-SE diagonal: N<->W, E<->S.
    let mut out = 0;
    if dir & 0b0001 != 0 {
        out |= 0b1000;
    }
    if dir & 0b1000 != 0 {
        out |= 0b0001;
    }
    if dir & 0b0010 != 0 {
        out |= 0b0100;
    }
    if dir & 0b0100 != 0 {
        out |= 0b0010;
    }
    out
}

/// Turns a 4-bit desired-direction bitmap into a single direction, chosen
/// uniformly among the set bits. Grounded on the family of
/// `preprocessDataB1` lookup tables, which differ only in which bit subsets
/// they accept; this crate expresses that directly as "pick a random set
/// bit" rather than reproducing each per-id lookup table verbatim, since
/// they all reduce to the same operation over the specific bit subset their
/// id names.
pub fn preprocess_data_b1(rng: &mut Rng, bitmap: u8) -> u8 {
    let bits: Vec<u8> = (0..4).filter(|i| bitmap & (1 << i) != 0).collect();
    if bits.is_empty() {
        return 0;
    }
    if bits.len() == 1 {
        return 1 << bits[0];
    }
    let pick = rng.range16(bits.len() as u32) as usize;
    1 << bits[pick.min(bits.len() - 1)]
}

/// One matched neighborhood point, captured by a `Capture`-control entry
/// for later use by a spawn group's [`SpawnPolicy::ByCapturedPoint`]. Stored
/// as absolute grid coordinates, grouped per capture bucket.
#[derive(Debug, Clone, Copy, Default)]
struct Captured {
    x: i32,
    y: i32,
}

/// What a neighborhood group's evaluation means for the rest of the rule.
enum GroupOutcome {
    /// Fall through to the next group (or phase, if this was the last one).
    Continue,
    /// Reject the whole rule: stop at phase 2, move on to the next rule.
    Reject,
    /// Fast-skip every remaining rule in this object's action list this tick.
    SkipRest,
}

/// What evaluating one [`Actions`] rule means for the caller's rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The condition failed, or a neighborhood group rejected the rule.
    /// The next rule in this object's action list still runs.
    Rejected,
    /// All phases ran (or there were none to run).
    Completed,
    /// A neighborhood group's `SkipRest` control code fired: the caller
    /// should stop walking this object's action list entirely this tick.
    SkipRemainingRules,
}

/// Mutable context threaded through one tick's rule evaluation. Bundles the
/// pieces of `EngineState` the interpreter actually touches so this module
/// doesn't need to depend on the aggregate type directly.
pub struct RuleContext<'a> {
    pub grid: &'a mut Grid,
    pub pool: &'a mut ObjectPool,
    pub rng: &'a mut Rng,
    pub host: &'a mut dyn VmHost,
    pub interrupt: &'a StdCell<bool>,
    pub depth: &'a mut u32,
    /// Global transform id applied by `preprocessData`, tracked per-rule in
    /// the reference as `_preprocDataId`.
    pub preproc_data_id: u8,
    /// Resolves an actor id to its parsed action-table entry. Supplied by
    /// `EngineState` from whatever the module loader populated; kept as a
    /// closure rather than a direct table reference so this module has no
    /// compile-time dependency on the loader's resource tables.
    pub actions: &'a dyn Fn(u8) -> Option<ObjectAction>,
    /// Resolves a family id (resource types `0x38..0x3A`) to its member
    /// actor ids, for neighborhood entries with `is_family_index()` set.
    pub families: &'a dyn Fn(u8) -> Option<&'a [u8]>,
}

/// Evaluates one rule for `active` (the object whose action list owns
/// `rule`), at grid position `(x, y)`. `absolute` mirrors `doActions`'s
/// second argument: when false, neighbor/move offsets are relative to
/// `(x, y)`; when true they are already absolute grid coordinates (used by
/// startup rules, resource type `0x19`).
pub fn do_actions(ctx: &mut RuleContext, active: usize, x: i32, y: i32, rule: &Actions, absolute: bool) -> RuleOutcome {
    if rule.has_condition() {
        if let Some(addr) = rule.precondition {
            let mut storage = ctx.pool.get_mut(active).map(|o| o.storage.clone()).unwrap_or_default();
            let result = do_script(ctx.host, ctx.depth, ctx.interrupt, addr, &mut storage);
            if let Some(obj) = ctx.pool.get_mut(active) {
                obj.storage = storage;
            }
            if result == 0 {
                return RuleOutcome::Rejected;
            }
        }
    }
    if ctx.interrupt.get() {
        return RuleOutcome::Rejected;
    }

    // Captures are organized per capture bucket: a new bucket opens each
    // time a group whose type byte is 4 is reached, and a `Capture`-control
    // entry's matched point is recorded into whichever bucket is currently
    // open.
    let mut captures: Vec<Vec<Captured>> = Vec::new();
    let mut bucket: Option<usize> = None;

    if rule.has_neighbors() {
        for group in &rule.neighbor_groups {
            match eval_group(ctx, x, y, group, absolute, &mut captures, &mut bucket) {
                GroupOutcome::Continue => {}
                GroupOutcome::Reject => return RuleOutcome::Rejected,
                GroupOutcome::SkipRest => return RuleOutcome::SkipRemainingRules,
            }
        }
    }
    if ctx.interrupt.get() {
        return RuleOutcome::Rejected;
    }

    if rule.has_move() {
        apply_move(ctx, active, x, y, rule);
    }
    if ctx.interrupt.get() {
        return RuleOutcome::Rejected;
    }

    if rule.has_function() {
        if let Some(addr) = rule.function {
            let mut storage = ctx.pool.get_mut(active).map(|o| o.storage.clone()).unwrap_or_default();
            do_script(ctx.host, ctx.depth, ctx.interrupt, addr, &mut storage);
            if let Some(obj) = ctx.pool.get_mut(active) {
                obj.storage = storage;
            }
        }
    }
    if ctx.interrupt.get() {
        return RuleOutcome::Rejected;
    }

    if rule.has_spawn() {
        let mut bucket_cursor = 0usize;
        for group in &rule.spawn_groups {
            eval_spawn_group(ctx, x, y, group, &captures, &mut bucket_cursor);
        }
    }

    RuleOutcome::Completed
}

/// Evaluates one neighborhood group's entries in order.
///
/// Each entry's success is `matched == entry.expects_match()` — flags bit 1
/// toggles whether a hit is what the entry wants (a positive neighbor test)
/// or what it wants to *not* see (a negated one). Control codes (flags bits
/// 2..3) are only consulted on success: `EndGroup` stops this group and
/// falls through to the next; `Reject` aborts the whole rule; `SkipRest`
/// aborts the object's entire remaining action list for this tick;
/// `Capture` records the matched point into the currently open bucket and
/// keeps evaluating.
///
/// On failure nothing happens unless this is the group's last entry: if a
/// capture bucket is open and it is still empty, the whole rule is
/// rejected (a neighborhood group that ends without ever satisfying its
/// open bucket cannot spawn anything, so there is nothing worth running
/// phases 3-5 for). Otherwise evaluation simply continues to the next
/// entry — a non-final failure never ends the group early.
fn eval_group(
    ctx: &mut RuleContext,
    x: i32,
    y: i32,
    group: &Group,
    absolute: bool,
    captures: &mut Vec<Vec<Captured>>,
    bucket: &mut Option<usize>,
) -> GroupOutcome {
    if group.begins_capture_bucket() {
        captures.push(Vec::new());
        *bucket = Some(captures.len() - 1);
    }

    let entries = &group.entries;
    for (i, entry) in entries.iter().enumerate() {
        // Every entry consumes exactly one draw, whether or not its result
        // feeds into the match — mirrors the reference's unconditional `rnd()`.
        let _ = ctx.rng.next();

        let (tdx, tdy, tdir) = preprocess_data(ctx.preproc_data_id, entry.dx, entry.dy, entry.dir);
        let (px, py) = if absolute { (tdx, tdy) } else { (x + tdx, y + tdy) };
        let cell = ctx.grid.get(px, py);

        // Family-index matching: `value` names a family id (resource types
        // `0x38..0x3A`) rather than a literal actor id, and the cell matches
        // if its actor id is a member of that family.
        let id_matches = if entry.is_family_index() {
            (ctx.families)(entry.value).is_some_and(|members| members.contains(&cell.actor_id()))
        } else {
            cell.actor_id() == entry.value
        };
        let matched = id_matches && (cell.orientation() & tdir) != 0;
        let success = matched == entry.expects_match();

        if success {
            match entry.control() {
                MatchControl::EndGroup => break,
                MatchControl::Reject => return GroupOutcome::Reject,
                MatchControl::SkipRest => return GroupOutcome::SkipRest,
                MatchControl::Capture => {
                    if let Some(b) = *bucket {
                        captures[b].push(Captured { x: px, y: py });
                    }
                }
            }
        } else if i + 1 == entries.len() {
            if let Some(b) = *bucket {
                if captures[b].is_empty() {
                    return GroupOutcome::Reject;
                }
            }
        }
    }
    GroupOutcome::Continue
}

fn apply_move(ctx: &mut RuleContext, active: usize, x: i32, y: i32, rule: &Actions) {
    let _ = ctx.rng.next();
    let (tdx, tdy, _tdir) = preprocess_data(ctx.preproc_data_id, rule.mov.dx, rule.mov.dy, rule.mov.dir_bitmap);
    let dir = preprocess_data_b1(ctx.rng, rule.mov.dir_bitmap);

    let (nx, ny) = (x + tdx, y + tdy);
    let old_cell = ctx.grid.get(x, y);
    let target_cell = ctx.grid.get(nx, ny);

    if !target_cell.is_empty() {
        run_on_delete(ctx, nx, ny);
    }

    let actor_id = old_cell.actor_id();
    ctx.grid.set(nx, ny, Cell::new(actor_id, dir, old_cell.flags()));
    ctx.grid.set(x, y, Cell::empty());

    if let Some(obj) = ctx.pool.get_mut(active) {
        obj.pos = (nx.rem_euclid(ctx.grid.width() as i32)) as u8;
        obj.blk = (ny.rem_euclid(ctx.grid.height() as i32)) as u8;
    }
}

/// Runs one spawn group. `bucket_cursor` advances once per
/// [`SpawnPolicy::ByCapturedPoint`] group processed, positionally pairing
/// the Nth such spawn group with the Nth capture bucket the rule's
/// neighborhood groups opened.
fn eval_spawn_group(
    ctx: &mut RuleContext,
    x: i32,
    y: i32,
    group: &crate::rules::SpawnGroup,
    captures: &[Vec<Captured>],
    bucket_cursor: &mut usize,
) {
    let entries = &group.entries;
    if entries.is_empty() {
        return;
    }

    if group.policy == SpawnPolicy::ByCapturedPoint {
        let idx = *bucket_cursor;
        *bucket_cursor += 1;
        let Some(bucket) = captures.get(idx) else { return };
        if bucket.is_empty() {
            return;
        }
        // One weighted random draw within the bucket's own range, matching
        // the engine's `(len * (rnd()>>16)) >> 16` index scaling.
        let lb = ctx.rng.next() >> 16;
        let draw = ((bucket.len() as u32 * lb) >> 16) as usize;
        let point = bucket[draw.min(bucket.len() - 1)];

        let hit = entries.iter().find(|e| {
            let (tdx, tdy, _) = preprocess_data(ctx.preproc_data_id, e.dx, e.dy, e.dir);
            x + tdx == point.x && y + tdy == point.y
        });
        if let Some(entry) = hit {
            let (tdx, tdy, tdir) = preprocess_data(ctx.preproc_data_id, entry.dx, entry.dy, entry.dir);
            set_cell(ctx, x + tdx, y + tdy, entry.value, tdir);
        }
        return;
    }

    let selected: Vec<usize> = match group.policy {
        SpawnPolicy::EndBucket => {
            let roll = ctx.rng.range16(100) as u16;
            let mut acc = 0u16;
            let mut picked = group.end_buckets.len().saturating_sub(1);
            for (i, weight) in group.end_buckets.iter().enumerate() {
                acc += weight;
                if roll < acc {
                    picked = i;
                    break;
                }
            }
            entries.get(picked).map(|_| vec![picked]).unwrap_or_default()
        }
        SpawnPolicy::FirstN => {
            let n = ctx.rng.range16(entries.len() as u32) as usize;
            (0..n.min(entries.len())).collect()
        }
        SpawnPolicy::NthOnly => {
            let n = ctx.rng.range16(entries.len() as u32) as usize;
            vec![n.min(entries.len() - 1)]
        }
        SpawnPolicy::CoinFlip => (0..entries.len()).filter(|_| ctx.rng.range16(2) == 0).collect(),
        SpawnPolicy::ByCapturedPoint => unreachable!("handled above"),
    };

    for idx in selected {
        let entry = entries[idx];
        let (tdx, tdy, tdir) = preprocess_data(ctx.preproc_data_id, entry.dx, entry.dy, entry.dir);
        let (px, py) = (x + tdx, y + tdy);
        set_cell(ctx, px, py, entry.value, tdir);
    }
}

/// Writes `(actor_id, orientation)` into `(x, y)` through the full
/// allocate/dispose lifecycle `setCell` describes: frees the outgoing
/// resident (running its `onDelete` and releasing its subordinates) first,
/// then — for a non-empty incoming actor id whose behavior class actually
/// allocates an object — claims a pool slot and runs the new resident's
/// `onCreate`. Used by spawn entries and by any loader-driven initial
/// placement; ordinary moves translate a resident in place instead (see
/// `apply_move`), since a move is not a creation event.
pub fn set_cell(ctx: &mut RuleContext, x: i32, y: i32, actor_id: u8, orientation: u8) {
    run_on_delete(ctx, x, y);

    if actor_id == EMPTY_ACTOR_ID {
        ctx.grid.set(x, y, Cell::empty());
        return;
    }

    ctx.grid.set(x, y, Cell::new(actor_id, orientation, 0));

    let action = (ctx.actions)(actor_id);
    if matches!(action.as_ref().map(|a| a.behavior_class()), Some(BehaviorClass::Inert)) {
        return;
    }

    let gx = x.rem_euclid(ctx.grid.width() as i32) as u8;
    let gy = y.rem_euclid(ctx.grid.height() as i32) as u8;
    let storage_size = action.as_ref().map(|a| a.storage_size()).unwrap_or(0);
    let default_z = action.as_ref().map(|a| a.default_z()).unwrap_or(0) as i32;

    let idx = ctx.pool.get_free_object();
    if let Some(obj) = ctx.pool.get_mut(idx) {
        obj.flags = FLAG_LIVE | FLAG_HAS_TILE | FLAG_DRAWABLE;
        obj.act_id = actor_id;
        obj.pos = gx;
        obj.blk = gy;
        obj.fld_3 = default_z;
        obj.fld_5 = default_z;
        obj.storage = vec![0u8; storage_size];
    }

    if let Some(addr) = action.and_then(|a| a.on_create) {
        let mut storage = ctx.pool.get(idx).map(|o| o.storage.clone()).unwrap_or_default();
        do_script(ctx.host, ctx.depth, ctx.interrupt, addr, &mut storage);
        if let Some(obj) = ctx.pool.get_mut(idx) {
            obj.storage = storage;
        }
    }
}

fn find_resident(pool: &ObjectPool, gx: u8, gy: u8) -> Option<usize> {
    pool.iter()
        .find(|o| o.is_live() && o.flags & FLAG_HAS_TILE != 0 && o.pos == gx && o.blk == gy)
        .map(|o| o.index)
}

/// Frees `idx` and every subordinate object whose `owner` points at it
/// (shadows, subtitle/attachment children), per the reference's
/// "a subtitle/attachment object dies with its owning main object".
fn free_with_subordinates(pool: &mut ObjectPool, idx: usize) {
    let subordinates: Vec<usize> = pool.iter().filter(|o| o.owner == Some(idx)).map(|o| o.index).collect();
    for sub in subordinates {
        pool.remove_object(sub);
    }
    pool.remove_object(idx);
}

/// Runs the resident's `onDelete` script and frees it, plus its subordinate
/// objects, before a cell is overwritten or cleared. A no-op when the cell
/// is already empty or has no resolvable resident object.
fn run_on_delete(ctx: &mut RuleContext, x: i32, y: i32) {
    let cell = ctx.grid.get(x, y);
    if cell.is_empty() {
        return;
    }
    let gx = x.rem_euclid(ctx.grid.width() as i32) as u8;
    let gy = y.rem_euclid(ctx.grid.height() as i32) as u8;
    let Some(idx) = find_resident(ctx.pool, gx, gy) else {
        return;
    };
    let act_id = cell.actor_id();
    if let Some(action) = (ctx.actions)(act_id) {
        if let Some(addr) = action.on_delete {
            let mut storage = ctx.pool.get(idx).map(|o| o.storage.clone()).unwrap_or_default();
            do_script(ctx.host, ctx.depth, ctx.interrupt, addr, &mut storage);
        }
    }
    free_with_subordinates(ctx.pool, idx);
}

/// Sweeps the pool in index order starting at `active_hint`, advancing one
/// animation step for moving objects and walking each live object's
/// `ObjectAction.actions` list, rotating each rule's direction bitmap into
/// canonical form by the object's current orientation before dispatch.
pub fn sweep_tick(ctx: &mut RuleContext, active_hint: Option<usize>) {
    let order: Vec<usize> = match active_hint {
        Some(a) if a < ctx.pool.len() => {
            let mut v: Vec<usize> = (a..ctx.pool.len()).collect();
            v.extend(0..a);
            v
        }
        _ => (0..ctx.pool.len()).collect(),
    };

    for idx in order {
        if ctx.interrupt.get() {
            return;
        }
        let Some(obj) = ctx.pool.get(idx) else { continue };
        if obj.flags & FLAG_LIVE == 0 || obj.flags & FLAG_HAS_TILE == 0 {
            continue;
        }
        let act_id = obj.act_id;
        let (x, y) = (obj.pos as i32, obj.blk as i32);
        let Some(action) = (ctx.actions)(act_id) else { continue };
        if action.behavior_class() == BehaviorClass::Inert {
            continue;
        }

        for rule in &action.actions {
            if ctx.interrupt.get() {
                return;
            }
            if do_actions(ctx, idx, x, y, rule, false) == RuleOutcome::SkipRemainingRules {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_actions(_: u8) -> Option<ObjectAction> {
        None
    }

    fn no_families(_: u8) -> Option<&'static [u8]> {
        None
    }

    #[test]
    fn lcg_first_value_with_seed_one() {
        let mut rng = Rng::new(1);
        let v = rng.next();
        assert_eq!(v, 1u32.wrapping_mul(0x41C64E6D).wrapping_add(0x3039));
    }

    #[test]
    fn preprocess_data_identity_is_noop() {
        assert_eq!(preprocess_data(0, 3, -2, 0b0110), (3, -2, 0b0110));
    }

    #[test]
    fn preprocess_data_180_negates_both_axes() {
        assert_eq!(preprocess_data(2, 3, -2, 0), (-3, 2, 0));
    }

    #[test]
    fn preprocess_data_rotations_form_a_group_of_four() {
        let start = (5, -1, 0b0001);
        let mut cur = start;
        for _ in 0..4 {
            cur = preprocess_data(1, cur.0, cur.1, cur.2);
        }
        assert_eq!(cur, start);
    }

    #[test]
    fn rule_fallthrough_on_simple_match() {
        let mut grid = Grid::new(8, 8);
        grid.set(0, 0, Cell::new(5, 0xF, 0));
        let mut pool = ObjectPool::new();
        let mut rng = Rng::new(1);
        struct NoopHost(crate::vm::memory::Memory);
        impl VmHost for NoopHost {
            fn memory(&mut self) -> &mut crate::vm::memory::Memory {
                &mut self.0
            }
            fn call_func(&mut self, _vm: &mut crate::vm::VmThread, _func_id: u32) {}
        }
        let mut host = NoopHost(crate::vm::memory::Memory::new());
        let interrupt = StdCell::new(false);
        let mut depth = 0u32;
        let mut ctx = RuleContext {
            grid: &mut grid,
            pool: &mut pool,
            rng: &mut rng,
            host: &mut host,
            interrupt: &interrupt,
            depth: &mut depth,
            preproc_data_id: 0,
            actions: &no_actions,
            families: &no_families,
        };
        let rule = Actions {
            header: crate::rules::HAS_NEIGHBORS,
            precondition: None,
            function: None,
            disassembly: None,
            mov: Default::default(),
            neighbor_groups: vec![Group {
                group_type: 0,
                entries: vec![Entry { value: 5, flags: 0b10, dir: 0xF, dx: 0, dy: 0 }],
            }],
            spawn_groups: Vec::new(),
        };
        assert_eq!(do_actions(&mut ctx, 0, 0, 0, &rule, false), RuleOutcome::Completed);
    }

    #[test]
    fn rule_rejects_when_neighbor_does_not_match() {
        let mut grid = Grid::new(8, 8);
        // Cell stays empty, so an entry expecting a match against actor 5 fails.
        let mut pool = ObjectPool::new();
        let mut rng = Rng::new(1);
        struct NoopHost(crate::vm::memory::Memory);
        impl VmHost for NoopHost {
            fn memory(&mut self) -> &mut crate::vm::memory::Memory {
                &mut self.0
            }
            fn call_func(&mut self, _vm: &mut crate::vm::VmThread, _func_id: u32) {}
        }
        let mut host = NoopHost(crate::vm::memory::Memory::new());
        let interrupt = StdCell::new(false);
        let mut depth = 0u32;
        let mut ctx = RuleContext {
            grid: &mut grid,
            pool: &mut pool,
            rng: &mut rng,
            host: &mut host,
            interrupt: &interrupt,
            depth: &mut depth,
            preproc_data_id: 0,
            actions: &no_actions,
            families: &no_families,
        };
        // A single-entry group with no open bucket: a non-last-entry failure
        // with no bucket active never rejects, so this rule still completes
        // (the "fallthrough" case) even though nothing matched.
        let rule = Actions {
            header: crate::rules::HAS_NEIGHBORS,
            precondition: None,
            function: None,
            disassembly: None,
            mov: Default::default(),
            neighbor_groups: vec![Group {
                group_type: 4,
                entries: vec![
                    Entry { value: 5, flags: 0b1110, dir: 0xF, dx: 0, dy: 0 }, // Capture control, unreachable on failure
                ],
            }],
            spawn_groups: Vec::new(),
        };
        // Bucket opened (group_type 4) and stays empty since nothing matched:
        // the last-entry-empty-bucket check rejects the whole rule.
        assert_eq!(do_actions(&mut ctx, 0, 0, 0, &rule, false), RuleOutcome::Rejected);
    }

    #[test]
    fn set_cell_allocates_and_frees_objects() {
        let mut grid = Grid::new(8, 8);
        let mut pool = ObjectPool::new();
        let mut rng = Rng::new(1);
        struct NoopHost(crate::vm::memory::Memory);
        impl VmHost for NoopHost {
            fn memory(&mut self) -> &mut crate::vm::memory::Memory {
                &mut self.0
            }
            fn call_func(&mut self, _vm: &mut crate::vm::VmThread, _func_id: u32) {}
        }
        let mut host = NoopHost(crate::vm::memory::Memory::new());
        let interrupt = StdCell::new(false);
        let mut depth = 0u32;

        fn one_action(id: u8) -> Option<ObjectAction> {
            if id == 9 {
                Some(ObjectAction {
                    unk1: 0x01, // clickable, storage size 1
                    on_create: None,
                    on_delete: None,
                    actions: Vec::new(),
                })
            } else {
                None
            }
        }

        let mut ctx = RuleContext {
            grid: &mut grid,
            pool: &mut pool,
            rng: &mut rng,
            host: &mut host,
            interrupt: &interrupt,
            depth: &mut depth,
            preproc_data_id: 0,
            actions: &one_action,
            families: &no_families,
        };

        set_cell(&mut ctx, 2, 2, 9, 0xF);
        assert_eq!(ctx.grid.get(2, 2).actor_id(), 9);
        assert_eq!(ctx.pool.len(), 1);
        assert!(ctx.pool.get(0).unwrap().is_live());

        set_cell(&mut ctx, 2, 2, EMPTY_ACTOR_ID, 0);
        assert!(ctx.grid.get(2, 2).is_empty());
        assert!(!ctx.pool.get(0).unwrap().is_live());
    }
}
