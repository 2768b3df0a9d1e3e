//! The object pool (component G).
//!
//! `Pool<T>` grows in fixed-size blocks rather than one contiguous
//! reallocatable buffer, mirroring `pool.h`'s `Pool<T, shift=6>` — load
//! bearing here because the rule interpreter keeps a live reference to the
//! "active object" across a tick that may append new objects, and a plain
//! `Vec` growing would invalidate that reference on reallocation.

const BLOCK_SHIFT: u32 = 6;
const BLOCK_SIZE: usize = 1 << BLOCK_SHIFT;
const BLOCK_MASK: usize = BLOCK_SIZE - 1;

/// Stable-index, block-allocated object store.
pub struct Pool<T> {
    blocks: Vec<Box<[Option<T>; BLOCK_SIZE]>>,
    size: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            size: 0,
        }
    }

    fn ensure_block(&mut self, idx: usize) {
        let blid = idx >> BLOCK_SHIFT;
        while self.blocks.len() <= blid {
            self.blocks.push(Box::new(std::array::from_fn(|_| None)));
        }
    }

    pub fn push(&mut self, value: T) -> usize {
        let idx = self.size;
        self.ensure_block(idx);
        let blid = idx >> BLOCK_SHIFT;
        let elid = idx & BLOCK_MASK;
        self.blocks[blid][elid] = Some(value);
        self.size += 1;
        idx
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        if idx >= self.size {
            return None;
        }
        self.blocks[idx >> BLOCK_SHIFT][idx & BLOCK_MASK].as_ref()
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        if idx >= self.size {
            return None;
        }
        self.blocks[idx >> BLOCK_SHIFT][idx & BLOCK_MASK].as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        (0..self.size).filter_map(move |i| self.get(i).map(|v| (i, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        let size = self.size;
        self.blocks.iter_mut().enumerate().flat_map(move |(blid, block)| {
            block.iter_mut().enumerate().filter_map(move |(elid, slot)| {
                let idx = blid * BLOCK_SIZE + elid;
                if idx >= size {
                    return None;
                }
                slot.as_mut().map(|v| (idx, v))
            })
        })
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.size = 0;
    }
}

/// Bit 0 of [`Object::flags`]: the slot holds a live object.
pub const FLAG_LIVE: u8 = 0x01;
/// Bit 1: the object occupies a grid cell (as opposed to being free-floating).
pub const FLAG_HAS_TILE: u8 = 0x02;
/// Bit 2: the object is mid-animation between two cells (a moving shadow).
pub const FLAG_IN_MOTION: u8 = 0x04;
/// Bit 3: the object's sprite is horizontally flipped relative to its origin.
pub const FLAG_H_FLIP: u8 = 0x08;
/// Bit 4: the object's sprite is vertically flipped relative to its origin.
pub const FLAG_V_FLIP: u8 = 0x10;
/// Bit 6: the object is drawn in pixel space, owned by (not tied to a cell of) another object.
pub const FLAG_FREE_FLOATING: u8 = 0x40;
/// Bit 7: the object participates in `doDraw`'s drawable set.
pub const FLAG_DRAWABLE: u8 = 0x80;

/// One actor instance: a main object, a moving shadow, or a free-floating
/// subtitle/attachment. Field names follow the reference's `fld_2..fld_5`
/// since their exact roles vary by behavior class and are reused across
/// several purposes in the source (actor type/z-level/mouse-mode/z-backup).
#[derive(Debug, Clone, Default)]
pub struct Object {
    /// Stable slot index; never reassigned to a different object once allocated.
    pub index: usize,
    pub flags: u8,
    pub act_id: u8,
    /// Behavior-dependent: animation frame count / actor type.
    pub fld_2: i32,
    /// Z-level / draw order, and grid-x backup for shadows.
    pub fld_3: i32,
    /// Mouse-interaction mode, and grid-y backup for shadows.
    pub fld_4: i32,
    /// Default z, used to restore `fld_3` after a transient change.
    pub fld_5: i32,
    /// Grid x, or 0xFF when unset / free-floating.
    pub pos: u8,
    /// Grid y, or 0xFF when unset / free-floating.
    pub blk: u8,
    /// Pixel x / y (used directly for free-floating objects, derived from
    /// grid position otherwise).
    pub x: i32,
    pub y: i32,
    pub sprite_id: i32,
    pub seq_id: i32,
    pub frame: i32,
    /// Owning object, for shadows and subtitle/attachment children. The
    /// reference packs this into `pos|blk<<8`; this crate keeps it explicit
    /// per the spec's design note, since nothing requires save-format
    /// bit-compatibility with the original encoding.
    pub owner: Option<usize>,
    /// Per-instance bytecode-visible storage, sized by the actor's
    /// `ObjectAction.unk1` byte3 (storage-size minus one).
    pub storage: Vec<u8>,
}

impl Object {
    fn reset_volatile(&mut self) {
        self.sprite_id = -1;
        self.seq_id = -1;
        self.frame = -1;
        self.act_id = 0;
        self.fld_2 = 0;
        self.fld_3 = 0;
        self.fld_4 = 0;
        self.fld_5 = 0;
        self.pos = 0xFF;
        self.blk = 0xFF;
        self.x = 0;
        self.y = 0;
        self.owner = None;
        self.storage.clear();
    }

    pub fn is_live(&self) -> bool {
        self.flags & FLAG_LIVE != 0
    }
}

/// Pool of [`Object`]s with reuse-first-free-slot allocation, built on the
/// same block-allocated [`Pool`] as the rest of the engine so that the
/// "active object" an interpreter tick holds by index never has its backing
/// slot physically reallocated out from under a concurrently-growing pool.
#[derive(Default)]
pub struct ObjectPool {
    objects: Pool<Object>,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self {
            objects: Pool::new(),
        }
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Object> {
        self.objects.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Object> {
        self.objects.get_mut(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter().map(|(_, o)| o)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.objects.iter_mut().map(|(_, o)| o)
    }

    /// Returns the index of a free slot, reusing the first one whose
    /// `FLAG_LIVE` bit is clear; appends a new slot otherwise. Once
    /// assigned, `index` never changes again.
    pub fn get_free_object(&mut self) -> usize {
        if let Some(pos) = (0..self.objects.len()).find(|&i| {
            self.objects
                .get(i)
                .is_none_or(|o| o.flags & FLAG_LIVE == 0)
        }) {
            let obj = self.objects.get_mut(pos).unwrap();
            obj.reset_volatile();
            obj.flags = 0;
            pos
        } else {
            let idx = self.objects.len();
            let mut obj = Object {
                index: idx,
                ..Default::default()
            };
            obj.reset_volatile();
            self.objects.push(obj);
            idx
        }
    }

    /// Clears the live bit. Does not compact the pool; compaction only
    /// happens in save/load (component L).
    pub fn remove_object(&mut self, idx: usize) {
        if let Some(obj) = self.objects.get_mut(idx) {
            obj.flags = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_block_growth_preserves_indices() {
        let mut p: Pool<u32> = Pool::new();
        for i in 0..200 {
            let idx = p.push(i);
            assert_eq!(idx as u32, i);
        }
        assert_eq!(*p.get(150).unwrap(), 150);
        assert_eq!(p.len(), 200);
    }

    #[test]
    fn object_pool_reuses_free_slot() {
        let mut pool = ObjectPool::new();
        let a = pool.get_free_object();
        pool.get_mut(a).unwrap().flags = FLAG_LIVE;
        let b = pool.get_free_object();
        assert_ne!(a, b);

        pool.remove_object(a);
        let c = pool.get_free_object();
        assert_eq!(c, a, "freed slot should be reused before growing");
    }

    #[test]
    fn object_index_never_reassigned_after_growth() {
        let mut pool = ObjectPool::new();
        let mut indices = Vec::new();
        for _ in 0..5 {
            let idx = pool.get_free_object();
            pool.get_mut(idx).unwrap().flags = FLAG_LIVE;
            indices.push(idx);
        }
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }
}
