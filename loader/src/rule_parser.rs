//! Binary decoder for the `Actions`/`ObjectAction` rule DSL (component H's
//! data model, parsed once here per the "parse on load, not on every tick"
//! design note) and the handful of other fixed-shape resource bodies this
//! crate decodes directly rather than handing to VM memory.
//!
//! The wire shapes below follow the field layout named in the data model
//! (a `u32` descriptor, a 4-byte move descriptor, `{value,flags,dir,dx,dy}`
//! entries) packed tightly in declaration order; they are this loader's own
//! encoding of that shape, not a transcription of an external binary this
//! crate was never given byte-for-byte.

use gamos_core::rules::{
    Actions, Entry, Group, MoveDescriptor, ObjectAction, SpawnGroup, SpawnPolicy, HAS_NEIGHBORS, HAS_SPAWN,
};

use crate::LoaderError;

struct Reader<'a> {
    body: &'a [u8],
    pos: usize,
    res_type: u8,
}

impl<'a> Reader<'a> {
    fn new(body: &'a [u8], res_type: u8) -> Self {
        Self { body, pos: 0, res_type }
    }

    fn need(&self, n: usize) -> Result<(), LoaderError> {
        if self.pos + n > self.body.len() {
            return Err(LoaderError::Logic {
                res_type: self.res_type,
                offset: self.pos,
                message: "rule body ran out of bytes",
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, LoaderError> {
        self.need(1)?;
        let v = self.body[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn i8(&mut self) -> Result<i32, LoaderError> {
        Ok(self.u8()? as i8 as i32)
    }

    fn u16(&mut self) -> Result<u16, LoaderError> {
        self.need(2)?;
        let v = u16::from_le_bytes(self.body[self.pos..self.pos + 2].try_into().unwrap());
        self.pos += 2;
        Ok(v)
    }

    fn i32(&mut self) -> Result<i32, LoaderError> {
        self.need(4)?;
        let v = i32::from_le_bytes(self.body[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    /// Reads a 4-byte script address, treating `-1` as "no script".
    fn script_addr(&mut self) -> Result<Option<u32>, LoaderError> {
        let v = self.i32()?;
        Ok(if v < 0 { None } else { Some(v as u32) })
    }

    fn entry(&mut self) -> Result<Entry, LoaderError> {
        let value = self.u8()?;
        let flags = self.u8()?;
        let dir = self.u8()?;
        let dx = self.i8()?;
        let dy = self.i8()?;
        Ok(Entry { value, flags, dir, dx, dy })
    }
}

/// Decodes one `Actions` rule record: header byte, 4-byte move descriptor,
/// three optional script addresses, then the neighbor and spawn group
/// tables gated by the header's `HAS_NEIGHBORS`/`HAS_SPAWN` bits.
pub fn parse_actions(body: &[u8], res_type: u8) -> Result<Actions, LoaderError> {
    let mut r = Reader::new(body, res_type);
    let header = r.u8()?;

    let dir_bitmap = r.u8()?;
    let dx = r.i8()?;
    let dy = r.i8()?;
    let _reserved = r.u8()?;
    let mov = MoveDescriptor { dir_bitmap, dx, dy };

    let precondition = r.script_addr()?;
    let function = r.script_addr()?;
    let disassembly = r.script_addr()?;

    let mut neighbor_groups = Vec::new();
    if header & HAS_NEIGHBORS != 0 {
        let group_count = r.u8()? as usize;
        for _ in 0..group_count {
            let group_type = r.u8()?;
            let entry_count = r.u8()? as usize;
            let mut entries = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                entries.push(r.entry()?);
            }
            neighbor_groups.push(Group { group_type, entries });
        }
    }

    let mut spawn_groups = Vec::new();
    if header & HAS_SPAWN != 0 {
        let group_count = r.u8()? as usize;
        for _ in 0..group_count {
            let policy = SpawnPolicy::from_group_type(r.u8()?);
            let entry_count = r.u8()? as usize;
            let mut entries = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                entries.push(r.entry()?);
            }
            let bucket_count = r.u8()? as usize;
            let mut end_buckets = Vec::with_capacity(bucket_count);
            for _ in 0..bucket_count {
                end_buckets.push(r.u16()?);
            }
            spawn_groups.push(SpawnGroup { policy, entries, end_buckets });
        }
    }

    Ok(Actions {
        header,
        precondition,
        function,
        disassembly,
        mov,
        neighbor_groups,
        spawn_groups,
    })
}

/// Decodes resource type `0x20`'s fixed 12-byte body: the `unk1` descriptor
/// word followed by the create/delete script addresses. The rule list is
/// filled in separately as `0x23..0x2C` resources for the same actor id are
/// dispatched.
pub fn parse_object_descriptor(body: &[u8]) -> Result<ObjectAction, LoaderError> {
    let mut r = Reader::new(body, 0x20);
    let unk1 = {
        r.need(4)?;
        let v = u32::from_le_bytes(body[0..4].try_into().unwrap());
        r.pos = 4;
        v
    };
    let on_create = r.script_addr()?;
    let on_delete = r.script_addr()?;
    Ok(ObjectAction {
        unk1,
        on_create,
        on_delete,
        actions: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_rule_with_no_optional_phases() {
        let body = [
            0x00u8, // header: no phases
            0, 0, 0, 0, // move descriptor
            0xFF, 0xFF, 0xFF, 0xFF, // precondition = -1
            0xFF, 0xFF, 0xFF, 0xFF, // function = -1
            0xFF, 0xFF, 0xFF, 0xFF, // disassembly = -1
        ];
        let actions = parse_actions(&body, 0x23).unwrap();
        assert_eq!(actions.header, 0);
        assert!(actions.precondition.is_none());
        assert!(actions.neighbor_groups.is_empty());
        assert!(actions.spawn_groups.is_empty());
    }

    #[test]
    fn parses_a_single_neighbor_group() {
        let mut body = vec![
            HAS_NEIGHBORS, // header
            0, 0, 0, 0, // move
            0xFF, 0xFF, 0xFF, 0xFF,
            0xFF, 0xFF, 0xFF, 0xFF,
            0xFF, 0xFF, 0xFF, 0xFF,
        ];
        body.push(1); // one group
        body.push(0); // group_type
        body.push(1); // one entry
        body.extend_from_slice(&[5, 0b0010, 0xF, 0xFE, 0x01]); // value=5 flags=expect-match dir=0xF dx=-2 dy=1
        let actions = parse_actions(&body, 0x23).unwrap();
        assert_eq!(actions.neighbor_groups.len(), 1);
        let entry = actions.neighbor_groups[0].entries[0];
        assert_eq!(entry.value, 5);
        assert_eq!(entry.dx, -2);
        assert_eq!(entry.dy, 1);
    }

    #[test]
    fn object_descriptor_round_trips_scalar_fields() {
        let mut body = Vec::new();
        body.extend_from_slice(&0x0302_0501u32.to_le_bytes());
        body.extend_from_slice(&100i32.to_le_bytes());
        body.extend_from_slice(&(-1i32).to_le_bytes());
        let action = parse_object_descriptor(&body).unwrap();
        assert_eq!(action.unk1, 0x0302_0501);
        assert_eq!(action.on_create, Some(100));
        assert_eq!(action.on_delete, None);
    }

    #[test]
    fn truncated_body_is_a_logic_error() {
        let body = [0x00u8];
        assert!(parse_actions(&body, 0x23).is_err());
    }
}
