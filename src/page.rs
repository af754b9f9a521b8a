//! Slotted-page record layout: a self-describing byte-level encoding that
//! packs variable-length records into one fixed-size [`BLOCK_SZ`] block.
//!
//! Header (little-endian):
//! ```text
//! bytes 0..2   num_records (u16)
//! bytes 2..4   end_free    (u16) -- offset of the last byte before free space
//! bytes 4*i..4*i+4, i=1..=num_records
//!              slot directory entry: size (u16), offset (u16)
//!              size == 0 marks a tombstoned slot
//! ```
//! Record payloads are densely packed at the high end of the block, growing
//! downward; the slot directory grows from the low end upward. Free space
//! is the gap in between.

use crate::block::BLOCK_SZ;
use crate::error::{Error, Result};
use tracing::trace;

/// 1-based id of a record's slot within a page. Never reused within a page
/// even after the record is deleted (tombstoned).
pub type RecordId = u16;

const HEADER_SIZE: usize = 4;
const SLOT_SIZE: usize = 4;

/// In-memory view over one block's bytes, providing the slotted-page API.
pub struct SlottedPage {
    data: [u8; BLOCK_SZ],
    num_records: u16,
    end_free: u16,
}

impl SlottedPage {
    /// Construct a view over `data`. If `is_new`, the header is
    /// initialized (zero records, all of the block past the header free);
    /// otherwise the header is read back out of `data`.
    pub fn new(data: [u8; BLOCK_SZ], is_new: bool) -> Self {
        let mut page = Self {
            data,
            num_records: 0,
            end_free: (BLOCK_SZ - 1) as u16,
        };
        if is_new {
            page.write_header();
        } else {
            page.num_records = get_u16(&page.data, 0);
            page.end_free = get_u16(&page.data, 2);
        }
        page
    }

    /// The raw block bytes, header included, ready to hand back to the
    /// block store via `put`.
    pub fn into_bytes(self) -> [u8; BLOCK_SZ] {
        self.data
    }

    /// The raw block bytes, header included.
    pub fn as_bytes(&self) -> &[u8; BLOCK_SZ] {
        &self.data
    }

    /// Does the page have room for `n` more payload bytes, assuming one
    /// more slot directory entry would be needed?
    pub fn has_room(&self, n: u16) -> bool {
        let dir_end = SLOT_SIZE as u16 * (self.num_records + 1);
        self.end_free >= dir_end && (self.end_free - dir_end) >= n
    }

    /// Append `data` as a new record. Returns the assigned, never-reused
    /// [`RecordId`].
    pub fn add(&mut self, data: &[u8]) -> Result<RecordId> {
        let size = data.len() as u16;
        if !self.has_room(size) {
            return Err(Error::NoRoom);
        }
        self.num_records += 1;
        let id = self.num_records;
        let loc = self.end_free + 1 - size;
        self.end_free -= size;
        self.write_slot(id, size, loc);
        self.data[loc as usize..loc as usize + size as usize].copy_from_slice(data);
        self.write_header();
        trace!(id, size, loc, "page: added record");
        Ok(id)
    }

    /// Return the payload for `id`, or `None` if the slot is tombstoned or
    /// does not exist.
    pub fn get(&self, id: RecordId) -> Option<&[u8]> {
        if id == 0 || id > self.num_records {
            return None;
        }
        let (size, loc) = self.read_slot(id);
        if size == 0 {
            return None;
        }
        Some(&self.data[loc as usize..loc as usize + size as usize])
    }

    /// Replace the payload of `id` with `new_data`, sliding other records
    /// to keep the payload region contiguous. Fails with [`Error::NoRoom`]
    /// if the record grows and there isn't room for the extra bytes.
    pub fn put(&mut self, id: RecordId, new_data: &[u8]) -> Result<()> {
        let (size, loc) = self.read_slot(id);
        let new_size = new_data.len() as u16;
        if new_size > size {
            let extra = new_size - size;
            if !self.has_room(extra) {
                return Err(Error::NoRoom);
            }
            // Open a gap of `extra` bytes just below the current location,
            // then write the grown record into it.
            self.slide(loc, loc - extra);
            let new_loc = loc - extra;
            self.data[new_loc as usize..new_loc as usize + new_size as usize]
                .copy_from_slice(new_data);
            self.write_slot(id, new_size, new_loc);
        } else {
            self.data[loc as usize..loc as usize + new_size as usize].copy_from_slice(new_data);
            self.write_slot(id, new_size, loc);
            // Close the gap left by the shrink (a no-op if new_size == size).
            self.slide(loc + new_size, loc + size);
        }
        self.write_header();
        trace!(id, new_size, "page: updated record");
        Ok(())
    }

    /// Tombstone `id`'s slot (size becomes 0) and close the hole its
    /// payload leaves. `num_records` is not decremented; the id is never
    /// reused.
    pub fn del(&mut self, id: RecordId) {
        let (size, loc) = self.read_slot(id);
        self.write_slot(id, 0, 0);
        self.slide(loc, loc + size);
        self.write_header();
        trace!(id, "page: deleted record");
    }

    /// Ascending ids of all live (non-tombstoned) records.
    pub fn ids(&self) -> Vec<RecordId> {
        let mut out = Vec::new();
        for id in 1..=self.num_records {
            let (size, _loc) = self.read_slot(id);
            if size != 0 {
                out.push(id);
            }
        }
        out
    }

    /// Compaction primitive: close (if `end > start`) or open (if
    /// `end < start`) a gap in the payload region bounded by `[start, end)`,
    /// shifting the lower-addressed payload bytes `[end_free+1, start)` by
    /// `end - start`, and updating every live slot whose location is
    /// `<= start` to match.
    fn slide(&mut self, start: u16, end: u16) {
        if start == end {
            return;
        }
        let shift = end as i32 - start as i32;
        let region_start = self.end_free as usize + 1;
        let region_len = start as usize - region_start;
        if region_len > 0 {
            let mut buf = vec![0_u8; region_len];
            buf.copy_from_slice(&self.data[region_start..region_start + region_len]);
            let dest = (region_start as i32 + shift) as usize;
            self.data[dest..dest + region_len].copy_from_slice(&buf);
        }
        for id in 1..=self.num_records {
            let (size, loc) = self.read_slot(id);
            if loc != 0 && loc <= start {
                let new_loc = (loc as i32 + shift) as u16;
                self.write_slot(id, size, new_loc);
            }
        }
        self.end_free = (self.end_free as i32 + shift) as u16;
    }

    fn read_slot(&self, id: RecordId) -> (u16, u16) {
        let off = SLOT_SIZE * id as usize;
        (get_u16(&self.data, off), get_u16(&self.data, off + 2))
    }

    fn write_slot(&mut self, id: RecordId, size: u16, loc: u16) {
        let off = SLOT_SIZE * id as usize;
        set_u16(&mut self.data, off, size);
        set_u16(&mut self.data, off + 2, loc);
    }

    fn write_header(&mut self) {
        set_u16(&mut self.data, 0, self.num_records);
        set_u16(&mut self.data, 2, self.end_free);
    }
}

fn get_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

fn set_u16(data: &mut [u8], off: usize, val: u16) {
    data[off..off + 2].copy_from_slice(&val.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_page() -> SlottedPage {
        SlottedPage::new([0_u8; BLOCK_SZ], true)
    }

    fn live_bytes(page: &SlottedPage) -> usize {
        BLOCK_SZ - 1 - page.end_free as usize
    }

    #[test]
    fn add_get_roundtrip() {
        let mut page = new_page();
        let id = page.add(b"hello").unwrap();
        assert_eq!(id, 1);
        assert_eq!(page.get(id), Some(&b"hello"[..]));
    }

    #[test]
    fn ids_increase_and_del_tombstones_without_renumbering() {
        let mut page = new_page();
        let a = page.add(b"a").unwrap();
        let b = page.add(b"bb").unwrap();
        let c = page.add(b"ccc").unwrap();
        assert_eq!((a, b, c), (1, 2, 3));
        page.del(b);
        assert_eq!(page.ids(), vec![a, c]);
        assert_eq!(page.get(b), None);
        // A new record must not reuse id 2.
        let d = page.add(b"dddd").unwrap();
        assert_eq!(d, 4);
        assert_eq!(page.ids(), vec![a, c, d]);
    }

    #[test]
    fn delete_only_record_then_add_gets_id_two() {
        let mut page = new_page();
        let a = page.add(b"solo").unwrap();
        assert_eq!(a, 1);
        page.del(a);
        assert_eq!(page.ids(), Vec::<RecordId>::new());
        let b = page.add(b"next").unwrap();
        assert_eq!(b, 2);
        assert_eq!(page.get(b), Some(&b"next"[..]));
    }

    #[test]
    fn put_grow_and_shrink_keep_payload_compact() {
        let mut page = new_page();
        let a = page.add(b"short").unwrap();
        let b = page.add(b"middle").unwrap();
        page.put(a, b"a much longer replacement value").unwrap();
        assert_eq!(page.get(a), Some(&b"a much longer replacement value"[..]));
        assert_eq!(page.get(b), Some(&b"middle"[..]));
        page.put(b, b"mi").unwrap();
        assert_eq!(page.get(b), Some(&b"mi"[..]));
        assert_eq!(page.get(a), Some(&b"a much longer replacement value"[..]));
    }

    #[test]
    fn compaction_invariant_after_every_op() {
        let mut page = new_page();
        let mut ids = Vec::new();
        for i in 0..20u8 {
            ids.push(page.add(&vec![i; 10]).unwrap());
        }
        let live: usize = ids.len() * 10;
        assert_eq!(live_bytes(&page), live);
        page.del(ids[3]);
        page.del(ids[7]);
        let live = live - 20;
        assert_eq!(live_bytes(&page), live);
        assert!(page.has_room(0));
        let free = page.end_free as i64 - (4 * (page.num_records as i64 + 1));
        assert_eq!(page.has_room(free.max(0) as u16), true);
        assert_eq!(page.has_room(free as u16 + 1), false);
    }

    #[test]
    fn no_room_when_block_is_full() {
        let mut page = new_page();
        let rec = vec![0_u8; 100];
        loop {
            if page.add(&rec).is_err() {
                break;
            }
        }
        assert!(matches!(page.add(&rec), Err(Error::NoRoom)));
    }

    #[test]
    fn sliding_by_zero_is_a_no_op() {
        let mut page = new_page();
        let a = page.add(b"x").unwrap();
        let before = page.as_bytes().to_vec();
        page.put(a, b"x").unwrap();
        assert_eq!(page.as_bytes().to_vec(), before);
    }

    proptest_tests!();

    #[test]
    fn random_add_del_put_stress() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut page = new_page();
        let mut live: std::collections::HashMap<RecordId, Vec<u8>> = std::collections::HashMap::new();
        let mut order: Vec<RecordId> = Vec::new();

        for _ in 0..5000 {
            let choice: u8 = rng.gen_range(0..3);
            match choice {
                0 => {
                    let len: usize = rng.gen_range(0..60);
                    let byte: u8 = rng.gen();
                    let data = vec![byte; len];
                    if let Ok(id) = page.add(&data) {
                        live.insert(id, data);
                        order.push(id);
                    }
                }
                1 => {
                    if order.is_empty() {
                        continue;
                    }
                    let id = order[rng.gen_range(0..order.len())];
                    if live.remove(&id).is_some() {
                        page.del(id);
                    }
                }
                _ => {
                    if order.is_empty() {
                        continue;
                    }
                    let id = order[rng.gen_range(0..order.len())];
                    if live.contains_key(&id) {
                        let len: usize = rng.gen_range(0..60);
                        let byte: u8 = rng.gen();
                        let data = vec![byte; len];
                        if page.put(id, &data).is_ok() {
                            live.insert(id, data);
                        }
                    }
                }
            }
            for (id, data) in &live {
                assert_eq!(page.get(*id), Some(data.as_slice()));
            }
        }
        let mut expect_ids: Vec<RecordId> = live.keys().copied().collect();
        expect_ids.sort_unstable();
        assert_eq!(page.ids(), expect_ids);
    }
}

#[cfg(test)]
macro_rules! proptest_tests {
    () => {
        mod proptests {
            use super::*;
            use proptest::prelude::*;

            #[derive(Clone, Debug)]
            enum Op {
                Add(Vec<u8>),
                Del(usize),
                Put(usize, Vec<u8>),
            }

            fn op_strategy() -> impl Strategy<Value = Op> {
                prop_oneof![
                    prop::collection::vec(any::<u8>(), 0..40).prop_map(Op::Add),
                    (0usize..30).prop_map(Op::Del),
                    (0usize..30, prop::collection::vec(any::<u8>(), 0..40))
                        .prop_map(|(i, d)| Op::Put(i, d)),
                ]
            }

            proptest! {
                #![proptest_config(ProptestConfig::with_cases(200))]
                #[test]
                fn slot_stability(ops in prop::collection::vec(op_strategy(), 0..60)) {
                    let mut page = new_page();
                    let mut live: std::collections::HashMap<RecordId, Vec<u8>> = std::collections::HashMap::new();
                    let mut order: Vec<RecordId> = Vec::new();
                    for op in ops {
                        match op {
                            Op::Add(data) => {
                                if let Ok(id) = page.add(&data) {
                                    live.insert(id, data);
                                    order.push(id);
                                }
                            }
                            Op::Del(i) => {
                                if order.is_empty() { continue; }
                                let id = order[i % order.len()];
                                if live.remove(&id).is_some() {
                                    page.del(id);
                                }
                            }
                            Op::Put(i, data) => {
                                if order.is_empty() { continue; }
                                let id = order[i % order.len()];
                                if live.contains_key(&id) && page.put(id, &data).is_ok() {
                                    live.insert(id, data);
                                }
                            }
                        }
                        let mut expect_ids: Vec<RecordId> = live.keys().copied().collect();
                        expect_ids.sort_unstable();
                        prop_assert_eq!(page.ids(), expect_ids);
                        for (id, data) in &live {
                            prop_assert_eq!(page.get(*id), Some(data.as_slice()));
                        }
                    }
                }
            }
        }
    };
}
use proptest_tests;
