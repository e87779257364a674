use std::sync::LazyLock;

use super::ControlKind;
use crate::{buffers::Slice, codec::control::WindowIdHeader};

/// Number of distinct window ids whose encoding is precomputed.
pub const CACHE_RANGE: usize = 16_000;

static CACHE: LazyLock<ControlTupleCache> = LazyLock::new(ControlTupleCache::build);

/// Precomputed encodings of every control tuple kind for window ids in
/// `0..CACHE_RANGE`.
///
/// Entry `i` of a kind is the encoding of that kind for window id `i`, hence
/// a valid encoding for every window id congruent to `i` modulo
/// [`CACHE_RANGE`]. The cache is built once per process and never mutated
/// afterwards, so any number of reservoirs can read it without coordination.
///
/// ```
/// use sluice::{CACHE_RANGE, ControlKind, serialized_tuple};
///
/// let a = serialized_tuple(ControlKind::EndStream, 5);
/// let b = serialized_tuple(ControlKind::EndStream, 5 + CACHE_RANGE as u64);
/// assert_eq!(a, b);
/// assert_eq!(a[0], ControlKind::EndStream.message_type());
/// ```
pub struct ControlTupleCache {
    tables: [Table; ControlKind::NUM],
}

struct Table {
    // All entries of a kind live in one buffer, entry `i` spans
    // `offsets[i]..offsets[i + 1]`.
    arena: Slice,
    offsets: Box<[usize]>,
}

impl Table {
    fn entry(&self, window_id: u64) -> (usize, usize) {
        let i = (window_id % CACHE_RANGE as u64) as usize;
        (self.offsets[i], self.offsets[i + 1])
    }
}

impl ControlTupleCache {
    /// Returns the process-wide cache.
    pub fn global() -> &'static Self {
        &CACHE
    }

    /// Builds the process-wide cache now rather than on first use.
    ///
    /// Call it during startup to keep the first control tuple of a stream off
    /// the slow path.
    pub fn init() {
        LazyLock::force(&CACHE);
    }

    fn build() -> Self {
        // Every kind shares the same layout, only the header byte differs.
        let mut template = Vec::with_capacity(CACHE_RANGE * 3);
        let mut offsets = Vec::with_capacity(CACHE_RANGE + 1);
        for window_id in 0..CACHE_RANGE as u64 {
            offsets.push(template.len());
            let header = WindowIdHeader {
                kind: ControlKind::BeginWindow,
                window_id,
            };
            template.extend_from_slice(&header.encode());
        }
        offsets.push(template.len());
        let offsets = offsets.into_boxed_slice();

        let tables = ControlKind::ALL.map(|kind| {
            let mut arena = template.clone();
            for &offset in &offsets[..CACHE_RANGE] {
                arena[offset] = kind.message_type();
            }
            Table {
                arena: arena.into_boxed_slice().into(),
                offsets: offsets.clone(),
            }
        });

        tracing::debug!("Built control tuple cache for {CACHE_RANGE} window ids");
        Self { tables }
    }

    fn table(&self, kind: ControlKind) -> &Table {
        &self.tables[kind.index()]
    }

    /// Returns the encoding of a `kind` control tuple for `window_id`.
    pub fn serialized_tuple(&self, kind: ControlKind, window_id: u64) -> &[u8] {
        let table = self.table(kind);
        let (start, end) = table.entry(window_id);
        &table.arena[start..end]
    }

    /// Same as [`serialized_tuple`](Self::serialized_tuple), as a shared
    /// [`Slice`] that can be handed over without copying.
    pub fn slice(&self, kind: ControlKind, window_id: u64) -> Slice {
        let table = self.table(kind);
        let (start, end) = table.entry(window_id);
        table
            .arena
            .view(start..end)
            .expect("cache offsets are built from the arena they index")
    }
}

/// Returns the cached encoding of a `kind` control tuple for `window_id`.
///
/// The encoding carries `window_id mod` [`CACHE_RANGE`]; receivers needing the
/// exact id derive it from the preceding reset window record.
pub fn serialized_tuple(kind: ControlKind, window_id: u64) -> &'static [u8] {
    ControlTupleCache::global().serialized_tuple(kind, window_id)
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::tuple::ControlTuple;

    #[test]
    fn congruent_ids_share_bytes() {
        let mut rng = rand::rng();
        for _ in 0..1_000 {
            let w1: u64 = rng.random_range(0..u64::MAX / 2);
            let w2 = w1 + CACHE_RANGE as u64 * rng.random_range(1..1_000_000);
            for kind in ControlKind::ALL {
                assert_eq!(serialized_tuple(kind, w1), serialized_tuple(kind, w2));
                assert_eq!(serialized_tuple(kind, w1)[0], kind.message_type());
            }
        }
    }

    #[test]
    fn entries_decode_to_their_index() {
        ControlTupleCache::init();
        let cache = ControlTupleCache::global();
        for window_id in [0, 1, 127, 128, CACHE_RANGE as u64 - 1] {
            for kind in ControlKind::ALL {
                let tuple = ControlTuple::from_slice(cache.slice(kind, window_id)).unwrap();
                assert_eq!(tuple.kind(), kind);
                assert_eq!(tuple.window_id(), window_id);
            }
        }
    }

    #[test]
    fn kinds_differ_only_in_header() {
        let window_id = 4_242;
        let begin = serialized_tuple(ControlKind::BeginWindow, window_id);
        let end = serialized_tuple(ControlKind::EndStream, window_id);
        assert_ne!(begin[0], end[0]);
        assert_eq!(begin[1..], end[1..]);
    }

    #[test]
    fn slice_is_one_entry() {
        let cache = ControlTupleCache::global();
        for kind in ControlKind::ALL {
            for window_id in 0..CACHE_RANGE as u64 {
                let slice = cache.slice(kind, window_id);
                assert_eq!(slice.as_slice(), cache.serialized_tuple(kind, window_id));
                assert!(slice.len() <= 3);
            }
        }
    }

    #[test]
    fn slice_shares_arena() {
        let cache = ControlTupleCache::global();
        let a = cache.slice(ControlKind::EndWindow, 9);
        let b = cache.slice(ControlKind::EndWindow, 9);
        assert_eq!(a.as_slice().as_ptr(), b.as_slice().as_ptr());
        assert_eq!(a.as_slice().as_ptr(), cache.serialized_tuple(ControlKind::EndWindow, 9).as_ptr());
    }
}
