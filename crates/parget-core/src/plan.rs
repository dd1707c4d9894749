//! Byte-range planning for multi-connection transfers

/// Sentinel end offset for a range whose total size is unknown.
pub const OPEN_END: u64 = u64::MAX;

/// One contiguous byte span of the resource, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub index: u32,
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Span length in bytes. Open-ended ranges report `OPEN_END`.
    pub fn size(&self) -> u64 {
        if self.is_open_ended() {
            OPEN_END
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_open_ended(&self) -> bool {
        self.end == OPEN_END
    }
}

/// Split `[0, total_size - 1]` into `parts` near-equal contiguous ranges.
///
/// An unknown (or zero) size yields a single open-ended range, since
/// splitting is impossible without a length. A part count larger than
/// the resource is clamped so every range carries at least one byte.
/// The final range absorbs the integer-division remainder, so the
/// ranges always tile the resource with no gap or overlap.
pub fn plan(total_size: Option<u64>, parts: u32) -> Vec<ByteRange> {
    let size = match total_size {
        Some(s) if s > 0 => s,
        _ => {
            return vec![ByteRange {
                index: 0,
                start: 0,
                end: OPEN_END,
            }]
        }
    };

    let parts = u64::from(parts.max(1)).min(size);
    let chunk = size / parts;

    (0..parts)
        .map(|i| {
            let start = i * chunk;
            let end = if i == parts - 1 {
                size - 1
            } else {
                (i + 1) * chunk - 1
            };
            ByteRange {
                index: i as u32,
                start,
                end,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiles(ranges: &[ByteRange], size: u64) {
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges[ranges.len() - 1].end, size - 1);
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + 1, "gap or overlap at {pair:?}");
            assert!(pair[0].index < pair[1].index);
        }
        assert_eq!(ranges.iter().map(ByteRange::size).sum::<u64>(), size);
    }

    #[test]
    fn splits_evenly_when_divisible() {
        let ranges = plan(Some(1_000_000), 4);
        assert_eq!(ranges.len(), 4);
        assert!(ranges.iter().all(|r| r.size() == 250_000));
        assert_tiles(&ranges, 1_000_000);
    }

    #[test]
    fn last_range_absorbs_remainder() {
        let ranges = plan(Some(1003), 4);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].size(), 250);
        assert_eq!(ranges[3].size(), 253);
        assert_tiles(&ranges, 1003);
    }

    #[test]
    fn tiles_exactly_for_assorted_inputs() {
        for size in [1u64, 2, 7, 100, 1024, 65_537, 1_000_000] {
            for parts in [1u32, 2, 3, 4, 32, 100] {
                let ranges = plan(Some(size), parts);
                assert_tiles(&ranges, size);
            }
        }
    }

    #[test]
    fn clamps_parts_to_resource_size() {
        let ranges = plan(Some(5), 32);
        assert_eq!(ranges.len(), 5);
        assert!(ranges.iter().all(|r| r.size() == 1));
        assert_tiles(&ranges, 5);
    }

    #[test]
    fn single_part_covers_everything() {
        let ranges = plan(Some(9999), 1);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges[0].end, 9998);
    }

    #[test]
    fn unknown_size_is_one_open_ended_range() {
        for total in [None, Some(0)] {
            let ranges = plan(total, 32);
            assert_eq!(ranges.len(), 1);
            assert_eq!(ranges[0].start, 0);
            assert!(ranges[0].is_open_ended());
        }
    }

    #[test]
    fn zero_parts_is_treated_as_one() {
        let ranges = plan(Some(100), 0);
        assert_eq!(ranges.len(), 1);
        assert_tiles(&ranges, 100);
    }
}
