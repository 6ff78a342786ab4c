use arq_abstract::{ArqConfig, ConfigError, MAX_SEQ_RANGE};

/// Cyclic sequence numbers over the closed range `[min, max]`.
///
/// Numbers handed to the methods below are expected to lie inside the range;
/// [`SequenceSpace::contains`] is the check for anything read off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceSpace {
    min: i32,
    max: i32,
    len: usize,
}

impl SequenceSpace {
    pub fn new(min: i32, max: i32) -> Result<Self, ConfigError> {
        if max < min {
            return Err(ConfigError::InvalidRange { min, max });
        }
        let len = (i64::from(max) - i64::from(min) + 1) as usize;
        if len < 2 {
            return Err(ConfigError::RangeTooSmall {
                size: len,
                required: 2,
            });
        }
        if len > MAX_SEQ_RANGE {
            return Err(ConfigError::RangeTooLarge {
                size: len,
                max: MAX_SEQ_RANGE,
            });
        }
        Ok(Self { min, max, len })
    }

    pub fn from_config(config: &ArqConfig) -> Result<Self, ConfigError> {
        Self::new(config.min_seq, config.max_seq)
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    /// Number of distinct sequence numbers.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, n: i32) -> bool {
        self.min <= n && n <= self.max
    }

    pub fn increment(&self, n: i32) -> i32 {
        if n >= self.max { self.min } else { n + 1 }
    }

    pub fn previous(&self, n: i32) -> i32 {
        if n <= self.min { self.max } else { n - 1 }
    }

    /// Ring index of `n`, zero for `min`.
    pub fn slot(&self, n: i32) -> usize {
        debug_assert!(self.contains(n), "{n} outside [{}, {}]", self.min, self.max);
        (i64::from(n) - i64::from(self.min)) as usize
    }

    /// `n` moved forward by `steps`, wrapping as often as needed.
    pub fn advance(&self, n: i32, steps: usize) -> i32 {
        let offset = (self.slot(n) + steps % self.len) % self.len;
        (i64::from(self.min) + offset as i64) as i32
    }

    /// Forward steps needed to get from `from` to `to`.
    pub fn distance(&self, from: i32, to: i32) -> usize {
        (self.slot(to) + self.len - self.slot(from)) % self.len
    }

    /// Whether `n` lies in the `size`-long cyclic interval starting at `base`.
    pub fn in_window(&self, n: i32, base: i32, size: usize) -> bool {
        if size == 0 || !self.contains(n) {
            return false;
        }
        if size >= self.len {
            return true;
        }
        let end = self.advance(base, size - 1);
        if base <= end {
            base <= n && n <= end
        } else if n >= base {
            // wrapped, upper segment [base, max]
            true
        } else {
            // wrapped, lower segment [min, end]
            n <= end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(min: i32, max: i32) -> SequenceSpace {
        SequenceSpace::new(min, max).unwrap()
    }

    #[test]
    fn increment_and_previous_wrap_at_the_edges() {
        let s = space(0, 49);
        assert_eq!(s.increment(0), 1);
        assert_eq!(s.increment(49), 0);
        assert_eq!(s.previous(0), 49);
        assert_eq!(s.previous(17), 16);

        let bit = space(0, 1);
        assert_eq!(bit.increment(1), 0);
        assert_eq!(bit.previous(0), 1);
    }

    #[test]
    fn non_zero_minimum() {
        let s = space(10, 14);
        assert_eq!(s.len(), 5);
        assert_eq!(s.increment(14), 10);
        assert_eq!(s.previous(10), 14);
        assert_eq!(s.slot(12), 2);
        assert_eq!(s.advance(13, 3), 11);
        assert_eq!(s.distance(13, 11), 3);
    }

    #[test]
    fn rejects_degenerate_ranges() {
        assert!(matches!(
            SequenceSpace::new(4, 4),
            Err(ConfigError::RangeTooSmall { size: 1, .. })
        ));
        assert!(matches!(
            SequenceSpace::new(4, 3),
            Err(ConfigError::InvalidRange { .. })
        ));
        assert!(matches!(
            SequenceSpace::new(i32::MIN, i32::MAX),
            Err(ConfigError::RangeTooLarge { .. })
        ));
    }

    #[test]
    fn distance_is_zero_for_equal_numbers() {
        let s = space(0, 49);
        assert_eq!(s.distance(7, 7), 0);
        assert_eq!(s.distance(45, 2), 7);
        assert_eq!(s.distance(2, 45), 43);
    }

    #[test]
    fn window_without_wrap() {
        let s = space(0, 49);
        assert!(s.in_window(10, 10, 8));
        assert!(s.in_window(15, 10, 8));
        assert!(s.in_window(17, 10, 8));
        assert!(!s.in_window(18, 10, 8));
        assert!(!s.in_window(9, 10, 8));
    }

    #[test]
    fn window_wrapping_upper_segment() {
        let s = space(0, 49);
        assert!(s.in_window(45, 45, 8));
        assert!(s.in_window(48, 45, 8));
        assert!(s.in_window(49, 45, 8));
        assert!(!s.in_window(44, 45, 8));
    }

    #[test]
    fn window_wrapping_lower_segment() {
        let s = space(0, 49);
        assert!(s.in_window(0, 45, 8));
        assert!(s.in_window(1, 45, 8));
        assert!(s.in_window(2, 45, 8));
        assert!(!s.in_window(3, 45, 8));
        assert!(!s.in_window(20, 45, 8));
    }

    #[test]
    fn window_rejects_out_of_range_numbers() {
        let s = space(0, 49);
        assert!(!s.in_window(-1, 45, 8));
        assert!(!s.in_window(50, 45, 8));
        assert!(!s.in_window(3, 3, 0));
        assert!(s.in_window(30, 3, 50));
    }
}
