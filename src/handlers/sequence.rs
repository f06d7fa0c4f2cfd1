/// Highest sequence value placed on the wire before wrapping to zero.
pub const SEQUENCE_MAX: u8 = 100;

/// Cycling per-session counter stamped into byte 1 of each command frame.
///
/// Replies are correlated by one-at-a-time command ordering, so the counter
/// only has to stay inside its wire range, never to be unique across a
/// session's lifetime.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CommandSequence {
    current: u8,
}

impl CommandSequence {
    /// Creates a sequence starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current sequence value and advances the counter.
    ///
    /// Advancing past [`SEQUENCE_MAX`] wraps to zero.
    ///
    /// ```
    /// use g200s::CommandSequence;
    ///
    /// let mut sequence = CommandSequence::new();
    /// assert_eq!(0, sequence.next());
    /// assert_eq!(1, sequence.next());
    /// ```
    pub fn next(&mut self) -> u8 {
        let issued = self.current;
        self.current = if issued == SEQUENCE_MAX { 0 } else { issued + 1 };
        issued
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn next_returns_current_value_then_increments() {
        let mut sequence = CommandSequence::new();

        for expected in 0..=99u8 {
            assert_eq!(expected, sequence.next());
            assert_eq!(expected + 1, sequence.current);
        }
    }

    #[test]
    fn next_wraps_to_zero_after_max() {
        let mut sequence = CommandSequence { current: SEQUENCE_MAX };

        assert_eq!(100, sequence.next());
        assert_eq!(0, sequence.current);
        assert_eq!(0, sequence.next());
        assert_eq!(1, sequence.next());
    }

    #[test]
    fn full_cycle_revisits_every_wire_value() {
        let mut sequence = CommandSequence::new();
        let first_cycle: Vec<u8> = (0..=100).map(|_| sequence.next()).collect();

        assert_eq!((0..=100u8).collect::<Vec<_>>(), first_cycle);
        assert_eq!(0, sequence.next());
    }
}
