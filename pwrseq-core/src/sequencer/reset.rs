//! Group writes for the reset lines.

use heapless::Vec;

use crate::hal::{DigitalOutputGroup, ResetLevel};

/// Widest reset group the transient value buffer can describe.
pub const MAX_RESET_LINES: usize = 32;

/// Transient per-line values handed to a single group write.
pub(crate) type LineValues = Vec<bool, MAX_RESET_LINES>;

/// Result of one reset group write.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum DriveOutcome {
    /// The group was written; carries the number of lines.
    Applied(usize),
    /// No reset group is bound.
    Absent,
    /// The value buffer could not hold the group; nothing was written.
    Skipped,
    /// The group write itself reported an error.
    Failed,
}

/// Builds a buffer holding `level` for every one of `count` lines.
pub(crate) fn replicate(level: ResetLevel, count: usize) -> Option<LineValues> {
    let mut values = LineValues::new();
    for _ in 0..count {
        values.push(level.as_bool()).ok()?;
    }
    Some(values)
}

/// Drives every line of `group` to `level` in one call.
pub(crate) fn drive<G>(group: Option<&mut G>, level: ResetLevel) -> DriveOutcome
where
    G: DigitalOutputGroup,
{
    let Some(group) = group else {
        return DriveOutcome::Absent;
    };

    let count = group.line_count();
    let Some(values) = replicate(level, count) else {
        log::warn!("pwrseq: reset group of {count} lines exceeds {MAX_RESET_LINES}, write skipped");
        return DriveOutcome::Skipped;
    };

    match group.set_array(&values) {
        Ok(()) => DriveOutcome::Applied(count),
        Err(err) => {
            log::warn!("pwrseq: reset group write ({level}) failed: {err:?}");
            DriveOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        lines: usize,
        writes: Vec<LineValues, 4>,
    }

    impl DigitalOutputGroup for Recorder {
        type Error = ();

        fn line_count(&self) -> usize {
            self.lines
        }

        fn set_array(&mut self, values: &[bool]) -> Result<(), Self::Error> {
            let copy = LineValues::from_slice(values).map_err(|_| ())?;
            self.writes.push(copy).map_err(|_| ())
        }
    }

    #[test]
    fn replicates_level_across_every_line() {
        let values = replicate(ResetLevel::Asserted, 3).unwrap();
        assert_eq!(values.as_slice(), &[true, true, true]);
        let values = replicate(ResetLevel::Deasserted, 2).unwrap();
        assert_eq!(values.as_slice(), &[false, false]);
    }

    #[test]
    fn oversized_group_is_skipped() {
        let mut group = Recorder {
            lines: MAX_RESET_LINES + 1,
            writes: Vec::new(),
        };
        assert_eq!(
            drive(Some(&mut group), ResetLevel::Asserted),
            DriveOutcome::Skipped
        );
        assert!(group.writes.is_empty());
    }

    #[test]
    fn single_call_writes_whole_group() {
        let mut group = Recorder {
            lines: 2,
            writes: Vec::new(),
        };
        assert_eq!(
            drive(Some(&mut group), ResetLevel::Deasserted),
            DriveOutcome::Applied(2)
        );
        assert_eq!(group.writes.len(), 1);
        assert_eq!(group.writes[0].as_slice(), &[false, false]);
    }

    #[test]
    fn missing_group_is_a_no_op() {
        assert_eq!(
            drive::<Recorder>(None, ResetLevel::Asserted),
            DriveOutcome::Absent
        );
    }
}
