use std::num::NonZeroUsize;

/// Unique id to identify a class definition in the class path
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct ClassUid(NonZeroUsize);

impl ClassUid {
    pub(crate) fn from_idx(idx: usize) -> Self {
        Self(NonZeroUsize::MIN.saturating_add(idx))
    }

    pub(crate) fn idx(self) -> usize {
        self.0.get() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idx_round_trip() {
        for i in [0, 1, 41] {
            assert_eq!(ClassUid::from_idx(i).idx(), i);
        }
        assert!(ClassUid::from_idx(0) < ClassUid::from_idx(1));
    }
}
