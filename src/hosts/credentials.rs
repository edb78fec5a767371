//! Credential selection
//!
//! A host may list several credentials; spreading requests over them spreads
//! the rate-limit consumption as well.

use rand::Rng;

/// Chooses which of `count` credentials a request uses
pub trait CredentialPicker: Send + Sync {
    /// Index in `0..count`, or `None` when there is nothing to pick
    fn pick(&self, count: usize) -> Option<usize>;
}

/// Picks uniformly at random on every call
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPicker;

impl CredentialPicker for RandomPicker {
    fn pick(&self, count: usize) -> Option<usize> {
        match count {
            0 => None,
            1 => Some(0),
            n => Some(rand::rng().random_range(0..n)),
        }
    }
}

/// Always picks the same index, clamped to the available credentials
#[derive(Debug, Clone, Copy)]
pub struct FixedPicker(pub usize);

impl CredentialPicker for FixedPicker {
    fn pick(&self, count: usize) -> Option<usize> {
        if count == 0 {
            None
        } else {
            Some(self.0.min(count - 1))
        }
    }
}
