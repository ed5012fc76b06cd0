//! Pipeline stage ordering
//!
//! `Pending → Load → Scan → Init → Step → Step → …`. There are no backward
//! transitions. A stage that fails leaves the pipeline in `Failed`, which
//! accepts nothing.

use crate::error::EngineError;

/// Last stage that completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PipelineStage {
    /// Nothing launched yet
    #[default]
    Pending,
    /// Partitions loaded
    Load,
    /// Loaded data validated
    Scan,
    /// Pieces resident
    Init,
    /// At least one iteration ran
    Step,
    /// A stage returned an error; no further stage may launch
    Failed,
}

impl PipelineStage {
    /// Stage that must have completed before `self` may launch
    #[must_use]
    pub const fn predecessor(self) -> Option<Self> {
        match self {
            Self::Pending | Self::Failed => None,
            Self::Load => Some(Self::Pending),
            Self::Scan => Some(Self::Load),
            Self::Init => Some(Self::Scan),
            Self::Step => Some(Self::Init),
        }
    }

    /// Check that `requested` may launch after `self`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StageOrder`] for an out-of-order launch
    pub fn check(self, requested: Self) -> Result<(), EngineError> {
        let ok = self != Self::Failed
            && ((self == Self::Step && requested == Self::Step) || requested.predecessor() == Some(self));
        if ok {
            Ok(())
        } else {
            Err(EngineError::StageOrder {
                requested,
                current: self,
            })
        }
    }
}
