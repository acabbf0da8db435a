//! Entry-point tables for navigation routines.
//!
//! A listing rarely has one reliable entry URL: sites expose the same
//! task under several identifiers depending on contract type, and some
//! of them answer with an error page for a given customer. Routines
//! therefore declare an ordered candidate list, try each until one lands
//! on a usable page, and pin the winner so later calls (and replays,
//! which must be deterministic) go straight to it.

use crate::error::SessionError;

// ============================================================================
// Entry Points
// ============================================================================

/// Ordered candidate entry identifiers with winner pinning.
#[derive(Debug, Clone)]
pub struct EntryPoints {
    candidates: Vec<String>,
    pinned: Option<usize>,
}

impl EntryPoints {
    /// Creates a table from candidates in fixed priority order.
    pub fn new<S: Into<String>>(candidates: impl IntoIterator<Item = S>) -> Self {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            pinned: None,
        }
    }

    /// Returns the candidates to try: the pinned winner alone, or all of
    /// them in priority order.
    pub fn candidates(&self) -> Vec<(usize, &str)> {
        match self.pinned {
            Some(index) => vec![(index, self.candidates[index].as_str())],
            None => self
                .candidates
                .iter()
                .enumerate()
                .map(|(i, c)| (i, c.as_str()))
                .collect(),
        }
    }

    /// Pins the winning candidate for subsequent calls.
    pub fn pin(&mut self, index: usize) {
        debug_assert!(index < self.candidates.len());
        self.pinned = Some(index);
    }

    /// Returns true if a winner has been pinned.
    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some()
    }

    /// The error to surface when every candidate answered an error page.
    pub fn exhausted(&self, what: &str) -> SessionError {
        SessionError::BrokenPage(format!("unable to reach the {what} page from any entry point"))
    }
}

// ============================================================================
// Tests
// ============================================================================
