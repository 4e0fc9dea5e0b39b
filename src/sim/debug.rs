//! Breakpoints and debug controls.
//!
//! The simulator checks breakpoints by 1-indexed source line: [`Simulator::run`]
//! pauses before executing a line with an active breakpoint, while
//! [`Simulator::step`] ignores breakpoints entirely (a step is already
//! the finest pause granularity).
//!
//! [`Simulator::run`]: crate::sim::Simulator::run
//! [`Simulator::step`]: crate::sim::Simulator::step

use std::collections::HashMap;

/// The set of breakpoints, keyed by 1-indexed source line.
///
/// Removing a breakpoint deactivates it rather than forgetting it,
/// so it can be toggled back on cheaply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Breakpoints {
    lines: HashMap<usize, bool>,
}

impl Breakpoints {
    /// Creates an empty breakpoint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates a breakpoint on a source line.
    pub fn add(&mut self, line: usize) {
        self.lines.insert(line, true);
    }

    /// Deactivates the breakpoint on a source line, if any.
    pub fn remove(&mut self, line: usize) {
        if let Some(active) = self.lines.get_mut(&line) {
            *active = false;
        }
    }

    /// Whether a source line has an active breakpoint.
    pub fn contains(&self, line: usize) -> bool {
        self.lines.get(&line).copied().unwrap_or(false)
    }

    /// The active breakpoint lines, in ascending order.
    pub fn lines(&self) -> Vec<usize> {
        let mut lines: Vec<_> = self.lines.iter()
            .filter(|&(_, &active)| active)
            .map(|(&line, _)| line)
            .collect();
        lines.sort_unstable();
        lines
    }

    /// Removes all breakpoints.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod test {
    use super::Breakpoints;

    #[test]
    fn test_toggle() {
        let mut bp = Breakpoints::new();
        bp.add(4);
        bp.add(9);
        assert!(bp.contains(4));
        assert!(!bp.contains(5));
        assert_eq!(bp.lines(), vec![4, 9]);

        bp.remove(4);
        assert!(!bp.contains(4));
        assert!(bp.contains(9));

        // removing an unknown line is a no-op
        bp.remove(100);
        assert_eq!(bp.lines(), vec![9]);
    }
}
