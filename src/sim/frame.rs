//! Tracking the call stack of the executing program.
//!
//! The simulator keeps a stack of [`Frame`]s, one per active call. A frame
//! records the function's name (the label `jal` jumped to) and the source
//! line the function is currently on; the line of the top frame is updated
//! as execution proceeds, so the rendered stack always points at live
//! source lines.
//!
//! The bottom frame (`main`) is seeded when a program is loaded. A `jal`
//! pushes a frame and a `jalr` return pops one; when the stack empties,
//! the program is complete.

use std::fmt;

/// A single frame in the simulator's call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The name of the function this frame belongs to.
    pub name: String,
    /// The 1-indexed source line this frame is currently on.
    pub line: usize,
}

/// The call stack of the executing program.
///
/// Frames are ordered outermost first, so `main` sits at index 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    /// Creates an empty call stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the stack and seeds the bottom frame.
    pub fn seed(&mut self, name: &str, line: usize) {
        self.frames.clear();
        self.frames.push(Frame { name: name.to_string(), line });
    }

    /// Clears the stack entirely (execution complete or aborted).
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Pushes a frame for a function call.
    pub(super) fn push(&mut self, name: String, line: usize) {
        self.frames.push(Frame { name, line });
    }

    /// Pops the top frame on a return. No-op if the stack is empty.
    pub(super) fn pop(&mut self) {
        self.frames.pop();
    }

    /// Points the top frame at a new source line.
    pub(super) fn update_line(&mut self, line: usize) {
        if let Some(top) = self.frames.last_mut() {
            top.line = line;
        }
    }

    /// The frames, outermost first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Whether the stack has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl fmt::Display for CallStack {
    /// Renders the stack outermost frame first, one per line, or a
    /// completion message if there are no frames.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return f.write_str("Empty Call Stack: Execution complete");
        }
        writeln!(f, "Call Stack:")?;
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}:{}", frame.name, frame.line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::CallStack;

    #[test]
    fn test_push_pop() {
        let mut st = CallStack::new();
        st.seed("main", 1);
        st.push("helper".to_string(), 5);
        assert_eq!(st.len(), 2);
        assert_eq!(st.frames()[1].name, "helper");

        st.pop();
        assert_eq!(st.len(), 1);
        st.pop();
        assert!(st.is_empty());
        // popping an empty stack is a no-op
        st.pop();
        assert!(st.is_empty());
    }

    #[test]
    fn test_update_line() {
        let mut st = CallStack::new();
        st.seed("main", 1);
        st.update_line(4);
        assert_eq!(st.frames()[0].line, 4);
    }

    #[test]
    fn test_render() {
        let mut st = CallStack::new();
        assert_eq!(st.to_string(), "Empty Call Stack: Execution complete");

        st.seed("main", 3);
        st.push("func".to_string(), 7);
        assert_eq!(st.to_string(), "Call Stack:\nmain:3\nfunc:7");
    }
}
