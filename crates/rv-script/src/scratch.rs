//! Per-session scratch store
//!
//! Holds the typed variables routines read and write, the frame stack that
//! backs `index()` lookups, the last captured step error, and the routine
//! call stack.
//!
//! The variable space is fixed by the routines that use it, so reading an
//! unknown name or doing integer arithmetic on a non-integer is an authoring
//! defect and panics.

use rv_core::RoutineName;
use std::collections::HashMap;
use std::fmt;

/// A typed scratch variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variable {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Variable {
    /// Zero value of the same kind
    pub fn zero(&self) -> Self {
        match self {
            Variable::Int(_) => Variable::Int(0),
            Variable::Bool(_) => Variable::Bool(false),
            Variable::Str(_) => Variable::Str(String::new()),
        }
    }

    /// Kind name, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Variable::Int(_) => "int",
            Variable::Bool(_) => "bool",
            Variable::Str(_) => "string",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Int(v) => write!(f, "{v}"),
            Variable::Bool(v) => write!(f, "{v}"),
            Variable::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Variable {
    fn from(v: i64) -> Self {
        Variable::Int(v)
    }
}

impl From<i32> for Variable {
    fn from(v: i32) -> Self {
        Variable::Int(v.into())
    }
}

impl From<bool> for Variable {
    fn from(v: bool) -> Self {
        Variable::Bool(v)
    }
}

impl From<String> for Variable {
    fn from(v: String) -> Self {
        Variable::Str(v)
    }
}

impl From<&str> for Variable {
    fn from(v: &str) -> Self {
        Variable::Str(v.to_string())
    }
}

/// Conversion out of a [`Variable`] of a known kind
pub trait FromVariable: Sized {
    fn from_variable(var: &Variable) -> Option<Self>;
}

impl FromVariable for i64 {
    fn from_variable(var: &Variable) -> Option<Self> {
        match var {
            Variable::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromVariable for bool {
    fn from_variable(var: &Variable) -> Option<Self> {
        match var {
            Variable::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromVariable for String {
    fn from_variable(var: &Variable) -> Option<Self> {
        match var {
            Variable::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Live state of one active loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopFrame {
    pub start: i64,
    /// Exclusive upper bound; `None` for unbounded loops
    pub stop: Option<i64>,
    pub step: i64,
    pub index: i64,
}

impl LoopFrame {
    pub fn new(start: i64, stop: Option<i64>, step: i64) -> Self {
        Self {
            start,
            stop,
            step,
            index: start,
        }
    }

    /// Whether `index` lies inside the loop's bounds
    pub fn in_range(&self) -> bool {
        match self.stop {
            None => true,
            Some(stop) if self.step > 0 => self.index < stop,
            Some(stop) => self.index > stop,
        }
    }
}

/// One entry of the frame stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Boundary of a called routine; index lookups never cross it
    Routine(RoutineName),
    /// Inline step list; transparent to index lookups and break depth
    Subroutine,
    Loop(LoopFrame),
}

/// Per-session scratch store
#[derive(Debug, Default)]
pub struct Scratch {
    variables: HashMap<String, Variable>,
    frames: Vec<Frame>,
    call_stack: Vec<RoutineName>,
    last_error: Option<String>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or overwrite a variable
    pub fn set(&mut self, name: &str, value: impl Into<Variable>) {
        self.variables.insert(name.to_string(), value.into());
    }

    /// Read a variable
    ///
    /// # Panics
    ///
    /// Panics if `name` was never set.
    pub fn get(&self, name: &str) -> &Variable {
        match self.variables.get(name) {
            Some(var) => var,
            None => panic!("unknown scratch variable '{name}'"),
        }
    }

    /// Read a variable as a concrete type
    ///
    /// # Panics
    ///
    /// Panics if `name` is unknown or holds a different kind.
    pub fn get_as<T: FromVariable>(&self, name: &str) -> T {
        let var = self.get(name);
        match T::from_variable(var) {
            Some(v) => v,
            None => panic!(
                "scratch variable '{name}' holds {}, not {}",
                var.kind(),
                std::any::type_name::<T>()
            ),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn increment(&mut self, name: &str) {
        self.add(name, 1);
    }

    pub fn decrement(&mut self, name: &str) {
        self.add(name, -1);
    }

    pub fn subtract(&mut self, name: &str, n: i64) {
        self.add(name, -n);
    }

    /// Add `n` to an integer variable
    ///
    /// # Panics
    ///
    /// Panics if `name` is unknown or not an integer.
    pub fn add(&mut self, name: &str, n: i64) {
        match self.variables.get_mut(name) {
            Some(Variable::Int(v)) => *v += n,
            Some(other) => panic!(
                "arithmetic on {} scratch variable '{name}'",
                other.kind()
            ),
            None => panic!("unknown scratch variable '{name}'"),
        }
    }

    /// Reset a variable to the zero value of its kind
    pub fn reset(&mut self, name: &str) {
        let zero = self.get(name).zero();
        self.variables.insert(name.to_string(), zero);
    }

    /// Remove a variable
    pub fn clear(&mut self, name: &str) {
        self.variables.remove(name);
    }

    /// Enter a called routine
    pub fn push_routine(&mut self, name: RoutineName) {
        self.call_stack.push(name.clone());
        self.frames.push(Frame::Routine(name));
    }

    pub fn pop_routine(&mut self) {
        match self.frames.pop() {
            Some(Frame::Routine(_)) => {
                self.call_stack.pop();
            }
            other => panic!("frame stack corrupted: expected routine, found {other:?}"),
        }
    }

    pub fn push_subroutine(&mut self) {
        self.frames.push(Frame::Subroutine);
    }

    pub fn pop_subroutine(&mut self) {
        match self.frames.pop() {
            Some(Frame::Subroutine) => {}
            other => panic!("frame stack corrupted: expected subroutine, found {other:?}"),
        }
    }

    pub fn push_loop(&mut self, frame: LoopFrame) {
        self.frames.push(Frame::Loop(frame));
    }

    /// Update the index of the innermost loop
    pub fn set_loop_index(&mut self, index: i64) {
        match self.frames.last_mut() {
            Some(Frame::Loop(frame)) => frame.index = index,
            other => panic!("frame stack corrupted: expected loop, found {other:?}"),
        }
    }

    pub fn pop_loop(&mut self) -> LoopFrame {
        match self.frames.pop() {
            Some(Frame::Loop(frame)) => frame,
            other => panic!("frame stack corrupted: expected loop, found {other:?}"),
        }
    }

    /// Loops active in the current routine
    pub fn loops(&self) -> impl Iterator<Item = &LoopFrame> {
        self.frames
            .iter()
            .rev()
            .take_while(|f| !matches!(f, Frame::Routine(_)))
            .filter_map(|f| match f {
                Frame::Loop(frame) => Some(frame),
                _ => None,
            })
    }

    /// Number of loops active in the current routine
    pub fn loop_depth(&self) -> usize {
        self.loops().count()
    }

    /// Index of the loop `depth` levels out (0 = innermost)
    ///
    /// # Panics
    ///
    /// Panics if fewer than `depth + 1` loops are active in the current
    /// routine.
    pub fn index(&self, depth: usize) -> i64 {
        match self.loops().nth(depth) {
            Some(frame) => frame.index,
            None => panic!(
                "index({depth}) read with only {} active loops",
                self.loop_depth()
            ),
        }
    }

    /// Drop every frame and call-stack entry, keeping variables
    pub fn discard_frames(&mut self) {
        self.frames.clear();
        self.call_stack.clear();
    }

    pub fn call_stack(&self) -> &[RoutineName] {
        &self.call_stack
    }

    /// Call stack rendered as `Outer -> Inner`
    pub fn print_stack(&self) -> String {
        self.call_stack
            .iter()
            .map(RoutineName::as_str)
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_last_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_arithmetic() {
        let mut scratch = Scratch::new();
        scratch.set("retries", 0);
        scratch.increment("retries");
        scratch.increment("retries");
        scratch.add("retries", 5);
        scratch.subtract("retries", 3);
        scratch.decrement("retries");
        assert_eq!(scratch.get_as::<i64>("retries"), 3);

        scratch.reset("retries");
        assert_eq!(scratch.get("retries"), &Variable::Int(0));
    }

    #[test]
    fn test_reset_by_kind() {
        let mut scratch = Scratch::new();
        scratch.set("flag", true);
        scratch.set("name", "hive");
        scratch.reset("flag");
        scratch.reset("name");
        assert_eq!(scratch.get("flag"), &Variable::Bool(false));
        assert_eq!(scratch.get("name"), &Variable::Str(String::new()));
    }

    #[test]
    fn test_clear() {
        let mut scratch = Scratch::new();
        scratch.set("x", 1);
        scratch.clear("x");
        assert!(!scratch.contains("x"));
    }

    #[test]
    #[should_panic(expected = "unknown scratch variable")]
    fn test_unknown_variable_panics() {
        Scratch::new().get("missing");
    }

    #[test]
    #[should_panic(expected = "arithmetic on bool")]
    fn test_arithmetic_on_bool_panics() {
        let mut scratch = Scratch::new();
        scratch.set("flag", false);
        scratch.increment("flag");
    }

    #[test]
    #[should_panic(expected = "holds string")]
    fn test_get_as_wrong_kind_panics() {
        let mut scratch = Scratch::new();
        scratch.set("name", "x");
        scratch.get_as::<i64>("name");
    }

    #[test]
    fn test_index_skips_subroutines_and_stops_at_routines() {
        let mut scratch = Scratch::new();
        scratch.push_routine(RoutineName::from("Main"));
        scratch.push_loop(LoopFrame::new(0, Some(10), 1));
        scratch.set_loop_index(4);
        scratch.push_subroutine();
        scratch.push_loop(LoopFrame::new(0, None, 1));
        scratch.set_loop_index(7);

        assert_eq!(scratch.loop_depth(), 2);
        assert_eq!(scratch.index(0), 7);
        assert_eq!(scratch.index(1), 4);

        scratch.push_routine(RoutineName::from("Inner"));
        assert_eq!(scratch.loop_depth(), 0);
        assert_eq!(scratch.print_stack(), "Main -> Inner");

        scratch.pop_routine();
        scratch.pop_loop();
        scratch.pop_subroutine();
        assert_eq!(scratch.index(0), 4);
    }

    #[test]
    #[should_panic(expected = "index(1) read with only 1 active loops")]
    fn test_index_out_of_scope_panics() {
        let mut scratch = Scratch::new();
        scratch.push_loop(LoopFrame::new(0, Some(1), 1));
        scratch.index(1);
    }

    #[test]
    fn test_discard_frames_keeps_variables() {
        let mut scratch = Scratch::new();
        scratch.set("counter", 3);
        scratch.push_routine(RoutineName::from("Main"));
        scratch.push_loop(LoopFrame::new(0, Some(2), 1));

        scratch.discard_frames();
        assert_eq!(scratch.loop_depth(), 0);
        assert!(scratch.call_stack().is_empty());
        assert_eq!(scratch.get_as::<i64>("counter"), 3);
    }
}
