//! Wire types shared by the lorgnette client and tooling.
//!
//! The compiler under inspection distinguishes *breakpoints*, lightweight
//! execution markers carrying only a label and a source location, from
//! *snapshots*, which dump the whole compiler state (every method's
//! control-flow graph) for one breakpoint index. Breakpoints are cheap and
//! polled continuously; snapshots are heavyweight and fetched on demand.

use std::collections::BTreeMap;
use std::fmt;

use facet::Facet;

/// Method key the client selects when the user has expressed no preference.
pub const DEFAULT_ENTRY_POINT: &str = "mj_main";

/// Paths on the compiler-debug HTTP surface.
pub mod endpoints {
    pub const BREAKPOINT_CONTINUE: &str = "/breakpoint/continue";
    pub const BREAKPOINT_LISTING: &str = "/breakpoint/all";
    pub const SNAPSHOT_LATEST: &str = "/snapshot/latest";

    pub fn snapshot(index: usize) -> String {
        format!("/snapshot/{index}")
    }
}

/// One paused execution point inside the compiler under inspection.
///
/// Identity is positional: a breakpoint is identified by its index in the
/// recorded history, never by its content. Consecutive breakpoints with the
/// same location are normal (loop iterations).
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub label: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Breakpoint {
    /// Location equality, for display grouping of repeated breakpoints only.
    pub fn same_location(&self, other: &Breakpoint) -> bool {
        self.file == other.file && self.line == other.line && self.column == other.column
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}@{}:{}",
            self.label, self.file, self.line, self.column
        )
    }
}

/// One compiled method's graph, as layout-engine input.
///
/// `source_text` is a textual graph description (DOT); the client treats it
/// as opaque.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    pub name: String,
    pub source_text: String,
}

/// Full compiler-state dump captured at one breakpoint.
///
/// `graphs` maps method keys to per-method graphs. `BTreeMap` keeps the
/// iteration order deterministic, which the method-selection fallback
/// relies on.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct CompilationState {
    pub breakpoint: Breakpoint,
    pub graphs: BTreeMap<String, Graph>,
}

/// Which history entry the user wants to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotPreference {
    /// Track the newest recorded breakpoint as history grows.
    #[default]
    Latest,
    /// Pin a concrete history index.
    Index(usize),
}

/// Liveness of the remote compiler-debug process.
///
/// `Connecting` is the initial state only; once the first call succeeds it
/// is never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}
