// id.rs — Identifier allocation scoped to one compilation run
//
// Two namespaces live here: result ids for the emitted module, and branch
// tags for conditional regions of the graph. Both allocators are plain
// values owned by the run that uses them; nothing is process-wide.

use std::fmt;

/// Identifier of a conditional region (one per sink, one per branch side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchTag(pub u32);

impl fmt::Display for BranchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Mints graph-wide unique branch tags.
#[derive(Debug, Default)]
pub struct BranchTagAllocator {
    next: u32,
}

impl BranchTagAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self) -> BranchTag {
        let tag = BranchTag(self.next);
        self.next += 1;
        tag
    }
}

/// Monotonic allocator for module result ids.
///
/// Ids start at 1 (0 is never a valid result id). `bound()` is the exclusive
/// upper bound of everything issued so far, which is what the module header
/// records.
#[derive(Debug)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn bound(&self) -> u32 {
        self.next
    }
}
