//! Explicit node and element identifier allocation.
//!
//! One [`IdAllocator`] is threaded through every generator call of a run.
//! Composition hands it over as part of an [`IdHandoff`], so a second
//! generator continues numbering where the first stopped without reading
//! any shared counter.

use serde::Serialize;

use super::error::ScaffoldError;
use super::store::{ElementId, NodeId};

/// Dense identifier counter, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next_node: u32,
    next_element: u32,
}

impl IdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_node: 1,
            next_element: 1,
        }
    }

    /// Continues after the given highest identifiers already in use.
    #[must_use]
    pub fn continuing_after(last_node: Option<NodeId>, last_element: Option<ElementId>) -> Self {
        Self {
            next_node: last_node.map_or(1, |id| id.0 + 1),
            next_element: last_element.map_or(1, |id| id.0 + 1),
        }
    }

    pub fn node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub fn element(&mut self) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element += 1;
        id
    }

    #[must_use]
    pub fn peek_node(&self) -> NodeId {
        NodeId(self.next_node)
    }

    #[must_use]
    pub fn peek_element(&self) -> ElementId {
        ElementId(self.next_element)
    }

    /// Snapshot used to measure what a phase allocated.
    #[must_use]
    pub fn mark(&self) -> IdMark {
        IdMark {
            node: self.next_node,
            element: self.next_element,
        }
    }

    /// Identifiers allocated since `mark`.
    #[must_use]
    pub fn range_since(&self, mark: IdMark) -> IdRange {
        IdRange {
            first_node: mark.node,
            last_node: self.next_node - 1,
            first_element: mark.element,
            last_element: self.next_element - 1,
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocator position at some point of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMark {
    node: u32,
    element: u32,
}

/// Inclusive identifier ranges owned by one phase. A range with
/// `last < first` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdRange {
    pub first_node: u32,
    pub last_node: u32,
    pub first_element: u32,
    pub last_element: u32,
}

impl IdRange {
    #[must_use]
    pub fn node_count(&self) -> usize {
        (self.last_node + 1).saturating_sub(self.first_node) as usize
    }

    #[must_use]
    pub fn element_count(&self) -> usize {
        (self.last_element + 1).saturating_sub(self.first_element) as usize
    }

    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        (self.first_node..=self.last_node).contains(&id.0)
    }

    #[must_use]
    pub fn contains_element(&self, id: ElementId) -> bool {
        (self.first_element..=self.last_element).contains(&id.0)
    }

    /// Whether the node ranges of `self` and `other` share an identifier.
    #[must_use]
    pub fn overlaps_nodes(&self, other: &IdRange) -> bool {
        self.node_count() > 0
            && other.node_count() > 0
            && self.first_node <= other.last_node
            && other.first_node <= self.last_node
    }
}

/// Ownership of the identifier space passed from a generate phase to the
/// edit phase that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdHandoff {
    /// What the generate phase created.
    pub owned: IdRange,
    allocator: IdAllocator,
}

impl IdHandoff {
    #[must_use]
    pub fn new(owned: IdRange, allocator: IdAllocator) -> Self {
        Self { owned, allocator }
    }

    /// Takes over the allocator, checking it continues past `owned`.
    ///
    /// # Errors
    /// Returns [`ScaffoldError::IdRange`] if the allocator would reissue an
    /// identifier inside the handed-over range.
    pub fn into_allocator(self) -> Result<IdAllocator, ScaffoldError> {
        let next_node = self.allocator.peek_node().0;
        let next_element = self.allocator.peek_element().0;
        if next_node <= self.owned.last_node || next_element <= self.owned.last_element {
            return Err(ScaffoldError::IdRange {
                detail: format!(
                    "allocator at node {next_node}, element {next_element} overlaps owned range ending at node {}, element {}",
                    self.owned.last_node, self.owned.last_element
                ),
            });
        }
        Ok(self.allocator)
    }
}
