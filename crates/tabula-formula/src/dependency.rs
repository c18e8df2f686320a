//! Dependency tracking for formula calculation
//!
//! The graph stores both directions of every edge: which cells a formula
//! reads (precedents) and which formulas read a cell (dependents). Dirty
//! propagation and scheduling are iterative, so deep chains never touch
//! the native stack.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use tabula_core::Worksheet;

use crate::ast::{FormulaExpr, Reference};
use crate::evaluator::EvaluationContext;

/// Unique key for a cell (sheet index + address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub sheet: usize,
    pub row: u32,
    pub col: u16,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }
}

/// A group of cells evaluated together
///
/// Acyclic cells come out as singleton groups. A cyclic group holds every
/// member of one strongly connected component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcGroup {
    pub cells: Vec<CellKey>,
    pub cyclic: bool,
}

/// Dependency graph for formula cells
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Cell → cells that read it
    dependents: AHashMap<CellKey, AHashSet<CellKey>>,
    /// Cell → cells it reads
    precedents: AHashMap<CellKey, AHashSet<CellKey>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: dependent reads precedent
    pub fn add_dependency(&mut self, precedent: CellKey, dependent: CellKey) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Replace everything `cell` reads; cells reading `cell` are kept
    pub fn set_precedents(&mut self, cell: CellKey, precedents: impl IntoIterator<Item = CellKey>) {
        self.remove_precedents(cell);
        for precedent in precedents {
            self.add_dependency(precedent, cell);
        }
    }

    /// Forget everything `cell` reads
    pub fn remove_precedents(&mut self, cell: CellKey) {
        if let Some(precedents) = self.precedents.remove(&cell) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.dependents.remove(&precedent);
                    }
                }
            }
        }
    }

    /// Cells that read `cell`
    pub fn dependents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Cells that `cell` reads
    pub fn precedents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Number of cells with at least one precedent
    pub fn formula_count(&self) -> usize {
        self.precedents.len()
    }

    /// The seeds plus everything transitively downstream of them
    pub fn dirty_closure(&self, seeds: impl IntoIterator<Item = CellKey>) -> AHashSet<CellKey> {
        let mut dirty = AHashSet::new();
        let mut queue: VecDeque<CellKey> = VecDeque::new();
        for seed in seeds {
            if dirty.insert(seed) {
                queue.push_back(seed);
            }
        }
        while let Some(cell) = queue.pop_front() {
            for dependent in self.dependents(cell) {
                if dirty.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        dirty
    }

    /// Order `cells` so every group follows the groups it reads
    ///
    /// This is Tarjan's strongly connected components walk with an explicit
    /// stack. Edges leaving `cells` are ignored: those precedents are
    /// already up to date.
    pub fn schedule(&self, cells: &AHashSet<CellKey>) -> Vec<CalcGroup> {
        let mut roots: Vec<CellKey> = cells.iter().copied().collect();
        roots.sort_unstable();

        let mut tarjan = Tarjan::default();
        for root in roots {
            if !tarjan.index.contains_key(&root) {
                tarjan.run(self, cells, root);
            }
        }
        tarjan.groups
    }

    fn sorted_precedents_within(&self, cell: CellKey, cells: &AHashSet<CellKey>) -> Vec<CellKey> {
        let mut out: Vec<CellKey> = self.precedents(cell).filter(|p| cells.contains(p)).collect();
        out.sort_unstable();
        out
    }

    fn reads_itself(&self, cell: CellKey) -> bool {
        self.precedents
            .get(&cell)
            .is_some_and(|set| set.contains(&cell))
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
    }
}

#[derive(Default)]
struct Tarjan {
    next_index: usize,
    index: AHashMap<CellKey, usize>,
    lowlink: AHashMap<CellKey, usize>,
    /// Cells still being evaluated; meeting one again closes a cycle
    on_stack: AHashSet<CellKey>,
    stack: Vec<CellKey>,
    groups: Vec<CalcGroup>,
}

struct Frame {
    cell: CellKey,
    neighbours: Vec<CellKey>,
    next: usize,
}

impl Tarjan {
    fn visit(&mut self, graph: &DependencyGraph, cells: &AHashSet<CellKey>, cell: CellKey) -> Frame {
        self.index.insert(cell, self.next_index);
        self.lowlink.insert(cell, self.next_index);
        self.next_index += 1;
        self.stack.push(cell);
        self.on_stack.insert(cell);
        Frame {
            cell,
            neighbours: graph.sorted_precedents_within(cell, cells),
            next: 0,
        }
    }

    fn low(&self, cell: CellKey) -> usize {
        self.lowlink.get(&cell).copied().unwrap_or(usize::MAX)
    }

    fn run(&mut self, graph: &DependencyGraph, cells: &AHashSet<CellKey>, root: CellKey) {
        let mut frames = vec![self.visit(graph, cells, root)];

        while let Some(frame) = frames.last_mut() {
            if frame.next < frame.neighbours.len() {
                let cell = frame.cell;
                let next = frame.neighbours[frame.next];
                frame.next += 1;

                if let Some(&index) = self.index.get(&next) {
                    if self.on_stack.contains(&next) {
                        let low = self.low(cell).min(index);
                        self.lowlink.insert(cell, low);
                    }
                } else {
                    let child = self.visit(graph, cells, next);
                    frames.push(child);
                }
                continue;
            }

            let cell = frame.cell;
            frames.pop();

            if Some(&self.low(cell)) == self.index.get(&cell) {
                let mut members = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack.remove(&member);
                    members.push(member);
                    if member == cell {
                        break;
                    }
                }
                members.sort_unstable();
                let cyclic = members.len() > 1 || graph.reads_itself(cell);
                self.groups.push(CalcGroup {
                    cells: members,
                    cyclic,
                });
            }

            if let Some(parent) = frames.last() {
                let low = self.low(parent.cell).min(self.low(cell));
                self.lowlink.insert(parent.cell, low);
            }
        }
    }
}

/// Every cell a formula on sheet `sheet` reads
///
/// Ranges expand to their cells, clipped to the sheet's bounds. References
/// to unknown sheets are skipped; they evaluate to `#REF!` anyway.
pub fn precedents_of(expr: &FormulaExpr, sheet: usize, sheets: &[Worksheet]) -> Vec<CellKey> {
    let ctx = EvaluationContext::new(sheets, sheet, 0, 0);
    let mut out = Vec::new();

    for reference in expr.references() {
        match reference {
            Reference::Cell(r) => {
                let Some(target) = ctx.sheet_index(r.sheet.as_deref()) else {
                    continue;
                };
                if sheets[target].in_bounds(r.address.row, r.address.col) {
                    out.push(CellKey::new(target, r.address.row, r.address.col));
                }
            }
            Reference::Range(r) => {
                let Some(target) = ctx.sheet_index(r.sheet.as_deref()) else {
                    continue;
                };
                let ws = &sheets[target];
                if ws.row_count() == 0 || ws.column_count() == 0 {
                    continue;
                }
                let last_row = r.range.last_row().min(ws.row_count() - 1);
                let last_col = r.range.last_col().min(ws.column_count() - 1);
                for row in r.range.first_row()..=last_row {
                    for col in r.range.first_col()..=last_col {
                        out.push(CellKey::new(target, row, col));
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;

    fn key(row: u32, col: u16) -> CellKey {
        CellKey::new(0, row, col)
    }

    fn all(graph: &DependencyGraph, cells: &[CellKey]) -> Vec<CalcGroup> {
        graph.schedule(&cells.iter().copied().collect())
    }

    #[test]
    fn test_set_precedents_replaces_only_outgoing_edges() {
        let mut graph = DependencyGraph::new();
        let (a1, b1, c1) = (key(0, 0), key(0, 1), key(0, 2));

        graph.add_dependency(a1, b1);
        graph.add_dependency(b1, c1);
        graph.set_precedents(b1, [c1]);

        assert_eq!(graph.precedents(b1).collect::<Vec<_>>(), vec![c1]);
        assert_eq!(graph.dependents(a1).count(), 0);
        // C1 still reads B1
        assert_eq!(graph.dependents(b1).collect::<Vec<_>>(), vec![c1]);
    }

    #[test]
    fn test_dirty_closure_follows_dependents() {
        let mut graph = DependencyGraph::new();
        let (a1, b1, c1, d1) = (key(0, 0), key(0, 1), key(0, 2), key(0, 3));
        graph.add_dependency(a1, b1);
        graph.add_dependency(b1, c1);
        graph.add_dependency(d1, c1);

        let dirty = graph.dirty_closure([a1]);
        assert_eq!(dirty.len(), 3);
        assert!(!dirty.contains(&d1));
    }

    #[test]
    fn test_schedule_puts_precedents_first() {
        let mut graph = DependencyGraph::new();
        let (a1, b1, c1) = (key(0, 0), key(0, 1), key(0, 2));
        // C1 reads B1, B1 reads A1
        graph.add_dependency(b1, c1);
        graph.add_dependency(a1, b1);

        let order: Vec<CellKey> = all(&graph, &[c1, b1, a1])
            .into_iter()
            .map(|g| {
                assert!(!g.cyclic);
                g.cells[0]
            })
            .collect();
        assert_eq!(order, vec![a1, b1, c1]);
    }

    #[test]
    fn test_cycles_become_one_group() {
        let mut graph = DependencyGraph::new();
        let (a1, b1, c1, d1) = (key(0, 0), key(0, 1), key(0, 2), key(0, 3));
        // A1 -> B1 -> C1 -> A1, D1 reads C1
        graph.add_dependency(a1, b1);
        graph.add_dependency(b1, c1);
        graph.add_dependency(c1, a1);
        graph.add_dependency(c1, d1);

        let groups = all(&graph, &[a1, b1, c1, d1]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].cells, vec![a1, b1, c1]);
        assert!(groups[0].cyclic);
        assert_eq!(groups[1].cells, vec![d1]);
        assert!(!groups[1].cyclic);
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let mut graph = DependencyGraph::new();
        let a1 = key(0, 0);
        graph.add_dependency(a1, a1);
        let groups = all(&graph, &[a1]);
        assert_eq!(groups, vec![CalcGroup { cells: vec![a1], cyclic: true }]);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let mut graph = DependencyGraph::new();
        let cells: Vec<CellKey> = (0..100_000).map(|r| key(r, 0)).collect();
        for pair in cells.windows(2) {
            graph.add_dependency(pair[0], pair[1]);
        }
        let groups = all(&graph, &cells);
        assert_eq!(groups.len(), cells.len());
        assert_eq!(groups.first().map(|g| g.cells[0]), Some(cells[0]));
        assert_eq!(groups.last().map(|g| g.cells[0]), cells.last().copied());
    }

    #[test]
    fn test_precedents_of_clips_ranges_and_skips_unknown_sheets() {
        let sheets = vec![Worksheet::new("Sheet1", 3, 3), Worksheet::new("Other", 5, 5)];
        let parsed = parse_formula("=SUM(B2:D9)+Other!A1+Missing!A1");
        let mut found = precedents_of(parsed.root.as_ref().unwrap(), 0, &sheets);
        found.sort_unstable();
        assert_eq!(
            found,
            vec![key(1, 1), key(1, 2), key(2, 1), key(2, 2), CellKey::new(1, 0, 0)]
        );
    }
}
