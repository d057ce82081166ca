use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::{CbnError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

#[derive(Debug, Clone)]
pub struct Poset {
    n_events: usize,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    topo_order: Vec<usize>,
    cycle: bool,
    reduced: bool,
}

impl Poset {
    pub fn empty(n_events: usize) -> Self {
        Self {
            n_events,
            parents: vec![Vec::new(); n_events],
            children: vec![Vec::new(); n_events],
            topo_order: (0..n_events).collect(),
            cycle: false,
            reduced: true,
        }
    }

    /// Duplicate edges collapse; a cycle sets the flag instead of failing.
    pub fn from_edges(n_events: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut poset = Self {
            n_events,
            parents: vec![Vec::new(); n_events],
            children: vec![Vec::new(); n_events],
            topo_order: Vec::with_capacity(n_events),
            cycle: false,
            reduced: edges.is_empty(),
        };
        for &(from, to) in edges {
            if from >= n_events || to >= n_events {
                return Err(CbnError::InvalidEdge {
                    from,
                    to,
                    n_events,
                });
            }
            if !poset.children[from].contains(&to) {
                poset.children[from].push(to);
                poset.parents[to].push(from);
            }
        }
        poset.sort_adjacency();
        if !poset.cycle_check() {
            poset.topological_sort()?;
        }
        Ok(poset)
    }

    pub fn acyclic(n_events: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let poset = Self::from_edges(n_events, edges)?;
        poset.ensure_acyclic()?;
        Ok(poset)
    }

    pub fn from_adjacency_matrix(adjacency: ArrayView2<'_, u8>) -> Result<Self> {
        let (rows, cols) = adjacency.dim();
        if rows != cols {
            return Err(CbnError::dimension("adjacency matrix columns", rows, cols));
        }
        let mut edges = Vec::new();
        for ((u, v), &x) in adjacency.indexed_iter() {
            if x != 0 {
                edges.push((u, v));
            }
        }
        Self::from_edges(rows, &edges)
    }

    pub fn adjacency_matrix(&self) -> Array2<u8> {
        let mut adjacency = Array2::zeros((self.n_events, self.n_events));
        for (u, kids) in self.children.iter().enumerate() {
            for &v in kids {
                adjacency[[u, v]] = 1;
            }
        }
        adjacency
    }

    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.children
            .iter()
            .enumerate()
            .flat_map(|(u, kids)| kids.iter().map(move |&v| (u, v)))
            .collect()
    }

    pub fn n_events(&self) -> usize {
        self.n_events
    }

    pub fn n_edges(&self) -> usize {
        self.children.iter().map(Vec::len).sum()
    }

    pub fn has_cycle(&self) -> bool {
        self.cycle
    }

    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    pub fn parents(&self, node: usize) -> &[usize] {
        &self.parents[node]
    }

    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    pub fn topological_order(&self) -> &[usize] {
        &self.topo_order
    }

    pub fn ensure_acyclic(&self) -> Result<()> {
        if self.cycle || self.topo_order.len() != self.n_events {
            return Err(CbnError::NotAcyclic);
        }
        Ok(())
    }

    pub fn cycle_check(&mut self) -> bool {
        let mut marks = vec![Mark::Unvisited; self.n_events];
        let mut cycle = false;

        'roots: for root in 0..self.n_events {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::OnStack;
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                if next < self.children[node].len() {
                    frame.1 += 1;
                    let child = self.children[node][next];
                    match marks[child] {
                        Mark::OnStack => {
                            cycle = true;
                            break 'roots;
                        }
                        Mark::Unvisited => {
                            marks[child] = Mark::OnStack;
                            stack.push((child, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }

        self.cycle = cycle;
        if cycle {
            self.topo_order.clear();
        }
        cycle
    }

    /// Ready events are taken smallest index first.
    pub fn topological_sort(&mut self) -> Result<&[usize]> {
        if self.cycle {
            return Err(CbnError::NotAcyclic);
        }
        let mut indegree: Vec<usize> = self.parents.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(v, _)| Reverse(v))
            .collect();

        let mut order = Vec::with_capacity(self.n_events);
        while let Some(Reverse(v)) = ready.pop() {
            order.push(v);
            for &c in &self.children[v] {
                indegree[c] -= 1;
                if indegree[c] == 0 {
                    ready.push(Reverse(c));
                }
            }
        }
        if order.len() != self.n_events {
            self.cycle = true;
            self.topo_order.clear();
            return Err(CbnError::NotAcyclic);
        }
        self.topo_order = order;
        Ok(&self.topo_order)
    }

    pub fn successors(&self, node: usize) -> Vec<usize> {
        let mut seen = vec![false; self.n_events];
        let mut stack: Vec<usize> = self.children[node].clone();
        while let Some(v) = stack.pop() {
            if seen[v] {
                continue;
            }
            seen[v] = true;
            stack.extend(self.children[v].iter().copied().filter(|&c| !seen[c]));
        }
        (0..self.n_events).filter(|&v| seen[v]).collect()
    }

    pub fn transitive_reduction(&mut self) -> Result<()> {
        self.ensure_acyclic()?;
        let reach = self.reachability();

        for u in 0..self.n_events {
            let kids = &self.children[u];
            let kept: Vec<usize> = kids
                .iter()
                .copied()
                .filter(|&v| !kids.iter().any(|&w| w != v && reach[[w, v]]))
                .collect();
            self.children[u] = kept;
        }

        for list in self.parents.iter_mut() {
            list.clear();
        }
        for (u, kids) in self.children.iter().enumerate() {
            for &v in kids {
                self.parents[v].push(u);
            }
        }
        self.sort_adjacency();
        self.reduced = true;
        self.topological_sort()?;
        Ok(())
    }

    pub fn is_compatible(&self, genotype: ArrayView1<'_, bool>) -> Result<bool> {
        Ok(self.num_incompatible_events(genotype)? == 0)
    }

    pub fn num_incompatible_events(&self, genotype: ArrayView1<'_, bool>) -> Result<usize> {
        if genotype.len() != self.n_events {
            return Err(CbnError::dimension("genotype", self.n_events, genotype.len()));
        }
        Ok((0..self.n_events)
            .filter(|&v| genotype[v] && self.parents[v].iter().any(|&u| !genotype[u]))
            .count())
    }

    pub fn num_compatible_observations(&self, genotypes: ArrayView2<'_, bool>) -> Result<usize> {
        let mut count = 0;
        for row in genotypes.outer_iter() {
            if self.is_compatible(row)? {
                count += 1;
            }
        }
        Ok(count)
    }

    // reach[[u, v]] is true iff v is a successor of u. Requires an acyclic
    // graph with a cached order.
    fn reachability(&self) -> Array2<bool> {
        let mut reach = Array2::from_elem((self.n_events, self.n_events), false);
        for &u in self.topo_order.iter().rev() {
            for &c in &self.children[u] {
                reach[[u, c]] = true;
                for w in 0..self.n_events {
                    if reach[[c, w]] {
                        reach[[u, w]] = true;
                    }
                }
            }
        }
        reach
    }

    fn sort_adjacency(&mut self) {
        for list in self.children.iter_mut().chain(self.parents.iter_mut()) {
            list.sort_unstable();
        }
    }
}
