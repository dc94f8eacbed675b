use fnv::FnvHashMap;

use crate::engine::variables::IntegerVariable;
use crate::engine::Assignments;
use crate::tally_assert_moderate;

/// The bipartite variable-value graph backing the domain-consistent propagator.
///
/// Variable nodes sit on one side, one value node per value of interest on the other, with an
/// edge wherever the value is in the variable's domain. A b-matching assigns every variable to
/// one value while keeping each value's usage within its capacity bounds. The graph and its
/// matching persist across propagations: [`VarValGraph::sync`] lazily drops edges for values
/// that have left a domain, and only the disturbed parts of the matching are repaired.
///
/// Nodes and edges are index based, so a clone of the struct is a deep copy of the whole graph
/// and matching, which is exactly what cloning a search space requires.
#[derive(Clone, Debug, Default)]
pub(crate) struct VarValGraph {
    /// Per variable, the value nodes still connected to it.
    adjacency: Vec<Vec<usize>>,
    /// Per variable, the value node it is matched to.
    matched: Vec<Option<usize>>,
    values: Vec<ValueNode>,
    value_index: FnvHashMap<i32, usize>,

    /// Per value node, the variables it is matched to. Rebuilt by `sync`, maintained by the
    /// augmenting searches.
    matched_vars: Vec<Vec<usize>>,
    /// Per value node, the variables whose domain still contains it. Rebuilt by `sync`.
    value_vars: Vec<Vec<usize>>,
    /// Scratch for the augmenting searches and the component analysis.
    visited: Vec<bool>,
}

#[derive(Clone, Copy, Debug)]
struct ValueNode {
    value: i32,
    usage: i32,
    min: i32,
    max: i32,
}

impl VarValGraph {
    pub(crate) fn is_empty(&self) -> bool {
        self.adjacency.is_empty() && self.values.is_empty()
    }

    /// Build the graph from the current domains. `capacities` yields the admissible usage range
    /// per value; `required_values` are values which must receive occurrences even if no domain
    /// contains them any more (their nodes must exist so that the demand repair can fail on
    /// them).
    pub(crate) fn build<Var: IntegerVariable>(
        &mut self,
        assignments: &Assignments,
        vars: &[Var],
        required_values: impl Iterator<Item = i32>,
        capacities: impl Fn(i32) -> (i32, i32),
    ) {
        tally_assert_moderate!(self.is_empty());

        for value in required_values {
            let _ = self.value_node(value);
        }
        for var in vars {
            let mut edges = Vec::new();
            for value in var.iterate_domain(assignments) {
                edges.push(self.value_node(value));
            }
            self.adjacency.push(edges);
            self.matched.push(None);
        }
        self.refresh_capacities(&capacities);
        self.rebuild_incidence();
    }

    fn value_node(&mut self, value: i32) -> usize {
        if let Some(&node) = self.value_index.get(&value) {
            return node;
        }
        let node = self.values.len();
        self.values.push(ValueNode {
            value,
            usage: 0,
            min: 0,
            max: 0,
        });
        let _ = self.value_index.insert(value, node);
        node
    }

    fn refresh_capacities(&mut self, capacities: &impl Fn(i32) -> (i32, i32)) {
        for node in self.values.iter_mut() {
            let (min, max) = capacities(node.value);
            node.min = min;
            node.max = max;
        }
    }

    /// Drop edges for values which have left a domain, unmatching the affected variables, then
    /// refresh capacities and evict matches from values whose upper capacity dropped below
    /// their usage.
    pub(crate) fn sync<Var: IntegerVariable>(
        &mut self,
        assignments: &Assignments,
        vars: &[Var],
        capacities: impl Fn(i32) -> (i32, i32),
    ) {
        for (index, var) in vars.iter().enumerate() {
            if let Some(node) = self.matched[index] {
                if !var.contains(assignments, self.values[node].value) {
                    self.matched[index] = None;
                    self.values[node].usage -= 1;
                }
            }
            let values = &self.values;
            self.adjacency[index].retain(|&node| var.contains(assignments, values[node].value));
        }

        self.refresh_capacities(&capacities);

        self.rebuild_incidence();
        for node in 0..self.values.len() {
            while self.values[node].usage > self.values[node].max {
                let evicted = self.matched_vars[node]
                    .pop()
                    .expect("usage counts matched variables");
                self.matched[evicted] = None;
                self.values[node].usage -= 1;
            }
        }
    }

    fn rebuild_incidence(&mut self) {
        self.matched_vars.clear();
        self.matched_vars.resize(self.values.len(), Vec::new());
        self.value_vars.clear();
        self.value_vars.resize(self.values.len(), Vec::new());
        for (var, edges) in self.adjacency.iter().enumerate() {
            for &node in edges {
                self.value_vars[node].push(var);
            }
        }
        for (var, &node) in self.matched.iter().enumerate() {
            if let Some(node) = node {
                self.matched_vars[node].push(var);
            }
        }
    }

    /// Match every unmatched variable to a value with spare upper capacity, rerouting existing
    /// matches along augmenting paths where needed. Returns the index of a variable for which
    /// no augmenting path exists.
    pub(crate) fn repair_variable_matching(&mut self) -> Result<(), usize> {
        for var in 0..self.matched.len() {
            if self.matched[var].is_some() {
                continue;
            }
            self.visited.clear();
            self.visited.resize(self.values.len(), false);
            if !self.augment(var) {
                return Err(var);
            }
        }
        Ok(())
    }

    /// Try to match `var` to some adjacent value, freeing capacity by rerouting other variables
    /// if necessary. On success the new match of `var` is recorded; the caller is responsible
    /// for `var`'s previous match, if any.
    fn augment(&mut self, var: usize) -> bool {
        for position in 0..self.adjacency[var].len() {
            let node = self.adjacency[var][position];
            if self.visited[node] {
                continue;
            }
            self.visited[node] = true;

            if self.values[node].usage < self.values[node].max || self.free_one_unit(node) {
                self.matched[var] = Some(node);
                self.matched_vars[node].push(var);
                self.values[node].usage += 1;
                return true;
            }
        }
        false
    }

    /// Free one unit of capacity at `node` by rerouting one of its matched variables elsewhere.
    fn free_one_unit(&mut self, node: usize) -> bool {
        for position in 0..self.matched_vars[node].len() {
            let other = self.matched_vars[node][position];
            if self.augment(other) {
                // `other` has moved; its new match is already recorded
                let _ = self.matched_vars[node].swap_remove(position);
                self.values[node].usage -= 1;
                return true;
            }
        }
        false
    }

    /// Raise every value's usage up to its lower capacity by pulling in adjacent variables from
    /// values that sit above their own lower capacity. Returns `(value, required, usage)` of a
    /// value whose demand cannot be met.
    pub(crate) fn repair_demand_matching(&mut self) -> Result<(), (i32, i32, i32)> {
        for node in 0..self.values.len() {
            while self.values[node].usage < self.values[node].min {
                self.visited.clear();
                self.visited.resize(self.values.len(), false);
                self.visited[node] = true;
                if !self.acquire_one_unit(node) {
                    return Err((
                        self.values[node].value,
                        self.values[node].min,
                        self.values[node].usage,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Gain one unit of usage at `node` by pulling an adjacent variable away from its current
    /// value, which in turn may refill itself recursively.
    fn acquire_one_unit(&mut self, node: usize) -> bool {
        for position in 0..self.value_vars[node].len() {
            let var = self.value_vars[node][position];
            let Some(current) = self.matched[var] else {
                continue;
            };
            if current == node || self.visited[current] {
                continue;
            }
            self.visited[current] = true;

            if self.values[current].usage > self.values[current].min
                || self.acquire_one_unit(current)
            {
                let slot = self.matched_vars[current]
                    .iter()
                    .position(|&candidate| candidate == var)
                    .expect("matched variables are registered with their value");
                let _ = self.matched_vars[current].swap_remove(slot);
                self.values[current].usage -= 1;
                self.matched[var] = Some(node);
                self.matched_vars[node].push(var);
                self.values[node].usage += 1;
                return true;
            }
        }
        false
    }

    /// Remove every edge that cannot be part of any maximum b-matching and return the pruned
    /// `(variable, value)` pairs.
    ///
    /// In the residual orientation, unmatched edges run variable to value, matched edges value
    /// to variable, and a hub node stands in for the flow source and sink: values below their
    /// upper capacity can absorb one more (value to hub), values above their lower capacity can
    /// release one (hub to value). An unmatched edge is part of some maximum matching exactly
    /// when it closes a directed cycle, so edges whose endpoints fall into different strongly
    /// connected components are pruned.
    pub(crate) fn prune_inconsistent_edges(&mut self) -> Vec<(usize, i32)> {
        let num_vars = self.adjacency.len();
        let num_values = self.values.len();
        let hub = num_vars + num_values;

        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); hub + 1];
        for (var, edges) in self.adjacency.iter().enumerate() {
            for &node in edges {
                if self.matched[var] != Some(node) {
                    successors[var].push(num_vars + node);
                }
            }
        }
        for (node, value) in self.values.iter().enumerate() {
            for &var in &self.matched_vars[node] {
                successors[num_vars + node].push(var);
            }
            if value.usage < value.max {
                successors[num_vars + node].push(hub);
            }
            if value.usage > value.min {
                successors[hub].push(num_vars + node);
            }
        }

        let components = strongly_connected_components(&successors);

        let mut removals = Vec::new();
        for (var, edges) in self.adjacency.iter_mut().enumerate() {
            let values = &self.values;
            let matched = self.matched[var];
            edges.retain(|&node| {
                if matched == Some(node) || components[var] == components[num_vars + node] {
                    true
                } else {
                    removals.push((var, values[node].value));
                    false
                }
            });
        }
        removals
    }

    #[cfg(test)]
    fn usage(&self, value: i32) -> i32 {
        self.value_index
            .get(&value)
            .map_or(0, |&node| self.values[node].usage)
    }
}

/// Iterative Tarjan over an explicit successor list; returns the component id per node.
fn strongly_connected_components(successors: &[Vec<usize>]) -> Vec<usize> {
    let len = successors.len();
    let mut order = vec![usize::MAX; len];
    let mut low = vec![0_usize; len];
    let mut component = vec![usize::MAX; len];
    let mut on_stack = vec![false; len];
    let mut stack: Vec<usize> = Vec::new();
    let mut call_stack: Vec<(usize, usize)> = Vec::new();
    let mut next_order = 0;
    let mut next_component = 0;

    for root in 0..len {
        if order[root] != usize::MAX {
            continue;
        }
        call_stack.push((root, 0));
        while let Some(&mut (node, ref mut child)) = call_stack.last_mut() {
            if *child == 0 {
                order[node] = next_order;
                low[node] = next_order;
                next_order += 1;
                stack.push(node);
                on_stack[node] = true;
            }
            if *child < successors[node].len() {
                let successor = successors[node][*child];
                *child += 1;
                if order[successor] == usize::MAX {
                    call_stack.push((successor, 0));
                } else if on_stack[successor] {
                    low[node] = low[node].min(order[successor]);
                }
                continue;
            }

            let _ = call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                low[parent] = low[parent].min(low[node]);
            }
            if low[node] == order[node] {
                loop {
                    let member = stack.pop().expect("component members are on the stack");
                    on_stack[member] = false;
                    component[member] = next_component;
                    if member == node {
                        break;
                    }
                }
                next_component += 1;
            }
        }
    }

    component
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::variables::DomainId;

    fn graph_over(
        assignments: &Assignments,
        vars: &[DomainId],
        capacities: impl Fn(i32) -> (i32, i32) + Copy,
    ) -> VarValGraph {
        let mut graph = VarValGraph::default();
        graph.build(assignments, vars, std::iter::empty(), capacities);
        graph
    }

    #[test]
    fn demand_repair_steals_from_values_above_their_lower_capacity() {
        let mut assignments = Assignments::default();
        let vars: Vec<DomainId> = (0..3).map(|_| assignments.grow(1, 2)).collect();
        let mut graph = graph_over(&assignments, &vars, |_| (1, 3));

        graph.repair_variable_matching().expect("matchable");
        graph.repair_demand_matching().expect("demand is satisfiable");

        assert!(graph.usage(1) >= 1);
        assert!(graph.usage(2) >= 1);
        assert_eq!(graph.usage(1) + graph.usage(2), 3);
    }

    #[test]
    fn unsatisfiable_demand_is_reported_with_the_reached_usage() {
        let mut assignments = Assignments::default();
        let vars: Vec<DomainId> = (0..3).map(|_| assignments.grow(1, 2)).collect();
        let mut graph = graph_over(&assignments, &vars, |value| {
            if value == 2 {
                (3, 3)
            } else {
                (1, 3)
            }
        });

        graph.repair_variable_matching().expect("matchable");
        let error = graph
            .repair_demand_matching()
            .expect_err("value 1 needs one of the three variables as well");

        assert_eq!(error, (2, 3, 2));
    }

    #[test]
    fn components_of_a_two_cycle_and_an_isolated_node() {
        let successors = vec![vec![1], vec![0], vec![0]];
        let components = strongly_connected_components(&successors);

        assert_eq!(components[0], components[1]);
        assert_ne!(components[2], components[0]);
    }

    #[test]
    fn components_of_a_chain_are_singletons() {
        let successors = vec![vec![1], vec![2], vec![]];
        let components = strongly_connected_components(&successors);

        assert_ne!(components[0], components[1]);
        assert_ne!(components[1], components[2]);
    }
}
