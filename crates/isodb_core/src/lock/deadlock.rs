//! Wait-for graph construction and victim choice.

use std::collections::{HashMap, HashSet};

use crate::types::TxId;

/// Directed wait-for edges between transactions.
///
/// Built on demand from the lock table while its mutex is held, so the
/// graph is always a consistent snapshot; nothing incremental can go
/// stale.
#[derive(Debug, Default)]
pub(crate) struct WaitForGraph {
    edges: HashMap<TxId, Vec<TxId>>,
}

impl WaitForGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records that `waiter` cannot proceed until `holder` ends.
    pub(crate) fn add_edge(&mut self, waiter: TxId, holder: TxId) {
        let targets = self.edges.entry(waiter).or_default();
        if !targets.contains(&holder) {
            targets.push(holder);
        }
    }

    /// Finds a cycle reachable from `start`, returning its members.
    pub(crate) fn find_cycle(&self, start: TxId) -> Option<Vec<TxId>> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        self.dfs(start, &mut path, &mut visited)
    }

    fn dfs(
        &self,
        node: TxId,
        path: &mut Vec<TxId>,
        visited: &mut HashSet<TxId>,
    ) -> Option<Vec<TxId>> {
        if let Some(pos) = path.iter().position(|&t| t == node) {
            return Some(path[pos..].to_vec());
        }
        if !visited.insert(node) {
            return None;
        }
        path.push(node);
        if let Some(targets) = self.edges.get(&node) {
            for &next in targets {
                if let Some(cycle) = self.dfs(next, path, visited) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }
}

/// Chooses the deadlock victim among cycle members: the transaction
/// whose wait started most recently (highest wait ticket), with the
/// higher `TxId` breaking ties.
///
/// Every cycle member is a waiter (edges only originate from waiters),
/// so each has a ticket; `None` means the cycle dissolved before the
/// choice, and the caller does nothing.
pub(crate) fn choose_victim(cycle: &[TxId], tickets: &HashMap<TxId, u64>) -> Option<TxId> {
    cycle
        .iter()
        .filter_map(|&tx| tickets.get(&tx).map(|&ticket| (ticket, tx)))
        .max()
        .map(|(_, tx)| tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: u64) -> TxId {
        TxId::new(id)
    }

    #[test]
    fn two_node_cycle_found() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(tx(1), tx(2));
        graph.add_edge(tx(2), tx(1));

        let cycle = graph.find_cycle(tx(1)).unwrap();
        assert_eq!(cycle.len(), 2);
        assert!(cycle.contains(&tx(1)) && cycle.contains(&tx(2)));
    }

    #[test]
    fn three_node_cycle_found_from_any_entry() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(tx(1), tx(2));
        graph.add_edge(tx(2), tx(3));
        graph.add_edge(tx(3), tx(1));

        for start in [tx(1), tx(2), tx(3)] {
            let cycle = graph.find_cycle(start).unwrap();
            assert_eq!(cycle.len(), 3);
        }
    }

    #[test]
    fn chain_without_cycle_finds_nothing() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(tx(1), tx(2));
        graph.add_edge(tx(2), tx(3));

        assert!(graph.find_cycle(tx(1)).is_none());
    }

    #[test]
    fn cycle_not_reachable_from_start_is_ignored() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(tx(2), tx(3));
        graph.add_edge(tx(3), tx(2));
        graph.add_edge(tx(1), tx(4));

        assert!(graph.find_cycle(tx(1)).is_none());
        assert!(graph.find_cycle(tx(2)).is_some());
    }

    #[test]
    fn victim_is_newest_wait() {
        let tickets: HashMap<TxId, u64> = [(tx(1), 3), (tx(2), 7)].into_iter().collect();
        assert_eq!(choose_victim(&[tx(1), tx(2)], &tickets), Some(tx(2)));
    }

    #[test]
    fn victim_tie_breaks_on_higher_txid() {
        let tickets: HashMap<TxId, u64> = [(tx(5), 4), (tx(9), 4)].into_iter().collect();
        assert_eq!(choose_victim(&[tx(9), tx(5)], &tickets), Some(tx(9)));
    }

    #[test]
    fn victim_requires_a_waiting_member() {
        let tickets = HashMap::new();
        assert_eq!(choose_victim(&[tx(1), tx(2)], &tickets), None);
    }
}
