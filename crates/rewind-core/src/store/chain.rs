//! Breadth-first shortest-chain search.
//!
//! Stores supply adjacency through a closure; this module owns the search
//! itself so every store breaks ties the same way (neighbors visited in
//! vertex-id order).

use anyhow::Result;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::diff::Patch;

/// One step out of a vertex: where it leads and the command on that edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub vertex: String,
    pub command: Patch,
}

impl Hop {
    #[must_use]
    pub fn new(vertex: impl Into<String>, command: Patch) -> Self {
        Self {
            vertex: vertex.into(),
            command,
        }
    }
}

/// Shortest sequence of hops from `from` to `to`, both ends included.
///
/// The first hop carries an empty command. `None` when `to` is unreachable.
///
/// # Errors
///
/// Propagates any error from `neighbors`.
pub fn shortest<F>(from: &str, to: &str, mut neighbors: F) -> Result<Option<Vec<Hop>>>
where
    F: FnMut(&str) -> Result<Vec<Hop>>,
{
    if from == to {
        return Ok(Some(vec![Hop::new(from, Patch::new())]));
    }

    let mut parents: HashMap<String, Hop> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::from([from.to_string()]);
    let mut queue: VecDeque<String> = VecDeque::from([from.to_string()]);

    while let Some(vertex) = queue.pop_front() {
        let mut next = neighbors(&vertex)?;
        next.sort_by(|a, b| a.vertex.cmp(&b.vertex));

        for hop in next {
            if !seen.insert(hop.vertex.clone()) {
                continue;
            }
            let reached = hop.vertex.clone();
            parents.insert(
                reached.clone(),
                Hop {
                    vertex: vertex.clone(),
                    command: hop.command,
                },
            );
            if reached == to {
                return Ok(Some(unwind(from, to, &mut parents)));
            }
            queue.push_back(reached);
        }
    }

    Ok(None)
}

fn unwind(from: &str, to: &str, parents: &mut HashMap<String, Hop>) -> Vec<Hop> {
    let mut hops = Vec::new();
    let mut current = to.to_string();
    while let Some(parent) = parents.remove(&current) {
        hops.push(Hop::new(current, parent.command));
        current = parent.vertex;
    }
    hops.push(Hop::new(from, Patch::new()));
    hops.reverse();
    hops
}
