//! Precedence-constrained ordering
//!
//! A chosen sequence is shuffled, then minimally adjusted until every
//! before/after constraint holds: scan index pairs (i<j), swap on a
//! violation, restart the scan, and stop on a clean pass. Consistent
//! constraint sets settle quickly; a cyclic set would swap forever, so the
//! total swap count is capped and overrunning it reports the items still
//! in conflict. Follow-dependents sit out the relaxation and are spliced
//! back in after their anchors.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::pool::{
    constraint_targets, follower_map, ConstraintKind, Pool, PoolItem, SelectError, SelectionOrder,
};

#[derive(Debug, Clone, PartialEq)]
pub enum OrderError {
    Selection(SelectError),
    ConstraintCycle { names: Vec<String> },
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderError::Selection(e) => write!(f, "{}", e),
            OrderError::ConstraintCycle { names } => {
                write!(
                    f,
                    "Before/after constraints never settle (cycle involving: {})",
                    names.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for OrderError {}

impl From<SelectError> for OrderError {
    fn from(e: SelectError) -> Self {
        OrderError::Selection(e)
    }
}

/// Arrange a chosen list so every before/after constraint holds, with
/// follow-dependents re-spliced immediately after their anchors.
pub fn order_chosen<T: PoolItem, R: Rng>(
    chosen: Vec<String>,
    pool: &Pool<T>,
    order: SelectionOrder,
    rng: &mut R,
) -> Result<Vec<String>, OrderError> {
    let mut chosen = chosen;
    if order == SelectionOrder::Shuffled {
        chosen.shuffle(rng);
    }

    // Dependents sit out the relaxation; primaries keep the shuffled order.
    let mut primaries = Vec::new();
    let mut dependents = HashSet::new();
    for name in &chosen {
        let item = match pool.get(name) {
            Some(item) => item,
            None => continue,
        };
        if item.follows().is_some() {
            dependents.insert(name.clone());
        } else {
            primaries.push(name.clone());
        }
    }

    // precedes[x] = names x must come before. An item's `before` selector
    // contributes its targets directly; its `after` selector contributes
    // the reverse edge onto each target.
    let mut precedes: HashMap<String, HashSet<String>> = HashMap::new();
    for name in &primaries {
        precedes.insert(name.clone(), HashSet::new());
    }
    for name in &primaries {
        let item = pool.get(name).expect("primary came from the pool");
        for target in constraint_targets(item.before(), pool, ConstraintKind::Before)? {
            if target != *name {
                precedes.get_mut(name).expect("primary key").insert(target);
            }
        }
        for target in constraint_targets(item.after(), pool, ConstraintKind::After)? {
            if target == *name {
                continue;
            }
            if let Some(set) = precedes.get_mut(&target) {
                set.insert(name.clone());
            }
        }
    }

    relax(&mut primaries, &precedes)?;

    // Splice every chosen dependent back in right after its anchor,
    // transitively, in declaration order.
    let followers = follower_map(pool);
    let mut out = Vec::new();
    for name in primaries {
        let anchor_at = out.len();
        out.push(name);
        let mut next = anchor_at;
        while next < out.len() {
            if let Some(tail) = followers.get(&out[next]) {
                out.extend(tail.iter().filter(|n| dependents.contains(*n)).cloned());
            }
            next += 1;
        }
    }
    Ok(out)
}

fn relax(
    primaries: &mut [String],
    precedes: &HashMap<String, HashSet<String>>,
) -> Result<(), OrderError> {
    if primaries.len() <= 1 {
        return Ok(());
    }
    let cap = primaries.len() * primaries.len() + primaries.len();
    let mut swaps = 0;
    while let Some((i, j)) = find_violation(primaries, precedes) {
        primaries.swap(i, j);
        swaps += 1;
        if swaps > cap {
            let mut names: Vec<String> = violating_names(primaries, precedes);
            names.sort();
            return Err(OrderError::ConstraintCycle { names });
        }
    }
    Ok(())
}

/// First index pair (i<j) where the item at j is required to precede the
/// item at i
fn find_violation(
    primaries: &[String],
    precedes: &HashMap<String, HashSet<String>>,
) -> Option<(usize, usize)> {
    for i in 0..primaries.len() {
        for j in i + 1..primaries.len() {
            if let Some(set) = precedes.get(&primaries[j]) {
                if set.contains(&primaries[i]) {
                    return Some((i, j));
                }
            }
        }
    }
    None
}

fn violating_names(
    primaries: &[String],
    precedes: &HashMap<String, HashSet<String>>,
) -> Vec<String> {
    let mut names = HashSet::new();
    for i in 0..primaries.len() {
        for j in i + 1..primaries.len() {
            if let Some(set) = precedes.get(&primaries[j]) {
                if set.contains(&primaries[i]) {
                    names.insert(primaries[i].clone());
                    names.insert(primaries[j].clone());
                }
            }
        }
    }
    names.into_iter().collect()
}
