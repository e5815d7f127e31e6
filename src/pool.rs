//! Pools of selectable items
//!
//! A pool is an ordered name-to-item mapping; declaration order is the
//! fallback iteration order. Items opt out of direct selection by naming a
//! `follows` anchor, in which case they ride along whenever their anchor is
//! chosen. Selection criteria are a tagged variant rather than loosely
//! typed strings: nothing, everything, one anchored regex, or an ordered
//! union of regexes.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

/// A selection criterion over a pool
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selector {
    #[default]
    None,
    All,
    Pattern(String),
    Patterns(Vec<String>),
}

/// Whether selection and ordering shuffle or keep declaration order.
/// `Declared` is the include-all debugging mode: no shuffles anywhere and
/// no per-group count limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionOrder {
    #[default]
    Shuffled,
    Declared,
}

/// Common surface of pool entries (questions and answers)
pub trait PoolItem {
    fn name(&self) -> &str;
    fn before(&self) -> &Selector;
    fn after(&self) -> &Selector;
    fn follows(&self) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectError {
    InvalidPattern { pattern: String, message: String },
    DuplicateName { name: String },
    FollowCycle { name: String },
}

impl std::fmt::Display for SelectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectError::InvalidPattern { pattern, message } => {
                write!(f, "Invalid selection pattern '{}': {}", pattern, message)
            }
            SelectError::DuplicateName { name } => {
                write!(f, "Duplicate item name: {}", name)
            }
            SelectError::FollowCycle { name } => {
                write!(f, "Follow chain starting at '{}' never terminates", name)
            }
        }
    }
}

impl std::error::Error for SelectError {}

/// An ordered collection of named items
#[derive(Debug, Clone, PartialEq)]
pub struct Pool<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: PoolItem> Pool<T> {
    pub fn new() -> Self {
        Pool {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> Result<(), SelectError> {
        let name = item.name().to_string();
        if self.index.contains_key(&name) {
            return Err(SelectError::DuplicateName { name });
        }
        self.index.insert(name, self.items.len());
        self.items.push(item);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterate in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: PoolItem> Default for Pool<T> {
    fn default() -> Self {
        Pool::new()
    }
}

/// Compile a selection pattern into an anchored (full-match) regex
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, SelectError> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| SelectError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// The names a selector picks for direct selection: follow-dependents are
/// never candidates, patterns must match the whole name, and a pattern
/// list is an ordered union (first occurrence wins).
pub fn candidates<T: PoolItem>(selector: &Selector, pool: &Pool<T>) -> Result<Vec<String>, SelectError> {
    let mut out = Vec::new();
    match selector {
        Selector::None => {}
        Selector::All => {
            for item in pool.iter() {
                if item.follows().is_none() {
                    out.push(item.name().to_string());
                }
            }
        }
        Selector::Pattern(pattern) => {
            let regex = compile_pattern(pattern)?;
            for item in pool.iter() {
                if item.follows().is_none() && regex.is_match(item.name()) {
                    out.push(item.name().to_string());
                }
            }
        }
        Selector::Patterns(patterns) => {
            for pattern in patterns {
                let regex = compile_pattern(pattern)?;
                for item in pool.iter() {
                    if item.follows().is_none()
                        && regex.is_match(item.name())
                        && !out.iter().any(|n| n == item.name())
                    {
                        out.push(item.name().to_string());
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Which precedence field a constraint target set is being built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    Before,
    After,
}

/// The names a before/after selector resolves to. Items that themselves
/// declare the same kind of "all" constraint are excluded so that two
/// "first" (or two "last") items do not deadlock each other; dependents
/// are excluded as always.
pub(crate) fn constraint_targets<T: PoolItem>(
    selector: &Selector,
    pool: &Pool<T>,
    kind: ConstraintKind,
) -> Result<Vec<String>, SelectError> {
    let same_kind_all = |item: &T| {
        let own = match kind {
            ConstraintKind::Before => item.before(),
            ConstraintKind::After => item.after(),
        };
        *own == Selector::All
    };

    let mut out = Vec::new();
    match selector {
        Selector::None => {}
        Selector::All => {
            for item in pool.iter() {
                if item.follows().is_none() && !same_kind_all(item) {
                    out.push(item.name().to_string());
                }
            }
        }
        Selector::Pattern(pattern) => {
            let regex = compile_pattern(pattern)?;
            for item in pool.iter() {
                if item.follows().is_none() && !same_kind_all(item) && regex.is_match(item.name()) {
                    out.push(item.name().to_string());
                }
            }
        }
        Selector::Patterns(patterns) => {
            for pattern in patterns {
                let regex = compile_pattern(pattern)?;
                for item in pool.iter() {
                    if item.follows().is_none()
                        && !same_kind_all(item)
                        && regex.is_match(item.name())
                        && !out.iter().any(|n| n == item.name())
                    {
                        out.push(item.name().to_string());
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Map from anchor name to the names declaring `follows` on it, in
/// declaration order
pub(crate) fn follower_map<T: PoolItem>(pool: &Pool<T>) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for item in pool.iter() {
        if let Some(anchor) = item.follows() {
            map.entry(anchor.to_string())
                .or_default()
                .push(item.name().to_string());
        }
    }
    map
}

/// Expand one candidate into its full follow-chain: the candidate, then
/// every item following a chain member, breadth-first in declaration
/// order. A chain longer than the pool means the follow graph loops.
pub(crate) fn expand_chain(
    candidate: &str,
    followers: &HashMap<String, Vec<String>>,
    pool_len: usize,
) -> Result<Vec<String>, SelectError> {
    let mut chain = vec![candidate.to_string()];
    let mut next = 0;
    while next < chain.len() {
        if let Some(tail) = followers.get(&chain[next]) {
            chain.extend(tail.iter().cloned());
        }
        if chain.len() > pool_len {
            return Err(SelectError::FollowCycle {
                name: candidate.to_string(),
            });
        }
        next += 1;
    }
    Ok(chain)
}

/// Choose up to `limit` names from the pool. Candidates are shuffled
/// (unless declaration order is requested), then taken with their whole
/// follow-chains; a chain that does not fit in the remaining budget is
/// skipped entirely. The output order is "as chosen"; final placement is
/// the orderer's job.
pub fn choose_from_pool<T: PoolItem, R: Rng>(
    pool: &Pool<T>,
    selector: &Selector,
    limit: usize,
    order: SelectionOrder,
    rng: &mut R,
) -> Result<Vec<String>, SelectError> {
    let followers = follower_map(pool);
    let mut names = candidates(selector, pool)?;
    if order == SelectionOrder::Shuffled {
        names.shuffle(rng);
    }

    let mut out = Vec::new();
    for name in names {
        let chain = expand_chain(&name, &followers, pool.len())?;
        if out.len() + chain.len() > limit {
            continue;
        }
        out.extend(chain);
        if out.len() >= limit {
            break;
        }
    }
    Ok(out)
}
