//! Bounded reentrancy for chained mutations.
//!
//! Executing a unit may synchronously trigger further units (a key-command
//! macro that fires another macro, and so on). A [`RecursionGuard`] bounds
//! how deep such a chain may go. Each link acquires an [`ExecutionScope`]
//! via [`RecursionGuard::enter`]; the scope releases its slot when dropped,
//! so every exit path, early `?` returns included, unwinds the depth.
//!
//! [`Command::execute`](crate::command::Command::execute) walks a chain with
//! an explicit work stack rather than native recursion. It uses
//! [`push`](RecursionGuard::push) and [`pop`](RecursionGuard::pop) per link,
//! under a [`ChainMark`] that unwinds whatever is still held when the walk
//! ends. A limit of thousands of links therefore costs heap, not call stack.
//!
//! The guard is owned by whoever drives execution (the log orchestrator),
//! never a process-wide singleton, so independent sessions do not share
//! depth.
//!
//! # Example
//!
//! ```
//! use rewind_core::guard::RecursionGuard;
//!
//! let guard = RecursionGuard::new(2);
//! let outer = guard.enter(&"outer").unwrap();
//! let inner = guard.enter(&"inner").unwrap();
//! assert!(guard.enter(&"too deep").is_err());
//! drop(inner);
//! drop(outer);
//! assert_eq!(guard.depth(), 0);
//! ```

use std::cell::RefCell;

use crate::CoreError;

/// Default chain bound.
pub const DEFAULT_RECURSION_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Loopable
// ---------------------------------------------------------------------------

/// Something whose execution can trigger further execution.
pub trait Loopable {
    /// Human-readable name used in recursion diagnostics.
    fn loop_name(&self) -> String;
}

impl Loopable for &str {
    fn loop_name(&self) -> String {
        (*self).to_owned()
    }
}

impl Loopable for String {
    fn loop_name(&self) -> String {
        self.clone()
    }
}

// ---------------------------------------------------------------------------
// RecursionGuard
// ---------------------------------------------------------------------------

/// Tracks the active chain of loopable actors and refuses to go deeper than
/// the configured limit.
#[derive(Debug)]
pub struct RecursionGuard {
    limit: usize,
    chain: RefCell<Vec<String>>,
}

impl RecursionGuard {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            chain: RefCell::new(Vec::new()),
        }
    }

    /// Start executing `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecursionLimit`] when the chain is already
    /// `limit` links deep. The failing actor is not pushed, so the caller
    /// can simply propagate the error.
    pub fn enter(&self, actor: &dyn Loopable) -> Result<ExecutionScope<'_>, CoreError> {
        self.push(actor)?;
        Ok(ExecutionScope { guard: self })
    }

    /// Add `actor` to the chain without a scope. Pair with [`pop`](Self::pop),
    /// inside a [`mark`](Self::mark) that covers early exits.
    ///
    /// # Errors
    ///
    /// As for [`enter`](Self::enter).
    pub fn push(&self, actor: &dyn Loopable) -> Result<(), CoreError> {
        let mut chain = self.chain.borrow_mut();
        if chain.len() >= self.limit {
            let name = actor.loop_name();
            tracing::error!(
                actor = %name,
                depth = chain.len(),
                limit = self.limit,
                "recursion limit exceeded, aborting chain"
            );
            return Err(CoreError::RecursionLimit {
                limit: self.limit,
                actor: name,
                chain: summarize(&chain),
            });
        }
        chain.push(actor.loop_name());
        Ok(())
    }

    /// Drop the innermost link.
    pub fn pop(&self) {
        self.chain.borrow_mut().pop();
    }

    /// Remember the current depth. Dropping the mark releases every link
    /// pushed after it.
    pub fn mark(&self) -> ChainMark<'_> {
        ChainMark {
            guard: self,
            depth: self.depth(),
        }
    }

    /// Current chain depth.
    pub fn depth(&self) -> usize {
        self.chain.borrow().len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for RecursionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_RECURSION_LIMIT)
    }
}

/// First and last few links of a chain, enough to spot the loop.
fn summarize(chain: &[String]) -> String {
    const EDGE: usize = 3;
    if chain.len() <= EDGE * 2 {
        return chain.join(" -> ");
    }
    format!(
        "{} -> ... -> {}",
        chain[..EDGE].join(" -> "),
        chain[chain.len() - EDGE..].join(" -> ")
    )
}

// ---------------------------------------------------------------------------
// ExecutionScope
// ---------------------------------------------------------------------------

/// One held link of the chain. Dropping it ends the execution.
#[must_use = "the chain link is released as soon as the scope is dropped"]
#[derive(Debug)]
pub struct ExecutionScope<'a> {
    guard: &'a RecursionGuard,
}

impl Drop for ExecutionScope<'_> {
    fn drop(&mut self) {
        self.guard.pop();
    }
}

/// A depth to unwind back to. See [`RecursionGuard::mark`].
#[must_use = "links are released as soon as the mark is dropped"]
#[derive(Debug)]
pub struct ChainMark<'a> {
    guard: &'a RecursionGuard,
    depth: usize,
}

impl Drop for ChainMark<'_> {
    fn drop(&mut self) {
        self.guard.chain.borrow_mut().truncate(self.depth);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_tracks_nested_scopes() {
        let guard = RecursionGuard::new(10);
        assert_eq!(guard.depth(), 0);
        {
            let _a = guard.enter(&"a").unwrap();
            assert_eq!(guard.depth(), 1);
            {
                let _b = guard.enter(&"b").unwrap();
                assert_eq!(guard.depth(), 2);
            }
            assert_eq!(guard.depth(), 1);
        }
        assert_eq!(guard.depth(), 0);
    }

    #[test]
    fn limit_is_inclusive() {
        let guard = RecursionGuard::new(3);
        let _s1 = guard.enter(&"1").unwrap();
        let _s2 = guard.enter(&"2").unwrap();
        let _s3 = guard.enter(&"3").unwrap();
        let err = guard.enter(&"4").unwrap_err();
        match err {
            CoreError::RecursionLimit { limit, actor, chain } => {
                assert_eq!(limit, 3);
                assert_eq!(actor, "4");
                assert_eq!(chain, "1 -> 2 -> 3");
            }
            other => panic!("unexpected error: {other}"),
        }
        // The refused actor was not pushed.
        assert_eq!(guard.depth(), 3);
    }

    #[test]
    fn released_on_early_return() {
        fn descend(guard: &RecursionGuard, n: usize) -> Result<(), CoreError> {
            let _scope = guard.enter(&format!("level{n}"))?;
            descend(guard, n + 1)
        }

        let guard = RecursionGuard::new(5);
        assert!(descend(&guard, 0).is_err());
        assert_eq!(guard.depth(), 0);
    }

    #[test]
    fn mark_unwinds_unpaired_pushes() {
        let guard = RecursionGuard::new(10);
        let _outer = guard.enter(&"outer").unwrap();
        {
            let _mark = guard.mark();
            guard.push(&"a").unwrap();
            guard.push(&"b").unwrap();
            assert_eq!(guard.depth(), 3);
        }
        assert_eq!(guard.depth(), 1);
    }

    #[test]
    fn independent_guards_do_not_share_depth() {
        let a = RecursionGuard::new(1);
        let b = RecursionGuard::new(1);
        let _held = a.enter(&"x").unwrap();
        assert!(a.enter(&"y").is_err());
        assert!(b.enter(&"y").is_ok());
    }

    #[test]
    fn long_chain_summary_elides_middle() {
        let chain: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(summarize(&chain), "0 -> 1 -> 2 -> ... -> 7 -> 8 -> 9");
    }

    #[test]
    fn default_limit() {
        assert_eq!(RecursionGuard::default().limit(), DEFAULT_RECURSION_LIMIT);
    }
}
