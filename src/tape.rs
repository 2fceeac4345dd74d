//! Reverse-mode tape: node storage, statement log, and the reverse sweep.
//!
//! Every differentiable value lives in a *slot* holding its primal value and
//! its adjoint. Elementary operations are recorded Adept-style: the statement
//! stores the precomputed partial derivative (multiplier) of the result with
//! respect to each operand, so their `chain` is a single multiply-accumulate
//! loop. Composite matrix operations are recorded as boxed [`Chainable`]
//! nodes with hand-written adjoint rules. Both kinds share one insertion-ordered
//! statement log, which the sweep walks backwards.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::arena::{Arena, Slot, Span};
use crate::var::Var;

/// Sentinel slot for constants (never recorded on a tape).
pub const CONSTANT: Slot = u32::MAX;

static NEXT_EPOCH: AtomicU32 = AtomicU32::new(1);

fn next_epoch() -> u32 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

/// One entry of the statement log.
#[derive(Clone, Copy, Debug)]
enum Statement {
    /// `lhs` was produced from the operands/multipliers in `[start, end)`.
    Linear { lhs: Slot, start: u32, end: u32 },
    /// Composite node, index into `Tape::nodes`.
    Node(u32),
}

/// A graph node with a hand-derived adjoint rule.
///
/// Implementors hold only plain data (dimensions, slot indices, and [`Span`]s
/// into the tape arena); nothing they own needs dropping individually.
/// `chain` is called at most once per sweep, after every statement recorded
/// later than the node has been chained.
pub trait Chainable: Send {
    /// Read the adjoints of this node's outputs and add this node's
    /// contribution into the adjoints of its operands.
    fn chain(&self, adj: &mut Adjoints<'_>);
}

/// View of a tape handed to [`Chainable::chain`].
pub struct Adjoints<'a> {
    adjoints: &'a mut [f64],
    arena: &'a Arena,
}

impl<'a> Adjoints<'a> {
    #[inline]
    pub fn adjoint(&self, slot: Slot) -> f64 {
        if slot == CONSTANT {
            0.0
        } else {
            self.adjoints[slot as usize]
        }
    }

    /// Adjoints of the `len` consecutive slots starting at `first`.
    #[inline]
    pub fn block(&self, first: Slot, len: usize) -> &[f64] {
        let start = first as usize;
        &self.adjoints[start..start + len]
    }

    /// Add `delta` into the adjoint of `slot`. Constants absorb it.
    #[inline]
    pub fn accumulate(&mut self, slot: Slot, delta: f64) {
        if slot != CONSTANT {
            self.adjoints[slot as usize] += delta;
        }
    }

    #[inline]
    pub fn values(&self, span: Span<f64>) -> &'a [f64] {
        let arena: &'a Arena = self.arena;
        arena.values(span)
    }

    #[inline]
    pub fn slots(&self, span: Span<Slot>) -> &'a [Slot] {
        let arena: &'a Arena = self.arena;
        arena.slots(span)
    }
}

/// Initial sizing of a tape.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TapeConfig {
    /// Expected number of recorded operations.
    pub initial_statements: usize,
    /// Expected number of `f64`s buffered by composite nodes.
    pub initial_arena_values: usize,
}

impl Default for TapeConfig {
    fn default() -> Self {
        TapeConfig {
            initial_statements: 1024,
            initial_arena_values: 1024,
        }
    }
}

/// Reverse-mode computation tape.
pub struct Tape {
    values: Vec<f64>,
    adjoints: Vec<f64>,
    statements: Vec<Statement>,
    multipliers: Vec<f64>,
    operands: Vec<Slot>,
    nodes: Vec<Box<dyn Chainable>>,
    arena: Arena,
    epoch: u32,
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Tape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tape")
            .field("epoch", &self.epoch)
            .field("slots", &self.values.len())
            .field("statements", &self.statements.len())
            .field("nodes", &self.nodes.len())
            .field("arena_bytes", &self.arena.bytes_used())
            .finish()
    }
}

impl Tape {
    /// Create an empty tape.
    pub fn new() -> Self {
        Tape {
            values: Vec::new(),
            adjoints: Vec::new(),
            statements: Vec::new(),
            multipliers: Vec::new(),
            operands: Vec::new(),
            nodes: Vec::new(),
            arena: Arena::new(),
            epoch: next_epoch(),
        }
    }

    /// Create a tape with room for roughly `est_ops` operations.
    pub fn with_capacity(est_ops: usize) -> Self {
        Tape {
            values: Vec::with_capacity(est_ops),
            adjoints: Vec::with_capacity(est_ops),
            statements: Vec::with_capacity(est_ops),
            multipliers: Vec::with_capacity(est_ops * 2),
            operands: Vec::with_capacity(est_ops * 2),
            nodes: Vec::new(),
            arena: Arena::new(),
            epoch: next_epoch(),
        }
    }

    pub fn with_config(config: &TapeConfig) -> Self {
        let mut tape = Self::with_capacity(config.initial_statements);
        tape.arena = Arena::with_capacity(config.initial_arena_values, config.initial_arena_values);
        tape
    }

    /// Identifier of the current epoch. Changes on every [`reset`](Tape::reset).
    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Number of recorded statements (elementary and composite).
    #[inline]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Number of node slots (leaves, intermediates, composite outputs).
    #[inline]
    pub fn num_variables(&self) -> usize {
        self.values.len()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    #[inline]
    fn alloc_slot(&mut self, value: f64) -> Slot {
        let slot = self.values.len();
        if slot >= CONSTANT as usize {
            tape_overflow();
        }
        self.values.push(value);
        self.adjoints.push(0.0);
        slot as Slot
    }

    /// Register a new independent variable (leaf node).
    ///
    /// Leaves have no statement: their `chain` is a no-op.
    #[inline]
    pub fn new_variable(&mut self, value: f64) -> Var {
        let slot = self.alloc_slot(value);
        Var::from_tape(value, slot, self.epoch)
    }

    /// Record `result = f(operand)` with `multiplier = df/d(operand)`.
    ///
    /// Returns [`CONSTANT`] without recording when the operand is a constant.
    #[inline]
    pub fn push_unary(&mut self, value: f64, operand: Slot, multiplier: f64) -> Slot {
        if operand == CONSTANT {
            return CONSTANT;
        }
        let lhs = self.alloc_slot(value);
        let start = self.operands.len() as u32;
        self.multipliers.push(multiplier);
        self.operands.push(operand);
        self.statements.push(Statement::Linear {
            lhs,
            start,
            end: start + 1,
        });
        lhs
    }

    /// Record a binary operation with precomputed partial derivatives.
    #[inline]
    pub fn push_binary(
        &mut self,
        value: f64,
        lhs_operand: Slot,
        lhs_mult: f64,
        rhs_operand: Slot,
        rhs_mult: f64,
    ) -> Slot {
        self.push_nary(value, [(lhs_operand, lhs_mult), (rhs_operand, rhs_mult)])
    }

    /// Record an operation with any number of operands.
    ///
    /// Constant operands are dropped; if nothing is left the result is a
    /// constant and nothing is recorded.
    pub fn push_nary(&mut self, value: f64, partials: impl IntoIterator<Item = (Slot, f64)>) -> Slot {
        let start = self.operands.len();
        for (operand, multiplier) in partials {
            if operand != CONSTANT {
                self.operands.push(operand);
                self.multipliers.push(multiplier);
            }
        }
        let end = self.operands.len();
        if end == start {
            return CONSTANT;
        }
        let lhs = self.alloc_slot(value);
        self.statements.push(Statement::Linear {
            lhs,
            start: start as u32,
            end: end as u32,
        });
        lhs
    }

    /// Allocate the output block of a composite node. Returns the first slot;
    /// the block is contiguous and has no statement of its own.
    pub fn push_outputs(&mut self, values: &[f64]) -> Slot {
        let first = self.values.len() as Slot;
        for &v in values {
            self.alloc_slot(v);
        }
        first
    }

    /// Record a composite node.
    pub fn push_node(&mut self, node: Box<dyn Chainable>) {
        let k = u32::try_from(self.nodes.len()).unwrap_or_else(|_| tape_overflow());
        self.nodes.push(node);
        self.statements.push(Statement::Node(k));
    }

    /// Wrap a slot of this tape as a `Var`.
    #[inline]
    pub fn var_at(&self, slot: Slot) -> Var {
        if slot == CONSTANT {
            return Var::constant(f64::NAN);
        }
        Var::from_tape(self.values[slot as usize], slot, self.epoch)
    }

    /// Handle for a freshly pushed result: a constant when nothing was
    /// recorded, a tape variable of this epoch otherwise.
    #[inline]
    pub fn handle(&self, value: f64, slot: Slot) -> Var {
        if slot == CONSTANT {
            Var::constant(value)
        } else {
            Var::from_tape(value, slot, self.epoch)
        }
    }

    #[inline]
    fn check_epoch(&self, v: &Var) {
        debug_assert!(
            v.is_constant() || v.epoch() == self.epoch,
            "Var from epoch {} used on tape at epoch {}",
            v.epoch(),
            self.epoch
        );
    }

    /// Primal value stored for `v`.
    pub fn value(&self, v: &Var) -> f64 {
        if v.is_constant() {
            return v.value();
        }
        self.check_epoch(v);
        self.values[v.index() as usize]
    }

    /// Adjoint accumulated at `v`. Constants always report zero.
    pub fn adjoint(&self, v: &Var) -> f64 {
        if v.is_constant() {
            return 0.0;
        }
        self.check_epoch(v);
        self.adjoints[v.index() as usize]
    }

    /// All adjoints, indexed by slot.
    pub fn adjoints(&self) -> &[f64] {
        &self.adjoints
    }

    pub fn set_zero_all_adjoints(&mut self) {
        self.adjoints.iter_mut().for_each(|a| *a = 0.0);
    }

    /// Run the reverse sweep from `output`: zero every adjoint, seed `output`
    /// with 1 and chain every statement in reverse insertion order.
    pub fn grad(&mut self, output: Var) {
        self.reverse_seeded(&[(output, 1.0)]);
    }

    /// Reverse sweep with custom adjoint seeds (vector-Jacobian product).
    pub fn reverse_seeded(&mut self, seeds: &[(Var, f64)]) {
        self.set_zero_all_adjoints();
        for (v, w) in seeds {
            if !v.is_constant() {
                self.check_epoch(v);
                self.adjoints[v.index() as usize] += *w;
            }
        }
        self.sweep();
    }

    /// Gradient of `output` with respect to `inputs`.
    pub fn gradient(&mut self, output: Var, inputs: &[Var]) -> Vec<f64> {
        self.grad(output);
        inputs.iter().map(|x| self.adjoint(x)).collect()
    }

    fn sweep(&mut self) {
        tracing::trace!(
            statements = self.statements.len(),
            nodes = self.nodes.len(),
            "reverse sweep"
        );
        let Tape {
            adjoints,
            statements,
            multipliers,
            operands,
            nodes,
            arena,
            ..
        } = self;
        for stmt in statements.iter().rev() {
            match *stmt {
                Statement::Linear { lhs, start, end } => {
                    let a = adjoints[lhs as usize];
                    if a != 0.0 {
                        for j in start as usize..end as usize {
                            adjoints[operands[j] as usize] += multipliers[j] * a;
                        }
                    }
                }
                Statement::Node(k) => {
                    let mut view = Adjoints {
                        adjoints: adjoints.as_mut_slice(),
                        arena: &*arena,
                    };
                    nodes[k as usize].chain(&mut view);
                }
            }
        }
    }

    /// Truncate the tape to length zero. Arena buffers stay allocated until
    /// [`reset`](Tape::reset); handles from before the clear must not be used.
    pub fn clear(&mut self) {
        self.values.clear();
        self.adjoints.clear();
        self.statements.clear();
        self.multipliers.clear();
        self.operands.clear();
        self.nodes.clear();
        self.epoch = next_epoch();
    }

    /// Release everything recorded in this epoch, arena included, and start a
    /// new epoch. Capacity is retained.
    pub fn reset(&mut self) {
        tracing::debug!(
            epoch = self.epoch,
            slots = self.values.len(),
            statements = self.statements.len(),
            arena_bytes = self.arena.bytes_used(),
            "tape reset"
        );
        self.clear();
        self.arena.reset();
    }
}

#[cold]
fn tape_overflow() -> ! {
    panic!("tape exhausted: more than u32::MAX - 1 slots in one epoch")
}

thread_local! {
    static ACTIVE_TAPE: RefCell<Tape> = RefCell::new(Tape::new());
}

/// Run `f` against the calling thread's active tape.
///
/// Each thread has its own tape, so no locking is involved. Panics if called
/// re-entrantly (e.g. from inside [`Chainable::chain`]).
#[inline]
pub fn with_active_tape<R>(f: impl FnOnce(&mut Tape) -> R) -> R {
    ACTIVE_TAPE.with(|cell| f(&mut cell.borrow_mut()))
}

/// Reset the calling thread's active tape.
///
/// Every `Var` created on it since the previous reset becomes invalid.
pub fn recover_memory() {
    with_active_tape(|t| t.reset());
}

/// Zero every adjoint on the calling thread's active tape.
pub fn set_zero_all_adjoints() {
    with_active_tape(|t| t.set_zero_all_adjoints());
}

/// RAII guard that installs a caller-owned tape as the thread's active tape
/// and puts the previous one back on drop.
///
/// Guards nest, which is how nested gradient computations get a private tape
/// without disturbing the outer one.
pub struct TapeGuard<'a> {
    tape: &'a mut Tape,
}

impl<'a> TapeGuard<'a> {
    pub fn new(tape: &'a mut Tape) -> Self {
        ACTIVE_TAPE.with(|cell| std::mem::swap(&mut *cell.borrow_mut(), tape));
        TapeGuard { tape }
    }
}

impl Drop for TapeGuard<'_> {
    fn drop(&mut self) {
        ACTIVE_TAPE.with(|cell| std::mem::swap(&mut *cell.borrow_mut(), self.tape));
    }
}
