//! Running encrypted sum shared by concurrent submitters.
//!
//! # State machine
//!
//! ```text
//!            add                 add
//!   Empty ────────► Accumulating ───┐
//! (count 0)◄──────── (count ≥ 1) ◄──┘
//!            reset
//! ```
//!
//! `running_sum`, `count` and `epoch` form one value that is only ever
//! replaced wholesale under a single mutex. Validation of incoming
//! ciphertexts and encryption of the Enc(0) a new epoch starts from happen
//! before the lock is taken. When an add and a reset race, whichever takes
//! the lock first wins: reset-then-add keeps the add, add-then-reset drops it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::context::CryptoContext;
use crate::error::{Result, TallyError};
use crate::rlwe::{Ciphertext, Encryptor};

/// Running sum of exactly `count` accepted ciphertexts
#[derive(Clone, Debug, PartialEq)]
pub struct AccumulatorState {
    /// Homomorphic sum; Enc(0) when `count` is zero
    pub running_sum: Ciphertext,
    /// Accepted submissions in this epoch
    pub count: u64,
    /// Number of resets so far
    pub epoch: u64,
}

impl AccumulatorState {
    /// Empty state starting from `zero`, an encryption of zero
    pub fn new(zero: Ciphertext, epoch: u64) -> Self {
        Self {
            running_sum: zero,
            count: 0,
            epoch,
        }
    }

    /// State after folding `c` in
    ///
    /// Fails without side effects when `c` does not match the running sum or
    /// the epoch already holds `max_submissions` values.
    pub fn add(&self, c: &Ciphertext, ctx: &CryptoContext) -> Result<AccumulatorState> {
        self.running_sum.check_compatible(c)?;

        let limit = ctx.params().max_submissions;
        if self.count >= limit {
            return Err(TallyError::NoiseBudgetExhausted {
                count: self.count,
                limit,
            });
        }

        let mut next = self.clone();
        next.running_sum.add_assign_unchecked(c);
        next.count += 1;
        Ok(next)
    }
}

/// Read-consistent copy of the accumulator
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Running sum at the time of the snapshot
    pub ciphertext: Ciphertext,
    /// Submissions folded into `ciphertext`
    pub count: u64,
    /// Epoch the snapshot belongs to
    pub epoch: u64,
}

/// Shared accumulator behind one lock
pub struct Accumulator {
    ctx: Arc<CryptoContext>,
    encryptor: Encryptor,
    state: Mutex<AccumulatorState>,
}

impl Accumulator {
    /// Empty accumulator at epoch 0
    ///
    /// `encryptor` produces the Enc(0) every epoch starts from; its public key
    /// decides which submissions are accepted.
    pub fn new(encryptor: Encryptor) -> Self {
        let ctx = Arc::clone(encryptor.context());
        let zero = encryptor.encrypt_zero();
        Self {
            ctx,
            encryptor,
            state: Mutex::new(AccumulatorState::new(zero, 0)),
        }
    }

    /// Shared context
    pub fn context(&self) -> &Arc<CryptoContext> {
        &self.ctx
    }

    /// Fold `c` into the running sum, returning the new count
    ///
    /// Exactly one ciphertext is added and the count advances by one, or
    /// nothing changes.
    pub fn add(&self, c: &Ciphertext) -> Result<u64> {
        if let Err(err) = c.validate(&self.ctx) {
            warn!(error = %err, "submission rejected");
            return Err(err);
        }

        let result = {
            let mut state = self.lock();
            state.add(c, &self.ctx).map(|next| {
                *state = next;
                (state.count, state.epoch)
            })
        };

        match result {
            Ok((count, epoch)) => {
                debug!(count, epoch, "submission accepted");
                Ok(count)
            }
            Err(err) => {
                warn!(error = %err, kind = err.kind(), "submission rejected");
                Err(err)
            }
        }
    }

    /// Copy of the running sum, count and epoch taken under the lock
    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            ciphertext: state.running_sum.clone(),
            count: state.count,
            epoch: state.epoch,
        }
    }

    /// Accepted submissions in the current epoch
    pub fn count(&self) -> u64 {
        self.lock().count
    }

    /// Start a new epoch from a fresh Enc(0), returning the epoch number
    pub fn reset(&self) -> u64 {
        let zero = self.encryptor.encrypt_zero();

        let (dropped, epoch) = {
            let mut state = self.lock();
            let dropped = state.count;
            let epoch = state.epoch + 1;
            *state = AccumulatorState::new(zero, epoch);
            (dropped, epoch)
        };

        info!(epoch, dropped, "accumulator reset");
        epoch
    }

    /// The state is replaced wholesale, so a poisoned lock still guards a
    /// consistent value.
    fn lock(&self) -> MutexGuard<'_, AccumulatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Accumulator")
            .field("count", &state.count)
            .field("epoch", &state.epoch)
            .finish()
    }
}
