//! The reducer abstraction.
//!
//! Business logic is a pure function `(State, Action, Environment) → (State, Effects)`.
//! Effects are descriptions of work, not work: the caller decides how and when
//! to execute them and feeds each outcome back as another action.

use smallvec::SmallVec;

/// The Reducer trait - core abstraction for business logic
///
/// # Example
///
/// ```ignore
/// impl Reducer for TransactionReducer {
///     type State = BookingTransaction;
///     type Action = TransactionAction;
///     type Effect = TransactionEffect;
///     type Environment = TransactionEnvironment;
///
///     fn reduce(&self, state, action, env) -> SmallVec<[TransactionEffect; 4]> {
///         // state transitions here
///     }
/// }
/// ```
pub trait Reducer {
    /// The state type this reducer operates on
    type State;

    /// The action type this reducer processes
    type Action;

    /// Description of a side effect the caller must perform
    type Effect;

    /// The environment type with injected dependencies
    type Environment;

    /// Reduce an action into state changes and effects
    ///
    /// Updates `state` in place and returns the effects to be executed.
    /// Must not perform I/O.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Self::Effect; 4]>;
}
