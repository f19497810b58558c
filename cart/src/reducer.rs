//! Reducer logic for the cart.
//!
//! Commands mutate the in-memory cart synchronously. Every actual change
//! encodes the resulting cart and returns one persistence effect carrying the
//! next write sequence; the reducer never waits on storage. Hydration is a
//! read effect whose result comes back as [`CartAction::Hydrated`].

use crate::codec;
use crate::storage::{CartStorage, WriteOutcome};
use crate::types::{Cart, CartAction, CartCommand, CartState, Lifecycle};
use pharmacart_core::{
    SmallVec, async_effect, effect::Effect, environment::Clock, reducer::Reducer, smallvec,
};
use std::sync::Arc;

/// Environment dependencies for the cart reducer
#[derive(Clone)]
pub struct CartEnvironment {
    /// Durable storage; `None` keeps the cart in memory only
    pub storage: Option<CartStorage>,
    /// Clock for change timestamps
    pub clock: Arc<dyn Clock>,
}

impl CartEnvironment {
    /// Creates a new `CartEnvironment`
    #[must_use]
    pub fn new(storage: Option<CartStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// An environment without durable storage
    #[must_use]
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(None, clock)
    }
}

impl std::fmt::Debug for CartEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEnvironment")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

/// What a persistence effect should do with the durable copy
enum Persist {
    Write(String),
    Clear,
}

/// Reducer for the cart
#[derive(Clone, Debug, Default)]
pub struct CartReducer;

impl CartReducer {
    /// Creates a new `CartReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Applies a command to the cart. Returns whether `items` changed.
    fn apply_command(cart: &mut Cart, command: CartCommand) -> bool {
        match command {
            CartCommand::AddItem(item) => {
                tracing::debug!(id = %item.id, quantity = item.quantity, "Adding item");
                cart.add(item)
            }
            CartCommand::RemoveItem(id) => {
                let removed = cart.remove(&id);
                tracing::debug!(%id, removed, "Removing item");
                removed
            }
            CartCommand::SetQuantity { id, quantity } => {
                if quantity >= 1 && !cart.contains(&id) {
                    tracing::debug!(%id, quantity, "Ignoring quantity change for item not in cart");
                    return false;
                }
                tracing::debug!(%id, quantity, "Setting quantity");
                cart.set_quantity(&id, quantity)
            }
            CartCommand::Clear => {
                tracing::debug!(lines = cart.len(), "Clearing cart");
                cart.clear()
            }
        }
    }

    /// Runs a command against a ready cart and describes the persistence it needs
    fn execute(
        state: &mut CartState,
        command: CartCommand,
        env: &CartEnvironment,
    ) -> SmallVec<[Effect<CartAction>; 4]> {
        let clears = matches!(command, CartCommand::Clear);
        let changed = Self::apply_command(&mut state.cart, command);

        if changed {
            state.revision += 1;
            state.updated_at = Some(env.clock.now());
        }

        // Clear always reaches storage so a blob that failed to hydrate is removed too
        if !changed && !clears {
            return SmallVec::new();
        }

        let Some(storage) = env.storage.as_ref() else {
            return SmallVec::new();
        };

        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let persist = if clears {
            Persist::Clear
        } else {
            Persist::Write(codec::encode(&state.cart))
        };

        smallvec![Self::persist_effect(storage.clone(), sequence, persist)]
    }

    fn persist_effect(storage: CartStorage, sequence: u64, persist: Persist) -> Effect<CartAction> {
        async_effect! {
            let result = match persist {
                Persist::Write(blob) => storage.write(sequence, blob).await,
                Persist::Clear => storage.clear(sequence).await,
            };

            Some(match result {
                Ok(outcome) => CartAction::Persisted { sequence, outcome },
                Err(error) => CartAction::PersistFailed {
                    sequence,
                    reason: error.to_string(),
                },
            })
        }
    }

    fn hydrate_effect(storage: CartStorage) -> Effect<CartAction> {
        async_effect! {
            let snapshot = storage.read().await;
            Some(CartAction::Hydrated { snapshot })
        }
    }

    /// Installs the hydrated cart, marks the store ready and replays deferred commands
    fn finish_hydration(
        state: &mut CartState,
        snapshot: Option<String>,
        env: &CartEnvironment,
    ) -> SmallVec<[Effect<CartAction>; 4]> {
        state.cart = match snapshot.as_deref().map(codec::decode) {
            Some(Ok(cart)) => cart,
            Some(Err(error)) => {
                tracing::warn!(%error, "Saved cart could not be decoded, starting empty");
                metrics::counter!("cart.hydrate.decode_failed").increment(1);
                Cart::new()
            }
            None => Cart::new(),
        };
        state.lifecycle = Lifecycle::Ready;

        tracing::info!(
            lines = state.cart.len(),
            deferred = state.deferred.len(),
            "Cart ready"
        );

        let mut effects = SmallVec::new();
        for command in std::mem::take(&mut state.deferred) {
            effects.extend(Self::execute(state, command, env));
        }
        effects
    }

    fn command_or_defer(
        state: &mut CartState,
        command: CartCommand,
        env: &CartEnvironment,
    ) -> SmallVec<[Effect<CartAction>; 4]> {
        if state.is_ready() {
            Self::execute(state, command, env)
        } else {
            tracing::debug!(?command, "Deferring command until hydrated");
            state.deferred.push(command);
            SmallVec::new()
        }
    }
}

impl Reducer for CartReducer {
    type State = CartState;
    type Action = CartAction;
    type Environment = CartEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            CartAction::AddItem { item } => {
                Self::command_or_defer(state, CartCommand::AddItem(item), env)
            }
            CartAction::RemoveItem { id } => {
                Self::command_or_defer(state, CartCommand::RemoveItem(id), env)
            }
            CartAction::SetQuantity { id, quantity } => {
                Self::command_or_defer(state, CartCommand::SetQuantity { id, quantity }, env)
            }
            CartAction::Clear => Self::command_or_defer(state, CartCommand::Clear, env),

            CartAction::Hydrate => {
                if state.hydration_requested || state.is_ready() {
                    tracing::debug!("Hydration already requested");
                    return SmallVec::new();
                }
                state.hydration_requested = true;

                match env.storage.as_ref() {
                    Some(storage) => {
                        tracing::debug!(key = storage.key(), "Hydrating cart");
                        smallvec![Self::hydrate_effect(storage.clone())]
                    }
                    None => Self::finish_hydration(state, None, env),
                }
            }

            // ========== Feedback ==========
            CartAction::Hydrated { snapshot } => {
                if state.is_ready() {
                    tracing::warn!("Ignoring hydration result after cart became ready");
                    return SmallVec::new();
                }
                Self::finish_hydration(state, snapshot, env)
            }

            CartAction::Persisted { sequence, outcome } => {
                match outcome {
                    WriteOutcome::Applied => tracing::trace!(sequence, "Cart persisted"),
                    WriteOutcome::Superseded => {
                        tracing::debug!(sequence, "Cart write superseded by a newer one");
                    }
                }
                SmallVec::new()
            }

            CartAction::PersistFailed { sequence, reason } => {
                tracing::warn!(sequence, %reason, "Cart persistence failed, in-memory cart kept");
                SmallVec::new()
            }
        }
    }
}
