//! EVSE capability view consumed by the smart charging core.
//!
//! The core never owns EVSE state: it reads a narrow capability interface
//! (current type, active transaction) and holds `evse_id` as a value. The
//! owning subsystem publishes transaction transitions through the registry;
//! the core only requires that transitions become observable in FIFO order.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::support::clock::floor_to_seconds;

/// Whether an EVSE delivers alternating or direct current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentPhaseType {
    AC,
    DC,
}

/// Static capability data for one EVSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvseInfo {
    pub id: i32,
    pub current_phase_type: CurrentPhaseType,
}

/// The transaction currently running on an EVSE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvseTransaction {
    pub transaction_id: String,
    pub started_at: DateTime<Utc>,
}

/// Read-only EVSE lookup consumed by the core.
pub trait EvseRegistry: Send + Sync {
    fn info(&self, evse_id: i32) -> Option<EvseInfo>;

    fn has_active_transaction(&self, evse_id: i32) -> bool;

    /// Only meaningful while [`has_active_transaction`](Self::has_active_transaction)
    /// holds for the same EVSE.
    fn transaction(&self, evse_id: i32) -> Option<EvseTransaction>;
}

#[derive(Debug, Clone)]
struct EvseState {
    info: EvseInfo,
    transaction: Option<EvseTransaction>,
}

/// Reference registry implementation for embedders and tests.
#[derive(Debug, Default)]
pub struct InMemoryEvseRegistry {
    evses: DashMap<i32, EvseState>,
}

impl InMemoryEvseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, info: EvseInfo) {
        self.evses.insert(
            info.id,
            EvseState {
                info,
                transaction: None,
            },
        );
    }

    /// Publishes a transaction start; timestamps are floored to seconds.
    pub fn open_transaction(
        &self,
        evse_id: i32,
        transaction_id: impl Into<String>,
        started_at: DateTime<Utc>,
    ) {
        if let Some(mut state) = self.evses.get_mut(&evse_id) {
            state.transaction = Some(EvseTransaction {
                transaction_id: transaction_id.into(),
                started_at: floor_to_seconds(started_at),
            });
        }
    }

    /// Publishes a transaction end, returning the transaction id it carried.
    pub fn close_transaction(&self, evse_id: i32) -> Option<String> {
        self.evses
            .get_mut(&evse_id)
            .and_then(|mut state| state.transaction.take())
            .map(|tx| tx.transaction_id)
    }
}

impl EvseRegistry for InMemoryEvseRegistry {
    fn info(&self, evse_id: i32) -> Option<EvseInfo> {
        self.evses.get(&evse_id).map(|state| state.info)
    }

    fn has_active_transaction(&self, evse_id: i32) -> bool {
        self.evses
            .get(&evse_id)
            .map(|state| state.transaction.is_some())
            .unwrap_or(false)
    }

    fn transaction(&self, evse_id: i32) -> Option<EvseTransaction> {
        self.evses
            .get(&evse_id)
            .and_then(|state| state.transaction.clone())
    }
}
