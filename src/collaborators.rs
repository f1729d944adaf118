//! Interfaces for the external collaborators named in §6 that are
//! explicitly out of scope for this core (the slot clock, the presentation
//! layer, the transaction source UI, the "paint contract" demo). Only the
//! seams are specified here; no GUI, wall-clock scheduler, or demo contract
//! logic lives in this crate.

use crate::model::Transaction;
use crate::types::Address;

/// `set_clock(interval, on_tick)` (§6): a collaborator that delivers
/// monotonic `tick(slot)` events. The engine never reads wall-clock time
/// itself except to stamp produced artifacts.
pub trait SlotClock {
    fn set_on_tick(&mut self, callback: Box<dyn FnMut(u64) + Send>);
}

/// A clock driven entirely by test/CLI code calling `tick`, with no
/// wall-clock dependency — used by the simulator driver and by tests.
#[derive(Default)]
pub struct ManualClock {
    callback: Option<Box<dyn FnMut(u64) + Send>>,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock::default()
    }

    pub fn tick(&mut self, slot: u64) {
        if let Some(callback) = &mut self.callback {
            callback(slot);
        }
    }
}

impl SlotClock for ManualClock {
    fn set_on_tick(&mut self, callback: Box<dyn FnMut(u64) + Send>) {
        self.callback = Some(callback);
    }
}

/// A background-thread clock ticking every `seconds_per_slot`, for a
/// headless long-running simulator. Left unused by the default CLI driver
/// (which prefers deterministic `ManualClock` ticking), provided because
/// §6 names `set_clock(interval, on_tick)` as a real collaborator contract.
pub struct WallClock {
    stop: std::sync::Arc<std::sync::atomic::AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl WallClock {
    pub fn start(seconds_per_slot: u64, mut on_tick: Box<dyn FnMut(u64) + Send>) -> WallClock {
        let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stop_clone = stop.clone();
        let handle = std::thread::spawn(move || {
            let mut slot: u64 = 0;
            while !stop_clone.load(std::sync::atomic::Ordering::Relaxed) {
                std::thread::sleep(std::time::Duration::from_secs(seconds_per_slot));
                on_tick(slot);
                slot += 1;
            }
        });
        WallClock { stop, handle: Some(handle) }
    }
}

impl Drop for WallClock {
    fn drop(&mut self) {
        self.stop.store(true, std::sync::atomic::Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// `submit_transaction(tx)` (§6 Collaborator: transaction source); the
/// engine's own `Node::submit_transaction` already implements the accept/
/// reject contract, this trait exists so alternative front ends (a UI, a
/// script) can be swapped in behind the same signature.
pub trait TransactionSource {
    fn submit_transaction(&mut self, tx: Transaction) -> bool;
}

/// Seam for the out-of-scope "paint contract" demo: when present, a
/// proposer includes at most one demo transaction per block (§2 data flow).
/// The contract's own semantics are never implemented here.
pub trait OptionalTxProvider: Send {
    fn maybe_transaction(&mut self, proposer: Address, nonce: u64, timestamp: u64) -> Option<Transaction>;
}

pub struct NoOpTxProvider;

impl OptionalTxProvider for NoOpTxProvider {
    fn maybe_transaction(&mut self, _proposer: Address, _nonce: u64, _timestamp: u64) -> Option<Transaction> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_invokes_registered_callback() {
        let mut clock = ManualClock::new();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        clock.set_on_tick(Box::new(move |slot| seen_clone.lock().unwrap().push(slot)));
        clock.tick(0);
        clock.tick(1);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }
}
