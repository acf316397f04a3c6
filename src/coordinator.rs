//! Thin RPC interface for the external coordinator that tracks which
//! process is the active writer for each store. Only the two message
//! types are defined here; the coordinator implementation itself is a
//! collaborator and lives elsewhere.

use crate::id::StoreId;

/// Advisory: the coordinator records who claims the partition.
#[derive(Clone, Debug)]
pub struct ReportActiveInstance {
    pub store_id: StoreId,
    pub host: String,
    pub executor_id: String,
}

/// Fences stale speculative writers: called by the writer before committing
/// side effects downstream.
#[derive(Clone, Debug)]
pub struct VerifyIfInstanceActive {
    pub store_id: StoreId,
    pub executor_id: String,
}

/// Boundary trait toward the coordinator. An unreachable coordinator makes
/// `verify_if_instance_active` return `false` and `report_active_instance`
/// return `Err(())`, the signal the registry uses to trigger `clear_all`.
pub trait CoordinatorClient: Send + Sync {
    fn report_active_instance(&self, message: ReportActiveInstance) -> Result<(), ()>;

    fn verify_if_instance_active(&self, message: VerifyIfInstanceActive) -> bool;
}

/// An in-memory fake used by tests and by callers with no real coordinator:
/// every instance reports successfully and every verification succeeds.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysActiveCoordinator;

impl CoordinatorClient for AlwaysActiveCoordinator {
    fn report_active_instance(&self, _message: ReportActiveInstance) -> Result<(), ()> {
        Ok(())
    }

    fn verify_if_instance_active(&self, _message: VerifyIfInstanceActive) -> bool {
        true
    }
}

/// A fake that always behaves as though the coordinator is unreachable,
/// for exercising the defensive-eviction path in the registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnreachableCoordinator;

impl CoordinatorClient for UnreachableCoordinator {
    fn report_active_instance(&self, _message: ReportActiveInstance) -> Result<(), ()> {
        Err(())
    }

    fn verify_if_instance_active(&self, _message: VerifyIfInstanceActive) -> bool {
        false
    }
}
