//! Apply entry point trait
//!
//! The dependency resolver and the wave bridge only know this trait; the
//! resolver calls it recursively for cascades and corrections, always with
//! `skip_prerequisites` set so nested applies cannot trigger each other forever.

use super::{
    error::EngineError,
    model::{ApplyRequest, OperationResult},
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Applies a single setting
#[async_trait]
pub trait SettingApplier: Send + Sync {
    /// Apply one setting change.
    ///
    /// Backend failures are reported through the returned [`OperationResult`];
    /// `Err` is reserved for invalid requests and unsatisfiable prerequisites.
    async fn apply_setting(
        &self,
        request: ApplyRequest,
        cancel: &CancellationToken,
    ) -> Result<OperationResult, EngineError>;
}
