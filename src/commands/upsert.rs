//! Update-or-create for objects the API addresses by name (roles, secrets).
//!
//! An update is attempted first unless the caller already knows the object
//! is absent. With [`Existence::Probe`] a 400 from the update is read as
//! "does not exist yet" and the create call follows.

use crate::client::ApiResponse;
use crate::error::{DeployError, Result};
use clap::ValueEnum;
use std::future::Future;
use tracing::{debug, info};

/// How the caller decides between the update and the create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ExistenceCheck {
    /// Query the listing endpoint once and test membership
    #[default]
    List,
    /// Try the update; a 400 means the object is new
    UpdateProbe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Probe,
    Known(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated,
    Created,
}

/// Status the API answers an update with when the object is missing.
const NOT_FOUND_ON_UPDATE: u16 = 400;

pub async fn update_or_create<U, UF, C, CF>(
    target: &str,
    existence: Existence,
    update: U,
    create: C,
) -> Result<UpsertOutcome>
where
    U: FnOnce() -> UF,
    UF: Future<Output = Result<ApiResponse>>,
    C: FnOnce() -> CF,
    CF: Future<Output = Result<ApiResponse>>,
{
    if existence != Existence::Known(false) {
        debug!("Trying to update {}", target);
        let resp = update().await?;
        if resp.is_ok() {
            return Ok(UpsertOutcome::Updated);
        }
        if existence == Existence::Known(true) || resp.status != NOT_FOUND_ON_UPDATE {
            return Err(DeployError::status("Update", target, resp.status));
        }
    }

    info!("Trying to create {}", target);
    let resp = create().await?;
    if resp.is_ok() {
        Ok(UpsertOutcome::Created)
    } else {
        Err(DeployError::status("Create", target, resp.status))
    }
}
