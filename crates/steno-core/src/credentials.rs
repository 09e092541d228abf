// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Owning-credential lookup.
//!
//! Bots are created by API credentials, but staged object keys and
//! downstream artifact metadata are namespaced by the owning *user*.
//! This trait resolves one to the other; credential issuance itself is
//! handled elsewhere.

use async_trait::async_trait;

use crate::error::CoreError;

/// Resolves a credential id to its owning user id.
#[async_trait]
pub trait CredentialDirectory: Send + Sync {
    /// Owning user id for `credential_id`, or `None` if unknown.
    async fn owner_of(&self, credential_id: &str) -> Result<Option<String>, CoreError>;
}
