//! Credential ledger: the set of credentials with a job in flight.

use std::collections::HashSet;

use maple_core::Credential;

/// Mutual-exclusion set over LLM credentials.
///
/// A credential is present exactly while one execution task runs a job
/// under it. The ledger itself is not synchronised; the scheduler owns
/// it behind the same lock as the job queue so that picking a job and
/// reserving its credential happen in one critical section.
#[derive(Debug, Default)]
pub struct CredentialLedger {
    in_use: HashSet<Credential>,
}

impl CredentialLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `credential`. Returns `false` if it is already reserved.
    pub fn try_reserve(&mut self, credential: &Credential) -> bool {
        self.in_use.insert(credential.clone())
    }

    /// Release `credential`. Releasing an unreserved credential is a no-op.
    pub fn release(&mut self, credential: &Credential) {
        self.in_use.remove(credential);
    }

    pub fn is_reserved(&self, credential: &Credential) -> bool {
        self.in_use.contains(credential)
    }

    /// Number of credentials currently in use.
    pub fn len(&self) -> usize {
        self.in_use.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_use.is_empty()
    }
}
