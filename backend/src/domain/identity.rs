//! Identity/contact resolution.
//!
//! Shares and payment requests name their counterparty by an opaque
//! reference. It is resolved once, at creation time, into a [`Recipient`]
//! that records whether the counterparty is a registered user.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use shared::Recipient;

use super::errors::{LedgerError, LedgerResult};

/// What the resolver knows about a reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub reference: String,
    pub name: String,
    pub email: String,
    /// Present when the contact is a registered user of the app
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Contact {
    pub fn into_recipient(self) -> Recipient {
        match self.user_id {
            Some(user_id) => Recipient::Registered {
                user_id,
                name: self.name,
                email: self.email,
            },
            None => Recipient::External {
                name: self.name,
                email: self.email,
            },
        }
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<Option<Contact>>;
}

/// Resolve a reference or fail with a validation error naming it
pub async fn resolve_recipient(
    resolver: &Arc<dyn IdentityResolver>,
    reference: &str,
) -> LedgerResult<Recipient> {
    if reference.trim().is_empty() {
        return Err(LedgerError::validation("Recipient reference cannot be empty"));
    }
    resolver
        .resolve(reference)
        .await?
        .map(Contact::into_recipient)
        .ok_or_else(|| LedgerError::validation(format!("Unknown recipient: {}", reference)))
}

/// Fixed directory of contacts, keyed by reference
#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    contacts: HashMap<String, Contact>,
}

impl ContactDirectory {
    pub fn new(contacts: impl IntoIterator<Item = Contact>) -> Self {
        Self {
            contacts: contacts
                .into_iter()
                .map(|c| (c.reference.clone(), c))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

#[async_trait]
impl IdentityResolver for ContactDirectory {
    async fn resolve(&self, reference: &str) -> Result<Option<Contact>> {
        Ok(self.contacts.get(reference).cloned())
    }
}
