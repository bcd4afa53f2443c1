// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Liveness subscriptions
//!
//! Each watched collaborator gets a `WatchId`. A disconnect is reported back
//! to the coordinator as `Event::Down(id)`; ids that were cancelled or
//! replaced in the meantime no longer resolve and are ignored.

use super::event::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Handle of one liveness subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchId(u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch_{}", self.0)
    }
}

/// At most one active subscription per role
#[derive(Debug, Default)]
pub struct WatchTable {
    next: u64,
    by_role: HashMap<Role, WatchId>,
    by_id: HashMap<WatchId, Role>,
}

impl WatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `role`, returning the new id and the one it replaces
    pub fn watch(&mut self, role: Role) -> (WatchId, Option<WatchId>) {
        let replaced = self.unwatch(role);
        self.next += 1;
        let id = WatchId(self.next);
        self.by_role.insert(role, id);
        self.by_id.insert(id, role);
        (id, replaced)
    }

    /// Cancel the subscription on `role`, if any
    pub fn unwatch(&mut self, role: Role) -> Option<WatchId> {
        let id = self.by_role.remove(&role)?;
        self.by_id.remove(&id);
        Some(id)
    }

    /// Consume a fired subscription
    pub fn fire(&mut self, id: WatchId) -> Option<Role> {
        let role = self.by_id.remove(&id)?;
        self.by_role.remove(&role);
        Some(role)
    }

    /// Active subscription on `role`
    pub fn id(&self, role: Role) -> Option<WatchId> {
        self.by_role.get(&role).copied()
    }

    pub fn is_watched(&self, role: Role) -> bool {
        self.by_role.contains_key(&role)
    }

    /// Cancel every subscription
    pub fn drain(&mut self) -> Vec<WatchId> {
        self.by_role.clear();
        let mut ids: Vec<WatchId> = self.by_id.drain().map(|(id, _)| id).collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
