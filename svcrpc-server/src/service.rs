//! Services: named groups of procedures
//!
//! The dispatcher resolves a procedure by asking the target [`Service`] for it
//! by exact, case-sensitive name. [`ProcedureTable`] is the stock
//! implementation; anything that can look procedures up by name can stand in.
//!
//! ```rust
//! use svcrpc_server::{from_fn, ProcedureTable};
//! use serde_json::json;
//!
//! let table = ProcedureTable::builder()
//!     .procedure("ping", from_fn(|_| async { Ok(json!("pong")) }))
//!     .build();
//!
//! assert!(table.has_procedure("ping"));
//! assert!(!table.has_procedure("Ping"));
//! ```

use crate::procedure::Procedure;
use std::collections::HashMap;
use std::sync::Arc;

/// A named group of procedures
pub trait Service: Send + Sync {
    /// Procedure registered under `name`, if any
    fn procedure(&self, name: &str) -> Option<Arc<dyn Procedure>>;

    /// Names of every procedure this service exposes
    fn procedure_names(&self) -> Vec<String>;

    /// When true, every procedure of this service receives its request
    fn request_aware(&self) -> bool {
        false
    }
}

impl<S: Service + ?Sized> Service for Arc<S> {
    fn procedure(&self, name: &str) -> Option<Arc<dyn Procedure>> {
        (**self).procedure(name)
    }

    fn procedure_names(&self) -> Vec<String> {
        (**self).procedure_names()
    }

    fn request_aware(&self) -> bool {
        (**self).request_aware()
    }
}

/// Map-backed [`Service`]
///
/// Cheap to clone; procedures are shared behind `Arc`.
#[derive(Clone, Default)]
pub struct ProcedureTable {
    procedures: Arc<HashMap<String, Arc<dyn Procedure>>>,
    request_aware: bool,
}

impl ProcedureTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a builder
    pub fn builder() -> ProcedureTableBuilder {
        ProcedureTableBuilder::new()
    }

    /// Add or replace a procedure
    pub fn register(&mut self, name: impl Into<String>, procedure: Box<dyn Procedure>) {
        let procedures = Arc::make_mut(&mut self.procedures);
        procedures.insert(name.into(), Arc::from(procedure));
    }

    /// Mark every procedure of this table request-aware
    pub fn set_request_aware(&mut self, request_aware: bool) {
        self.request_aware = request_aware;
    }

    /// True if `name` is registered
    pub fn has_procedure(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// Number of registered procedures
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    /// True when no procedure is registered
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

impl Service for ProcedureTable {
    fn procedure(&self, name: &str) -> Option<Arc<dyn Procedure>> {
        self.procedures.get(name).cloned()
    }

    fn procedure_names(&self) -> Vec<String> {
        self.procedures.keys().cloned().collect()
    }

    fn request_aware(&self) -> bool {
        self.request_aware
    }
}

/// Builder for a [`ProcedureTable`]
#[derive(Default)]
pub struct ProcedureTableBuilder {
    table: ProcedureTable,
}

impl ProcedureTableBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a procedure
    pub fn procedure(mut self, name: impl Into<String>, procedure: Box<dyn Procedure>) -> Self {
        self.table.register(name, procedure);
        self
    }

    /// Pass the originating request to every procedure
    pub fn request_aware(mut self) -> Self {
        self.table.set_request_aware(true);
        self
    }

    /// Finish
    pub fn build(self) -> ProcedureTable {
        self.table
    }
}
