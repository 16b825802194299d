//! Per-role record transforms applied before materialization

use crate::error::MappingError;
use crate::graph::{Record, TypeRole};
use crate::source::Aggregate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A record transform. An `Err` aborts the run.
pub type MapFn = dyn Fn(Record) -> Result<Record, String> + Send + Sync;

/// Optional transforms keyed by role; unmapped roles pass through.
#[derive(Clone, Default)]
pub struct CustomMapper {
    mappers: HashMap<TypeRole, Arc<MapFn>>,
}

impl std::fmt::Debug for CustomMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut roles: Vec<_> = self.mappers.keys().collect();
        roles.sort();
        f.debug_struct("CustomMapper").field("roles", &roles).finish()
    }
}

impl CustomMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transform for `role`, replacing any earlier one.
    pub fn with(
        mut self,
        role: TypeRole,
        f: impl Fn(Record) -> Result<Record, String> + Send + Sync + 'static,
    ) -> Self {
        self.mappers.insert(role, Arc::new(f));
        self
    }

    pub fn has(&self, role: TypeRole) -> bool {
        self.mappers.contains_key(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Apply every registered transform, once per record.
    pub fn apply(&self, aggregate: Aggregate) -> Result<Aggregate, MappingError> {
        if self.mappers.is_empty() {
            return Ok(aggregate);
        }

        let mut mapped = aggregate.into_inner();
        for (role, records) in mapped.iter_mut() {
            let Some(mapper) = self.mappers.get(role) else {
                continue;
            };
            let input = std::mem::take(records);
            *records = input
                .into_iter()
                .enumerate()
                .map(|(index, record)| {
                    mapper(record)
                        .map_err(|reason| MappingError::new(*role, format!("record #{}: {}", index, reason)))
                })
                .collect::<Result<_, _>>()?;
            debug!(role = %role, records = records.len(), "mapped records");
        }
        Ok(Aggregate::from(mapped))
    }
}
