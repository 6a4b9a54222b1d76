//! Tabular (positional row) projection
//!
//! Projects rows of string cells by column index. The set of retained source
//! indices is resolved once per extraction and cached, trying in priority
//! order:
//!
//! 1. an explicit user-declared index list,
//! 2. a header row intersected case-insensitively with the schema names,
//! 3. the first N positional columns, N = schema column count.
//!
//! Projection moves the retained indices to the front of the row in their
//! scan order and truncates to exactly the requested width, padding with
//! empty strings when the source row is too short.

use harvest_common::Result;
use std::collections::HashSet;

use crate::schema::IntermediateSchema;

/// Projector for positional rows
#[derive(Debug)]
pub struct TabularProjector {
    explicit: Option<Vec<usize>>,
    header_pending: bool,
    projection: Option<Vec<usize>>,
}

impl TabularProjector {
    /// `explicit` is the user-declared projection list, if any; `header_row`
    /// marks the first row as a header. A declared header is consumed even
    /// when an explicit projection makes inference unnecessary.
    pub fn new(explicit: Option<Vec<usize>>, header_row: bool) -> Self {
        Self {
            explicit,
            header_pending: header_row,
            projection: None,
        }
    }

    /// The cached projection, once resolved
    pub fn resolved_projection(&self) -> Option<&[usize]> {
        self.projection.as_deref()
    }

    /// Project one row.
    ///
    /// Returns `Ok(None)` for a consumed header row and for the empty
    /// projection set, which disables row output entirely.
    pub fn project(
        &mut self,
        schema: &IntermediateSchema,
        row: &[String],
    ) -> Result<Option<Vec<String>>> {
        if self.header_pending {
            self.header_pending = false;
            if self.explicit.is_none() {
                let inferred: Vec<usize> = row
                    .iter()
                    .enumerate()
                    .filter(|(_, name)| schema.position_ci(name).is_some())
                    .map(|(index, _)| index)
                    .collect();
                tracing::debug!(
                    columns = inferred.len(),
                    "resolved tabular projection from header row"
                );
                self.projection = Some(inferred);
            }
            // The header itself is consumed, not emitted.
            return Ok(None);
        }
        if self.projection.is_none() {
            self.projection = Some(match &self.explicit {
                Some(explicit) => explicit.clone(),
                None => (0..schema.len()).collect(),
            });
        }

        let projection = self.projection.as_deref().unwrap_or(&[]);
        if projection.is_empty() {
            return Ok(None);
        }

        // Each source index contributes at most once, in projection scan
        // order; the output width always equals the requested width.
        let requested = projection.len();
        let mut seen = HashSet::new();
        let retained: Vec<usize> = projection
            .iter()
            .copied()
            .filter(|index| seen.insert(*index))
            .collect();

        let mut out = Vec::with_capacity(requested);
        for slot in 0..requested {
            let cell = retained
                .get(slot)
                .and_then(|&index| row.get(index))
                .cloned()
                .unwrap_or_default();
            out.push(cell);
        }
        Ok(Some(out))
    }
}
