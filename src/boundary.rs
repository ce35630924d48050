//! Resolution of the named boundary marker on this rank.

use serde::{Deserialize, Serialize};

use crate::driver::{MarkerId, SolverDriver};
use crate::errors::BoundaryError;

/// Vertex accounting of a marker on this rank. `total == physical + halo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VertexCounts {
    pub total: usize,
    pub halo: usize,
    pub physical: usize,
}

impl VertexCounts {
    /// Counts for a marker absent on this rank.
    pub const ABSENT: VertexCounts = VertexCounts {
        total: 0,
        halo: 0,
        physical: 0,
    };

    /// Split `total` into physical and halo vertices.
    pub fn from_driver(name: &str, total: usize, halo: usize) -> Result<Self, BoundaryError> {
        let physical = total
            .checked_sub(halo)
            .ok_or_else(|| BoundaryError::HaloExceedsTotal {
                name: name.to_string(),
                total,
                halo,
            })?;
        Ok(Self {
            total,
            halo,
            physical,
        })
    }
}

/// A marker that exists on this rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerInfo {
    pub name: String,
    pub id: MarkerId,
    pub counts: VertexCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerResolution {
    Present(MarkerInfo),
    /// Unknown globally, or owned by other ranks only.
    Absent { name: String },
}

impl MarkerResolution {
    pub fn name(&self) -> &str {
        match self {
            MarkerResolution::Present(info) => &info.name,
            MarkerResolution::Absent { name } => name,
        }
    }

    pub fn id(&self) -> Option<MarkerId> {
        match self {
            MarkerResolution::Present(info) => Some(info.id),
            MarkerResolution::Absent { .. } => None,
        }
    }

    pub fn counts(&self) -> VertexCounts {
        match self {
            MarkerResolution::Present(info) => info.counts,
            MarkerResolution::Absent { .. } => VertexCounts::ABSENT,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, MarkerResolution::Present(_))
    }
}

/// Look `name` up in the global tag set and in this rank's markers.
///
/// A marker is present only when it appears in both. Absence is not an
/// error: a rank may simply own no part of the boundary.
pub fn resolve_marker<D: SolverDriver + ?Sized>(
    driver: &D,
    name: &str,
) -> Result<MarkerResolution, BoundaryError> {
    let global = driver.all_boundary_tags()?;
    if !global.contains(name) {
        tracing::debug!(marker = name, "marker not in global boundary tags");
        return Ok(MarkerResolution::Absent {
            name: name.to_string(),
        });
    }

    let local = driver.rank_local_markers()?;
    let Some(&id) = local.get(name) else {
        tracing::debug!(marker = name, "marker not owned by this rank");
        return Ok(MarkerResolution::Absent {
            name: name.to_string(),
        });
    };

    let total = driver.vertex_count(id)?;
    let halo = driver.halo_vertex_count(id)?;
    let counts = VertexCounts::from_driver(name, total, halo)?;
    tracing::debug!(
        marker = name,
        id = %id,
        total = counts.total,
        halo = counts.halo,
        "marker resolved"
    );
    Ok(MarkerResolution::Present(MarkerInfo {
        name: name.to_string(),
        id,
        counts,
    }))
}
