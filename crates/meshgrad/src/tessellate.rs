//! Grid tessellation: turns `(width, height, subdivisions)` into a dense UV
//! lattice and a triangle list. Nothing here looks at control-point values, so
//! a mesh only needs rebuilding when one of the three integers changes.
//!
//! Winding: the evaluator maps top-left-origin positions into clip space with
//! a y flip (see [`crate::patch::to_clip_space`]). Each cell therefore emits
//! `(top_left, bottom_left, top_right)` and `(top_right, bottom_left,
//! bottom_right)`, which are counter-clockwise once flipped.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::MeshError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopologyKey {
    pub width: u32,
    pub height: u32,
    pub subdivisions: u32,
}

impl TopologyKey {
    pub fn new(width: u32, height: u32, subdivisions: u32) -> Self {
        Self {
            width,
            height,
            subdivisions,
        }
    }
}

/// Immutable render topology for one [`TopologyKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct TessellatedMesh {
    key: TopologyKey,
    columns: u32,
    rows: u32,
    uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
}

impl TessellatedMesh {
    pub fn key(&self) -> TopologyKey {
        self.key
    }

    /// Vertices per row, `(width - 1) * subdivisions + 1`.
    pub fn columns(&self) -> u32 {
        self.columns
    }

    /// Vertex rows, `(height - 1) * subdivisions + 1`.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.uvs.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

impl TopologyKey {
    /// Vertex columns and rows this key tessellates to, or why it cannot be built.
    pub fn lattice_size(&self) -> Result<(u32, u32), MeshError> {
        let TopologyKey {
            width,
            height,
            subdivisions,
        } = *self;
        if width < 2 || height < 2 {
            return Err(MeshError::InvalidDimensions { width, height });
        }
        if subdivisions < 1 {
            return Err(MeshError::InvalidSubdivision(subdivisions));
        }

        let too_large = MeshError::TopologyTooLarge {
            width,
            height,
            subdivisions,
        };
        let columns = (width - 1)
            .checked_mul(subdivisions)
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| too_large.clone())?;
        let rows = (height - 1)
            .checked_mul(subdivisions)
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| too_large.clone())?;
        columns.checked_mul(rows).ok_or_else(|| too_large.clone())?;
        // Two triangles per cell; the index count must also fit the u32 draw range.
        (columns - 1)
            .checked_mul(rows - 1)
            .and_then(|cells| cells.checked_mul(6))
            .ok_or(too_large)?;
        Ok((columns, rows))
    }
}

pub fn tessellate(width: u32, height: u32, subdivisions: u32) -> Result<TessellatedMesh, MeshError> {
    let (columns, rows) = TopologyKey::new(width, height, subdivisions).lattice_size()?;
    let vertex_count = columns * rows;

    let mut uvs = Vec::with_capacity(vertex_count as usize);
    for y in 0..rows {
        let v = y as f32 / (rows - 1) as f32;
        for x in 0..columns {
            let u = x as f32 / (columns - 1) as f32;
            uvs.push([u, v]);
        }
    }

    let cells = (columns - 1) as usize * (rows - 1) as usize;
    let mut indices = Vec::with_capacity(cells * 6);
    for y in 0..rows - 1 {
        for x in 0..columns - 1 {
            let top_left = y * columns + x;
            let top_right = top_left + 1;
            let bottom_left = top_left + columns;
            let bottom_right = bottom_left + 1;

            indices.extend_from_slice(&[top_left, bottom_left, top_right]);
            indices.extend_from_slice(&[top_right, bottom_left, bottom_right]);
        }
    }

    Ok(TessellatedMesh {
        key: TopologyKey::new(width, height, subdivisions),
        columns,
        rows,
        uvs,
        indices,
    })
}

/// Memoizes tessellations so repeated subdivision toggles reuse their meshes.
#[derive(Debug, Default)]
pub struct TopologyCache {
    entries: HashMap<TopologyKey, Arc<TessellatedMesh>>,
}

impl TopologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&mut self, key: TopologyKey) -> Result<Arc<TessellatedMesh>, MeshError> {
        if let Some(mesh) = self.entries.get(&key) {
            return Ok(mesh.clone());
        }
        let mesh = Arc::new(tessellate(key.width, key.height, key.subdivisions)?);
        tracing::debug!(
            width = key.width,
            height = key.height,
            subdivisions = key.subdivisions,
            vertices = mesh.vertex_count(),
            indices = mesh.index_count(),
            "tessellated mesh topology"
        );
        self.entries.insert(key, mesh.clone());
        Ok(mesh)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
