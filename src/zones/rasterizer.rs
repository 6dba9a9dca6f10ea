use crate::boundaries::boundary::Boundary;
use crate::boundaries::error::BoundaryError;
use crate::raster::error::RasterError;
use crate::raster::grid::GridSpec;
use geo::{Intersects, MultiPolygon, Point};
use log::{info, warn};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;

/// Bidirectional lookup between boundary identifiers and zone codes.
///
/// Codes are `0..len()`, assigned in boundary order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneTable {
    ids: Vec<String>,
    codes: HashMap<String, u32>,
}

impl ZoneTable {
    /// Assigns codes to `boundaries` in order.
    ///
    /// # Errors
    ///
    /// [`BoundaryError::DuplicateIdentifier`] if an identifier repeats, which
    /// would make the lookup ambiguous.
    pub fn from_boundaries(boundaries: &[Boundary]) -> Result<Self, BoundaryError> {
        let mut table = ZoneTable::default();
        for boundary in boundaries {
            let code = table.ids.len() as u32;
            if table.codes.insert(boundary.id.clone(), code).is_some() {
                return Err(BoundaryError::DuplicateIdentifier(boundary.id.clone()));
            }
            table.ids.push(boundary.id.clone());
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn code_of(&self, id: &str) -> Option<u32> {
        self.codes.get(id).copied()
    }

    pub fn id_of(&self, code: u32) -> Option<&str> {
        self.ids.get(code as usize).map(String::as_str)
    }

    /// `(code, identifier)` pairs in code order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.ids
            .iter()
            .enumerate()
            .map(|(code, id)| (code as u32, id.as_str()))
    }
}

/// Zone code of every cell of a grid, `None` outside all boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRaster {
    grid: GridSpec,
    codes: Vec<Option<u32>>,
    zone_count: usize,
}

impl ZoneRaster {
    /// Wraps precomputed codes. Every code must be below `zone_count`.
    pub fn from_codes(
        grid: GridSpec,
        codes: Vec<Option<u32>>,
        zone_count: usize,
    ) -> Result<Self, RasterError> {
        if codes.len() != grid.cell_count() {
            return Err(RasterError::ShapeMismatch {
                expected: grid.cell_count(),
                found: codes.len(),
            });
        }
        if let Some(code) = codes.iter().flatten().find(|&&c| c as usize >= zone_count) {
            return Err(RasterError::InvalidZoneCode {
                code: *code,
                zone_count,
            });
        }
        Ok(ZoneRaster {
            grid,
            codes,
            zone_count,
        })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Row-major codes, one per cell.
    pub fn codes(&self) -> &[Option<u32>] {
        &self.codes
    }

    /// Number of codes in the correspondence table, including zones that
    /// received no cell.
    pub fn zone_count(&self) -> usize {
        self.zone_count
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u32> {
        self.codes[row * self.grid.width() + col]
    }

    pub fn covered_cells(&self) -> usize {
        self.codes.iter().filter(|c| c.is_some()).count()
    }
}

/// Bounding box of one zone, the unit stored in the spatial index.
struct ZoneEnvelope<'a> {
    code: u32,
    geometry: &'a MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for ZoneEnvelope<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Burns boundaries into a zone-code raster on `grid`.
///
/// A cell belongs to a zone when its center lies inside or on the border of
/// the zone's polygon. When several zones claim a center, the one with the
/// highest code wins, i.e. later boundaries are drawn over earlier ones.
pub fn rasterize(
    boundaries: &[Boundary],
    grid: &GridSpec,
) -> Result<(ZoneRaster, ZoneTable), BoundaryError> {
    let table = ZoneTable::from_boundaries(boundaries)?;

    let envelopes: Vec<ZoneEnvelope> = boundaries
        .iter()
        .enumerate()
        .filter_map(|(code, boundary)| {
            let Some(rect) = boundary.bounding_rect() else {
                warn!("Boundary '{}' has an empty geometry", boundary.id);
                return None;
            };
            Some(ZoneEnvelope {
                code: code as u32,
                geometry: &boundary.geometry,
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            })
        })
        .collect();
    let tree = RTree::bulk_load(envelopes);

    let mut codes = Vec::with_capacity(grid.cell_count());
    for &y in grid.y.coords() {
        for &x in grid.x.coords() {
            let center = Point::new(x, y);
            let code = tree
                .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
                .filter(|zone| zone.geometry.intersects(&center))
                .map(|zone| zone.code)
                .max();
            codes.push(code);
        }
    }

    let raster = ZoneRaster {
        grid: grid.clone(),
        codes,
        zone_count: table.len(),
    };
    info!(
        "Rasterized {} zones onto a {}x{} grid, {} cells covered",
        table.len(),
        grid.width(),
        grid.height(),
        raster.covered_cells()
    );
    Ok((raster, table))
}
