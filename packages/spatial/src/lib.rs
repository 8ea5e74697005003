#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory region index built from boundary polygons.
//!
//! Converts the boundary `FeatureCollection` into [`Region`]s with
//! precomputed bounding boxes, keeps them sorted for the region selector,
//! and answers point-in-polygon questions for the filter engine. An R-tree
//! over region envelopes backs [`RegionIndex::locate`].

pub mod collation;

use std::collections::BTreeMap;

use geo::{Area, BoundingRect, Contains, MultiPolygon};
use geojson::{Feature, FeatureCollection};
use rstar::{AABB, RTree, RTreeObject};
use traffic_map_region_models::{BoundingBox, RegionOption};

/// Property holding the region display name.
const NAME_PROPERTY: &str = "name";

/// A named region with its boundary polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Region key (the display name).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Envelope of `boundary`.
    pub bounding_box: BoundingBox,
    /// Boundary geometry. `Polygon` features become a one-member
    /// multipolygon.
    pub boundary: MultiPolygon<f64>,
}

impl Region {
    /// Whether `(lon, lat)` lies strictly inside the boundary.
    ///
    /// Points exactly on an edge are outside, following
    /// [`geo::Contains`].
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.bounding_box.contains_point(lon, lat)
            && self.boundary.contains(&geo::Point::new(lon, lat))
    }

    /// Exterior ring of every constituent polygon as `(lon, lat)` paths.
    ///
    /// One path per polygon: a multipolygon region yields several.
    #[must_use]
    pub fn outline_paths(&self) -> Vec<Vec<(f64, f64)>> {
        self.boundary
            .iter()
            .map(|polygon| polygon.exterior().coords().map(|c| (c.x, c.y)).collect())
            .collect()
    }
}

/// Region envelope stored in the R-tree; `idx` points into
/// [`RegionIndex::regions`].
struct RegionEntry {
    idx: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Region id → region lookup, sorted display order, and spatial index.
///
/// Built once after the boundary data loads; read-only afterwards.
pub struct RegionIndex {
    regions: Vec<Region>,
    by_id: BTreeMap<String, usize>,
    tree: RTree<RegionEntry>,
}

impl std::fmt::Debug for RegionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionIndex")
            .field("regions", &self.regions.len())
            .finish_non_exhaustive()
    }
}

impl RegionIndex {
    /// Builds the index from a boundary feature collection.
    ///
    /// Features without a name, without geometry, with non-polygonal
    /// geometry, or without a computable bounding box are skipped with a
    /// warning. Features sharing a name are merged into one region.
    #[must_use]
    pub fn from_feature_collection(collection: &FeatureCollection) -> Self {
        let mut merged: BTreeMap<String, MultiPolygon<f64>> = BTreeMap::new();

        for (i, feature) in collection.features.iter().enumerate() {
            let Some(name) = feature_name(feature) else {
                log::warn!("Skipping boundary feature #{i}: missing `{NAME_PROPERTY}` property");
                continue;
            };
            let Some(polygons) = feature_multipolygon(feature) else {
                log::warn!("Skipping boundary feature {name:?}: missing or non-polygonal geometry");
                continue;
            };

            match merged.get_mut(&name) {
                Some(existing) => {
                    log::debug!("Merging duplicate boundary feature {name:?}");
                    existing.0.extend(polygons.0);
                }
                None => {
                    merged.insert(name, polygons);
                }
            }
        }

        let mut regions: Vec<Region> = merged
            .into_iter()
            .filter_map(|(name, boundary)| {
                let Some(bounding_box) = bounding_box(&boundary) else {
                    log::warn!("Skipping boundary feature {name:?}: empty geometry");
                    return None;
                };
                Some(Region {
                    id: name.clone(),
                    name,
                    bounding_box,
                    boundary,
                })
            })
            .collect();

        regions.sort_by(|a, b| collation::compare_names(&a.name, &b.name));

        let by_id = regions
            .iter()
            .enumerate()
            .map(|(idx, region)| (region.id.clone(), idx))
            .collect();

        let tree = RTree::bulk_load(
            regions
                .iter()
                .enumerate()
                .map(|(idx, region)| RegionEntry {
                    idx,
                    envelope: AABB::from_corners(
                        [region.bounding_box.min_lon, region.bounding_box.min_lat],
                        [region.bounding_box.max_lon, region.bounding_box.max_lat],
                    ),
                })
                .collect(),
        );

        log::info!("Indexed {} regions", regions.len());

        Self {
            regions,
            by_id,
            tree,
        }
    }

    /// Resolves a region id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Region> {
        self.by_id.get(id).map(|&idx| &self.regions[idx])
    }

    /// Finds a region by display name, ignoring case (including `Å`/`å`).
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Region> {
        let wanted = name.trim().to_lowercase();
        self.regions
            .iter()
            .find(|region| region.name.to_lowercase() == wanted)
    }

    /// All regions in display order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Number of indexed regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no region was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Selector entries: "All regions" followed by every region in
    /// display order.
    #[must_use]
    pub fn display_list(&self) -> Vec<RegionOption> {
        std::iter::once(RegionOption::All)
            .chain(self.regions.iter().map(|region| RegionOption::Region {
                id: region.id.clone(),
                name: region.name.clone(),
            }))
            .collect()
    }

    /// Finds the region containing `(lon, lat)`.
    ///
    /// Regions can overlap; the smallest area wins, then the lowest
    /// display position.
    #[must_use]
    pub fn locate(&self, lon: f64, lat: f64) -> Option<&Region> {
        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        let mut best: Option<(f64, usize)> = None;

        for entry in self.tree.locate_in_envelope_intersecting(&query_env) {
            let region = &self.regions[entry.idx];
            if !region.boundary.contains(&point) {
                continue;
            }
            let area = region.boundary.unsigned_area();
            let better = best.is_none_or(|(best_area, best_idx)| {
                area.total_cmp(&best_area)
                    .then(entry.idx.cmp(&best_idx))
                    .is_lt()
            });
            if better {
                best = Some((area, entry.idx));
            }
        }

        best.map(|(_, idx)| &self.regions[idx])
    }
}

fn feature_name(feature: &Feature) -> Option<String> {
    feature
        .property(NAME_PROPERTY)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Converts a feature's geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn feature_multipolygon(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.clone()?;
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

fn bounding_box(mp: &MultiPolygon<f64>) -> Option<BoundingBox> {
    let rect = mp.bounding_rect()?;
    let (min, max) = (rect.min(), rect.max());
    [min.x, min.y, max.x, max.y]
        .iter()
        .all(|v| v.is_finite())
        .then(|| BoundingBox::new(min.x, min.y, max.x, max.y))
}
