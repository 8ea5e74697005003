//! Region boundary `GeoJSON` parsing.
//!
//! Only the document shape is checked here. Per-feature geometry
//! validation belongs to the region index, which skips bad features
//! instead of failing the load.

use geojson::{FeatureCollection, GeoJson};

use crate::LoaderError;

/// Parses a boundary document into a [`FeatureCollection`].
///
/// # Errors
///
/// Returns [`LoaderError`] if the text is not valid `GeoJSON` or is not a
/// `FeatureCollection`.
pub fn parse_boundaries(text: &str) -> Result<FeatureCollection, LoaderError> {
    match text.parse::<GeoJson>().map_err(Box::new)? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        GeoJson::Feature(_) => Err(LoaderError::InvalidBoundaries {
            message: "expected a FeatureCollection, found a single Feature".to_string(),
        }),
        GeoJson::Geometry(_) => Err(LoaderError::InvalidBoundaries {
            message: "expected a FeatureCollection, found a bare Geometry".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_feature_collection() {
        let collection = parse_boundaries(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "properties": { "name": "Uusimaa" },
                        "geometry": {
                            "type": "Polygon",
                            "coordinates": [[[24, 60], [26, 60], [26, 61], [24, 61], [24, 60]]]
                        }
                    },
                    {
                        "type": "Feature",
                        "properties": { "name": "Nowhere" },
                        "geometry": null
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(collection.features.len(), 2);
    }

    #[test]
    fn rejects_single_feature() {
        let err = parse_boundaries(
            r#"{ "type": "Feature", "properties": {}, "geometry": null }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LoaderError::InvalidBoundaries { .. }));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_boundaries("{ not json").unwrap_err();
        assert!(matches!(err, LoaderError::GeoJson(_)));
    }
}
