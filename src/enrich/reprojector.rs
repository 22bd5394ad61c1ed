use crate::config::{ETRS89_LAEA_EUROPE, WGS84_GEOGRAPHIC};
use crate::enrich::error::ReprojectError;
use crate::types::lat_lon::LatLon;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::fmt;

/// Fixed forward transform from a projected grid to geographic coordinates.
///
/// Defaults to EPSG:3035 → EPSG:4326, the pair the archive's point CSVs need.
/// Input is `(easting, northing)`; output is latitude/longitude in degrees.
pub struct CoordinateReprojector {
    source: Proj,
    target: Proj,
    source_definition: String,
    target_definition: String,
    source_is_geographic: bool,
    target_is_geographic: bool,
}

impl fmt::Debug for CoordinateReprojector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinateReprojector")
            .field("source", &self.source_definition)
            .field("target", &self.target_definition)
            .finish_non_exhaustive()
    }
}

impl CoordinateReprojector {
    pub fn etrs89_laea_to_wgs84() -> Result<Self, ReprojectError> {
        Self::from_proj_strings(ETRS89_LAEA_EUROPE, WGS84_GEOGRAPHIC)
    }

    pub fn from_proj_strings(source: &str, target: &str) -> Result<Self, ReprojectError> {
        Ok(Self {
            source: parse("source", source)?,
            target: parse("target", target)?,
            source_definition: source.to_string(),
            target_definition: target.to_string(),
            source_is_geographic: is_geographic(source),
            target_is_geographic: is_geographic(target),
        })
    }

    /// Projects one point. The target system is expected to be geographic.
    pub fn project(&self, easting: f64, northing: f64) -> Result<LatLon, ReprojectError> {
        if !easting.is_finite() || !northing.is_finite() {
            return Err(ReprojectError::NonFinite {
                x: easting,
                y: northing,
            });
        }
        let mut point = if self.source_is_geographic {
            (easting.to_radians(), northing.to_radians(), 0.0)
        } else {
            (easting, northing, 0.0)
        };

        transform(&self.source, &self.target, &mut point).map_err(|e| {
            ReprojectError::Transform {
                x: easting,
                y: northing,
                message: format!("{e:?}"),
            }
        })?;

        let (lon, lat) = if self.target_is_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if !lon.is_finite() || !lat.is_finite() {
            return Err(ReprojectError::Transform {
                x: easting,
                y: northing,
                message: "result is not finite".to_string(),
            });
        }
        Ok(LatLon(lat, lon))
    }
}

fn parse(which: &'static str, definition: &str) -> Result<Proj, ReprojectError> {
    Proj::from_proj_string(definition).map_err(|e| ReprojectError::InvalidProjection {
        which,
        definition: definition.to_string(),
        message: format!("{e:?}"),
    })
}

fn is_geographic(definition: &str) -> bool {
    definition.contains("+proj=longlat") || definition.contains("+proj=latlong")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_false_origin_maps_to_projection_centre() {
        let reprojector = CoordinateReprojector::etrs89_laea_to_wgs84().unwrap();
        let point = reprojector.project(4_321_000.0, 3_210_000.0).unwrap();
        assert!((point.latitude() - 52.0).abs() < 1e-6, "{point:?}");
        assert!((point.longitude() - 10.0).abs() < 1e-6, "{point:?}");
    }

    #[test]
    fn test_offsets_move_in_expected_directions() {
        let reprojector = CoordinateReprojector::etrs89_laea_to_wgs84().unwrap();
        let east = reprojector.project(4_421_000.0, 3_210_000.0).unwrap();
        let north = reprojector.project(4_321_000.0, 3_310_000.0).unwrap();
        assert!(east.longitude() > 11.0 && east.longitude() < 12.0);
        assert!(north.latitude() > 52.8 && north.latitude() < 53.0);
        assert!(east.is_valid() && north.is_valid());
    }

    #[test]
    fn test_nan_input_is_rejected() {
        let reprojector = CoordinateReprojector::etrs89_laea_to_wgs84().unwrap();
        assert!(matches!(
            reprojector.project(f64::NAN, 3_210_000.0),
            Err(ReprojectError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_invalid_definition() {
        let err = CoordinateReprojector::from_proj_strings("+proj=nonsense", WGS84_GEOGRAPHIC)
            .unwrap_err();
        assert!(matches!(
            err,
            ReprojectError::InvalidProjection { which: "source", .. }
        ));
    }
}
