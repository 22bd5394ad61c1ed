/// A geographic coordinate in decimal degrees, latitude first.
///
/// # Examples
///
/// ```
/// use egms::LatLon;
///
/// let bologna = LatLon(44.4949, 11.3426);
/// assert_eq!(bologna.latitude(), 44.4949);
/// assert_eq!(bologna.longitude(), 11.3426);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub fn latitude(&self) -> f64 {
        self.0
    }

    pub fn longitude(&self) -> f64 {
        self.1
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_finite()
            && self.1.is_finite()
            && (-90.0..=90.0).contains(&self.0)
            && (-180.0..=180.0).contains(&self.1)
    }
}
