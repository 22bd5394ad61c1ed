pub mod columns;
pub mod enricher;
pub mod error;
pub mod geocoder;
pub mod reprojector;
