pub mod lat_lon;
pub mod outcome;
pub mod sweep;
pub mod tile;
