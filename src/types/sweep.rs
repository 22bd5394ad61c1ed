//! Defines [`SweepSpec`], the tagged union of the four download modes, and the nested
//! enumeration that turns a sweep into an ordered stream of [`TileAddress`] values.

use crate::types::tile::{
    Displacement, L2Level, Polarization, Swath, TileAddress, TileCoords, TileError, YearRange,
    MAX_BURST_CYCLE, MAX_RELATIVE_ORBIT,
};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Which displacement components to fetch for an L3 cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplacementChoice {
    #[default]
    East,
    Up,
    /// Both components, east first.
    Both,
}

impl DisplacementChoice {
    pub fn displacements(&self) -> Vec<Displacement> {
        match self {
            DisplacementChoice::East => vec![Displacement::East],
            DisplacementChoice::Up => vec![Displacement::Up],
            DisplacementChoice::Both => vec![Displacement::East, Displacement::Up],
        }
    }
}

impl From<Displacement> for DisplacementChoice {
    fn from(displacement: Displacement) -> Self {
        match displacement {
            Displacement::East => DisplacementChoice::East,
            Displacement::Up => DisplacementChoice::Up,
        }
    }
}

impl fmt::Display for DisplacementChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplacementChoice::East => f.write_str("E"),
            DisplacementChoice::Up => f.write_str("U"),
            DisplacementChoice::Both => f.write_str("Both"),
        }
    }
}

impl FromStr for DisplacementChoice {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("both") {
            return Ok(DisplacementChoice::Both);
        }
        s.parse::<Displacement>().map(DisplacementChoice::from)
    }
}

/// A download request: one tile, or the cartesian product of ranges.
///
/// Tiles are produced outermost-to-innermost in the order the fields are declared:
/// orbit, burst cycle, swath, polarization for [`SweepSpec::BatchL2`]; east, north,
/// displacement for [`SweepSpec::BatchL3`]. An inverted range (`min > max`) is empty.
///
/// # Examples
///
/// ```
/// use egms::{L2Level, Polarization, Swath, SweepSpec, YearRange};
///
/// let sweep = SweepSpec::BatchL2 {
///     level: L2Level::L2A,
///     relative_orbits: 50..=51,
///     burst_cycles: 715..=716,
///     swaths: vec![Swath::IW1],
///     polarizations: vec![Polarization::VV],
/// };
/// assert_eq!(sweep.tile_count(), 4);
/// let second = sweep.tiles(YearRange::Y2018_2022, "token").unwrap().nth(1).unwrap();
/// assert_eq!(second.label(), "L2a_050_0716_IW1_VV");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepSpec {
    SingleL2 {
        level: L2Level,
        relative_orbit: u16,
        burst_cycle: u16,
        swath: Swath,
        polarization: Polarization,
    },
    BatchL2 {
        level: L2Level,
        relative_orbits: RangeInclusive<u16>,
        burst_cycles: RangeInclusive<u16>,
        swaths: Vec<Swath>,
        polarizations: Vec<Polarization>,
    },
    SingleL3 {
        east: u16,
        north: u16,
        displacement: DisplacementChoice,
    },
    BatchL3 {
        east: RangeInclusive<u16>,
        north: RangeInclusive<u16>,
        displacement: DisplacementChoice,
    },
}

impl SweepSpec {
    /// Batch sweeps get the failure cooldown; single-file requests do not.
    pub fn is_batch(&self) -> bool {
        matches!(self, SweepSpec::BatchL2 { .. } | SweepSpec::BatchL3 { .. })
    }

    /// Number of tiles [`SweepSpec::tiles`] will produce.
    pub fn tile_count(&self) -> usize {
        match self {
            SweepSpec::SingleL2 { .. } => 1,
            SweepSpec::BatchL2 {
                relative_orbits,
                burst_cycles,
                swaths,
                polarizations,
                ..
            } => relative_orbits
                .clone()
                .count()
                .saturating_mul(burst_cycles.clone().count())
                .saturating_mul(swaths.len())
                .saturating_mul(polarizations.len()),
            SweepSpec::SingleL3 { displacement, .. } => displacement.displacements().len(),
            SweepSpec::BatchL3 {
                east,
                north,
                displacement,
            } => east
                .clone()
                .count()
                .saturating_mul(north.clone().count())
                .saturating_mul(displacement.displacements().len()),
        }
    }

    /// Lazily expands the sweep into tiles in nested declaration order.
    ///
    /// Orbit and burst cycle ranges are checked against their zero-padded widths before
    /// any tile is produced, so the returned iterator never fails.
    pub fn tiles<'a>(
        &'a self,
        year_range: YearRange,
        access_token: &'a str,
    ) -> Result<Box<dyn Iterator<Item = TileAddress> + Send + 'a>, TileError> {
        let tiles: Box<dyn Iterator<Item = TileAddress> + Send + 'a> = match self {
            SweepSpec::SingleL2 {
                level,
                relative_orbit,
                burst_cycle,
                swath,
                polarization,
            } => Box::new(std::iter::once(TileAddress::l2(
                *level,
                *relative_orbit,
                *burst_cycle,
                *swath,
                *polarization,
                year_range,
                access_token,
            )?)),
            SweepSpec::BatchL2 {
                level,
                relative_orbits,
                burst_cycles,
                swaths,
                polarizations,
            } => {
                check_width(
                    relative_orbits,
                    MAX_RELATIVE_ORBIT,
                    TileError::RelativeOrbitOutOfRange,
                )?;
                check_width(burst_cycles, MAX_BURST_CYCLE, TileError::BurstCycleOutOfRange)?;
                let level = *level;
                Box::new(relative_orbits.clone().flat_map(move |relative_orbit| {
                    burst_cycles.clone().flat_map(move |burst_cycle| {
                        swaths.iter().flat_map(move |&swath| {
                            polarizations.iter().map(move |&polarization| TileAddress {
                                coords: TileCoords::L2 {
                                    level,
                                    relative_orbit,
                                    burst_cycle,
                                    swath,
                                    polarization,
                                },
                                year_range,
                                access_token: access_token.to_string(),
                            })
                        })
                    })
                }))
            }
            SweepSpec::SingleL3 {
                east,
                north,
                displacement,
            } => {
                let (east, north) = (*east, *north);
                Box::new(
                    displacement.displacements().into_iter().map(move |component| {
                        TileAddress::l3(east, north, component, year_range, access_token)
                    }),
                )
            }
            SweepSpec::BatchL3 {
                east,
                north,
                displacement,
            } => Box::new(east.clone().flat_map(move |e| {
                north.clone().flat_map(move |n| {
                    displacement
                        .displacements()
                        .into_iter()
                        .map(move |component| {
                            TileAddress::l3(e, n, component, year_range, access_token)
                        })
                })
            })),
        };
        Ok(tiles)
    }

    /// File name for a zip bundling every CSV of a batch sweep, `None` for single tiles.
    pub fn bundle_name(&self, year_range: YearRange) -> Option<String> {
        match self {
            SweepSpec::BatchL2 { level, .. } => {
                Some(format!("EGMS_{}_batch_{}.zip", level, year_range))
            }
            SweepSpec::BatchL3 { east, north, .. } => Some(format!(
                "EGMS_L3_E{}-{}_N{}-{}_{}_batch.zip",
                east.start(),
                east.end(),
                north.start(),
                north.end(),
                year_range
            )),
            SweepSpec::SingleL2 { .. } | SweepSpec::SingleL3 { .. } => None,
        }
    }
}

/// Rejects a non-empty range whose upper end does not fit `max`.
fn check_width(
    range: &RangeInclusive<u16>,
    max: u16,
    out_of_range: fn(u16) -> TileError,
) -> Result<(), TileError> {
    if !range.is_empty() && *range.end() > max {
        return Err(out_of_range(*range.end()));
    }
    Ok(())
}
