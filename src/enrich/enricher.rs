//! Adds a `location` column to a point CSV by reprojecting and reverse geocoding each row.

use crate::config::EgmsConfig;
use crate::enrich::columns::{CoordinateColumns, CoordinateKind};
use crate::enrich::error::EnrichError;
use crate::enrich::geocoder::{
    describe_place, NominatimGeocoder, ReverseGeocoder, GEOCODING_ERROR, UNKNOWN_LOCATION,
};
use crate::enrich::reprojector::CoordinateReprojector;
use crate::types::lat_lon::LatLon;
use crate::utils::ensure_dir_exists;
use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use glob::Pattern;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

pub const LOCATION_COLUMN: &str = "location";
const OUTPUT_SUFFIX: &str = "_locations";
const PROGRESS_EVERY: usize = 100;
const TILE_CSV_PATTERN: &str = "EGMS_*.csv";

/// Counts for one enriched file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Data rows written, excluding the header.
    pub rows: usize,
    pub resolved: usize,
    pub unknown: usize,
    pub geocoding_errors: usize,
}

/// Streams a CSV row by row, writing `<output_dir>/<stem>_locations.csv`.
///
/// The output is staged in a temporary file next to its destination and only moved into
/// place once every row has been written.
pub struct LocationEnricher<G = NominatimGeocoder> {
    geocoder: G,
    reprojector: Option<CoordinateReprojector>,
    output_dir: PathBuf,
    delay: Duration,
}

impl LocationEnricher<NominatimGeocoder> {
    /// Enricher using the configured Nominatim endpoint and projections.
    ///
    /// A projection that cannot be built is logged and leaves every projected row as
    /// "Unknown location" rather than failing.
    pub fn from_config(config: &EgmsConfig) -> Result<Self, EnrichError> {
        let geocoder = NominatimGeocoder::new(
            &config.geocoder_url,
            &config.user_agent,
            config.request_timeout(),
        )
        .map_err(EnrichError::GeocoderSetup)?;
        let reprojector =
            match CoordinateReprojector::from_proj_strings(&config.source_crs, &config.target_crs)
            {
                Ok(reprojector) => Some(reprojector),
                Err(e) => {
                    warn!("Could not initialize coordinate transformer: {}", e);
                    None
                }
            };
        Ok(Self::new(
            geocoder,
            reprojector,
            &config.output_dir,
            config.geocode_delay(),
        ))
    }
}

impl<G: ReverseGeocoder> LocationEnricher<G> {
    pub fn new(
        geocoder: G,
        reprojector: Option<CoordinateReprojector>,
        output_dir: impl Into<PathBuf>,
        delay: Duration,
    ) -> Self {
        Self {
            geocoder,
            reprojector,
            output_dir: output_dir.into(),
            delay,
        }
    }

    /// `<output_dir>/<input stem>_locations.csv`.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "points".to_string());
        self.output_dir.join(format!("{stem}{OUTPUT_SUFFIX}.csv"))
    }

    pub async fn enrich(&self, input: &Path) -> Result<EnrichReport, EnrichError> {
        self.enrich_with_cancel(input, None).await
    }

    /// Like [`LocationEnricher::enrich`], checking `cancel` before every row.
    ///
    /// A cancelled run leaves no output file.
    pub async fn enrich_with_cancel(
        &self,
        input: &Path,
        cancel: Option<&CancellationToken>,
    ) -> Result<EnrichReport, EnrichError> {
        if !input.is_file() {
            return Err(EnrichError::FileNotFound(input.to_path_buf()));
        }
        let csv_error = |source| EnrichError::Csv {
            path: input.to_path_buf(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(input)
            .map_err(csv_error)?;
        let header = reader.headers().map_err(csv_error)?.clone();
        let columns = CoordinateColumns::locate(&header)?;
        info!(
            "Found columns: easting={}, northing={}",
            &header[columns.easting], &header[columns.northing]
        );

        ensure_dir_exists(&self.output_dir)
            .map_err(|e| EnrichError::OutputDirCreation(self.output_dir.clone(), e))?;
        let output = self.output_path_for(input);
        let mut staged = NamedTempFile::new_in(&self.output_dir).map_err(|e| EnrichError::Io {
            path: output.clone(),
            source: e,
        })?;

        let mut report = EnrichReport {
            input: input.to_path_buf(),
            output: output.clone(),
            ..EnrichReport::default()
        };
        {
            let mut writer = WriterBuilder::new()
                .flexible(true)
                .from_writer(staged.as_file_mut());
            writer
                .write_record(with_location(
                    header.as_byte_record(),
                    columns.location_index(),
                    LOCATION_COLUMN,
                ))
                .map_err(csv_error)?;

            // Rows are copied as bytes; only the coordinate fields are decoded.
            let mut record = ByteRecord::new();
            while reader.read_byte_record(&mut record).map_err(csv_error)? {
                if cancel.is_some_and(CancellationToken::is_cancelled) {
                    warn!("Cancelled after {} rows of {}", report.rows, input.display());
                    return Err(EnrichError::Cancelled(input.to_path_buf()));
                }
                let location = self.locate_row(&record, &columns, &mut report).await;
                writer
                    .write_record(with_location(&record, columns.location_index(), &location))
                    .map_err(csv_error)?;
                report.rows += 1;
                if report.rows % PROGRESS_EVERY == 0 {
                    info!("Processed {} rows of {}", report.rows, input.display());
                }
            }
            writer.flush().map_err(|e| EnrichError::Io {
                path: output.clone(),
                source: e,
            })?;
        }

        staged
            .persist(&output)
            .map_err(|e| EnrichError::OutputPersist(output.clone(), e.error))?;
        info!(
            "Location dataset saved as: {} ({} rows, {} resolved, {} unknown, {} geocoding errors)",
            output.display(),
            report.rows,
            report.resolved,
            report.unknown,
            report.geocoding_errors
        );
        Ok(report)
    }

    async fn locate_row(
        &self,
        record: &ByteRecord,
        columns: &CoordinateColumns,
        report: &mut EnrichReport,
    ) -> String {
        let Some(point) = self.row_point(record, columns) else {
            report.unknown += 1;
            return UNKNOWN_LOCATION.to_string();
        };

        let location = match self.geocoder.reverse(point).await {
            Ok(place) => {
                let label = describe_place(place.as_ref());
                if label == UNKNOWN_LOCATION {
                    report.unknown += 1;
                } else {
                    report.resolved += 1;
                }
                label
            }
            Err(e) => {
                warn!(
                    "Error in geocoding ({}, {}): {}",
                    point.latitude(),
                    point.longitude(),
                    e
                );
                report.geocoding_errors += 1;
                GEOCODING_ERROR.to_string()
            }
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        location
    }

    /// Geographic coordinate of a row, or `None` when it cannot be determined.
    fn row_point(&self, record: &ByteRecord, columns: &CoordinateColumns) -> Option<LatLon> {
        let easting = parse_coordinate(record.get(columns.easting))?;
        let northing = parse_coordinate(record.get(columns.northing))?;
        let point = match columns.kind {
            CoordinateKind::Geographic => LatLon(northing, easting),
            CoordinateKind::Projected => {
                let reprojector = self.reprojector.as_ref()?;
                match reprojector.project(easting, northing) {
                    Ok(point) => point,
                    Err(e) => {
                        warn!("Error converting coordinates: {}", e);
                        return None;
                    }
                }
            }
        };
        point.is_valid().then_some(point)
    }
}

fn parse_coordinate(value: Option<&[u8]>) -> Option<f64> {
    let Ok(value) = std::str::from_utf8(value?) else {
        debug!("Coordinate is not valid UTF-8");
        return None;
    };
    let value = value.trim();
    match value.parse::<f64>() {
        Ok(number) => Some(number),
        Err(_) => {
            debug!("Unparseable coordinate '{}'", value);
            None
        }
    }
}

/// `record` with `value` inserted at `index`, or appended when the row is shorter.
fn with_location<'a>(record: &'a ByteRecord, index: usize, value: &'a str) -> Vec<&'a [u8]> {
    let mut fields: Vec<&[u8]> = record.iter().collect();
    fields.insert(index.min(fields.len()), value.as_bytes());
    fields
}

/// Tile CSVs (`EGMS_*.csv`) under `dir` and its subdirectories, sorted by path.
///
/// Enriched outputs (`*_locations.csv`) are skipped. A missing directory yields an empty
/// list.
pub fn find_tile_csvs(dir: &Path) -> Result<Vec<PathBuf>, EnrichError> {
    let mut found = Vec::new();
    if dir.is_dir() {
        let pattern = Pattern::new(TILE_CSV_PATTERN).map_err(|e| EnrichError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })?;
        collect_tile_csvs(dir, &pattern, &mut found)?;
    }
    found.sort();
    Ok(found)
}

fn collect_tile_csvs(
    dir: &Path,
    pattern: &Pattern,
    found: &mut Vec<PathBuf>,
) -> Result<(), EnrichError> {
    let io_error = |source| EnrichError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_tile_csvs(&path, pattern, found)?;
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if pattern.matches(name) && !name.ends_with(&format!("{OUTPUT_SUFFIX}.csv")) {
            found.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::error::GeocodeError;
    use crate::enrich::geocoder::{Address, Place};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    /// Answers "Bologna, Italia" for every point except the call numbers in `fail_calls`.
    #[derive(Default)]
    struct FakeGeocoder {
        points: Mutex<Vec<LatLon>>,
        called_at: Mutex<Vec<Instant>>,
        calls: AtomicUsize,
        fail_calls: Vec<usize>,
        nothing_found: bool,
    }

    #[async_trait]
    impl ReverseGeocoder for FakeGeocoder {
        async fn reverse(&self, point: LatLon) -> Result<Option<Place>, GeocodeError> {
            self.points.lock().unwrap().push(point);
            self.called_at.lock().unwrap().push(Instant::now());
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_calls.contains(&call) {
                return Err(GeocodeError::Status(503));
            }
            if self.nothing_found {
                return Ok(None);
            }
            Ok(Some(Place {
                display_name: Some("Piazza Maggiore, Bologna, Italia".into()),
                address: Address {
                    city: Some("Bologna".into()),
                    country: Some("Italia".into()),
                    ..Address::default()
                },
            }))
        }
    }

    fn enricher<G: ReverseGeocoder>(geocoder: G, output_dir: &Path) -> LocationEnricher<G> {
        LocationEnricher::new(
            geocoder,
            CoordinateReprojector::etrs89_laea_to_wgs84().ok(),
            output_dir,
            Duration::ZERO,
        )
    }

    fn read_csv(path: &Path) -> Vec<Vec<String>> {
        ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .unwrap()
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    fn write_input(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_inserts_location_after_northing() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "EGMS_L3_E32N31_100km_U_2019_2023_1.csv",
            "id,easting,northing,value\n1,4321000,3210000,0.5\n2,4421000,3210000,-1.2\n3,4321000,3310000,2.0\n",
        );
        let out_dir = dir.path().join("Point_locations");
        let enricher = enricher(FakeGeocoder::default(), &out_dir);

        let report = enricher.enrich(&input).await.unwrap();
        assert_eq!(
            report.output,
            out_dir.join("EGMS_L3_E32N31_100km_U_2019_2023_1_locations.csv")
        );
        assert_eq!(report.rows, 3);
        assert_eq!(report.resolved, 3);

        let rows = read_csv(&report.output);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec!["id", "easting", "northing", "location", "value"]);
        assert_eq!(rows[1], vec!["1", "4321000", "3210000", "Bologna, Italia", "0.5"]);
        assert_eq!(rows[3][0], "3");
        assert_eq!(rows[3][4], "2.0");

        let points = enricher.geocoder.points.lock().unwrap().clone();
        assert!((points[0].latitude() - 52.0).abs() < 1e-6);
        assert!((points[0].longitude() - 10.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_accepts_xy_and_geographic_headers() {
        let dir = tempfile::tempdir().unwrap();
        let xy = write_input(dir.path(), "xy.csv", "X,Y\n4321000,3210000\n");
        let geo = write_input(
            dir.path(),
            "geo.csv",
            "name,Longitude,Latitude\nbologna,11.3426,44.4949\n",
        );
        let enricher = enricher(FakeGeocoder::default(), dir.path());

        let report = enricher.enrich(&xy).await.unwrap();
        assert_eq!(read_csv(&report.output)[0], vec!["X", "Y", "location"]);

        let report = enricher.enrich(&geo).await.unwrap();
        let rows = read_csv(&report.output);
        assert_eq!(rows[0], vec!["name", "Longitude", "Latitude", "location"]);
        assert_eq!(rows[1][3], "Bologna, Italia");

        // Geographic columns are used as-is.
        let points = enricher.geocoder.points.lock().unwrap().clone();
        assert_eq!(points[1], LatLon(44.4949, 11.3426));
    }

    #[tokio::test]
    async fn test_missing_columns_write_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "bad.csv", "id,value\n1,2\n");
        let out_dir = dir.path().join("out");
        let enricher = enricher(FakeGeocoder::default(), &out_dir);

        let err = enricher.enrich(&input).await.unwrap_err();
        assert!(matches!(err, EnrichError::ColumnNotFound { .. }));
        assert!(!enricher.output_path_for(&input).exists());
        assert!(!out_dir.exists());
    }

    #[tokio::test]
    async fn test_geocoder_error_is_row_local() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "points.csv",
            "id,easting,northing\n1,4321000,3210000\n2,4321000,3210000\n3,4321000,3210000\n",
        );
        let geocoder = FakeGeocoder {
            fail_calls: vec![1],
            ..FakeGeocoder::default()
        };
        let enricher = enricher(geocoder, dir.path());

        let report = enricher.enrich(&input).await.unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.geocoding_errors, 1);
        assert_eq!(report.resolved, 2);
        let rows = read_csv(&report.output);
        assert_eq!(rows[1][3], "Bologna, Italia");
        assert_eq!(rows[2][3], GEOCODING_ERROR);
        assert_eq!(rows[3][3], "Bologna, Italia");
    }

    #[tokio::test]
    async fn test_unresolvable_rows_are_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "points.csv",
            "id,easting,northing\n1,not-a-number,3210000\n2,4321000,3210000\n3\n",
        );
        let geocoder = FakeGeocoder {
            nothing_found: true,
            ..FakeGeocoder::default()
        };
        let enricher = enricher(geocoder, dir.path());

        let report = enricher.enrich(&input).await.unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.unknown, 3);
        // Only the parseable row reached the geocoder.
        assert_eq!(enricher.geocoder.calls.load(Ordering::SeqCst), 1);

        let rows = read_csv(&report.output);
        assert_eq!(rows[1][3], UNKNOWN_LOCATION);
        assert_eq!(rows[2][3], UNKNOWN_LOCATION);
        assert_eq!(rows[3], vec!["3", UNKNOWN_LOCATION]);
    }

    #[tokio::test]
    async fn test_without_reprojector_rows_are_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "points.csv", "easting,northing\n4321000,3210000\n");
        let enricher = LocationEnricher::new(
            FakeGeocoder::default(),
            None,
            dir.path(),
            Duration::ZERO,
        );

        let report = enricher.enrich(&input).await.unwrap();
        assert_eq!(report.unknown, 1);
        assert_eq!(read_csv(&report.output)[1][2], UNKNOWN_LOCATION);
        assert_eq!(enricher.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_geocode_delay_follows_every_geocoder_call() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "points.csv",
            "id,easting,northing\n1,4321000,3210000\n2,4321000,3210000\n3,4321000,3210000\n4,bad,3210000\n5\n",
        );
        let delay = Duration::from_millis(50);
        let geocoder = FakeGeocoder {
            fail_calls: vec![0],
            ..FakeGeocoder::default()
        };
        let enricher = LocationEnricher::new(
            geocoder,
            CoordinateReprojector::etrs89_laea_to_wgs84().ok(),
            dir.path(),
            delay,
        );

        let started = Instant::now();
        let report = enricher.enrich(&input).await.unwrap();
        let elapsed = started.elapsed();
        assert_eq!(report.rows, 5);
        assert_eq!(report.geocoding_errors, 1);

        // One wait per geocoder call, including the failed first one.
        let called_at = enricher.geocoder.called_at.lock().unwrap().clone();
        assert_eq!(called_at.len(), 3);
        for pair in called_at.windows(2) {
            assert!(pair[1] - pair[0] >= delay);
        }
        assert!(elapsed >= delay * 3);
        // Rows that never reach the geocoder are not delayed.
        assert!(elapsed < delay * 5);
    }

    #[tokio::test]
    async fn test_non_utf8_field_keeps_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("points.csv");
        std::fs::write(
            &input,
            b"id,easting,northing,name\n1,4321000,3210000,caf\xe9\n2,43210\xff0,3210000,ok\n3,4321000,3210000,ok\n",
        )
        .unwrap();
        let enricher = enricher(FakeGeocoder::default(), dir.path());

        let report = enricher.enrich(&input).await.unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.resolved, 2);
        assert_eq!(report.unknown, 1);

        let rows: Vec<ByteRecord> = ReaderBuilder::new()
            .flexible(true)
            .from_path(&report.output)
            .unwrap()
            .byte_records()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][3], b"Bologna, Italia");
        assert_eq!(&rows[0][4], b"caf\xe9");
        assert_eq!(&rows[1][3], UNKNOWN_LOCATION.as_bytes());
        assert_eq!(&rows[2][3], b"Bologna, Italia");
    }

    #[test]
    fn test_find_tile_csvs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("EGMS_L3_E32N31");
        std::fs::create_dir(&nested).unwrap();
        for path in [
            dir.path().join("EGMS_L2a_050_0715_IW1_VV_2018_2022_1.csv"),
            dir.path().join("EGMS_L2a_050_0715_IW1_VV_2018_2022_1_locations.csv"),
            dir.path().join("EGMS_L3_E32-33_N31-31_2019_2023_batch.zip"),
            dir.path().join("notes.csv"),
            nested.join("EGMS_L3_E32N31_100km_U_2019_2023_1.csv"),
        ] {
            std::fs::write(path, "x,y\n").unwrap();
        }

        let found = find_tile_csvs(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![
                dir.path().join("EGMS_L2a_050_0715_IW1_VV_2018_2022_1.csv"),
                nested.join("EGMS_L3_E32N31_100km_U_2019_2023_1.csv"),
            ]
        );
        assert!(find_tile_csvs(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let enricher = enricher(FakeGeocoder::default(), dir.path());
        let err = enricher
            .enrich(&dir.path().join("nope.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancelled_run_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "points.csv", "x,y\n1,2\n3,4\n");
        let out_dir = dir.path().join("out");
        let enricher = enricher(FakeGeocoder::default(), &out_dir);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = enricher
            .enrich_with_cancel(&input, Some(&cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::Cancelled(_)));
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 0);
    }
}
