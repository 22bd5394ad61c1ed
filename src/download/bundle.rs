use crate::download::error::DownloadError;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Packs extracted tile CSVs into one deflated zip at `target`.
///
/// Entries are named after each file's base name, in the order given. The archive is
/// staged beside `target` and only renamed into place once complete.
pub fn write_bundle(files: &[PathBuf], target: &Path) -> Result<PathBuf, DownloadError> {
    let bundle_io = |source| DownloadError::BundleIo {
        path: target.to_path_buf(),
        source,
    };
    let bundle_zip = |source| DownloadError::Bundle {
        path: target.to_path_buf(),
        source,
    };

    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let staged = NamedTempFile::new_in(parent).map_err(bundle_io)?;
    let mut writer = ZipWriter::new(staged);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DownloadError::UnsafeEntryName(file.display().to_string()))?;
        writer.start_file(name, options).map_err(bundle_zip)?;
        let mut source = File::open(file).map_err(|e| DownloadError::BundleIo {
            path: file.clone(),
            source: e,
        })?;
        std::io::copy(&mut source, &mut writer).map_err(bundle_io)?;
    }

    let staged = writer.finish().map_err(bundle_zip)?;
    staged
        .persist(target)
        .map_err(|e| bundle_io(e.error))?;
    info!("Bundled {} file(s) into {}", files.len(), target.display());
    Ok(target.to_path_buf())
}

/// [`write_bundle`] on the blocking thread pool.
pub async fn write_bundle_owned(
    files: Vec<PathBuf>,
    target: PathBuf,
) -> Result<PathBuf, DownloadError> {
    task::spawn_blocking(move || write_bundle(&files, &target)).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    #[test]
    fn test_bundles_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("EGMS_L3_E33N27_100km_E_2019_2023_1.csv");
        let second = dir.path().join("EGMS_L3_E33N27_100km_U_2019_2023_1.csv");
        std::fs::write(&first, "pid,easting,northing\n1,2,3\n").unwrap();
        std::fs::write(&second, "pid,easting,northing\n4,5,6\n").unwrap();
        let target = dir.path().join("EGMS_L3_E33-33_N27-27_2019_2023_batch.zip");

        let path = write_bundle(&[first, second], &target).unwrap();
        assert_eq!(path, target);

        let bytes = std::fs::read(&target).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(
            archive.by_index(0).unwrap().name(),
            "EGMS_L3_E33N27_100km_E_2019_2023_1.csv"
        );
        let mut contents = String::new();
        archive
            .by_index(1)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "pid,easting,northing\n4,5,6\n");
    }

    #[test]
    fn test_missing_member_leaves_no_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("batch.zip");
        let err = write_bundle(&[dir.path().join("gone.csv")], &target).unwrap_err();
        assert!(matches!(err, DownloadError::BundleIo { .. }));
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
