//! Single-entry ZIP archive of the raw payload

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Entries at or above this size need ZIP64 extensions
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Compress `src` into `{output_base}.zip` and return the archive path.
///
/// The entry is named after the file's base name. The archive is written to a
/// `.tmp` sibling first and renamed on success, so an existing archive is only
/// replaced by a complete one.
pub fn compress_file(src: &Path, output_base: &Path) -> io::Result<PathBuf> {
    let final_path = with_suffix(output_base, "zip");
    let tmp_path = with_suffix(output_base, "zip.tmp");

    let entry_name = src
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no usable file name in {}", src.display()),
            )
        })?
        .to_string();

    let result = write_archive(src, &entry_name, &tmp_path);
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, &final_path)?;
    Ok(final_path)
}

fn write_archive(src: &Path, entry_name: &str, tmp_path: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let size = input.metadata()?.len();

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(size >= ZIP64_THRESHOLD);

    let mut zip = ZipWriter::new(BufWriter::new(File::create(tmp_path)?));
    zip.start_file(entry_name, options)
        .map_err(io::Error::other)?;
    io::copy(&mut input, &mut zip)?;

    let mut out = zip.finish().map_err(io::Error::other)?;
    io::Write::flush(&mut out)?;
    out.get_ref().sync_all()
}

/// `base` + `.ext`, keeping any dots already in the base name
pub(crate) fn with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}
