//! File I/O operations for encryption and decryption.

use std::ffi::OsStr;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::engine::{self, Disguise, SourceFile};
use crate::types::{CloakError, CryptOptions, KEY_LEN, Secret};

/// Atomically write data to a file using a temporary file.
///
/// This function ensures atomic writes by creating a temporary file in the same
/// directory as the target, writing data to it, and then atomically renaming
/// it to the target path.
///
/// # Arguments
///
/// * `path` - Target file path
/// * `data` - Data to write
/// * `mode_600` - Whether to set file permissions to 0o600 (Unix only)
///
/// # Errors
///
/// Returns `CloakError::Io` for I/O failures or `CloakError::Validation` for invalid paths.
pub fn write_all_atomic(path: &Path, data: &[u8], mode_600: bool) -> Result<(), CloakError> {
    write_atomic(path, data, mode_600, true)
}

/// Like [`write_all_atomic`], but with `clobber` off an existing target is left alone
/// and the call fails with an `AlreadyExists` I/O error, even if it appeared after
/// any earlier existence check.
fn write_atomic(
    path: &Path,
    data: &[u8],
    mode_600: bool,
    clobber: bool,
) -> Result<(), CloakError> {
    let parent = path
        .parent()
        .ok_or(CloakError::Validation("output path has no parent"))?;
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    if mode_600 {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }
    }
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    let persisted = if clobber {
        tmp.persist(path)
    } else {
        tmp.persist_noclobber(path)
    };
    persisted.map_err(|e| CloakError::Io(e.error))?;
    Ok(())
}

fn already_exists(err: CloakError, msg: &'static str) -> CloakError {
    match err {
        CloakError::Io(e) if e.kind() == ErrorKind::AlreadyExists => CloakError::Validation(msg),
        other => other,
    }
}

/// Read a whole file after checking its size from metadata.
fn read_bounded(path: &Path, max: usize) -> Result<Vec<u8>, CloakError> {
    let len = fs::metadata(path)?.len();
    if usize::try_from(len).map_or(true, |len| len > max) {
        return Err(CloakError::Validation("file is too large"));
    }
    Ok(fs::read(path)?)
}

fn file_name_of(path: &Path) -> Result<&str, CloakError> {
    path.file_name()
        .and_then(OsStr::to_str)
        .ok_or(CloakError::Validation("file name must be valid UTF-8"))
}

/// Reduce a name recovered from a container to a single path component.
fn plain_file_name(name: &str) -> Result<&str, CloakError> {
    Path::new(name)
        .file_name()
        .and_then(OsStr::to_str)
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .ok_or(CloakError::Validation("unable to derive an output file name"))
}

const OUTPUT_EXISTS: &str = "output exists; enable force to overwrite";

fn resolve_output(
    input: &Path,
    output: Option<&Path>,
    suggested: &str,
    force: bool,
) -> Result<PathBuf, CloakError> {
    let out = match output {
        Some(p) => p.to_path_buf(),
        None => input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(suggested),
    };
    if out.exists() && !force {
        return Err(CloakError::Validation(OUTPUT_EXISTS));
    }
    Ok(out)
}

/// Encrypt the file at `input`, optionally hidden behind the file at `disguise`.
///
/// Without `output`, the container is written next to the input under the suggested
/// name (the disguise's name, or the input name with the container extension).
/// Returns the path written.
///
/// # Errors
///
/// Everything [`crate::encrypt`] returns, `CloakError::Validation` when the output
/// exists and `opts.force` is off, and `CloakError::Io` for file system failures.
pub fn encrypt_file(
    input: &Path,
    secret: &Secret,
    disguise: Option<&Path>,
    output: Option<&Path>,
    opts: &CryptOptions,
) -> Result<PathBuf, CloakError> {
    let max = opts.limits.max_total_size;
    let data = read_bounded(input, max)?;
    let cover = disguise.map(|p| read_bounded(p, max)).transpose()?;

    let file = SourceFile {
        name: file_name_of(input)?,
        data: &data,
    };
    let cover = match (disguise, &cover) {
        (Some(path), Some(bytes)) => Some(Disguise {
            name: file_name_of(path)?,
            data: bytes,
        }),
        _ => None,
    };

    let sealed = engine::encrypt(&file, secret, cover.as_ref(), opts)?;
    let out = resolve_output(input, output, &sealed.file_name, opts.force)?;
    write_atomic(&out, &sealed.data, false, opts.force)
        .map_err(|e| already_exists(e, OUTPUT_EXISTS))?;
    debug!(path = %out.display(), "container written");
    Ok(out)
}

/// Decrypt the container at `input`.
///
/// Without `output`, the plaintext is written next to the container under its
/// original name (see [`crate::Decrypted::file_name`]). Only the last component of
/// that name is used, so an embedded name never leaves the container's directory.
/// Returns the path written.
pub fn decrypt_file(
    input: &Path,
    secret: &Secret,
    output: Option<&Path>,
    opts: &CryptOptions,
) -> Result<PathBuf, CloakError> {
    let data = read_bounded(input, opts.limits.max_container_size())?;
    let opened = engine::decrypt(&data, secret, opts)?;
    let name = opened.file_name(file_name_of(input)?);
    let out = resolve_output(input, output, plain_file_name(&name)?, opts.force)?;
    write_atomic(&out, &opened.data, true, opts.force)
        .map_err(|e| already_exists(e, OUTPUT_EXISTS))?;
    debug!(path = %out.display(), "plaintext written");
    Ok(out)
}

/// Load a raw key written by [`save_key_file`].
pub fn load_key_file(path: &Path) -> Result<Secret, CloakError> {
    let bytes = read_bounded(path, KEY_LEN)?;
    if bytes.len() != KEY_LEN {
        return Err(CloakError::Validation("key file must hold exactly 64 bytes"));
    }
    Ok(Secret::raw_key(bytes))
}

/// Save a raw key (0600 perms on Unix). Existing files are never overwritten.
pub fn save_key_file(path: &Path, secret: &Secret) -> Result<(), CloakError> {
    let Secret::RawKey(key) = secret else {
        return Err(CloakError::Validation("only raw keys can be saved"));
    };
    if key.expose_secret().len() != KEY_LEN {
        return Err(CloakError::Validation("raw key must be exactly 64 bytes"));
    }
    if path.exists() {
        return Err(CloakError::Validation(KEY_EXISTS));
    }
    write_atomic(path, key.expose_secret(), true, false)
        .map_err(|e| already_exists(e, KEY_EXISTS))
}

const KEY_EXISTS: &str = "key file already exists";
