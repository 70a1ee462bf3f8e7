//! Trace file creation
//!
//! One file per traced process, created in the working directory with
//! exclusive-create semantics so two runs can never write into the same file.

use std::fs::OpenOptions;
use std::io::Write;
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use wimps_common::{TRACE_HEADER_V1, TRACE_MARKER_V1};

use crate::errors::SamplerError;

/// Owner read/write only
const TRACE_FILE_MODE: u32 = 0o600;

/// Build the trace file name for a process.
///
/// Format: `_wimps_trace_v1_pid<PID>_time<EPOCH_SECONDS>_<EXE_BASENAME>_`
#[must_use]
pub fn trace_file_name(pid: u32, epoch_seconds: u64, exe_basename: &str) -> String {
    format!("{TRACE_MARKER_V1}_pid{pid}_time{epoch_seconds}_{exe_basename}_")
}

/// Trace file name for the current process
#[must_use]
pub fn current_trace_file_name() -> String {
    let epoch_seconds =
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let exe = std::env::current_exe().ok();
    let basename = exe
        .as_deref()
        .and_then(Path::file_name)
        .map_or_else(|| "unknown".into(), |name| name.to_string_lossy());
    trace_file_name(std::process::id(), epoch_seconds, &basename)
}

/// Create `path` exclusively, write the version header, and hand back the
/// descriptor for the sampler to append records to.
///
/// # Errors
/// [`SamplerError::CreateTraceFile`] if the file exists or cannot be created,
/// [`SamplerError::WriteHeader`] if the header cannot be written.
pub fn create_trace_file(path: &Path) -> Result<OwnedFd, SamplerError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(TRACE_FILE_MODE)
        .open(path)
        .map_err(|source| SamplerError::CreateTraceFile { path: path.to_path_buf(), source })?;

    file.write_all(TRACE_HEADER_V1)
        .map_err(|source| SamplerError::WriteHeader { path: path.to_path_buf(), source })?;

    Ok(file.into())
}

/// Create this process's trace file in the current working directory.
///
/// # Errors
/// See [`create_trace_file`].
pub fn create_for_current_process() -> Result<(PathBuf, OwnedFd), SamplerError> {
    let path = PathBuf::from(current_trace_file_name());
    let fd = create_trace_file(&path)?;
    Ok((path, fd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_trace_file_name_format() {
        assert_eq!(
            trace_file_name(4242, 1_700_000_000, "my-app"),
            "_wimps_trace_v1_pid4242_time1700000000_my-app_"
        );
    }

    #[test]
    fn test_current_name_embeds_pid() {
        let name = current_trace_file_name();
        assert!(name.starts_with(&format!("_wimps_trace_v1_pid{}_time", std::process::id())));
        assert!(name.ends_with('_'));
    }

    #[test]
    fn test_create_writes_header_with_owner_only_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(trace_file_name(1, 2, "t"));

        drop(create_trace_file(&path).unwrap());

        assert_eq!(std::fs::read(&path).unwrap(), TRACE_HEADER_V1);
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777 & !TRACE_FILE_MODE, 0);
    }

    #[test]
    fn test_create_never_clobbers_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(trace_file_name(1, 2, "t"));
        std::fs::write(&path, b"someone else's trace").unwrap();

        let err = create_trace_file(&path).unwrap_err();

        assert!(matches!(err, SamplerError::CreateTraceFile { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"someone else's trace");
    }
}
