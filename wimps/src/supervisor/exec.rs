//! Everything the child needs for `execve`, built before `fork`
//!
//! After `fork` the child may only make async-signal-safe calls, so the
//! resolved program path, argv and envp (including the injected
//! `LD_PRELOAD`) are materialized here as C strings and null-terminated
//! pointer arrays.

use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use libc::c_char;
use wimps_common::{PRELOAD_ENV_VAR, PRELOAD_LIBRARY};

use crate::domain::SupervisorError;

/// Resolve a command name the way a shell would.
///
/// Names containing a `/` are used as given; anything else is searched for in
/// `PATH`. The exec that follows uses an explicit environment, so the lookup
/// cannot be left to `execvp`.
///
/// # Errors
/// [`SupervisorError::CommandNotFound`] if no executable regular file matches.
pub fn resolve_executable(name: &str) -> Result<PathBuf, SupervisorError> {
    resolve_in(name, std::env::var_os("PATH").as_deref())
}

fn resolve_in(name: &str, path_var: Option<&OsStr>) -> Result<PathBuf, SupervisorError> {
    if name.is_empty() {
        return Err(SupervisorError::CommandNotFound(name.to_string()));
    }

    if name.contains('/') {
        let path = Path::new(name);
        return if is_executable_file(path) {
            Ok(path.to_path_buf())
        } else {
            Err(SupervisorError::CommandNotFound(name.to_string()))
        };
    }

    path_var
        .into_iter()
        .flat_map(std::env::split_paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable_file(candidate))
        .ok_or_else(|| SupervisorError::CommandNotFound(name.to_string()))
}

fn is_executable_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Sampler library location: `path` if given (made absolute), otherwise
/// [`PRELOAD_LIBRARY`] in the current working directory.
///
/// # Errors
/// [`SupervisorError::WorkingDirectory`] if the working directory is needed
/// and cannot be resolved.
pub fn preload_path(path: Option<&Path>) -> Result<PathBuf, SupervisorError> {
    match path {
        Some(path) if path.is_absolute() => Ok(path.to_path_buf()),
        Some(path) => Ok(current_dir()?.join(path)),
        None => Ok(current_dir()?.join(PRELOAD_LIBRARY)),
    }
}

fn current_dir() -> Result<PathBuf, SupervisorError> {
    std::env::current_dir().map_err(SupervisorError::WorkingDirectory)
}

fn c_string(bytes: Vec<u8>) -> Result<CString, SupervisorError> {
    CString::new(bytes).map_err(|err| {
        SupervisorError::InvalidArgument(String::from_utf8_lossy(&err.into_vec()).into_owned())
    })
}

/// A null-terminated `envp` array with the sampler injected
pub struct ExecEnv {
    // Owns the storage `ptrs` points into
    vars: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl ExecEnv {
    /// Copy `inherited` and append `LD_PRELOAD=<preload>`.
    ///
    /// The dynamic loader only honours the last `LD_PRELOAD`, so an inherited
    /// non-empty value is merged in front of ours (`<inherited>:<preload>`)
    /// rather than shadowed. The pointer array holds exactly `inherited + 1`
    /// entries plus the terminating null.
    ///
    /// # Errors
    /// [`SupervisorError::EnvironmentAlloc`] if the arrays cannot be
    /// allocated, [`SupervisorError::InvalidArgument`] for a NUL byte.
    pub fn with_preload<I>(inherited: I, preload: &Path) -> Result<Self, SupervisorError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let inherited: Vec<(OsString, OsString)> = inherited.into_iter().collect();
        let preload_value = merged_preload(&inherited, preload);
        let count = inherited.len() + 1;
        let slots = count + 1;

        let mut vars = Vec::new();
        vars.try_reserve_exact(count).map_err(|_| SupervisorError::EnvironmentAlloc { slots })?;
        let mut ptrs = Vec::new();
        ptrs.try_reserve_exact(slots).map_err(|_| SupervisorError::EnvironmentAlloc { slots })?;

        for (key, value) in inherited {
            vars.push(c_string(assignment(key.as_bytes(), value.as_bytes()))?);
        }
        vars.push(c_string(assignment(PRELOAD_ENV_VAR.as_bytes(), &preload_value))?);

        ptrs.extend(vars.iter().map(|var| var.as_ptr()));
        ptrs.push(std::ptr::null());

        Ok(Self { vars, ptrs })
    }

    /// Variables including the injected one, excluding the terminator
    #[must_use]
    pub fn vars(&self) -> &[CString] {
        &self.vars
    }

    /// Pointer array handed to `execve`, terminator included
    #[must_use]
    pub fn pointers(&self) -> &[*const c_char] {
        &self.ptrs
    }
}

/// `LD_PRELOAD` value for the child: the last inherited non-empty value,
/// if any, followed by the sampler.
fn merged_preload(inherited: &[(OsString, OsString)], preload: &Path) -> Vec<u8> {
    let existing = inherited
        .iter()
        .rev()
        .find(|(key, _)| key.as_bytes() == PRELOAD_ENV_VAR.as_bytes())
        .map(|(_, value)| value.as_bytes())
        .filter(|value| !value.is_empty());

    let preload = preload.as_os_str().as_bytes();
    match existing {
        Some(existing) => [existing, b":", preload].concat(),
        None => preload.to_vec(),
    }
}

fn assignment(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut entry = Vec::with_capacity(key.len() + 1 + value.len());
    entry.extend_from_slice(key);
    entry.push(b'=');
    entry.extend_from_slice(value);
    entry
}

/// A fully prepared `execve` call
pub struct PreparedExec {
    program: PathBuf,
    path: CString,
    // Owns the storage `argv` points into
    _args: Vec<CString>,
    argv: Vec<*const c_char>,
    env: ExecEnv,
}

impl PreparedExec {
    /// Resolve `command[0]` and build argv and envp for it, injecting
    /// `preload` into the current process environment.
    ///
    /// # Errors
    /// [`SupervisorError::NoCommand`] for an empty command, plus anything
    /// from [`resolve_executable`] and [`ExecEnv::with_preload`].
    pub fn new(command: &[String], preload: &Path) -> Result<Self, SupervisorError> {
        let (name, _) = command.split_first().ok_or(SupervisorError::NoCommand)?;
        let program = resolve_executable(name)?;
        let path = c_string(program.clone().into_os_string().into_vec())?;

        let args = command
            .iter()
            .map(|arg| c_string(arg.clone().into_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut argv: Vec<*const c_char> = args.iter().map(|arg| arg.as_ptr()).collect();
        argv.push(std::ptr::null());

        let env = ExecEnv::with_preload(std::env::vars_os(), preload)?;

        Ok(Self { program, path, _args: args, argv, env })
    }

    /// Resolved program path
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub(super) fn path_ptr(&self) -> *const c_char {
        self.path.as_ptr()
    }

    pub(super) fn argv_ptr(&self) -> *const *const c_char {
        self.argv.as_ptr()
    }

    pub(super) fn envp_ptr(&self) -> *const *const c_char {
        self.env.pointers().as_ptr()
    }

    #[must_use]
    pub fn env(&self) -> &ExecEnv {
        &self.env
    }
}
