//! Storage backend for the container files.

use anyhow::{Context, Result};
use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::codec::EncodedContainer;

/// File name of the private half inside the container directory.
pub const PRIVATE_FILE: &str = "pdp.pri";
/// File name of the public half inside the container directory.
pub const PUBLIC_FILE: &str = "pdp.pub";

/// A single file persisted with atomic replacement.
///
/// On Unix new files are created readable by the owner only and missing
/// parent directories are created with mode `0700`.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance with the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns `true` if the storage file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the entire storage file into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(&self) -> Result<Vec<u8>> {
        debug!(path = %self.path.display(), "loading file");
        fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Saves data to the storage file using atomic write.
    ///
    /// This method ensures crash-safety by:
    /// 1. Writing data to a temporary file with random name
    /// 2. Syncing the temporary file to disk
    /// 3. Atomically replacing the old file with the new one
    /// 4. Syncing the parent directory to ensure the rename is persisted
    ///
    /// If a crash occurs during save, either the old or new file will be present,
    /// never a corrupted partial write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_private_dir(parent)?;
        }

        let tmp_path = self.random_tmp_path()?;

        // securely create temp file (fail if exists)
        let mut tmp_file = private_file_options()
            .open(&tmp_path)
            .context("failed to create temporary file")?;

        let written = tmp_file.write_all(data).and_then(|()| tmp_file.sync_all());
        drop(tmp_file);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).context("failed to write temporary file");
        }

        //atomic replace
        if let Err(e) = self.atomic_replace(&tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        // fsync directory
        if let Some(parent) = self.path.parent() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }

        debug!(path = %self.path.display(), bytes = data.len(), "file saved");
        Ok(())
    }

    /// Deletes the file. A file that does not exist is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to remove {}", self.path.display()))
            }
        }
    }

    /// Returns the path to the storage file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Generates a unique temporary file path in the same directory.
    ///
    /// Uses cryptographically secure random bytes to avoid name collisions.
    /// Format: `filename.tmp.<randomhex>`
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8]; // 64 bit entropy
        fill(&mut buf)?;

        let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

        let file_name = self
            .path
            .file_name()
            .context("storage path has no file name")?
            .to_string_lossy();

        let tmp_name = format!("{}.tmp.{}", file_name, rand_string);

        Ok(self.path.with_file_name(tmp_name))
    }

    /// Atomically replaces the target file with the temporary file.
    ///
    /// Uses Windows `ReplaceFileW` API with `REPLACEFILE_WRITE_THROUGH` flag
    /// to ensure the operation is truly atomic and persisted to disk.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        // ReplaceFileW needs an existing target
        if !self.path.exists() {
            fs::rename(tmp_path, &self.path)?;
            return Ok(());
        }

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY:
        // - Strings are valid UTF-16 and null-terminated
        // - Pointers remain valid during the call
        // - Windows does not retain the pointers after return
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).context("atomic replace failed");
        }

        Ok(())
    }

    /// Atomically replaces the target file with the temporary file.
    ///
    /// On Unix, `rename()` is atomic when both paths are on the same filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn private_file_options() -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options.write(true).create_new(true).mode(0o600);
    options
}

#[cfg(not(unix))]
fn private_file_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    options
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .with_context(|| format!("failed to create {}", dir.display()))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}

/// Which halves of a container are present on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Complete,
    Missing,
    PrivateOnly,
    PublicOnly,
}

/// The private and public container files of one key pair.
#[derive(Debug, Clone)]
pub struct Container {
    dir: PathBuf,
    private: Storage,
    public: Storage,
}

impl Container {
    /// Container using the fixed file names inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            private: Storage::new(dir.join(PRIVATE_FILE)),
            public: Storage::new(dir.join(PUBLIC_FILE)),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn private_path(&self) -> &Path {
        self.private.path()
    }

    pub fn public_path(&self) -> &Path {
        self.public.path()
    }

    pub fn state(&self) -> ContainerState {
        let state = match (self.private.exists(), self.public.exists()) {
            (true, true) => ContainerState::Complete,
            (false, false) => ContainerState::Missing,
            (true, false) => ContainerState::PrivateOnly,
            (false, true) => ContainerState::PublicOnly,
        };
        debug!(dir = %self.dir.display(), ?state, "container state");
        state
    }

    pub fn load_private(&self) -> Result<Vec<u8>> {
        self.private.load()
    }

    pub fn load_public(&self) -> Result<Vec<u8>> {
        self.public.load()
    }

    /// Writes the private file, then the public one.
    ///
    /// If either write fails both files are removed, so a failed save never
    /// leaves half a container behind. A container that existed before is
    /// lost in that case too.
    pub fn save(&self, encoded: &EncodedContainer) -> Result<()> {
        let written = self
            .private
            .save(&encoded.private)
            .and_then(|()| self.public.save(&encoded.public));

        if let Err(e) = written {
            warn!(dir = %self.dir.display(), "container write failed, removing partial files");
            let _ = self.private.remove();
            let _ = self.public.remove();
            return Err(e.context("failed to write key container"));
        }
        Ok(())
    }

    /// Removes both files.
    pub fn remove(&self) -> Result<()> {
        self.private.remove()?;
        self.public.remove()
    }
}
