//! Run configuration
//!
//! Library locations resolve with a fixed priority, the same way a classpath
//! does: an explicit value wins, then the environment, then nothing.

use std::env;
use std::path::PathBuf;

use crate::codegen::defs::major_versions;

/// Environment variable naming the runtime image (directory or archive)
pub const RUNTIME_ENV: &str = "CLASSFORGE_RUNTIME";
/// Environment variable naming the standard-library archive
pub const STDLIB_ENV: &str = "CLASSFORGE_STDLIB";
/// Environment variable naming the third-party archive directory
pub const LIBS_ENV: &str = "CLASSFORGE_LIBS";

#[derive(Debug, Clone)]
pub struct Config {
    /// Class-file major version written into every emitted class
    pub major_version: u16,
    pub minor_version: u16,
    /// Emit StackMapTable attributes for method bodies
    pub emit_frames: bool,
    /// Emit the SourceFile attribute
    pub emit_source_file: bool,
    /// Drop warnings instead of logging and recording them
    pub suppress_warnings: bool,
    pub runtime_image: Option<PathBuf>,
    pub stdlib_archive: Option<PathBuf>,
    pub third_party_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            major_version: major_versions::JAVA_11,
            minor_version: 0,
            emit_frames: true,
            emit_source_file: true,
            suppress_warnings: false,
            runtime_image: None,
            stdlib_archive: None,
            third_party_dir: None,
        }
    }
}

impl Config {
    /// Default configuration with library locations taken from the environment
    pub fn from_env() -> Self {
        Self::default().with_library_paths(None, None, None)
    }

    /// Fill library locations, preferring the explicit values over the environment
    pub fn with_library_paths(
        mut self,
        runtime: Option<PathBuf>,
        stdlib: Option<PathBuf>,
        libs: Option<PathBuf>,
    ) -> Self {
        self.runtime_image = resolve_path(runtime, RUNTIME_ENV);
        self.stdlib_archive = resolve_path(stdlib, STDLIB_ENV);
        self.third_party_dir = resolve_path(libs, LIBS_ENV);
        self
    }

    pub fn with_runtime_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_image = Some(path.into());
        self
    }

    pub fn with_stdlib_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdlib_archive = Some(path.into());
        self
    }

    pub fn with_third_party_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.third_party_dir = Some(path.into());
        self
    }

    pub fn with_major_version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    /// Nest attributes exist only from class-file version 55 on
    pub fn supports_nestmates(&self) -> bool {
        self.major_version >= major_versions::JAVA_11
    }
}

pub(crate) fn resolve_path(explicit: Option<PathBuf>, var: &str) -> Option<PathBuf> {
    if let Some(path) = explicit {
        log::debug!("using explicit {} location: {}", var, path.display());
        return Some(path);
    }
    match env::var(var) {
        Ok(value) if !value.is_empty() => {
            log::debug!("using {} from environment: {}", var, value);
            Some(PathBuf::from(value))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_beats_environment() {
        let var = "CLASSFORGE_TEST_EXPLICIT";
        env::set_var(var, "/env/path");
        let resolved = resolve_path(Some(PathBuf::from("/cli/path")), var);
        assert_eq!(resolved, Some(PathBuf::from("/cli/path")));
        env::remove_var(var);
    }

    #[test]
    fn environment_used_when_no_explicit_path() {
        let var = "CLASSFORGE_TEST_ENV_ONLY";
        env::set_var(var, "/env/only");
        assert_eq!(resolve_path(None, var), Some(PathBuf::from("/env/only")));
        env::remove_var(var);
    }

    #[test]
    fn empty_environment_value_is_ignored() {
        let var = "CLASSFORGE_TEST_EMPTY";
        env::set_var(var, "");
        assert_eq!(resolve_path(None, var), None);
        env::remove_var(var);
    }

    #[test]
    fn defaults_target_version_55_with_frames() {
        let config = Config::default();
        assert_eq!(config.major_version, 55);
        assert!(config.emit_frames);
        assert!(config.supports_nestmates());
        assert!(!config.with_major_version(52).supports_nestmates());
    }
}
