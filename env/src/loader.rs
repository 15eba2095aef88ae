//! Environment loaders.
//!
//! [`EnvLoader`] merges dotenv files and the process environment into a single
//! lookup table. Precedence, lowest to highest:
//!
//! 1. files, in the order they were registered (a later file overrides an
//!    earlier one)
//! 2. the process environment, unless disabled with
//!    [`use_env(false)`](EnvLoader::use_env)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{EnvError, Result};

/// A name → value table consulted by the parser engine.
pub trait EnvSource {
    /// (Re)populates the table. Called once per parser run.
    ///
    /// # Errors
    ///
    /// Returns an [`EnvError`] when a required source cannot be read.
    fn load_all(&mut self) -> Result<()>;

    /// Looks up a single variable in the loaded table.
    fn lookup(&self, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone)]
struct EnvFile {
    path: PathBuf,
    required: bool,
}

/// Loads variables from the process environment and dotenv-style files.
///
/// Files are parsed with [`dotenvy`] without touching the process
/// environment, so loading never has global side effects.
///
/// # Examples
///
/// ```no_run
/// use optbind_env::{EnvLoader, EnvSource};
///
/// let mut loader = EnvLoader::new();
/// loader.use_file(".env").unwrap();
/// loader.load_all().unwrap();
/// println!("{:?}", loader.lookup("DATABASE_URL"));
/// ```
#[derive(Debug, Clone)]
pub struct EnvLoader {
    use_env: bool,
    files: Vec<EnvFile>,
    values: HashMap<String, String>,
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvLoader {
    /// Creates a loader that reads the process environment and no files.
    pub fn new() -> Self {
        Self {
            use_env: true,
            files: Vec::new(),
            values: HashMap::new(),
        }
    }

    /// Enables or disables reading the process environment.
    pub fn use_env(&mut self, enabled: bool) {
        self.use_env = enabled;
    }

    /// Registers a file that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::FileNotFound`] if `path` does not exist right now.
    /// The file is read again by every [`load_all`](EnvSource::load_all), which
    /// fails the same way if the file disappears in between.
    pub fn use_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(EnvError::FileNotFound(path.to_path_buf()));
        }
        self.files.push(EnvFile {
            path: path.to_path_buf(),
            required: true,
        });
        Ok(())
    }

    /// Registers optional files. Missing files are skipped at load time.
    pub fn use_files<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.files.extend(paths.into_iter().map(|p| EnvFile {
            path: p.as_ref().to_path_buf(),
            required: false,
        }));
    }

    /// Returns the registered file paths in load order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }

    fn load_file(&mut self, file: &EnvFile) -> Result<()> {
        if !file.path.is_file() {
            if file.required {
                return Err(EnvError::FileNotFound(file.path.clone()));
            }
            warn!(path = %file.path.display(), "Skipping missing env file");
            return Ok(());
        }

        let parse_err = |source| EnvError::Parse {
            path: file.path.clone(),
            source,
        };
        let mut count = 0usize;
        for item in dotenvy::from_path_iter(&file.path).map_err(parse_err)? {
            let (key, value) = item.map_err(parse_err)?;
            self.values.insert(key, value);
            count += 1;
        }
        debug!(path = %file.path.display(), count, "Loaded env file");
        Ok(())
    }
}

impl EnvSource for EnvLoader {
    fn load_all(&mut self) -> Result<()> {
        self.values.clear();

        let files = self.files.clone();
        for file in &files {
            self.load_file(file)?;
        }

        if self.use_env {
            // Non-UTF-8 entries can never match a declared name.
            for (key, value) in std::env::vars_os() {
                if let (Ok(key), Ok(value)) = (key.into_string(), value.into_string()) {
                    self.values.insert(key, value);
                }
            }
        }

        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// A fixed, in-memory environment.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    values: HashMap<String, String>,
}

impl MapEnv {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for MapEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn load_all(&mut self) -> Result<()> {
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn env_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_use_file_rejects_missing_path() {
        let mut loader = EnvLoader::new();
        let err = loader
            .use_file("/definitely/not/here/optbind.env")
            .unwrap_err();
        assert!(matches!(err, EnvError::FileNotFound(_)));
        assert_eq!(loader.files().count(), 0);
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let first = env_file("OPTBIND_T_A=one\nOPTBIND_T_B=first\n");
        let second = env_file("OPTBIND_T_B=second\n");

        let mut loader = EnvLoader::new();
        loader.use_env(false);
        loader.use_file(first.path()).unwrap();
        loader.use_file(second.path()).unwrap();
        loader.load_all().unwrap();

        assert_eq!(loader.lookup("OPTBIND_T_A"), Some("one"));
        assert_eq!(loader.lookup("OPTBIND_T_B"), Some("second"));
    }

    #[test]
    fn test_use_files_skips_missing() {
        let present = env_file("OPTBIND_T_PRESENT=yes\n");

        let mut loader = EnvLoader::new();
        loader.use_env(false);
        loader.use_files([
            PathBuf::from("/definitely/not/here/optbind.env"),
            present.path().to_path_buf(),
        ]);
        loader.load_all().unwrap();

        assert_eq!(loader.lookup("OPTBIND_T_PRESENT"), Some("yes"));
    }

    #[test]
    fn test_files_only_ignores_process_env() {
        let mut loader = EnvLoader::new();
        loader.use_env(false);
        loader.load_all().unwrap();
        // PATH is set in every reasonable test environment.
        assert_eq!(loader.lookup("PATH"), None);
    }

    #[test]
    fn test_reload_clears_previous_values() {
        let file = env_file("OPTBIND_T_RELOAD=1\n");
        let mut loader = EnvLoader::new();
        loader.use_env(false);
        loader.use_files([file.path()]);
        loader.load_all().unwrap();
        assert_eq!(loader.lookup("OPTBIND_T_RELOAD"), Some("1"));

        drop(file);
        loader.load_all().unwrap();
        assert_eq!(loader.lookup("OPTBIND_T_RELOAD"), None);
    }

    #[test]
    fn test_map_env_lookup() {
        let mut env = MapEnv::new();
        env.set("A", "1").set("B", "2");
        env.load_all().unwrap();
        assert_eq!(env.lookup("A"), Some("1"));
        assert_eq!(env.lookup("B"), Some("2"));
        assert_eq!(env.lookup("C"), None);
    }
}
