use std::fs;
use std::io::{self, ErrorKind};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Repository;

/// One JSON document on disk guarded by its own lock.
#[derive(Debug)]
pub struct JsonStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".bak");
        self.path.with_file_name(name)
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| anyhow!("store lock poisoned: {}", self.path.display()))
    }

    fn load(&self) -> Result<T> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", self.path.display()))
    }

    fn store(&self, value: &T) -> Result<()> {
        self.store_with(value, |path, payload| fs::write(path, payload))
    }

    /// Backs up the current file, hands the payload to `write`, and puts the
    /// backup back if `write` fails.
    fn store_with(
        &self,
        value: &T,
        write: impl FnOnce(&Path, &[u8]) -> io::Result<()>,
    ) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(value)?;
        let backup = self.backup_path();
        let had_previous = self.path.exists();
        if had_previous {
            fs::copy(&self.path, &backup).with_context(|| {
                format!("failed to back up {} to {}", self.path.display(), backup.display())
            })?;
        }
        if let Err(err) = write(&self.path, payload.as_bytes()) {
            if had_previous {
                fs::copy(&backup, &self.path).with_context(|| {
                    format!("failed to restore {} after {err}", self.path.display())
                })?;
            }
            return Err(err).with_context(|| format!("failed to write {}", self.path.display()));
        }
        Ok(())
    }
}

impl<T> Repository<T> for JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    fn read(&self) -> Result<T> {
        let _guard = self.guard()?;
        self.load()
    }

    fn write_atomic(&self, value: &T) -> Result<()> {
        let _guard = self.guard()?;
        self.store(value)
    }

    fn update<R>(&self, mutate: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let _guard = self.guard()?;
        let mut value = self.load()?;
        let out = mutate(&mut value)?;
        self.store(&value)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::thread;

    use anyhow::{bail, Result};

    use super::*;

    type Counters = BTreeMap<String, u64>;

    #[test]
    fn missing_file_reads_as_default() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store: JsonStore<Counters> = JsonStore::new(temp.path().join("absent.json"));
        assert!(store.read()?.is_empty());
        Ok(())
    }

    #[test]
    fn write_keeps_previous_version_as_backup() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store: JsonStore<Counters> = JsonStore::new(temp.path().join("counters.json"));

        store.write_atomic(&Counters::from([("a".to_string(), 1)]))?;
        assert!(!store.backup_path().exists());
        store.write_atomic(&Counters::from([("a".to_string(), 2)]))?;

        let backup: Counters = serde_json::from_str(&fs::read_to_string(store.backup_path())?)?;
        assert_eq!(backup.get("a"), Some(&1));
        assert_eq!(store.read()?.get("a"), Some(&2));
        Ok(())
    }

    #[test]
    fn failed_mutation_leaves_file_untouched() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store: JsonStore<Counters> = JsonStore::new(temp.path().join("counters.json"));
        store.write_atomic(&Counters::from([("a".to_string(), 1)]))?;

        let result: Result<()> = store.update(|value| {
            value.insert("a".to_string(), 99);
            bail!("abort")
        });
        assert!(result.is_err());
        assert_eq!(store.read()?.get("a"), Some(&1));
        Ok(())
    }

    #[test]
    fn failed_write_restores_the_backup() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store: JsonStore<Counters> = JsonStore::new(temp.path().join("counters.json"));
        store.write_atomic(&Counters::from([("a".to_string(), 1)]))?;

        let result = store.store_with(&Counters::from([("a".to_string(), 2)]), |path, _| {
            fs::write(path, "{\"a\": tr")?;
            Err(io::Error::other("disk full"))
        });

        let err = result.err().map(|err| format!("{err:#}")).unwrap_or_default();
        assert!(err.contains("failed to write"));
        assert!(err.contains("disk full"));
        assert_eq!(store.read()?.get("a"), Some(&1));
        Ok(())
    }

    #[test]
    fn corrupt_file_is_an_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("counters.json");
        fs::write(&path, "{not json")?;
        let store: JsonStore<Counters> = JsonStore::new(path);
        assert!(store.read().is_err());
        Ok(())
    }

    #[test]
    fn concurrent_updates_are_serialized() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store: Arc<JsonStore<Counters>> =
            Arc::new(JsonStore::new(temp.path().join("counters.json")));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || -> Result<()> {
                    for _ in 0..10 {
                        store.update(|value| {
                            *value.entry("hits".to_string()).or_insert(0) += 1;
                            Ok(())
                        })?;
                    }
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            handle.join().map_err(|_| anyhow!("worker panicked"))??;
        }
        assert_eq!(store.read()?.get("hits"), Some(&80));
        Ok(())
    }
}
