use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

pub const CLAIM_STARTED: &str = "claim_started";
pub const CLAIM_STAGE: &str = "claim_stage";
pub const CLAIM_ROLLED_BACK: &str = "claim_rolled_back";
pub const CLAIM_COMPLETED: &str = "claim_completed";
pub const CLAIM_FAILED: &str = "claim_failed";
pub const ACCOUNT_CREATED: &str = "account_created";
pub const GIFT_RECOVERED: &str = "gift_recovered";
pub const TOKEN_TRANSFERRED: &str = "token_transferred";

/// Append-only audit log (`events.jsonl`), one compact JSON object per line
/// with `type`, `claim_id` and `ts` followed by the payload.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn emit(
        &self,
        event_type: &str,
        claim_id: &str,
        payload: EventPayload,
    ) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert("claim_id".to_string(), Value::String(claim_id.to_string()));
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.entry(key).or_insert(value);
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }

    /// Reads every event back, skipping lines that do not parse.
    pub fn read_all(&self) -> anyhow::Result<Vec<Value>> {
        let raw = match std::fs::read_to_string(&self.inner.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        Ok(raw
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path);

        let mut payload = EventPayload::new();
        payload.insert("username".to_string(), Value::String("prancer".to_string()));
        let emitted = writer.emit(CLAIM_STARTED, "claim-123", payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String(CLAIM_STARTED.to_string()));
        assert_eq!(parsed["claim_id"], Value::String("claim-123".to_string()));
        assert_eq!(parsed["username"], Value::String("prancer".to_string()));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn payload_cannot_override_envelope() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"));

        let mut payload = EventPayload::new();
        payload.insert("type".to_string(), Value::String("override".to_string()));
        let emitted = writer.emit(CLAIM_FAILED, "claim-1", payload)?;

        assert_eq!(emitted["type"], Value::String(CLAIM_FAILED.to_string()));
        Ok(())
    }

    #[test]
    fn emit_appends_lines() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("nested").join("events.jsonl"));

        writer.emit(CLAIM_STARTED, "a", EventPayload::new())?;
        writer.emit(CLAIM_COMPLETED, "a", EventPayload::new())?;

        let events = writer.read_all()?;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], Value::String(CLAIM_STARTED.to_string()));
        assert_eq!(events[1]["type"], Value::String(CLAIM_COMPLETED.to_string()));
        Ok(())
    }
}
