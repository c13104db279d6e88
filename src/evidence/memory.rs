use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{snapshot_file_name, EvidenceRecorder};
use crate::frame::Frame;

/// Everything a `MemoryRecorder` has received.
#[derive(Debug, Default)]
pub struct MemoryEvidence {
    pub frames: Vec<Frame>,
    pub snapshots: Vec<(PathBuf, Frame)>,
    pub releases: u32,
}

/// In-memory recorder. Clones share the same store, so a test can keep one
/// handle and inspect it after the session owning the other has been dropped.
#[derive(Clone, Debug, Default)]
pub struct MemoryRecorder {
    store: Arc<Mutex<MemoryEvidence>>,
    released: bool,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evidence(&self) -> MutexGuard<'_, MemoryEvidence> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn frame_count(&self) -> usize {
        self.evidence().frames.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.evidence().snapshots.len()
    }
}

impl EvidenceRecorder for MemoryRecorder {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.released {
            return Err(anyhow!("memory recorder is released"));
        }
        self.evidence().frames.push(frame.clone());
        Ok(())
    }

    fn write_snapshot(&mut self, frame: &Frame, timestamp: &DateTime<Local>) -> Result<PathBuf> {
        if self.released {
            return Err(anyhow!("memory recorder is released"));
        }
        let path = PathBuf::from("memory").join(snapshot_file_name(timestamp));
        self.evidence()
            .snapshots
            .push((path.clone(), frame.clone()));
        Ok(path)
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            self.evidence().releases += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_store() -> Result<()> {
        let handle = MemoryRecorder::new();
        let mut recorder = handle.clone();
        recorder.write_frame(&Frame::black(2, 2))?;
        let path = recorder.write_snapshot(&Frame::black(2, 2), &Local::now())?;
        assert!(path.starts_with("memory"));

        recorder.release()?;
        recorder.release()?;
        drop(recorder);

        assert_eq!(handle.frame_count(), 1);
        assert_eq!(handle.snapshot_count(), 1);
        assert_eq!(handle.evidence().releases, 1);
        Ok(())
    }
}
