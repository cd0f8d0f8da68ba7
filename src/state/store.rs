use crate::health::Health;
use crc32fast::Hasher as Crc32Hasher;
use log::info;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const FRAME_PREFIX: usize = 4 + 4; // payload_len + crc32

/// Codec and identity for one kind of persisted auxiliary state.
///
/// The ordinal is a monotonic marker embedded in the state (a term, a log
/// index); recovery uses it to decide which of the two files holds the most
/// recent record.
pub trait StateMarshal {
    type State;

    fn start_state(&self) -> Self::State;
    fn ordinal(&self, state: &Self::State) -> u64;
    fn encode(&self, state: &Self::State) -> Result<Vec<u8>, StateStoreError>;
    fn decode(&self, bytes: &[u8]) -> Option<Self::State>;
}

/// Dual-file log-structured store for small replicated state.
///
/// Two files (`<name>.a`, `<name>.b`) alternate as the append target. Each
/// `persist` appends one framed record; after `rotation` records the other
/// file is truncated, seeded with the current state as a fresh baseline, and
/// becomes the append target. Recovery picks the file whose last decodable
/// record carries the larger ordinal. A failed write panics the shared
/// [`Health`] handle: a torn auxiliary record could be misread as valid on
/// the next startup, so the process must not keep running.
pub struct DurableStateStore<M: StateMarshal> {
    name: String,
    marshal: M,
    slots: [PathBuf; 2],
    active: usize,
    writer: File,
    rotation: usize,
    entries_since_rotation: usize,
    initial: M::State,
    health: Health,
}

impl<M: StateMarshal> DurableStateStore<M> {
    pub fn open(
        dir: impl AsRef<Path>,
        name: &str,
        rotation: usize,
        marshal: M,
        health: Health,
    ) -> Result<Self, StateStoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let slots = [dir.join(format!("{name}.a")), dir.join(format!("{name}.b"))];
        for slot in &slots {
            OpenOptions::new().create(true).append(true).open(slot)?;
        }

        let last_a = read_last_state(&marshal, &slots[0])?;
        let last_b = read_last_state(&marshal, &slots[1])?;

        // The slot holding the record with the larger ordinal was previously
        // active; the other becomes the new append target and starts from a
        // clean file. A slot with no records at all never wins, so the sole
        // copy of the state is never the one truncated.
        let (active, initial) = match (last_a, last_b) {
            (Some(a), None) => (1, a),
            (None, Some(b)) => (0, b),
            (Some(a), Some(b)) => {
                if marshal.ordinal(&a) > marshal.ordinal(&b) {
                    (1, a)
                } else {
                    (0, b)
                }
            }
            (None, None) => (0, marshal.start_state()),
        };

        let writer = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&slots[active])?;
        info!(
            "event=state_restored name={name} ordinal={}",
            marshal.ordinal(&initial)
        );
        Ok(Self {
            name: name.to_string(),
            marshal,
            slots,
            active,
            writer,
            rotation: rotation.max(1),
            entries_since_rotation: 0,
            initial,
            health,
        })
    }

    /// State recovered at open time.
    pub fn initial_state(&self) -> &M::State {
        &self.initial
    }

    pub fn persist(&mut self, state: &M::State) -> Result<(), StateStoreError> {
        let frame = frame_record(self.marshal.encode(state)?);
        if self.entries_since_rotation >= self.rotation {
            let result = self.rotate(&frame);
            self.fatal(result)?;
        } else {
            let result = self.append(&frame);
            self.fatal(result)?;
        }
        Ok(())
    }

    fn append(&mut self, frame: &[u8]) -> Result<(), StateStoreError> {
        self.writer.write_all(frame)?;
        self.writer.sync_data()?;
        self.entries_since_rotation += 1;
        Ok(())
    }

    fn rotate(&mut self, frame: &[u8]) -> Result<(), StateStoreError> {
        let other = 1 - self.active;
        let mut fresh = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.slots[other])?;
        fresh.write_all(frame)?;
        fresh.sync_data()?;
        self.writer = fresh;
        self.active = other;
        self.entries_since_rotation = 1;
        info!(
            "event=state_rotated name={} active_slot={}",
            self.name, self.active
        );
        Ok(())
    }

    fn fatal(&self, result: Result<(), StateStoreError>) -> Result<(), StateStoreError> {
        if let Err(err) = &result {
            self.health.panic(err);
        }
        result
    }
}

impl<M: StateMarshal> std::fmt::Debug for DurableStateStore<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStateStore")
            .field("name", &self.name)
            .field("active_slot", &self.active)
            .field("rotation", &self.rotation)
            .field("entries_since_rotation", &self.entries_since_rotation)
            .finish()
    }
}

fn frame_record(payload: Vec<u8>) -> Vec<u8> {
    let mut hasher = Crc32Hasher::new();
    hasher.update(&payload);
    let crc = hasher.finalize();
    let mut frame = Vec::with_capacity(FRAME_PREFIX + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    frame
}

/// Scans a slot file to its end, returning the last fully decodable record.
/// Torn or garbled tail bytes end the scan rather than failing it.
fn read_last_state<M: StateMarshal>(
    marshal: &M,
    path: &Path,
) -> Result<Option<M::State>, StateStoreError> {
    let mut file = File::open(path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    let mut last = None;
    let mut cursor = 0usize;
    while buf.len() - cursor >= FRAME_PREFIX {
        let payload_len =
            u32::from_le_bytes([buf[cursor], buf[cursor + 1], buf[cursor + 2], buf[cursor + 3]])
                as usize;
        let stored_crc = u32::from_le_bytes([
            buf[cursor + 4],
            buf[cursor + 5],
            buf[cursor + 6],
            buf[cursor + 7],
        ]);
        let payload_start = cursor + FRAME_PREFIX;
        if buf.len() - payload_start < payload_len {
            break;
        }
        let payload = &buf[payload_start..payload_start + payload_len];
        let mut hasher = Crc32Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != stored_crc {
            break;
        }
        match marshal.decode(payload) {
            Some(state) => last = Some(state),
            None => break,
        }
        cursor = payload_start + payload_len;
    }
    Ok(last)
}

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
