//! BLAKE3 digest over every published batch of a run.
//!
//! Two runs with the same seed, catalogue, clock start and actuator writes
//! produce the same digest.

use blake3::Hasher;
use smartplc_core::events::{Event, EventBatch};
use smartplc_core::signal::SignalValue;

#[derive(Debug, Clone, Default)]
pub struct RunDigest {
    hasher: Hasher,
    batches: u64,
}

impl RunDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, batch: &EventBatch) {
        self.hasher.update(&batch.tick.to_le_bytes());
        self.hasher.update(&batch.timestamp.to_le_bytes());
        for event in &batch.events {
            match event {
                Event::SignalChanged(change) => {
                    self.hasher.update(b"S");
                    self.hasher.update(change.signal.as_bytes());
                    hash_value(&mut self.hasher, change.old);
                    hash_value(&mut self.hasher, change.new);
                }
                Event::AlarmTransition(transition) => {
                    self.hasher.update(b"A");
                    self.hasher.update(transition.signal.as_bytes());
                    self.hasher.update(&[transition.from as u8, transition.to as u8]);
                    self.hasher.update(&transition.value.to_bits().to_le_bytes());
                }
            }
        }
        self.batches += 1;
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Hex digest of everything seen so far.
    pub fn hex(&self) -> String {
        hex::encode(self.hasher.finalize().as_bytes())
    }
}

fn hash_value(hasher: &mut Hasher, value: SignalValue) {
    match value {
        SignalValue::Digital(on) => hasher.update(&[0, u8::from(on)]),
        SignalValue::Analog(v) => hasher.update(&v.to_bits().to_le_bytes()),
    };
}
