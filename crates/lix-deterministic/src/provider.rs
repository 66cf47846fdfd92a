use lix_types::Timestamp;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::{Builder, Uuid};

use crate::mode::Mode;

/// Length of generated nano ids.
pub const NANO_ID_LENGTH: usize = 21;

const NANO_ID_ALPHABET: &[u8; 64] =
    b"_-0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Persisted provider state: the mode plus the call counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    /// Seed of deterministic mode, `None` in live mode.
    pub seed: Option<u64>,
    /// Number of deterministic values handed out so far.
    pub sequence: u64,
    /// Last live timestamp handed out, for monotonicity.
    pub last_live_ms: u64,
}

/// Source of every timestamp and generated id in the engine.
///
/// # Rules
///
/// - **Live timestamps** are `max(wall_clock, last + 1)`, so they strictly
///   increase even within one millisecond.
/// - **Deterministic timestamps** are the UNIX epoch plus the call sequence
///   number in milliseconds.
/// - **Deterministic ids** draw randomness from a `StdRng` seeded with
///   `seed + sequence`, so each call is reproducible on its own and the
///   provider state stays two integers.
/// - Every call in deterministic mode advances the sequence by one.
#[derive(Clone, Debug, Default)]
pub struct FunctionProvider {
    mode: Mode,
    sequence: u64,
    last_live_ms: u64,
}

impl FunctionProvider {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            sequence: 0,
            last_live_ms: 0,
        }
    }

    pub fn from_state(state: ProviderState) -> Self {
        Self {
            mode: match state.seed {
                Some(seed) => Mode::Deterministic { seed },
                None => Mode::Live,
            },
            sequence: state.sequence,
            last_live_ms: state.last_live_ms,
        }
    }

    pub fn state(&self) -> ProviderState {
        ProviderState {
            seed: match self.mode {
                Mode::Deterministic { seed } => Some(seed),
                Mode::Live => None,
            },
            sequence: self.sequence,
            last_live_ms: self.last_live_ms,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch mode. The sequence counter is kept so that toggling does not
    /// replay earlier values.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            debug!(?mode, sequence = self.sequence, "function provider mode changed");
            self.mode = mode;
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The next timestamp.
    pub fn timestamp(&mut self) -> Timestamp {
        match self.mode {
            Mode::Deterministic { .. } => Timestamp::from_millis(self.next_sequence()),
            Mode::Live => {
                let wall = Timestamp::now().as_millis();
                let next = wall.max(self.last_live_ms + 1);
                self.last_live_ms = next;
                Timestamp::from_millis(next)
            }
        }
    }

    /// A time-ordered UUIDv7 string.
    pub fn uuid_v7(&mut self) -> String {
        match self.mode {
            Mode::Deterministic { .. } => {
                let seq = self.next_sequence();
                let mut random = [0u8; 10];
                self.rng_for(seq).fill_bytes(&mut random);
                Builder::from_unix_timestamp_millis(seq, &random)
                    .into_uuid()
                    .to_string()
            }
            Mode::Live => Uuid::now_v7().to_string(),
        }
    }

    /// A short URL-safe random id of [`NANO_ID_LENGTH`] characters.
    pub fn nano_id(&mut self) -> String {
        match self.mode {
            Mode::Deterministic { .. } => {
                let seq = self.next_sequence();
                let mut rng = self.rng_for(seq);
                nano_id_from(&mut rng)
            }
            Mode::Live => nano_id_from(&mut rand::thread_rng()),
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let seq = self.sequence;
        self.sequence += 1;
        seq
    }

    fn rng_for(&self, seq: u64) -> StdRng {
        let seed = match self.mode {
            Mode::Deterministic { seed } => seed,
            Mode::Live => 0,
        };
        StdRng::seed_from_u64(seed.wrapping_add(seq))
    }
}

fn nano_id_from<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..NANO_ID_LENGTH)
        .map(|_| NANO_ID_ALPHABET[rng.gen_range(0..NANO_ID_ALPHABET.len())] as char)
        .collect()
}
