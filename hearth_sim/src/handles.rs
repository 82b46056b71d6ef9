//! Deterministic handle minting for simulation.

use hearth_env::{ListenHandle, ScheduleHandle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::{Builder, Uuid};

/// Mints UUID handles from a seeded RNG.
///
/// Two runs with the same seed hand out the same handles in the same order,
/// so a failing run can be replayed exactly. Handles are valid v4 UUIDs.
pub struct HandleMint {
    /// Seed the RNG was created from
    seed: u64,

    /// Source of handle bytes
    rng: ChaCha8Rng,

    /// Handles minted so far
    minted: u64,
}

impl HandleMint {
    /// Creates a mint with the given seed.
    pub fn new(seed: u64) -> Self {
        // Separate stream from anything else seeded with the master seed
        let handle_seed = seed.wrapping_mul(0x517cc1b727220a95);
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(handle_seed),
            minted: 0,
        }
    }

    /// Returns the seed this mint was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns how many handles have been minted.
    pub fn minted(&self) -> u64 {
        self.minted
    }

    fn next_uuid(&mut self) -> Uuid {
        self.minted += 1;
        let bytes: [u8; 16] = self.rng.gen();
        Builder::from_random_bytes(bytes).into_uuid()
    }

    /// Mints a timer handle.
    pub fn schedule_handle(&mut self) -> ScheduleHandle {
        ScheduleHandle::from_uuid(self.next_uuid())
    }

    /// Mints a listener handle.
    pub fn listen_handle(&mut self) -> ListenHandle {
        ListenHandle::from_uuid(self.next_uuid())
    }
}
