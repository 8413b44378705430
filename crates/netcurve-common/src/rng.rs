// rng.rs — deterministic game randomness

const MULTIPLIER: u64 = 279_470_273;
const MODULUS: u64 = 4_294_967_291;

/// Multiplicative linear congruential generator driving game ids and player
/// spawns. The whole simulation is replayable from the seed, so this must
/// stay bit-for-bit stable; `wrapping_mul` makes out-of-range seeds behave
/// like unsigned overflow.
#[derive(Debug, Clone)]
pub struct GameRng {
    state: u64,
}

impl GameRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Return the current value and advance the state.
    pub fn next(&mut self) -> u64 {
        let result = self.state;
        self.state = self.state.wrapping_mul(MULTIPLIER) % MODULUS;
        result
    }

    /// Return the value `next` would yield, without advancing.
    pub fn peek(&self) -> u64 {
        self.state
    }
}
