//! Deterministic RNG streams for the engine.
//!
//! Each subsystem that rolls dice gets its own stream derived from one
//! user-visible seed via an HMAC domain tag, so task crits, habit crits,
//! and id minting can never perturb each other's sequences.
use hmac::{Hmac, Mac};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sha2::Sha256;
use std::cell::{RefCell, RefMut};

#[derive(Debug)]
pub struct RngBundle {
    task_crit: RefCell<SmallRng>,
    habit_crit: RefCell<SmallRng>,
    ids: RefCell<SmallRng>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            task_crit: RefCell::new(SmallRng::seed_from_u64(derive_stream_seed(
                seed,
                b"task_crit",
            ))),
            habit_crit: RefCell::new(SmallRng::seed_from_u64(derive_stream_seed(
                seed,
                b"habit_crit",
            ))),
            ids: RefCell::new(SmallRng::seed_from_u64(derive_stream_seed(seed, b"ids"))),
        }
    }

    /// Crit stream for task completions.
    #[must_use]
    pub fn task_crit(&self) -> RefMut<'_, SmallRng> {
        self.task_crit.borrow_mut()
    }

    /// Crit stream for habit completions.
    #[must_use]
    pub fn habit_crit(&self) -> RefMut<'_, SmallRng> {
        self.habit_crit.borrow_mut()
    }

    /// Stream backing entity id minting.
    #[must_use]
    pub fn ids(&self) -> RefMut<'_, SmallRng> {
        self.ids.borrow_mut()
    }
}

impl Default for RngBundle {
    fn default() -> Self {
        Self::from_user_seed(rand::random())
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

/// Mint a collection-prefixed entity id, e.g. `t_9f3a61c2b4d0`.
pub fn mint_id<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    let suffix: u64 = rng.r#gen::<u64>() & 0xFFFF_FFFF_FFFF;
    format!("{prefix}{suffix:012x}")
}
