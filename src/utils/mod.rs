use std::mem::transmute;

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub trait Tolerance {
    fn tol() -> Self;
}

impl Tolerance for f64 {
    fn tol() -> Self {
        1e-6
    }
}

pub type Random = Pcg64Mcg;

pub fn create_seeded_rng(seed: i128) -> Random {
    let raw_bytes: [u8; 16] = unsafe { transmute(seed) };
    let mut rng = Pcg64Mcg::from_seed(raw_bytes);
    // discard the first three
    rng.next_u64();
    rng.next_u64();
    rng.next_u64();
    rng
}
