use chrono::{Local, NaiveDateTime};
use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 3;

/// `{prefix}-YYYYMMDD-HHMMSS-XXX` in local time.
///
/// Human-readable reference only: two orders in the same second collide
/// with probability 1/46656. The storage id is the real key.
pub fn generate(prefix: &str) -> String {
    generate_at(prefix, Local::now().naive_local(), &mut rand::thread_rng())
}

pub fn generate_at<R: Rng + ?Sized>(prefix: &str, at: NaiveDateTime, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", prefix, at.format("%Y%m%d-%H%M%S"), suffix)
}
