use std::cell::RefCell;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{rngs, Rng, SeedableRng};

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<rngs::SmallRng> = RefCell::new(rngs::SmallRng::from_os_rng());
}

/// Crockford base-32, the encoding half of it. Excludes `I`, `L`, `O` and
/// `U`; sorts in ASCII order.
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const TIMESTAMP_BITS: u32 = 48;
const RANDOM_BITS: u32 = 80;

/// Generate a unique, time-sortable identifier.
///
/// The identifier is 26 characters of Crockford base-32: a 48-bit millisecond
/// timestamp followed by 80 bits of randomness. Identifiers minted later sort
/// lexicographically after identifiers minted in an earlier millisecond;
/// within the same millisecond order is random.
///
/// If the system clock cannot produce a representable timestamp the whole
/// identifier is random, trading sortability for uniqueness.
pub fn ulid() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|elapsed| elapsed.as_millis())
        .filter(|millis| *millis < 1 << TIMESTAMP_BITS);

    CURRENT_RNG.with(|rng| {
        let mut rng = rng.borrow_mut();
        match millis {
            Some(millis) => {
                let random = rng.random::<u128>() & ((1 << RANDOM_BITS) - 1);
                encode((millis << RANDOM_BITS) | random)
            }
            None => (0..26)
                .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
                .collect(),
        }
    })
}

fn encode(value: u128) -> String {
    let mut out = String::with_capacity(26);
    for index in 0..26 {
        let shift = 5 * (25 - index);
        out.push(ALPHABET[((value >> shift) & 0x1f) as usize] as char);
    }
    out
}
