use crate::clock::now_millis;
use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RANDOM_SUFFIX_LEN: usize = 9;

/// Short identifier: base36 millisecond clock followed by a random base36 suffix.
pub fn generate_id() -> String {
    let mut id = to_base36(now_millis().unsigned_abs());
    let mut rng = rand::thread_rng();
    for _ in 0..RANDOM_SUFFIX_LEN {
        let index = rng.gen_range(0..ALPHABET.len());
        id.push(ALPHABET[index] as char);
    }
    id
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
