// Human-readable order numbers: ORD-<unix millis>-<random suffix>

use chrono::Utc;
use rand::Rng;

pub const ORDER_NUMBER_PREFIX: &str = "ORD";
const SUFFIX_LEN: usize = 8;
const SUFFIX_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn generate_order_number<R: Rng + ?Sized>(rng: &mut R, now_millis: i64) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", ORDER_NUMBER_PREFIX, now_millis, suffix)
}

pub fn next_order_number() -> String {
    generate_order_number(&mut rand::thread_rng(), Utc::now().timestamp_millis())
}

pub fn is_order_number(value: &str) -> bool {
    let mut parts = value.splitn(3, '-');
    let (Some(prefix), Some(millis), Some(suffix)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == ORDER_NUMBER_PREFIX
        && !millis.is_empty()
        && millis.chars().all(|c| c.is_ascii_digit())
        && !suffix.is_empty()
        && suffix.chars().all(|c| c.is_ascii_alphanumeric())
}
