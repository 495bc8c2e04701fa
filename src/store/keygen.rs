use rand::Rng;

const ALPHANUM: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
pub const KEY_LEN: usize = 10;

/// Produce a base-62 id of `KEY_LEN` characters from a uniform 128-bit
/// source. The natural bias from `128 mod 62` is accepted as negligible
/// given the keyspace (62^10 ≈ 8.4e17), per spec.md §6.
pub fn alphanum_key() -> String {
    let mut value: u128 = rand::thread_rng().gen();
    let mut out = String::with_capacity(KEY_LEN);
    for _ in 0..KEY_LEN {
        let idx = (value % 62) as usize;
        out.push(ALPHANUM[idx] as char);
        value /= 62;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_have_expected_length_and_alphabet() {
        for _ in 0..100 {
            let key = alphanum_key();
            assert_eq!(key.len(), KEY_LEN);
            assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn keys_are_not_trivially_repeated() {
        let a = alphanum_key();
        let b = alphanum_key();
        assert_ne!(a, b);
    }
}
