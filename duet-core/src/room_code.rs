use rand::Rng;

/// Uppercase letters and digits 1-9, without the look-alikes I, O and 0
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ123456789";
pub const ROOM_CODE_LENGTH: usize = 4;
/// Collision retries before giving up on allocating a code
pub const MAX_CODE_ATTEMPTS: usize = 10;

pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LENGTH)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are typed by humans, so lookups ignore case and surrounding spaces
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LENGTH && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generated_codes_use_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let code = generate_room_code(&mut rng);
            assert!(is_valid_room_code(&code), "invalid code {}", code);
        }
    }

    #[test]
    fn test_ambiguous_characters_rejected() {
        assert!(!is_valid_room_code("AB0C"));
        assert!(!is_valid_room_code("ABIC"));
        assert!(!is_valid_room_code("ABOC"));
        assert!(!is_valid_room_code("ABC"));
        assert!(!is_valid_room_code("abcd"));
        assert!(is_valid_room_code("AB9C"));
    }

    #[test]
    fn test_normalize_room_code() {
        assert_eq!(normalize_room_code("  ab9c "), "AB9C");
        assert!(is_valid_room_code(&normalize_room_code("ab9c")));
    }
}
