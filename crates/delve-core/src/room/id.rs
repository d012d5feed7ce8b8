//! Room id generation.

use chrono::Utc;
use rand::Rng;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Source of candidate room ids.
///
/// Candidates may collide; `RoomStore` checks them against existing rooms
/// and asks again.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Default generator: `room_<unix millis>_<9 random base36 chars>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampIdGenerator;

impl IdGenerator for TimestampIdGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        format!("room_{}_{}", Utc::now().timestamp_millis(), suffix)
    }
}

/// Last-resort id used when a generator keeps colliding.
pub(crate) fn fallback_id() -> String {
    format!("room_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_id_shape() {
        let id = TimestampIdGenerator.generate();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "room");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
    }
}
