use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{
    thread_rng, Rng,
    distributions,
};

use chrono::Local;


pub fn generate_rand_id(length: usize) -> String {
    thread_rng()
        .sample_iter(&distributions::Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn calculate_hash<T: Hash>(t: &T) -> u64 {
    let mut s = DefaultHasher::new();
    t.hash(&mut s);
    s.finish()
}

/// Timestamp in the form stored in the database.
pub fn now_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand_id_has_requested_length() {
        let id = generate_rand_id(32);
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn hash_is_stable_for_same_input() {
        assert_eq!(calculate_hash(&"secret"), calculate_hash(&"secret"));
        assert_ne!(calculate_hash(&"secret"), calculate_hash(&"Secret"));
    }
}
