//! Passcode generation.

use crate::store::JsonDataStore;
use rand::Rng;

pub const PASSCODE_LEN: usize = 10;

/// A random string of [`PASSCODE_LEN`] decimal digits.
pub fn generate_passcode() -> String {
    let mut rng = rand::rng();
    (0..PASSCODE_LEN)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Generate passcodes until one is not held by any stored user.
pub async fn generate_unique_passcode(store: &JsonDataStore) -> String {
    loop {
        let passcode = generate_passcode();
        if !store.passcode_exists(&passcode).await {
            return passcode;
        }
    }
}
