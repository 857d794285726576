use rand::Rng;
use uuid::Uuid;

/// Deterministic v4-format UUID drawn from the caller's rng. Used for station
/// identities so a seeded world always gets the same id.
pub fn generate_uuid(rng: &mut impl Rng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}
