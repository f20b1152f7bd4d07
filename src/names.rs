//! Random service labels.
//!
//! Services that come without a `label` get a generated `adjective-noun`
//! name, assigned exactly once when defaults are filled.

use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "bold", "brave", "bright", "calm", "clever", "cosmic", "crimson", "curious",
    "daring", "eager", "fierce", "gentle", "golden", "happy", "hidden", "humble", "icy", "jolly",
    "keen", "lively", "lucky", "mellow", "misty", "noble", "patient", "proud", "quiet", "rapid",
    "restless", "rustic", "silent", "silver", "sleepy", "steady", "stormy", "swift", "vivid", "wild",
];

const NOUNS: &[&str] = &[
    "badger", "beacon", "breeze", "canyon", "cedar", "comet", "crane", "dawn", "delta", "ember",
    "falcon", "fjord", "glacier", "harbor", "heron", "island", "lantern", "lynx", "meadow", "meteor",
    "otter", "owl", "pebble", "pine", "prairie", "raven", "reef", "river", "sparrow", "spruce",
    "summit", "thicket", "thunder", "tiger", "trail", "tundra", "valley", "walrus", "willow", "wolf",
];

/// Returns a random `adjective-noun` label.
pub fn random_label() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    format!("{adjective}-{noun}")
}

#[cfg(test)]
mod tests {
    use super::random_label;

    #[test]
    fn label_is_adjective_noun() {
        let label = random_label();
        let (adjective, noun) = label.split_once('-').expect("label has a dash");
        assert!(super::ADJECTIVES.contains(&adjective));
        assert!(super::NOUNS.contains(&noun));
    }
}
