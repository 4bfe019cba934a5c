// Location Resolver - Gazetteer lookup
//
// Free-text place name → (latitude, longitude). Exact key match first, then
// the first key that contains or is contained by the normalized input, then
// a fixed default. Never fails.
//
// The default is London: most of the seed library is English-language
// publishing. This is a deliberate simplification, not a geocoder.

use once_cell::sync::Lazy;

/// (latitude, longitude) in decimal degrees
pub type Coordinates = (f64, f64);

/// Returned when nothing in the gazetteer matches
pub const DEFAULT_COORDINATES: Coordinates = LONDON;

const LONDON: Coordinates = (51.5074, -0.1278);
const NEW_YORK: Coordinates = (40.7128, -74.0060);
const PARIS: Coordinates = (48.8566, 2.3522);
const BERLIN: Coordinates = (52.5200, 13.4050);
const ROME: Coordinates = (41.9028, 12.4964);
const MADRID: Coordinates = (40.4168, -3.7038);
const MOSCOW: Coordinates = (55.7558, 37.6176);
const BEIJING: Coordinates = (39.9042, 116.4074);
const TOKYO: Coordinates = (35.6762, 139.6503);
const DELHI: Coordinates = (28.6139, 77.2090);
const ATHENS: Coordinates = (37.9755, 23.7348);
const VIENNA: Coordinates = (48.2082, 16.3738);

/// Ordered gazetteer; substring scans return the first hit, so longer and
/// more specific keys come first and short abbreviations last.
static GAZETTEER: Lazy<Vec<(&'static str, Coordinates)>> = Lazy::new(|| {
    vec![
        // City, country
        ("london, england", LONDON),
        ("london, uk", LONDON),
        ("new york, usa", NEW_YORK),
        ("paris, france", PARIS),
        ("berlin, germany", BERLIN),
        ("rome, italy", ROME),
        ("madrid, spain", MADRID),
        ("moscow, russia", MOSCOW),
        ("beijing, china", BEIJING),
        ("tokyo, japan", TOKYO),
        ("delhi, india", DELHI),
        ("athens, greece", ATHENS),
        ("vienna, austria", VIENNA),
        // Cities
        ("london", LONDON),
        ("new york", NEW_YORK),
        ("paris", PARIS),
        ("berlin", BERLIN),
        ("rome", ROME),
        ("madrid", MADRID),
        ("moscow", MOSCOW),
        ("beijing", BEIJING),
        ("tokyo", TOKYO),
        ("delhi", DELHI),
        ("athens", ATHENS),
        ("vienna", VIENNA),
        ("amsterdam", (52.3676, 4.9041)),
        ("dublin", (53.3498, -6.2603)),
        ("edinburgh", (55.9533, -3.1883)),
        // Countries and regions (capital city)
        ("ancient greece", ATHENS),
        ("united kingdom", LONDON),
        ("united states", NEW_YORK),
        ("england", LONDON),
        ("france", PARIS),
        ("germany", BERLIN),
        ("italy", ROME),
        ("spain", MADRID),
        ("russia", MOSCOW),
        ("china", BEIJING),
        ("japan", TOKYO),
        ("india", DELHI),
        ("greece", ATHENS),
        ("austria", VIENNA),
        // Publishers and universities
        ("penguin classics", LONDON),
        ("oxford", (51.7520, -1.2577)),
        ("cambridge", (52.2053, 0.1218)),
        ("harvard", (42.3736, -71.1097)),
        ("stanford", (37.4275, -122.1697)),
        ("usa", NEW_YORK),
        ("uk", LONDON),
        ("mit", (42.3601, -71.0942)),
    ]
});

/// Resolve a place name to coordinates
pub fn resolve_location(name: &str) -> Coordinates {
    let normalized = name.trim().to_lowercase();
    if normalized.is_empty() {
        return DEFAULT_COORDINATES;
    }

    if let Some((_, coords)) = GAZETTEER.iter().find(|(key, _)| *key == normalized) {
        return *coords;
    }

    GAZETTEER
        .iter()
        .find(|(key, _)| normalized.contains(key) || key.contains(normalized.as_str()))
        .map(|(_, coords)| *coords)
        .unwrap_or(DEFAULT_COORDINATES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert_eq!(resolve_location("Paris, France"), PARIS);
        assert_eq!(resolve_location("  TOKYO "), TOKYO);
    }

    #[test]
    fn test_unknown_place_falls_back_to_default() {
        assert_eq!(resolve_location("gibberish-nonexistent-place"), DEFAULT_COORDINATES);
        assert_eq!(resolve_location(""), DEFAULT_COORDINATES);
    }

    #[test]
    fn test_input_containing_a_key() {
        assert_eq!(resolve_location("Ancient Greece, 4th century BC"), ATHENS);
        assert_eq!(resolve_location("Printed in Vienna"), VIENNA);
    }

    #[test]
    fn test_key_containing_the_input() {
        assert_eq!(resolve_location("Edinbur"), (55.9533, -3.1883));
    }

    #[test]
    fn test_specific_keys_win_over_abbreviations() {
        // "cambridge, ma" must not fall through to "mit" or "uk"
        assert_eq!(resolve_location("Cambridge, MA"), (52.2053, 0.1218));
        assert_eq!(resolve_location("Berlin, Germany"), BERLIN);
    }
}
