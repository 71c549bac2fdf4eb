//! Built-in passphrase strength estimate for the quality bar

/// Score a partial passphrase in `0..=100`.
///
/// Length counts most; each extra character class (lowercase, uppercase,
/// digit, other) adds a bonus.
pub fn score(pin: &str) -> i32 {
    let len = pin.chars().count() as i32;
    let classes = [
        pin.chars().any(|c| c.is_lowercase()),
        pin.chars().any(|c| c.is_uppercase()),
        pin.chars().any(|c| c.is_ascii_digit()),
        pin.chars().any(|c| !c.is_alphanumeric()),
    ]
    .into_iter()
    .filter(|&present| present)
    .count() as i32;

    let bonus = if classes > 1 { (classes - 1) * 10 } else { 0 };
    (len * 5 + bonus).clamp(0, 100)
}
