//! Label-derived storage identifiers

/// Derive a storage identifier from a hub label.
///
/// Every run of non-alphanumeric characters collapses to a single `_`, so
/// the result is a deterministic, dot-free key segment for the state tree:
///
/// ```
/// use harmony_core::ident;
///
/// assert_eq!(ident("Watch TV"), "Watch_TV");
/// assert_eq!(ident("Denon AV Receiver"), "Denon_AV_Receiver");
/// assert_eq!(ident("Play/Pause"), "Play_Pause");
/// ```
pub fn ident(label: &str) -> String {
    let mut result = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_alphanumeric() {
            result.push(c);
        } else if !result.ends_with('_') {
            result.push('_');
        }
    }
    result
}
