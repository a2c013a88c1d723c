//! Slug normalization for add-on identifiers.
//!
//! An add-on's display name is turned into the key it occupies in the shared
//! license mapping: lowercase, accents folded, and every run of characters
//! outside `[a-z0-9_-]` collapsed to a single dash.

use regex::Regex;
use std::sync::OnceLock;

fn separator_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Anything left after folding that is not a slug character. Dashes are
    // part of the run so existing dashes merge with neighbouring separators.
    RE.get_or_init(|| Regex::new(r"[^a-z0-9_]+").expect("static regex is valid"))
}

/// Fold common Latin-1 accented letters to their ASCII base.
fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'ß' => "ss",
        'œ' => "oe",
        _ => return None,
    };
    Some(folded)
}

/// Derive the slug form of an add-on name.
///
/// ```
/// use addon_license::slug::sanitize_title;
///
/// assert_eq!(sanitize_title("My Addon"), "my-addon");
/// assert_eq!(sanitize_title("Polylang for WooCommerce"), "polylang-for-woocommerce");
/// ```
pub fn sanitize_title(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        match fold_accent(c) {
            Some(base) => folded.push_str(base),
            None => folded.push(c),
        }
    }

    separator_runs()
        .replace_all(&folded, "-")
        .trim_matches('-')
        .to_string()
}
