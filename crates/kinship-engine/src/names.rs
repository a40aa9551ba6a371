//! Name normalization and string similarity.
//!
//! Records are typed by many contributors, often in Arabic script with
//! inconsistent hamza forms and vowel marks, so comparisons run on a folded
//! form rather than the raw text.

/// Fold a name for comparison.
///
/// Lowercases, unifies Arabic letter variants (alef forms → ا, taa marbuta →
/// ه, alef maqsura → ي), drops harakat and tatweel, replaces punctuation with
/// spaces and collapses whitespace.
pub fn normalize(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            // Harakat, shadda, sukun and superscript alef.
            '\u{064B}'..='\u{0652}' | '\u{0670}' => {}
            // Tatweel.
            '\u{0640}' => {}
            'أ' | 'إ' | 'آ' | 'ٱ' => folded.push('ا'),
            'ة' => folded.push('ه'),
            'ى' => folded.push('ي'),
            c if c.is_alphanumeric() => folded.extend(c.to_lowercase()),
            _ => folded.push(' '),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Levenshtein ratio in 0.0–1.0; 1.0 means identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Simple Levenshtein distance over chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Given + father + grandfather, normalized, empty parts skipped.
pub fn composite(given: &str, father: Option<&str>, grandfather: Option<&str>) -> String {
    [Some(given), father, grandfather]
        .into_iter()
        .flatten()
        .map(normalize)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
