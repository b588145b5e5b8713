// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Small numeric and formatting helpers.

use ndarray::ArrayView1;

/// Index of the largest value; the first one wins ties. `None` when empty.
#[must_use]
pub fn argmax(values: ArrayView1<'_, f32>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if v.total_cmp(&b).is_le() => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// `"1 frame"`, `"60 frames"`.
#[must_use]
pub fn pluralize(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else if word.ends_with('s') || word.ends_with("ch") || word.ends_with("sh") {
        format!("{count} {word}es")
    } else {
        format!("{count} {word}s")
    }
}
