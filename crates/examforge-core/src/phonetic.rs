//! Pinyin annotation for learner-visible text.

use pinyin::ToPinyin;

/// Tone-marked pinyin for `text`, one syllable per Han character.
///
/// Non-Han runs (Latin words, digits, punctuation) are kept as single
/// items between syllables and whitespace is dropped. Returns `None` when
/// the text has no Han characters to annotate.
pub fn annotate_pinyin(text: &str) -> Option<String> {
    let mut items: Vec<String> = Vec::new();
    let mut run = String::new();
    let mut annotated = false;
    for (c, syllable) in text.chars().zip(text.to_pinyin()) {
        match syllable {
            Some(syllable) => {
                flush(&mut items, &mut run);
                items.push(syllable.with_tone().to_string());
                annotated = true;
            }
            None if c.is_whitespace() => flush(&mut items, &mut run),
            None => run.push(c),
        }
    }
    flush(&mut items, &mut run);
    annotated.then(|| items.join(" "))
}

fn flush(items: &mut Vec<String>, run: &mut String) {
    if !run.is_empty() {
        items.push(std::mem::take(run));
    }
}
