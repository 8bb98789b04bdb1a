//! Basic readability counts (sentences, words) for every generated description.

use procdesc_model::layout::{self, BASIC_EVAL_FILE, DESCRIPTION_FILE};
use procdesc_model::{BasicEvaluation, Result, ResultsDir, TestcaseUid};

/// Splits text into sentences and word tokens.
pub trait TextSegmenter {
    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str>;
    fn words(&self, text: &str) -> Vec<String>;

    fn evaluate(&self, text: &str) -> BasicEvaluation {
        BasicEvaluation {
            sent_count: self.sentences(text).len(),
            word_count: self.words(text).len(),
        }
    }
}

const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "approx",
    "no", "fig", "inc", "ltd", "co", "dept", "resp", "cf",
];
const OPENING: &[char] = &['"', '\'', '(', '[', '{', '“', '‘'];
const CLOSING: &[char] = &['"', '\'', ')', ']', '}', '”', '’'];
const TRAILING: &[char] = &[',', ';', ':', '!', '?', ')', ']', '}', '"', '”', '’'];
const CLITICS: &[&str] = &["'s", "'m", "'d", "'ll", "'re", "'ve"];

/// Rule-based English segmenter.
///
/// Sentences end at `.`, `!` or `?` followed by whitespace (or the end of the
/// text). A period does not end a sentence after a known abbreviation or a
/// single-letter initial, nor when the next word starts in lower case. Words
/// follow Treebank conventions: punctuation is its own token, `n't` and
/// `'s`-style clitics are split off, hyphenated words and `1,000` stay whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedSegmenter;

impl TextSegmenter for RuleBasedSegmenter {
    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut out = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i].1;
            if !matches!(c, '.' | '!' | '?') {
                i += 1;
                continue;
            }

            let mut j = i + 1;
            while j < chars.len() && (matches!(chars[j].1, '.' | '!' | '?') || CLOSING.contains(&chars[j].1)) {
                j += 1;
            }
            if j < chars.len() && !chars[j].1.is_whitespace() {
                i = j;
                continue;
            }

            let mut k = j;
            while k < chars.len() && chars[k].1.is_whitespace() {
                k += 1;
            }
            let next = chars.get(k).map(|&(_, ch)| ch);
            let boundary = match (c, next) {
                (_, None) => true,
                ('.', Some(n)) => !n.is_lowercase() && !is_abbreviation(word_before(text, chars[i].0)),
                _ => true,
            };

            if boundary {
                let end = chars.get(j).map(|&(b, _)| b).unwrap_or(text.len());
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = end;
            }
            i = j;
        }

        let tail = text[start..].trim();
        if !tail.is_empty() {
            out.push(tail);
        }
        out
    }

    fn words(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for sentence in self.sentences(text) {
            let chunks: Vec<&str> = sentence.split_whitespace().collect();
            for (n, chunk) in chunks.iter().enumerate() {
                tokenize_chunk(chunk, n + 1 == chunks.len(), &mut out);
            }
        }
        out
    }
}

// The whitespace-delimited token ending right before byte offset `at`.
fn word_before(text: &str, at: usize) -> &str {
    let head = &text[..at];
    let start = head
        .rfind(char::is_whitespace)
        .map(|p| p + head[p..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);
    head[start..].trim_start_matches(OPENING)
}

fn is_abbreviation(word: &str) -> bool {
    let mut chars = word.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.is_alphabetic();
    }
    ABBREVIATIONS.iter().any(|a| a.eq_ignore_ascii_case(word))
}

fn tokenize_chunk(chunk: &str, sentence_final: bool, out: &mut Vec<String>) {
    let mut rest = chunk;
    while let Some(c) = rest.chars().next() {
        if !OPENING.contains(&c) {
            break;
        }
        out.push(c.to_string());
        rest = &rest[c.len_utf8()..];
    }

    let mut trailing = Vec::new();
    while let Some(c) = rest.chars().next_back() {
        if rest.ends_with("...") {
            trailing.push("...".to_string());
            rest = &rest[..rest.len() - 3];
            continue;
        }
        if !(TRAILING.contains(&c) || (c == '.' && sentence_final)) {
            break;
        }
        trailing.push(c.to_string());
        rest = &rest[..rest.len() - c.len_utf8()];
    }

    // Commas split words except inside numbers.
    let chars: Vec<char> = rest.chars().collect();
    let mut current = String::new();
    for (k, &ch) in chars.iter().enumerate() {
        let in_number = k > 0
            && chars[k - 1].is_ascii_digit()
            && chars.get(k + 1).is_some_and(|n| n.is_ascii_digit());
        if ch == ',' && !in_number {
            push_word(&current, out);
            current.clear();
            out.push(",".to_string());
        } else {
            current.push(ch);
        }
    }
    push_word(&current, out);

    out.extend(trailing.into_iter().rev());
}

fn push_word(word: &str, out: &mut Vec<String>) {
    if word.is_empty() {
        return;
    }
    let n = word.len();
    if n > 3 && word.is_char_boundary(n - 3) && word[n - 3..].eq_ignore_ascii_case("n't") {
        out.push(word[..n - 3].to_string());
        out.push(word[n - 3..].to_string());
        return;
    }
    if let Some(pos) = word.rfind('\'') {
        if pos > 0 && CLITICS.iter().any(|c| c.eq_ignore_ascii_case(&word[pos..])) {
            out.push(word[..pos].to_string());
            out.push(word[pos..].to_string());
            return;
        }
    }
    out.push(word.to_string());
}

/// Writes `basic_eval.json` for every testcase under a results directory.
pub struct BasicEvaluator<S: TextSegmenter> {
    segmenter: S,
}

impl<S: TextSegmenter> BasicEvaluator<S> {
    pub fn new(segmenter: S) -> Self {
        Self { segmenter }
    }

    pub fn evaluate_results(&self, results: &ResultsDir) -> Result<Vec<(TestcaseUid, BasicEvaluation)>> {
        let mut out = Vec::new();
        for (uid, dir) in results.testcases()? {
            let text = layout::read_text(&dir.join(DESCRIPTION_FILE))?;
            let eval = self.segmenter.evaluate(&text);
            layout::write_json_pretty(&dir.join(BASIC_EVAL_FILE), &eval)?;
            tracing::info!(
                uid = %uid,
                sentences = eval.sent_count,
                words = eval.word_count,
                "evaluated"
            );
            out.push((uid, eval));
        }
        Ok(out)
    }
}

impl Default for BasicEvaluator<RuleBasedSegmenter> {
    fn default() -> Self {
        Self::new(RuleBasedSegmenter)
    }
}
