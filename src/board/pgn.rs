// Copyright 2026 Tobin Edwards
//
//    Licensed under the Apache License, Version 2.0 (the "License");
//    you may not use this file except in compliance with the License.
//    You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
//    Unless required by applicable law or agreed to in writing, software
//    distributed under the License is distributed on an "AS IS" BASIS,
//    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//    See the License for the specific language governing permissions and
//    limitations under the License.

use thiserror::Error;

const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PgnError {
    #[error("No PGN text")]
    Empty,
    #[error("Unterminated comment")]
    UnterminatedComment,
    #[error("Unbalanced variation")]
    UnbalancedVariation,
    #[error("Illegal move at ply {ply}: {san:?}")]
    IllegalMove { ply: usize, san: String },
}

/// Extracts the mainline SAN tokens from PGN text.
///
/// Tag pairs, comments, variations, NAGs, move numbers and annotation
/// glyphs are skipped. Parsing stops at the first game result. Tokens are
/// not checked for legality here. Blank input is an error.
pub fn parse_movetext(pgn: &str) -> Result<Vec<String>, PgnError> {
    if pgn.trim().is_empty() {
        return Err(PgnError::Empty);
    }
    let body: String = pgn
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            !(line.starts_with('[') || line.starts_with('%'))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut words = Vec::new();
    let mut word = String::new();
    let mut depth = 0usize;
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                flush(&mut word, depth, &mut words);
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(PgnError::UnterminatedComment);
                }
            }
            ';' => {
                flush(&mut word, depth, &mut words);
                let _ = chars.by_ref().find(|c| *c == '\n');
            }
            '(' => {
                flush(&mut word, depth, &mut words);
                depth += 1;
            }
            ')' => {
                flush(&mut word, depth, &mut words);
                depth = depth.checked_sub(1).ok_or(PgnError::UnbalancedVariation)?;
            }
            c if c.is_whitespace() => flush(&mut word, depth, &mut words),
            c => word.push(c),
        }
    }
    flush(&mut word, depth, &mut words);
    if depth > 0 {
        return Err(PgnError::UnbalancedVariation);
    }

    let mut sans = Vec::new();
    for word in &words {
        let token = strip_move_number(word);
        if RESULTS.contains(&token) {
            break;
        }
        if token.is_empty()
            || token.starts_with('$')
            || token.chars().all(|c| c == '!' || c == '?')
        {
            continue;
        }
        sans.push(token.to_string());
    }
    Ok(sans)
}

/// Numbered movetext for a line played from the initial position,
/// e.g. `1. e4 e5 2. Nf3`.
pub fn format_movetext<S: AsRef<str>>(sans: &[S]) -> String {
    sans.chunks(2)
        .enumerate()
        .map(|(i, pair)| match pair {
            [white, black] => format!("{}. {} {}", i + 1, white.as_ref(), black.as_ref()),
            [white] => format!("{}. {}", i + 1, white.as_ref()),
            _ => unreachable!("chunks(2) yields one or two moves"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// Only words outside of variations belong to the mainline.
fn flush(word: &mut String, depth: usize, words: &mut Vec<String>) {
    if !word.is_empty() {
        let taken = std::mem::take(word);
        if depth == 0 {
            words.push(taken);
        }
    }
}

fn strip_move_number(word: &str) -> &str {
    let rest = word.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() < word.len() && rest.starts_with('.') {
        rest.trim_start_matches('.')
    } else {
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_movetext() {
        assert_eq!(
            parse_movetext("1. e4 e5 2. Nf3 Nc6 3. Bb5").unwrap(),
            vec!["e4", "e5", "Nf3", "Nc6", "Bb5"]
        );
    }

    #[test]
    fn test_attached_move_numbers_and_black_continuation() {
        assert_eq!(
            parse_movetext("1.e4 e5 2.Nf3 {main} 2... Nc6").unwrap(),
            vec!["e4", "e5", "Nf3", "Nc6"]
        );
    }

    #[test]
    fn test_tags_comments_variations_and_nags() {
        let pgn = r#"[Event "Casual"]
[White "A (B)"]
[Black "C"]

1. e4 $1 e5 {Open game; (classical)} 2. Nf3 (2. f4 exf4 (2... d5)) 2... Nc6 ; rest of line
3. Bb5 !? a6 1-0 4. Ba4"#;
        assert_eq!(
            parse_movetext(pgn).unwrap(),
            vec!["e4", "e5", "Nf3", "Nc6", "Bb5", "a6"]
        );
    }

    #[test]
    fn test_castling_is_not_a_move_number() {
        assert_eq!(
            parse_movetext("1. O-O 0-0 *").unwrap(),
            vec!["O-O", "0-0"]
        );
    }

    #[test]
    fn test_blank_and_result_only() {
        assert_eq!(parse_movetext(""), Err(PgnError::Empty));
        assert_eq!(parse_movetext("  \n\t "), Err(PgnError::Empty));
        assert!(parse_movetext("1/2-1/2").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_movetext() {
        assert_eq!(
            parse_movetext("1. e4 {unterminated"),
            Err(PgnError::UnterminatedComment)
        );
        assert_eq!(
            parse_movetext("1. e4 (1. d4"),
            Err(PgnError::UnbalancedVariation)
        );
        assert_eq!(
            parse_movetext("1. e4 ) e5"),
            Err(PgnError::UnbalancedVariation)
        );
    }

    #[test]
    fn test_format_movetext() {
        let empty: [&str; 0] = [];
        assert_eq!(format_movetext(&empty), "");
        assert_eq!(format_movetext(&["e4"]), "1. e4");
        assert_eq!(format_movetext(&["e4", "e5", "Nf3"]), "1. e4 e5 2. Nf3");
        let line = format_movetext(&["d4", "d5", "c4"]);
        assert_eq!(parse_movetext(&line).unwrap(), vec!["d4", "d5", "c4"]);
    }
}
