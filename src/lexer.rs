//! Lexical analysis: splitting one raw input line into unquoted words.
//!
//! The lexer resolves shell-style quoting before anything reaches the
//! argument parser, which therefore never sees a quote character. Single
//! quotes preserve their content verbatim; double quotes group words but are
//! otherwise plain; adjacent quoted and unquoted runs concatenate into one
//! word (`pre"fix"` is `prefix`). The first resulting word is the command
//! name, the rest are its arguments.

/// Errors that can occur while tokenizing a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// A closing single or double quote was not found.
    UnfinishedQuote,
}

impl std::fmt::Display for LexingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexingError::UnfinishedQuote => write!(f, "unterminated quote in input"),
        }
    }
}

impl std::error::Error for LexingError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
    // A pair of quotes produces a word even when empty ("" is a real token).
    word_open: bool,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
            word_open: false,
        }
    }

    fn make_words(&mut self) -> Result<Vec<String>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_quote(ch, '\''),
                LexingState::ReadingDoubleQuote => self.handle_quote(ch, '"'),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                return Err(LexingError::UnfinishedQuote);
            }
            _ => {}
        }

        if self.word_open {
            out.push(std::mem::take(&mut self.buffer));
            self.word_open = false;
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_start(&mut self, ch: char) {
        match ch {
            ' ' | '\t' => {}
            '\'' => {
                self.word_open = true;
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.word_open = true;
                self.state = LexingState::ReadingDoubleQuote;
            }
            c => {
                self.buffer.push(c);
                self.word_open = true;
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            ' ' | '\t' => {
                out.push(std::mem::take(&mut self.buffer));
                self.word_open = false;
                self.state = LexingState::Start;
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            c => self.buffer.push(c),
        }
    }

    fn handle_quote(&mut self, ch: char, closing: char) {
        if ch == closing {
            self.state = LexingState::ReadingWord;
        } else {
            self.buffer.push(ch);
        }
    }
}

/// Tokenize one input line into words, resolving quotes.
///
/// Returns the words in order; an empty or whitespace-only line yields an
/// empty vector.
pub fn split_line(line: &str) -> Result<Vec<String>, LexingError> {
    let mut lexer = LexingFSM::new(line);
    lexer.make_words()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(
            split_line("ls -la  /tmp").unwrap(),
            words(&["ls", "-la", "/tmp"])
        );
    }

    #[test]
    fn empty_line_yields_no_words() {
        assert_eq!(split_line("").unwrap(), Vec::<String>::new());
        assert_eq!(split_line("   \t ").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn double_quotes_group_words() {
        assert_eq!(
            split_line("grep -p \"report 2025\" notes.txt").unwrap(),
            words(&["grep", "-p", "report 2025", "notes.txt"])
        );
    }

    #[test]
    fn single_quotes_group_words() {
        assert_eq!(
            split_line("cat 'a file.txt'").unwrap(),
            words(&["cat", "a file.txt"])
        );
    }

    #[test]
    fn quotes_concatenate_with_adjacent_text() {
        assert_eq!(split_line("echo pre\"fix\"").unwrap(), words(&["echo", "prefix"]));
        assert_eq!(split_line("a'b c'd").unwrap(), words(&["ab cd"]));
    }

    #[test]
    fn empty_quotes_are_a_real_token() {
        assert_eq!(split_line("cmd \"\"").unwrap(), words(&["cmd", ""]));
    }

    #[test]
    fn nested_quote_kinds_stay_literal() {
        assert_eq!(
            split_line("grep -p \"it's here\"").unwrap(),
            words(&["grep", "-p", "it's here"])
        );
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert_eq!(split_line("cat 'oops"), Err(LexingError::UnfinishedQuote));
        assert_eq!(split_line("cat \"oops"), Err(LexingError::UnfinishedQuote));
    }
}
