//! Line parser for the script surface syntax.
//!
//! A line is a command name followed by `key value` pairs. Names and
//! keys are folded to lower case; a value opening with `"` keeps its
//! interior spaces until the closing quote or end of line. Parsing
//! never fails: malformed input degrades to an empty command name that
//! downstream treats as a no-op.

/// Ordered key/value argument map.
///
/// Insertion order is preserved so a parsed line re-serializes with its
/// arguments in the original order. Lookups are linear; argument maps
/// are tiny.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ArgMap {
    pairs: Vec<(String, String)>,
}

impl ArgMap {
    pub fn insert(&mut self, key: String, value: String) {
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First pair in insertion order; structural commands key off it.
    pub fn first(&self) -> Option<(&str, &str)> {
        self.pairs.first().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A command line split into its name and argument pairs.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: ArgMap,
}

impl ParsedCommand {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Re-serialize to the surface syntax, quoting values that need it.
    pub fn to_line(&self) -> String {
        let mut out = self.name.clone();
        for (key, value) in self.args.iter() {
            out.push(' ');
            out.push_str(key);
            out.push(' ');
            if value.is_empty() || value.contains(char::is_whitespace) {
                out.push('"');
                out.push_str(value);
                out.push('"');
            } else {
                out.push_str(value);
            }
        }
        out
    }
}

/// Parse one script line. Never fails; see module docs.
pub fn parse_line(line: &str) -> ParsedCommand {
    let mut scanner = Scanner::new(line);
    let name = match scanner.next_token() {
        Some(token) => token.to_lowercase(),
        None => return ParsedCommand::default(),
    };

    let mut args = ArgMap::default();
    while let Some(key) = scanner.next_token() {
        let value = scanner.next_token().unwrap_or_default();
        args.insert(key.to_lowercase(), value);
    }

    ParsedCommand { name, args }
}

struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(line: &'a str) -> Self {
        Scanner { rest: line }
    }

    /// Next whitespace-delimited token, or a quote-delimited one with
    /// interior spaces preserved. An unterminated quote consumes the
    /// remainder of the line.
    fn next_token(&mut self) -> Option<String> {
        self.rest = self.rest.trim_start_matches([' ', '\t']);
        if self.rest.is_empty() {
            return None;
        }

        if let Some(quoted) = self.rest.strip_prefix('"') {
            let (value, remainder) = match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            };
            self.rest = remainder;
            return Some(value.to_string());
        }

        let end = self
            .rest
            .find([' ', '\t'])
            .unwrap_or(self.rest.len());
        let (token, remainder) = self.rest.split_at(end);
        self.rest = remainder;
        Some(token.to_string())
    }
}
