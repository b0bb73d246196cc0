//! Ordered command source for the player: the script token queue,
//! secondary-queue splicing, head prepend, and loop capture/replay.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ScriptError;

/// Sentinel line returned when the queue runs dry; dispatching it ends
/// the script through the normal command path.
pub const SCRIPT_END_LINE: &str = "script action end";

/// One raw script line plus the directory active when it was loaded,
/// kept for later relative-path resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub line: String,
    pub base_dir: PathBuf,
}

impl Token {
    pub fn new(line: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Token {
            line: line.into(),
            base_dir: base_dir.into(),
        }
    }
}

/// Captured loop body with a replay cursor and remaining repeat count.
///
/// Invariant: `cursor` stays within `[0, body.len()]`; the capture is
/// cleared the moment the counter reaches zero.
#[derive(Debug, Clone)]
struct LoopCapture {
    body: Vec<Token>,
    cursor: usize,
    remaining: u32,
    capturing: bool,
}

/// Primary/secondary token lists plus the loop capture state.
///
/// A script loaded while one is already queued buffers into the
/// secondary list and splices onto the primary tail, so new content
/// always plays strictly after everything already queued.
#[derive(Debug, Default, Clone)]
pub struct ScriptQueue {
    primary: VecDeque<Token>,
    secondary: Vec<Token>,
    loop_capture: Option<LoopCapture>,
}

impl ScriptQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a script file, skipping blank and `#`-prefixed lines.
    /// Returns how many lines were queued.
    pub fn load(&mut self, path: &Path) -> Result<usize, ScriptError> {
        let text = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        for line in script_lines(&text) {
            self.secondary.push(Token::new(line, base_dir.clone()));
        }
        let queued = self.secondary.len();
        self.splice_secondary();
        log::info!("queued {queued} script lines from {}", path.display());
        Ok(queued)
    }

    /// Splice the fully loaded secondary list onto the primary tail.
    fn splice_secondary(&mut self) {
        self.primary.extend(self.secondary.drain(..));
    }

    /// Tokenize in-memory text and prepend it at the queue head in
    /// original order, ahead of everything already queued.
    pub fn add_first(&mut self, text: &str, base_dir: &Path) {
        for line in script_lines(text).rev() {
            self.primary.push_front(Token::new(line, base_dir));
        }
    }

    /// Pop the next token: the loop replay when one is active, then the
    /// primary list, then the `script end` sentinel.
    pub fn get_first(&mut self) -> Token {
        if let Some(token) = self.next_replay_token() {
            return token;
        }
        self.primary
            .pop_front()
            .unwrap_or_else(|| Token::new(SCRIPT_END_LINE, "."))
    }

    fn next_replay_token(&mut self) -> Option<Token> {
        let capture = self.loop_capture.as_mut()?;
        if capture.capturing || capture.body.is_empty() {
            return None;
        }
        let token = capture.body[capture.cursor].clone();
        capture.cursor += 1;
        if capture.cursor == capture.body.len() {
            capture.cursor = 0;
            capture.remaining -= 1;
            if capture.remaining == 0 {
                self.loop_capture = None;
            }
        }
        Some(token)
    }

    /// Begin capturing a loop body. Loops do not nest; a second
    /// `struct loop` while one is open is a logged no-op.
    pub fn begin_loop(&mut self, count: u32) {
        if self.loop_capture.is_some() {
            log::error!("struct loop while a loop is already open; ignored");
            return;
        }
        self.loop_capture = Some(LoopCapture {
            body: Vec::new(),
            cursor: 0,
            remaining: count,
            capturing: true,
        });
    }

    /// Close the capture. The body already ran once while being
    /// captured, so a count of n replays it n - 1 further times.
    pub fn end_loop(&mut self) {
        let Some(capture) = self.loop_capture.as_mut() else {
            log::error!("struct loop end without an open loop; ignored");
            return;
        };
        if !capture.capturing {
            log::error!("struct loop end during replay; ignored");
            return;
        }
        capture.capturing = false;
        if capture.remaining <= 1 || capture.body.is_empty() {
            self.loop_capture = None;
        } else {
            capture.remaining -= 1;
        }
    }

    /// Abandon a replay (or an open capture) immediately.
    pub fn break_loop(&mut self) {
        if self.loop_capture.take().is_none() {
            log::error!("struct loop break without an open loop; ignored");
        }
    }

    /// Record a dispatched token into an open capture. Loop-control
    /// lines themselves are never part of the body.
    pub fn note_dispatched(&mut self, token: &Token) {
        let Some(capture) = self.loop_capture.as_mut() else {
            return;
        };
        if capture.capturing && !token.line.starts_with("struct loop") {
            capture.body.push(token.clone());
        }
    }

    pub fn replaying(&self) -> bool {
        self.loop_capture
            .as_ref()
            .map(|capture| !capture.capturing)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.loop_capture.is_none()
    }

    /// Drop both lists and the loop capture in one step.
    pub fn clear(&mut self) {
        self.primary.clear();
        self.secondary.clear();
        self.loop_capture = None;
    }
}

/// Meaningful lines of a script body, in order.
fn script_lines(text: &str) -> impl DoubleEndedIterator<Item = &str> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim_start().is_empty() && !line.trim_start().starts_with('#'))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use super::{ScriptQueue, Token, SCRIPT_END_LINE};

    fn write_script(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp script");
        file.write_all(contents.as_bytes()).expect("write script");
        file
    }

    fn drain_lines(queue: &mut ScriptQueue) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let token = queue.get_first();
            queue.note_dispatched(&token);
            if token.line == SCRIPT_END_LINE {
                return lines;
            }
            lines.push(token.line);
        }
    }

    #[test]
    fn load_skips_blank_and_comment_lines() {
        let file = write_script("# header\n\nflag atmosphere on\n   \nwait duration 1\n");
        let mut queue = ScriptQueue::new();
        let queued = queue.load(file.path()).expect("load");
        assert_eq!(queued, 2);
        assert_eq!(
            drain_lines(&mut queue),
            vec!["flag atmosphere on", "wait duration 1"]
        );
    }

    #[test]
    fn tokens_carry_the_loading_directory() {
        let file = write_script("audio action play filename test.ogg\n");
        let mut queue = ScriptQueue::new();
        queue.load(file.path()).expect("load");
        let token = queue.get_first();
        assert_eq!(token.base_dir, file.path().parent().unwrap());
    }

    #[test]
    fn missing_file_is_a_recoverable_error() {
        let mut queue = ScriptQueue::new();
        let err = queue.load(Path::new("/no/such/script.sts")).unwrap_err();
        assert!(err.to_string().contains("/no/such/script.sts"));
        assert!(queue.is_empty());
    }

    #[test]
    fn second_load_plays_strictly_after_the_first() {
        let first = write_script("flag atmosphere on\nwait duration 1\n");
        let second = write_script("flag fog on\nflag fog off\n");
        let mut queue = ScriptQueue::new();
        queue.load(first.path()).expect("load first");
        queue.load(second.path()).expect("load second");
        assert_eq!(
            drain_lines(&mut queue),
            vec![
                "flag atmosphere on",
                "wait duration 1",
                "flag fog on",
                "flag fog off"
            ]
        );
    }

    #[test]
    fn add_first_prepends_a_block_in_order() {
        let file = write_script("wait duration 1\n");
        let mut queue = ScriptQueue::new();
        queue.load(file.path()).expect("load");
        queue.add_first("flag fog on\nflag fog off", Path::new("/tmp"));
        assert_eq!(
            drain_lines(&mut queue),
            vec!["flag fog on", "flag fog off", "wait duration 1"]
        );
    }

    #[test]
    fn empty_queue_returns_the_sentinel() {
        let mut queue = ScriptQueue::new();
        assert_eq!(queue.get_first().line, SCRIPT_END_LINE);
    }

    #[test]
    fn loop_replays_body_exactly_n_times_in_order() {
        let mut queue = ScriptQueue::new();
        queue.add_first(
            "struct loop 3\nflag fog on\nflag fog off\nstruct loop end\nwait duration 1",
            Path::new("."),
        );
        // Minimal driver standing in for the dispatcher's loop handling.
        let mut lines = Vec::new();
        loop {
            let token = queue.get_first();
            queue.note_dispatched(&token);
            match token.line.as_str() {
                SCRIPT_END_LINE => break,
                "struct loop 3" => queue.begin_loop(3),
                "struct loop end" => queue.end_loop(),
                _ => lines.push(token.line),
            }
        }
        let body: Vec<&str> = lines
            .iter()
            .map(String::as_str)
            .filter(|line| line.starts_with("flag"))
            .collect();
        assert_eq!(
            body,
            vec![
                "flag fog on",
                "flag fog off",
                "flag fog on",
                "flag fog off",
                "flag fog on",
                "flag fog off"
            ]
        );
        assert_eq!(lines.last().map(String::as_str), Some("wait duration 1"));
    }

    #[test]
    fn loop_of_one_runs_body_once() {
        let mut queue = ScriptQueue::new();
        queue.begin_loop(1);
        let token = Token::new("flag fog on", ".");
        queue.note_dispatched(&token);
        queue.end_loop();
        assert!(queue.is_empty());
    }

    #[test]
    fn break_abandons_the_replay() {
        let mut queue = ScriptQueue::new();
        queue.begin_loop(10);
        queue.note_dispatched(&Token::new("flag fog on", "."));
        queue.end_loop();
        assert!(queue.replaying());
        queue.break_loop();
        assert!(!queue.replaying());
        assert_eq!(queue.get_first().line, SCRIPT_END_LINE);
    }

    #[test]
    fn replayed_tokens_are_not_recaptured() {
        let mut queue = ScriptQueue::new();
        queue.begin_loop(2);
        queue.note_dispatched(&Token::new("flag fog on", "."));
        queue.end_loop();
        // One replay cycle remains.
        let token = queue.get_first();
        assert_eq!(token.line, "flag fog on");
        queue.note_dispatched(&token);
        assert!(!queue.replaying());
    }

    #[test]
    fn clear_drops_queue_and_capture_together() {
        let file = write_script("flag fog on\n");
        let mut queue = ScriptQueue::new();
        queue.load(file.path()).expect("load");
        queue.begin_loop(4);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.get_first().line, SCRIPT_END_LINE);
    }
}
