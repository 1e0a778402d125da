use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    Idle,
    Collecting,
}

/// Assembles complete telegrams out of a line stream.
///
/// Everything before a line starting with `/` is noise and dropped. Once
/// collecting, every line is kept (a second `/` line is payload, it does not
/// restart framing) until a line starting with `!` closes the telegram.
#[derive(Debug)]
pub struct Framer {
    state: FramerState,
    buffer: String,
}

impl Framer {
    pub fn new() -> Self {
        Framer { state: FramerState::Idle, buffer: String::new() }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Feed one line (with or without its line ending). Returns the raw
    /// telegram when `line` completed one.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if self.state == FramerState::Idle {
            if !line.starts_with('/') {
                if !line.trim().is_empty() {
                    debug!("Dropping line outside of a telegram: {}", line.trim_end());
                }
                return None;
            }
            self.state = FramerState::Collecting;
        }

        self.buffer.push_str(line.trim_end_matches(['\r', '\n']));
        self.buffer.push_str("\r\n");

        if line.starts_with('!') {
            self.state = FramerState::Idle;
            return Some(std::mem::take(&mut self.buffer));
        }

        None
    }

    /// End of stream. An unterminated telegram is never handed out.
    pub fn finish(&mut self) -> Option<usize> {
        if self.state == FramerState::Idle {
            return None;
        }

        let dropped = self.buffer.len();
        debug!("Discarding unterminated telegram of {} bytes", dropped);
        self.buffer.clear();
        self.state = FramerState::Idle;
        Some(dropped)
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_all(lines: &[&str]) -> (Vec<String>, Framer) {
        let mut framer = Framer::new();
        let telegrams = lines.iter().filter_map(|l| framer.push_line(l)).collect();
        (telegrams, framer)
    }

    #[test]
    fn test_noise_before_start_is_dropped() {
        let (telegrams, framer) = frame_all(&["junk", "/start", "a(1)", "!end"]);
        assert_eq!(telegrams, vec!["/start\r\na(1)\r\n!end\r\n".to_string()]);
        assert_eq!(framer.state(), FramerState::Idle);
    }

    #[test]
    fn test_trailing_fragment_is_discarded() {
        let (telegrams, mut framer) = frame_all(&["junk", "/start", "a(1)", "!end", "/start2 ...", "b(2)"]);
        assert_eq!(telegrams.len(), 1);
        assert_eq!(framer.state(), FramerState::Collecting);
        assert!(framer.finish().is_some());
        assert_eq!(framer.state(), FramerState::Idle);
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn test_start_marker_mid_telegram_is_payload() {
        let (telegrams, _) = frame_all(&["/one", "/two", "!"]);
        assert_eq!(telegrams, vec!["/one\r\n/two\r\n!\r\n".to_string()]);
    }

    #[test]
    fn test_line_endings_are_normalised() {
        let (telegrams, _) = frame_all(&["/id\r\n", "1-0:1.7.0(0000.98*kW)\n", "!\r\n"]);
        assert_eq!(telegrams, vec!["/id\r\n1-0:1.7.0(0000.98*kW)\r\n!\r\n".to_string()]);
    }

    #[test]
    fn test_consecutive_telegrams() {
        let (telegrams, _) = frame_all(&["/a", "!", "noise", "/b", "x", "!"]);
        assert_eq!(telegrams.len(), 2);
        assert!(telegrams[1].starts_with("/b"));
    }

    #[test]
    fn test_empty_lines_inside_telegram_are_kept() {
        let (telegrams, _) = frame_all(&["/a", "", "!"]);
        assert_eq!(telegrams, vec!["/a\r\n\r\n!\r\n".to_string()]);
    }
}
