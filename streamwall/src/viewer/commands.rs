/// User actions on the wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    /// Toggle mute on a stream (0-based index).
    ToggleMute(usize),
    /// Open a stream in single view (0-based index).
    Select(usize),
    Next,
    Previous,
    BackToGrid,
    /// Reload the stream list, clearing all playback state.
    Reload,
    Quit,
}

impl ViewerCommand {
    /**
        Parse a console line. Stream numbers are 1-based, as shown on the wall.

        - `m <n>`: mute/unmute
        - `s <n>`: single view
        - `n` / `p`: next / previous stream
        - `g`: back to grid
        - `r`: reload
        - `q`: quit
    */
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts.next()?;
        let index = parts
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1));
        if parts.next().is_some() {
            return None;
        }

        match (verb, index) {
            ("m", Some(i)) => Some(Self::ToggleMute(i)),
            ("s", Some(i)) => Some(Self::Select(i)),
            ("n", None) => Some(Self::Next),
            ("p", None) => Some(Self::Previous),
            ("g", None) => Some(Self::BackToGrid),
            ("r", None) => Some(Self::Reload),
            ("q", None) => Some(Self::Quit),
            _ => None,
        }
    }
}

/// One-line help for the console.
pub const HELP: &str = "commands: m <n> mute | s <n> single view | n next | p previous | g grid | r reload | q quit";
