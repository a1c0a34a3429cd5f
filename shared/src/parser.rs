//! Console log line classification
//!
//! Each line is checked against an ordered table of patterns. A row is only
//! tried when the line contains its discriminator literal, and the first row
//! whose regex matches decides the result. Table order is the tie-break if two
//! patterns ever overlap, so new rows go at the end unless they are meant to
//! take priority.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::{Event, PlayerRef};

struct Pattern {
    discriminator: &'static str,
    regex: Regex,
    decode: fn(&Captures) -> Option<Event>,
}

impl Pattern {
    fn new(
        discriminator: &'static str,
        regex: &str,
        decode: fn(&Captures) -> Option<Event>,
    ) -> Self {
        Self {
            discriminator,
            // The table is fixed at compile time; a bad pattern is a programming error.
            regex: Regex::new(regex).unwrap(),
            decode,
        }
    }
}

static PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        Pattern::new(
            "[chat]:",
            r"^\[\S+\]\[chat\]: (-?[0-9]+):(-?[0-9]+):(.+?): (.*)$",
            decode_chat,
        ),
        Pattern::new(
            "team_join",
            r"^\[\S+\]\[game\]: team_join player='(-?[0-9]+):(.+?)' team=(-?[0-9]+|(-?[0-9]+)->(-?[0-9]+))$",
            decode_join,
        ),
        Pattern::new(
            "leave player=",
            r"^\[\S+\]\[game\]: leave player='(-?[0-9]+):(.+?)'",
            decode_leave,
        ),
        Pattern::new(
            "kill killer=",
            r"^\[\S+\]\[game\]: kill killer='(-?[0-9]+):(-?[0-9]+):(.+?)' victim='(-?[0-9]+):(-?[0-9]+):(.+?)' weapon=(-?[0-9]+) special=(-?[0-9]+)$",
            decode_kill,
        ),
        Pattern::new(
            "pickup player=",
            r"^\[\S+\]\[game\]: pickup player='(-?[0-9]+):(.+?)' item=(-?[0-9]+)$",
            decode_pickup,
        ),
        Pattern::new(
            "start match",
            r"^\[\S+\]\[game\]: start match type='(.+?)' teamplay='(-?[0-9]+)'$",
            decode_start_match,
        ),
        Pattern::new(
            "player has entered the game",
            r"^\[\S+\]\[server\]: player has entered the game. ClientID=(-?[0-9]+) addr=(.+?)$",
            decode_connect,
        ),
    ]
});

/// Parses one console line into an event.
///
/// Returns `None` for lines that are not events of interest. That is the
/// common case and not an error.
pub fn parse_line(line: &str) -> Option<Event> {
    for pattern in PATTERNS.iter() {
        if !line.contains(pattern.discriminator) {
            continue;
        }
        // The first matching row decides, even when its decoder rejects the
        // line; later rows are never consulted
        if let Some(caps) = pattern.regex.captures(line) {
            return (pattern.decode)(&caps);
        }
    }
    None
}

fn int(caps: &Captures, group: usize) -> Option<i64> {
    caps.get(group)?.as_str().parse().ok()
}

fn text(caps: &Captures, group: usize) -> Option<String> {
    caps.get(group).map(|m| m.as_str().to_string())
}

fn decode_chat(caps: &Captures) -> Option<Event> {
    Some(Event::Chat {
        client_id: int(caps, 1)?,
        team: int(caps, 2)?,
        player: text(caps, 3)?,
        message: text(caps, 4)?,
    })
}

fn decode_join(caps: &Captures) -> Option<Event> {
    let (previous_team, team) = if caps.get(5).is_some() {
        (Some(int(caps, 4)?), int(caps, 5)?)
    } else {
        (None, int(caps, 3)?)
    };

    Some(Event::Join {
        client_id: int(caps, 1)?,
        player: text(caps, 2)?,
        previous_team,
        team,
    })
}

fn decode_leave(caps: &Captures) -> Option<Event> {
    Some(Event::Leave {
        client_id: int(caps, 1)?,
        player: text(caps, 2)?,
    })
}

fn decode_kill(caps: &Captures) -> Option<Event> {
    Some(Event::Kill {
        killer: PlayerRef {
            client_id: int(caps, 1)?,
            team: int(caps, 2)?,
            player: text(caps, 3)?,
        },
        victim: PlayerRef {
            client_id: int(caps, 4)?,
            team: int(caps, 5)?,
            player: text(caps, 6)?,
        },
        weapon: int(caps, 7)?,
        special: int(caps, 8)?,
    })
}

fn decode_pickup(caps: &Captures) -> Option<Event> {
    Some(Event::Pickup {
        client_id: int(caps, 1)?,
        player: text(caps, 2)?,
        item: int(caps, 3)?,
    })
}

fn decode_start_match(caps: &Captures) -> Option<Event> {
    Some(Event::StartMatch {
        game_type: text(caps, 1)?,
        teamplay: int(caps, 2)?,
    })
}

fn decode_connect(caps: &Captures) -> Option<Event> {
    Some(Event::Connect {
        client_id: text(caps, 1)?,
        address: text(caps, 2)?,
    })
}
