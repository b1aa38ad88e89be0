//! Scripted door schedule.
//!
//! Replaces the interactive keyboard input of a real device with door
//! events pinned to tick numbers, e.g. `open@5` and `close@12`.

use std::str::FromStr;

/// A door transition at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorEvent {
    /// Tick the transition happens on.
    pub tick: u64,
    /// `true` opens the door, `false` closes it.
    pub open: bool,
}

impl FromStr for DoorEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, tick) = s
            .split_once('@')
            .ok_or_else(|| format!("'{s}' is not of the form open@N or close@N"))?;
        let open = match action {
            "open" => true,
            "close" => false,
            other => return Err(format!("unknown door action '{other}'")),
        };
        let tick = tick
            .parse::<u64>()
            .map_err(|e| format!("bad tick in '{s}': {e}"))?;
        Ok(Self { tick, open })
    }
}

/// An ordered list of door events.
#[derive(Debug, Clone, Default)]
pub struct DoorScript {
    events: Vec<DoorEvent>,
}

impl DoorScript {
    /// Build a script; events are ordered by tick.
    pub fn new(mut events: Vec<DoorEvent>) -> Self {
        events.sort_by_key(|e| e.tick);
        Self { events }
    }

    /// The door transition scheduled for this tick, if any. With
    /// several events on one tick the last one wins.
    pub fn at(&self, tick: u64) -> Option<bool> {
        self.events
            .iter()
            .filter(|e| e.tick == tick)
            .map(|e| e.open)
            .last()
    }

    /// Whether the script has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
