//! Transient interaction sessions.
//!
//! Every tool subsystem owns one [`SessionSlot`]. A slot holds at most one
//! session; opening another while one is open is an error, so a subsystem
//! must close its session explicitly before starting the next.

use crate::scene::Corner;
use std::fmt;
use thiserror::Error;

/// Kind tag of an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Move,
    Resize(Corner),
    SegmentDrag,
    PathDrag,
    SelectionBox,
    TextEdit,
    Draw,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Move => write!(f, "move"),
            SessionKind::Resize(corner) => write!(f, "resize-{}", corner.direction()),
            SessionKind::SegmentDrag => write!(f, "segment-drag"),
            SessionKind::PathDrag => write!(f, "path-drag"),
            SessionKind::SelectionBox => write!(f, "selection-box"),
            SessionKind::TextEdit => write!(f, "text-edit"),
            SessionKind::Draw => write!(f, "draw"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("A {0} session is already open")]
    AlreadyOpen(SessionKind),
}

/// Implemented by each subsystem's session enum.
pub trait SessionTag {
    fn kind(&self) -> SessionKind;
}

#[derive(Debug, Clone)]
pub struct SessionSlot<S> {
    current: Option<S>,
}

impl<S> Default for SessionSlot<S> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<S: SessionTag> SessionSlot<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session. Fails if one is already open.
    pub fn open(&mut self, session: S) -> Result<&mut S, SessionError> {
        if let Some(open) = &self.current {
            return Err(SessionError::AlreadyOpen(open.kind()));
        }
        Ok(self.current.insert(session))
    }

    pub fn close(&mut self) -> Option<S> {
        self.current.take()
    }

    pub fn get(&self) -> Option<&S> {
        self.current.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut S> {
        self.current.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn kind(&self) -> Option<SessionKind> {
        self.current.as_ref().map(SessionTag::kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Probe(SessionKind);

    impl SessionTag for Probe {
        fn kind(&self) -> SessionKind {
            self.0
        }
    }

    #[test]
    fn test_open_requires_close() {
        let mut slot = SessionSlot::new();
        slot.open(Probe(SessionKind::Move)).unwrap();
        let err = slot.open(Probe(SessionKind::SelectionBox)).unwrap_err();
        assert_eq!(err, SessionError::AlreadyOpen(SessionKind::Move));
        assert_eq!(slot.kind(), Some(SessionKind::Move));

        assert!(slot.close().is_some());
        assert!(!slot.is_open());
        slot.open(Probe(SessionKind::SelectionBox)).unwrap();
        assert_eq!(slot.kind(), Some(SessionKind::SelectionBox));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SessionKind::Resize(Corner::BottomRight).to_string(), "resize-se");
        assert_eq!(SessionKind::SegmentDrag.to_string(), "segment-drag");
    }
}
