//! Input event payloads synthesized by the interaction router.
//!
//! These are the wire types handed to the external UI event router. The
//! router builds them from its own per-tick state; the UI engine consumes
//! them through the [`crate::host::InputRouter`] trait.

use bitflags::bitflags;
use glam::Vec2;
use std::collections::BTreeSet;

bitflags! {
    /// Modifier keys held while an event was synthesized.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        /// Either shift key.
        const SHIFT = 1 << 0;
        /// Either control key.
        const CTRL = 1 << 1;
        /// Either alt key.
        const ALT = 1 << 2;
        /// Platform command/meta key.
        const CMD = 1 << 3;
    }
}

/// A pointer button or keyboard key as seen by the interaction router.
///
/// The router only needs identity (for the pressed set) and enough code
/// information to synthesize key and character events; it does not own a
/// full key table the way a windowing layer would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InputKey {
    /// Primary pointer button.
    PointerLeft,
    /// Secondary pointer button.
    PointerRight,
    /// Middle pointer button.
    PointerMiddle,
    /// The scroll wheel axis, used as the effecting key of wheel events.
    PointerWheelAxis,
    /// Enter / return.
    Enter,
    /// Escape.
    Escape,
    /// Backspace.
    Backspace,
    /// Tab.
    Tab,
    /// Space bar.
    Space,
    /// A printable character key.
    Character(char),
    /// Any other key, identified by its scan code.
    Scan(u32),
}

impl InputKey {
    /// Keyboard code forwarded in key events. Pointer buttons have none.
    pub fn key_code(self) -> u32 {
        match self {
            InputKey::Backspace => 8,
            InputKey::Tab => 9,
            InputKey::Enter => 13,
            InputKey::Escape => 27,
            InputKey::Space => 32,
            InputKey::Character(c) => c as u32,
            InputKey::Scan(code) => code,
            InputKey::PointerLeft
            | InputKey::PointerRight
            | InputKey::PointerMiddle
            | InputKey::PointerWheelAxis => 0,
        }
    }

    /// The character this key produces, when it produces one. Keys with a
    /// character also get a synthesized character event on press.
    pub fn char_code(self) -> Option<char> {
        match self {
            InputKey::Space => Some(' '),
            InputKey::Tab => Some('\t'),
            InputKey::Character(c) => Some(c),
            _ => None,
        }
    }
}

/// Set of currently pressed input keys. Unique, order irrelevant.
pub type PressedKeys = BTreeSet<InputKey>;

/// A synthesized pointer event in surface-local pixel coordinates.
#[derive(Debug, Clone)]
pub struct PointerEvent {
    /// Virtual user the event belongs to.
    pub user_index: u32,
    /// Pointer (finger/device) index for that user.
    pub pointer_index: u32,
    /// Current local hit location.
    pub position: Vec2,
    /// Local hit location of the previous tick, for velocity-aware gestures.
    pub last_position: Vec2,
    /// All keys held down when the event was synthesized.
    pub pressed_keys: PressedKeys,
    /// The key that caused this event, if any (none for plain moves).
    pub effecting_key: Option<InputKey>,
    /// Scroll wheel delta; zero for non-wheel events.
    pub wheel_delta: f32,
    /// Modifier keys held.
    pub modifiers: Modifiers,
}

/// A synthesized keyboard event.
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    /// The key being pressed or released.
    pub key: InputKey,
    /// Modifier keys held.
    pub modifiers: Modifiers,
    /// Virtual user the event belongs to.
    pub user_index: u32,
    /// Whether this is an auto-repeat press.
    pub repeat: bool,
    /// Keyboard code of the key.
    pub key_code: u32,
    /// Character code of the key, when it produces one.
    pub char_code: Option<char>,
}

/// A synthesized character-input event.
#[derive(Debug, Clone, Copy)]
pub struct CharEvent {
    /// The character entered.
    pub character: char,
    /// Modifier keys held.
    pub modifiers: Modifiers,
    /// Virtual user the event belongs to.
    pub user_index: u32,
    /// Whether this is an auto-repeat entry.
    pub repeat: bool,
}
