//! Commands, key bindings and input rules contributed by extensions.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::{Captures, Regex};
use smol_str::SmolStr;

use crate::state::EditorState;
use crate::transaction::Transaction;

/// Builds a transaction from the current state, or `None` when the command
/// does not apply.
pub type ActionFn = Arc<dyn Fn(&EditorState) -> Option<Transaction> + Send + Sync>;

/// A named editor command.
#[derive(Clone)]
pub struct Action {
    name: SmolStr,
    run: ActionFn,
}

impl Action {
    pub fn new<F>(name: impl Into<SmolStr>, run: F) -> Self
    where
        F: Fn(&EditorState) -> Option<Transaction> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(run),
        }
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    pub fn run(&self, state: &EditorState) -> Option<Transaction> {
        (self.run)(state)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Action").field(&self.name).finish()
    }
}

/// Every composed action, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: IndexMap<SmolStr, Action>,
}

impl ActionRegistry {
    pub(crate) fn from_map(actions: IndexMap<SmolStr, Action>) -> Self {
        Self { actions }
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &SmolStr> {
        self.actions.keys()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run the named action. `None` for unknown names or when it does not
    /// apply.
    pub fn run(&self, name: &str, state: &EditorState) -> Option<Transaction> {
        self.actions.get(name).and_then(|a| a.run(state))
    }
}

/// Key values for keyboard input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A character key, lowercased.
    Character(SmolStr),
    Backspace,
    Delete,
    Enter,
    Tab,
    Escape,
    Space,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
}

impl Key {
    pub fn character(s: impl Into<SmolStr>) -> Self {
        Self::Character(s.into())
    }

    fn name(&self) -> &str {
        match self {
            Key::Character(c) => c,
            Key::Backspace => "Backspace",
            Key::Delete => "Delete",
            Key::Enter => "Enter",
            Key::Tab => "Tab",
            Key::Escape => "Escape",
            Key::Space => "Space",
            Key::ArrowLeft => "ArrowLeft",
            Key::ArrowRight => "ArrowRight",
            Key::ArrowUp => "ArrowUp",
            Key::ArrowDown => "ArrowDown",
            Key::Home => "Home",
            Key::End => "End",
        }
    }
}

/// Modifier key state for a key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    pub const META: Self = Self {
        meta: true,
        ..Self::NONE
    };

    /// Cmd on Mac, Ctrl elsewhere.
    pub fn primary(is_mac: bool) -> Self {
        if is_mac { Self::META } else { Self::CTRL }
    }
}

/// A key combination, written as `Mod-Shift-z`, `Ctrl-Alt-1` or `Enter`.
///
/// `Mod` is kept symbolic until [`KeyCombo::resolve`] maps it to the
/// platform's primary modifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub key: Key,
    pub modifiers: Modifiers,
    /// Contains the platform-primary `Mod` modifier.
    pub primary: bool,
}

impl KeyCombo {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
            primary: false,
        }
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self {
            key,
            modifiers,
            primary: false,
        }
    }

    /// Replace `Mod` with Cmd or Ctrl.
    pub fn resolve(&self, is_mac: bool) -> KeyCombo {
        let mut modifiers = self.modifiers;
        if self.primary {
            if is_mac {
                modifiers.meta = true;
            } else {
                modifiers.ctrl = true;
            }
        }
        KeyCombo::with_modifiers(self.key.clone(), modifiers)
    }
}

/// A key chord string that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid key chord {0:?}")]
pub struct KeyComboParseError(pub SmolStr);

impl FromStr for KeyCombo {
    type Err = KeyComboParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || KeyComboParseError(s.into());
        // A trailing "-" is the minus key itself.
        let (mods, key) = match s.strip_suffix("--") {
            Some(rest) => (rest, "-"),
            None => match s.rsplit_once('-') {
                Some((mods, key)) => (mods, key),
                None => ("", s),
            },
        };
        if key.is_empty() {
            return Err(err());
        }

        let mut combo = KeyCombo::new(match key {
            "Backspace" => Key::Backspace,
            "Delete" => Key::Delete,
            "Enter" => Key::Enter,
            "Tab" => Key::Tab,
            "Escape" => Key::Escape,
            "Space" => Key::Space,
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "ArrowUp" => Key::ArrowUp,
            "ArrowDown" => Key::ArrowDown,
            "Home" => Key::Home,
            "End" => Key::End,
            other if other.chars().count() == 1 => Key::character(other.to_lowercase()),
            _ => return Err(err()),
        });

        for part in mods.split('-').filter(|p| !p.is_empty()) {
            match part {
                "Mod" => combo.primary = true,
                "Ctrl" | "Control" => combo.modifiers.ctrl = true,
                "Alt" => combo.modifiers.alt = true,
                "Shift" => combo.modifiers.shift = true,
                "Meta" | "Cmd" => combo.modifiers.meta = true,
                _ => return Err(err()),
            }
        }
        Ok(combo)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.primary {
            f.write_str("Mod-")?;
        }
        if self.modifiers.ctrl {
            f.write_str("Ctrl-")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt-")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift-")?;
        }
        if self.modifiers.meta {
            f.write_str("Meta-")?;
        }
        f.write_str(self.key.name())
    }
}

/// Key combination to action name.
#[derive(Debug, Clone, Default)]
pub struct Keymap {
    bindings: IndexMap<KeyCombo, SmolStr>,
}

impl Keymap {
    pub(crate) fn from_map(bindings: IndexMap<KeyCombo, SmolStr>) -> Self {
        Self { bindings }
    }

    pub fn action_for(&self, combo: &KeyCombo) -> Option<&SmolStr> {
        self.bindings.get(combo)
    }

    /// Look up a concrete key press, trying the `Mod` bindings as well.
    pub fn lookup(&self, combo: &KeyCombo, is_mac: bool) -> Option<&SmolStr> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound.resolve(is_mac) == *combo)
            .map(|(_, action)| action)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeyCombo, &SmolStr)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Handler for an input rule: `(state, captures, matched document range)`.
pub type InputRuleFn =
    Arc<dyn Fn(&EditorState, &Captures<'_>, Range<usize>) -> Option<Transaction> + Send + Sync>;

/// Rewrites text typed at the end of a textblock when it matches `pattern`.
///
/// The pattern is matched against the block's text before the cursor with
/// the typed text appended. The handler receives the document range the
/// match covers, excluding the typed text, which has not been inserted yet.
#[derive(Clone)]
pub struct InputRule {
    name: SmolStr,
    pattern: Regex,
    handler: InputRuleFn,
}

impl InputRule {
    pub fn new<F>(name: impl Into<SmolStr>, pattern: Regex, handler: F) -> Self
    where
        F: Fn(&EditorState, &Captures<'_>, Range<usize>) -> Option<Transaction>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            pattern,
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Try the rule against `before` (text up to the cursor, ending with the
    /// typed text). `start` is the document position of `before`'s first
    /// character.
    pub fn apply(
        &self,
        state: &EditorState,
        before: &str,
        typed: &str,
        start: usize,
    ) -> Option<Transaction> {
        let caps = self.pattern.captures(before)?;
        let m = caps.get(0)?;
        if m.end() != before.len() {
            return None;
        }
        let from = start + before[..m.start()].chars().count();
        let to = start + before.chars().count() - typed.chars().count();
        (self.handler)(state, &caps, from..to)
    }
}

impl fmt::Debug for InputRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}
