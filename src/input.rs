//! Key bindings: arrows plus vim-style letters.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    Rotate,
    SoftDrop,
    HardDrop,
    Pause,
    Quit,
    /// Overlay button focus.
    NextButton,
    PrevButton,
    Confirm,
    None,
}

/// Map a key press or auto-repeat to an action. Releases map to `None`;
/// see [`is_soft_drop_release`].
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent {
        code,
        modifiers,
        kind,
        ..
    } = key;
    if kind == KeyEventKind::Release {
        return Action::None;
    }
    if modifiers == KeyModifiers::CONTROL {
        return match code {
            KeyCode::Char('c') => Action::Quit,
            _ => Action::None,
        };
    }
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p' | 'P') => Action::Pause,
        KeyCode::Left | KeyCode::Char('h') => Action::MoveLeft,
        KeyCode::Right | KeyCode::Char('l') => Action::MoveRight,
        KeyCode::Up | KeyCode::Char('k') => Action::Rotate,
        KeyCode::Down | KeyCode::Char('j') => Action::SoftDrop,
        KeyCode::Char(' ') => Action::HardDrop,
        KeyCode::Tab => Action::NextButton,
        KeyCode::BackTab => Action::PrevButton,
        KeyCode::Enter => Action::Confirm,
        _ => Action::None,
    }
}

/// Soft drop key let go (only reported by terminals with keyboard enhancement).
pub fn is_soft_drop_release(key: KeyEvent) -> bool {
    key.kind == KeyEventKind::Release && matches!(key.code, KeyCode::Down | KeyCode::Char('j'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn with_kind(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_arrow_bindings() {
        assert_eq!(key_to_action(press(KeyCode::Left)), Action::MoveLeft);
        assert_eq!(key_to_action(press(KeyCode::Right)), Action::MoveRight);
        assert_eq!(key_to_action(press(KeyCode::Up)), Action::Rotate);
        assert_eq!(key_to_action(press(KeyCode::Down)), Action::SoftDrop);
        assert_eq!(key_to_action(press(KeyCode::Char(' '))), Action::HardDrop);
    }

    #[test]
    fn test_vim_bindings() {
        assert_eq!(key_to_action(press(KeyCode::Char('h'))), Action::MoveLeft);
        assert_eq!(key_to_action(press(KeyCode::Char('k'))), Action::Rotate);
        assert_eq!(key_to_action(press(KeyCode::Char('j'))), Action::SoftDrop);
    }

    #[test]
    fn test_pause_quit_and_buttons() {
        assert_eq!(key_to_action(press(KeyCode::Char('p'))), Action::Pause);
        assert_eq!(key_to_action(press(KeyCode::Esc)), Action::Quit);
        assert_eq!(
            key_to_action(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        );
        assert_eq!(key_to_action(press(KeyCode::Tab)), Action::NextButton);
        assert_eq!(key_to_action(press(KeyCode::BackTab)), Action::PrevButton);
        assert_eq!(key_to_action(press(KeyCode::Enter)), Action::Confirm);
    }

    #[test]
    fn test_modified_keys_ignored() {
        assert_eq!(
            key_to_action(KeyEvent::new(KeyCode::Left, KeyModifiers::ALT)),
            Action::None
        );
        assert_eq!(
            key_to_action(KeyEvent::new(KeyCode::Char('p'), KeyModifiers::CONTROL)),
            Action::None
        );
    }

    #[test]
    fn test_repeat_acts_release_does_not() {
        assert_eq!(
            key_to_action(with_kind(KeyCode::Left, KeyEventKind::Repeat)),
            Action::MoveLeft
        );
        let release = with_kind(KeyCode::Down, KeyEventKind::Release);
        assert_eq!(key_to_action(release), Action::None);
        assert!(is_soft_drop_release(release));
        assert!(!is_soft_drop_release(press(KeyCode::Down)));
        assert!(!is_soft_drop_release(with_kind(KeyCode::Up, KeyEventKind::Release)));
    }
}
