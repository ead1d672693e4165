//! Navigation state machine: a bounded stack of [`Screen`]s.
//!
//! The stack is capped at 8 entries (embedded-safe, no heap). Pushing when
//! the stack is full is a silent no-op (embedded reality: bounded buffer).
//!
//! External apps receive `&mut Navigator` so they can push their own views;
//! the launcher records [`depth`](Navigator::depth) first and
//! [`truncate`](Navigator::truncate)s back to it when the app returns.

use heapless::Vec;

use crate::screen::Screen;

/// Maximum stack depth.
pub const MAX_DEPTH: usize = 8;

/// Navigation stack bounded at [`MAX_DEPTH`] entries.
pub struct Navigator {
    stack: Vec<Screen, MAX_DEPTH>,
}

impl Navigator {
    /// Create a new navigator with `Home` as the root screen.
    pub fn new() -> Self {
        let mut stack = Vec::new();
        // This push always succeeds: the stack starts empty.
        stack.push(Screen::Home).ok();
        Navigator { stack }
    }

    /// Return the screen currently at the top of the stack.
    #[must_use]
    pub fn current(&self) -> Screen {
        match self.stack.last() {
            Some(s) => *s,
            None => Screen::Home, // unreachable by construction
        }
    }

    /// Push a new screen. If the stack is already at capacity the push is a
    /// silent no-op.
    pub fn push(&mut self, screen: Screen) {
        if self.stack.push(screen).is_err() {
            debug!("navigation stack full");
        }
    }

    /// Pop the top screen. Does nothing if only the root screen remains.
    pub fn back(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Replace the top screen without growing the stack.
    pub fn replace(&mut self, screen: Screen) {
        if let Some(top) = self.stack.last_mut() {
            *top = screen;
        }
    }

    /// Pop back to `depth` entries (never below the root).
    pub fn truncate(&mut self, depth: usize) {
        self.stack.truncate(depth.max(1));
    }

    /// Drop everything above the root.
    pub fn home(&mut self) {
        self.truncate(1);
    }

    /// Return the number of entries currently on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Navigator;
    use crate::screen::Screen;
    use loader::AppLocation;

    #[test]
    fn test_nav_starts_at_home() {
        let nav = Navigator::new();
        assert_eq!(nav.current(), Screen::Home);
    }

    #[test]
    fn test_nav_push_menu() {
        let mut nav = Navigator::new();
        nav.push(Screen::Menu(AppLocation::Rx));
        assert_eq!(nav.current(), Screen::Menu(AppLocation::Rx));
    }

    #[test]
    fn test_nav_back_at_root_is_noop() {
        let mut nav = Navigator::new();
        nav.back();
        assert_eq!(nav.current(), Screen::Home);
        assert_eq!(nav.depth(), 1);
    }

    #[test]
    fn test_nav_stack_max_depth() {
        let mut nav = Navigator::new();
        for _ in 0..10 {
            nav.push(Screen::External);
        }
        assert_eq!(nav.depth(), 8);
    }

    #[test]
    fn test_nav_replace_screen() {
        let mut nav = Navigator::new();
        nav.push(Screen::App("freqman"));
        let depth_before = nav.depth();
        nav.replace(Screen::LaunchFailed);
        assert_eq!(nav.current(), Screen::LaunchFailed);
        assert_eq!(nav.depth(), depth_before);
    }

    #[test]
    fn test_nav_truncate_restores_prior_view() {
        let mut nav = Navigator::new();
        nav.push(Screen::Menu(AppLocation::Utilities));
        let mark = nav.depth();
        nav.push(Screen::External);
        nav.push(Screen::External);
        nav.truncate(mark);
        assert_eq!(nav.current(), Screen::Menu(AppLocation::Utilities));
        nav.truncate(0);
        assert_eq!(nav.current(), Screen::Home);
        assert_eq!(nav.depth(), 1);
    }
}
