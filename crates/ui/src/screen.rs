//! Screen identifier enum: every view the navigator can stack.

use loader::AppLocation;

/// Every view the navigator can push onto its stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Screen {
    /// Root view.
    Home,
    /// App list for one menu category.
    Menu(AppLocation),
    /// A built-in app, by id.
    App(&'static str),
    /// An external app owns the display.
    External,
    /// Modal shown after a failed launch.
    LaunchFailed,
    /// The baseband core panicked; nothing else is dispatched.
    Halted,
}

impl Screen {
    /// `true` for views that take over the whole UI until dismissed.
    pub const fn is_modal(self) -> bool {
        matches!(self, Self::LaunchFailed | Self::Halted)
    }
}

#[cfg(test)]
mod tests {
    use super::Screen;
    use loader::AppLocation;

    #[test]
    fn test_modal_screens() {
        assert!(Screen::Halted.is_modal());
        assert!(Screen::LaunchFailed.is_modal());
        assert!(!Screen::Menu(AppLocation::Rx).is_modal());
        assert!(!Screen::App("freqman").is_modal());
    }
}
