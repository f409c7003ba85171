//! Presentation seam of the client.
//!
//! The client dispatcher reports what it received through [`Presentation`];
//! the terminal implementation prints it and redraws the input prompt.

use std::{io::Write, sync::Arc};

use lanchat_shared::{
    Username,
    time::{Clock, SystemClock},
};

use crate::formatter::MessageFormatter;

/// Display of incoming chat events
#[cfg_attr(test, mockall::automock)]
pub trait Presentation: Send + Sync {
    /// The full list of logged-in users, in login order
    fn show_roster(&self, users: &[Username]);

    /// A chat line from `user`
    fn show_chat(&self, user: &str, text: &str);

    /// Another user logged in
    fn show_joined(&self, user: &str);

    /// Another user logged out
    fn show_left(&self, user: &str);
}

/// Prints events to stdout
pub struct TerminalPresentation {
    me: Username,
    clock: Arc<dyn Clock>,
}

impl TerminalPresentation {
    pub fn new(me: Username) -> Self {
        Self {
            me,
            clock: Arc::new(SystemClock),
        }
    }

    fn print(&self, text: &str) {
        print!("{}", text);
        redisplay_prompt(self.me.as_str());
    }
}

impl Presentation for TerminalPresentation {
    fn show_roster(&self, users: &[Username]) {
        self.print(&MessageFormatter::format_roster(users, &self.me));
    }

    fn show_chat(&self, user: &str, text: &str) {
        self.print(&MessageFormatter::format_chat(
            user,
            text,
            self.clock.now_millis(),
        ));
    }

    fn show_joined(&self, user: &str) {
        self.print(&MessageFormatter::format_joined(user, self.clock.now_millis()));
    }

    fn show_left(&self, user: &str) {
        self.print(&MessageFormatter::format_left(user, self.clock.now_millis()));
    }
}

/// Redisplay the prompt after printing a message
pub fn redisplay_prompt(user: &str) {
    print!("{}> ", user);
    std::io::stdout().flush().ok();
}
