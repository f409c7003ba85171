//! Message formatting utilities for client display.

use lanchat_shared::{
    Username,
    time::{timestamp_to_local_clock, timestamp_to_rfc3339},
};

const RULE: &str = "============================================================";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the greeting shown once the connection is up
    ///
    /// # Arguments
    ///
    /// * `me` - The username this client logs in as
    /// * `server` - `host:port` of the server
    /// * `connected_at` - Unix timestamp of the connection (milliseconds)
    pub fn format_connected(me: &Username, server: &str, connected_at: i64) -> String {
        format!(
            "\nConnection accepted {} at {}\n\
             You are '{}'. Type a message and press Enter to send.\n\
             /who lists the users in the chat, /quit logs out.\n",
            server,
            timestamp_to_rfc3339(connected_at),
            me
        )
    }

    /// Format the roster, marking the current user
    ///
    /// # Arguments
    ///
    /// * `users` - Logged-in users in login order
    /// * `me` - The current user (to mark as "me")
    pub fn format_roster(users: &[Username], me: &Username) -> String {
        let mut output = String::new();
        output.push_str("\n\n");
        output.push_str(RULE);
        output.push_str("\nUsers in the chat:\n");

        if users.is_empty() {
            output.push_str("(No users)\n");
        } else {
            for (index, user) in users.iter().enumerate() {
                let me_suffix = if user == me { " (me)" } else { "" };
                output.push_str(&format!("{}) {}{}\n", index + 1, user, me_suffix));
            }
        }

        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format a user-joined notification
    pub fn format_joined(user: &str, at: i64) -> String {
        format!("\n+ {} joined at {}\n", user, timestamp_to_local_clock(at))
    }

    /// Format a user-left notification
    pub fn format_left(user: &str, at: i64) -> String {
        format!("\n- {} left at {}\n", user, timestamp_to_local_clock(at))
    }

    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `from` - The username of the sender
    /// * `text` - The message text
    /// * `received_at` - Unix timestamp when the message arrived (milliseconds)
    pub fn format_chat(from: &str, text: &str, received_at: i64) -> String {
        format!(
            "\n[{}] @{}: {}\n",
            timestamp_to_local_clock(received_at),
            from,
            text
        )
    }

    /// Format the reason the server refused the login
    pub fn format_rejected(reason: &str) -> String {
        format!("\nLogin refused by the server: {}\n", reason)
    }
}
