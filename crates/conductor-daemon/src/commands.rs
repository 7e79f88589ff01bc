//! Terminal command parsing.

use conductor_core::{SessionEvent, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Reset,
    Goto(usize),
    Done,
    Interrupt(String),
    Status,
    Quit,
    Help,
    Message(String),
    Unknown(String),
}

pub const HELP: &str = "\
Commands:
  /toggle            pause or resume the agent
  /reset             tear the session down and start over
  /goto N            navigate to message N
  /done              finish navigating
  /interrupt TEXT    interrupt the agent
  /status            show session status
  /quit              exit
Anything else is sent to the agent as a reply.";

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Command::Message(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "toggle" => Command::Toggle,
            "reset" => Command::Reset,
            "goto" => match arg.parse() {
                Ok(index) => Command::Goto(index),
                Err(_) => Command::Unknown(format!("usage: /goto N (got {:?})", arg)),
            },
            "done" => Command::Done,
            "interrupt" => Command::Interrupt(arg.to_string()),
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            "help" => Command::Help,
            other => Command::Unknown(format!("unknown command /{}", other)),
        };
        Some(command)
    }

    /// The controller event this command sends, if any.
    pub fn event(&self) -> Option<SessionEvent> {
        match self {
            Command::Toggle => Some(SessionEvent::Toggle),
            Command::Reset => Some(SessionEvent::Reset),
            Command::Goto(index) => Some(SessionEvent::SelectCheckpoint { index: *index }),
            Command::Done => Some(SessionEvent::NavigationComplete),
            Command::Interrupt(text) => Some(SessionEvent::Interrupt { text: text.clone() }),
            Command::Message(text) => Some(SessionEvent::SendMessage { text: text.clone() }),
            Command::Status | Command::Quit | Command::Help | Command::Unknown(_) => None,
        }
    }
}

/// Why `event` is not accepted in `state`.
pub fn rejection_hint(event: &SessionEvent, state: SessionState) -> String {
    match event {
        SessionEvent::Toggle => format!("Nothing to pause or resume while {}", state),
        SessionEvent::Reset => "A reset is already in progress".to_string(),
        SessionEvent::SelectCheckpoint { index } => format!("No message with index {}", index),
        SessionEvent::NavigationComplete => "No navigation in progress".to_string(),
        SessionEvent::SendMessage { text } | SessionEvent::Interrupt { text }
            if text.trim().is_empty() =>
        {
            "Message is empty".to_string()
        }
        _ => format!("Not available while {}", state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse {
        use super::*;

        #[test]
        fn blank_lines_are_ignored() {
            assert_eq!(Command::parse(""), None);
            assert_eq!(Command::parse("   "), None);
        }

        #[test]
        fn plain_text_is_a_message() {
            assert_eq!(
                Command::parse("  yes, go ahead "),
                Some(Command::Message("yes, go ahead".to_string()))
            );
        }

        #[test]
        fn slash_commands() {
            assert_eq!(Command::parse("/toggle"), Some(Command::Toggle));
            assert_eq!(Command::parse("/reset"), Some(Command::Reset));
            assert_eq!(Command::parse("/done"), Some(Command::Done));
            assert_eq!(Command::parse("/status"), Some(Command::Status));
            assert_eq!(Command::parse("/quit"), Some(Command::Quit));
            assert_eq!(Command::parse("/exit"), Some(Command::Quit));
        }

        #[test]
        fn goto_takes_an_index() {
            assert_eq!(Command::parse("/goto 4"), Some(Command::Goto(4)));
            assert!(matches!(Command::parse("/goto x"), Some(Command::Unknown(_))));
            assert!(matches!(Command::parse("/goto"), Some(Command::Unknown(_))));
        }

        #[test]
        fn interrupt_keeps_text() {
            assert_eq!(
                Command::parse("/interrupt stop editing  that file"),
                Some(Command::Interrupt("stop editing  that file".to_string()))
            );
        }

        #[test]
        fn unknown_commands_are_reported() {
            assert_eq!(
                Command::parse("/frobnicate"),
                Some(Command::Unknown("unknown command /frobnicate".to_string()))
            );
        }
    }

    mod event {
        use super::*;

        #[test]
        fn maps_commands_to_events() {
            assert_eq!(Command::Toggle.event(), Some(SessionEvent::Toggle));
            assert_eq!(
                Command::Goto(2).event(),
                Some(SessionEvent::SelectCheckpoint { index: 2 })
            );
            assert_eq!(
                Command::Message("hi".to_string()).event(),
                Some(SessionEvent::SendMessage {
                    text: "hi".to_string()
                })
            );
            assert_eq!(Command::Status.event(), None);
        }

        #[test]
        fn hints_name_the_state() {
            let hint = rejection_hint(&SessionEvent::Toggle, SessionState::Resetting);
            assert_eq!(hint, "Nothing to pause or resume while resetting");

            let hint = rejection_hint(
                &SessionEvent::Interrupt {
                    text: String::new(),
                },
                SessionState::Running,
            );
            assert_eq!(hint, "Message is empty");
        }
    }
}
