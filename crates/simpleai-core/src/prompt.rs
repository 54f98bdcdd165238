//! Prompt construction for the text endpoint.
//!
//! The text model sees a fixed instruction block with a handful of worked
//! examples, then the recent conversation rendered in the same
//! `User: ...` / `<Kind>: ...` shape, then the new user message.

use crate::turn::ConversationTurn;
use chrono::{Local, NaiveTime};

const DATE_PLACEHOLDER: &str = "{DATE}";

/// Instruction block sent ahead of every dispatch.
pub const DISPATCH_TEMPLATE: &str = r#"Determine the specific action of a user's message based on the following list and format the response correctly using the previous history as context | Date: {DATE}

Actions:
- Assistant chat (Assistant: {message})
- Image Generation (Generation: {count}x"{prompt}")

Example:
User: Hello computer
Assistant: Hi there! How can I help you?

User: Show me an image of a dog
Generation: 1x"A black and white border collie running through a meadow, chasing a butterfly"

User: What is Mars?
Assistant: Mars is the fourth planet from the Sun and the second smallest planet in the Solar System. It is a terrestrial planet, meaning it is composed of mostly rock. It has a thin atmosphere and is home to the largest volcano in the Solar System, Olympus Mons.

User: What's it look like?
Generation: 3x"A vivid photo of the red planet Mars, taken from a telescope"

User: *added files*
Generation: 2x"An image of a dog and a cat sitting on a couch together"

User: What do these images have in common?
Assistant: They are both animals.

New Context (no memory of previous prompts):
"#;

/// Builds the full prompt for one dispatch.
pub struct PromptBuilder<'a> {
    history: &'a [ConversationTurn],
    time: NaiveTime,
}

impl<'a> PromptBuilder<'a> {
    /// Builder stamped with the current local time.
    pub fn new(history: &'a [ConversationTurn]) -> Self {
        Self {
            history,
            time: Local::now().time(),
        }
    }

    /// Override the time substituted for `{DATE}`.
    pub fn at(mut self, time: NaiveTime) -> Self {
        self.time = time;
        self
    }

    /// Render the instruction block, the history window and `user_text`.
    pub fn build(&self, user_text: &str) -> String {
        let header = DISPATCH_TEMPLATE.replace(DATE_PLACEHOLDER, &format_time(self.time));
        let history = self
            .history
            .iter()
            .map(render_turn)
            .collect::<Vec<_>>()
            .join("\n\n");

        format!("{header}{history}\n\nUser: {user_text}\n")
    }
}

/// `3:04:05 PM` style clock time.
fn format_time(time: NaiveTime) -> String {
    time.format("%-I:%M:%S %p").to_string()
}

fn render_turn(turn: &ConversationTurn) -> String {
    format!("User: {}\n{}: {}", turn.user(), turn.kind(), turn.payload())
}
