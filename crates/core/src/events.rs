//! Classification of upstream server content into caller-facing events.

use crate::generic_types::{ContentPart, ServerContent, Transcription};
use bytes::Bytes;
use serde::Serialize;

/// Who produced a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// An event destined for the caller. One notification can yield several.
#[derive(Debug, Clone, PartialEq)]
pub enum CallerEvent {
    /// A chunk of the model's spoken audio.
    Audio(Bytes),
    /// A transcription of either side's speech.
    Transcription { role: Role, text: String },
    /// A raw text part of the model turn.
    Text { role: Role, text: String },
    TurnComplete,
    Interrupted,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyOptions {
    /// Emit non-thought model text parts alongside audio.
    pub forward_model_text: bool,
}

impl ServerContent {
    /// Runs every check against this content and returns the resulting
    /// events in emission order: model turn parts, output transcription,
    /// input transcription, turn complete, interrupted.
    pub fn caller_events(&self, options: ClassifyOptions) -> Vec<CallerEvent> {
        let mut events = Vec::new();

        for part in &self.model_turn {
            match part {
                ContentPart::Audio(data) => events.push(CallerEvent::Audio(data.clone())),
                ContentPart::Text { text, thought } => {
                    if options.forward_model_text && !thought && !text.is_empty() {
                        events.push(CallerEvent::Text {
                            role: Role::Model,
                            text: text.clone(),
                        });
                    }
                }
            }
        }

        if let Some(text) = non_empty(&self.output_transcription) {
            events.push(CallerEvent::Transcription {
                role: Role::Model,
                text,
            });
        }
        if let Some(text) = non_empty(&self.input_transcription) {
            events.push(CallerEvent::Transcription {
                role: Role::User,
                text,
            });
        }
        if self.turn_complete {
            events.push(CallerEvent::TurnComplete);
        }
        if self.interrupted {
            events.push(CallerEvent::Interrupted);
        }

        events
    }
}

fn non_empty(transcription: &Option<Transcription>) -> Option<String> {
    transcription
        .as_ref()
        .filter(|t| !t.text.is_empty())
        .map(|t| t.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_part(bytes: &'static [u8]) -> ContentPart {
        ContentPart::Audio(Bytes::from_static(bytes))
    }

    #[test]
    fn test_empty_content_yields_nothing() {
        let events = ServerContent::default().caller_events(ClassifyOptions::default());
        assert!(events.is_empty());
    }

    #[test]
    fn test_transcription_and_turn_complete_are_both_emitted_in_order() {
        let content = ServerContent {
            output_transcription: Some(Transcription::new("Hola")),
            turn_complete: true,
            ..Default::default()
        };

        let events = content.caller_events(ClassifyOptions::default());
        assert_eq!(
            events,
            vec![
                CallerEvent::Transcription {
                    role: Role::Model,
                    text: "Hola".to_string()
                },
                CallerEvent::TurnComplete,
            ]
        );
    }

    #[test]
    fn test_interrupted_alone_yields_only_interrupted() {
        let content = ServerContent {
            interrupted: true,
            ..Default::default()
        };
        assert_eq!(
            content.caller_events(ClassifyOptions::default()),
            vec![CallerEvent::Interrupted]
        );
    }

    #[test]
    fn test_full_notification_order() {
        let content = ServerContent {
            model_turn: vec![audio_part(b"\x01\x02"), audio_part(b"\x03\x04")],
            input_transcription: Some(Transcription::new("hi there")),
            output_transcription: Some(Transcription::new("hello")),
            turn_complete: true,
            interrupted: true,
        };

        let events = content.caller_events(ClassifyOptions::default());
        assert_eq!(events.len(), 6);
        assert_eq!(events[0], CallerEvent::Audio(Bytes::from_static(b"\x01\x02")));
        assert_eq!(events[1], CallerEvent::Audio(Bytes::from_static(b"\x03\x04")));
        assert!(matches!(
            events[2],
            CallerEvent::Transcription {
                role: Role::Model,
                ..
            }
        ));
        assert!(matches!(
            events[3],
            CallerEvent::Transcription {
                role: Role::User,
                ..
            }
        ));
        assert_eq!(events[4], CallerEvent::TurnComplete);
        assert_eq!(events[5], CallerEvent::Interrupted);
    }

    #[test]
    fn test_empty_transcription_text_is_skipped() {
        let content = ServerContent {
            input_transcription: Some(Transcription::new("")),
            ..Default::default()
        };
        assert!(content.caller_events(ClassifyOptions::default()).is_empty());
    }

    #[test]
    fn test_model_text_requires_opt_in_and_skips_thoughts() {
        let content = ServerContent {
            model_turn: vec![
                ContentPart::Text {
                    text: "**Planning the reply**".to_string(),
                    thought: true,
                },
                ContentPart::Text {
                    text: "Namaste!".to_string(),
                    thought: false,
                },
            ],
            ..Default::default()
        };

        assert!(content.caller_events(ClassifyOptions::default()).is_empty());

        let events = content.caller_events(ClassifyOptions {
            forward_model_text: true,
        });
        assert_eq!(
            events,
            vec![CallerEvent::Text {
                role: Role::Model,
                text: "Namaste!".to_string()
            }]
        );
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
    }
}
