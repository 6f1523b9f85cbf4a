use super::events::{EventParams, TrackingEvent};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

/// A command for the third-party tag pipeline, as pushed onto its data layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TagCommand {
    Js {
        timestamp: DateTime<Utc>,
    },
    Config {
        measurement_id: String,
        params: EventParams,
    },
    Set {
        user_properties: EventParams,
    },
    Event {
        name: String,
        params: EventParams,
    },
}

impl From<TrackingEvent> for TagCommand {
    fn from(event: TrackingEvent) -> Self {
        TagCommand::Event {
            name: event.name,
            params: event.params,
        }
    }
}

/// Receiver of tag commands. Delivery is fire-and-forget.
pub trait TagSink: Send + Sync {
    fn push(&self, command: TagCommand);
}

/// In-process data layer that keeps every command it receives.
#[derive(Debug, Default)]
pub struct DataLayer {
    commands: Mutex<Vec<TagCommand>>,
}

impl DataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<TagCommand> {
        self.commands.lock().clone()
    }

    /// Only the `event` commands, in delivery order.
    pub fn events(&self) -> Vec<TrackingEvent> {
        self.commands
            .lock()
            .iter()
            .filter_map(|command| match command {
                TagCommand::Event { name, params } => Some(TrackingEvent {
                    name: name.clone(),
                    params: params.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }
}

impl TagSink for DataLayer {
    fn push(&self, command: TagCommand) {
        self.commands.lock().push(command);
    }
}

/// Writes each command to the log as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TagSink for LogSink {
    fn push(&self, command: TagCommand) {
        match serde_json::to_string(&command) {
            Ok(json) => info!("dataLayer.push {}", json),
            Err(e) => info!("dataLayer.push {:?} (unserializable: {})", command, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::events::params;
    use serde_json::json;

    #[test]
    fn test_command_serialization() {
        let command = TagCommand::from(TrackingEvent::new(
            "faq_view",
            params(json!({"question_index": 2})),
        ));
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(
            value,
            json!({"command": "event", "name": "faq_view", "params": {"question_index": 2}})
        );
    }

    #[test]
    fn test_data_layer_filters_events() {
        let layer = DataLayer::new();
        layer.push(TagCommand::Js {
            timestamp: Utc::now(),
        });
        layer.push(TrackingEvent::new("a", EventParams::new()).into());
        layer.push(TagCommand::Set {
            user_properties: EventParams::new(),
        });
        layer.push(TrackingEvent::new("b", EventParams::new()).into());

        assert_eq!(layer.len(), 4);
        let names: Vec<String> = layer.events().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
