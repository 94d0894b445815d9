//! Event multiplexing: conversation messages to typed display events

use std::sync::Arc;

use crate::conversation::Message;

/// Maximum length (in bytes) of tool output shown on screen. The full text
/// stays in conversation history; only the display copy is truncated.
pub const DISPLAY_TRUNCATE_LEN: usize = 2000;

/// A typed display event consumed by the rendering sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// Final agent prose for the operator
    Narrative { agent: String, text: String },
    /// Scratchpad text accompanying tool requests
    Reasoning { agent: String, text: String },
    /// A tool was invoked
    ToolInvoked {
        agent: String,
        tool: String,
        args: String,
    },
    /// Output of a tool or delegation, truncated for display
    ToolOutput {
        agent: String,
        output: String,
        is_error: bool,
    },
    Warning(String),
    Error(String),
}

/// Sink that renders display events. Implementations must not reorder.
pub trait RenderSink: Send + Sync {
    fn emit(&self, event: DisplayEvent);
}

/// Truncate a string to at most `max_len` bytes on a valid UTF-8 boundary.
pub fn truncate_display(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}\n... [truncated] ...", &s[..end])
    }
}

/// Classifies conversation messages into display events and forwards them
/// to the sink in causal order.
#[derive(Clone)]
pub struct EventMux {
    sink: Arc<dyn RenderSink>,
}

impl EventMux {
    pub fn new(sink: Arc<dyn RenderSink>) -> Self {
        Self { sink }
    }

    /// Map a message to its display events, in emission order.
    ///
    /// User input is rendered at the input site, so it maps to nothing here.
    pub fn classify(message: &Message) -> Vec<DisplayEvent> {
        match message {
            Message::User { .. } => vec![],
            Message::Agent {
                source,
                text,
                calls,
            } => {
                let mut events = Vec::new();
                if calls.is_empty() {
                    if let Some(text) = text {
                        events.push(DisplayEvent::Narrative {
                            agent: source.clone(),
                            text: text.clone(),
                        });
                    }
                } else {
                    if let Some(text) = text {
                        if !text.trim().is_empty() {
                            events.push(DisplayEvent::Reasoning {
                                agent: source.clone(),
                                text: text.clone(),
                            });
                        }
                    }
                    for call in calls {
                        events.push(DisplayEvent::ToolInvoked {
                            agent: source.clone(),
                            tool: call.name.clone(),
                            args: call.arguments.to_string(),
                        });
                    }
                }
                events
            }
            Message::Tool(result) => vec![DisplayEvent::ToolOutput {
                agent: String::new(),
                output: truncate_display(&result.output, DISPLAY_TRUNCATE_LEN),
                is_error: !result.success,
            }],
            Message::Delegation(result) => vec![DisplayEvent::ToolOutput {
                agent: result.agent.clone(),
                output: truncate_display(&result.summary, DISPLAY_TRUNCATE_LEN),
                is_error: !result.is_success(),
            }],
        }
    }

    /// Classify a message and emit its display events
    pub fn emit_message(&self, message: &Message) {
        for event in Self::classify(message) {
            self.sink.emit(event);
        }
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.sink.emit(DisplayEvent::Warning(text.into()));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.sink.emit(DisplayEvent::Error(text.into()));
    }
}

/// Sink that collects events in memory; used by tests and headless runs
#[derive(Default)]
pub struct VecSink {
    events: std::sync::Mutex<Vec<DisplayEvent>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DisplayEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RenderSink for VecSink {
    fn emit(&self, event: DisplayEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
