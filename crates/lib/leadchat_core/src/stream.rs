//! Pseudo-streaming of a complete reply as typed UI stream events.
//!
//! A turn is produced in two stages:
//!
//! 1. A token source ([`TokenStream`]) yields text fragments lazily. The
//!    backend only returns complete replies, so [`paced_tokens`] chunks the
//!    reply according to a [`StreamPolicy`] and paces the chunks with a fixed
//!    delay. A genuine token stream can be plugged in instead.
//! 2. [`emit_turn`] wraps the token source into the event sequence
//!    `text-start`, `text-delta`*, `text-end`, optional contact-form tool
//!    pair, `finish`.
//!
//! Both stages are lazy: nothing is computed until the response body polls
//! the stream, and dropping it cancels any pending delay.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::RelayError;
use crate::trigger::{CONTACT_FORM_TOOL, ContactIntentClassifier};

/// Default pause before each emitted chunk.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(20);

/// Separator appended to every [`ChunkGranularity::Word`] chunk.
pub const CHUNK_SEPARATOR: &str = " ";

/// Key of the contact-form tool input carrying the user's last question.
pub const USER_QUERY_KEY: &str = "user_query";

/// One event of the UI message stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: serde_json::Value,
    },
    ToolOutputAvailable {
        tool_call_id: String,
    },
    Finish,
    /// Terminal event of a turn whose token source failed after it started.
    Error {
        error_text: String,
    },
}

impl StreamEvent {
    /// Event-stream framing: `data: <json>\n\n`.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Finish | StreamEvent::Error { .. })
    }
}

/// How a complete reply is cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkGranularity {
    /// Split on every single space. Runs of spaces yield empty chunks, and
    /// every chunk is streamed with [`CHUNK_SEPARATOR`] appended.
    #[default]
    Word,
    /// One chunk per word, carrying the whitespace that follows it verbatim.
    /// Leading whitespace stays with the first chunk, so the deltas concatenate
    /// back to the exact reply, newlines included.
    Whitespace,
}

impl FromStr for ChunkGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "word" => Ok(ChunkGranularity::Word),
            "whitespace" => Ok(ChunkGranularity::Whitespace),
            other => Err(format!(
                "unknown chunking '{other}' (expected 'word' or 'whitespace')"
            )),
        }
    }
}

/// Chunking and pacing used to simulate incremental generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPolicy {
    pub granularity: ChunkGranularity,
    pub chunk_delay: Duration,
}

impl Default for StreamPolicy {
    fn default() -> Self {
        Self {
            granularity: ChunkGranularity::default(),
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }
}

/// Lazy, finite source of reply fragments.
pub type TokenStream = BoxStream<'static, Result<String, RelayError>>;

/// Cut `text` into chunks without separators.
pub fn chunk_reply(text: &str, granularity: ChunkGranularity) -> Vec<String> {
    match granularity {
        ChunkGranularity::Word => text.split(' ').map(str::to_owned).collect(),
        ChunkGranularity::Whitespace => split_after_whitespace(text),
    }
}

fn split_after_whitespace(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut seen_word = false;
    let mut in_gap = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_gap = seen_word;
        } else if in_gap {
            chunks.push(text[start..i].to_owned());
            start = i;
            in_gap = false;
        } else {
            seen_word = true;
        }
    }
    chunks.push(text[start..].to_owned());
    chunks
}

/// Token source for a complete reply, one chunk released after each
/// `policy.chunk_delay`. Word chunks get [`CHUNK_SEPARATOR`] appended.
pub fn paced_tokens(text: &str, policy: StreamPolicy) -> TokenStream {
    let delay = policy.chunk_delay;
    let separator = match policy.granularity {
        ChunkGranularity::Word => CHUNK_SEPARATOR,
        ChunkGranularity::Whitespace => "",
    };
    stream::iter(chunk_reply(text, policy.granularity))
        .then(move |chunk| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, RelayError>(format!("{chunk}{separator}"))
        })
        .boxed()
}

struct TurnState {
    id: String,
    tokens: Option<TokenStream>,
    reply: String,
    user_text: String,
    classifier: Arc<dyn ContactIntentClassifier>,
    queue: VecDeque<StreamEvent>,
}

impl TurnState {
    fn close(&mut self) {
        self.tokens = None;
        self.queue.push_back(StreamEvent::TextEnd {
            id: self.id.clone(),
        });
        if self
            .classifier
            .should_offer_contact_form(&self.user_text, &self.reply)
        {
            let tool_call_id = Uuid::new_v4().to_string();
            debug!(id = %self.id, %tool_call_id, "offering contact form");
            self.queue.push_back(StreamEvent::ToolInputAvailable {
                tool_call_id: tool_call_id.clone(),
                tool_name: CONTACT_FORM_TOOL.to_string(),
                input: serde_json::json!({ USER_QUERY_KEY: self.user_text }),
            });
            self.queue
                .push_back(StreamEvent::ToolOutputAvailable { tool_call_id });
        }
        self.queue.push_back(StreamEvent::Finish);
    }

    fn fail(&mut self, err: RelayError) {
        warn!(id = %self.id, "token stream failed mid-turn: {err}");
        self.tokens = None;
        self.queue.push_back(StreamEvent::TextEnd {
            id: self.id.clone(),
        });
        self.queue.push_back(StreamEvent::Error {
            error_text: err.to_string(),
        });
    }
}

/// Turn a token source into the event sequence of one assistant turn.
///
/// `user_text` is the latest user message; together with the accumulated
/// reply it is handed to `classifier` once the token source is exhausted.
pub fn emit_turn(
    tokens: TokenStream,
    user_text: String,
    classifier: Arc<dyn ContactIntentClassifier>,
) -> BoxStream<'static, StreamEvent> {
    let id = Uuid::new_v4().to_string();
    let state = TurnState {
        queue: VecDeque::from([StreamEvent::TextStart { id: id.clone() }]),
        id,
        tokens: Some(tokens),
        reply: String::new(),
        user_text,
        classifier,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.queue.pop_front() {
                return Some((event, st));
            }
            let tokens = st.tokens.as_mut()?;
            let next = tokens.next().await;
            match next {
                Some(Ok(delta)) => {
                    st.reply.push_str(&delta);
                    st.queue.push_back(StreamEvent::TextDelta {
                        id: st.id.clone(),
                        delta,
                    });
                }
                Some(Err(e)) => st.fail(e),
                None => st.close(),
            }
        }
    })
    .boxed()
}

/// Frame every event for an event-stream response body.
pub fn sse_frames(
    events: BoxStream<'static, StreamEvent>,
) -> BoxStream<'static, Result<String, serde_json::Error>> {
    events.map(|event| event.to_sse_frame()).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::PhraseClassifier;

    const NO_DELAY: StreamPolicy = StreamPolicy {
        granularity: ChunkGranularity::Word,
        chunk_delay: Duration::ZERO,
    };

    async fn run(reply: &str, user: &str) -> Vec<StreamEvent> {
        emit_turn(
            paced_tokens(reply, NO_DELAY),
            user.to_string(),
            Arc::new(PhraseClassifier),
        )
        .collect()
        .await
    }

    fn deltas(events: &[StreamEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::TextDelta { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect()
    }

    fn type_names(events: &[StreamEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| serde_json::to_value(e).unwrap()["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn word_chunking_preserves_empty_words() {
        assert_eq!(chunk_reply("a  b", ChunkGranularity::Word), vec!["a", "", "b"]);
        assert_eq!(chunk_reply("", ChunkGranularity::Word), vec![""]);
    }

    #[test]
    fn whitespace_chunking_keeps_trailing_gaps() {
        assert_eq!(
            chunk_reply(" a  b\n c ", ChunkGranularity::Whitespace),
            vec![" a  ", "b\n ", "c "]
        );
        assert_eq!(chunk_reply("   ", ChunkGranularity::Whitespace), vec!["   "]);
        assert_eq!(chunk_reply("", ChunkGranularity::Whitespace), vec![""]);
    }

    #[test]
    fn granularity_parses_from_config_strings() {
        assert_eq!("word".parse::<ChunkGranularity>(), Ok(ChunkGranularity::Word));
        assert_eq!(
            " Whitespace ".parse::<ChunkGranularity>(),
            Ok(ChunkGranularity::Whitespace)
        );
        assert!("token".parse::<ChunkGranularity>().is_err());
    }

    #[test]
    fn events_serialize_to_wire_shape() {
        let delta = StreamEvent::TextDelta {
            id: "m1".into(),
            delta: "hi ".into(),
        };
        assert_eq!(
            delta.to_sse_frame().unwrap(),
            "data: {\"type\":\"text-delta\",\"id\":\"m1\",\"delta\":\"hi \"}\n\n"
        );

        let tool = StreamEvent::ToolInputAvailable {
            tool_call_id: "t1".into(),
            tool_name: CONTACT_FORM_TOOL.into(),
            input: serde_json::json!({"user_query": "q"}),
        };
        assert_eq!(
            serde_json::to_value(&tool).unwrap(),
            serde_json::json!({
                "type": "tool-input-available",
                "toolCallId": "t1",
                "toolName": "contact_form",
                "input": {"user_query": "q"}
            })
        );

        assert_eq!(
            StreamEvent::Finish.to_sse_frame().unwrap(),
            "data: {\"type\":\"finish\"}\n\n"
        );
        assert_eq!(
            serde_json::to_value(StreamEvent::Error {
                error_text: "boom".into()
            })
            .unwrap(),
            serde_json::json!({"type": "error", "errorText": "boom"})
        );
    }

    #[tokio::test]
    async fn one_delta_per_word_with_trailing_space() {
        let reply = "Our platform supports Shopify and Magento.";
        let events = run(reply, "What platforms do you support?").await;

        let d = deltas(&events);
        assert_eq!(d.len(), reply.split(' ').count());
        assert!(d.iter().all(|x| x.ends_with(' ')));
        assert_eq!(d.concat(), format!("{reply} "));
    }

    #[tokio::test]
    async fn event_order_without_form() {
        let events = run("Shopify and Magento.", "What platforms do you support?").await;
        assert_eq!(
            type_names(&events),
            vec!["text-start", "text-delta", "text-delta", "text-delta", "text-end", "finish"]
        );
    }

    #[tokio::test]
    async fn all_text_events_share_one_id() {
        let events = run("one two", "").await;
        let ids: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::TextStart { id }
                | StreamEvent::TextDelta { id, .. }
                | StreamEvent::TextEnd { id } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids.len(), 4);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn tool_pair_sits_between_text_end_and_finish() {
        let events = run("I don't have that information about pricing.", "pricing?").await;
        let names = type_names(&events);
        let n = names.len();
        assert_eq!(
            &names[n - 4..],
            &["text-end", "tool-input-available", "tool-output-available", "finish"]
        );

        let (input_id, output_id) = match (&events[n - 3], &events[n - 2]) {
            (
                StreamEvent::ToolInputAvailable {
                    tool_call_id: a,
                    tool_name,
                    input,
                },
                StreamEvent::ToolOutputAvailable { tool_call_id: b },
            ) => {
                assert_eq!(tool_name, CONTACT_FORM_TOOL);
                assert_eq!(input["user_query"], "pricing?");
                (a.clone(), b.clone())
            }
            other => panic!("unexpected events: {other:?}"),
        };
        assert_eq!(input_id, output_id);
    }

    #[tokio::test]
    async fn user_intent_alone_triggers_form() {
        let events = run("Sure thing.", "How can I contact your sales team?").await;
        assert!(
            events
                .iter()
                .any(|e| matches!(e, StreamEvent::ToolInputAvailable { .. }))
        );
    }

    #[tokio::test]
    async fn consecutive_spaces_emit_empty_word_deltas() {
        let events = run("a  b", "").await;
        assert_eq!(deltas(&events), vec!["a ", " ", "b "]);
    }

    #[tokio::test]
    async fn identifiers_are_fresh_per_turn() {
        let reply = "I don't have that information.";
        let first = run(reply, "").await;
        let second = run(reply, "").await;

        assert_eq!(deltas(&first), deltas(&second));
        assert_ne!(first[0], second[0], "text-start ids must differ");

        let tool_id = |events: &[StreamEvent]| {
            events.iter().find_map(|e| match e {
                StreamEvent::ToolOutputAvailable { tool_call_id } => Some(tool_call_id.clone()),
                _ => None,
            })
        };
        assert_ne!(tool_id(&first), tool_id(&second));
    }

    #[tokio::test]
    async fn token_failure_ends_with_error_event() {
        let tokens: TokenStream = stream::iter(vec![
            Ok("partial ".to_string()),
            Err(RelayError::Stream("connection reset".into())),
            Ok("never ".to_string()),
        ])
        .boxed();
        let events: Vec<StreamEvent> =
            emit_turn(tokens, String::new(), Arc::new(PhraseClassifier))
                .collect()
                .await;

        assert_eq!(
            type_names(&events),
            vec!["text-start", "text-delta", "text-end", "error"]
        );
        assert!(events.last().unwrap().is_terminal());
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Finish)));
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_are_paced_by_policy_delay() {
        let policy = StreamPolicy {
            granularity: ChunkGranularity::Word,
            chunk_delay: Duration::from_millis(20),
        };
        let started = tokio::time::Instant::now();
        let tokens: Vec<_> = paced_tokens("one two three", policy).collect().await;
        assert_eq!(tokens.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn frames_are_yielded_incrementally() {
        let mut frames = sse_frames(
            emit_turn(
                paced_tokens("hello world", NO_DELAY),
                String::new(),
                Arc::new(PhraseClassifier),
            ),
        );
        let first = frames.next().await.unwrap().unwrap();
        assert!(first.starts_with("data: {\"type\":\"text-start\""));
        assert!(first.ends_with("\n\n"));
        let rest: Vec<_> = frames.collect().await;
        assert_eq!(
            rest.last().unwrap().as_ref().unwrap(),
            "data: {\"type\":\"finish\"}\n\n"
        );
    }

    #[tokio::test]
    async fn whitespace_deltas_rebuild_the_exact_reply() {
        let policy = StreamPolicy {
            granularity: ChunkGranularity::Whitespace,
            chunk_delay: Duration::ZERO,
        };
        let reply = "Sorry, I don't have that information.\n\nPlease  ask sales.";
        let events: Vec<StreamEvent> = emit_turn(
            paced_tokens(reply, policy),
            "pricing?".to_string(),
            Arc::new(PhraseClassifier),
        )
        .collect()
        .await;

        assert_eq!(deltas(&events).concat(), reply);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, StreamEvent::ToolInputAvailable { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_turn_stops_token_production() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let tokens: TokenStream = stream::iter(0..5)
            .then(move |i| {
                let counter = counter.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, RelayError>(format!("t{i} "))
                }
            })
            .boxed();

        let mut turn = emit_turn(tokens, String::new(), Arc::new(PhraseClassifier));
        assert!(matches!(turn.next().await, Some(StreamEvent::TextStart { .. })));
        assert!(matches!(turn.next().await, Some(StreamEvent::TextDelta { .. })));
        assert_eq!(produced.load(Ordering::SeqCst), 1);

        // Leave the next token parked mid-delay, then hang up.
        let pending = tokio::time::timeout(Duration::from_millis(5), turn.next()).await;
        assert!(pending.is_err());
        drop(turn);
        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(produced.load(Ordering::SeqCst), 1);
    }
}
