//! Per-message dispatch from classified requests to handlers

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::Result;
use crate::protocol::{ErrorCode, Request, RequestType, Response};

/// The operations a connection can invoke
///
/// Soft-degrading operations return plain values; the others return
/// `Result` and are turned into error responses by [`EventRouter`].
#[async_trait]
pub trait Handlers: Send + Sync {
    /// Candidate replies for `text`
    async fn predict(&self, text: &str) -> Result<Vec<String>>;

    /// Synthesize `text` and return the audio URL
    async fn synthesise(&self, text: &str, voice_params: &Map<String, Value>) -> Result<String>;

    /// Word completions for partial input
    async fn autocomplete(&self, input: &str) -> Vec<String>;

    /// Transcript text (or a sentinel) for an audio payload
    async fn audio_data(&self, audio: &str) -> String;

    /// Record an out-of-band event, returning its id if stored
    async fn event(&self, event_type: &str, event_data: &Value) -> Option<i64>;

    /// Language tag reported with transcripts
    fn language(&self) -> &str;
}

/// Stateless classifier turning every frame into exactly one response
#[derive(Clone)]
pub struct EventRouter {
    handlers: Arc<dyn Handlers>,
}

impl EventRouter {
    #[must_use]
    pub fn new(handlers: Arc<dyn Handlers>) -> Self {
        Self { handlers }
    }

    /// Handle one inbound text frame
    pub async fn dispatch(&self, frame: &str) -> Response {
        match Request::parse(frame) {
            Ok(request) => self.handle(request).await,
            Err(rejection) => {
                tracing::warn!(
                    request_type = %rejection.request_type,
                    code = ?rejection.code,
                    message = %rejection.message,
                    "rejected frame"
                );
                rejection.into()
            }
        }
    }

    /// Run a classified request against its handler
    pub async fn handle(&self, request: Request) -> Response {
        let request_type = request.request_type();
        tracing::debug!(request_type = %request_type, "dispatching");

        match request {
            Request::Predict(req) => match self.handlers.predict(&req.text).await {
                Ok(options) => Response::options(request_type, options),
                Err(e) => {
                    tracing::error!(error = %e, "prediction failed");
                    Response::error(
                        request_type.as_str(),
                        ErrorCode::CompletionFailed,
                        e.to_string(),
                    )
                }
            },
            Request::Synthesise(req) => {
                match self.handlers.synthesise(&req.text, &req.tts_data).await {
                    Ok(audio_url) => Response::ok(request_type, json!({ "audio_url": audio_url })),
                    Err(e) => {
                        tracing::error!(error = %e, "synthesis failed");
                        Response::error(
                            request_type.as_str(),
                            ErrorCode::SynthesisFailed,
                            e.to_string(),
                        )
                    }
                }
            }
            Request::Autocomplete(req) => {
                Response::options(request_type, self.handlers.autocomplete(&req.input).await)
            }
            Request::AudioData(req) => {
                let text = self.handlers.audio_data(&req.audio).await;
                Response::transcript(text, self.handlers.language())
            }
            Request::Event(req) => {
                let event_id = self.handlers.event(&req.event_type, &req.event_data).await;
                Response::ok(RequestType::Event, json!({ "event_id": event_id }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::Error;

    /// Records which handler ran
    #[derive(Default)]
    struct FakeHandlers {
        calls: Mutex<Vec<&'static str>>,
        fail: bool,
    }

    impl FakeHandlers {
        fn record(&self, name: &'static str) {
            self.calls.lock().unwrap().push(name);
        }
    }

    #[async_trait]
    impl Handlers for FakeHandlers {
        async fn predict(&self, text: &str) -> Result<Vec<String>> {
            self.record("predict");
            if self.fail {
                return Err(Error::Llm("model down".to_string()));
            }
            Ok(vec![format!("{text} 1"), format!("{text} 2"), format!("{text} 3")])
        }

        async fn synthesise(
            &self,
            _text: &str,
            voice_params: &Map<String, Value>,
        ) -> Result<String> {
            self.record("synthesise");
            if self.fail {
                return Err(Error::Tts("tts down".to_string()));
            }
            Ok(format!("http://relay/audio/{}.wav", voice_params.len()))
        }

        async fn autocomplete(&self, input: &str) -> Vec<String> {
            self.record("autocomplete");
            vec![format!("{input}!")]
        }

        async fn audio_data(&self, _audio: &str) -> String {
            self.record("audio_data");
            "hello world".to_string()
        }

        async fn event(&self, _event_type: &str, _event_data: &Value) -> Option<i64> {
            self.record("event");
            if self.fail { None } else { Some(7) }
        }

        fn language(&self) -> &str {
            "en"
        }
    }

    fn router(fail: bool) -> (Arc<FakeHandlers>, EventRouter) {
        let handlers = Arc::new(FakeHandlers {
            fail,
            ..FakeHandlers::default()
        });
        (handlers.clone(), EventRouter::new(handlers))
    }

    fn value(response: &Response) -> Value {
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_each_type_reaches_one_handler() {
        let (handlers, router) = router(false);

        router.dispatch(r#"{"request_type":"PREDICT","data":{"text":"a"}}"#).await;
        router
            .dispatch(r#"{"request_type":"SYNTHESISE","data":{"text":"a","ttsData":{}}}"#)
            .await;
        router.dispatch(r#"{"request_type":"AUTOCOMPLETE","data":{"input":"a"}}"#).await;
        router.dispatch(r#"{"request_type":"AUDIO_DATA","data":{"audio":"x"}}"#).await;
        router
            .dispatch(r#"{"request_type":"EVENT","data":{"event_type":"blink","event_data":{}}}"#)
            .await;

        assert_eq!(
            handlers.calls.lock().unwrap().as_slice(),
            ["predict", "synthesise", "autocomplete", "audio_data", "event"]
        );
    }

    #[tokio::test]
    async fn test_response_shapes() {
        let (_, router) = router(false);

        let predict = router.dispatch(r#"{"request_type":"PREDICT","data":{"text":"a"}}"#).await;
        assert_eq!(
            value(&predict),
            json!({"request_type": "PREDICT", "data": {"options": ["a 1", "a 2", "a 3"]}})
        );

        let audio = router.dispatch(r#"{"request_type":"AUDIO_DATA","data":{"audio":"x"}}"#).await;
        assert_eq!(
            value(&audio),
            json!({"request_type": "AUDIO_DATA", "data": "hello world", "language": "en"})
        );

        let synth = router
            .dispatch(r#"{"request_type":"SYNTHESISE","data":{"text":"a","ttsData":{"speed":1}}}"#)
            .await;
        assert_eq!(
            value(&synth),
            json!({"request_type": "SYNTHESISE", "data": {"audio_url": "http://relay/audio/1.wav"}})
        );

        let event = router
            .dispatch(r#"{"request_type":"EVENT","data":{"event_type":"blink"}}"#)
            .await;
        assert_eq!(value(&event), json!({"request_type": "EVENT", "data": {"event_id": 7}}));
    }

    #[tokio::test]
    async fn test_unknown_type_calls_nothing() {
        let (handlers, router) = router(false);

        let response = router.dispatch(r#"{"request_type":"DANCE","data":{}}"#).await;
        assert!(response.is_error());
        assert_eq!(response.request_type, "DANCE");
        assert!(handlers.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_operation_failures_become_error_responses() {
        let (_, router) = router(true);

        let predict = router.dispatch(r#"{"request_type":"PREDICT","data":{"text":"a"}}"#).await;
        assert_eq!(predict.error.unwrap().code, ErrorCode::CompletionFailed);

        let synth = router
            .dispatch(r#"{"request_type":"SYNTHESISE","data":{"text":"a"}}"#)
            .await;
        assert_eq!(synth.error.unwrap().code, ErrorCode::SynthesisFailed);

        let event = router
            .dispatch(r#"{"request_type":"EVENT","data":{"event_type":"blink"}}"#)
            .await;
        assert_eq!(value(&event)["data"], json!({"event_id": null}));
    }
}
